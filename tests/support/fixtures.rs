// ABOUTME: Config and history fixtures rooted in a temporary directory.
// ABOUTME: Archive and history paths are absolute so tests never touch the cwd.

use std::path::Path;
use tugboat::config::Config;

/// Single-image config: container `app1`, ports `80:80`.
pub fn single_image_yaml(dir: &Path) -> String {
    format!(
        r#"
ssh:
  host: deploy.example.com
  user: deploy
  password: s3cret
image:
  name: myapp
remote:
  container_name: app1
  ports: ["80:80"]
  environment:
    APP_ENV: production
  volumes: ["/srv/data:/data"]
deploy:
  archive_file: {archive}
  remote_temp_dir: /tmp
  history_file: {history}
"#,
        archive = dir.join("deploy.tar").display(),
        history = dir.join("history.json").display(),
    )
}

pub fn single_image_config(dir: &Path) -> Config {
    Config::from_yaml(&single_image_yaml(dir)).unwrap()
}

/// Multi-service config with one env file and one extra file, all created on disk.
pub fn compose_config(dir: &Path) -> Config {
    let descriptor = dir.join("docker-compose.yml");
    let env_file = dir.join(".env.production");
    let extra = dir.join("nginx.conf");
    std::fs::write(
        &descriptor,
        "services:\n  web:\n    image: myapp:${IMAGE_TAG}\n    build: .\n",
    )
    .unwrap();
    std::fs::write(&env_file, "APP_ENV=production\n").unwrap();
    std::fs::write(&extra, "events {}\n").unwrap();

    let yaml = format!(
        r#"
ssh:
  host: deploy.example.com
  user: deploy
  private_key_path: {key}
image:
  name: myapp
deploy:
  archive_file: {archive}
  remote_temp_dir: /srv/app
  history_file: {history}
compose:
  file: {descriptor}
  service: web
  env_files: [{env_file}]
  extra_files: [{extra}]
  target_env: production
"#,
        key = dir.join("id_ed25519").display(),
        archive = dir.join("deploy.tar").display(),
        history = dir.join("history.json").display(),
        descriptor = descriptor.display(),
        env_file = env_file.display(),
        extra = extra.display(),
    );
    Config::from_yaml(&yaml).unwrap()
}

/// One history record as it appears in the history file.
pub fn record_json(version: &str, image: &str) -> serde_json::Value {
    serde_json::json!({
        "version": version,
        "revision": "abc1234",
        "summary": "Earlier release",
        "image": image,
        "tag": image.rsplit(':').next().unwrap_or_default(),
        "created_at": "2024-05-01T12:00:00Z",
    })
}

/// Write a history file containing `records`, keyed by their versions.
pub fn write_history(path: &Path, records: &[serde_json::Value]) {
    let map: serde_json::Map<String, serde_json::Value> = records
        .iter()
        .map(|r| (r["version"].as_str().unwrap().to_string(), r.clone()))
        .collect();
    std::fs::write(path, serde_json::to_string_pretty(&map).unwrap()).unwrap();
}
