// ABOUTME: Integration tests for config discovery and environment resolution.
// ABOUTME: Exercises the alternate locations and local env references.

use tugboat::config::{CONFIG_FILENAME_ALT, CONFIG_FILENAME_DIR, Config, init_project};
use tugboat::deploy::single_image;
use tugboat::error::Error;

const CONFIG: &str = r#"
ssh:
  host: deploy.example.com
  user: deploy
  password: s3cret
image:
  name: myapp
remote:
  container_name: app1
  environment:
    APP_ENV: production
    DATABASE_URL:
      env: TUGBOAT_IT_DATABASE_URL
    LOG_LEVEL:
      env: TUGBOAT_IT_LOG_LEVEL
      default: info
"#;

#[test]
fn discovers_alternate_extension() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join(CONFIG_FILENAME_ALT), CONFIG).unwrap();

    let config = Config::discover(dir.path()).unwrap();
    assert_eq!(config.ssh.host, "deploy.example.com");
}

#[test]
fn discovers_config_inside_dot_directory() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(CONFIG_FILENAME_DIR);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, CONFIG).unwrap();

    assert!(Config::discover(dir.path()).is_ok());
}

#[test]
fn environment_references_resolve_locally() {
    let config = Config::from_yaml(CONFIG).unwrap();

    temp_env::with_vars(
        [
            ("TUGBOAT_IT_DATABASE_URL", Some("postgres://db/app")),
            ("TUGBOAT_IT_LOG_LEVEL", None),
        ],
        || {
            let single = single_image(&config).unwrap();
            assert_eq!(single.env["APP_ENV"], "production");
            assert_eq!(single.env["DATABASE_URL"], "postgres://db/app");
            assert_eq!(single.env["LOG_LEVEL"], "info");
        },
    );
}

#[test]
fn unset_reference_without_default_fails() {
    let config = Config::from_yaml(CONFIG).unwrap();

    temp_env::with_var_unset("TUGBOAT_IT_DATABASE_URL", || {
        let err = single_image(&config).unwrap_err();
        assert!(err.to_string().contains("TUGBOAT_IT_DATABASE_URL"));
    });
}

#[test]
fn unknown_keys_are_rejected() {
    let yaml = format!("{CONFIG}\nhealthcheck: true\n");
    assert!(matches!(
        Config::from_yaml(&yaml),
        Err(Error::Yaml(_)) | Err(Error::InvalidConfig(_))
    ));
}

#[test]
fn generated_template_is_a_valid_config() {
    let dir = tempfile::tempdir().unwrap();
    init_project(dir.path(), false).unwrap();

    assert!(Config::discover(dir.path()).is_ok());
}
