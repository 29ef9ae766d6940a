// ABOUTME: Project scaffolding for `tugboat init`.
// ABOUTME: Writes a commented tugboat.yml and a starter Dockerfile.

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

use super::CONFIG_FILENAME;

pub const DOCKERFILE_TEMPLATE: &str = r#"FROM alpine:3.20
WORKDIR /app
COPY . .
EXPOSE 80
CMD ["./start.sh"]
"#;

/// Commented starter configuration.
pub fn template_yaml() -> &'static str {
    r#"# tugboat deployment configuration
ssh:
  host: server.example.com
  port: 22
  user: deploy
  # Either a password or a private key. A password wins when both are set,
  # and password sessions do not verify the host key.
  private_key_path: ~/.ssh/id_ed25519
  # password: change-me
  # verify | trust-first-use | accept-any (key authentication only)
  host_key_policy: trust-first-use
  connect_timeout: 5m

image:
  name: my-app
  dockerfile: Dockerfile
  context: .

remote:
  container_name: my-app
  ports:
    - "80:80"
  environment:
    APP_ENV: production
    # DATABASE_URL:
    #   env: DATABASE_URL
  volumes: []

deploy:
  trigger_branch: main
  archive_file: deploy.tar
  remote_temp_dir: /tmp        # absolute path on the remote host
  history_file: .tugboat/history.json

# Uncomment to deploy through docker compose instead of a single container.
# compose:
#   file: docker-compose.yml
#   service: web
#   env_files: [.env.production]
#   extra_files: []
#   target_env: production
"#
}

/// Files written by [`init_project`].
#[derive(Debug, Default)]
pub struct Scaffold {
    pub written: Vec<PathBuf>,
    pub skipped: Vec<PathBuf>,
}

/// Write the config template (and a Dockerfile when none exists) into `dir`.
pub fn init_project(dir: &Path, force: bool) -> Result<Scaffold> {
    let config_path = dir.join(CONFIG_FILENAME);

    if config_path.exists() && !force {
        return Err(Error::AlreadyExists(config_path));
    }

    let mut scaffold = Scaffold::default();
    std::fs::write(&config_path, template_yaml())?;
    scaffold.written.push(config_path);

    let dockerfile = dir.join("Dockerfile");
    if dockerfile.exists() {
        scaffold.skipped.push(dockerfile);
    } else {
        std::fs::write(&dockerfile, DOCKERFILE_TEMPLATE)?;
        scaffold.written.push(dockerfile);
    }

    Ok(scaffold)
}
