// ABOUTME: Configuration types and parsing for tugboat.yml.
// ABOUTME: Groups ssh, image, remote, deploy, and optional compose settings.

mod env_value;
mod init;

pub use env_value::{EnvValue, resolve_env_map};
pub use init::{DOCKERFILE_TEMPLATE, Scaffold, init_project, template_yaml};

use crate::error::{Error, Result};
use crate::ssh::{HostKeyPolicy, Secret, SessionConfig};
use crate::types::{ContainerName, ImageRef};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILENAME: &str = "tugboat.yml";
pub const CONFIG_FILENAME_ALT: &str = "tugboat.yaml";
pub const CONFIG_FILENAME_DIR: &str = ".tugboat/config.yml";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub ssh: SshConfig,
    pub image: ImageConfig,
    #[serde(default)]
    pub remote: RemoteConfig,
    #[serde(default)]
    pub deploy: DeploySettings,
    /// Presence switches the pipeline to multi-service mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compose: Option<ComposeConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SshConfig {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub user: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<Secret>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_key_path: Option<PathBuf>,
    /// Only consulted for key authentication.
    #[serde(default)]
    pub host_key_policy: HostKeyPolicy,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub known_hosts_path: Option<PathBuf>,
    #[serde(default = "default_connect_timeout", with = "humantime_serde")]
    pub connect_timeout: Duration,
    #[serde(default = "default_command_timeout", with = "humantime_serde")]
    pub command_timeout: Duration,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ImageConfig {
    /// Repository the fresh tag is applied to.
    pub name: ImageRef,
    #[serde(default = "default_dockerfile")]
    pub dockerfile: PathBuf,
    #[serde(default = "default_context")]
    pub context: PathBuf,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RemoteConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_name: Option<ContainerName>,
    #[serde(default)]
    pub ports: Vec<String>,
    #[serde(default)]
    pub environment: BTreeMap<String, EnvValue>,
    #[serde(default)]
    pub volumes: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeploySettings {
    #[serde(default = "default_trigger_branch")]
    pub trigger_branch: String,
    #[serde(default = "default_archive_file")]
    pub archive_file: PathBuf,
    #[serde(default = "default_remote_temp_dir")]
    pub remote_temp_dir: String,
    #[serde(default = "default_history_file")]
    pub history_file: PathBuf,
}

impl Default for DeploySettings {
    fn default() -> Self {
        Self {
            trigger_branch: default_trigger_branch(),
            archive_file: default_archive_file(),
            remote_temp_dir: default_remote_temp_dir(),
            history_file: default_history_file(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ComposeConfig {
    #[serde(default = "default_compose_file")]
    pub file: PathBuf,
    pub service: String,
    #[serde(default)]
    pub env_files: Vec<PathBuf>,
    #[serde(default)]
    pub extra_files: Vec<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_env: Option<String>,
}

fn default_port() -> u16 {
    22
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(300)
}

fn default_command_timeout() -> Duration {
    Duration::from_secs(1800)
}

fn default_dockerfile() -> PathBuf {
    PathBuf::from("Dockerfile")
}

fn default_context() -> PathBuf {
    PathBuf::from(".")
}

fn default_trigger_branch() -> String {
    "main".to_string()
}

fn default_archive_file() -> PathBuf {
    PathBuf::from("deploy.tar")
}

fn default_remote_temp_dir() -> String {
    "/tmp".to_string()
}

fn default_history_file() -> PathBuf {
    PathBuf::from(".tugboat/history.json")
}

fn default_compose_file() -> PathBuf {
    PathBuf::from("docker-compose.yml")
}

impl Config {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Load the first config file found in `dir`.
    pub fn discover(dir: &Path) -> Result<Self> {
        let candidates = [
            dir.join(CONFIG_FILENAME),
            dir.join(CONFIG_FILENAME_ALT),
            dir.join(CONFIG_FILENAME_DIR),
        ];

        for path in &candidates {
            if path.exists() {
                tracing::debug!(path = %path.display(), "loading configuration");
                return Self::load(path);
            }
        }

        Err(Error::ConfigNotFound(dir.to_path_buf()))
    }

    /// Reject settings that would only fail halfway through a deployment.
    pub fn validate(&self) -> Result<()> {
        if self.ssh.host.trim().is_empty() {
            return Err(Error::InvalidConfig("ssh.host is required".into()));
        }
        if self.ssh.user.trim().is_empty() {
            return Err(Error::InvalidConfig("ssh.user is required".into()));
        }
        if self.ssh.password.is_none() && self.ssh.private_key_path.is_none() {
            return Err(Error::InvalidConfig(
                "ssh needs either `password` or `private_key_path`".into(),
            ));
        }
        if self.image.name.tag().is_some() {
            return Err(Error::InvalidConfig(format!(
                "image.name `{}` must not carry a tag; tags are generated per deployment",
                self.image.name
            )));
        }
        if self.deploy.remote_temp_dir.trim().is_empty() {
            return Err(Error::InvalidConfig("deploy.remote_temp_dir is required".into()));
        }
        // Remote paths are shell-quoted, so the remote shell never expands `~`.
        if self.deploy.remote_temp_dir.starts_with('~') {
            return Err(Error::InvalidConfig(format!(
                "deploy.remote_temp_dir `{}` must not start with `~`; use an absolute path",
                self.deploy.remote_temp_dir
            )));
        }
        if self.deploy.archive_file.file_name().is_none() {
            return Err(Error::InvalidConfig(format!(
                "deploy.archive_file `{}` must name a file",
                self.deploy.archive_file.display()
            )));
        }

        match &self.compose {
            Some(compose) => {
                if compose.service.trim().is_empty() {
                    return Err(Error::InvalidConfig("compose.service is required".into()));
                }
                if compose.file.file_name().is_none() {
                    return Err(Error::InvalidConfig("compose.file must name a file".into()));
                }
            }
            None => {
                if self.remote.container_name.is_none() {
                    return Err(Error::InvalidConfig(
                        "remote.container_name is required unless a compose section is present"
                            .into(),
                    ));
                }
            }
        }

        Ok(())
    }

    /// Connection settings for the remote host.
    pub fn session_config(&self) -> SessionConfig {
        let ssh = &self.ssh;
        SessionConfig {
            host: ssh.host.clone(),
            port: ssh.port,
            user: ssh.user.clone(),
            password: ssh.password.clone(),
            key_path: ssh.private_key_path.clone(),
            host_key_policy: ssh.host_key_policy,
            known_hosts_path: ssh.known_hosts_path.clone(),
            connect_timeout: ssh.connect_timeout,
            command_timeout: ssh.command_timeout,
        }
    }

    /// YAML rendering with the password masked.
    pub fn to_redacted_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }
}
