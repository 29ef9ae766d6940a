// ABOUTME: Single-image versus multi-service deployment, decided once from config.
// ABOUTME: Every stage that behaves differently matches on DeploymentMode.

use crate::config::{Config, resolve_env_map};
use crate::history::ServiceDescriptor;
use crate::types::{ContainerName, ImageRef};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::error::DeployError;

/// The one container managed in single-image mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SingleImage {
    pub container: ContainerName,
    pub ports: Vec<String>,
    /// Resolved on the deploying machine.
    pub env: BTreeMap<String, String>,
    pub volumes: Vec<String>,
}

/// Local side of a compose deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposeTarget {
    pub descriptor: PathBuf,
    pub service: String,
    pub env_files: Vec<PathBuf>,
    pub extra_files: Vec<PathBuf>,
    pub target_env: Option<String>,
}

impl ComposeTarget {
    /// Files shipped ahead of the archive, descriptor first.
    pub fn uploads(&self) -> impl Iterator<Item = &Path> {
        std::iter::once(self.descriptor.as_path())
            .chain(self.env_files.iter().map(PathBuf::as_path))
            .chain(self.extra_files.iter().map(PathBuf::as_path))
    }

    /// What the history record remembers about this target.
    pub fn descriptor_record(&self) -> ServiceDescriptor {
        ServiceDescriptor {
            service: self.service.clone(),
            file: file_name(&self.descriptor),
            env_files: self.env_files.iter().map(|p| file_name(p)).collect(),
            extra_files: self.extra_files.iter().map(|p| file_name(p)).collect(),
            target_env: self.target_env.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeploymentMode {
    SingleImage(SingleImage),
    MultiService(ComposeTarget),
}

impl DeploymentMode {
    pub fn label(&self) -> &'static str {
        match self {
            DeploymentMode::SingleImage(_) => "single-image",
            DeploymentMode::MultiService(_) => "multi-service",
        }
    }
}

/// Everything a deployment needs, extracted from config and resolved.
#[derive(Debug, Clone)]
pub struct DeployPlan {
    /// Repository the fresh tag is applied to.
    pub image: ImageRef,
    pub dockerfile: PathBuf,
    pub context: PathBuf,
    pub trigger_branch: String,
    pub archive: PathBuf,
    pub remote_dir: String,
    pub mode: DeploymentMode,
}

impl DeployPlan {
    pub fn from_config(config: &Config) -> Result<Self, DeployError> {
        let mode = match &config.compose {
            Some(compose) => DeploymentMode::MultiService(ComposeTarget {
                descriptor: compose.file.clone(),
                service: compose.service.clone(),
                env_files: compose.env_files.clone(),
                extra_files: compose.extra_files.clone(),
                target_env: compose.target_env.clone(),
            }),
            None => DeploymentMode::SingleImage(single_image(config)?),
        };

        Ok(Self {
            image: config.image.name.clone(),
            dockerfile: config.image.dockerfile.clone(),
            context: config.image.context.clone(),
            trigger_branch: config.deploy.trigger_branch.clone(),
            archive: config.deploy.archive_file.clone(),
            remote_dir: config.deploy.remote_temp_dir.clone(),
            mode,
        })
    }

    /// Absolute remote path for a local file shipped to the remote directory.
    pub fn remote_path(&self, local: &Path) -> String {
        remote_path(&self.remote_dir, &file_name(local))
    }

    pub fn archive_name(&self) -> String {
        file_name(&self.archive)
    }
}

/// Container settings from config, with environment references resolved.
///
/// Used by rollback as well: port, env, and volume mappings always come from
/// the current configuration.
pub fn single_image(config: &Config) -> Result<SingleImage, DeployError> {
    let container = config.remote.container_name.clone().ok_or_else(|| {
        DeployError::Config("remote.container_name is required for single-image deployments".into())
    })?;
    let env = resolve_env_map(&config.remote.environment)
        .map_err(|e| DeployError::Config(e.to_string()))?;

    Ok(SingleImage {
        container,
        ports: config.remote.ports.clone(),
        env,
        volumes: config.remote.volumes.clone(),
    })
}

pub(crate) fn remote_path(dir: &str, name: &str) -> String {
    let dir = dir.trim_end_matches('/');
    if dir.is_empty() {
        format!("/{name}")
    } else {
        format!("{dir}/{name}")
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compose() -> ComposeTarget {
        ComposeTarget {
            descriptor: PathBuf::from("deploy/docker-compose.yml"),
            service: "web".into(),
            env_files: vec![PathBuf::from(".env.production")],
            extra_files: vec![PathBuf::from("nginx/nginx.conf")],
            target_env: Some("production".into()),
        }
    }

    #[test]
    fn mode_labels_name_the_variant() {
        assert_eq!(DeploymentMode::MultiService(compose()).label(), "multi-service");
    }

    #[test]
    fn descriptor_ships_before_auxiliary_files() {
        let target = compose();
        let uploads: Vec<_> = target.uploads().collect();
        assert_eq!(
            uploads,
            [
                Path::new("deploy/docker-compose.yml"),
                Path::new(".env.production"),
                Path::new("nginx/nginx.conf"),
            ]
        );
    }

    #[test]
    fn descriptor_record_keeps_remote_file_names() {
        let record = compose().descriptor_record();
        assert_eq!(record.file, "docker-compose.yml");
        assert_eq!(record.extra_files, ["nginx.conf"]);
        assert_eq!(record.target_env.as_deref(), Some("production"));
    }

    #[test]
    fn remote_paths_join_cleanly() {
        assert_eq!(remote_path("/tmp/", "deploy.tar"), "/tmp/deploy.tar");
        assert_eq!(remote_path("/srv/app", "deploy.tar"), "/srv/app/deploy.tar");
        assert_eq!(remote_path("/", "deploy.tar"), "/deploy.tar");
    }
}
