// ABOUTME: Local subprocess collaborators: git checks, image build, image save.
// ABOUTME: Exit codes and plain stdout are the whole contract with these tools.

use crate::types::ImageRef;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use thiserror::Error;
use tokio::process::Command;

#[derive(Debug, Error)]
pub enum ToolchainError {
    #[error("failed to launch `{program}`: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[error("`{command}` exited with {status}{}", detail_suffix(.detail))]
    Failed {
        command: String,
        status: String,
        detail: String,
    },
}

fn detail_suffix(detail: &str) -> String {
    if detail.is_empty() {
        String::new()
    } else {
        format!(": {}", detail)
    }
}

pub type Result<T> = std::result::Result<T, ToolchainError>;

/// Source revision captured for the history record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Revision {
    pub id: String,
    pub summary: String,
}

impl Revision {
    pub fn unknown() -> Self {
        Self {
            id: "unknown".to_string(),
            summary: String::new(),
        }
    }
}

/// How the image for a deployment gets built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildPlan {
    /// `docker build -t <image> -f <dockerfile> <context>`
    Dockerfile {
        image: ImageRef,
        dockerfile: PathBuf,
        context: PathBuf,
    },
    /// `docker compose -f <file> build <service>` with `IMAGE_TAG` exported.
    Compose {
        image: ImageRef,
        file: PathBuf,
        service: String,
    },
}

impl BuildPlan {
    /// Image the plan produces.
    pub fn image(&self) -> &ImageRef {
        match self {
            BuildPlan::Dockerfile { image, .. } | BuildPlan::Compose { image, .. } => image,
        }
    }

    /// Arguments for the docker CLI plus extra environment.
    pub fn invocation(&self) -> (Vec<String>, Vec<(String, String)>) {
        match self {
            BuildPlan::Dockerfile {
                image,
                dockerfile,
                context,
            } => (
                vec![
                    "build".to_string(),
                    "-t".to_string(),
                    image.to_string(),
                    "-f".to_string(),
                    dockerfile.display().to_string(),
                    context.display().to_string(),
                ],
                Vec::new(),
            ),
            BuildPlan::Compose {
                image,
                file,
                service,
            } => (
                vec![
                    "compose".to_string(),
                    "-f".to_string(),
                    file.display().to_string(),
                    "build".to_string(),
                    service.clone(),
                ],
                vec![(
                    "IMAGE_TAG".to_string(),
                    image.tag().unwrap_or("latest").to_string(),
                )],
            ),
        }
    }
}

/// Local tools the deploy pipeline shells out to.
#[async_trait]
pub trait Toolchain: Send + Sync {
    /// True when the working tree has no uncommitted changes.
    async fn worktree_clean(&self) -> Result<bool>;

    /// Name of the checked-out branch.
    async fn current_branch(&self) -> Result<String>;

    /// Revision being deployed; `Revision::unknown()` when it cannot be read.
    async fn head_revision(&self) -> Revision;

    async fn build_image(&self, plan: &BuildPlan) -> Result<()>;

    /// Write `image` into a single local archive at `archive`.
    async fn save_image(&self, image: &ImageRef, archive: &Path) -> Result<()>;
}

/// `git` and `docker` binaries on the local PATH.
#[derive(Debug, Clone)]
pub struct DockerCli {
    workdir: PathBuf,
    docker: String,
    git: String,
}

impl DockerCli {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
            docker: "docker".to_string(),
            git: "git".to_string(),
        }
    }

    /// Use a different container CLI (for example `podman`).
    pub fn docker_binary(mut self, program: impl Into<String>) -> Self {
        self.docker = program.into();
        self
    }

    fn command(&self, program: &str, args: &[String]) -> Command {
        let mut command = Command::new(program);
        command.args(args).current_dir(&self.workdir);
        command
    }

    /// Run with stdio inherited, so build logs show up live.
    async fn run_visible(
        &self,
        program: &str,
        args: &[String],
        envs: &[(String, String)],
    ) -> Result<()> {
        let rendered = render(program, args);
        tracing::info!(command = %rendered, "running");

        let status = self
            .command(program, args)
            .envs(envs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .status()
            .await
            .map_err(|source| ToolchainError::Spawn {
                program: program.to_string(),
                source,
            })?;

        if status.success() {
            Ok(())
        } else {
            Err(ToolchainError::Failed {
                command: rendered,
                status: status.to_string(),
                detail: String::new(),
            })
        }
    }

    /// Run and return trimmed stdout.
    async fn run_captured(&self, program: &str, args: &[String]) -> Result<String> {
        let output = self
            .command(program, args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|source| ToolchainError::Spawn {
                program: program.to_string(),
                source,
            })?;

        if !output.status.success() {
            return Err(ToolchainError::Failed {
                command: render(program, args),
                status: output.status.to_string(),
                detail: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    async fn git(&self, args: &[&str]) -> Result<String> {
        let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
        self.run_captured(&self.git, &args).await
    }
}

fn render(program: &str, args: &[String]) -> String {
    std::iter::once(program)
        .chain(args.iter().map(String::as_str))
        .collect::<Vec<_>>()
        .join(" ")
}

#[async_trait]
impl Toolchain for DockerCli {
    async fn worktree_clean(&self) -> Result<bool> {
        Ok(self.git(&["status", "--porcelain"]).await?.is_empty())
    }

    async fn current_branch(&self) -> Result<String> {
        self.git(&["rev-parse", "--abbrev-ref", "HEAD"]).await
    }

    async fn head_revision(&self) -> Revision {
        let id = self.git(&["rev-parse", "--short", "HEAD"]).await;
        let summary = self.git(&["log", "-1", "--pretty=%s"]).await;
        match (id, summary) {
            (Ok(id), summary) => Revision {
                id,
                summary: summary.unwrap_or_default(),
            },
            (Err(e), _) => {
                tracing::warn!("cannot read git revision: {}", e);
                Revision::unknown()
            }
        }
    }

    async fn build_image(&self, plan: &BuildPlan) -> Result<()> {
        let (args, envs) = plan.invocation();
        self.run_visible(&self.docker, &args, &envs).await
    }

    async fn save_image(&self, image: &ImageRef, archive: &Path) -> Result<()> {
        let args = vec![
            "save".to_string(),
            "-o".to_string(),
            archive.display().to_string(),
            image.to_string(),
        ];
        self.run_visible(&self.docker, &args, &[]).await
    }
}
