// ABOUTME: In-memory Toolchain standing in for git and docker on the local machine.
// ABOUTME: `save_image` writes a small archive so the transfer stage has a real file.

use async_trait::async_trait;
use std::path::Path;
use std::sync::Mutex;
use tugboat::toolchain::{BuildPlan, Revision, Result, Toolchain, ToolchainError};
use tugboat::types::ImageRef;

pub struct FakeToolchain {
    pub clean: bool,
    pub branch: String,
    pub build_fails: bool,
    pub builds: Mutex<Vec<BuildPlan>>,
    pub saves: Mutex<Vec<ImageRef>>,
}

impl Default for FakeToolchain {
    fn default() -> Self {
        Self {
            clean: true,
            branch: "main".to_string(),
            build_fails: false,
            builds: Mutex::new(Vec::new()),
            saves: Mutex::new(Vec::new()),
        }
    }
}

impl FakeToolchain {
    pub fn builds(&self) -> Vec<BuildPlan> {
        self.builds.lock().unwrap().clone()
    }

    pub fn saves(&self) -> Vec<ImageRef> {
        self.saves.lock().unwrap().clone()
    }
}

#[async_trait]
impl Toolchain for FakeToolchain {
    async fn worktree_clean(&self) -> Result<bool> {
        Ok(self.clean)
    }

    async fn current_branch(&self) -> Result<String> {
        Ok(self.branch.clone())
    }

    async fn head_revision(&self) -> Revision {
        Revision {
            id: "abc1234".to_string(),
            summary: "Add health endpoint".to_string(),
        }
    }

    async fn build_image(&self, plan: &BuildPlan) -> Result<()> {
        self.builds.lock().unwrap().push(plan.clone());
        if self.build_fails {
            return Err(ToolchainError::Failed {
                command: "docker build".to_string(),
                status: "exit status: 1".to_string(),
                detail: String::new(),
            });
        }
        Ok(())
    }

    async fn save_image(&self, image: &ImageRef, archive: &Path) -> Result<()> {
        self.saves.lock().unwrap().push(image.clone());
        std::fs::write(archive, b"fake image archive").map_err(|source| ToolchainError::Spawn {
            program: "docker".to_string(),
            source,
        })
    }
}
