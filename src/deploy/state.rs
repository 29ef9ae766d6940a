// ABOUTME: Deployment state marker types for the type state pattern.
// ABOUTME: Later states carry the built artifact so it cannot be missing.

use crate::toolchain::Revision;
use crate::types::ImageRef;

/// What a deployment ships: the freshly tagged image and where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub revision: Revision,
    pub image: ImageRef,
}

/// Plan resolved, nothing checked yet.
/// Available actions: `validate()`
#[derive(Debug, Clone, Copy, Default)]
pub struct Initialized;

/// Working tree clean and on the trigger branch.
/// Available actions: `build()`
#[derive(Debug, Clone)]
pub struct Validated {
    pub(crate) revision: Revision,
}

/// Image built locally under a fresh tag.
/// Available actions: `archive()`
#[derive(Debug, Clone)]
pub struct Built(pub(crate) Artifact);

/// Image saved to the local archive file.
/// Available actions: `transfer()`
#[derive(Debug, Clone)]
pub struct Archived(pub(crate) Artifact);

/// Archive (and compose files) copied to the remote directory.
/// Available actions: `load()`
#[derive(Debug, Clone)]
pub struct Transferred(pub(crate) Artifact);

/// Image present in the remote image store.
/// Available actions: `swap()`
#[derive(Debug, Clone)]
pub struct Loaded(pub(crate) Artifact);

/// New container or services running.
/// Available actions: `record()`
#[derive(Debug, Clone)]
pub struct Swapped(pub(crate) Artifact);

/// States that hold a built artifact.
pub trait CarriesArtifact {
    fn artifact(&self) -> &Artifact;
}

impl CarriesArtifact for Built {
    fn artifact(&self) -> &Artifact {
        &self.0
    }
}

impl CarriesArtifact for Archived {
    fn artifact(&self) -> &Artifact {
        &self.0
    }
}

impl CarriesArtifact for Transferred {
    fn artifact(&self) -> &Artifact {
        &self.0
    }
}

impl CarriesArtifact for Loaded {
    fn artifact(&self) -> &Artifact {
        &self.0
    }
}

impl CarriesArtifact for Swapped {
    fn artifact(&self) -> &Artifact {
        &self.0
    }
}
