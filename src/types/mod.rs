// ABOUTME: Validated domain types shared by the deploy pipeline.
// ABOUTME: Image references, remote container names, and history version identifiers.

mod container_name;
mod image_ref;
mod version_id;

pub use container_name::{ContainerName, ContainerNameError};
pub use image_ref::{ImageRef, ParseImageRefError};
pub use version_id::VersionId;
