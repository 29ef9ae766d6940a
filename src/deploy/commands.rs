// ABOUTME: Shell command lines issued on the remote host.
// ABOUTME: Pure string builders; every interpolated value is shell-quoted.

use crate::history::ServiceDescriptor;
use crate::types::{ContainerName, ImageRef};
use std::borrow::Cow;

use super::mode::{ComposeTarget, SingleImage, remote_path};

fn quote(value: &str) -> Cow<'_, str> {
    shell_escape::escape(value.into())
}

pub fn load_image(remote_dir: &str, archive_name: &str) -> String {
    format!(
        "cd {} && docker load -i {}",
        quote(remote_dir),
        quote(archive_name)
    )
}

/// Prints `name:tag` when the image is present, nothing otherwise.
pub fn image_visible(image: &ImageRef) -> String {
    format!(
        "docker images {} --format '{{{{.Repository}}}}:{{{{.Tag}}}}'",
        quote(&image.to_string())
    )
}

/// Prints the container name when it exists, running or not.
pub fn container_exists(name: &ContainerName) -> String {
    format!(
        "docker ps -a --filter {} --format '{{{{.Names}}}}'",
        quote(&format!("name=^{name}$"))
    )
}

pub fn stop_container(name: &ContainerName) -> String {
    format!("docker stop {}", quote(name.as_str()))
}

pub fn remove_container(name: &ContainerName) -> String {
    format!("docker rm {}", quote(name.as_str()))
}

pub fn run_container(single: &SingleImage, image: &ImageRef) -> String {
    let mut command = format!("docker run -d --name {}", quote(single.container.as_str()));
    for port in &single.ports {
        command.push_str(&format!(" -p {}", quote(port)));
    }
    for (key, value) in &single.env {
        command.push_str(&format!(" -e {}", quote(&format!("{key}={value}"))));
    }
    for volume in &single.volumes {
        command.push_str(&format!(" -v {}", quote(volume)));
    }
    command.push(' ');
    command.push_str(&quote(&image.to_string()));
    command
}

/// Remote side of a compose deployment: the shipped descriptor and env files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposeRemote {
    dir: String,
    file: String,
    service: String,
    env_files: Vec<String>,
    target_env: Option<String>,
}

impl ComposeRemote {
    pub fn for_target(remote_dir: &str, target: &ComposeTarget) -> Self {
        Self::from_descriptor(remote_dir, &target.descriptor_record())
    }

    pub fn from_descriptor(remote_dir: &str, descriptor: &ServiceDescriptor) -> Self {
        Self {
            dir: remote_dir.to_string(),
            file: descriptor.file.clone(),
            service: descriptor.service.clone(),
            env_files: descriptor.env_files.clone(),
            target_env: descriptor.target_env.clone(),
        }
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    fn compose(&self, action: &str) -> String {
        let mut command = format!("cd {} && ", quote(&self.dir));
        if let Some(target_env) = &self.target_env {
            command.push_str(&format!("TARGET_ENV={} ", quote(target_env)));
        }
        command.push_str(&format!("docker compose -f {}", quote(&self.file)));
        for env_file in &self.env_files {
            command.push_str(&format!(" --env-file {}", quote(env_file)));
        }
        command.push(' ');
        command.push_str(action);
        command
    }

    pub fn down(&self) -> String {
        self.compose("down")
    }

    pub fn up(&self) -> String {
        self.compose("up -d")
    }

    /// Rewrite the `image:` line of this service's block in the remote descriptor.
    ///
    /// Service keys are expected at two-space indentation; the block ends at
    /// the next line indented two spaces or less.
    pub fn pin_image(&self, image: &ImageRef) -> String {
        let script = format!(
            "/^[[:space:]]{{2}}{service}:[[:space:]]*$/,/^[[:space:]]{{0,2}}[^[:space:]#]/ \
             s#^([[:space:]]+image:[[:space:]]*).*$#\\1{image}#",
            service = self.service,
        );
        format!(
            "sed -i -E {} {}",
            quote(&script),
            quote(&remote_path(&self.dir, &self.file))
        )
    }
}
