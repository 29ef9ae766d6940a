// ABOUTME: SSH session management using russh.
// ABOUTME: Resolves credentials, verifies hosts per policy, runs commands and uploads.

use super::error::{Error, Result};
use super::sink::ChannelSink;
use crate::transfer::{self, TransferJob, TransferOptions, TransferProgress, TransferReport};
use russh::client::{self, Config, Handle};
use russh::keys::known_hosts::{
    check_known_hosts, check_known_hosts_path, learn_known_hosts, learn_known_hosts_path,
};
use russh::keys::{PrivateKeyWithHashAlg, decode_secret_key, ssh_key};
use russh::{Channel, ChannelMsg, Disconnect};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;

const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(30);

/// A password that never shows up in logs or rendered config.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(********)")
    }
}

impl Serialize for Secret {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str("********")
    }
}

/// How the server's host key is checked for key-authenticated sessions.
///
/// Password sessions never verify the host; this only applies to key auth.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HostKeyPolicy {
    /// Host must already be in known_hosts.
    Verify,
    /// Unknown hosts are learned into known_hosts; changed keys are rejected.
    #[default]
    TrustFirstUse,
    /// Any host key is accepted.
    AcceptAny,
}

/// The single credential a session authenticates with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credential {
    Password(Secret),
    PrivateKey(PathBuf),
}

/// Configuration for establishing an SSH session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Remote host to connect to.
    pub host: String,
    /// SSH port (default: 22).
    pub port: u16,
    /// Username for authentication.
    pub user: String,
    /// Password; wins over `key_path` when both are set.
    pub password: Option<Secret>,
    /// Path to a private key file.
    pub key_path: Option<PathBuf>,
    /// Host verification for key-authenticated sessions.
    pub host_key_policy: HostKeyPolicy,
    /// Optional path to known_hosts file.
    /// If None, uses the default ~/.ssh/known_hosts.
    pub known_hosts_path: Option<PathBuf>,
    /// Bound on dialing plus handshake; also the idle limit of the connection.
    pub connect_timeout: Duration,
    /// Bound on a single remote command (default: 30 minutes).
    pub command_timeout: Duration,
}

impl SessionConfig {
    pub fn new(host: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: 22,
            user: user.into(),
            password: None,
            key_path: None,
            host_key_policy: HostKeyPolicy::default(),
            known_hosts_path: None,
            connect_timeout: Duration::from_secs(300),
            command_timeout: Duration::from_secs(1800),
        }
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(Secret::new(password));
        self
    }

    pub fn key_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.key_path = Some(path.into());
        self
    }

    pub fn host_key_policy(mut self, policy: HostKeyPolicy) -> Self {
        self.host_key_policy = policy;
        self
    }

    pub fn known_hosts_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.known_hosts_path = Some(path.into());
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    /// Pick the credential to use. Password takes precedence over a key.
    pub fn credential(&self) -> Result<Credential> {
        if let Some(password) = &self.password {
            return Ok(Credential::Password(password.clone()));
        }
        if let Some(path) = &self.key_path {
            return Ok(Credential::PrivateKey(expand_home(path)));
        }
        Err(Error::AuthConfigMissing)
    }

    /// Host verification actually applied for `credential`.
    pub fn effective_host_key_policy(&self, credential: &Credential) -> HostKeyPolicy {
        match credential {
            Credential::Password(_) => HostKeyPolicy::AcceptAny,
            Credential::PrivateKey(_) => self.host_key_policy,
        }
    }
}

fn expand_home(path: &Path) -> PathBuf {
    match (path.strip_prefix("~"), std::env::var_os("HOME")) {
        (Ok(rest), Some(home)) => PathBuf::from(home).join(rest),
        _ => path.to_path_buf(),
    }
}

/// How a remote command ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitStatus {
    Code(u32),
    Signal(String),
}

impl ExitStatus {
    pub fn success(&self) -> bool {
        matches!(self, ExitStatus::Code(0))
    }
}

impl fmt::Display for ExitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitStatus::Code(code) => write!(f, "exit status {}", code),
            ExitStatus::Signal(signal) => write!(f, "killed by signal {}", signal),
        }
    }
}

/// Outcome of one remote command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResult {
    pub status: ExitStatus,
    /// Combined stdout and stderr, trailing whitespace trimmed. `None` when
    /// the output was streamed to the local console instead.
    pub output: Option<String>,
}

impl CommandResult {
    pub fn success(&self) -> bool {
        self.status.success()
    }

    /// Turn a non-zero exit into `RemoteCommandFailed`.
    pub fn check(self, command: &str) -> Result<Option<String>> {
        if self.success() {
            return Ok(self.output);
        }
        let mut exit_info = self.status.to_string();
        if let Some(output) = self.output.as_deref().filter(|o| !o.is_empty()) {
            exit_info.push_str(": ");
            exit_info.push_str(output);
        }
        Err(Error::RemoteCommandFailed {
            command: command.to_string(),
            exit_info,
        })
    }
}

/// SSH client handler for russh.
pub(crate) struct SshHandler {
    host: String,
    port: u16,
    policy: HostKeyPolicy,
    known_hosts_path: Option<PathBuf>,
}

impl client::Handler for SshHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &ssh_key::PublicKey,
    ) -> std::result::Result<bool, Self::Error> {
        if self.policy == HostKeyPolicy::AcceptAny {
            tracing::debug!("accepting host key for {}:{} without verification", self.host, self.port);
            return Ok(true);
        }

        let check_result = match &self.known_hosts_path {
            Some(path) => check_known_hosts_path(&self.host, self.port, server_public_key, path),
            None => check_known_hosts(&self.host, self.port, server_public_key),
        };

        match check_result {
            Ok(true) => Ok(true),
            Ok(false) if self.policy == HostKeyPolicy::TrustFirstUse => {
                tracing::warn!(
                    "Trust-On-First-Use: accepting unknown host key for {}:{}",
                    self.host,
                    self.port
                );
                let learn_result = match &self.known_hosts_path {
                    Some(path) => {
                        learn_known_hosts_path(&self.host, self.port, server_public_key, path)
                    }
                    None => learn_known_hosts(&self.host, self.port, server_public_key),
                };
                if let Err(e) = learn_result {
                    tracing::warn!("Failed to save host key to known_hosts: {}", e);
                }
                Ok(true)
            }
            Ok(false) => {
                tracing::warn!("host {}:{} is not in known_hosts", self.host, self.port);
                Ok(false)
            }
            Err(russh::keys::Error::KeyChanged { .. }) => {
                tracing::warn!("host key for {}:{} has changed", self.host, self.port);
                Ok(false)
            }
            Err(e) => {
                tracing::warn!("known_hosts check failed: {}", e);
                Ok(self.policy == HostKeyPolicy::TrustFirstUse)
            }
        }
    }
}

/// Authentication material loaded from a `Credential`.
enum AuthMethod {
    Password(Secret),
    KeyFile(Arc<ssh_key::PrivateKey>),
}

impl AuthMethod {
    async fn load(credential: Credential) -> Result<Self> {
        match credential {
            Credential::Password(secret) => Ok(AuthMethod::Password(secret)),
            Credential::PrivateKey(path) => {
                let pem = tokio::fs::read_to_string(&path).await.map_err(|e| {
                    Error::KeyUnreadable {
                        path: path.clone(),
                        reason: e.to_string(),
                    }
                })?;
                let key = decode_secret_key(&pem, None).map_err(|e| Error::KeyUnparseable {
                    path,
                    reason: e.to_string(),
                })?;
                Ok(AuthMethod::KeyFile(Arc::new(key)))
            }
        }
    }
}

/// Where remote output goes while a command runs.
enum OutputSink {
    /// Wired to the local stdout/stderr as it arrives.
    Live,
    /// Buffered, stdout and stderr interleaved.
    Combined(Vec<u8>),
}

impl OutputSink {
    async fn stdout(&mut self, data: &[u8]) -> std::io::Result<()> {
        match self {
            OutputSink::Live => tokio::io::stdout().write_all(data).await,
            OutputSink::Combined(buf) => {
                buf.extend_from_slice(data);
                Ok(())
            }
        }
    }

    async fn stderr(&mut self, data: &[u8]) -> std::io::Result<()> {
        match self {
            OutputSink::Live => tokio::io::stderr().write_all(data).await,
            OutputSink::Combined(buf) => {
                buf.extend_from_slice(data);
                Ok(())
            }
        }
    }

    async fn flush(&mut self) -> std::io::Result<()> {
        if let OutputSink::Live = self {
            tokio::io::stdout().flush().await?;
            tokio::io::stderr().flush().await?;
        }
        Ok(())
    }

    fn into_output(self) -> Option<String> {
        match self {
            OutputSink::Live => None,
            OutputSink::Combined(buf) => Some(String::from_utf8_lossy(&buf).trim_end().to_string()),
        }
    }
}

/// An authenticated SSH connection. Every command or upload runs on its own
/// channel multiplexed over this connection.
pub struct Session {
    config: SessionConfig,
    handle: Handle<SshHandler>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("config", &self.config)
            .field("handle", &"<russh::Handle>")
            .finish()
    }
}

impl Session {
    /// Connect to the remote host and authenticate.
    pub async fn connect(config: SessionConfig) -> Result<Self> {
        let credential = config.credential()?;
        let policy = config.effective_host_key_policy(&credential);
        let auth_method = AuthMethod::load(credential).await?;

        let russh_config = Config {
            inactivity_timeout: Some(config.connect_timeout),
            keepalive_interval: Some(KEEPALIVE_INTERVAL),
            ..Default::default()
        };

        let handler = SshHandler {
            host: config.host.clone(),
            port: config.port,
            policy,
            known_hosts_path: config.known_hosts_path.clone(),
        };

        let connecting = client::connect(
            Arc::new(russh_config),
            (config.host.as_str(), config.port),
            handler,
        );

        let mut handle = match tokio::time::timeout(config.connect_timeout, connecting).await {
            Ok(Ok(handle)) => handle,
            Ok(Err(e)) => {
                return Err(if e.to_string().contains("Connection refused") {
                    Error::ConnectFailed(format!(
                        "connection refused to {}:{}",
                        config.host, config.port
                    ))
                } else {
                    Error::ConnectFailed(e.to_string())
                });
            }
            Err(_) => {
                return Err(Error::ConnectFailed(format!(
                    "timed out after {:?} connecting to {}:{}",
                    config.connect_timeout, config.host, config.port
                )));
            }
        };

        if !Self::authenticate(&mut handle, &config.user, auth_method).await? {
            return Err(Error::AuthenticationFailed(config.user.clone()));
        }

        tracing::debug!(host = %config.host, port = config.port, user = %config.user, "SSH session established");
        Ok(Self { config, handle })
    }

    async fn authenticate(
        handle: &mut Handle<SshHandler>,
        user: &str,
        auth_method: AuthMethod,
    ) -> Result<bool> {
        match auth_method {
            AuthMethod::Password(secret) => {
                let result = handle
                    .authenticate_password(user, secret.expose())
                    .await
                    .map_err(Error::Protocol)?;
                Ok(result.success())
            }
            AuthMethod::KeyFile(key) => {
                let hash_alg = handle
                    .best_supported_rsa_hash()
                    .await
                    .map_err(Error::Protocol)?
                    .flatten();

                let result = handle
                    .authenticate_publickey(user, PrivateKeyWithHashAlg::new(key, hash_alg))
                    .await
                    .map_err(Error::Protocol)?;

                Ok(result.success())
            }
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Run a command with its output streamed to the local console.
    pub async fn run(&self, command: &str) -> Result<CommandResult> {
        self.execute(command, OutputSink::Live).await
    }

    /// Run a command and return its combined output.
    pub async fn run_captured(&self, command: &str) -> Result<CommandResult> {
        self.execute(command, OutputSink::Combined(Vec::new())).await
    }

    /// Upload one file over a fresh channel running the scp sink.
    pub async fn upload(
        &self,
        job: &TransferJob,
        options: &TransferOptions,
        on_progress: &mut (dyn FnMut(TransferProgress) + Send),
    ) -> Result<TransferReport> {
        let channel = self.open_channel().await?;
        let command = transfer::sink_command(job.remote_path());
        tracing::debug!(%command, local = %job.local_path().display(), size = job.size(), "starting upload");

        let mut sink = ChannelSink::new(channel);
        let result = match sink.start(&command).await {
            Ok(()) => transfer::push(&mut sink, job, options, on_progress)
                .await
                .map_err(Error::from),
            Err(e) => Err(e),
        };
        sink.close().await;
        result
    }

    async fn open_channel(&self) -> Result<Channel<client::Msg>> {
        self.handle
            .channel_open_session()
            .await
            .map_err(|e| Error::ChannelFailed(e.to_string()))
    }

    async fn execute(&self, command: &str, mut sink: OutputSink) -> Result<CommandResult> {
        tracing::debug!(command, "executing remote command");
        let mut channel = self.open_channel().await?;

        let timeout = self.config.command_timeout;
        let outcome =
            match tokio::time::timeout(timeout, Self::drive(&mut channel, command, &mut sink)).await
            {
                Ok(outcome) => outcome,
                Err(_) => Err(Error::CommandTimeout(timeout)),
            };
        let _ = channel.close().await;

        let status = outcome?;
        tracing::debug!(command, %status, "remote command finished");
        Ok(CommandResult {
            status,
            output: sink.into_output(),
        })
    }

    async fn drive(
        channel: &mut Channel<client::Msg>,
        command: &str,
        sink: &mut OutputSink,
    ) -> Result<ExitStatus> {
        channel
            .exec(true, command)
            .await
            .map_err(|e| Error::ChannelFailed(format!("failed to exec command: {}", e)))?;

        let mut status = None;
        let mut got_eof = false;

        loop {
            match channel.wait().await {
                Some(ChannelMsg::Data { data }) => sink.stdout(&data).await?,
                Some(ChannelMsg::ExtendedData { data, ext: 1 }) => sink.stderr(&data).await?,
                Some(ChannelMsg::ExitStatus { exit_status }) => {
                    status = Some(ExitStatus::Code(exit_status));
                    if got_eof {
                        break;
                    }
                }
                Some(ChannelMsg::ExitSignal { signal_name, .. }) => {
                    status = Some(ExitStatus::Signal(format!("{:?}", signal_name)));
                    if got_eof {
                        break;
                    }
                }
                Some(ChannelMsg::Eof) => {
                    got_eof = true;
                    if status.is_some() {
                        break;
                    }
                }
                Some(ChannelMsg::Close) | None => break,
                Some(_) => {}
            }
        }

        sink.flush().await?;

        // No exit status means the channel died underneath us.
        status.ok_or(Error::ChannelClosed)
    }

    /// Disconnect the session.
    pub async fn disconnect(self) -> Result<()> {
        self.handle
            .disconnect(Disconnect::ByApplication, "", "en")
            .await
            .map_err(Error::Protocol)?;
        Ok(())
    }
}
