// Per-host SSH connection built on russh

use crate::config::HostConfig;
use crate::error::{FleetmuxError, Result};
use crate::fleet::models::{HostSnapshot, UnitRecord};
use crate::fleet::parser::parse_unit_records;
use chrono::{DateTime, Utc};
use russh::client::{self, Handle};
use russh::keys::ssh_key;
use russh::keys::{load_secret_key, PrivateKeyWithHashAlg};
use russh::ChannelMsg;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};

/// Remote command listing user units that carry a tag marker
const LIST_UNITS_CMD: &str =
    r#"systemctl list-units --user --all --full --no-pager | grep "Tags \[.*\]""#;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Accepts any server host key; fleet hosts are operator-configured
struct AcceptingHandler;

impl client::Handler for AcceptingHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        _server_public_key: &ssh_key::PublicKey,
    ) -> std::result::Result<bool, Self::Error> {
        Ok(true)
    }
}

#[derive(Default)]
struct UnitCache {
    polled_at: Option<DateTime<Utc>>,
    records: Vec<UnitRecord>,
}

/// One SSH session to a single host, shared by the poller, the unit
/// controller and any interactive channels opened against the host.
pub struct HostConnection {
    config: HostConfig,
    handle: Mutex<Option<Handle<AcceptingHandler>>>,
    connected: AtomicBool,
    cache: RwLock<UnitCache>,
}

impl HostConnection {
    pub fn new(config: HostConfig) -> Self {
        Self {
            config,
            handle: Mutex::new(None),
            connected: AtomicBool::new(false),
            cache: RwLock::new(UnitCache::default()),
        }
    }

    pub fn hostname(&self) -> &str {
        &self.config.hostname
    }

    pub fn username(&self) -> &str {
        &self.config.username
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Attempt to connect and authenticate.
    ///
    /// Failures degrade this host to disconnected and are logged; they
    /// never surface to the caller, so the rest of the fleet keeps
    /// working. On success an initial unit poll is performed.
    pub async fn connect(&self) {
        match self.try_connect().await {
            Ok(handle) => {
                *self.handle.lock().await = Some(handle);
                self.connected.store(true, Ordering::SeqCst);
                tracing::info!(
                    "Connected to {}@{}",
                    self.config.username,
                    self.config.hostname
                );
                if let Err(e) = self.refresh_units().await {
                    tracing::warn!(
                        "Initial unit poll on '{}' failed: {}",
                        self.config.hostname,
                        e
                    );
                }
            }
            Err(e) => {
                self.connected.store(false, Ordering::SeqCst);
                tracing::warn!("Connecting to '{}' failed: {}", self.config.hostname, e);
            }
        }
    }

    async fn try_connect(&self) -> Result<Handle<AcceptingHandler>> {
        let ssh_config = Arc::new(client::Config::default());
        let addr = (self.config.hostname.as_str(), self.config.port);

        let mut handle = tokio::time::timeout(
            CONNECT_TIMEOUT,
            client::connect(ssh_config, addr, AcceptingHandler),
        )
        .await
        .map_err(|_| self.connection_error("connect timed out"))?
        .map_err(|e| self.connection_error(&e.to_string()))?;

        // Password wins when both appear; config validation rejects that
        // combination before we ever get here.
        let authenticated = if let Some(password) = &self.config.password {
            handle
                .authenticate_password(self.config.username.as_str(), password.as_str())
                .await
                .map_err(|e| self.connection_error(&e.to_string()))?
                .success()
        } else if let Some(key_path) = &self.config.ssh_key_path {
            let key = load_secret_key(key_path, None)
                .map_err(|e| self.connection_error(&format!("loading ssh key: {}", e)))?;
            let hash_alg = handle
                .best_supported_rsa_hash()
                .await
                .map_err(|e| self.connection_error(&e.to_string()))?
                .flatten();
            handle
                .authenticate_publickey(
                    self.config.username.as_str(),
                    PrivateKeyWithHashAlg::new(Arc::new(key), hash_alg),
                )
                .await
                .map_err(|e| self.connection_error(&e.to_string()))?
                .success()
        } else {
            return Err(FleetmuxError::Config(format!(
                "host '{}' has no usable credential",
                self.config.hostname
            ))
            .into());
        };

        if !authenticated {
            return Err(self.connection_error("authentication rejected").into());
        }

        Ok(handle)
    }

    fn connection_error(&self, message: &str) -> FleetmuxError {
        FleetmuxError::Connection {
            host: self.config.hostname.clone(),
            message: message.to_string(),
        }
    }

    async fn mark_disconnected(&self) {
        self.connected.store(false, Ordering::SeqCst);
        self.handle.lock().await.take();
    }

    /// Run a non-interactive remote command and collect its stdout.
    ///
    /// Fails fast without side effects when the host is disconnected; a
    /// transport failure mid-command degrades the host to disconnected.
    pub async fn execute_command(&self, cmd: &str) -> Result<String> {
        if !self.is_connected() {
            return Err(self.connection_error("not connected").into());
        }

        match self.run_command(cmd).await {
            Ok(output) => Ok(output),
            Err(e) => {
                self.mark_disconnected().await;
                Err(e)
            }
        }
    }

    async fn run_command(&self, cmd: &str) -> Result<String> {
        let mut channel = {
            let guard = self.handle.lock().await;
            let handle = guard
                .as_ref()
                .ok_or_else(|| self.connection_error("not connected"))?;
            handle
                .channel_open_session()
                .await
                .map_err(|e| self.connection_error(&e.to_string()))?
        };

        channel
            .exec(true, cmd)
            .await
            .map_err(|e| self.connection_error(&e.to_string()))?;

        let mut stdout = Vec::new();
        while let Some(msg) = channel.wait().await {
            match msg {
                ChannelMsg::Data { ref data } => stdout.extend_from_slice(&data[..]),
                ChannelMsg::ExtendedData { ref data, .. } => {
                    tracing::debug!(
                        "Command on '{}' wrote {} stderr bytes",
                        self.config.hostname,
                        data.len()
                    );
                }
                ChannelMsg::ExitStatus { exit_status } => {
                    if exit_status != 0 {
                        tracing::debug!(
                            "Command on '{}' exited with status {}",
                            self.config.hostname,
                            exit_status
                        );
                    }
                }
                _ => {}
            }
        }

        Ok(String::from_utf8_lossy(&stdout).to_string())
    }

    /// Allocate a PTY-backed shell channel sized to the given geometry.
    ///
    /// Starts no command; the caller drives the shell.
    pub async fn open_pty_channel(
        &self,
        rows: u32,
        cols: u32,
    ) -> Result<russh::Channel<client::Msg>> {
        if !self.is_connected() {
            return Err(self.connection_error("not connected").into());
        }

        match self.request_pty_shell(rows, cols).await {
            Ok(channel) => Ok(channel),
            Err(e) => {
                self.mark_disconnected().await;
                Err(e)
            }
        }
    }

    async fn request_pty_shell(&self, rows: u32, cols: u32) -> Result<russh::Channel<client::Msg>> {
        let mut channel = {
            let guard = self.handle.lock().await;
            let handle = guard
                .as_ref()
                .ok_or_else(|| self.connection_error("not connected"))?;
            handle
                .channel_open_session()
                .await
                .map_err(|e| self.connection_error(&e.to_string()))?
        };

        channel
            .request_pty(false, "xterm-256color", cols, rows, 0, 0, &[])
            .await
            .map_err(|e| self.connection_error(&e.to_string()))?;
        channel
            .request_shell(false)
            .await
            .map_err(|e| self.connection_error(&e.to_string()))?;

        Ok(channel)
    }

    /// Poll the host's unit list and atomically replace the cached
    /// records. On failure the previous snapshot stays untouched.
    pub async fn refresh_units(&self) -> Result<()> {
        let raw = self.execute_command(LIST_UNITS_CMD).await?;
        let records = parse_unit_records(&raw, &self.config.hostname);
        tracing::debug!(
            "Host '{}' reported {} units",
            self.config.hostname,
            records.len()
        );

        let mut cache = self.cache.write().await;
        cache.records = records;
        cache.polled_at = Some(Utc::now());
        Ok(())
    }

    /// Current cached unit records (full snapshot, never a partial mix)
    pub async fn units(&self) -> Vec<UnitRecord> {
        self.cache.read().await.records.clone()
    }

    pub async fn snapshot(&self) -> HostSnapshot {
        let cache = self.cache.read().await;
        HostSnapshot {
            hostname: self.config.hostname.clone(),
            username: self.config.username.clone(),
            connected: self.is_connected(),
            polled_at: cache.polled_at,
            units: cache.records.clone(),
        }
    }
}
