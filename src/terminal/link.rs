// PTY transport seam and its russh adapter

use crate::error::{FleetmuxError, Result};
use crate::fleet::connection::HostConnection;
use async_trait::async_trait;
use russh::client::Msg;
use russh::ChannelMsg;

/// Something the remote side did on a live PTY channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PtyEvent {
    /// A burst of terminal output bytes
    Output(Vec<u8>),
    /// The remote command exited with the given status
    Exited(u32),
}

/// Transport-facing surface of one PTY-backed shell session.
///
/// The channel state machine drives this trait only, so it can be
/// exercised in tests without an SSH server.
#[async_trait]
pub trait PtyLink: Send {
    /// Await the next event from the remote side; `None` means the
    /// underlying channel ended.
    async fn next_event(&mut self) -> Option<PtyEvent>;

    /// Write bytes into the remote PTY
    async fn send(&mut self, data: &[u8]) -> Result<()>;

    /// Resize the remote PTY
    async fn resize(&mut self, rows: u32, cols: u32) -> Result<()>;

    /// Close the underlying channel if still open
    async fn close(&mut self) -> Result<()>;

    fn is_closed(&self) -> bool;
}

/// Allocates PTY links against some transport
#[async_trait]
pub trait PtyOpener: Send + Sync {
    async fn open_pty(&self, rows: u32, cols: u32) -> Result<Box<dyn PtyLink>>;
}

#[async_trait]
impl PtyOpener for HostConnection {
    async fn open_pty(&self, rows: u32, cols: u32) -> Result<Box<dyn PtyLink>> {
        let channel = self.open_pty_channel(rows, cols).await?;
        Ok(Box::new(SshPtyLink::new(channel)))
    }
}

/// PTY link over a russh shell channel.
///
/// The transport delivers channel messages, so readiness is event
/// driven; forwarding order and exit-status completion detection match
/// the polled variant.
pub struct SshPtyLink {
    channel: russh::Channel<Msg>,
    closed: bool,
}

impl SshPtyLink {
    pub fn new(channel: russh::Channel<Msg>) -> Self {
        Self {
            channel,
            closed: false,
        }
    }
}

#[async_trait]
impl PtyLink for SshPtyLink {
    async fn next_event(&mut self) -> Option<PtyEvent> {
        loop {
            match self.channel.wait().await {
                Some(ChannelMsg::Data { ref data }) => {
                    return Some(PtyEvent::Output(data.to_vec()))
                }
                Some(ChannelMsg::ExtendedData { ref data, .. }) => {
                    return Some(PtyEvent::Output(data.to_vec()))
                }
                Some(ChannelMsg::ExitStatus { exit_status }) => {
                    return Some(PtyEvent::Exited(exit_status))
                }
                Some(ChannelMsg::Close) => {
                    self.closed = true;
                    return None;
                }
                Some(_) => continue,
                None => {
                    self.closed = true;
                    return None;
                }
            }
        }
    }

    async fn send(&mut self, data: &[u8]) -> Result<()> {
        self.channel
            .data(data)
            .await
            .map_err(|e| FleetmuxError::Channel(e.to_string()))?;
        Ok(())
    }

    async fn resize(&mut self, rows: u32, cols: u32) -> Result<()> {
        self.channel
            .window_change(cols, rows, 0, 0)
            .await
            .map_err(|e| FleetmuxError::Channel(e.to_string()))?;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        let _ = self.channel.eof().await;
        self.channel
            .close()
            .await
            .map_err(|e| FleetmuxError::Channel(e.to_string()))?;
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}
