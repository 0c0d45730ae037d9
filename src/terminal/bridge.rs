// Per-client bridge owning at most one interactive channel

use crate::events::SessionEvent;
use crate::terminal::channel::CommandChannel;
use crate::terminal::link::PtyOpener;
use tokio::sync::mpsc;

pub const DEFAULT_ROWS: u32 = 24;
pub const DEFAULT_COLS: u32 = 80;

/// Owns a client's single interactive channel and its sticky terminal
/// geometry; the geometry survives channel recreation.
pub struct SessionBridge {
    rows: u32,
    cols: u32,
    channel: Option<CommandChannel>,
    events: mpsc::UnboundedSender<SessionEvent>,
}

impl SessionBridge {
    pub fn new(events: mpsc::UnboundedSender<SessionEvent>) -> Self {
        Self {
            rows: DEFAULT_ROWS,
            cols: DEFAULT_COLS,
            channel: None,
            events,
        }
    }

    /// Open a fresh channel running the given command.
    ///
    /// Any existing channel is closed and awaited first; two channels
    /// are never alive concurrently for one bridge. A PTY-open failure
    /// is reported to the client as a finished task, never raised.
    pub async fn open_with_command(
        &mut self,
        opener: &dyn PtyOpener,
        command: &str,
        command_args: &str,
    ) {
        if let Some(existing) = self.channel.take() {
            existing.close().await;
        }

        match opener.open_pty(self.rows, self.cols).await {
            Ok(link) => {
                self.channel = Some(CommandChannel::spawn(
                    link,
                    command,
                    command_args,
                    self.rows,
                    self.cols,
                    self.events.clone(),
                ));
            }
            Err(e) => {
                tracing::warn!("Opening PTY channel failed: {}", e);
                let _ = self
                    .events
                    .send(SessionEvent::TaskFinished {
                        reason: format!("An error occurred: {}", e),
                    });
            }
        }
    }

    /// Update sticky geometry, resizing the live PTY if present.
    /// Either dimension may be omitted.
    pub fn resize(&mut self, rows: Option<u32>, cols: Option<u32>) {
        if let Some(rows) = rows {
            self.rows = rows;
        }
        if let Some(cols) = cols {
            self.cols = cols;
        }
        if let Some(channel) = &mut self.channel {
            channel.resize(self.rows, self.cols);
        }
    }

    /// Forward keyboard input to the active channel, if any
    pub fn send_input(&self, data: &[u8]) {
        if let Some(channel) = &self.channel {
            channel.send_input(data);
        }
    }

    /// Close the active channel, if any, and clear it
    pub async fn close(&mut self) {
        if let Some(channel) = self.channel.take() {
            channel.close().await;
        }
    }

    pub fn rows(&self) -> u32 {
        self.rows
    }

    pub fn cols(&self) -> u32 {
        self.cols
    }

    pub fn has_channel(&self) -> bool {
        self.channel.is_some()
    }

    #[cfg(test)]
    pub(crate) fn channel(&self) -> Option<&CommandChannel> {
        self.channel.as_ref()
    }
}
