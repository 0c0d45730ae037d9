// Interactive command channel state machine

use crate::events::SessionEvent;
use crate::terminal::link::{PtyEvent, PtyLink};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Lifecycle of one interactive channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Opening,
    Running,
    Finished,
    Closed,
}

impl ChannelState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ChannelState::Finished | ChannelState::Closed)
    }
}

/// Delay before the command is sent, letting the shell emit its banner
const SETTLE_DELAY: Duration = Duration::from_millis(100);
/// Idle window that ends banner draining
const DRAIN_IDLE: Duration = Duration::from_millis(20);

const CANCELLED_REASON: &str = "task was cancelled";

enum LinkCommand {
    Input(Vec<u8>),
    Resize { rows: u32, cols: u32 },
}

/// One PTY-backed remote command execution.
///
/// A background forwarding task owns the PTY link and is the only
/// writer of the channel state; input and resize requests reach it
/// through a command queue. `close` cancels the task, awaits it, takes
/// the link back and tears it down.
pub struct CommandChannel {
    rows: u32,
    cols: u32,
    cmd_tx: mpsc::UnboundedSender<LinkCommand>,
    cancel: CancellationToken,
    state_tx: Arc<watch::Sender<ChannelState>>,
    task: Option<JoinHandle<Box<dyn PtyLink>>>,
    events: mpsc::UnboundedSender<SessionEvent>,
}

impl CommandChannel {
    /// Spawn the forwarding task over an opened PTY link; the command is
    /// sent once the shell has settled.
    pub fn spawn(
        link: Box<dyn PtyLink>,
        command: &str,
        command_args: &str,
        rows: u32,
        cols: u32,
        events: mpsc::UnboundedSender<SessionEvent>,
    ) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let (state_tx, _) = watch::channel(ChannelState::Opening);
        let state_tx = Arc::new(state_tx);

        // wrapped so an interrupt to the shell still exits cleanly
        let command_line = format!("trap 'exit' INT; {} {}; exit\n", command, command_args);

        let task = tokio::spawn(run_channel(
            link,
            command_line,
            cmd_rx,
            cancel.clone(),
            Arc::clone(&state_tx),
            events.clone(),
        ));

        Self {
            rows,
            cols,
            cmd_tx,
            cancel,
            state_tx,
            task: Some(task),
            events,
        }
    }

    pub fn state(&self) -> ChannelState {
        *self.state_tx.borrow()
    }

    /// Watch receiver observing state transitions
    pub fn state_watch(&self) -> watch::Receiver<ChannelState> {
        self.state_tx.subscribe()
    }

    pub fn rows(&self) -> u32 {
        self.rows
    }

    pub fn cols(&self) -> u32 {
        self.cols
    }

    /// Queue keyboard input for the remote PTY; silently dropped once
    /// the channel reached a terminal state.
    pub fn send_input(&self, data: &[u8]) {
        if self.state().is_terminal() {
            return;
        }
        let _ = self.cmd_tx.send(LinkCommand::Input(data.to_vec()));
    }

    /// Update stored geometry and resize the live PTY
    pub fn resize(&mut self, rows: u32, cols: u32) {
        self.rows = rows;
        self.cols = cols;
        if self.state().is_terminal() {
            return;
        }
        let _ = self.cmd_tx.send(LinkCommand::Resize { rows, cols });
    }

    /// Cancel the forwarding task, await its termination, then tear
    /// down the underlying session and emit the closed event.
    pub async fn close(mut self) {
        self.cancel.cancel();

        if let Some(task) = self.task.take() {
            match task.await {
                Ok(mut link) => {
                    if !link.is_closed() {
                        if let Err(e) = link.close().await {
                            tracing::debug!("Closing PTY link failed: {}", e);
                        }
                        let _ = self.events.send(SessionEvent::ChannelClosed);
                    }
                }
                Err(e) => {
                    tracing::warn!("Channel task join failed: {}", e);
                }
            }
        }

        // a naturally finished channel keeps its terminal state
        self.state_tx.send_if_modified(|state| {
            if *state == ChannelState::Finished {
                false
            } else {
                *state = ChannelState::Closed;
                true
            }
        });
    }
}

/// Forwarding task body. Returns the link so `close` can tear it down
/// after the task has fully stopped.
async fn run_channel(
    mut link: Box<dyn PtyLink>,
    command_line: String,
    mut cmd_rx: mpsc::UnboundedReceiver<LinkCommand>,
    cancel: CancellationToken,
    state_tx: Arc<watch::Sender<ChannelState>>,
    events: mpsc::UnboundedSender<SessionEvent>,
) -> Box<dyn PtyLink> {
    // Opening: discard shell banner/prompt noise so it is never
    // forwarded as command output.
    tokio::select! {
        _ = cancel.cancelled() => {
            let _ = events
                .send(SessionEvent::TaskFinished {
                    reason: CANCELLED_REASON.to_string(),
                });
            return link;
        }
        _ = tokio::time::sleep(SETTLE_DELAY) => {}
    }
    drain_banner(link.as_mut()).await;

    if link.is_closed() {
        state_tx.send_replace(ChannelState::Finished);
        let _ = events
            .send(SessionEvent::TaskFinished {
                reason: "channel closed before command start".to_string(),
            });
        return link;
    }

    let reason = match link.send(command_line.as_bytes()).await {
        Err(e) => format!("An error occurred: {}", e),
        Ok(()) => {
            state_tx.send_replace(ChannelState::Running);
            forward_output(link.as_mut(), &mut cmd_rx, &cancel, &events).await
        }
    };

    // On cancellation the state stays with `close`, which moves the
    // channel to Closed once teardown is done.
    if reason != CANCELLED_REASON {
        state_tx.send_replace(ChannelState::Finished);
    }
    let _ = events.send(SessionEvent::TaskFinished { reason });
    link
}

/// Forward remote output as events until completion or cancellation;
/// serve input and resize requests from the command queue in between.
async fn forward_output(
    link: &mut dyn PtyLink,
    cmd_rx: &mut mpsc::UnboundedReceiver<LinkCommand>,
    cancel: &CancellationToken,
    events: &mpsc::UnboundedSender<SessionEvent>,
) -> String {
    loop {
        tokio::select! {
            // cancellation wins over ready output so nothing is
            // forwarded past a close
            biased;

            _ = cancel.cancelled() => {
                return CANCELLED_REASON.to_string();
            }
            Some(command) = cmd_rx.recv() => {
                match command {
                    LinkCommand::Input(data) => {
                        if let Err(e) = link.send(&data).await {
                            tracing::debug!("Dropping input for unwritable channel: {}", e);
                        }
                    }
                    LinkCommand::Resize { rows, cols } => {
                        if let Err(e) = link.resize(rows, cols).await {
                            tracing::debug!("PTY resize failed: {}", e);
                        }
                    }
                }
            }
            event = link.next_event() => {
                match event {
                    Some(PtyEvent::Output(bytes)) => {
                        let output = String::from_utf8_lossy(&bytes).to_string();
                        if events.send(SessionEvent::PtyOutput { output }).is_err() {
                            // client is gone; nothing left to forward to
                            return String::new();
                        }
                    }
                    Some(PtyEvent::Exited(status)) => {
                        tracing::debug!("Remote command exited with status {}", status);
                        return String::new();
                    }
                    None => return String::new(),
                }
            }
        }
    }
}

/// Read and discard output until the link goes idle
async fn drain_banner(link: &mut dyn PtyLink) {
    loop {
        match tokio::time::timeout(DRAIN_IDLE, link.next_event()).await {
            Ok(Some(PtyEvent::Output(bytes))) => {
                tracing::debug!("Discarded {} bytes of shell banner", bytes.len());
            }
            Ok(Some(PtyEvent::Exited(_))) | Ok(None) => return,
            Err(_) => return,
        }
    }
}
