// Wire events exchanged with interactive clients

use serde::{Deserialize, Serialize};

/// Events a connected client sends over the message transport.
///
/// Connect and disconnect are not wire events; they are the connection
/// lifecycle itself and are handled by the session registry.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ClientEvent {
    /// Run a command on the named host inside a fresh PTY channel
    StartCommand {
        hostname: String,
        /// Accepted for wire compatibility; host resolution is by hostname
        #[serde(default)]
        username: String,
        cmd: String,
        #[serde(default)]
        cmd_args: String,
    },

    /// Keyboard input destined for the live PTY
    PtyInput { input: String },

    /// New terminal geometry; either dimension may be omitted
    Resize {
        #[serde(default)]
        rows: Option<u32>,
        #[serde(default)]
        cols: Option<u32>,
    },
}

/// Events emitted back to the client that owns a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionEvent {
    /// A burst of terminal output
    #[serde(rename = "pty-output")]
    PtyOutput { output: String },

    /// The remote command reached a terminal state; reason is empty on
    /// clean completion, populated on cancellation or error
    TaskFinished { reason: String },

    /// The underlying PTY channel was torn down
    ChannelClosed,
}
