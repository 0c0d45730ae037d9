// Interactive terminal bridging module

pub mod bridge;
pub mod channel;
pub mod link;
pub mod registry;

#[cfg(test)]
mod tests;

pub use bridge::SessionBridge;
pub use channel::{ChannelState, CommandChannel};
pub use link::{PtyEvent, PtyLink, PtyOpener, SshPtyLink};
pub use registry::SessionRegistry;
