// Fleetmux - SSH fleet supervisor for systemd user services
// Library root

pub mod config;
pub mod error;
pub mod events;
pub mod fleet;
pub mod server;
pub mod terminal;
pub mod version;

// Test modules (only compiled during tests)
#[cfg(test)]
mod config_tests;
