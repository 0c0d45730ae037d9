// Fleet registry and the long-lived poll loop

use crate::config::HostConfig;
use crate::fleet::connection::HostConnection;
use crate::fleet::models::HostSnapshot;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// The full set of configured hosts, in configuration order.
///
/// Each host is held behind an `Arc` so the poller, the unit controller
/// and interactive channels all share the same SSH session.
pub struct Fleet {
    hosts: Vec<Arc<HostConnection>>,
}

impl Fleet {
    pub fn from_config(hosts: &[HostConfig]) -> Self {
        Self {
            hosts: hosts
                .iter()
                .cloned()
                .map(|host| Arc::new(HostConnection::new(host)))
                .collect(),
        }
    }

    pub fn hosts(&self) -> &[Arc<HostConnection>] {
        &self.hosts
    }

    pub fn host(&self, hostname: &str) -> Option<Arc<HostConnection>> {
        self.hosts
            .iter()
            .find(|host| host.hostname() == hostname)
            .cloned()
    }

    /// Initial connection attempts for every host, run concurrently.
    /// Unreachable hosts stay disconnected; nothing fails here.
    pub async fn connect_all(&self) {
        futures::future::join_all(self.hosts.iter().map(|host| host.connect())).await;
    }

    /// One full poll cycle over the fleet.
    ///
    /// Hosts that dropped off get one reconnect attempt (a successful
    /// connect performs its own initial poll). A failure on one host is
    /// logged and never blocks the remaining hosts.
    pub async fn poll_all(&self) {
        for host in &self.hosts {
            if !host.is_connected() {
                host.connect().await;
                continue;
            }
            if let Err(e) = host.refresh_units().await {
                tracing::warn!("Polling '{}' failed: {}", host.hostname(), e);
            }
        }
    }

    pub async fn snapshots(&self) -> Vec<HostSnapshot> {
        let mut snapshots = Vec::with_capacity(self.hosts.len());
        for host in &self.hosts {
            snapshots.push(host.snapshot().await);
        }
        snapshots
    }
}

/// Spawn the fleet poll loop.
///
/// `interval` of `None` means poll once and stop; otherwise the loop
/// sleeps between cycles and runs until the process exits. Polls for a
/// given host never overlap: the loop awaits each cycle in full.
pub fn spawn_poller(fleet: Arc<Fleet>, interval: Option<Duration>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            fleet.poll_all().await;

            match interval {
                Some(wait) => tokio::time::sleep(wait).await,
                None => break,
            }
        }
        tracing::info!("Fleet poller stopped");
    })
}
