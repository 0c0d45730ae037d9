// Unit control operations

use crate::error::Result;
use crate::fleet::models::UnitAction;
use crate::fleet::poller::Fleet;
use std::sync::Arc;

/// Issues start/stop/restart commands against fleet hosts.
///
/// Every call is routed by explicit (hostname, unit) data; failures are
/// logged and surface as an absent result, never as a fault that aborts
/// the caller.
pub struct UnitController {
    fleet: Arc<Fleet>,
}

impl UnitController {
    pub fn new(fleet: Arc<Fleet>) -> Self {
        Self { fleet }
    }

    /// Start a unit on the given host
    pub async fn start(&self, hostname: &str, unit: &str) -> Option<String> {
        self.manage(hostname, unit, UnitAction::Start).await
    }

    /// Stop a unit on the given host
    pub async fn stop(&self, hostname: &str, unit: &str) -> Option<String> {
        self.manage(hostname, unit, UnitAction::Stop).await
    }

    /// Restart a unit on the given host
    pub async fn restart(&self, hostname: &str, unit: &str) -> Option<String> {
        self.manage(hostname, unit, UnitAction::Restart).await
    }

    /// Apply an already-parsed action
    pub async fn apply(&self, hostname: &str, unit: &str, action: UnitAction) -> Option<String> {
        self.manage(hostname, unit, action).await
    }

    async fn manage(&self, hostname: &str, unit: &str, action: UnitAction) -> Option<String> {
        if let Err(e) = validate_unit_name(unit) {
            tracing::warn!("Rejecting {} of '{}': {}", action.verb(), unit, e);
            return None;
        }

        let Some(host) = self.fleet.host(hostname) else {
            tracing::warn!(
                "Rejecting {} of '{}': unknown host '{}'",
                action.verb(),
                unit,
                hostname
            );
            return None;
        };

        let cmd = format!("systemctl --user {} {}", action.verb(), unit);
        match host.execute_command(&cmd).await {
            Ok(output) => {
                // refresh so observers see the new state promptly
                if let Err(e) = host.refresh_units().await {
                    tracing::warn!("Post-{} poll of '{}' failed: {}", action.verb(), hostname, e);
                }
                Some(output)
            }
            Err(e) => {
                tracing::warn!(
                    "{} of '{}' on '{}' failed: {}",
                    action.verb(),
                    unit,
                    hostname,
                    e
                );
                None
            }
        }
    }
}

/// Validate unit name format and prevent injection
pub(crate) fn validate_unit_name(unit: &str) -> Result<()> {
    if unit.is_empty() {
        return Err(anyhow::anyhow!("Unit name cannot be empty"));
    }

    if unit.len() > 256 {
        return Err(anyhow::anyhow!("Unit name too long"));
    }

    if unit.contains("..") {
        return Err(anyhow::anyhow!("Invalid unit name format"));
    }

    if !unit
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '@' | ':'))
    {
        return Err(anyhow::anyhow!("Unit name contains invalid characters"));
    }

    Ok(())
}
