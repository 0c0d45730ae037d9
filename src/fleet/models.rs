// Fleet data models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Activation state of a systemd unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActiveState {
    Active,
    Inactive,
    Failed,
    Activating,
    Deactivating,
}

impl ActiveState {
    /// Parse the systemctl ACTIVE column; unknown states yield None
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "active" => Some(ActiveState::Active),
            "inactive" => Some(ActiveState::Inactive),
            "failed" => Some(ActiveState::Failed),
            "activating" => Some(ActiveState::Activating),
            "deactivating" => Some(ActiveState::Deactivating),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ActiveState::Active => "active",
            ActiveState::Inactive => "inactive",
            ActiveState::Failed => "failed",
            ActiveState::Activating => "activating",
            ActiveState::Deactivating => "deactivating",
        }
    }
}

/// Supervisor verbs exposed per unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitAction {
    Start,
    Stop,
    Restart,
}

impl UnitAction {
    /// The systemctl verb for this action
    pub fn verb(&self) -> &'static str {
        match self {
            UnitAction::Start => "start",
            UnitAction::Stop => "stop",
            UnitAction::Restart => "restart",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "start" => Some(UnitAction::Start),
            "stop" => Some(UnitAction::Stop),
            "restart" => Some(UnitAction::Restart),
            _ => None,
        }
    }
}

/// UnitRecord represents one managed service unit on a host.
///
/// Records are immutable once constructed; a host's whole record list is
/// replaced atomically on each successful poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitRecord {
    /// Unit name with the trailing ".service" marker stripped
    pub unit: String,
    pub load_state: String,
    pub active_state: ActiveState,
    pub sub_state: String,
    pub description: String,
    pub tags: Vec<String>,
    /// Host the record was observed on
    pub hostname: String,
}

impl UnitRecord {
    /// Returns true if the unit is currently active/running
    pub fn is_active(&self) -> bool {
        self.active_state == ActiveState::Active
    }

    /// Returns true if the unit failed
    pub fn is_failed(&self) -> bool {
        self.active_state == ActiveState::Failed
    }

    /// Returns true if the unit is in a transitioning state
    pub fn is_transitioning(&self) -> bool {
        matches!(
            self.active_state,
            ActiveState::Activating | ActiveState::Deactivating
        )
    }

    /// Returns the unit's current state as a user-friendly string
    pub fn status_text(&self) -> &'static str {
        match self.active_state {
            ActiveState::Active => "Running",
            ActiveState::Inactive => "Stopped",
            ActiveState::Failed => "Failed",
            ActiveState::Activating => "Starting",
            ActiveState::Deactivating => "Stopping",
        }
    }
}

/// Serialization view of one host for the observer layer
#[derive(Debug, Clone, Serialize)]
pub struct HostSnapshot {
    pub hostname: String,
    pub username: String,
    pub connected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub polled_at: Option<DateTime<Utc>>,
    pub units: Vec<UnitRecord>,
}
