//! # ExternalSecret Status
//!
//! Status types for tracking sync state and conditions.

use serde::{Deserialize, Serialize};

/// Status of the ExternalSecret resource
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, Default, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExternalSecretStatus {
    /// Current phase of the last reconcile attempt
    /// Values: Pending, Fetching, Extracting, Templating, Writing, Ready, Failed
    #[serde(default)]
    pub phase: Option<String>,
    /// Conditions represent the latest available observations
    /// Types: Ready, SecretSynced
    #[serde(default)]
    pub conditions: Vec<Condition>,
    /// Generation of the spec that produced this status
    #[serde(default)]
    pub observed_generation: Option<i64>,
    /// Time of the last successful write or confirmed no-op (RFC3339)
    #[serde(default)]
    pub last_sync_time: Option<String>,
    /// Keys currently managed on the target Secret
    #[serde(default)]
    pub synced_keys: Vec<String>,
}

/// Condition represents a condition of a resource
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Type of condition
    pub r#type: String,
    /// Status of the condition (True, False, Unknown)
    pub status: String,
    /// Last transition time
    #[serde(default)]
    pub last_transition_time: Option<String>,
    /// Reason for the condition
    #[serde(default)]
    pub reason: Option<String>,
    /// Human-readable message
    #[serde(default)]
    pub message: Option<String>,
}

impl ExternalSecretStatus {
    /// Find a condition by type
    #[must_use]
    pub fn condition(&self, condition_type: &str) -> Option<&Condition> {
        self.conditions.iter().find(|c| c.r#type == condition_type)
    }

    /// Whether the Ready condition is True
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.condition("Ready").is_some_and(|c| c.status == "True")
    }
}
