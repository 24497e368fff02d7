//! Monitoring and verification log entries recorded against a CCP

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::identity::{EntityId, EntityPrefix};

/// One monitoring reading taken at a CCP
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringLog {
    pub id: EntityId,

    pub ccp_id: EntityId,

    pub measured_value: f64,

    /// When the reading was taken
    pub timestamp: DateTime<Utc>,

    /// Derived by the critical-limit check; never user-supplied
    pub is_within_limits: bool,

    /// Required when the reading is out of spec
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub corrective_action_description: Option<String>,

    pub recorded_by: String,
}

impl MonitoringLog {
    pub fn new(
        ccp_id: EntityId,
        measured_value: f64,
        timestamp: DateTime<Utc>,
        is_within_limits: bool,
        recorded_by: String,
    ) -> Self {
        Self {
            id: EntityId::new(EntityPrefix::Mon),
            ccp_id,
            measured_value,
            timestamp,
            is_within_limits,
            corrective_action_description: None,
            recorded_by,
        }
    }
}

/// One verification activity performed on a CCP
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationLog {
    pub id: EntityId,

    pub ccp_id: EntityId,

    pub verification_date: DateTime<Utc>,

    /// Free-text outcome (e.g. "records reviewed, thermometer calibrated")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,

    pub is_compliant: bool,

    /// Due date computed from this verification
    pub next_due_at: DateTime<Utc>,

    pub verified_by: String,
}
