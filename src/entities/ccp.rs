//! CCP entity - Critical Control Point created from a hazard classified as `ccp`

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::entity::Entity;
use crate::core::identity::{EntityId, EntityPrefix};
use crate::engine::limits::CriticalLimits;
use crate::engine::schedule::Cadence;

/// CCP lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[derive(Default)]
pub enum CcpStatus {
    #[default]
    Active,
    Inactive,
    Suspended,
}

impl std::fmt::Display for CcpStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CcpStatus::Active => write!(f, "active"),
            CcpStatus::Inactive => write!(f, "inactive"),
            CcpStatus::Suspended => write!(f, "suspended"),
        }
    }
}

impl std::str::FromStr for CcpStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(CcpStatus::Active),
            "inactive" => Ok(CcpStatus::Inactive),
            "suspended" => Ok(CcpStatus::Suspended),
            _ => Err(format!(
                "Invalid CCP status: {}. Use active, inactive, or suspended",
                s
            )),
        }
    }
}

/// How the CCP is monitored
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MonitoringPlan {
    /// e.g. "every batch", "continuous"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency: Option<String>,

    /// e.g. "probe thermometer at core"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
}

/// How and how often the CCP is verified
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VerificationPlan {
    #[serde(default)]
    pub cadence: Cadence,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
}

/// A Critical Control Point
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ccp {
    /// Unique identifier
    pub id: EntityId,

    /// Sequential number, unique within the product
    pub ccp_number: u32,

    /// Hazard whose classification created this CCP
    pub hazard_id: EntityId,

    /// Step the hazard belongs to
    pub step_id: EntityId,

    #[serde(default)]
    pub status: CcpStatus,

    pub critical_limits: CriticalLimits,

    #[serde(default)]
    pub monitoring: MonitoringPlan,

    #[serde(default)]
    pub verification: VerificationPlan,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_verified_at: Option<DateTime<Utc>>,

    /// When the next verification falls due
    pub next_verification_due: DateTime<Utc>,

    /// Reason given for the last manual status change
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_note: Option<String>,

    pub created: DateTime<Utc>,
}

impl Entity for Ccp {
    const PREFIX: EntityPrefix = EntityPrefix::Ccp;

    fn id(&self) -> &EntityId {
        &self.id
    }

    fn title(&self) -> String {
        self.label()
    }

    fn created(&self) -> DateTime<Utc> {
        self.created
    }
}

impl Ccp {
    /// Display label, e.g. "CCP 2"
    pub fn label(&self) -> String {
        format!("CCP {}", self.ccp_number)
    }

    pub fn is_active(&self) -> bool {
        self.status == CcpStatus::Active
    }

    /// Active and suspended CCPs still count as open activity
    pub fn is_open(&self) -> bool {
        self.status != CcpStatus::Inactive
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_parse_and_display() {
        for status in [CcpStatus::Active, CcpStatus::Inactive, CcpStatus::Suspended] {
            assert_eq!(status.to_string().parse::<CcpStatus>().unwrap(), status);
        }
        assert!("retired".parse::<CcpStatus>().is_err());
    }

    #[test]
    fn test_ccp_yaml_shape() {
        let ccp = Ccp {
            id: EntityId::new(EntityPrefix::Ccp),
            ccp_number: 2,
            hazard_id: EntityId::new(EntityPrefix::Haz),
            step_id: EntityId::new(EntityPrefix::Step),
            status: CcpStatus::Suspended,
            critical_limits: CriticalLimits {
                min: Some(75.0),
                max: None,
                unit: Some("°C".to_string()),
            },
            monitoring: MonitoringPlan::default(),
            verification: VerificationPlan {
                cadence: Cadence::Weekly,
                method: None,
            },
            last_verified_at: None,
            next_verification_due: Utc::now(),
            status_note: None,
            created: Utc::now(),
        };

        let yaml = serde_yml::to_string(&ccp).unwrap();
        assert!(yaml.contains("status: suspended"));
        assert!(yaml.contains("cadence: weekly"));
        assert!(!yaml.contains("max:"));
        assert_eq!(ccp.label(), "CCP 2");
        assert!(ccp.is_open());
        assert!(!ccp.is_active());
    }
}
