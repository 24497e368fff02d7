//! Risk scoring - likelihood x severity on a 5x5 matrix

use serde::{Deserialize, Serialize};

use crate::core::error::{HaccpError, Result};

/// Lowest valid rating
pub const MIN_RATING: i64 = 1;
/// Highest valid rating
pub const MAX_RATING: i64 = 5;

/// Risk level assessment
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    /// Map a risk score to its level. Upper bounds are inclusive.
    pub fn from_score(score: u8) -> Self {
        match score {
            0..=4 => RiskLevel::Low,
            5..=9 => RiskLevel::Medium,
            10..=15 => RiskLevel::High,
            _ => RiskLevel::Critical,
        }
    }

    pub fn all() -> [RiskLevel; 4] {
        [
            RiskLevel::Low,
            RiskLevel::Medium,
            RiskLevel::High,
            RiskLevel::Critical,
        ]
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RiskLevel::Low => write!(f, "low"),
            RiskLevel::Medium => write!(f, "medium"),
            RiskLevel::High => write!(f, "high"),
            RiskLevel::Critical => write!(f, "critical"),
        }
    }
}

impl std::str::FromStr for RiskLevel {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(RiskLevel::Low),
            "medium" => Ok(RiskLevel::Medium),
            "high" => Ok(RiskLevel::High),
            "critical" => Ok(RiskLevel::Critical),
            _ => Err(format!("Unknown risk level: {}", s)),
        }
    }
}

/// Output of [`score`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskAssessment {
    /// 1..=25
    pub risk_score: u8,
    pub risk_level: RiskLevel,
}

/// Score a hazard from its likelihood and severity ratings.
///
/// Both ratings must lie in 1..=5; anything else is a `Range` error.
pub fn score(likelihood: i64, severity: i64) -> Result<RiskAssessment> {
    let likelihood = check_rating("likelihood", likelihood)?;
    let severity = check_rating("severity", severity)?;
    let risk_score = likelihood * severity;

    Ok(RiskAssessment {
        risk_score,
        risk_level: RiskLevel::from_score(risk_score),
    })
}

fn check_rating(field: &'static str, value: i64) -> Result<u8> {
    if (MIN_RATING..=MAX_RATING).contains(&value) {
        Ok(value as u8)
    } else {
        Err(HaccpError::Range { field, value })
    }
}
