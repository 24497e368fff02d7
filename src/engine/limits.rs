//! Critical-limit evaluation for CCP monitoring readings

use serde::{Deserialize, Serialize};

use crate::core::error::{HaccpError, Result};

/// Compliance status of a single reading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplianceStatus {
    WithinLimits,
    OutOfSpec,
}

impl ComplianceStatus {
    pub fn is_within_limits(&self) -> bool {
        *self == ComplianceStatus::WithinLimits
    }

    /// Out-of-spec readings must be logged with a corrective action
    pub fn requires_corrective_action(&self) -> bool {
        *self == ComplianceStatus::OutOfSpec
    }
}

impl std::fmt::Display for ComplianceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ComplianceStatus::WithinLimits => write!(f, "within_limits"),
            ComplianceStatus::OutOfSpec => write!(f, "out_of_spec"),
        }
    }
}

/// Critical limit range of a CCP. At least one bound must be present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CriticalLimits {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,

    /// Unit of measure (e.g. "°C", "pH", "min")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

impl CriticalLimits {
    pub fn new(min: Option<f64>, max: Option<f64>, unit: Option<String>) -> Self {
        Self { min, max, unit }
    }

    /// Check that the range is usable for a CCP
    pub fn validate(&self) -> Result<()> {
        if self.min.is_none() && self.max.is_none() {
            return Err(HaccpError::Configuration(
                "critical limits need a minimum, a maximum, or both".to_string(),
            ));
        }
        for bound in [self.min, self.max].into_iter().flatten() {
            if !bound.is_finite() {
                return Err(HaccpError::Configuration(format!(
                    "critical limit {} is not a finite number",
                    bound
                )));
            }
        }
        if let (Some(min), Some(max)) = (self.min, self.max) {
            if min > max {
                return Err(HaccpError::Configuration(format!(
                    "critical limit minimum {} is above maximum {}",
                    min, max
                )));
            }
        }
        Ok(())
    }

    /// Evaluate a reading against this range
    pub fn evaluate(&self, reading: f64) -> Result<ComplianceStatus> {
        evaluate(reading, self.min, self.max)
    }

    /// Human-readable range, e.g. "2 – 10 °C" or "≥ 75 °C"
    pub fn describe(&self) -> String {
        let unit = self
            .unit
            .as_deref()
            .map(|u| format!(" {}", u))
            .unwrap_or_default();
        match (self.min, self.max) {
            (Some(min), Some(max)) => format!("{} – {}{}", min, max, unit),
            (Some(min), None) => format!("≥ {}{}", min, unit),
            (None, Some(max)) => format!("≤ {}{}", max, unit),
            (None, None) => "(no limits)".to_string(),
        }
    }
}

/// Compare a reading with an optional closed range.
///
/// Readings equal to a bound are compliant. Both bounds absent is a
/// configuration error; a non-finite reading is a validation error.
pub fn evaluate(reading: f64, limit_min: Option<f64>, limit_max: Option<f64>) -> Result<ComplianceStatus> {
    if limit_min.is_none() && limit_max.is_none() {
        return Err(HaccpError::Configuration(
            "cannot evaluate a reading without any critical limit".to_string(),
        ));
    }
    if !reading.is_finite() {
        return Err(HaccpError::Validation(format!(
            "measured value {} is not a finite number",
            reading
        )));
    }

    let above_min = limit_min.map_or(true, |min| reading >= min);
    let below_max = limit_max.map_or(true, |max| reading <= max);

    if above_min && below_max {
        Ok(ComplianceStatus::WithinLimits)
    } else {
        Ok(ComplianceStatus::OutOfSpec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds_are_inclusive() {
        assert_eq!(evaluate(2.0, Some(2.0), Some(10.0)).unwrap(), ComplianceStatus::WithinLimits);
        assert_eq!(evaluate(10.0, Some(2.0), Some(10.0)).unwrap(), ComplianceStatus::WithinLimits);
    }

    #[test]
    fn test_one_unit_outside_is_out_of_spec() {
        assert_eq!(evaluate(1.0, Some(2.0), Some(10.0)).unwrap(), ComplianceStatus::OutOfSpec);
        assert_eq!(evaluate(11.0, Some(2.0), Some(10.0)).unwrap(), ComplianceStatus::OutOfSpec);
        assert_eq!(evaluate(10.1, Some(2.0), Some(10.0)).unwrap(), ComplianceStatus::OutOfSpec);
    }

    #[test]
    fn test_single_sided_limits() {
        // Cooking: core temperature at least 75 °C
        assert!(evaluate(75.0, Some(75.0), None).unwrap().is_within_limits());
        assert!(evaluate(74.9, Some(75.0), None).unwrap().requires_corrective_action());
        // Chilling: at most 5 °C
        assert!(evaluate(-18.0, None, Some(5.0)).unwrap().is_within_limits());
        assert!(!evaluate(5.5, None, Some(5.0)).unwrap().is_within_limits());
    }

    #[test]
    fn test_missing_limits_is_configuration_error() {
        assert!(matches!(
            evaluate(4.0, None, None),
            Err(HaccpError::Configuration(_))
        ));
    }

    #[test]
    fn test_nan_reading_rejected() {
        assert!(matches!(
            evaluate(f64::NAN, Some(1.0), None),
            Err(HaccpError::Validation(_))
        ));
    }

    #[test]
    fn test_validate_limits() {
        assert!(CriticalLimits::new(Some(2.0), Some(10.0), None).validate().is_ok());
        assert!(CriticalLimits::new(None, Some(10.0), None).validate().is_ok());
        assert!(matches!(
            CriticalLimits::new(None, None, Some("°C".to_string())).validate(),
            Err(HaccpError::Configuration(_))
        ));
        assert!(matches!(
            CriticalLimits::new(Some(10.0), Some(2.0), None).validate(),
            Err(HaccpError::Configuration(_))
        ));
    }

    #[test]
    fn test_describe() {
        let limits = CriticalLimits::new(Some(2.0), Some(10.0), Some("°C".to_string()));
        assert_eq!(limits.describe(), "2 – 10 °C");
        assert_eq!(CriticalLimits::new(Some(75.0), None, None).describe(), "≥ 75");
    }
}
