//! CCP determination - decision tree from hazard significance to control strategy

use serde::{Deserialize, Serialize};

use crate::engine::risk::RiskLevel;

/// Control strategy assigned to a hazard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[derive(Default)]
pub enum RiskStrategy {
    /// Critical Control Point with measurable critical limits
    Ccp,
    /// Operational prerequisite program
    Opprp,
    /// Facility-level prerequisite programs suffice
    UseExistingPrps,
    /// Analysis incomplete; more facts needed
    FurtherAnalysis,
    /// Not yet evaluated
    #[default]
    Undetermined,
}

impl RiskStrategy {
    /// Whether the strategy is a final classification
    pub fn is_final(&self) -> bool {
        matches!(
            self,
            RiskStrategy::Ccp | RiskStrategy::Opprp | RiskStrategy::UseExistingPrps
        )
    }

    pub fn all() -> [RiskStrategy; 5] {
        [
            RiskStrategy::Ccp,
            RiskStrategy::Opprp,
            RiskStrategy::UseExistingPrps,
            RiskStrategy::FurtherAnalysis,
            RiskStrategy::Undetermined,
        ]
    }
}

impl std::fmt::Display for RiskStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RiskStrategy::Ccp => write!(f, "ccp"),
            RiskStrategy::Opprp => write!(f, "opprp"),
            RiskStrategy::UseExistingPrps => write!(f, "use_existing_prps"),
            RiskStrategy::FurtherAnalysis => write!(f, "further_analysis"),
            RiskStrategy::Undetermined => write!(f, "undetermined"),
        }
    }
}

impl std::str::FromStr for RiskStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ccp" => Ok(RiskStrategy::Ccp),
            "opprp" => Ok(RiskStrategy::Opprp),
            "use_existing_prps" | "prp" | "prps" => Ok(RiskStrategy::UseExistingPrps),
            "further_analysis" => Ok(RiskStrategy::FurtherAnalysis),
            "undetermined" => Ok(RiskStrategy::Undetermined),
            _ => Err(format!(
                "Invalid strategy: {}. Use ccp, opprp, use_existing_prps, further_analysis, or undetermined",
                s
            )),
        }
    }
}

/// Inputs to the decision tree. `None` means the fact is not yet supplied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HazardFacts {
    pub risk_level: RiskLevel,
    pub is_controlled: Option<bool>,
    pub has_subsequent_step_control: Option<bool>,
    pub has_existing_prp_coverage: Option<bool>,
}

impl HazardFacts {
    /// True when none of the control questions has been answered
    pub fn is_unanswered(&self) -> bool {
        self.is_controlled.is_none()
            && self.has_subsequent_step_control.is_none()
            && self.has_existing_prp_coverage.is_none()
    }
}

/// Output of [`classify`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub strategy: RiskStrategy,
    pub requires_ccp_record: bool,
}

impl Classification {
    fn without_record(strategy: RiskStrategy) -> Self {
        Self {
            strategy,
            requires_ccp_record: false,
        }
    }
}

/// Run the CCP decision tree. First matching rule wins.
pub fn classify(facts: &HazardFacts) -> Classification {
    // Insignificant hazards never need more than generic controls,
    // whatever else is known about them.
    if facts.risk_level == RiskLevel::Low {
        return Classification::without_record(RiskStrategy::UseExistingPrps);
    }

    if facts.is_unanswered() {
        return Classification::without_record(RiskStrategy::FurtherAnalysis);
    }

    if facts.has_existing_prp_coverage == Some(true) {
        return Classification::without_record(RiskStrategy::UseExistingPrps);
    }

    if facts.has_subsequent_step_control == Some(true) {
        return Classification::without_record(RiskStrategy::Opprp);
    }

    if facts.is_controlled == Some(true) && facts.risk_level != RiskLevel::Critical {
        return Classification::without_record(RiskStrategy::Opprp);
    }

    Classification {
        strategy: RiskStrategy::Ccp,
        requires_ccp_record: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn facts(
        risk_level: RiskLevel,
        controlled: Option<bool>,
        subsequent: Option<bool>,
        prp: Option<bool>,
    ) -> HazardFacts {
        HazardFacts {
            risk_level,
            is_controlled: controlled,
            has_subsequent_step_control: subsequent,
            has_existing_prp_coverage: prp,
        }
    }

    #[test]
    fn test_low_risk_uses_prps_regardless_of_facts() {
        let answers = [None, Some(false), Some(true)];
        for c in answers {
            for s in answers {
                for p in answers {
                    let result = classify(&facts(RiskLevel::Low, c, s, p));
                    assert_eq!(result.strategy, RiskStrategy::UseExistingPrps);
                    assert!(!result.requires_ccp_record);
                }
            }
        }
    }

    #[test]
    fn test_prp_coverage_beats_subsequent_step() {
        let result = classify(&facts(RiskLevel::High, Some(false), Some(true), Some(true)));
        assert_eq!(result.strategy, RiskStrategy::UseExistingPrps);
    }

    #[test]
    fn test_subsequent_step_makes_opprp() {
        let result = classify(&facts(RiskLevel::Critical, Some(false), Some(true), Some(false)));
        assert_eq!(result.strategy, RiskStrategy::Opprp);
        assert!(!result.requires_ccp_record);
    }

    #[test]
    fn test_controlled_non_critical_is_opprp() {
        let result = classify(&facts(RiskLevel::Medium, Some(true), Some(false), Some(false)));
        assert_eq!(result.strategy, RiskStrategy::Opprp);

        let result = classify(&facts(RiskLevel::High, Some(true), None, None));
        assert_eq!(result.strategy, RiskStrategy::Opprp);
    }

    #[test]
    fn test_controlled_critical_is_still_ccp() {
        let result = classify(&facts(RiskLevel::Critical, Some(true), Some(false), Some(false)));
        assert_eq!(result.strategy, RiskStrategy::Ccp);
        assert!(result.requires_ccp_record);
    }

    #[test]
    fn test_uncontrolled_significant_hazard_is_ccp() {
        let result = classify(&facts(RiskLevel::High, Some(false), Some(false), Some(false)));
        assert_eq!(
            result,
            Classification {
                strategy: RiskStrategy::Ccp,
                requires_ccp_record: true
            }
        );
    }

    #[test]
    fn test_no_facts_needs_further_analysis() {
        for level in [RiskLevel::Medium, RiskLevel::High, RiskLevel::Critical] {
            let result = classify(&facts(level, None, None, None));
            assert_eq!(result.strategy, RiskStrategy::FurtherAnalysis);
            assert!(!result.requires_ccp_record);
        }
    }

    #[test]
    fn test_partial_facts_treat_missing_as_false() {
        let result = classify(&facts(RiskLevel::High, Some(false), None, None));
        assert_eq!(result.strategy, RiskStrategy::Ccp);
    }

    #[test]
    fn test_classify_is_deterministic() {
        let input = facts(RiskLevel::High, Some(true), Some(false), None);
        assert_eq!(classify(&input), classify(&input));
    }

    #[test]
    fn test_strategy_roundtrip_strings() {
        for strategy in RiskStrategy::all() {
            assert_eq!(strategy.to_string().parse::<RiskStrategy>().unwrap(), strategy);
        }
        assert!(RiskStrategy::Ccp.is_final());
        assert!(!RiskStrategy::FurtherAnalysis.is_final());
    }
}
