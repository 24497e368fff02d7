//! Hazard entity - a food-safety hazard identified at a process step

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::entity::Entity;
use crate::core::identity::{EntityId, EntityPrefix};
use crate::engine::classifier::{self, HazardFacts, RiskStrategy};
use crate::engine::risk::{self, RiskLevel};

/// Hazard type - categorizes the hazard by its agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HazardType {
    /// Pathogens, toxins of microbial origin, parasites
    Biological,
    /// Cleaning residues, pesticides, migrating packaging compounds
    Chemical,
    /// Foreign bodies: glass, metal, hard plastic, bone
    Physical,
    /// Undeclared allergens and cross-contact
    Allergen,
}

impl std::fmt::Display for HazardType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HazardType::Biological => write!(f, "biological"),
            HazardType::Chemical => write!(f, "chemical"),
            HazardType::Physical => write!(f, "physical"),
            HazardType::Allergen => write!(f, "allergen"),
        }
    }
}

impl std::str::FromStr for HazardType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "biological" | "b" => Ok(HazardType::Biological),
            "chemical" | "c" => Ok(HazardType::Chemical),
            "physical" | "p" => Ok(HazardType::Physical),
            "allergen" | "a" => Ok(HazardType::Allergen),
            _ => Err(format!(
                "Invalid hazard type: {}. Use biological, chemical, physical, or allergen",
                s
            )),
        }
    }
}

/// Contextual facts about existing controls, as supplied by the analyst.
///
/// `None` means the question has not been answered yet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlFacts {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_controlled: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_subsequent_step_control: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_existing_prp_coverage: Option<bool>,
}

/// A hazard record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hazard {
    /// Unique identifier
    pub id: EntityId,

    /// Process step where the hazard occurs
    pub step_id: EntityId,

    #[serde(rename = "type")]
    pub hazard_type: HazardType,

    /// What can go wrong
    pub description: String,

    /// Likelihood rating 1-5
    pub likelihood: u8,

    /// Severity rating 1-5
    pub severity: u8,

    /// Likelihood x severity (derived)
    pub risk_score: u8,

    /// Derived from `risk_score`
    pub risk_level: RiskLevel,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub control_measures: Option<String>,

    #[serde(default)]
    pub facts: ControlFacts,

    /// Control strategy produced by the decision tree
    #[serde(default)]
    pub risk_strategy: RiskStrategy,

    /// Later step expected to control this hazard
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subsequent_step: Option<EntityId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub justification: Option<String>,

    /// True iff `risk_strategy` is `ccp`
    #[serde(default)]
    pub is_ccp: bool,

    /// CCP created for this hazard, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ccp_id: Option<EntityId>,

    /// Creation timestamp
    pub created: DateTime<Utc>,

    /// Last time the facts or ratings changed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<DateTime<Utc>>,

    pub author: String,
}

impl Entity for Hazard {
    const PREFIX: EntityPrefix = EntityPrefix::Haz;

    fn id(&self) -> &EntityId {
        &self.id
    }

    fn title(&self) -> String {
        self.description.clone()
    }

    fn created(&self) -> DateTime<Utc> {
        self.created
    }
}

impl Hazard {
    /// Facts in the shape the classifier consumes
    pub fn classifier_facts(&self) -> HazardFacts {
        HazardFacts {
            risk_level: self.risk_level,
            is_controlled: self.facts.is_controlled,
            has_subsequent_step_control: self.facts.has_subsequent_step_control,
            has_existing_prp_coverage: self.facts.has_existing_prp_coverage,
        }
    }

    /// Check that the stored score, level and strategy match what the
    /// engine computes from the stored ratings and facts.
    pub fn is_assessment_current(&self) -> bool {
        let Ok(assessment) = risk::score(self.likelihood as i64, self.severity as i64) else {
            return false;
        };
        if assessment.risk_score != self.risk_score || assessment.risk_level != self.risk_level {
            return false;
        }
        let classification = classifier::classify(&self.classifier_facts());
        classification.strategy == self.risk_strategy
            && self.is_ccp == (self.risk_strategy == RiskStrategy::Ccp)
    }
}
