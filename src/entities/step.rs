//! Process step entity - one stage of a product's production flow

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::entity::Entity;
use crate::core::identity::{EntityId, EntityPrefix};

/// Physical parameters recorded for documentation only.
///
/// The engine never evaluates these values; critical limits live on the CCP.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepParameters {
    /// Process temperature in °C
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature_c: Option<f64>,

    /// Duration in minutes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_minutes: Option<f64>,

    /// pH value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ph: Option<f64>,

    /// Water activity (aw)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub water_activity: Option<f64>,
}

impl StepParameters {
    /// True when no parameter has been recorded
    pub fn is_empty(&self) -> bool {
        self.temperature_c.is_none()
            && self.time_minutes.is_none()
            && self.ph.is_none()
            && self.water_activity.is_none()
    }
}

/// A step in the production flow
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessStep {
    /// Unique identifier
    pub id: EntityId,

    /// Execution order; unique within the product
    pub step_number: u32,

    /// Step name (e.g. "Cooking")
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "StepParameters::is_empty")]
    pub parameters: StepParameters,

    /// Creation timestamp
    pub created: DateTime<Utc>,
}

impl Entity for ProcessStep {
    const PREFIX: EntityPrefix = EntityPrefix::Step;

    fn id(&self) -> &EntityId {
        &self.id
    }

    fn title(&self) -> String {
        self.name.clone()
    }

    fn created(&self) -> DateTime<Utc> {
        self.created
    }
}

impl ProcessStep {
    pub fn new(step_number: u32, name: String) -> Self {
        Self {
            id: EntityId::new(EntityPrefix::Step),
            step_number,
            name,
            description: None,
            parameters: StepParameters::default(),
            created: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_parameters_are_not_serialized() {
        let step = ProcessStep::new(1, "Receiving".to_string());
        let yaml = serde_yml::to_string(&step).unwrap();
        assert!(!yaml.contains("parameters"));
    }

    #[test]
    fn test_parameters_serialize_when_present() {
        let mut step = ProcessStep::new(3, "Cooking".to_string());
        step.parameters.temperature_c = Some(75.0);
        let yaml = serde_yml::to_string(&step).unwrap();
        assert!(yaml.contains("temperature_c: 75"));
        assert!(!yaml.contains("water_activity"));
    }
}
