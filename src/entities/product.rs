//! Product entity - the owner of a HACCP plan

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::entity::Entity;
use crate::core::identity::{EntityId, EntityPrefix};

/// A product manufactured at the facility
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    /// Unique identifier
    pub id: EntityId,

    /// Short product code (unique within the project)
    pub code: String,

    /// Product name
    pub name: String,

    /// Free-text description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Whether the current HACCP plan has been approved
    #[serde(default)]
    pub plan_approved: bool,

    /// Version label of the HACCP plan
    #[serde(default = "default_plan_version")]
    pub plan_version: String,

    /// When the plan was last approved
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_at: Option<DateTime<Utc>>,

    /// Creation timestamp
    pub created: DateTime<Utc>,

    /// Author (who created this product)
    pub author: String,
}

fn default_plan_version() -> String {
    "0.1".to_string()
}

impl Entity for Product {
    const PREFIX: EntityPrefix = EntityPrefix::Prod;

    fn id(&self) -> &EntityId {
        &self.id
    }

    fn title(&self) -> String {
        format!("{} {}", self.code, self.name)
    }

    fn created(&self) -> DateTime<Utc> {
        self.created
    }
}

impl Product {
    /// Create a new product with an unapproved draft plan
    pub fn new(code: String, name: String, author: String) -> Self {
        Self {
            id: EntityId::new(EntityPrefix::Prod),
            code,
            name,
            description: None,
            plan_approved: false,
            plan_version: default_plan_version(),
            approved_at: None,
            created: Utc::now(),
            author,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_product_creation() {
        let product = Product::new(
            "CHK-01".to_string(),
            "Roast Chicken".to_string(),
            "qa".to_string(),
        );
        assert!(product.id.to_string().starts_with("PROD-"));
        assert!(!product.plan_approved);
        assert_eq!(product.plan_version, "0.1");
        assert_eq!(product.title(), "CHK-01 Roast Chicken");
    }

    #[test]
    fn test_product_defaults_on_deserialize() {
        let yaml = format!(
            "id: {}\ncode: X\nname: Thing\ncreated: 2025-01-01T00:00:00Z\nauthor: qa\n",
            EntityId::new(EntityPrefix::Prod)
        );
        let product: Product = serde_yml::from_str(&yaml).unwrap();
        assert!(!product.plan_approved);
        assert_eq!(product.plan_version, "0.1");
    }
}
