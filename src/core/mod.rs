//! Core module - identity, errors, configuration and plan storage

pub mod config;
pub mod entity;
pub mod error;
pub mod identity;
pub mod project;
pub mod store;

pub use config::Config;
pub use entity::{resolve, Entity};
pub use error::{HaccpError, Result};
pub use identity::{EntityId, EntityPrefix, IdParseError};
pub use project::{Project, ProjectDefaults, ProjectError};
pub use store::PlanStore;
