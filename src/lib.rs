//! HACCP toolkit
//!
//! Hazard analysis and CCP determination for food production. Hazards are
//! scored on a likelihood x severity matrix, classified through a decision
//! tree, and turned into Critical Control Points with monitored critical
//! limits and scheduled verification. Plans are kept as plain YAML files,
//! one per product.

pub mod cli;
pub mod core;
pub mod engine;
pub mod entities;
pub mod logging;
pub mod yaml;
