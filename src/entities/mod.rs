//! Plan records - products, process steps, hazards, CCPs and their logs

pub mod ccp;
pub mod hazard;
pub mod logs;
pub mod product;
pub mod step;

pub use ccp::{Ccp, CcpStatus, MonitoringPlan, VerificationPlan};
pub use hazard::{ControlFacts, Hazard, HazardType};
pub use logs::{MonitoringLog, VerificationLog};
pub use product::Product;
pub use step::{ProcessStep, StepParameters};
