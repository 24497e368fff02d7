//! Engine module - risk scoring, CCP determination, limits, scheduling
//! and the plan aggregate that ties them together

pub mod classifier;
pub mod limits;
pub mod plan;
pub mod registry;
pub mod risk;
pub mod schedule;

pub use classifier::{classify, Classification, HazardFacts, RiskStrategy};
pub use limits::{evaluate, ComplianceStatus, CriticalLimits};
pub use plan::{
    CcpSetup, ChangeSource, DashboardSummary, HazardInput, HazardPlan, MonitoringInput,
    MonitoringOutcome, PlanSummary, VerificationInput, VerificationOutcome,
};
pub use registry::{PlanRegistry, PlanRepository};
pub use risk::{score, RiskAssessment, RiskLevel};
pub use schedule::{is_overdue, next_due, Cadence};
