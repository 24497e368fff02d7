//! HACCP plan aggregate
//!
//! A [`HazardPlan`] owns everything recorded for one product: its process
//! steps, hazards, CCPs and the monitoring/verification logs of those CCPs.
//! It is the only place where hazards are scored and classified and where
//! CCP records are created, so the derived fields can never drift from the
//! inputs that produced them.
//!
//! Every mutating operation works on a draft copy and replaces the plan only
//! once the whole change has been validated. A failed operation leaves the
//! plan exactly as it was; a successful one bumps [`HazardPlan::revision`].

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, info, warn};

use crate::core::error::{HaccpError, Result};
use crate::core::identity::{EntityId, EntityPrefix};
use crate::entities::ccp::{Ccp, CcpStatus, MonitoringPlan, VerificationPlan};
use crate::entities::hazard::{ControlFacts, Hazard, HazardType};
use crate::entities::logs::{MonitoringLog, VerificationLog};
use crate::entities::product::Product;
use crate::entities::step::{ProcessStep, StepParameters};
use crate::engine::classifier::{self, RiskStrategy};
use crate::engine::limits::CriticalLimits;
use crate::engine::risk::{self, RiskLevel};
use crate::engine::schedule;

/// CCP details used when a hazard's classification requires a CCP record
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CcpSetup {
    pub critical_limits: CriticalLimits,
    #[serde(default)]
    pub monitoring: MonitoringPlan,
    #[serde(default)]
    pub verification: VerificationPlan,
}

/// Input for `add_hazard` and `update_hazard_facts`
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HazardInput {
    pub process_step_id: EntityId,
    pub hazard_type: HazardType,
    pub description: String,
    pub likelihood: i64,
    pub severity: i64,
    #[serde(default)]
    pub facts: ControlFacts,
    #[serde(default)]
    pub control_measures: Option<String>,
    #[serde(default)]
    pub subsequent_step: Option<EntityId>,
    #[serde(default)]
    pub justification: Option<String>,
    #[serde(default)]
    pub ccp_setup: Option<CcpSetup>,
}

/// Input for `record_monitoring`
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MonitoringInput {
    pub ccp_id: EntityId,
    pub measured_value: f64,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub corrective_action_description: Option<String>,
}

/// Result of `record_monitoring`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonitoringOutcome {
    pub log_id: EntityId,
    pub is_within_limits: bool,
    pub requires_corrective_action: bool,
}

/// Input for `record_verification`
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VerificationInput {
    pub ccp_id: EntityId,
    pub verified_at: DateTime<Utc>,
    pub is_compliant: bool,
    #[serde(default)]
    pub result: Option<String>,
}

/// Result of `record_verification`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VerificationOutcome {
    pub log_id: EntityId,
    pub next_due_at: DateTime<Utc>,
    pub is_overdue: bool,
}

/// Who is changing a CCP's status
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeSource {
    /// A person acting on the CCP directly
    Manual { by: String, reason: Option<String> },
    /// The aggregate reacting to a hazard reclassification
    Reclassification,
}

/// Dashboard counts for one product
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DashboardSummary {
    pub total_ccps: usize,
    pub active_ccps: usize,
    /// Out-of-spec readings inside the trailing window
    pub out_of_spec_count: usize,
    /// Active CCPs whose verification is overdue
    pub pending_verification_count: usize,
}

impl DashboardSummary {
    /// Sum the dashboards of several plans
    pub fn merge(mut self, other: DashboardSummary) -> Self {
        self.total_ccps += other.total_ccps;
        self.active_ccps += other.active_ccps;
        self.out_of_spec_count += other.out_of_spec_count;
        self.pending_verification_count += other.pending_verification_count;
        self
    }
}

/// Hazard counts by risk level
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LevelCounts {
    pub low: usize,
    pub medium: usize,
    pub high: usize,
    pub critical: usize,
}

/// Hazard counts by control strategy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StrategyCounts {
    pub ccp: usize,
    pub opprp: usize,
    pub use_existing_prps: usize,
    pub further_analysis: usize,
    pub undetermined: usize,
}

/// Per-product summary of the hazard analysis
#[derive(Debug, Clone, Serialize)]
pub struct PlanSummary {
    pub product_code: String,
    pub plan_version: String,
    pub plan_approved: bool,
    pub steps: usize,
    pub hazards: usize,
    pub by_level: LevelCounts,
    pub by_strategy: StrategyCounts,
    pub ccps: usize,
    pub active_ccps: usize,
    pub monitoring_logs: usize,
    pub verification_logs: usize,
}

/// The aggregate for one product's HACCP plan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HazardPlan {
    product: Product,

    #[serde(default)]
    revision: u32,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    steps: Vec<ProcessStep>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    hazards: Vec<Hazard>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    ccps: Vec<Ccp>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    monitoring_logs: Vec<MonitoringLog>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    verification_logs: Vec<VerificationLog>,
}

impl HazardPlan {
    /// Start an empty plan for a product
    pub fn new(product: Product) -> Self {
        Self {
            product,
            revision: 0,
            steps: Vec::new(),
            hazards: Vec::new(),
            ccps: Vec::new(),
            monitoring_logs: Vec::new(),
            verification_logs: Vec::new(),
        }
    }

    // ------------------------------------------------------------------
    // Read access
    // ------------------------------------------------------------------

    pub fn product(&self) -> &Product {
        &self.product
    }

    pub fn product_id(&self) -> &EntityId {
        &self.product.id
    }

    /// Incremented by every successful mutation
    pub fn revision(&self) -> u32 {
        self.revision
    }

    /// Steps in execution order
    pub fn steps(&self) -> &[ProcessStep] {
        &self.steps
    }

    pub fn hazards(&self) -> &[Hazard] {
        &self.hazards
    }

    pub fn ccps(&self) -> &[Ccp] {
        &self.ccps
    }

    pub fn monitoring_logs(&self) -> &[MonitoringLog] {
        &self.monitoring_logs
    }

    pub fn verification_logs(&self) -> &[VerificationLog] {
        &self.verification_logs
    }

    pub fn step(&self, id: &EntityId) -> Result<&ProcessStep> {
        self.steps
            .iter()
            .find(|s| &s.id == id)
            .ok_or_else(|| HaccpError::not_found(id))
    }

    pub fn hazard(&self, id: &EntityId) -> Result<&Hazard> {
        self.hazards
            .iter()
            .find(|h| &h.id == id)
            .ok_or_else(|| HaccpError::not_found(id))
    }

    pub fn ccp(&self, id: &EntityId) -> Result<&Ccp> {
        self.ccps
            .iter()
            .find(|c| &c.id == id)
            .ok_or_else(|| HaccpError::not_found(id))
    }

    /// Find a CCP by its per-product number
    pub fn ccp_by_number(&self, number: u32) -> Option<&Ccp> {
        self.ccps.iter().find(|c| c.ccp_number == number)
    }

    /// Hazards recorded at a step
    pub fn hazards_at(&self, step_id: &EntityId) -> impl Iterator<Item = &Hazard> {
        let step_id = step_id.clone();
        self.hazards.iter().filter(move |h| h.step_id == step_id)
    }

    /// Monitoring history of one CCP, oldest first
    pub fn monitoring_for(&self, ccp_id: &EntityId) -> Vec<&MonitoringLog> {
        let mut logs: Vec<&MonitoringLog> = self
            .monitoring_logs
            .iter()
            .filter(|l| &l.ccp_id == ccp_id)
            .collect();
        logs.sort_by_key(|l| l.timestamp);
        logs
    }

    /// Verification history of one CCP, oldest first
    pub fn verification_for(&self, ccp_id: &EntityId) -> Vec<&VerificationLog> {
        let mut logs: Vec<&VerificationLog> = self
            .verification_logs
            .iter()
            .filter(|l| &l.ccp_id == ccp_id)
            .collect();
        logs.sort_by_key(|l| l.verification_date);
        logs
    }

    /// Active CCPs whose verification is overdue at `now`
    pub fn overdue_verifications(&self, now: DateTime<Utc>) -> Vec<&Ccp> {
        self.ccps
            .iter()
            .filter(|c| c.is_active() && schedule::is_overdue(c.next_verification_due, now))
            .collect()
    }

    /// Whether any monitoring or verification activity is still open
    pub fn has_open_activity(&self) -> bool {
        self.ccps.iter().any(Ccp::is_open)
    }

    // ------------------------------------------------------------------
    // Read models
    // ------------------------------------------------------------------

    /// Dashboard counts. Out-of-spec readings are counted when their
    /// timestamp falls within `window` before `now` (inclusive).
    pub fn dashboard_summary(&self, now: DateTime<Utc>, window: Duration) -> DashboardSummary {
        let since = now - window;
        DashboardSummary {
            total_ccps: self.ccps.len(),
            active_ccps: self.ccps.iter().filter(|c| c.is_active()).count(),
            out_of_spec_count: self
                .monitoring_logs
                .iter()
                .filter(|l| !l.is_within_limits && l.timestamp >= since && l.timestamp <= now)
                .count(),
            pending_verification_count: self.overdue_verifications(now).len(),
        }
    }

    /// Counts of the hazard analysis for reports and status output
    pub fn summary(&self) -> PlanSummary {
        let mut by_level = LevelCounts::default();
        let mut by_strategy = StrategyCounts::default();
        for hazard in &self.hazards {
            match hazard.risk_level {
                RiskLevel::Low => by_level.low += 1,
                RiskLevel::Medium => by_level.medium += 1,
                RiskLevel::High => by_level.high += 1,
                RiskLevel::Critical => by_level.critical += 1,
            }
            match hazard.risk_strategy {
                RiskStrategy::Ccp => by_strategy.ccp += 1,
                RiskStrategy::Opprp => by_strategy.opprp += 1,
                RiskStrategy::UseExistingPrps => by_strategy.use_existing_prps += 1,
                RiskStrategy::FurtherAnalysis => by_strategy.further_analysis += 1,
                RiskStrategy::Undetermined => by_strategy.undetermined += 1,
            }
        }

        PlanSummary {
            product_code: self.product.code.clone(),
            plan_version: self.product.plan_version.clone(),
            plan_approved: self.product.plan_approved,
            steps: self.steps.len(),
            hazards: self.hazards.len(),
            by_level,
            by_strategy,
            ccps: self.ccps.len(),
            active_ccps: self.ccps.iter().filter(|c| c.is_active()).count(),
            monitoring_logs: self.monitoring_logs.len(),
            verification_logs: self.verification_logs.len(),
        }
    }

    /// Check a plan read from storage: derived fields must match their
    /// inputs and every reference must resolve inside the plan.
    pub fn validate(&self) -> Result<()> {
        let mut numbers = HashSet::new();
        for step in &self.steps {
            if !numbers.insert(step.step_number) {
                return Err(HaccpError::Validation(format!(
                    "step number {} is used twice",
                    step.step_number
                )));
            }
        }

        for hazard in &self.hazards {
            self.step(&hazard.step_id)?;
            if !hazard.is_assessment_current() {
                return Err(HaccpError::Validation(format!(
                    "hazard {} has a stale risk assessment; derived fields cannot be edited by hand",
                    hazard.id
                )));
            }
            if let Some(ref ccp_id) = hazard.ccp_id {
                self.ccp(ccp_id)?;
            }
        }

        let mut ccp_numbers = HashSet::new();
        for ccp in &self.ccps {
            ccp.critical_limits.validate()?;
            if !ccp_numbers.insert(ccp.ccp_number) {
                return Err(HaccpError::Validation(format!(
                    "CCP number {} is used twice",
                    ccp.ccp_number
                )));
            }
        }

        for log in &self.monitoring_logs {
            self.ccp(&log.ccp_id)?;
        }
        for log in &self.verification_logs {
            self.ccp(&log.ccp_id)?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Product
    // ------------------------------------------------------------------

    /// Rename or re-describe the product
    pub fn update_product(&mut self, name: Option<String>, description: Option<String>) -> Result<&Product> {
        self.transact(|plan| {
            if let Some(name) = name {
                let name = required_text("product name", &name)?;
                plan.product.name = name;
            }
            if let Some(description) = description {
                plan.product.description = optional_text(Some(description));
            }
            Ok(())
        })?;
        Ok(&self.product)
    }

    /// Mark the current plan version as approved
    pub fn approve_plan(&mut self, version: &str, now: DateTime<Utc>) -> Result<&Product> {
        let version = required_text("plan version", version)?;
        self.transact(|plan| {
            let undecided: Vec<String> = plan
                .hazards
                .iter()
                .filter(|h| !h.risk_strategy.is_final())
                .map(|h| h.id.to_string())
                .collect();
            if !undecided.is_empty() {
                return Err(HaccpError::Validation(format!(
                    "cannot approve a plan with unclassified hazards: {}",
                    undecided.join(", ")
                )));
            }
            plan.product.plan_approved = true;
            plan.product.plan_version = version;
            plan.product.approved_at = Some(now);
            Ok(())
        })?;
        info!(product = %self.product.code, version = %self.product.plan_version, "plan approved");
        Ok(&self.product)
    }

    /// Withdraw the approval of the current plan version
    pub fn revoke_approval(&mut self) -> Result<&Product> {
        self.transact(|plan| {
            plan.product.plan_approved = false;
            plan.product.approved_at = None;
            Ok(())
        })?;
        Ok(&self.product)
    }

    /// Fail unless the product can be deleted
    pub fn ensure_deletable(&self) -> Result<()> {
        let open: Vec<String> = self
            .ccps
            .iter()
            .filter(|c| c.is_open())
            .map(|c| format!("{} ({})", c.label(), c.status))
            .collect();
        if open.is_empty() {
            Ok(())
        } else {
            Err(HaccpError::Validation(format!(
                "product {} still has open monitoring/verification activity: {}; deactivate these CCPs first",
                self.product.code,
                open.join(", ")
            )))
        }
    }

    // ------------------------------------------------------------------
    // Process steps
    // ------------------------------------------------------------------

    /// Add a process step; numbers are unique and define the order
    pub fn add_step(
        &mut self,
        step_number: u32,
        name: &str,
        description: Option<String>,
        parameters: StepParameters,
    ) -> Result<&ProcessStep> {
        let name = required_text("step name", name)?;
        let id = self.transact(|plan| {
            if plan.steps.iter().any(|s| s.step_number == step_number) {
                return Err(HaccpError::Validation(format!(
                    "step number {} already exists in {}",
                    step_number, plan.product.code
                )));
            }
            let mut step = ProcessStep::new(step_number, name);
            step.description = optional_text(description);
            step.parameters = parameters;
            let id = step.id.clone();
            plan.steps.push(step);
            plan.steps.sort_by_key(|s| s.step_number);
            Ok(id)
        })?;
        self.step(&id)
    }

    /// Update a step's name, description or documented parameters
    pub fn update_step(
        &mut self,
        step_id: &EntityId,
        name: Option<String>,
        description: Option<String>,
        parameters: Option<StepParameters>,
    ) -> Result<&ProcessStep> {
        self.transact(|plan| {
            let step = plan
                .steps
                .iter_mut()
                .find(|s| &s.id == step_id)
                .ok_or_else(|| HaccpError::not_found(step_id))?;
            if let Some(name) = name {
                step.name = required_text("step name", &name)?;
            }
            if let Some(description) = description {
                step.description = optional_text(Some(description));
            }
            if let Some(parameters) = parameters {
                step.parameters = parameters;
            }
            Ok(())
        })?;
        self.step(step_id)
    }

    /// Remove a step that no hazard refers to
    pub fn remove_step(&mut self, step_id: &EntityId) -> Result<ProcessStep> {
        self.transact(|plan| {
            let index = plan
                .steps
                .iter()
                .position(|s| &s.id == step_id)
                .ok_or_else(|| HaccpError::not_found(step_id))?;
            let referenced = plan.hazards.iter().any(|h| {
                &h.step_id == step_id || h.subsequent_step.as_ref() == Some(step_id)
            });
            if referenced {
                return Err(HaccpError::Validation(format!(
                    "step {} is referenced by hazards; remove or move them first",
                    plan.steps[index].step_number
                )));
            }
            Ok(plan.steps.remove(index))
        })
    }

    // ------------------------------------------------------------------
    // Hazards
    // ------------------------------------------------------------------

    /// Record a new hazard, score and classify it, and create its CCP if
    /// the classification requires one.
    pub fn add_hazard(&mut self, input: HazardInput, author: &str, now: DateTime<Utc>) -> Result<&Hazard> {
        let id = self.transact(|plan| {
            let mut hazard = Hazard {
                id: EntityId::new(EntityPrefix::Haz),
                step_id: input.process_step_id.clone(),
                hazard_type: input.hazard_type,
                description: String::new(),
                likelihood: 0,
                severity: 0,
                risk_score: 0,
                risk_level: RiskLevel::Low,
                control_measures: None,
                facts: ControlFacts::default(),
                risk_strategy: RiskStrategy::Undetermined,
                subsequent_step: None,
                justification: None,
                is_ccp: false,
                ccp_id: None,
                created: now,
                updated: None,
                author: author.to_string(),
            };
            plan.apply_input(&mut hazard, input, now)?;
            let id = hazard.id.clone();
            plan.hazards.push(hazard);
            Ok(id)
        })?;
        self.hazard(&id)
    }

    /// Replace a hazard's ratings and facts and re-run scoring and
    /// classification. A newly required CCP is created (or the hazard's
    /// earlier CCP re-linked); a CCP that is no longer required is left in
    /// place until someone deactivates it.
    pub fn update_hazard_facts(
        &mut self,
        hazard_id: &EntityId,
        input: HazardInput,
        now: DateTime<Utc>,
    ) -> Result<&Hazard> {
        self.transact(|plan| {
            let index = plan
                .hazards
                .iter()
                .position(|h| &h.id == hazard_id)
                .ok_or_else(|| HaccpError::not_found(hazard_id))?;
            let mut hazard = plan.hazards[index].clone();
            plan.apply_input(&mut hazard, input, now)?;
            hazard.updated = Some(now);
            plan.hazards[index] = hazard;
            Ok(())
        })?;
        self.hazard(hazard_id)
    }

    /// Delete a hazard. Refused while its CCP is still open.
    pub fn delete_hazard(&mut self, hazard_id: &EntityId) -> Result<Hazard> {
        self.transact(|plan| {
            let index = plan
                .hazards
                .iter()
                .position(|h| &h.id == hazard_id)
                .ok_or_else(|| HaccpError::not_found(hazard_id))?;
            if let Some(ref ccp_id) = plan.hazards[index].ccp_id {
                let ccp = plan.ccp(ccp_id)?;
                if ccp.is_open() {
                    return Err(HaccpError::Validation(format!(
                        "hazard is controlled by {} which is {}; deactivate the CCP before deleting the hazard",
                        ccp.label(),
                        ccp.status
                    )));
                }
            }
            Ok(plan.hazards.remove(index))
        })
    }

    /// Score, classify and link one hazard from caller input
    fn apply_input(&mut self, hazard: &mut Hazard, input: HazardInput, now: DateTime<Utc>) -> Result<()> {
        let step_number = self.step(&input.process_step_id)?.step_number;
        if let Some(ref later) = input.subsequent_step {
            let later_number = self.step(later)?.step_number;
            if later_number <= step_number {
                return Err(HaccpError::Validation(format!(
                    "subsequent step {} does not come after step {}",
                    later_number, step_number
                )));
            }
        }

        let assessment = risk::score(input.likelihood, input.severity)?;

        hazard.step_id = input.process_step_id;
        hazard.hazard_type = input.hazard_type;
        hazard.description = required_text("hazard description", &input.description)?;
        hazard.likelihood = input.likelihood as u8;
        hazard.severity = input.severity as u8;
        hazard.risk_score = assessment.risk_score;
        hazard.risk_level = assessment.risk_level;
        hazard.control_measures = optional_text(input.control_measures);
        hazard.facts = input.facts;
        hazard.subsequent_step = input.subsequent_step;
        hazard.justification = optional_text(input.justification);

        let previous = hazard.risk_strategy;
        let classification = classifier::classify(&hazard.classifier_facts());
        hazard.risk_strategy = classification.strategy;
        hazard.is_ccp = classification.strategy == RiskStrategy::Ccp;

        debug!(
            hazard = %hazard.id,
            score = hazard.risk_score,
            level = %hazard.risk_level,
            from = %previous,
            to = %hazard.risk_strategy,
            "hazard classified"
        );

        if classification.requires_ccp_record {
            let transition = previous != RiskStrategy::Ccp;
            self.link_ccp(hazard, input.ccp_setup, transition, now)?;
        } else if let Some(ref ccp_id) = hazard.ccp_id {
            if self.ccp(ccp_id)?.is_open() {
                warn!(
                    hazard = %hazard.id,
                    ccp = %ccp_id,
                    strategy = %hazard.risk_strategy,
                    "hazard no longer requires a CCP; the CCP stays open until deactivated"
                );
            }
        }

        // A linked CCP follows its hazard to whatever step it now sits at.
        if let Some(ref ccp_id) = hazard.ccp_id {
            self.ccp_mut(ccp_id)?.step_id = hazard.step_id.clone();
        }
        Ok(())
    }

    /// Make sure a hazard classified as `ccp` has exactly one linked CCP.
    ///
    /// Only a `transition` into `ccp` reactivates an earlier CCP; edits to a
    /// hazard that already was a CCP leave a manual suspension in place.
    fn link_ccp(
        &mut self,
        hazard: &mut Hazard,
        setup: Option<CcpSetup>,
        transition: bool,
        now: DateTime<Utc>,
    ) -> Result<()> {
        if let Some(existing) = hazard.ccp_id.clone() {
            let index = self
                .ccps
                .iter()
                .position(|c| c.id == existing)
                .ok_or_else(|| HaccpError::not_found(&existing))?;
            let ccp = &mut self.ccps[index];
            if let Some(setup) = setup {
                setup.critical_limits.validate()?;
                ccp.critical_limits = setup.critical_limits;
                ccp.monitoring = setup.monitoring;
                if ccp.verification.cadence != setup.verification.cadence {
                    let base = ccp.last_verified_at.unwrap_or(now);
                    ccp.next_verification_due = schedule::next_due(base, setup.verification.cadence);
                }
                ccp.verification = setup.verification;
            }
            if transition && !ccp.is_active() {
                ccp.critical_limits.validate()?;
                info!(ccp = %ccp.id, from = %ccp.status, "CCP reactivated by reclassification");
                ccp.status = CcpStatus::Active;
                ccp.status_note = Some("reactivated: hazard reclassified as CCP".to_string());
            }
            return Ok(());
        }

        let setup = setup.ok_or_else(|| {
            HaccpError::Configuration(format!(
                "hazard '{}' classifies as a CCP; critical limits must be supplied to create it",
                hazard.description
            ))
        })?;
        setup.critical_limits.validate()?;

        let ccp = Ccp {
            id: EntityId::new(EntityPrefix::Ccp),
            ccp_number: self.ccps.iter().map(|c| c.ccp_number).max().unwrap_or(0) + 1,
            hazard_id: hazard.id.clone(),
            step_id: hazard.step_id.clone(),
            status: CcpStatus::Active,
            critical_limits: setup.critical_limits,
            monitoring: setup.monitoring,
            next_verification_due: schedule::next_due(now, setup.verification.cadence),
            verification: setup.verification,
            last_verified_at: None,
            status_note: None,
            created: now,
        };
        info!(hazard = %hazard.id, ccp = %ccp.id, number = ccp.ccp_number, "CCP created");
        hazard.ccp_id = Some(ccp.id.clone());
        self.ccps.push(ccp);
        Ok(())
    }

    // ------------------------------------------------------------------
    // CCPs
    // ------------------------------------------------------------------

    /// Replace a CCP's critical limits
    pub fn set_critical_limits(&mut self, ccp_id: &EntityId, limits: CriticalLimits) -> Result<&Ccp> {
        limits.validate()?;
        self.transact(|plan| {
            plan.ccp_mut(ccp_id)?.critical_limits = limits;
            Ok(())
        })?;
        self.ccp(ccp_id)
    }

    /// Change a CCP's monitoring or verification plan
    pub fn set_ccp_plans(
        &mut self,
        ccp_id: &EntityId,
        monitoring: Option<MonitoringPlan>,
        verification: Option<VerificationPlan>,
        now: DateTime<Utc>,
    ) -> Result<&Ccp> {
        self.transact(|plan| {
            let ccp = plan.ccp_mut(ccp_id)?;
            if let Some(monitoring) = monitoring {
                ccp.monitoring = monitoring;
            }
            if let Some(verification) = verification {
                if verification.cadence != ccp.verification.cadence {
                    let base = ccp.last_verified_at.unwrap_or(now);
                    ccp.next_verification_due = schedule::next_due(base, verification.cadence);
                }
                ccp.verification = verification;
            }
            Ok(())
        })?;
        self.ccp(ccp_id)
    }

    /// Change a CCP's status.
    ///
    /// Activation requires a valid critical-limit range. Deactivation and
    /// suspension are human decisions: a request coming from the
    /// reclassification path is rejected.
    pub fn set_ccp_status(
        &mut self,
        ccp_id: &EntityId,
        status: CcpStatus,
        source: ChangeSource,
    ) -> Result<&Ccp> {
        self.transact(|plan| {
            let ccp = plan.ccp_mut(ccp_id)?;
            let note = match (&source, status) {
                (_, CcpStatus::Active) => {
                    ccp.critical_limits.validate().map_err(|_| {
                        HaccpError::Configuration(format!(
                            "{} cannot be activated without a critical limit",
                            ccp.label()
                        ))
                    })?;
                    match source {
                        ChangeSource::Manual { ref by, ref reason } => {
                            Some(describe_change("activated", by, reason.as_deref()))
                        }
                        ChangeSource::Reclassification => {
                            Some("reactivated: hazard reclassified as CCP".to_string())
                        }
                    }
                }
                (ChangeSource::Reclassification, _) => {
                    return Err(HaccpError::Validation(format!(
                        "{} can only be {} by a person; reclassification never deactivates a CCP",
                        ccp.label(),
                        status
                    )));
                }
                (ChangeSource::Manual { by, reason }, _) => {
                    Some(describe_change(&status.to_string(), by, reason.as_deref()))
                }
            };
            info!(ccp = %ccp.id, from = %ccp.status, to = %status, "CCP status changed");
            ccp.status = status;
            ccp.status_note = note;
            Ok(())
        })?;
        self.ccp(ccp_id)
    }

    fn ccp_mut(&mut self, ccp_id: &EntityId) -> Result<&mut Ccp> {
        self.ccps
            .iter_mut()
            .find(|c| &c.id == ccp_id)
            .ok_or_else(|| HaccpError::not_found(ccp_id))
    }

    // ------------------------------------------------------------------
    // Monitoring & verification
    // ------------------------------------------------------------------

    /// Evaluate a reading against the CCP's critical limits and log it.
    ///
    /// Out-of-spec readings are only accepted together with a non-blank
    /// corrective action description.
    pub fn record_monitoring(&mut self, input: MonitoringInput, recorded_by: &str) -> Result<MonitoringOutcome> {
        self.transact(|plan| {
            let ccp = plan.ccp(&input.ccp_id)?;
            if !ccp.is_active() {
                return Err(HaccpError::Validation(format!(
                    "{} is {}; readings can only be recorded on an active CCP",
                    ccp.label(),
                    ccp.status
                )));
            }

            let status = ccp.critical_limits.evaluate(input.measured_value)?;
            let corrective = optional_text(input.corrective_action_description);
            if status.requires_corrective_action() && corrective.is_none() {
                return Err(HaccpError::Validation(format!(
                    "reading {} is outside the critical limits of {} ({}); a corrective action description is required",
                    input.measured_value,
                    ccp.label(),
                    ccp.critical_limits.describe()
                )));
            }

            if status.requires_corrective_action() {
                warn!(
                    ccp = %ccp.id,
                    value = input.measured_value,
                    limits = %ccp.critical_limits.describe(),
                    "out-of-spec reading"
                );
            }

            let mut log = MonitoringLog::new(
                input.ccp_id,
                input.measured_value,
                input.timestamp,
                status.is_within_limits(),
                recorded_by.to_string(),
            );
            log.corrective_action_description = corrective;
            let outcome = MonitoringOutcome {
                log_id: log.id.clone(),
                is_within_limits: status.is_within_limits(),
                requires_corrective_action: status.requires_corrective_action(),
            };
            plan.monitoring_logs.push(log);
            Ok(outcome)
        })
    }

    /// Log a verification and move the CCP's next due date forward
    pub fn record_verification(
        &mut self,
        input: VerificationInput,
        verified_by: &str,
        now: DateTime<Utc>,
    ) -> Result<VerificationOutcome> {
        if input.verified_at > now {
            return Err(HaccpError::Validation(format!(
                "verification date {} is in the future",
                input.verified_at.format("%Y-%m-%d %H:%M")
            )));
        }

        self.transact(|plan| {
            let ccp = plan.ccp_mut(&input.ccp_id)?;
            if ccp.status == CcpStatus::Inactive {
                return Err(HaccpError::Validation(format!(
                    "{} is inactive; reactivate it before recording verification",
                    ccp.label()
                )));
            }

            // A back-dated entry never pulls the schedule earlier.
            let latest = match ccp.last_verified_at {
                Some(last) if last > input.verified_at => last,
                _ => input.verified_at,
            };
            let next_due_at = schedule::next_due(latest, ccp.verification.cadence);
            ccp.last_verified_at = Some(latest);
            ccp.next_verification_due = next_due_at;

            if !input.is_compliant {
                warn!(ccp = %ccp.id, "verification found the CCP non-compliant");
            }
            let is_overdue = schedule::is_overdue(next_due_at, now);
            if is_overdue {
                warn!(ccp = %ccp.id, due = %next_due_at, "verification is overdue");
            }

            let log = VerificationLog {
                id: EntityId::new(EntityPrefix::Ver),
                ccp_id: input.ccp_id,
                verification_date: input.verified_at,
                result: optional_text(input.result),
                is_compliant: input.is_compliant,
                next_due_at,
                verified_by: verified_by.to_string(),
            };
            let outcome = VerificationOutcome {
                log_id: log.id.clone(),
                next_due_at,
                is_overdue,
            };
            plan.verification_logs.push(log);
            Ok(outcome)
        })
    }

    /// Apply `change` to a draft and commit it only if it succeeds
    fn transact<T>(&mut self, change: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let mut draft = self.clone();
        let out = change(&mut draft)?;
        draft.revision += 1;
        *self = draft;
        Ok(out)
    }
}

fn required_text(field: &str, value: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(HaccpError::Validation(format!("{} must not be empty", field)))
    } else {
        Ok(trimmed.to_string())
    }
}

fn optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn describe_change(action: &str, by: &str, reason: Option<&str>) -> String {
    match reason {
        Some(reason) => format!("{} by {}: {}", action, by, reason),
        None => format!("{} by {}", action, by),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::schedule::Cadence;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 8, 0, 0).unwrap()
    }

    fn plan_with_steps() -> (HazardPlan, EntityId, EntityId) {
        crate::logging::init_test();
        let mut plan = HazardPlan::new(Product::new(
            "CHK-01".to_string(),
            "Cooked chicken".to_string(),
            "qa".to_string(),
        ));
        let cook = plan
            .add_step(20, "Cooking", None, StepParameters::default())
            .unwrap()
            .id
            .clone();
        let chill = plan
            .add_step(30, "Chilling", None, StepParameters::default())
            .unwrap()
            .id
            .clone();
        (plan, cook, chill)
    }

    fn all_false() -> ControlFacts {
        ControlFacts {
            is_controlled: Some(false),
            has_subsequent_step_control: Some(false),
            has_existing_prp_coverage: Some(false),
        }
    }

    fn chill_limits() -> CcpSetup {
        CcpSetup {
            critical_limits: CriticalLimits::new(Some(2.0), Some(10.0), Some("°C".to_string())),
            monitoring: MonitoringPlan {
                frequency: Some("every batch".to_string()),
                method: Some("probe".to_string()),
            },
            verification: VerificationPlan {
                cadence: Cadence::Monthly,
                method: None,
            },
        }
    }

    fn input(step: &EntityId, likelihood: i64, severity: i64, facts: ControlFacts) -> HazardInput {
        HazardInput {
            process_step_id: step.clone(),
            hazard_type: HazardType::Biological,
            description: "Listeria growth".to_string(),
            likelihood,
            severity,
            facts,
            control_measures: None,
            subsequent_step: None,
            justification: None,
            ccp_setup: Some(chill_limits()),
        }
    }

    /// Plan with one hazard classified as CCP; returns (plan, hazard, ccp)
    fn plan_with_ccp() -> (HazardPlan, EntityId, EntityId) {
        let (mut plan, _, chill) = plan_with_steps();
        let hazard = plan
            .add_hazard(input(&chill, 3, 5, all_false()), "qa", at(2025, 1, 1))
            .unwrap();
        let (hazard_id, ccp_id) = (hazard.id.clone(), hazard.ccp_id.clone().unwrap());
        (plan, hazard_id, ccp_id)
    }

    #[test]
    fn test_significant_uncontrolled_hazard_creates_one_active_ccp() {
        let (plan, hazard_id, ccp_id) = plan_with_ccp();
        let hazard = plan.hazard(&hazard_id).unwrap();

        assert_eq!(hazard.risk_score, 15);
        assert_eq!(hazard.risk_level, RiskLevel::High);
        assert_eq!(hazard.risk_strategy, RiskStrategy::Ccp);
        assert!(hazard.is_ccp);

        assert_eq!(plan.ccps().len(), 1);
        let ccp = plan.ccp(&ccp_id).unwrap();
        assert_eq!(ccp.hazard_id, hazard_id);
        assert_eq!(ccp.ccp_number, 1);
        assert_eq!(ccp.status, CcpStatus::Active);
        assert_eq!(ccp.next_verification_due, at(2025, 2, 1));
    }

    #[test]
    fn test_low_risk_uses_prps_and_creates_nothing() {
        let (mut plan, cook, _) = plan_with_steps();
        let hazard = plan
            .add_hazard(input(&cook, 1, 2, all_false()), "qa", at(2025, 1, 1))
            .unwrap();
        assert_eq!(hazard.risk_score, 2);
        assert_eq!(hazard.risk_level, RiskLevel::Low);
        assert_eq!(hazard.risk_strategy, RiskStrategy::UseExistingPrps);
        assert!(hazard.ccp_id.is_none());
        assert!(plan.ccps().is_empty());
    }

    #[test]
    fn test_unanswered_facts_need_further_analysis() {
        let (mut plan, cook, _) = plan_with_steps();
        let hazard = plan
            .add_hazard(input(&cook, 4, 4, ControlFacts::default()), "qa", at(2025, 1, 1))
            .unwrap();
        assert_eq!(hazard.risk_strategy, RiskStrategy::FurtherAnalysis);
        assert!(plan.ccps().is_empty());
    }

    #[test]
    fn test_rerunning_classification_is_idempotent() {
        let (mut plan, hazard_id, _) = plan_with_ccp();
        let step = plan.hazard(&hazard_id).unwrap().step_id.clone();
        for _ in 0..3 {
            plan.update_hazard_facts(&hazard_id, input(&step, 3, 5, all_false()), at(2025, 1, 2))
                .unwrap();
        }
        assert_eq!(plan.ccps().len(), 1);
    }

    #[test]
    fn test_ccp_without_limits_is_configuration_error() {
        let (mut plan, _, chill) = plan_with_steps();
        let mut request = input(&chill, 3, 5, all_false());
        request.ccp_setup = None;
        let err = plan.add_hazard(request, "qa", at(2025, 1, 1)).unwrap_err();
        assert!(matches!(err, HaccpError::Configuration(_)));

        let mut request = input(&chill, 3, 5, all_false());
        request.ccp_setup = Some(CcpSetup::default());
        let err = plan.add_hazard(request, "qa", at(2025, 1, 1)).unwrap_err();
        assert!(matches!(err, HaccpError::Configuration(_)));

        assert!(plan.hazards().is_empty());
        assert!(plan.ccps().is_empty());
    }

    #[test]
    fn test_out_of_range_rating_leaves_plan_untouched() {
        let (mut plan, cook, _) = plan_with_steps();
        let revision = plan.revision();
        let err = plan
            .add_hazard(input(&cook, 6, 2, all_false()), "qa", at(2025, 1, 1))
            .unwrap_err();
        assert!(matches!(err, HaccpError::Range { field: "likelihood", .. }));
        assert_eq!(plan.revision(), revision);
        assert!(plan.hazards().is_empty());
    }

    #[test]
    fn test_unknown_step_is_not_found() {
        let (mut plan, _, _) = plan_with_steps();
        let ghost = EntityId::new(EntityPrefix::Step);
        let err = plan
            .add_hazard(input(&ghost, 2, 2, all_false()), "qa", at(2025, 1, 1))
            .unwrap_err();
        assert!(matches!(err, HaccpError::NotFound { .. }));
    }

    #[test]
    fn test_subsequent_step_must_come_later() {
        let (mut plan, cook, chill) = plan_with_steps();
        let mut request = input(&chill, 3, 3, all_false());
        request.subsequent_step = Some(cook);
        let err = plan.add_hazard(request, "qa", at(2025, 1, 1)).unwrap_err();
        assert!(matches!(err, HaccpError::Validation(_)));
    }

    #[test]
    fn test_reclassification_keeps_ccp_active() {
        let (mut plan, hazard_id, ccp_id) = plan_with_ccp();
        let step = plan.hazard(&hazard_id).unwrap().step_id.clone();
        let mut facts = all_false();
        facts.has_subsequent_step_control = Some(true);

        let hazard = plan
            .update_hazard_facts(&hazard_id, input(&step, 3, 5, facts), at(2025, 1, 3))
            .unwrap();
        assert_eq!(hazard.risk_strategy, RiskStrategy::Opprp);
        assert!(!hazard.is_ccp);
        assert_eq!(hazard.ccp_id.as_ref(), Some(&ccp_id));
        assert_eq!(plan.ccp(&ccp_id).unwrap().status, CcpStatus::Active);
    }

    #[test]
    fn test_reclassification_cannot_deactivate() {
        let (mut plan, _, ccp_id) = plan_with_ccp();
        let err = plan
            .set_ccp_status(&ccp_id, CcpStatus::Inactive, ChangeSource::Reclassification)
            .unwrap_err();
        assert!(matches!(err, HaccpError::Validation(_)));
        assert!(plan.ccp(&ccp_id).unwrap().is_active());
    }

    #[test]
    fn test_manual_deactivation_then_reclassification_relinks() {
        let (mut plan, hazard_id, ccp_id) = plan_with_ccp();
        let step = plan.hazard(&hazard_id).unwrap().step_id.clone();

        let mut facts = all_false();
        facts.has_existing_prp_coverage = Some(true);
        plan.update_hazard_facts(&hazard_id, input(&step, 3, 5, facts), at(2025, 1, 3))
            .unwrap();
        plan.set_ccp_status(
            &ccp_id,
            CcpStatus::Inactive,
            ChangeSource::Manual {
                by: "qa".to_string(),
                reason: Some("covered by sanitation PRP".to_string()),
            },
        )
        .unwrap();
        assert_eq!(
            plan.ccp(&ccp_id).unwrap().status_note.as_deref(),
            Some("inactive by qa: covered by sanitation PRP")
        );

        let hazard = plan
            .update_hazard_facts(&hazard_id, input(&step, 3, 5, all_false()), at(2025, 1, 4))
            .unwrap();
        assert_eq!(hazard.ccp_id.as_ref(), Some(&ccp_id));
        assert_eq!(plan.ccps().len(), 1);
        assert!(plan.ccp(&ccp_id).unwrap().is_active());
    }

    #[test]
    fn test_edit_of_ccp_hazard_keeps_manual_suspension() {
        let (mut plan, hazard_id, ccp_id) = plan_with_ccp();
        let step = plan.hazard(&hazard_id).unwrap().step_id.clone();
        plan.set_ccp_status(
            &ccp_id,
            CcpStatus::Suspended,
            ChangeSource::Manual {
                by: "qa".to_string(),
                reason: Some("line down for maintenance".to_string()),
            },
        )
        .unwrap();

        let mut edit = input(&step, 3, 5, all_false());
        edit.control_measures = Some("cook to 75 °C core".to_string());
        edit.ccp_setup = Some(CcpSetup {
            critical_limits: CriticalLimits::new(Some(3.0), Some(8.0), Some("°C".to_string())),
            ..chill_limits()
        });
        let hazard = plan
            .update_hazard_facts(&hazard_id, edit, at(2025, 1, 5))
            .unwrap();
        assert_eq!(hazard.risk_strategy, RiskStrategy::Ccp);

        let ccp = plan.ccp(&ccp_id).unwrap();
        assert_eq!(ccp.status, CcpStatus::Suspended);
        assert_eq!(
            ccp.status_note.as_deref(),
            Some("suspended by qa: line down for maintenance")
        );
        assert_eq!(ccp.critical_limits.min, Some(3.0));
        assert_eq!(ccp.critical_limits.max, Some(8.0));
    }

    #[test]
    fn test_linked_ccp_follows_hazard_to_new_step() {
        let (mut plan, hazard_id, ccp_id) = plan_with_ccp();
        let cook = plan.steps()[0].id.clone();
        let step = plan.hazard(&hazard_id).unwrap().step_id.clone();

        // Reclassified away from CCP first, so the CCP stays linked but not required
        let mut facts = all_false();
        facts.has_existing_prp_coverage = Some(true);
        plan.update_hazard_facts(&hazard_id, input(&step, 3, 5, facts), at(2025, 1, 3))
            .unwrap();
        plan.update_hazard_facts(&hazard_id, input(&cook, 3, 5, facts), at(2025, 1, 4))
            .unwrap();

        assert_eq!(plan.ccp(&ccp_id).unwrap().step_id, cook);
        assert!(plan.validate().is_ok());
    }

    #[test]
    fn test_ccp_numbers_are_sequential() {
        let (mut plan, cook, chill) = plan_with_steps();
        for step in [&cook, &chill] {
            plan.add_hazard(input(step, 4, 5, all_false()), "qa", at(2025, 1, 1))
                .unwrap();
        }
        let numbers: Vec<u32> = plan.ccps().iter().map(|c| c.ccp_number).collect();
        assert_eq!(numbers, vec![1, 2]);
    }

    #[test]
    fn test_monitoring_boundaries_and_corrective_action() {
        let (mut plan, _, ccp_id) = plan_with_ccp();

        let outcome = plan
            .record_monitoring(
                MonitoringInput {
                    ccp_id: ccp_id.clone(),
                    measured_value: 10.0,
                    timestamp: at(2025, 1, 5),
                    corrective_action_description: None,
                },
                "operator",
            )
            .unwrap();
        assert!(outcome.is_within_limits);
        assert!(!outcome.requires_corrective_action);

        let revision = plan.revision();
        let err = plan
            .record_monitoring(
                MonitoringInput {
                    ccp_id: ccp_id.clone(),
                    measured_value: 10.1,
                    timestamp: at(2025, 1, 5),
                    corrective_action_description: Some("   ".to_string()),
                },
                "operator",
            )
            .unwrap_err();
        assert!(matches!(err, HaccpError::Validation(_)));
        assert_eq!(plan.revision(), revision);
        assert_eq!(plan.monitoring_logs().len(), 1);

        let outcome = plan
            .record_monitoring(
                MonitoringInput {
                    ccp_id: ccp_id.clone(),
                    measured_value: 10.1,
                    timestamp: at(2025, 1, 5),
                    corrective_action_description: Some("Batch held, chiller reset".to_string()),
                },
                "operator",
            )
            .unwrap();
        assert!(!outcome.is_within_limits);
        assert!(outcome.requires_corrective_action);
        assert_eq!(plan.monitoring_for(&ccp_id).len(), 2);
    }

    #[test]
    fn test_monitoring_unknown_ccp() {
        let (mut plan, _, _) = plan_with_ccp();
        let err = plan
            .record_monitoring(
                MonitoringInput {
                    ccp_id: EntityId::new(EntityPrefix::Ccp),
                    measured_value: 4.0,
                    timestamp: at(2025, 1, 5),
                    corrective_action_description: None,
                },
                "operator",
            )
            .unwrap_err();
        assert!(matches!(err, HaccpError::NotFound { .. }));
    }

    #[test]
    fn test_monitoring_requires_active_ccp() {
        let (mut plan, _, ccp_id) = plan_with_ccp();
        plan.set_ccp_status(
            &ccp_id,
            CcpStatus::Suspended,
            ChangeSource::Manual {
                by: "qa".to_string(),
                reason: None,
            },
        )
        .unwrap();
        let err = plan
            .record_monitoring(
                MonitoringInput {
                    ccp_id,
                    measured_value: 4.0,
                    timestamp: at(2025, 1, 5),
                    corrective_action_description: None,
                },
                "operator",
            )
            .unwrap_err();
        assert!(matches!(err, HaccpError::Validation(_)));
    }

    #[test]
    fn test_verification_schedules_next_due() {
        let (mut plan, _, ccp_id) = plan_with_ccp();
        let outcome = plan
            .record_verification(
                VerificationInput {
                    ccp_id: ccp_id.clone(),
                    verified_at: at(2025, 1, 15),
                    is_compliant: true,
                    result: Some("records reviewed".to_string()),
                },
                "auditor",
                at(2025, 2, 16),
            )
            .unwrap();
        assert_eq!(outcome.next_due_at, at(2025, 2, 15));
        assert!(outcome.is_overdue);

        let ccp = plan.ccp(&ccp_id).unwrap();
        assert_eq!(ccp.last_verified_at, Some(at(2025, 1, 15)));
        assert_eq!(ccp.next_verification_due, at(2025, 2, 15));
        assert!(!schedule::is_overdue(ccp.next_verification_due, at(2025, 2, 15)));
    }

    #[test]
    fn test_backdated_verification_does_not_pull_schedule_back() {
        let (mut plan, _, ccp_id) = plan_with_ccp();
        let now = at(2025, 3, 1);
        for day in [20, 10] {
            plan.record_verification(
                VerificationInput {
                    ccp_id: ccp_id.clone(),
                    verified_at: at(2025, 2, day),
                    is_compliant: true,
                    result: None,
                },
                "auditor",
                now,
            )
            .unwrap();
        }
        assert_eq!(plan.ccp(&ccp_id).unwrap().next_verification_due, at(2025, 3, 20));
        assert_eq!(plan.verification_for(&ccp_id).len(), 2);
    }

    #[test]
    fn test_future_verification_rejected() {
        let (mut plan, _, ccp_id) = plan_with_ccp();
        let err = plan
            .record_verification(
                VerificationInput {
                    ccp_id,
                    verified_at: at(2025, 5, 1),
                    is_compliant: true,
                    result: None,
                },
                "auditor",
                at(2025, 4, 1),
            )
            .unwrap_err();
        assert!(matches!(err, HaccpError::Validation(_)));
    }

    #[test]
    fn test_dashboard_summary() {
        let (mut plan, _, ccp_id) = plan_with_ccp();
        for (day, value) in [(2, 12.0), (20, 11.0), (25, 4.0)] {
            plan.record_monitoring(
                MonitoringInput {
                    ccp_id: ccp_id.clone(),
                    measured_value: value,
                    timestamp: at(2025, 1, day),
                    corrective_action_description: Some("product held".to_string()),
                },
                "operator",
            )
            .unwrap();
        }

        let summary = plan.dashboard_summary(at(2025, 1, 28), Duration::days(7));
        assert_eq!(summary.total_ccps, 1);
        assert_eq!(summary.active_ccps, 1);
        assert_eq!(summary.out_of_spec_count, 0);
        assert_eq!(summary.pending_verification_count, 0);

        let summary = plan.dashboard_summary(at(2025, 2, 5), Duration::days(30));
        assert_eq!(summary.out_of_spec_count, 1);
        assert_eq!(summary.pending_verification_count, 1);
    }

    #[test]
    fn test_activation_requires_limits() {
        let (mut plan, _, ccp_id) = plan_with_ccp();
        plan.ccp_mut(&ccp_id).unwrap().critical_limits = CriticalLimits::default();
        plan.ccp_mut(&ccp_id).unwrap().status = CcpStatus::Inactive;
        let err = plan
            .set_ccp_status(
                &ccp_id,
                CcpStatus::Active,
                ChangeSource::Manual {
                    by: "qa".to_string(),
                    reason: None,
                },
            )
            .unwrap_err();
        assert!(matches!(err, HaccpError::Configuration(_)));
    }

    #[test]
    fn test_set_limits_validates() {
        let (mut plan, _, ccp_id) = plan_with_ccp();
        let err = plan
            .set_critical_limits(&ccp_id, CriticalLimits::new(None, None, None))
            .unwrap_err();
        assert!(matches!(err, HaccpError::Configuration(_)));
        let ccp = plan
            .set_critical_limits(&ccp_id, CriticalLimits::new(None, Some(5.0), None))
            .unwrap();
        assert_eq!(ccp.critical_limits.max, Some(5.0));
    }

    #[test]
    fn test_delete_hazard_guarded_by_active_ccp() {
        let (mut plan, hazard_id, ccp_id) = plan_with_ccp();
        let err = plan.delete_hazard(&hazard_id).unwrap_err();
        assert!(matches!(err, HaccpError::Validation(_)));

        plan.set_ccp_status(
            &ccp_id,
            CcpStatus::Inactive,
            ChangeSource::Manual {
                by: "qa".to_string(),
                reason: None,
            },
        )
        .unwrap();
        plan.delete_hazard(&hazard_id).unwrap();
        assert!(plan.hazards().is_empty());
        assert_eq!(plan.ccps().len(), 1);
    }

    #[test]
    fn test_product_deletion_guard() {
        let (mut plan, _, ccp_id) = plan_with_ccp();
        assert!(plan.ensure_deletable().is_err());
        plan.set_ccp_status(
            &ccp_id,
            CcpStatus::Inactive,
            ChangeSource::Manual {
                by: "qa".to_string(),
                reason: None,
            },
        )
        .unwrap();
        assert!(plan.ensure_deletable().is_ok());
    }

    #[test]
    fn test_steps_are_ordered_and_unique() {
        let (mut plan, _, _) = plan_with_steps();
        plan.add_step(10, "Receiving", None, StepParameters::default())
            .unwrap();
        let numbers: Vec<u32> = plan.steps().iter().map(|s| s.step_number).collect();
        assert_eq!(numbers, vec![10, 20, 30]);

        let err = plan
            .add_step(20, "Cooking again", None, StepParameters::default())
            .unwrap_err();
        assert!(matches!(err, HaccpError::Validation(_)));
    }

    #[test]
    fn test_remove_step_in_use() {
        let (mut plan, hazard_id, _) = plan_with_ccp();
        let step = plan.hazard(&hazard_id).unwrap().step_id.clone();
        assert!(matches!(
            plan.remove_step(&step),
            Err(HaccpError::Validation(_))
        ));
    }

    #[test]
    fn test_approval_requires_final_classification() {
        let (mut plan, cook, _) = plan_with_steps();
        plan.add_hazard(input(&cook, 4, 4, ControlFacts::default()), "qa", at(2025, 1, 1))
            .unwrap();
        assert!(matches!(
            plan.approve_plan("1.0", at(2025, 1, 2)),
            Err(HaccpError::Validation(_))
        ));
    }

    #[test]
    fn test_summary_counts() {
        let (mut plan, cook, chill) = plan_with_steps();
        plan.add_hazard(input(&cook, 1, 1, all_false()), "qa", at(2025, 1, 1))
            .unwrap();
        plan.add_hazard(input(&chill, 5, 5, all_false()), "qa", at(2025, 1, 1))
            .unwrap();
        let summary = plan.summary();
        assert_eq!(summary.hazards, 2);
        assert_eq!(summary.by_level.low, 1);
        assert_eq!(summary.by_level.critical, 1);
        assert_eq!(summary.by_strategy.ccp, 1);
        assert_eq!(summary.by_strategy.use_existing_prps, 1);
        assert_eq!(summary.active_ccps, 1);
    }

    #[test]
    fn test_validate_detects_hand_edited_score() {
        let (plan, _, _) = plan_with_ccp();
        let yaml = serde_yml::to_string(&plan).unwrap();
        let edited = yaml.replace("risk_score: 15", "risk_score: 3");
        let loaded: HazardPlan = serde_yml::from_str(&edited).unwrap();
        assert!(matches!(loaded.validate(), Err(HaccpError::Validation(_))));

        let loaded: HazardPlan = serde_yml::from_str(&yaml).unwrap();
        assert!(loaded.validate().is_ok());
        assert_eq!(loaded.revision(), plan.revision());
    }
}
