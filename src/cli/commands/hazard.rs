//! `haccp hazard` command - Hazard analysis and CCP determination

use chrono::Utc;
use clap::Subcommand;
use console::style;
use miette::Result;

use crate::cli::helpers::{
    find_hazard, find_plan, find_step, format_answer, format_short_id, open_store, parse_answer,
    print_structured, truncate_str, update_plan,
};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::Config;
use crate::engine::classifier::RiskStrategy;
use crate::engine::limits::CriticalLimits;
use crate::engine::plan::{CcpSetup, HazardInput, HazardPlan};
use crate::engine::risk::RiskLevel;
use crate::engine::schedule::Cadence;
use crate::entities::ccp::{Ccp, MonitoringPlan, VerificationPlan};
use crate::entities::hazard::{ControlFacts, Hazard, HazardType};

#[derive(Subcommand, Debug)]
pub enum HazardCommands {
    /// Record a hazard, score it and determine its control strategy
    Add(AddArgs),

    /// Change a hazard's ratings or facts and re-run the determination
    Update(UpdateArgs),

    /// List hazards with filtering
    List(ListArgs),

    /// Show a hazard's details
    Show(ShowArgs),

    /// Delete a hazard
    Delete(ShowArgs),
}

/// Answers to the CCP decision questions
#[derive(clap::Args, Debug, Default)]
pub struct FactArgs {
    /// Is the hazard already controlled at this step? (yes/no)
    #[arg(long, value_parser = parse_answer, value_name = "YES|NO")]
    pub controlled: Option<bool>,

    /// Will a later step eliminate or reduce the hazard? (yes/no)
    #[arg(long, value_parser = parse_answer, value_name = "YES|NO")]
    pub subsequent_control: Option<bool>,

    /// Do existing prerequisite programs cover the hazard? (yes/no)
    #[arg(long, value_parser = parse_answer, value_name = "YES|NO")]
    pub prp_coverage: Option<bool>,
}

impl FactArgs {
    fn apply_to(&self, mut facts: ControlFacts) -> ControlFacts {
        if self.controlled.is_some() {
            facts.is_controlled = self.controlled;
        }
        if self.subsequent_control.is_some() {
            facts.has_subsequent_step_control = self.subsequent_control;
        }
        if self.prp_coverage.is_some() {
            facts.has_existing_prp_coverage = self.prp_coverage;
        }
        facts
    }
}

/// CCP details, used only when the hazard is determined to be a CCP
#[derive(clap::Args, Debug, Default)]
pub struct CcpSetupArgs {
    /// Critical limit minimum
    #[arg(long, allow_negative_numbers = true)]
    pub min: Option<f64>,

    /// Critical limit maximum
    #[arg(long, allow_negative_numbers = true)]
    pub max: Option<f64>,

    /// Unit of the critical limits (e.g. °C, pH, min)
    #[arg(long)]
    pub unit: Option<String>,

    /// Monitoring frequency (e.g. "every batch")
    #[arg(long)]
    pub frequency: Option<String>,

    /// Monitoring method
    #[arg(long)]
    pub monitoring_method: Option<String>,

    /// Verification cadence (daily, weekly, monthly, quarterly, annually)
    #[arg(long)]
    pub cadence: Option<Cadence>,

    /// Verification method
    #[arg(long)]
    pub verification_method: Option<String>,
}

impl CcpSetupArgs {
    fn is_empty(&self) -> bool {
        self.min.is_none()
            && self.max.is_none()
            && self.unit.is_none()
            && self.frequency.is_none()
            && self.monitoring_method.is_none()
            && self.cadence.is_none()
            && self.verification_method.is_none()
    }

    /// Build a setup from the flags, starting from an existing CCP if any
    fn build(self, existing: Option<&Ccp>, default_cadence: Cadence) -> Option<CcpSetup> {
        if self.is_empty() {
            return None;
        }
        let mut setup = match existing {
            Some(ccp) => CcpSetup {
                critical_limits: ccp.critical_limits.clone(),
                monitoring: ccp.monitoring.clone(),
                verification: ccp.verification.clone(),
            },
            None => CcpSetup {
                critical_limits: CriticalLimits::default(),
                monitoring: MonitoringPlan::default(),
                verification: VerificationPlan {
                    cadence: default_cadence,
                    method: None,
                },
            },
        };
        if self.min.is_some() {
            setup.critical_limits.min = self.min;
        }
        if self.max.is_some() {
            setup.critical_limits.max = self.max;
        }
        if self.unit.is_some() {
            setup.critical_limits.unit = self.unit;
        }
        if self.frequency.is_some() {
            setup.monitoring.frequency = self.frequency;
        }
        if self.monitoring_method.is_some() {
            setup.monitoring.method = self.monitoring_method;
        }
        if let Some(cadence) = self.cadence {
            setup.verification.cadence = cadence;
        }
        if self.verification_method.is_some() {
            setup.verification.method = self.verification_method;
        }
        Some(setup)
    }
}

#[derive(clap::Args, Debug)]
pub struct AddArgs {
    /// Product code, ID or name fragment
    pub product: String,

    /// Step where the hazard occurs (number, ID or name)
    #[arg(long)]
    pub step: String,

    /// Hazard type (biological, chemical, physical, allergen)
    #[arg(long, short = 't')]
    pub r#type: HazardType,

    /// What can go wrong
    #[arg(long, short = 'd')]
    pub description: String,

    /// Likelihood rating (1-5)
    #[arg(long, short = 'l', allow_negative_numbers = true)]
    pub likelihood: i64,

    /// Severity rating (1-5)
    #[arg(long, short = 's', allow_negative_numbers = true)]
    pub severity: i64,

    #[command(flatten)]
    pub facts: FactArgs,

    /// Existing control measures
    #[arg(long)]
    pub control_measures: Option<String>,

    /// Later step expected to control the hazard
    #[arg(long)]
    pub subsequent_step: Option<String>,

    /// Reasoning behind the determination
    #[arg(long)]
    pub justification: Option<String>,

    #[command(flatten)]
    pub ccp: CcpSetupArgs,
}

#[derive(clap::Args, Debug)]
pub struct UpdateArgs {
    /// Product code, ID or name fragment
    pub product: String,

    /// Hazard ID or description fragment
    pub hazard: String,

    /// Move the hazard to another step
    #[arg(long)]
    pub step: Option<String>,

    /// Hazard type
    #[arg(long, short = 't')]
    pub r#type: Option<HazardType>,

    /// What can go wrong
    #[arg(long, short = 'd')]
    pub description: Option<String>,

    /// Likelihood rating (1-5)
    #[arg(long, short = 'l', allow_negative_numbers = true)]
    pub likelihood: Option<i64>,

    /// Severity rating (1-5)
    #[arg(long, short = 's', allow_negative_numbers = true)]
    pub severity: Option<i64>,

    #[command(flatten)]
    pub facts: FactArgs,

    /// Existing control measures
    #[arg(long)]
    pub control_measures: Option<String>,

    /// Later step expected to control the hazard
    #[arg(long)]
    pub subsequent_step: Option<String>,

    /// Reasoning behind the determination
    #[arg(long)]
    pub justification: Option<String>,

    #[command(flatten)]
    pub ccp: CcpSetupArgs,
}

#[derive(clap::Args, Debug)]
pub struct ListArgs {
    /// Product code, ID or name fragment
    pub product: String,

    /// Only hazards at this step
    #[arg(long)]
    pub step: Option<String>,

    /// Only hazards at this risk level
    #[arg(long)]
    pub level: Option<RiskLevel>,

    /// Only hazards with this control strategy
    #[arg(long)]
    pub strategy: Option<RiskStrategy>,

    /// Show count only, not the items
    #[arg(long)]
    pub count: bool,
}

#[derive(clap::Args, Debug)]
pub struct ShowArgs {
    /// Product code, ID or name fragment
    pub product: String,

    /// Hazard ID or description fragment
    pub hazard: String,
}

pub fn run(cmd: HazardCommands, global: &GlobalOpts) -> Result<()> {
    match cmd {
        HazardCommands::Add(args) => run_add(args, global),
        HazardCommands::Update(args) => run_update(args, global),
        HazardCommands::List(args) => run_list(args, global),
        HazardCommands::Show(args) => run_show(args, global),
        HazardCommands::Delete(args) => run_delete(args, global),
    }
}

fn run_add(args: AddArgs, global: &GlobalOpts) -> Result<()> {
    let store = open_store(global)?;
    let config = Config::load();
    let plan = find_plan(&store, &args.product)?;

    let step_id = find_step(&plan, &args.step)?.id.clone();
    let subsequent_step = match args.subsequent_step {
        Some(ref query) => Some(find_step(&plan, query)?.id.clone()),
        None => None,
    };

    let input = HazardInput {
        process_step_id: step_id,
        hazard_type: args.r#type,
        description: args.description,
        likelihood: args.likelihood,
        severity: args.severity,
        facts: args.facts.apply_to(ControlFacts::default()),
        control_measures: args.control_measures,
        subsequent_step,
        justification: args.justification,
        ccp_setup: args.ccp.build(None, config.verification_cadence()),
    };

    let author = config.author();
    let (hazard, updated) = update_plan(&store, plan.product_id(), |plan| {
        let hazard = plan.add_hazard(input, &author, Utc::now())?.clone();
        Ok((hazard, plan.clone()))
    })?;

    print_outcome("Recorded", &hazard, &updated, global)
}

fn run_update(args: UpdateArgs, global: &GlobalOpts) -> Result<()> {
    let store = open_store(global)?;
    let config = Config::load();
    let plan = find_plan(&store, &args.product)?;
    let existing = find_hazard(&plan, &args.hazard)?;
    let hazard_id = existing.id.clone();

    let step_id = match args.step {
        Some(ref query) => find_step(&plan, query)?.id.clone(),
        None => existing.step_id.clone(),
    };
    let subsequent_step = match args.subsequent_step {
        Some(ref query) if query.trim().is_empty() || query == "none" => None,
        Some(ref query) => Some(find_step(&plan, query)?.id.clone()),
        None => existing.subsequent_step.clone(),
    };
    let existing_ccp = match existing.ccp_id {
        Some(ref id) => plan.ccp(id).ok(),
        None => None,
    };

    let input = HazardInput {
        process_step_id: step_id,
        hazard_type: args.r#type.unwrap_or(existing.hazard_type),
        description: args.description.unwrap_or_else(|| existing.description.clone()),
        likelihood: args.likelihood.unwrap_or(i64::from(existing.likelihood)),
        severity: args.severity.unwrap_or(i64::from(existing.severity)),
        facts: args.facts.apply_to(existing.facts),
        control_measures: args
            .control_measures
            .or_else(|| existing.control_measures.clone()),
        subsequent_step,
        justification: args.justification.or_else(|| existing.justification.clone()),
        ccp_setup: args.ccp.build(existing_ccp, config.verification_cadence()),
    };

    let (hazard, updated) = update_plan(&store, plan.product_id(), |plan| {
        let hazard = plan
            .update_hazard_facts(&hazard_id, input, Utc::now())?
            .clone();
        Ok((hazard, plan.clone()))
    })?;

    print_outcome("Updated", &hazard, &updated, global)
}

fn print_outcome(verb: &str, hazard: &Hazard, plan: &HazardPlan, global: &GlobalOpts) -> Result<()> {
    match global.format {
        OutputFormat::Id => println!("{}", hazard.id),
        OutputFormat::Json | OutputFormat::Yaml => print_structured(hazard, global.format)?,
        _ => {
            println!(
                "{} {} hazard {}",
                style("✓").green(),
                verb,
                style(format_short_id(&hazard.id)).cyan()
            );
            println!(
                "   Risk: {} x {} = {} ({})",
                hazard.likelihood,
                hazard.severity,
                hazard.risk_score,
                style_level(hazard.risk_level)
            );
            println!("   Strategy: {}", style_strategy(hazard.risk_strategy));

            if let Some(ccp) = hazard.ccp_id.as_ref().and_then(|id| plan.ccp(id).ok()) {
                if hazard.is_ccp {
                    println!(
                        "   {}: {} limits {} ({})",
                        style(ccp.label()).cyan().bold(),
                        ccp.status,
                        ccp.critical_limits.describe(),
                        style(&ccp.id).dim()
                    );
                } else if ccp.is_open() {
                    println!(
                        "   {} {} is still {}; deactivate it with {} if it is no longer needed",
                        style("!").yellow(),
                        ccp.label(),
                        ccp.status,
                        style(format!("haccp ccp deactivate {} {}", plan.product().code, ccp.ccp_number))
                            .yellow()
                    );
                }
            }
            if hazard.risk_strategy == RiskStrategy::FurtherAnalysis && !global.quiet {
                println!(
                    "   Answer {} to complete the determination",
                    style("--controlled, --subsequent-control, --prp-coverage").yellow()
                );
            }
        }
    }
    Ok(())
}

fn run_list(args: ListArgs, global: &GlobalOpts) -> Result<()> {
    let store = open_store(global)?;
    let plan = find_plan(&store, &args.product)?;
    let step_filter = match args.step {
        Some(ref query) => Some(find_step(&plan, query)?.id.clone()),
        None => None,
    };

    let hazards: Vec<&Hazard> = plan
        .hazards()
        .iter()
        .filter(|h| step_filter.as_ref().map_or(true, |s| &h.step_id == s))
        .filter(|h| args.level.map_or(true, |l| h.risk_level == l))
        .filter(|h| args.strategy.map_or(true, |s| h.risk_strategy == s))
        .collect();

    if args.count {
        println!("{}", hazards.len());
        return Ok(());
    }

    match global.format {
        OutputFormat::Json | OutputFormat::Yaml => print_structured(&hazards, global.format)?,
        OutputFormat::Id => {
            for hazard in &hazards {
                println!("{}", hazard.id);
            }
        }
        OutputFormat::Tsv | OutputFormat::Auto => {
            if hazards.is_empty() {
                println!("No hazards found.");
                return Ok(());
            }
            println!(
                "{:<17} {:<5} {:<11} {:<30} {:<3} {:<3} {:<5} {:<9} {:<18} {:<5}",
                style("ID").bold(),
                style("STEP").bold(),
                style("TYPE").bold(),
                style("DESCRIPTION").bold(),
                style("L").bold(),
                style("S").bold(),
                style("SCORE").bold(),
                style("LEVEL").bold(),
                style("STRATEGY").bold(),
                style("CCP").bold()
            );
            println!("{}", "-".repeat(115));
            for hazard in &hazards {
                let step = plan
                    .step(&hazard.step_id)
                    .map(|s| s.step_number.to_string())
                    .unwrap_or_else(|_| "?".to_string());
                let ccp = hazard
                    .ccp_id
                    .as_ref()
                    .and_then(|id| plan.ccp(id).ok())
                    .map(|c| c.ccp_number.to_string())
                    .unwrap_or_else(|| "-".to_string());
                println!(
                    "{:<17} {:<5} {:<11} {:<30} {:<3} {:<3} {:<5} {:<9} {:<18} {:<5}",
                    format_short_id(&hazard.id),
                    step,
                    hazard.hazard_type.to_string(),
                    truncate_str(&hazard.description, 28),
                    hazard.likelihood,
                    hazard.severity,
                    hazard.risk_score,
                    style_level(hazard.risk_level),
                    hazard.risk_strategy.to_string(),
                    ccp
                );
            }
            if !global.quiet {
                println!();
                println!("{} hazard(s) found", style(hazards.len()).cyan());
            }
        }
    }
    Ok(())
}

fn run_show(args: ShowArgs, global: &GlobalOpts) -> Result<()> {
    let store = open_store(global)?;
    let plan = find_plan(&store, &args.product)?;
    let hazard = find_hazard(&plan, &args.hazard)?;

    match global.format {
        OutputFormat::Id => println!("{}", hazard.id),
        OutputFormat::Json | OutputFormat::Yaml => print_structured(hazard, global.format)?,
        _ => {
            let step = plan.step(&hazard.step_id).ok();
            println!("{}", style(&hazard.description).bold());
            println!("{}", "─".repeat(60));
            println!("ID:          {}", hazard.id);
            if let Some(step) = step {
                println!("Step:        {} {}", step.step_number, step.name);
            }
            println!("Type:        {}", hazard.hazard_type);
            println!(
                "Risk:        {} x {} = {} ({})",
                hazard.likelihood,
                hazard.severity,
                hazard.risk_score,
                style_level(hazard.risk_level)
            );
            println!("Controlled:  {}", format_answer(hazard.facts.is_controlled));
            println!(
                "Later step:  {}",
                format_answer(hazard.facts.has_subsequent_step_control)
            );
            println!(
                "PRP covered: {}",
                format_answer(hazard.facts.has_existing_prp_coverage)
            );
            println!("Strategy:    {}", style_strategy(hazard.risk_strategy));
            if let Some(ref measures) = hazard.control_measures {
                println!("Measures:    {}", measures);
            }
            if let Some(later) = hazard.subsequent_step.as_ref().and_then(|id| plan.step(id).ok()) {
                println!("Controlled at: {} {}", later.step_number, later.name);
            }
            if let Some(ref justification) = hazard.justification {
                println!("Justification: {}", justification);
            }
            if let Some(ccp) = hazard.ccp_id.as_ref().and_then(|id| plan.ccp(id).ok()) {
                println!(
                    "CCP:         {} ({}, limits {})",
                    ccp.label(),
                    ccp.status,
                    ccp.critical_limits.describe()
                );
            }
            println!("Author:      {}", hazard.author);
            println!("Created:     {}", hazard.created.format("%Y-%m-%d %H:%M"));
        }
    }
    Ok(())
}

fn run_delete(args: ShowArgs, global: &GlobalOpts) -> Result<()> {
    let store = open_store(global)?;
    let plan = find_plan(&store, &args.product)?;
    let hazard_id = find_hazard(&plan, &args.hazard)?.id.clone();

    let removed = update_plan(&store, plan.product_id(), |plan| plan.delete_hazard(&hazard_id))?;

    println!(
        "{} Deleted hazard {} ({})",
        style("✓").green(),
        style(format_short_id(&removed.id)).cyan(),
        truncate_str(&removed.description, 40)
    );
    Ok(())
}

pub(crate) fn style_level(level: RiskLevel) -> String {
    let text = level.to_string();
    match level {
        RiskLevel::Critical => style(text).red().bold().to_string(),
        RiskLevel::High => style(text).red().to_string(),
        RiskLevel::Medium => style(text).yellow().to_string(),
        RiskLevel::Low => style(text).green().to_string(),
    }
}

pub(crate) fn style_strategy(strategy: RiskStrategy) -> String {
    let text = strategy.to_string();
    match strategy {
        RiskStrategy::Ccp => style(text).red().bold().to_string(),
        RiskStrategy::Opprp => style(text).yellow().to_string(),
        RiskStrategy::UseExistingPrps => style(text).green().to_string(),
        RiskStrategy::FurtherAnalysis | RiskStrategy::Undetermined => style(text).dim().to_string(),
    }
}
