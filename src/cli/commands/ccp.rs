//! `haccp ccp` command - Critical Control Points

use clap::Subcommand;
use console::style;
use miette::Result;

use crate::cli::helpers::{
    find_ccp, find_plan, format_date, format_short_id, open_store, print_structured,
    truncate_str, update_plan,
};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::Config;
use crate::engine::limits::CriticalLimits;
use crate::engine::plan::ChangeSource;
use crate::engine::schedule;
use crate::entities::ccp::{Ccp, CcpStatus};

#[derive(Subcommand, Debug)]
pub enum CcpCommands {
    /// List a product's CCPs
    List(ListArgs),

    /// Show a CCP's details
    Show(CcpRef),

    /// Set a CCP's critical limits
    Limits(LimitsArgs),

    /// Reactivate a CCP (requires critical limits)
    Activate(StatusArgs),

    /// Take a CCP out of service
    Deactivate(StatusArgs),

    /// Temporarily suspend monitoring of a CCP
    Suspend(StatusArgs),
}

#[derive(clap::Args, Debug)]
pub struct ListArgs {
    /// Product code, ID or name fragment
    pub product: String,

    /// Only CCPs with this status
    #[arg(long)]
    pub status: Option<CcpStatus>,
}

#[derive(clap::Args, Debug)]
pub struct CcpRef {
    /// Product code, ID or name fragment
    pub product: String,

    /// CCP number, label ("CCP 2") or ID
    pub ccp: String,
}

#[derive(clap::Args, Debug)]
pub struct LimitsArgs {
    #[command(flatten)]
    pub target: CcpRef,

    /// Critical limit minimum
    #[arg(long, allow_negative_numbers = true)]
    pub min: Option<f64>,

    /// Critical limit maximum
    #[arg(long, allow_negative_numbers = true)]
    pub max: Option<f64>,

    /// Unit of measure
    #[arg(long)]
    pub unit: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct StatusArgs {
    #[command(flatten)]
    pub target: CcpRef,

    /// Why the status changes
    #[arg(long, short = 'r')]
    pub reason: Option<String>,
}

pub fn run(cmd: CcpCommands, global: &GlobalOpts) -> Result<()> {
    match cmd {
        CcpCommands::List(args) => run_list(args, global),
        CcpCommands::Show(args) => run_show(args, global),
        CcpCommands::Limits(args) => run_limits(args, global),
        CcpCommands::Activate(args) => run_status(args, CcpStatus::Active, global),
        CcpCommands::Deactivate(args) => run_status(args, CcpStatus::Inactive, global),
        CcpCommands::Suspend(args) => run_status(args, CcpStatus::Suspended, global),
    }
}

fn run_list(args: ListArgs, global: &GlobalOpts) -> Result<()> {
    let store = open_store(global)?;
    let plan = find_plan(&store, &args.product)?;
    let now = chrono::Utc::now();

    let ccps: Vec<&Ccp> = plan
        .ccps()
        .iter()
        .filter(|c| args.status.map_or(true, |s| c.status == s))
        .collect();

    match global.format {
        OutputFormat::Json | OutputFormat::Yaml => print_structured(&ccps, global.format)?,
        OutputFormat::Id => {
            for ccp in &ccps {
                println!("{}", ccp.id);
            }
        }
        OutputFormat::Tsv | OutputFormat::Auto => {
            if ccps.is_empty() {
                println!("No CCPs in {}.", plan.product().code);
                return Ok(());
            }
            println!(
                "{:<5} {:<10} {:<6} {:<28} {:<18} {:<12}",
                style("CCP").bold(),
                style("STATUS").bold(),
                style("STEP").bold(),
                style("HAZARD").bold(),
                style("LIMITS").bold(),
                style("NEXT VERIF.").bold()
            );
            println!("{}", "-".repeat(84));
            for ccp in &ccps {
                let step = plan
                    .step(&ccp.step_id)
                    .map(|s| s.step_number.to_string())
                    .unwrap_or_else(|_| "?".to_string());
                let hazard = plan
                    .hazard(&ccp.hazard_id)
                    .map(|h| h.description.clone())
                    .unwrap_or_else(|_| "(deleted)".to_string());
                let due = format_date(&ccp.next_verification_due);
                let due = if ccp.is_active() && schedule::is_overdue(ccp.next_verification_due, now) {
                    style(due).red().to_string()
                } else {
                    due
                };
                println!(
                    "{:<5} {:<10} {:<6} {:<28} {:<18} {:<12}",
                    ccp.ccp_number,
                    style_status(ccp.status),
                    step,
                    truncate_str(&hazard, 26),
                    truncate_str(&ccp.critical_limits.describe(), 18),
                    due
                );
            }
        }
    }
    Ok(())
}

fn run_show(args: CcpRef, global: &GlobalOpts) -> Result<()> {
    let store = open_store(global)?;
    let plan = find_plan(&store, &args.product)?;
    let ccp = find_ccp(&plan, &args.ccp)?;
    let now = chrono::Utc::now();

    match global.format {
        OutputFormat::Id => println!("{}", ccp.id),
        OutputFormat::Json | OutputFormat::Yaml => print_structured(ccp, global.format)?,
        _ => {
            println!(
                "{} {}",
                style(ccp.label()).bold(),
                style(format!("({})", ccp.id)).dim()
            );
            println!("{}", "─".repeat(60));
            println!("Status:       {}", style_status(ccp.status));
            if let Some(ref note) = ccp.status_note {
                println!("              {}", style(note).dim());
            }
            if let Ok(step) = plan.step(&ccp.step_id) {
                println!("Step:         {} {}", step.step_number, step.name);
            }
            match plan.hazard(&ccp.hazard_id) {
                Ok(hazard) => println!(
                    "Hazard:       {} ({})",
                    hazard.description,
                    format_short_id(&hazard.id)
                ),
                Err(_) => println!("Hazard:       {}", style("(deleted)").dim()),
            }
            println!("Limits:       {}", ccp.critical_limits.describe());
            println!(
                "Monitoring:   {} {}",
                ccp.monitoring.frequency.as_deref().unwrap_or("-"),
                ccp.monitoring
                    .method
                    .as_deref()
                    .map(|m| format!("({})", m))
                    .unwrap_or_default()
            );
            println!("Verification: {}", ccp.verification.cadence);
            if let Some(last) = ccp.last_verified_at {
                println!("Last verified: {}", format_date(&last));
            }
            let overdue = ccp.is_active() && schedule::is_overdue(ccp.next_verification_due, now);
            println!(
                "Next due:     {}{}",
                format_date(&ccp.next_verification_due),
                if overdue {
                    style(" OVERDUE").red().bold().to_string()
                } else {
                    String::new()
                }
            );
            let readings = plan.monitoring_for(&ccp.id);
            let out_of_spec = readings.iter().filter(|l| !l.is_within_limits).count();
            println!(
                "Readings:     {} ({} out of spec)",
                readings.len(),
                out_of_spec
            );
        }
    }
    Ok(())
}

fn run_limits(args: LimitsArgs, global: &GlobalOpts) -> Result<()> {
    let store = open_store(global)?;
    let plan = find_plan(&store, &args.target.product)?;
    let current = find_ccp(&plan, &args.target.ccp)?;
    let ccp_id = current.id.clone();

    let mut limits: CriticalLimits = current.critical_limits.clone();
    if args.min.is_some() {
        limits.min = args.min;
    }
    if args.max.is_some() {
        limits.max = args.max;
    }
    if args.unit.is_some() {
        limits.unit = args.unit;
    }

    let ccp = update_plan(&store, plan.product_id(), |plan| {
        plan.set_critical_limits(&ccp_id, limits).cloned()
    })?;

    println!(
        "{} {} limits set to {}",
        style("✓").green(),
        style(ccp.label()).cyan(),
        ccp.critical_limits.describe()
    );
    Ok(())
}

fn run_status(args: StatusArgs, status: CcpStatus, global: &GlobalOpts) -> Result<()> {
    let store = open_store(global)?;
    let plan = find_plan(&store, &args.target.product)?;
    let ccp_id = find_ccp(&plan, &args.target.ccp)?.id.clone();

    if status != CcpStatus::Active && args.reason.as_deref().map_or(true, |r| r.trim().is_empty()) {
        return Err(miette::miette!(
            help = "e.g. --reason \"hazard now covered by sanitation PRP\"",
            "A reason is required to {} a CCP",
            if status == CcpStatus::Inactive { "deactivate" } else { "suspend" }
        ));
    }

    let source = ChangeSource::Manual {
        by: Config::load().author(),
        reason: args.reason,
    };
    let ccp = update_plan(&store, plan.product_id(), |plan| {
        plan.set_ccp_status(&ccp_id, status, source).cloned()
    })?;

    println!(
        "{} {} is now {}",
        style("✓").green(),
        style(ccp.label()).cyan(),
        style_status(ccp.status)
    );
    Ok(())
}

pub(crate) fn style_status(status: CcpStatus) -> String {
    let text = status.to_string();
    match status {
        CcpStatus::Active => style(text).green().to_string(),
        CcpStatus::Suspended => style(text).yellow().to_string(),
        CcpStatus::Inactive => style(text).dim().to_string(),
    }
}
