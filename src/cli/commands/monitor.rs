//! `haccp monitor` command - CCP monitoring readings

use chrono::{DateTime, Utc};
use clap::Subcommand;
use console::style;
use miette::Result;

use crate::cli::helpers::{
    find_ccp, find_plan, open_store, parse_when, print_structured, truncate_str, update_plan,
};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::Config;
use crate::engine::plan::MonitoringInput;
use crate::entities::logs::MonitoringLog;

#[derive(Subcommand, Debug)]
pub enum MonitorCommands {
    /// Record a reading and check it against the critical limits
    Record(RecordArgs),

    /// Show monitoring history
    List(ListArgs),
}

#[derive(clap::Args, Debug)]
pub struct RecordArgs {
    /// Product code, ID or name fragment
    pub product: String,

    /// CCP number, label or ID
    pub ccp: String,

    /// Measured value
    #[arg(long, allow_negative_numbers = true)]
    pub value: f64,

    /// When the reading was taken (default: now)
    #[arg(long, value_parser = parse_when)]
    pub at: Option<DateTime<Utc>>,

    /// Corrective action taken (required when out of spec)
    #[arg(long, short = 'c')]
    pub corrective_action: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct ListArgs {
    /// Product code, ID or name fragment
    pub product: String,

    /// Only this CCP
    pub ccp: Option<String>,

    /// Only out-of-spec readings
    #[arg(long)]
    pub out_of_spec: bool,

    /// Limit output to the N most recent readings
    #[arg(long, short = 'n')]
    pub limit: Option<usize>,
}

pub fn run(cmd: MonitorCommands, global: &GlobalOpts) -> Result<()> {
    match cmd {
        MonitorCommands::Record(args) => run_record(args, global),
        MonitorCommands::List(args) => run_list(args, global),
    }
}

fn run_record(args: RecordArgs, global: &GlobalOpts) -> Result<()> {
    let store = open_store(global)?;
    let plan = find_plan(&store, &args.product)?;
    let ccp = find_ccp(&plan, &args.ccp)?;
    let label = ccp.label();
    let limits = ccp.critical_limits.describe();

    let input = MonitoringInput {
        ccp_id: ccp.id.clone(),
        measured_value: args.value,
        timestamp: args.at.unwrap_or_else(Utc::now),
        corrective_action_description: args.corrective_action,
    };
    let author = Config::load().author();
    let outcome = update_plan(&store, plan.product_id(), |plan| {
        plan.record_monitoring(input, &author)
    })?;

    match global.format {
        OutputFormat::Id => println!("{}", outcome.log_id),
        OutputFormat::Json | OutputFormat::Yaml => print_structured(&outcome, global.format)?,
        _ => {
            if outcome.is_within_limits {
                println!(
                    "{} {} reading {} is within limits ({})",
                    style("✓").green(),
                    style(&label).cyan(),
                    args.value,
                    limits
                );
            } else {
                println!(
                    "{} {} reading {} is {} ({}); corrective action logged",
                    style("!").red().bold(),
                    style(&label).cyan(),
                    args.value,
                    style("OUT OF SPEC").red().bold(),
                    limits
                );
            }
        }
    }
    Ok(())
}

fn run_list(args: ListArgs, global: &GlobalOpts) -> Result<()> {
    let store = open_store(global)?;
    let plan = find_plan(&store, &args.product)?;

    let mut logs: Vec<&MonitoringLog> = match args.ccp {
        Some(ref query) => plan.monitoring_for(&find_ccp(&plan, query)?.id),
        None => {
            let mut all: Vec<&MonitoringLog> = plan.monitoring_logs().iter().collect();
            all.sort_by_key(|l| l.timestamp);
            all
        }
    };
    if args.out_of_spec {
        logs.retain(|l| !l.is_within_limits);
    }
    if let Some(limit) = args.limit {
        let skip = logs.len().saturating_sub(limit);
        logs.drain(..skip);
    }

    match global.format {
        OutputFormat::Json | OutputFormat::Yaml => print_structured(&logs, global.format)?,
        OutputFormat::Id => {
            for log in &logs {
                println!("{}", log.id);
            }
        }
        OutputFormat::Tsv | OutputFormat::Auto => {
            if logs.is_empty() {
                println!("No monitoring readings found.");
                return Ok(());
            }
            println!(
                "{:<17} {:<5} {:<10} {:<12} {:<12} {:<30}",
                style("TIME").bold(),
                style("CCP").bold(),
                style("VALUE").bold(),
                style("RESULT").bold(),
                style("BY").bold(),
                style("CORRECTIVE ACTION").bold()
            );
            println!("{}", "-".repeat(90));
            for log in &logs {
                let ccp = plan
                    .ccp(&log.ccp_id)
                    .map(|c| c.ccp_number.to_string())
                    .unwrap_or_else(|_| "?".to_string());
                let result = if log.is_within_limits {
                    style("ok").green().to_string()
                } else {
                    style("OUT OF SPEC").red().to_string()
                };
                println!(
                    "{:<17} {:<5} {:<10} {:<12} {:<12} {:<30}",
                    log.timestamp.format("%Y-%m-%d %H:%M"),
                    ccp,
                    log.measured_value,
                    result,
                    truncate_str(&log.recorded_by, 12),
                    truncate_str(log.corrective_action_description.as_deref().unwrap_or("-"), 30)
                );
            }
        }
    }
    Ok(())
}
