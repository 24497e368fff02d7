//! `haccp verify` command - CCP verification activities and schedule

use chrono::{DateTime, Utc};
use clap::Subcommand;
use console::style;
use miette::Result;
use serde::Serialize;

use crate::cli::helpers::{
    find_ccp, find_plan, format_date, into_report, open_store, parse_when, print_structured,
    truncate_str, update_plan,
};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::Config;
use crate::engine::plan::VerificationInput;
use crate::engine::registry::PlanRepository;

#[derive(Subcommand, Debug)]
pub enum VerifyCommands {
    /// Record a verification and reschedule the next one
    Record(RecordArgs),

    /// Show verification history
    List(ListArgs),

    /// List active CCPs whose verification is overdue
    Overdue(OverdueArgs),
}

#[derive(clap::Args, Debug)]
pub struct RecordArgs {
    /// Product code, ID or name fragment
    pub product: String,

    /// CCP number, label or ID
    pub ccp: String,

    /// Date of the verification (default: now)
    #[arg(long, value_parser = parse_when)]
    pub date: Option<DateTime<Utc>>,

    /// Mark the CCP as found non-compliant
    #[arg(long)]
    pub non_compliant: bool,

    /// What was checked and found
    #[arg(long, short = 'r')]
    pub result: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct ListArgs {
    /// Product code, ID or name fragment
    pub product: String,

    /// Only this CCP
    pub ccp: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct OverdueArgs {
    /// Only this product (default: all products)
    pub product: Option<String>,
}

/// One row of the overdue listing
#[derive(Debug, Serialize)]
struct OverdueRow {
    product: String,
    ccp_number: u32,
    ccp_id: String,
    next_verification_due: DateTime<Utc>,
    days_overdue: i64,
}

pub fn run(cmd: VerifyCommands, global: &GlobalOpts) -> Result<()> {
    match cmd {
        VerifyCommands::Record(args) => run_record(args, global),
        VerifyCommands::List(args) => run_list(args, global),
        VerifyCommands::Overdue(args) => run_overdue(args, global),
    }
}

fn run_record(args: RecordArgs, global: &GlobalOpts) -> Result<()> {
    let store = open_store(global)?;
    let plan = find_plan(&store, &args.product)?;
    let ccp = find_ccp(&plan, &args.ccp)?;
    let label = ccp.label();
    let now = Utc::now();

    let input = VerificationInput {
        ccp_id: ccp.id.clone(),
        verified_at: args.date.unwrap_or(now),
        is_compliant: !args.non_compliant,
        result: args.result,
    };
    let author = Config::load().author();
    let outcome = update_plan(&store, plan.product_id(), |plan| {
        plan.record_verification(input, &author, now)
    })?;

    match global.format {
        OutputFormat::Id => println!("{}", outcome.log_id),
        OutputFormat::Json | OutputFormat::Yaml => print_structured(&outcome, global.format)?,
        _ => {
            println!(
                "{} Verification of {} recorded",
                style("✓").green(),
                style(&label).cyan()
            );
            if args.non_compliant {
                println!("   {}", style("CCP found non-compliant").red());
            }
            let due = format_date(&outcome.next_due_at);
            if outcome.is_overdue {
                println!(
                    "   Next due: {} {}",
                    style(due).red(),
                    style("OVERDUE").red().bold()
                );
            } else {
                println!("   Next due: {}", style(due).cyan());
            }
        }
    }
    Ok(())
}

fn run_list(args: ListArgs, global: &GlobalOpts) -> Result<()> {
    let store = open_store(global)?;
    let plan = find_plan(&store, &args.product)?;

    let logs = match args.ccp {
        Some(ref query) => plan.verification_for(&find_ccp(&plan, query)?.id),
        None => {
            let mut all: Vec<_> = plan.verification_logs().iter().collect();
            all.sort_by_key(|l| l.verification_date);
            all
        }
    };

    match global.format {
        OutputFormat::Json | OutputFormat::Yaml => print_structured(&logs, global.format)?,
        OutputFormat::Id => {
            for log in &logs {
                println!("{}", log.id);
            }
        }
        OutputFormat::Tsv | OutputFormat::Auto => {
            if logs.is_empty() {
                println!("No verifications found.");
                return Ok(());
            }
            println!(
                "{:<12} {:<5} {:<14} {:<12} {:<12} {:<30}",
                style("DATE").bold(),
                style("CCP").bold(),
                style("COMPLIANT").bold(),
                style("NEXT DUE").bold(),
                style("BY").bold(),
                style("RESULT").bold()
            );
            println!("{}", "-".repeat(90));
            for log in &logs {
                let ccp = plan
                    .ccp(&log.ccp_id)
                    .map(|c| c.ccp_number.to_string())
                    .unwrap_or_else(|_| "?".to_string());
                let compliant = if log.is_compliant {
                    style("yes").green().to_string()
                } else {
                    style("no").red().to_string()
                };
                println!(
                    "{:<12} {:<5} {:<14} {:<12} {:<12} {:<30}",
                    format_date(&log.verification_date),
                    ccp,
                    compliant,
                    format_date(&log.next_due_at),
                    truncate_str(&log.verified_by, 12),
                    truncate_str(log.result.as_deref().unwrap_or("-"), 30)
                );
            }
        }
    }
    Ok(())
}

fn run_overdue(args: OverdueArgs, global: &GlobalOpts) -> Result<()> {
    let store = open_store(global)?;
    let plans = match args.product {
        Some(ref query) => vec![find_plan(&store, query)?],
        None => store.list().map_err(into_report)?,
    };
    let now = Utc::now();

    let rows: Vec<OverdueRow> = plans
        .iter()
        .flat_map(|plan| {
            plan.overdue_verifications(now)
                .into_iter()
                .map(|ccp| OverdueRow {
                    product: plan.product().code.clone(),
                    ccp_number: ccp.ccp_number,
                    ccp_id: ccp.id.to_string(),
                    next_verification_due: ccp.next_verification_due,
                    days_overdue: (now - ccp.next_verification_due).num_days(),
                })
                .collect::<Vec<_>>()
        })
        .collect();

    match global.format {
        OutputFormat::Json | OutputFormat::Yaml => print_structured(&rows, global.format)?,
        OutputFormat::Id => {
            for row in &rows {
                println!("{}", row.ccp_id);
            }
        }
        OutputFormat::Tsv | OutputFormat::Auto => {
            if rows.is_empty() {
                println!("{} No verifications overdue", style("✓").green());
                return Ok(());
            }
            println!(
                "{:<10} {:<5} {:<12} {:<6}",
                style("PRODUCT").bold(),
                style("CCP").bold(),
                style("DUE").bold(),
                style("DAYS").bold()
            );
            println!("{}", "-".repeat(36));
            for row in &rows {
                println!(
                    "{:<10} {:<5} {:<12} {:<6}",
                    row.product,
                    row.ccp_number,
                    format_date(&row.next_verification_due),
                    style(row.days_overdue).red()
                );
            }
            if !global.quiet {
                println!();
                println!("{} overdue verification(s)", style(rows.len()).red());
            }
        }
    }
    Ok(())
}
