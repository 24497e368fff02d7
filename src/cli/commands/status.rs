//! `haccp status` command - CCP dashboard across all products

use chrono::{Duration, Utc};
use console::style;
use miette::Result;

use crate::cli::helpers::{find_plan, into_report, open_store};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::Config;
use crate::engine::plan::{DashboardSummary, HazardPlan, PlanSummary};
use crate::engine::registry::PlanRepository;

#[derive(clap::Args, Debug)]
pub struct StatusArgs {
    /// Only this product (default: all products)
    pub product: Option<String>,

    /// Count out-of-spec readings from the last N days
    #[arg(long)]
    pub window_days: Option<u32>,
}

#[derive(serde::Serialize)]
struct ProductStatus {
    code: String,
    dashboard: DashboardSummary,
    analysis: PlanSummary,
}

pub fn run(args: StatusArgs, global: &GlobalOpts) -> Result<()> {
    let store = open_store(global)?;
    let window = match args.window_days {
        Some(days) => Duration::days(i64::from(days)),
        None => Config::load().out_of_spec_window(),
    };
    let now = Utc::now();

    let plans = match args.product {
        Some(ref query) => vec![find_plan(&store, query)?],
        None => store.list().map_err(into_report)?,
    };
    let totals = if args.product.is_some() {
        plans
            .iter()
            .map(|p| p.dashboard_summary(now, window))
            .fold(DashboardSummary::default(), DashboardSummary::merge)
    } else {
        store.dashboard_summary(now, window).map_err(into_report)?
    };
    let per_product: Vec<ProductStatus> = plans
        .iter()
        .map(|plan| ProductStatus {
            code: plan.product().code.clone(),
            dashboard: plan.dashboard_summary(now, window),
            analysis: plan.summary(),
        })
        .collect();

    match global.format {
        OutputFormat::Json => {
            let status = serde_json::json!({
                "window_days": window.num_days(),
                "summary": totals,
                "products": per_product,
            });
            println!("{}", serde_json::to_string_pretty(&status).unwrap_or_default());
        }
        OutputFormat::Yaml => {
            let status = serde_json::json!({
                "window_days": window.num_days(),
                "summary": totals,
                "products": per_product,
            });
            print!("{}", serde_yml::to_string(&status).unwrap_or_default());
        }
        OutputFormat::Id => {
            for plan in &plans {
                println!("{}", plan.product_id());
            }
        }
        OutputFormat::Tsv | OutputFormat::Auto => {
            let width = 68;
            println!("{}", style("HACCP Status").bold().underlined());
            println!("{}", "═".repeat(width));
            println!();

            print_two_columns(
                "CCPS",
                &format_dashboard(&totals, window),
                "HAZARD ANALYSIS",
                &format_analysis(&plans),
            );

            if !per_product.is_empty() {
                println!();
                println!(
                    "{:<10} {:<7} {:<7} {:<12} {:<8} {:<9}",
                    style("PRODUCT").bold(),
                    style("CCPS").bold(),
                    style("ACTIVE").bold(),
                    style("OUT OF SPEC").bold(),
                    style("OVERDUE").bold(),
                    style("APPROVED").bold()
                );
                println!("{:-<58}", "");
                for row in &per_product {
                    println!(
                        "{:<10} {:<7} {:<7} {:<12} {:<8} {:<9}",
                        row.code,
                        row.dashboard.total_ccps,
                        row.dashboard.active_ccps,
                        highlight(row.dashboard.out_of_spec_count),
                        highlight(row.dashboard.pending_verification_count),
                        if row.analysis.plan_approved { "yes" } else { "no" }
                    );
                }
            }

            println!();
            println!("{}", "═".repeat(width));
            let health = health(&totals);
            let health_style = match health {
                "In control" => style(health).green().bold(),
                "Attention" => style(health).yellow().bold(),
                _ => style(health).red().bold(),
            };
            println!("Food safety: {}", health_style);
        }
    }

    Ok(())
}

fn format_dashboard(d: &DashboardSummary, window: Duration) -> Vec<String> {
    vec![
        format!("Total:   {}", d.total_ccps),
        format!("Active:  {}", d.active_ccps),
        format!(
            "Out of spec ({}d): {}",
            window.num_days(),
            d.out_of_spec_count
        ),
        format!("Verification due: {}", d.pending_verification_count),
    ]
}

fn format_analysis(plans: &[std::sync::Arc<HazardPlan>]) -> Vec<String> {
    let mut hazards = 0;
    let mut critical = 0;
    let mut high = 0;
    let mut open = 0;
    let mut approved = 0;
    for plan in plans {
        let s = plan.summary();
        hazards += s.hazards;
        critical += s.by_level.critical;
        high += s.by_level.high;
        open += s.by_strategy.further_analysis + s.by_strategy.undetermined;
        if s.plan_approved {
            approved += 1;
        }
    }
    vec![
        format!("Products: {} ({} approved)", plans.len(), approved),
        format!("Hazards:  {}", hazards),
        format!("Critical/High: {}/{}", critical, high),
        format!("Undecided: {}", open),
    ]
}

fn print_two_columns(title1: &str, lines1: &[String], title2: &str, lines2: &[String]) {
    let col_width = 32;

    println!("{:<col_width$} {}", style(title1).bold(), style(title2).bold());
    println!("{:-<col_width$} {:-<col_width$}", "", "");

    let max_lines = lines1.len().max(lines2.len());
    for i in 0..max_lines {
        let l1 = lines1.get(i).map(|s| s.as_str()).unwrap_or("");
        let l2 = lines2.get(i).map(|s| s.as_str()).unwrap_or("");
        println!("  {:<30} {}", l1, l2);
    }
}

fn highlight(count: usize) -> String {
    if count > 0 {
        style(count).red().to_string()
    } else {
        count.to_string()
    }
}

fn health(d: &DashboardSummary) -> &'static str {
    if d.pending_verification_count == 0 && d.out_of_spec_count == 0 {
        "In control"
    } else if d.pending_verification_count == 0 {
        "Attention"
    } else {
        "Action required"
    }
}
