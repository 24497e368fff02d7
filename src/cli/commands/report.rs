//! `haccp report` command - Markdown HACCP plan for one product

use chrono::Utc;
use miette::{IntoDiagnostic, Result};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use tabled::{builder::Builder, settings::Style};

use crate::cli::commands::step::describe_parameters;
use crate::cli::helpers::{find_plan, format_answer, format_date, open_store, truncate_str};
use crate::cli::GlobalOpts;
use crate::engine::plan::HazardPlan;
use crate::engine::schedule;

#[derive(clap::Args, Debug)]
pub struct ReportArgs {
    /// Product code, ID or name fragment
    pub product: String,

    /// Output to file instead of stdout
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,

    /// Append the monitoring and verification records
    #[arg(long)]
    pub records: bool,
}

pub fn run(args: ReportArgs, global: &GlobalOpts) -> Result<()> {
    let store = open_store(global)?;
    let plan = find_plan(&store, &args.product)?;
    let content = render(&plan, args.records);
    write_output(&content, args.output)
}

fn write_output(content: &str, output_path: Option<PathBuf>) -> Result<()> {
    match output_path {
        Some(path) => {
            let file = File::create(&path).into_diagnostic()?;
            let mut writer = BufWriter::new(file);
            writer.write_all(content.as_bytes()).into_diagnostic()?;
            println!("Report written to: {}", path.display());
        }
        None => {
            print!("{}", content);
        }
    }
    Ok(())
}

/// Render the plan as Markdown
pub(crate) fn render(plan: &HazardPlan, with_records: bool) -> String {
    let product = plan.product();
    let now = Utc::now();
    let mut output = String::new();

    output.push_str(&format!("# HACCP Plan: {} - {}\n\n", product.code, product.name));
    if let Some(ref description) = product.description {
        output.push_str(&format!("{}\n\n", description));
    }
    output.push_str(&format!("- **Plan version:** {}\n", product.plan_version));
    match product.approved_at {
        Some(at) if product.plan_approved => {
            output.push_str(&format!("- **Approved:** yes ({})\n", format_date(&at)))
        }
        _ => output.push_str("- **Approved:** no\n"),
    }
    output.push_str(&format!("- **Generated:** {}\n", format_date(&now)));

    // Process flow
    output.push_str("\n## Process Steps\n\n");
    let mut builder = Builder::default();
    builder.push_record(["No", "Step", "Parameters", "Hazards"]);
    for step in plan.steps() {
        builder.push_record([
            step.step_number.to_string(),
            step.name.clone(),
            describe_parameters(step),
            plan.hazards_at(&step.id).count().to_string(),
        ]);
    }
    output.push_str(&builder.build().with(Style::markdown()).to_string());
    output.push('\n');

    // Hazard analysis, in process order
    output.push_str("\n## Hazard Analysis\n\n");
    let mut hazards: Vec<_> = plan.hazards().iter().collect();
    hazards.sort_by_key(|h| {
        (
            plan.step(&h.step_id).map(|s| s.step_number).unwrap_or(u32::MAX),
            std::cmp::Reverse(h.risk_score),
        )
    });
    let mut builder = Builder::default();
    builder.push_record([
        "Step", "Type", "Hazard", "L", "S", "Score", "Level", "Q1", "Q2", "Q3", "Strategy", "CCP",
    ]);
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
        builder.push_record([
            step,
            hazard.hazard_type.to_string(),
            truncate_str(&hazard.description, 40),
            hazard.likelihood.to_string(),
            hazard.severity.to_string(),
            hazard.risk_score.to_string(),
            hazard.risk_level.to_string(),
            format_answer(hazard.facts.is_controlled).to_string(),
            format_answer(hazard.facts.has_subsequent_step_control).to_string(),
            format_answer(hazard.facts.has_existing_prp_coverage).to_string(),
            hazard.risk_strategy.to_string(),
            ccp,
        ]);
    }
    output.push_str(&builder.build().with(Style::markdown()).to_string());
    output.push('\n');

    let justified: Vec<_> = hazards.iter().filter(|h| h.justification.is_some()).collect();
    if !justified.is_empty() {
        output.push_str("\n### Justifications\n\n");
        for hazard in justified {
            output.push_str(&format!(
                "- **{}:** {}\n",
                hazard.description,
                hazard.justification.as_deref().unwrap_or_default()
            ));
        }
    }

    // CCP plan
    output.push_str("\n## Critical Control Points\n\n");
    let mut builder = Builder::default();
    builder.push_record([
        "CCP",
        "Step",
        "Hazard",
        "Critical Limits",
        "Monitoring",
        "Verification",
        "Next Due",
        "Status",
    ]);
    for ccp in plan.ccps() {
        let step = plan
            .step(&ccp.step_id)
            .map(|s| format!("{} {}", s.step_number, s.name))
            .unwrap_or_else(|_| "?".to_string());
        let hazard = plan
            .hazard(&ccp.hazard_id)
            .map(|h| truncate_str(&h.description, 30))
            .unwrap_or_else(|_| "(deleted)".to_string());
        let monitoring = match (&ccp.monitoring.frequency, &ccp.monitoring.method) {
            (Some(f), Some(m)) => format!("{}, {}", f, m),
            (Some(f), None) => f.clone(),
            (None, Some(m)) => m.clone(),
            (None, None) => "-".to_string(),
        };
        let mut due = format_date(&ccp.next_verification_due);
        if ccp.is_active() && schedule::is_overdue(ccp.next_verification_due, now) {
            due.push_str(" (overdue)");
        }
        builder.push_record([
            ccp.ccp_number.to_string(),
            step,
            hazard,
            ccp.critical_limits.describe(),
            monitoring,
            ccp.verification.cadence.to_string(),
            due,
            ccp.status.to_string(),
        ]);
    }
    output.push_str(&builder.build().with(Style::markdown()).to_string());
    output.push('\n');

    if with_records {
        output.push_str("\n## Monitoring Records\n\n");
        let mut builder = Builder::default();
        builder.push_record(["Time", "CCP", "Value", "Within Limits", "Corrective Action", "By"]);
        let mut logs: Vec<_> = plan.monitoring_logs().iter().collect();
        logs.sort_by_key(|l| l.timestamp);
        for log in logs {
            let ccp = plan
                .ccp(&log.ccp_id)
                .map(|c| c.ccp_number.to_string())
                .unwrap_or_else(|_| "?".to_string());
            builder.push_record([
                log.timestamp.format("%Y-%m-%d %H:%M").to_string(),
                ccp,
                log.measured_value.to_string(),
                if log.is_within_limits { "yes" } else { "no" }.to_string(),
                log.corrective_action_description.clone().unwrap_or_else(|| "-".to_string()),
                log.recorded_by.clone(),
            ]);
        }
        output.push_str(&builder.build().with(Style::markdown()).to_string());
        output.push('\n');

        output.push_str("\n## Verification Records\n\n");
        let mut builder = Builder::default();
        builder.push_record(["Date", "CCP", "Compliant", "Result", "Next Due", "By"]);
        let mut logs: Vec<_> = plan.verification_logs().iter().collect();
        logs.sort_by_key(|l| l.verification_date);
        for log in logs {
            let ccp = plan
                .ccp(&log.ccp_id)
                .map(|c| c.ccp_number.to_string())
                .unwrap_or_else(|_| "?".to_string());
            builder.push_record([
                format_date(&log.verification_date),
                ccp,
                if log.is_compliant { "yes" } else { "no" }.to_string(),
                log.result.clone().unwrap_or_else(|| "-".to_string()),
                format_date(&log.next_due_at),
                log.verified_by.clone(),
            ]);
        }
        output.push_str(&builder.build().with(Style::markdown()).to_string());
        output.push('\n');
    }

    // Summary
    let summary = plan.summary();
    output.push_str("\n## Summary\n\n");
    output.push_str(&format!("- **Process steps:** {}\n", summary.steps));
    output.push_str(&format!("- **Hazards:** {}\n", summary.hazards));
    output.push_str(&format!("- **Critical:** {}\n", summary.by_level.critical));
    output.push_str(&format!("- **High:** {}\n", summary.by_level.high));
    output.push_str(&format!("- **Medium:** {}\n", summary.by_level.medium));
    output.push_str(&format!("- **Low:** {}\n", summary.by_level.low));
    output.push_str(&format!(
        "- **CCPs:** {} ({} active)\n",
        summary.ccps, summary.active_ccps
    ));
    output.push_str(&format!("- **OPRPs:** {}\n", summary.by_strategy.opprp));
    output.push_str(&format!(
        "- **Covered by PRPs:** {}\n",
        summary.by_strategy.use_existing_prps
    ));
    let undecided = summary.by_strategy.further_analysis + summary.by_strategy.undetermined;
    output.push_str(&format!("- **Awaiting decision:** {}\n", undecided));

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::limits::CriticalLimits;
    use crate::engine::plan::{CcpSetup, HazardInput};
    use crate::entities::hazard::{ControlFacts, HazardType};
    use crate::entities::product::Product;
    use crate::entities::step::StepParameters;

    #[test]
    fn test_render_lists_hazards_and_ccps() {
        let mut plan = HazardPlan::new(Product::new(
            "BRF-01".to_string(),
            "Beef patty".to_string(),
            "qa".to_string(),
        ));
        let step_id = plan
            .add_step(3, "Cooking", None, StepParameters::default())
            .unwrap()
            .id
            .clone();
        plan.add_hazard(
            HazardInput {
                process_step_id: step_id,
                hazard_type: HazardType::Biological,
                description: "Salmonella survival".to_string(),
                likelihood: 3,
                severity: 5,
                facts: ControlFacts {
                    is_controlled: Some(false),
                    has_subsequent_step_control: Some(false),
                    has_existing_prp_coverage: Some(false),
                },
                control_measures: None,
                subsequent_step: None,
                justification: None,
                ccp_setup: Some(CcpSetup {
                    critical_limits: CriticalLimits::new(Some(72.0), None, Some("°C".to_string())),
                    ..Default::default()
                }),
            },
            "qa",
            Utc::now(),
        )
        .unwrap();

        let md = render(&plan, false);
        assert!(md.starts_with("# HACCP Plan: BRF-01 - Beef patty"));
        assert!(md.contains("## Hazard Analysis"));
        assert!(md.contains("Salmonella survival"));
        assert!(md.contains("## Critical Control Points"));
        assert!(md.contains("- **CCPs:** 1 (1 active)"));
        assert!(!md.contains("## Monitoring Records"));
    }
}
