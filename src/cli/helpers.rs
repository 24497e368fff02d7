//! Shared helper functions for CLI commands
//!
//! Lookup of plans and records from user queries, date and answer parsing,
//! and the plumbing that turns library errors into diagnostics.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use miette::{IntoDiagnostic, Result};
use serde::Serialize;
use std::sync::Arc;

use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::entity::resolve;
use crate::core::error::HaccpError;
use crate::core::identity::EntityId;
use crate::core::project::Project;
use crate::core::store::PlanStore;
use crate::engine::plan::HazardPlan;
use crate::engine::registry::PlanRepository;
use crate::entities::ccp::Ccp;
use crate::entities::hazard::Hazard;
use crate::entities::product::Product;
use crate::entities::step::ProcessStep;

/// Keep the library error's code and help text when handing it to miette
pub fn into_report(err: HaccpError) -> miette::Report {
    miette::Report::new(err)
}

/// Open the plan store of the current (or `--project`) project
pub fn open_store(global: &GlobalOpts) -> Result<PlanStore> {
    let project = match global.project {
        Some(ref root) => Project::discover_from(root),
        None => Project::discover(),
    }
    .map_err(|e| miette::miette!("{}", e))?;
    Ok(PlanStore::new(project))
}

/// Find a product's plan by code, id, id prefix or name fragment
pub fn find_plan(store: &PlanStore, query: &str) -> Result<Arc<HazardPlan>> {
    let plans = store.list().map_err(into_report)?;
    if let Some(plan) = plans
        .iter()
        .find(|p| p.product().code.eq_ignore_ascii_case(query.trim()))
    {
        return Ok(Arc::clone(plan));
    }

    let products: Vec<Product> = plans.iter().map(|p| p.product().clone()).collect();
    let product = resolve(&products, query).map_err(into_report)?;
    plans
        .into_iter()
        .find(|p| p.product_id() == &product.id)
        .ok_or_else(|| into_report(HaccpError::not_found(&product.id)))
}

/// Find a step by number, id or name fragment
pub fn find_step<'a>(plan: &'a HazardPlan, query: &str) -> Result<&'a ProcessStep> {
    if let Ok(number) = query.trim().parse::<u32>() {
        return plan
            .steps()
            .iter()
            .find(|s| s.step_number == number)
            .ok_or_else(|| miette::miette!("No step {} in {}", number, plan.product().code));
    }
    resolve(plan.steps(), query).map_err(into_report)
}

pub fn find_hazard<'a>(plan: &'a HazardPlan, query: &str) -> Result<&'a Hazard> {
    resolve(plan.hazards(), query).map_err(into_report)
}

/// Find a CCP by number ("2"), label ("CCP 2") or id
pub fn find_ccp<'a>(plan: &'a HazardPlan, query: &str) -> Result<&'a Ccp> {
    let trimmed = query.trim();
    let number = trimmed
        .strip_prefix("CCP ")
        .or_else(|| trimmed.strip_prefix("ccp "))
        .unwrap_or(trimmed);
    if let Ok(number) = number.trim().parse::<u32>() {
        return plan
            .ccp_by_number(number)
            .ok_or_else(|| miette::miette!("No CCP {} in {}", number, plan.product().code));
    }
    resolve(plan.ccps(), query).map_err(into_report)
}

/// Apply one plan operation through the store
pub fn update_plan<T>(
    store: &PlanStore,
    product_id: &EntityId,
    change: impl FnOnce(&mut HazardPlan) -> crate::core::error::Result<T>,
) -> Result<T> {
    store.update(product_id, change).map_err(into_report)
}

/// Print a serializable value in the requested structured format
pub fn print_structured<T: Serialize>(value: &T, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(value).into_diagnostic()?;
            println!("{}", json);
        }
        _ => {
            let yaml = serde_yml::to_string(value).into_diagnostic()?;
            print!("{}", yaml);
        }
    }
    Ok(())
}

/// Parse a timestamp: RFC 3339, `YYYY-MM-DD HH:MM` or `YYYY-MM-DD` (UTC)
pub fn parse_when(s: &str) -> std::result::Result<DateTime<Utc>, String> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M") {
        return Ok(dt.and_utc());
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        if let Some(dt) = date.and_hms_opt(0, 0, 0) {
            return Ok(dt.and_utc());
        }
    }
    Err(format!(
        "Invalid date: {}. Use YYYY-MM-DD, 'YYYY-MM-DD HH:MM' or RFC 3339",
        s
    ))
}

/// Parse a yes/no answer to a control question
pub fn parse_answer(s: &str) -> std::result::Result<bool, String> {
    match s.to_lowercase().as_str() {
        "yes" | "y" | "true" => Ok(true),
        "no" | "n" | "false" => Ok(false),
        _ => Err(format!("Invalid answer: {}. Use yes or no", s)),
    }
}

/// Render an optional answer for tables
pub fn format_answer(answer: Option<bool>) -> &'static str {
    match answer {
        Some(true) => "yes",
        Some(false) => "no",
        None => "-",
    }
}

/// Format an EntityId for display, truncating if too long
pub fn format_short_id(id: &EntityId) -> String {
    let s = id.to_string();
    if s.len() > 16 {
        format!("{}...", &s[..13])
    } else {
        s
    }
}

/// Truncate a string to max_len characters, adding "..." if truncated
pub fn truncate_str(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

pub fn format_date(dt: &DateTime<Utc>) -> String {
    dt.format("%Y-%m-%d").to_string()
}
