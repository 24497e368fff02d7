//! `haccp product` command - Products and plan approval

use chrono::Utc;
use clap::Subcommand;
use console::style;
use miette::{IntoDiagnostic, Result};

use crate::cli::helpers::{find_plan, into_report, open_store, print_structured, truncate_str, update_plan};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::Config;
use crate::engine::plan::HazardPlan;
use crate::engine::registry::PlanRepository;
use crate::entities::product::Product;

#[derive(Subcommand, Debug)]
pub enum ProductCommands {
    /// Register a new product with an empty plan
    New(NewArgs),

    /// List products
    List(ListArgs),

    /// Show a product's full plan
    Show(ShowArgs),

    /// Rename or re-describe a product
    Update(UpdateArgs),

    /// Approve the current plan version
    Approve(ApproveArgs),

    /// Withdraw approval of the plan
    Revoke(ShowArgs),

    /// Delete a product and its plan
    Delete(ShowArgs),
}

#[derive(clap::Args, Debug)]
pub struct NewArgs {
    /// Short product code (unique)
    #[arg(long, short = 'c')]
    pub code: String,

    /// Product name
    #[arg(long, short = 'n')]
    pub name: String,

    /// Description
    #[arg(long, short = 'd')]
    pub description: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct ListArgs {
    /// Show only products with an approved plan
    #[arg(long)]
    pub approved: bool,

    /// Show count only, not the items
    #[arg(long)]
    pub count: bool,
}

#[derive(clap::Args, Debug)]
pub struct ShowArgs {
    /// Product code, ID or name fragment
    pub product: String,
}

#[derive(clap::Args, Debug)]
pub struct UpdateArgs {
    /// Product code, ID or name fragment
    pub product: String,

    /// New name
    #[arg(long, short = 'n')]
    pub name: Option<String>,

    /// New description (empty string clears it)
    #[arg(long, short = 'd')]
    pub description: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct ApproveArgs {
    /// Product code, ID or name fragment
    pub product: String,

    /// Plan version being approved
    #[arg(id = "plan_version", long = "plan-version", value_name = "VERSION")]
    pub version: String,
}

pub fn run(cmd: ProductCommands, global: &GlobalOpts) -> Result<()> {
    match cmd {
        ProductCommands::New(args) => run_new(args, global),
        ProductCommands::List(args) => run_list(args, global),
        ProductCommands::Show(args) => run_show(args, global),
        ProductCommands::Update(args) => run_update(args, global),
        ProductCommands::Approve(args) => run_approve(args, global),
        ProductCommands::Revoke(args) => run_revoke(args, global),
        ProductCommands::Delete(args) => run_delete(args, global),
    }
}

fn run_new(args: NewArgs, global: &GlobalOpts) -> Result<()> {
    let store = open_store(global)?;
    let config = Config::load();

    let code = args.code.trim().to_string();
    if code.is_empty() || code.contains(char::is_whitespace) {
        return Err(miette::miette!("Product code must be a single non-empty word"));
    }
    let mut product = Product::new(code, args.name.trim().to_string(), config.author());
    product.description = args.description.filter(|d| !d.trim().is_empty());
    if product.name.is_empty() {
        return Err(miette::miette!("Product name must not be empty"));
    }

    let plan = store.create(HazardPlan::new(product)).map_err(into_report)?;
    let product = plan.product();

    match global.format {
        OutputFormat::Id => println!("{}", product.id),
        OutputFormat::Json | OutputFormat::Yaml => print_structured(product, global.format)?,
        _ => {
            println!(
                "{} Created product {} ({})",
                style("✓").green(),
                style(&product.code).cyan(),
                style(&product.id).dim()
            );
            if !global.quiet {
                println!(
                    "   {}",
                    style(store.project().plan_path(&product.id).display()).dim()
                );
            }
        }
    }
    Ok(())
}

fn run_list(args: ListArgs, global: &GlobalOpts) -> Result<()> {
    let store = open_store(global)?;
    let mut plans = store.list().map_err(into_report)?;
    if args.approved {
        plans.retain(|p| p.product().plan_approved);
    }

    if args.count {
        println!("{}", plans.len());
        return Ok(());
    }

    if plans.is_empty() {
        match global.format {
            OutputFormat::Json | OutputFormat::Yaml => println!("[]"),
            OutputFormat::Id => {}
            _ => {
                println!("No products found.");
                println!();
                println!("Create one with: {}", style("haccp product new").yellow());
            }
        }
        return Ok(());
    }

    match global.format {
        OutputFormat::Json | OutputFormat::Yaml => {
            let products: Vec<&Product> = plans.iter().map(|p| p.product()).collect();
            print_structured(&products, global.format)?;
        }
        OutputFormat::Id => {
            for plan in &plans {
                println!("{}", plan.product_id());
            }
        }
        OutputFormat::Tsv | OutputFormat::Auto => {
            println!(
                "{:<10} {:<28} {:<8} {:<9} {:<8} {:<5}",
                style("CODE").bold(),
                style("NAME").bold(),
                style("VERSION").bold(),
                style("APPROVED").bold(),
                style("HAZARDS").bold(),
                style("CCPS").bold()
            );
            println!("{}", "-".repeat(74));
            for plan in &plans {
                let product = plan.product();
                let approved = if product.plan_approved {
                    style("yes").green().to_string()
                } else {
                    style("no").yellow().to_string()
                };
                println!(
                    "{:<10} {:<28} {:<8} {:<9} {:<8} {:<5}",
                    product.code,
                    truncate_str(&product.name, 26),
                    product.plan_version,
                    approved,
                    plan.hazards().len(),
                    plan.ccps().len()
                );
            }
            if !global.quiet {
                println!();
                println!("{} product(s) found", style(plans.len()).cyan());
            }
        }
    }
    Ok(())
}

fn run_show(args: ShowArgs, global: &GlobalOpts) -> Result<()> {
    let store = open_store(global)?;
    let plan = find_plan(&store, &args.product)?;

    match global.format {
        OutputFormat::Id => println!("{}", plan.product_id()),
        OutputFormat::Json => print_structured(plan.as_ref(), OutputFormat::Json)?,
        _ => {
            let path = store.project().plan_path(plan.product_id());
            let content = std::fs::read_to_string(&path).into_diagnostic()?;
            print!("{}", content);
        }
    }
    Ok(())
}

fn run_update(args: UpdateArgs, global: &GlobalOpts) -> Result<()> {
    let store = open_store(global)?;
    let plan = find_plan(&store, &args.product)?;
    if args.name.is_none() && args.description.is_none() {
        return Err(miette::miette!("Nothing to update; pass --name and/or --description"));
    }

    let product = update_plan(&store, plan.product_id(), |plan| {
        plan.update_product(args.name, args.description).cloned()
    })?;

    if !global.quiet {
        println!(
            "{} Updated product {}",
            style("✓").green(),
            style(&product.code).cyan()
        );
    }
    Ok(())
}

fn run_approve(args: ApproveArgs, global: &GlobalOpts) -> Result<()> {
    let store = open_store(global)?;
    let plan = find_plan(&store, &args.product)?;
    let product = update_plan(&store, plan.product_id(), |plan| {
        plan.approve_plan(&args.version, Utc::now()).cloned()
    })?;

    println!(
        "{} Approved plan {} of {}",
        style("✓").green(),
        style(&product.plan_version).cyan(),
        style(&product.code).cyan()
    );
    Ok(())
}

fn run_revoke(args: ShowArgs, global: &GlobalOpts) -> Result<()> {
    let store = open_store(global)?;
    let plan = find_plan(&store, &args.product)?;
    let product = update_plan(&store, plan.product_id(), |plan| {
        plan.revoke_approval().cloned()
    })?;

    println!(
        "{} Approval of {} withdrawn",
        style("✓").green(),
        style(&product.code).cyan()
    );
    Ok(())
}

fn run_delete(args: ShowArgs, global: &GlobalOpts) -> Result<()> {
    let store = open_store(global)?;
    let plan = find_plan(&store, &args.product)?;
    let removed = store.delete(plan.product_id()).map_err(into_report)?;

    println!(
        "{} Deleted product {} ({} hazard(s), {} CCP(s))",
        style("✓").green(),
        style(&removed.product().code).cyan(),
        removed.hazards().len(),
        removed.ccps().len()
    );
    Ok(())
}
