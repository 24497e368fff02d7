//! `haccp step` command - Process steps of a product

use clap::Subcommand;
use console::style;
use miette::Result;

use crate::cli::helpers::{find_plan, find_step, open_store, print_structured, truncate_str, update_plan};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::entities::step::{ProcessStep, StepParameters};

#[derive(Subcommand, Debug)]
pub enum StepCommands {
    /// Add a process step
    Add(AddArgs),

    /// List a product's steps in order
    List(ListArgs),

    /// Update a step's name, description or parameters
    Update(UpdateArgs),

    /// Remove a step no hazard refers to
    Remove(RemoveArgs),
}

/// Documented process parameters
#[derive(clap::Args, Debug, Default)]
pub struct ParameterArgs {
    /// Process temperature (°C)
    #[arg(long)]
    pub temperature: Option<f64>,

    /// Duration (minutes)
    #[arg(long)]
    pub time: Option<f64>,

    /// pH
    #[arg(long)]
    pub ph: Option<f64>,

    /// Water activity (aw)
    #[arg(long)]
    pub aw: Option<f64>,
}

impl ParameterArgs {
    fn is_empty(&self) -> bool {
        self.temperature.is_none() && self.time.is_none() && self.ph.is_none() && self.aw.is_none()
    }

    /// Overlay the given values on existing parameters
    fn apply_to(&self, mut params: StepParameters) -> StepParameters {
        if self.temperature.is_some() {
            params.temperature_c = self.temperature;
        }
        if self.time.is_some() {
            params.time_minutes = self.time;
        }
        if self.ph.is_some() {
            params.ph = self.ph;
        }
        if self.aw.is_some() {
            params.water_activity = self.aw;
        }
        params
    }
}

#[derive(clap::Args, Debug)]
pub struct AddArgs {
    /// Product code, ID or name fragment
    pub product: String,

    /// Step number (defines the order; unique per product)
    #[arg(long)]
    pub number: u32,

    /// Step name
    #[arg(long, short = 'n')]
    pub name: String,

    /// Description
    #[arg(long, short = 'd')]
    pub description: Option<String>,

    #[command(flatten)]
    pub parameters: ParameterArgs,
}

#[derive(clap::Args, Debug)]
pub struct ListArgs {
    /// Product code, ID or name fragment
    pub product: String,
}

#[derive(clap::Args, Debug)]
pub struct UpdateArgs {
    /// Product code, ID or name fragment
    pub product: String,

    /// Step number, ID or name fragment
    pub step: String,

    /// New name
    #[arg(long, short = 'n')]
    pub name: Option<String>,

    /// New description
    #[arg(long, short = 'd')]
    pub description: Option<String>,

    #[command(flatten)]
    pub parameters: ParameterArgs,
}

#[derive(clap::Args, Debug)]
pub struct RemoveArgs {
    /// Product code, ID or name fragment
    pub product: String,

    /// Step number, ID or name fragment
    pub step: String,
}

pub fn run(cmd: StepCommands, global: &GlobalOpts) -> Result<()> {
    match cmd {
        StepCommands::Add(args) => run_add(args, global),
        StepCommands::List(args) => run_list(args, global),
        StepCommands::Update(args) => run_update(args, global),
        StepCommands::Remove(args) => run_remove(args, global),
    }
}

fn run_add(args: AddArgs, global: &GlobalOpts) -> Result<()> {
    let store = open_store(global)?;
    let plan = find_plan(&store, &args.product)?;
    let parameters = args.parameters.apply_to(StepParameters::default());

    let step = update_plan(&store, plan.product_id(), |plan| {
        plan.add_step(args.number, &args.name, args.description, parameters)
            .cloned()
    })?;

    match global.format {
        OutputFormat::Id => println!("{}", step.id),
        OutputFormat::Json | OutputFormat::Yaml => print_structured(&step, global.format)?,
        _ => println!(
            "{} Added step {} {} to {}",
            style("✓").green(),
            style(step.step_number).cyan(),
            step.name,
            style(&plan.product().code).cyan()
        ),
    }
    Ok(())
}

fn run_list(args: ListArgs, global: &GlobalOpts) -> Result<()> {
    let store = open_store(global)?;
    let plan = find_plan(&store, &args.product)?;
    let steps = plan.steps();

    match global.format {
        OutputFormat::Json | OutputFormat::Yaml => print_structured(&steps, global.format)?,
        OutputFormat::Id => {
            for step in steps {
                println!("{}", step.id);
            }
        }
        OutputFormat::Tsv | OutputFormat::Auto => {
            if steps.is_empty() {
                println!("No steps in {}.", plan.product().code);
                return Ok(());
            }
            println!(
                "{:<6} {:<24} {:<8} {:<30}",
                style("NO").bold(),
                style("NAME").bold(),
                style("HAZARDS").bold(),
                style("PARAMETERS").bold()
            );
            println!("{}", "-".repeat(70));
            for step in steps {
                println!(
                    "{:<6} {:<24} {:<8} {:<30}",
                    step.step_number,
                    truncate_str(&step.name, 22),
                    plan.hazards_at(&step.id).count(),
                    describe_parameters(step)
                );
            }
        }
    }
    Ok(())
}

fn run_update(args: UpdateArgs, global: &GlobalOpts) -> Result<()> {
    let store = open_store(global)?;
    let plan = find_plan(&store, &args.product)?;
    let existing = find_step(&plan, &args.step)?;
    let step_id = existing.id.clone();
    let parameters = if args.parameters.is_empty() {
        None
    } else {
        Some(args.parameters.apply_to(existing.parameters.clone()))
    };

    let step = update_plan(&store, plan.product_id(), |plan| {
        plan.update_step(&step_id, args.name, args.description, parameters)
            .cloned()
    })?;

    if !global.quiet {
        println!(
            "{} Updated step {} {}",
            style("✓").green(),
            style(step.step_number).cyan(),
            step.name
        );
    }
    Ok(())
}

fn run_remove(args: RemoveArgs, global: &GlobalOpts) -> Result<()> {
    let store = open_store(global)?;
    let plan = find_plan(&store, &args.product)?;
    let step_id = find_step(&plan, &args.step)?.id.clone();

    let removed = update_plan(&store, plan.product_id(), |plan| plan.remove_step(&step_id))?;

    println!(
        "{} Removed step {} {}",
        style("✓").green(),
        style(removed.step_number).cyan(),
        removed.name
    );
    Ok(())
}

pub(crate) fn describe_parameters(step: &ProcessStep) -> String {
    let p = &step.parameters;
    let mut parts = Vec::new();
    if let Some(t) = p.temperature_c {
        parts.push(format!("{} °C", t));
    }
    if let Some(m) = p.time_minutes {
        parts.push(format!("{} min", m));
    }
    if let Some(ph) = p.ph {
        parts.push(format!("pH {}", ph));
    }
    if let Some(aw) = p.water_activity {
        parts.push(format!("aw {}", aw));
    }
    if parts.is_empty() {
        "-".to_string()
    } else {
        parts.join(", ")
    }
}
