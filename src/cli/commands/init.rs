//! `haccp init` command - Create a HACCP project with seeded defaults

use console::style;
use miette::{IntoDiagnostic, Result};
use std::path::PathBuf;

use crate::core::Config;
use crate::core::project::{Project, ProjectDefaults, ProjectError, PLANS_DIR, PROJECT_DIR};
use crate::engine::schedule::Cadence;

#[derive(clap::Args, Debug)]
pub struct InitArgs {
    /// Directory to initialize (default: current directory)
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Author recorded on new plans, monitoring and verification entries
    #[arg(long)]
    pub author: Option<String>,

    /// Verification cadence proposed for new CCPs
    #[arg(long)]
    pub cadence: Option<Cadence>,

    /// Trailing window, in days, for out-of-spec counts on the dashboard
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    pub window_days: Option<u32>,

    /// Rewrite .haccp/config.yaml even if the project exists (plans are kept)
    #[arg(long)]
    pub force: bool,
}

pub fn run(args: InitArgs) -> Result<()> {
    let path = if args.path.as_os_str() == "." {
        std::env::current_dir().into_diagnostic()?
    } else {
        args.path.clone()
    };
    if !path.exists() {
        std::fs::create_dir_all(&path).into_diagnostic()?;
    }

    let defaults = ProjectDefaults {
        author: args.author.filter(|a| !a.trim().is_empty()),
        verification_cadence: args.cadence,
        out_of_spec_window_days: args.window_days,
    };

    let project = match Project::init_with(&path, &defaults, args.force) {
        Ok(project) => project,
        Err(ProjectError::AlreadyExists(root)) => {
            println!(
                "{} HACCP project already exists at {} (use {} to rewrite its defaults)",
                style("!").yellow(),
                style(root.display()).cyan(),
                style("--force").yellow()
            );
            return Ok(());
        }
        Err(e) => return Err(miette::miette!("{}", e)),
    };
    tracing::info!(root = %project.root().display(), force = args.force, "project initialized");

    println!(
        "{} Initialized HACCP project at {}",
        style("✓").green(),
        style(project.root().display()).cyan()
    );
    println!("  {}/config.yaml", PROJECT_DIR);
    println!(
        "    author:       {}",
        defaults.author.as_deref().unwrap_or("(git user / $USER)")
    );
    println!(
        "    cadence:      {}",
        defaults.verification_cadence.unwrap_or_default()
    );
    println!(
        "    window days:  {}",
        defaults
            .out_of_spec_window_days
            .map(i64::from)
            .unwrap_or_else(|| Config::default().out_of_spec_window().num_days())
    );

    let kept = project.iter_plan_files().count();
    if kept > 0 {
        println!("  {}/  {} existing plan(s) kept", PLANS_DIR, kept);
    } else {
        println!("  {}/  one YAML file per product", PLANS_DIR);
    }

    println!();
    println!(
        "Next: {} then add process steps and hazards",
        style("haccp product new --code CODE --name NAME").yellow()
    );
    Ok(())
}
