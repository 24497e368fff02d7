//! CLI argument definitions using clap derive

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::cli::commands::{
    ccp::CcpCommands, hazard::HazardCommands, init::InitArgs, monitor::MonitorCommands,
    product::ProductCommands, report::ReportArgs, status::StatusArgs, step::StepCommands,
    verify::VerifyCommands,
};

#[derive(Parser)]
#[command(name = "haccp")]
#[command(author, version, about = "HACCP hazard analysis and CCP toolkit")]
#[command(long_about = "Score food-safety hazards, determine Critical Control Points, and track CCP monitoring and verification. Plans are stored as plain YAML files, one per product.")]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub global: GlobalOpts,
}

#[derive(clap::Args, Clone, Debug)]
pub struct GlobalOpts {
    /// Output format
    #[arg(long, short = 'f', global = true, default_value = "auto")]
    pub format: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Enable verbose output (debug logging)
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    /// Project root (default: auto-detect by finding .haccp/)
    #[arg(long, global = true)]
    pub project: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new HACCP project
    Init(InitArgs),

    /// Products and plan approval
    #[command(subcommand)]
    Product(ProductCommands),

    /// Process steps of a product
    #[command(subcommand)]
    Step(StepCommands),

    /// Hazard analysis: scoring and CCP determination
    #[command(subcommand)]
    Hazard(HazardCommands),

    /// Critical Control Points
    #[command(subcommand)]
    Ccp(CcpCommands),

    /// CCP monitoring readings
    #[command(subcommand)]
    Monitor(MonitorCommands),

    /// CCP verification activities
    #[command(subcommand)]
    Verify(VerifyCommands),

    /// Show the CCP dashboard
    Status(StatusArgs),

    /// Generate a Markdown HACCP plan for a product
    Report(ReportArgs),
}

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Automatically detect based on context (yaml for show, tsv for list)
    #[default]
    Auto,
    /// YAML format (full fidelity)
    Yaml,
    /// Tab-separated values (for piping)
    Tsv,
    /// JSON format (for programming)
    Json,
    /// Just IDs, one per line
    Id,
}
