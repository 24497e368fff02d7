use clap::Parser;
use miette::Result;
use haccp::cli::{Cli, Commands};

fn main() -> Result<()> {
    // Terminate quietly on a broken pipe (`haccp product list | head`).
    #[cfg(unix)]
    {
        unsafe {
            libc::signal(libc::SIGPIPE, libc::SIG_DFL);
        }
    }
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(2)
                .tab_width(4)
                .build(),
        )
    }))?;

    let cli = Cli::parse();
    let global = cli.global;
    haccp::logging::init(global.verbose, global.quiet);

    match cli.command {
        Commands::Init(args) => haccp::cli::commands::init::run(args),
        Commands::Product(cmd) => haccp::cli::commands::product::run(cmd, &global),
        Commands::Step(cmd) => haccp::cli::commands::step::run(cmd, &global),
        Commands::Hazard(cmd) => haccp::cli::commands::hazard::run(cmd, &global),
        Commands::Ccp(cmd) => haccp::cli::commands::ccp::run(cmd, &global),
        Commands::Monitor(cmd) => haccp::cli::commands::monitor::run(cmd, &global),
        Commands::Verify(cmd) => haccp::cli::commands::verify::run(cmd, &global),
        Commands::Status(args) => haccp::cli::commands::status::run(args, &global),
        Commands::Report(args) => haccp::cli::commands::report::run(args, &global),
    }
}
