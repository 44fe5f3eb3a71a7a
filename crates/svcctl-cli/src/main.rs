mod cmd;
mod interrupt;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::plan::PlanArgs;
use cmd::service::ServiceSubcommand;
use cmd::Ctx;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(
    name = "svcctl",
    about = "Run build, release and service lifecycle phases declared in svcctl.yaml",
    version,
    propagate_version = true
)]
struct Cli {
    /// Project root (default: auto-detect from svcctl.yaml or .git/)
    #[arg(long, global = true, env = "SVCCTL_ROOT")]
    root: Option<PathBuf>,

    /// Descriptor file (default: <root>/svcctl.yaml)
    #[arg(long, short = 'f', global = true, env = "SVCCTL_FILE")]
    file: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    /// Time budget for the whole phase in seconds, overriding the descriptor
    #[arg(long, global = true, value_name = "SECS")]
    timeout: Option<u64>,

    /// Time budget for each command in seconds, overriding the descriptor
    #[arg(long, global = true, value_name = "SECS")]
    command_timeout: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a global phase: setup, codestyle, build, test, release or cleanup
    Run { phase: String },

    /// Load, unload or operate a service configuration
    Service {
        #[command(subcommand)]
        subcommand: ServiceSubcommand,
    },

    /// Render the unit file for a service configuration
    Render {
        service: String,
        config: String,
        /// Write the unit here instead of printing it
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },

    /// Show the resolved parameters for a service configuration
    Params { service: String, config: String },

    /// Show the commands a phase would run, without running them
    Plan {
        phase: String,
        #[arg(long)]
        service: Option<String>,
        #[arg(long)]
        config: Option<String>,
        #[arg(long)]
        action: Option<String>,
        /// Action arguments, after `--`
        #[arg(last = true)]
        args: Vec<String>,
    },

    /// Check the descriptor for mistakes
    Validate,
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let seconds = |s: Option<u64>| s.filter(|s| *s > 0).map(Duration::from_secs);
    let ctx = Ctx {
        root: root::resolve_root(cli.root.as_deref()),
        file: cli.file,
        json: cli.json,
        timeout: seconds(cli.timeout),
        command_timeout: seconds(cli.command_timeout),
    };

    let result = match cli.command {
        Commands::Run { phase } => cmd::run::run(&ctx, &phase),
        Commands::Service { subcommand } => cmd::service::run(&ctx, subcommand),
        Commands::Render {
            service,
            config,
            output,
        } => cmd::render::run(&ctx, &service, &config, output.as_deref()),
        Commands::Params { service, config } => cmd::params::run(&ctx, &service, &config),
        Commands::Plan {
            phase,
            service,
            config,
            action,
            args,
        } => cmd::plan::run(
            &ctx,
            PlanArgs {
                phase,
                service,
                config,
                action,
                args,
            },
        ),
        Commands::Validate => cmd::validate::run(&ctx),
    };

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
