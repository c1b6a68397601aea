mod cmd;
mod output;

use clap::{Parser, Subcommand};
use cmd::{bench::BenchArgs, config::ConfigSubcommand};

#[derive(Parser)]
#[command(
    name = "fcbench",
    about = "Benchmark a Fedora Commons repository with concurrent, optionally transactional, actions",
    version,
    propagate_version = true
)]
struct Cli {
    #[command(flatten)]
    bench: BenchArgs,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Inspect the effective configuration
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        None => tracing::Level::INFO,
        Some(Commands::Config { .. }) => tracing::Level::WARN,
    };

    // Logs go to stderr so `--json` output on stdout stays parseable.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        None => cmd::bench::run(&cli.bench, cli.json),
        Some(Commands::Config { subcommand }) => cmd::config::run(&cli.bench, subcommand, cli.json),
    };

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
