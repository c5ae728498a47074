#![forbid(unsafe_code)]

mod adapters;
mod cmd;
mod output;

use clap::{Parser, Subcommand};
use output::OutputMode;
use std::env;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "tether: keep an issue tracker and its mirror database in sync",
    long_about = None
)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,

    /// Emit JSON output instead of human-readable text.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    fn output_mode(&self) -> OutputMode {
        if self.json {
            OutputMode::Json
        } else {
            OutputMode::Human
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        about = "Initialize a tether project",
        long_about = "Initialize a tether project in the current directory.",
        after_help = "EXAMPLES:\n    # Initialize a project in the current directory\n    tether init\n\n    # Start over with a default config\n    tether init --force"
    )]
    Init(cmd::init::InitArgs),

    #[command(
        about = "Seed the mirror and snapshot cache from the tracker",
        long_about = "Fetch every tracked issue, create missing mirror pages, and seed the \
                      snapshot cache. Idempotent: already-reconciled items are skipped.",
        after_help = "EXAMPLES:\n    # First-time bootstrap (re-run freely after interruptions)\n    tether import\n\n    # Emit machine-readable output\n    tether import --json"
    )]
    Import(cmd::import::ImportArgs),

    #[command(
        about = "Run the reconciliation loop",
        long_about = "Poll both sides at a fixed interval, detect drift against the snapshot \
                      cache, and propagate changes to the side that did not change.",
        after_help = "EXAMPLES:\n    # Run forever at the configured interval\n    tether run\n\n    # One cycle, then exit (cron-friendly)\n    tether run --once\n\n    # Faster polling\n    tether run --interval 30"
    )]
    Run(cmd::run::RunArgs),

    #[command(
        about = "Show store and config overview",
        after_help = "EXAMPLES:\n    tether status\n    tether status --json"
    )]
    Status(cmd::status::StatusArgs),

    #[command(
        about = "List pending commands",
        long_about = "List commands detected but not yet applied, with target side and reason.",
        after_help = "EXAMPLES:\n    tether queue\n    tether queue --json"
    )]
    Queue(cmd::queue::QueueArgs),
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("TETHER_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if env::var("DEBUG").is_ok() {
            "tether=debug,info"
        } else {
            "tether=info,warn"
        })
    });

    let format = env::var("TETHER_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry.with(fmt::layer().json().with_ansi(false)).init();
        }
        _ => {
            registry.with(fmt::layer().compact()).init();
        }
    }
}

fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    if cli.verbose {
        info!("Verbose mode enabled");
    }

    let project_root = std::env::current_dir()?;
    let output = cli.output_mode();

    match cli.command {
        Commands::Init(ref args) => cmd::init::run_init(args, &project_root),
        Commands::Import(ref args) => cmd::import::run_import(args, output, &project_root),
        Commands::Run(ref args) => cmd::run::run_run(args, output, &project_root),
        Commands::Status(ref args) => cmd::status::run_status(args, output, &project_root),
        Commands::Queue(ref args) => cmd::queue::run_queue(args, output, &project_root),
    }
}
