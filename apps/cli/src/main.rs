//! Loanboard CLI
//!
//! Runs the loan approval API server, or drives the training project
//! directly from the terminal.

mod commands;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use commands::ProjectArgs;

const DEFAULT_LOG_FILTER: &str = "loanboard=info,loanboard_server=info,loanboard_training=info,tower_http=info";

/// Loanboard - upload loan data, train the approval model, inspect reports
#[derive(Parser, Debug)]
#[command(name = "loanboard", author, version, about = "Loanboard - loan approval training front end")]
struct Args {
    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Human, global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Human,
    Json,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP API server
    ///
    /// Serves the upload, train and results endpoints plus the generated
    /// reports until interrupted.
    Serve {
        #[command(flatten)]
        project: ProjectArgs,

        /// Address to listen on (overrides config and LOANBOARD_ADDRESS)
        #[arg(long)]
        address: Option<std::net::SocketAddr>,
    },

    /// Run the training pipeline once and report the artifacts
    Train {
        #[command(flatten)]
        project: ProjectArgs,

        /// Output the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show which report artifacts are present
    Results {
        #[command(flatten)]
        project: ProjectArgs,

        /// Output results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Store a file as the project dataset
    Upload {
        /// File to upload
        file: std::path::PathBuf,

        #[command(flatten)]
        project: ProjectArgs,
    },
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Human => {
            registry.with(tracing_subscriber::fmt::layer().with_target(false).with_writer(std::io::stderr)).init();
        }
        LogFormat::Json => {
            registry.with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr)).init();
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.log_format);

    match args.command {
        Command::Serve { project, address } => commands::serve::execute(&project, address).await,
        Command::Train { project, json } => commands::train::execute(&project, json).await,
        Command::Results { project, json } => commands::results::execute(&project, json),
        Command::Upload { file, project } => commands::upload::execute(&project, &file),
    }
}
