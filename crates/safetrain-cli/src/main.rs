//! safetrain CLI: query and record training evaluations.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "safetrain",
    version,
    about = "Training-evaluation eligibility and scoring"
)]
struct Cli {
    /// Config file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the evaluations an employee owes or has passed
    Pending {
        /// Employee record ID
        #[arg(long)]
        employee: String,

        /// Validity year (default: current year)
        #[arg(long)]
        year: Option<i32>,

        /// Restrict attempts to a training session
        #[arg(long)]
        scope: Option<String>,

        /// Output format: table, json
        #[arg(long, default_value = "table")]
        format: String,
    },

    /// Show a template with its questions
    Quiz {
        /// Template record ID
        #[arg(long)]
        template: String,

        /// Output format: table, json
        #[arg(long, default_value = "table")]
        format: String,
    },

    /// Record a graded attempt from a JSON file
    Submit {
        /// Submission JSON
        #[arg(long)]
        file: PathBuf,
    },

    /// Check evaluation completion for many employees
    Check {
        /// Employee record IDs (comma-separated)
        #[arg(long)]
        employees: String,

        /// Training session IDs (comma-separated)
        #[arg(long)]
        scopes: Option<String>,

        /// Validity year (default: current year)
        #[arg(long)]
        year: Option<i32>,

        /// Output format: table, json
        #[arg(long, default_value = "table")]
        format: String,
    },

    /// Check a fixture snapshot for broken references
    Validate {
        /// Path to the fixture JSON
        #[arg(long)]
        fixture: PathBuf,
    },

    /// Create starter config and fixture store
    Init,
}

#[tokio::main]
async fn main() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("safetrain=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.config;

    let result = match cli.command {
        Commands::Pending {
            employee,
            year,
            scope,
            format,
        } => commands::pending::execute(employee, year, scope, format, config).await,
        Commands::Quiz { template, format } => {
            commands::quiz::execute(template, format, config).await
        }
        Commands::Submit { file } => commands::submit::execute(file, config).await,
        Commands::Check {
            employees,
            scopes,
            year,
            format,
        } => commands::check::execute(employees, scopes, year, format, config).await,
        Commands::Validate { fixture } => commands::validate::execute(fixture),
        Commands::Init => commands::init::execute(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
