//! Teampulse CLI - Engineering metrics from LinearB and Jira
//!
//! Fetches team hierarchies, cycle times, lead times, incidents and
//! backlog counts, writing CSV/JSON artifacts and printing summaries.

mod commands;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "teampulse")]
#[command(author, version, about = "Engineering metrics CLI for LinearB and Jira", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format: table (default) or json
    #[arg(long, global = true, default_value = "table")]
    format: output::OutputFormat,

    /// Suppress progress messages
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Config file path (or set TEAMPULSE_CONFIG env var)
    #[arg(long, env = "TEAMPULSE_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// LinearB API key
    #[arg(long, env = "LINEARB_API_KEY", global = true, hide_env_values = true)]
    linearb_api_key: Option<String>,

    /// Jira personal access token (or API token with basic auth)
    #[arg(long, env = "JIRA_API_KEY", global = true, hide_env_values = true)]
    jira_api_key: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// LinearB teams resolved against the configured hierarchy
    Teams {
        #[command(subcommand)]
        action: commands::teams::TeamsAction,
    },

    /// LinearB repositories
    Repos {
        #[command(subcommand)]
        action: commands::repos::ReposAction,
    },

    /// LinearB users
    Users {
        #[command(subcommand)]
        action: commands::users::UsersAction,
    },

    /// Cycle time exports and the monthly dashboard
    CycleTime {
        #[command(subcommand)]
        action: commands::cycle_time::CycleTimeAction,
    },

    /// Epic lead times grouped by fiscal quarter
    LeadTime(commands::lead_time::LeadTimeArgs),

    /// Incident counts by team and quarter
    Incidents(commands::incidents::IncidentArgs),

    /// Tech debt backlog movement per team and quarter
    TechDebt,

    /// Share of epic estimates owned by the focus teams
    TechModule(commands::tech_module::TechModuleArgs),

    /// Inspect configuration
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.quiet);

    if let Err(e) = run(cli).await {
        output::print_error(&format!("Error: {:#}", e));
        std::process::exit(1);
    }
}

fn init_logging(quiet: bool) {
    let default_filter = if quiet { "warn" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp(None)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let config = teampulse_core::Config::load(cli.config.as_deref())?;

    let ctx = commands::Context {
        config,
        config_path: cli.config,
        format: cli.format,
        quiet: cli.quiet,
        linearb_api_key: cli.linearb_api_key,
        jira_api_key: cli.jira_api_key,
    };

    match cli.command {
        Commands::Teams { action } => commands::teams::execute(&ctx, action).await,
        Commands::Repos { action } => commands::repos::execute(&ctx, action).await,
        Commands::Users { action } => commands::users::execute(&ctx, action).await,
        Commands::CycleTime { action } => commands::cycle_time::execute(&ctx, action).await,
        Commands::LeadTime(args) => commands::lead_time::execute(&ctx, args).await,
        Commands::Incidents(args) => commands::incidents::execute(&ctx, args).await,
        Commands::TechDebt => commands::tech_debt::execute(&ctx).await,
        Commands::TechModule(args) => commands::tech_module::execute(&ctx, args).await,
        Commands::Config { action } => commands::config::execute(&ctx, action).await,
    }
}
