mod commands;
mod config;

use clap::{Parser, Subcommand};
use colored::Colorize;
use strata::{Direction, MigrateError};

#[derive(Parser)]
#[command(name = "strata")]
#[command(about = "SQL schema migrations for postgres, sqlite3 and mysql", version)]
struct Cli {
    /// Configuration file to use
    #[arg(short, long, global = true, default_value = "dbconfig.yml")]
    config: String,

    /// Environment to read from the configuration file
    #[arg(short, long, global = true, default_value = "development")]
    env: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply pending migrations
    Up {
        /// Maximum number of migrations to apply; 0 applies all
        #[arg(long, default_value_t = 0)]
        limit: usize,

        /// Print the plan without executing it
        #[arg(long)]
        dryrun: bool,
    },

    /// Roll back applied migrations
    Down {
        /// Maximum number of migrations to roll back; 0 rolls back all
        #[arg(long, default_value_t = 1)]
        limit: usize,

        /// Print the plan without executing it
        #[arg(long)]
        dryrun: bool,
    },

    /// Reapply the last migration
    Redo {
        /// Print the plan without executing it
        #[arg(long)]
        dryrun: bool,
    },

    /// Show migration status
    Status,

    /// Create a new migration file
    New {
        /// Migration name; becomes part of the file name
        name: String,
    },

    /// Mark pending migrations as applied without running them
    Skip {
        /// Maximum number of migrations to skip; 0 skips all
        #[arg(long, default_value_t = 0)]
        limit: usize,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("{} {e}", "error:".red().bold());
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), MigrateError> {
    let env = config::Environment::load(&cli.config, &cli.env)?;

    match cli.command {
        Commands::Up { limit, dryrun } => {
            commands::apply(&env, Direction::Up, limit, dryrun).await
        }
        Commands::Down { limit, dryrun } => {
            commands::apply(&env, Direction::Down, limit, dryrun).await
        }
        Commands::Redo { dryrun } => commands::redo(&env, dryrun).await,
        Commands::Status => commands::status(&env).await,
        Commands::New { name } => commands::new_migration(&env, &name),
        Commands::Skip { limit } => commands::skip(&env, limit).await,
    }
}
