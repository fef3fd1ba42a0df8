//! Club Clothing CLI - Catalog and account management tools.
//!
//! Commands run against the backend selected by `CLUB_BACKEND`, the
//! same configuration the storefront server reads.
//!
//! # Usage
//!
//! ```bash
//! # Load categories and products from a JSON seed file
//! club-cli seed catalog data/catalog.json
//!
//! # Validate a seed file without writing anything
//! club-cli seed catalog data/catalog.json --dry-run
//!
//! # Create a password account and its profile
//! CLUB_USER_PASSWORD=... club-cli user create -e ana@example.com -f Ana -l Souza
//!
//! # Print a stored profile
//! club-cli user show <uid>
//! ```
//!
//! # Commands
//!
//! - `seed catalog` - Write categories to the document store
//! - `user create` - Create password accounts
//! - `user show` - Print a user profile as JSON

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "club-cli")]
#[command(author, version, about = "Club Clothing CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Seed the document store
    Seed {
        #[command(subcommand)]
        target: SeedTarget,
    },
    /// Manage customer accounts
    User {
        #[command(subcommand)]
        action: UserAction,
    },
}

#[derive(Subcommand)]
enum SeedTarget {
    /// Load categories with their products from a JSON file
    Catalog {
        /// Path to the seed file
        file: PathBuf,

        /// Parse and validate only
        #[arg(long)]
        dry_run: bool,
    },
}

#[derive(Subcommand)]
enum UserAction {
    /// Create a password account and its profile
    Create {
        /// Account email address
        #[arg(short, long)]
        email: String,

        /// First name
        #[arg(short, long)]
        first_name: String,

        /// Last name
        #[arg(short, long)]
        last_name: String,

        /// Environment variable holding the password
        #[arg(long, default_value = "CLUB_USER_PASSWORD")]
        password_env: String,
    },
    /// Print a user profile
    Show {
        /// Identity provider uid
        uid: String,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Seed { target } => match target {
            SeedTarget::Catalog { file, dry_run } => {
                commands::catalog::seed(&file, dry_run).await?;
            }
        },
        Commands::User { action } => match action {
            UserAction::Create {
                email,
                first_name,
                last_name,
                password_env,
            } => {
                commands::user::create(&email, &first_name, &last_name, &password_env).await?;
            }
            UserAction::Show { uid } => commands::user::show(&uid).await?,
        },
    }
    Ok(())
}
