//! Trackytronics CLI - Database migrations and user management.
//!
//! # Usage
//!
//! ```bash
//! # Run database migrations
//! tt-cli migrate
//!
//! # Make a user an administrator
//! tt-cli user grant -e ann@example.com -p ADMIN
//!
//! # Take a permission away
//! tt-cli user revoke -e ann@example.com -p ITEMDELETE
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

use trackytronics_core::Permission;

mod commands;

#[derive(Parser)]
#[command(name = "tt-cli")]
#[command(author, version, about = "Trackytronics CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Manage user permissions
    User {
        #[command(subcommand)]
        action: UserAction,
    },
}

#[derive(Subcommand)]
enum UserAction {
    /// Grant a permission to a user
    Grant {
        /// User email address
        #[arg(short, long)]
        email: String,

        /// Permission tag (ADMIN, USER, ITEMCREATE, ITEMUPDATE, ITEMDELETE, PERMISSIONUPDATE)
        #[arg(short, long)]
        permission: Permission,
    },
    /// Revoke a permission from a user
    Revoke {
        /// User email address
        #[arg(short, long)]
        email: String,

        /// Permission tag
        #[arg(short, long)]
        permission: Permission,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::User { action } => match action {
            UserAction::Grant { email, permission } => {
                commands::user::grant(&email, permission).await?;
            }
            UserAction::Revoke { email, permission } => {
                commands::user::revoke(&email, permission).await?;
            }
        },
    }
    Ok(())
}
