//! Dropship CLI - migrations and operator tools.
//!
//! # Usage
//!
//! ```bash
//! # Run database migrations
//! ds-cli migrate
//!
//! # Issue an API key to dropshipper 42, usable only from one address
//! ds-cli api-key issue --user 42 --name "Shop integration" --allow-ip 203.0.113.7
//!
//! # Show or change commission rates (percent per tier)
//! ds-cli rates show
//! ds-cli rates set --dropshipper 10 --sub-dropshipper 7 --sub-sub-dropshipper 5
//!
//! # Re-run commission distribution for a delivered order
//! ds-cli commissions distribute --order 1001
//!
//! # Manage the IP blocklist
//! ds-cli ip block 198.51.100.9 --reason "credential stuffing" --duration-secs 86400
//! ds-cli ip unblock 198.51.100.9
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::net::IpAddr;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use dropship_core::{ApiKeyId, OrderId, UserId};
use rust_decimal::Decimal;

mod commands;

use commands::CliError;

#[derive(Parser)]
#[command(name = "ds-cli")]
#[command(author, version, about = "Dropship API CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Manage integration API keys
    #[command(name = "api-key")]
    ApiKey {
        #[command(subcommand)]
        action: ApiKeyAction,
    },
    /// Show or change commission rates
    Rates {
        #[command(subcommand)]
        action: RatesAction,
    },
    /// Commission distribution
    Commissions {
        #[command(subcommand)]
        action: CommissionsAction,
    },
    /// Manage the IP blocklist
    Ip {
        #[command(subcommand)]
        action: IpAction,
    },
}

#[derive(Subcommand)]
enum ApiKeyAction {
    /// Issue a key to a dropshipper and print its secret
    Issue {
        /// Owning user ID
        #[arg(short, long)]
        user: i64,

        /// Label for the key
        #[arg(short, long)]
        name: String,

        /// Restrict the key to these addresses (repeatable)
        #[arg(long = "allow-ip")]
        allow_ips: Vec<IpAddr>,

        /// Expiry as RFC 3339, e.g. 2027-01-01T00:00:00Z
        #[arg(long)]
        expires_at: Option<DateTime<Utc>>,
    },
    /// Revoke a key
    Revoke {
        /// API key ID
        id: i64,
    },
    /// List keys
    List {
        /// Only keys owned by this user
        #[arg(short, long)]
        user: Option<i64>,
    },
}

#[derive(Subcommand)]
enum RatesAction {
    /// Print the current rates
    Show,
    /// Replace the rates
    Set {
        #[arg(long)]
        dropshipper: Decimal,
        #[arg(long)]
        sub_dropshipper: Decimal,
        #[arg(long)]
        sub_sub_dropshipper: Decimal,
    },
}

#[derive(Subcommand)]
enum CommissionsAction {
    /// Distribute commissions for a delivered order
    Distribute {
        /// Order ID
        #[arg(short, long)]
        order: i64,
    },
}

#[derive(Subcommand)]
enum IpAction {
    /// Block an address
    Block {
        ip: IpAddr,

        #[arg(short, long)]
        reason: String,

        /// Block length; omit to block until lifted
        #[arg(long)]
        duration_secs: Option<u64>,
    },
    /// Lift a block
    Unblock { ip: IpAddr },
    /// List blocks in force
    List,
}

#[tokio::main]
async fn main() {
    // Logs go to stderr so JSON output on stdout stays parseable
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::ApiKey { action } => match action {
            ApiKeyAction::Issue {
                user,
                name,
                allow_ips,
                expires_at,
            } => {
                commands::api_keys::issue(UserId::new(user), &name, &allow_ips, expires_at).await?;
            }
            ApiKeyAction::Revoke { id } => commands::api_keys::revoke(ApiKeyId::new(id)).await?,
            ApiKeyAction::List { user } => {
                commands::api_keys::list(user.map(UserId::new)).await?;
            }
        },
        Commands::Rates { action } => match action {
            RatesAction::Show => commands::rates::show().await?,
            RatesAction::Set {
                dropshipper,
                sub_dropshipper,
                sub_sub_dropshipper,
            } => commands::rates::set(dropshipper, sub_dropshipper, sub_sub_dropshipper).await?,
        },
        Commands::Commissions { action } => match action {
            CommissionsAction::Distribute { order } => {
                commands::commissions::distribute(OrderId::new(order)).await?;
            }
        },
        Commands::Ip { action } => match action {
            IpAction::Block {
                ip,
                reason,
                duration_secs,
            } => commands::ip_blocks::block(ip, &reason, duration_secs).await?,
            IpAction::Unblock { ip } => commands::ip_blocks::unblock(ip).await?,
            IpAction::List => commands::ip_blocks::list().await?,
        },
    }
    Ok(())
}
