//! Cartwheel CLI - database migrations and cart management tools.
//!
//! # Usage
//!
//! ```bash
//! # Run cart snapshot migrations
//! cw-cli migrate
//!
//! # Inspect and change the persisted cart
//! cw-cli cart show
//! cw-cli cart add 3
//! cw-cli cart set 3 5
//! cw-cli cart remove 3
//! cw-cli cart clear
//! ```
//!
//! # Commands
//!
//! - `migrate` - Create the `cart_snapshots` table
//! - `cart` - Operate on the cart snapshot the storefront uses
//!
//! Cart commands read the same environment as the storefront
//! (`CART_STORAGE`, `CART_DATA_DIR`, `CART_SNAPSHOT_KEY`, ...). Run them
//! while the storefront is stopped; it only reads the snapshot at startup.

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "cw-cli")]
#[command(author, version, about = "Cartwheel CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run cart snapshot database migrations
    Migrate,
    /// Inspect or change the persisted cart
    Cart {
        #[command(subcommand)]
        action: CartAction,
    },
}

#[derive(Subcommand)]
enum CartAction {
    /// Print the cart with totals
    Show,
    /// Add one unit of a catalog product
    Add {
        /// Catalog product id
        product_id: String,
    },
    /// Remove a line
    Remove {
        /// Product id of the line
        id: String,
    },
    /// Set a line's quantity (0 or less removes it)
    Set {
        /// Product id of the line
        id: String,
        /// New quantity
        #[arg(allow_hyphen_values = true)]
        quantity: i64,
    },
    /// Remove every line
    Clear,
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
        Commands::Migrate => commands::migrate::cart().await?,
        Commands::Cart { action } => {
            let command = match action {
                CartAction::Show => commands::cart::Command::Show,
                CartAction::Add { product_id } => commands::cart::Command::Add(product_id),
                CartAction::Remove { id } => commands::cart::Command::Remove(id),
                CartAction::Set { id, quantity } => commands::cart::Command::Set(id, quantity),
                CartAction::Clear => commands::cart::Command::Clear,
            };
            let output = commands::cart::run(command).await?;

            #[allow(clippy::print_stdout)]
            {
                println!("{output}");
            }
        }
    }
    Ok(())
}
