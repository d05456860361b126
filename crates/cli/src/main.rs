//! KaayaLife CLI - Database migrations and management tools.
//!
//! # Usage
//!
//! ```bash
//! # Run storefront database migrations
//! kaaya-cli migrate
//!
//! # Load the bundled catalog (or a YAML file of the same shape)
//! kaaya-cli seed
//! kaaya-cli seed --file data/catalog.yaml --force
//!
//! # Create an account
//! kaaya-cli user create -e admin@kaayalife.in -n "Store Admin" -r admin
//!
//! # Mint a bearer token for local testing
//! kaaya-cli token -u 1 -e admin@kaayalife.in -r admin
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `seed` - Import categories, products, users, and settings
//! - `user create` - Create accounts
//! - `token` - Mint a bearer token

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

use commands::CliError;

#[derive(Parser)]
#[command(name = "kaaya-cli")]
#[command(author, version, about = "KaayaLife storefront CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Import the catalog dataset into the database
    Seed {
        /// YAML dataset to import instead of the bundled catalog
        #[arg(short, long)]
        file: Option<String>,

        /// Overwrite rows in tables that already hold data
        #[arg(long)]
        force: bool,
    },
    /// Manage accounts
    User {
        #[command(subcommand)]
        action: UserAction,
    },
    /// Mint a bearer token (signed with `AUTH_TOKEN_SECRET` when set)
    Token {
        /// Account id placed in the `sub` claim
        #[arg(short, long)]
        user_id: i32,

        /// Email claim
        #[arg(short, long)]
        email: Option<String>,

        /// Display name claim
        #[arg(short, long)]
        name: Option<String>,

        /// Role claim (`customer`, `admin`)
        #[arg(short, long, default_value = "customer")]
        role: String,

        /// Lifetime in hours
        #[arg(long, default_value_t = 24)]
        ttl_hours: i64,
    },
}

#[derive(Subcommand)]
enum UserAction {
    /// Create a new account
    Create {
        /// Email address
        #[arg(short, long)]
        email: String,

        /// Display name
        #[arg(short, long)]
        name: String,

        /// Phone number
        #[arg(short, long)]
        phone: Option<String>,

        /// Role (`customer`, `admin`)
        #[arg(short, long, default_value = "customer")]
        role: String,
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

async fn run(cli: Cli) -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Seed { file, force } => commands::seed::run(file.as_deref(), force).await?,
        Commands::User { action } => match action {
            UserAction::Create {
                email,
                name,
                phone,
                role,
            } => {
                commands::user::create(&email, &name, phone, &role).await?;
            }
        },
        Commands::Token {
            user_id,
            email,
            name,
            role,
            ttl_hours,
        } => {
            let token = commands::token::mint(user_id, email, name, &role, ttl_hours)?;
            #[allow(clippy::print_stdout)]
            {
                println!("{token}");
            }
        }
    }
    Ok(())
}
