use std::str::FromStr;

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use rust_decimal::Decimal;
use serde::Serialize;
use gemstore_api::{
    auth::{is_known, AuthConfig, AuthService, ADMIN_ROLE},
    cache,
    config::{self, AppConfig},
    db::{self, DbPool},
    services::users::{self, CustomerDetails},
};
use tracing::warn;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config().context("failed to load configuration")?;
    config::init_tracing(cfg.log_level(), cfg.log_json);

    match cli.command {
        Commands::Migrate => {
            let pool = connect(&cfg).await?;
            db::run_migrations(&pool).await?;
            println!("Migrations applied");
        }
        Commands::IssueToken {
            subject,
            roles,
            permissions,
        } => {
            for permission in &permissions {
                if !is_known(permission) {
                    warn!(permission = %permission, "permission is not checked by any route");
                }
            }
            if cfg.cache.backend != "redis" {
                warn!("cache backend is in-memory; a running server will not see this token session");
            }
            let auth = auth_service(&cfg).await;
            let issued = auth.issue_token(&subject, roles, permissions).await?;
            if cli.json {
                print_json(&issued)?;
            } else {
                println!("{}", issued.access_token);
                eprintln!(
                    "token id {} expires in {}s",
                    issued.token_id, issued.expires_in
                );
            }
        }
        Commands::RevokeToken { token_id } => {
            auth_service(&cfg).await.revoke(&token_id).await?;
            println!("Token {} revoked", token_id);
        }
        Commands::CreditWallet {
            email,
            name,
            amount,
        } => {
            let amount = Decimal::from_str(&amount)
                .with_context(|| format!("invalid amount {}", amount))?;
            if amount <= Decimal::ZERO {
                bail!("amount must be positive");
            }
            let pool = connect(&cfg).await?;
            let buyer = users::resolve_buyer(
                &pool,
                &CustomerDetails {
                    name: name.unwrap_or_else(|| email.clone()),
                    email: email.clone(),
                    phone: None,
                },
            )
            .await?;
            users::credit_wallet(&pool, buyer.id, amount).await?;
            let balance = users::find_by_email(&pool, &email)
                .await?
                .map(|u| u.wallet_balance)
                .unwrap_or_default();
            if cli.json {
                print_json(&serde_json::json!({
                    "user_id": buyer.id,
                    "wallet_balance": balance,
                }))?;
            } else {
                println!("Credited {} to {} (balance {})", amount, email, balance);
            }
        }
    }

    Ok(())
}

#[derive(Parser)]
#[command(name = "gemstore", about = "Gemstore operator CLI", version)]
struct Cli {
    #[arg(
        long,
        global = true,
        action = ArgAction::SetTrue,
        help = "Render command output as pretty JSON when available"
    )]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply pending database migrations
    Migrate,
    /// Mint an operator access token and register its session
    IssueToken {
        #[arg(long)]
        subject: String,
        #[arg(long = "role", help = "Role to grant; repeatable (e.g. --role admin)")]
        roles: Vec<String>,
        #[arg(long = "permission", help = "Permission to grant; repeatable (e.g. --permission orders:cancel)")]
        permissions: Vec<String>,
    },
    /// Revoke a token by its id
    RevokeToken {
        #[arg(long)]
        token_id: String,
    },
    /// Top up a buyer's wallet, creating a guest account if needed
    CreditWallet {
        #[arg(long)]
        email: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        amount: String,
    },
}

async fn connect(cfg: &AppConfig) -> Result<DbPool> {
    db::establish_connection_from_app_config(cfg)
        .await
        .context("failed to connect to the database")
}

async fn auth_service(cfg: &AppConfig) -> AuthService {
    let cache = cache::build_cache(&cfg.cache, &cfg.redis_url).await;
    AuthService::new(AuthConfig::from(cfg), cache)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
