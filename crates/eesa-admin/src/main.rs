//! EESA admin: schema migrations and group bootstrap for the governance
//! core.

mod config;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use eesa_core::models::user::{CreateUser, UserRole};
use eesa_core::repository::{Pagination, UserRepository};
use eesa_db::DbManager;
use eesa_db::repository::{SurrealGroupRepository, SurrealUserRepository};
use eesa_workflow::{IdentityService, management_groups};
use surrealdb::Surreal;
use surrealdb::engine::any::Any;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::AdminConfig;

#[derive(Parser)]
#[command(name = "eesa-admin")]
#[command(about = "Operator tooling for the EESA portal core")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply pending schema migrations
    Migrate,
    /// Create the management groups, resetting their permissions
    SeedGroups,
    /// List groups with their permission counts
    ListGroups,
    /// Create a superuser account. The password is read from
    /// EESA_ADMIN_PASSWORD
    CreateAdmin { username: String, email: String },
    /// Add a user to a group, audited as `actor`
    AssignGroup {
        /// Superuser performing the change
        #[arg(long)]
        actor: String,
        username: String,
        group: String,
    },
}

type Identity = IdentityService<SurrealUserRepository<Any>, SurrealGroupRepository<Any>>;

fn users(db: &Surreal<Any>, config: &AdminConfig) -> SurrealUserRepository<Any> {
    match &config.workflow.pepper {
        Some(pepper) => SurrealUserRepository::with_pepper(db.clone(), pepper.clone()),
        None => SurrealUserRepository::new(db.clone()),
    }
}

fn identity(db: &Surreal<Any>, config: &AdminConfig) -> Identity {
    IdentityService::new(
        users(db, config),
        SurrealGroupRepository::new(db.clone()),
        config.workflow.clone(),
    )
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("eesa=info")),
        )
        .json()
        .init();

    let cli = Cli::parse();
    let config = AdminConfig::from_env()?;
    let manager = DbManager::connect(&config.db)
        .await
        .context("failed to connect to SurrealDB")?;
    let db = manager.client();

    match cli.command {
        Commands::Migrate => {
            let applied = eesa_db::run_migrations(db).await?;
            info!(applied, "Migrations complete");
        }
        Commands::SeedGroups => {
            let groups = identity(db, &config).ensure_groups(&management_groups()).await?;
            for group in &groups {
                println!("{:<36} {} permissions", group.name, group.permissions.len());
            }
        }
        Commands::ListGroups => {
            let page = identity(db, &config)
                .list_groups(Pagination { offset: 0, limit: 1000 })
                .await?;
            for group in page.items {
                println!("{:<36} {} permissions", group.name, group.permissions.len());
            }
        }
        Commands::CreateAdmin { username, email } => {
            let password = config.admin_password()?.to_string();
            let user = users(db, &config)
                .create(CreateUser {
                    username,
                    email,
                    password,
                    role: UserRole::Admin,
                })
                .await?;
            info!(user_id = %user.id, username = %user.username, "Superuser created");
        }
        Commands::AssignGroup {
            actor,
            username,
            group,
        } => {
            let identity = identity(db, &config);
            let actor = identity.user_by_username(&actor).await?;
            let actor = identity.load_actor(actor.id).await?;
            if !actor.principal().is_some_and(|p| p.is_superuser()) {
                bail!("--actor must be a superuser");
            }
            let user = identity.user_by_username(&username).await?;
            let group = identity.group_by_name(&group).await?;
            identity.add_member(&actor, user.id, group.id, None).await?;
            println!("{} added to {}", user.username, group.name);
        }
    }

    Ok(())
}
