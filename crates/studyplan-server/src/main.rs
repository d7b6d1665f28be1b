mod api;
mod config;

#[cfg(test)]
mod test_util;

use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};

use studyplan_core::catalog::{CatalogClient, HttpCatalogClient};
use studyplan_core::identity::JwtVerifier;
use studyplan_core::store::{HierarchyStore, MemoryStore, PgStore};
use studyplan_db::config::DbConfig;
use studyplan_db::pool;

use config::StudyplanConfig;

#[derive(Parser)]
#[command(name = "studyplan", about = "Study plan service: plans, semesters and course placements")]
struct Cli {
    /// Database URL (overrides STUDYPLAN_DATABASE_URL env var)
    #[arg(long, global = true)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a studyplan config file (no database required)
    Init {
        /// PostgreSQL connection URL
        #[arg(long, default_value = DbConfig::DEFAULT_URL)]
        db_url: String,
        /// HMAC secret shared with the identity service (generated if omitted)
        #[arg(long)]
        jwt_secret: Option<String>,
        /// Base URL of the program catalog service
        #[arg(long, default_value = studyplan_core::catalog::CatalogConfig::DEFAULT_URL)]
        catalog_url: String,
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
    /// Create the database if needed and apply migrations
    DbInit,
    /// Run the HTTP API
    Serve {
        /// Address to bind
        #[arg(long, default_value = "127.0.0.1")]
        bind: String,
        /// Port to listen on
        #[arg(long, default_value_t = 8080)]
        port: u16,
        /// Keep everything in memory instead of PostgreSQL
        #[arg(long)]
        ephemeral: bool,
    },
}

/// Execute `studyplan init`: write the config file.
fn cmd_init(
    db_url: &str,
    jwt_secret: Option<String>,
    catalog_url: &str,
    force: bool,
) -> anyhow::Result<()> {
    let path = config::config_path();
    if path.exists() && !force {
        anyhow::bail!(
            "config file already exists at {}\nUse --force to overwrite.",
            path.display()
        );
    }

    let generated = jwt_secret.is_none();
    let jwt_secret = jwt_secret.unwrap_or_else(config::generate_jwt_secret);
    if jwt_secret.is_empty() {
        anyhow::bail!("--jwt-secret must not be empty");
    }

    let cfg = config::ConfigFile {
        database: config::DatabaseSection {
            url: db_url.to_string(),
        },
        auth: config::AuthSection { jwt_secret },
        catalog: config::CatalogSection {
            url: catalog_url.to_string(),
            ..config::CatalogSection::default()
        },
    };
    let path = config::save_config(&cfg)?;

    println!("Config written to {}", path.display());
    println!("  database.url = {db_url}");
    println!("  catalog.url = {catalog_url}");
    if generated {
        println!("  auth.jwt_secret = <generated>; share it with the identity service");
    }
    println!();
    println!("Next: run `studyplan db-init` to create and migrate the database.");
    Ok(())
}

/// Execute `studyplan db-init`: create the database and run migrations.
async fn cmd_db_init(cli_db_url: Option<&str>) -> anyhow::Result<()> {
    let resolved = StudyplanConfig::resolve(cli_db_url)?;

    println!("Initializing studyplan database...");
    pool::ensure_database_exists(&resolved.db_config).await?;
    let db_pool = pool::create_pool(&resolved.db_config).await?;
    pool::run_migrations(&db_pool).await?;

    let counts = pool::table_counts(&db_pool).await?;
    println!("Database ready. Tables:");
    for (table, count) in &counts {
        println!("  {table}: {count} rows");
    }
    db_pool.close().await;

    println!("studyplan db-init complete.");
    Ok(())
}

/// Execute `studyplan serve`.
async fn cmd_serve(
    cli_db_url: Option<&str>,
    bind: &str,
    port: u16,
    ephemeral: bool,
) -> anyhow::Result<()> {
    let resolved = StudyplanConfig::resolve(cli_db_url)?;

    let verifier = Arc::new(
        JwtVerifier::new(&resolved.jwt_secret).context("failed to set up token verification")?,
    );
    let catalog: Arc<dyn CatalogClient> = Arc::new(HttpCatalogClient::new(&resolved.catalog)?);
    tracing::info!(catalog = %resolved.catalog.base_url, "catalog client ready");

    if ephemeral {
        tracing::warn!("ephemeral mode: data is kept in memory and lost on exit");
        let store: Arc<dyn HierarchyStore> = Arc::new(MemoryStore::new());
        return api::run_serve(api::AppState::new(store, catalog, verifier), bind, port).await;
    }

    let db_pool = pool::create_pool(&resolved.db_config).await?;
    pool::run_migrations(&db_pool).await?;
    let store: Arc<dyn HierarchyStore> = Arc::new(PgStore::new(db_pool.clone()));
    let result = api::run_serve(api::AppState::new(store, catalog, verifier), bind, port).await;
    db_pool.close().await;
    result
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init {
            db_url,
            jwt_secret,
            catalog_url,
            force,
        } => {
            cmd_init(&db_url, jwt_secret, &catalog_url, force)?;
        }
        Commands::DbInit => {
            cmd_db_init(cli.database_url.as_deref()).await?;
        }
        Commands::Serve {
            bind,
            port,
            ephemeral,
        } => {
            cmd_serve(cli.database_url.as_deref(), &bind, port, ephemeral).await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn serve_defaults() {
        let cli = Cli::parse_from(["studyplan", "serve"]);
        match cli.command {
            Commands::Serve {
                bind,
                port,
                ephemeral,
            } => {
                assert_eq!(bind, "127.0.0.1");
                assert_eq!(port, 8080);
                assert!(!ephemeral);
            }
            _ => panic!("expected serve"),
        }
    }

    #[test]
    fn global_database_url_after_subcommand() {
        let cli = Cli::parse_from(["studyplan", "db-init", "--database-url", "postgresql://x/y"]);
        assert_eq!(cli.database_url.as_deref(), Some("postgresql://x/y"));
    }
}
