#![allow(clippy::unwrap_used, clippy::expect_used)]

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use tallybook::{db, logging, migrate};

#[derive(Parser)]
#[command(name = "migrate", about = "Tallybook migration helper")]
struct Cli {
    /// Optional explicit DB path
    #[arg(long, value_name = "PATH")]
    db: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Show applied vs pending migrations
    #[command(about, long_about = None)]
    Status,
    /// Apply all pending migrations
    #[command(about, long_about = None)]
    Up,
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init();

    let cli = Cli::parse();
    let db_path = cli.db.unwrap_or_else(db::default_db_path);

    match cli.cmd {
        Cmd::Status => status(&db_path).await,
        Cmd::Up => up(&db_path).await,
    }
}

async fn status(db_path: &std::path::Path) -> Result<()> {
    let pool = db::open_sqlite_pool(db_path).await?;
    let has_ledger: Option<i64> = sqlx::query_scalar(
        "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_migrations'",
    )
    .fetch_optional(&pool)
    .await?;

    let applied = if has_ledger.is_some() {
        migrate::applied_versions(&pool).await?
    } else {
        Default::default()
    };

    for version in migrate::known_versions() {
        let state = if applied.contains_key(version) {
            "applied"
        } else {
            "pending"
        };
        println!("{state:>8}  {version}");
    }
    Ok(())
}

async fn up(db_path: &std::path::Path) -> Result<()> {
    let pool = db::open_sqlite_pool(db_path).await?;
    migrate::apply_migrations(&pool).await?;
    println!("migrations applied: {}", db_path.display());
    Ok(())
}
