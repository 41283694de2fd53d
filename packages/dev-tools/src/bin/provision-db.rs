//! Database provisioning for local development
//!
//! Creates one SQLite database file per configured name so that services
//! started afterwards find their stores in place. Existing files are left
//! untouched; running the tool twice is harmless.
//!
//! # Usage
//!
//! ```bash
//! # Names as arguments
//! cargo run --bin provision-db -- spot_main spot_replay
//!
//! # Or from the environment
//! SPOTGRAPH_DATA_DIR=./data SPOTGRAPH_DATABASES=spot_main,spot_replay \
//!     cargo run --bin provision-db
//! ```
//!
//! # Configuration
//!
//! - `SPOTGRAPH_DATA_DIR`: directory holding the database files (default `./data`)
//! - `SPOTGRAPH_DATABASES`: comma-separated names, used when no arguments are given

use spotgraph_core::db::provision_databases;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

const DATA_DIR_ENV: &str = "SPOTGRAPH_DATA_DIR";
const DATABASES_ENV: &str = "SPOTGRAPH_DATABASES";

/// Database names from the command line, falling back to the environment
fn database_names() -> Vec<String> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    if !args.is_empty() {
        return args;
    }

    std::env::var(DATABASES_ENV)
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("provision_db=info,spotgraph_core=info")),
        )
        .init();

    let data_dir = std::env::var(DATA_DIR_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("./data"));
    let names = database_names();

    if names.is_empty() {
        println!("No databases configured; set {} or pass names as arguments", DATABASES_ENV);
        return Ok(());
    }

    println!("📦 Provisioning {} database(s) in {}", names.len(), data_dir.display());

    let report = match provision_databases(&data_dir, &names).await {
        Ok(report) => report,
        Err(e) => {
            eprintln!("❌ Provisioning failed: {}", e);
            return Err(e.into());
        }
    };

    for name in &report.created {
        println!("✅ Created {}", name);
    }
    for name in &report.skipped {
        println!("   Skipped {} (already exists)", name);
    }

    Ok(())
}
