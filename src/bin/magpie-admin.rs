use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use magpie::assets::AssetLifecycleCoordinator;
use magpie::config::{Config, DatabaseBackend};
use magpie::external::{HttpImageStore, ImageStore};
use magpie::storage::{PostgresStorage, SqliteStorage, Storage};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "magpie-admin")]
#[command(about = "Magpie QR asset management CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List stored QR assets
    List {
        /// Maximum number of assets to show
        #[arg(long, default_value_t = 50)]
        limit: i64,
        /// Only show assets belonging to this owner
        #[arg(long)]
        owner: Option<String>,
    },
    /// Print one asset as JSON
    Show {
        /// Public asset code
        code: String,
    },
    /// Delete an asset together with its external files
    Delete {
        /// Public asset code
        code: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    let storage: Arc<dyn Storage> = match config.database.backend {
        DatabaseBackend::Sqlite => Arc::new(
            SqliteStorage::new(&config.database.url, config.database.max_connections).await?,
        ),
        DatabaseBackend::Postgres => Arc::new(
            PostgresStorage::new(&config.database.url, config.database.max_connections).await?,
        ),
    };

    // Ensure database is initialized
    storage.init().await?;

    match cli.command {
        Commands::List { limit, owner } => {
            let assets = storage.list(limit, 0, owner.as_deref()).await?;
            if assets.is_empty() {
                println!("No QR assets found.");
            } else {
                println!("{:<12} {:<8} {:>8} {}", "Code", "Kind", "Scans", "Payload");
                println!("{}", "-".repeat(80));
                for asset in assets {
                    println!(
                        "{:<12} {:<8} {:>8} {}",
                        asset.code, asset.kind, asset.scan_count, asset.payload
                    );
                }
            }
        }
        Commands::Show { code } => match storage.get_authoritative(&code).await? {
            Some(asset) => println!("{}", serde_json::to_string_pretty(&asset)?),
            None => bail!("no asset with code '{}'", code),
        },
        Commands::Delete { code } => {
            let asset = match storage.get_authoritative(&code).await? {
                Some(asset) => asset,
                None => bail!("no asset with code '{}'", code),
            };

            let store: Option<Arc<dyn ImageStore>> = config.store.as_ref().map(|cfg| {
                Arc::new(HttpImageStore::new(
                    &cfg.api_base,
                    &cfg.media_base,
                    &cfg.api_key,
                )) as Arc<dyn ImageStore>
            });

            let coordinator = AssetLifecycleCoordinator::new(Arc::clone(&storage), store);
            let report = coordinator.destroy(&asset).await?;

            println!("✓ Deleted asset '{}'", code);
            for file_id in &report.deleted_external {
                println!("  ✓ removed external file {}", file_id);
            }
            for failed in &report.failed_external {
                println!(
                    "  ⚠ external file {} not removed: {}",
                    failed.file_id, failed.error
                );
            }
        }
    }

    Ok(())
}
