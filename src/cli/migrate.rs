use clap::Parser;
use protolab::{Config, domain::Backend, storage::SqliteStore};
use tracing::instrument;

use super::terminal::Colorize;

#[derive(Debug, Parser)]
pub struct Migrate {}

impl Migrate {
    #[instrument(level = "debug", skip_all)]
    pub fn run(config: &Config) -> anyhow::Result<()> {
        let storage = &config.storage;
        if storage.backend == Backend::Remote {
            println!(
                "{}",
                "The remote table is managed by the hosting service; nothing to do".dim()
            );
            return Ok(());
        }

        let (store, report) = SqliteStore::open_with_report(&storage.path, &storage.table)?;
        let location = format!("{} ({})", store.path().display(), storage.table);

        if report.created_table {
            println!("{}", format!("✅ Created table in {location}").success());
        } else if report.is_noop() {
            println!("{}", format!("Table in {location} is up to date").dim());
        } else {
            println!(
                "{}",
                format!(
                    "✅ Added {} column(s) to {location}",
                    report.added_columns.len()
                )
                .success()
            );
            for column in &report.added_columns {
                println!("  • {column}");
            }
        }
        Ok(())
    }
}
