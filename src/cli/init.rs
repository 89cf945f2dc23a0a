use std::path::Path;

use clap::Parser;
use protolab::{Config, domain::Backend};
use tracing::instrument;

use super::terminal::Colorize;

#[derive(Debug, Parser)]
pub struct Init {
    /// Public base URL of the site, used in share links
    #[arg(long, value_name = "URL")]
    public_url: Option<String>,

    /// Store protocols in the remote table instead of a local SQLite file
    #[arg(long)]
    remote: bool,

    /// Overwrite an existing configuration file
    #[arg(long)]
    force: bool,
}

impl Init {
    #[instrument(level = "debug", skip(self))]
    pub fn run(self, path: &Path) -> anyhow::Result<()> {
        if path.exists() && !self.force {
            anyhow::bail!(
                "{} already exists (use --force to overwrite)",
                path.display()
            );
        }

        let mut config = Config::default();
        if let Some(url) = &self.public_url {
            config.set_public_url(url);
        }
        if self.remote {
            config.storage.backend = Backend::Remote;
        }
        config.save(path)?;

        println!("{}", format!("✅ Wrote {}", path.display()).success());
        if self.remote {
            println!(
                "{}",
                "Set SUPABASE_URL and SUPABASE_KEY in the environment or a .env file".dim()
            );
        }
        Ok(())
    }
}
