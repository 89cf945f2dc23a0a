use std::path::PathBuf;

use clap::Parser;
use protolab::Services;
use tracing::instrument;

use super::terminal::Colorize;

#[derive(Debug, Parser)]
pub struct Save {
    /// The protocol to store, as JSON (`-` reads stdin)
    ///
    /// Any object is accepted; fields of the wrong shape are coerced and
    /// missing fields are left empty.
    file: PathBuf,
}

impl Save {
    #[instrument(level = "debug", skip(services))]
    pub fn run(self, services: &Services) -> anyhow::Result<()> {
        let record = super::read_json(&self.file)?;
        let id = services.save(&record)?;
        println!("{}", format!("✅ Saved protocol {id}").success());
        println!("   {}", services.share_url(id).dim());
        Ok(())
    }
}
