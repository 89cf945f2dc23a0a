use clap::Parser;
use protolab::{ProtocolId, Rating, Services};
use tracing::instrument;

use super::OutputFormat;

#[derive(Debug, Parser)]
pub struct Rate {
    /// The protocol to rate
    id: ProtocolId,

    /// `gosto` (like) or `nao_gosto` (dislike)
    rating: Rating,

    /// Output format
    #[arg(long, value_name = "FORMAT", default_value = "pretty")]
    output: OutputFormat,
}

impl Rate {
    #[instrument(level = "debug", skip(services))]
    pub fn run(self, services: &Services) -> anyhow::Result<()> {
        let tally = services.rate(self.id, self.rating)?;
        match self.output {
            OutputFormat::Pretty => {
                println!("👍 {}   👎 {}", tally.gostos, tally.nao_gostos);
            }
            OutputFormat::Json => super::write_json(&tally, None)?,
        }
        Ok(())
    }
}
