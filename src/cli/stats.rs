use clap::Parser;
use protolab::Services;
use tracing::instrument;

use super::{OutputFormat, terminal::Colorize};

#[derive(Debug, Parser)]
pub struct StatsCommand {
    /// Output format
    #[arg(long, value_name = "FORMAT", default_value = "pretty")]
    output: OutputFormat,
}

impl StatsCommand {
    #[instrument(level = "debug", skip(services))]
    pub fn run(self, services: &Services) -> anyhow::Result<()> {
        let stats = services.stats()?;
        if matches!(self.output, OutputFormat::Json) {
            return super::write_json(&stats, None);
        }

        println!("{}", "Summary".dim());
        println!("  Protocols: {}", stats.total);
        println!("  Views:     {}", stats.total_views);

        if !stats.most_popular.is_empty() {
            println!("\n{}", "Most liked".dim());
            for entry in &stats.most_popular {
                println!(
                    "  {:>5}  {}  {}",
                    entry.id,
                    entry.title,
                    format!("👍 {}  👁 {}  {}", entry.likes, entry.views, entry.author).dim()
                );
            }
        }

        if !stats.by_discipline.is_empty() {
            println!("\n{}", "By discipline".dim());
            for entry in &stats.by_discipline {
                println!("  {:>5}  {}", entry.count, entry.discipline);
            }
        }

        if !stats.most_recent.is_empty() {
            println!("\n{}", "Most recent".dim());
            for entry in &stats.most_recent {
                println!(
                    "  {:>5}  {}  {}",
                    entry.id,
                    entry.title,
                    format!("{}  {}", entry.created_at.format("%Y-%m-%d"), entry.author).dim()
                );
            }
        }
        Ok(())
    }
}
