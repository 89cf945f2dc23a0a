//! Command line interface for generating, storing and rating lab protocols.

use clap::Parser;

mod cli;

fn main() -> anyhow::Result<()> {
    cli::Cli::parse().run()
}
