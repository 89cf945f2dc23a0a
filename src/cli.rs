use std::{
    io::Read,
    path::{Path, PathBuf},
};

mod generate;
mod init;
mod list;
mod migrate;
mod rate;
mod save;
mod show;
mod stats;
mod terminal;

use anyhow::Context;
use clap::ArgAction;
use generate::{Generate, Regenerate};
use init::Init;
use list::{List, Search};
use migrate::Migrate;
use protolab::{Config, Services, domain::Secrets, runtime};
use rate::Rate;
use save::Save;
use serde_json::Value;
use show::Show;
use stats::StatsCommand;

#[derive(Debug, clap::Parser)]
#[command(version, about)]
pub struct Cli {
    /// Verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// The path to the configuration file
    #[arg(short, long, default_value = "protolab.toml", global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

impl Cli {
    pub fn run(self) -> anyhow::Result<()> {
        Self::setup_logging(self.verbose);
        dotenvy::dotenv().ok();

        self.command.run(&self.config)
    }

    fn setup_logging(verbosity: u8) {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

        let level = match verbosity {
            0 => tracing::Level::WARN,
            1 => tracing::Level::INFO,
            2 => tracing::Level::DEBUG,
            _ => tracing::Level::TRACE,
        };

        let filter = tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into());

        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_thread_names(false)
            .with_line_number(false);

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .init();
    }
}

#[derive(Debug, clap::Parser)]
pub enum Command {
    /// Write a configuration file with the default settings
    Init(Init),

    /// Create the local table, or add the columns it is missing
    Migrate,

    /// Draft a new protocol with the language model
    Generate(Generate),

    /// Revise a draft according to feedback
    Regenerate(Regenerate),

    /// Store a protocol read from a JSON file
    Save(Save),

    /// Show a stored protocol, counting a view
    Show(Show),

    /// List stored protocols, newest first
    List(List),

    /// Find protocols by title, summary or author
    Search(Search),

    /// Like or dislike a protocol
    Rate(Rate),

    /// Show aggregate statistics
    Stats(StatsCommand),
}

impl Command {
    fn run(self, config_path: &Path) -> anyhow::Result<()> {
        match self {
            Self::Init(command) => command.run(config_path)?,
            Self::Migrate => Migrate::run(&load_config(config_path)?)?,
            Self::Generate(command) => command.run(services(config_path)?)?,
            Self::Regenerate(command) => command.run(services(config_path)?)?,
            Self::Save(command) => command.run(services(config_path)?)?,
            Self::Show(command) => command.run(services(config_path)?)?,
            Self::List(command) => command.run(services(config_path)?)?,
            Self::Search(command) => command.run(services(config_path)?)?,
            Self::Rate(command) => command.run(services(config_path)?)?,
            Self::Stats(command) => command.run(services(config_path)?)?,
        }
        Ok(())
    }
}

/// How results are printed.
#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Pretty,
    Json,
}

fn load_config(path: &Path) -> anyhow::Result<Config> {
    Config::load_or_default(path).context("failed to load configuration")
}

/// Wires the configured backend and model, once per process.
fn services(config_path: &Path) -> anyhow::Result<&'static Services> {
    let config = load_config(config_path)?;
    let services = Services::from_config(&config, &Secrets::from_env())
        .context("failed to set up storage and generation")?;
    Ok(runtime::install(services)?)
}

/// Reads a JSON document from a file, or from stdin if the path is `-`.
fn read_json(path: &Path) -> anyhow::Result<Value> {
    let content = if path == Path::new("-") {
        let mut buffer = String::new();
        std::io::stdin()
            .read_to_string(&mut buffer)
            .context("failed to read stdin")?;
        buffer
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?
    };
    serde_json::from_str(&content).with_context(|| format!("{} is not JSON", path.display()))
}

/// Writes a JSON document to a file, or to stdout if no path is given.
fn write_json(value: &impl serde::Serialize, path: Option<&Path>) -> anyhow::Result<()> {
    let content = serde_json::to_string_pretty(value)?;
    match path {
        Some(path) => std::fs::write(path, content + "\n")
            .with_context(|| format!("failed to write {}", path.display()))?,
        None => println!("{content}"),
    }
    Ok(())
}
