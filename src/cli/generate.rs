use std::{path::PathBuf, time::Duration};

use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use protolab::{GenerationRequest, ProtocolDraft, Services};
use tracing::instrument;

use super::terminal::Colorize;

#[derive(Debug, Parser)]
pub struct Generate {
    /// Read the whole request from a JSON file (`-` reads stdin)
    ///
    /// Uses the field names `titulo`, `resumo`, `anos`, `disciplinas` and
    /// `autor`. The other options are then ignored.
    #[arg(long, short, value_name = "FILE")]
    request: Option<PathBuf>,

    /// Working title of the experiment
    #[arg(long, short, default_value = "")]
    title: String,

    /// What the activity should be about
    #[arg(long, short, required_unless_present = "request")]
    summary: Option<String>,

    /// Who is asking
    #[arg(long, short, default_value = "")]
    author: String,

    /// Target school year (repeatable)
    #[arg(long = "grade", short, value_name = "YEAR")]
    grades: Vec<String>,

    /// Discipline (repeatable)
    #[arg(long = "discipline", short, value_name = "DISCIPLINE")]
    disciplines: Vec<String>,

    /// Write the draft to this file instead of stdout
    #[arg(long, short)]
    out: Option<PathBuf>,

    /// Store the draft straight away
    #[arg(long)]
    save: bool,
}

impl Generate {
    #[instrument(level = "debug", skip_all)]
    pub fn run(self, services: &Services) -> anyhow::Result<()> {
        let request = match &self.request {
            Some(path) => GenerationRequest::from_value(&super::read_json(path)?),
            None => GenerationRequest {
                title: self.title,
                summary: self.summary.unwrap_or_default(),
                grade_levels: self.grades,
                disciplines: self.disciplines,
                author: self.author,
            },
        };

        let spinner = spinner("Drafting protocol...");
        let draft = services.generate(&request);
        spinner.finish_and_clear();

        super::write_json(&draft, self.out.as_deref())?;
        if self.save {
            save(services, &draft)?;
        }
        Ok(())
    }
}

#[derive(Debug, Parser)]
pub struct Regenerate {
    /// The draft to revise, as JSON (`-` reads stdin)
    draft: PathBuf,

    /// What should change
    #[arg(long, short)]
    feedback: String,

    /// Write the revision to this file instead of stdout
    #[arg(long, short)]
    out: Option<PathBuf>,

    /// Store the revision straight away
    #[arg(long)]
    save: bool,
}

impl Regenerate {
    #[instrument(level = "debug", skip_all)]
    pub fn run(self, services: &Services) -> anyhow::Result<()> {
        let previous = ProtocolDraft::from_value(&super::read_json(&self.draft)?);

        let spinner = spinner("Revising protocol...");
        let draft = services.regenerate(&previous, &self.feedback);
        spinner.finish_and_clear();

        if draft == previous {
            eprintln!("{}", "The draft was not changed".warning());
        }
        super::write_json(&draft, self.out.as_deref())?;
        if self.save {
            save(services, &draft)?;
        }
        Ok(())
    }
}

fn spinner(message: &'static str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner().with_message(message);
    if let Ok(style) = ProgressStyle::with_template("{spinner} {msg}") {
        spinner.set_style(style);
    }
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}

fn save(services: &Services, draft: &ProtocolDraft) -> anyhow::Result<()> {
    let id = services.save(&serde_json::to_value(draft)?)?;
    eprintln!("{}", format!("✅ Saved protocol {id}").success());
    eprintln!("   {}", services.share_url(id).dim());
    Ok(())
}
