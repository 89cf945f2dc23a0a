use clap::Parser;
use protolab::{
    Protocol, ProtocolId, Services,
    domain::{OptionLetter, QuizItem, RiskLevel},
};
use tracing::instrument;

use super::{OutputFormat, terminal::Colorize};

#[derive(Debug, Parser)]
#[command(about = "Display a stored protocol and count the view")]
pub struct Show {
    /// The protocol to display
    id: ProtocolId,

    /// Output format
    #[arg(long, value_name = "FORMAT", default_value = "pretty")]
    output: OutputFormat,
}

impl Show {
    #[instrument(level = "debug", skip(services))]
    pub fn run(self, services: &Services) -> anyhow::Result<()> {
        let protocol = services.view(self.id)?;

        match self.output {
            OutputFormat::Pretty => {
                output_pretty(&protocol);
                println!("\n{}", "Share".dim());
                println!("  {}", services.share_url(protocol.id()).info());
            }
            OutputFormat::Json => super::write_json(&protocol, None)?,
        }
        Ok(())
    }
}

fn output_pretty(protocol: &Protocol) {
    let content = protocol.content();

    println!("# {}", content.title);
    if !content.subtitle.is_empty() {
        println!("{}", content.subtitle);
    }
    println!();

    println!("{}", "Metadata".dim());
    println!("  ID:          {}", protocol.id());
    println!("  Author:      {}", content.author);
    println!("  Created:     {}", protocol.created_at().format("%Y-%m-%d %H:%M"));
    println!("  Duration:    {}", content.duration);
    println!("  Disciplines: {}", content.disciplines.join(", "));
    println!("  Years:       {}", content.grade_levels.join(", "));
    let counters = protocol.counters();
    println!(
        "  Popularity:  👍 {}  👎 {}  👁 {}",
        counters.likes, counters.dislikes, counters.views
    );

    section("Summary", &content.summary);
    list("Competencies", &content.competencies);
    list("Objectives", &content.objectives);
    section("Context", &content.contextualization);
    section("Materials", &content.materials);
    section("Before the activity", &content.pre_activity);
    section("Procedure", &content.procedure);
    section("After the activity", &content.post_activity);
    section("Expected results", &content.expected_results);

    let safety = &content.safety;
    let risk = safety.risk_level.to_string();
    println!("\n{}", "Safety".dim());
    println!(
        "  Risk:        {}",
        match safety.risk_level {
            RiskLevel::Low => risk.success(),
            RiskLevel::Medium => risk.info(),
            RiskLevel::High => risk.warning(),
        }
    );
    for (label, text) in [
        ("Hazards:    ", &safety.hazards),
        ("Equipment:  ", &safety.protective_equipment),
        ("Supervision:", &safety.supervision),
        ("Precautions:", &safety.precautions),
        ("First aid:  ", &safety.first_aid),
        ("Disposal:   ", &safety.disposal),
    ] {
        if !text.is_empty() {
            println!("  {label} {text}");
        }
    }

    if !content.quiz.is_empty() {
        println!("\n{}", "Quiz".dim());
        for (number, item) in content.quiz.iter().enumerate() {
            print_quiz_item(number + 1, item);
        }
    }

    let differentiation = &content.differentiation;
    list("Simplification", &differentiation.simplification);
    list("Going further", &differentiation.extension);
    list("Inclusion", &differentiation.inclusion);
    list("Resources", &content.supplementary_resources);
}

fn section(heading: &str, text: &str) {
    if text.trim().is_empty() {
        return;
    }
    println!("\n{}", heading.dim());
    for line in text.lines() {
        println!("  {line}");
    }
}

fn list(heading: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    println!("\n{}", heading.dim());
    for item in items {
        println!("  • {item}");
    }
}

fn print_quiz_item(number: usize, item: &QuizItem) {
    match item {
        QuizItem::MultipleChoice {
            question,
            options,
            correct,
            explanation,
        } => {
            println!("  {number}. {question}");
            for (letter, option) in [OptionLetter::A, OptionLetter::B, OptionLetter::C, OptionLetter::D]
                .into_iter()
                .zip(options)
            {
                let line = format!("{}) {option}", String::from(letter));
                if letter == *correct {
                    println!("     {}", line.success());
                } else {
                    println!("     {line}");
                }
            }
            answer(explanation);
        }
        QuizItem::TrueFalse {
            statement,
            correct,
            explanation,
        } => {
            println!("  {number}. {statement}");
            let verdict = if *correct { "Verdadeiro" } else { "Falso" };
            println!("     {}", verdict.success());
            answer(explanation);
        }
        QuizItem::OpenEnded {
            question,
            suggested_answer,
        } => {
            println!("  {number}. {question}");
            answer(suggested_answer);
        }
    }
}

fn answer(text: &str) {
    if !text.is_empty() {
        println!("     {}", text.dim());
    }
}
