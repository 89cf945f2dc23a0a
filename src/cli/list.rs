use clap::Parser;
use protolab::{Protocol, Services};
use serde::Serialize;
use tracing::instrument;

use super::{OutputFormat, terminal};

#[derive(Debug, Parser)]
pub struct List {
    /// Maximum number of protocols to show
    #[arg(long, short)]
    limit: Option<usize>,

    /// Output format
    #[arg(long, value_name = "FORMAT", default_value = "pretty")]
    output: OutputFormat,
}

impl List {
    #[instrument(level = "debug", skip(services))]
    pub fn run(self, services: &Services) -> anyhow::Result<()> {
        let protocols = services.list(self.limit)?;
        render(&protocols, self.output)
    }
}

#[derive(Debug, Parser)]
pub struct Search {
    /// Text to look for in titles, summaries and authors
    term: String,

    /// Output format
    #[arg(long, value_name = "FORMAT", default_value = "pretty")]
    output: OutputFormat,
}

impl Search {
    #[instrument(level = "debug", skip(services))]
    pub fn run(self, services: &Services) -> anyhow::Result<()> {
        let protocols = services.search(&self.term)?;
        render(&protocols, self.output)
    }
}

/// One line of the listing.
#[derive(Debug, Serialize)]
struct Row<'a> {
    id: i64,
    titulo: &'a str,
    autor: &'a str,
    disciplinas: &'a [String],
    gostos: u64,
    visualizacoes: u64,
    data_criacao: String,
}

impl<'a> From<&'a Protocol> for Row<'a> {
    fn from(protocol: &'a Protocol) -> Self {
        let content = protocol.content();
        let counters = protocol.counters();
        Self {
            id: protocol.id().get(),
            titulo: &content.title,
            autor: &content.author,
            disciplinas: &content.disciplines,
            gostos: counters.likes,
            visualizacoes: counters.views,
            data_criacao: protocol.created_at().format("%Y-%m-%d").to_string(),
        }
    }
}

fn render(protocols: &[Protocol], output: OutputFormat) -> anyhow::Result<()> {
    let rows: Vec<Row<'_>> = protocols.iter().map(Row::from).collect();
    match output {
        OutputFormat::Pretty => render_table(&rows),
        OutputFormat::Json => super::write_json(&rows, None)?,
    }
    Ok(())
}

fn render_table(rows: &[Row<'_>]) {
    use terminal::Colorize;

    if rows.is_empty() {
        println!("{}", "No protocols found".dim());
        return;
    }

    let narrow = terminal::is_narrow();
    let title_width = terminal::terminal_width()
        .map_or(40, |w| usize::from(w).saturating_sub(if narrow { 12 } else { 50 }))
        .clamp(16, 60);

    if narrow {
        println!("{}", format!("{:>5}  {:<title_width$}", "ID", "Title").dim());
    } else {
        println!(
            "{}",
            format!(
                "{:>5}  {:<title_width$}  {:<20}  {:>5}  {:>5}  {:<10}",
                "ID", "Title", "Author", "👍", "👁", "Created"
            )
            .dim()
        );
    }

    for row in rows {
        let title = truncate(row.titulo, title_width);
        if narrow {
            println!("{:>5}  {title}", row.id);
        } else {
            println!(
                "{:>5}  {title:<title_width$}  {:<20}  {:>5}  {:>5}  {:<10}",
                row.id,
                truncate(row.autor, 20),
                row.gostos,
                row.visualizacoes,
                row.data_criacao
            );
        }
    }

    println!("\n{}", format!("{} protocol(s)", rows.len()).dim());
}

/// Shortens `text` to at most `width` characters, marking the cut.
fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    let mut shortened: String = text.chars().take(width.saturating_sub(1)).collect();
    shortened.push('…');
    shortened
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::truncate;

    #[test_case("Vulcão", 10, "Vulcão"; "short text")]
    #[test_case("Vulcão de bicarbonato", 10, "Vulcão de…"; "long text")]
    #[test_case("Ácido", 5, "Ácido"; "exact width")]
    fn truncating(text: &str, width: usize, expected: &str) {
        assert_eq!(truncate(text, width), expected);
    }
}
