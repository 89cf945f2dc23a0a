//! A protocol's life through the public API: drafted, stored, viewed,
//! rated, searched and counted.

use protolab::{
    GenerationRequest, Rating, Services,
    generation::{GenerationError, Generator, Prompt},
    storage::{SqliteStore, StorageError},
};
use serde_json::json;
use tempfile::TempDir;

/// Answers every prompt with the same fenced JSON, as models often do.
struct Fenced;

impl Generator for Fenced {
    fn generate(&self, _prompt: &Prompt) -> Result<String, GenerationError> {
        Ok(r#"Aqui está:
```json
{
  "titulo": "Vulcão de bicarbonato",
  "procedimento": "1. Misturar\n2. Observar",
  "seguranca": {"nivel_risco": "Baixo", "riscos": "Salpicos"},
  "quiz": [{"tipo": "verdadeiro_falso", "afirmacao": "Liberta CO2", "resposta_correta": true}]
}
```"#
            .to_string())
    }
}

struct Offline;

impl Generator for Offline {
    fn generate(&self, _prompt: &Prompt) -> Result<String, GenerationError> {
        Err(GenerationError::Timeout)
    }
}

fn services(generator: impl Generator + Send + Sync + 'static) -> (TempDir, Services) {
    let tmp = TempDir::new().unwrap();
    let store = SqliteStore::open(tmp.path().join("protocolos.db"), "protocolos").unwrap();
    (tmp, Services::new(store, generator, "https://labs.example.org"))
}

fn request() -> GenerationRequest {
    GenerationRequest {
        title: "Vulcão".to_string(),
        summary: "Reação ácido-base".to_string(),
        grade_levels: vec!["5º".to_string()],
        disciplines: vec!["Química".to_string()],
        author: "Ana".to_string(),
    }
}

#[test]
fn generated_protocol_round_trips_through_storage() {
    let (_tmp, services) = services(Fenced);

    let draft = services.generate(&request());
    assert_eq!(draft.title, "Vulcão de bicarbonato");
    assert_eq!(draft.author, "Ana");
    assert_eq!(draft.disciplines, ["Química"]);
    assert!(!draft.safety.first_aid.is_empty(), "missing safety is filled in");

    let id = services.save(&serde_json::to_value(&draft).unwrap()).unwrap();
    let stored = services.view(id).unwrap();

    assert_eq!(stored.content(), &draft);
    assert_eq!(stored.counters().views, 1);
    assert_eq!(
        services.share_url(id),
        format!("https://labs.example.org/protocolo/{id}")
    );
}

#[test]
fn offline_model_still_yields_a_storable_protocol() {
    let (_tmp, services) = services(Offline);

    let draft = services.generate(&request());
    assert_eq!(draft.title, "Vulcão");
    assert!(draft.validate().is_ok());

    let id = services.save(&serde_json::to_value(&draft).unwrap()).unwrap();
    assert_eq!(services.view(id).unwrap().content().title, "Vulcão");
}

#[test]
fn loosely_shaped_records_are_saved() {
    let (_tmp, services) = services(Offline);

    let id = services
        .save(&json!({
            "titulo": "Pilha de limão",
            "autor": "Rui",
            "objetivos": "Medir tensão\nComparar frutos",
            "disciplinas": "Física",
            "seguranca": {"nivel_risco": "alto", "riscos": ["Ácido", "Vidro"]},
            "quiz": "não é uma lista",
            "gostos": 99
        }))
        .unwrap();

    let protocol = services.view(id).unwrap();
    let content = protocol.content();
    assert_eq!(content.objectives, ["Medir tensão", "Comparar frutos"]);
    assert_eq!(content.disciplines, ["Física"]);
    assert_eq!(content.safety.risk_level.label(), "Alto");
    assert_eq!(content.safety.hazards, "Ácido\nVidro");
    assert!(content.quiz.is_empty());
    assert_eq!(protocol.counters().likes, 0, "counters are not writable");
}

#[test]
fn ratings_search_and_stats() {
    let (_tmp, services) = services(Offline);
    let volcano = services
        .save(&json!({"titulo": "Vulcão", "autor": "Ana", "disciplinas": ["Química"]}))
        .unwrap();
    let lemon = services
        .save(&json!({"titulo": "Pilha de limão", "autor": "Rui", "disciplinas": ["Física", "Química"]}))
        .unwrap();

    services.rate(volcano, Rating::Like).unwrap();
    services.rate(volcano, Rating::Like).unwrap();
    let tally = services.rate(volcano, Rating::Dislike).unwrap();
    assert_eq!((tally.gostos, tally.nao_gostos), (2, 1));
    services.rate(lemon, Rating::Like).unwrap();
    services.view(lemon).unwrap();

    let found = services.search("VULCÃO").unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id(), volcano);
    assert_eq!(services.search("rui").unwrap()[0].id(), lemon);
    assert!(services.search("ferro").unwrap().is_empty());

    let stats = services.stats().unwrap();
    assert_eq!(stats.total, 2);
    assert_eq!(stats.total_views, 1);
    assert_eq!(stats.most_popular[0].id, volcano);
    assert_eq!(stats.by_discipline[0].discipline, "Química");
    assert_eq!(stats.by_discipline[0].count, 2);
}

#[test]
fn missing_protocols_are_reported() {
    let (_tmp, services) = services(Offline);
    let missing = "404".parse().unwrap();

    assert!(matches!(
        services.view(missing),
        Err(StorageError::NotFound(id)) if id == missing
    ));
    assert!(matches!(
        services.rate(missing, Rating::Like),
        Err(StorageError::NotFound(_))
    ));
}

#[test]
fn regenerating_with_an_offline_model_keeps_the_draft() {
    let (_tmp, services) = services(Offline);
    let draft = services.generate(&request());

    assert_eq!(services.regenerate(&draft, "mais curto"), draft);
}
