//! The stored form of a protocol and the conversions to and from it.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::{Map, Value};
use tracing::warn;

use crate::{
    domain::{Counters, Protocol, ProtocolDraft, ProtocolId, coerce},
    storage::StorageError,
};

/// How a backend holds structured fields.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Encoding {
    /// Structured fields are kept as JSON text (relational columns).
    #[default]
    Text,
    /// Structured fields are kept as JSON values (remote table service).
    Native,
}

/// What a column holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    /// Plain text.
    Text,
    /// A sequence of strings flattened to newline-joined text.
    Lines,
    /// A nested value, encoded according to the backend's [`Encoding`].
    Structured,
    /// A non-negative counter.
    Counter,
    /// The creation timestamp.
    Timestamp,
}

/// A persisted field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    /// Name in the canonical shape and in the remote table.
    pub field: &'static str,
    /// Name in the relational table.
    pub relational: &'static str,
    /// What it holds.
    pub kind: ColumnKind,
}

const fn column(field: &'static str, kind: ColumnKind) -> Column {
    Column {
        field,
        relational: field,
        kind,
    }
}

/// Every persisted field except the identity, in table order.
pub const COLUMNS: [Column; 23] = [
    column("titulo", ColumnKind::Text),
    column("subtitulo", ColumnKind::Text),
    column("duracao", ColumnKind::Text),
    column("competencias", ColumnKind::Lines),
    column("objetivos", ColumnKind::Lines),
    column("contextualizacao", ColumnKind::Text),
    column("resumo", ColumnKind::Text),
    column("materiais", ColumnKind::Text),
    column("pre_experiencia", ColumnKind::Text),
    column("procedimento", ColumnKind::Text),
    column("pos_experiencia", ColumnKind::Text),
    column("resultados_esperados", ColumnKind::Text),
    Column {
        field: "seguranca",
        relational: "seguranca_json",
        kind: ColumnKind::Structured,
    },
    Column {
        field: "quiz",
        relational: "quiz_json",
        kind: ColumnKind::Structured,
    },
    Column {
        field: "diferenciacao",
        relational: "diferenciacao_json",
        kind: ColumnKind::Structured,
    },
    column("recursos_extras", ColumnKind::Lines),
    column("disciplinas", ColumnKind::Structured),
    column("anos", ColumnKind::Structured),
    column("autor", ColumnKind::Text),
    column("gostos", ColumnKind::Counter),
    column("nao_gostos", ColumnKind::Counter),
    column("visualizacoes", ColumnKind::Counter),
    column("data_criacao", ColumnKind::Timestamp),
];

/// Format of SQLite's `CURRENT_TIMESTAMP`.
pub const SQLITE_TIMESTAMP: &str = "%Y-%m-%d %H:%M:%S";

/// A protocol as a backend holds it: one value per field, keyed by the
/// canonical field name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoredProtocol {
    /// Identity, absent until the backend has assigned one.
    pub id: Option<ProtocolId>,
    /// Field values.
    pub values: Map<String, Value>,
}

impl From<&Protocol> for StoredProtocol {
    /// The already-decoded form of a protocol.
    fn from(protocol: &Protocol) -> Self {
        let mut values = match serde_json::to_value(protocol) {
            Ok(Value::Object(values)) => values,
            _ => Map::new(),
        };
        values.remove("id");
        Self {
            id: Some(protocol.id()),
            values,
        }
    }
}

/// Normalises arbitrary protocol JSON into the form a backend stores.
///
/// Total: missing fields become empty, sequences bound for text fields are
/// newline-joined and nested values are encoded as the backend expects.
/// Counters and the creation time are left to the backend.
#[must_use]
pub fn coerce_for_storage(record: &Value, encoding: Encoding) -> StoredProtocol {
    let draft = ProtocolDraft::from_value(record);
    let mut values = Map::new();

    let mut text = |field: &str, value: &str| {
        values.insert(field.to_string(), Value::String(value.to_string()));
    };
    text("titulo", &draft.title);
    text("subtitulo", &draft.subtitle);
    text("duracao", &draft.duration);
    text("competencias", &coerce::join_lines(&draft.competencies));
    text("objetivos", &coerce::join_lines(&draft.objectives));
    text("contextualizacao", &draft.contextualization);
    text("resumo", &draft.summary);
    text("materiais", &draft.materials);
    text("pre_experiencia", &draft.pre_activity);
    text("procedimento", &draft.procedure);
    text("pos_experiencia", &draft.post_activity);
    text("resultados_esperados", &draft.expected_results);
    text("recursos_extras", &coerce::join_lines(&draft.supplementary_resources));
    text("autor", &draft.author);

    let structured = [
        ("seguranca", serde_json::to_value(&draft.safety)),
        ("quiz", serde_json::to_value(&draft.quiz)),
        ("diferenciacao", serde_json::to_value(&draft.differentiation)),
        ("disciplinas", serde_json::to_value(&draft.disciplines)),
        ("anos", serde_json::to_value(&draft.grade_levels)),
    ];
    for (field, value) in structured {
        let value = value.unwrap_or_default();
        let encoded = match encoding {
            Encoding::Native => value,
            Encoding::Text => Value::String(value.to_string()),
        };
        values.insert(field.to_string(), encoded);
    }

    StoredProtocol { id: None, values }
}

/// Decodes a stored protocol back into its canonical shape.
///
/// Each field is decoded on its own. A corrupt field takes its empty
/// default instead of failing the read, and a field that is already decoded
/// is taken as it is, so decoding the result again changes nothing.
///
/// # Errors
///
/// Returns an error if the record has no identity.
pub fn reconstruct_for_read(stored: StoredProtocol) -> Result<Protocol, StorageError> {
    let id = stored
        .id
        .ok_or_else(|| StorageError::Persistence("stored record has no id".to_string()))?;
    let mut values = stored.values;
    let mut take = |field: &str| values.remove(field).unwrap_or(Value::Null);

    let content = ProtocolDraft {
        title: coerce::text(&take("titulo")),
        subtitle: coerce::text(&take("subtitulo")),
        duration: coerce::text(&take("duracao")),
        competencies: coerce::lines(&take("competencias")),
        objectives: coerce::lines(&take("objetivos")),
        contextualization: coerce::text(&take("contextualizacao")),
        summary: coerce::text(&take("resumo")),
        materials: coerce::text(&take("materiais")),
        pre_activity: coerce::text(&take("pre_experiencia")),
        procedure: coerce::text(&take("procedimento")),
        post_activity: coerce::text(&take("pos_experiencia")),
        expected_results: coerce::text(&take("resultados_esperados")),
        safety: coerce::safety(&decode(id, "seguranca", take("seguranca"))),
        quiz: coerce::quiz_items(&decode(id, "quiz", take("quiz"))),
        differentiation: coerce::differentiation(&decode(
            id,
            "diferenciacao",
            take("diferenciacao"),
        )),
        supplementary_resources: coerce::lines(&take("recursos_extras")),
        disciplines: coerce::lines(&decode_or_raw(take("disciplinas"))),
        grade_levels: coerce::lines(&decode_or_raw(take("anos"))),
        author: coerce::text(&take("autor")),
    };

    let counters = Counters {
        likes: counter(&take("gostos")),
        dislikes: counter(&take("nao_gostos")),
        views: counter(&take("visualizacoes")),
    };

    let created_at = timestamp(id, &take("data_criacao"));

    Ok(Protocol::new(id, content, counters, created_at))
}

/// Decodes JSON text, passing values that are already decoded through.
fn decode(id: ProtocolId, field: &str, value: Value) -> Value {
    match value {
        Value::String(text) if text.trim().is_empty() => Value::Null,
        Value::String(text) => serde_json::from_str(&text).unwrap_or_else(|e| {
            warn!(%id, field, error = %e, "corrupt stored field, using its empty default");
            Value::Null
        }),
        other => other,
    }
}

/// Like [`decode`], but text that is not JSON is kept as newline-separated
/// text.
fn decode_or_raw(value: Value) -> Value {
    match value {
        Value::String(text) => serde_json::from_str(&text).unwrap_or(Value::String(text)),
        other => other,
    }
}

fn counter(value: &Value) -> u64 {
    match value {
        Value::Number(n) => n.as_u64().unwrap_or(0),
        Value::String(s) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

fn timestamp(id: ProtocolId, value: &Value) -> DateTime<Utc> {
    let parsed = match value {
        Value::String(s) => parse_timestamp(s.trim()),
        Value::Number(n) => n.as_i64().and_then(|secs| DateTime::from_timestamp(secs, 0)),
        _ => None,
    };
    parsed.unwrap_or_else(|| {
        warn!(%id, value = %value, "unreadable creation time, using the epoch");
        DateTime::default()
    })
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(s, SQLITE_TIMESTAMP)
                .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f"))
                .map(|t| t.and_utc())
                .ok()
        })
}
