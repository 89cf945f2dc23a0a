use std::{fmt, num::ParseIntError, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use tracing::warn;

use crate::domain::coerce;

/// Identity of a stored protocol.
///
/// Assigned by the storage backend when a protocol is created and never
/// changed afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProtocolId(i64);

impl ProtocolId {
    /// Wraps a raw backend identifier.
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// The raw backend identifier.
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for ProtocolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ProtocolId {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(Self)
    }
}

/// How hazardous an activity is.
///
/// Unrecognised labels read as [`RiskLevel::Medium`], the conservative
/// choice.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RiskLevel {
    /// Everyday materials, no special handling.
    Low,
    /// Needs protective equipment or close supervision.
    #[default]
    Medium,
    /// Hazardous materials or procedures.
    High,
}

impl RiskLevel {
    /// Reads a label in Portuguese or English, with or without accents.
    #[must_use]
    pub fn from_label(label: &str) -> Self {
        let label = label.trim().to_lowercase();
        if label.starts_with("baix") || label.starts_with("low") {
            Self::Low
        } else if label.starts_with("alt") || label.starts_with("high") || label.starts_with("elevad")
        {
            Self::High
        } else {
            Self::Medium
        }
    }

    /// The label used on the wire and in storage.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Low => "Baixo",
            Self::Medium => "Médio",
            Self::High => "Alto",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl Serialize for RiskLevel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

impl<'de> Deserialize<'de> for RiskLevel {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(|value| Self::from_label(&coerce::text(&value)))
    }
}

/// Laboratory safety information for a protocol.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SafetyBlock {
    /// Overall hazard rating.
    #[serde(rename = "nivel_risco")]
    pub risk_level: RiskLevel,
    /// Specific hazards of the activity.
    #[serde(rename = "riscos", deserialize_with = "coerce::deserialize_text")]
    pub hazards: String,
    /// Protective equipment required.
    #[serde(rename = "epi", deserialize_with = "coerce::deserialize_text")]
    pub protective_equipment: String,
    /// The supervision the activity needs.
    #[serde(rename = "supervisao", deserialize_with = "coerce::deserialize_text")]
    pub supervision: String,
    /// Safety procedures to follow.
    #[serde(rename = "cuidados", deserialize_with = "coerce::deserialize_text")]
    pub precautions: String,
    /// What to do in case of an accident.
    #[serde(rename = "primeiros_socorros", deserialize_with = "coerce::deserialize_text")]
    pub first_aid: String,
    /// How to dispose of materials.
    #[serde(rename = "descarte", deserialize_with = "coerce::deserialize_text")]
    pub disposal: String,
}

impl SafetyBlock {
    /// Conservative safety content used when nothing better is available.
    ///
    /// Risk is rated medium and adult supervision is mandatory.
    #[must_use]
    pub fn conservative() -> Self {
        Self {
            risk_level: RiskLevel::Medium,
            hazards: "Análise de segurança não disponível.".to_string(),
            protective_equipment: "Óculos e bata de laboratório recomendados.".to_string(),
            supervision: "Obrigatória: professor presente durante toda a atividade.".to_string(),
            precautions: "Supervisão constante necessária.".to_string(),
            first_aid: "Contactar responsável em caso de acidente.".to_string(),
            disposal: "Seguir normas do laboratório.".to_string(),
        }
    }

    /// Fills every empty text field from `defaults`, leaving populated
    /// fields and the risk level untouched.
    pub fn fill_missing_from(&mut self, defaults: &Self) {
        for (field, default) in [
            (&mut self.hazards, &defaults.hazards),
            (&mut self.protective_equipment, &defaults.protective_equipment),
            (&mut self.supervision, &defaults.supervision),
            (&mut self.precautions, &defaults.precautions),
            (&mut self.first_aid, &defaults.first_aid),
            (&mut self.disposal, &defaults.disposal),
        ] {
            if field.trim().is_empty() {
                field.clone_from(default);
            }
        }
    }

    fn text_fields(&self) -> [(&'static str, &str); 6] {
        [
            ("riscos", self.hazards.as_str()),
            ("epi", self.protective_equipment.as_str()),
            ("supervisao", self.supervision.as_str()),
            ("cuidados", self.precautions.as_str()),
            ("primeiros_socorros", self.first_aid.as_str()),
            ("descarte", self.disposal.as_str()),
        ]
    }
}

/// Letter of the correct option in a multiple-choice question.
///
/// Accepts `"B"`, `"b"`, `"B)"` or `"B) option text"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum OptionLetter {
    /// First option.
    A,
    /// Second option.
    B,
    /// Third option.
    C,
    /// Fourth option.
    D,
}

impl TryFrom<String> for OptionLetter {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let trimmed = value.trim();
        let mut chars = trimmed.chars();
        let letter = match chars.next().map(|c| c.to_ascii_uppercase()) {
            Some('A') => Self::A,
            Some('B') => Self::B,
            Some('C') => Self::C,
            Some('D') => Self::D,
            _ => return Err(format!("'{value}' is not an option letter")),
        };
        match chars.next() {
            None | Some(')' | '.') => Ok(letter),
            Some(_) => Err(format!("'{value}' is not an option letter")),
        }
    }
}

impl From<OptionLetter> for String {
    fn from(letter: OptionLetter) -> Self {
        match letter {
            OptionLetter::A => "A",
            OptionLetter::B => "B",
            OptionLetter::C => "C",
            OptionLetter::D => "D",
        }
        .to_string()
    }
}

/// A single quiz question.
///
/// Each variant has its own required fields; an entry that does not match
/// one variant exactly is rejected rather than half-accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "tipo", deny_unknown_fields)]
pub enum QuizItem {
    /// Four options, one correct.
    #[serde(rename = "multipla_escolha")]
    MultipleChoice {
        /// The question.
        #[serde(rename = "pergunta")]
        question: String,
        /// Exactly four options.
        #[serde(rename = "opcoes")]
        options: [String; 4],
        /// Which option is correct.
        #[serde(rename = "resposta_correta")]
        correct: OptionLetter,
        /// Why the correct option is correct.
        #[serde(rename = "explicacao", default)]
        explanation: String,
    },
    /// A statement to be judged true or false.
    #[serde(rename = "verdadeiro_falso")]
    TrueFalse {
        /// The statement.
        #[serde(rename = "afirmacao")]
        statement: String,
        /// Whether the statement is true.
        #[serde(rename = "resposta_correta")]
        correct: bool,
        /// Why.
        #[serde(rename = "explicacao", default)]
        explanation: String,
    },
    /// A free-text question.
    #[serde(rename = "aberta")]
    OpenEnded {
        /// The question.
        #[serde(rename = "pergunta")]
        question: String,
        /// A model answer for the teacher.
        #[serde(rename = "resposta_sugerida", default)]
        suggested_answer: String,
    },
}

/// Suggestions for adapting the activity to different students.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Differentiation {
    /// Ways to simplify the activity.
    #[serde(rename = "simplificacao", deserialize_with = "coerce::deserialize_lines")]
    pub simplification: Vec<String>,
    /// Extension challenges for faster students.
    #[serde(rename = "aprofundamento", deserialize_with = "coerce::deserialize_lines")]
    pub extension: Vec<String>,
    /// Adaptations for inclusion.
    #[serde(rename = "inclusao", deserialize_with = "coerce::deserialize_lines")]
    pub inclusion: Vec<String>,
}

/// The content of a protocol, before or after it has been stored.
///
/// Deserialising from any JSON object succeeds: fields of the wrong shape
/// are coerced and missing fields take their empty default.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolDraft {
    /// Title.
    #[serde(rename = "titulo", deserialize_with = "coerce::deserialize_text")]
    pub title: String,
    /// Subtitle naming the scientific concept.
    #[serde(rename = "subtitulo", deserialize_with = "coerce::deserialize_text")]
    pub subtitle: String,
    /// Estimated duration, e.g. "45-50 minutos".
    #[serde(rename = "duracao", deserialize_with = "coerce::deserialize_text")]
    pub duration: String,
    /// Competencies developed.
    #[serde(rename = "competencias", deserialize_with = "coerce::deserialize_lines")]
    pub competencies: Vec<String>,
    /// Learning objectives.
    #[serde(rename = "objetivos", deserialize_with = "coerce::deserialize_lines")]
    pub objectives: Vec<String>,
    /// Motivating paragraph linking the activity to everyday life.
    #[serde(rename = "contextualizacao", deserialize_with = "coerce::deserialize_text")]
    pub contextualization: String,
    /// Short summary.
    #[serde(rename = "resumo", deserialize_with = "coerce::deserialize_text")]
    pub summary: String,
    /// Materials and quantities.
    #[serde(rename = "materiais", deserialize_with = "coerce::deserialize_text")]
    pub materials: String,
    /// Questions to ask before the activity.
    #[serde(rename = "pre_experiencia", deserialize_with = "coerce::deserialize_text")]
    pub pre_activity: String,
    /// Step-by-step procedure.
    #[serde(rename = "procedimento", deserialize_with = "coerce::deserialize_text")]
    pub procedure: String,
    /// Discussion after the activity.
    #[serde(rename = "pos_experiencia", deserialize_with = "coerce::deserialize_text")]
    pub post_activity: String,
    /// What students should observe.
    #[serde(rename = "resultados_esperados", deserialize_with = "coerce::deserialize_text")]
    pub expected_results: String,
    /// Safety information.
    #[serde(rename = "seguranca", deserialize_with = "coerce::deserialize_safety")]
    pub safety: SafetyBlock,
    /// Quiz questions.
    #[serde(deserialize_with = "coerce::deserialize_quiz")]
    pub quiz: Vec<QuizItem>,
    /// Differentiation suggestions.
    #[serde(rename = "diferenciacao", deserialize_with = "coerce::deserialize_differentiation")]
    pub differentiation: Differentiation,
    /// Further reading and resources.
    #[serde(rename = "recursos_extras", deserialize_with = "coerce::deserialize_lines")]
    pub supplementary_resources: Vec<String>,
    /// Disciplines the protocol belongs to.
    #[serde(rename = "disciplinas", deserialize_with = "coerce::deserialize_lines")]
    pub disciplines: Vec<String>,
    /// School years the protocol targets.
    #[serde(rename = "anos", deserialize_with = "coerce::deserialize_lines")]
    pub grade_levels: Vec<String>,
    /// Who created the protocol.
    #[serde(rename = "autor", deserialize_with = "coerce::deserialize_text")]
    pub author: String,
}

impl ProtocolDraft {
    /// Normalises an arbitrary JSON value into a draft.
    ///
    /// Never fails. A value that is not an object yields the empty draft.
    #[must_use]
    pub fn from_value(value: &Value) -> Self {
        if !value.is_object() {
            warn!("protocol is not an object, using an empty draft");
            return Self::default();
        }
        Self::deserialize(value).unwrap_or_else(|e| {
            warn!(error = %e, "unreadable protocol, using an empty draft");
            Self::default()
        })
    }

    /// Checks the draft is complete enough to hand to a teacher.
    ///
    /// # Errors
    ///
    /// Returns the first [`SchemaViolation`] found.
    pub fn validate(&self) -> Result<(), SchemaViolation> {
        if self.title.trim().is_empty() {
            return Err(SchemaViolation::EmptyField("titulo"));
        }
        if self.procedure.trim().is_empty() {
            return Err(SchemaViolation::EmptyField("procedimento"));
        }
        if let Some((name, _)) = self
            .safety
            .text_fields()
            .into_iter()
            .find(|(_, value)| value.trim().is_empty())
        {
            return Err(SchemaViolation::EmptySafetyField(name));
        }
        for (index, item) in self.quiz.iter().enumerate() {
            if let QuizItem::MultipleChoice { options, .. } = item {
                if options.iter().any(|option| option.trim().is_empty()) {
                    return Err(SchemaViolation::EmptyQuizOption { index });
                }
            }
        }
        Ok(())
    }
}

/// A way in which a draft fails validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaViolation {
    /// A required text field is empty.
    #[error("field '{0}' is empty")]
    EmptyField(&'static str),
    /// A safety field is empty.
    #[error("safety field '{0}' is empty")]
    EmptySafetyField(&'static str),
    /// A multiple-choice question has an empty option.
    #[error("quiz item {index} has an empty option")]
    EmptyQuizOption {
        /// Position of the offending quiz item.
        index: usize,
    },
}

/// Popularity counters.
///
/// Only ever changed one field at a time, by one, through
/// [`crate::storage::ProtocolStore::increment`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counters {
    /// Number of likes.
    #[serde(rename = "gostos")]
    pub likes: u64,
    /// Number of dislikes.
    #[serde(rename = "nao_gostos")]
    pub dislikes: u64,
    /// Number of times the protocol was viewed.
    #[serde(rename = "visualizacoes")]
    pub views: u64,
}

/// A stored protocol.
///
/// Only the storage layer constructs these, so the identity and creation
/// time always come from the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Protocol {
    id: ProtocolId,
    #[serde(flatten)]
    content: ProtocolDraft,
    #[serde(flatten)]
    counters: Counters,
    #[serde(rename = "data_criacao")]
    created_at: DateTime<Utc>,
}

impl Protocol {
    pub(crate) const fn new(
        id: ProtocolId,
        content: ProtocolDraft,
        counters: Counters,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            content,
            counters,
            created_at,
        }
    }

    /// The backend-assigned identity.
    #[must_use]
    pub const fn id(&self) -> ProtocolId {
        self.id
    }

    /// The protocol content.
    #[must_use]
    pub const fn content(&self) -> &ProtocolDraft {
        &self.content
    }

    /// Popularity counters at the time of reading.
    #[must_use]
    pub const fn counters(&self) -> Counters {
        self.counters
    }

    /// When the protocol was created.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Consumes the protocol, returning its content.
    #[must_use]
    pub fn into_content(self) -> ProtocolDraft {
        self.content
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use test_case::test_case;

    use super::*;

    #[test_case("Baixo", RiskLevel::Low)]
    #[test_case("baixa", RiskLevel::Low)]
    #[test_case("Low", RiskLevel::Low)]
    #[test_case("Médio", RiskLevel::Medium)]
    #[test_case("medio", RiskLevel::Medium)]
    #[test_case("Alto", RiskLevel::High)]
    #[test_case("HIGH", RiskLevel::High)]
    #[test_case("", RiskLevel::Medium; "empty label")]
    #[test_case("não sei", RiskLevel::Medium; "unknown label")]
    fn risk_level_from_label(label: &str, expected: RiskLevel) {
        assert_eq!(RiskLevel::from_label(label), expected);
    }

    #[test_case("B", Some(OptionLetter::B))]
    #[test_case("c", Some(OptionLetter::C))]
    #[test_case(" A) Oxigénio", Some(OptionLetter::A); "letter with text")]
    #[test_case("D.", Some(OptionLetter::D))]
    #[test_case("E", None)]
    #[test_case("Banana", None)]
    #[test_case("", None)]
    fn option_letter_parsing(raw: &str, expected: Option<OptionLetter>) {
        assert_eq!(OptionLetter::try_from(raw.to_string()).ok(), expected);
    }

    #[test]
    fn draft_coerces_lists_into_text_fields() {
        let draft = ProtocolDraft::from_value(&json!({
            "titulo": "Vulcão",
            "materiais": ["Bicarbonato", "Vinagre"],
            "competencias": "Raciocínio\nComunicação",
            "duracao": 45,
        }));

        assert_eq!(draft.title, "Vulcão");
        assert_eq!(draft.materials, "Bicarbonato\nVinagre");
        assert_eq!(draft.competencies, ["Raciocínio", "Comunicação"]);
        assert_eq!(draft.duration, "45");
        assert_eq!(draft.safety, SafetyBlock::default());
        assert!(draft.quiz.is_empty());
    }

    #[test_case(json!([1, 2]); "numbers")]
    #[test_case(json!(["Vulcão", "Sub", "45"]); "strings in field order")]
    #[test_case(json!("Vulcão"); "string")]
    #[test_case(json!(null); "null")]
    fn draft_from_non_object_is_empty(value: Value) {
        assert_eq!(ProtocolDraft::from_value(&value), ProtocolDraft::default());
    }

    #[test]
    fn safety_block_reads_wire_names() {
        let draft = ProtocolDraft::from_value(&json!({
            "seguranca": {
                "nivel_risco": "Alto",
                "riscos": ["Queimaduras", "Salpicos"],
                "epi": "Luvas",
                "supervisao": null
            }
        }));

        assert_eq!(draft.safety.risk_level, RiskLevel::High);
        assert_eq!(draft.safety.hazards, "Queimaduras\nSalpicos");
        assert_eq!(draft.safety.protective_equipment, "Luvas");
        assert_eq!(draft.safety.supervision, "");
    }

    #[test]
    fn fill_missing_keeps_populated_fields() {
        let mut safety = SafetyBlock {
            risk_level: RiskLevel::Low,
            hazards: "Nenhum".to_string(),
            ..SafetyBlock::default()
        };

        safety.fill_missing_from(&SafetyBlock::conservative());

        assert_eq!(safety.risk_level, RiskLevel::Low);
        assert_eq!(safety.hazards, "Nenhum");
        assert_eq!(safety.supervision, SafetyBlock::conservative().supervision);
    }

    #[test]
    fn validate_reports_missing_safety() {
        let draft = ProtocolDraft {
            title: "Título".to_string(),
            procedure: "Passo 1".to_string(),
            ..ProtocolDraft::default()
        };

        assert_eq!(
            draft.validate(),
            Err(SchemaViolation::EmptySafetyField("riscos"))
        );
    }

    #[test]
    fn serialises_with_wire_names() {
        let draft = ProtocolDraft {
            title: "X".to_string(),
            quiz: vec![QuizItem::TrueFalse {
                statement: "S".to_string(),
                correct: false,
                explanation: String::new(),
            }],
            ..ProtocolDraft::default()
        };

        let value = serde_json::to_value(&draft).unwrap();

        assert_eq!(value["titulo"], "X");
        assert_eq!(value["seguranca"]["nivel_risco"], "Médio");
        assert_eq!(value["quiz"][0]["tipo"], "verdadeiro_falso");
        assert_eq!(value["diferenciacao"]["simplificacao"], json!([]));
    }
}
