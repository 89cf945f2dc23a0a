//! Generate and regenerate flows.
//!
//! Both flows always hand back a usable draft. Anything that goes wrong on
//! the way (the model being unreachable, answering with prose, or leaving out
//! required content) is logged and replaced by a safe substitute.

use serde_json::Value;
use tracing::{info, instrument, warn};

use crate::{
    domain::{ProtocolDraft, SafetyBlock, SchemaViolation},
    generation::{
        GenerationError, Generator, MalformedResponse, Prompt, fallback_protocol,
        prompt::{self, GenerationRequest},
        sanitize_response,
    },
};

#[derive(Debug, thiserror::Error)]
enum DraftFailure {
    #[error(transparent)]
    Generation(#[from] GenerationError),
    #[error(transparent)]
    Malformed(#[from] MalformedResponse),
    #[error(transparent)]
    Invalid(#[from] SchemaViolation),
    #[error("could not render the previous draft: {0}")]
    Prompt(#[from] serde_json::Error),
}

/// Drafts a new protocol for the request.
///
/// Never fails. If the model output is unusable the result is
/// [`fallback_protocol`] for the request. Author, grade levels and
/// disciplines always come from the request.
#[instrument(level = "debug", skip_all, fields(title = %request.title_or_placeholder()))]
pub fn generate_draft<G>(generator: &G, request: &GenerationRequest) -> ProtocolDraft
where
    G: Generator + ?Sized,
{
    let title = request.title_or_placeholder();

    let mut draft = ask(generator, &prompt::protocol_prompt(request))
        .and_then(|draft| complete(draft, title))
        .unwrap_or_else(|e| {
            warn!(error = %e, "generation failed, using the fallback protocol");
            fallback_protocol(title, &request.summary)
        });

    draft.author.clone_from(&request.author);
    draft.grade_levels.clone_from(&request.grade_levels);
    draft.disciplines.clone_from(&request.disciplines);
    draft
}

/// Asks the model to revise `previous` according to `feedback`.
///
/// Never fails. If the revision is unusable `previous` is returned
/// unchanged. Author, grade levels and disciplines are carried over from
/// `previous`.
#[instrument(level = "debug", skip_all, fields(title = %previous.title))]
pub fn regenerate_draft<G>(generator: &G, previous: &ProtocolDraft, feedback: &str) -> ProtocolDraft
where
    G: Generator + ?Sized,
{
    let revised = prompt::revision_prompt(previous, feedback)
        .map_err(DraftFailure::from)
        .and_then(|prompt| ask(generator, &prompt))
        .and_then(|draft| complete(draft, &previous.title));

    match revised {
        Ok(mut draft) => {
            draft.author.clone_from(&previous.author);
            draft.grade_levels.clone_from(&previous.grade_levels);
            draft.disciplines.clone_from(&previous.disciplines);
            draft
        }
        Err(e) => {
            warn!(error = %e, "regeneration failed, keeping the previous draft");
            previous.clone()
        }
    }
}

fn ask<G>(generator: &G, prompt: &Prompt) -> Result<ProtocolDraft, DraftFailure>
where
    G: Generator + ?Sized,
{
    let raw = generator.generate(prompt)?;
    let object = sanitize_response(&raw)?;
    info!("model response parsed");
    Ok(ProtocolDraft::from_value(&Value::Object(object)))
}

fn complete(mut draft: ProtocolDraft, title: &str) -> Result<ProtocolDraft, DraftFailure> {
    if draft.title.trim().is_empty() {
        draft.title = title.to_string();
    }
    draft.safety.fill_missing_from(&SafetyBlock::conservative());
    draft.validate()?;
    Ok(draft)
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use serde_json::json;

    use super::*;
    use crate::{
        domain::{QuizItem, RiskLevel},
        generation::prompt::UNTITLED,
    };

    /// Replays canned replies and records the prompts it was sent.
    struct Scripted {
        reply: Result<String, fn() -> GenerationError>,
        prompts: RefCell<Vec<Prompt>>,
    }

    impl Scripted {
        fn replying(reply: impl Into<String>) -> Self {
            Self {
                reply: Ok(reply.into()),
                prompts: RefCell::default(),
            }
        }

        fn failing(error: fn() -> GenerationError) -> Self {
            Self {
                reply: Err(error),
                prompts: RefCell::default(),
            }
        }
    }

    impl Generator for Scripted {
        fn generate(&self, prompt: &Prompt) -> Result<String, GenerationError> {
            self.prompts.borrow_mut().push(prompt.clone());
            self.reply.clone().map_err(|error| error())
        }
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

    fn model_reply() -> String {
        let body = json!({
            "titulo": "O vulcão que borbulha",
            "procedimento": ["1. Colocar bicarbonato", "2. Juntar vinagre"],
            "seguranca": {
                "nivel_risco": "Baixo",
                "riscos": "Salpicos",
                "epi": "Óculos",
                "supervisao": "Professor",
                "cuidados": "Não ingerir",
                "primeiros_socorros": "Lavar com água",
                "descarte": "Pia"
            },
            "quiz": [
                {"tipo": "aberta", "pergunta": "Que gás se forma?"},
                {"tipo": "multipla_escolha", "pergunta": "Incompleta"}
            ],
            "autor": "Modelo",
            "disciplinas": ["Astronomia"]
        });
        format!("```json\n{body}\n```")
    }

    #[test]
    fn generate_uses_model_output() {
        let generator = Scripted::replying(model_reply());

        let draft = generate_draft(&generator, &request());

        assert_eq!(draft.title, "O vulcão que borbulha");
        assert_eq!(draft.procedure, "1. Colocar bicarbonato\n2. Juntar vinagre");
        assert_eq!(draft.safety.risk_level, RiskLevel::Low);
        assert_eq!(draft.quiz.len(), 1);
        assert!(matches!(draft.quiz[0], QuizItem::OpenEnded { .. }));
        assert_eq!(draft.author, "Ana");
        assert_eq!(draft.disciplines, ["Química"]);
        assert_eq!(draft.grade_levels, ["5º"]);

        let prompts = generator.prompts.borrow();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].user.contains("- Título: Vulcão"));
    }

    #[test]
    fn generate_falls_back_on_malformed_output() {
        let generator = Scripted::replying("Desculpa, não consigo.");

        let draft = generate_draft(&generator, &request());

        assert_eq!(draft, {
            let mut expected = fallback_protocol("Vulcão", "Reação ácido-base");
            expected.author = "Ana".to_string();
            expected.grade_levels = vec!["5º".to_string()];
            expected.disciplines = vec!["Química".to_string()];
            expected
        });
    }

    #[test]
    fn generate_falls_back_on_timeout() {
        let generator = Scripted::failing(|| GenerationError::Timeout);

        let draft = generate_draft(&generator, &request());

        assert_eq!(draft.title, "Vulcão");
        assert_eq!(draft.safety.risk_level, RiskLevel::Medium);
        assert_eq!(draft.validate(), Ok(()));
    }

    #[test]
    fn generate_without_title_falls_back_to_placeholder() {
        let generator = Scripted::failing(|| GenerationError::EmptyResponse);
        let request = GenerationRequest {
            title: String::new(),
            ..request()
        };

        assert_eq!(generate_draft(&generator, &request).title, UNTITLED);
    }

    #[test]
    fn generate_fills_missing_safety_and_title() {
        let generator = Scripted::replying(r#"{"procedimento": "Misturar."}"#);

        let draft = generate_draft(&generator, &request());

        assert_eq!(draft.title, "Vulcão");
        assert_eq!(draft.procedure, "Misturar.");
        assert_eq!(draft.safety, SafetyBlock::conservative());
    }

    #[test]
    fn generate_rejects_output_without_procedure() {
        let generator = Scripted::replying(r#"{"titulo": "Só título"}"#);

        let draft = generate_draft(&generator, &request());

        assert_eq!(
            draft.procedure,
            fallback_protocol("Vulcão", "").procedure
        );
    }

    #[test]
    fn regenerate_keeps_previous_on_failure() {
        let previous = generate_draft(&Scripted::replying(model_reply()), &request());
        let generator = Scripted::failing(|| GenerationError::Status(503));

        assert_eq!(regenerate_draft(&generator, &previous, "Mais passos"), previous);
        assert!(generator.prompts.borrow()[0].user.contains("Mais passos"));
    }

    #[test]
    fn regenerate_carries_over_request_fields() {
        let previous = generate_draft(&Scripted::replying(model_reply()), &request());
        let generator = Scripted::replying(
            r#"{"titulo": "", "procedimento": "Novo procedimento.", "autor": "Outro"}"#,
        );

        let revised = regenerate_draft(&generator, &previous, "Simplifica");

        assert_eq!(revised.title, previous.title);
        assert_eq!(revised.procedure, "Novo procedimento.");
        assert_eq!(revised.author, "Ana");
        assert_eq!(revised.disciplines, ["Química"]);
    }
}
