use crate::{
    domain::{Differentiation, ProtocolDraft, SafetyBlock},
    generation::prompt::UNTITLED,
};

/// Synthesizes a minimal protocol from the request alone.
///
/// Used whenever generation fails. The result always passes
/// [`ProtocolDraft::validate`], whatever the inputs.
#[must_use]
pub fn fallback_protocol(title: &str, summary: &str) -> ProtocolDraft {
    let title = match title.trim() {
        "" => UNTITLED,
        title => title,
    };
    let summary = summary.trim();

    ProtocolDraft {
        title: title.to_string(),
        subtitle: "Protocolo experimental".to_string(),
        duration: "45 minutos".to_string(),
        competencies: vec!["Trabalho prático".to_string()],
        objectives: vec!["Realizar a experiência proposta".to_string()],
        contextualization: summary.to_string(),
        summary: summary.to_string(),
        materials: "Erro ao gerar materiais. Por favor, tenta novamente.".to_string(),
        pre_activity: "Discussão prévia sobre o tema.".to_string(),
        procedure: "Erro ao gerar procedimento. Por favor, tenta novamente.".to_string(),
        post_activity: "Discussão dos resultados observados.".to_string(),
        expected_results: "A definir.".to_string(),
        safety: SafetyBlock::conservative(),
        quiz: Vec::new(),
        differentiation: Differentiation::default(),
        supplementary_resources: Vec::new(),
        disciplines: Vec::new(),
        grade_levels: Vec::new(),
        author: String::new(),
    }
}
