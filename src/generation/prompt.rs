use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::{
    domain::{ProtocolDraft, coerce},
    generation::Prompt,
};

/// Title used when a request arrives without one.
pub const UNTITLED: &str = "(Sem título)";

/// What a teacher asks for when generating a protocol.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationRequest {
    /// Working title, possibly empty.
    #[serde(rename = "titulo", deserialize_with = "coerce::deserialize_text")]
    pub title: String,
    /// Free-text description of the intended activity.
    #[serde(rename = "resumo", deserialize_with = "coerce::deserialize_text")]
    pub summary: String,
    /// School years the protocol targets.
    #[serde(rename = "anos", deserialize_with = "coerce::deserialize_lines")]
    pub grade_levels: Vec<String>,
    /// Disciplines the protocol belongs to.
    #[serde(rename = "disciplinas", deserialize_with = "coerce::deserialize_lines")]
    pub disciplines: Vec<String>,
    /// Who is asking.
    #[serde(rename = "autor", deserialize_with = "coerce::deserialize_text")]
    pub author: String,
}

impl GenerationRequest {
    /// Reads a request from loosely shaped JSON.
    ///
    /// Never fails. Fields of the wrong shape are coerced, and a value that
    /// is not an object yields the empty request.
    #[must_use]
    pub fn from_value(value: &Value) -> Self {
        if !value.is_object() {
            warn!("generation request is not an object, using an empty request");
            return Self::default();
        }
        Self::deserialize(value).unwrap_or_else(|e| {
            warn!(error = %e, "unreadable generation request, using an empty request");
            Self::default()
        })
    }

    /// The requested title, or [`UNTITLED`] if it is blank.
    #[must_use]
    pub fn title_or_placeholder(&self) -> &str {
        let title = self.title.trim();
        if title.is_empty() { UNTITLED } else { title }
    }
}

const PROTOCOL_SYSTEM: &str = "És um especialista em educação em ciências. Crias protocolos \
pedagógicos completos, seguros e alinhados com o currículo português. Respondes SEMPRE em JSON \
válido.";

const REVISION_SYSTEM: &str =
    "És um especialista em melhorar protocolos experimentais. Respondes em JSON válido.";

/// Builds the prompt for a new protocol.
#[must_use]
pub fn protocol_prompt(request: &GenerationRequest) -> Prompt {
    let grades = request.grade_levels.join(", ");
    let mut user = String::new();

    push_role(&mut user);
    push_base_information(&mut user, request, &grades);
    push_instructions(&mut user);
    push_output_format(&mut user);
    user.push_str(&format!(
        "IMPORTANTE: Linguagem adequada aos anos {grades}. Segurança é PRIORITÁRIA."
    ));

    Prompt {
        system: PROTOCOL_SYSTEM.to_string(),
        user,
    }
}

/// Builds the prompt asking for a revision of `previous` guided by
/// `feedback`.
///
/// # Errors
///
/// Returns an error if the previous draft cannot be rendered as JSON.
pub fn revision_prompt(
    previous: &ProtocolDraft,
    feedback: &str,
) -> Result<Prompt, serde_json::Error> {
    let mut user = String::new();

    user.push_str("Melhora este protocolo experimental com base no feedback do utilizador.\n\n");
    user.push_str("PROTOCOLO ANTERIOR:\n");
    user.push_str(&serde_json::to_string_pretty(previous)?);
    user.push_str("\n\nFEEDBACK:\n");
    user.push_str(feedback.trim());
    user.push_str("\n\nINSTRUÇÕES:\n");
    user.push_str("- Mantém a estrutura JSON completa\n");
    user.push_str("- Melhora apenas o que foi pedido\n");
    user.push_str("- Mantém segurança e qualidade pedagógica\n");
    user.push_str("- Responde APENAS com JSON, sem markdown\n\n");
    user.push_str("Retorna o protocolo melhorado no mesmo formato JSON.");

    Ok(Prompt {
        system: REVISION_SYSTEM.to_string(),
        user,
    })
}

fn push_role(prompt: &mut String) {
    prompt.push_str(
        "És um especialista em EDUCAÇÃO EM CIÊNCIAS com experiência em pedagogia das ciências \
         experimentais, currículo português do ensino básico e segurança em laboratório escolar.\n\n",
    );
    prompt.push_str(
        "Cria um protocolo experimental COMPLETO, PEDAGÓGICO e SEGURO em português de Portugal.\n\n",
    );
}

fn push_base_information(prompt: &mut String, request: &GenerationRequest, grades: &str) {
    prompt.push_str("INFORMAÇÃO BASE:\n");
    prompt.push_str(&format!("- Título: {}\n", request.title.trim()));
    prompt.push_str(&format!("- Descrição: {}\n", request.summary.trim()));
    prompt.push_str(&format!("- Anos letivos: {grades}\n"));
    prompt.push_str(&format!(
        "- Disciplinas: {}\n\n",
        request.disciplines.join(", ")
    ));
}

fn push_instructions(prompt: &mut String) {
    prompt.push_str("INSTRUÇÕES COMPLETAS:\n\n");
    prompt.push_str(
        "1. TÍTULO: Se vazio, cria título apelativo. Adiciona subtítulo com conceito científico.\n\n",
    );
    prompt.push_str(
        "2. METADADOS:\n   - Duração estimada (ex: \"45-50 minutos\")\n   - 2-3 competências \
         (raciocínio, trabalho prático, comunicação)\n   - 2-4 objetivos claros com verbos de \
         ação\n\n",
    );
    prompt.push_str(
        "3. CONTEXTUALIZAÇÃO: Parágrafo motivador ligando ao quotidiano dos alunos.\n\n",
    );
    prompt.push_str(
        "4. MATERIAIS: Lista detalhada com quantidades. Indicar alternativas quando possível.\n\n",
    );
    prompt.push_str(
        "5. ESTRUTURA PEDAGÓGICA:\n   - PRÉ-EXPERIÊNCIA: Questões para ativar conhecimentos \
         (2-3 questões)\n   - PROCEDIMENTO: 6-10 passos detalhados, cada um com \"💡 Observar:\"\n   \
         - PÓS-EXPERIÊNCIA: Questões para discussão e sistematização\n   - RESULTADOS ESPERADOS: \
         O que os alunos devem observar\n\n",
    );
    prompt.push_str(
        "6. SEGURANÇA (CRÍTICO):\n   Retornar objeto JSON com:\n   - nivel_risco: \"Baixo\", \
         \"Médio\" ou \"Alto\"\n   - riscos: lista de riscos específicos\n   - epi: equipamento \
         de proteção necessário\n   - supervisao: tipo de supervisão necessária\n   - cuidados: \
         procedimentos de segurança\n   - primeiros_socorros: o que fazer em caso de acidente\n   \
         - descarte: como descartar materiais\n\n",
    );
    prompt.push_str("7. QUIZ (5 PERGUNTAS VARIADAS):\n   Retornar array de objetos com:\n");
    prompt.push_str(QUIZ_EXAMPLE);
    prompt.push_str("   Criar 2 escolha múltipla, 1 V/F, 1 observação, 1 reflexiva.\n\n");
    prompt.push_str(
        "8. DIFERENCIAÇÃO:\n   Retornar objeto com:\n   - simplificacao: [2-3 sugestões]\n   \
         - aprofundamento: [2-3 desafios]\n   - inclusao: [1-2 adaptações]\n\n",
    );
    prompt.push_str(
        "9. RECURSOS EXTRAS: Array com 2-3 sugestões de recursos complementares.\n\n",
    );
}

const QUIZ_EXAMPLE: &str = r#"   [
     {
       "tipo": "multipla_escolha",
       "pergunta": "...",
       "opcoes": ["A) ...", "B) ...", "C) ...", "D) ..."],
       "resposta_correta": "B",
       "explicacao": "..."
     },
     {
       "tipo": "verdadeiro_falso",
       "afirmacao": "...",
       "resposta_correta": true,
       "explicacao": "..."
     },
     {
       "tipo": "aberta",
       "pergunta": "...",
       "resposta_sugerida": "..."
     }
   ]
"#;

fn push_output_format(prompt: &mut String) {
    prompt.push_str("FORMATO JSON (responde APENAS com isto, sem markdown):\n");
    prompt.push_str(
        r#"{
  "titulo": "...",
  "subtitulo": "...",
  "duracao": "...",
  "competencias": ["...", "..."],
  "objetivos": ["...", "..."],
  "contextualizacao": "...",
  "resumo": "Breve resumo da experiência",
  "materiais": "Lista com quantidades...",
  "pre_experiencia": "Questões para antes...",
  "procedimento": "Passos com 💡 Observar...",
  "pos_experiencia": "Discussão e conclusões...",
  "resultados_esperados": "O que observar...",
  "seguranca": {
    "nivel_risco": "...",
    "riscos": "...",
    "epi": "...",
    "supervisao": "...",
    "cuidados": "...",
    "primeiros_socorros": "...",
    "descarte": "..."
  },
  "quiz": [...],
  "diferenciacao": {
    "simplificacao": [...],
    "aprofundamento": [...],
    "inclusao": [...]
  },
  "recursos_extras": [...]
}

"#,
    );
}
