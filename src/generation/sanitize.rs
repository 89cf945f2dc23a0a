//! Turning raw model output into a JSON object.

use serde_json::{Map, Value};

/// Model output that could not be read as a protocol object.
///
/// This is expected now and then and is recovered from by falling back to a
/// synthesized protocol.
#[derive(Debug, thiserror::Error)]
pub enum MalformedResponse {
    /// Nothing left after stripping the wrapping.
    #[error("response is empty")]
    Empty,
    /// The text is not valid JSON.
    #[error("response is not valid JSON: {0}")]
    Syntax(#[from] serde_json::Error),
    /// The JSON is valid but is not an object.
    #[error("response is a JSON {0}, not an object")]
    NotAnObject(&'static str),
}

/// Strips markdown fences and conversational wrapping from a response and
/// parses what remains as a JSON object.
///
/// A leading ```` ``` ```` or ```` ```json ```` fence and a trailing
/// ```` ``` ```` fence are removed. If the remaining text still does not
/// parse, the span between the first `{` and the last `}` is tried, which
/// recovers objects preceded by a sentence such as "Here is the protocol:".
///
/// # Errors
///
/// Returns [`MalformedResponse`] if no JSON object can be read.
pub fn sanitize_response(raw: &str) -> Result<Map<String, Value>, MalformedResponse> {
    let text = strip_fences(raw);
    if text.is_empty() {
        return Err(MalformedResponse::Empty);
    }

    parse_object(text).or_else(|error| {
        embedded_object(text)
            .filter(|span| span.len() < text.len())
            .map_or(Err(error), parse_object)
    })
}

fn strip_fences(raw: &str) -> &str {
    let mut text = raw.trim();
    if let Some(rest) = text.strip_prefix("```") {
        text = rest
            .strip_prefix("json")
            .or_else(|| rest.strip_prefix("JSON"))
            .unwrap_or(rest);
    }
    if let Some(rest) = text.strip_suffix("```") {
        text = rest;
    }
    text.trim()
}

fn embedded_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (start < end).then(|| &text[start..=end])
}

fn parse_object(text: &str) -> Result<Map<String, Value>, MalformedResponse> {
    match serde_json::from_str(text)? {
        Value::Object(map) => Ok(map),
        Value::Array(_) => Err(MalformedResponse::NotAnObject("array")),
        Value::String(_) => Err(MalformedResponse::NotAnObject("string")),
        Value::Number(_) => Err(MalformedResponse::NotAnObject("number")),
        Value::Bool(_) => Err(MalformedResponse::NotAnObject("boolean")),
        Value::Null => Err(MalformedResponse::NotAnObject("null")),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use test_case::test_case;

    use super::*;

    #[test]
    fn strips_json_fence() {
        let parsed = sanitize_response("```json\n{\"titulo\":\"X\"}\n```").unwrap();
        assert_eq!(Value::Object(parsed), json!({"titulo": "X"}));
    }

    #[test_case("{\"titulo\":\"X\"}"; "bare object")]
    #[test_case("  \n{\"titulo\":\"X\"}\n\n"; "surrounding whitespace")]
    #[test_case("```\n{\"titulo\":\"X\"}\n```"; "untagged fence")]
    #[test_case("```JSON{\"titulo\":\"X\"}```"; "uppercase tag without newlines")]
    #[test_case("```json\n{\"titulo\":\"X\"}"; "unterminated fence")]
    #[test_case("Aqui está o protocolo:\n{\"titulo\":\"X\"}\nBom trabalho!"; "conversational wrapping")]
    fn parses_wrapped_objects(raw: &str) {
        let parsed = sanitize_response(raw).unwrap();
        assert_eq!(parsed["titulo"], "X");
    }

    #[test]
    fn rejects_empty_response() {
        assert!(matches!(
            sanitize_response("```json\n```"),
            Err(MalformedResponse::Empty)
        ));
    }

    #[test]
    fn rejects_truncated_json() {
        assert!(matches!(
            sanitize_response("{\"titulo\": \"X\", \"quiz\": ["),
            Err(MalformedResponse::Syntax(_))
        ));
    }

    #[test]
    fn rejects_non_objects() {
        assert!(matches!(
            sanitize_response("[1, 2, 3]"),
            Err(MalformedResponse::NotAnObject("array"))
        ));
        assert!(matches!(
            sanitize_response("\"só texto\""),
            Err(MalformedResponse::NotAnObject("string"))
        ));
    }

    #[test]
    fn rejects_prose() {
        assert!(sanitize_response("Desculpa, não consigo ajudar com isso.").is_err());
    }
}
