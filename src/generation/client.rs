use std::time::Duration;

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::domain::GenerationSettings;

/// A prompt split into the system instruction and the user message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    /// Sets the role and output contract of the model.
    pub system: String,
    /// The actual request.
    pub user: String,
}

/// Something that turns a prompt into response text.
///
/// Implementations block until the response arrives or fails.
pub trait Generator {
    /// Sends the prompt and returns the raw response text.
    ///
    /// # Errors
    ///
    /// Returns an error if the model cannot be reached, does not answer in
    /// time, or answers with nothing.
    fn generate(&self, prompt: &Prompt) -> Result<String, GenerationError>;
}

/// Errors raised by a [`Generator`].
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    /// The request did not reach the model, or the answer could not be read.
    #[error("could not reach the model: {0}")]
    Network(#[source] reqwest::Error),
    /// The model did not answer within the configured timeout.
    #[error("the model did not answer in time")]
    Timeout,
    /// The endpoint rejected the request.
    #[error("the model endpoint answered with status {0}")]
    Status(u16),
    /// The endpoint answered without any content.
    #[error("the model returned no content")]
    EmptyResponse,
    /// No API key was configured for the endpoint.
    #[error("no API key is configured for the model endpoint")]
    MissingApiKey,
}

impl From<reqwest::Error> for GenerationError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout
        } else if let Some(status) = error.status() {
            Self::Status(status.as_u16())
        } else {
            Self::Network(error)
        }
    }
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChatMessageResponse,
}

#[derive(Deserialize)]
struct ChatMessageResponse {
    content: Option<String>,
}

/// A client for OpenAI-compatible chat completion endpoints.
#[derive(Debug, Clone)]
pub struct ChatClient {
    http: Client,
    settings: GenerationSettings,
    api_key: String,
}

impl ChatClient {
    /// Creates a client for the configured endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if no API key is given or the HTTP client cannot be
    /// built.
    pub fn new(
        settings: GenerationSettings,
        api_key: Option<String>,
    ) -> Result<Self, GenerationError> {
        let api_key = api_key
            .filter(|key| !key.trim().is_empty())
            .ok_or(GenerationError::MissingApiKey)?;
        let http = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(GenerationError::Network)?;
        Ok(Self {
            http,
            settings,
            api_key,
        })
    }
}

impl Generator for ChatClient {
    #[instrument(level = "debug", skip_all, fields(model = %self.settings.model))]
    fn generate(&self, prompt: &Prompt) -> Result<String, GenerationError> {
        let request = ChatCompletionRequest {
            model: &self.settings.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: &prompt.system,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt.user,
                },
            ],
            temperature: self.settings.temperature,
            max_tokens: self.settings.max_tokens,
        };

        let response = self
            .http
            .post(&self.settings.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()?
            .error_for_status()?
            .json::<ChatCompletionResponse>()?;

        debug!(choices = response.choices.len(), "response received");

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(GenerationError::EmptyResponse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_requires_api_key() {
        let error = ChatClient::new(GenerationSettings::default(), None).unwrap_err();
        assert!(matches!(error, GenerationError::MissingApiKey));

        let error =
            ChatClient::new(GenerationSettings::default(), Some("  ".to_string())).unwrap_err();
        assert!(matches!(error, GenerationError::MissingApiKey));
    }

    #[test]
    fn request_body_uses_chat_completion_shape() {
        let settings = GenerationSettings::default();
        let request = ChatCompletionRequest {
            model: &settings.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: "sistema",
                },
                ChatMessage {
                    role: "user",
                    content: "pedido",
                },
            ],
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
        };

        let body = serde_json::to_value(&request).unwrap();

        assert_eq!(body["model"], "llama-3.3-70b-versatile");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "pedido");
        assert_eq!(body["max_tokens"], 3500);
    }

    #[test]
    fn response_content_may_be_null() {
        let response: ChatCompletionResponse = serde_json::from_str(
            r#"{"choices":[{"index":0,"message":{"role":"assistant","content":null}}]}"#,
        )
        .unwrap();
        assert!(response.choices[0].message.content.is_none());
    }
}
