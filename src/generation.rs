//! Drafting protocols with a language model.

mod client;
pub use client::{ChatClient, GenerationError, Generator, Prompt};

mod draft;
pub use draft::{generate_draft, regenerate_draft};

mod fallback;
pub use fallback::fallback_protocol;

mod prompt;
pub use prompt::{GenerationRequest, UNTITLED, protocol_prompt, revision_prompt};

mod sanitize;
pub use sanitize::{MalformedResponse, sanitize_response};
