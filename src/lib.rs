//! Lab protocols drafted by a language model
//!
//! Teachers describe an experiment; a model drafts a full pedagogical
//! protocol for it, which is normalised, stored, searched and rated. Model
//! output is never trusted: it is sanitised and coerced into one canonical
//! shape, and anything unusable is replaced by a safe fallback.

pub mod domain;
pub use domain::{Config, Protocol, ProtocolDraft, ProtocolId, Stats};

pub mod generation;
pub use generation::{GenerationRequest, Generator};

pub mod storage;
pub use storage::{ProtocolStore, StorageError};

pub mod service;
pub use service::{Rating, Services, Tally};

pub mod runtime;
