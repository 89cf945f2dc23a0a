//! Domain models for lab protocols.
//!
//! This module contains the canonical shape of a protocol, the coercion
//! rules that normalise loosely shaped model output into that shape,
//! configuration, and the statistics derived from a stored collection.

/// Canonical protocol shape and its nested blocks.
pub mod protocol;
pub use protocol::{
    Counters, Differentiation, OptionLetter, Protocol, ProtocolDraft, ProtocolId, QuizItem,
    RiskLevel, SafetyBlock, SchemaViolation,
};

pub mod coerce;

mod config;
pub use config::{Backend, Config, ConfigError, GenerationSettings, Secrets, StorageSettings};

pub mod stats;
pub use stats::Stats;
