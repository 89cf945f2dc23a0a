//! Request-level flows over a store and a generator.

use std::{fmt, str::FromStr, time::Duration};

use serde::Serialize;
use serde_json::Value;
use tracing::{instrument, warn};

use crate::{
    domain::{Backend, Config, ConfigError, Protocol, ProtocolDraft, ProtocolId, Secrets, Stats},
    generation::{
        ChatClient, GenerationError, GenerationRequest, Generator, Prompt, generate_draft,
        regenerate_draft,
    },
    storage::{
        Counter, ProtocolStore, RemoteStore, SqliteStore, StorageError, coerce_for_storage,
    },
};

const REMOTE_TIMEOUT: Duration = Duration::from_secs(30);

/// A thumbs-up or thumbs-down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rating {
    /// `gosto`
    Like,
    /// `nao_gosto`
    Dislike,
}

impl Rating {
    const fn counter(self) -> Counter {
        match self {
            Self::Like => Counter::Likes,
            Self::Dislike => Counter::Dislikes,
        }
    }
}

impl FromStr for Rating {
    type Err = UnknownRating;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "gosto" | "like" => Ok(Self::Like),
            "nao_gosto" | "não_gosto" | "dislike" => Ok(Self::Dislike),
            _ => Err(UnknownRating(s.to_string())),
        }
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Like => "gosto",
            Self::Dislike => "nao_gosto",
        })
    }
}

/// A rating kind that is neither a like nor a dislike.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("'{0}' is not a rating; expected 'gosto' or 'nao_gosto'")]
pub struct UnknownRating(String);

/// Both rating counters of a protocol after a rating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Tally {
    /// Likes.
    pub gostos: u64,
    /// Dislikes.
    pub nao_gostos: u64,
}

/// Errors raised while wiring the services from configuration.
#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    /// A required setting is missing.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// The store could not be opened.
    #[error(transparent)]
    Storage(#[from] StorageError),
    /// The model client could not be built.
    #[error(transparent)]
    Generation(#[from] GenerationError),
}

/// Stands in for the model when no API key is configured, so every
/// generation falls back.
struct NoModel;

impl Generator for NoModel {
    fn generate(&self, _prompt: &Prompt) -> Result<String, GenerationError> {
        Err(GenerationError::MissingApiKey)
    }
}

/// The store, the model and the public address, shared by every flow.
pub struct Services {
    store: Box<dyn ProtocolStore + Send + Sync>,
    generator: Box<dyn Generator + Send + Sync>,
    public_url: String,
}

impl fmt::Debug for Services {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Services")
            .field("encoding", &self.store.encoding())
            .field("public_url", &self.public_url)
            .finish_non_exhaustive()
    }
}

impl Services {
    /// Bundles a store and a generator.
    ///
    /// `public_url` is the base of share links; a trailing `/` is added if
    /// missing.
    pub fn new(
        store: impl ProtocolStore + Send + Sync + 'static,
        generator: impl Generator + Send + Sync + 'static,
        public_url: &str,
    ) -> Self {
        let public_url = public_url.trim();
        Self {
            store: Box::new(store),
            generator: Box::new(generator),
            public_url: if public_url.ends_with('/') {
                public_url.to_string()
            } else {
                format!("{public_url}/")
            },
        }
    }

    /// Builds the configured backend and model client.
    ///
    /// A missing model API key is not an error: generation then always
    /// falls back, and everything else works.
    ///
    /// # Errors
    ///
    /// Returns an error if the remote backend is selected without its
    /// settings, or the store or client cannot be built.
    pub fn from_config(config: &Config, secrets: &Secrets) -> Result<Self, SetupError> {
        let store: Box<dyn ProtocolStore + Send + Sync> = match config.storage.backend {
            Backend::Sqlite => Box::new(SqliteStore::open(
                &config.storage.path,
                &config.storage.table,
            )?),
            Backend::Remote => Box::new(RemoteStore::new(
                Secrets::require(secrets.remote_url.as_ref(), "SUPABASE_URL")?,
                Secrets::require(secrets.remote_key.as_ref(), "SUPABASE_KEY")?,
                &config.storage.table,
                REMOTE_TIMEOUT,
            )?),
        };

        let generator: Box<dyn Generator + Send + Sync> = match ChatClient::new(
            config.generation.clone(),
            secrets.generation_api_key.clone(),
        ) {
            Ok(client) => Box::new(client),
            Err(GenerationError::MissingApiKey) => {
                warn!("GROQ_API_KEY is not set, generated protocols will be placeholders");
                Box::new(NoModel)
            }
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            store,
            generator,
            public_url: config.public_url().to_string(),
        })
    }

    /// Drafts a new protocol. Never fails; see [`generate_draft`].
    #[must_use]
    pub fn generate(&self, request: &GenerationRequest) -> ProtocolDraft {
        generate_draft(self.generator.as_ref(), request)
    }

    /// Revises a draft. Never fails; see [`regenerate_draft`].
    #[must_use]
    pub fn regenerate(&self, previous: &ProtocolDraft, feedback: &str) -> ProtocolDraft {
        regenerate_draft(self.generator.as_ref(), previous, feedback)
    }

    /// Stores protocol JSON of any shape, returning its new id.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend is unavailable or rejects the write.
    #[instrument(level = "debug", skip_all)]
    pub fn save(&self, record: &Value) -> Result<ProtocolId, StorageError> {
        let stored = coerce_for_storage(record, self.store.encoding());
        self.store.create(&stored)
    }

    /// Counts a view, then reads the protocol.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NotFound`] if there is no such protocol, or an
    /// error if the backend fails.
    pub fn view(&self, id: ProtocolId) -> Result<Protocol, StorageError> {
        self.store.increment(id, Counter::Views)?;
        self.store.get(id)
    }

    /// Records a rating and returns both rating counters.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NotFound`] if there is no such protocol, or an
    /// error if the backend fails.
    pub fn rate(&self, id: ProtocolId, rating: Rating) -> Result<Tally, StorageError> {
        self.store.increment(id, rating.counter())?;
        let counters = self.store.get(id)?.counters();
        Ok(Tally {
            gostos: counters.likes,
            nao_gostos: counters.dislikes,
        })
    }

    /// Lists protocols, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    pub fn list(&self, limit: Option<usize>) -> Result<Vec<Protocol>, StorageError> {
        self.store.list(limit)
    }

    /// Finds protocols by title, summary or author.
    ///
    /// # Errors
    ///
    /// Returns an error only if the backend can neither search nor list.
    pub fn search(&self, term: &str) -> Result<Vec<Protocol>, StorageError> {
        self.store.search_or_scan(term)
    }

    /// Aggregate statistics over every stored protocol.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    pub fn stats(&self) -> Result<Stats, StorageError> {
        Ok(Stats::from_protocols(&self.store.list(None)?))
    }

    /// The public address of a protocol, as encoded in its QR code.
    #[must_use]
    pub fn share_url(&self, id: ProtocolId) -> String {
        format!("{}protocolo/{id}", self.public_url)
    }
}
