//! Persistence of protocols.
//!
//! Two backends sit behind the [`ProtocolStore`] trait: a local SQLite file
//! whose table is evolved in place ([`SqliteStore`]) and a hosted table with
//! a fixed schema behind a REST interface ([`RemoteStore`]). Both read and
//! write through the same [`StoredProtocol`] form.

use tracing::warn;

use crate::domain::{Protocol, ProtocolDraft, ProtocolId};

mod record;
pub use record::{
    COLUMNS, Column, ColumnKind, Encoding, StoredProtocol, coerce_for_storage,
    reconstruct_for_read,
};

mod schema;
pub use schema::{EvolutionReport, evolve};

mod sqlite;
pub use sqlite::SqliteStore;

mod remote;
pub use remote::RemoteStore;

/// One of the popularity counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Counter {
    /// `visualizacoes`
    Views,
    /// `gostos`
    Likes,
    /// `nao_gostos`
    Dislikes,
}

impl Counter {
    /// The field holding the counter.
    #[must_use]
    pub const fn field(self) -> &'static str {
        match self {
            Self::Views => "visualizacoes",
            Self::Likes => "gostos",
            Self::Dislikes => "nao_gostos",
        }
    }
}

/// Errors raised by a storage backend.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The SQLite database failed.
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// The remote table service could not be reached or refused the request.
    #[error("remote table error: {0}")]
    Remote(#[from] reqwest::Error),
    /// The backend accepted the request but the result is unusable.
    #[error("persistence failed: {0}")]
    Persistence(String),
    /// No protocol has the given id.
    #[error("protocol {0} not found")]
    NotFound(ProtocolId),
    /// The database file or its directory could not be prepared.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// The capabilities every storage backend offers.
///
/// Listing and searching return protocols newest first.
pub trait ProtocolStore {
    /// How this backend encodes structured fields.
    fn encoding(&self) -> Encoding;

    /// Persists a record, returning the identity the backend assigned.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend is unavailable or rejects the write.
    fn create(&self, record: &StoredProtocol) -> Result<ProtocolId, StorageError>;

    /// Reads one protocol.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NotFound`] if there is no such protocol, or an
    /// error if the backend fails.
    fn get(&self, id: ProtocolId) -> Result<Protocol, StorageError>;

    /// Lists protocols, newest first, optionally capped at `limit`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    fn list(&self, limit: Option<usize>) -> Result<Vec<Protocol>, StorageError>;

    /// Finds protocols whose title, summary or author contains `term`,
    /// ignoring case.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    fn search(&self, term: &str) -> Result<Vec<Protocol>, StorageError>;

    /// Adds one to a counter, returning its new value.
    ///
    /// Each call changes exactly one field. Whether concurrent calls can lose
    /// an update depends on the backend.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NotFound`] if there is no such protocol, or an
    /// error if the backend fails.
    fn increment(&self, id: ProtocolId, counter: Counter) -> Result<u64, StorageError>;

    /// Like [`search`](Self::search), but if the backend search fails the
    /// full listing is filtered in memory instead.
    ///
    /// # Errors
    ///
    /// Returns an error only if listing fails as well.
    fn search_or_scan(&self, term: &str) -> Result<Vec<Protocol>, StorageError> {
        match self.search(term) {
            Ok(found) => Ok(found),
            Err(e) => {
                warn!(error = %e, "search failed, filtering the full listing");
                let needle = term.to_lowercase();
                Ok(self
                    .list(None)?
                    .into_iter()
                    .filter(|protocol| matches_term(protocol.content(), &needle))
                    .collect())
            }
        }
    }
}

/// Whether the title, summary or author contains `needle`, which must
/// already be lowercase.
#[must_use]
pub fn matches_term(content: &ProtocolDraft, needle: &str) -> bool {
    [&content.title, &content.summary, &content.author]
        .into_iter()
        .any(|field| field.to_lowercase().contains(needle))
}
