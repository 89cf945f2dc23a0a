//! A hosted table behind a PostgREST-style REST interface.
//!
//! The table schema is managed by the hosting service and is never evolved
//! from here.

use std::time::Duration;

use reqwest::{
    Method,
    blocking::{Client, RequestBuilder},
};
use serde_json::{Map, Value};
use tracing::{debug, info, instrument};

use crate::{
    domain::{Protocol, ProtocolId},
    storage::{
        Counter, Encoding, ProtocolStore, StorageError, StoredProtocol, reconstruct_for_read,
    },
};

type Row = Map<String, Value>;

/// Protocols in a remote table.
#[derive(Debug, Clone)]
pub struct RemoteStore {
    http: Client,
    endpoint: String,
    key: String,
}

impl RemoteStore {
    /// Connects to the table `table` of the service at `base_url`,
    /// authenticating with `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(
        base_url: &str,
        key: &str,
        table: &str,
        timeout: Duration,
    ) -> Result<Self, StorageError> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            endpoint: table_endpoint(base_url, table),
            key: key.to_string(),
        })
    }

    fn request(&self, method: Method) -> RequestBuilder {
        self.http
            .request(method, &self.endpoint)
            .header("apikey", &self.key)
            .bearer_auth(&self.key)
    }

    fn fetch(&self, query: &[(&str, String)]) -> Result<Vec<Protocol>, StorageError> {
        let rows: Vec<Row> = self
            .request(Method::GET)
            .query(query)
            .send()?
            .error_for_status()?
            .json()?;
        rows.into_iter()
            .map(|row| reconstruct_for_read(stored_from_row(row)))
            .collect()
    }

    fn read_counter(&self, id: ProtocolId, column: &str) -> Result<u64, StorageError> {
        let rows: Vec<Row> = self
            .request(Method::GET)
            .query(&[("select", column.to_string()), id_filter(id)])
            .send()?
            .error_for_status()?
            .json()?;
        counter_from_rows(&rows, id, column)
    }
}

impl ProtocolStore for RemoteStore {
    fn encoding(&self) -> Encoding {
        Encoding::Native
    }

    #[instrument(level = "debug", skip_all)]
    fn create(&self, record: &StoredProtocol) -> Result<ProtocolId, StorageError> {
        let rows: Vec<Row> = self
            .request(Method::POST)
            .header("Prefer", "return=representation")
            .json(&[&record.values])
            .send()?
            .error_for_status()?
            .json()?;

        let id = id_from_rows(&rows)?;
        info!(%id, "protocol saved");
        Ok(id)
    }

    #[instrument(level = "debug", skip(self))]
    fn get(&self, id: ProtocolId) -> Result<Protocol, StorageError> {
        self.fetch(&[("select", "*".to_string()), id_filter(id)])?
            .into_iter()
            .next()
            .ok_or(StorageError::NotFound(id))
    }

    #[instrument(level = "debug", skip(self))]
    fn list(&self, limit: Option<usize>) -> Result<Vec<Protocol>, StorageError> {
        let mut query = vec![
            ("select", "*".to_string()),
            ("order", ORDER.to_string()),
        ];
        if let Some(limit) = limit {
            query.push(("limit", limit.to_string()));
        }
        self.fetch(&query)
    }

    #[instrument(level = "debug", skip(self))]
    fn search(&self, term: &str) -> Result<Vec<Protocol>, StorageError> {
        let found = self.fetch(&[
            ("select", "*".to_string()),
            ("or", search_filter(term)),
            ("order", ORDER.to_string()),
        ])?;
        debug!(matches = found.len(), "search finished");
        Ok(found)
    }

    /// Reads the counter, then writes it back plus one.
    ///
    /// The service offers no atomic increment through this interface, so two
    /// concurrent increments of the same counter can lose one update.
    #[instrument(level = "debug", skip(self))]
    fn increment(&self, id: ProtocolId, counter: Counter) -> Result<u64, StorageError> {
        let column = counter.field();
        let value = self.read_counter(id, column)? + 1;

        let mut patch = Map::new();
        patch.insert(column.to_string(), Value::from(value));
        let rows: Vec<Row> = self
            .request(Method::PATCH)
            .query(&[id_filter(id)])
            .header("Prefer", "return=representation")
            .json(&patch)
            .send()?
            .error_for_status()?
            .json()?;
        ensure_updated(&rows, id)?;
        Ok(value)
    }
}

const ORDER: &str = "data_criacao.desc,id.desc";

fn table_endpoint(base_url: &str, table: &str) -> String {
    format!("{}/rest/v1/{table}", base_url.trim().trim_end_matches('/'))
}

fn id_filter(id: ProtocolId) -> (&'static str, String) {
    ("id", format!("eq.{id}"))
}

/// The `or` filter matching `term` anywhere in the title, summary or
/// author, ignoring case.
///
/// `%`, `_` and `\` in the term are escaped so they match literally. A `*`
/// cannot be escaped: the service reads it as a wildcard in any `ilike`
/// pattern, so it matches any run of characters. The pattern is
/// double-quoted so commas and parentheses in the term do not break the
/// filter.
fn search_filter(term: &str) -> String {
    let mut literal = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_') {
            literal.push('\\');
        }
        literal.push(c);
    }
    let quoted = literal.replace('\\', "\\\\").replace('"', "\\\"");
    let pattern = format!("\"*{quoted}*\"");
    format!("(titulo.ilike.{pattern},resumo.ilike.{pattern},autor.ilike.{pattern})")
}

/// The id of the row the service returned for a write.
fn id_from_rows(rows: &[Row]) -> Result<ProtocolId, StorageError> {
    rows.first()
        .and_then(|row| row.get("id"))
        .and_then(Value::as_i64)
        .map(ProtocolId::new)
        .ok_or_else(|| {
            StorageError::Persistence("the service did not return the new id".to_string())
        })
}

fn counter_from_rows(rows: &[Row], id: ProtocolId, column: &str) -> Result<u64, StorageError> {
    let row = rows.first().ok_or(StorageError::NotFound(id))?;
    Ok(row.get(column).and_then(Value::as_u64).unwrap_or(0))
}

/// An update that matched no row returns no representation.
fn ensure_updated(rows: &[Row], id: ProtocolId) -> Result<(), StorageError> {
    if rows.is_empty() {
        Err(StorageError::NotFound(id))
    } else {
        Ok(())
    }
}

fn stored_from_row(mut row: Row) -> StoredProtocol {
    let id = row
        .remove("id")
        .and_then(|id| id.as_i64())
        .map(ProtocolId::new);
    StoredProtocol { id, values: row }
}
