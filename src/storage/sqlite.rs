//! A local SQLite backend.

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use rusqlite::{Connection, OptionalExtension, Row, functions::FunctionFlags, types};
use serde_json::{Map, Number, Value};
use tracing::{debug, info, instrument};

use crate::{
    domain::{Protocol, ProtocolId},
    storage::{
        COLUMNS, ColumnKind, Counter, Encoding, EvolutionReport, ProtocolStore, StorageError,
        StoredProtocol, reconstruct_for_read, schema,
    },
};

/// Protocols in a table of a SQLite file.
///
/// Every operation opens its own connection and closes it when done, so the
/// store holds no open handles between calls.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    path: PathBuf,
    table: String,
}

impl SqliteStore {
    /// Opens the database at `path`, creating it if needed, and evolves
    /// `table` to the current column set.
    ///
    /// # Errors
    ///
    /// Returns an error if the file or its directory cannot be created, the
    /// table name is invalid, or the schema cannot be evolved.
    pub fn open(path: impl AsRef<Path>, table: &str) -> Result<Self, StorageError> {
        Self::open_with_report(path, table).map(|(store, _)| store)
    }

    /// Like [`open`](Self::open), also reporting what the evolution changed.
    ///
    /// # Errors
    ///
    /// As for [`open`](Self::open).
    pub fn open_with_report(
        path: impl AsRef<Path>,
        table: &str,
    ) -> Result<(Self, EvolutionReport), StorageError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        schema::check_table_name(table)?;

        let store = Self {
            path: path.to_path_buf(),
            table: table.to_string(),
        };
        let report = store.migrate()?;
        if report.created_table {
            info!(path = %path.display(), table, "created protocol table");
        }
        Ok((store, report))
    }

    /// Evolves the table to the current column set.
    ///
    /// # Errors
    ///
    /// Returns an error if the database rejects a statement.
    pub fn migrate(&self) -> Result<EvolutionReport, StorageError> {
        let mut conn = self.connect()?;
        schema::evolve(&mut conn, &self.table)
    }

    /// Path of the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn connect(&self) -> Result<Connection, StorageError> {
        let conn = Connection::open(&self.path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.create_scalar_function(
            "casefold",
            1,
            FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
            |ctx| {
                let text = ctx.get::<Option<String>>(0)?;
                Ok(text.unwrap_or_default().to_lowercase())
            },
        )?;
        Ok(conn)
    }

    fn with_conn<F, R>(&self, f: F) -> Result<R, StorageError>
    where
        F: FnOnce(&Connection) -> Result<R, StorageError>,
    {
        let conn = self.connect()?;
        f(&conn)
    }

    fn select(&self) -> String {
        let columns: Vec<String> = COLUMNS
            .iter()
            .map(|column| format!("\"{}\"", column.relational))
            .collect();
        format!("SELECT id, {} FROM \"{}\"", columns.join(", "), self.table)
    }

    fn query(
        &self,
        conn: &Connection,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> Result<Vec<Protocol>, StorageError> {
        let mut stmt = conn.prepare(sql)?;
        let mut rows = stmt.query(params)?;
        let mut protocols = Vec::new();
        while let Some(row) = rows.next()? {
            protocols.push(reconstruct_for_read(stored_from_row(row)?)?);
        }
        Ok(protocols)
    }
}

const ORDER: &str = "ORDER BY data_criacao DESC, id DESC";

impl ProtocolStore for SqliteStore {
    fn encoding(&self) -> Encoding {
        Encoding::Text
    }

    #[instrument(level = "debug", skip_all)]
    fn create(&self, record: &StoredProtocol) -> Result<ProtocolId, StorageError> {
        let fields: Vec<_> = COLUMNS
            .iter()
            .filter(|column| {
                !matches!(column.kind, ColumnKind::Counter | ColumnKind::Timestamp)
            })
            .collect();
        let names: Vec<String> = fields
            .iter()
            .map(|column| format!("\"{}\"", column.relational))
            .collect();
        let placeholders: Vec<String> = (1..=fields.len()).map(|i| format!("?{i}")).collect();
        let values: Vec<types::Value> = fields
            .iter()
            .map(|column| to_sql(record.values.get(column.field)))
            .collect();

        self.with_conn(|conn| {
            conn.execute(
                &format!(
                    "INSERT INTO \"{}\" ({}, data_criacao) VALUES ({}, CURRENT_TIMESTAMP)",
                    self.table,
                    names.join(", "),
                    placeholders.join(", ")
                ),
                rusqlite::params_from_iter(values),
            )?;
            let id = ProtocolId::new(conn.last_insert_rowid());
            info!(%id, "protocol saved");
            Ok(id)
        })
    }

    #[instrument(level = "debug", skip(self))]
    fn get(&self, id: ProtocolId) -> Result<Protocol, StorageError> {
        self.with_conn(|conn| {
            let stored = conn
                .query_row(
                    &format!("{} WHERE id = ?1", self.select()),
                    [id.get()],
                    stored_from_row,
                )
                .optional()?
                .ok_or(StorageError::NotFound(id))?;
            reconstruct_for_read(stored)
        })
    }

    #[instrument(level = "debug", skip(self))]
    fn list(&self, limit: Option<usize>) -> Result<Vec<Protocol>, StorageError> {
        let limit = limit.map_or(-1, |n| i64::try_from(n).unwrap_or(i64::MAX));
        self.with_conn(|conn| {
            self.query(
                conn,
                &format!("{} {ORDER} LIMIT ?1", self.select()),
                [limit],
            )
        })
    }

    #[instrument(level = "debug", skip(self))]
    fn search(&self, term: &str) -> Result<Vec<Protocol>, StorageError> {
        let needle = term.to_lowercase();
        self.with_conn(|conn| {
            let found = self.query(
                conn,
                &format!(
                    "{} WHERE instr(casefold(titulo), ?1) > 0 \
                     OR instr(casefold(resumo), ?1) > 0 \
                     OR instr(casefold(autor), ?1) > 0 {ORDER}",
                    self.select()
                ),
                [&needle],
            )?;
            debug!(matches = found.len(), "search finished");
            Ok(found)
        })
    }

    #[instrument(level = "debug", skip(self))]
    fn increment(&self, id: ProtocolId, counter: Counter) -> Result<u64, StorageError> {
        let column = counter.field();
        self.with_conn(|conn| {
            let value: i64 = conn
                .query_row(
                    &format!(
                        "UPDATE \"{}\" SET \"{column}\" = coalesce(\"{column}\", 0) + 1 \
                         WHERE id = ?1 RETURNING \"{column}\"",
                        self.table
                    ),
                    [id.get()],
                    |row| row.get(0),
                )
                .optional()?
                .ok_or(StorageError::NotFound(id))?;
            Ok(u64::try_from(value).unwrap_or(0))
        })
    }
}

fn to_sql(value: Option<&Value>) -> types::Value {
    match value {
        None | Some(Value::Null) => types::Value::Null,
        Some(Value::String(s)) => types::Value::Text(s.clone()),
        Some(Value::Bool(b)) => types::Value::Integer(i64::from(*b)),
        Some(Value::Number(n)) => n.as_i64().map_or_else(
            || types::Value::Real(n.as_f64().unwrap_or_default()),
            types::Value::Integer,
        ),
        Some(other) => types::Value::Text(other.to_string()),
    }
}

fn from_sql(value: types::Value) -> Value {
    match value {
        types::Value::Null => Value::Null,
        types::Value::Integer(i) => Value::Number(i.into()),
        types::Value::Real(f) => Number::from_f64(f).map_or(Value::Null, Value::Number),
        types::Value::Text(s) => Value::String(s),
        types::Value::Blob(bytes) => Value::String(String::from_utf8_lossy(&bytes).into_owned()),
    }
}

fn stored_from_row(row: &Row<'_>) -> rusqlite::Result<StoredProtocol> {
    let id: i64 = row.get("id")?;
    let mut values = Map::new();
    for column in &COLUMNS {
        let value: types::Value = row.get(column.relational)?;
        values.insert(column.field.to_string(), from_sql(value));
    }
    Ok(StoredProtocol {
        id: Some(ProtocolId::new(id)),
        values,
    })
}
