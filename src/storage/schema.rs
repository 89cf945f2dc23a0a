//! In-place evolution of the relational table.
//!
//! Tables created by older releases lack some columns. Evolution only ever
//! adds what is missing; nothing is dropped, renamed or rewritten, apart
//! from back-filling the creation time of rows that predate that column.

use std::collections::HashSet;

use rusqlite::{Connection, Transaction};
use tracing::{debug, info, instrument};

use crate::storage::{COLUMNS, ColumnKind, StorageError};

/// What a run of [`evolve`] changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvolutionReport {
    /// Whether the table did not exist and was created.
    pub created_table: bool,
    /// Columns added to an existing table, in table order.
    pub added_columns: Vec<&'static str>,
}

impl EvolutionReport {
    /// Whether the run left the table as it was.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        !self.created_table && self.added_columns.is_empty()
    }
}

/// Brings `table` up to the full column set, creating it if needed.
///
/// Idempotent: a second run reports no changes. All changes happen in one
/// transaction.
///
/// # Errors
///
/// Returns an error if the table name is not a plain identifier or the
/// database rejects a statement.
#[instrument(level = "debug", skip(conn))]
pub fn evolve(conn: &mut Connection, table: &str) -> Result<EvolutionReport, StorageError> {
    check_table_name(table)?;
    let tx = conn.transaction()?;

    let created_table = !table_exists(&tx, table)?;
    tx.execute_batch(&create_table_sql(table))?;

    let present = existing_columns(&tx, table)?;
    let mut added_columns = Vec::new();
    for column in COLUMNS
        .iter()
        .filter(|column| !present.contains(column.relational))
    {
        let name = column.relational;
        tx.execute_batch(&format!(
            "ALTER TABLE \"{table}\" ADD COLUMN \"{name}\" {}",
            added_column_type(column.kind)
        ))?;
        if column.kind == ColumnKind::Timestamp {
            let filled = tx.execute(
                &format!(
                    "UPDATE \"{table}\" SET \"{name}\" = CURRENT_TIMESTAMP WHERE \"{name}\" IS NULL"
                ),
                [],
            )?;
            debug!(column = name, rows = filled, "back-filled creation time");
        }
        info!(table, column = name, "added missing column");
        added_columns.push(name);
    }

    tx.commit()?;
    Ok(EvolutionReport {
        created_table,
        added_columns,
    })
}

/// Rejects table names that would need escaping.
///
/// # Errors
///
/// Returns an error unless the name is ASCII letters, digits and
/// underscores, not starting with a digit.
pub(crate) fn check_table_name(table: &str) -> Result<(), StorageError> {
    let mut chars = table.chars();
    let valid = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(StorageError::Persistence(format!(
            "'{table}' is not a valid table name"
        )))
    }
}

fn create_table_sql(table: &str) -> String {
    let columns: Vec<String> = COLUMNS
        .iter()
        .map(|column| {
            format!(
                "\"{}\" {}",
                column.relational,
                created_column_type(column.kind)
            )
        })
        .collect();
    format!(
        "CREATE TABLE IF NOT EXISTS \"{table}\" (id INTEGER PRIMARY KEY AUTOINCREMENT, {})",
        columns.join(", ")
    )
}

const fn created_column_type(kind: ColumnKind) -> &'static str {
    match kind {
        ColumnKind::Text | ColumnKind::Lines | ColumnKind::Structured => "TEXT",
        ColumnKind::Counter => "INTEGER NOT NULL DEFAULT 0",
        ColumnKind::Timestamp => "TIMESTAMP DEFAULT CURRENT_TIMESTAMP",
    }
}

// SQLite refuses non-constant defaults in ALTER TABLE, so the creation time
// is added bare and back-filled.
const fn added_column_type(kind: ColumnKind) -> &'static str {
    match kind {
        ColumnKind::Timestamp => "TIMESTAMP",
        other => created_column_type(other),
    }
}

fn table_exists(tx: &Transaction<'_>, table: &str) -> Result<bool, StorageError> {
    let count: i64 = tx.query_row(
        "SELECT count(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
        [table],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

fn existing_columns(tx: &Transaction<'_>, table: &str) -> Result<HashSet<String>, StorageError> {
    let mut stmt = tx.prepare(&format!("PRAGMA table_info(\"{table}\")"))?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>("name"))?
        .collect::<Result<_, _>>()?;
    Ok(names)
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    fn columns(conn: &Connection, table: &str) -> Vec<String> {
        let mut stmt = conn
            .prepare(&format!("PRAGMA table_info(\"{table}\")"))
            .unwrap();
        stmt.query_map([], |row| row.get("name"))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap()
    }

    #[test]
    fn creates_missing_table() {
        let mut conn = Connection::open_in_memory().unwrap();

        let report = evolve(&mut conn, "protocolos").unwrap();

        assert!(report.created_table);
        assert!(report.added_columns.is_empty());
        let names = columns(&conn, "protocolos");
        assert_eq!(names.len(), COLUMNS.len() + 1);
        assert!(names.contains(&"seguranca_json".to_string()));
    }

    #[test]
    fn second_run_is_a_noop() {
        let mut conn = Connection::open_in_memory().unwrap();
        evolve(&mut conn, "protocolos").unwrap();

        let report = evolve(&mut conn, "protocolos").unwrap();

        assert!(report.is_noop());
    }

    #[test]
    fn legacy_table_is_brought_up_to_date_without_touching_data() {
        let mut conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE protocolos (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                titulo TEXT,
                resumo TEXT,
                disciplinas TEXT,
                anos TEXT,
                autor TEXT,
                gostos INTEGER DEFAULT 0,
                nao_gostos INTEGER DEFAULT 0
            );
            INSERT INTO protocolos (titulo, resumo, disciplinas, anos, autor, gostos)
            VALUES ('Vulcão', 'Reação', '[\"Química\"]', '[\"5º\"]', 'Ana', 4);",
        )
        .unwrap();

        let report = evolve(&mut conn, "protocolos").unwrap();

        assert!(!report.created_table);
        assert!(report.added_columns.contains(&"procedimento"));
        assert!(report.added_columns.contains(&"visualizacoes"));
        assert!(report.added_columns.contains(&"data_criacao"));
        assert!(!report.added_columns.contains(&"titulo"));

        let (titulo, gostos, views, created): (String, i64, i64, Option<String>) = conn
            .query_row(
                "SELECT titulo, gostos, visualizacoes, data_criacao FROM protocolos",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )
            .unwrap();
        assert_eq!(titulo, "Vulcão");
        assert_eq!(gostos, 4);
        assert_eq!(views, 0);
        assert!(created.is_some());

        assert!(evolve(&mut conn, "protocolos").unwrap().is_noop());
    }

    #[test]
    fn existing_creation_times_are_kept() {
        let mut conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE protocolos (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                titulo TEXT,
                data_criacao TIMESTAMP
            );
            INSERT INTO protocolos (titulo, data_criacao) VALUES ('Antigo', '2020-01-01 00:00:00');",
        )
        .unwrap();

        evolve(&mut conn, "protocolos").unwrap();

        let created: String = conn
            .query_row("SELECT data_criacao FROM protocolos", [], |row| row.get(0))
            .unwrap();
        assert_eq!(created, "2020-01-01 00:00:00");
    }

    #[test_case("protocolos", true)]
    #[test_case("_v2", true)]
    #[test_case("2protocolos", false)]
    #[test_case("protocolos; DROP TABLE x", false)]
    #[test_case("", false)]
    fn table_names(table: &str, valid: bool) {
        assert_eq!(check_table_name(table).is_ok(), valid);
    }
}
