use crate::error::Result;
use base64::Engine as _;
use rusqlite::types::Value as SqlValue;
use rusqlite::Connection;
use serde_json::{Map, Value};
use std::path::Path;

/// one result row, column name to scalar value in projection order
pub type Record = Map<String, Value>;

pub const SUCCESS_MESSAGE: &str = "Query executed successfully";

const MUTATING_KEYWORDS: [&str; 6] = ["INSERT", "UPDATE", "DELETE", "CREATE", "DROP", "ALTER"];

/// whether the statement's leading keyword requires a commit
pub fn is_mutating(sql: &str) -> bool {
    let upper = sql.trim_start().to_uppercase();
    MUTATING_KEYWORDS.iter().any(|kw| upper.starts_with(kw))
}

/// run one validated statement against the store at `db_path`.
///
/// statement faults (bad syntax, missing table, constraint violation) come
/// back as a single error record, never as an Err; only failure to open the
/// store itself is a hard error.
#[tracing::instrument(skip(db_path, sql), fields(db = %db_path.display()))]
pub fn execute_statement(db_path: &Path, sql: &str) -> Result<Vec<Record>> {
    let conn = Connection::open(db_path)?;

    match run_statement(&conn, sql) {
        Ok(records) => Ok(records),
        Err(e) => {
            tracing::warn!("statement execution failed: {}", e);
            Ok(vec![error_record(&e.to_string())])
        }
    }
}

fn run_statement(conn: &Connection, sql: &str) -> rusqlite::Result<Vec<Record>> {
    let tx = conn.unchecked_transaction()?;

    let records = {
        let mut stmt = tx.prepare(sql)?;

        if stmt.column_count() > 0 {
            let columns: Vec<String> = stmt.column_names().iter().map(ToString::to_string).collect();

            let mut rows = stmt.query([])?;
            let mut records = Vec::new();
            while let Some(row) = rows.next()? {
                let mut record = Record::new();
                for (index, column) in columns.iter().enumerate() {
                    let value = row.get::<usize, SqlValue>(index)?;
                    record.insert(column.clone(), json_from_sql(value));
                }
                records.push(record);
            }
            records
        } else {
            stmt.execute([])?;
            vec![message_record(SUCCESS_MESSAGE)]
        }
    };

    if is_mutating(sql) {
        tx.commit()?;
    }

    Ok(records)
}

fn json_from_sql(value: SqlValue) -> Value {
    match value {
        SqlValue::Null => Value::Null,
        SqlValue::Integer(i) => Value::from(i),
        SqlValue::Real(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        SqlValue::Text(s) => Value::String(s),
        SqlValue::Blob(bytes) => {
            Value::String(base64::engine::general_purpose::STANDARD.encode(bytes))
        }
    }
}

fn message_record(message: &str) -> Record {
    let mut record = Record::new();
    record.insert("message".to_string(), Value::String(message.to_string()));
    record
}

fn error_record(description: &str) -> Record {
    let mut record = Record::new();
    record.insert("error".to_string(), Value::String(description.to_string()));
    record
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with(sql: &str) -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.db");
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch(sql).unwrap();
        (dir, path)
    }

    #[test]
    fn test_select_returns_rows_in_projection_order() {
        let (_dir, path) = store_with(
            "CREATE TABLE users (id INTEGER, name TEXT);
             INSERT INTO users VALUES (1, 'alice'), (2, 'bob');",
        );

        let records = execute_statement(&path, "SELECT id, name FROM users;").unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["id"], 1);
        assert_eq!(records[0]["name"], "alice");
        assert_eq!(records[1]["name"], "bob");

        let keys: Vec<&String> = records[0].keys().collect();
        assert_eq!(keys, ["id", "name"]);
    }

    #[test]
    fn test_ddl_returns_success_marker() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.db");

        let records =
            execute_statement(&path, "CREATE TABLE t (id INTEGER PRIMARY KEY);").unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["message"], SUCCESS_MESSAGE);
    }

    #[test]
    fn test_mutation_is_committed() {
        let (_dir, path) = store_with("CREATE TABLE t (id INTEGER); INSERT INTO t VALUES (1);");

        let records = execute_statement(&path, "DELETE FROM t;").unwrap();
        assert_eq!(records[0]["message"], SUCCESS_MESSAGE);

        // a fresh connection must observe the committed delete
        let conn = Connection::open(&path).unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM t", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_execution_fault_becomes_error_record() {
        let (_dir, path) = store_with("CREATE TABLE t (id INTEGER PRIMARY KEY);");

        let records = execute_statement(&path, "SELECT * FROM missing;").unwrap();
        assert_eq!(records.len(), 1);
        assert!(records[0]["error"].as_str().unwrap().contains("missing"));
    }

    #[test]
    fn test_constraint_violation_becomes_error_record() {
        let (_dir, path) = store_with(
            "CREATE TABLE t (id INTEGER PRIMARY KEY);
             INSERT INTO t VALUES (1);",
        );

        let records = execute_statement(&path, "INSERT INTO t VALUES (1);").unwrap();
        assert_eq!(records.len(), 1);
        assert!(records[0].contains_key("error"));
    }

    #[test]
    fn test_scalar_types_map_to_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.db");

        let records = execute_statement(
            &path,
            "SELECT 1 AS i, 1.5 AS r, 'x' AS t, NULL AS n, x'FF00' AS b;",
        )
        .unwrap();

        assert_eq!(records[0]["i"], 1);
        assert_eq!(records[0]["r"], 1.5);
        assert_eq!(records[0]["t"], "x");
        assert_eq!(records[0]["n"], Value::Null);
        assert_eq!(records[0]["b"], "/wA=");
    }

    #[test]
    fn test_is_mutating_keywords() {
        assert!(is_mutating("INSERT INTO t VALUES (1);"));
        assert!(is_mutating("  delete from t;"));
        assert!(is_mutating("ALTER TABLE t ADD COLUMN x;"));
        assert!(!is_mutating("SELECT * FROM t;"));
    }
}
