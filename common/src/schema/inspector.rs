use crate::error::Result;
use rusqlite::{Connection, OpenFlags};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// rendered description for a store with no user tables
pub const NO_TABLES_SENTINEL: &str = "No tables found";

/// rendered description for a store that is missing or unreadable
pub const SCHEMA_UNAVAILABLE_SENTINEL: &str = "Database not found or not accessible";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnSchema {
    pub name: String,
    pub declared_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<ColumnSchema>,
}

/// enumerate user tables and their columns in declaration order,
/// skipping the engine's internal tables
pub fn introspect(db_path: &Path) -> Result<Vec<TableSchema>> {
    let conn = Connection::open_with_flags(
        db_path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )?;

    let mut stmt = conn.prepare("SELECT name FROM sqlite_master WHERE type = 'table'")?;
    let names: Vec<String> = stmt
        .query_map([], |row| row.get(0))?
        .collect::<rusqlite::Result<_>>()?;

    let mut tables = Vec::new();
    for name in names {
        if name.starts_with("sqlite_") {
            continue;
        }

        let columns = table_columns(&conn, &name)?;
        tables.push(TableSchema { name, columns });
    }

    Ok(tables)
}

fn table_columns(conn: &Connection, table: &str) -> Result<Vec<ColumnSchema>> {
    // table names cannot be bound in a pragma, so quote the literal
    let pragma = format!("PRAGMA table_info('{}')", table.replace('\'', "''"));
    let mut stmt = conn.prepare(&pragma)?;

    let columns = stmt
        .query_map([], |row| {
            Ok(ColumnSchema {
                name: row.get(1)?,
                declared_type: row.get(2)?,
            })
        })?
        .collect::<rusqlite::Result<_>>()?;

    Ok(columns)
}

/// render a schema as one line per table: `name (col TYPE, col TYPE)`
pub fn render(tables: &[TableSchema]) -> String {
    if tables.is_empty() {
        return NO_TABLES_SENTINEL.to_string();
    }

    tables
        .iter()
        .map(|table| {
            let columns = table
                .columns
                .iter()
                .map(|col| format!("{} {}", col.name, col.declared_type).trim_end().to_string())
                .collect::<Vec<_>>()
                .join(", ");
            format!("{} ({})", table.name, columns)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// schema description used as generation context; never fails, a missing
/// or unreadable store degrades to a sentinel description
#[tracing::instrument(skip(db_path), fields(db = %db_path.display()))]
pub fn schema_context(db_path: &Path) -> String {
    if !db_path.exists() {
        return SCHEMA_UNAVAILABLE_SENTINEL.to_string();
    }

    match introspect(db_path) {
        Ok(tables) => render(&tables),
        Err(e) => {
            tracing::warn!("schema introspection failed: {}", e);
            format!("Error reading schema: {}", e)
        }
    }
}
