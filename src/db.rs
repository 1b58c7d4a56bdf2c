// ==========================================
// FieldOps stock engine - SQLite connection setup
// ==========================================
// - Same PRAGMA behaviour for every Connection::open
// - Uniform busy_timeout so concurrent writers wait instead of failing fast
// - Idempotent schema creation
// ==========================================

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::time::Duration;

/// Default busy_timeout (ms)
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// Schema version this code expects
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// Per-connection PRAGMAs
///
/// foreign_keys and busy_timeout are connection-scoped in SQLite.
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// Open a connection with the uniform configuration applied
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// Create every table used by the crate (idempotent)
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS config_kv (
            scope_id TEXT NOT NULL DEFAULT 'global',
            key TEXT NOT NULL,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (scope_id, key)
        );

        CREATE TABLE IF NOT EXISTS crew (
            crew_id TEXT PRIMARY KEY,
            name TEXT NOT NULL UNIQUE COLLATE NOCASE,
            coordinator TEXT,
            active INTEGER NOT NULL DEFAULT 1,
            target_json TEXT
        );

        CREATE TABLE IF NOT EXISTS crew_material_stock (
            crew_id TEXT NOT NULL REFERENCES crew(crew_id) ON DELETE CASCADE,
            material TEXT NOT NULL,
            quantity REAL NOT NULL DEFAULT 0 CHECK (quantity >= 0),
            updated_by TEXT,
            updated_at TEXT,
            PRIMARY KEY (crew_id, material)
        );

        CREATE TABLE IF NOT EXISTS equipment (
            serial TEXT PRIMARY KEY,
            sku TEXT NOT NULL,
            status TEXT NOT NULL,
            location TEXT NOT NULL DEFAULT '',
            description TEXT NOT NULL DEFAULT '',
            received_on TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_equipment_status_location
            ON equipment(status, location);

        CREATE TABLE IF NOT EXISTS liquidation_record (
            installation_code TEXT PRIMARY KEY,
            crew_id TEXT NOT NULL REFERENCES crew(crew_id),
            kind TEXT NOT NULL,
            acta TEXT,
            rotulo TEXT,
            metraje_instalado REAL NOT NULL DEFAULT 0,
            templadores INTEGER NOT NULL DEFAULT 0,
            hebillas INTEGER NOT NULL DEFAULT 0,
            clevis INTEGER NOT NULL DEFAULT 0,
            ont_count INTEGER NOT NULL DEFAULT 0,
            mesh_count INTEGER NOT NULL DEFAULT 0,
            fono_count INTEGER NOT NULL DEFAULT 0,
            box_count INTEGER NOT NULL DEFAULT 0,
            state TEXT NOT NULL DEFAULT 'UNLIQUIDATED',
            revision INTEGER NOT NULL DEFAULT 0,
            liquidated_by TEXT,
            liquidated_at TEXT
        );

        CREATE TABLE IF NOT EXISTS stock_movement (
            movement_id TEXT PRIMARY KEY,
            crew_id TEXT NOT NULL,
            material TEXT NOT NULL,
            delta REAL NOT NULL,
            quantity_after REAL NOT NULL,
            installation_code TEXT NOT NULL,
            actor TEXT NOT NULL,
            created_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_stock_movement_installation
            ON stock_movement(installation_code);
        "#,
    )?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [CURRENT_SCHEMA_VERSION],
    )?;
    Ok(())
}

/// Read schema_version (None when the table is missing)
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> =
        conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        configure_sqlite_connection(&conn).unwrap();
        assert_eq!(read_schema_version(&conn).unwrap(), None);

        init_schema(&conn).unwrap();
        init_schema(&conn).unwrap();
        assert_eq!(read_schema_version(&conn).unwrap(), Some(CURRENT_SCHEMA_VERSION));
    }
}
