//! Embedded relational inventory store.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::types::Type;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};

use ik_core::{CoreError, CoreResult, InventoryItem, InventoryStore};

/// Current schema version, kept in `PRAGMA user_version`.
pub const SCHEMA_VERSION: i32 = 3;

const SELECT_COLUMNS: &str = "SELECT id, code, name, price, quantity FROM inventory";

/// SQLite-backed store with a generated primary key and a unique index on `code`.
#[derive(Debug)]
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the database file and bring the schema up to date.
    pub fn open(path: &Path) -> CoreResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|err| CoreError::Storage(err.to_string()))?;
        }
        let conn = Connection::open(path).map_err(|err| CoreError::Storage(err.to_string()))?;
        Self::from_connection(conn)
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> CoreResult<Self> {
        let conn = Connection::open_in_memory().map_err(|err| CoreError::Storage(err.to_string()))?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> CoreResult<Self> {
        migrate(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn connection(&self) -> CoreResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| CoreError::Storage("connection lock poisoned".into()))
    }
}

/// Create the schema, dropping everything when an incompatible version is found.
fn migrate(conn: &Connection) -> CoreResult<()> {
    let version = schema_version(conn)?;
    if version == SCHEMA_VERSION {
        return Ok(());
    }
    if version != 0 {
        tracing::warn!(
            from = version,
            to = SCHEMA_VERSION,
            "schema version changed, recreating inventory table"
        );
        conn.execute_batch("DROP TABLE IF EXISTS inventory;")
            .map_err(|err| CoreError::Storage(err.to_string()))?;
    }
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS inventory (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            code INTEGER NOT NULL,
            name TEXT NOT NULL,
            price INTEGER NOT NULL,
            quantity INTEGER NOT NULL
        );
        CREATE UNIQUE INDEX IF NOT EXISTS index_inventory_code ON inventory(code);",
    )
    .map_err(|err| CoreError::Storage(err.to_string()))?;
    conn.execute_batch(&format!("PRAGMA user_version = {SCHEMA_VERSION};"))
        .map_err(|err| CoreError::Storage(err.to_string()))?;
    Ok(())
}

fn schema_version(conn: &Connection) -> CoreResult<i32> {
    conn.query_row("PRAGMA user_version", params![], |row| row.get(0))
        .map_err(|err| CoreError::Storage(err.to_string()))
}

fn read_item(row: &Row<'_>) -> rusqlite::Result<InventoryItem> {
    let price: i64 = row.get(3)?;
    let price = u64::try_from(price)
        .map_err(|err| rusqlite::Error::FromSqlConversionFailure(3, Type::Integer, Box::new(err)))?;
    Ok(InventoryItem {
        id: Some(row.get(0)?),
        code: row.get(1)?,
        name: row.get(2)?,
        price,
        quantity: row.get(4)?,
    })
}

fn price_column(item: &InventoryItem) -> CoreResult<i64> {
    i64::try_from(item.price)
        .map_err(|_| CoreError::Validation(format!("price {} is too large", item.price)))
}

fn write_error(err: rusqlite::Error, code: u32) -> CoreError {
    match err {
        rusqlite::Error::SqliteFailure(failure, _)
            if failure.code == ErrorCode::ConstraintViolation =>
        {
            CoreError::Duplicate(format!("item code {code}"))
        }
        other => CoreError::Storage(other.to_string()),
    }
}

impl InventoryStore for SqliteStore {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn list(&self) -> CoreResult<Vec<InventoryItem>> {
        let conn = self.connection()?;
        let mut stmt = conn
            .prepare(&format!("{SELECT_COLUMNS} ORDER BY code"))
            .map_err(|err| CoreError::Storage(err.to_string()))?;
        let rows = stmt
            .query_map(params![], read_item)
            .map_err(|err| CoreError::Storage(err.to_string()))?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|err| CoreError::Storage(err.to_string()))
    }

    fn get(&self, key: i64) -> CoreResult<Option<InventoryItem>> {
        let conn = self.connection()?;
        conn.query_row(
            &format!("{SELECT_COLUMNS} WHERE id = ?1"),
            params![key],
            read_item,
        )
        .optional()
        .map_err(|err| CoreError::Storage(err.to_string()))
    }

    fn insert(&self, item: &InventoryItem) -> CoreResult<InventoryItem> {
        let price = price_column(item)?;
        let conn = self.connection()?;
        conn.execute(
            "INSERT INTO inventory (code, name, price, quantity) VALUES (?1, ?2, ?3, ?4)",
            params![item.code, item.name, price, item.quantity],
        )
        .map_err(|err| write_error(err, item.code))?;
        let id = conn.last_insert_rowid();
        tracing::debug!(id, code = item.code, "inserted item");
        Ok(item.clone().with_id(id))
    }

    fn update(&self, item: &InventoryItem) -> CoreResult<()> {
        let price = price_column(item)?;
        let conn = self.connection()?;
        let changed = match item.id {
            Some(id) => conn.execute(
                "UPDATE inventory SET code = ?1, name = ?2, price = ?3, quantity = ?4 WHERE id = ?5",
                params![item.code, item.name, price, item.quantity, id],
            ),
            None => conn.execute(
                "UPDATE inventory SET name = ?1, price = ?2, quantity = ?3 WHERE code = ?4",
                params![item.name, price, item.quantity, item.code],
            ),
        }
        .map_err(|err| write_error(err, item.code))?;
        if changed == 0 {
            return Err(CoreError::NotFound(format!("item code {}", item.code)));
        }
        Ok(())
    }

    fn delete(&self, item: &InventoryItem) -> CoreResult<()> {
        let conn = self.connection()?;
        let removed = match item.id {
            Some(id) => conn.execute("DELETE FROM inventory WHERE id = ?1", params![id]),
            None => conn.execute("DELETE FROM inventory WHERE code = ?1", params![item.code]),
        }
        .map_err(|err| CoreError::Storage(err.to_string()))?;
        tracing::debug!(code = item.code, removed, "deleted item");
        Ok(())
    }
}
