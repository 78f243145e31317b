//! SQLite-backed record store

use rusqlite::{Connection, OptionalExtension, params, params_from_iter};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{StoreError, StoreResult};
use crate::record::{Filter, FilterOp, Record};

/// Database file name inside the store directory
const DB_FILE: &str = "taskstore.db";

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS records (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    collection TEXT NOT NULL,
    id TEXT NOT NULL,
    data TEXT NOT NULL,
    updated_at INTEGER NOT NULL,
    UNIQUE (collection, id)
);
CREATE TABLE IF NOT EXISTS record_indexes (
    collection TEXT NOT NULL,
    id TEXT NOT NULL,
    field TEXT NOT NULL,
    value TEXT NOT NULL,
    PRIMARY KEY (collection, id, field)
);
CREATE INDEX IF NOT EXISTS idx_record_indexes_lookup ON record_indexes (collection, field, value);
";

/// Record store owning a single SQLite connection
///
/// Not `Sync`: callers that need shared access wrap it in an actor.
pub struct Store {
    conn: Connection,
}

impl Store {
    /// Open (or create) the store in the given directory
    pub fn open(dir: &Path) -> StoreResult<Self> {
        debug!(dir = %dir.display(), "open: called");
        std::fs::create_dir_all(dir)?;
        let conn = Connection::open(dir.join(DB_FILE))?;
        conn.busy_timeout(Duration::from_secs(5))?;
        Self::init(conn)
    }

    /// Open a throwaway in-memory store
    pub fn open_in_memory() -> StoreResult<Self> {
        debug!("open_in_memory: called");
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> StoreResult<Self> {
        conn.execute_batch(SCHEMA)?;
        info!("Store schema ready");
        Ok(Self { conn })
    }

    /// Insert a new record, failing if the id is taken
    pub fn create<T: Record>(&mut self, record: T) -> StoreResult<String> {
        debug!(collection = T::collection_name(), id = record.id(), "create: called");
        let tx = self.conn.transaction()?;
        insert_record(&tx, &record)?;
        tx.commit()?;
        Ok(record.id().to_string())
    }

    /// Insert a batch of records atomically
    ///
    /// Either every record is inserted or none is.
    pub fn create_many<T: Record>(&mut self, records: Vec<T>) -> StoreResult<Vec<String>> {
        debug!(collection = T::collection_name(), count = records.len(), "create_many: called");
        let tx = self.conn.transaction()?;
        let mut ids = Vec::with_capacity(records.len());
        for record in &records {
            insert_record(&tx, record)?;
            ids.push(record.id().to_string());
        }
        tx.commit()?;
        Ok(ids)
    }

    /// Fetch a record by id
    pub fn get<T: Record>(&self, id: &str) -> StoreResult<Option<T>> {
        debug!(collection = T::collection_name(), %id, "get: called");
        let data: Option<String> = self
            .conn
            .query_row(
                "SELECT data FROM records WHERE collection = ?1 AND id = ?2",
                params![T::collection_name(), id],
                |row| row.get(0),
            )
            .optional()?;

        match data {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    /// Replace an existing record
    pub fn update<T: Record>(&mut self, record: T) -> StoreResult<()> {
        debug!(collection = T::collection_name(), id = record.id(), "update: called");
        let data = serde_json::to_string(&record)?;
        let tx = self.conn.transaction()?;
        let changed = tx.execute(
            "UPDATE records SET data = ?1, updated_at = ?2 WHERE collection = ?3 AND id = ?4",
            params![data, record.updated_at(), T::collection_name(), record.id()],
        )?;
        if changed == 0 {
            debug!("update: no such record");
            return Err(StoreError::NotFound {
                collection: T::collection_name().to_string(),
                id: record.id().to_string(),
            });
        }
        write_indexes(&tx, &record)?;
        tx.commit()?;
        Ok(())
    }

    /// List records matching every filter, in insertion order
    pub fn list<T: Record>(&self, filters: &[Filter]) -> StoreResult<Vec<T>> {
        debug!(collection = T::collection_name(), filter_count = filters.len(), "list: called");
        let mut sql = String::from("SELECT r.data FROM records r WHERE r.collection = ?1");
        let mut values = vec![T::collection_name().to_string()];

        for filter in filters {
            let exists = match filter.op {
                FilterOp::Eq => "EXISTS",
                FilterOp::Ne => "NOT EXISTS",
            };
            let field_param = values.len() + 1;
            let value_param = values.len() + 2;
            sql.push_str(&format!(
                " AND {exists} (SELECT 1 FROM record_indexes x \
                 WHERE x.collection = r.collection AND x.id = r.id \
                 AND x.field = ?{field_param} AND x.value = ?{value_param})"
            ));
            values.push(filter.field.clone());
            values.push(filter.value.encode());
        }
        sql.push_str(" ORDER BY r.seq");

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(values.iter()), |row| row.get::<_, String>(0))?;

        let mut records = Vec::new();
        for row in rows {
            records.push(serde_json::from_str(&row?)?);
        }
        debug!(count = records.len(), "list: done");
        Ok(records)
    }

    /// Rewrite the secondary index for every record of a collection
    pub fn rebuild_indexes<T: Record>(&mut self) -> StoreResult<usize> {
        debug!(collection = T::collection_name(), "rebuild_indexes: called");
        let records: Vec<T> = self.list(&[])?;
        let tx = self.conn.transaction()?;
        tx.execute(
            "DELETE FROM record_indexes WHERE collection = ?1",
            params![T::collection_name()],
        )?;
        for record in &records {
            write_indexes(&tx, record)?;
        }
        tx.commit()?;
        Ok(records.len())
    }
}

fn insert_record<T: Record>(conn: &Connection, record: &T) -> StoreResult<()> {
    let exists: Option<i64> = conn
        .query_row(
            "SELECT seq FROM records WHERE collection = ?1 AND id = ?2",
            params![T::collection_name(), record.id()],
            |row| row.get(0),
        )
        .optional()?;
    if exists.is_some() {
        return Err(StoreError::AlreadyExists {
            collection: T::collection_name().to_string(),
            id: record.id().to_string(),
        });
    }

    conn.execute(
        "INSERT INTO records (collection, id, data, updated_at) VALUES (?1, ?2, ?3, ?4)",
        params![
            T::collection_name(),
            record.id(),
            serde_json::to_string(record)?,
            record.updated_at()
        ],
    )?;
    write_indexes(conn, record)
}

fn write_indexes<T: Record>(conn: &Connection, record: &T) -> StoreResult<()> {
    conn.execute(
        "DELETE FROM record_indexes WHERE collection = ?1 AND id = ?2",
        params![T::collection_name(), record.id()],
    )?;
    for (field, value) in record.indexed_fields() {
        conn.execute(
            "INSERT INTO record_indexes (collection, id, field, value) VALUES (?1, ?2, ?3, ?4)",
            params![T::collection_name(), record.id(), field, value.encode()],
        )?;
    }
    Ok(())
}
