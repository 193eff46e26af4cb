//! SQLite-backed storage for references, steps, sessions and dancers.

use std::path::Path;
use std::sync::Mutex;

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::{debug, info};

use crate::error::StorageError;
use crate::pose::Pose;
use crate::steps::Step;
use crate::storage::{
    DancerId, DancerRecord, NewDancer, NewReference, Reference, ReferenceId, SessionRecord,
    Storage,
};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS "References" (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    filepath TEXT NOT NULL,
    title TEXT NOT NULL,
    selected INTEGER NOT NULL DEFAULT 0,
    thumbnail BLOB,
    created_at TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS Steps (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    reference_id INTEGER NOT NULL REFERENCES "References"(id),
    timestamp REAL NOT NULL,
    pose TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS steps_by_reference ON Steps (reference_id, timestamp);
CREATE TABLE IF NOT EXISTS Sessions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    reference_id INTEGER NOT NULL REFERENCES "References"(id),
    created_at TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS Dancers (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id INTEGER NOT NULL REFERENCES Sessions(id),
    avatar BLOB,
    score REAL NOT NULL DEFAULT 0
);
"#;

pub struct SqliteStorage {
    conn: Mutex<Connection>,
}

impl SqliteStorage {
    /// Opens or creates the database file, creating its directory if needed.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        info!("Opening database at {}", path.display());
        Self::with_connection(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StorageError> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, StorageError> {
        self.conn.lock().map_err(|_| StorageError::Poisoned)
    }
}

fn reference_from_row(row: &Row<'_>) -> rusqlite::Result<Reference> {
    Ok(Reference {
        id: row.get(0)?,
        filepath: row.get(1)?,
        title: row.get(2)?,
        selected: row.get(3)?,
        thumbnail: row.get(4)?,
        created_at: row.get(5)?,
    })
}

impl Storage for SqliteStorage {
    fn create_reference(
        &self,
        reference: NewReference,
        steps: &[Step],
    ) -> Result<ReferenceId, StorageError> {
        let encoded = steps
            .iter()
            .map(|step| Ok((step.timestamp, serde_json::to_string(&step.pose)?)))
            .collect::<Result<Vec<_>, serde_json::Error>>()?;

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        tx.execute(
            r#"INSERT INTO "References" (filepath, title, selected, thumbnail, created_at) VALUES (?1, ?2, ?3, ?4, ?5)"#,
            params![
                reference.filepath,
                reference.title,
                reference.selected,
                reference.thumbnail,
                Utc::now()
            ],
        )?;
        let reference_id = tx.last_insert_rowid();
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO Steps (reference_id, timestamp, pose) VALUES (?1, ?2, ?3)",
            )?;
            for (timestamp, pose) in &encoded {
                stmt.execute(params![reference_id, timestamp, pose])?;
            }
        }
        tx.commit()?;
        debug!("Stored reference {} with {} steps", reference_id, encoded.len());
        Ok(reference_id)
    }

    fn reference(&self, id: ReferenceId) -> Result<Option<Reference>, StorageError> {
        let conn = self.lock()?;
        Ok(conn
            .query_row(
                r#"SELECT id, filepath, title, selected, thumbnail, created_at FROM "References" WHERE id = ?1"#,
                params![id],
                reference_from_row,
            )
            .optional()?)
    }

    fn list_references(&self) -> Result<Vec<Reference>, StorageError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            r#"SELECT id, filepath, title, selected, thumbnail, created_at FROM "References" ORDER BY id"#,
        )?;
        let rows = stmt.query_map([], reference_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn steps(&self, reference_id: ReferenceId) -> Result<Option<Vec<Step>>, StorageError> {
        let conn = self.lock()?;
        let exists: Option<i64> = conn
            .query_row(
                r#"SELECT id FROM "References" WHERE id = ?1"#,
                params![reference_id],
                |r| r.get(0),
            )
            .optional()?;
        if exists.is_none() {
            return Ok(None);
        }

        let mut stmt = conn.prepare_cached(
            "SELECT timestamp, pose FROM Steps WHERE reference_id = ?1 ORDER BY timestamp, id",
        )?;
        let rows = stmt.query_map(params![reference_id], |r| {
            Ok((r.get::<_, f64>(0)?, r.get::<_, String>(1)?))
        })?;
        let mut steps = Vec::new();
        for row in rows {
            let (timestamp, pose) = row?;
            let pose = serde_json::from_str::<Pose>(&pose)?
                .validate()
                .map_err(|e| StorageError::Corrupt(e.to_string()))?;
            steps.push(Step::new(timestamp, pose));
        }
        Ok(Some(steps))
    }

    fn create_session(
        &self,
        reference_id: ReferenceId,
        dancers: &[NewDancer],
    ) -> Result<SessionRecord, StorageError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO Sessions (reference_id, created_at) VALUES (?1, ?2)",
            params![reference_id, Utc::now()],
        )?;
        let session_id = tx.last_insert_rowid();
        let mut dancer_ids = Vec::with_capacity(dancers.len());
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO Dancers (session_id, avatar, score) VALUES (?1, ?2, 0)",
            )?;
            for dancer in dancers {
                stmt.execute(params![session_id, dancer.avatar])?;
                dancer_ids.push(tx.last_insert_rowid());
            }
        }
        tx.commit()?;
        Ok(SessionRecord {
            id: session_id,
            reference_id,
            dancer_ids,
        })
    }

    fn update_dancer_score(&self, dancer_id: DancerId, score: f64) -> Result<(), StorageError> {
        let conn = self.lock()?;
        let updated = conn.execute(
            "UPDATE Dancers SET score = ?1 WHERE id = ?2",
            params![score, dancer_id],
        )?;
        if updated == 0 {
            return Err(StorageError::NotFound(format!("dancer {dancer_id}")));
        }
        Ok(())
    }

    fn dancer(&self, dancer_id: DancerId) -> Result<Option<DancerRecord>, StorageError> {
        let conn = self.lock()?;
        Ok(conn
            .query_row(
                "SELECT id, session_id, avatar, score FROM Dancers WHERE id = ?1",
                params![dancer_id],
                |r| {
                    Ok(DancerRecord {
                        id: r.get(0)?,
                        session_id: r.get(1)?,
                        avatar: r.get(2)?,
                        score: r.get(3)?,
                    })
                },
            )
            .optional()?)
    }
}
