use std::fmt;
use std::path::{Path, PathBuf};

use log::{debug, error, info, warn};
use rusqlite::Connection;

use crate::database::{ColumnInfo, Database};
use crate::error::PatchError;
use crate::schema::{PatchColumn, PATCH_COLUMNS};

/// Result of a patch run, as reported to the operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatchOutcome {
    DatabaseMissing { path: PathBuf },
    ColumnsAdded,
    /// The engine rejected the batch. Nothing was committed.
    Failed { message: String },
}

impl fmt::Display for PatchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatchOutcome::DatabaseMissing { path } => {
                write!(f, "database does not exist: {}", path.display())
            }
            PatchOutcome::ColumnsAdded => write!(f, "columns added successfully"),
            PatchOutcome::Failed { message } => {
                write!(f, "error running ALTER TABLE: {}", message)
            }
        }
    }
}

/// Snapshot of the `cierres` table relative to the patch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchStatus {
    pub columns: Vec<ColumnInfo>,
}

impl PatchStatus {
    pub fn table_exists(&self) -> bool {
        !self.columns.is_empty()
    }

    pub fn column(&self, name: &str) -> Option<&ColumnInfo> {
        self.columns.iter().find(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// Patch columns the table does not have yet, in execution order.
    pub fn pending_columns(&self) -> Vec<&'static PatchColumn> {
        PATCH_COLUMNS
            .iter()
            .filter(|c| self.column(c.name).is_none())
            .collect()
    }

    pub fn is_patched(&self) -> bool {
        self.table_exists() && self.pending_columns().is_empty()
    }
}

pub struct SchemaPatcher {
    db_path: PathBuf,
}

impl SchemaPatcher {
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
        }
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Adds the patch columns to `cierres` inside a single transaction.
    ///
    /// Engine errors become `PatchOutcome::Failed` rather than `Err`: the
    /// run is over either way, and the operator only needs the engine text.
    pub fn run(&self) -> Result<PatchOutcome, PatchError> {
        if !self.db_path.exists() {
            warn!("Database not found at {}", self.db_path.display());
            return Ok(PatchOutcome::DatabaseMissing {
                path: self.db_path.clone(),
            });
        }

        let mut db = match Database::open(&self.db_path) {
            Ok(db) => db,
            Err(PatchError::DatabaseError(e)) => {
                error!("Unable to open {}: {}", self.db_path.display(), e);
                return Ok(PatchOutcome::Failed {
                    message: e.to_string(),
                });
            }
            Err(e) => return Err(e),
        };

        let result = Self::add_columns(db.conn_mut());

        // The outcome of the batch is what gets reported; Database::close
        // already warns and the dropped handle is finalized either way
        if let Err(e) = db.close() {
            debug!("Ignoring close error after patch: {}", e);
        }

        match result {
            Ok(()) => {
                info!("Added patch columns to {}", self.db_path.display());
                Ok(PatchOutcome::ColumnsAdded)
            }
            Err(e) => {
                error!("Patch of {} rolled back: {}", self.db_path.display(), e);
                Ok(PatchOutcome::Failed {
                    message: e.to_string(),
                })
            }
        }
    }

    fn add_columns(conn: &mut Connection) -> Result<(), rusqlite::Error> {
        // Dropping the transaction without commit rolls back every statement
        // already executed in it
        let tx = conn.transaction()?;

        for column in PATCH_COLUMNS.iter() {
            debug!("Executing: {}", column.add_sql);
            tx.execute(column.add_sql, [])?;
        }

        tx.commit()
    }

    /// Reads the current `cierres` columns without modifying the database.
    /// Returns `None` when the database file does not exist.
    pub fn inspect(&self) -> Result<Option<PatchStatus>, PatchError> {
        if !self.db_path.exists() {
            return Ok(None);
        }

        let db = Database::open_read_only(&self.db_path)?;
        let columns = db.cierres_columns();
        db.close()?;

        Ok(Some(PatchStatus { columns: columns? }))
    }
}
