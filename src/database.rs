use log::{debug, warn};
use rusqlite::{Connection, OpenFlags};
use std::path::{Path, PathBuf};

use crate::error::PatchError;
use crate::schema::CIERRES_TABLE;

/// Where the database file lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DbLocation {
    /// A file with this name in the directory holding the running executable
    Relative { file_name: String },
    /// An explicit path supplied by configuration or the command line
    Fixed(PathBuf),
}

impl DbLocation {
    pub fn resolve(&self) -> Result<PathBuf, PatchError> {
        match self {
            DbLocation::Relative { file_name } => {
                let exe = dunce::canonicalize(std::env::current_exe()?)?;
                let exe_dir = exe.parent().ok_or_else(|| {
                    PatchError::Error(format!(
                        "Unable to determine the directory of '{}'",
                        exe.display()
                    ))
                })?;
                Ok(exe_dir.join(file_name))
            }
            DbLocation::Fixed(path) => Ok(path.clone()),
        }
    }
}

/// One row of `PRAGMA table_info`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    pub name: String,
    pub decl_type: String,
    pub not_null: bool,
    pub default_value: Option<String>,
}

/// An open connection to an existing database file.
///
/// Opening never creates the file. The connection is closed by `close`, or
/// by drop if the caller bails out early.
pub struct Database {
    conn: Connection,
    path: PathBuf,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self, PatchError> {
        Self::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
    }

    pub fn open_read_only(path: &Path) -> Result<Self, PatchError> {
        Self::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
    }

    fn open_with_flags(path: &Path, flags: OpenFlags) -> Result<Self, PatchError> {
        let conn = Connection::open_with_flags(path, flags)?;
        debug!("Database opened at: {}", path.display());

        Ok(Self {
            conn,
            path: path.to_path_buf(),
        })
    }

    pub fn conn_mut(&mut self) -> &mut Connection {
        &mut self.conn
    }

    /// Columns of the `cierres` table in declaration order. Empty when the
    /// table does not exist.
    pub fn cierres_columns(&self) -> Result<Vec<ColumnInfo>, PatchError> {
        let mut stmt = self
            .conn
            .prepare(&format!("PRAGMA table_info({})", CIERRES_TABLE))?;

        let rows = stmt.query_map([], |row| {
            Ok(ColumnInfo {
                name: row.get("name")?,
                decl_type: row.get("type")?,
                not_null: row.get::<_, i64>("notnull")? != 0,
                default_value: row.get("dflt_value")?,
            })
        })?;

        let mut columns = Vec::new();
        for column in rows {
            columns.push(column?);
        }

        Ok(columns)
    }

    pub fn close(self) -> Result<(), PatchError> {
        let path = self.path;
        match self.conn.close() {
            Ok(()) => {
                debug!("Database closed: {}", path.display());
                Ok(())
            }
            Err((conn, e)) => {
                // Dropping the returned handle still finalizes the connection
                warn!("Error closing database {}: {}", path.display(), e);
                drop(conn);
                Err(e.into())
            }
        }
    }
}
