use flexi_logger::FlexiLoggerError;
use rusqlite::Error as RusqliteError;
use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PatchError {
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error), // Converts io::Error into PatchError automatically

    #[error("Database error: {0}")]
    DatabaseError(#[from] RusqliteError), // Converts rusqlite::Error automatically

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Logger error: {0}")]
    LoggerError(#[from] FlexiLoggerError),

    #[error("Error: {0}")]
    Error(String), // Allows custom application errors
}
