use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use log::{info, warn};

use crate::error::PatchError;

const DEFAULT_BACKUP_DIR: &str = "backups";
const BACKUP_PREFIX: &str = "cierres-backup_";
const BACKUP_EXTENSION: &str = ".db";

pub fn backup_file_name(timestamp: DateTime<Local>) -> String {
    format!(
        "{}{}{}",
        BACKUP_PREFIX,
        timestamp.format("%Y-%m-%d_%H-%M-%S"),
        BACKUP_EXTENSION
    )
}

fn is_backup_file_name(name: &str) -> bool {
    name.starts_with(BACKUP_PREFIX) && name.ends_with(BACKUP_EXTENSION)
}

/// Copies the database file into the backup directory before it is patched,
/// then prunes the directory down to the `keep` most recent backups.
///
/// Without an explicit directory, backups go to `backups/` next to the
/// database file. A `keep` of 0 disables pruning.
pub fn create_backup(
    db_path: &Path,
    backup_dir: Option<&Path>,
    keep: usize,
) -> Result<PathBuf, PatchError> {
    let dir = match backup_dir {
        Some(dir) => dir.to_path_buf(),
        None => db_path
            .parent()
            .map(|parent| parent.join(DEFAULT_BACKUP_DIR))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_BACKUP_DIR)),
    };

    fs::create_dir_all(&dir)?;

    let backup_path = dir.join(backup_file_name(Local::now()));
    let bytes = fs::copy(db_path, &backup_path)?;

    info!(
        "Backed up {} to {} ({} bytes)",
        db_path.display(),
        backup_path.display(),
        bytes
    );

    if keep > 0 {
        prune_backups(&dir, keep)?;
    }

    Ok(backup_path)
}

/// Removes all but the `keep` newest backups in `dir`. Returns how many
/// files were removed. Files not named like a backup are left alone.
pub fn prune_backups(dir: &Path, keep: usize) -> Result<usize, PatchError> {
    let mut backups = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if is_backup_file_name(&name) {
            backups.push(name);
        }
    }

    if backups.len() <= keep {
        return Ok(0);
    }

    // Timestamped names sort chronologically
    backups.sort();
    let excess = backups.len() - keep;

    let mut removed = 0;
    for name in backups.into_iter().take(excess) {
        let path = dir.join(&name);
        match fs::remove_file(&path) {
            Ok(()) => {
                info!("Removed old backup {}", path.display());
                removed += 1;
            }
            Err(e) => warn!("Unable to remove old backup {}: {}", path.display(), e),
        }
    }

    Ok(removed)
}
