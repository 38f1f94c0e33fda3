use directories::ProjectDirs;
use flexi_logger::{Age, Cleanup, Criterion, FileSpec, Logger, LoggerHandle, Naming};

use crate::config::LoggingConfig;
use crate::error::PatchError;

const LOG_FILES_TO_KEEP: usize = 7;

/// Starts the file logger. Logs go to `<data dir>/logs` so that stdout stays
/// reserved for operator-facing output.
///
/// The returned handle must be kept alive for the life of the process.
pub fn setup_logging(
    project_dirs: &ProjectDirs,
    logging: &LoggingConfig,
) -> Result<LoggerHandle, PatchError> {
    let log_dir = project_dirs.data_local_dir().join("logs");

    let handle = Logger::try_with_str(&logging.cierres_patch)?
        .log_to_file(
            FileSpec::default()
                .directory(log_dir)
                .basename("cierres-patch"),
        )
        .format_for_files(flexi_logger::detailed_format)
        .rotate(
            Criterion::Age(Age::Day),
            Naming::Timestamps,
            Cleanup::KeepLogFiles(LOG_FILES_TO_KEEP),
        )
        .start()?;

    Ok(handle)
}
