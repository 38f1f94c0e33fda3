mod backup;
mod cli;
mod config;
mod database;
mod error;
mod logging;
mod patcher;
mod schema;

use cli::Cli;
use config::Config;
use directories::ProjectDirs;
use log::{debug, error, info};

use crate::error::PatchError;

fn run() -> Result<(), PatchError> {
    let project_dirs = ProjectDirs::from("", "", "cierres-patch").ok_or_else(|| {
        PatchError::Error("Could not determine the project data directory".to_owned())
    })?;

    let config = Config::load_config(&project_dirs);

    // Held until exit so buffered log lines are flushed
    let _logger = logging::setup_logging(&project_dirs, &config.logging)?;

    info!("cierres-patch {} starting", env!("CARGO_PKG_VERSION"));
    debug!("Command-line args: {:?}", std::env::args_os().collect::<Vec<_>>());
    debug!("Configuration: {:?}", config);

    let result = Cli::handle_command_line(&config);
    if let Err(err) = &result {
        error!("{:?}", err);
    }

    result
}

fn main() {
    if let Err(err) = run() {
        eprintln!("{}", err);
        std::process::exit(1);
    }
}
