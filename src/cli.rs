use std::io::{self, Write};
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use log::info;

use crate::backup;
use crate::config::Config;
use crate::error::PatchError;
use crate::patcher::{PatchStatus, SchemaPatcher};
use crate::schema::PATCH_COLUMNS;

#[derive(Parser)]
#[command(
    name = "cierres-patch",
    version,
    about = "Adds the balance_sin_justificar, responsable and comentarios columns to cierres"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Add the columns to the cierres table (default if no command specified)
    Patch(PatchArgs),

    /// Show which of the columns the cierres table already has
    Status {
        /// Database file (default: from configuration)
        #[arg(long = "db", short = 'd')]
        db: Option<PathBuf>,
    },
}

#[derive(Args, Default)]
pub struct PatchArgs {
    /// Database file (default: from configuration)
    #[arg(long = "db", short = 'd')]
    pub db: Option<PathBuf>,

    /// Copy the database file to the backup directory before patching
    #[arg(long = "backup", default_value_t = false)]
    pub backup: bool,

    /// Show the statements that would run without executing them
    #[arg(long = "dry-run", default_value_t = false, conflicts_with = "backup")]
    pub dry_run: bool,
}

impl Cli {
    pub fn handle_command_line(config: &Config) -> Result<(), PatchError> {
        let args = Cli::parse();

        // Default to Patch if no command specified
        let command = args.command.unwrap_or(Command::Patch(PatchArgs::default()));
        let stdout = io::stdout();
        Self::execute(command, config, &mut stdout.lock())
    }

    pub fn execute<W: Write>(
        command: Command,
        config: &Config,
        out: &mut W,
    ) -> Result<(), PatchError> {
        match command {
            Command::Patch(args) => Self::patch(args, config, out),
            Command::Status { db } => Self::status(db, config, out),
        }
    }

    fn resolve_db_path(db: Option<PathBuf>, config: &Config) -> Result<PathBuf, PatchError> {
        match db {
            Some(path) => Ok(path),
            None => config.database.db_location()?.resolve(),
        }
    }

    fn patch<W: Write>(args: PatchArgs, config: &Config, out: &mut W) -> Result<(), PatchError> {
        let db_path = Self::resolve_db_path(args.db, config)?;
        let patcher = SchemaPatcher::new(&db_path);
        info!("Patching database at {}", db_path.display());

        if args.dry_run {
            return Self::dry_run(&patcher, out);
        }

        if (args.backup || config.backup.enabled) && db_path.exists() {
            // Any failure here aborts the run before the schema is touched
            let backup_path = backup::create_backup(
                &db_path,
                config.backup.directory.as_deref(),
                config.backup.keep,
            )?;
            writeln!(out, "backup written to {}", backup_path.display())?;
        }

        let outcome = patcher.run()?;
        writeln!(out, "{}", outcome)?;

        Ok(())
    }

    fn dry_run<W: Write>(patcher: &SchemaPatcher, out: &mut W) -> Result<(), PatchError> {
        let status = match patcher.inspect()? {
            Some(status) => status,
            None => return Self::write_missing(patcher.db_path(), out),
        };

        Self::write_status(&status, out)?;

        if !status.table_exists() {
            return Ok(());
        }

        // The batch is all-or-nothing, so any existing column means it would fail
        if status.pending_columns().len() < PATCH_COLUMNS.len() {
            writeln!(out, "patch would fail: some columns already exist")?;
        }

        writeln!(out, "statements:")?;
        for column in PATCH_COLUMNS.iter() {
            writeln!(out, "  {}", column.add_sql)?;
        }

        Ok(())
    }

    fn status<W: Write>(
        db: Option<PathBuf>,
        config: &Config,
        out: &mut W,
    ) -> Result<(), PatchError> {
        let db_path = Self::resolve_db_path(db, config)?;
        let patcher = SchemaPatcher::new(&db_path);

        match patcher.inspect()? {
            Some(status) => Self::write_status(&status, out),
            None => Self::write_missing(&db_path, out),
        }
    }

    fn write_missing<W: Write>(db_path: &Path, out: &mut W) -> Result<(), PatchError> {
        writeln!(out, "database does not exist: {}", db_path.display())?;
        Ok(())
    }

    fn write_status<W: Write>(status: &PatchStatus, out: &mut W) -> Result<(), PatchError> {
        if !status.table_exists() {
            writeln!(out, "table cierres does not exist")?;
            return Ok(());
        }

        writeln!(
            out,
            "{:<25} | {:<10} | {:<8} | {}",
            "column", "type", "nullable", "default"
        )?;
        for column in &status.columns {
            writeln!(
                out,
                "{:<25} | {:<10} | {:<8} | {}",
                column.name,
                column.decl_type,
                if column.not_null { "no" } else { "yes" },
                column.default_value.as_deref().unwrap_or("NULL")
            )?;
        }

        for column in PATCH_COLUMNS.iter() {
            let state = if status.column(column.name).is_some() {
                "present"
            } else {
                "missing"
            };
            writeln!(out, "{} ({}): {}", column.name, column.sql_type, state)?;
        }

        if status.is_patched() {
            writeln!(out, "cierres is already patched")?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use figment::Jail;
    use rusqlite::Connection;

    fn test_config() -> Config {
        let dir = tempfile::tempdir().unwrap();
        Config::load_from(&dir.path().join("config.toml"))
    }

    fn run_to_string(command: Command, config: &Config) -> String {
        let mut out = Vec::new();
        Cli::execute(command, config, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    fn create_cierres_db(dir: &Path) -> PathBuf {
        let path = dir.join("db.js.db");
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch(
            "CREATE TABLE cierres (id INTEGER, fecha TEXT);
             INSERT INTO cierres VALUES (1, '2024-01-01');",
        )
        .unwrap();
        path
    }

    fn patch_command(db: &Path) -> Command {
        Command::Patch(PatchArgs {
            db: Some(db.to_path_buf()),
            ..PatchArgs::default()
        })
    }

    #[test]
    fn test_cli_parsing_no_command_defaults_to_patch() {
        let result = Cli::try_parse_from(["cierres-patch"]);
        assert!(result.is_ok(), "Should accept no command");

        let cli = result.unwrap();
        assert!(cli.command.is_none());
        assert!(matches!(
            cli.command.unwrap_or(Command::Patch(PatchArgs::default())),
            Command::Patch(_)
        ));
    }

    #[test]
    fn test_cli_parsing_patch_flags() {
        let cli = Cli::try_parse_from([
            "cierres-patch",
            "patch",
            "--db",
            "/tmp/db.js.db",
            "--backup",
        ])
        .unwrap();

        match cli.command {
            Some(Command::Patch(args)) => {
                assert_eq!(args.db, Some(PathBuf::from("/tmp/db.js.db")));
                assert!(args.backup);
                assert!(!args.dry_run);
            }
            _ => panic!("Expected patch command"),
        }
    }

    #[test]
    fn test_cli_parsing_status_short_flag() {
        let cli = Cli::try_parse_from(["cierres-patch", "status", "-d", "db.js.db"]).unwrap();
        assert!(matches!(cli.command, Some(Command::Status { db: Some(_) })));
    }

    #[test]
    fn test_cli_parsing_invalid_arguments() {
        let result = Cli::try_parse_from(["cierres-patch", "nonexistent-command"]);
        assert!(result.is_err(), "Should reject unknown commands");

        let result = Cli::try_parse_from(["cierres-patch", "patch", "--invalid-flag"]);
        assert!(result.is_err(), "Should reject unknown flags on patch");

        let result = Cli::try_parse_from(["cierres-patch", "patch", "--dry-run", "--backup"]);
        assert!(result.is_err(), "Should reject --dry-run with --backup");
    }

    #[test]
    fn test_patch_prints_success_then_error() {
        let dir = tempfile::tempdir().unwrap();
        let db = create_cierres_db(dir.path());
        let config = test_config();

        let first = run_to_string(patch_command(&db), &config);
        assert_eq!(first, "columns added successfully\n");

        let second = run_to_string(patch_command(&db), &config);
        assert!(second.starts_with("error running ALTER TABLE: "), "{}", second);
        assert!(second.contains("duplicate column name"), "{}", second);
    }

    #[test]
    fn test_patch_missing_database_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("db.js.db");
        let config = test_config();

        let output = run_to_string(patch_command(&db), &config);
        assert_eq!(output, format!("database does not exist: {}\n", db.display()));
        assert!(!db.exists());
    }

    #[test]
    fn test_patch_with_backup() {
        let dir = tempfile::tempdir().unwrap();
        let db = create_cierres_db(dir.path());
        let original = std::fs::read(&db).unwrap();
        let config = test_config();

        let command = Command::Patch(PatchArgs {
            db: Some(db.clone()),
            backup: true,
            dry_run: false,
        });
        let output = run_to_string(command, &config);

        assert!(output.starts_with("backup written to "), "{}", output);
        assert!(output.ends_with("columns added successfully\n"), "{}", output);

        let backups: Vec<_> = std::fs::read_dir(dir.path().join("backups"))
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .collect();
        assert_eq!(backups.len(), 1);
        assert_eq!(std::fs::read(&backups[0]).unwrap(), original);
    }

    #[test]
    fn test_failed_backup_aborts_before_patch() {
        let dir = tempfile::tempdir().unwrap();
        let db = create_cierres_db(dir.path());

        // A regular file where the backup directory's parent should be
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"not a directory").unwrap();

        let mut config = test_config();
        config.backup.directory = Some(blocker.join("sub"));

        let command = Command::Patch(PatchArgs {
            db: Some(db.clone()),
            backup: true,
            dry_run: false,
        });
        let mut out = Vec::new();
        let result = Cli::execute(command, &config, &mut out);

        assert!(matches!(result, Err(PatchError::IoError(_))), "{:?}", result.err());
        assert!(out.is_empty(), "{}", String::from_utf8_lossy(&out));

        let status = SchemaPatcher::new(&db).inspect().unwrap().unwrap();
        let names: Vec<&str> = status.columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["id", "fecha"]);
    }

    #[test]
    fn test_dry_run_leaves_schema_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let db = create_cierres_db(dir.path());
        let config = test_config();

        let command = Command::Patch(PatchArgs {
            db: Some(db.clone()),
            backup: false,
            dry_run: true,
        });
        let output = run_to_string(command, &config);

        assert!(output.contains("balance_sin_justificar (REAL): missing"), "{}", output);
        assert!(
            output.contains("  ALTER TABLE cierres ADD COLUMN comentarios TEXT;"),
            "{}",
            output
        );
        assert!(!output.contains("patch would fail"), "{}", output);

        let status = SchemaPatcher::new(&db).inspect().unwrap().unwrap();
        assert_eq!(status.columns.len(), 2);
    }

    #[test]
    fn test_status_after_patch() {
        let dir = tempfile::tempdir().unwrap();
        let db = create_cierres_db(dir.path());
        let config = test_config();

        run_to_string(patch_command(&db), &config);
        let output = run_to_string(Command::Status { db: Some(db.clone()) }, &config);

        assert!(output.contains("responsable (TEXT): present"), "{}", output);
        assert!(output.contains("cierres is already patched"), "{}", output);
    }

    #[test]
    fn test_status_without_table() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("db.js.db");
        Connection::open(&db)
            .unwrap()
            .execute_batch("CREATE TABLE usuarios (id INTEGER);")
            .unwrap();
        let config = test_config();

        let output = run_to_string(Command::Status { db: Some(db) }, &config);
        assert_eq!(output, "table cierres does not exist\n");
    }

    #[test]
    fn test_patch_uses_configured_path() {
        Jail::expect_with(|jail| {
            let db = create_cierres_db(jail.directory());
            jail.set_env("CIERRES_DATABASE__LOCATION", "fixed");
            jail.set_env("CIERRES_DATABASE__PATH", db.display());

            let config = Config::load_from(Path::new("config.toml"));
            let output = run_to_string(Command::Patch(PatchArgs::default()), &config);
            assert_eq!(output, "columns added successfully\n");
            Ok(())
        });
    }
}
