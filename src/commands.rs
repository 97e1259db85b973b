// ABOUTME: Command-line surface for inspecting and editing a keepsake state database.
// ABOUTME: Each subcommand maps onto one PersistentState operation and writes results to a writer.

use std::io::{self, Write};
use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use keepsake_core::{PersistentState, StateError};
use keepsake_store::{SqliteError, SqlitePersistentState};
use thiserror::Error;

/// Output format for `dump`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DumpFormat {
    Json,
    Yaml,
}

#[derive(Debug, Parser)]
#[command(name = "keepsake", version, about = "Inspect and edit persistent state")]
pub struct Cli {
    /// State database to operate on (overrides KEEPSAKE_STATE)
    #[arg(long, global = true)]
    pub state: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print every bucket and pair
    Dump {
        #[arg(long, value_enum)]
        format: Option<DumpFormat>,
    },
    /// Print the value stored under a key
    Get {
        #[arg(long)]
        bucket: String,
        #[arg(long)]
        key: String,
    },
    /// Store a value under a key
    Set {
        #[arg(long)]
        bucket: String,
        #[arg(long)]
        key: String,
        #[arg(long)]
        value: String,
    },
    /// Remove a single key
    Delete {
        #[arg(long)]
        bucket: String,
        #[arg(long)]
        key: String,
    },
    /// Remove a bucket and all of its keys
    DeleteBucket {
        #[arg(long)]
        bucket: String,
    },
    /// Copy every pair into another state database
    Copy {
        #[arg(long)]
        to: PathBuf,
    },
}

/// Errors that can occur while running a command.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("state error: {0}")]
    State(#[from] StateError),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] SqliteError),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("io error: {0}")]
    Io(#[from] io::Error),

    #[error("no value for key {key:?} in bucket {bucket:?}")]
    NotFound { bucket: String, key: String },
}

/// Run one command against an open state, writing any output to `out`.
pub fn run(
    command: &Command,
    state: &mut dyn PersistentState,
    default_format: DumpFormat,
    out: &mut dyn Write,
) -> Result<(), CommandError> {
    match command {
        Command::Dump { format } => {
            let data = state.data()?;
            match format.unwrap_or(default_format) {
                DumpFormat::Json => {
                    serde_json::to_writer_pretty(&mut *out, &data)?;
                    writeln!(out)?;
                }
                DumpFormat::Yaml => serde_yaml::to_writer(&mut *out, &data)?,
            }
        }
        Command::Get { bucket, key } => match state.get(bucket.as_bytes(), key.as_bytes())? {
            Some(value) => {
                out.write_all(&value)?;
                writeln!(out)?;
            }
            None => {
                return Err(CommandError::NotFound {
                    bucket: bucket.clone(),
                    key: key.clone(),
                });
            }
        },
        Command::Set { bucket, key, value } => {
            state.set(bucket.as_bytes(), key.as_bytes(), value.as_bytes())?;
        }
        Command::Delete { bucket, key } => {
            state.delete(bucket.as_bytes(), key.as_bytes())?;
        }
        Command::DeleteBucket { bucket } => {
            state.delete_bucket(bucket.as_bytes())?;
        }
        Command::Copy { to } => {
            let mut target = SqlitePersistentState::open(to)?;
            state.copy_to(&mut target)?;
            target.close()?;
            tracing::info!(to = %to.display(), "copied state");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use keepsake_core::MockPersistentState;
    use tempfile::TempDir;

    fn run_to_string(command: Command, state: &mut dyn PersistentState) -> String {
        let mut out = Vec::new();
        run(&command, state, DumpFormat::Json, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    fn seeded() -> MockPersistentState {
        let mut state = MockPersistentState::new();
        state.set(b"entries", b"/home/user/.vimrc", b"abc123").unwrap();
        state
    }

    #[test]
    fn cli_parses_global_state_flag() {
        let cli = Cli::try_parse_from([
            "keepsake", "get", "--bucket", "entries", "--key", "k", "--state", "/tmp/s.db",
        ])
        .unwrap();

        assert_eq!(cli.state, Some(PathBuf::from("/tmp/s.db")));
        assert!(matches!(cli.command, Command::Get { .. }));
    }

    #[test]
    fn dump_prints_json_by_default() {
        let mut state = seeded();
        let output = run_to_string(Command::Dump { format: None }, &mut state);

        let json: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(json["entries"]["/home/user/.vimrc"], "abc123");
    }

    #[test]
    fn dump_prints_yaml_when_asked() {
        let mut state = seeded();
        let output = run_to_string(
            Command::Dump {
                format: Some(DumpFormat::Yaml),
            },
            &mut state,
        );

        let yaml: serde_yaml::Value = serde_yaml::from_str(&output).unwrap();
        assert_eq!(yaml["entries"]["/home/user/.vimrc"].as_str(), Some("abc123"));
    }

    #[test]
    fn set_get_delete_round() {
        let mut state = MockPersistentState::new();
        run_to_string(
            Command::Set {
                bucket: "b".to_string(),
                key: "k".to_string(),
                value: "v".to_string(),
            },
            &mut state,
        );

        let output = run_to_string(
            Command::Get {
                bucket: "b".to_string(),
                key: "k".to_string(),
            },
            &mut state,
        );
        assert_eq!(output, "v\n");

        run_to_string(
            Command::Delete {
                bucket: "b".to_string(),
                key: "k".to_string(),
            },
            &mut state,
        );

        let mut out = Vec::new();
        let err = run(
            &Command::Get {
                bucket: "b".to_string(),
                key: "k".to_string(),
            },
            &mut state,
            DumpFormat::Json,
            &mut out,
        )
        .unwrap_err();
        assert!(matches!(err, CommandError::NotFound { .. }));
        assert!(out.is_empty());
    }

    #[test]
    fn delete_bucket_removes_all_keys() {
        let mut state = seeded();
        state.set(b"entries", b"/home/user/.zshrc", b"def456").unwrap();

        run_to_string(
            Command::DeleteBucket {
                bucket: "entries".to_string(),
            },
            &mut state,
        );

        assert!(state.is_empty());
    }

    #[test]
    fn copy_writes_into_new_database() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("backup").join("state.db");
        let mut state = seeded();

        run_to_string(Command::Copy { to: target.clone() }, &mut state);

        let copied = SqlitePersistentState::open(&target).unwrap();
        assert_eq!(
            copied.get(b"entries", b"/home/user/.vimrc").unwrap(),
            Some(b"abc123".to_vec())
        );
    }
}
