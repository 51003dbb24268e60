//! Interactive editor invocation.

use std::path::Path;
use std::process::{Command, ExitStatus};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EditorError {
    #[error("editor command is empty")]
    Empty,

    #[error("failed to launch {program}: {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with {status}")]
    ExitStatus { program: String, status: ExitStatus },
}

/// Opens a file for interactive editing and blocks until the user is done.
pub trait Editor {
    fn edit(&self, path: &Path) -> Result<(), EditorError>;
}

/// Runs an external program with the terminal attached.
///
/// The command line is split on whitespace, so `code --wait` works.
#[derive(Debug, Clone)]
pub struct CommandEditor {
    command: String,
}

impl CommandEditor {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

impl Editor for CommandEditor {
    fn edit(&self, path: &Path) -> Result<(), EditorError> {
        let mut parts = self.command.split_whitespace();
        let program = parts.next().ok_or(EditorError::Empty)?;

        log::debug!("Launching {} {}", self.command, path.display());
        let status = Command::new(program)
            .args(parts)
            .arg(path)
            .status()
            .map_err(|source| EditorError::Launch {
                program: program.to_string(),
                source,
            })?;

        if !status.success() {
            return Err(EditorError::ExitStatus {
                program: program.to_string(),
                status,
            });
        }
        Ok(())
    }
}
