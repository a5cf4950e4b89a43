use serde::Serialize;
use std::cell::RefCell;
use std::path::{Path, PathBuf};

use super::{run_local, CommandOutput, Remote};
use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandKind {
    Run,
    Sudo,
    Exists,
    Upload,
    Local,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlannedCommand {
    pub kind: CommandKind,
    pub command: String,
}

/// Records what a deployment would do without touching the server.
///
/// Every remote path is reported as absent, so the plan shows the
/// first-deploy branch of each existence check. Local commands still run,
/// since the pipeline only reads from the local checkout.
pub struct DryRun {
    user: String,
    host: String,
    local_dir: Option<PathBuf>,
    planned: RefCell<Vec<PlannedCommand>>,
}

impl DryRun {
    pub fn new(user: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            host: host.into(),
            local_dir: None,
            planned: RefCell::new(Vec::new()),
        }
    }

    pub fn with_local_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.local_dir = Some(dir.into());
        self
    }

    pub fn planned(&self) -> Vec<PlannedCommand> {
        self.planned.borrow().clone()
    }

    fn record(&self, kind: CommandKind, command: impl Into<String>) {
        self.planned.borrow_mut().push(PlannedCommand {
            kind,
            command: command.into(),
        });
    }
}

impl Remote for DryRun {
    fn user(&self) -> &str {
        &self.user
    }

    fn host(&self) -> &str {
        &self.host
    }

    fn execute(&self, command: &str, privileged: bool) -> CommandOutput {
        let kind = if privileged {
            CommandKind::Sudo
        } else {
            CommandKind::Run
        };
        self.record(kind, command);
        CommandOutput {
            success: true,
            ..CommandOutput::default()
        }
    }

    fn exists(&self, path: &str) -> Result<bool> {
        self.record(CommandKind::Exists, path);
        Ok(false)
    }

    fn upload(&self, local_path: &Path, remote_path: &str, mode: Option<u32>) -> Result<()> {
        let mode = mode.map(|m| format!(" (mode {:o})", m)).unwrap_or_default();
        self.record(
            CommandKind::Upload,
            format!("{} -> {}{}", local_path.display(), remote_path, mode),
        );
        Ok(())
    }

    fn local(&self, command: &str) -> Result<String> {
        self.record(CommandKind::Local, command);
        run_local(command, self.local_dir.as_deref())
    }
}
