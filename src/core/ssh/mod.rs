//! Remote execution seam used by every deployment step.
//!
//! Implementors only provide raw execution, upload, and local commands.
//! Checked execution, existence tests, and in-place substitution are built
//! on top and may be overridden (the dry-run recorder and test doubles do).

mod client;
mod dry_run;

pub use client::{
    execute_local_command, execute_local_command_in_dir, is_local_host, CommandOutput, SshClient,
};
pub use dry_run::{CommandKind, DryRun, PlannedCommand};

use std::path::Path;

use crate::error::{
    Error, LocalCommandFailedDetails, RemoteCommandFailedDetails, Result, TargetDetails,
};
use crate::utils::shell;

/// One `s/before/after/flags` substitution applied to a remote file in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SedEdit {
    pub before: String,
    pub after: String,
    pub flags: String,
    pub use_sudo: bool,
}

impl SedEdit {
    pub fn new(before: impl Into<String>, after: impl Into<String>) -> Self {
        Self {
            before: before.into(),
            after: after.into(),
            flags: String::new(),
            use_sudo: false,
        }
    }

    pub fn flags(mut self, flags: impl Into<String>) -> Self {
        self.flags = flags.into();
        self
    }

    pub fn sudo(mut self, use_sudo: bool) -> Self {
        self.use_sudo = use_sudo;
        self
    }

    /// The sed substitution expression. The replacement is escaped so it is
    /// written literally.
    pub fn expression(&self) -> String {
        format!(
            "s/{}/{}/{}",
            shell::escape_sed_delimiter(&self.before),
            shell::escape_sed_replacement(&self.after),
            self.flags
        )
    }

    pub fn command(&self, path: &str) -> String {
        format!(
            "sed -i -r -e {} {}",
            shell::quote_arg(&self.expression()),
            shell::quote_path(path)
        )
    }
}

pub trait Remote {
    /// Login user on the server.
    fn user(&self) -> &str;

    /// Server host name or address.
    fn host(&self) -> &str;

    /// Run a command on the server and capture its outcome.
    /// `privileged` runs it through sudo.
    fn execute(&self, command: &str, privileged: bool) -> CommandOutput;

    /// Copy a local file to the server, optionally setting its mode.
    fn upload(&self, local_path: &Path, remote_path: &str, mode: Option<u32>) -> Result<()>;

    /// Run a command on the deploying machine, returning trimmed stdout.
    fn local(&self, command: &str) -> Result<String>;

    fn run(&self, command: &str) -> Result<String> {
        let output = self.execute(command, false);
        require_success(self.user(), self.host(), command, output)
    }

    fn sudo(&self, command: &str) -> Result<String> {
        let output = self.execute(command, true);
        require_success(self.user(), self.host(), command, output)
    }

    fn exists(&self, path: &str) -> Result<bool> {
        let command = format!("test -e {}", shell::quote_path(path));
        let output = self.execute(&command, false);
        match output.exit_code {
            0 => Ok(true),
            1 => Ok(false),
            _ => require_success(self.user(), self.host(), &command, output).map(|_| false),
        }
    }

    fn sed(&self, path: &str, edit: &SedEdit) -> Result<()> {
        let command = edit.command(path);
        if edit.use_sudo {
            self.sudo(&command)?;
        } else {
            self.run(&command)?;
        }
        Ok(())
    }
}

/// Turn a captured remote outcome into trimmed stdout or a command failure.
pub fn require_success(
    user: &str,
    host: &str,
    command: &str,
    output: CommandOutput,
) -> Result<String> {
    if output.success {
        return Ok(output.stdout.trim().to_string());
    }

    Err(Error::remote_command_failed(RemoteCommandFailedDetails {
        command: command.to_string(),
        exit_code: output.exit_code,
        stdout: output.stdout,
        stderr: output.stderr,
        target: TargetDetails {
            user: Some(user.to_string()),
            host: Some(host.to_string()),
        },
    }))
}

/// Run a command on this machine and require it to succeed.
pub fn run_local(command: &str, current_dir: Option<&Path>) -> Result<String> {
    let dir = current_dir.map(|d| d.to_string_lossy().to_string());
    let output = execute_local_command_in_dir(command, dir.as_deref(), None);
    if !output.success {
        return Err(Error::local_command_failed(LocalCommandFailedDetails {
            command: command.to_string(),
            exit_code: output.exit_code,
            stderr: output.stderr,
        }));
    }
    Ok(output.stdout.trim().to_string())
}
