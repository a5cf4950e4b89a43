use std::path::{Path, PathBuf};
use std::process::Command;

use super::{run_local, Remote};
use crate::config::ServerConfig;
use crate::error::{Error, Result};
use crate::utils::shell;

pub struct SshClient {
    pub host: String,
    pub user: String,
    pub port: u16,
    pub identity_file: Option<String>,
    /// When true, all commands run locally instead of over SSH.
    /// Set automatically when the server host is localhost/127.0.0.1/::1.
    pub is_local: bool,
    /// Working directory for commands run on the deploying machine.
    pub local_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub success: bool,
    pub exit_code: i32,
}

impl CommandOutput {
    fn failed(stderr: String) -> Self {
        Self {
            stdout: String::new(),
            stderr,
            success: false,
            exit_code: -1,
        }
    }
}

impl SshClient {
    pub fn from_server(server: &ServerConfig) -> Result<Self> {
        let missing = server.missing_fields();
        if !missing.is_empty() {
            return Err(Error::ssh_server_invalid(missing));
        }

        let identity_file = match &server.identity_file {
            Some(path) if !path.is_empty() => {
                let expanded = shellexpand::tilde(path).to_string();
                if !Path::new(&expanded).exists() {
                    return Err(Error::ssh_identity_file_not_found(
                        server.host.clone(),
                        expanded,
                    ));
                }
                Some(expanded)
            }
            _ => None,
        };

        let is_local = is_local_host(&server.host);
        if is_local {
            log_status!("ssh", "Host '{}' is localhost, using local execution", server.host);
        }

        Ok(Self {
            host: server.host.clone(),
            user: server.user.clone(),
            port: server.port,
            identity_file,
            is_local,
            local_dir: None,
        })
    }

    pub fn with_local_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.local_dir = Some(dir.into());
        self
    }

    fn build_ssh_args(&self, command: &str) -> Vec<String> {
        let mut args = Vec::new();

        if let Some(identity_file) = &self.identity_file {
            args.push("-i".to_string());
            args.push(identity_file.clone());
        }

        if self.port != 22 {
            args.push("-p".to_string());
            args.push(self.port.to_string());
        }

        // Prevent hangs on stalled connections or unexpected prompts.
        args.extend([
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-o".to_string(),
            "ConnectTimeout=10".to_string(),
            "-o".to_string(),
            "ServerAliveInterval=15".to_string(),
            "-o".to_string(),
            "ServerAliveCountMax=3".to_string(),
        ]);

        args.push(format!("{}@{}", self.user, self.host));
        args.push(command.to_string());

        args
    }

    /// Run one command, optionally feeding a local file on stdin.
    ///
    /// Never retried: a failed attempt fails the step that issued it.
    fn execute_with_stdin(&self, command: &str, stdin_file: Option<&str>) -> CommandOutput {
        if self.is_local {
            if let Some(stdin_file_path) = stdin_file {
                let local_cmd = format!("cat {} | {}", shell::quote_path(stdin_file_path), command);
                return execute_local_command(&local_cmd);
            }
            return execute_local_command(command);
        }

        let mut cmd = Command::new("ssh");
        cmd.args(self.build_ssh_args(command));

        if let Some(stdin_file_path) = stdin_file {
            match std::fs::File::open(stdin_file_path) {
                Ok(file) => {
                    cmd.stdin(file);
                }
                Err(err) => {
                    return CommandOutput::failed(format!("Failed to open stdin file: {}", err));
                }
            }
        }

        match cmd.output() {
            Ok(out) => CommandOutput {
                stdout: String::from_utf8_lossy(&out.stdout).to_string(),
                stderr: String::from_utf8_lossy(&out.stderr).to_string(),
                success: out.status.success(),
                exit_code: out.status.code().unwrap_or(-1),
            },
            Err(e) => CommandOutput::failed(format!("SSH error: {}", e)),
        }
    }
}

impl Remote for SshClient {
    fn user(&self) -> &str {
        &self.user
    }

    fn host(&self) -> &str {
        &self.host
    }

    fn execute(&self, command: &str, privileged: bool) -> CommandOutput {
        if privileged {
            let wrapped = format!("sudo -n sh -c {}", shell::escape_command_for_shell(command));
            return self.execute_with_stdin(&wrapped, None);
        }
        self.execute_with_stdin(command, None)
    }

    fn upload(&self, local_path: &Path, remote_path: &str, mode: Option<u32>) -> Result<()> {
        let local = local_path.to_string_lossy().to_string();
        if !local_path.is_file() {
            return Err(Error::deploy_upload_failed(
                local,
                remote_path,
                "Local file does not exist",
            ));
        }

        let mut remote_command = format!("cat > {}", shell::quote_path(remote_path));
        if let Some(mode) = mode {
            remote_command.push_str(&format!(
                " && chmod {:o} {}",
                mode,
                shell::quote_path(remote_path)
            ));
        }

        let output = self.execute_with_stdin(&remote_command, Some(&local));
        if !output.success {
            return Err(Error::deploy_upload_failed(
                local,
                remote_path,
                output.stderr.trim().to_string(),
            ));
        }
        Ok(())
    }

    fn local(&self, command: &str) -> Result<String> {
        run_local(command, self.local_dir.as_deref())
    }
}

pub fn execute_local_command(command: &str) -> CommandOutput {
    execute_local_command_in_dir(command, None, None)
}

pub fn execute_local_command_in_dir(
    command: &str,
    current_dir: Option<&str>,
    env: Option<&[(&str, &str)]>,
) -> CommandOutput {
    #[cfg(windows)]
    let mut cmd = {
        let mut cmd = Command::new("cmd");
        cmd.args(["/C", command]);
        cmd
    };

    #[cfg(not(windows))]
    let mut cmd = {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", command]);
        cmd
    };

    if let Some(dir) = current_dir {
        cmd.current_dir(dir);
    }

    if let Some(env_pairs) = env {
        cmd.envs(env_pairs.iter().copied());
    }

    match cmd.output() {
        Ok(out) => CommandOutput {
            stdout: String::from_utf8_lossy(&out.stdout).to_string(),
            stderr: String::from_utf8_lossy(&out.stderr).to_string(),
            success: out.status.success(),
            exit_code: out.status.code().unwrap_or(-1),
        },
        Err(e) => CommandOutput::failed(format!("Command error: {}", e)),
    }
}

/// Check if a host address refers to the local machine.
pub fn is_local_host(host: &str) -> bool {
    matches!(host, "localhost" | "127.0.0.1" | "::1")
}
