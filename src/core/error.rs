use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ConfigMissingKey,
    ConfigInvalidJson,
    ConfigInvalidValue,

    ValidationInvalidArgument,

    SshServerInvalid,
    SshIdentityFileNotFound,

    RemoteCommandFailed,
    LocalCommandFailed,

    DeployUploadFailed,

    InternalIoError,
    InternalJsonError,
    InternalUnexpected,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ConfigMissingKey => "config.missing_key",
            ErrorCode::ConfigInvalidJson => "config.invalid_json",
            ErrorCode::ConfigInvalidValue => "config.invalid_value",

            ErrorCode::ValidationInvalidArgument => "validation.invalid_argument",

            ErrorCode::SshServerInvalid => "ssh.server_invalid",
            ErrorCode::SshIdentityFileNotFound => "ssh.identity_file_not_found",

            ErrorCode::RemoteCommandFailed => "remote.command_failed",
            ErrorCode::LocalCommandFailed => "local.command_failed",

            ErrorCode::DeployUploadFailed => "deploy.upload_failed",

            ErrorCode::InternalIoError => "internal.io_error",
            ErrorCode::InternalJsonError => "internal.json_error",
            ErrorCode::InternalUnexpected => "internal.unexpected",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hint {
    pub message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigMissingKeyDetails {
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigInvalidJsonDetails {
    pub path: String,
    pub error: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigInvalidValueDetails {
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    pub problem: String,
}

#[derive(Debug, Clone)]
pub struct Error {
    pub code: ErrorCode,
    pub message: String,
    pub details: Value,
    pub hints: Vec<Hint>,
}

pub type Result<T> = std::result::Result<T, Error>;

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for Error {}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvalidArgumentDetails {
    pub field: String,
    pub problem: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InternalIoErrorDetails {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InternalJsonErrorDetails {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

/// Where a failed command was headed.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetDetails {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteCommandFailedDetails {
    pub command: String,
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub target: TargetDetails,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalCommandFailedDetails {
    pub command: String,
    pub exit_code: i32,
    pub stderr: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadFailedDetails {
    pub local_path: String,
    pub remote_path: String,
    pub error: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SshServerInvalidDetails {
    pub missing_fields: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SshIdentityFileNotFoundDetails {
    pub host: String,
    pub identity_file: String,
}

fn to_details<T: Serialize>(details: T) -> Value {
    serde_json::to_value(details).unwrap_or_else(|_| Value::Object(serde_json::Map::new()))
}

impl Error {
    pub fn new(code: ErrorCode, message: impl Into<String>, details: Value) -> Self {
        Self {
            code,
            message: message.into(),
            details,
            hints: Vec::new(),
        }
    }

    pub fn validation_invalid_argument(
        field: impl Into<String>,
        problem: impl Into<String>,
    ) -> Self {
        let details = to_details(InvalidArgumentDetails {
            field: field.into(),
            problem: problem.into(),
        });

        Self::new(
            ErrorCode::ValidationInvalidArgument,
            "Invalid argument",
            details,
        )
    }

    /// A required deployment setting was absent or empty.
    ///
    /// The message names the key so the caller knows what to supply.
    pub fn config_missing_key(key: impl Into<String>, path: Option<String>) -> Self {
        let key = key.into();
        let message = format!(
            "`{}` not defined. Provide as argument or project setting.",
            key
        );
        let details = to_details(ConfigMissingKeyDetails { key, path });

        Self::new(ErrorCode::ConfigMissingKey, message, details)
    }

    pub fn config_invalid_json(path: impl Into<String>, err: serde_json::Error) -> Self {
        let details = to_details(ConfigInvalidJsonDetails {
            path: path.into(),
            error: err.to_string(),
        });

        Self::new(
            ErrorCode::ConfigInvalidJson,
            "Invalid JSON in configuration",
            details,
        )
    }

    pub fn config_invalid_value(
        key: impl Into<String>,
        value: Option<String>,
        problem: impl Into<String>,
    ) -> Self {
        let problem = problem.into();
        let details = to_details(ConfigInvalidValueDetails {
            key: key.into(),
            value,
            problem: problem.clone(),
        });

        Self::new(ErrorCode::ConfigInvalidValue, problem, details)
    }

    pub fn ssh_server_invalid(missing_fields: Vec<String>) -> Self {
        Self::new(
            ErrorCode::SshServerInvalid,
            "Server is not properly configured",
            to_details(SshServerInvalidDetails { missing_fields }),
        )
        .with_hint("Set `server.host` and `server.user` in webdeploy.json or pass --host/--user")
    }

    pub fn ssh_identity_file_not_found(
        host: impl Into<String>,
        identity_file: impl Into<String>,
    ) -> Self {
        let details = to_details(SshIdentityFileNotFoundDetails {
            host: host.into(),
            identity_file: identity_file.into(),
        });

        Self::new(
            ErrorCode::SshIdentityFileNotFound,
            "SSH identity file not found",
            details,
        )
    }

    pub fn remote_command_failed(details: RemoteCommandFailedDetails) -> Self {
        let message = format!(
            "Remote command failed with exit code {}: {}",
            details.exit_code, details.command
        );

        Self::new(ErrorCode::RemoteCommandFailed, message, to_details(details))
    }

    pub fn local_command_failed(details: LocalCommandFailedDetails) -> Self {
        let message = format!(
            "Local command failed with exit code {}: {}",
            details.exit_code, details.command
        );

        Self::new(ErrorCode::LocalCommandFailed, message, to_details(details))
    }

    pub fn deploy_upload_failed(
        local_path: impl Into<String>,
        remote_path: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        let details = to_details(UploadFailedDetails {
            local_path: local_path.into(),
            remote_path: remote_path.into(),
            error: error.into(),
        });

        Self::new(ErrorCode::DeployUploadFailed, "File upload failed", details)
    }

    pub fn internal_io(error: impl Into<String>, context: Option<String>) -> Self {
        let details = to_details(InternalIoErrorDetails {
            error: error.into(),
            context,
        });

        Self::new(ErrorCode::InternalIoError, "IO error", details)
    }

    pub fn internal_json(error: impl Into<String>, context: Option<String>) -> Self {
        let details = to_details(InternalJsonErrorDetails {
            error: error.into(),
            context,
        });

        Self::new(ErrorCode::InternalJsonError, "JSON error", details)
    }

    pub fn internal_unexpected(error: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::InternalUnexpected,
            "Unexpected error",
            serde_json::json!({ "error": error.into() }),
        )
    }

    pub fn with_hint(mut self, message: impl Into<String>) -> Self {
        self.hints.push(Hint {
            message: message.into(),
        });
        self
    }
}
