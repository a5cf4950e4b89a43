//! JSON envelope for command results.
//!
//! Every invocation prints exactly one `{ success, data | error }` document
//! on stdout; the process exit code is derived from the error code.

use serde::Serialize;
use std::io::{self, Write};
use webdeploy::error::Hint;
use webdeploy::{Error, ErrorCode, Result};

#[derive(Debug, Serialize)]
pub struct CliResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<CliError>,
}

#[derive(Debug, Serialize)]
pub struct CliError {
    pub code: &'static str,
    pub message: String,
    pub details: serde_json::Value,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub hints: Vec<Hint>,
}

impl From<Result<serde_json::Value>> for CliResponse {
    fn from(result: Result<serde_json::Value>) -> Self {
        match result {
            Ok(data) => Self {
                success: true,
                data: Some(data),
                error: None,
            },
            Err(err) => Self {
                success: false,
                data: None,
                error: Some(CliError {
                    code: err.code.as_str(),
                    message: err.message,
                    details: err.details,
                    hints: err.hints,
                }),
            },
        }
    }
}

/// Serialize a command's output, pairing it with the process exit code.
pub fn map_cmd_result_to_json<T: Serialize>(
    result: Result<(T, i32)>,
) -> (Result<serde_json::Value>, i32) {
    match result {
        Ok((data, exit_code)) => match serde_json::to_value(data) {
            Ok(value) => (Ok(value), exit_code),
            Err(err) => (
                Err(Error::internal_json(
                    err.to_string(),
                    Some("serialize command output".to_string()),
                )),
                1,
            ),
        },
        Err(err) => {
            let exit_code = exit_code_for_error(err.code);
            (Err(err), exit_code)
        }
    }
}

fn exit_code_for_error(code: ErrorCode) -> i32 {
    match code {
        ErrorCode::ConfigMissingKey
        | ErrorCode::ConfigInvalidJson
        | ErrorCode::ConfigInvalidValue
        | ErrorCode::ValidationInvalidArgument => 2,

        ErrorCode::SshServerInvalid | ErrorCode::SshIdentityFileNotFound => 10,

        ErrorCode::RemoteCommandFailed
        | ErrorCode::LocalCommandFailed
        | ErrorCode::DeployUploadFailed => 20,

        ErrorCode::InternalIoError
        | ErrorCode::InternalJsonError
        | ErrorCode::InternalUnexpected => 1,
    }
}

fn render(response: &CliResponse) -> Result<String> {
    serde_json::to_string_pretty(response)
        .map_err(|e| Error::internal_json(e.to_string(), Some("serialize response".to_string())))
}

pub fn print_json_result(result: Result<serde_json::Value>) -> Result<()> {
    let payload = render(&CliResponse::from(result))?;

    let mut handle = io::stdout().lock();
    match writeln!(handle, "{}", payload) {
        Ok(()) => Ok(()),
        // Reader went away (e.g. piped into `head`).
        Err(e) if e.kind() == io::ErrorKind::BrokenPipe => Ok(()),
        Err(e) => Err(Error::internal_io(e.to_string(), Some("write stdout".to_string()))),
    }
}
