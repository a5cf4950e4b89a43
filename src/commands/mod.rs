use clap::Args;
use serde::Serialize;
use std::path::PathBuf;

use webdeploy::config::{self, LoadedSettings, Options};
use webdeploy::context::DeployRequest;

pub type CmdResult<T> = webdeploy::Result<(T, i32)>;

pub(crate) struct GlobalArgs {}

/// Arguments shared by every command that resolves a deployment context.
#[derive(Args, Debug, Default)]
pub struct TargetArgs {
    /// Project name (falls back to `project` in the settings file)
    pub project: Option<String>,

    /// Source repository URL (falls back to `repo_url` in the settings file)
    #[arg(long)]
    pub repo_url: Option<String>,

    /// Staging mode: true/yes/t/y/1 or false/no/f/n/0
    #[arg(long, default_value = "no")]
    pub staging: String,

    /// Override a setting or add an extra value (repeatable), e.g.
    /// `--set init_system=upstart --set db_name=blog`
    #[arg(long = "set", value_name = "KEY=VALUE")]
    pub set: Vec<String>,

    /// Settings file (defaults to ./webdeploy.json when present)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Server host (overrides `server.host`)
    #[arg(long)]
    pub host: Option<String>,

    /// Login user (overrides `server.user`)
    #[arg(long)]
    pub user: Option<String>,
}

impl TargetArgs {
    /// Load settings and apply server overrides from flags.
    pub fn load_settings(&self) -> webdeploy::Result<LoadedSettings> {
        let mut loaded = config::load_or_default(self.config.as_deref())?;
        if let Some(host) = &self.host {
            loaded.settings.server.host = host.clone();
        }
        if let Some(user) = &self.user {
            loaded.settings.server.user = user.clone();
        }
        Ok(loaded)
    }

    pub fn request(&self) -> webdeploy::Result<DeployRequest> {
        Ok(DeployRequest {
            project: self.project.clone().unwrap_or_default(),
            staging: self.staging.clone(),
            repo_url: self.repo_url.clone().unwrap_or_default(),
            options: parse_set_pairs(&self.set)?,
        })
    }
}

/// Parse `KEY=VALUE` pairs into options. Later pairs win.
pub fn parse_set_pairs(pairs: &[String]) -> webdeploy::Result<Options> {
    let mut options = Options::new();

    for pair in pairs {
        let (key, value) = pair.split_once('=').ok_or_else(|| {
            webdeploy::Error::validation_invalid_argument(
                "set",
                format!("Expected KEY=VALUE, got '{}'", pair),
            )
        })?;

        let key = key.trim();
        if key.is_empty() {
            return Err(webdeploy::Error::validation_invalid_argument(
                "set",
                format!("Missing key in '{}'", pair),
            ));
        }
        options.insert(key.to_string(), value.to_string());
    }

    Ok(options)
}

pub mod context;
pub mod deploy;

pub(crate) fn run_json(
    command: crate::Commands,
    global: &GlobalArgs,
) -> (webdeploy::Result<serde_json::Value>, i32) {
    match command {
        crate::Commands::Deploy(args) => dispatch(deploy::run(args, global)),
        crate::Commands::Context(args) => dispatch(context::run(args, global)),
    }
}

fn dispatch<T: Serialize>(result: CmdResult<T>) -> (webdeploy::Result<serde_json::Value>, i32) {
    crate::output::map_cmd_result_to_json(result)
}
