//! Project deployment settings loaded from `webdeploy.json`.
//!
//! Every optional key has a default function, so an empty file (or no file
//! at all) yields a usable settings value. Settings are constructed per
//! helper instance and never shared.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{Error, Result};

/// Default settings file name, looked up in the working directory.
pub const SETTINGS_FILE: &str = "webdeploy.json";

/// Free-form caller options, keyed by setting name.
pub type Options = BTreeMap<String, String>;

/// Remote process supervisor that owns the deployed services.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum InitSystem {
    Upstart,
    #[default]
    Systemd,
}

impl InitSystem {
    /// Config directory, relative to the filesystem root.
    pub fn config_dir(&self) -> &'static str {
        match self {
            InitSystem::Upstart => "etc/init",
            InitSystem::Systemd => "etc/systemd/system",
        }
    }

    pub fn file_ext(&self) -> &'static str {
        match self {
            InitSystem::Upstart => ".conf",
            InitSystem::Systemd => ".service",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            InitSystem::Upstart => "upstart",
            InitSystem::Systemd => "systemd",
        }
    }
}

impl FromStr for InitSystem {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "upstart" => Ok(InitSystem::Upstart),
            "systemd" => Ok(InitSystem::Systemd),
            _ => Err(Error::config_invalid_value(
                "init_system",
                Some(s.to_string()),
                format!("Unknown init system '{}'. Expected upstart or systemd", s),
            )),
        }
    }
}

impl fmt::Display for InitSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Web server that proxies requests to the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum WebProxy {
    #[default]
    Nginx,
    Apache2,
}

impl WebProxy {
    /// Server config directory, relative to the filesystem root.
    pub fn config_dir(&self) -> &'static str {
        match self {
            WebProxy::Nginx => "etc/nginx",
            WebProxy::Apache2 => "etc/apache2",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WebProxy::Nginx => "nginx",
            WebProxy::Apache2 => "apache2",
        }
    }
}

impl FromStr for WebProxy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "nginx" => Ok(WebProxy::Nginx),
            "apache2" => Ok(WebProxy::Apache2),
            _ => Err(Error::config_invalid_value(
                "web_proxy",
                Some(s.to_string()),
                format!("Unknown web proxy '{}'. Expected nginx or apache2", s),
            )),
        }
    }
}

impl fmt::Display for WebProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Application framework whose post-deploy steps run after the configs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FrameworkKind {
    #[default]
    None,
    Django,
}

/// SSH target for the deployment.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub struct ServerConfig {
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub user: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub identity_file: Option<String>,
}

impl ServerConfig {
    /// Names of required fields that are still blank.
    pub fn missing_fields(&self) -> Vec<String> {
        let mut missing = Vec::new();
        if self.host.trim().is_empty() {
            missing.push("host".to_string());
        }
        if self.user.trim().is_empty() {
            missing.push("user".to_string());
        }
        missing
    }
}

/// Per-project defaults for every context key.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DeploySettings {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub project: Option<String>,

    #[serde(default)]
    pub repo_url: Option<String>,

    #[serde(default = "default_base_dir")]
    pub base_dir: String,

    #[serde(default = "default_site_subdirs")]
    pub site_subdirs: Vec<String>,

    #[serde(default = "default_python")]
    pub python: String,

    #[serde(default)]
    pub uses_celeryd: bool,

    #[serde(default = "default_wsgi_conf")]
    pub wsgi_conf: String,

    #[serde(default = "default_pip_rfile")]
    pub pip_rfile: String,

    #[serde(default)]
    pub web_proxy: WebProxy,

    #[serde(default)]
    pub init_system: InitSystem,

    #[serde(default)]
    pub framework: FrameworkKind,

    /// Local settings template for the Django extension, relative to the
    /// settings file directory.
    #[serde(default = "default_settings_template")]
    pub settings_template: String,

    /// Extra context values (database names, passwords) available to steps.
    #[serde(default)]
    pub options: Options,
}

impl Default for DeploySettings {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            project: None,
            repo_url: None,
            base_dir: default_base_dir(),
            site_subdirs: default_site_subdirs(),
            python: default_python(),
            uses_celeryd: false,
            wsgi_conf: default_wsgi_conf(),
            pip_rfile: default_pip_rfile(),
            web_proxy: WebProxy::default(),
            init_system: InitSystem::default(),
            framework: FrameworkKind::default(),
            settings_template: default_settings_template(),
            options: Options::new(),
        }
    }
}

// =============================================================================
// Default value functions
// =============================================================================

fn default_port() -> u16 {
    22
}

fn default_base_dir() -> String {
    "/opt/webapps".to_string()
}

fn default_site_subdirs() -> Vec<String> {
    vec!["source".to_string(), "venv".to_string(), "public".to_string()]
}

fn default_python() -> String {
    "python3.5".to_string()
}

fn default_wsgi_conf() -> String {
    "uwsgi.ini".to_string()
}

fn default_pip_rfile() -> String {
    "requirements.txt".to_string()
}

fn default_settings_template() -> String {
    "templates/settings.py.tpl".to_string()
}

// =============================================================================
// Loading
// =============================================================================

/// Settings plus the directory local files are resolved against.
#[derive(Debug, Clone)]
pub struct LoadedSettings {
    pub settings: DeploySettings,
    pub base_dir: PathBuf,
}

impl LoadedSettings {
    /// Absolute path of the local Django settings template.
    pub fn settings_template_path(&self) -> PathBuf {
        let template = shellexpand::tilde(&self.settings.settings_template).to_string();
        let path = PathBuf::from(template);
        if path.is_absolute() {
            path
        } else {
            self.base_dir.join(path)
        }
    }
}

/// Parse settings from a JSON string.
pub fn from_str(content: &str, origin: &str) -> Result<DeploySettings> {
    serde_json::from_str(content).map_err(|e| Error::config_invalid_json(origin, e))
}

/// Load settings from an explicit path. The file must exist.
pub fn load(path: &Path) -> Result<LoadedSettings> {
    let content = fs::read_to_string(path).map_err(|e| {
        Error::internal_io(e.to_string(), Some(format!("read {}", path.display())))
    })?;
    let settings = from_str(&content, &path.display().to_string())?;

    Ok(LoadedSettings {
        settings,
        base_dir: parent_dir(path),
    })
}

/// Load settings from `path`, or from `webdeploy.json` in the working
/// directory when present, or fall back to defaults.
pub fn load_or_default(path: Option<&Path>) -> Result<LoadedSettings> {
    if let Some(path) = path {
        return load(path);
    }

    let cwd = std::env::current_dir()
        .map_err(|e| Error::internal_io(e.to_string(), Some("current dir".to_string())))?;
    let candidate = cwd.join(SETTINGS_FILE);
    if candidate.is_file() {
        return load(&candidate);
    }

    Ok(LoadedSettings {
        settings: DeploySettings::default(),
        base_dir: cwd,
    })
}

fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}
