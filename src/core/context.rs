//! Deployment context: every value a step may interpolate into a command.
//!
//! Built once per helper from three layers, highest precedence first:
//! caller options, project settings, built-in defaults. Lookup is explicit
//! per key; options the schema does not know are kept as extras.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::config::{DeploySettings, InitSystem, Options, WebProxy};
use crate::error::{Error, Result};
use crate::utils::validation::{parse_bool, require_non_empty_vec, require_setting};

/// Suffix appended to the site name for staging deployments.
pub const STAGING_SUFFIX: &str = "-staging";

/// Keys computed by the builder that callers may not override.
const DERIVED_KEYS: &[&str] = &["user", "host", "staging", "site", "site_dir"];

/// Constructor inputs for a deployment.
#[derive(Debug, Clone, Default)]
pub struct DeployRequest {
    pub project: String,
    /// Boolean-like string (`yes`, `0`, `true`...).
    pub staging: String,
    pub repo_url: String,
    pub options: Options,
}

impl DeployRequest {
    pub fn new(
        project: impl Into<String>,
        staging: impl Into<String>,
        repo_url: impl Into<String>,
    ) -> Self {
        Self {
            project: project.into(),
            staging: staging.into(),
            repo_url: repo_url.into(),
            options: Options::new(),
        }
    }

    pub fn option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DeployContext {
    pub user: String,
    pub host: String,
    pub project: String,
    pub repo_url: String,
    pub base_dir: String,
    pub site_subdirs: Vec<String>,
    pub python: String,
    pub uses_celeryd: bool,
    pub wsgi_conf: String,
    pub pip_rfile: String,
    pub web_proxy: WebProxy,
    pub init_system: InitSystem,
    pub staging: bool,
    pub site: String,
    pub site_dir: String,
    /// Registered directories keyed `<name>_dir`.
    pub dirs: BTreeMap<String, String>,
    pub extras: BTreeMap<String, String>,
}

impl DeployContext {
    /// A registered directory, e.g. `source_dir`.
    pub fn dir(&self, key: &str) -> Result<&str> {
        self.dirs
            .get(key)
            .map(String::as_str)
            .ok_or_else(|| Error::config_missing_key(key, None))
    }

    pub fn set_dir(&mut self, key: impl Into<String>, path: impl Into<String>) {
        self.dirs.insert(key.into(), path.into());
    }

    pub fn source_dir(&self) -> Result<&str> {
        self.dir("source_dir")
    }

    pub fn venv_dir(&self) -> Result<&str> {
        self.dir("venv_dir")
    }

    pub fn extra(&self, key: &str) -> Option<&str> {
        self.extras
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
    }

    /// An extra that a step cannot do without.
    pub fn require_extra(&self, key: &str) -> Result<&str> {
        self.extra(key)
            .ok_or_else(|| Error::config_missing_key(key, None))
    }

    /// `(key, path)` for each configured site subdirectory.
    ///
    /// Spaces in names become underscores; the path is `site_dir/<name>`.
    pub fn subdirectory_paths(&self) -> Vec<(String, String)> {
        self.site_subdirs
            .iter()
            .map(|subdir| {
                let name = subdir.trim().replace(' ', "_");
                (
                    format!("{}_dir", name),
                    format!("{}/{}", self.site_dir, name),
                )
            })
            .collect()
    }
}

/// Caller options, consumed key by key as the schema is resolved.
struct OptionSource {
    options: Options,
}

impl OptionSource {
    /// Remove and return a non-empty option.
    fn take(&mut self, key: &str) -> Option<String> {
        self.options
            .remove(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn take_or(&mut self, key: &str, default: &str) -> String {
        self.take(key).unwrap_or_else(|| default.to_string())
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Resolve settings and caller options into a context.
///
/// Pure: computes the site identity but registers no directories.
pub fn build_context(
    settings: &DeploySettings,
    user: &str,
    host: &str,
    request: &DeployRequest,
) -> Result<DeployContext> {
    let staging = parse_bool("staging", &request.staging)?;

    let mut source = OptionSource {
        options: request.options.clone(),
    };

    for key in DERIVED_KEYS {
        if source.options.contains_key(*key) {
            return Err(Error::config_invalid_value(
                *key,
                source.options.get(*key).cloned(),
                format!("`{}` is derived and cannot be set as an option", key),
            ));
        }
    }

    let project_option = source.take("project");
    let project = require_setting(
        Some(request.project.as_str())
            .filter(|p| !p.trim().is_empty())
            .or(project_option.as_deref())
            .or(settings.project.as_deref()),
        "project",
    )?
    .to_string();

    let repo_option = source.take("repo_url");
    let repo_url = require_setting(
        Some(request.repo_url.as_str())
            .filter(|r| !r.trim().is_empty())
            .or(repo_option.as_deref())
            .or(settings.repo_url.as_deref()),
        "repo_url",
    )?
    .to_string();

    let base_dir = source.take_or("base_dir", &settings.base_dir);
    let base_dir = require_setting(Some(base_dir.as_str()), "base_dir")?
        .trim_end_matches('/')
        .to_string();

    let site_subdirs = source
        .take("site_subdirs")
        .map(|v| split_list(&v))
        .unwrap_or_else(|| settings.site_subdirs.clone());
    require_non_empty_vec(&site_subdirs, "site_subdirs")?;

    let uses_celeryd = match source.take("uses_celeryd") {
        Some(v) => parse_bool("uses_celeryd", &v)?,
        None => settings.uses_celeryd,
    };
    let web_proxy = match source.take("web_proxy") {
        Some(v) => v.parse()?,
        None => settings.web_proxy,
    };
    let init_system = match source.take("init_system") {
        Some(v) => v.parse()?,
        None => settings.init_system,
    };

    let python = source.take_or("python", &settings.python);
    let wsgi_conf = source.take_or("wsgi_conf", &settings.wsgi_conf);
    let pip_rfile = source.take_or("pip_rfile", &settings.pip_rfile);

    let mut extras = settings.options.clone();
    extras.extend(source.options);

    let site = if staging {
        format!("{}{}", project, STAGING_SUFFIX)
    } else {
        project.clone()
    };
    let site_dir = format!("{}/{}", base_dir, site);

    Ok(DeployContext {
        user: user.to_string(),
        host: host.to_string(),
        project,
        repo_url,
        base_dir,
        site_subdirs,
        python,
        uses_celeryd,
        wsgi_conf,
        pip_rfile,
        web_proxy,
        init_system,
        staging,
        site,
        site_dir,
        dirs: BTreeMap::new(),
        extras,
    })
}
