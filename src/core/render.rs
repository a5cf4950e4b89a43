//! Config rendering: copy a template into place on the server and fill in
//! its placeholders.
//!
//! Nothing here is transactional. A failure part-way through substitution
//! leaves a partially edited file behind.

use crate::config::{InitSystem, WebProxy};
use crate::context::DeployContext;
use crate::error::Result;
use crate::ssh::{Remote, SedEdit};
use crate::utils::shell;
use crate::utils::template::{self, TemplateVars};

/// Source template and target location for one rendered config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfPaths {
    pub source: String,
    pub target: String,
}

/// Substitute every placeholder in `path`, in place.
///
/// Base tokens are `<usr>`, `<host>`, `<site>` and `<project>`; `extra`
/// mappings are added after them (and replace a base token of the same
/// name). Matching is case-insensitive and covers every occurrence.
pub fn expand_template(
    remote: &dyn Remote,
    ctx: &DeployContext,
    path: &str,
    use_sudo: bool,
    extra: &[(&str, &str)],
) -> Result<()> {
    let base = [
        (TemplateVars::USER, ctx.user.as_str()),
        (TemplateVars::HOST, ctx.host.as_str()),
        (TemplateVars::SITE, ctx.site.as_str()),
        (TemplateVars::PROJECT, ctx.project.as_str()),
    ];

    for (before, after) in template::mappings(&base, extra) {
        let edit = SedEdit::new(before, after).flags("gi").sudo(use_sudo);
        remote.sed(path, &edit)?;
    }
    Ok(())
}

/// Replace `target` with a fresh copy of `source`, then expand it.
pub fn replace_conf(
    remote: &dyn Remote,
    ctx: &DeployContext,
    paths: &ConfPaths,
    extra: &[(&str, &str)],
) -> Result<()> {
    if remote.exists(&paths.target)? {
        remote.sudo(&format!("rm {}", shell::quote_path(&paths.target)))?;
    }

    remote.sudo(&format!(
        "cp {} {}",
        shell::quote_path(&paths.source),
        shell::quote_path(&paths.target)
    ))?;
    expand_template(remote, ctx, &paths.target, true, extra)
}

fn with_ext(name: &str, ext: &str) -> String {
    if name.ends_with(ext) {
        name.to_string()
    } else {
        format!("{}{}", name, ext)
    }
}

/// Init-system service definition paths.
///
/// Source lives under `<source_dir>/scripts/<init dir>/`, target under
/// `/<init dir>/`; both carry the init system's suffix exactly once.
pub fn init_conf_paths(
    source_dir: &str,
    init_system: InitSystem,
    source_name: &str,
    target_name: &str,
) -> ConfPaths {
    let dir = init_system.config_dir();
    let ext = init_system.file_ext();
    ConfPaths {
        source: format!("{}/scripts/{}/{}", source_dir, dir, with_ext(source_name, ext)),
        target: format!("/{}/{}", dir, with_ext(target_name, ext)),
    }
}

/// Web proxy site config paths, plus the `sites-enabled` directory the
/// site is linked into.
pub fn web_proxy_conf_paths(
    source_dir: &str,
    web_proxy: WebProxy,
    project: &str,
    site: &str,
) -> (ConfPaths, String) {
    let server_dir = web_proxy.config_dir();
    let available = format!("{}/sites-available", server_dir);
    let paths = ConfPaths {
        source: format!("{}/scripts/{}/{}", source_dir, available, project),
        target: format!("/{}/{}", available, site),
    };
    (paths, format!("/{}/sites-enabled", server_dir))
}

/// Celery daemon options file paths.
pub fn celeryd_options_paths(source_dir: &str, site: &str) -> ConfPaths {
    let dir = "etc/conf.d";
    ConfPaths {
        source: format!("{}/scripts/{}/celeryd", source_dir, dir),
        target: format!("/{}/celeryd-{}", dir, site),
    }
}
