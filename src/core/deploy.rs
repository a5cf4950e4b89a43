//! The deployment pipeline.
//!
//! A helper owns one context and runs a fixed sequence of steps against a
//! [`Remote`]. Frameworks hook in before and after the generic steps.
//! Any error aborts the run; nothing is rolled back.

use std::path::PathBuf;

use crate::config::{DeploySettings, FrameworkKind};
use crate::context::{build_context, DeployContext, DeployRequest};
use crate::django::Django;
use crate::error::Result;
use crate::render::{self, ConfPaths};
use crate::ssh::Remote;
use crate::utils::shell;

/// Project-specific customization of the pipeline.
///
/// Every hook defaults to doing nothing.
pub trait Framework {
    fn name(&self) -> &'static str;

    /// Register framework paths once the site directories exist.
    fn extend_context(&self, _ctx: &mut DeployContext) -> Result<()> {
        Ok(())
    }

    fn pre_deploy(&self, _remote: &dyn Remote, _ctx: &DeployContext) -> Result<()> {
        Ok(())
    }

    fn post_deploy(&self, _remote: &dyn Remote, _ctx: &DeployContext) -> Result<()> {
        Ok(())
    }
}

/// Plain WSGI deployment with no framework steps.
pub struct Generic;

impl Framework for Generic {
    fn name(&self) -> &'static str {
        "none"
    }
}

/// Pick the framework extension named in the settings.
pub fn framework_for(settings: &DeploySettings, settings_template: PathBuf) -> Box<dyn Framework> {
    match settings.framework {
        FrameworkKind::None => Box::new(Generic),
        FrameworkKind::Django => Box::new(Django::new(settings_template)),
    }
}

pub struct DeployHelper<'r> {
    remote: &'r dyn Remote,
    framework: Box<dyn Framework>,
    ctx: DeployContext,
}

impl std::fmt::Debug for DeployHelper<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeployHelper")
            .field("framework", &self.framework.name())
            .field("ctx", &self.ctx)
            .finish()
    }
}

impl<'r> DeployHelper<'r> {
    /// Helper without framework steps.
    pub fn new(
        remote: &'r dyn Remote,
        settings: &DeploySettings,
        request: &DeployRequest,
    ) -> Result<Self> {
        Self::with_framework(remote, settings, request, Box::new(Generic))
    }

    /// Build the context, create the site subdirectories on the server,
    /// and let the framework register its paths.
    pub fn with_framework(
        remote: &'r dyn Remote,
        settings: &DeploySettings,
        request: &DeployRequest,
        framework: Box<dyn Framework>,
    ) -> Result<Self> {
        let ctx = build_context(settings, remote.user(), remote.host(), request)?;
        let mut helper = Self {
            remote,
            framework,
            ctx,
        };

        helper.make_subdirectories()?;
        helper.framework.extend_context(&mut helper.ctx)?;
        Ok(helper)
    }

    pub fn context(&self) -> &DeployContext {
        &self.ctx
    }

    pub fn into_context(self) -> DeployContext {
        self.ctx
    }

    pub fn framework_name(&self) -> &'static str {
        self.framework.name()
    }

    /// Run the full pipeline.
    pub fn deploy(&self) -> Result<()> {
        log_status!(
            "deploy",
            "Deploying {} to {}@{}",
            self.ctx.site,
            self.ctx.user,
            self.ctx.host
        );

        self.framework.pre_deploy(self.remote, &self.ctx)?;
        self.get_latest_source()?;
        self.update_virtualenv()?;
        self.update_configs()?;
        self.framework.post_deploy(self.remote, &self.ctx)?;

        log_status!("deploy", "Deployed {}", self.ctx.site);
        Ok(())
    }

    fn make_subdirectories(&mut self) -> Result<()> {
        for (key, path) in self.ctx.subdirectory_paths() {
            self.remote
                .run(&format!("mkdir -p {}", shell::quote_path(&path)))?;
            self.ctx.set_dir(key, path);
        }
        Ok(())
    }

    fn get_latest_source(&self) -> Result<()> {
        let source_dir = self.ctx.source_dir()?;
        let quoted_dir = shell::quote_path(source_dir);

        if self.remote.exists(&format!("{}/.git", source_dir))? {
            log_status!("deploy", "Fetching into {}", source_dir);
            self.remote.run(&format!("cd {} && git fetch", quoted_dir))?;
        } else {
            log_status!("deploy", "Cloning {} into {}", self.ctx.repo_url, source_dir);
            self.remote.run(&format!(
                "git clone {} {}",
                shell::quote_arg(&self.ctx.repo_url),
                quoted_dir
            ))?;
        }

        let commit = self.remote.local("git log -n 1 --format=%H")?;
        log_status!("deploy", "Resetting to {}", commit);
        self.remote.run(&format!(
            "cd {} && git reset --hard {}",
            quoted_dir,
            shell::quote_path(&commit)
        ))?;
        Ok(())
    }

    fn update_virtualenv(&self) -> Result<()> {
        let venv_dir = self.ctx.venv_dir()?;
        let source_dir = self.ctx.source_dir()?;

        if !self.remote.exists(&format!("{}/bin/pip", venv_dir))? {
            log_status!("deploy", "Creating virtualenv with {}", self.ctx.python);
            self.remote.run(&format!(
                "virtualenv --python={} {}",
                shell::quote_arg(&self.ctx.python),
                shell::quote_path(venv_dir)
            ))?;
        }

        log_status!("deploy", "Installing {}", self.ctx.pip_rfile);
        self.remote.run(&format!(
            "{} install -r {}",
            shell::quote_path(&format!("{}/bin/pip", venv_dir)),
            shell::quote_path(&format!("{}/{}", source_dir, self.ctx.pip_rfile))
        ))?;
        Ok(())
    }

    fn update_configs(&self) -> Result<()> {
        self.update_wsgi_server_conf()?;
        self.update_web_proxy_conf()?;
        self.update_project_init_config()?;
        if self.ctx.uses_celeryd {
            self.update_celeryd_config()?;
        }
        Ok(())
    }

    fn update_wsgi_server_conf(&self) -> Result<()> {
        let path = format!("{}/scripts/{}", self.ctx.source_dir()?, self.ctx.wsgi_conf);
        log_status!("deploy", "Expanding {}", path);
        render::expand_template(self.remote, &self.ctx, &path, true, &[])
    }

    fn update_web_proxy_conf(&self) -> Result<()> {
        let (paths, enabled_dir) = render::web_proxy_conf_paths(
            self.ctx.source_dir()?,
            self.ctx.web_proxy,
            &self.ctx.project,
            &self.ctx.site,
        );
        self.replace_conf(&paths)?;

        let linked_conf = format!("{}/{}", enabled_dir, self.ctx.site);
        if !self.remote.exists(&linked_conf)? {
            self.remote.sudo(&format!(
                "cd {} && ln -s {} {}",
                shell::quote_path(&enabled_dir),
                shell::quote_path(&paths.target),
                shell::quote_path(&self.ctx.site)
            ))?;
        }
        Ok(())
    }

    fn update_project_init_config(&self) -> Result<()> {
        self.update_init_config(&self.ctx.project, &self.ctx.site)
    }

    fn update_celeryd_config(&self) -> Result<()> {
        let paths = render::celeryd_options_paths(self.ctx.source_dir()?, &self.ctx.site);
        self.replace_conf(&paths)?;
        self.update_init_config("celeryd", &format!("celery-{}", self.ctx.site))
    }

    fn update_init_config(&self, source_name: &str, target_name: &str) -> Result<()> {
        let paths = render::init_conf_paths(
            self.ctx.source_dir()?,
            self.ctx.init_system,
            source_name,
            target_name,
        );
        self.replace_conf(&paths)
    }

    fn replace_conf(&self, paths: &ConfPaths) -> Result<()> {
        log_status!("deploy", "Installing {}", paths.target);
        render::replace_conf(self.remote, &self.ctx, paths, &[])
    }
}
