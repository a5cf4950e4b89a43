//! Django post-deploy steps.
//!
//! Registers `project_dir` and `settings_dir`, turns `DEBUG` off in the
//! base settings, generates `settings.py` on first deploy, and runs
//! `collectstatic` and `migrate` inside the deployed virtualenv.

use std::path::PathBuf;

use crate::context::DeployContext;
use crate::deploy::Framework;
use crate::error::Result;
use crate::secret::{generate_secret, DEFAULT_SECRET_LENGTH};
use crate::ssh::{Remote, SedEdit};
use crate::utils::shell;

/// Database names get this suffix on staging deployments.
pub const STAGING_DB_SUFFIX: &str = "_st";

/// Mode of the uploaded settings file.
const SETTINGS_FILE_MODE: u32 = 0o755;

pub struct Django {
    settings_template: PathBuf,
}

/// Database values written into a generated settings file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseSettings {
    pub db_name: String,
    pub db_password: String,
    pub mongo_name: String,
    pub mongo_password: String,
}

impl DatabaseSettings {
    /// Resolve names and passwords from the context.
    ///
    /// `db_name` and `db_pwd` are required. Mongo values default to the
    /// relational ones. On staging both names end in `_st`, never twice.
    pub fn from_context(ctx: &DeployContext) -> Result<Self> {
        let mut db_name = ctx.require_extra("db_name")?.to_string();
        let db_password = ctx.require_extra("db_pwd")?.to_string();
        if ctx.staging {
            db_name.push_str(STAGING_DB_SUFFIX);
        }

        let mut mongo_name = ctx
            .extra("mdb_name")
            .map(str::to_string)
            .unwrap_or_else(|| db_name.clone());
        if ctx.staging && !mongo_name.ends_with(STAGING_DB_SUFFIX) {
            mongo_name.push_str(STAGING_DB_SUFFIX);
        }
        let mongo_password = ctx
            .extra("mdb_pwd")
            .map(str::to_string)
            .unwrap_or_else(|| db_password.clone());

        Ok(Self {
            db_name,
            db_password,
            mongo_name,
            mongo_password,
        })
    }
}

impl Django {
    pub fn new(settings_template: impl Into<PathBuf>) -> Self {
        Self {
            settings_template: settings_template.into(),
        }
    }

    fn update_settings_base(&self, remote: &dyn Remote, ctx: &DeployContext) -> Result<()> {
        let path = format!("{}/settings_base.py", ctx.dir("settings_dir")?);
        remote.sed(&path, &SedEdit::new("DEBUG =.+$", "DEBUG = False"))
    }

    fn create_settings_file(&self, remote: &dyn Remote, ctx: &DeployContext) -> Result<()> {
        let path = format!("{}/settings.py", ctx.dir("settings_dir")?);
        if remote.exists(&path)? {
            return Ok(());
        }

        let database = DatabaseSettings::from_context(ctx)?;

        log_status!("django", "Uploading settings template to {}", path);
        remote.upload(&self.settings_template, &path, Some(SETTINGS_FILE_MODE))?;

        let secret_key = generate_secret(DEFAULT_SECRET_LENGTH);
        let edits = [
            ("SECRET_KEY =.+$", format!("SECRET_KEY = \"{}\"", secret_key)),
            ("ALLOWED_HOSTS =.+$", format!("ALLOWED_HOSTS = [\"{}\"]", ctx.host)),
            ("_DBNAME_.+$", format!("\"NAME\": \"{}\",", database.db_name)),
            ("_DBUSR_.+$", format!("\"USER\": \"{}\",", ctx.user)),
            ("_DBPWD_.+$", format!("\"PASSWORD\": \"{}\",", database.db_password)),
            ("^_MONGODB_NAME =.+$", format!("_MONGODB_NAME = \"{}\"", database.mongo_name)),
            ("^_MONGODB_USR =.+$", format!("_MONGODB_USR = \"{}\"", ctx.user)),
            ("^_MONGODB_PWD =.+$", format!("_MONGODB_PWD = \"{}\"", database.mongo_password)),
        ];

        for (before, after) in edits {
            remote.sed(&path, &SedEdit::new(before, after))?;
        }
        Ok(())
    }

    fn execute_management_commands(&self, remote: &dyn Remote, ctx: &DeployContext) -> Result<()> {
        let bin_dir = shell::quote_path(&format!("{}/bin/", ctx.venv_dir()?));
        let manage = shell::quote_path(&format!("{}/manage.py", ctx.dir("project_dir")?));

        for command in ["collectstatic", "migrate"] {
            log_status!("django", "Running manage.py {}", command);
            remote.run(&format!(
                "cd {} && ./python {} {} --noinput",
                bin_dir, manage, command
            ))?;
        }
        Ok(())
    }
}

impl Framework for Django {
    fn name(&self) -> &'static str {
        "django"
    }

    fn extend_context(&self, ctx: &mut DeployContext) -> Result<()> {
        let project_dir = format!("{}/{}", ctx.source_dir()?, ctx.project);
        let settings_dir = format!("{}/{}", project_dir, ctx.project);
        ctx.set_dir("project_dir", project_dir);
        ctx.set_dir("settings_dir", settings_dir);
        Ok(())
    }

    fn post_deploy(&self, remote: &dyn Remote, ctx: &DeployContext) -> Result<()> {
        self.update_settings_base(remote, ctx)?;
        self.create_settings_file(remote, ctx)?;
        self.execute_management_commands(remote, ctx)
    }
}
