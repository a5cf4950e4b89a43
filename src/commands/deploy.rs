use clap::Args;
use serde::Serialize;

use webdeploy::deploy::{self, DeployHelper};
use webdeploy::ssh::{DryRun, PlannedCommand, SshClient};

use super::{CmdResult, TargetArgs};

#[derive(Args)]
pub struct DeployArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Print the commands a deployment would run without touching the server
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Serialize)]
pub struct DeployOutput {
    pub command: String,
    pub project: String,
    pub site: String,
    pub site_dir: String,
    pub staging: bool,
    pub framework: String,
    pub dry_run: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub planned: Option<Vec<PlannedCommand>>,
}

pub fn run(args: DeployArgs, _global: &crate::commands::GlobalArgs) -> CmdResult<DeployOutput> {
    let loaded = args.target.load_settings()?;
    let request = args.target.request()?;
    let settings = &loaded.settings;
    let framework = deploy::framework_for(settings, loaded.settings_template_path());

    let missing = settings.server.missing_fields();
    if !missing.is_empty() {
        return Err(webdeploy::Error::ssh_server_invalid(missing));
    }

    if args.dry_run {
        let remote = DryRun::new(&settings.server.user, &settings.server.host)
            .with_local_dir(&loaded.base_dir);
        let helper = DeployHelper::with_framework(&remote, settings, &request, framework)?;
        helper.deploy()?;
        let output = deploy_output(&helper, true, Some(remote.planned()));
        return Ok((output, 0));
    }

    let remote = SshClient::from_server(&settings.server)?.with_local_dir(&loaded.base_dir);
    let helper = DeployHelper::with_framework(&remote, settings, &request, framework)?;
    helper.deploy()?;

    Ok((deploy_output(&helper, false, None), 0))
}

fn deploy_output(
    helper: &DeployHelper<'_>,
    dry_run: bool,
    planned: Option<Vec<PlannedCommand>>,
) -> DeployOutput {
    let ctx = helper.context();
    DeployOutput {
        command: "deploy.run".to_string(),
        project: ctx.project.clone(),
        site: ctx.site.clone(),
        site_dir: ctx.site_dir.clone(),
        staging: ctx.staging,
        framework: helper.framework_name().to_string(),
        dry_run,
        planned,
    }
}
