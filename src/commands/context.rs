use clap::Args;
use serde::Serialize;
use std::collections::BTreeMap;

use webdeploy::context::DeployContext;
use webdeploy::deploy::{self, DeployHelper};
use webdeploy::ssh::DryRun;

use super::{CmdResult, TargetArgs};

const REDACTED: &str = "********";

#[derive(Args)]
pub struct ContextArgs {
    #[command(flatten)]
    pub target: TargetArgs,
}

#[derive(Serialize)]
pub struct ContextOutput {
    pub command: String,
    pub framework: String,
    pub context: DeployContext,
}

/// Resolve the context a deployment would use. Nothing runs on the server.
pub fn run(args: ContextArgs, _global: &crate::commands::GlobalArgs) -> CmdResult<ContextOutput> {
    let loaded = args.target.load_settings()?;
    let request = args.target.request()?;
    let settings = &loaded.settings;

    let remote = DryRun::new(&settings.server.user, &settings.server.host);
    let framework = deploy::framework_for(settings, loaded.settings_template_path());
    let helper = DeployHelper::with_framework(&remote, settings, &request, framework)?;
    let framework = helper.framework_name().to_string();

    let mut context = helper.into_context();
    context.extras = redact(context.extras);

    Ok((
        ContextOutput {
            command: "context.show".to_string(),
            framework,
            context,
        },
        0,
    ))
}

fn is_sensitive(key: &str) -> bool {
    let key = key.to_lowercase();
    ["pwd", "password", "secret", "token"]
        .iter()
        .any(|marker| key.contains(marker))
}

fn redact(extras: BTreeMap<String, String>) -> BTreeMap<String, String> {
    extras
        .into_iter()
        .map(|(key, value)| {
            if is_sensitive(&key) {
                (key, REDACTED.to_string())
            } else {
                (key, value)
            }
        })
        .collect()
}
