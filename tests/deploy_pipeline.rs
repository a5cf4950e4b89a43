mod support;

use support::{FakeRemote, COMMIT};
use webdeploy::config::{DeploySettings, InitSystem};
use webdeploy::context::{DeployContext, DeployRequest};
use webdeploy::deploy::{DeployHelper, Framework};
use webdeploy::ssh::{CommandKind, DryRun, Remote};
use webdeploy::{ErrorCode, Result};

fn blog_request(staging: &str) -> DeployRequest {
    DeployRequest::new("blog", staging, "git://x/blog.git")
}

fn assert_in_order(remote: &FakeRemote, fragments: &[&str]) {
    let mut last = None;
    for fragment in fragments {
        let position = remote
            .position(fragment)
            .unwrap_or_else(|| panic!("missing `{}` in {:#?}", fragment, remote.log()));
        if let Some(previous) = last {
            assert!(
                position > previous,
                "`{}` ran out of order in {:#?}",
                fragment,
                remote.log()
            );
        }
        last = Some(position);
    }
}

#[test]
fn construction_registers_site_directories() {
    let remote = FakeRemote::new();
    let helper = DeployHelper::new(&remote, &DeploySettings::default(), &blog_request("yes")).unwrap();
    let ctx = helper.context();

    assert_eq!(ctx.site, "blog-staging");
    assert_eq!(ctx.site_dir, "/opt/webapps/blog-staging");
    assert_eq!(ctx.dir("source_dir").unwrap(), "/opt/webapps/blog-staging/source");
    assert_eq!(ctx.dir("venv_dir").unwrap(), "/opt/webapps/blog-staging/venv");
    assert_eq!(ctx.dir("public_dir").unwrap(), "/opt/webapps/blog-staging/public");
    assert_eq!(ctx.user, "deploy");
    assert_eq!(ctx.host, "example.com");

    assert_eq!(
        remote.log(),
        vec![
            "run: mkdir -p '/opt/webapps/blog-staging/source'",
            "run: mkdir -p '/opt/webapps/blog-staging/venv'",
            "run: mkdir -p '/opt/webapps/blog-staging/public'",
        ]
    );
}

#[test]
fn construction_fails_before_any_remote_call_on_bad_config() {
    let remote = FakeRemote::new();
    let err = DeployHelper::new(
        &remote,
        &DeploySettings::default(),
        &DeployRequest::new("blog", "yes", ""),
    )
    .unwrap_err();

    assert_eq!(err.code, ErrorCode::ConfigMissingKey);
    assert_eq!(err.details["key"], "repo_url");
    assert!(remote.log().is_empty());

    let err = DeployHelper::new(&remote, &DeploySettings::default(), &blog_request("perhaps"))
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::ConfigInvalidValue);
    assert!(remote.log().is_empty());
}

#[test]
fn first_deploy_clones_and_creates_everything() {
    let remote = FakeRemote::new();
    let helper = DeployHelper::new(&remote, &DeploySettings::default(), &blog_request("no")).unwrap();
    helper.deploy().unwrap();

    let reset = format!(
        "run: cd '/opt/webapps/blog/source' && git reset --hard '{}'",
        COMMIT
    );
    assert_in_order(
        &remote,
        &[
            "exists: /opt/webapps/blog/source/.git",
            "run: git clone git://x/blog.git '/opt/webapps/blog/source'",
            "local: git log -n 1 --format=%H",
            &reset,
            "exists: /opt/webapps/blog/venv/bin/pip",
            "run: virtualenv --python=python3.5 '/opt/webapps/blog/venv'",
            "run: '/opt/webapps/blog/venv/bin/pip' install -r '/opt/webapps/blog/source/requirements.txt'",
            "sudo: sed s/<usr>/deploy/gi /opt/webapps/blog/source/scripts/uwsgi.ini",
            "exists: /etc/nginx/sites-available/blog",
            "sudo: cp '/opt/webapps/blog/source/scripts/etc/nginx/sites-available/blog' '/etc/nginx/sites-available/blog'",
            "sudo: sed s/<site>/blog/gi /etc/nginx/sites-available/blog",
            "exists: /etc/nginx/sites-enabled/blog",
            "sudo: cd '/etc/nginx/sites-enabled' && ln -s '/etc/nginx/sites-available/blog' 'blog'",
            "exists: /etc/systemd/system/blog.service",
            "sudo: cp '/opt/webapps/blog/source/scripts/etc/systemd/system/blog.service' '/etc/systemd/system/blog.service'",
            "sudo: sed s/<project>/blog/gi /etc/systemd/system/blog.service",
        ],
    );

    assert_eq!(remote.count("git fetch"), 0);
    assert_eq!(remote.count("rm "), 0);
    assert_eq!(remote.count("celery"), 0);
    // four tokens for each of wsgi, proxy, and init configs
    assert_eq!(remote.count(": sed "), 12);
}

#[test]
fn redeploy_fetches_and_replaces_existing_configs() {
    let remote = FakeRemote::with_existing(&[
        "/opt/webapps/blog/source/.git",
        "/opt/webapps/blog/venv/bin/pip",
        "/etc/nginx/sites-available/blog",
        "/etc/nginx/sites-enabled/blog",
        "/etc/systemd/system/blog.service",
    ]);
    let helper = DeployHelper::new(&remote, &DeploySettings::default(), &blog_request("no")).unwrap();
    helper.deploy().unwrap();

    assert_in_order(
        &remote,
        &[
            "run: cd '/opt/webapps/blog/source' && git fetch",
            "git reset --hard",
            "install -r",
            "sudo: rm '/etc/nginx/sites-available/blog'",
            "sudo: cp '/opt/webapps/blog/source/scripts/etc/nginx/sites-available/blog'",
            "sudo: rm '/etc/systemd/system/blog.service'",
            "sudo: cp '/opt/webapps/blog/source/scripts/etc/systemd/system/blog.service'",
        ],
    );
    assert_eq!(remote.count("git clone"), 0);
    assert_eq!(remote.count("virtualenv"), 0);
    assert_eq!(remote.count("ln -s"), 0);
}

#[test]
fn upstart_with_celery_uses_conf_files() {
    let remote = FakeRemote::new();
    let request = blog_request("yes")
        .option("init_system", "upstart")
        .option("uses_celeryd", "true")
        .option("web_proxy", "apache2");
    let helper = DeployHelper::new(&remote, &DeploySettings::default(), &request).unwrap();
    assert_eq!(helper.context().init_system, InitSystem::Upstart);
    helper.deploy().unwrap();

    assert_in_order(
        &remote,
        &[
            "sudo: cp '/opt/webapps/blog-staging/source/scripts/etc/apache2/sites-available/blog' '/etc/apache2/sites-available/blog-staging'",
            "sudo: cd '/etc/apache2/sites-enabled' && ln -s '/etc/apache2/sites-available/blog-staging' 'blog-staging'",
            "sudo: cp '/opt/webapps/blog-staging/source/scripts/etc/init/blog.conf' '/etc/init/blog-staging.conf'",
            "sudo: cp '/opt/webapps/blog-staging/source/scripts/etc/conf.d/celeryd' '/etc/conf.d/celeryd-blog-staging'",
            "sudo: cp '/opt/webapps/blog-staging/source/scripts/etc/init/celeryd.conf' '/etc/init/celery-blog-staging.conf'",
        ],
    );
    assert_eq!(remote.count("systemd"), 0);
    assert_eq!(remote.count("nginx"), 0);
}

#[test]
fn failing_command_aborts_the_run() {
    let remote = FakeRemote::new().failing_on("install -r");
    let helper = DeployHelper::new(&remote, &DeploySettings::default(), &blog_request("no")).unwrap();

    let err = helper.deploy().unwrap_err();
    assert_eq!(err.code, ErrorCode::RemoteCommandFailed);
    assert_eq!(err.details["stderr"], "simulated failure");
    assert_eq!(err.details["target"]["host"], "example.com");

    assert_eq!(remote.count("uwsgi.ini"), 0);
    assert_eq!(remote.count("sudo:"), 0);
}

#[test]
fn settings_defaults_flow_into_commands() {
    let remote = FakeRemote::new();
    let settings = DeploySettings {
        base_dir: "/srv".to_string(),
        python: "python3.11".to_string(),
        pip_rfile: "requirements/prod.txt".to_string(),
        wsgi_conf: "gunicorn.conf".to_string(),
        ..DeploySettings::default()
    };
    let helper = DeployHelper::new(&remote, &settings, &blog_request("no")).unwrap();
    helper.deploy().unwrap();

    assert!(remote.position("virtualenv --python=python3.11 '/srv/blog/venv'").is_some());
    assert!(remote
        .position("install -r '/srv/blog/source/requirements/prod.txt'")
        .is_some());
    assert!(remote
        .position("sed s/<host>/example.com/gi /srv/blog/source/scripts/gunicorn.conf")
        .is_some());
}

struct Hooks;

impl Framework for Hooks {
    fn name(&self) -> &'static str {
        "hooks"
    }

    fn extend_context(&self, ctx: &mut DeployContext) -> Result<()> {
        let logs = format!("{}/logs", ctx.site_dir);
        ctx.set_dir("logs_dir", logs);
        Ok(())
    }

    fn pre_deploy(&self, remote: &dyn Remote, _ctx: &DeployContext) -> Result<()> {
        remote.run("echo pre").map(|_| ())
    }

    fn post_deploy(&self, remote: &dyn Remote, ctx: &DeployContext) -> Result<()> {
        remote
            .run(&format!("echo post {}", ctx.dir("logs_dir")?))
            .map(|_| ())
    }
}

#[test]
fn framework_hooks_wrap_the_generic_steps() {
    let remote = FakeRemote::new();
    let helper = DeployHelper::with_framework(
        &remote,
        &DeploySettings::default(),
        &blog_request("no"),
        Box::new(Hooks),
    )
    .unwrap();
    assert_eq!(helper.framework_name(), "hooks");
    helper.deploy().unwrap();

    assert_in_order(
        &remote,
        &[
            "run: echo pre",
            "git clone",
            "install -r",
            "ln -s",
            "run: echo post /opt/webapps/blog/logs",
        ],
    );
}

#[test]
fn dry_run_plans_without_executing() {
    let remote = DryRun::new("deploy", "example.com");
    let helper = DeployHelper::new(&remote, &DeploySettings::default(), &blog_request("yes")).unwrap();
    assert_eq!(helper.context().site, "blog-staging");

    let planned = remote.planned();
    assert_eq!(planned.len(), 3);
    assert!(planned.iter().all(|p| p.kind == CommandKind::Run));
    assert_eq!(planned[0].command, "mkdir -p '/opt/webapps/blog-staging/source'");
}
