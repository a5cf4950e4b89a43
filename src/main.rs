use clap::{Parser, Subcommand};

use commands::GlobalArgs;

mod commands;
mod output;

use commands::{context, deploy};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "webdeploy")]
#[command(version = VERSION)]
#[command(about = "Deploy web applications to remote servers over SSH")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full deployment pipeline
    Deploy(deploy::DeployArgs),
    /// Show the resolved deployment context without touching the server
    Context(context::ContextArgs),
}

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();
    let global = GlobalArgs {};

    let (json_result, exit_code) = commands::run_json(cli.command, &global);
    let _ = output::print_json_result(json_result);

    std::process::ExitCode::from(exit_code_to_u8(exit_code))
}

fn exit_code_to_u8(code: i32) -> u8 {
    if code <= 0 {
        0
    } else if code >= 255 {
        255
    } else {
        code as u8
    }
}
