use clap::{Parser, Subcommand};

mod commands;
mod output;
mod tty;

use commands::{rules, run};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "retrofit")]
#[command(version = VERSION)]
#[command(about = "Batch modernization of source-code idioms via structural rewrite rules")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan a tree and rewrite matched idioms (dry-run unless --write)
    Run(run::RunArgs),
    /// Inspect and validate rule sets
    Rules(rules::RulesArgs),
}

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();

    let (json_result, exit_code) = commands::run_json(cli.command);
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
