use std::path::PathBuf;

use clap::Args;

use retrofit::coordinator::{self, RunMode, RunOptions};
use retrofit::report::RunReport;
use retrofit::scanner::ExtensionFilter;

use crate::commands::CmdResult;

#[derive(Args)]
pub struct RunArgs {
    /// Root directory to scan
    #[arg(long, default_value = ".")]
    root: String,

    /// Rule set JSON file (alternative to --builtin)
    #[arg(long)]
    rules: Option<String>,

    /// Builtin rule set name
    #[arg(long)]
    builtin: Option<String>,

    /// File extensions to include (overrides the rule set's defaults)
    #[arg(long = "ext", value_name = "EXT")]
    extensions: Vec<String>,

    /// Directory names to prune (overrides the rule set's defaults)
    #[arg(long = "exclude-dir", value_name = "NAME")]
    exclude_dirs: Vec<String>,

    /// Maximum concurrent workers
    #[arg(long)]
    workers: Option<usize>,

    /// Apply changes to disk (default is dry-run)
    #[arg(long)]
    write: bool,
}

pub fn run(args: RunArgs) -> CmdResult<RunReport> {
    let (_, config) = crate::commands::resolve_rule_config(
        args.rules.as_deref(),
        args.builtin.as_deref(),
    )?;
    let rule_set = config.compile()?;

    let root = PathBuf::from(shellexpand::tilde(&args.root).to_string());
    if !root.is_dir() {
        return Err(retrofit::Error::validation_invalid_argument(
            "root",
            format!("Not a directory: {}", root.display()),
        ));
    }

    let extensions = if args.extensions.is_empty() {
        config.extensions.clone()
    } else {
        args.extensions.clone()
    };
    let exclude_dirs = if args.exclude_dirs.is_empty() {
        config.exclude_dirs.clone()
    } else {
        args.exclude_dirs.clone()
    };
    let filter = ExtensionFilter::new(extensions, exclude_dirs);

    let mode = if args.write {
        RunMode::Apply
    } else {
        RunMode::DryRun
    };
    let mut options = RunOptions::new(mode);
    if let Some(workers) = args.workers {
        options.workers = workers;
    }

    let report = coordinator::run(&root, &rule_set, &filter, &options)?;

    let exit_code = if report.has_errors() { 1 } else { 0 };
    Ok((report, exit_code))
}
