use retrofit::rules::{builtin, RuleSetConfig};

pub type CmdResult<T> = retrofit::Result<(T, i32)>;

pub mod rules;
pub mod run;

pub(crate) const DEFAULT_BUILTIN: &str = "csharp-null-checks";

/// Resolve the rule set configuration from `--rules` / `--builtin`.
///
/// A rule file and a builtin name are mutually exclusive; with neither, the
/// default builtin is used.
pub(crate) fn resolve_rule_config(
    rules_path: Option<&str>,
    builtin_name: Option<&str>,
) -> retrofit::Result<(String, RuleSetConfig)> {
    match (rules_path, builtin_name) {
        (Some(_), Some(_)) => Err(retrofit::Error::validation_invalid_argument(
            "rules",
            "--rules and --builtin are mutually exclusive",
        )),
        (Some(path), None) => {
            let expanded = shellexpand::tilde(path).to_string();
            let config = RuleSetConfig::load(std::path::Path::new(&expanded))?;
            Ok((expanded, config))
        }
        (None, name) => {
            let name = name.unwrap_or(DEFAULT_BUILTIN);
            Ok((format!("builtin:{}", name), builtin(name)?))
        }
    }
}

/// Dispatch a command to its handler and map result to JSON.
macro_rules! dispatch {
    ($args:expr, $module:ident) => {
        crate::output::map_cmd_result_to_json($module::run($args))
    };
}

pub(crate) fn run_json(command: crate::Commands) -> (retrofit::Result<serde_json::Value>, i32) {
    crate::tty::status("retrofit is working...");

    match command {
        crate::Commands::Run(args) => dispatch!(args, run),
        crate::Commands::Rules(args) => dispatch!(args, rules),
    }
}
