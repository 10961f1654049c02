use clap::{Args, Subcommand};
use serde::Serialize;

use retrofit::coordinator;
use retrofit::rules::RuleConfig;

use crate::commands::CmdResult;

#[derive(Args)]
pub struct RulesArgs {
    #[command(subcommand)]
    command: RulesCommand,
}

#[derive(Subcommand)]
enum RulesCommand {
    /// Show the resolved rule set
    List {
        /// Rule set JSON file (alternative to --builtin)
        #[arg(long)]
        rules: Option<String>,
        /// Builtin rule set name
        #[arg(long)]
        builtin: Option<String>,
    },
    /// Compile the rule set and check it is safe to apply
    Validate {
        /// Rule set JSON file (alternative to --builtin)
        #[arg(long)]
        rules: Option<String>,
        /// Builtin rule set name
        #[arg(long)]
        builtin: Option<String>,
    },
}

#[derive(Serialize)]
#[serde(tag = "command")]
pub enum RulesOutput {
    #[serde(rename = "rules.list")]
    List {
        source: String,
        extensions: Vec<String>,
        exclude_dirs: Vec<String>,
        rules: Vec<RuleConfig>,
    },
    #[serde(rename = "rules.validate")]
    Validate {
        source: String,
        rule_count: usize,
        valid: bool,
    },
}

pub fn run(args: RulesArgs) -> CmdResult<RulesOutput> {
    match args.command {
        RulesCommand::List { rules, builtin } => {
            let (source, config) =
                crate::commands::resolve_rule_config(rules.as_deref(), builtin.as_deref())?;
            // Compile to surface configuration errors even when just listing.
            config.compile()?;
            Ok((
                RulesOutput::List {
                    source,
                    extensions: config.extensions.clone(),
                    exclude_dirs: config.exclude_dirs.clone(),
                    rules: config.rules,
                },
                0,
            ))
        }
        RulesCommand::Validate { rules, builtin } => {
            let (source, config) =
                crate::commands::resolve_rule_config(rules.as_deref(), builtin.as_deref())?;
            let rule_set = config.compile()?;
            coordinator::validate_rules(&rule_set)?;
            Ok((
                RulesOutput::Validate {
                    source,
                    rule_count: rule_set.rules().len(),
                    valid: true,
                },
                0,
            ))
        }
    }
}
