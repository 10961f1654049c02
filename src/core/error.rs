use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ConfigInvalidRule,
    ConfigZeroLengthMatcher,
    ConfigDuplicateRuleId,
    ConfigInvalidJson,

    ValidationInvalidArgument,

    RulesNotIdempotent,

    FileReadFailed,
    FileWriteFailed,

    InternalIoError,
    InternalJsonError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ConfigInvalidRule => "config.invalid_rule",
            ErrorCode::ConfigZeroLengthMatcher => "config.zero_length_matcher",
            ErrorCode::ConfigDuplicateRuleId => "config.duplicate_rule_id",
            ErrorCode::ConfigInvalidJson => "config.invalid_json",

            ErrorCode::ValidationInvalidArgument => "validation.invalid_argument",

            ErrorCode::RulesNotIdempotent => "rules.not_idempotent",

            ErrorCode::FileReadFailed => "file.read_failed",
            ErrorCode::FileWriteFailed => "file.write_failed",

            ErrorCode::InternalIoError => "internal.io_error",
            ErrorCode::InternalJsonError => "internal.json_error",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hint {
    pub message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvalidRuleDetails {
    pub rule_id: String,
    pub problem: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateRuleIdDetails {
    pub rule_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvalidArgumentDetails {
    pub field: String,
    pub problem: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotIdempotentDetails {
    pub rule_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    pub sample: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileIoDetails {
    pub path: String,
    pub error: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InternalIoErrorDetails {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Error {
    pub code: ErrorCode,
    pub message: String,
    pub details: Value,
    pub hints: Vec<Hint>,
}

pub type Result<T> = std::result::Result<T, Error>;

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for Error {}

impl Error {
    pub fn new(code: ErrorCode, message: impl Into<String>, details: Value) -> Self {
        Self {
            code,
            message: message.into(),
            details,
            hints: Vec::new(),
        }
    }

    pub fn with_hint(mut self, message: impl Into<String>) -> Self {
        self.hints.push(Hint {
            message: message.into(),
        });
        self
    }

    pub fn config_invalid_rule(rule_id: impl Into<String>, problem: impl Into<String>) -> Self {
        let details = serde_json::to_value(InvalidRuleDetails {
            rule_id: rule_id.into(),
            problem: problem.into(),
        })
        .unwrap_or_else(|_| Value::Object(serde_json::Map::new()));
        Self::new(ErrorCode::ConfigInvalidRule, "Invalid rewrite rule", details)
    }

    pub fn config_zero_length_matcher(rule_id: impl Into<String>) -> Self {
        let rule_id = rule_id.into();
        let details = serde_json::to_value(InvalidRuleDetails {
            rule_id: rule_id.clone(),
            problem: "matcher can match a zero-length span".to_string(),
        })
        .unwrap_or_else(|_| Value::Object(serde_json::Map::new()));
        Self::new(
            ErrorCode::ConfigZeroLengthMatcher,
            format!("Rule '{}' can match an empty span", rule_id),
            details,
        )
        .with_hint("Anchor the pattern so every match consumes at least one character")
    }

    pub fn config_duplicate_rule_id(rule_id: impl Into<String>) -> Self {
        let rule_id = rule_id.into();
        let details = serde_json::to_value(DuplicateRuleIdDetails {
            rule_id: rule_id.clone(),
        })
        .unwrap_or_else(|_| Value::Object(serde_json::Map::new()));
        Self::new(
            ErrorCode::ConfigDuplicateRuleId,
            format!("Duplicate rule id '{}'", rule_id),
            details,
        )
    }

    pub fn config_invalid_json(error: impl Into<String>, path: Option<String>) -> Self {
        let details = serde_json::json!({
            "error": error.into(),
            "path": path,
        });
        Self::new(ErrorCode::ConfigInvalidJson, "Invalid rule set JSON", details)
    }

    pub fn validation_invalid_argument(
        field: impl Into<String>,
        problem: impl Into<String>,
    ) -> Self {
        let details = serde_json::to_value(InvalidArgumentDetails {
            field: field.into(),
            problem: problem.into(),
        })
        .unwrap_or_else(|_| Value::Object(serde_json::Map::new()));
        Self::new(
            ErrorCode::ValidationInvalidArgument,
            "Invalid argument",
            details,
        )
    }

    pub fn rules_not_idempotent(
        rule_id: impl Into<String>,
        file: Option<String>,
        sample: impl Into<String>,
    ) -> Self {
        let rule_id = rule_id.into();
        let details = serde_json::to_value(NotIdempotentDetails {
            rule_id: rule_id.clone(),
            file,
            sample: sample.into(),
        })
        .unwrap_or_else(|_| Value::Object(serde_json::Map::new()));
        Self::new(
            ErrorCode::RulesNotIdempotent,
            format!("Rule '{}' re-matches its own replacement", rule_id),
            details,
        )
        .with_hint("The canonical replacement must not be matched by the rule that produced it")
    }

    pub fn file_read_failed(path: impl Into<String>, error: impl Into<String>) -> Self {
        let details = serde_json::to_value(FileIoDetails {
            path: path.into(),
            error: error.into(),
        })
        .unwrap_or_else(|_| Value::Object(serde_json::Map::new()));
        Self::new(ErrorCode::FileReadFailed, "Failed to read file", details)
    }

    pub fn file_write_failed(path: impl Into<String>, error: impl Into<String>) -> Self {
        let details = serde_json::to_value(FileIoDetails {
            path: path.into(),
            error: error.into(),
        })
        .unwrap_or_else(|_| Value::Object(serde_json::Map::new()));
        Self::new(ErrorCode::FileWriteFailed, "Failed to write file", details)
    }

    pub fn internal_io(error: impl Into<String>, context: Option<String>) -> Self {
        let details = serde_json::to_value(InternalIoErrorDetails {
            error: error.into(),
            context,
        })
        .unwrap_or_else(|_| Value::Object(serde_json::Map::new()));
        Self::new(ErrorCode::InternalIoError, "I/O error", details)
    }

    pub fn internal_json(error: impl Into<String>, context: Option<String>) -> Self {
        let details = serde_json::json!({
            "error": error.into(),
            "context": context,
        });
        Self::new(ErrorCode::InternalJsonError, "JSON error", details)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_are_stable_strings() {
        assert_eq!(ErrorCode::ConfigInvalidRule.as_str(), "config.invalid_rule");
        assert_eq!(
            ErrorCode::RulesNotIdempotent.as_str(),
            "rules.not_idempotent"
        );
        assert_eq!(ErrorCode::FileReadFailed.as_str(), "file.read_failed");
    }

    #[test]
    fn with_hint_accumulates() {
        let err = Error::validation_invalid_argument("root", "not a directory")
            .with_hint("Pass a directory path");
        assert_eq!(err.hints.len(), 1);
        assert_eq!(err.hints[0].message, "Pass a directory path");
    }

    #[test]
    fn details_carry_rule_id() {
        let err = Error::config_duplicate_rule_id("null-check");
        assert_eq!(err.details["ruleId"], "null-check");
    }
}
