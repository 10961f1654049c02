// Public modules
pub mod coordinator;
pub mod engine;
pub mod error;
pub mod report;
pub mod rules;
pub mod scanner;

// Re-export common types for convenience
pub use error::{Error, ErrorCode, Result};
pub use rules::{Match, RuleSet, RuleSpec};
