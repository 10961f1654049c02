//! Run reporting — deterministic fold of per-file results into one report.
//!
//! Pure construction: files sorted by path, matches already ordered by offset
//! from the engine. Rendering (text, tables) is the caller's concern; the
//! report itself serializes directly.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::engine::Rewrite;
use crate::error::Error;

/// Maximum excerpt length in report listings.
const EXCERPT_MAX: usize = 160;

/// One processed file, owned by the coordinator for the duration of a run.
#[derive(Debug, Clone)]
pub struct FileResult {
    /// Path relative to the run root.
    pub path: String,
    /// Line count of the content as read, before any rewriting.
    pub original_line_count: usize,
    pub rewrite: Rewrite,
    /// Whether a second pass over the rewritten content would be silent.
    pub converged: bool,
}

/// Helper for `skip_serializing_if` on zero-value usize fields.
fn is_zero(v: &usize) -> bool {
    *v == 0
}

/// Summary counts for the run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub files_scanned: usize,
    pub files_changed: usize,
    pub total_replacements: usize,
    #[serde(skip_serializing_if = "is_zero")]
    pub errors: usize,
}

/// One match as listed in the report.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchReport {
    pub line: usize,
    pub rule_id: String,
    pub original: String,
    pub replacement: String,
}

/// Per-file listing of applied (or would-be-applied) replacements.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileReport {
    pub path: String,
    pub original_line_count: usize,
    pub replacements: usize,
    pub matches: Vec<MatchReport>,
}

/// A file that failed to read or write.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileErrorReport {
    pub path: String,
    pub code: String,
    pub message: String,
}

/// Complete result of one run, read-only once built.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub dry_run: bool,
    pub summary: RunSummary,
    /// False when cross-rule chaining means another run would fire again.
    pub converged: bool,
    /// Replacement counts per rule id.
    pub per_rule: BTreeMap<String, usize>,
    /// Changed files, sorted by path.
    pub files: Vec<FileReport>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<FileErrorReport>,
    /// Whether changes were written to disk.
    pub applied: bool,
}

impl RunReport {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

fn excerpt(text: &str) -> String {
    let flat = text.replace('\n', "\\n");
    if flat.chars().count() <= EXCERPT_MAX {
        return flat;
    }
    let cut: String = flat.chars().take(EXCERPT_MAX).collect();
    format!("{}…", cut)
}

/// Fold per-file results and errors into the final report.
pub fn build(
    dry_run: bool,
    applied: bool,
    files_scanned: usize,
    mut results: Vec<FileResult>,
    mut errors: Vec<(String, Error)>,
) -> RunReport {
    results.sort_by(|a, b| a.path.cmp(&b.path));
    errors.sort_by(|a, b| a.0.cmp(&b.0));

    let mut per_rule: BTreeMap<String, usize> = BTreeMap::new();
    let mut files = Vec::new();
    let mut total_replacements = 0;
    let mut converged = true;

    for result in &results {
        if !result.rewrite.changed() {
            continue;
        }
        converged &= result.converged;
        total_replacements += result.rewrite.matches.len();

        let matches = result
            .rewrite
            .matches
            .iter()
            .map(|m| {
                *per_rule.entry(m.rule_id.clone()).or_insert(0) += 1;
                MatchReport {
                    line: m.line,
                    rule_id: m.rule_id.clone(),
                    original: excerpt(&m.original),
                    replacement: excerpt(&m.replacement),
                }
            })
            .collect::<Vec<_>>();

        files.push(FileReport {
            path: result.path.clone(),
            original_line_count: result.original_line_count,
            replacements: matches.len(),
            matches,
        });
    }

    let error_reports = errors
        .iter()
        .map(|(path, err)| FileErrorReport {
            path: path.clone(),
            code: err.code.as_str().to_string(),
            message: err.message.clone(),
        })
        .collect::<Vec<_>>();

    RunReport {
        dry_run,
        summary: RunSummary {
            files_scanned,
            files_changed: files.len(),
            total_replacements,
            errors: error_reports.len(),
        },
        converged,
        per_rule,
        files,
        errors: error_reports,
        applied,
    }
}
