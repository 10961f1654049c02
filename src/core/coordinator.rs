//! Run coordinator — drives scanner and engine across a file tree.
//!
//! Files are independent units of work, processed by a bounded worker pool
//! over a shared index queue. Workers only compute; results flow over a
//! channel into the single collector that owns aggregation. Apply mode is
//! two-phase: every file is read and rewritten in memory first (including the
//! idempotence self-check), and only when the whole compute phase is clean of
//! fatal errors does the write phase start. A non-idempotent rule set
//! therefore aborts before any file is touched.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{mpsc, Arc};

use crate::engine;
use crate::error::{Error, Result};
use crate::report::{self, FileResult, RunReport};
use crate::rules::RuleSet;
use crate::scanner::{self, PathFilter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    DryRun,
    Apply,
}

/// Options for one run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub mode: RunMode,
    /// Upper bound on concurrent workers; clamped to at least 1.
    pub workers: usize,
    /// Cooperative cancellation: set to true to stop picking up new files.
    /// In-flight files finish; per-file atomicity is unaffected.
    pub cancel: Option<Arc<AtomicBool>>,
}

impl RunOptions {
    pub fn new(mode: RunMode) -> Self {
        Self {
            mode,
            workers: default_workers(),
            cancel: None,
        }
    }
}

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

/// A computed file result plus the absolute path needed for write-back.
struct Computed {
    abs_path: PathBuf,
    result: FileResult,
}

/// What one worker reports back for one file.
enum Outcome {
    Clean,
    Changed(Box<Computed>),
    ReadFailed(String, Error),
    /// Fatal: stops the run. Carries the per-file context.
    NotIdempotent(Error),
}

/// Run the rule set over all files under `root`.
///
/// Per-file read and write failures are recorded in the report and never
/// abort the run; configuration and idempotence failures do.
pub fn run(
    root: &Path,
    rules: &RuleSet,
    filter: &dyn PathFilter,
    options: &RunOptions,
) -> Result<RunReport> {
    let files: Vec<PathBuf> = scanner::scan(root, filter).collect();
    let files_scanned = files.len();
    log_status!("scan", "Found {} candidate files", files_scanned);

    let cancelled = options
        .cancel
        .clone()
        .unwrap_or_else(|| Arc::new(AtomicBool::new(false)));

    // Phase 1: compute all rewrites in memory. No filesystem mutation here.
    let (computed, mut errors) = compute_phase(root, rules, &files, options, &cancelled)?;

    // Phase 2: write-back, apply mode only. Serial on the collector thread;
    // each write is temp-file + atomic rename.
    let (results, applied) = write_back(computed, options.mode, &cancelled, &mut errors);

    let report = report::build(
        options.mode == RunMode::DryRun,
        applied,
        files_scanned,
        results,
        errors,
    );

    log_status!(
        "run",
        "{} files scanned, {} changed, {} replacements, {} errors",
        report.summary.files_scanned,
        report.summary.files_changed,
        report.summary.total_replacements,
        report.summary.errors
    );

    Ok(report)
}

/// Process every file through the engine on a bounded worker pool.
///
/// Returns the per-file computations and recoverable errors, or the first
/// fatal error. A fatal outcome flips the cancel flag so remaining workers
/// drain quickly.
fn compute_phase(
    root: &Path,
    rules: &RuleSet,
    files: &[PathBuf],
    options: &RunOptions,
    cancelled: &Arc<AtomicBool>,
) -> Result<(Vec<Computed>, Vec<(String, Error)>)> {
    let worker_count = options.workers.max(1).min(files.len().max(1));
    let next_index = AtomicUsize::new(0);
    let (tx, rx) = mpsc::channel::<Outcome>();

    let outcomes: Vec<Outcome> = std::thread::scope(|scope| {
        for _ in 0..worker_count {
            let tx = tx.clone();
            let next_index = &next_index;
            let cancelled = Arc::clone(cancelled);
            scope.spawn(move || loop {
                if cancelled.load(Ordering::Relaxed) {
                    break;
                }
                let idx = next_index.fetch_add(1, Ordering::Relaxed);
                let Some(path) = files.get(idx) else {
                    break;
                };
                let outcome = process_file(root, rules, path);
                if matches!(outcome, Outcome::NotIdempotent(_)) {
                    cancelled.store(true, Ordering::Relaxed);
                }
                if tx.send(outcome).is_err() {
                    break;
                }
            });
        }
        drop(tx);

        // Single ownership point: only this thread touches the accumulator.
        rx.iter().collect()
    });

    let mut computed = Vec::new();
    let mut errors = Vec::new();
    for outcome in outcomes {
        match outcome {
            Outcome::Clean => {}
            Outcome::Changed(item) => computed.push(*item),
            Outcome::ReadFailed(path, err) => errors.push((path, err)),
            Outcome::NotIdempotent(err) => return Err(err),
        }
    }

    // Deterministic write order regardless of worker interleaving.
    computed.sort_by(|a, b| a.result.path.cmp(&b.result.path));

    Ok((computed, errors))
}

/// Serial write-back of computed rewrites.
///
/// In apply mode each changed file is written atomically; write failures are
/// recorded and do not stop the remaining writes. Once the cancel flag is
/// set, changed-but-unwritten files are dropped from the results so the
/// report only counts what actually reached disk. Returns the surviving
/// results and whether anything was written.
fn write_back(
    computed: Vec<Computed>,
    mode: RunMode,
    cancelled: &AtomicBool,
    errors: &mut Vec<(String, Error)>,
) -> (Vec<FileResult>, bool) {
    let mut results = Vec::with_capacity(computed.len());
    let mut applied = false;

    for item in computed {
        if !(item.result.rewrite.changed() && mode == RunMode::Apply) {
            results.push(item.result);
            continue;
        }
        if cancelled.load(Ordering::Relaxed) {
            continue;
        }
        match crate::utils::io::write_file_atomic(
            &item.abs_path,
            &item.result.rewrite.new_content,
            "apply rewrite",
        ) {
            Ok(()) => {
                applied = true;
                log_status!(
                    "apply",
                    "{}: {} replacements",
                    item.result.path,
                    item.result.rewrite.matches.len()
                );
                results.push(item.result);
            }
            Err(err) => {
                let detail = err
                    .details
                    .get("error")
                    .and_then(|v| v.as_str())
                    .unwrap_or(&err.message)
                    .to_string();
                errors.push((
                    item.result.path.clone(),
                    Error::file_write_failed(&item.result.path, detail),
                ));
            }
        }
    }

    (results, applied)
}

fn process_file(root: &Path, rules: &RuleSet, path: &Path) -> Outcome {
    let relative = path
        .strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .to_string();

    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            return Outcome::ReadFailed(
                relative.clone(),
                Error::file_read_failed(&relative, e.to_string()),
            );
        }
    };

    let rewrite = engine::apply(&content, rules);
    if !rewrite.changed() {
        return Outcome::Clean;
    }

    let converged = match engine::self_check(&rewrite, rules) {
        Ok(converged) => converged,
        Err(err) => {
            // Attach the file so the report names where the rule looped.
            let mut err = err;
            if let Some(obj) = err.details.as_object_mut() {
                obj.insert("file".to_string(), serde_json::Value::String(relative));
            }
            return Outcome::NotIdempotent(err);
        }
    };

    Outcome::Changed(Box::new(Computed {
        abs_path: path.to_path_buf(),
        result: FileResult {
            path: relative,
            original_line_count: content.lines().count(),
            rewrite,
            converged,
        },
    }))
}

/// Validate that a rule set is safe to apply blindly.
///
/// Probes every rule's canonical replacement (capture references substituted
/// with a neutral identifier) against the full set: canonical output must
/// never be matched again, by the producing rule or any other. Used by
/// `rules validate` so misconfigured sets fail before any run.
pub fn validate_rules(rules: &RuleSet) -> Result<()> {
    if rules.is_empty() {
        return Err(Error::validation_invalid_argument(
            "rules",
            "Rule set contains no rules",
        ));
    }
    for rule in rules.rules() {
        let probe = rule.replacement_probe();
        if let Some(m) = rules.find_all_matches(&probe).first() {
            return Err(Error::rules_not_idempotent(&m.rule_id, None, probe.clone())
                .with_hint(format!(
                    "The replacement of rule '{}' is matched by rule '{}'",
                    rule.id, m.rule_id
                )));
        }
    }
    Ok(())
}
