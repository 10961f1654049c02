//! Rewrite engine — applies a rule set to one content buffer.
//!
//! Builds the output in a single left-to-right pass: verbatim copies between
//! match boundaries, replacement text for each match span. Text introduced by
//! one rule is never re-matched within the same pass; chained idioms converge
//! over repeated runs. A self-check distinguishes legal chaining from a rule
//! that re-matches its own replacement, which is never safe to apply.

use crate::error::{Error, Result};
use crate::rules::{Match, RuleSet};

/// Result of one pass over one content buffer.
#[derive(Debug, Clone)]
pub struct Rewrite {
    /// Content after all replacements, byte-identical to the input outside
    /// matched spans.
    pub new_content: String,
    /// The non-overlapping matches that were applied, ascending by start.
    pub matches: Vec<Match>,
}

impl Rewrite {
    pub fn changed(&self) -> bool {
        !self.matches.is_empty()
    }
}

/// Apply `rules` to `content` in one pass.
///
/// O(content length + matches): the output is spliced between successive
/// match boundaries, never re-scanned.
pub fn apply(content: &str, rules: &RuleSet) -> Rewrite {
    let matches = rules.find_all_matches(content);

    let mut out = String::with_capacity(content.len());
    let mut cursor = 0;
    for m in &matches {
        out.push_str(&content[cursor..m.start]);
        out.push_str(&m.replacement);
        cursor = m.end;
    }
    out.push_str(&content[cursor..]);

    Rewrite {
        new_content: out,
        matches,
    }
}

/// Spans in the output buffer that hold replacement text, with the id of the
/// rule that wrote each one.
fn replacement_spans(matches: &[Match]) -> Vec<(usize, usize, &str)> {
    let mut spans = Vec::with_capacity(matches.len());
    let mut delta: isize = 0;
    for m in matches {
        let out_start = (m.start as isize + delta) as usize;
        let out_end = out_start + m.replacement.len();
        spans.push((out_start, out_end, m.rule_id.as_str()));
        delta += m.replacement.len() as isize - (m.end - m.start) as isize;
    }
    spans
}

/// Run the pass a second time over `rewrite.new_content` and classify what
/// fires.
///
/// Returns `Ok(true)` when the second pass is silent (the buffer is fully
/// canonical), `Ok(false)` when it fires only through cross-rule chaining —
/// another run will make progress. Fails when a rule matches inside text it
/// itself substituted: that rule loops forever and must not be applied.
pub fn self_check(rewrite: &Rewrite, rules: &RuleSet) -> Result<bool> {
    if rewrite.matches.is_empty() {
        return Ok(true);
    }

    let second = rules.find_all_matches(&rewrite.new_content);
    if second.is_empty() {
        return Ok(true);
    }

    let spans = replacement_spans(&rewrite.matches);
    for m in &second {
        let self_hit = spans
            .iter()
            .any(|&(s, e, rule_id)| m.start < e && m.end > s && rule_id == m.rule_id);
        if self_hit {
            return Err(Error::rules_not_idempotent(
                &m.rule_id,
                None,
                m.original.clone(),
            ));
        }
    }

    Ok(false)
}
