//! Rewrite rules — idiom matchers paired with canonical replacement templates.
//!
//! A `RuleSpec` recognizes one textual idiom variant via a compiled regex with
//! named capture groups and maps it to a replacement built purely from those
//! captures. A `RuleSet` is an ordered collection of specs with a deterministic
//! overlap policy: all candidate matches are collected against the original
//! content, sorted by start offset, and resolved greedily so no two kept
//! matches intersect. Rule variants are data, not code paths — adding an idiom
//! variant means adding one spec.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

// ============================================================================
// Types
// ============================================================================

/// One rewrite rule: matcher + replacement generator.
#[derive(Debug, Clone)]
pub struct RuleSpec {
    /// Unique rule identifier (used in reports and per-rule counts).
    pub id: String,
    /// Compiled matcher with named capture groups.
    matcher: Regex,
    /// Replacement template; `${name}` refers to a named capture.
    replacement: String,
    /// Pairs of capture names whose matched text must be identical for the
    /// match to count. Stands in for back-references, which the regex engine
    /// does not support.
    require_equal: Vec<(String, String)>,
}

/// A single resolved match within one file's content.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Match {
    /// Id of the rule that produced this match.
    pub rule_id: String,
    /// Byte offset of the match start in the original content.
    pub start: usize,
    /// Byte offset one past the match end in the original content.
    pub end: usize,
    /// 1-based line number of the match start, counted in the original content.
    pub line: usize,
    /// Named captures, in name order.
    pub captures: BTreeMap<String, String>,
    /// The matched text.
    pub original: String,
    /// The text it will be replaced with.
    pub replacement: String,
}

/// Ordered collection of rules with first-registered-wins overlap policy.
#[derive(Debug, Clone)]
pub struct RuleSet {
    rules: Vec<RuleSpec>,
}

// ============================================================================
// RuleSpec
// ============================================================================

impl RuleSpec {
    /// Compile and validate one rule.
    ///
    /// Fails with a configuration error when the pattern does not compile,
    /// can match a zero-length span, or when the template or `require_equal`
    /// reference capture names the pattern does not define.
    pub fn new(
        id: &str,
        pattern: &str,
        replacement: &str,
        require_equal: Vec<(String, String)>,
    ) -> Result<Self> {
        let matcher = Regex::new(pattern)
            .map_err(|e| Error::config_invalid_rule(id, format!("invalid pattern: {}", e)))?;

        // A matcher that can match the empty string makes overlap resolution
        // and forward progress undefined.
        if matcher.find("").is_some() {
            return Err(Error::config_zero_length_matcher(id));
        }

        let names: HashSet<&str> = matcher.capture_names().flatten().collect();

        let template_names = template_capture_names(replacement)
            .map_err(|problem| Error::config_invalid_rule(id, problem))?;
        for name in template_names {
            if !names.contains(name.as_str()) {
                return Err(Error::config_invalid_rule(
                    id,
                    format!("template references unknown capture '{}'", name),
                ));
            }
        }

        for (a, b) in &require_equal {
            for name in [a, b] {
                if !names.contains(name.as_str()) {
                    return Err(Error::config_invalid_rule(
                        id,
                        format!("require_equal references unknown capture '{}'", name),
                    ));
                }
            }
        }

        Ok(Self {
            id: id.to_string(),
            matcher,
            replacement: replacement.to_string(),
            require_equal,
        })
    }

    /// The replacement template with every capture reference substituted by
    /// a neutral identifier.
    ///
    /// Canonical output never depends on which identifier was captured, so
    /// this probe is representative: if any rule matches it, that rule would
    /// also match real output of this rule.
    pub fn replacement_probe(&self) -> String {
        let mut out = Vec::with_capacity(self.replacement.len());
        let bytes = self.replacement.as_bytes();
        let mut i = 0;
        while i < bytes.len() {
            if bytes[i] == b'$' && i + 1 < bytes.len() {
                if bytes[i + 1] == b'$' {
                    out.push(b'$');
                    i += 2;
                    continue;
                }
                if bytes[i + 1] == b'{' {
                    if let Some(close) = self.replacement[i + 2..].find('}') {
                        out.extend_from_slice(b"placeholder");
                        i += close + 3;
                        continue;
                    }
                }
            }
            out.push(bytes[i]);
            i += 1;
        }
        String::from_utf8(out).unwrap_or_else(|_| self.replacement.clone())
    }

    /// Find all non-overlapping matches of this rule in `content`.
    ///
    /// Matches failing the capture-equality guard are silently skipped —
    /// an idiom naming two different identifiers is not this idiom.
    fn find_matches(&self, content: &str) -> Vec<Match> {
        let mut matches = Vec::new();

        for caps in self.matcher.captures_iter(content) {
            let Some(whole) = caps.get(0) else { continue };
            if whole.is_empty() {
                continue;
            }

            let agree = self.require_equal.iter().all(|(a, b)| {
                match (caps.name(a), caps.name(b)) {
                    (Some(left), Some(right)) => left.as_str() == right.as_str(),
                    _ => false,
                }
            });
            if !agree {
                continue;
            }

            let mut replacement = String::new();
            caps.expand(&self.replacement, &mut replacement);

            let mut captures = BTreeMap::new();
            for name in self.matcher.capture_names().flatten() {
                if let Some(m) = caps.name(name) {
                    captures.insert(name.to_string(), m.as_str().to_string());
                }
            }

            matches.push(Match {
                rule_id: self.id.clone(),
                start: whole.start(),
                end: whole.end(),
                line: line_number_at(content, whole.start()),
                captures,
                original: whole.as_str().to_string(),
                replacement,
            });
        }

        matches
    }
}

/// 1-based line number for a byte offset, counted in the original content.
pub(crate) fn line_number_at(content: &str, offset: usize) -> usize {
    content[..offset].matches('\n').count() + 1
}

/// Extract `${name}` capture references from a replacement template.
///
/// Only the braced form and the `$$` escape are accepted in rule
/// configuration. The expansion engine also honors unbraced `$name`
/// references, so anything else after `$` is rejected here — otherwise a
/// template could expand references that validation never saw.
fn template_capture_names(template: &str) -> std::result::Result<Vec<String>, String> {
    let mut names = Vec::new();
    let bytes = template.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != b'$' {
            i += 1;
            continue;
        }
        match bytes.get(i + 1) {
            Some(b'$') => i += 2,
            Some(b'{') => match template[i + 2..].find('}') {
                Some(close) => {
                    names.push(template[i + 2..i + 2 + close].to_string());
                    i += close + 3;
                }
                None => return Err("unclosed '${' in template".to_string()),
            },
            _ => {
                return Err(
                    "bare '$' in template; use '${name}' for a capture or '$$' for a literal dollar"
                        .to_string(),
                )
            }
        }
    }
    Ok(names)
}

// ============================================================================
// RuleSet
// ============================================================================

impl RuleSet {
    /// Build a rule set from compiled specs, enforcing unique ids.
    pub fn new(rules: Vec<RuleSpec>) -> Result<Self> {
        let mut seen = HashSet::new();
        for rule in &rules {
            if !seen.insert(rule.id.clone()) {
                return Err(Error::config_duplicate_rule_id(&rule.id));
            }
        }
        Ok(Self { rules })
    }

    pub fn rules(&self) -> &[RuleSpec] {
        &self.rules
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Find all matches across all rules against the original content,
    /// resolved to a single consistent non-overlapping set.
    ///
    /// Candidates from every rule are merged and sorted by start offset
    /// (registration order breaks ties), then walked greedily: a match is
    /// kept only if its span does not intersect any previously kept span.
    /// The rewritten buffer is therefore always built from one snapshot of
    /// the original content — a later rule never sees text an earlier rule
    /// introduced within the same pass.
    pub fn find_all_matches(&self, content: &str) -> Vec<Match> {
        let mut candidates: Vec<(usize, Match)> = Vec::new();
        for (idx, rule) in self.rules.iter().enumerate() {
            for m in rule.find_matches(content) {
                candidates.push((idx, m));
            }
        }

        candidates.sort_by(|(ia, a), (ib, b)| {
            a.start
                .cmp(&b.start)
                .then(ia.cmp(ib))
                .then(b.end.cmp(&a.end))
        });

        let mut kept: Vec<Match> = Vec::new();
        for (_, m) in candidates {
            let overlaps = kept
                .iter()
                .any(|k| m.start < k.end && m.end > k.start);
            if !overlaps {
                kept.push(m);
            }
        }

        kept.sort_by_key(|m| m.start);
        kept
    }
}

// ============================================================================
// Configuration
// ============================================================================

/// A rule as written in rule set configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RuleConfig {
    pub id: String,
    pub pattern: String,
    pub replacement: String,
    /// Capture-name pairs that must match identically for the rule to fire.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub require_equal: Vec<(String, String)>,
}

/// Full rule set configuration: the rules plus the default file predicate.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RuleSetConfig {
    /// File extensions to include (no leading dot).
    #[serde(default)]
    pub extensions: Vec<String>,
    /// Directory names pruned from traversal at any depth.
    #[serde(default)]
    pub exclude_dirs: Vec<String>,
    pub rules: Vec<RuleConfig>,
}

impl RuleSetConfig {
    /// Load a rule set configuration from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::config_invalid_json(e.to_string(), Some(path.display().to_string())))?;
        serde_json::from_str(&content)
            .map_err(|e| Error::config_invalid_json(e.to_string(), Some(path.display().to_string())))
    }

    /// Compile the configuration into a validated rule set.
    pub fn compile(&self) -> Result<RuleSet> {
        let mut rules = Vec::with_capacity(self.rules.len());
        for rc in &self.rules {
            rules.push(RuleSpec::new(
                &rc.id,
                &rc.pattern,
                &rc.replacement,
                rc.require_equal.clone(),
            )?);
        }
        RuleSet::new(rules)
    }
}

// ============================================================================
// Builtin rule sets
// ============================================================================

const THROW_IF_NULL: &str = "ArgumentNullException.ThrowIfNull(${param});";

pub const BUILTIN_NAMES: &[&str] = &["csharp-null-checks"];

/// Resolve a builtin rule set by name.
///
/// `csharp-null-checks` converges the classic C# guard-clause variants
/// (`== null` / `is null`, single-line, multi-line, braced, string parameter
/// name) onto `ArgumentNullException.ThrowIfNull(param);`. The `nameof` and
/// string-name variants carry a capture-equality guard so a guard clause
/// naming two different identifiers is left alone.
pub fn builtin(name: &str) -> Result<RuleSetConfig> {
    match name {
        "csharp-null-checks" => Ok(csharp_null_checks()),
        _ => Err(Error::validation_invalid_argument(
            "builtin",
            format!(
                "Unknown builtin rule set '{}'. Available: {}",
                name,
                BUILTIN_NAMES.join(", ")
            ),
        )),
    }
}

fn eq(a: &str, b: &str) -> (String, String) {
    (a.to_string(), b.to_string())
}

fn csharp_null_checks() -> RuleSetConfig {
    // Most specific variants first: the braced forms would otherwise be left
    // with a dangling block after a plain-form rewrite of their interior.
    let rules = vec![
        RuleConfig {
            id: "null-check-braced".to_string(),
            pattern: r#"(?i)if\s*\(\s*(?P<param>\w+)\s*==\s*null\s*\)\s*\{\s*throw\s+new\s+ArgumentNullException\s*\(\s*nameof\s*\(\s*(?P<name>\w+)\s*\)\s*\)\s*;\s*\}"#.to_string(),
            replacement: THROW_IF_NULL.to_string(),
            require_equal: vec![eq("param", "name")],
        },
        RuleConfig {
            id: "is-null-braced".to_string(),
            pattern: r#"(?i)if\s*\(\s*(?P<param>\w+)\s+is\s+null\s*\)\s*\{\s*throw\s+new\s+ArgumentNullException\s*\(\s*nameof\s*\(\s*(?P<name>\w+)\s*\)\s*\)\s*;\s*\}"#.to_string(),
            replacement: THROW_IF_NULL.to_string(),
            require_equal: vec![eq("param", "name")],
        },
        // `\s*` spans newlines, so these cover both the single-line and the
        // indented multi-line throw.
        RuleConfig {
            id: "null-check".to_string(),
            pattern: r#"(?i)if\s*\(\s*(?P<param>\w+)\s*==\s*null\s*\)\s*throw\s+new\s+ArgumentNullException\s*\(\s*nameof\s*\(\s*(?P<name>\w+)\s*\)\s*\)\s*;"#.to_string(),
            replacement: THROW_IF_NULL.to_string(),
            require_equal: vec![eq("param", "name")],
        },
        RuleConfig {
            id: "is-null".to_string(),
            pattern: r#"(?i)if\s*\(\s*(?P<param>\w+)\s+is\s+null\s*\)\s*throw\s+new\s+ArgumentNullException\s*\(\s*nameof\s*\(\s*(?P<name>\w+)\s*\)\s*\)\s*;"#.to_string(),
            replacement: THROW_IF_NULL.to_string(),
            require_equal: vec![eq("param", "name")],
        },
        RuleConfig {
            id: "null-check-string-name".to_string(),
            pattern: r#"(?i)if\s*\(\s*(?P<param>\w+)\s*==\s*null\s*\)\s*throw\s+new\s+ArgumentNullException\s*\(\s*"(?P<name>\w+)"\s*\)\s*;"#.to_string(),
            replacement: THROW_IF_NULL.to_string(),
            require_equal: vec![eq("param", "name")],
        },
    ];

    RuleSetConfig {
        extensions: vec!["cs".to_string()],
        exclude_dirs: [
            "bin",
            "obj",
            ".git",
            ".vs",
            "packages",
            "node_modules",
            "TestResults",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect(),
        rules,
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn csharp_rules() -> RuleSet {
        csharp_null_checks().compile().unwrap()
    }

    #[test]
    fn single_line_null_check_matches() {
        let rules = csharp_rules();
        let content = "if (foo == null) throw new ArgumentNullException(nameof(foo));";
        let matches = rules.find_all_matches(content);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].rule_id, "null-check");
        assert_eq!(
            matches[0].replacement,
            "ArgumentNullException.ThrowIfNull(foo);"
        );
        assert_eq!(matches[0].line, 1);
    }

    #[test]
    fn mismatched_identifiers_do_not_match() {
        let rules = csharp_rules();
        let content = "if (bar == null) throw new ArgumentNullException(nameof(baz));";
        assert!(rules.find_all_matches(content).is_empty());
    }

    #[test]
    fn already_modern_content_does_not_match() {
        let rules = csharp_rules();
        let content = "ArgumentNullException.ThrowIfNull(x);";
        assert!(rules.find_all_matches(content).is_empty());
    }

    #[test]
    fn multi_line_throw_matches() {
        let rules = csharp_rules();
        let content = "if (value == null)\n    throw new ArgumentNullException(nameof(value));";
        let matches = rules.find_all_matches(content);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].rule_id, "null-check");
    }

    #[test]
    fn braced_variant_wins_over_plain() {
        let rules = csharp_rules();
        let content =
            "if (x == null)\n{\n    throw new ArgumentNullException(nameof(x));\n}";
        let matches = rules.find_all_matches(content);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].rule_id, "null-check-braced");
        // The whole block is consumed, closing brace included.
        assert_eq!(matches[0].end, content.len());
    }

    #[test]
    fn is_null_variant_matches() {
        let rules = csharp_rules();
        let content = "if (conn is null) throw new ArgumentNullException(nameof(conn));";
        let matches = rules.find_all_matches(content);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].rule_id, "is-null");
    }

    #[test]
    fn string_name_variant_requires_agreement() {
        let rules = csharp_rules();
        let hit = r#"if (arg == null) throw new ArgumentNullException("arg");"#;
        let miss = r#"if (arg == null) throw new ArgumentNullException("other");"#;
        assert_eq!(rules.find_all_matches(hit).len(), 1);
        assert!(rules.find_all_matches(miss).is_empty());
    }

    #[test]
    fn matches_never_overlap() {
        let rules = csharp_rules();
        let content = "\
if (a == null) throw new ArgumentNullException(nameof(a));
if (b == null)
{
    throw new ArgumentNullException(nameof(b));
}
if (c is null) throw new ArgumentNullException(nameof(c));
";
        let matches = rules.find_all_matches(content);
        assert_eq!(matches.len(), 3);
        for pair in matches.windows(2) {
            assert!(pair[0].end <= pair[1].start);
        }
    }

    #[test]
    fn line_numbers_count_original_newlines() {
        let rules = csharp_rules();
        let content = "// header\n\nif (p == null) throw new ArgumentNullException(nameof(p));\n";
        let matches = rules.find_all_matches(content);
        assert_eq!(matches[0].line, 3);
    }

    #[test]
    fn zero_length_matcher_rejected() {
        let err = RuleSpec::new("empty", r"a*", "x", vec![]).unwrap_err();
        assert_eq!(err.code.as_str(), "config.zero_length_matcher");
    }

    #[test]
    fn invalid_pattern_rejected() {
        let err = RuleSpec::new("broken", r"(unclosed", "x", vec![]).unwrap_err();
        assert_eq!(err.code.as_str(), "config.invalid_rule");
    }

    #[test]
    fn template_with_unknown_capture_rejected() {
        let err = RuleSpec::new("bad-template", r"(?P<a>\w+)", "${missing}", vec![]).unwrap_err();
        assert_eq!(err.code.as_str(), "config.invalid_rule");
    }

    #[test]
    fn require_equal_with_unknown_capture_rejected() {
        let err = RuleSpec::new(
            "bad-guard",
            r"(?P<a>\w+)",
            "${a}",
            vec![eq("a", "nope")],
        )
        .unwrap_err();
        assert_eq!(err.code.as_str(), "config.invalid_rule");
    }

    #[test]
    fn duplicate_rule_ids_rejected() {
        let a = RuleSpec::new("dup", r"foo", "bar", vec![]).unwrap();
        let b = RuleSpec::new("dup", r"baz", "qux", vec![]).unwrap();
        let err = RuleSet::new(vec![a, b]).unwrap_err();
        assert_eq!(err.code.as_str(), "config.duplicate_rule_id");
    }

    #[test]
    fn earlier_rule_wins_at_same_start() {
        let first = RuleSpec::new("first", r"abc", "X", vec![]).unwrap();
        let second = RuleSpec::new("second", r"abcd", "Y", vec![]).unwrap();
        let rules = RuleSet::new(vec![first, second]).unwrap();
        let matches = rules.find_all_matches("abcd");
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].rule_id, "first");
    }

    #[test]
    fn earlier_start_wins_across_rules() {
        let narrow = RuleSpec::new("narrow", r"cd", "X", vec![]).unwrap();
        let wide = RuleSpec::new("wide", r"bcde", "Y", vec![]).unwrap();
        let rules = RuleSet::new(vec![narrow, wide]).unwrap();
        // wide starts earlier; narrow overlaps it and is dropped
        let matches = rules.find_all_matches("abcdef");
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].rule_id, "wide");
    }

    #[test]
    fn template_capture_names_parses_braced_refs() {
        assert_eq!(
            template_capture_names("A.ThrowIfNull(${param});").unwrap(),
            vec!["param".to_string()]
        );
        assert!(template_capture_names("literal $$ text").unwrap().is_empty());
    }

    #[test]
    fn unbraced_template_reference_rejected() {
        // Unbraced $name would expand (to nothing here) without ever being
        // checked against the pattern's capture names.
        let err =
            RuleSpec::new("unbraced", r"old_call\(\)", "new_call($missing)", vec![]).unwrap_err();
        assert_eq!(err.code.as_str(), "config.invalid_rule");
    }

    #[test]
    fn unclosed_template_brace_rejected() {
        let err = RuleSpec::new("unclosed", r"(?P<a>\w+)", "x${a", vec![]).unwrap_err();
        assert_eq!(err.code.as_str(), "config.invalid_rule");
    }

    #[test]
    fn replacement_probe_substitutes_captures() {
        let spec = RuleSpec::new(
            "probe",
            r"(?P<param>\w+) old",
            "modern(${param});",
            vec![],
        )
        .unwrap();
        assert_eq!(spec.replacement_probe(), "modern(placeholder);");

        let literal = RuleSpec::new("lit", r"x", "cost: $$5", vec![]).unwrap();
        assert_eq!(literal.replacement_probe(), "cost: $5");
    }

    #[test]
    fn config_round_trips_through_json() {
        let config = csharp_null_checks();
        let json = serde_json::to_string(&config).unwrap();
        let back: RuleSetConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.rules.len(), config.rules.len());
        assert_eq!(back.extensions, vec!["cs".to_string()]);
        back.compile().unwrap();
    }

    #[test]
    fn unknown_builtin_rejected() {
        let err = builtin("nope").unwrap_err();
        assert_eq!(err.code.as_str(), "validation.invalid_argument");
    }
}
