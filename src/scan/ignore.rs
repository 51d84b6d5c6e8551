/*!
 * Ignore-rule engine: a parsed, ordered list of glob rules matched against
 * scan candidates with last-match-wins semantics.
 *
 * Grounded on `orbit::core::filter::{FilterRule, FilterList}` (glob
 * compilation via the `glob` crate, `thiserror`-derived error type),
 * generalized from that module's first-match-wins `evaluate` to the
 * last-match-wins policy this crate requires, and extended with
 * root-anchoring and `!`-negation borrowed from `.gitignore` grammar.
 */

use std::path::Path;

use glob::{MatchOptions, Pattern};

use crate::error::{Result, ScanError};

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: false,
    require_literal_separator: false,
    require_literal_leading_dot: false,
};

struct IgnoreRule {
    pattern: Pattern,
    /// `!`-prefixed: a match re-includes rather than excludes.
    negated: bool,
    /// Pattern began with `/`: only matches against the path relative to
    /// the scan root, never at arbitrary depth.
    root_anchored: bool,
    /// Pattern contains no `/` of its own: matched against the candidate's
    /// basename so it applies at any depth, mirroring `.gitignore`.
    basename_only: bool,
}

/// An ordered set of ignore rules evaluated last-match-wins.
///
/// The initial verdict for any candidate is "included"; each rule that
/// matches overwrites the verdict (negation inverts the action the rule
/// would otherwise apply) rather than short-circuiting on first match.
#[derive(Default)]
pub struct IgnoreRuleSet {
    rules: Vec<IgnoreRule>,
}

impl IgnoreRuleSet {
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    /// Parse one pattern per line. Blank lines and `#`-comments are skipped.
    /// `!pattern` negates (a match re-includes); a leading `/` anchors the
    /// pattern to the scan root instead of matching at any depth.
    pub fn from_lines<I, S>(lines: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = Self::new();
        for line in lines {
            let line = line.as_ref().trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            set.add_pattern(line)?;
        }
        Ok(set)
    }

    pub fn add_pattern(&mut self, raw: &str) -> Result<()> {
        let mut pattern = raw;
        let negated = if let Some(rest) = pattern.strip_prefix('!') {
            pattern = rest;
            true
        } else {
            false
        };

        let root_anchored = pattern.starts_with('/');
        if root_anchored {
            pattern = pattern.trim_start_matches('/');
        }

        let basename_only = !pattern.contains('/');

        let compiled = Pattern::new(pattern).map_err(|source| ScanError::InvalidGlob {
            pattern: pattern.to_string(),
            source,
        })?;

        self.rules.push(IgnoreRule {
            pattern: compiled,
            negated,
            root_anchored,
            basename_only,
        });
        Ok(())
    }

    /// `true` if `candidate` (absolute, or relative to `root`) should be
    /// ignored given the rules accumulated so far.
    pub fn is_ignored(&self, root: &Path, candidate: &Path) -> bool {
        let rel = candidate.strip_prefix(root).unwrap_or(candidate);
        let rel_str = normalize(rel);
        let basename = rel
            .file_name()
            .map(|n| n.to_string_lossy().replace('\\', "/"))
            .unwrap_or_default();

        let mut excluded = false;
        for rule in &self.rules {
            if rule.root_anchored && candidate.strip_prefix(root).is_err() {
                continue;
            }

            let subject = if rule.basename_only && !rule.root_anchored {
                basename.as_str()
            } else {
                rel_str.as_str()
            };

            if rule.pattern.matches_with(subject, MATCH_OPTIONS) {
                excluded = !rule.negated;
            }
        }
        excluded
    }
}

fn normalize(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}
