// Lexicon Matcher
//
// Concept: Score free text against a keyword-to-code table
// Used twice: once with the industry table, once with the region table
//
// Algorithm:
// 1. Normalize text (trim, lower-case)
// 2. For each code, find every keyword occurring as a substring
// 3. Score = mean of per-keyword weights (primary = base, secondary = base × 0.8)
// 4. Pick highest score; ties → more matched keywords → lower code
// 5. No match anywhere → caller-supplied default
//
// Tables are data assets (TOML); the matcher never hard-codes their content.

use fid_common::{Error, Result};
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

/// Weight multiplier for secondary keywords relative to primary ones
pub const SECONDARY_DISCOUNT: f64 = 0.8;

/// Scores closer than this are treated as tied
const SCORE_EPSILON: f64 = 1e-9;

const BUILTIN_INDUSTRY: &str = include_str!("../../data/industry_lexicon.toml");
const BUILTIN_REGION: &str = include_str!("../../data/region_lexicon.toml");

/// Keywords and base confidence for one classification code
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LexiconEntry {
    #[serde(default)]
    pub label: Option<String>,
    pub base_confidence: f64,
    #[serde(default)]
    pub primary: Vec<String>,
    #[serde(default)]
    pub secondary: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct LexiconFile {
    codes: BTreeMap<String, LexiconEntry>,
}

/// Read-only keyword table, shareable across threads without locking
///
/// Codes are kept ordered so the scan (and therefore the tie-break) is
/// deterministic.
#[derive(Debug, Clone, PartialEq)]
pub struct LexiconTable {
    entries: BTreeMap<String, LexiconEntry>,
}

/// Matcher output
#[derive(Debug, Clone, PartialEq)]
pub struct LexiconMatch {
    pub code: String,
    pub confidence: f64,
    pub matched_keywords: Vec<String>,
}

impl LexiconMatch {
    /// False when the caller's default was returned
    pub fn is_match(&self) -> bool {
        !self.matched_keywords.is_empty()
    }
}

impl LexiconTable {
    /// Build from entries, normalizing keywords and validating codes
    pub fn new(
        entries: BTreeMap<String, LexiconEntry>,
        code_is_valid: fn(&str) -> bool,
    ) -> Result<Self> {
        let mut normalized = BTreeMap::new();

        for (code, entry) in entries {
            if !code_is_valid(&code) {
                return Err(Error::Config(format!("lexicon code '{}' is not valid", code)));
            }
            if !(0.0..=1.0).contains(&entry.base_confidence) {
                return Err(Error::Config(format!(
                    "lexicon code '{}': base_confidence {} outside [0, 1]",
                    code, entry.base_confidence
                )));
            }

            // A keyword listed as both primary and secondary counts as primary
            let mut seen = HashSet::new();
            let primary = normalize_keywords(entry.primary, &mut seen);
            let secondary = normalize_keywords(entry.secondary, &mut seen);

            if primary.is_empty() && secondary.is_empty() {
                return Err(Error::Config(format!("lexicon code '{}' has no keywords", code)));
            }

            normalized.insert(
                code,
                LexiconEntry {
                    label: entry.label,
                    base_confidence: entry.base_confidence,
                    primary,
                    secondary,
                },
            );
        }

        Ok(Self { entries: normalized })
    }

    /// Parse a TOML lexicon (`[codes."<code>"]` tables)
    pub fn from_toml_str(content: &str, code_is_valid: fn(&str) -> bool) -> Result<Self> {
        let file: LexiconFile =
            toml::from_str(content).map_err(|e| Error::Config(format!("lexicon: {}", e)))?;
        Self::new(file.codes, code_is_valid)
    }

    /// Load a TOML lexicon from disk
    pub fn from_file(path: &Path, code_is_valid: fn(&str) -> bool) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content, code_is_valid)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }

    /// Built-in industry table (3-digit codes)
    pub fn builtin_industry() -> Result<Self> {
        Self::from_toml_str(BUILTIN_INDUSTRY, fid_common::identifier::is_industry_code)
    }

    /// Built-in region table (2-letter codes)
    pub fn builtin_region() -> Result<Self> {
        Self::from_toml_str(BUILTIN_REGION, fid_common::identifier::is_region_code)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains_code(&self, code: &str) -> bool {
        self.entries.contains_key(code)
    }

    pub fn label(&self, code: &str) -> Option<&str> {
        self.entries.get(code).and_then(|e| e.label.as_deref())
    }

    /// Score `text` and return the best code, or the default when nothing matches
    pub fn match_text(&self, text: &str, default_code: &str, default_confidence: f64) -> LexiconMatch {
        let normalized = text.trim().to_lowercase();

        let mut best: Option<LexiconMatch> = None;

        if !normalized.is_empty() {
            for (code, entry) in &self.entries {
                let mut matched = Vec::new();

                for keyword in &entry.primary {
                    if normalized.contains(keyword.as_str()) {
                        matched.push(keyword.clone());
                    }
                }
                let primary_hits = matched.len();
                for keyword in &entry.secondary {
                    if normalized.contains(keyword.as_str()) {
                        matched.push(keyword.clone());
                    }
                }

                if matched.is_empty() {
                    continue;
                }

                let score = mean_score(entry.base_confidence, primary_hits, matched.len() - primary_hits);
                let candidate = LexiconMatch {
                    code: code.clone(),
                    confidence: score,
                    matched_keywords: matched,
                };

                // Codes are visited in ascending order, so an exact tie keeps
                // the lexically smaller code.
                let replace = match &best {
                    None => true,
                    Some(current) => {
                        let diff = candidate.confidence - current.confidence;
                        diff > SCORE_EPSILON
                            || (diff.abs() <= SCORE_EPSILON
                                && candidate.matched_keywords.len()
                                    > current.matched_keywords.len())
                    }
                };
                if replace {
                    best = Some(candidate);
                }
            }
        }

        match best {
            Some(found) => {
                tracing::debug!(
                    code = %found.code,
                    confidence = found.confidence,
                    keywords = ?found.matched_keywords,
                    "Lexicon match"
                );
                found
            }
            None => LexiconMatch {
                code: default_code.to_string(),
                confidence: default_confidence,
                matched_keywords: Vec::new(),
            },
        }
    }
}

/// Mean keyword weight for one code
///
/// Every keyword of a code shares its base confidence, so the mean reduces
/// to `base × (p + 0.8·s) / (p + s)`; all-primary matches score exactly `base`.
fn mean_score(base_confidence: f64, primary_hits: usize, secondary_hits: usize) -> f64 {
    let weighted = primary_hits as f64 + SECONDARY_DISCOUNT * secondary_hits as f64;
    base_confidence * (weighted / (primary_hits + secondary_hits) as f64)
}

fn normalize_keywords(keywords: Vec<String>, seen: &mut HashSet<String>) -> Vec<String> {
    keywords
        .into_iter()
        .map(|k| k.trim().to_lowercase())
        .filter(|k| !k.is_empty() && seen.insert(k.clone()))
        .collect()
}
