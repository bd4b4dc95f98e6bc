// Phone-Region Resolver
//
// Concept: Approximate a facility's region from its mobile number
// Independent of the Lexicon Matcher; pure table lookups.
//
// Tiers (each only tried when the previous found nothing):
// 1. Dense table, first 7 digits                → confidence 0.9
// 2. Coarse table, first 3 digits (multi-region) → confidence 0.6, ranked by national priority
// 3. Single-digit bucket heuristic               → confidence 0.4
// Invalid numbers yield the default region at the lowest confidence.

use fid_common::identifier::is_region_code;
use fid_common::{Error, Result};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

pub const DENSE_CONFIDENCE: f64 = 0.9;
pub const COARSE_CONFIDENCE: f64 = 0.6;
pub const BUCKET_CONFIDENCE: f64 = 0.4;
pub const INVALID_CONFIDENCE: f64 = 0.1;

const MOBILE_LENGTH: usize = 11;
const DENSE_PREFIX_LEN: usize = 7;
const COARSE_PREFIX_LEN: usize = 3;

const BUILTIN_PREFIXES: &str = include_str!("../../data/phone_prefixes.toml");

/// National priority for ranking coarse-prefix candidates:
/// municipalities, then major provinces, then everything else.
const PRIORITY_ORDER: &[&str] = &[
    // Municipalities
    "BJ", "SH", "TJ", "CQ",
    // Major provinces
    "GD", "JS", "ZJ", "SD", "HA", "SC", "HB", "HN", "HE", "FJ",
];

static NATIONAL_PRIORITY: Lazy<HashMap<&'static str, usize>> = Lazy::new(|| {
    PRIORITY_ORDER
        .iter()
        .enumerate()
        .map(|(rank, code)| (*code, rank))
        .collect()
});

/// Rank of a region in the national priority order (lower ranks first)
pub fn priority_rank(region_code: &str) -> usize {
    NATIONAL_PRIORITY
        .get(region_code)
        .copied()
        .unwrap_or(PRIORITY_ORDER.len())
}

/// How a resolution was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResolutionMethod {
    DensePrefix,
    CoarsePrefix,
    DigitBucket,
    Invalid,
}

/// Resolver output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhoneResolution {
    pub region_code: String,
    pub confidence: f64,
    pub method: ResolutionMethod,
    /// Lower-ranked candidates from the coarse tier
    pub alternatives: Vec<String>,
    /// Normalized digits (empty when invalid)
    pub normalized: String,
}

impl PhoneResolution {
    pub fn is_valid(&self) -> bool {
        self.method != ResolutionMethod::Invalid
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
struct DigitBucket {
    position: usize,
    regions: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct PrefixFile {
    #[serde(default)]
    dense: BTreeMap<String, String>,
    #[serde(default)]
    coarse: BTreeMap<String, Vec<String>>,
    bucket: DigitBucket,
}

/// Prefix tables (data asset)
#[derive(Debug, Clone, PartialEq)]
pub struct PhonePrefixTables {
    dense: BTreeMap<String, String>,
    coarse: BTreeMap<String, Vec<String>>,
    bucket: DigitBucket,
}

impl PhonePrefixTables {
    /// Parse and validate a TOML prefix file
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let file: PrefixFile =
            toml::from_str(content).map_err(|e| Error::Config(format!("phone prefixes: {}", e)))?;

        for (prefix, region) in &file.dense {
            check_prefix(prefix, DENSE_PREFIX_LEN)?;
            check_region(region)?;
        }
        for (prefix, regions) in &file.coarse {
            check_prefix(prefix, COARSE_PREFIX_LEN)?;
            if regions.is_empty() {
                return Err(Error::Config(format!(
                    "phone prefixes: coarse prefix '{}' has no regions",
                    prefix
                )));
            }
            for region in regions {
                check_region(region)?;
            }
        }
        if file.bucket.position >= MOBILE_LENGTH {
            return Err(Error::Config(format!(
                "phone prefixes: bucket position {} outside an {}-digit number",
                file.bucket.position, MOBILE_LENGTH
            )));
        }
        if file.bucket.regions.len() != 10 {
            return Err(Error::Config(format!(
                "phone prefixes: bucket needs 10 regions (one per digit), found {}",
                file.bucket.regions.len()
            )));
        }
        for region in &file.bucket.regions {
            check_region(region)?;
        }

        Ok(Self {
            dense: file.dense,
            coarse: file.coarse,
            bucket: file.bucket,
        })
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }

    pub fn builtin() -> Result<Self> {
        Self::from_toml_str(BUILTIN_PREFIXES)
    }
}

fn check_prefix(prefix: &str, len: usize) -> Result<()> {
    if prefix.len() == len && prefix.bytes().all(|b| b.is_ascii_digit()) {
        Ok(())
    } else {
        Err(Error::Config(format!(
            "phone prefixes: '{}' must be exactly {} digits",
            prefix, len
        )))
    }
}

fn check_region(region: &str) -> Result<()> {
    if is_region_code(region) {
        Ok(())
    } else {
        Err(Error::Config(format!(
            "phone prefixes: '{}' is not a 2-letter region code",
            region
        )))
    }
}

/// Strip formatting and the +86 country code; None when the shape is wrong
///
/// Valid mobile numbers are 11 digits, start with `1`, and have a second
/// digit in 3..=9.
pub fn normalize_mobile(phone: &str) -> Option<String> {
    let mut digits = String::with_capacity(phone.len());
    for c in phone.trim().chars() {
        match c {
            '0'..='9' => digits.push(c),
            ' ' | '-' | '(' | ')' | '+' | '.' => {}
            _ => return None,
        }
    }

    let digits = if digits.len() == MOBILE_LENGTH + 4 && digits.starts_with("0086") {
        digits[4..].to_string()
    } else if digits.len() == MOBILE_LENGTH + 2 && digits.starts_with("86") {
        digits[2..].to_string()
    } else {
        digits
    };

    let bytes = digits.as_bytes();
    if bytes.len() != MOBILE_LENGTH || bytes[0] != b'1' || !(b'3'..=b'9').contains(&bytes[1]) {
        return None;
    }

    Some(digits)
}

/// Tiered phone → region resolver
#[derive(Debug, Clone)]
pub struct PhoneRegionResolver {
    tables: PhonePrefixTables,
    default_region: String,
}

impl PhoneRegionResolver {
    pub fn new(tables: PhonePrefixTables, default_region: impl Into<String>) -> Self {
        Self {
            tables,
            default_region: default_region.into(),
        }
    }

    /// Resolve a phone number; never fails
    pub fn resolve(&self, phone: &str) -> PhoneResolution {
        let Some(digits) = normalize_mobile(phone) else {
            tracing::debug!(phone, "Phone number failed shape validation");
            return PhoneResolution {
                region_code: self.default_region.clone(),
                confidence: INVALID_CONFIDENCE,
                method: ResolutionMethod::Invalid,
                alternatives: Vec::new(),
                normalized: String::new(),
            };
        };

        // Tier 1: dense 7-digit block
        if let Some(region) = self.tables.dense.get(&digits[..DENSE_PREFIX_LEN]) {
            return PhoneResolution {
                region_code: region.clone(),
                confidence: DENSE_CONFIDENCE,
                method: ResolutionMethod::DensePrefix,
                alternatives: Vec::new(),
                normalized: digits,
            };
        }

        // Tier 2: coarse 3-digit segment, ranked by national priority
        if let Some(candidates) = self.tables.coarse.get(&digits[..COARSE_PREFIX_LEN]) {
            let mut ranked = candidates.clone();
            // Stable: equal-rank regions keep table order
            ranked.sort_by_key(|code| priority_rank(code));
            let top = ranked.remove(0);
            return PhoneResolution {
                region_code: top,
                confidence: COARSE_CONFIDENCE,
                method: ResolutionMethod::CoarsePrefix,
                alternatives: ranked,
                normalized: digits,
            };
        }

        // Tier 3: single-digit bucket
        let digit = usize::from(digits.as_bytes()[self.tables.bucket.position] - b'0');
        PhoneResolution {
            region_code: self.tables.bucket.regions[digit].clone(),
            confidence: BUCKET_CONFIDENCE,
            method: ResolutionMethod::DigitBucket,
            alternatives: Vec::new(),
            normalized: digits,
        }
    }
}
