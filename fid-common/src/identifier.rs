//! Canonical facility identifier codec
//!
//! Wire/storage format: `III-RR-YYYY-NNN`
//! - `III`  3-digit industry code
//! - `RR`   2-letter uppercase region code
//! - `YYYY` 4-digit creation year
//! - `NNN`  3-digit zero-padded per-partition sequence
//!
//! `parse` is strict: no trimming, no case folding, no partial matches.
//! Any change to this grammar is a breaking format version bump.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const SEPARATOR: char = '-';
const MAX_YEAR: u16 = 9999;
/// Largest sequence the 3-digit `NNN` segment can hold
pub const MAX_SEQUENCE: u16 = 999;

/// Industry code segment: exactly 3 ASCII digits
pub fn is_industry_code(s: &str) -> bool {
    s.len() == 3 && s.bytes().all(|b| b.is_ascii_digit())
}

/// Region code segment: exactly 2 ASCII uppercase letters
pub fn is_region_code(s: &str) -> bool {
    s.len() == 2 && s.bytes().all(|b| b.is_ascii_uppercase())
}

fn is_digits(s: &str, len: usize) -> bool {
    s.len() == len && s.bytes().all(|b| b.is_ascii_digit())
}

/// Scope of one monotonic sequence counter
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SequencePartitionKey {
    industry_code: String,
    region_code: String,
    year: u16,
}

impl SequencePartitionKey {
    /// Build a partition key, enforcing the same segment grammar as the codec
    pub fn new(industry_code: impl Into<String>, region_code: impl Into<String>, year: u16) -> Result<Self> {
        let industry_code = industry_code.into();
        let region_code = region_code.into();

        if !is_industry_code(&industry_code) {
            return Err(Error::MalformedIdentifier(format!(
                "industry code '{}' must be exactly 3 digits",
                industry_code
            )));
        }
        if !is_region_code(&region_code) {
            return Err(Error::MalformedIdentifier(format!(
                "region code '{}' must be exactly 2 uppercase letters",
                region_code
            )));
        }
        if year > MAX_YEAR {
            return Err(Error::MalformedIdentifier(format!(
                "year {} does not fit 4 digits",
                year
            )));
        }

        Ok(Self {
            industry_code,
            region_code,
            year,
        })
    }

    pub fn industry_code(&self) -> &str {
        &self.industry_code
    }

    pub fn region_code(&self) -> &str {
        &self.region_code
    }

    pub fn year(&self) -> u16 {
        self.year
    }
}

impl fmt::Display for SequencePartitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{:04}", self.industry_code, self.region_code, self.year)
    }
}

/// Permanent facility identifier
///
/// Only constructible through [`FacilityIdentifier::new`] or
/// [`FacilityIdentifier::parse`], so the structured form always formats to
/// a string that parses back to an equal value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FacilityIdentifier {
    partition: SequencePartitionKey,
    sequence: u16,
}

impl FacilityIdentifier {
    /// Assemble an identifier from a partition and its allocated sequence
    pub fn new(partition: SequencePartitionKey, sequence: i64) -> Result<Self> {
        if sequence < 0 {
            return Err(Error::MalformedIdentifier(format!(
                "sequence {} must not be negative",
                sequence
            )));
        }
        if sequence > i64::from(MAX_SEQUENCE) {
            return Err(Error::SequenceOverflow {
                partition: partition.to_string(),
                sequence,
            });
        }

        Ok(Self {
            partition,
            // Bounded by MAX_SEQUENCE above
            sequence: sequence as u16,
        })
    }

    /// Parse and validate the canonical string form
    pub fn parse(input: &str) -> Result<Self> {
        let segments: Vec<&str> = input.split(SEPARATOR).collect();
        if segments.len() != 4 {
            return Err(Error::MalformedIdentifier(format!(
                "'{}': expected 4 '-'-separated segments, found {}",
                input,
                segments.len()
            )));
        }

        let (industry, region, year, sequence) = (segments[0], segments[1], segments[2], segments[3]);

        if !is_industry_code(industry) {
            return Err(Error::MalformedIdentifier(format!(
                "'{}': industry segment '{}' must be exactly 3 digits",
                input, industry
            )));
        }
        if !is_region_code(region) {
            return Err(Error::MalformedIdentifier(format!(
                "'{}': region segment '{}' must be exactly 2 uppercase letters",
                input, region
            )));
        }
        if !is_digits(year, 4) {
            return Err(Error::MalformedIdentifier(format!(
                "'{}': year segment '{}' must be exactly 4 digits",
                input, year
            )));
        }
        if !is_digits(sequence, 3) {
            return Err(Error::MalformedIdentifier(format!(
                "'{}': sequence segment '{}' must be exactly 3 digits",
                input, sequence
            )));
        }

        // Segments are pure ASCII digits of bounded length, parse cannot overflow
        let year: u16 = year
            .parse()
            .map_err(|e| Error::MalformedIdentifier(format!("'{}': bad year: {}", input, e)))?;
        let sequence: u16 = sequence
            .parse()
            .map_err(|e| Error::MalformedIdentifier(format!("'{}': bad sequence: {}", input, e)))?;

        let partition = SequencePartitionKey::new(industry, region, year)?;
        Self::new(partition, i64::from(sequence))
    }

    /// Canonical string form
    pub fn format(&self) -> String {
        format!("{}-{:03}", self.partition, self.sequence)
    }

    pub fn partition(&self) -> &SequencePartitionKey {
        &self.partition
    }

    pub fn industry_code(&self) -> &str {
        self.partition.industry_code()
    }

    pub fn region_code(&self) -> &str {
        self.partition.region_code()
    }

    pub fn year(&self) -> u16 {
        self.partition.year()
    }

    pub fn sequence(&self) -> u16 {
        self.sequence
    }
}

impl fmt::Display for FacilityIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format())
    }
}

impl FromStr for FacilityIdentifier {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for FacilityIdentifier {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<FacilityIdentifier> for String {
    fn from(id: FacilityIdentifier) -> Self {
        id.format()
    }
}
