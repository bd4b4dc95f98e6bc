//! Database models

use serde::{Deserialize, Serialize};

/// Row of `sequence_counters`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct SequenceCounter {
    pub industry_code: String,
    pub region_code: String,
    pub year: i64,
    pub last_sequence: i64,
}

/// Row of `facilities`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct FacilityRecord {
    pub guid: String,
    pub identifier: String,
    pub industry_code: String,
    pub region_code: String,
    pub year: i64,
    pub sequence: i64,
    pub name: Option<String>,
    pub overall_confidence: f64,
    pub needs_confirmation: bool,
    /// Serialized fusion audit trail
    pub fusion_json: String,
}
