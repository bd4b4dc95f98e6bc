//! # fid-gen - Facility Identifier Generation
//!
//! Assigns `III-RR-YYYY-NNN` identifiers to newly registered facilities from
//! loosely structured free text (name, industry description, address,
//! phone, email).
//!
//! Pipeline:
//! - [`classify`]: lexicon matching, phone-region resolution, signal fusion
//! - [`allocator`]: collision-free per-partition sequence numbers
//! - [`service`]: fusion → allocation → canonical identifier
//! - [`db`]: SQLite sequence store and facility repository

pub mod allocator;
pub mod classify;
pub mod db;
pub mod service;
pub mod types;

pub use allocator::{MemorySequenceStore, SequenceAllocator, SequenceStore};
pub use classify::SignalFusionEngine;
pub use service::{FacilityIdentifierService, GeneratedIdentifier, RegisteredFacility};
pub use types::{ClassificationSignal, FacilityDraft, FusionResult, SignalAxis, SignalSource};
