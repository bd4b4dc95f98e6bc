// Classification: lexicon matching, phone-region resolution, signal fusion
//
// All components here are pure and stateless; tables are read-only after
// load and shared freely across concurrent callers.

pub mod fusion;
pub mod lexicon;
pub mod phone_region;

pub use fusion::SignalFusionEngine;
pub use lexicon::{LexiconEntry, LexiconMatch, LexiconTable};
pub use phone_region::{PhonePrefixTables, PhoneRegionResolver, PhoneResolution, ResolutionMethod};

use fid_common::config::ClassificationConfig;
use fid_common::identifier::{is_industry_code, is_region_code};
use fid_common::Result;

/// Load tables named in config (built-in assets when unset) and build the engine
pub fn engine_from_config(config: &ClassificationConfig) -> Result<SignalFusionEngine> {
    let industry = match &config.industry_lexicon_path {
        Some(path) => LexiconTable::from_file(path, is_industry_code)?,
        None => LexiconTable::builtin_industry()?,
    };
    let region = match &config.region_lexicon_path {
        Some(path) => LexiconTable::from_file(path, is_region_code)?,
        None => LexiconTable::builtin_region()?,
    };
    let prefixes = match &config.phone_prefix_path {
        Some(path) => PhonePrefixTables::from_file(path)?,
        None => PhonePrefixTables::builtin()?,
    };

    tracing::info!(
        industry_codes = industry.len(),
        region_codes = region.len(),
        "Classification tables loaded"
    );

    Ok(SignalFusionEngine::new(
        industry,
        region,
        PhoneRegionResolver::new(prefixes, config.default_region_code.clone()),
        config.clone(),
    ))
}
