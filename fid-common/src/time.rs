//! Calendar and duration helpers

use chrono::{Datelike, Local};
use std::time::Duration;

/// Calendar year used for new identifiers (registration office local time)
pub fn current_year() -> u16 {
    // chrono years are bounded well inside u16 for any realistic clock
    Local::now().year().clamp(0, 9999) as u16
}

/// Config values are stored in milliseconds
pub fn millis_to_duration(millis: u64) -> Duration {
    Duration::from_millis(millis)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_year_fits_identifier() {
        let year = current_year();
        assert!(year >= 2000);
        assert!(year <= 9999);
    }

    #[test]
    fn test_config_millis_become_duration() {
        assert_eq!(millis_to_duration(5000), Duration::from_secs(5));
        assert_eq!(millis_to_duration(0), Duration::ZERO);
    }
}
