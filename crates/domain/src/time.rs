//! Time and timestamp helpers.

use chrono::{DateTime, Utc};

/// UTC timestamp used for local write stamps, window expiry and change events.
pub type Timestamp = DateTime<Utc>;

/// Span of time added to a [`Timestamp`].
pub type Duration = chrono::TimeDelta;

/// Return the current UTC time.
#[must_use]
pub fn now() -> Timestamp {
    Utc::now()
}

/// Build a [`Duration`] from whole seconds.
#[must_use]
pub fn seconds(secs: i64) -> Duration {
    chrono::TimeDelta::seconds(secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_return_current_utc_time() {
        let before = Utc::now();
        let ts = now();
        let after = Utc::now();
        assert!(ts >= before);
        assert!(ts <= after);
    }

    #[test]
    fn should_build_duration_from_seconds() {
        assert_eq!(seconds(60).num_milliseconds(), 60_000);
    }
}
