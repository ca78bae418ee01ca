//! Timestamp normalization and freshness
//!
//! Producers send `observed_at` in either seconds or milliseconds without a
//! unit tag. Any value above [`MILLIS_THRESHOLD`] is treated as milliseconds.
//! This is an inherited heuristic, not a contract with producers: a seconds
//! value only crosses the threshold around the year 33658.

use chrono::{DateTime, Utc};

use crate::error::{EngineError, Result};

/// Timestamps strictly greater than this are interpreted as milliseconds.
pub const MILLIS_THRESHOLD: u64 = 1_000_000_000_000;

/// Source of "now" for freshness checks and result timestamps.
pub trait Clock: Send + Sync {
    /// Current Unix time in seconds.
    fn now_secs(&self) -> i64;

    /// Current time, at second precision unless overridden.
    fn now(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.now_secs(), 0).unwrap_or_default()
    }
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_secs(&self) -> i64 {
        Utc::now().timestamp()
    }

    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock pinned to a fixed instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub i64);

impl Clock for FixedClock {
    fn now_secs(&self) -> i64 {
        self.0
    }
}

/// Normalize an `observed_at` value to Unix seconds.
pub fn normalize_observed_at(observed_at: u64) -> i64 {
    let secs = if observed_at > MILLIS_THRESHOLD {
        observed_at / 1000
    } else {
        observed_at
    };
    i64::try_from(secs).unwrap_or(i64::MAX)
}

/// Check that an observation is neither older than `window_secs` nor in the
/// future relative to `now_secs`. Returns the age in seconds.
///
/// The boundary is inclusive: an age equal to the window is still fresh.
pub fn check_freshness(observed_secs: i64, now_secs: i64, window_secs: u64) -> Result<i64> {
    let age_secs = now_secs.saturating_sub(observed_secs);
    let window = i64::try_from(window_secs).unwrap_or(i64::MAX);

    if age_secs < 0 || age_secs > window {
        return Err(EngineError::AttestationExpired {
            age_secs,
            window_secs,
        });
    }

    Ok(age_secs)
}
