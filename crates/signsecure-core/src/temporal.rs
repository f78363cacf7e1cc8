//! # Temporal Types — UTC-Only Timestamps
//!
//! `Timestamp` is a UTC instant truncated to microseconds. Audit ordering,
//! token expiry and `signed_at`/`viewed_at` markers all use it.
//!
//! Microsecond truncation matches what Postgres `timestamptz` stores, so a
//! record written through to the database and hydrated back compares equal
//! to the in-memory copy.

use chrono::{DateTime, Duration, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// A UTC timestamp with microsecond precision.
///
/// # Construction
///
/// - [`Timestamp::now()`] — current UTC time.
/// - [`Timestamp::from_utc()`] — from a `DateTime<Utc>`, truncating below microseconds.
/// - [`Timestamp::parse()`] — from an RFC 3339 string, converting any offset to UTC.
/// - [`Timestamp::from_epoch_secs()`] — from Unix seconds (token `exp`/`iat` claims).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Current UTC time.
    pub fn now() -> Self {
        Self::from_utc(Utc::now())
    }

    /// Create a timestamp from a `chrono::DateTime<Utc>`.
    pub fn from_utc(dt: DateTime<Utc>) -> Self {
        Self(dt.trunc_subsecs(6))
    }

    /// Parse an RFC 3339 string. Offsets are accepted and normalized to UTC.
    pub fn parse(s: &str) -> Result<Self, CoreError> {
        let dt = DateTime::parse_from_rfc3339(s)
            .map_err(|e| CoreError::InvalidTimestamp(format!("{s:?}: {e}")))?;
        Ok(Self::from_utc(dt.with_timezone(&Utc)))
    }

    /// Create a timestamp from a Unix epoch value in seconds.
    pub fn from_epoch_secs(secs: i64) -> Result<Self, CoreError> {
        DateTime::from_timestamp(secs, 0)
            .map(Self)
            .ok_or_else(|| CoreError::InvalidTimestamp(format!("unix seconds out of range: {secs}")))
    }

    /// Access the inner `DateTime<Utc>`.
    pub fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }

    /// Consume into the inner `DateTime<Utc>`.
    pub fn into_datetime(self) -> DateTime<Utc> {
        self.0
    }

    /// Unix epoch seconds.
    pub fn epoch_secs(&self) -> i64 {
        self.0.timestamp()
    }

    /// This instant shifted by `days` days, or `None` when the result falls
    /// outside the chrono range.
    pub fn checked_plus_days(&self, days: i64) -> Option<Self> {
        Duration::try_days(days)
            .and_then(|d| self.0.checked_add_signed(d))
            .map(Self::from_utc)
    }

    /// This instant shifted by `days` days, clamped to the chrono range.
    pub fn plus_days(&self, days: i64) -> Self {
        self.checked_plus_days(days).unwrap_or_else(|| {
            if days < 0 {
                Self::from_utc(DateTime::<Utc>::MIN_UTC)
            } else {
                Self::from_utc(DateTime::<Utc>::MAX_UTC)
            }
        })
    }

    /// The smallest representable timestamp strictly after this one.
    pub fn next_tick(&self) -> Self {
        self.0
            .checked_add_signed(Duration::microseconds(1))
            .map(Self)
            .unwrap_or(*self)
    }

    /// RFC 3339 rendering with `Z` suffix and microseconds.
    pub fn to_rfc3339(&self) -> String {
        self.0.to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_rfc3339())
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        Self::from_utc(dt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Timelike};

    #[test]
    fn from_utc_truncates_to_micros() {
        let dt = Utc
            .with_ymd_and_hms(2026, 1, 15, 12, 30, 45)
            .unwrap()
            .with_nanosecond(123_456_789)
            .unwrap();
        let ts = Timestamp::from_utc(dt);
        assert_eq!(ts.as_datetime().nanosecond(), 123_456_000);
    }

    #[test]
    fn parse_normalizes_offsets() {
        let ts = Timestamp::parse("2026-01-15T17:00:00+05:00").unwrap();
        assert_eq!(ts.to_rfc3339(), "2026-01-15T12:00:00.000000Z");
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(Timestamp::parse("yesterday").is_err());
    }

    #[test]
    fn plus_days_moves_forward() {
        let ts = Timestamp::parse("2026-01-01T00:00:00Z").unwrap();
        assert_eq!(
            ts.plus_days(30).to_rfc3339(),
            "2026-01-31T00:00:00.000000Z"
        );
    }

    #[test]
    fn day_overflow_is_detected_and_clamped() {
        let ts = Timestamp::parse("2026-01-01T00:00:00Z").unwrap();
        assert!(ts.checked_plus_days(i64::MAX).is_none());
        assert!(ts.checked_plus_days(-i64::MAX).is_none());
        assert!(ts.plus_days(i64::MAX) > ts.plus_days(365 * 1000));
        assert!(ts.plus_days(-i64::MAX) < ts);
    }

    #[test]
    fn next_tick_is_strictly_greater() {
        let ts = Timestamp::now();
        assert!(ts.next_tick() > ts);
    }

    #[test]
    fn epoch_round_trip() {
        let ts = Timestamp::parse("2026-03-01T08:00:00Z").unwrap();
        let back = Timestamp::from_epoch_secs(ts.epoch_secs()).unwrap();
        assert_eq!(back, ts);
    }

    #[test]
    fn from_epoch_secs_rejects_out_of_range() {
        assert!(Timestamp::from_epoch_secs(i64::MAX).is_err());
    }
}
