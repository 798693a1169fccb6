//! Timestamp tokens
//!
//! Timestamps are RFC 3339 strings with microsecond precision. Every timestamp
//! issued from the local clock is strictly greater than the previous one.
//! Timestamps adopted from outside only ever move the context that adopted
//! them; the process-wide clock is fed by `Utc::now()` alone.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};

static LAST_ISSUED_MICROS: AtomicI64 = AtomicI64::new(0);

/// Opaque, totally ordered point in time
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Issue a new timestamp, strictly after any previously issued one
    pub fn make() -> Self {
        Self::from_micros(issue(Utc::now().timestamp_micros()))
    }

    /// Issue a new timestamp that is also strictly after `previous`
    ///
    /// `previous` may come from outside this process (e.g. an accepted write)
    /// and be ahead of the local clock. Such a floor applies to the returned
    /// value only and does not advance the shared clock.
    pub fn make_after(previous: &Timestamp) -> Self {
        let floor = previous.0.timestamp_micros().saturating_add(1);
        Self::from_micros(issue(Utc::now().timestamp_micros()).max(floor))
    }

    /// Parse an RFC 3339 timestamp
    pub fn parse(raw: &str) -> Option<Self> {
        DateTime::parse_from_rfc3339(raw)
            .ok()
            .map(|dt| Self(dt.with_timezone(&Utc)))
    }

    /// Read a timestamp carried in a JSON value (e.g. `value["@timestamp"]`)
    pub fn from_value(value: &Value) -> Option<Self> {
        value.as_str().and_then(Self::parse)
    }

    /// Optimistic-concurrency comparator
    ///
    /// A write is compatible when the stored side has no timestamp, or when
    /// the incoming timestamp is not older than the stored one. A write
    /// without a timestamp never overrides a stored one.
    pub fn check(current: Option<&Timestamp>, incoming: Option<&Timestamp>) -> bool {
        match (current, incoming) {
            (None, _) => true,
            (Some(_), None) => false,
            (Some(current), Some(incoming)) => incoming >= current,
        }
    }

    fn from_micros(micros: i64) -> Self {
        Self(DateTime::<Utc>::from_timestamp_micros(micros).unwrap_or_else(Utc::now))
    }
}

fn issue(candidate: i64) -> i64 {
    let mut last = LAST_ISSUED_MICROS.load(Ordering::SeqCst);
    loop {
        let next = candidate.max(last.saturating_add(1));
        match LAST_ISSUED_MICROS.compare_exchange_weak(
            last,
            next,
            Ordering::SeqCst,
            Ordering::SeqCst,
        ) {
            Ok(_) => return next,
            Err(actual) => last = actual,
        }
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.to_rfc3339_opts(SecondsFormat::Micros, true))
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Timestamp::parse(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {}", raw)))
    }
}
