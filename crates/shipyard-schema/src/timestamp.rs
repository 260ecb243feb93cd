//! RFC 3339 encoding for `build` timestamps.
//!
//! Output uses `Z` for a zero offset and drops trailing zeros from the
//! fractional second, so timestamps already present in a manifest are written
//! back exactly as they were read.

use chrono::{DateTime, FixedOffset, SecondsFormat, Timelike, Utc};
use serde::{Deserialize, Deserializer, Serializer};

/// Seconds from the Unix epoch back to 0001-01-01T00:00:00Z.
const YEAR_ONE_UNIX_SECS: i64 = -62_135_596_800;

/// `build` value for a channel that never had one: 0001-01-01T00:00:00Z.
pub(crate) fn zero() -> DateTime<FixedOffset> {
    DateTime::<Utc>::from_timestamp(YEAR_ONE_UNIX_SECS, 0)
        .unwrap_or_default()
        .into()
}

pub(crate) fn format(dt: &DateTime<FixedOffset>) -> String {
    let whole = dt.to_rfc3339_opts(SecondsFormat::Secs, true);
    let nanos = dt.nanosecond() % 1_000_000_000;
    if nanos == 0 {
        return whole;
    }
    let frac = format!("{nanos:09}");
    let frac = frac.trim_end_matches('0');
    // Fractional digits go right after the seconds field.
    match whole.find(['Z', '+']).or_else(|| whole.rfind('-')) {
        Some(idx) => format!("{}.{frac}{}", &whole[..idx], &whole[idx..]),
        None => whole,
    }
}

pub(crate) fn serialize<S: Serializer>(
    dt: &DateTime<FixedOffset>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format(dt))
}

pub(crate) fn deserialize<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<DateTime<FixedOffset>, D::Error> {
    let raw = Option::<String>::deserialize(deserializer)?;
    match raw {
        None => Ok(zero()),
        Some(s) => DateTime::parse_from_rfc3339(&s).map_err(serde::de::Error::custom),
    }
}
