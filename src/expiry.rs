//! Time bounds on ignore and override rules.
//!
//! A rule without a bound never expires. A bounded rule stays in effect only while its
//! bound is strictly after the moment of evaluation, so a rule is already expired at the
//! exact instant named by its bound.

use chrono::{
    DateTime, Duration, FixedOffset, Local, NaiveDate, NaiveDateTime, Offset, TimeZone, Utc,
};
use serde::{de, Deserialize, Deserializer};

pub type Timestamp = DateTime<FixedOffset>;

#[must_use]
pub fn is_in_effect(until: Option<&Timestamp>, now: DateTime<Utc>) -> bool {
    until.is_none_or(|until| *until > now)
}

/// Parses RFC 3339 timestamps, falling back to local wall-clock time for values that carry
/// no offset (`2020-01-01T12:00:00`, `2020-01-01`).
#[must_use]
pub fn parse_timestamp(raw: &str) -> Option<Timestamp> {
    parse_timestamp_in(raw, &Local)
}

/// Like [`parse_timestamp`], reading offset-less values as wall-clock time in `tz`.
#[must_use]
pub fn parse_timestamp_in<Tz: TimeZone>(raw: &str, tz: &Tz) -> Option<Timestamp> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts);
    }
    let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })?;
    resolve_local(tz, naive)
}

fn resolve_local<Tz: TimeZone>(tz: &Tz, naive: NaiveDateTime) -> Option<Timestamp> {
    if let Some(ts) = tz.from_local_datetime(&naive).earliest() {
        return Some(ts.fixed_offset());
    }
    // Skipped by a forward transition: keep the offset in effect before the gap.
    let before = tz
        .from_local_datetime(&(naive - Duration::hours(24)))
        .earliest()?
        .offset()
        .fix();
    before.from_local_datetime(&naive).single()
}

pub(crate) fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<Option<Timestamp>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = match Option::<toml::Value>::deserialize(deserializer)? {
        None => return Ok(None),
        Some(toml::Value::Datetime(datetime)) => datetime.to_string(),
        Some(toml::Value::String(text)) if text.is_empty() => return Ok(None),
        Some(toml::Value::String(text)) => text,
        Some(other) => {
            return Err(de::Error::invalid_type(
                de::Unexpected::Other(other.type_str()),
                &"a date-time",
            ))
        }
    };
    parse_timestamp(&raw)
        .map(Some)
        .ok_or_else(|| de::Error::custom(format!("invalid timestamp `{raw}`")))
}
