//! Account expiry timestamp conversions

use chrono::{DateTime, Utc};

const SECS_PER_DAY: i64 = 86_400;

/// Seconds between 1601-01-01 and 1970-01-01
const FILETIME_EPOCH_OFFSET_SECS: i64 = 11_644_473_600;

/// FILETIME ticks per second (100ns units)
const FILETIME_TICKS_PER_SEC: i64 = 10_000_000;

/// Convert a `shadowExpire` value (days since epoch) to the instant it takes effect
///
/// Negative values mean the account never expires.
pub fn shadow_expire_to_datetime(days: i64) -> Option<DateTime<Utc>> {
    if days < 0 {
        return None;
    }
    DateTime::<Utc>::from_timestamp(days.checked_mul(SECS_PER_DAY)?, 0)
}

/// Convert an Active Directory `accountExpires` FILETIME value
///
/// `0` and `i64::MAX` mean the account never expires.
pub fn filetime_to_datetime(ticks: i64) -> Option<DateTime<Utc>> {
    if ticks <= 0 || ticks == i64::MAX {
        return None;
    }
    let secs = ticks / FILETIME_TICKS_PER_SEC - FILETIME_EPOCH_OFFSET_SECS;
    let nanos = (ticks % FILETIME_TICKS_PER_SEC) * 100;
    DateTime::<Utc>::from_timestamp(secs, nanos as u32)
}
