use chrono::{DateTime, TimeZone, Utc};
use chrono_tz::Tz;
use std::str::FromStr;

use crate::error::Error;

/// Maximum length of an IANA zone identifier as stored in the header's
/// fixed-size `timezone_name` field.
pub const TIMEZONE_NAME_MAX_LEN: usize = 63;

/// Look up an IANA zone by name, failing with `InvalidConfig` if it is
/// unrecognized or would not fit in the on-disk field.
pub fn lookup_timezone(name: &str) -> Result<Tz, Error> {
    if name.len() > TIMEZONE_NAME_MAX_LEN {
        return Err(Error::InvalidConfig(format!(
            "timezone name {name:?} is longer than {TIMEZONE_NAME_MAX_LEN} bytes"
        )));
    }
    Tz::from_str(name).map_err(|_| Error::InvalidConfig(format!("unknown timezone {name:?}")))
}

/// Converts an absolute instant to whole UTC epoch seconds. All on-disk
/// arithmetic is in these units; no local wall-clock arithmetic ever occurs
/// past this boundary.
pub fn to_epoch<Z: TimeZone>(instant: &DateTime<Z>) -> i64 {
    instant.timestamp()
}

/// Reconstructs an instant in the given display zone from stored epoch
/// seconds.
pub fn from_epoch(epoch: i64, zone: Tz) -> DateTime<Tz> {
    Utc.timestamp_opt(epoch, 0)
        .single()
        .expect("epoch seconds within chrono's representable range")
        .with_timezone(&zone)
}

/// Rounds `epoch` down to the nearest multiple of `interval` seconds.
pub fn align_down(epoch: i64, interval: i64) -> i64 {
    epoch - epoch.rem_euclid(interval)
}

/// Rounds `epoch` up to the nearest multiple of `interval` seconds.
pub fn align_up(epoch: i64, interval: i64) -> i64 {
    let down = align_down(epoch, interval);
    if down == epoch { down } else { down + interval }
}
