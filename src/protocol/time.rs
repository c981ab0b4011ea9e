//! Timestamp formats used on the CAMEA wire.

use std::sync::LazyLock;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use regex::Regex;

use crate::error_handling::RequestError;

static IMAGE_TIME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{4})(\d{2})(\d{2})T(\d{2})(\d{2})(\d{2})(\d{1,9})([+-])(\d{2})(\d{2})$")
        .expect("image time pattern is valid")
});

/// Parses a CAMEA `ImageTime` value: `YYYYMMDDTHHMMSSffffff±HHMM`.
///
/// The fraction takes 1 to 9 digits and is read as a decimal fraction of a
/// second (`1` is 100ms, `000100` is 100µs).
///
/// # Errors
///
/// Returns `RequestError::InvalidImageTime` carrying the raw value if the
/// text does not match or names an impossible date, time or offset.
pub fn parse_image_time(raw: &str) -> Result<DateTime<FixedOffset>, RequestError> {
    let invalid = || RequestError::InvalidImageTime(raw.to_string());
    let caps = IMAGE_TIME_RE.captures(raw.trim()).ok_or_else(invalid)?;

    let num = |i: usize| caps[i].parse::<u32>().map_err(|_| invalid());

    let year = caps[1].parse::<i32>().map_err(|_| invalid())?;
    let date = NaiveDate::from_ymd_opt(year, num(2)?, num(3)?).ok_or_else(invalid)?;

    let fraction = &caps[7];
    let nanos = format!("{:0<9}", fraction).parse::<u32>().map_err(|_| invalid())?;
    let time = NaiveTime::from_hms_nano_opt(num(4)?, num(5)?, num(6)?, nanos).ok_or_else(invalid)?;

    let offset_secs = (num(9)? * 3600 + num(10)? * 60) as i32;
    let offset = if &caps[8] == "-" {
        FixedOffset::west_opt(offset_secs)
    } else {
        FixedOffset::east_opt(offset_secs)
    }
    .ok_or_else(invalid)?;

    offset
        .from_local_datetime(&date.and_time(time))
        .single()
        .ok_or_else(invalid)
}

/// Formats a detection timestamp as `YYYYMMDDTHHMMSSmmm±HHMM` (`TimeDet`).
pub fn format_time_det<T>(dt: &DateTime<T>) -> String
where
    T: TimeZone,
    T::Offset: std::fmt::Display,
{
    dt.format("%Y%m%dT%H%M%S%3f%z").to_string()
}

/// Formats a send timestamp as ISO-8601 with milliseconds (`UT`).
pub fn format_send_time<T>(dt: &DateTime<T>) -> String
where
    T: TimeZone,
    T::Offset: std::fmt::Display,
{
    dt.format("%Y-%m-%dT%H:%M:%S%.3f%:z").to_string()
}

/// Converts epoch milliseconds into the configured local zone.
pub fn epoch_ms_to_zone(epoch_ms: i64, tz: Tz) -> Option<DateTime<Tz>> {
    Utc.timestamp_millis_opt(epoch_ms)
        .single()
        .map(|dt| dt.with_timezone(&tz))
}
