use std::fmt::Display;
use std::sync::LazyLock;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, Offset, TimeDelta, TimeZone, Utc};
use chrono_tz::Tz;
use regex::Regex;

pub const XMLTV_TIME_FORMAT: &str = "%Y%m%d%H%M%S %z";

// epoch values above this are milliseconds
const EPOCH_MILLIS_THRESHOLD: u64 = 10_000_000_000;

static OFFSET_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(?:UTC|GMT)?([+-])(\d{1,2}):?(\d{2})?$").unwrap());
static CLOCK_DURATION_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\d{1,3}):(\d{2})(?::(\d{2}))?$").unwrap());

const OFFSET_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%z",
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M:%S%z",
    "%Y-%m-%d %H:%M:%S %z",
    "%Y%m%d%H%M%S %z",
];

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%Y%m%d%H%M%S",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
];

// date-only values start at local midnight
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y"];

/// Timezone of a service, either an IANA zone or a fixed offset like `-03:00`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceTimezone {
    Named(Tz),
    Fixed(FixedOffset),
}

impl Default for ServiceTimezone {
    fn default() -> Self {
        Self::Fixed(Utc.fix())
    }
}

impl Display for ServiceTimezone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Named(tz) => write!(f, "{}", tz.name()),
            Self::Fixed(offset) => write!(f, "{offset}"),
        }
    }
}

impl ServiceTimezone {
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        if value.is_empty() || value.eq_ignore_ascii_case("utc") || value.eq_ignore_ascii_case("z") {
            return Some(Self::default());
        }
        if let Ok(tz) = value.parse::<Tz>() {
            return Some(Self::Named(tz));
        }
        let caps = OFFSET_REGEX.captures(value)?;
        let hours: i32 = caps.get(2)?.as_str().parse().ok()?;
        let minutes: i32 = caps.get(3).map_or(Some(0), |m| m.as_str().parse().ok())?;
        let seconds = (hours * 3600 + minutes * 60) * if &caps[1] == "-" { -1 } else { 1 };
        FixedOffset::east_opt(seconds).map(Self::Fixed)
    }

    pub fn from_utc(&self, dt: &DateTime<Utc>) -> DateTime<FixedOffset> {
        match self {
            Self::Named(tz) => dt.with_timezone(tz).fixed_offset(),
            Self::Fixed(offset) => dt.with_timezone(offset),
        }
    }

    /// Interprets a wall-clock time in this zone. Ambiguous times take the earlier instant,
    /// times inside a DST gap are moved forward by one hour.
    pub fn from_local(&self, naive: &NaiveDateTime) -> Option<DateTime<FixedOffset>> {
        match self {
            Self::Named(tz) => tz.from_local_datetime(naive).earliest()
                .or_else(|| {
                    let shifted = naive.checked_add_signed(TimeDelta::hours(1))?;
                    tz.from_local_datetime(&shifted).earliest()
                })
                .map(|dt| dt.fixed_offset()),
            Self::Fixed(offset) => offset.from_local_datetime(naive).single(),
        }
    }

    pub fn today(&self) -> NaiveDate {
        self.from_utc(&Utc::now()).date_naive()
    }

    /// Unix timestamps of local `00:00:00` and `23:59:59` of `date`.
    pub fn unix_day_bounds(&self, date: NaiveDate) -> Option<(i64, i64)> {
        let start = self.from_local(&date.and_hms_opt(0, 0, 0)?)?;
        let end = self.from_local(&date.and_hms_opt(23, 59, 59)?)?;
        Some((start.timestamp(), end.timestamp()))
    }

    pub fn day_start(&self, date: NaiveDate) -> Option<DateTime<FixedOffset>> {
        self.from_local(&date.and_hms_opt(0, 0, 0)?)
    }
}

pub fn from_epoch(value: i64, tz: &ServiceTimezone) -> Option<DateTime<FixedOffset>> {
    let utc = if value.unsigned_abs() > EPOCH_MILLIS_THRESHOLD {
        DateTime::from_timestamp_millis(value)
    } else {
        DateTime::from_timestamp(value, 0)
    }?;
    Some(tz.from_utc(&utc))
}

/// Parses the textual time formats seen in EPG APIs. Values without offset are local
/// times of the service timezone.
pub fn parse_datetime_str(value: &str, tz: &ServiceTimezone) -> Option<DateTime<FixedOffset>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if value.len() == 8 && value.bytes().all(|b| b.is_ascii_digit()) {
        return NaiveDate::parse_from_str(value, "%Y%m%d").ok().and_then(|date| tz.day_start(date));
    }
    if value.len() != 14 {
        if let Ok(epoch) = value.parse::<i64>() {
            return from_epoch(epoch, tz);
        }
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(tz.from_utc(&dt.with_timezone(&Utc)));
    }
    for format in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(value, format) {
            return Some(tz.from_utc(&dt.with_timezone(&Utc)));
        }
    }
    if let Some(utc_value) = value.strip_suffix('Z') {
        if let Ok(naive) = NaiveDateTime::parse_from_str(utc_value, "%Y-%m-%dT%H:%M") {
            return Some(tz.from_utc(&naive.and_utc()));
        }
    }
    if let Some(naive) = NAIVE_FORMATS.iter().find_map(|format| NaiveDateTime::parse_from_str(value, format).ok()) {
        return tz.from_local(&naive);
    }
    DATE_FORMATS.iter()
        .find_map(|format| NaiveDate::parse_from_str(value, format).ok())
        .and_then(|date| tz.day_start(date))
}

/// Positive fractional minutes as a duration, `None` when out of range.
pub fn minutes_to_duration(minutes: f64) -> Option<TimeDelta> {
    // the cast saturates, out of range values are rejected by try_seconds
    #[allow(clippy::cast_possible_truncation)]
    let seconds = (minutes * 60.0).round() as i64;
    TimeDelta::try_seconds(seconds).filter(|_| seconds > 0)
}

/// Durations are minutes (`"60"`) or clock notation (`"01:30"`, `"01:30:15"`).
pub fn parse_duration(value: &str) -> Option<TimeDelta> {
    let value = value.trim();
    if let Ok(minutes) = value.parse::<i64>() {
        return TimeDelta::try_minutes(minutes).filter(|_| minutes > 0);
    }
    if let Ok(minutes) = value.parse::<f64>() {
        return minutes_to_duration(minutes);
    }
    let caps = CLOCK_DURATION_REGEX.captures(value)?;
    let hours: i64 = caps[1].parse().ok()?;
    let minutes: i64 = caps[2].parse().ok()?;
    let seconds: i64 = caps.get(3).map_or(Some(0), |s| s.as_str().parse().ok())?;
    let total = hours * 3600 + minutes * 60 + seconds;
    TimeDelta::try_seconds(total).filter(|_| total > 0)
}

pub fn format_xmltv_time(dt: &DateTime<FixedOffset>) -> String {
    dt.format(XMLTV_TIME_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sao_paulo() -> ServiceTimezone {
        ServiceTimezone::parse("America/Sao_Paulo").unwrap()
    }

    #[test]
    fn test_parse_timezone() {
        assert_eq!(ServiceTimezone::parse("-03:00"), Some(ServiceTimezone::Fixed(FixedOffset::west_opt(3 * 3600).unwrap())));
        assert_eq!(ServiceTimezone::parse("+0530"), Some(ServiceTimezone::Fixed(FixedOffset::east_opt(5 * 3600 + 1800).unwrap())));
        assert_eq!(ServiceTimezone::parse("+00:00"), Some(ServiceTimezone::default()));
        assert_eq!(ServiceTimezone::parse("UTC"), Some(ServiceTimezone::default()));
        assert!(matches!(sao_paulo(), ServiceTimezone::Named(_)));
        assert_eq!(ServiceTimezone::parse("Mars/Olympus"), None);
    }

    #[test]
    fn test_parse_iso_with_and_without_offset() {
        let tz = sao_paulo();
        let with_offset = parse_datetime_str("2025-01-12T21:30:00Z", &tz).unwrap();
        assert_eq!(format_xmltv_time(&with_offset), "20250112183000 -0300");
        let naive = parse_datetime_str("2025-01-12 18:30:00", &tz).unwrap();
        assert_eq!(naive, with_offset);
        let xmltv = parse_datetime_str("20250112183000 -0300", &tz).unwrap();
        assert_eq!(xmltv, with_offset);
        let short_utc = parse_datetime_str("2025-01-12T21:30Z", &tz).unwrap();
        assert_eq!(short_utc, with_offset);
        assert!(parse_datetime_str("not a date", &tz).is_none());
    }

    #[test]
    fn test_parse_epoch_seconds_and_millis() {
        let tz = sao_paulo();
        let seconds = parse_datetime_str("1736717400", &tz).unwrap();
        let millis = from_epoch(1_736_717_400_000, &tz).unwrap();
        assert_eq!(seconds, millis);
        assert_eq!(format_xmltv_time(&seconds), "20250112183000 -0300");
    }

    #[test]
    fn test_offset_follows_dst() {
        let tz = ServiceTimezone::parse("Europe/Berlin").unwrap();
        let winter = parse_datetime_str("2025-01-12 12:00:00", &tz).unwrap();
        let summer = parse_datetime_str("2025-07-12 12:00:00", &tz).unwrap();
        assert_eq!(format_xmltv_time(&winter), "20250112120000 +0100");
        assert_eq!(format_xmltv_time(&summer), "20250712120000 +0200");
        // 02:30 does not exist on the spring-forward day
        let gap = parse_datetime_str("2025-03-30 02:30:00", &tz).unwrap();
        assert_eq!(format_xmltv_time(&gap), "20250330033000 +0200");
    }

    #[test]
    fn test_unix_day_bounds() {
        let tz = ServiceTimezone::parse("-03:00").unwrap();
        let date = NaiveDate::from_ymd_opt(2025, 1, 12).unwrap();
        let (start, end) = tz.unix_day_bounds(date).unwrap();
        assert_eq!(start, 1_736_650_800);
        assert_eq!(end - start, 86_399);
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("60"), Some(TimeDelta::minutes(60)));
        assert_eq!(parse_duration("01:30"), Some(TimeDelta::minutes(90)));
        assert_eq!(parse_duration("00:45:30"), Some(TimeDelta::seconds(45 * 60 + 30)));
        assert_eq!(parse_duration("0"), None);
        assert_eq!(parse_duration("abc"), None);
        assert_eq!(parse_duration("99999999999999999"), None);
        assert_eq!(parse_duration("1e18"), None);
        assert_eq!(parse_duration("NaN"), None);
    }

    #[test]
    fn test_out_of_range_epoch() {
        let tz = sao_paulo();
        assert_eq!(from_epoch(i64::MIN, &tz), None);
        assert_eq!(from_epoch(i64::MAX, &tz), None);
        assert_eq!(parse_datetime_str("-9223372036854775808", &tz), None);
    }

    #[test]
    fn test_date_only_values() {
        let tz = sao_paulo();
        let compact = parse_datetime_str("20250112", &tz).unwrap();
        assert_eq!(format_xmltv_time(&compact), "20250112000000 -0300");
        assert_eq!(parse_datetime_str("2025-01-12", &tz), Some(compact));
        assert_eq!(parse_datetime_str("12/01/2025", &tz), Some(compact));
        assert_eq!(parse_datetime_str("20251399", &tz), None);
    }
}
