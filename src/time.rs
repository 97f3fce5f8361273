use anyhow::{Result, anyhow};
use chrono::format::{self, Parsed, StrftimeItems};
use chrono::{
    DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Utc,
};
use std::fmt;
use std::str::FromStr;

/// Parses a `+HH:MM` / `-HH:MM` offset, or `Z`.
pub fn parse_utc_offset(value: &str) -> Result<FixedOffset> {
    let value = value.trim();
    if value.eq_ignore_ascii_case("z") || value.eq_ignore_ascii_case("utc") {
        return FixedOffset::east_opt(0).ok_or_else(|| anyhow!("invalid UTC offset"));
    }

    let mut parsed = Parsed::new();
    format::parse(&mut parsed, value, StrftimeItems::new("%:z"))
        .and_then(|()| parsed.to_fixed_offset())
        .map_err(|e| anyhow!("invalid UTC offset {value:?}: {e}"))
}

pub fn now_in(offset: FixedOffset) -> DateTime<FixedOffset> {
    Utc::now().with_timezone(&offset)
}

pub fn today_in(offset: FixedOffset) -> NaiveDate {
    now_in(offset).date_naive()
}

pub fn parse_time_string(time_str: &str) -> Result<NaiveTime> {
    let time_str = time_str.trim();

    if let Ok(time) = NaiveTime::parse_from_str(time_str, "%H:%M") {
        return Ok(time);
    }

    if let Ok(time) = NaiveTime::parse_from_str(time_str, "%H:%M:%S") {
        return Ok(time);
    }

    Err(anyhow!("Invalid time format. Use HH:MM or HH:MM:SS"))
}

/// Reads a wall-clock value as the backend sends it: either a bare `HH:MM`
/// or a full timestamp. Zoned timestamps are shifted into `offset`; naive
/// ones are taken as already local.
pub fn parse_wall_clock(raw: &str, offset: FixedOffset) -> Option<NaiveTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(time) = parse_time_string(raw) {
        return Some(time);
    }
    if let Ok(stamp) = DateTime::parse_from_rfc3339(raw) {
        return Some(stamp.with_timezone(&offset).time());
    }
    for pattern in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(stamp) = NaiveDateTime::parse_from_str(raw, pattern) {
            return Some(stamp.time());
        }
    }
    None
}

pub fn format_clock_12h(time: NaiveTime) -> String {
    time.format("%-I:%M %p").to_string()
}

// Unparseable values are shown verbatim.
pub fn display_wall_clock(raw: Option<&str>, offset: FixedOffset) -> String {
    match raw {
        None => "—".to_string(),
        Some(value) if value.trim().is_empty() => "—".to_string(),
        Some(value) => parse_wall_clock(value, offset)
            .map(format_clock_12h)
            .unwrap_or_else(|| value.to_string()),
    }
}

pub fn format_duration_minutes(minutes: i64) -> String {
    format!("{}h {}m", minutes / 60, minutes % 60)
}

pub fn dates_between(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    let mut dates = Vec::new();
    let mut day = start;
    while day <= end {
        dates.push(day);
        day += Duration::days(1);
    }
    dates
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct YearMonth {
    pub year: i32,
    pub month: u32,
}

impl YearMonth {
    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date.year() == self.year && date.month() == self.month
    }
}

impl FromStr for YearMonth {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let (year, month) = s
            .trim()
            .split_once('-')
            .ok_or_else(|| anyhow!("month must look like YYYY-MM: {s}"))?;
        let year: i32 = year.parse().map_err(|_| anyhow!("invalid year in {s}"))?;
        let month: u32 = month.parse().map_err(|_| anyhow!("invalid month in {s}"))?;
        if !(1..=12).contains(&month) {
            return Err(anyhow!("month out of range in {s}"));
        }
        Ok(Self { year, month })
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}
