//! The site works a 2 PM to 7 AM overnight shift, so the running shift spans
//! two work dates.

use crate::model::AttendanceRecord;
use chrono::{Duration, FixedOffset, NaiveDate, NaiveTime, Timelike};

pub const MORNING_CUTOFF_HOUR: u32 = 7;
pub const AFTERNOON_START_HOUR: u32 = 14;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShiftPhase {
    EarlyMorning,
    Afternoon,
    Midday,
}

impl ShiftPhase {
    pub fn at(now: NaiveTime) -> Self {
        let hour = now.hour();
        if hour < MORNING_CUTOFF_HOUR {
            ShiftPhase::EarlyMorning
        } else if hour >= AFTERNOON_START_HOUR {
            ShiftPhase::Afternoon
        } else {
            ShiftPhase::Midday
        }
    }

    pub fn caption(&self) -> &'static str {
        match self {
            ShiftPhase::EarlyMorning => "Showing overnight shift from yesterday",
            ShiftPhase::Afternoon => "Showing afternoon shift starting at 2 PM",
            ShiftPhase::Midday => "Showing morning hours from previous shift",
        }
    }
}

fn before_cutoff(time: Option<NaiveTime>) -> bool {
    time.is_some_and(|t| t.hour() < MORNING_CUTOFF_HOUR)
}

#[derive(Debug, Clone, Copy)]
pub struct ShiftWindow {
    reference: NaiveDate,
    now: NaiveTime,
    offset: FixedOffset,
}

impl ShiftWindow {
    pub fn new(reference: NaiveDate, now: NaiveTime, offset: FixedOffset) -> Self {
        Self {
            reference,
            now,
            offset,
        }
    }

    pub fn reference(&self) -> NaiveDate {
        self.reference
    }

    pub fn phase(&self) -> ShiftPhase {
        ShiftPhase::at(self.now)
    }

    /// Inclusive work-date range that has to be loaded to classify the window.
    pub fn fetch_range(&self) -> (NaiveDate, NaiveDate) {
        let day = Duration::days(1);
        match self.phase() {
            ShiftPhase::Afternoon => (self.reference, self.reference + day),
            ShiftPhase::EarlyMorning | ShiftPhase::Midday => (self.reference - day, self.reference),
        }
    }

    pub fn contains(&self, record: &AttendanceRecord) -> bool {
        is_current_shift(record, self.reference, self.now, self.offset)
    }
}

/// Clock values on the record are read in `offset`.
pub fn is_current_shift(
    record: &AttendanceRecord,
    reference: NaiveDate,
    now: NaiveTime,
    offset: FixedOffset,
) -> bool {
    let day = Duration::days(1);
    let yesterday = reference - day;
    let tomorrow = reference + day;

    match ShiftPhase::at(now) {
        ShiftPhase::EarlyMorning => {
            record.work_date == yesterday
                || (record.work_date == reference && before_cutoff(record.check_in_time(offset)))
        }
        ShiftPhase::Afternoon => {
            record.work_date == reference
                || (record.work_date == tomorrow && before_cutoff(record.check_in_time(offset)))
        }
        ShiftPhase::Midday => {
            (record.work_date == reference
                && (record.check_in_time(offset).is_none() || now.hour() < AFTERNOON_START_HOUR))
                || (record.work_date == yesterday && before_cutoff(record.check_out_time(offset)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pkt() -> FixedOffset {
        FixedOffset::east_opt(5 * 3600).unwrap()
    }

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    fn at(hour: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(hour, 0, 0).unwrap()
    }

    fn record(day: u32, check_in: Option<&str>, check_out: Option<&str>) -> AttendanceRecord {
        AttendanceRecord {
            work_date: date(day),
            employee_no: "E1".to_string(),
            person_name: None,
            card_no: None,
            check_in: check_in.map(str::to_string),
            check_out: check_out.map(str::to_string),
            total_minutes: None,
        }
    }

    #[test]
    fn early_morning_takes_yesterday_and_todays_early_check_ins() {
        let now = at(3);
        let today = date(10);
        assert!(is_current_shift(&record(9, Some("15:00"), Some("23:00")), today, now, pkt()));
        assert!(is_current_shift(&record(9, None, None), today, now, pkt()));
        assert!(is_current_shift(&record(10, Some("06:30"), None), today, now, pkt()));
        assert!(!is_current_shift(&record(10, Some("08:00"), None), today, now, pkt()));
        assert!(!is_current_shift(&record(10, None, None), today, now, pkt()));
        assert!(!is_current_shift(&record(8, None, None), today, now, pkt()));
    }

    #[test]
    fn afternoon_takes_today_and_tomorrows_early_check_ins() {
        let now = at(15);
        let today = date(10);
        assert!(is_current_shift(&record(10, Some("14:05"), None), today, now, pkt()));
        assert!(is_current_shift(&record(11, Some("05:00"), None), today, now, pkt()));
        assert!(!is_current_shift(&record(11, Some("09:00"), None), today, now, pkt()));
        assert!(!is_current_shift(&record(9, Some("05:00"), None), today, now, pkt()));
    }

    #[test]
    fn midday_takes_today_and_yesterdays_overnight_check_outs() {
        let now = at(10);
        let today = date(10);
        assert!(is_current_shift(&record(10, None, None), today, now, pkt()));
        assert!(is_current_shift(&record(10, Some("08:30"), None), today, now, pkt()));
        assert!(is_current_shift(&record(9, Some("14:00"), Some("06:45")), today, now, pkt()));
        assert!(!is_current_shift(&record(9, Some("09:00"), Some("16:00")), today, now, pkt()));
        assert!(!is_current_shift(&record(9, Some("14:00"), None), today, now, pkt()));
    }

    #[test]
    fn phase_boundaries() {
        assert_eq!(ShiftPhase::at(NaiveTime::from_hms_opt(6, 59, 59).unwrap()), ShiftPhase::EarlyMorning);
        assert_eq!(ShiftPhase::at(at(7)), ShiftPhase::Midday);
        assert_eq!(ShiftPhase::at(NaiveTime::from_hms_opt(13, 59, 0).unwrap()), ShiftPhase::Midday);
        assert_eq!(ShiftPhase::at(at(14)), ShiftPhase::Afternoon);
    }

    #[test]
    fn cutoff_is_exclusive_of_seven() {
        let today = date(10);
        assert!(!is_current_shift(&record(10, Some("07:00"), None), today, at(2), pkt()));
        assert!(is_current_shift(&record(10, Some("06:59"), None), today, at(2), pkt()));
    }

    #[test]
    fn iso_check_ins_are_read_in_the_configured_zone() {
        // 01:30 UTC is 06:30 in UTC+5
        let r = record(11, Some("2024-03-11T01:30:00Z"), None);
        assert!(is_current_shift(&r, date(10), at(16), pkt()));
        let utc = FixedOffset::east_opt(0).unwrap();
        assert!(is_current_shift(&r, date(10), at(16), utc));
        // 03:00 UTC is 08:00 in UTC+5, past the cutoff
        let late = record(11, Some("2024-03-11T03:00:00Z"), None);
        assert!(!is_current_shift(&late, date(10), at(16), pkt()));
        assert!(is_current_shift(&late, date(10), at(16), utc));
    }

    #[test]
    fn fetch_range_follows_phase() {
        let window = |hour| ShiftWindow::new(date(10), at(hour), pkt());
        assert_eq!(window(3).fetch_range(), (date(9), date(10)));
        assert_eq!(window(10).fetch_range(), (date(9), date(10)));
        assert_eq!(window(20).fetch_range(), (date(10), date(11)));
    }
}
