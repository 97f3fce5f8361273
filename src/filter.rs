use crate::model::{AccessEvent, AttendanceRecord, Employee};
use crate::shift::ShiftWindow;
use crate::time::{YearMonth, dates_between};
use chrono::NaiveDate;
use std::collections::{HashMap, HashSet};

pub trait Searchable {
    fn employee_no(&self) -> &str;
    fn matches_text(&self, query: &str, query_lower: &str) -> bool;
}

fn contains(field: Option<&str>, needle: &str) -> bool {
    field.is_some_and(|value| value.contains(needle))
}

fn contains_ignore_case(field: Option<&str>, needle_lower: &str) -> bool {
    field.is_some_and(|value| value.to_lowercase().contains(needle_lower))
}

impl Searchable for AttendanceRecord {
    fn employee_no(&self) -> &str {
        &self.employee_no
    }

    fn matches_text(&self, query: &str, query_lower: &str) -> bool {
        contains_ignore_case(self.person_name.as_deref(), query_lower)
            || self.employee_no.contains(query)
            || contains(self.card_no.as_deref(), query)
    }
}

impl Searchable for AccessEvent {
    fn employee_no(&self) -> &str {
        &self.employee_no
    }

    fn matches_text(&self, query: &str, query_lower: &str) -> bool {
        contains_ignore_case(self.person_name.as_deref(), query_lower)
            || self.employee_no.contains(query)
            || contains(self.card_no.as_deref(), query)
            || contains_ignore_case(self.event_type.as_deref(), query_lower)
            || contains(self.device_ip.as_deref(), query)
    }
}

#[derive(Debug, Clone, Default)]
pub struct SearchFilter {
    query: String,
    query_lower: String,
    employee: Option<String>,
}

impl SearchFilter {
    pub fn new(query: Option<&str>, employee: Option<&str>) -> Self {
        let query = query.unwrap_or_default().to_string();
        Self {
            query_lower: query.to_lowercase(),
            query,
            employee: employee.filter(|e| !e.is_empty()).map(str::to_string),
        }
    }

    pub fn matches<T: Searchable>(&self, row: &T) -> bool {
        let text = self.query.is_empty() || row.matches_text(&self.query, &self.query_lower);
        let employee = self
            .employee
            .as_deref()
            .is_none_or(|wanted| row.employee_no() == wanted);
        text && employee
    }

    pub fn apply<'a, T: Searchable>(&self, rows: &'a [T]) -> Vec<&'a T> {
        rows.iter().filter(|row| self.matches(*row)).collect()
    }
}

pub fn distinct_employees<T: Searchable>(rows: &[T]) -> Vec<String> {
    let mut seen = HashSet::new();
    rows.iter()
        .map(Searchable::employee_no)
        .filter(|no| seen.insert(*no))
        .map(str::to_string)
        .collect()
}

pub fn available_months(records: &[AttendanceRecord]) -> Vec<YearMonth> {
    let mut months: Vec<YearMonth> = records
        .iter()
        .map(|r| YearMonth::of(r.work_date))
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();
    months.sort_by(|a, b| b.cmp(a));
    months
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MissingRecord {
    pub date: NaiveDate,
    pub employee_no: String,
}

/// Every (date, employee) pair in the range with no attendance record, for
/// the employees that appear anywhere in `records`.
pub fn missing_records(
    records: &[AttendanceRecord],
    start: NaiveDate,
    end: NaiveDate,
) -> Vec<MissingRecord> {
    if records.is_empty() {
        return Vec::new();
    }
    let employees = distinct_employees(records);
    let present: HashSet<(NaiveDate, &str)> = records
        .iter()
        .map(|r| (r.work_date, r.employee_no.as_str()))
        .collect();

    let mut missing = Vec::new();
    for date in dates_between(start, end) {
        for employee_no in &employees {
            if !present.contains(&(date, employee_no.as_str())) {
                missing.push(MissingRecord {
                    date,
                    employee_no: employee_no.clone(),
                });
            }
        }
    }
    missing
}

pub fn missing_from_shift(records: &[AttendanceRecord], window: &ShiftWindow) -> Vec<String> {
    let on_shift: HashSet<&str> = records
        .iter()
        .filter(|r| window.contains(r))
        .map(|r| r.employee_no.as_str())
        .collect();
    distinct_employees(records)
        .into_iter()
        .filter(|no| !on_shift.contains(no.as_str()))
        .collect()
}

pub fn events_for<'a>(
    events: &'a [AccessEvent],
    date: NaiveDate,
    employee_no: &str,
) -> Vec<&'a AccessEvent> {
    events
        .iter()
        .filter(|e| e.work_date == date && e.employee_no == employee_no)
        .collect()
}

pub fn swipe_counts(events: &[AccessEvent]) -> HashMap<(NaiveDate, &str), usize> {
    let mut counts = HashMap::new();
    for event in events {
        *counts
            .entry((event.work_date, event.employee_no.as_str()))
            .or_insert(0) += 1;
    }
    counts
}

pub fn partition_by_details(employees: &[Employee]) -> (Vec<&Employee>, Vec<&Employee>) {
    employees.iter().partition(|e| e.has_details)
}
