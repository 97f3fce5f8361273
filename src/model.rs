use crate::error::ApiError;
use crate::time::parse_wall_clock;
use chrono::{FixedOffset, NaiveDate, NaiveTime};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

// The backend is loose about identifiers: employee and card numbers, door
// and reader numbers arrive either as JSON strings or as numbers.
#[derive(Deserialize)]
#[serde(untagged)]
enum LooseText {
    Text(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
}

impl From<LooseText> for String {
    fn from(value: LooseText) -> Self {
        match value {
            LooseText::Text(s) => s,
            LooseText::Integer(n) => n.to_string(),
            LooseText::Float(n) => n.to_string(),
            LooseText::Bool(b) => b.to_string(),
        }
    }
}

fn text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    LooseText::deserialize(deserializer).map(String::from)
}

fn optional_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Option::<LooseText>::deserialize(deserializer).map(|v| v.map(String::from))
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct AttendanceRecord {
    pub work_date: NaiveDate,
    #[serde(deserialize_with = "text")]
    pub employee_no: String,
    #[serde(default)]
    pub person_name: Option<String>,
    #[serde(default, deserialize_with = "optional_text")]
    pub card_no: Option<String>,
    #[serde(default)]
    pub check_in: Option<String>,
    #[serde(default)]
    pub check_out: Option<String>,
    #[serde(default)]
    pub total_minutes: Option<i64>,
}

impl AttendanceRecord {
    pub fn check_in_time(&self, offset: FixedOffset) -> Option<NaiveTime> {
        self.check_in
            .as_deref()
            .and_then(|raw| parse_wall_clock(raw, offset))
    }

    pub fn check_out_time(&self, offset: FixedOffset) -> Option<NaiveTime> {
        self.check_out
            .as_deref()
            .and_then(|raw| parse_wall_clock(raw, offset))
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct AccessEvent {
    pub work_date: NaiveDate,
    #[serde(deserialize_with = "text")]
    pub employee_no: String,
    #[serde(default)]
    pub person_name: Option<String>,
    #[serde(default, deserialize_with = "optional_text")]
    pub card_no: Option<String>,
    #[serde(default)]
    pub event_time: Option<String>,
    #[serde(default)]
    pub event_type: Option<String>,
    #[serde(default, deserialize_with = "optional_text")]
    pub door_no: Option<String>,
    #[serde(default, deserialize_with = "optional_text")]
    pub reader_no: Option<String>,
    #[serde(default)]
    pub device_ip: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PresentEmployee {
    #[serde(deserialize_with = "text")]
    pub employee_no: String,
    #[serde(default)]
    pub person_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Employee {
    #[serde(deserialize_with = "text")]
    pub employee_no: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "optional_text")]
    pub shift_id: Option<String>,
    #[serde(default)]
    pub has_details: bool,
}

impl Employee {
    /// Local view of an employee after its name and shift were cleared.
    pub fn cleared(&self) -> Self {
        Self {
            employee_no: self.employee_no.clone(),
            name: None,
            shift_id: None,
            has_details: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum Period {
    #[serde(rename = "AM", alias = "am")]
    Am,
    #[serde(rename = "PM", alias = "pm")]
    Pm,
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Period::Am => "AM",
            Period::Pm => "PM",
        })
    }
}

impl FromStr for Period {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "AM" => Ok(Period::Am),
            "PM" => Ok(Period::Pm),
            other => Err(format!("period must be AM or PM, got {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Shift {
    #[serde(alias = "_id", deserialize_with = "text")]
    pub id: String,
    pub start_time: String,
    pub start_period: Period,
    pub end_time: String,
    pub end_period: Period,
}

impl Shift {
    pub fn label(&self) -> String {
        format!(
            "{} {} - {} {}",
            self.start_time, self.start_period, self.end_time, self.end_period
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmployeeUpdate {
    pub employee_no: String,
    pub name: String,
    pub shift_id: String,
}

impl EmployeeUpdate {
    pub fn new(employee_no: &str, name: &str, shift_id: &str) -> Result<Self, ApiError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ApiError::invalid("Please enter a name"));
        }
        let shift_id = shift_id.trim();
        if shift_id.is_empty() {
            return Err(ApiError::invalid("Please select a shift"));
        }
        Ok(Self {
            employee_no: employee_no.to_string(),
            name: name.to_string(),
            shift_id: shift_id.to_string(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewShift {
    pub start_time: String,
    pub start_period: Period,
    pub end_time: String,
    pub end_period: Period,
}

impl NewShift {
    pub fn new(
        start_time: &str,
        start_period: Period,
        end_time: &str,
        end_period: Period,
    ) -> Result<Self, ApiError> {
        let (start_time, end_time) = (start_time.trim(), end_time.trim());
        if start_time.is_empty() || end_time.is_empty() {
            return Err(ApiError::invalid(
                "Please enter both start and end times for the shift",
            ));
        }
        for (value, period) in [(start_time, start_period), (end_time, end_period)] {
            NaiveTime::parse_from_str(&format!("{value} {period}"), "%I:%M %p").map_err(|_| {
                ApiError::invalid(format!("{value} {period} is not a 12-hour hh:mm time"))
            })?;
        }
        Ok(Self {
            start_time: start_time.to_string(),
            start_period,
            end_time: end_time.to_string(),
            end_period,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MonthlyEmployee {
    #[serde(deserialize_with = "text")]
    pub employee_no: String,
    #[serde(default)]
    pub person_name: Option<String>,
    #[serde(default)]
    pub total_days: u32,
    #[serde(default)]
    pub late_count: u32,
    #[serde(default)]
    pub early_count: u32,
    #[serde(default)]
    pub saturday_count: u32,
    #[serde(default)]
    pub sunday_count: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct DayRecord {
    #[serde(default)]
    pub check_in: Option<String>,
    #[serde(default)]
    pub check_out: Option<String>,
    #[serde(default)]
    pub total_minutes: Option<i64>,
    #[serde(default)]
    pub late_status: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct MonthlyAttendance {
    #[serde(default)]
    pub dates: Vec<NaiveDate>,
    #[serde(default)]
    pub employees: Vec<MonthlyEmployee>,
    #[serde(default)]
    pub attendance: BTreeMap<NaiveDate, HashMap<String, DayRecord>>,
}

impl MonthlyAttendance {
    pub fn day(&self, date: NaiveDate, employee_no: &str) -> Option<&DayRecord> {
        self.attendance.get(&date)?.get(employee_no)
    }

    pub fn total_minutes(&self, employee_no: &str) -> i64 {
        self.dates
            .iter()
            .filter_map(|date| self.day(*date, employee_no))
            .filter_map(|record| record.total_minutes)
            .sum()
    }
}
