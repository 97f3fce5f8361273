use crate::model::{DayRecord, MonthlyAttendance};
use crate::time::{YearMonth, format_duration_minutes};
use anyhow::{Context, Result};
use chrono::{Datelike, NaiveDate, Weekday};
use rust_xlsxwriter::{Color, Format, FormatAlign, FormatBorder, Workbook, Worksheet};
use std::path::{Path, PathBuf};

pub const SUMMARY_HEADERS: [&str; 7] = [
    "Employee",
    "Total Days",
    "Late Days",
    "On Time Days",
    "Total Hours",
    "Saturday Days",
    "SUNDAY Days",
];

const SHEET_NAME: &str = "Attendance";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayKind {
    Weekday,
    Saturday,
    Sunday,
}

impl DayKind {
    pub fn of(date: NaiveDate) -> Self {
        match date.weekday() {
            Weekday::Sat => DayKind::Saturday,
            Weekday::Sun => DayKind::Sunday,
            _ => DayKind::Weekday,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum GridCell {
    Text(String),
    Number(f64),
}

#[derive(Debug, Clone, PartialEq)]
pub struct MonthlyGrid {
    pub header: Vec<String>,
    pub day_kinds: Vec<DayKind>,
    pub rows: Vec<Vec<GridCell>>,
}

fn date_header(date: NaiveDate) -> String {
    let label = format!("{} ({})", date, date.format("%a"));
    match DayKind::of(date) {
        DayKind::Sunday => format!("🔴 {label}"),
        DayKind::Saturday => format!("🟣 {label}"),
        DayKind::Weekday => label,
    }
}

fn present(value: &Option<String>) -> Option<String> {
    value.as_deref().filter(|s| !s.is_empty()).map(str::to_string)
}

fn day_cell(record: Option<&DayRecord>, kind: DayKind) -> String {
    if let Some(record) = record {
        let (check_in, check_out) = (present(&record.check_in), present(&record.check_out));
        if check_in.is_some() || check_out.is_some() {
            let mut parts: Vec<String> = Vec::new();
            parts.extend(check_in);
            parts.extend(check_out);
            if let Some(minutes) = record.total_minutes.filter(|m| *m != 0) {
                parts.push(format_duration_minutes(minutes));
            }
            parts.extend(present(&record.late_status));
            return parts.join("\n");
        }
    }

    match kind {
        DayKind::Sunday => "🔴 SUNDAY - RED DAY".to_string(),
        DayKind::Saturday => "🟣 Saturday".to_string(),
        DayKind::Weekday => String::new(),
    }
}

pub fn build_monthly_grid(data: &MonthlyAttendance) -> MonthlyGrid {
    let mut header: Vec<String> = SUMMARY_HEADERS.iter().map(|h| h.to_string()).collect();
    header.extend(data.dates.iter().map(|d| date_header(*d)));
    let day_kinds = data.dates.iter().map(|d| DayKind::of(*d)).collect();

    let rows = data
        .employees
        .iter()
        .map(|emp| {
            let total_minutes = data.total_minutes(&emp.employee_no);
            let total_hours = if total_minutes > 0 {
                format_duration_minutes(total_minutes)
            } else {
                "N/A".to_string()
            };

            let mut row = vec![
                GridCell::Text(format!(
                    "{} ({})",
                    emp.person_name.as_deref().unwrap_or("Unknown"),
                    emp.employee_no
                )),
                GridCell::Number(emp.total_days as f64),
                GridCell::Number(emp.late_count as f64),
                GridCell::Number(emp.early_count as f64),
                GridCell::Text(total_hours),
                GridCell::Number(emp.saturday_count as f64),
                GridCell::Number(emp.sunday_count as f64),
            ];
            row.extend(data.dates.iter().map(|date| {
                GridCell::Text(day_cell(
                    data.day(*date, &emp.employee_no),
                    DayKind::of(*date),
                ))
            }));
            row
        })
        .collect();

    MonthlyGrid {
        header,
        day_kinds,
        rows,
    }
}

struct ReportFormats {
    header: Format,
    cell: Format,
    saturday_header: Format,
    saturday_cell: Format,
    sunday_header: Format,
    sunday_cell: Format,
    name: Format,
}

impl ReportFormats {
    fn new() -> Self {
        let header = Format::new()
            .set_bold()
            .set_border(FormatBorder::Thin)
            .set_align(FormatAlign::Center)
            .set_align(FormatAlign::VerticalCenter)
            .set_text_wrap();
        let cell = Format::new()
            .set_border(FormatBorder::Thin)
            .set_align(FormatAlign::Center)
            .set_align(FormatAlign::VerticalCenter)
            .set_text_wrap();
        Self {
            saturday_header: header.clone().set_background_color(Color::RGB(0xFAF5FF)),
            saturday_cell: cell.clone().set_background_color(Color::RGB(0xFAF5FF)),
            sunday_header: header.clone().set_background_color(Color::RGB(0xFEE2E2)),
            sunday_cell: cell.clone().set_background_color(Color::RGB(0xFEF2F2)),
            name: Format::new()
                .set_align(FormatAlign::Left)
                .set_border(FormatBorder::Thin)
                .set_bold()
                .set_align(FormatAlign::VerticalCenter),
            header,
            cell,
        }
    }

    fn for_column(&self, kind: Option<DayKind>, is_header: bool) -> &Format {
        match (kind, is_header) {
            (Some(DayKind::Saturday), true) => &self.saturday_header,
            (Some(DayKind::Saturday), false) => &self.saturday_cell,
            (Some(DayKind::Sunday), true) => &self.sunday_header,
            (Some(DayKind::Sunday), false) => &self.sunday_cell,
            (_, true) => &self.header,
            (_, false) => &self.cell,
        }
    }
}

fn write_cell(ws: &mut Worksheet, row: u32, col: u16, cell: &GridCell, fmt: &Format) -> Result<()> {
    match cell {
        GridCell::Text(text) => ws.write_string_with_format(row, col, text, fmt)?,
        GridCell::Number(value) => ws.write_number_with_format(row, col, *value, fmt)?,
    };
    Ok(())
}

pub fn monthly_workbook(grid: &MonthlyGrid) -> Result<Workbook> {
    let fmt = ReportFormats::new();
    let mut workbook = Workbook::new();
    let ws = workbook.add_worksheet();
    ws.set_name(SHEET_NAME)?;

    let summary_cols = SUMMARY_HEADERS.len();
    let kind_of = |col: usize| col.checked_sub(summary_cols).and_then(|i| grid.day_kinds.get(i).copied());

    for (col, title) in grid.header.iter().enumerate() {
        ws.write_string_with_format(0, col as u16, title, fmt.for_column(kind_of(col), true))?;
    }

    for (i, cells) in grid.rows.iter().enumerate() {
        let row = i as u32 + 1;
        for (col, cell) in cells.iter().enumerate() {
            let format = if col == 0 {
                &fmt.name
            } else {
                fmt.for_column(kind_of(col), false)
            };
            write_cell(ws, row, col as u16, cell, format)?;
        }
    }

    ws.set_row_height(0, 30)?;
    ws.set_column_width(0, 28)?;
    for col in 1..summary_cols {
        ws.set_column_width(col as u16, 12)?;
    }
    for col in summary_cols..grid.header.len() {
        ws.set_column_width(col as u16, 18)?;
    }
    ws.set_freeze_panes(1, 1)?;

    Ok(workbook)
}

pub fn default_report_path(month: YearMonth) -> PathBuf {
    PathBuf::from(format!("{month}_attendance.xlsx"))
}

pub fn save_monthly_report(data: &MonthlyAttendance, path: &Path) -> Result<()> {
    let grid = build_monthly_grid(data);
    let mut workbook = monthly_workbook(&grid)?;
    workbook
        .save(path)
        .with_context(|| format!("saving {}", path.display()))?;
    tracing::info!(
        employees = grid.rows.len(),
        days = grid.day_kinds.len(),
        "monthly report written to {}",
        path.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MonthlyEmployee;
    use std::collections::{BTreeMap, HashMap};

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    fn sample() -> MonthlyAttendance {
        // 2024-03-01 is a Friday
        let dates = vec![date(1), date(2), date(3)];
        let mut attendance = BTreeMap::new();
        attendance.insert(
            date(1),
            HashMap::from([(
                "E1".to_string(),
                DayRecord {
                    check_in: Some("14:05".into()),
                    check_out: Some("23:10".into()),
                    total_minutes: Some(545),
                    late_status: Some("Late".into()),
                },
            )]),
        );
        MonthlyAttendance {
            dates,
            employees: vec![
                MonthlyEmployee {
                    employee_no: "E1".into(),
                    person_name: Some("Usman".into()),
                    total_days: 1,
                    late_count: 1,
                    early_count: 0,
                    saturday_count: 0,
                    sunday_count: 0,
                },
                MonthlyEmployee {
                    employee_no: "E2".into(),
                    person_name: None,
                    total_days: 0,
                    late_count: 0,
                    early_count: 0,
                    saturday_count: 0,
                    sunday_count: 0,
                },
            ],
            attendance,
        }
    }

    #[test]
    fn header_marks_weekends() {
        let grid = build_monthly_grid(&sample());
        assert_eq!(grid.header.len(), SUMMARY_HEADERS.len() + 3);
        assert_eq!(grid.header[7], "2024-03-01 (Fri)");
        assert_eq!(grid.header[8], "🟣 2024-03-02 (Sat)");
        assert_eq!(grid.header[9], "🔴 2024-03-03 (Sun)");
        assert_eq!(
            grid.day_kinds,
            vec![DayKind::Weekday, DayKind::Saturday, DayKind::Sunday]
        );
    }

    #[test]
    fn rows_carry_summary_and_daily_cells() {
        let grid = build_monthly_grid(&sample());
        let first = &grid.rows[0];
        assert_eq!(first[0], GridCell::Text("Usman (E1)".into()));
        assert_eq!(first[2], GridCell::Number(1.0));
        assert_eq!(first[4], GridCell::Text("9h 5m".into()));
        assert_eq!(first[7], GridCell::Text("14:05\n23:10\n9h 5m\nLate".into()));
        assert_eq!(first[8], GridCell::Text("🟣 Saturday".into()));
        assert_eq!(first[9], GridCell::Text("🔴 SUNDAY - RED DAY".into()));

        let second = &grid.rows[1];
        assert_eq!(second[0], GridCell::Text("Unknown (E2)".into()));
        assert_eq!(second[4], GridCell::Text("N/A".into()));
        assert_eq!(second[7], GridCell::Text(String::new()));
    }

    #[test]
    fn only_check_out_still_counts_as_attended() {
        let record = DayRecord {
            check_out: Some("06:40".into()),
            ..DayRecord::default()
        };
        assert_eq!(day_cell(Some(&record), DayKind::Sunday), "06:40");
        assert_eq!(day_cell(Some(&DayRecord::default()), DayKind::Weekday), "");
    }

    #[test]
    fn blank_times_do_not_count_as_attended() {
        let blank = DayRecord {
            check_in: Some(String::new()),
            ..DayRecord::default()
        };
        assert_eq!(day_cell(Some(&blank), DayKind::Sunday), "🔴 SUNDAY - RED DAY");
        assert_eq!(day_cell(Some(&blank), DayKind::Saturday), "🟣 Saturday");

        let out_only = DayRecord {
            check_in: Some(String::new()),
            check_out: Some("06:40".into()),
            ..DayRecord::default()
        };
        assert_eq!(day_cell(Some(&out_only), DayKind::Weekday), "06:40");
    }

    #[test]
    fn workbook_serialises() {
        let grid = build_monthly_grid(&sample());
        let mut workbook = monthly_workbook(&grid).unwrap();
        let bytes = workbook.save_to_buffer().unwrap();
        assert!(bytes.starts_with(b"PK"));
    }

    #[test]
    fn report_path_uses_month() {
        let month: YearMonth = "2024-03".parse().unwrap();
        assert_eq!(default_report_path(month), PathBuf::from("2024-03_attendance.xlsx"));
    }
}
