use crate::model::{AccessEvent, AttendanceRecord};
use anyhow::{Context, Result, anyhow};
use chrono::NaiveDate;
use csv::{QuoteStyle, Terminator, WriterBuilder};
use std::path::{Path, PathBuf};

pub trait CsvRow {
    fn headers() -> &'static [&'static str];
    fn values(&self) -> Vec<Option<String>>;
}

impl<T: CsvRow> CsvRow for &T {
    fn headers() -> &'static [&'static str] {
        T::headers()
    }

    fn values(&self) -> Vec<Option<String>> {
        (*self).values()
    }
}

impl CsvRow for AttendanceRecord {
    fn headers() -> &'static [&'static str] {
        &[
            "work_date",
            "employee_no",
            "person_name",
            "card_no",
            "check_in",
            "check_out",
            "total_minutes",
        ]
    }

    fn values(&self) -> Vec<Option<String>> {
        vec![
            Some(self.work_date.to_string()),
            Some(self.employee_no.clone()),
            self.person_name.clone(),
            self.card_no.clone(),
            self.check_in.clone(),
            self.check_out.clone(),
            self.total_minutes.map(|m| m.to_string()),
        ]
    }
}

impl CsvRow for AccessEvent {
    fn headers() -> &'static [&'static str] {
        &[
            "work_date",
            "employee_no",
            "person_name",
            "card_no",
            "event_time",
            "event_type",
            "door_no",
            "reader_no",
            "device_ip",
        ]
    }

    fn values(&self) -> Vec<Option<String>> {
        vec![
            Some(self.work_date.to_string()),
            Some(self.employee_no.clone()),
            self.person_name.clone(),
            self.card_no.clone(),
            self.event_time.clone(),
            self.event_type.clone(),
            self.door_no.clone(),
            self.reader_no.clone(),
            self.device_ip.clone(),
        ]
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CsvDialect {
    /// Bare header, every value wrapped in quotes, no escaping.
    #[default]
    Legacy,
    /// Every field quoted with embedded quotes doubled.
    Strict,
}

pub fn to_csv<R: CsvRow>(rows: &[R], dialect: CsvDialect) -> Result<String> {
    if rows.is_empty() {
        return Ok(String::new());
    }
    match dialect {
        CsvDialect::Legacy => Ok(legacy_csv(rows)),
        CsvDialect::Strict => strict_csv(rows),
    }
}

fn legacy_csv<R: CsvRow>(rows: &[R]) -> String {
    let mut lines = Vec::with_capacity(rows.len() + 1);
    lines.push(R::headers().join(","));
    for row in rows {
        let quoted: Vec<String> = row
            .values()
            .into_iter()
            .map(|v| format!("\"{}\"", v.unwrap_or_default()))
            .collect();
        lines.push(quoted.join(","));
    }
    lines.join("\n")
}

fn strict_csv<R: CsvRow>(rows: &[R]) -> Result<String> {
    let mut wtr = WriterBuilder::new()
        .quote_style(QuoteStyle::Always)
        .terminator(Terminator::Any(b'\n'))
        .from_writer(Vec::new());
    wtr.write_record(R::headers())?;
    for row in rows {
        wtr.write_record(row.values().into_iter().map(Option::unwrap_or_default))?;
    }
    let bytes = wtr
        .into_inner()
        .map_err(|e| anyhow!("flushing CSV buffer: {}", e.error()))?;
    let text = String::from_utf8(bytes)?;
    Ok(text.trim_end_matches('\n').to_string())
}

pub fn ensure_csv_extension(filename: &str) -> PathBuf {
    if filename.ends_with(".csv") {
        PathBuf::from(filename)
    } else {
        PathBuf::from(format!("{}.csv", filename))
    }
}

pub fn day_file_name(prefix: &str, date: NaiveDate) -> PathBuf {
    PathBuf::from(format!("{prefix}-{date}.csv"))
}

pub fn range_file_name(prefix: &str, start: NaiveDate, end: NaiveDate) -> PathBuf {
    PathBuf::from(format!("{prefix}-{start}-to-{end}.csv"))
}

/// Writes the rows to `path`. Returns `false` without touching the file
/// system when there is nothing to export.
pub fn write_csv<R: CsvRow>(path: &Path, rows: &[R], dialect: CsvDialect) -> Result<bool> {
    if rows.is_empty() {
        tracing::warn!("nothing to export to {}", path.display());
        return Ok(false);
    }
    let text = to_csv(rows, dialect)?;
    std::fs::write(path, text).with_context(|| format!("writing {}", path.display()))?;
    tracing::info!(rows = rows.len(), "exported CSV to {}", path.display());
    Ok(true)
}
