mod client;
mod config;
mod dashboard;
mod error;
mod export;
mod filter;
mod model;
mod report;
mod shift;
mod time;
mod view;

use anyhow::{Result, anyhow};
use chrono::{FixedOffset, NaiveDate};
use clap::{Parser, Subcommand};
use client::ApiClient;
use config::Config;
use dashboard::{EmployeeDirectory, HomeData};
use export::{CsvDialect, CsvRow};
use filter::SearchFilter;
use model::{AccessEvent, AttendanceRecord, EmployeeUpdate, NewShift, Period};
use std::path::{Path, PathBuf};
use std::time::Duration;
use time::{YearMonth, display_wall_clock, format_duration_minutes};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use view::{Status, ViewState};

#[derive(Parser, Debug)]
#[command(author, version, about = "Attendance and door-access dashboard", long_about = None)]
struct Args {
    /// Backend base URL (overrides SHIFTBOARD_API_BASE)
    #[arg(long, global = true)]
    api_base: Option<String>,

    /// Time zone of the site, e.g. +05:00 (overrides SHIFTBOARD_UTC_OFFSET)
    #[arg(long, global = true, allow_hyphen_values = true)]
    utc_offset: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Records of the shift that is running now
    Today(TodayArgs),
    /// Attendance over a date range, with missing-record detection
    History(HistoryArgs),
    /// Raw door-access events
    Events(EventsArgs),
    /// Every swipe behind one employee's attendance on one day
    Swipes(SwipesArgs),
    /// Monthly attendance grid and spreadsheet export
    Monthly(MonthlyArgs),
    /// Employee names and shift assignments
    #[command(subcommand)]
    Employees(EmployeesCommand),
    /// Configured shifts
    #[command(subcommand)]
    Shifts(ShiftsCommand),
}

#[derive(clap::Args, Debug)]
struct SearchArgs {
    /// Search by name, employee #, or card #
    #[arg(short, long)]
    query: Option<String>,

    /// Only this employee number
    #[arg(short, long)]
    employee: Option<String>,
}

impl SearchArgs {
    fn filter(&self) -> SearchFilter {
        SearchFilter::new(self.query.as_deref(), self.employee.as_deref())
    }
}

#[derive(clap::Args, Debug)]
struct CsvArgs {
    /// Export the filtered rows; the file name defaults to the page's
    #[arg(long, value_name = "FILE", num_args = 0..=1)]
    csv: Option<Option<String>>,

    /// Quote every field and escape embedded quotes
    #[arg(long)]
    strict_csv: bool,
}

impl CsvArgs {
    fn dialect(&self) -> CsvDialect {
        if self.strict_csv {
            CsvDialect::Strict
        } else {
            CsvDialect::Legacy
        }
    }

    fn target(&self, default: impl FnOnce() -> PathBuf) -> Option<PathBuf> {
        self.csv.as_ref().map(|name| match name {
            Some(name) => export::ensure_csv_extension(name),
            None => default(),
        })
    }
}

#[derive(clap::Args, Debug)]
struct TodayArgs {
    /// Anchor date, defaults to today
    #[arg(short, long)]
    date: Option<NaiveDate>,

    #[command(flatten)]
    search: SearchArgs,

    #[command(flatten)]
    csv: CsvArgs,

    /// Refresh every N seconds until interrupted
    #[arg(short, long, value_name = "SECONDS")]
    watch: Option<u64>,
}

#[derive(clap::Args, Debug)]
struct HistoryArgs {
    /// First work date, defaults to 30 days ago
    #[arg(long)]
    start: Option<NaiveDate>,

    /// Last work date, defaults to today
    #[arg(long)]
    end: Option<NaiveDate>,

    /// Only this month (YYYY-MM), defaults to the current month
    #[arg(short, long, conflicts_with = "all_months")]
    month: Option<YearMonth>,

    /// Do not narrow to a month
    #[arg(long)]
    all_months: bool,

    /// List every missing (date, employee) pair
    #[arg(long)]
    missing: bool,

    #[command(flatten)]
    search: SearchArgs,

    #[command(flatten)]
    csv: CsvArgs,
}

#[derive(clap::Args, Debug)]
struct EventsArgs {
    /// First work date, defaults to 7 days ago
    #[arg(long)]
    start: Option<NaiveDate>,

    /// Last work date, defaults to today
    #[arg(long)]
    end: Option<NaiveDate>,

    #[command(flatten)]
    search: SearchArgs,

    #[command(flatten)]
    csv: CsvArgs,
}

#[derive(clap::Args, Debug)]
struct SwipesArgs {
    #[arg(short, long)]
    date: NaiveDate,

    #[arg(short, long)]
    employee: String,
}

#[derive(clap::Args, Debug)]
struct MonthlyArgs {
    /// Month to load (YYYY-MM), defaults to the current month
    #[arg(short, long)]
    month: Option<YearMonth>,

    /// Write the spreadsheet; defaults to <month>_attendance.xlsx
    #[arg(short, long, value_name = "FILE", num_args = 0..=1)]
    output: Option<Option<PathBuf>>,
}

#[derive(Subcommand, Debug)]
enum EmployeesCommand {
    /// Show employees grouped by whether their details are complete
    List,
    /// Assign a name and shift
    Set {
        employee_no: String,
        #[arg(short, long)]
        name: String,
        #[arg(short, long)]
        shift: String,
    },
    /// Remove an employee's name and shift
    Clear { employee_no: String },
}

#[derive(Subcommand, Debug)]
enum ShiftsCommand {
    List,
    Add {
        #[arg(long)]
        start: String,
        #[arg(long, default_value = "AM")]
        start_period: Period,
        #[arg(long)]
        end: String,
        #[arg(long, default_value = "PM")]
        end_period: Period,
    },
    Delete { id: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "shiftboard=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    let config = Config::from_env()?
        .with_overrides(args.api_base.as_deref(), args.utc_offset.as_deref())?;
    let client = ApiClient::new(&config.api_base, config.timeout)?;
    tracing::debug!(api_base = %config.api_base, offset = %config.utc_offset, "configured");

    match args.command {
        Command::Today(a) => today(&client, &config, a).await,
        Command::History(a) => history(&client, &config, a).await,
        Command::Events(a) => events(&client, &config, a).await,
        Command::Swipes(a) => swipes(&client, &config, a).await,
        Command::Monthly(a) => monthly(&client, &config, a).await,
        Command::Employees(c) => employees(client, c).await,
        Command::Shifts(c) => shifts(client, c).await,
    }
}

fn export_rows<R: CsvRow>(target: Option<PathBuf>, rows: &[R], dialect: CsvDialect) -> Result<()> {
    if let Some(path) = target {
        if export::write_csv(&path, rows, dialect)? {
            println!("Exported {} rows to {}", rows.len(), path.display());
        } else {
            println!("Nothing to export");
        }
    }
    Ok(())
}

async fn today(client: &ApiClient, config: &Config, a: TodayArgs) -> Result<()> {
    let offset = config.utc_offset;
    let search = a.search.filter();

    if let Some(seconds) = a.watch {
        return dashboard::watch_home(
            client.clone(),
            a.date,
            offset,
            Duration::from_secs(seconds.max(1)),
            async {
                let _ = tokio::signal::ctrl_c().await;
            },
            |view| render_home_view(view, &search, offset),
        )
        .await;
    }

    let window = dashboard::current_window(a.date, offset);
    let data = dashboard::load_home(client, window).await?;
    print_home(&data, &search, offset);

    let visible = data.visible(&search);
    let reference = data.window.reference();
    export_rows(
        a.csv.target(|| export::day_file_name("attendance", reference)),
        &visible,
        a.csv.dialect(),
    )
}

fn render_home_view(view: &ViewState<HomeData>, search: &SearchFilter, offset: FixedOffset) {
    match (view.status(), view.data()) {
        (Status::Ready, Some(data)) => {
            println!();
            print_home(data, search, offset);
        }
        (Status::Failed, data) => {
            eprintln!("Error: {}", view.error().unwrap_or_default());
            if data.is_some() {
                eprintln!("(still showing the previous refresh)");
            }
        }
        _ => {}
    }
}

fn print_home(data: &HomeData, search: &SearchFilter, offset: FixedOffset) {
    let window = &data.window;
    println!(
        "Today's Attendance {} ({})",
        window.reference().format("%A, %B %-d, %Y"),
        window.phase().caption()
    );

    let visible = data.visible(search);
    let counts = filter::swipe_counts(&data.events);
    print_records(&visible, offset, |r| counts.get(&(r.work_date, r.employee_no.as_str())).copied());

    let missing = data.missing_employees();
    if !missing.is_empty() {
        println!("\nNo record in the current shift: {}", missing.join(", "));
    }

    println!("\nPresent now: {}", data.present.len());
    for p in &data.present {
        println!("  {:<10} {}", p.employee_no, p.person_name.as_deref().unwrap_or("—"));
    }
}

fn print_records(
    rows: &[&AttendanceRecord],
    offset: FixedOffset,
    swipes: impl Fn(&AttendanceRecord) -> Option<usize>,
) {
    if rows.is_empty() {
        println!("No records found");
        return;
    }
    println!(
        "{:<11} {:<10} {:<22} {:<10} {:<9} {:<9} {:<8} {}",
        "Date", "Emp #", "Name", "Card #", "In", "Out", "Total", "Swipes"
    );
    for r in rows {
        println!(
            "{:<11} {:<10} {:<22} {:<10} {:<9} {:<9} {:<8} {}",
            r.work_date,
            r.employee_no,
            r.person_name.as_deref().unwrap_or("—"),
            r.card_no.as_deref().unwrap_or("—"),
            display_wall_clock(r.check_in.as_deref(), offset),
            display_wall_clock(r.check_out.as_deref(), offset),
            r.total_minutes
                .map(format_duration_minutes)
                .unwrap_or_else(|| "—".to_string()),
            swipes(r).map(|n| n.to_string()).unwrap_or_default(),
        );
    }
    println!("{} records", rows.len());
}

async fn history(client: &ApiClient, config: &Config, a: HistoryArgs) -> Result<()> {
    let offset = config.utc_offset;
    let (start, end) = dashboard::trailing_range(a.start, a.end, 30, offset);
    let month = if a.all_months {
        None
    } else {
        Some(a.month.unwrap_or_else(|| YearMonth::of(time::today_in(offset))))
    };

    let data = dashboard::load_history(client, start, end).await?;

    let months: Vec<String> = data.months().iter().map(ToString::to_string).collect();
    println!(
        "Attendance {start} to {end}  month: {}  available: {}",
        month.map(|m| m.to_string()).unwrap_or_else(|| "all".into()),
        if months.is_empty() { "—".to_string() } else { months.join(", ") }
    );

    let visible = data.visible(&a.search.filter(), month);
    let counts = filter::swipe_counts(&data.events);
    print_records(&visible, offset, |r| counts.get(&(r.work_date, r.employee_no.as_str())).copied());

    let missing = data.missing();
    if !missing.is_empty() {
        println!(
            "\nMissing Records Detected: {} missing attendance records for the selected date range.",
            missing.len()
        );
        if a.missing {
            for m in &missing {
                println!("  {}  {}", m.date, m.employee_no);
            }
        }
    }

    export_rows(
        a.csv.target(|| export::range_file_name("attendance", start, end)),
        &visible,
        a.csv.dialect(),
    )
}

fn print_events(rows: &[&AccessEvent], offset: FixedOffset) {
    if rows.is_empty() {
        println!("No events found");
        return;
    }
    println!(
        "{:<11} {:<10} {:<22} {:<10} {:<10} {:<12} {:<6} {:<6} {}",
        "Date", "Emp #", "Name", "Card #", "Time", "Type", "Door", "Reader", "Device IP"
    );
    for e in rows {
        println!(
            "{:<11} {:<10} {:<22} {:<10} {:<10} {:<12} {:<6} {:<6} {}",
            e.work_date,
            e.employee_no,
            e.person_name.as_deref().unwrap_or("—"),
            e.card_no.as_deref().unwrap_or("—"),
            display_wall_clock(e.event_time.as_deref(), offset),
            e.event_type.as_deref().unwrap_or("—"),
            e.door_no.as_deref().unwrap_or("—"),
            e.reader_no.as_deref().unwrap_or("—"),
            e.device_ip.as_deref().unwrap_or("—"),
        );
    }
    println!("{} events", rows.len());
}

async fn events(client: &ApiClient, config: &Config, a: EventsArgs) -> Result<()> {
    let offset = config.utc_offset;
    let (start, end) = dashboard::trailing_range(a.start, a.end, 7, offset);
    let events = dashboard::load_events(client, start, end).await?;

    let visible = a.search.filter().apply(&events);
    println!("Events Log {start} to {end}");
    print_events(&visible, offset);

    export_rows(
        a.csv.target(|| export::range_file_name("events", start, end)),
        &visible,
        a.csv.dialect(),
    )
}

async fn swipes(client: &ApiClient, config: &Config, a: SwipesArgs) -> Result<()> {
    let events = client.events(a.date, a.date).await?;
    let group = filter::events_for(&events, a.date, &a.employee);
    println!("Swipes for {} on {}", a.employee, a.date);
    print_events(&group, config.utc_offset);
    Ok(())
}

async fn monthly(client: &ApiClient, config: &Config, a: MonthlyArgs) -> Result<()> {
    let month = a
        .month
        .unwrap_or_else(|| YearMonth::of(time::today_in(config.utc_offset)));
    let data = dashboard::load_monthly(client, month).await?;

    println!("Monthly Attendance {month}");
    println!(
        "{:<30} {:>6} {:>6} {:>8} {:>10} {:>5} {:>5}",
        "Employee", "Days", "Late", "On time", "Hours", "Sat", "Sun"
    );
    for emp in &data.employees {
        let minutes = data.total_minutes(&emp.employee_no);
        println!(
            "{:<30} {:>6} {:>6} {:>8} {:>10} {:>5} {:>5}",
            format!(
                "{} ({})",
                emp.person_name.as_deref().unwrap_or("Unknown"),
                emp.employee_no
            ),
            emp.total_days,
            emp.late_count,
            emp.early_count,
            if minutes > 0 {
                format_duration_minutes(minutes)
            } else if emp.total_days > 0 {
                "N/A".to_string()
            } else {
                "None".to_string()
            },
            emp.saturday_count,
            emp.sunday_count,
        );
    }

    if let Some(output) = a.output {
        let path = output.unwrap_or_else(|| report::default_report_path(month));
        save_report(&data, &path)?;
    }
    Ok(())
}

fn save_report(data: &model::MonthlyAttendance, path: &Path) -> Result<()> {
    match report::save_monthly_report(data, path) {
        Ok(()) => {
            println!("Report written: {}", path.display());
            Ok(())
        }
        Err(err) => {
            eprintln!("Failed to generate Excel file: {err:#}");
            Err(err)
        }
    }
}

async fn employees(client: ApiClient, command: EmployeesCommand) -> Result<()> {
    let mut directory = EmployeeDirectory::new(client);
    match command {
        EmployeesCommand::List => {
            directory.reload().await?;
            print_directory(&directory);
        }
        EmployeesCommand::Set {
            employee_no,
            name,
            shift,
        } => {
            let update = EmployeeUpdate::new(&employee_no, &name, &shift)
                .map_err(|e| anyhow!("Failed to save: {e}"))?;
            let saved = directory
                .save(&update)
                .await
                .map_err(|e| anyhow!("Failed to save: {e}"))?;
            println!(
                "Saved {} as {} on shift {}",
                saved.employee_no,
                saved.name.as_deref().unwrap_or("—"),
                saved.shift_id.as_deref().unwrap_or("—")
            );
        }
        EmployeesCommand::Clear { employee_no } => {
            directory
                .clear(&employee_no)
                .await
                .map_err(|e| anyhow!("Failed to delete: {e}"))?;
            println!("Cleared name and shift of {employee_no}");
        }
    }
    Ok(())
}

fn print_directory(directory: &EmployeeDirectory) {
    let Some(dir) = directory.view().data() else {
        return;
    };
    let (complete, incomplete) = filter::partition_by_details(&dir.employees);
    println!(
        "{} employees, {} have both names and shifts assigned.",
        dir.employees.len(),
        complete.len()
    );

    println!("\nMissing details ({})", incomplete.len());
    for e in &incomplete {
        println!("  {:<10} {}", e.employee_no, e.name.as_deref().unwrap_or("—"));
    }

    println!("\nComplete ({})", complete.len());
    for e in &complete {
        let shift = e
            .shift_id
            .as_deref()
            .map(|id| dir.shift_label(id).unwrap_or_else(|| id.to_string()))
            .unwrap_or_else(|| "—".to_string());
        println!(
            "  {:<10} {:<24} {}",
            e.employee_no,
            e.name.as_deref().unwrap_or("—"),
            shift
        );
    }
}

async fn shifts(client: ApiClient, command: ShiftsCommand) -> Result<()> {
    let mut directory = EmployeeDirectory::new(client);
    match command {
        ShiftsCommand::List => {
            directory.reload().await?;
        }
        ShiftsCommand::Add {
            start,
            start_period,
            end,
            end_period,
        } => {
            let shift = NewShift::new(&start, start_period, &end, end_period)
                .map_err(|e| anyhow!("Failed to add shift: {e}"))?;
            let created = directory
                .add_shift(&shift)
                .await
                .map_err(|e| anyhow!("Failed to add shift: {e}"))?;
            println!("Added shift {} ({})", created.id, created.label());
        }
        ShiftsCommand::Delete { id } => {
            directory
                .delete_shift(&id)
                .await
                .map_err(|e| anyhow!("Failed to delete: {e}"))?;
            println!("Deleted shift {id}");
        }
    }

    if let Some(dir) = directory.view().data() {
        println!("{:<26} {}", "ID", "Shift");
        for s in &dir.shifts {
            println!("{:<26} {}", s.id, s.label());
        }
    }
    Ok(())
}
