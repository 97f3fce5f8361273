use crate::client::ApiClient;
use crate::error::ApiError;
use crate::filter::{self, MissingRecord, SearchFilter};
use crate::model::{
    AccessEvent, AttendanceRecord, Employee, EmployeeUpdate, MonthlyAttendance, NewShift,
    PresentEmployee, Shift,
};
use crate::shift::ShiftWindow;
use crate::time::{YearMonth, now_in, today_in};
use crate::view::{Ticket, ViewState};
use chrono::{FixedOffset, NaiveDate};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct HomeData {
    pub window: ShiftWindow,
    pub records: Vec<AttendanceRecord>,
    pub events: Vec<AccessEvent>,
    pub present: Vec<PresentEmployee>,
}

impl HomeData {
    pub fn visible(&self, search: &SearchFilter) -> Vec<&AttendanceRecord> {
        self.records
            .iter()
            .filter(|r| search.matches(*r) && self.window.contains(r))
            .collect()
    }

    pub fn missing_employees(&self) -> Vec<String> {
        filter::missing_from_shift(&self.records, &self.window)
    }
}

pub fn current_window(reference: Option<NaiveDate>, offset: FixedOffset) -> ShiftWindow {
    let now = now_in(offset);
    ShiftWindow::new(
        reference.unwrap_or_else(|| now.date_naive()),
        now.time(),
        offset,
    )
}

pub async fn load_home(client: &ApiClient, window: ShiftWindow) -> Result<HomeData, ApiError> {
    let (start, end) = window.fetch_range();
    info!(%start, %end, phase = ?window.phase(), "loading current shift");
    let (records, events, present) = tokio::try_join!(
        client.attendance(start, end),
        client.events(start, end),
        client.present_employees(),
    )?;
    Ok(HomeData {
        window,
        records,
        events,
        present,
    })
}

#[derive(Debug, Clone)]
pub struct HistoryData {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub records: Vec<AttendanceRecord>,
    pub events: Vec<AccessEvent>,
}

impl HistoryData {
    pub fn visible(&self, search: &SearchFilter, month: Option<YearMonth>) -> Vec<&AttendanceRecord> {
        self.records
            .iter()
            .filter(|r| search.matches(*r) && month.is_none_or(|m| m.contains(r.work_date)))
            .collect()
    }

    pub fn missing(&self) -> Vec<MissingRecord> {
        filter::missing_records(&self.records, self.start, self.end)
    }

    pub fn months(&self) -> Vec<YearMonth> {
        filter::available_months(&self.records)
    }
}

pub async fn load_history(
    client: &ApiClient,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<HistoryData, ApiError> {
    info!(%start, %end, "loading attendance history");
    let (records, events) = tokio::try_join!(client.attendance(start, end), client.events(start, end))?;
    Ok(HistoryData {
        start,
        end,
        records,
        events,
    })
}

pub async fn load_events(
    client: &ApiClient,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<AccessEvent>, ApiError> {
    info!(%start, %end, "loading events");
    client.events(start, end).await
}

pub async fn load_monthly(client: &ApiClient, month: YearMonth) -> Result<MonthlyAttendance, ApiError> {
    info!(%month, "loading monthly attendance");
    client.monthly_attendance(month).await
}

pub fn trailing_range(
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    days_back: i64,
    offset: FixedOffset,
) -> (NaiveDate, NaiveDate) {
    let today = today_in(offset);
    (
        start.unwrap_or(today - chrono::Duration::days(days_back)),
        end.unwrap_or(today),
    )
}

#[derive(Debug, Clone, Default)]
pub struct Directory {
    pub employees: Vec<Employee>,
    pub shifts: Vec<Shift>,
}

impl Directory {
    pub fn shift_label(&self, id: &str) -> Option<String> {
        self.shifts.iter().find(|s| s.id == id).map(Shift::label)
    }
}

// Local state only changes after the backend accepted a mutation.
pub struct EmployeeDirectory {
    client: ApiClient,
    view: ViewState<Directory>,
}

impl EmployeeDirectory {
    pub fn new(client: ApiClient) -> Self {
        Self {
            client,
            view: ViewState::new(),
        }
    }

    pub fn view(&self) -> &ViewState<Directory> {
        &self.view
    }

    pub async fn reload(&mut self) -> Result<(), ApiError> {
        let ticket = self.view.begin();
        match tokio::try_join!(self.client.employees(), self.client.shifts()) {
            Ok((employees, shifts)) => {
                self.view
                    .finish::<ApiError>(ticket, Ok(Directory { employees, shifts }));
                Ok(())
            }
            Err(err) => {
                self.view.finish(ticket, Err::<Directory, _>(&err));
                Err(err)
            }
        }
    }

    pub async fn save(&mut self, update: &EmployeeUpdate) -> Result<Employee, ApiError> {
        let saved = self.client.save_employee(update).await?;
        if let Some(dir) = self.view.data_mut() {
            for employee in dir.employees.iter_mut() {
                if employee.employee_no == update.employee_no {
                    *employee = saved.clone();
                }
            }
        }
        info!(employee_no = %saved.employee_no, "employee saved");
        Ok(saved)
    }

    pub async fn clear(&mut self, employee_no: &str) -> Result<(), ApiError> {
        self.client.clear_employee(employee_no).await?;
        if let Some(dir) = self.view.data_mut() {
            for employee in dir.employees.iter_mut() {
                if employee.employee_no == employee_no {
                    *employee = employee.cleared();
                }
            }
        }
        info!(%employee_no, "employee details cleared");
        Ok(())
    }

    pub async fn add_shift(&mut self, shift: &NewShift) -> Result<Shift, ApiError> {
        let created = self.client.create_shift(shift).await?;
        if let Some(dir) = self.view.data_mut() {
            dir.shifts.push(created.clone());
        }
        info!(id = %created.id, "shift created");
        self.refresh_after_shift_change().await;
        Ok(created)
    }

    pub async fn delete_shift(&mut self, id: &str) -> Result<(), ApiError> {
        self.client.delete_shift(id).await?;
        if let Some(dir) = self.view.data_mut() {
            dir.shifts.retain(|s| s.id != id);
        }
        info!(%id, "shift deleted");
        self.refresh_after_shift_change().await;
        Ok(())
    }

    // Shift changes can reassign employees server side.
    async fn refresh_after_shift_change(&mut self) {
        if let Err(err) = self.reload().await {
            warn!(%err, "reload after shift change failed");
        }
    }
}

type HomeUpdate = (Ticket, Result<HomeData, ApiError>);

/// Loads overlap when the backend is slower than `every`; superseded
/// responses are dropped.
pub async fn watch_home<F, S>(
    client: ApiClient,
    reference: Option<NaiveDate>,
    offset: FixedOffset,
    every: Duration,
    shutdown: S,
    mut render: F,
) -> anyhow::Result<()>
where
    F: FnMut(&ViewState<HomeData>),
    S: Future<Output = ()>,
{
    let (tx, mut rx) = mpsc::unbounded_channel::<HomeUpdate>();
    let mut view: ViewState<HomeData> = ViewState::new();
    let mut ticker = tokio::time::interval(every);
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let ticket = view.begin();
                let window = current_window(reference, offset);
                let client = client.clone();
                let tx = tx.clone();
                tokio::spawn(async move {
                    let result = load_home(&client, window).await;
                    let _ = tx.send((ticket, result));
                });
            }
            Some((ticket, result)) = rx.recv() => {
                if view.finish(ticket, result) {
                    render(&view);
                }
            }
            _ = &mut shutdown => {
                info!("stopping watch");
                break;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::tests::stub_backend;
    use actix_web::{HttpResponse, web};
    use chrono::NaiveTime;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    fn pkt() -> FixedOffset {
        FixedOffset::east_opt(5 * 3600).unwrap()
    }

    async fn attendance() -> HttpResponse {
        HttpResponse::Ok().json(json!([
            {"work_date": "2024-03-10", "employee_no": "E1", "person_name": "Nadia", "check_in": "14:10"},
            {"work_date": "2024-03-11", "employee_no": "E1", "check_in": "09:30"},
            {"work_date": "2024-03-09", "employee_no": "E2", "person_name": "Omar", "check_in": "14:00"}
        ]))
    }

    async fn events() -> HttpResponse {
        HttpResponse::Ok().json(json!([
            {"work_date": "2024-03-10", "employee_no": "E1", "event_type": "in", "door_no": 1, "reader_no": 2, "device_ip": "10.1.1.1"}
        ]))
    }

    async fn present() -> HttpResponse {
        HttpResponse::Ok().json(json!([{"employee_no": "E1", "person_name": "Nadia"}]))
    }

    async fn present_down() -> HttpResponse {
        HttpResponse::BadGateway().json(json!({"message": "upstream"}))
    }

    async fn employees() -> HttpResponse {
        HttpResponse::Ok().json(json!([
            {"employee_no": "E1", "name": "Nadia", "shift_id": "s1", "has_details": true},
            {"employee_no": "E2", "name": null, "shift_id": null, "has_details": false}
        ]))
    }

    async fn shifts() -> HttpResponse {
        HttpResponse::Ok().json(json!([
            {"id": "s1", "start_time": "02:00", "start_period": "PM", "end_time": "07:00", "end_period": "AM"}
        ]))
    }

    async fn save_employee(body: web::Json<serde_json::Value>) -> HttpResponse {
        HttpResponse::Ok().json(json!({
            "employee_no": body["employee_no"],
            "name": body["name"],
            "shift_id": body["shift_id"],
            "has_details": true
        }))
    }

    async fn failing_delete() -> HttpResponse {
        HttpResponse::InternalServerError().json(json!({"message": "locked"}))
    }

    async fn deleted() -> HttpResponse {
        HttpResponse::Ok().json(json!({"ok": true}))
    }

    fn backend(cfg: &mut web::ServiceConfig) {
        cfg.route("/api/attendance", web::get().to(attendance))
            .route("/api/events", web::get().to(events))
            .route("/api/present-employees", web::get().to(present))
            .route("/api/employees", web::get().to(employees))
            .route("/api/employees", web::post().to(save_employee))
            .route("/api/employees/{no}", web::delete().to(failing_delete))
            .route("/api/shifts", web::get().to(shifts))
            .route("/api/shifts/{id}", web::delete().to(deleted));
    }

    fn backend_without_presence(cfg: &mut web::ServiceConfig) {
        cfg.route("/api/attendance", web::get().to(attendance))
            .route("/api/events", web::get().to(events))
            .route("/api/present-employees", web::get().to(present_down));
    }

    fn afternoon_of_the_tenth() -> ShiftWindow {
        ShiftWindow::new(date(10), NaiveTime::from_hms_opt(16, 0, 0).unwrap(), pkt())
    }

    #[actix_web::test]
    async fn home_shows_only_the_current_shift() {
        let (client, handle) = stub_backend(backend);
        let data = load_home(&client, afternoon_of_the_tenth()).await.unwrap();
        assert_eq!(data.records.len(), 3);
        assert_eq!(data.present.len(), 1);

        let visible = data.visible(&SearchFilter::default());
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].work_date, date(10));
        assert_eq!(data.missing_employees(), vec!["E2".to_string()]);

        assert!(data.visible(&SearchFilter::new(Some("omar"), None)).is_empty());
        handle.stop(false).await;
    }

    static ATTENDANCE_CALLS: AtomicUsize = AtomicUsize::new(0);

    async fn slow_first_attendance() -> HttpResponse {
        if ATTENDANCE_CALLS.fetch_add(1, Ordering::SeqCst) == 0 {
            actix_web::rt::time::sleep(Duration::from_millis(600)).await;
            return HttpResponse::Ok().json(json!([
                {"work_date": "2024-03-10", "employee_no": "LATE", "check_in": "14:00"}
            ]));
        }
        HttpResponse::Ok().json(json!([
            {"work_date": "2024-03-10", "employee_no": "E1", "check_in": "14:10"}
        ]))
    }

    fn backend_with_slow_first_load(cfg: &mut web::ServiceConfig) {
        cfg.route("/api/attendance", web::get().to(slow_first_attendance))
            .route("/api/events", web::get().to(events))
            .route("/api/present-employees", web::get().to(present));
    }

    #[actix_web::test]
    async fn watch_renders_only_the_newest_load() {
        let (client, handle) = stub_backend(backend_with_slow_first_load);
        let mut rendered: Vec<Vec<String>> = Vec::new();

        watch_home(
            client,
            Some(date(10)),
            pkt(),
            Duration::from_millis(150),
            tokio::time::sleep(Duration::from_millis(1000)),
            |view| {
                if let Some(data) = view.data() {
                    rendered.push(data.records.iter().map(|r| r.employee_no.clone()).collect());
                }
            },
        )
        .await
        .unwrap();

        assert!(ATTENDANCE_CALLS.load(Ordering::SeqCst) >= 2);
        assert!(!rendered.is_empty());
        assert!(rendered.iter().flatten().all(|no| no == "E1"));
        handle.stop(false).await;
    }

    #[actix_web::test]
    async fn one_failed_read_fails_the_whole_batch() {
        let (client, handle) = stub_backend(backend_without_presence);
        let mut view: ViewState<HomeData> = ViewState::new();
        let ticket = view.begin();
        let result = load_home(&client, afternoon_of_the_tenth()).await;
        assert!(result.is_err());
        view.finish(ticket, result);
        assert!(view.data().is_none());
        assert!(view.error().unwrap().starts_with("502"));
        handle.stop(false).await;
    }

    #[actix_web::test]
    async fn directory_applies_successful_mutations_only() {
        let (client, handle) = stub_backend(backend);
        let mut directory = EmployeeDirectory::new(client);
        directory.reload().await.unwrap();

        let dir = directory.view().data().unwrap();
        let (complete, incomplete) = filter::partition_by_details(&dir.employees);
        assert_eq!((complete.len(), incomplete.len()), (1, 1));
        assert_eq!(dir.shift_label("s1").as_deref(), Some("02:00 PM - 07:00 AM"));

        let update = EmployeeUpdate::new("E2", "Omar", "s1").unwrap();
        directory.save(&update).await.unwrap();
        let e2 = directory.view().data().unwrap().employees[1].clone();
        assert!(e2.has_details);
        assert_eq!(e2.name.as_deref(), Some("Omar"));

        let err = directory.clear("E1").await.unwrap_err();
        assert_eq!(err.to_string(), "locked");
        assert!(directory.view().data().unwrap().employees[0].has_details);

        directory.delete_shift("s1").await.unwrap();
        // the reload brings back whatever the backend reports
        assert_eq!(directory.view().data().unwrap().shifts.len(), 1);
        handle.stop(false).await;
    }

    #[test]
    fn history_filters_by_month_and_reports_gaps() {
        let record = |day: u32, month: u32, no: &str| AttendanceRecord {
            work_date: NaiveDate::from_ymd_opt(2024, month, day).unwrap(),
            employee_no: no.to_string(),
            person_name: None,
            card_no: None,
            check_in: None,
            check_out: None,
            total_minutes: None,
        };
        let data = HistoryData {
            start: NaiveDate::from_ymd_opt(2024, 2, 29).unwrap(),
            end: date(1),
            records: vec![record(29, 2, "E1"), record(1, 3, "E1"), record(1, 3, "E2")],
            events: Vec::new(),
        };
        let march: YearMonth = "2024-03".parse().unwrap();
        assert_eq!(data.visible(&SearchFilter::default(), Some(march)).len(), 2);
        assert_eq!(data.visible(&SearchFilter::default(), None).len(), 3);
        assert_eq!(
            data.missing(),
            vec![MissingRecord {
                date: NaiveDate::from_ymd_opt(2024, 2, 29).unwrap(),
                employee_no: "E2".into()
            }]
        );
        assert_eq!(data.months().len(), 2);
    }

    #[test]
    fn trailing_range_honours_explicit_bounds() {
        let (start, end) = trailing_range(Some(date(1)), Some(date(7)), 30, pkt());
        assert_eq!((start, end), (date(1), date(7)));
        let (start, end) = trailing_range(None, None, 7, pkt());
        assert_eq!((end - start).num_days(), 7);
    }
}
