use crate::error::ApiError;
use crate::model::{
    AccessEvent, AttendanceRecord, Employee, EmployeeUpdate, MonthlyAttendance, NewShift,
    PresentEmployee, Shift,
};
use crate::time::YearMonth;
use chrono::NaiveDate;
use reqwest::header::CONTENT_TYPE;
use reqwest::{RequestBuilder, Response};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, warn};

const SNIPPET_LEN: usize = 200;

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

/// Thin client over the attendance backend's REST API.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base: String,
}

impl ApiClient {
    pub fn new(base: &str, timeout: Duration) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base: base.trim_end_matches('/').to_string(),
        })
    }

    pub fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base, path)
        } else {
            format!("{}/{}", self.base, path)
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let url = self.url(path);
        debug!(%url, "GET");
        let res = self.http.get(&url).send().await?;
        let status = res.status();
        let content_type = res
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        // A misrouted request usually lands on an HTML page; say so instead of
        // failing on the JSON decode.
        if !content_type.contains("application/json") {
            let text = res.text().await?;
            warn!(%url, %content_type, "expected JSON");
            return Err(ApiError::UnexpectedContentType {
                url,
                content_type: if content_type.is_empty() {
                    "unknown".to_string()
                } else {
                    content_type
                },
                snippet: text.chars().take(SNIPPET_LEN).collect(),
            });
        }

        let body = res.bytes().await?;
        if !status.is_success() {
            return Err(ApiError::Status {
                status: status.as_u16(),
                message: format!("{} {}", status.as_u16(), String::from_utf8_lossy(&body)),
            });
        }
        serde_json::from_slice(&body).map_err(|source| ApiError::Decode { url, source })
    }

    async fn send_mutation(&self, url: &str, request: RequestBuilder) -> Result<Response, ApiError> {
        let res = request.send().await?;
        let status = res.status();
        if status.is_success() {
            return Ok(res);
        }
        let body = res.bytes().await.unwrap_or_default();
        let message = serde_json::from_slice::<ErrorBody>(&body)
            .ok()
            .and_then(|b| b.message)
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| format!("HTTP error {}", status.as_u16()));
        warn!(%url, status = status.as_u16(), %message, "mutation rejected");
        Err(ApiError::Status {
            status: status.as_u16(),
            message,
        })
    }

    async fn mutation_json<T: DeserializeOwned>(
        &self,
        url: String,
        request: RequestBuilder,
    ) -> Result<T, ApiError> {
        let res = self.send_mutation(&url, request).await?;
        let body = res.bytes().await?;
        serde_json::from_slice(&body).map_err(|source| ApiError::Decode { url, source })
    }

    pub async fn attendance(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<AttendanceRecord>, ApiError> {
        self.get_json(&format!("/api/attendance?start={start}&end={end}"))
            .await
    }

    pub async fn events(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<AccessEvent>, ApiError> {
        self.get_json(&format!("/api/events?start={start}&end={end}"))
            .await
    }

    pub async fn present_employees(&self) -> Result<Vec<PresentEmployee>, ApiError> {
        self.get_json("/api/present-employees").await
    }

    pub async fn employees(&self) -> Result<Vec<Employee>, ApiError> {
        self.get_json("/api/employees").await
    }

    pub async fn shifts(&self) -> Result<Vec<Shift>, ApiError> {
        self.get_json("/api/shifts").await
    }

    pub async fn monthly_attendance(&self, month: YearMonth) -> Result<MonthlyAttendance, ApiError> {
        self.get_json(&format!("/api/monthly-attendance?month={month}"))
            .await
    }

    pub async fn save_employee(&self, update: &EmployeeUpdate) -> Result<Employee, ApiError> {
        let url = self.url("/api/employees");
        debug!(%url, employee_no = %update.employee_no, "POST");
        let request = self.http.post(&url).json(update);
        self.mutation_json(url, request).await
    }

    pub async fn clear_employee(&self, employee_no: &str) -> Result<(), ApiError> {
        let url = self.url(&format!("/api/employees/{employee_no}"));
        debug!(%url, "DELETE");
        self.send_mutation(&url, self.http.delete(&url)).await?;
        Ok(())
    }

    pub async fn create_shift(&self, shift: &NewShift) -> Result<Shift, ApiError> {
        let url = self.url("/api/shifts");
        debug!(%url, "POST");
        let request = self.http.post(&url).json(shift);
        self.mutation_json(url, request).await
    }

    pub async fn delete_shift(&self, id: &str) -> Result<(), ApiError> {
        let url = self.url(&format!("/api/shifts/{id}"));
        debug!(%url, "DELETE");
        self.send_mutation(&url, self.http.delete(&url)).await?;
        Ok(())
    }
}
