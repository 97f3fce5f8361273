use crate::time::parse_utc_offset;
use anyhow::{Context, Result, anyhow};
use chrono::FixedOffset;
use std::env;
use std::time::Duration;

pub const DEFAULT_API_BASE: &str = "http://localhost:3001";
/// The backend reports in Pakistan Standard Time.
pub const DEFAULT_UTC_OFFSET: &str = "+05:00";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct Config {
    pub api_base: String,
    pub utc_offset: FixedOffset,
    pub timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let api_base = lookup("SHIFTBOARD_API_BASE")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());

        let offset = lookup("SHIFTBOARD_UTC_OFFSET").unwrap_or_else(|| DEFAULT_UTC_OFFSET.to_string());
        let utc_offset = parse_utc_offset(&offset).context("SHIFTBOARD_UTC_OFFSET")?;

        let timeout_secs = match lookup("SHIFTBOARD_TIMEOUT_SECS") {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .map_err(|_| anyhow!("SHIFTBOARD_TIMEOUT_SECS must be a whole number of seconds"))?,
            None => DEFAULT_TIMEOUT_SECS,
        };

        Ok(Config {
            api_base: normalize_base(&api_base),
            utc_offset,
            timeout: Duration::from_secs(timeout_secs),
        })
    }

    pub fn with_overrides(mut self, api_base: Option<&str>, utc_offset: Option<&str>) -> Result<Self> {
        if let Some(base) = api_base {
            self.api_base = normalize_base(base);
        }
        if let Some(offset) = utc_offset {
            self.utc_offset = parse_utc_offset(offset).context("--utc-offset")?;
        }
        Ok(self)
    }
}

fn normalize_base(base: &str) -> String {
    base.trim().trim_end_matches('/').to_string()
}
