//! Status snapshot decoding.
//!
//! `GET /api/status` is answered by servers of varying vintage: some send
//! `status_line`, others `status_message`, optional fields come and go and
//! durations are pre-formatted strings. [`decode_status`] turns any of those
//! bodies into one normalized [`StatusSnapshot`]. Missing fields never fail
//! the decode; they fall back to zero / empty.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error_handling::types::ApiError;

/// One normalized status response. Produced once per poll and consumed immediately.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub is_running: bool,
    pub current_viewers: u32,
    pub target_viewers: u32,
    /// Always within `[0, 100]`.
    pub progress_percent: f64,
    pub status_line: String,
    pub logs: Vec<String>,
    /// Server-computed remaining time, when it sent a parseable one.
    pub time_remaining_secs: Option<u64>,
    /// Planned duration, `None` for unlimited or unknown.
    pub total_duration_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct RawStatus {
    #[serde(default)]
    is_running: Option<bool>,
    #[serde(default)]
    current_viewers: Option<u32>,
    #[serde(default)]
    target_viewers: Option<u32>,
    #[serde(default)]
    progress_percent: Option<f64>,
    #[serde(default, alias = "status_message")]
    status_line: Option<String>,
    #[serde(default)]
    logs: Option<Vec<String>>,
    #[serde(default)]
    time_remaining_str: Option<String>,
    #[serde(default)]
    total_duration_str: Option<String>,
}

impl From<RawStatus> for StatusSnapshot {
    fn from(raw: RawStatus) -> Self {
        StatusSnapshot {
            is_running: raw.is_running.unwrap_or(false),
            current_viewers: raw.current_viewers.unwrap_or(0),
            target_viewers: raw.target_viewers.unwrap_or(0),
            progress_percent: normalize_percent(raw.progress_percent.unwrap_or(0.0)),
            status_line: raw.status_line.unwrap_or_default(),
            logs: raw.logs.unwrap_or_default(),
            time_remaining_secs: raw.time_remaining_str.as_deref().and_then(parse_clock),
            total_duration_secs: raw.total_duration_str.as_deref().and_then(parse_clock),
        }
    }
}

/// Decodes a raw `/api/status` body.
///
/// Only a body that is not a JSON object (or carries a field of the wrong type) is an error.
pub fn decode_status(body: &[u8]) -> Result<StatusSnapshot, ApiError> {
    let raw: RawStatus =
        serde_json::from_slice(body).map_err(|e| ApiError::Decode(e.to_string()))?;
    Ok(raw.into())
}

fn normalize_percent(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 100.0)
    } else {
        0.0
    }
}

fn clock_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(?:(\d+):)?(\d{1,2}):(\d{2})$|^(\d+)$").expect("valid clock pattern")
    })
}

/// Parses `HH:MM:SS`, `MM:SS` or bare seconds. Anything else (`Unlimited`, `--`) is `None`.
pub fn parse_clock(text: &str) -> Option<u64> {
    let caps = clock_pattern().captures(text.trim())?;
    if let Some(secs) = caps.get(4) {
        return secs.as_str().parse().ok();
    }
    let hours: u64 = match caps.get(1) {
        Some(h) => h.as_str().parse().ok()?,
        None => 0,
    };
    let minutes: u64 = caps.get(2)?.as_str().parse().ok()?;
    let seconds: u64 = caps.get(3)?.as_str().parse().ok()?;
    if seconds >= 60 || (caps.get(1).is_some() && minutes >= 60) {
        return None;
    }
    Some(hours * 3600 + minutes * 60 + seconds)
}

/// Renders seconds as `HH:MM:SS`.
pub fn format_clock(total_secs: u64) -> String {
    format!(
        "{:02}:{:02}:{:02}",
        total_secs / 3600,
        (total_secs % 3600) / 60,
        total_secs % 60
    )
}
