//! Wire types for the recruitment backend.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::access::Role;
use crate::candidates::HiringStatus;

/// Standard response wrapper: `{ success, message, code?, data? }`.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiEnvelope<T> {
    #[serde(default)]
    pub success: bool,
    pub message: Option<String>,
    /// Machine-readable failure code, when the backend sends one.
    pub code: Option<String>,
    pub data: Option<T>,
}

impl<T> ApiEnvelope<T> {
    /// The message, if the backend sent a non-blank one.
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref().filter(|m| !m.trim().is_empty())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum RawTimestamp {
    Millis(i64),
    Text(String),
}

/// Backend timestamps arrive as epoch milliseconds, RFC 3339 strings or
/// zone-less `LocalDateTime` strings (read as UTC).
pub fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(at) = DateTime::parse_from_rfc3339(text) {
        return Some(at.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// Lenient optional timestamp; anything unreadable becomes `None`.
pub fn opt_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<RawTimestamp>::deserialize(deserializer)?;
    Ok(raw.and_then(|raw| match raw {
        RawTimestamp::Millis(ms) => Utc.timestamp_millis_opt(ms).single(),
        RawTimestamp::Text(text) => parse_timestamp(&text),
    }))
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamPaper {
    pub id: u64,
    pub paper_name: String,
    #[serde(default)]
    pub score: Option<f64>,
    /// Minutes.
    #[serde(default)]
    pub duration: Option<u32>,
    #[serde(default, deserialize_with = "opt_timestamp")]
    pub create_time: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "opt_timestamp")]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub forever: bool,
    #[serde(default)]
    pub started: bool,
    #[serde(default)]
    pub finished: bool,
    #[serde(default)]
    pub preset_user_count: Option<u64>,
    #[serde(default)]
    pub person_total: Option<u64>,
    #[serde(default)]
    pub test_count: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaperPhase {
    Open,
    InProgress,
    Finished,
}

impl ExamPaper {
    pub fn new(id: u64, paper_name: impl Into<String>) -> Self {
        Self {
            id,
            paper_name: paper_name.into(),
            ..Default::default()
        }
    }

    pub fn phase(&self) -> PaperPhase {
        if self.finished {
            PaperPhase::Finished
        } else if self.started {
            PaperPhase::InProgress
        } else {
            PaperPhase::Open
        }
    }

    /// "begin to end" line, e.g. `2025-08-15 14:15 to open-ended`.
    pub fn window(&self) -> String {
        let begin = format_minute(self.create_time);
        let end = if self.forever {
            "open-ended".to_string()
        } else {
            format_minute(self.end_time)
        };
        format!("{begin} to {end}")
    }
}

pub fn format_minute(at: Option<DateTime<Utc>>) -> String {
    at.map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "N/A".to_string())
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub mobile: Option<String>,
    #[serde(default)]
    pub head_url: Option<String>,
    #[serde(default)]
    pub hiring_status: HiringStatus,
    #[serde(default)]
    pub user_score: Option<f64>,
    #[serde(default)]
    pub paper_score: Option<f64>,
    #[serde(default)]
    pub paper_name: Option<String>,
    #[serde(default)]
    pub cheat_info_desc: Option<String>,
    #[serde(default)]
    pub vendor_company: Option<String>,
    #[serde(default, deserialize_with = "opt_timestamp")]
    pub created_time: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "opt_timestamp")]
    pub paper_end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub pdf_url: Option<String>,
}

/// Spring-style page of results.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    #[serde(default = "Vec::new")]
    pub content: Vec<T>,
    #[serde(default)]
    pub number: u32,
    #[serde(default)]
    pub total_pages: u32,
    #[serde(default = "default_true")]
    pub first: bool,
    #[serde(default = "default_true")]
    pub last: bool,
    #[serde(default)]
    pub total_elements: Option<u64>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub jwt: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    pub api_key: String,
    pub token: String,
    pub company: String,
    pub role: Role,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessageResponse {
    pub message: Option<String>,
}

/// `data` of an already-exists send failure.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictData {
    #[serde(default, deserialize_with = "opt_timestamp")]
    pub created_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AccountBalance {
    pub money: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    #[serde(default)]
    pub company_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default, deserialize_with = "opt_timestamp")]
    pub valid_begin_time: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "opt_timestamp")]
    pub valid_end_time: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn timestamps_in_every_backend_shape() {
        let expected = Utc.with_ymd_and_hms(2025, 8, 15, 14, 15, 0).unwrap();
        assert_eq!(parse_timestamp("2025-08-15T14:15:00Z"), Some(expected));
        assert_eq!(parse_timestamp("2025-08-15T16:15:00+02:00"), Some(expected));
        assert_eq!(parse_timestamp("2025-08-15T14:15:00"), Some(expected));
        assert_eq!(parse_timestamp("2025-08-15 14:15:00.000"), Some(expected));
        assert_eq!(parse_timestamp("yesterday"), None);

        let data: ConflictData =
            serde_json::from_value(json!({ "createdTime": expected.timestamp_millis() })).unwrap();
        assert_eq!(data.created_time, Some(expected));

        let data: ConflictData = serde_json::from_value(json!({ "createdTime": null })).unwrap();
        assert_eq!(data.created_time, None);
        let data: ConflictData = serde_json::from_value(json!({})).unwrap();
        assert_eq!(data.created_time, None);
    }

    #[test]
    fn exam_paper_from_backend_json() {
        let paper: ExamPaper = serde_json::from_value(json!({
            "id": 42,
            "paperName": "Rust fundamentals",
            "duration": 90,
            "createTime": 1_755_267_300_000i64,
            "forever": true,
            "started": true,
            "presetUserCount": 12,
            "personTotal": 8,
            "testCount": 5
        }))
        .unwrap();
        assert_eq!(paper.id, 42);
        assert_eq!(paper.duration, Some(90));
        assert_eq!(paper.phase(), PaperPhase::InProgress);
        assert_eq!(paper.window(), "2025-08-15 14:15 to open-ended");
        assert_eq!(paper.test_count, Some(5));
    }

    #[test]
    fn paper_phase_and_window_defaults() {
        let mut paper = ExamPaper::new(1, "Intro");
        assert_eq!(paper.phase(), PaperPhase::Open);
        assert_eq!(paper.window(), "N/A to N/A");
        paper.started = true;
        paper.finished = true;
        assert_eq!(paper.phase(), PaperPhase::Finished);
    }

    #[test]
    fn page_defaults_when_fields_missing() {
        let page: Page<Candidate> = serde_json::from_value(json!({})).unwrap();
        assert!(page.content.is_empty());
        assert_eq!(page.total_pages, 0);
        assert!(page.first && page.last);
    }

    #[test]
    fn register_request_uses_camel_case_and_role_tag() {
        let request = RegisterRequest {
            username: "ops".into(),
            password: "pw".into(),
            api_key: "k".into(),
            token: "t".into(),
            company: "Acme".into(),
            role: Role::Pmo,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["apiKey"], "k");
        assert_eq!(json["role"], "PMO");
    }
}
