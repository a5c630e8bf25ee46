//! Livestock traceability lookup
//!
//! Turns a trace number printed on the package into slaughter date, grade,
//! origin and company. Enrichment is best-effort: only malformed trace numbers
//! are reported to the caller, everything else degrades to "no data".

use async_trait::async_trait;
use chrono::NaiveDate;
use meateye_common::db::TraceSnapshot;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

const USER_AGENT: &str = concat!("meateye-fridge/", env!("CARGO_PKG_VERSION"));

/// Traceability lookup errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TraceError {
    #[error("Invalid trace number: {0}")]
    InvalidTraceNumber(String),

    #[error("Trace number not found: {0}")]
    NotFound(String),

    #[error("Traceability service unavailable: {0}")]
    Unavailable(String),
}

/// Normalized registry answer for one trace number
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceRecord {
    pub trace_number: String,
    pub slaughter_date: Option<NaiveDate>,
    pub grade: Option<String>,
    pub origin: Option<String>,
    pub company_name: Option<String>,
    /// Cut name as reported by the registry, if any
    pub part_name: Option<String>,
}

impl From<TraceRecord> for TraceSnapshot {
    fn from(record: TraceRecord) -> Self {
        TraceSnapshot {
            trace_number: Some(record.trace_number),
            slaughter_date: record.slaughter_date,
            grade: record.grade,
            origin: record.origin,
            company_name: record.company_name,
        }
    }
}

/// Validate and canonicalize a trace number
///
/// Accepts a 12-digit individual number or a bundle number (`L` followed by
/// 14 digits). Spaces and hyphens are ignored.
pub fn normalize_trace_number(raw: &str) -> Result<String, TraceError> {
    let cleaned: String = raw
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .collect::<String>()
        .to_ascii_uppercase();

    let is_individual = cleaned.len() == 12 && cleaned.chars().all(|c| c.is_ascii_digit());
    let is_bundle = cleaned.len() == 15
        && cleaned.starts_with('L')
        && cleaned[1..].chars().all(|c| c.is_ascii_digit());

    if is_individual || is_bundle {
        Ok(cleaned)
    } else {
        Err(TraceError::InvalidTraceNumber(raw.trim().to_string()))
    }
}

/// External registry seam
#[async_trait]
pub trait TraceabilityLookup: Send + Sync {
    /// Look up an already normalized trace number
    async fn lookup(&self, trace_number: &str) -> Result<TraceRecord, TraceError>;
}

/// Validates, then calls the registry under a hard deadline
pub struct TraceEnricher {
    lookup: Arc<dyn TraceabilityLookup>,
    timeout: Duration,
}

impl TraceEnricher {
    pub fn new(lookup: Arc<dyn TraceabilityLookup>, timeout: Duration) -> Self {
        Self { lookup, timeout }
    }

    pub async fn enrich(&self, raw_trace_number: &str) -> Result<TraceRecord, TraceError> {
        let trace_number = normalize_trace_number(raw_trace_number)?;

        match tokio::time::timeout(self.timeout, self.lookup.lookup(&trace_number)).await {
            Ok(result) => result,
            Err(_) => Err(TraceError::Unavailable(format!(
                "lookup exceeded {} ms",
                self.timeout.as_millis()
            ))),
        }
    }
}

/// HTTP client for the public animal traceability API
pub struct TraceabilityClient {
    http_client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl TraceabilityClient {
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self, TraceError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| TraceError::Unavailable(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.split('?').next().unwrap_or_default().trim_end_matches('/').to_string(),
            api_key: api_key.trim().to_string(),
        })
    }

    fn build_url(&self, trace_number: &str) -> String {
        // The service key is issued pre-encoded and must not be encoded again
        format!(
            "{}?serviceKey={}&traceNo={}&type=json",
            self.base_url, self.api_key, trace_number
        )
    }
}

#[async_trait]
impl TraceabilityLookup for TraceabilityClient {
    async fn lookup(&self, trace_number: &str) -> Result<TraceRecord, TraceError> {
        if self.api_key.is_empty() {
            return Err(TraceError::Unavailable("traceability API key not configured".to_string()));
        }

        tracing::debug!(trace_number = %trace_number, "Querying traceability API");

        let response = self
            .http_client
            .get(self.build_url(trace_number))
            .send()
            .await
            .map_err(|e| TraceError::Unavailable(e.to_string()))?;

        let status = response.status();
        if status.as_u16() == 404 {
            return Err(TraceError::NotFound(trace_number.to_string()));
        }
        if !status.is_success() {
            return Err(TraceError::Unavailable(format!("registry returned {}", status.as_u16())));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| TraceError::Unavailable(format!("unparseable response: {}", e)))?;

        let record = parse_trace_response(trace_number, &body)
            .ok_or_else(|| TraceError::NotFound(trace_number.to_string()))?;

        tracing::info!(
            trace_number = %trace_number,
            grade = record.grade.as_deref().unwrap_or("-"),
            origin = record.origin.as_deref().unwrap_or("-"),
            "Retrieved traceability record"
        );

        Ok(record)
    }
}

/// Extract the first record from a registry JSON payload
///
/// The registry has shipped several envelope shapes
/// (`response.body.items.item`, `items`, `data`) and both object and array
/// item encodings, with English, Korean and abbreviated field names.
pub fn parse_trace_response(trace_number: &str, body: &Value) -> Option<TraceRecord> {
    let envelope = body
        .get("response")
        .map(|r| r.get("body").unwrap_or(r))
        .unwrap_or(body);

    let items = ["items", "item", "data", "list"]
        .iter()
        .find_map(|key| envelope.get(*key))?;
    let items = match items.get("item") {
        Some(inner) => inner,
        None => items,
    };

    let first = match items {
        Value::Array(list) => list.iter().find(|v| v.is_object())?,
        Value::Object(_) => items,
        _ => return None,
    };

    let field = |keys: &[&str]| -> Option<String> {
        keys.iter()
            .filter_map(|key| first.get(*key))
            .filter_map(|v| match v {
                Value::String(s) => Some(s.trim().to_string()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .find(|s| !s.is_empty())
    };

    let record = TraceRecord {
        trace_number: field(&["historyNo", "traceNo", "이력번호"]).unwrap_or_else(|| trace_number.to_string()),
        slaughter_date: field(&["slaughterDate", "butcheryYmd", "도축일자", "slaughter_date"])
            .and_then(|s| parse_registry_date(&s)),
        grade: field(&["grade", "gradeNm", "등급", "등급명"]),
        origin: field(&["origin", "origin_country", "원산지", "farmAddr"]),
        company_name: field(&["companyName", "butcheryPlaceNm", "업체명", "company_name"]),
        part_name: field(&["partName", "부위명", "part_name"]),
    };

    Some(record)
}

/// Accepts `YYYY-MM-DD`, `YYYYMMDD`, `YYYY.MM.DD` and timestamps starting with a date
fn parse_registry_date(raw: &str) -> Option<NaiveDate> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).take(8).collect();
    if digits.len() != 8 {
        return None;
    }
    NaiveDate::parse_from_str(&digits, "%Y%m%d").ok()
}
