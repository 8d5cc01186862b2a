use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

pub mod charts;

/// Default for every categorical field whose source key is missing.
pub const UNKNOWN: &str = "Unknown";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DeviceInfo {
    #[serde(default)]
    pub device: Option<String>,
    #[serde(default)]
    pub browser: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SessionMetadata {
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub sales: Option<f64>,
    #[serde(default, rename = "pageViews")]
    pub page_views: Option<u64>,
    #[serde(default)]
    pub duration: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SessionTags {
    #[serde(default, rename = "type")]
    pub session_type: Option<String>,
    #[serde(default)]
    pub segment: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
}

/// One tracked visit, as stored in the sessions collection. Any of the nested
/// sub-objects may be absent; normalization absorbs the gaps.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionRecord {
    pub id: String,
    #[serde(rename = "startTime")]
    pub start_time: DateTime<Utc>,
    #[serde(rename = "lastActivity")]
    pub last_activity: DateTime<Utc>,
    #[serde(default, rename = "deviceInfo")]
    pub device_info: Option<DeviceInfo>,
    #[serde(default, rename = "sessionMetadata")]
    pub session_metadata: Option<SessionMetadata>,
    #[serde(default, rename = "sessionTags")]
    pub session_tags: Option<SessionTags>,
}

/// The normalized flat row: id, the two timestamps, and the nine derived
/// columns every filter and aggregate operates on.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionRow {
    pub id: String,
    pub start_time: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub device: String,
    pub browser: String,
    pub source: String,
    pub sales: f64,
    pub page_views: u64,
    pub duration: f64,
    pub session_type: String,
    pub segment: String,
    pub category: String,
}

impl SessionRow {
    /// Calendar date of `start_time`, the axis the date-range filter and the
    /// daily time series both use.
    pub fn start_date(&self) -> NaiveDate {
        self.start_time.date_naive()
    }

    pub fn categorical(&self, field: CategoricalField) -> &str {
        match field {
            CategoricalField::Device => &self.device,
            CategoricalField::Browser => &self.browser,
            CategoricalField::Source => &self.source,
            CategoricalField::SessionType => &self.session_type,
            CategoricalField::Segment => &self.segment,
            CategoricalField::Category => &self.category,
        }
    }

    pub fn numeric(&self, field: NumericField) -> f64 {
        match field {
            NumericField::Sales => self.sales,
            NumericField::PageViews => self.page_views as f64,
            NumericField::Duration => self.duration,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoricalField {
    Device,
    Browser,
    Source,
    SessionType,
    Segment,
    Category,
}

impl CategoricalField {
    pub fn as_str(&self) -> &'static str {
        match self {
            CategoricalField::Device => "device",
            CategoricalField::Browser => "browser",
            CategoricalField::Source => "source",
            CategoricalField::SessionType => "session_type",
            CategoricalField::Segment => "segment",
            CategoricalField::Category => "category",
        }
    }
}

impl fmt::Display for CategoricalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NumericField {
    Sales,
    PageViews,
    Duration,
}

impl NumericField {
    pub fn as_str(&self) -> &'static str {
        match self {
            NumericField::Sales => "sales",
            NumericField::PageViews => "page_views",
            NumericField::Duration => "duration",
        }
    }
}

impl fmt::Display for NumericField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn unknown_or(value: &Option<String>) -> String {
    match value {
        Some(text) if !text.is_empty() => text.clone(),
        _ => UNKNOWN.to_string(),
    }
}

/// Flatten one record into its tabular row. Total: every absent sub-object or
/// key becomes the documented default, never an error.
pub fn normalize(record: &SessionRecord) -> SessionRow {
    let device_info = record.device_info.clone().unwrap_or_default();
    let metadata = record.session_metadata.clone().unwrap_or_default();
    let tags = record.session_tags.clone().unwrap_or_default();

    SessionRow {
        id: record.id.clone(),
        start_time: record.start_time,
        last_activity: record.last_activity,
        device: unknown_or(&device_info.device),
        browser: unknown_or(&device_info.browser),
        source: unknown_or(&metadata.source),
        sales: metadata.sales.unwrap_or(0.0),
        page_views: metadata.page_views.unwrap_or(0),
        duration: metadata.duration.unwrap_or(0.0),
        session_type: unknown_or(&tags.session_type),
        segment: unknown_or(&tags.segment),
        category: unknown_or(&tags.category),
    }
}

/// Normalize a whole load, preserving input order.
pub fn normalize_all(records: &[SessionRecord]) -> Vec<SessionRow> {
    records.iter().map(normalize).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, day, hour, 0, 0)
            .single()
            .expect("valid timestamp")
    }

    fn bare_record(id: &str) -> SessionRecord {
        SessionRecord {
            id: id.to_string(),
            start_time: ts(1, 9),
            last_activity: ts(1, 10),
            device_info: None,
            session_metadata: None,
            session_tags: None,
        }
    }

    #[test]
    fn normalize_defaults_every_missing_field() {
        let row = normalize(&bare_record("s-1"));
        assert_eq!(row.device, UNKNOWN);
        assert_eq!(row.browser, UNKNOWN);
        assert_eq!(row.source, UNKNOWN);
        assert_eq!(row.session_type, UNKNOWN);
        assert_eq!(row.segment, UNKNOWN);
        assert_eq!(row.category, UNKNOWN);
        assert_eq!(row.sales, 0.0);
        assert_eq!(row.page_views, 0);
        assert_eq!(row.duration, 0.0);
    }

    #[test]
    fn normalize_defaults_missing_keys_inside_present_objects() {
        let mut record = bare_record("s-2");
        record.device_info = Some(DeviceInfo {
            device: Some("mobile".to_string()),
            browser: None,
        });
        record.session_metadata = Some(SessionMetadata {
            source: None,
            sales: Some(12.5),
            page_views: None,
            duration: None,
        });

        let row = normalize(&record);
        assert_eq!(row.device, "mobile");
        assert_eq!(row.browser, UNKNOWN);
        assert_eq!(row.source, UNKNOWN);
        assert_eq!(row.sales, 12.5);
        assert_eq!(row.page_views, 0);
        assert_eq!(row.duration, 0.0);
    }

    #[test]
    fn normalize_maps_a_complete_record() {
        let mut record = bare_record("s-3");
        record.device_info = Some(DeviceInfo {
            device: Some("desktop".to_string()),
            browser: Some("Firefox".to_string()),
        });
        record.session_metadata = Some(SessionMetadata {
            source: Some("organic".to_string()),
            sales: Some(199.99),
            page_views: Some(14),
            duration: Some(420.0),
        });
        record.session_tags = Some(SessionTags {
            session_type: Some("converted".to_string()),
            segment: Some("returning".to_string()),
            category: Some("electronics".to_string()),
        });

        let row = normalize(&record);
        assert_eq!(row.id, "s-3");
        assert_eq!(row.device, "desktop");
        assert_eq!(row.browser, "Firefox");
        assert_eq!(row.source, "organic");
        assert_eq!(row.sales, 199.99);
        assert_eq!(row.page_views, 14);
        assert_eq!(row.duration, 420.0);
        assert_eq!(row.session_type, "converted");
        assert_eq!(row.segment, "returning");
        assert_eq!(row.category, "electronics");
        assert_eq!(row.start_date(), ts(1, 9).date_naive());
    }

    #[test]
    fn normalize_all_preserves_order() {
        let records = vec![bare_record("a"), bare_record("b"), bare_record("c")];
        let rows = normalize_all(&records);
        let ids: Vec<&str> = rows.iter().map(|row| row.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn record_deserializes_from_document_shaped_json() {
        let raw = r#"{
            "id": "s-9",
            "startTime": "2026-03-01T09:00:00Z",
            "lastActivity": "2026-03-01T09:12:00Z",
            "deviceInfo": { "device": "tablet" },
            "sessionMetadata": { "pageViews": 3 },
            "sessionTags": { "type": "bounced" }
        }"#;
        let record: SessionRecord = serde_json::from_str(raw).expect("parse record");
        let row = normalize(&record);
        assert_eq!(row.device, "tablet");
        assert_eq!(row.browser, UNKNOWN);
        assert_eq!(row.page_views, 3);
        assert_eq!(row.session_type, "bounced");
    }

    #[test]
    fn empty_categorical_text_falls_back_to_unknown() {
        let mut record = bare_record("s-4");
        record.session_tags = Some(SessionTags {
            session_type: Some(String::new()),
            segment: None,
            category: None,
        });
        let row = normalize(&record);
        assert_eq!(row.session_type, UNKNOWN);
    }
}
