use chrono::{DateTime, Utc};
use ess_core::{DeviceInfo, SessionMetadata, SessionRecord, SessionTags};
use futures_util::stream::TryStreamExt;
use mongodb::bson::{doc, Bson, Document};
use mongodb::{Client, Collection};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Data is re-fetched after this window, matching the dashboard's
/// load-once-per-window contract.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

const DEFAULT_DATABASE: &str = "ecommerce";
const DEFAULT_COLLECTION: &str = "sessions";
const CONNECTION_ENV: &str = "ESS_CONNECTION_STRING";
const SECRETS_PATH_ENV: &str = "ESS_SECRETS_PATH";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("configuration error: {reason}")]
    Config { reason: String },
    #[error("connection error: {0}")]
    Connection(#[from] mongodb::error::Error),
}

impl StoreError {
    fn config(reason: impl Into<String>) -> Self {
        StoreError::Config {
            reason: reason.into(),
        }
    }

    /// User-facing instructions rendered next to the error, so a misconfigured
    /// deployment can be fixed without reading source.
    pub fn remediation_text(&self) -> String {
        let secrets = secrets_path();
        format!(
            "Set the {CONNECTION_ENV} environment variable, or write the secret to \
{path}:\n\n{{\n  \"connection_string\": \"mongodb+srv://...\"\n}}\n\nOptional keys: \
\"database\" (default \"{DEFAULT_DATABASE}\"), \"collection\" (default \"{DEFAULT_COLLECTION}\").",
            path = secrets.display()
        )
    }
}

/// Resolved connection target. The connection string is a secret and never
/// travels through CLI flags.
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    pub connection_string: String,
    #[serde(default = "default_database")]
    pub database: String,
    #[serde(default = "default_collection")]
    pub collection: String,
}

fn default_database() -> String {
    DEFAULT_DATABASE.to_string()
}

fn default_collection() -> String {
    DEFAULT_COLLECTION.to_string()
}

fn secrets_path() -> PathBuf {
    if let Ok(path) = env::var(SECRETS_PATH_ENV) {
        return PathBuf::from(path);
    }
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("ess")
        .join("secrets.json")
}

/// Read a secrets file. Kept separate from [`resolve_config`] so the file
/// format is testable without touching the process environment.
pub fn read_secrets_file(path: &Path) -> Result<StoreConfig, StoreError> {
    let raw = fs::read_to_string(path).map_err(|err| {
        StoreError::config(format!("cannot read secrets file {}: {err}", path.display()))
    })?;
    serde_json::from_str(&raw).map_err(|err| {
        StoreError::config(format!(
            "cannot parse secrets file {}: {err}",
            path.display()
        ))
    })
}

/// Resolve the store configuration: `ESS_CONNECTION_STRING` wins, else the
/// secrets file under the user config directory.
pub fn resolve_config() -> Result<StoreConfig, StoreError> {
    if let Ok(uri) = env::var(CONNECTION_ENV) {
        if !uri.trim().is_empty() {
            debug!("connection string taken from {CONNECTION_ENV}");
            return Ok(StoreConfig {
                connection_string: uri,
                database: default_database(),
                collection: default_collection(),
            });
        }
    }

    let path = secrets_path();
    if !path.exists() {
        return Err(StoreError::config(format!(
            "no {CONNECTION_ENV} set and no secrets file at {}",
            path.display()
        )));
    }
    read_secrets_file(&path)
}

/// Handle on the sessions collection. The client pools connections
/// internally and lives for the process lifetime.
pub struct SessionStore {
    collection: Collection<Document>,
}

impl SessionStore {
    pub async fn connect(config: &StoreConfig) -> Result<Self, StoreError> {
        let client = Client::with_uri_str(&config.connection_string).await?;
        // Surface unreachable-host and bad-credential failures here rather
        // than on the first fetch.
        client.database("admin").run_command(doc! { "ping": 1 }).await?;
        info!(
            database = %config.database,
            collection = %config.collection,
            "connected to session store"
        );
        let collection = client
            .database(&config.database)
            .collection(&config.collection);
        Ok(Self { collection })
    }

    /// Fetch the complete collection. An empty collection is an empty table,
    /// not an error; downstream layers render the no-data state.
    pub async fn fetch_all(&self) -> Result<Vec<SessionRecord>, StoreError> {
        let cursor = self.collection.find(doc! {}).await?;
        let documents: Vec<Document> = cursor.try_collect().await?;
        if documents.is_empty() {
            warn!("sessions collection returned zero documents");
        } else {
            info!(count = documents.len(), "loaded session documents");
        }
        Ok(documents.iter().map(record_from_document).collect())
    }
}

/// Convert one stored document into a typed record. Total: every missing or
/// oddly-typed field degrades to its default instead of rejecting the record.
pub fn record_from_document(document: &Document) -> SessionRecord {
    SessionRecord {
        id: extract_id(document),
        start_time: extract_timestamp(document, "startTime"),
        last_activity: extract_timestamp(document, "lastActivity"),
        device_info: extract_device_info(document),
        session_metadata: extract_session_metadata(document),
        session_tags: extract_session_tags(document),
    }
}

fn extract_id(document: &Document) -> String {
    for key in ["_id", "id"] {
        match document.get(key) {
            Some(Bson::ObjectId(oid)) => return oid.to_hex(),
            Some(Bson::String(text)) => return text.clone(),
            Some(Bson::Int32(value)) => return value.to_string(),
            Some(Bson::Int64(value)) => return value.to_string(),
            _ => {}
        }
    }
    String::new()
}

fn extract_timestamp(document: &Document, key: &str) -> DateTime<Utc> {
    match document.get(key) {
        Some(Bson::DateTime(stamp)) => DateTime::from_timestamp_millis(stamp.timestamp_millis())
            .unwrap_or(DateTime::UNIX_EPOCH),
        Some(Bson::String(text)) => parse_timestamp_text(text),
        _ => DateTime::UNIX_EPOCH,
    }
}

fn parse_timestamp_text(text: &str) -> DateTime<Utc> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return parsed.with_timezone(&Utc);
    }
    if let Ok(parsed) = chrono::NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S") {
        return parsed.and_utc();
    }
    warn!(value = text, "unparseable timestamp, defaulting to epoch");
    DateTime::UNIX_EPOCH
}

fn sub_document<'a>(document: &'a Document, key: &str) -> Option<&'a Document> {
    match document.get(key) {
        Some(Bson::Document(sub)) => Some(sub),
        _ => None,
    }
}

fn string_field(document: &Document, key: &str) -> Option<String> {
    match document.get(key) {
        Some(Bson::String(text)) => Some(text.clone()),
        _ => None,
    }
}

fn f64_field(document: &Document, key: &str) -> Option<f64> {
    match document.get(key) {
        Some(Bson::Double(value)) => Some(*value),
        Some(Bson::Int32(value)) => Some(f64::from(*value)),
        Some(Bson::Int64(value)) => Some(*value as f64),
        _ => None,
    }
}

fn u64_field(document: &Document, key: &str) -> Option<u64> {
    match document.get(key) {
        Some(Bson::Int32(value)) => Some((*value).max(0) as u64),
        Some(Bson::Int64(value)) => Some((*value).max(0) as u64),
        Some(Bson::Double(value)) if *value >= 0.0 => Some(value.round() as u64),
        _ => None,
    }
}

fn extract_device_info(document: &Document) -> Option<DeviceInfo> {
    let sub = sub_document(document, "deviceInfo")?;
    Some(DeviceInfo {
        device: string_field(sub, "device"),
        browser: string_field(sub, "browser"),
    })
}

fn extract_session_metadata(document: &Document) -> Option<SessionMetadata> {
    let sub = sub_document(document, "sessionMetadata")?;
    Some(SessionMetadata {
        source: string_field(sub, "source"),
        sales: f64_field(sub, "sales"),
        page_views: u64_field(sub, "pageViews"),
        duration: f64_field(sub, "duration"),
    })
}

fn extract_session_tags(document: &Document) -> Option<SessionTags> {
    let sub = sub_document(document, "sessionTags")?;
    Some(SessionTags {
        session_type: string_field(sub, "type"),
        segment: string_field(sub, "segment"),
        category: string_field(sub, "category"),
    })
}

pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Time-bounded cache for the loaded table. Constructed once at process start
/// and passed to whoever drives the loader; the clock is injected so expiry is
/// testable.
pub struct SessionCache {
    ttl: Duration,
    clock: Box<dyn Clock>,
    entry: Option<(Instant, Vec<SessionRecord>)>,
}

impl SessionCache {
    pub fn new(ttl: Duration) -> Self {
        Self::with_clock(ttl, Box::new(SystemClock))
    }

    pub fn with_clock(ttl: Duration, clock: Box<dyn Clock>) -> Self {
        Self {
            ttl,
            clock,
            entry: None,
        }
    }

    /// The cached table, if still inside the TTL window.
    pub fn get(&self) -> Option<&[SessionRecord]> {
        let (stamp, records) = self.entry.as_ref()?;
        if self.clock.now().duration_since(*stamp) < self.ttl {
            Some(records)
        } else {
            None
        }
    }

    pub fn put(&mut self, records: Vec<SessionRecord>) {
        self.entry = Some((self.clock.now(), records));
    }

    pub fn invalidate(&mut self) {
        self.entry = None;
    }
}
