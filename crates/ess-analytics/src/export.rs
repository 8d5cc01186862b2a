//! CSV serialization of the filtered table, for the dashboard's download
//! action and the headless CLI.

use ess_core::SessionRow;
use std::io;
use std::path::Path;
use thiserror::Error;

/// Column order of the export: identity and timestamps first, then the nine
/// normalized fields.
pub const CSV_HEADERS: [&str; 12] = [
    "id",
    "start_time",
    "last_activity",
    "device",
    "browser",
    "source",
    "sales",
    "page_views",
    "duration",
    "session_type",
    "segment",
    "category",
];

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("csv buffer was not utf-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

fn record_fields(row: &SessionRow) -> [String; 12] {
    [
        row.id.clone(),
        row.start_time.to_rfc3339(),
        row.last_activity.to_rfc3339(),
        row.device.clone(),
        row.browser.clone(),
        row.source.clone(),
        row.sales.to_string(),
        row.page_views.to_string(),
        row.duration.to_string(),
        row.session_type.clone(),
        row.segment.clone(),
        row.category.clone(),
    ]
}

pub fn write_csv<W: io::Write>(rows: &[SessionRow], writer: W) -> Result<(), ExportError> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(CSV_HEADERS)?;
    for row in rows {
        csv_writer.write_record(record_fields(row))?;
    }
    csv_writer.flush()?;
    Ok(())
}

pub fn csv_string(rows: &[SessionRow]) -> Result<String, ExportError> {
    let mut buffer = Vec::new();
    write_csv(rows, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

pub fn write_csv_file(rows: &[SessionRow], path: &Path) -> Result<(), ExportError> {
    let file = std::fs::File::create(path)?;
    write_csv(rows, file)
}
