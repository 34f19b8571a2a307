//! Salesforce `EventLogFile` access: the `sf` CLI wrapper used for login and
//! querying, and a reqwest-based client that streams log files to disk.

use serde::Deserialize;
use thiserror::Error;

pub mod config;
pub mod http_client;
pub mod layout;
pub mod sf_cli;
pub mod window;

/// Event type of the daily API usage log.
pub const API_TOTAL_USAGE: &str = "ApiTotalUsage";

#[derive(Debug, Error)]
pub enum EventLogError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("unauthorized: {0}")]
    Auth(String),
    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to launch `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("sf cli failed ({kind}): {detail}")]
    Cli {
        kind: sf_cli::CliFailure,
        detail: String,
    },
    #[error("malformed sf cli output: {0}")]
    Json(#[from] serde_json::Error),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("org session incomplete: missing {0}")]
    Session(&'static str),
    #[error("invalid record: {0}")]
    InvalidRecord(String),
}

impl EventLogError {
    /// Map a non-success HTTP status to the matching error.
    pub fn from_status(status: u16, body: String) -> Self {
        match status {
            404 => EventLogError::NotFound(body),
            401 | 403 => EventLogError::Auth(body),
            _ => EventLogError::Status { status, body },
        }
    }
}

/// One `EventLogFile` record as returned by the query.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct EventLogFile {
    pub id: String,
    pub event_type: String,
    pub log_date: String,
    /// Relative REST path of the log body, e.g. `/services/data/v62.0/sobjects/EventLogFile/<id>/LogFile`.
    #[serde(default)]
    pub log_file: Option<String>,
}

impl EventLogFile {
    /// `YYYYMMDD` taken from the leading digits of `LogDate`.
    pub fn date_stamp(&self) -> String {
        self.log_date
            .chars()
            .filter(char::is_ascii_digit)
            .take(8)
            .collect()
    }

    /// Output file name: `ApiTotalUsage_<YYYYMMDD>_<Id>.csv`.
    pub fn csv_file_name(&self) -> String {
        format!("{}_{}_{}.csv", API_TOTAL_USAGE, self.date_stamp(), self.id)
    }

    /// Record ids end up in file names, so only plain ASCII alphanumerics are accepted.
    pub fn check_id(&self) -> Result<(), EventLogError> {
        if !self.id.is_empty() && self.id.chars().all(|c| c.is_ascii_alphanumeric()) {
            Ok(())
        } else {
            Err(EventLogError::InvalidRecord(format!(
                "unexpected EventLogFile id {:?}",
                self.id
            )))
        }
    }
}

/// Bytes and lines written for one downloaded log file.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DownloadSummary {
    pub bytes_written: u64,
    pub line_count: u64,
}

impl DownloadSummary {
    /// Data rows, excluding the CSV header line.
    pub fn record_count(&self) -> u64 {
        self.line_count.saturating_sub(1)
    }
}
