//! HTTP client for downloading `EventLogFile` bodies.
//!
//! Log files can be hundreds of megabytes, so bodies are streamed chunk by
//! chunk into the target file and never held in memory as a whole.

use crate::sf_cli::OrgSession;
use crate::{DownloadSummary, EventLogError, EventLogFile};
use futures_util::StreamExt;
use secrecy::{ExposeSecret, SecretString};
use std::path::Path;
use tokio::io::AsyncWriteExt;

/// Client for the Salesforce REST API using reqwest and a bearer token.
#[derive(Clone, Debug)]
pub struct ReqwestEventLogClient {
    base_url: String,
    api_version: String,
    access_token: SecretString,
    client: reqwest::Client,
}

impl ReqwestEventLogClient {
    /// Create a new client instance.
    ///
    /// # Arguments
    /// * `base_url` - Instance URL of the org (e.g., "https://example.my.salesforce.com")
    /// * `api_version` - REST API version without the `v` prefix (e.g., "62.0")
    /// * `access_token` - Session token used as the bearer credential
    pub fn new(
        base_url: &str,
        api_version: impl Into<String>,
        access_token: SecretString,
    ) -> Result<Self, EventLogError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("event_log_client/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_version: api_version.into(),
            access_token,
            client,
        })
    }

    /// Client for an `sf org display` session. `fallback_base` is used when
    /// the CLI did not report an instance URL.
    pub fn from_session(session: &OrgSession, fallback_base: &str) -> Result<Self, EventLogError> {
        let base = session.instance_url.as_deref().unwrap_or(fallback_base);
        Self::new(base, session.api_version.clone(), session.access_token.clone())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build an authenticated GET request.
    fn get_request(&self, url: &str) -> reqwest::RequestBuilder {
        self.client
            .get(url)
            .bearer_auth(self.access_token.expose_secret())
    }

    /// Extract error information from a failed response.
    async fn error_from_response(&self, resp: reqwest::Response) -> EventLogError {
        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();
        let body_snippet: String = body.chars().take(256).collect();
        EventLogError::from_status(status, body_snippet)
    }

    /// Absolute URL of the record's log body. Prefers the `LogFile` path the
    /// query returned and otherwise builds the standard sobject path.
    pub fn download_url(&self, file: &EventLogFile) -> String {
        match file.log_file.as_deref() {
            Some(fragment) if fragment.starts_with('/') => format!("{}{}", self.base_url, fragment),
            _ => format!(
                "{}/services/data/v{}/sobjects/EventLogFile/{}/LogFile",
                self.base_url, self.api_version, file.id
            ),
        }
    }

    /// Stream one log file to `output_path`.
    ///
    /// Nothing is created on a non-success status; a partially written file
    /// is removed if the stream fails midway.
    pub async fn download_log_file(
        &self,
        file: &EventLogFile,
        output_path: &Path,
    ) -> Result<DownloadSummary, EventLogError> {
        file.check_id()?;
        let url = self.download_url(file);
        let resp = self.get_request(&url).send().await?;
        if !resp.status().is_success() {
            return Err(self.error_from_response(resp).await);
        }

        if let Some(len) = resp.content_length() {
            tracing::info!("File size: {len} bytes");
        }

        let mut out = tokio::fs::File::create(output_path).await?;
        match write_stream(resp, &mut out).await {
            Ok(summary) => Ok(summary),
            Err(e) => {
                drop(out);
                if let Err(rm) = tokio::fs::remove_file(output_path).await {
                    tracing::warn!(
                        "could not remove partial file {}: {rm}",
                        output_path.display()
                    );
                }
                Err(e)
            }
        }
    }
}

async fn write_stream(
    resp: reqwest::Response,
    out: &mut tokio::fs::File,
) -> Result<DownloadSummary, EventLogError> {
    let mut stream = resp.bytes_stream();
    let mut summary = DownloadSummary::default();
    while let Some(chunk) = stream.next().await {
        let bytes = chunk?;
        out.write_all(&bytes).await?;
        summary.bytes_written = summary.bytes_written.saturating_add(bytes.len() as u64);
        summary.line_count += bytes.iter().filter(|b| **b == b'\n').count() as u64;
    }
    out.flush().await?;
    out.sync_all().await?;
    Ok(summary)
}
