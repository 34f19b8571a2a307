//! Daily extraction of the Salesforce `ApiTotalUsage` event log.
//!
//! One run is a straight line: validate → authenticate → query → download
//! each record in query order. Anything failing before the downloads ends
//! the run; a failed download is logged and the next record is tried.

use chrono::{DateTime, Utc};
use event_log_client::config::Config;
use event_log_client::http_client::ReqwestEventLogClient;
use event_log_client::layout::OutputLayout;
use event_log_client::sf_cli::{CommandRunner, OrgSession, SfCli};
use event_log_client::window::DateWindow;
use event_log_client::{API_TOTAL_USAGE, EventLogError, EventLogFile};
use std::path::PathBuf;
use tracing::{error, info};

pub mod cli;
pub mod error;
pub mod logging;
mod test_utils;

pub use error::{ExtractError, ExtractResult};

/// Everything a run needs, resolved once at startup.
#[derive(Clone, Debug)]
pub struct RunContext {
    pub config: Config,
    pub window: DateWindow,
    pub layout: OutputLayout,
}

impl RunContext {
    pub fn new(config: Config, now: DateTime<Utc>) -> Self {
        let layout = OutputLayout::new(config.output_dir.clone());
        Self {
            window: DateWindow::previous_utc_day(now),
            layout,
            config,
        }
    }

    /// `logs/extract_usage_<target date>.log`
    pub fn log_file(&self) -> PathBuf {
        self.layout.log_file(&self.window.stamp())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunOutcome {
    NoRecords,
    Completed { downloaded: usize, failed: usize },
}

pub struct Extractor<R> {
    ctx: RunContext,
    cli: SfCli<R>,
}

impl<R: CommandRunner> Extractor<R> {
    pub fn new(ctx: RunContext, cli: SfCli<R>) -> Self {
        Self { ctx, cli }
    }

    pub async fn run(&self) -> ExtractResult<RunOutcome> {
        info!("Starting API Total Usage extraction...");
        self.ctx.config.validate().map_err(|e| {
            error!("Invalid configuration: {e}");
            ExtractError::Setup(e)
        })?;

        let session = self.authenticate().await?;
        let records = self.query().await?;

        if records.is_empty() {
            info!("No EventLogFile records found for the specified date range. Exiting.");
            return Ok(RunOutcome::NoRecords);
        }

        info!("Starting API Total Usage extraction with EventLog data...");
        info!("Output directory: {}", self.ctx.layout.root().display());

        let client =
            ReqwestEventLogClient::from_session(&session, self.ctx.config.instance_base())
                .map_err(|e| {
                    error!("Failed to build HTTP client: {e}");
                    ExtractError::Setup(e)
                })?;

        let mut downloaded = 0;
        let mut failed = 0;
        for record in &records {
            match self.download(&client, record).await {
                Ok(()) => downloaded += 1,
                Err(e) => {
                    error!("Failed to process EventLogFile {}: {e}", record.id);
                    failed += 1;
                }
            }
        }

        if failed == 0 {
            info!("SUCCESS: API Total Usage extraction completed! {downloaded} file(s) saved");
        } else {
            info!(
                "API Total Usage extraction finished: {downloaded} file(s) saved, {failed} failed"
            );
        }
        Ok(RunOutcome::Completed { downloaded, failed })
    }

    async fn authenticate(&self) -> ExtractResult<OrgSession> {
        let cfg = &self.ctx.config;
        info!("Authenticating with Salesforce using JWT flow...");
        self.cli.login_jwt(cfg).await.map_err(|e| {
            error!("Authentication failed: {e}");
            ExtractError::Auth(e)
        })?;
        info!("JWT authentication successful");

        info!("Retrieving org information...");
        let session = self.cli.display_org(&cfg.org_alias).await.map_err(|e| {
            error!("Authentication failed: {e}");
            ExtractError::Auth(e)
        })?;
        info!("Salesforce org version: v{}", session.api_version);
        info!("Authentication completed successfully");
        Ok(session)
    }

    async fn query(&self) -> ExtractResult<Vec<EventLogFile>> {
        let window = &self.ctx.window;
        info!(
            "Querying Event Log Files for date range: {} to {}",
            window.start_literal(),
            window.end_literal()
        );
        let soql = window.event_log_query(API_TOTAL_USAGE);
        let records = self
            .cli
            .query_event_log_files(&soql, &self.ctx.config.org_alias)
            .await
            .map_err(|e| {
                error!("Failed to query EventLogFile metadata: {e}");
                ExtractError::Query(e)
            })?;
        info!("Found {} EventLogFile record(s)", records.len());
        Ok(records)
    }

    async fn download(
        &self,
        client: &ReqwestEventLogClient,
        record: &EventLogFile,
    ) -> Result<(), EventLogError> {
        info!(
            "Processing EventLogFile: {} (Date: {})",
            record.id, record.log_date
        );
        let path = self.ctx.layout.csv_path(record);
        info!("Streaming CSV data for EventLogFile: {}", record.id);
        let summary = client.download_log_file(record, &path).await?;
        info!(
            "Saved complete ApiTotalUsage file with {} total API calls ({} bytes)",
            summary.record_count(),
            summary.bytes_written
        );
        info!("CSV file created: {}", path.display());
        println!("CSV file created: {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{ScriptedRunner, failed, record};
    use chrono::TimeZone;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct Fixture {
        _dir: tempfile::TempDir,
        _key: tempfile::NamedTempFile,
        ctx: RunContext,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let key = tempfile::NamedTempFile::new().unwrap();
        let config = Config {
            client_id: "3MVG9client".into(),
            username: "user@example.com".into(),
            jwt_key_file: key.path().to_path_buf(),
            instance_url: "https://login.salesforce.com".into(),
            org_alias: "usage".into(),
            output_dir: dir.path().join("usage"),
            sf_bin: "sf".into(),
        };
        let now = Utc.with_ymd_and_hms(2025, 3, 10, 2, 0, 0).unwrap();
        let ctx = RunContext::new(config, now);
        ctx.layout.prepare().unwrap();
        Fixture {
            _dir: dir,
            _key: key,
            ctx,
        }
    }

    fn csv_files(ctx: &RunContext) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(ctx.layout.csv_dir())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    async fn mount_log(server: &MockServer, id: &str, status: u16, body: &[u8]) {
        Mock::given(method("GET"))
            .and(path(format!(
                "/services/data/v62.0/sobjects/EventLogFile/{id}/LogFile"
            )))
            .and(header("authorization", "Bearer 00Dxx!session"))
            .respond_with(ResponseTemplate::new(status).set_body_bytes(body.to_vec()))
            .expect(1)
            .mount(server)
            .await;
    }

    #[test]
    fn run_context_uses_previous_day_for_log_file() {
        let fx = fixture();
        assert_eq!(fx.ctx.window.stamp(), "20250309");
        assert!(
            fx.ctx
                .log_file()
                .ends_with("usage/logs/extract_usage_20250309.log")
        );
    }

    #[tokio::test]
    async fn no_records_exits_cleanly_without_output() {
        let fx = fixture();
        let server = MockServer::start().await;
        let runner = ScriptedRunner::healthy(&server.uri(), json!([]));
        let extractor = Extractor::new(fx.ctx.clone(), SfCli::with_runner("sf", &runner));

        let outcome = extractor.run().await.expect("run");

        assert_eq!(outcome, RunOutcome::NoRecords);
        assert!(csv_files(&fx.ctx).is_empty());
        assert_eq!(
            runner.subcommands(),
            ["org login", "org display", "data query"]
        );
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_login_stops_before_query_and_download() {
        let fx = fixture();
        let server = MockServer::start().await;
        let mut runner = ScriptedRunner::healthy(&server.uri(), json!([record("0AT1")]));
        runner.login = failed(1, "JwtGrantError", "invalid_grant: expired access/refresh token");
        let extractor = Extractor::new(fx.ctx.clone(), SfCli::with_runner("sf", &runner));

        let err = extractor.run().await.unwrap_err();

        assert!(matches!(err, ExtractError::Auth(_)));
        assert!(err.to_string().contains("invalid_grant"));
        assert_eq!(runner.subcommands(), ["org login"]);
        assert!(server.received_requests().await.unwrap().is_empty());
        assert!(csv_files(&fx.ctx).is_empty());
    }

    #[tokio::test]
    async fn missing_alias_on_display_is_fatal() {
        let fx = fixture();
        let server = MockServer::start().await;
        let mut runner = ScriptedRunner::healthy(&server.uri(), json!([record("0AT1")]));
        runner.display = failed(
            1,
            "NamedOrgNotFoundError",
            "No authorization information found for usage.",
        );
        let extractor = Extractor::new(fx.ctx.clone(), SfCli::with_runner("sf", &runner));

        let err = extractor.run().await.unwrap_err();
        assert!(matches!(
            err,
            ExtractError::Auth(EventLogError::Cli {
                kind: event_log_client::sf_cli::CliFailure::NoMatchingAlias,
                ..
            })
        ));
        assert_eq!(runner.subcommands(), ["org login", "org display"]);
    }

    #[tokio::test]
    async fn failed_query_is_fatal() {
        let fx = fixture();
        let server = MockServer::start().await;
        let mut runner = ScriptedRunner::healthy(&server.uri(), json!([]));
        runner.query = failed(1, "MalformedQueryError", "unexpected token: 'FROM'");
        let extractor = Extractor::new(fx.ctx.clone(), SfCli::with_runner("sf", &runner));

        let err = extractor.run().await.unwrap_err();
        assert!(matches!(err, ExtractError::Query(_)));
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn invalid_config_fails_before_any_subprocess() {
        let mut fx = fixture();
        fx.ctx.config.jwt_key_file = fx.ctx.layout.root().join("no-such.key");
        let runner = ScriptedRunner::healthy("http://127.0.0.1:9", json!([]));
        let extractor = Extractor::new(fx.ctx.clone(), SfCli::with_runner("sf", &runner));

        let err = extractor.run().await.unwrap_err();
        assert!(matches!(err, ExtractError::Setup(_)));
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn query_passes_window_and_alias() {
        let fx = fixture();
        let server = MockServer::start().await;
        let runner = ScriptedRunner::healthy(&server.uri(), json!([]));
        let extractor = Extractor::new(fx.ctx.clone(), SfCli::with_runner("sf", &runner));
        extractor.run().await.expect("run");

        let query_call = &runner.calls()[2];
        let soql = &query_call[3];
        assert!(soql.contains("EventType = 'ApiTotalUsage'"));
        assert!(soql.contains("LogDate >= 2025-03-09T00:00:00.000Z"));
        assert!(soql.contains("LogDate < 2025-03-10T00:00:00.000Z"));
        assert_eq!(query_call[5], "usage");
    }

    #[tokio::test]
    async fn downloads_each_record_verbatim() {
        let fx = fixture();
        let server = MockServer::start().await;
        let first = b"\"EVENT_TYPE\",\"API_FAMILY\"\n\"ApiTotalUsage\",\"REST\"\n".to_vec();
        let second = b"\"EVENT_TYPE\",\"API_FAMILY\"\n\"ApiTotalUsage\",\"SOAP\"\r\n\"ApiTotalUsage\",\"Bulk\"\r\n".to_vec();
        mount_log(&server, "0AT1", 200, &first).await;
        mount_log(&server, "0AT2", 200, &second).await;

        let runner =
            ScriptedRunner::healthy(&server.uri(), json!([record("0AT1"), record("0AT2")]));
        let extractor = Extractor::new(fx.ctx.clone(), SfCli::with_runner("sf", &runner));

        let outcome = extractor.run().await.expect("run");
        assert_eq!(
            outcome,
            RunOutcome::Completed {
                downloaded: 2,
                failed: 0
            }
        );

        assert_eq!(
            csv_files(&fx.ctx),
            [
                "ApiTotalUsage_20250309_0AT1.csv",
                "ApiTotalUsage_20250309_0AT2.csv"
            ]
        );
        let csv_dir = fx.ctx.layout.csv_dir();
        assert_eq!(
            std::fs::read(csv_dir.join("ApiTotalUsage_20250309_0AT1.csv")).unwrap(),
            first
        );
        assert_eq!(
            std::fs::read(csv_dir.join("ApiTotalUsage_20250309_0AT2.csv")).unwrap(),
            second
        );
    }

    #[tokio::test]
    async fn one_missing_log_does_not_stop_the_others() {
        let fx = fixture();
        let server = MockServer::start().await;
        mount_log(&server, "0AT1", 200, b"h\na\n").await;
        mount_log(&server, "0AT2", 404, b"[{\"errorCode\":\"NOT_FOUND\"}]").await;
        mount_log(&server, "0AT3", 200, b"h\nc\n").await;

        let runner = ScriptedRunner::healthy(
            &server.uri(),
            json!([record("0AT1"), record("0AT2"), record("0AT3")]),
        );
        let extractor = Extractor::new(fx.ctx.clone(), SfCli::with_runner("sf", &runner));

        let outcome = extractor.run().await.expect("run");
        assert_eq!(
            outcome,
            RunOutcome::Completed {
                downloaded: 2,
                failed: 1
            }
        );
        assert_eq!(
            csv_files(&fx.ctx),
            [
                "ApiTotalUsage_20250309_0AT1.csv",
                "ApiTotalUsage_20250309_0AT3.csv"
            ]
        );

        let order: Vec<String> = server
            .received_requests()
            .await
            .unwrap()
            .iter()
            .map(|r| r.url.path().to_string())
            .collect();
        assert_eq!(order.len(), 3);
        assert!(order[0].contains("0AT1"));
        assert!(order[1].contains("0AT2"));
        assert!(order[2].contains("0AT3"));
    }

    #[tokio::test]
    async fn log_file_records_stages_in_order() {
        let fx = fixture();
        let server = MockServer::start().await;
        mount_log(&server, "0AT1", 200, b"h\na\n").await;
        mount_log(&server, "0AT2", 404, b"gone").await;

        let runner =
            ScriptedRunner::healthy(&server.uri(), json!([record("0AT1"), record("0AT2")]));
        let extractor = Extractor::new(fx.ctx.clone(), SfCli::with_runner("sf", &runner));

        let appender = logging::file_appender(&fx.ctx.log_file()).unwrap();
        let _guard = tracing::subscriber::set_default(logging::subscriber(
            logging::log_filter(Some("info")),
            appender,
        ));
        extractor.run().await.expect("run");

        let text = std::fs::read_to_string(fx.ctx.log_file()).unwrap();
        let expected = [
            "Starting API Total Usage extraction...",
            "Authenticating with Salesforce using JWT flow...",
            "JWT authentication successful",
            "Salesforce org version: v62.0",
            "Querying Event Log Files for date range: 2025-03-09T00:00:00.000Z to 2025-03-10T00:00:00.000Z",
            "Found 2 EventLogFile record(s)",
            "Processing EventLogFile: 0AT1",
            "CSV file created:",
            "Processing EventLogFile: 0AT2",
            "Failed to process EventLogFile 0AT2: not found: gone",
            "1 file(s) saved, 1 failed",
        ];
        let lines: Vec<&str> = text.lines().collect();
        let mut cursor = 0;
        for needle in expected {
            let found = lines[cursor..]
                .iter()
                .position(|l| l.contains(needle))
                .unwrap_or_else(|| panic!("{needle:?} missing or out of order in:\n{text}"));
            cursor += found + 1;
        }
        assert!(
            lines
                .iter()
                .find(|l| l.contains("Failed to process"))
                .is_some_and(|l| l.contains("ERROR"))
        );
        assert!(!text.contains("00Dxx!session"), "access token must not be logged");
    }
}
