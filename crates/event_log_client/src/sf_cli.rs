//! Wrapper around the Salesforce `sf` command-line client.
//!
//! Every call runs one subprocess with `--json` (or `--result-format json`)
//! and reads the envelope it prints:
//!
//! ```json
//! {"status": 0, "result": {...}}
//! {"status": 1, "name": "NamedOrgNotFoundError", "message": "..."}
//! ```
//!
//! The subprocess itself sits behind [`CommandRunner`] so callers can swap
//! in a scripted runner.

use crate::config::Config;
use crate::{EventLogError, EventLogFile};
use async_trait::async_trait;
use regex::Regex;
use secrecy::SecretString;
use serde::Deserialize;
use std::fmt;
use std::sync::LazyLock;

/// Captured result of one finished subprocess.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// `None` when the process was killed by a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `program` with `args` to completion and capture its output.
    async fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput, EventLogError>;
}

/// Runs commands as real child processes.
#[derive(Clone, Copy, Debug, Default)]
pub struct ProcessRunner;

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput, EventLogError> {
        let output = tokio::process::Command::new(program)
            .args(args)
            .stdin(std::process::Stdio::null())
            .output()
            .await
            .map_err(|source| EventLogError::Spawn {
                program: program.to_string(),
                source,
            })?;
        Ok(CommandOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Best-effort reading of why an `sf` call failed. The CLI's wording is not
/// a stable interface, so anything unrecognised is [`CliFailure::Other`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CliFailure {
    NoMatchingAlias,
    JwtValidation,
    Other,
}

impl fmt::Display for CliFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CliFailure::NoMatchingAlias => "no matching org alias",
            CliFailure::JwtValidation => "JWT validation failed",
            CliFailure::Other => "command error",
        };
        f.write_str(s)
    }
}

static NO_ALIAS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)NamedOrgNotFound|NoAuthInfoFound|No authorization information found|No org configuration found|no default.*org",
    )
    .expect("failure pattern should compile")
});

static JWT_INVALID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)JwtGrant|invalid_grant|invalid_client_id|user hasn't approved this consumer|JWT.*(?:invalid|validation|failed)|private key",
    )
    .expect("failure pattern should compile")
});

fn is_known_failure(text: &str) -> bool {
    NO_ALIAS.is_match(text) || JWT_INVALID.is_match(text)
}

impl CliFailure {
    pub fn classify(text: &str) -> Self {
        if NO_ALIAS.is_match(text) {
            CliFailure::NoMatchingAlias
        } else if JWT_INVALID.is_match(text) {
            CliFailure::JwtValidation
        } else {
            CliFailure::Other
        }
    }
}

/// Authenticated session details reported by `sf org display`.
#[derive(Clone, Debug)]
pub struct OrgSession {
    pub access_token: SecretString,
    pub api_version: String,
    pub instance_url: Option<String>,
}

#[derive(Deserialize)]
struct Envelope {
    status: Option<i64>,
    #[serde(default)]
    result: serde_json::Value,
    name: Option<String>,
    message: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrgDisplayPayload {
    access_token: Option<String>,
    api_version: Option<String>,
    instance_url: Option<String>,
}

#[derive(Deserialize)]
struct QueryPayload {
    #[serde(default)]
    records: Vec<EventLogFile>,
}

/// `sf` CLI commands used by the extractor.
#[derive(Clone, Debug)]
pub struct SfCli<R> {
    program: String,
    runner: R,
}

impl SfCli<ProcessRunner> {
    pub fn new(program: impl Into<String>) -> Self {
        Self::with_runner(program, ProcessRunner)
    }
}

impl<R: CommandRunner> SfCli<R> {
    pub fn with_runner(program: impl Into<String>, runner: R) -> Self {
        Self {
            program: program.into(),
            runner,
        }
    }

    /// `sf org login jwt`; the CLI caches the session under the alias.
    pub async fn login_jwt(&self, cfg: &Config) -> Result<(), EventLogError> {
        let args = vec![
            "org".to_string(),
            "login".into(),
            "jwt".into(),
            "--client-id".into(),
            cfg.client_id.clone(),
            "--username".into(),
            cfg.username.clone(),
            "--jwt-key-file".into(),
            cfg.jwt_key_file.to_string_lossy().into_owned(),
            "--instance-url".into(),
            cfg.instance_url.clone(),
            "--alias".into(),
            cfg.org_alias.clone(),
            "--json".into(),
        ];
        self.run_json(&args).await.map(|_| ())
    }

    /// `sf org display` for the alias; the access token and API version are required.
    pub async fn display_org(&self, alias: &str) -> Result<OrgSession, EventLogError> {
        let args = vec![
            "org".to_string(),
            "display".into(),
            "--target-org".into(),
            alias.to_string(),
            "--json".into(),
        ];
        let result = self.run_json(&args).await?;
        if result.is_null() {
            return Err(EventLogError::Session("accessToken"));
        }
        let payload: OrgDisplayPayload = serde_json::from_value(result)?;
        let access_token = payload
            .access_token
            .filter(|s| !s.is_empty())
            .ok_or(EventLogError::Session("accessToken"))?;
        let api_version = payload
            .api_version
            .filter(|s| !s.is_empty())
            .ok_or(EventLogError::Session("apiVersion"))?;
        Ok(OrgSession {
            access_token: SecretString::new(access_token.into()),
            api_version,
            instance_url: payload.instance_url.filter(|s| !s.is_empty()),
        })
    }

    /// `sf data query` returning the matched `EventLogFile` records in CLI order.
    pub async fn query_event_log_files(
        &self,
        soql: &str,
        alias: &str,
    ) -> Result<Vec<EventLogFile>, EventLogError> {
        let args = vec![
            "data".to_string(),
            "query".into(),
            "--query".into(),
            soql.to_string(),
            "--target-org".into(),
            alias.to_string(),
            "--result-format".into(),
            "json".into(),
        ];
        let result = self.run_json(&args).await?;
        if result.is_null() {
            return Ok(Vec::new());
        }
        let payload: QueryPayload = serde_json::from_value(result)?;
        Ok(payload.records)
    }

    /// Run one command and return the envelope's `result`.
    async fn run_json(&self, args: &[String]) -> Result<serde_json::Value, EventLogError> {
        tracing::debug!("running {} {}", self.program, args.first().map_or("", String::as_str));
        let out = self.runner.run(&self.program, args).await?;
        let envelope = parse_envelope(&out.stdout);

        // `sf` has been seen reporting auth errors on stderr with a zero exit code
        if !out.success() || is_known_failure(&out.stderr) {
            return Err(failure(&out, envelope.as_ref()));
        }

        let Some(envelope) = envelope.transpose()? else {
            // empty stdout with a zero exit code
            return Ok(serde_json::Value::Null);
        };
        let status = envelope.status;
        match status {
            Some(0) | None => Ok(envelope.result),
            Some(_) => Err(failure(&out, Some(&Ok(envelope)))),
        }
    }
}

fn parse_envelope(stdout: &str) -> Option<Result<Envelope, serde_json::Error>> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(serde_json::from_str(trimmed))
    }
}

/// Build a classified CLI error from whatever diagnostic text is available.
fn failure(out: &CommandOutput, envelope: Option<&Result<Envelope, serde_json::Error>>) -> EventLogError {
    let mut parts: Vec<String> = Vec::new();
    if let Some(Ok(env)) = envelope {
        if let Some(name) = &env.name {
            parts.push(name.clone());
        }
        if let Some(message) = &env.message {
            parts.push(message.clone());
        }
    }
    let stderr = out.stderr.trim();
    if !stderr.is_empty() {
        parts.push(stderr.to_string());
    }
    if parts.is_empty() {
        let stdout: String = out.stdout.trim().chars().take(256).collect();
        if !stdout.is_empty() {
            parts.push(stdout);
        }
    }
    let detail = if parts.is_empty() {
        match out.exit_code {
            Some(code) => format!("exited with status {code}"),
            None => "terminated by signal".to_string(),
        }
    } else {
        parts.join(": ")
    };
    EventLogError::Cli {
        kind: CliFailure::classify(&detail),
        detail,
    }
}
