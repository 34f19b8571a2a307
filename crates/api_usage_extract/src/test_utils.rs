//! Scripted `sf` CLI used by the pipeline tests.
#![cfg(test)]

use async_trait::async_trait;
use event_log_client::EventLogError;
use event_log_client::sf_cli::{CommandOutput, CommandRunner};
use serde_json::json;
use std::sync::Mutex;

/// Answers `org login`, `org display` and `data query` with canned outputs
/// and records every invocation.
pub struct ScriptedRunner {
    pub login: CommandOutput,
    pub display: CommandOutput,
    pub query: CommandOutput,
    calls: Mutex<Vec<Vec<String>>>,
}

fn ok(result: serde_json::Value) -> CommandOutput {
    CommandOutput {
        exit_code: Some(0),
        stdout: json!({"status": 0, "result": result}).to_string(),
        stderr: String::new(),
    }
}

pub fn failed(exit_code: i32, name: &str, message: &str) -> CommandOutput {
    CommandOutput {
        exit_code: Some(exit_code),
        stdout: json!({"status": exit_code, "name": name, "message": message}).to_string(),
        stderr: String::new(),
    }
}

impl ScriptedRunner {
    /// Healthy org at `instance_url` whose query returns `records`.
    pub fn healthy(instance_url: &str, records: serde_json::Value) -> Self {
        let total = records.as_array().map_or(0, Vec::len);
        Self {
            login: ok(json!({"username": "user@example.com", "orgId": "00Dxx0000001gPL"})),
            display: ok(json!({
                "accessToken": "00Dxx!session",
                "apiVersion": "62.0",
                "instanceUrl": instance_url,
                "username": "user@example.com"
            })),
            query: ok(json!({"totalSize": total, "done": true, "records": records})),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// First two words of each call, e.g. `"org login"`.
    pub fn subcommands(&self) -> Vec<String> {
        self.calls()
            .iter()
            .map(|args| args.iter().take(2).cloned().collect::<Vec<_>>().join(" "))
            .collect()
    }
}

#[async_trait]
impl CommandRunner for &ScriptedRunner {
    async fn run(&self, _program: &str, args: &[String]) -> Result<CommandOutput, EventLogError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(args.to_vec());
        }
        let words: Vec<&str> = args.iter().take(2).map(String::as_str).collect();
        match words.as_slice() {
            ["org", "login"] => Ok(self.login.clone()),
            ["org", "display"] => Ok(self.display.clone()),
            ["data", "query"] => Ok(self.query.clone()),
            other => panic!("unexpected sf invocation {other:?}"),
        }
    }
}

/// A query record for `id` on 2025-03-09.
pub fn record(id: &str) -> serde_json::Value {
    json!({
        "attributes": {"type": "EventLogFile", "url": format!("/services/data/v62.0/sobjects/EventLogFile/{id}")},
        "Id": id,
        "EventType": "ApiTotalUsage",
        "LogDate": "2025-03-09T00:00:00.000+0000"
    })
}
