//! Plugin process execution.
//!
//! The harness speaks to plugins the way the launcher does: a single JSON
//! request on the command line, a JSON response on stdout. `PluginHost`
//! abstracts the launch mechanism so tests can substitute a shell-backed
//! host for the real interpreter.

use crate::error::{PluginError, Result};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::debug;

/// The JSON-RPC style request handed to the plugin as its sole argument.
#[derive(Debug, Clone, Serialize)]
pub struct QueryRequest {
    pub method: String,
    pub parameters: Vec<Value>,
    #[serde(rename = "Settings")]
    pub settings: Map<String, Value>,
}

impl QueryRequest {
    /// The canonical smoke-test request: a `query` with an empty search
    /// string and no settings.
    pub fn empty_query() -> Self {
        Self {
            method: "query".to_string(),
            parameters: vec![Value::String(String::new())],
            settings: Map::new(),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Raw result of one plugin invocation.
#[derive(Debug)]
pub struct QueryOutcome {
    /// Process exit code; `None` when terminated by a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

/// Something that can run a plugin query to completion.
#[async_trait]
pub trait PluginHost {
    async fn query(&self, request: &QueryRequest) -> Result<QueryOutcome>;

    /// Human-readable command line, for run reports.
    fn describe(&self, request_json: &str) -> String;
}

/// Runs the plugin through an external interpreter as a child process.
#[derive(Debug, Clone)]
pub struct InterpreterHost {
    program: String,
    flags: Vec<String>,
    executable: String,
    working_dir: PathBuf,
}

impl InterpreterHost {
    /// An interpreter invoked with `-S` so the plugin only sees the
    /// packages shipped inside its own directory.
    pub fn new(program: &str, working_dir: &Path, executable: &str) -> Self {
        Self::with_flags(program, vec!["-S".to_string()], working_dir, executable)
    }

    pub fn with_flags(
        program: &str,
        flags: Vec<String>,
        working_dir: &Path,
        executable: &str,
    ) -> Self {
        Self {
            program: program.to_string(),
            flags,
            executable: executable.to_string(),
            working_dir: working_dir.to_path_buf(),
        }
    }

    fn executable_path(&self) -> PathBuf {
        self.working_dir.join(&self.executable)
    }
}

#[async_trait]
impl PluginHost for InterpreterHost {
    async fn query(&self, request: &QueryRequest) -> Result<QueryOutcome> {
        let request_json = request.to_json()?;
        debug!(program = %self.program, executable = %self.executable, "launching plugin");

        let output = Command::new(&self.program)
            .args(&self.flags)
            .arg(self.executable_path())
            .arg(&request_json)
            .current_dir(&self.working_dir)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| PluginError::SpawnFailed {
                reason: e.to_string(),
            })?;

        Ok(QueryOutcome {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    fn describe(&self, request_json: &str) -> String {
        let mut parts = vec![self.program.clone()];
        parts.extend(self.flags.iter().cloned());
        parts.push(self.executable_path().display().to_string());
        parts.push(request_json.to_string());
        parts.join(" ")
    }
}

/// Whether the plugin's stdout holds a usable response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseValidity {
    /// Stdout parsed as JSON.
    Valid,
    /// Stdout was non-empty but not JSON.
    Invalid(String),
    /// Stdout was empty or whitespace only.
    Missing,
}

/// Classify the plugin's stdout. An empty response is distinguished from a
/// malformed one so reports can say which happened, but both fail the run.
pub fn validate_response(stdout: &str) -> ResponseValidity {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return ResponseValidity::Missing;
    }
    match serde_json::from_str::<Value>(trimmed) {
        Ok(_) => ResponseValidity::Valid,
        Err(e) => ResponseValidity::Invalid(e.to_string()),
    }
}

/// Final judgement on one plugin invocation.
#[derive(Debug)]
pub struct TestOutcome {
    pub exit_code: Option<i32>,
    pub validity: ResponseValidity,
}

impl TestOutcome {
    pub fn from_query(outcome: &QueryOutcome) -> Self {
        Self {
            exit_code: outcome.exit_code,
            validity: validate_response(&outcome.stdout),
        }
    }

    /// The test passes only on a clean exit with a parseable response.
    pub fn passed(&self) -> bool {
        self.exit_code == Some(0) && self.validity == ResponseValidity::Valid
    }

    /// Exit code the harness should report for a failed run. A clean child
    /// exit that still failed (bad response) maps to 1, as does a
    /// signal-terminated child.
    pub fn failure_code(&self) -> i32 {
        match self.exit_code {
            Some(0) | None => 1,
            Some(code) => code,
        }
    }
}
