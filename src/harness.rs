//! The end-to-end smoke-test pipeline.
//!
//! Select a candidate from the manifest, provision the launcher
//! environment, acquire and materialize the package, then run one empty
//! query through it. The run report is printed to stdout as it happens;
//! diagnostics go through `tracing`.

use crate::config::HarnessConfig;
use crate::environment::HostEnvironment;
use crate::error::Result;
use crate::manifest::{self, Selection};
use crate::runner::{
    InterpreterHost, PluginHost, QueryOutcome, QueryRequest, ResponseValidity, TestOutcome,
};
use crate::{acquire, settings};
use tracing::info;

const BANNER: &str = "#########";

/// How a full harness run concluded. `main` maps this to a process exit
/// code; everything user-facing has already been printed by then.
#[derive(Debug, PartialEq, Eq)]
pub enum RunVerdict {
    /// The candidate ran cleanly and produced a valid response.
    Passed,
    /// The newest untested plugin is not hosted where the harness can
    /// fetch it; nothing was run and nothing failed.
    NothingToTest { name: String },
    /// Every plugin in the target language is already tested.
    NoCandidate,
    /// The candidate ran and failed.
    Failed { exit_code: i32 },
}

/// Run the whole pipeline for the newest untested plugin in the manifest.
pub async fn run(config: &HarnessConfig, client: &reqwest::Client) -> Result<RunVerdict> {
    let entries = manifest::load(&config.manifest, client).await?;
    info!("loaded {} manifest entries", entries.len());

    let descriptor = match manifest::select_candidate(&entries, &config.language, &config.supported_host)
    {
        Selection::Candidate(descriptor) => descriptor,
        Selection::UnsupportedHost { name } => {
            println!("Non-Github based website!");
            return Ok(RunVerdict::NothingToTest { name });
        }
        Selection::NoneUntested => {
            println!("No Untested plugin found!");
            return Ok(RunVerdict::NoCandidate);
        }
    };
    println!("Testing {} {}", descriptor.name, descriptor.version);

    let env = HostEnvironment::from_config(config)?;
    env.provision()?;

    let extract_dir = acquire::acquire(client, config, &env, descriptor).await?;
    let plugin = settings::materialize(&env, descriptor, &extract_dir)?;

    let host = InterpreterHost::new(&config.interpreter, &plugin.plugin_dir, &plugin.execute_file);
    let mut request = QueryRequest::empty_query();
    if let Some(defaults) = plugin.default_settings {
        request.settings = defaults;
    }
    execute_query(&host, &request).await
}

/// Run one query through the host and report the outcome.
pub async fn execute_query(host: &dyn PluginHost, request: &QueryRequest) -> Result<RunVerdict> {
    let request_json = request.to_json()?;

    println!("{BANNER} Input {BANNER}");
    println!("{}", host.describe(&request_json));

    let outcome = host.query(request).await?;
    let result = TestOutcome::from_query(&outcome);
    print!("{}", render_report(&outcome, &result));

    if result.passed() {
        return Ok(RunVerdict::Passed);
    }
    Ok(RunVerdict::Failed {
        exit_code: result.failure_code(),
    })
}

/// The run report following the echoed invocation. Empty streams produce
/// no section at all, so a silent plugin yields no `Output` banner and a
/// quiet failure no `Trace` banner.
fn render_report(outcome: &QueryOutcome, result: &TestOutcome) -> String {
    let mut report = String::new();
    if !outcome.stdout.is_empty() {
        report.push_str(&format!("{BANNER} Output {BANNER}\n"));
        report.push_str(&format!("{}\n", outcome.stdout));
    }

    if result.passed() {
        report.push_str("Test passed!\n");
        return report;
    }

    report.push_str("Test failed!\n");
    match (&result.validity, result.exit_code) {
        (_, Some(code)) if code != 0 => {
            report.push_str("Plugin returned a non-zero exit code!\n")
        }
        (_, None) => report.push_str("Plugin was terminated by a signal!\n"),
        (ResponseValidity::Missing, _) => report.push_str("Plugin produced no response!\n"),
        (ResponseValidity::Invalid(reason), _) => {
            report.push_str(&format!("Plugin response is not valid JSON: {reason}\n"))
        }
        (ResponseValidity::Valid, _) => {}
    }
    if !outcome.stderr.is_empty() {
        report.push_str(&format!("{BANNER} Trace {BANNER}\n"));
        report.push_str(&format!("{}\n", outcome.stderr));
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HarnessError;
    use async_trait::async_trait;

    struct CannedHost {
        exit_code: Option<i32>,
        stdout: &'static str,
    }

    #[async_trait]
    impl PluginHost for CannedHost {
        async fn query(&self, _request: &QueryRequest) -> Result<QueryOutcome> {
            Ok(QueryOutcome {
                exit_code: self.exit_code,
                stdout: self.stdout.to_string(),
                stderr: String::new(),
            })
        }

        fn describe(&self, request_json: &str) -> String {
            format!("canned {request_json}")
        }
    }

    #[tokio::test]
    async fn clean_exit_with_json_response_passes() {
        let host = CannedHost {
            exit_code: Some(0),
            stdout: r#"{"result": []}"#,
        };
        assert_eq!(execute_query(&host, &QueryRequest::empty_query()).await.unwrap(), RunVerdict::Passed);
    }

    #[tokio::test]
    async fn nonzero_exit_fails_with_the_child_code() {
        let host = CannedHost {
            exit_code: Some(7),
            stdout: r#"{"result": []}"#,
        };
        assert_eq!(
            execute_query(&host, &QueryRequest::empty_query()).await.unwrap(),
            RunVerdict::Failed { exit_code: 7 }
        );
    }

    #[tokio::test]
    async fn clean_exit_without_response_still_fails() {
        let host = CannedHost {
            exit_code: Some(0),
            stdout: "",
        };
        assert_eq!(
            execute_query(&host, &QueryRequest::empty_query()).await.unwrap(),
            RunVerdict::Failed { exit_code: 1 }
        );
    }

    #[tokio::test]
    async fn clean_exit_with_garbage_response_fails() {
        let host = CannedHost {
            exit_code: Some(0),
            stdout: "Traceback ...",
        };
        assert_eq!(
            execute_query(&host, &QueryRequest::empty_query()).await.unwrap(),
            RunVerdict::Failed { exit_code: 1 }
        );
    }

    fn canned_outcome(exit_code: Option<i32>, stdout: &str, stderr: &str) -> QueryOutcome {
        QueryOutcome {
            exit_code,
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
        }
    }

    #[test]
    fn report_omits_the_output_section_for_a_silent_plugin() {
        let outcome = canned_outcome(Some(0), "", "");
        let report = render_report(&outcome, &TestOutcome::from_query(&outcome));
        assert!(!report.contains("Output"));
        assert!(report.contains("Test failed!"));
        assert!(report.contains("Plugin produced no response!"));
    }

    #[test]
    fn report_omits_the_trace_section_when_stderr_is_empty() {
        let outcome = canned_outcome(Some(3), r#"{"result": []}"#, "");
        let report = render_report(&outcome, &TestOutcome::from_query(&outcome));
        assert!(report.contains("Plugin returned a non-zero exit code!"));
        assert!(!report.contains("Trace"));
    }

    #[test]
    fn report_surfaces_stderr_under_the_trace_banner_on_failure() {
        let outcome = canned_outcome(Some(1), "", "Traceback (most recent call last):");
        let report = render_report(&outcome, &TestOutcome::from_query(&outcome));
        assert!(report.contains("######### Trace #########"));
        assert!(report.contains("Traceback (most recent call last):"));
    }

    #[test]
    fn passing_report_is_just_the_output_and_verdict() {
        let outcome = canned_outcome(Some(0), r#"{"result": []}"#, "ignored warning");
        let report = render_report(&outcome, &TestOutcome::from_query(&outcome));
        assert!(report.contains("######### Output #########"));
        assert!(report.ends_with("Test passed!\n"));
        assert!(!report.contains("Trace"));
    }

    #[tokio::test]
    async fn missing_manifest_file_surfaces_as_manifest_error() {
        let config = HarnessConfig {
            manifest: "/nonexistent/plugins.json".to_string(),
            ..HarnessConfig::default()
        };
        let client = reqwest::Client::new();
        let err = run(&config, &client).await.unwrap_err();
        assert!(matches!(err, HarnessError::Manifest(_)));
    }
}
