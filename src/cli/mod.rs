//! Test suite orchestration
//!
//! prepare directories -> discover cases -> run each case -> report ->
//! remove the shared-state directory. Once the shared-state directory has
//! been prepared it is removed on every exit path.

use std::io::Write;

use crate::commands::Cli;
use crate::common::config::Config;
use crate::common::{Error, Result};
use crate::testing::{self, CaseRunner, Discovery, Reporter, RunStatus};

/// Run the whole suite and return the final status
pub async fn run(cli: Cli) -> RunStatus {
    let mut reporter = Reporter::stdout();
    reporter.starting();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            reporter.fatal(&e);
            return e.status();
        }
    };

    run_suite(&cli, &config, &mut reporter).await
}

/// Load the configuration file and apply command-line overrides
pub fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = Config::load(cli.config.as_deref())?;
    cli.apply(&mut config);
    config.validate()?;
    Ok(config)
}

/// Run every case described by `config` against `cli.binary`
pub async fn run_suite<W: Write>(cli: &Cli, config: &Config, reporter: &mut Reporter<W>) -> RunStatus {
    if let Err(e) = testing::prepare(&config.shared_state_dir) {
        reporter.fatal(&e);
        return e.status();
    }

    let status = match testing::prepare(&config.actual_output) {
        Ok(()) => run_cases(cli, config, reporter).await,
        Err(e) => {
            reporter.fatal(&e);
            e.status()
        }
    };

    // Cleanup problems are reported but never replace the run's own status
    if let Err(e) = testing::teardown(&config.shared_state_dir) {
        reporter.fatal(&e);
        if status == RunStatus::Passed {
            return e.status();
        }
    }

    status
}

async fn run_cases<W: Write>(cli: &Cli, config: &Config, reporter: &mut Reporter<W>) -> RunStatus {
    let Discovery { cases, skipped } = match testing::discover(config) {
        Ok(discovery) => discovery,
        Err(e) => {
            if let Error::NoTestCases { skipped, .. } = &e {
                skipped.iter().for_each(|s| reporter.skipped(s));
            }
            reporter.fatal(&e);
            return e.status();
        }
    };

    for s in &skipped {
        reporter.skipped(s);
    }

    let runner = CaseRunner::new(&cli.binary, config);
    tracing::info!(
        binary = %runner.binary().display(),
        cases = cases.len(),
        fail_fast = config.fail_fast,
        "running test cases"
    );

    for case in &cases {
        let verdict = match runner.run(case).await {
            Ok(verdict) => verdict,
            Err(e) => {
                reporter.fatal(&e);
                return e.status();
            }
        };

        reporter.record(&verdict);

        if config.fail_fast {
            if let Some(failure) = &verdict.failure {
                tracing::debug!(case = %case.name, stage = failure.stage(), "aborting run");
                return RunStatus::from(failure);
            }
        }
    }

    reporter.finish()
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use clap::Parser;
    use std::fs;
    use std::path::Path;

    fn cli(binary: &str) -> Cli {
        Cli::try_parse_from(["catalog-itest", binary]).unwrap()
    }

    fn config(root: &Path) -> Config {
        let mut config = Config::default();
        config.test_data = root.join("test_data");
        config.actual_output = root.join("actual_output");
        config.shared_state_dir = root.join("state");
        // `cat -` echoes each phase's stdin
        config.modes.build = "-".to_string();
        config.modes.query = "-".to_string();
        config
    }

    fn write_case(root: &Path, name: &str, query: &str, expected: &str) {
        let dir = root.join("test_data").join(name);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("base_requests.json"), "{\"base\":[]}").unwrap();
        fs::write(dir.join("stat_requests.json"), query).unwrap();
        fs::write(dir.join("expected.json"), expected).unwrap();
    }

    fn quiet_reporter() -> Reporter<Vec<u8>> {
        colored::control::set_override(false);
        Reporter::new(Vec::new())
    }

    #[tokio::test]
    async fn test_suite_passes_and_removes_state_dir() {
        let root = tempfile::tempdir().unwrap();
        write_case(root.path(), "one", "{\"responses\":[]}", "{\"responses\":[]}");
        write_case(root.path(), "two", "[1]", "[ 1 ]");
        let config = config(root.path());

        let mut reporter = quiet_reporter();
        let status = run_suite(&cli("cat"), &config, &mut reporter).await;

        assert_eq!(status, RunStatus::Passed);
        assert_eq!(reporter.passed(), 2);
        assert!(!config.shared_state_dir.exists());
        assert!(config.actual_output.is_dir());
    }

    #[tokio::test]
    async fn test_fail_fast_stops_at_first_failure() {
        let root = tempfile::tempdir().unwrap();
        write_case(root.path(), "a", "[2]", "[1]");
        write_case(root.path(), "b", "[]", "[]");
        let config = config(root.path());

        let mut reporter = quiet_reporter();
        let status = run_suite(&cli("cat"), &config, &mut reporter).await;

        assert_eq!(status, RunStatus::OutputMismatch);
        assert_eq!(reporter.failed(), 1);
        assert_eq!(reporter.passed(), 0);
        assert!(!config.shared_state_dir.exists());
    }

    #[tokio::test]
    async fn test_keep_going_runs_every_case() {
        let root = tempfile::tempdir().unwrap();
        write_case(root.path(), "a", "[2]", "[1]");
        write_case(root.path(), "b", "[]", "[]");
        let mut config = config(root.path());
        config.fail_fast = false;

        let mut reporter = quiet_reporter();
        let status = run_suite(&cli("cat"), &config, &mut reporter).await;

        assert_eq!(status, RunStatus::OutputMismatch);
        assert_eq!(reporter.failed(), 1);
        assert_eq!(reporter.passed(), 1);
        let out = String::from_utf8(reporter.into_inner()).unwrap();
        assert!(out.contains("1 of 2 cases failed"));
    }

    #[tokio::test]
    async fn test_no_cases_still_cleans_up() {
        let root = tempfile::tempdir().unwrap();
        let config = config(root.path());

        let mut reporter = quiet_reporter();
        let status = run_suite(&cli("/nonexistent/subject"), &config, &mut reporter).await;

        assert_eq!(status, RunStatus::NoTestCases);
        assert!(!config.shared_state_dir.exists());
        assert_eq!(fs::read_dir(&config.actual_output).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_missing_binary_is_invocation_failure() {
        let root = tempfile::tempdir().unwrap();
        write_case(root.path(), "a", "[]", "[]");
        let config = config(root.path());

        let mut reporter = quiet_reporter();
        let status = run_suite(&cli("/nonexistent/subject"), &config, &mut reporter).await;

        assert_eq!(status, RunStatus::InvocationFailed);
        assert!(!config.shared_state_dir.exists());
    }
}
