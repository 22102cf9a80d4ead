//! Run reporting
//!
//! Every line starts with `integration test: ` followed by `OK` or `ERROR`
//! so logs stay greppable. Lines are printed as soon as a verdict is known.

use std::io::Write;

use colored::Colorize;

use crate::common::Error;

use super::case::SkippedCase;
use super::runner::{Failure, Verdict};

/// Prefix of every report line
pub const MESSAGE_PREFIX: &str = "integration test: ";

/// Final status of a run, doubling as the process exit code
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RunStatus {
    Passed = 0,
    InvalidArguments = 1,
    InvocationFailed = 2,
    OutputMismatch = 3,
    NoTestCases = 4,
    /// The runner's own filesystem work failed
    Environment = 5,
}

impl RunStatus {
    pub fn code(self) -> i32 {
        self as i32
    }
}

impl From<&Failure> for RunStatus {
    fn from(failure: &Failure) -> Self {
        match failure {
            Failure::Build(_) | Failure::Query(_) => RunStatus::InvocationFailed,
            Failure::Mismatch { .. } => RunStatus::OutputMismatch,
        }
    }
}

/// Streams report lines and tracks the run outcome
pub struct Reporter<W: Write> {
    out: W,
    passed: usize,
    failed: usize,
    /// Highest-priority failure seen so far
    worst: Option<RunStatus>,
}

impl Reporter<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write> Reporter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            passed: 0,
            failed: 0,
            worst: None,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    pub fn starting(&mut self) {
        self.line("starting integration test".to_string());
    }

    pub fn ok(&mut self, msg: &str) {
        self.line(format!("{}{} {}", MESSAGE_PREFIX, "OK".green(), msg));
    }

    pub fn error(&mut self, msg: &str) {
        self.line(format!("{}{} {}", MESSAGE_PREFIX, "ERROR".red(), msg));
    }

    /// Report a fatal error
    pub fn fatal(&mut self, err: &Error) {
        self.error(&err.to_string());
    }

    pub fn skipped(&mut self, skipped: &SkippedCase) {
        let missing: Vec<String> = skipped
            .missing
            .iter()
            .map(|p| format!("\"{}\"", p.display()))
            .collect();
        self.error(&format!(
            "test key name: \"{}\" skipped, missing {}",
            skipped.name,
            missing.join(", ")
        ));
    }

    /// Record and print one verdict
    pub fn record(&mut self, verdict: &Verdict) {
        match &verdict.failure {
            None => {
                self.passed += 1;
                self.ok(&format!("test key {}", verdict.case));
            }
            Some(failure) => {
                self.failed += 1;
                let status = RunStatus::from(failure);
                self.worst = Some(self.worst.map_or(status, |worst| worst.min(status)));
                self.error(&format!("test key name: \"{}\", {}", verdict.case, failure));
            }
        }
    }

    pub fn passed(&self) -> usize {
        self.passed
    }

    pub fn failed(&self) -> usize {
        self.failed
    }

    /// Print the aggregate line and compute the run status
    ///
    /// Invocation failures outrank mismatches, whichever case came first.
    pub fn finish(&mut self) -> RunStatus {
        match self.worst {
            None => {
                self.ok("all tests");
                RunStatus::Passed
            }
            Some(status) => {
                let total = self.passed + self.failed;
                self.error(&format!("{} of {} cases failed", self.failed, total));
                status
            }
        }
    }

    fn line(&mut self, text: String) {
        // A closed stdout must not abort the run
        let _ = writeln!(self.out, "{}", text);
        let _ = self.out.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FailureKind, InvocationFailure};
    use std::path::PathBuf;

    fn reporter() -> Reporter<Vec<u8>> {
        colored::control::set_override(false);
        Reporter::new(Vec::new())
    }

    fn text(reporter: Reporter<Vec<u8>>) -> String {
        String::from_utf8(reporter.into_inner()).unwrap()
    }

    fn invocation_failure() -> InvocationFailure {
        InvocationFailure {
            command: vec!["subject".into(), "make_base".into()],
            input: PathBuf::from("base_requests.json"),
            kind: FailureKind::Exited(Some(7)),
            output: "boom".into(),
        }
    }

    fn mismatch() -> Failure {
        Failure::Mismatch {
            expected: PathBuf::from("expected.json"),
            actual: PathBuf::from("actual.json"),
            diff: "1c1\n< 1\n---\n> 2\n".into(),
        }
    }

    #[test]
    fn test_all_passed() {
        let mut r = reporter();
        r.record(&Verdict {
            case: "sample".into(),
            failure: None,
        });
        assert_eq!(r.finish(), RunStatus::Passed);

        let out = text(r);
        assert!(out.contains("integration test: OK test key sample"));
        assert!(out.ends_with("integration test: OK all tests\n"));
    }

    #[test]
    fn test_mismatch_line_includes_diff() {
        let mut r = reporter();
        r.record(&Verdict {
            case: "b".into(),
            failure: Some(mismatch()),
        });
        assert_eq!(r.finish(), RunStatus::OutputMismatch);

        let out = text(r);
        assert!(out.contains("integration test: ERROR test key name: \"b\""));
        assert!(out.contains("< 1\n---\n> 2"));
        assert!(out.contains("1 of 1 cases failed"));
    }

    #[test]
    fn test_invocation_failure_outranks_mismatch() {
        let mut r = reporter();
        r.record(&Verdict {
            case: "a".into(),
            failure: Some(mismatch()),
        });
        r.record(&Verdict {
            case: "b".into(),
            failure: Some(Failure::Build(invocation_failure())),
        });
        assert_eq!(r.failed(), 2);
        assert_eq!(r.finish(), RunStatus::InvocationFailed);

        let out = text(r);
        assert!(out.contains("build invocation failed"));
        assert!(out.contains("error code: 7"));
    }

    #[test]
    fn test_skipped_case_is_reported() {
        let mut r = reporter();
        r.skipped(&SkippedCase {
            name: "broken".into(),
            missing: vec![PathBuf::from("broken/expected.json")],
        });
        let out = text(r);
        assert!(out.contains("ERROR test key name: \"broken\" skipped, missing \"broken/expected.json\""));
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(RunStatus::Passed.code(), 0);
        assert_eq!(RunStatus::InvalidArguments.code(), 1);
        assert_eq!(RunStatus::InvocationFailed.code(), 2);
        assert_eq!(RunStatus::OutputMismatch.code(), 3);
        assert_eq!(RunStatus::NoTestCases.code(), 4);
    }
}
