//! Test case execution
//!
//! Runs one case through both phases of the subject: the build phase
//! persists state into the shared-state directory, the query phase reads it
//! back and answers requests. The query output is saved and compared with
//! the recorded expectation.

use std::fmt;
use std::fs::File;
use std::io::{Seek, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::common::config::Config;
use crate::common::{Error, Result};

use super::case::TestCase;
use super::diff::diff_ignoring_whitespace;
use super::invoker::{invoke, InvocationFailure, InvocationSpec};

/// Stage at which a case failed
#[derive(Debug, Clone)]
pub enum Failure {
    /// The build invocation exited nonzero, timed out or did not start
    Build(InvocationFailure),
    /// The query invocation exited nonzero, timed out or did not start
    Query(InvocationFailure),
    /// Both phases ran but the output differs from the expectation
    Mismatch {
        expected: PathBuf,
        actual: PathBuf,
        diff: String,
    },
}

impl Failure {
    pub fn stage(&self) -> &'static str {
        match self {
            Failure::Build(_) => "build invocation",
            Failure::Query(_) => "query invocation",
            Failure::Mismatch { .. } => "output comparison",
        }
    }

    /// Diff text for mismatches, empty otherwise
    pub fn diff(&self) -> &str {
        match self {
            Failure::Mismatch { diff, .. } => diff,
            _ => "",
        }
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Failure::Build(failure) | Failure::Query(failure) => {
                write!(f, "{} failed: {}", self.stage(), failure)
            }
            Failure::Mismatch {
                expected,
                actual,
                diff,
            } => write!(
                f,
                "actual output is different from expected. \"{}\" is not equal with \"{}\":\n{}",
                actual.display(),
                expected.display(),
                diff
            ),
        }
    }
}

/// Outcome of one test case
#[derive(Debug, Clone)]
pub struct Verdict {
    pub case: String,
    /// `None` when the case passed
    pub failure: Option<Failure>,
}

impl Verdict {
    pub fn passed(&self) -> bool {
        self.failure.is_none()
    }

    /// Diff text when the comparison failed, empty otherwise
    pub fn diff(&self) -> &str {
        self.failure.as_ref().map_or("", Failure::diff)
    }
}

/// Settings shared by every case of a run
#[derive(Debug, Clone)]
pub struct CaseRunner {
    binary: PathBuf,
    shared_state_dir: PathBuf,
    placeholder: Option<String>,
    build_mode: String,
    query_mode: String,
    build_timeout: Duration,
    query_timeout: Duration,
}

/// Subject phase
#[derive(Debug, Clone, Copy)]
enum Phase {
    Build,
    Query,
}

impl CaseRunner {
    pub fn new(binary: impl Into<PathBuf>, config: &Config) -> Self {
        Self {
            binary: binary.into(),
            shared_state_dir: config.shared_state_dir.clone(),
            placeholder: Some(config.state_dir_placeholder.clone()).filter(|p| !p.is_empty()),
            build_mode: config.modes.build.clone(),
            query_mode: config.modes.query.clone(),
            build_timeout: config.timeouts.build(),
            query_timeout: config.timeouts.query(),
        }
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    /// Run both phases for `case` and compare the output
    ///
    /// Errors are reserved for the runner's own I/O; anything the subject
    /// does wrong ends up in the returned [`Verdict`].
    pub async fn run(&self, case: &TestCase) -> Result<Verdict> {
        let verdict = |failure: Option<Failure>| Verdict {
            case: case.name.clone(),
            failure,
        };

        if let Err(failure) = self.invoke_phase(Phase::Build, &case.build_input).await? {
            return Ok(verdict(Some(Failure::Build(failure))));
        }

        let output = match self.invoke_phase(Phase::Query, &case.query_input).await? {
            Ok(output) => output,
            Err(failure) => return Ok(verdict(Some(Failure::Query(failure)))),
        };

        std::fs::write(&case.actual, &output).map_err(|e| Error::file_write(&case.actual, e))?;

        let expected = std::fs::read(&case.expected)
            .map_err(|e| Error::file_read(&case.expected, e))?;
        let expected = String::from_utf8_lossy(&expected);

        let diff = diff_ignoring_whitespace(&expected, &output);
        if diff.is_empty() {
            return Ok(verdict(None));
        }

        Ok(verdict(Some(Failure::Mismatch {
            expected: case.expected.clone(),
            actual: case.actual.clone(),
            diff,
        })))
    }

    /// Invoke one phase with `input` as stdin
    ///
    /// The outer result carries runner I/O errors, the inner one the
    /// subject's behaviour.
    async fn invoke_phase(
        &self,
        phase: Phase,
        input: &Path,
    ) -> Result<std::result::Result<String, InvocationFailure>> {
        let (mode, timeout) = match phase {
            Phase::Build => (self.build_mode.as_str(), self.build_timeout),
            Phase::Query => (self.query_mode.as_str(), self.query_timeout),
        };

        let stdin = self.open_input(input)?;
        let result = invoke(InvocationSpec {
            binary: &self.binary,
            mode,
            input: stdin,
            input_name: input.to_path_buf(),
            timeout,
        })
        .await;

        Ok(result)
    }

    /// Open `input` for the child's stdin
    ///
    /// When the file mentions the shared-state placeholder, a private copy
    /// with the placeholder replaced is handed over instead. The token sits
    /// inside JSON strings, so the path is inserted JSON-escaped; every other
    /// byte of the file is copied unchanged.
    fn open_input(&self, input: &Path) -> Result<File> {
        let Some(placeholder) = &self.placeholder else {
            return File::open(input).map_err(|e| Error::file_read(input, e));
        };

        let content = std::fs::read(input).map_err(|e| Error::file_read(input, e))?;
        let state_dir = json_escaped(&self.shared_state_dir.to_string_lossy());
        let Some(rendered) = replace_all(&content, placeholder.as_bytes(), state_dir.as_bytes())
        else {
            return File::open(input).map_err(|e| Error::file_read(input, e));
        };
        tracing::debug!(input = %input.display(), state_dir = %state_dir, "substituted shared-state placeholder");

        // Unlinked on creation; the open handle keeps the data alive
        let mut file = tempfile::tempfile().map_err(|e| Error::file_write("<tempfile>", e))?;
        file.write_all(&rendered)
            .and_then(|()| file.rewind())
            .map_err(|e| Error::file_write("<tempfile>", e))?;
        Ok(file)
    }
}

/// `text` as it appears between the quotes of a JSON string
fn json_escaped(text: &str) -> String {
    let quoted = serde_json::Value::from(text).to_string();
    quoted[1..quoted.len() - 1].to_string()
}

/// Replace every occurrence of `needle`; `None` when there is none
fn replace_all(haystack: &[u8], needle: &[u8], replacement: &[u8]) -> Option<Vec<u8>> {
    if needle.is_empty() {
        return None;
    }

    let mut out = Vec::with_capacity(haystack.len());
    let mut rest = haystack;
    let mut found = false;
    while let Some(at) = rest.windows(needle.len()).position(|w| w == needle) {
        out.extend_from_slice(&rest[..at]);
        out.extend_from_slice(replacement);
        rest = &rest[at + needle.len()..];
        found = true;
    }

    found.then(|| {
        out.extend_from_slice(rest);
        out
    })
}
