//! Test case discovery
//!
//! Two layouts are understood, selected by configuration:
//!
//! - directory-per-case: `<root>/<case>/base_requests.json` etc., with the
//!   captured output written next to them as `actual.json`
//! - flat: `<root>/base_requests_<case>.json` etc., with the captured output
//!   written to `<actual_output>/actual_<case>.json`
//!
//! Case identifiers are returned in lexicographic order so runs are
//! reproducible regardless of directory listing order.

use std::path::{Path, PathBuf};

use crate::common::config::{CaseFiles, Config, FlatNaming, Layout};
use crate::common::{Error, Result};

/// One discovered test case
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestCase {
    pub name: String,
    /// Stdin for the build phase
    pub build_input: PathBuf,
    /// Stdin for the query phase
    pub query_input: PathBuf,
    /// Recorded expected query output
    pub expected: PathBuf,
    /// Where the captured query output is written
    pub actual: PathBuf,
}

/// A case that was found but cannot run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedCase {
    pub name: String,
    pub missing: Vec<PathBuf>,
}

/// Result of scanning the test-data root
#[derive(Debug, Default)]
pub struct Discovery {
    pub cases: Vec<TestCase>,
    pub skipped: Vec<SkippedCase>,
}

impl TestCase {
    /// Required paths that are not present on disk
    fn missing_paths(&self) -> Vec<PathBuf> {
        let mut missing: Vec<PathBuf> = [&self.build_input, &self.query_input, &self.expected]
            .into_iter()
            .filter(|path| !path.is_file())
            .cloned()
            .collect();

        // The actual output is created during the run; its directory must exist
        if let Some(parent) = self.actual.parent() {
            if !parent.as_os_str().is_empty() && !parent.is_dir() {
                missing.push(parent.to_path_buf());
            }
        }

        missing
    }
}

/// Enumerate the test cases under `config.test_data`
///
/// Fails with [`Error::NoTestCases`] when nothing runnable was found.
pub fn discover(config: &Config) -> Result<Discovery> {
    let root = &config.test_data;
    let candidates = match config.layout {
        Layout::DirectoryPerCase => per_case_candidates(root, &config.case_files)?,
        Layout::Flat => flat_candidates(root, &config.actual_output, &config.flat)?,
    };

    let mut discovery = Discovery::default();
    for case in candidates {
        let missing = case.missing_paths();
        if missing.is_empty() {
            discovery.cases.push(case);
        } else {
            tracing::warn!(case = %case.name, ?missing, "skipping incomplete test case");
            discovery.skipped.push(SkippedCase {
                name: case.name,
                missing,
            });
        }
    }

    if discovery.cases.is_empty() {
        return Err(Error::NoTestCases {
            root: absolute(root),
            skipped: discovery.skipped,
        });
    }

    tracing::debug!(
        cases = discovery.cases.len(),
        skipped = discovery.skipped.len(),
        "discovered test cases"
    );
    Ok(discovery)
}

/// Every subdirectory of `root` is a case
fn per_case_candidates(root: &Path, files: &CaseFiles) -> Result<Vec<TestCase>> {
    let mut cases = Vec::new();
    for entry in read_root(root)? {
        let entry = entry.map_err(|e| Error::file_read(root, e))?;
        let dir = entry.path();
        if !dir.is_dir() {
            continue;
        }

        cases.push(TestCase {
            name: entry.file_name().to_string_lossy().into_owned(),
            build_input: dir.join(&files.build),
            query_input: dir.join(&files.query),
            expected: dir.join(&files.expected),
            actual: dir.join(&files.actual),
        });
    }

    cases.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(cases)
}

/// Every `<build_prefix><name><suffix>` file in `root` starts a case
fn flat_candidates(root: &Path, actual_dir: &Path, naming: &FlatNaming) -> Result<Vec<TestCase>> {
    let file_name = |prefix: &str, name: &str| format!("{}{}{}", prefix, name, naming.suffix);

    let mut cases = Vec::new();
    for entry in read_root(root)? {
        let entry = entry.map_err(|e| Error::file_read(root, e))?;
        let file = entry.file_name();
        let Some(file) = file.to_str() else {
            continue;
        };
        let Some(name) = file
            .strip_prefix(naming.build_prefix.as_str())
            .and_then(|rest| rest.strip_suffix(naming.suffix.as_str()))
        else {
            continue;
        };
        if name.is_empty() || !entry.path().is_file() {
            continue;
        }

        cases.push(TestCase {
            name: name.to_string(),
            build_input: entry.path(),
            query_input: root.join(file_name(&naming.query_prefix, name)),
            expected: root.join(file_name(&naming.expected_prefix, name)),
            actual: actual_dir.join(file_name(&naming.actual_prefix, name)),
        });
    }

    cases.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(cases)
}

/// List the root; a missing root simply has no cases
fn read_root(root: &Path) -> Result<Box<dyn Iterator<Item = std::io::Result<std::fs::DirEntry>>>> {
    match std::fs::read_dir(root) {
        Ok(entries) => Ok(Box::new(entries)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Box::new(std::iter::empty())),
        Err(e) => Err(Error::file_read(root, e)),
    }
}

fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn per_case_config(root: &Path) -> Config {
        Config {
            test_data: root.to_path_buf(),
            ..Config::default()
        }
    }

    fn flat_config(root: &Path, actual: &Path) -> Config {
        Config {
            layout: Layout::Flat,
            test_data: root.to_path_buf(),
            actual_output: actual.to_path_buf(),
            ..Config::default()
        }
    }

    fn write_case_dir(root: &Path, name: &str) {
        let dir = root.join(name);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("base_requests.json"), "{}").unwrap();
        fs::write(dir.join("stat_requests.json"), "{}").unwrap();
        fs::write(dir.join("expected.json"), "{}").unwrap();
    }

    #[test]
    fn test_per_case_layout_sorted() {
        let root = tempfile::tempdir().unwrap();
        write_case_dir(root.path(), "zeta");
        write_case_dir(root.path(), "alpha");
        write_case_dir(root.path(), "mid");
        fs::write(root.path().join("README.md"), "not a case").unwrap();

        let found = discover(&per_case_config(root.path())).unwrap();
        let names: Vec<&str> = found.cases.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["alpha", "mid", "zeta"]);
        assert!(found.skipped.is_empty());

        let alpha = &found.cases[0];
        assert_eq!(alpha.build_input, root.path().join("alpha/base_requests.json"));
        assert_eq!(alpha.actual, root.path().join("alpha/actual.json"));
    }

    #[test]
    fn test_per_case_incomplete_dir_is_skipped() {
        let root = tempfile::tempdir().unwrap();
        write_case_dir(root.path(), "good");
        fs::create_dir_all(root.path().join("broken")).unwrap();
        fs::write(root.path().join("broken/base_requests.json"), "{}").unwrap();

        let found = discover(&per_case_config(root.path())).unwrap();
        assert_eq!(found.cases.len(), 1);
        assert_eq!(found.skipped.len(), 1);
        assert_eq!(found.skipped[0].name, "broken");
        assert_eq!(found.skipped[0].missing.len(), 2);
    }

    #[test]
    fn test_flat_layout() {
        let root = tempfile::tempdir().unwrap();
        let actual = tempfile::tempdir().unwrap();
        for name in ["2", "1"] {
            fs::write(root.path().join(format!("base_requests_{name}.json")), "{}").unwrap();
            fs::write(root.path().join(format!("stat_requests_{name}.json")), "{}").unwrap();
            fs::write(root.path().join(format!("expected_{name}.json")), "{}").unwrap();
        }
        fs::write(root.path().join("notes.txt"), "").unwrap();

        let found = discover(&flat_config(root.path(), actual.path())).unwrap();
        let names: Vec<&str> = found.cases.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["1", "2"]);
        assert_eq!(found.cases[0].query_input, root.path().join("stat_requests_1.json"));
        assert_eq!(found.cases[0].actual, actual.path().join("actual_1.json"));
    }

    #[test]
    fn test_flat_missing_expected_is_skipped() {
        let root = tempfile::tempdir().unwrap();
        let actual = tempfile::tempdir().unwrap();
        fs::write(root.path().join("base_requests_a.json"), "{}").unwrap();
        fs::write(root.path().join("stat_requests_a.json"), "{}").unwrap();

        let err = discover(&flat_config(root.path(), actual.path())).unwrap_err();
        match err {
            Error::NoTestCases { skipped, .. } => {
                assert_eq!(skipped.len(), 1);
                assert_eq!(skipped[0].missing, vec![root.path().join("expected_a.json")]);
            }
            other => panic!("Expected NoTestCases, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_root_has_no_cases() {
        let root = tempfile::tempdir().unwrap();
        let err = discover(&per_case_config(root.path())).unwrap_err();
        assert!(matches!(err, Error::NoTestCases { .. }));
    }

    #[test]
    fn test_missing_root_has_no_cases() {
        let root = tempfile::tempdir().unwrap();
        let err = discover(&per_case_config(&root.path().join("absent"))).unwrap_err();
        assert!(matches!(err, Error::NoTestCases { .. }));
    }
}
