//! Configuration file handling

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::paths::discover_config;
use super::{Error, Result};

/// Main configuration structure
#[derive(Debug, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// How test cases are laid out under `test_data`
    #[serde(default)]
    pub layout: Layout,

    /// Root directory holding the test cases
    #[serde(default = "default_test_data")]
    pub test_data: PathBuf,

    /// Directory receiving captured query output (recreated every run)
    #[serde(default = "default_actual_output")]
    pub actual_output: PathBuf,

    /// Directory the subject persists state into between phases
    #[serde(default = "default_shared_state_dir")]
    pub shared_state_dir: PathBuf,

    /// Token in input files replaced by `shared_state_dir`; empty disables
    #[serde(default = "default_placeholder")]
    pub state_dir_placeholder: String,

    /// Abort the run on the first failing case
    #[serde(default = "default_fail_fast")]
    pub fail_fast: bool,

    /// Timeout settings in seconds
    #[serde(default)]
    pub timeouts: Timeouts,

    /// Mode tokens passed to the subject
    #[serde(default)]
    pub modes: Modes,

    /// File naming for the flat layout
    #[serde(default)]
    pub flat: FlatNaming,

    /// File naming for the directory-per-case layout
    #[serde(default)]
    pub case_files: CaseFiles,
}

/// Test data layout convention
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Layout {
    /// One subdirectory per case holding fixed-name files
    #[default]
    DirectoryPerCase,
    /// All cases in one directory, named `<prefix><case><suffix>`
    Flat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            layout: Layout::default(),
            test_data: default_test_data(),
            actual_output: default_actual_output(),
            shared_state_dir: default_shared_state_dir(),
            state_dir_placeholder: default_placeholder(),
            fail_fast: default_fail_fast(),
            timeouts: Timeouts::default(),
            modes: Modes::default(),
            flat: FlatNaming::default(),
            case_files: CaseFiles::default(),
        }
    }
}

fn default_test_data() -> PathBuf {
    PathBuf::from("test_data")
}
fn default_actual_output() -> PathBuf {
    PathBuf::from("actual_output")
}
// Fixtures recorded for the catalog reference this location verbatim
fn default_shared_state_dir() -> PathBuf {
    PathBuf::from("/tmp/transportcatalogdfs31235gsad324sct422/")
}
fn default_placeholder() -> String {
    "{{shared_state_dir}}".to_string()
}
fn default_fail_fast() -> bool {
    true
}

/// Timeout settings in seconds
#[derive(Debug, Deserialize, Clone)]
pub struct Timeouts {
    /// Wall-clock limit for the build phase
    #[serde(default = "default_build_secs")]
    pub build_secs: f64,

    /// Wall-clock limit for the query phase
    #[serde(default = "default_query_secs")]
    pub query_secs: f64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            build_secs: default_build_secs(),
            query_secs: default_query_secs(),
        }
    }
}

fn default_build_secs() -> f64 {
    3.0
}
fn default_query_secs() -> f64 {
    1.25
}

impl Timeouts {
    /// Build-phase limit; `validate` rejects values that saturate here
    pub fn build(&self) -> Duration {
        seconds(self.build_secs).unwrap_or(Duration::MAX)
    }

    /// Query-phase limit; `validate` rejects values that saturate here
    pub fn query(&self) -> Duration {
        seconds(self.query_secs).unwrap_or(Duration::MAX)
    }
}

/// A positive, representable number of seconds
fn seconds(secs: f64) -> Option<Duration> {
    Duration::try_from_secs_f64(secs)
        .ok()
        .filter(|d| !d.is_zero())
}

/// Mode tokens, the single positional argument given to the subject
#[derive(Debug, Deserialize, Clone)]
pub struct Modes {
    #[serde(default = "default_build_mode")]
    pub build: String,

    #[serde(default = "default_query_mode")]
    pub query: String,
}

impl Default for Modes {
    fn default() -> Self {
        Self {
            build: default_build_mode(),
            query: default_query_mode(),
        }
    }
}

fn default_build_mode() -> String {
    "make_base".to_string()
}
fn default_query_mode() -> String {
    "process_requests".to_string()
}

/// File naming for the flat layout
#[derive(Debug, Deserialize, Clone)]
pub struct FlatNaming {
    #[serde(default = "default_flat_build")]
    pub build_prefix: String,
    #[serde(default = "default_flat_query")]
    pub query_prefix: String,
    #[serde(default = "default_flat_expected")]
    pub expected_prefix: String,
    #[serde(default = "default_flat_actual")]
    pub actual_prefix: String,
    #[serde(default = "default_flat_suffix")]
    pub suffix: String,
}

impl Default for FlatNaming {
    fn default() -> Self {
        Self {
            build_prefix: default_flat_build(),
            query_prefix: default_flat_query(),
            expected_prefix: default_flat_expected(),
            actual_prefix: default_flat_actual(),
            suffix: default_flat_suffix(),
        }
    }
}

fn default_flat_build() -> String {
    "base_requests_".to_string()
}
fn default_flat_query() -> String {
    "stat_requests_".to_string()
}
fn default_flat_expected() -> String {
    "expected_".to_string()
}
fn default_flat_actual() -> String {
    "actual_".to_string()
}
fn default_flat_suffix() -> String {
    ".json".to_string()
}

/// Fixed file names inside each case directory
#[derive(Debug, Deserialize, Clone)]
pub struct CaseFiles {
    #[serde(default = "default_case_build")]
    pub build: String,
    #[serde(default = "default_case_query")]
    pub query: String,
    #[serde(default = "default_case_expected")]
    pub expected: String,
    #[serde(default = "default_case_actual")]
    pub actual: String,
}

impl Default for CaseFiles {
    fn default() -> Self {
        Self {
            build: default_case_build(),
            query: default_case_query(),
            expected: default_case_expected(),
            actual: default_case_actual(),
        }
    }
}

fn default_case_build() -> String {
    "base_requests.json".to_string()
}
fn default_case_query() -> String {
    "stat_requests.json".to_string()
}
fn default_case_expected() -> String {
    "expected.json".to_string()
}
fn default_case_actual() -> String {
    "actual.json".to_string()
}

impl Config {
    /// Load configuration
    ///
    /// An explicit path must exist. Otherwise `./itest.toml` or the per-user
    /// file is used when present, falling back to defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) => Some(path.to_path_buf()),
            None => discover_config(Path::new(".")),
        };

        let config = match path {
            Some(path) => {
                let content = std::fs::read_to_string(&path).map_err(|e| {
                    Error::Config(format!(
                        "Failed to read config file '{}': {}",
                        path.display(),
                        e
                    ))
                })?;
                tracing::debug!(path = %path.display(), "loaded configuration");
                Self::parse(&content, &path)?
            }
            None => Self::default(),
        };

        config.validate()?;
        Ok(config)
    }

    /// Parse configuration text; `origin` is used only in error messages
    pub fn parse(content: &str, origin: &Path) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::ConfigParse {
            path: origin.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Reject settings the runner cannot act on
    pub fn validate(&self) -> Result<()> {
        for (name, secs) in [
            ("timeouts.build_secs", self.timeouts.build_secs),
            ("timeouts.query_secs", self.timeouts.query_secs),
        ] {
            if seconds(secs).is_none() {
                return Err(Error::Config(format!(
                    "{} must be a positive number of seconds, got {}",
                    name, secs
                )));
            }
        }

        if self.modes.build.is_empty() || self.modes.query.is_empty() {
            return Err(Error::Config("mode tokens must not be empty".to_string()));
        }

        if self.layout == Layout::Flat && self.flat.build_prefix.is_empty() {
            return Err(Error::Config(
                "flat.build_prefix must not be empty".to_string(),
            ));
        }

        if self.shared_state_dir.as_os_str().is_empty() {
            return Err(Error::Config(
                "shared_state_dir must not be empty".to_string(),
            ));
        }

        self.validate_directories()
    }

    /// Both working directories are wiped at startup, so neither may hold
    /// the test data or the other one
    fn validate_directories(&self) -> Result<()> {
        let absolute = |name: &str, path: &Path| {
            std::path::absolute(path).map_err(|e| {
                Error::Config(format!("{} '{}' is not usable: {}", name, path.display(), e))
            })
        };
        let test_data = absolute("test_data", &self.test_data)?;
        let actual_output = absolute("actual_output", &self.actual_output)?;
        let state_dir = absolute("shared_state_dir", &self.shared_state_dir)?;

        for (name, dir) in [
            ("actual_output", &actual_output),
            ("shared_state_dir", &state_dir),
        ] {
            if test_data.starts_with(dir) {
                return Err(Error::Config(format!(
                    "{} '{}' would delete the test data in '{}'",
                    name,
                    dir.display(),
                    test_data.display()
                )));
            }
        }

        if actual_output.starts_with(&state_dir) || state_dir.starts_with(&actual_output) {
            return Err(Error::Config(format!(
                "actual_output '{}' and shared_state_dir '{}' must not overlap",
                actual_output.display(),
                state_dir.display()
            )));
        }

        Ok(())
    }
}
