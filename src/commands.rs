//! CLI argument definitions

use clap::Parser;
use std::path::PathBuf;

use crate::common::config::{Config, Layout};

/// Runs a build/query subject binary against recorded test data
#[derive(Parser, Debug)]
#[command(name = "catalog-itest", version, long_about = None)]
pub struct Cli {
    /// Path to the subject binary
    pub binary: PathBuf,

    /// Configuration file (default: ./itest.toml if present)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Test data layout
    #[arg(long, value_enum)]
    pub layout: Option<Layout>,

    /// Root directory of the test cases
    #[arg(long)]
    pub test_data: Option<PathBuf>,

    /// Directory receiving captured output
    #[arg(long)]
    pub actual_output: Option<PathBuf>,

    /// Shared-state directory handed from the build to the query phase
    #[arg(long)]
    pub state_dir: Option<PathBuf>,

    /// Run every case instead of stopping at the first failure
    #[arg(long)]
    pub keep_going: bool,

    /// Verbose logging on stderr
    #[arg(long, short)]
    pub verbose: bool,
}

impl Cli {
    /// Apply command-line overrides on top of the loaded configuration
    pub fn apply(&self, config: &mut Config) {
        if let Some(layout) = self.layout {
            config.layout = layout;
        }
        if let Some(test_data) = &self.test_data {
            config.test_data = test_data.clone();
        }
        if let Some(actual_output) = &self.actual_output {
            config.actual_output = actual_output.clone();
        }
        if let Some(state_dir) = &self.state_dir {
            config.shared_state_dir = state_dir.clone();
        }
        if self.keep_going {
            config.fail_fast = false;
        }
    }
}
