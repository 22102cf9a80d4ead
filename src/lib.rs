//! Integration test runner for two-phase batch programs
//!
//! The subject program is run once to build a base (`make_base`) and once
//! to answer requests against it (`process_requests`); its answers are
//! compared with recorded expectations, ignoring whitespace.

pub mod cli;
pub mod commands;
pub mod common;
pub mod testing;

// Re-export commonly used types for tests
pub use common::{Error, Result};
pub use testing::{RunStatus, TestCase, Verdict};
