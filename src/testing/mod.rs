//! Two-phase integration test runner
//!
//! Drives a subject binary through a build phase and a query phase for
//! each test case, then compares the query output with a recorded
//! expectation. The subject is a black box: the runner moves bytes and
//! never looks inside the JSON it passes around.

mod case;
mod diff;
mod invoker;
mod report;
mod runner;
mod workspace;

pub use case::{discover, Discovery, SkippedCase, TestCase};
pub use diff::diff_ignoring_whitespace;
pub use invoker::{invoke, FailureKind, InvocationFailure, InvocationResult, InvocationSpec};
pub use report::{Reporter, RunStatus, MESSAGE_PREFIX};
pub use runner::{CaseRunner, Failure, Verdict};
pub use workspace::{prepare, teardown};
