//! Mock subject binary for integration testing
//!
//! Implements the two-phase contract without any real catalog logic:
//!
//! - `make_base` stores its stdin document at `serialization_settings.file`
//! - `process_requests` checks that file exists and prints
//!   `{"responses": <stats>}` built from its own stdin document
//!
//! Either document may carry a `mock` object to misbehave on purpose:
//! `{"mock": {"exit_code": 3, "sleep_ms": 5000, "stderr": "text"}}`.

use serde_json::{json, Value};
use std::io::Read;
use std::path::PathBuf;
use std::time::Duration;

fn main() {
    let mode = std::env::args().nth(1).unwrap_or_default();

    let mut input = String::new();
    if let Err(e) = std::io::stdin().read_to_string(&mut input) {
        fail(&format!("failed to read stdin: {}", e));
    }

    let document: Value = match serde_json::from_str(&input) {
        Ok(value) => value,
        Err(e) => fail(&format!("invalid JSON on stdin: {}", e)),
    };

    apply_mock_controls(&document);

    match mode.as_str() {
        "make_base" => make_base(&document, &input),
        "process_requests" => process_requests(&document),
        other => fail(&format!("unknown mode '{}'", other)),
    }
}

fn fail(message: &str) -> ! {
    eprintln!("mock_subject: {}", message);
    std::process::exit(1);
}

fn state_file(document: &Value) -> Option<PathBuf> {
    document
        .pointer("/serialization_settings/file")
        .and_then(Value::as_str)
        .map(PathBuf::from)
}

fn apply_mock_controls(document: &Value) {
    let Some(mock) = document.get("mock") else {
        return;
    };

    if let Some(text) = mock.get("stderr").and_then(Value::as_str) {
        eprintln!("{}", text);
    }
    if let Some(ms) = mock.get("sleep_ms").and_then(Value::as_u64) {
        std::thread::sleep(Duration::from_millis(ms));
    }
    if let Some(code) = mock.get("exit_code").and_then(Value::as_i64) {
        std::process::exit(code as i32);
    }
}

fn make_base(document: &Value, raw: &str) {
    let Some(path) = state_file(document) else {
        return;
    };
    if let Err(e) = std::fs::write(&path, raw) {
        fail(&format!("failed to write state '{}': {}", path.display(), e));
    }
}

fn process_requests(document: &Value) {
    if let Some(path) = state_file(document) {
        if !path.is_file() {
            fail(&format!("no base found at '{}'", path.display()));
        }
    }

    let stats = document.get("stats").cloned().unwrap_or_else(|| json!([]));
    println!("{}", json!({ "responses": stats }));
}
