//! No blocking I/O inside async functions
//!
//! Blocking calls stall a runtime worker and every flow scheduled on it.
//! Synchronous helpers (config loading at startup) may block; async bodies
//! must use the tokio equivalents.

use architectural_enforcement::{production_sources, report, router_core_src, scan};

const BLOCKING_PATTERNS: &[&str] = &[
    "std::fs::",
    "std::net::",
    "std::process::Command",
    "std::thread::sleep",
    "std::io::stdin",
    "reqwest::blocking",
    ".block_on(",
];

#[test]
fn async_code_does_not_block() {
    let files = production_sources(&router_core_src());
    assert!(!files.is_empty(), "no sources found under router/core/src");

    let violations = scan(&files, BLOCKING_PATTERNS, true);
    assert!(
        violations.is_empty(),
        "blocking calls inside async code:\n{}",
        report(&violations)
    );
}

#[test]
fn test_modules_are_excluded() {
    let files = production_sources(&router_core_src());
    assert!(files
        .iter()
        .all(|f| !f.path.ends_with("test_utils.rs")));
    assert!(files
        .iter()
        .flat_map(|f| &f.lines)
        .all(|line| !line.contains("#[tokio::test")));
}
