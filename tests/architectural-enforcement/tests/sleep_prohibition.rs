//! No sleep() in production code
//!
//! Waiting is expressed with `tokio::time::timeout` around real work, never
//! with fixed delays. Tests may sleep; production code may not.

use architectural_enforcement::{production_sources, report, router_core_src, scan};

const SLEEP_PATTERNS: &[&str] = &["thread::sleep", "time::sleep", "sleep(", "sleep_until("];

#[test]
fn router_core_never_sleeps() {
    let files = production_sources(&router_core_src());
    assert!(!files.is_empty(), "no sources found under router/core/src");

    let violations = scan(&files, SLEEP_PATTERNS, false);
    assert!(
        violations.is_empty(),
        "sleep calls in production code:\n{}",
        report(&violations)
    );
}
