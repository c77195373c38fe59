//! Architectural Enforcement Integration Tests
//!
//! Source scanners that keep the execution engine honest:
//! - No sleep() calls in production code (use timeouts or events)
//! - No blocking I/O inside async functions
//!
//! Test modules (everything from the first `#[cfg(test)]` of a file) and
//! `test_utils.rs` are not production code and are never scanned.

use std::fmt;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

/// Production sources of one crate, test code stripped
#[derive(Debug)]
pub struct SourceFile {
    /// Path on disk
    pub path: PathBuf,
    /// Lines up to (not including) the first `#[cfg(test)]`
    pub lines: Vec<String>,
}

/// A forbidden pattern found in production code
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// File containing the match
    pub path: PathBuf,
    /// 1-based line number
    pub line_no: usize,
    /// Offending line, trimmed
    pub line: String,
    /// Pattern that matched
    pub pattern: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}: `{}` in: {}",
            self.path.display(),
            self.line_no,
            self.pattern,
            self.line
        )
    }
}

/// `router/core/src`, resolved from this crate's manifest directory
#[must_use]
pub fn router_core_src() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("..")
        .join("router")
        .join("core")
        .join("src")
}

/// Load every production `.rs` file under `root`
///
/// # Panics
///
/// Panics if a source file cannot be read.
#[must_use]
pub fn production_sources(root: &Path) -> Vec<SourceFile> {
    let mut files: Vec<SourceFile> = WalkDir::new(root)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.path().extension().is_some_and(|ext| ext == "rs"))
        .filter(|e| e.file_name() != "test_utils.rs")
        .map(|e| {
            let content = std::fs::read_to_string(e.path())
                .unwrap_or_else(|err| panic!("cannot read {}: {err}", e.path().display()));
            let lines = content
                .lines()
                .take_while(|line| !line.trim_start().starts_with("#[cfg(test)]"))
                .map(ToString::to_string)
                .collect();
            SourceFile {
                path: e.path().to_path_buf(),
                lines,
            }
        })
        .collect();
    files.sort_by(|a, b| a.path.cmp(&b.path));
    files
}

fn is_comment(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed.starts_with("//")
        || trimmed.starts_with("/*")
        || trimmed.starts_with("*/")
        || trimmed.starts_with("* ")
}

fn starts_async_region(line: &str) -> bool {
    line.contains("async fn ") || line.contains("async move {") || line.contains("async {")
}

/// Per line: whether it lies inside an `async fn` body or `async` block
#[must_use]
pub fn async_mask(lines: &[String]) -> Vec<bool> {
    let mut mask = Vec::with_capacity(lines.len());
    let mut depth: i64 = 0;
    let mut in_region = false;
    let mut body_open = false;

    for line in lines {
        if !in_region && !is_comment(line) && starts_async_region(line) {
            in_region = true;
            body_open = false;
            depth = 0;
        }

        mask.push(in_region);
        if !in_region || is_comment(line) {
            continue;
        }

        for c in line.chars() {
            match c {
                '{' => {
                    depth += 1;
                    body_open = true;
                }
                '}' => depth -= 1,
                _ => {}
            }
        }

        if body_open && depth <= 0 {
            in_region = false;
        } else if !body_open && line.trim_end().ends_with(';') {
            // Bodiless trait method declaration
            in_region = false;
        }
    }

    mask
}

/// Find `patterns` in production lines, optionally only inside async code
#[must_use]
pub fn scan(files: &[SourceFile], patterns: &[&str], async_only: bool) -> Vec<Violation> {
    let mut violations = Vec::new();

    for file in files {
        let mask = async_mask(&file.lines);
        for (idx, line) in file.lines.iter().enumerate() {
            if is_comment(line) || (async_only && !mask[idx]) {
                continue;
            }
            for pattern in patterns {
                if line.contains(pattern) {
                    violations.push(Violation {
                        path: file.path.clone(),
                        line_no: idx + 1,
                        line: line.trim().to_string(),
                        pattern: (*pattern).to_string(),
                    });
                }
            }
        }
    }

    violations
}

/// Render violations for an assertion message
#[must_use]
pub fn report(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(src: &str) -> Vec<String> {
        src.lines().map(ToString::to_string).collect()
    }

    #[test]
    fn test_async_mask_tracks_fn_bodies() {
        let src = lines(
            "fn sync() {\n    a();\n}\nasync fn run() {\n    if x {\n        b();\n    }\n}\nfn after() {}",
        );
        let mask = async_mask(&src);
        assert_eq!(
            mask,
            vec![false, false, false, true, true, true, true, true, false]
        );
    }

    #[test]
    fn test_async_mask_skips_trait_declarations() {
        let src = lines("trait T {\n    async fn connect(&self) -> u8;\n    fn other(&self);\n}");
        let mask = async_mask(&src);
        assert_eq!(mask, vec![false, true, false, false]);
    }

    #[test]
    fn test_scan_ignores_comments_and_sync_code() {
        let file = SourceFile {
            path: PathBuf::from("x.rs"),
            lines: lines(
                "fn load() {\n    std::fs::read(p);\n}\nasync fn go() {\n    // std::fs::read\n    std::fs::read(p);\n}",
            ),
        };
        let found = scan(&[file], &["std::fs::"], true);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].line_no, 6);
    }
}
