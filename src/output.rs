//! CLI output formatting.
//!
//! Every `format_*` function is pure and returns display lines; the matching
//! `print_*` wrapper writes them to stdout. Logging goes to stderr through
//! `tracing` and is independent of this output.
//!
//! # Output Format
//!
//! ## Manifest runs
//!
//! One header line per site stage, with indented context lines under it:
//!
//! ```text
//! docs: cleanup
//!     removed public/docs/fonts
//! docs: copy
//!     assets/logo.svg → public/docs/logo.svg
//! docs: build
//!     public/docs (12 files)
//! ```
//!
//! ## Single-site generation
//!
//! ```text
//! public (3 files)
//!     about.html
//!     css/site.css
//!     index.html
//! ```

use crate::apply::ApplyEvent;
use std::path::{Path, PathBuf};

// ============================================================================
// Shared helpers
// ============================================================================

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn file_count(n: usize) -> String {
    match n {
        1 => "1 file".to_string(),
        n => format!("{n} files"),
    }
}

// ============================================================================
// Manifest runs
// ============================================================================

/// Format a single manifest progress event as display lines.
pub fn format_apply_event(event: &ApplyEvent) -> Vec<String> {
    match event {
        ApplyEvent::StageStarted { site, stage } => vec![format!("{site}: {stage}")],
        ApplyEvent::Removed { path, .. } => {
            vec![format!("{}removed {}", indent(1), path.display())]
        }
        ApplyEvent::Copied { from, to, .. } => {
            vec![format!("{}{} → {}", indent(1), from.display(), to.display())]
        }
        ApplyEvent::Built { dest, written, .. } => {
            vec![format!(
                "{}{} ({})",
                indent(1),
                dest.display(),
                file_count(*written)
            )]
        }
    }
}

/// Print a manifest progress event to stdout.
pub fn print_apply_event(event: &ApplyEvent) {
    for line in format_apply_event(event) {
        println!("{}", line);
    }
}

// ============================================================================
// Single-site generation
// ============================================================================

/// Format the result of one site build: a summary line, then every written
/// path relative to `dest`, sorted.
pub fn format_written(dest: &Path, written: &[PathBuf]) -> Vec<String> {
    let mut files: Vec<String> = written
        .iter()
        .map(|path| {
            path.strip_prefix(dest)
                .unwrap_or(path)
                .display()
                .to_string()
        })
        .collect();
    files.sort();

    let mut lines = vec![format!("{} ({})", dest.display(), file_count(written.len()))];
    lines.extend(files.into_iter().map(|f| format!("{}{}", indent(1), f)));
    lines
}

/// Print the result of one site build to stdout.
pub fn print_written(dest: &Path, written: &[PathBuf]) {
    for line in format_written(dest, written) {
        println!("{}", line);
    }
}
