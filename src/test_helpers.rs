//! Shared test utilities for the marksite test suite.
//!
//! Builds source trees on disk and inspects the records a walk produces.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let tmp = TempDir::new().unwrap();
//! write_tree(tmp.path(), &[("index.md", "# Home"), ("css/site.css", "")]);
//!
//! let mut site = Site::new(tmp.path(), tmp.path().join("out"), "", "", Options::new()).unwrap();
//! let records = walk_records(&mut site);
//! assert!(record_text(&records, &tmp.path().join("out/index.html")).contains("<h1>Home</h1>"));
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use crate::site::Site;
use crate::types::OutputRecord;

// =========================================================================
// Fixture setup
// =========================================================================

/// Write `(relative path, content)` pairs under `root`, creating directories.
pub fn write_tree(root: &Path, files: &[(&str, &str)]) {
    fs::create_dir_all(root).unwrap();
    for (rel, content) in files {
        let path = root.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, content).unwrap();
    }
}

// =========================================================================
// Walk helpers
// =========================================================================

/// Walk `site` on the current thread and collect every record, sorted by target.
pub fn walk_records(site: &mut Site) -> Vec<OutputRecord> {
    let mut records = Vec::new();
    site.walk(&mut |record| {
        records.push(record);
        Ok(())
    })
    .unwrap();
    records.sort_by(|a, b| a.target.cmp(&b.target));
    records
}

/// Record targets in order.
pub fn targets(records: &[OutputRecord]) -> Vec<PathBuf> {
    records.iter().map(|r| r.target.clone()).collect()
}

/// Find the record written to `target`. Panics with the known targets if missing.
pub fn record_for<'a>(records: &'a [OutputRecord], target: &Path) -> &'a OutputRecord {
    records
        .iter()
        .find(|r| r.target == target)
        .unwrap_or_else(|| {
            panic!(
                "no record for {}; have {:?}",
                target.display(),
                targets(records)
            )
        })
}

/// The record for `target` as UTF-8 text.
pub fn record_text(records: &[OutputRecord], target: &Path) -> String {
    String::from_utf8(record_for(records, target).data.clone()).unwrap()
}
