//! Ignore rules for the source walk.
//!
//! The walker only needs a yes/no answer per path, expressed by [`Ignore`].
//! The stock implementation reads `.marksiteignore` from the source root,
//! which uses `.gitignore` syntax:
//!
//! ```text
//! # .marksiteignore
//! drafts/
//! *.tmp
//! !keep.tmp
//! ```

use ignore::gitignore::{Gitignore, GitignoreBuilder};
use std::path::Path;

pub const IGNORE_FILE: &str = ".marksiteignore";

pub trait Ignore: Send + Sync {
    fn is_ignored(&self, path: &Path) -> bool;
}

impl<F> Ignore for F
where
    F: Fn(&Path) -> bool + Send + Sync,
{
    fn is_ignored(&self, path: &Path) -> bool {
        self(path)
    }
}

/// Ignores nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoIgnore;

impl Ignore for NoIgnore {
    fn is_ignored(&self, _path: &Path) -> bool {
        false
    }
}

/// Gitignore-syntax rules rooted at a directory.
#[derive(Debug, Clone)]
pub struct IgnoreFile {
    matcher: Gitignore,
}

impl IgnoreFile {
    /// Load `<root>/.marksiteignore`. Returns `Ok(None)` when the file does not exist.
    pub fn load(root: &Path) -> Result<Option<Self>, ignore::Error> {
        let path = root.join(IGNORE_FILE);
        if !path.is_file() {
            return Ok(None);
        }
        let mut builder = GitignoreBuilder::new(root);
        if let Some(err) = builder.add(&path) {
            return Err(err);
        }
        Ok(Some(Self {
            matcher: builder.build()?,
        }))
    }

    /// Build rules from in-memory lines, as if they were read from a file in `root`.
    pub fn from_lines(root: &Path, lines: &[&str]) -> Result<Self, ignore::Error> {
        let mut builder = GitignoreBuilder::new(root);
        for line in lines {
            builder.add_line(None, line)?;
        }
        Ok(Self {
            matcher: builder.build()?,
        })
    }

    pub fn len(&self) -> usize {
        self.matcher.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matcher.is_empty()
    }
}

impl Ignore for IgnoreFile {
    fn is_ignored(&self, path: &Path) -> bool {
        self.matcher.matched(path, path.is_dir()).is_ignore()
    }
}
