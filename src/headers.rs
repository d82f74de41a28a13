//! Per-directory header and footer overrides.
//!
//! Any directory in the source tree may carry a `_header.html` and/or a
//! `_footer.html`. A Markdown page is wrapped with the override of its own
//! directory, or else the override of the nearest ancestor that declares one,
//! or else the compiled-in default:
//!
//! ```text
//! content/
//! ├── _header.html            # used by index.md and notes/todo.md
//! ├── index.md
//! ├── notes/
//! │   └── todo.md
//! └── blog/
//!     ├── _header.html        # used by everything under blog/
//!     └── 2024/
//!         └── post.md
//! ```
//!
//! ## Title placeholders
//!
//! A header may contain one title placeholder. It decides how the page title
//! is found:
//!
//! | Placeholder | Title source |
//! |-------------|--------------|
//! | `{{from-h1}}` | first `# heading` of the page |
//! | `{{from-tag}}` | first `:title ...` directive line (removed from the body) |
//!
//! When the page has no matching heading or directive, the site title is used.

use maud::html;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const HEADER_FILE: &str = "_header.html";
pub const FOOTER_FILE: &str = "_footer.html";

pub const PLACEHOLDER_FROM_H1: &str = "{{from-h1}}";
pub const PLACEHOLDER_FROM_TAG: &str = "{{from-tag}}";

const DEFAULT_HEADER: &str = "<!DOCTYPE html>
<html lang=\"en\">
<head>
<meta charset=\"UTF-8\">
<meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">
<title>{{from-h1}}</title>
</head>
<body>
";

const DEFAULT_FOOTER: &str = "</body>
</html>
";

#[derive(Error, Debug)]
pub enum HeaderError {
    #[error("Directory already has an override: {0}")]
    Duplicate(PathBuf),
}

/// How a page title is substituted into a header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TitleMode {
    #[default]
    None,
    FromH1,
    FromTag,
}

impl TitleMode {
    /// Detect the mode from header text. `{{from-h1}}` wins if both appear.
    pub fn detect(content: &str) -> Self {
        if content.contains(PLACEHOLDER_FROM_H1) {
            TitleMode::FromH1
        } else if content.contains(PLACEHOLDER_FROM_TAG) {
            TitleMode::FromTag
        } else {
            TitleMode::None
        }
    }

    fn placeholder(self) -> Option<&'static str> {
        match self {
            TitleMode::None => None,
            TitleMode::FromH1 => Some(PLACEHOLDER_FROM_H1),
            TitleMode::FromTag => Some(PLACEHOLDER_FROM_TAG),
        }
    }
}

/// A header or footer registered for one directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderFooterEntry {
    /// Directory the override applies to (empty for the compiled-in default).
    pub dir: PathBuf,
    pub content: String,
    pub title_mode: TitleMode,
}

impl HeaderFooterEntry {
    pub fn new(dir: impl Into<PathBuf>, content: impl Into<String>) -> Self {
        let content = content.into();
        Self {
            dir: dir.into(),
            title_mode: TitleMode::detect(&content),
            content,
        }
    }

    /// The entry text with its title placeholder replaced by `title`.
    ///
    /// The title is HTML-escaped; entries without a placeholder are
    /// returned unchanged.
    pub fn render(&self, title: &str) -> String {
        match self.title_mode.placeholder() {
            Some(placeholder) => {
                let escaped = html! { (title) }.into_string();
                self.content.replacen(placeholder, &escaped, 1)
            }
            None => self.content.clone(),
        }
    }
}

/// Directory → override map with longest-prefix lookup.
#[derive(Debug, Clone)]
pub struct HeaderFooterStore {
    entries: HashMap<PathBuf, HeaderFooterEntry>,
    default: HeaderFooterEntry,
}

impl HeaderFooterStore {
    pub fn new(default: HeaderFooterEntry) -> Self {
        Self {
            entries: HashMap::new(),
            default,
        }
    }

    /// Store seeded with the compiled-in default header.
    pub fn headers() -> Self {
        Self::new(HeaderFooterEntry::new("", DEFAULT_HEADER))
    }

    /// Store seeded with the compiled-in default footer.
    pub fn footers() -> Self {
        Self::new(HeaderFooterEntry::new("", DEFAULT_FOOTER))
    }

    /// Register the override for `dir`. A directory can only be registered once.
    pub fn add(&mut self, dir: impl Into<PathBuf>, entry: HeaderFooterEntry) -> Result<(), HeaderError> {
        let dir = dir.into();
        if self.entries.contains_key(&dir) {
            return Err(HeaderError::Duplicate(dir));
        }
        self.entries.insert(dir, entry);
        Ok(())
    }

    /// Pick the entry that applies to `file`.
    ///
    /// The containing directory's own entry wins; otherwise the registered
    /// directory with the longest path (raw length, not component count) that
    /// is an ancestor of `file`; otherwise the default.
    ///
    /// Ancestry is tested by whole path components, so `blog/` does not
    /// apply to `blogroll/x.md` even though it is a string prefix of it.
    pub fn choose(&self, file: &Path) -> &HeaderFooterEntry {
        if let Some(parent) = file.parent()
            && let Some(entry) = self.entries.get(parent)
        {
            return entry;
        }

        self.entries
            .iter()
            .filter(|(dir, _)| file.starts_with(dir))
            .max_by_key(|(dir, _)| dir.as_os_str().len())
            .map(|(_, entry)| entry)
            .unwrap_or(&self.default)
    }

    pub fn default_entry(&self) -> &HeaderFooterEntry {
        &self.default
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
