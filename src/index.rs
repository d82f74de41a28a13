//! Directory index generation.
//!
//! A directory containing `_index.marksite` gets an `index.md` page: the
//! marker's own text followed by a list of links to the directory's visible
//! entries. The generated page then goes through normal Markdown conversion,
//! so it picks up the directory's header and footer.
//!
//! | Entry | Link |
//! |-------|------|
//! | sub-directory `notes/` | `notes/` |
//! | `post.md` | `post.html` |
//! | anything else | file name |
//!
//! Hidden entries, symlinks, marker files and the directory's own `index.md`
//! / `index.html` are not listed. A directory that already has an `index.md`
//! keeps it and the marker produces nothing.

use crate::convert::is_markdown;
use crate::headers::{FOOTER_FILE, HEADER_FILE};
use crate::pipeline::{Flow, Input, Pipeline, PipelineError};
use maud::html;
use serde::Deserialize;
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use tracing::debug;

pub const INDEX_MARKER: &str = "_index.marksite";
const INDEX_PAGE: &str = "index.md";
const INDEX_HTML: &str = "index.html";

/// Listing order of a generated index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(try_from = "String")]
pub enum IndexMode {
    /// By name, A to Z.
    #[default]
    Ascending,
    /// By name, Z to A. Suits date-prefixed posts.
    Descending,
}

impl FromStr for IndexMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" | "default" => Ok(IndexMode::Ascending),
            "reverse" => Ok(IndexMode::Descending),
            other => Err(format!(
                "unknown generate-index-mode {other:?} (expected \"default\" or \"reverse\")"
            )),
        }
    }
}

impl TryFrom<String> for IndexMode {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for IndexMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexMode::Ascending => write!(f, "default"),
            IndexMode::Descending => write!(f, "reverse"),
        }
    }
}

/// One listed entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    pub href: String,
    pub label: String,
}

/// Pipeline stage turning `_index.marksite` into `index.md`.
#[derive(Debug, Clone, Copy, Default)]
pub struct IndexGenerator {
    mode: IndexMode,
}

impl IndexGenerator {
    pub fn new(mode: IndexMode) -> Self {
        Self { mode }
    }

    /// The entries of `dir` that the index links to, in listing order.
    pub fn entries(&self, dir: &Path) -> Result<Vec<IndexEntry>, PipelineError> {
        let io = |source| PipelineError::Io {
            path: dir.to_path_buf(),
            source,
        };
        let mut children = fs::read_dir(dir)
            .and_then(|entries| entries.collect::<Result<Vec<_>, _>>())
            .map_err(io)?;
        children.sort_by_key(|child| child.file_name());
        if self.mode == IndexMode::Descending {
            children.reverse();
        }

        let mut entries = Vec::new();
        for child in children {
            let name = child.file_name().to_string_lossy().into_owned();
            if name.starts_with('.')
                || [INDEX_MARKER, HEADER_FILE, FOOTER_FILE, INDEX_PAGE, INDEX_HTML].contains(&name.as_str())
            {
                continue;
            }
            let file_type = child.file_type().map_err(io)?;
            if file_type.is_symlink() {
                continue;
            }
            let entry = if file_type.is_dir() {
                IndexEntry {
                    href: format!("{name}/"),
                    label: format!("{name}/"),
                }
            } else if is_markdown(Path::new(&name)) {
                let stem = Path::new(&name)
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_default();
                IndexEntry {
                    href: format!("{stem}.html"),
                    label: stem,
                }
            } else {
                IndexEntry {
                    href: name.clone(),
                    label: name,
                }
            };
            entries.push(entry);
        }
        Ok(entries)
    }
}

pub fn render_list(entries: &[IndexEntry]) -> String {
    html! {
        ul class="index" {
            @for entry in entries {
                li { a href=(entry.href) { (entry.label) } }
            }
        }
    }
    .into_string()
}

impl Pipeline for IndexGenerator {
    fn run(&self, input: Input) -> Result<Flow, PipelineError> {
        let is_marker = input.path.file_name().is_some_and(|name| name == INDEX_MARKER);
        let Some(dir) = input.path.parent().filter(|_| is_marker) else {
            return Ok(Flow::Continue(input));
        };
        let page = dir.join(INDEX_PAGE);
        if page.exists() {
            debug!(dir = %dir.display(), "index.md exists, marker ignored");
            return Ok(Flow::SkipCore);
        }

        let entries = self.entries(dir)?;
        let intro = String::from_utf8_lossy(&input.data);
        let intro = intro.trim_end();
        let mut data = String::with_capacity(intro.len() + entries.len() * 48);
        if !intro.is_empty() {
            data.push_str(intro);
            data.push_str("\n\n");
        }
        data.push_str(&render_list(&entries));
        data.push('\n');

        debug!(dir = %dir.display(), entries = entries.len(), "generated index");
        Ok(Flow::Continue(Input::file(page, data)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::write_tree;
    use tempfile::TempDir;

    fn fixture() -> TempDir {
        let tmp = TempDir::new().unwrap();
        write_tree(
            tmp.path(),
            &[
                (INDEX_MARKER, "# Posts\n"),
                ("2023-recap.md", ""),
                ("2024-plans.md", ""),
                ("archive/old.md", ""),
                ("feed.xml", ""),
                ("_header.html", ""),
                (".draft.md", ""),
                ("index.html", ""),
            ],
        );
        tmp
    }

    fn hrefs(entries: &[IndexEntry]) -> Vec<&str> {
        entries.iter().map(|e| e.href.as_str()).collect()
    }

    #[test]
    fn mode_parsing() {
        assert_eq!("".parse::<IndexMode>().unwrap(), IndexMode::Ascending);
        assert_eq!("default".parse::<IndexMode>().unwrap(), IndexMode::Ascending);
        assert_eq!("reverse".parse::<IndexMode>().unwrap(), IndexMode::Descending);
        assert!("sideways".parse::<IndexMode>().is_err());
    }

    #[test]
    fn ascending_listing() {
        let tmp = fixture();
        let entries = IndexGenerator::new(IndexMode::Ascending).entries(tmp.path()).unwrap();
        assert_eq!(hrefs(&entries), vec!["2023-recap.html", "2024-plans.html", "archive/", "feed.xml"]);
        assert_eq!(entries[0].label, "2023-recap");
    }

    #[test]
    fn reverse_listing() {
        let tmp = fixture();
        let entries = IndexGenerator::new(IndexMode::Descending).entries(tmp.path()).unwrap();
        assert_eq!(hrefs(&entries), vec!["feed.xml", "archive/", "2024-plans.html", "2023-recap.html"]);
    }

    #[test]
    fn marker_becomes_index_page() {
        let tmp = fixture();
        let marker = tmp.path().join(INDEX_MARKER);
        let flow = IndexGenerator::default()
            .run(Input::file(&marker, fs::read(&marker).unwrap()))
            .unwrap();
        let input = match flow {
            Flow::Continue(input) => input,
            other => panic!("expected Continue, got {other:?}"),
        };
        assert_eq!(input.path, tmp.path().join("index.md"));
        let text = String::from_utf8(input.data).unwrap();
        assert!(text.starts_with("# Posts\n\n<ul class=\"index\">"));
        assert!(text.contains("<li><a href=\"archive/\">archive/</a></li>"));
    }

    #[test]
    fn other_inputs_pass_through() {
        let input = Input::file("site/page.md", "x");
        let flow = IndexGenerator::default().run(input.clone()).unwrap();
        assert_eq!(flow, Flow::Continue(input));
    }

    #[test]
    fn existing_index_page_wins() {
        let tmp = TempDir::new().unwrap();
        write_tree(tmp.path(), &[(INDEX_MARKER, ""), ("index.md", "# mine")]);
        let flow = IndexGenerator::default()
            .run(Input::file(tmp.path().join(INDEX_MARKER), ""))
            .unwrap();
        assert_eq!(flow, Flow::SkipCore);
    }

    #[test]
    fn labels_are_escaped() {
        let html = render_list(&[IndexEntry {
            href: "a&b.html".into(),
            label: "a<b>".into(),
        }]);
        assert_eq!(html, "<ul class=\"index\"><li><a href=\"a&amp;b.html\">a&lt;b&gt;</a></li></ul>");
    }
}
