//! Source walk and page conversion for one site.
//!
//! A [`Site`] pairs a source tree with a destination tree. Building it walks
//! the source depth-first in lexical order and turns every visible file into
//! an [`OutputRecord`]:
//!
//! ```text
//! src/                         dst/
//! ├── _header.html     ──▶     (override, not copied)
//! ├── index.md         ──▶     index.html   header + body + footer
//! ├── about.md         ──▶     (skipped: about.html exists)
//! ├── about.html       ──▶     about.html   copied verbatim
//! ├── css/site.css     ──▶     css/site.css copied verbatim
//! └── .drafts/         ──▶     (hidden, pruned)
//! ```
//!
//! ## Directory phase
//!
//! Each directory is processed before anything inside it. Its `_header.html`
//! and `_footer.html` are registered in the header/footer stores, and its
//! other `.html` children go into the [`PreferredSet`]: a Markdown file whose
//! `.html` twin is in the set produces no output.
//!
//! ## File phase
//!
//! Each remaining file is recorded as a discovered input, read, passed through
//! the registered pipelines and then converted. Hidden entries, symlinks and
//! paths matched by the ignore rules are skipped; a hidden directory prunes its
//! whole subtree.
//!
//! ## Errors
//!
//! The walk stops at the first I/O error, duplicate override, duplicate
//! preferred path, pipeline or hook failure. Two records for the same target
//! are also an error.

use crate::convert::{is_markdown, render_page};
use crate::filter::{Ignore, IgnoreFile, NoIgnore};
use crate::headers::{FOOTER_FILE, HEADER_FILE, HeaderError, HeaderFooterEntry, HeaderFooterStore};
use crate::metadata::{self, MetadataError};
use crate::options::{Extensions, Options};
use crate::pipeline::{Flow, Hook, HookError, Input, Pipeline, PipelineError, run_stages};
use crate::types::OutputRecord;
use crate::writer::{self, WriteError};
use std::collections::HashSet;
use std::ffi::OsStr;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};
use walkdir::{DirEntry, WalkDir};

#[derive(Error, Debug)]
pub enum SiteError {
    #[error("Source and destination are the same directory: {0}")]
    SameRoots(PathBuf),
    #[error("Ignore file error: {0}")]
    Ignore(#[from] ignore::Error),
}

#[derive(Error, Debug)]
pub enum WalkError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Walk error: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("Header error: {0}")]
    Header(#[from] HeaderError),
    #[error("HTML file registered twice: {0}")]
    DuplicatePreferred(PathBuf),
    #[error("Two outputs for the same target: {0}")]
    DuplicateTarget(PathBuf),
    #[error("Pipeline {index} failed: {source}")]
    Pipeline {
        index: usize,
        #[source]
        source: PipelineError,
    },
    #[error("Hook failed on {path}: {source}")]
    Hook {
        path: PathBuf,
        #[source]
        source: HookError,
    },
    #[error("Input is outside the source tree: {0}")]
    OutsideSource(PathBuf),
    #[error("Writer queue closed")]
    QueueClosed,
}

#[derive(Error, Debug)]
pub enum GenerateError {
    #[error("Site error: {0}")]
    Site(#[from] SiteError),
    #[error("Write error: {0}")]
    Write(#[from] WriteError),
    #[error("Metadata error: {0}")]
    Metadata(#[from] MetadataError),
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

fn io_error(path: &Path) -> impl FnOnce(io::Error) -> WalkError + '_ {
    move |source| WalkError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Destination paths of hand-written `.html` files.
#[derive(Debug, Clone, Default)]
pub struct PreferredSet {
    paths: HashSet<PathBuf>,
}

impl PreferredSet {
    pub fn insert(&mut self, path: PathBuf) -> Result<(), WalkError> {
        if self.paths.contains(&path) {
            return Err(WalkError::DuplicatePreferred(path));
        }
        self.paths.insert(path);
        Ok(())
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.paths.contains(path)
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

/// Everything one walk accumulates. Reset at the start of every walk.
struct WalkState {
    headers: HeaderFooterStore,
    footers: HeaderFooterStore,
    preferred: PreferredSet,
    discovered: Vec<PathBuf>,
    emitted: HashSet<PathBuf>,
    cache: Vec<OutputRecord>,
}

impl WalkState {
    fn new() -> Self {
        Self {
            headers: HeaderFooterStore::headers(),
            footers: HeaderFooterStore::footers(),
            preferred: PreferredSet::default(),
            discovered: Vec::new(),
            emitted: HashSet::new(),
            cache: Vec::new(),
        }
    }

    /// Register the overrides and preferred HTML files found directly in `dir`.
    fn register_dir(&mut self, dir: &Path, dst: &Path, src: &Path, ignore: &dyn Ignore) -> Result<(), WalkError> {
        let mut children = fs::read_dir(dir)
            .and_then(|entries| entries.collect::<Result<Vec<_>, _>>())
            .map_err(io_error(dir))?;
        children.sort_by_key(|child| child.file_name());

        for child in children {
            let path = child.path();
            let file_type = child.file_type().map_err(io_error(&path))?;
            let name = child.file_name();
            if !file_type.is_file() || is_hidden(&name) || ignore.is_ignored(&path) {
                continue;
            }

            if name == HEADER_FILE {
                let content = fs::read_to_string(&path).map_err(io_error(&path))?;
                debug!(dir = %dir.display(), "header override");
                self.headers.add(dir, HeaderFooterEntry::new(dir, content))?;
            } else if name == FOOTER_FILE {
                let content = fs::read_to_string(&path).map_err(io_error(&path))?;
                debug!(dir = %dir.display(), "footer override");
                self.footers.add(dir, HeaderFooterEntry::new(dir, content))?;
            } else if is_html(&path) {
                let rel = path
                    .strip_prefix(src)
                    .map_err(|_| WalkError::OutsideSource(path.clone()))?;
                self.preferred.insert(dst.join(rel))?;
            }
        }
        Ok(())
    }
}

/// The core converter: hooks plus the roots and title it renders against.
struct Converter<'a> {
    src: &'a Path,
    dst: &'a Path,
    title: &'a str,
    pre_render: Option<&'a dyn Hook>,
    post_render: Option<&'a dyn Hook>,
}

impl Converter<'_> {
    /// Turn one input into a record, or `None` when a preferred HTML file
    /// replaces it.
    fn convert(&self, input: Input, mode: u32, state: &WalkState) -> Result<Option<OutputRecord>, WalkError> {
        let Input { path, data, .. } = input;
        let rel = path
            .strip_prefix(self.src)
            .map_err(|_| WalkError::OutsideSource(path.clone()))?;
        let mirrored = self.dst.join(rel);

        if !is_markdown(&path) {
            let data = apply_hook(self.pre_render, &path, data)?;
            return Ok(Some(OutputRecord {
                target: mirrored,
                source: Some(path),
                data,
                mode,
            }));
        }

        let target = mirrored.with_extension("html");
        if state.preferred.contains(&target) {
            debug!(source = %path.display(), "hand-written html wins");
            return Ok(None);
        }

        let data = apply_hook(self.pre_render, &path, data)?;
        let markdown = String::from_utf8_lossy(&data);
        let header = state.headers.choose(&path);
        let footer = state.footers.choose(&path);
        let page = render_page(header, footer, &markdown, self.title);
        let page = apply_hook(self.post_render, &path, page)?;

        Ok(Some(OutputRecord {
            target,
            source: Some(path),
            data: page,
            mode,
        }))
    }
}

fn apply_hook(hook: Option<&dyn Hook>, path: &Path, data: Vec<u8>) -> Result<Vec<u8>, WalkError> {
    match hook {
        Some(hook) => hook.apply(path, data).map_err(|source| WalkError::Hook {
            path: path.to_path_buf(),
            source,
        }),
        None => Ok(data),
    }
}

/// One source tree rendered into one destination tree.
pub struct Site {
    src: PathBuf,
    dst: PathBuf,
    title: String,
    url: String,
    ignore: Box<dyn Ignore>,
    pipelines: Vec<Box<dyn Pipeline>>,
    pre_render: Option<Box<dyn Hook>>,
    post_render: Option<Box<dyn Hook>>,
    writers: usize,
    caching: bool,
    state: WalkState,
}

impl Site {
    /// Create a site. Fails when `src` and `dst` name the same directory, or
    /// when `<src>/.marksiteignore` cannot be parsed.
    pub fn new<Pre, Post>(
        src: impl Into<PathBuf>,
        dst: impl Into<PathBuf>,
        title: impl Into<String>,
        url: impl Into<String>,
        options: Options<Pre, Post>,
    ) -> Result<Self, SiteError> {
        let src = src.into();
        let dst = dst.into();
        if same_dir(&src, &dst) {
            return Err(SiteError::SameRoots(src));
        }

        let Extensions {
            pipelines,
            pre_render,
            post_render,
            ignore,
            writers,
            caching,
        } = options.into_extensions();

        let ignore: Box<dyn Ignore> = match ignore {
            Some(custom) => custom,
            None => match IgnoreFile::load(&src)? {
                Some(file) => Box::new(file),
                None => Box::new(NoIgnore),
            },
        };

        Ok(Self {
            src,
            dst,
            title: title.into(),
            url: url.into(),
            ignore,
            pipelines,
            pre_render,
            post_render,
            writers,
            caching,
            state: WalkState::new(),
        })
    }

    pub fn src(&self) -> &Path {
        &self.src
    }

    pub fn dst(&self) -> &Path {
        &self.dst
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Every input file the last walk handed to the pipelines, in walk order.
    pub fn discovered_inputs(&self) -> &[PathBuf] {
        &self.state.discovered
    }

    /// Records emitted by the last walk. `None` unless caching is enabled.
    pub fn outputs(&self) -> Option<&[OutputRecord]> {
        self.caching.then_some(self.state.cache.as_slice())
    }

    pub fn headers(&self) -> &HeaderFooterStore {
        &self.state.headers
    }

    pub fn footers(&self) -> &HeaderFooterStore {
        &self.state.footers
    }

    pub fn preferred(&self) -> &PreferredSet {
        &self.state.preferred
    }

    /// Walk the source tree, passing every produced record to `emit`.
    ///
    /// Runs on the calling thread. [`Site::build`] runs it on a producer
    /// thread feeding the writer pool.
    pub fn walk(
        &mut self,
        emit: &mut dyn FnMut(OutputRecord) -> Result<(), WalkError>,
    ) -> Result<(), WalkError> {
        self.state = WalkState::new();
        let ignore: &dyn Ignore = &*self.ignore;
        let state = &mut self.state;
        let converter = Converter {
            src: &self.src,
            dst: &self.dst,
            title: &self.title,
            pre_render: self.pre_render.as_deref(),
            post_render: self.post_render.as_deref(),
        };

        let entries = WalkDir::new(&self.src)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || !is_skipped(entry, ignore));

        for entry in entries {
            let entry = entry?;
            let file_type = entry.file_type();
            if file_type.is_dir() {
                state.register_dir(entry.path(), &self.dst, &self.src, ignore)?;
                continue;
            }
            if !file_type.is_file() || is_marker(entry.file_name()) {
                continue;
            }

            let path = entry.into_path();
            debug!(path = %path.display(), "discovered");
            state.discovered.push(path.clone());
            let metadata = fs::metadata(&path).map_err(io_error(&path))?;
            let data = fs::read(&path).map_err(io_error(&path))?;
            let mode = file_mode(&metadata);

            let input = match run_stages(&self.pipelines, Input::file(path, data))
                .map_err(|(index, source)| WalkError::Pipeline { index, source })?
            {
                Flow::Continue(input) | Flow::Break(input) => input,
                Flow::SkipCore => continue,
            };

            let Some(record) = converter.convert(input, mode, state)? else {
                continue;
            };
            if !state.emitted.insert(record.target.clone()) {
                return Err(WalkError::DuplicateTarget(record.target));
            }
            if self.caching {
                state.cache.push(record.clone());
            }
            emit(record)?;
        }
        Ok(())
    }

    /// Walk and write concurrently. Returns the written target paths in no
    /// particular order.
    pub fn build(&mut self) -> Result<Vec<PathBuf>, WriteError> {
        let writers = self.writers;
        writer::write_records(writers, |emit| self.walk(emit))
    }
}

/// Build one site, then write its sitemap.
pub fn generate<Pre, Post>(
    src: impl Into<PathBuf>,
    dst: impl Into<PathBuf>,
    title: impl Into<String>,
    url: impl Into<String>,
    options: Options<Pre, Post>,
) -> Result<Vec<PathBuf>, GenerateError> {
    let mut site = Site::new(src, dst, title, url, options)?;
    info!(src = %site.src().display(), dst = %site.dst().display(), "generating");

    let written = site.build()?;
    let modified = fs::metadata(site.src())
        .and_then(|meta| meta.modified())
        .map_err(|source| GenerateError::Io {
            path: site.src().to_path_buf(),
            source,
        })?;
    metadata::emit(site.url(), site.dst(), &written, modified)?;

    info!(files = written.len(), "generated");
    Ok(written)
}

fn is_hidden(name: &OsStr) -> bool {
    name.to_string_lossy().starts_with('.')
}

fn is_marker(name: &OsStr) -> bool {
    name == HEADER_FILE || name == FOOTER_FILE
}

fn is_html(path: &Path) -> bool {
    path.extension()
        .map(|e| e.eq_ignore_ascii_case("html"))
        .unwrap_or(false)
}

fn is_skipped(entry: &DirEntry, ignore: &dyn Ignore) -> bool {
    is_hidden(entry.file_name()) || entry.path_is_symlink() || ignore.is_ignored(entry.path())
}

fn same_dir(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => a.components().eq(b.components()),
    }
}

#[cfg(unix)]
fn file_mode(metadata: &fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o7777
}

#[cfg(not(unix))]
fn file_mode(_metadata: &fs::Metadata) -> u32 {
    0
}
