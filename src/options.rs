//! Per-site build options.
//!
//! Options are assembled with a builder before a run and handed to
//! [`Site::new`](crate::site::Site::new). Pipelines, concurrency, caching and
//! the ignore matcher can be set freely. The two hooks are singletons, and the
//! builder tracks them in its type: once a pre-render hook is installed the
//! `pre_render_hook` method no longer exists on the returned value, so a second
//! installation is a compile error rather than a silent overwrite.
//!
//! ```rust
//! use marksite::options::Options;
//! use marksite::pipeline::HookError;
//! use std::path::Path;
//!
//! let options = Options::new()
//!     .writers(8)
//!     .pre_render_hook(|_: &Path, data: Vec<u8>| -> Result<Vec<u8>, HookError> { Ok(data) });
//! ```
//!
//! ```compile_fail
//! use marksite::options::Options;
//! use marksite::pipeline::HookError;
//! use std::path::Path;
//!
//! let noop = |_: &Path, data: Vec<u8>| -> Result<Vec<u8>, HookError> { Ok(data) };
//! let options = Options::new().pre_render_hook(noop).pre_render_hook(noop);
//! ```

use crate::filter::Ignore;
use crate::pipeline::{Hook, Pipeline};
use std::marker::PhantomData;

/// Hook slot is empty.
#[derive(Debug, Clone, Copy)]
pub struct Unset;

/// Hook slot is filled.
#[derive(Debug, Clone, Copy)]
pub struct Installed;

pub struct Options<Pre = Unset, Post = Unset> {
    pipelines: Vec<Box<dyn Pipeline>>,
    pre_render: Option<Box<dyn Hook>>,
    post_render: Option<Box<dyn Hook>>,
    ignore: Option<Box<dyn Ignore>>,
    writers: usize,
    caching: bool,
    _hooks: PhantomData<(Pre, Post)>,
}

impl Options {
    pub fn new() -> Self {
        Self {
            pipelines: Vec::new(),
            pre_render: None,
            post_render: None,
            ignore: None,
            writers: 0,
            caching: false,
            _hooks: PhantomData,
        }
    }
}

impl Default for Options {
    fn default() -> Self {
        Self::new()
    }
}

impl<Pre, Post> Options<Pre, Post> {
    /// Append a pipeline stage. Stages run in the order they are added.
    pub fn pipeline(mut self, stage: impl Pipeline + 'static) -> Self {
        self.pipelines.push(Box::new(stage));
        self
    }

    /// Number of concurrent writers, at most [`MAX_WRITERS`](crate::writer::MAX_WRITERS).
    /// `0` selects the environment/default value.
    pub fn writers(mut self, writers: usize) -> Self {
        self.writers = writers;
        self
    }

    /// Keep a copy of every emitted output record on the site.
    pub fn caching(mut self, enabled: bool) -> Self {
        self.caching = enabled;
        self
    }

    /// Replace the `.marksiteignore` rules with a custom matcher.
    pub fn ignore(mut self, matcher: impl Ignore + 'static) -> Self {
        self.ignore = Some(Box::new(matcher));
        self
    }

    fn retype<A, B>(self) -> Options<A, B> {
        Options {
            pipelines: self.pipelines,
            pre_render: self.pre_render,
            post_render: self.post_render,
            ignore: self.ignore,
            writers: self.writers,
            caching: self.caching,
            _hooks: PhantomData,
        }
    }

    pub(crate) fn into_extensions(self) -> Extensions {
        Extensions {
            pipelines: self.pipelines,
            pre_render: self.pre_render,
            post_render: self.post_render,
            ignore: self.ignore,
            writers: self.writers,
            caching: self.caching,
        }
    }
}

impl<Post> Options<Unset, Post> {
    /// Transform the raw bytes of every input before conversion.
    pub fn pre_render_hook(mut self, hook: impl Hook + 'static) -> Options<Installed, Post> {
        self.pre_render = Some(Box::new(hook));
        self.retype()
    }
}

impl<Pre> Options<Pre, Unset> {
    /// Transform every assembled Markdown page (header + body + footer).
    pub fn post_render_hook(mut self, hook: impl Hook + 'static) -> Options<Pre, Installed> {
        self.post_render = Some(Box::new(hook));
        self.retype()
    }
}

/// Type-erased options, owned by a [`Site`](crate::site::Site).
pub(crate) struct Extensions {
    pub pipelines: Vec<Box<dyn Pipeline>>,
    pub pre_render: Option<Box<dyn Hook>>,
    pub post_render: Option<Box<dyn Hook>>,
    pub ignore: Option<Box<dyn Ignore>>,
    pub writers: usize,
    pub caching: bool,
}
