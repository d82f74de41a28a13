//! Extension points invoked by the walker for every discovered input.
//!
//! There are two kinds:
//!
//! - **Pipelines** run before conversion, in registration order. Each one may
//!   rewrite the input (path, bytes), drop it ([`Flow::SkipCore`]), or stop the
//!   remaining pipelines and hand the input straight to the converter
//!   ([`Flow::Break`]).
//! - **Hooks** are byte transforms. A site has at most one pre-render hook
//!   (applied to the raw bytes of every file) and at most one post-render hook
//!   (applied to assembled HTML pages only). See [`crate::options::Options`].
//!
//! Both run synchronously on the walking thread. Plain closures implement
//! both traits:
//!
//! ```rust
//! use marksite::pipeline::{Flow, Hook, HookError, Input, Pipeline, PipelineError};
//! use std::path::Path;
//!
//! let drafts = |input: Input| -> Result<Flow, PipelineError> {
//!     if input.path.to_string_lossy().contains("draft") {
//!         Ok(Flow::SkipCore)
//!     } else {
//!         Ok(Flow::Continue(input))
//!     }
//! };
//! let shout = |_: &Path, data: Vec<u8>| -> Result<Vec<u8>, HookError> {
//!     Ok(data.to_ascii_uppercase())
//! };
//! # let _ = (drafts, shout);
//! ```

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{0}")]
    Message(String),
    #[error("stage {index}: {source}")]
    Chain {
        index: usize,
        #[source]
        source: Box<PipelineError>,
    },
}

impl PipelineError {
    pub fn msg(message: impl Into<String>) -> Self {
        PipelineError::Message(message.into())
    }
}

#[derive(Error, Debug)]
pub enum HookError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("{0}")]
    Message(String),
}

/// One discovered input as seen by pipelines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Input {
    pub path: PathBuf,
    pub data: Vec<u8>,
    /// Always `false` for walker inputs; kept so stages can tell synthetic
    /// directory entries apart.
    pub is_dir: bool,
}

impl Input {
    pub fn file(path: impl Into<PathBuf>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            path: path.into(),
            data: data.into(),
            is_dir: false,
        }
    }
}

/// What a pipeline stage decided for an input.
#[derive(Debug, PartialEq, Eq)]
pub enum Flow {
    /// Pass the (possibly rewritten) input on.
    Continue(Input),
    /// Drop the input: no conversion, no output.
    SkipCore,
    /// Skip the remaining stages and convert this input now.
    Break(Input),
}

pub trait Pipeline: Send + Sync {
    fn run(&self, input: Input) -> Result<Flow, PipelineError>;
}

impl<F> Pipeline for F
where
    F: Fn(Input) -> Result<Flow, PipelineError> + Send + Sync,
{
    fn run(&self, input: Input) -> Result<Flow, PipelineError> {
        self(input)
    }
}

pub trait Hook: Send + Sync {
    fn apply(&self, path: &Path, data: Vec<u8>) -> Result<Vec<u8>, HookError>;
}

impl<F> Hook for F
where
    F: Fn(&Path, Vec<u8>) -> Result<Vec<u8>, HookError> + Send + Sync,
{
    fn apply(&self, path: &Path, data: Vec<u8>) -> Result<Vec<u8>, HookError> {
        self(path, data)
    }
}

/// Several pipelines composed left to right into one.
///
/// A failing sub-stage is reported as [`PipelineError::Chain`] carrying its
/// index within the chain.
#[derive(Default)]
pub struct Chain {
    stages: Vec<Box<dyn Pipeline>>,
}

impl Chain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then(mut self, stage: impl Pipeline + 'static) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

impl Pipeline for Chain {
    fn run(&self, input: Input) -> Result<Flow, PipelineError> {
        run_stages(&self.stages, input).map_err(|(index, source)| PipelineError::Chain {
            index,
            source: Box::new(source),
        })
    }
}

/// Run `stages` in order. On failure returns the failing stage index.
pub(crate) fn run_stages(
    stages: &[Box<dyn Pipeline>],
    mut input: Input,
) -> Result<Flow, (usize, PipelineError)> {
    for (index, stage) in stages.iter().enumerate() {
        match stage.run(input).map_err(|e| (index, e))? {
            Flow::Continue(next) => input = next,
            stop => return Ok(stop),
        }
    }
    Ok(Flow::Continue(input))
}
