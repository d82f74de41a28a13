//! Types shared between the walker and the writer.

use std::path::PathBuf;

/// Permission bits used when a record carries none.
pub const DEFAULT_MODE: u32 = 0o644;

/// One file to be written to the destination tree.
///
/// Created exactly once per converted or copied input and consumed exactly
/// once by the writer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputRecord {
    pub target: PathBuf,
    /// Input that produced this record; `None` for synthetic output.
    pub source: Option<PathBuf>,
    pub data: Vec<u8>,
    /// Unix permission bits. `0` means [`DEFAULT_MODE`].
    pub mode: u32,
}

impl OutputRecord {
    pub fn synthetic(target: impl Into<PathBuf>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            target: target.into(),
            source: None,
            data: data.into(),
            mode: 0,
        }
    }

    pub fn effective_mode(&self) -> u32 {
        if self.mode == 0 { DEFAULT_MODE } else { self.mode }
    }
}
