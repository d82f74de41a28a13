//! `${{ key }}` text substitution.
//!
//! A site's `replaces` table maps placeholder keys to literal text. The
//! [`Replacer`] is installed as the site's pre-render hook, so substitution
//! happens on the raw bytes of every input, copied files included.
//!
//! Whitespace inside the braces is ignored: `${{key}}` and `${{ key }}` are
//! the same placeholder. A count of `0` replaces every occurrence; a count of
//! `n` replaces the first `n` and leaves the rest untouched.

use crate::manifest::ReplaceTarget;
use crate::pipeline::{Hook, HookError};
use memchr::memmem;
use std::collections::BTreeMap;
use std::path::Path;

const OPEN: &[u8] = b"${{";
const CLOSE: &[u8] = b"}}";

/// Replace placeholders for `key` in `data` with `text`.
///
/// Returns the new bytes and how many placeholders were replaced.
pub fn replace_placeholder(data: &[u8], key: &str, text: &str, count: usize) -> (Vec<u8>, usize) {
    let mut out = Vec::with_capacity(data.len());
    let mut replaced = 0;
    let mut rest = data;

    while count == 0 || replaced < count {
        let Some(start) = memmem::find(rest, OPEN) else {
            break;
        };
        let inner_start = start + OPEN.len();
        let Some(len) = memmem::find(&rest[inner_start..], CLOSE) else {
            break;
        };
        let inner = &rest[inner_start..inner_start + len];
        let end = inner_start + len + CLOSE.len();

        if inner.trim_ascii() == key.as_bytes() {
            out.extend_from_slice(&rest[..start]);
            out.extend_from_slice(text.as_bytes());
            replaced += 1;
            rest = &rest[end..];
        } else {
            // Not ours; keep the opening and look again after it.
            out.extend_from_slice(&rest[..inner_start]);
            rest = &rest[inner_start..];
        }
    }
    out.extend_from_slice(rest);
    (out, replaced)
}

/// Pre-render hook applying every configured replacement, in key order.
#[derive(Debug, Clone, Default)]
pub struct Replacer {
    replaces: BTreeMap<String, ReplaceTarget>,
}

impl Replacer {
    pub fn new(replaces: BTreeMap<String, ReplaceTarget>) -> Self {
        Self { replaces }
    }

    pub fn is_empty(&self) -> bool {
        self.replaces.is_empty()
    }

    pub fn replace(&self, mut data: Vec<u8>) -> Vec<u8> {
        for (key, target) in &self.replaces {
            if memmem::find(&data, OPEN).is_none() {
                break;
            }
            data = replace_placeholder(&data, key, &target.text, target.count).0;
        }
        data
    }
}

impl Hook for Replacer {
    fn apply(&self, _path: &Path, data: Vec<u8>) -> Result<Vec<u8>, HookError> {
        Ok(self.replace(data))
    }
}
