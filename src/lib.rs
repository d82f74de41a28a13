//! # Marksite
//!
//! Renders trees of Markdown into static sites. A JSON manifest describes any
//! number of sites; each one is cleaned, has its extra files copied into place
//! and is then built from its source tree.
//!
//! # Architecture
//!
//! ```text
//! manifest.json ──▶ apply ──▶ cleanup (all sites) → copy (all) → build (each)
//!                                                        │
//!                     ┌──────────────────────────────────┘
//!                     ▼
//!   walk (site) ──▶ pipelines ──▶ convert ──▶ [queue] ──▶ writers ──▶ dst/
//!        │                          │
//!    headers/footers          pre/post hooks
//! ```
//!
//! The walk is single-threaded and deterministic: directories are visited in
//! lexical order and a directory's header/footer overrides are registered
//! before any file under it is converted. Writing is the only concurrent part.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`apply`] | Manifest runs: collect, then cleanup, copy and build across all sites |
//! | [`manifest`] | Manifest JSON decoding, including polymorphic copy/replace values |
//! | [`stage`] | `Stage` bitmask selecting which stages run |
//! | [`site`] | `Site`: the source walk, preferred HTML, `generate` |
//! | [`headers`] | Per-directory header/footer overrides with longest-prefix lookup |
//! | [`convert`] | Title extraction and Markdown → HTML page assembly |
//! | [`pipeline`] | `Pipeline` and `Hook` extension points |
//! | [`options`] | Per-site builder with at-most-one hooks checked at compile time |
//! | [`filter`] | `.marksiteignore` rules |
//! | [`writer`] | Bounded queue and writer pool persisting output records |
//! | [`metadata`] | `sitemap.xml` emission |
//! | [`index`] | `_index.marksite` directory listings |
//! | [`replace`] | `${{ key }}` substitution hook |
//! | [`types`] | `OutputRecord`, shared by the walk and the writers |
//! | [`output`] | CLI output formatting |
//!
//! # Library Use
//!
//! ```rust,no_run
//! use marksite::options::Options;
//! use marksite::site;
//!
//! let written = site::generate("content", "public", "My Site", "https://example.org",
//!     Options::new().writers(8))?;
//! println!("{} files", written.len());
//! # Ok::<(), marksite::site::GenerateError>(())
//! ```

pub mod apply;
pub mod convert;
pub mod filter;
pub mod headers;
pub mod index;
pub mod manifest;
pub mod metadata;
pub mod options;
pub mod output;
pub mod pipeline;
pub mod replace;
pub mod site;
pub mod stage;
pub mod types;
pub mod writer;

#[cfg(test)]
pub(crate) mod test_helpers;
