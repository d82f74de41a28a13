//! Site metadata written after a successful build.
//!
//! When a site has a base URL, `sitemap.xml` is written into the destination
//! root. It lists every generated or copied `.html` page, sorted by location,
//! with the source tree's modification date as `lastmod`:
//!
//! ```xml
//! <?xml version="1.0" encoding="UTF-8"?>
//! <urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
//! <url><loc>https://example.org/blog/post.html</loc><lastmod>2024-05-01</lastmod></url>
//! </urlset>
//! ```
//!
//! Sites without a base URL get no sitemap.

use chrono::{DateTime, Utc};
use maud::html;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use thiserror::Error;
use tracing::debug;

pub const SITEMAP_FILE: &str = "sitemap.xml";

#[derive(Error, Debug)]
pub enum MetadataError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Write `<dst>/sitemap.xml` for the `written` paths. Returns the sitemap path,
/// or `None` when `url` is empty.
pub fn emit(
    url: &str,
    dst: &Path,
    written: &[PathBuf],
    modified: SystemTime,
) -> Result<Option<PathBuf>, MetadataError> {
    if url.trim().is_empty() {
        return Ok(None);
    }

    let lastmod = DateTime::<Utc>::from(modified).format("%Y-%m-%d").to_string();
    let sitemap = format_sitemap(url, &page_locations(dst, written), &lastmod);
    let path = dst.join(SITEMAP_FILE);
    fs::write(&path, sitemap).map_err(|source| MetadataError::Io {
        path: path.clone(),
        source,
    })?;
    debug!(path = %path.display(), "wrote sitemap");
    Ok(Some(path))
}

/// Destination-relative `.html` paths with forward slashes, sorted.
pub fn page_locations(dst: &Path, written: &[PathBuf]) -> Vec<String> {
    let mut pages: Vec<String> = written
        .iter()
        .filter(|path| {
            path.extension()
                .is_some_and(|e| e.eq_ignore_ascii_case("html"))
        })
        .filter_map(|path| path.strip_prefix(dst).ok())
        .map(|rel| {
            rel.components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/")
        })
        .collect();
    pages.sort();
    pages
}

pub fn format_sitemap(url: &str, pages: &[String], lastmod: &str) -> String {
    let base = url.trim().trim_end_matches('/');
    let mut out = String::from(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
         <urlset xmlns=\"http://www.sitemaps.org/schemas/sitemap/0.9\">\n",
    );
    for page in pages {
        let loc = format!("{base}/{page}");
        let entry = html! {
            url { loc { (loc) } lastmod { (lastmod) } }
        };
        out.push_str(&entry.into_string());
        out.push('\n');
    }
    out.push_str("</urlset>\n");
    out
}
