//! Manifest application.
//!
//! [`apply_manifest`] runs every site of a manifest through the enabled
//! stages, one site at a time in key order:
//!
//! ```text
//! Collect ──▶ for each site: Cleanup ──▶ Copy ──▶ Build
//! ```
//!
//! ## Collect
//!
//! Always runs, before anything is touched. Every copy target of every site
//! is recorded; a target claimed twice, within one site or across sites, fails
//! the whole call. Targets are compared after lexical normalization, so
//! `out/a`, `out/./a` and `out/a/` are the same target.
//!
//! ## Cleanup
//!
//! For sites with `"cleanup": true`, every collected target is removed
//! recursively. A target that is already gone is fine.
//!
//! ## Copy
//!
//! | Source | Target | Result |
//! |--------|--------|--------|
//! | directory | missing or directory | tree mirrored under target |
//! | directory | file | error (unless `force`) |
//! | file | existing directory | `target/<file name>` |
//! | file | missing, spelled with trailing `/` | directory created, then as above |
//! | file | anything else | `target` |
//!
//! Copied files keep their permission bits. Symlinked sources are refused and
//! symlinks inside a mirrored tree are skipped. `force` removes the resolved
//! target before copying.
//!
//! ## Build
//!
//! The site is generated with [`generate`], with the index generator installed
//! when `generate-index` is set and a [`Replacer`] pre-render hook when
//! `replaces` is non-empty.
//!
//! The first failure stops the run and is reported with its site key and stage.

use crate::index::IndexGenerator;
use crate::manifest::{CopyTarget, Manifest, SiteConfig};
use crate::options::Options;
use crate::replace::Replacer;
use crate::site::{GenerateError, generate};
use crate::stage::Stage;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::mpsc::Sender;
use thiserror::Error;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Progress reported while a manifest is applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyEvent {
    StageStarted { site: String, stage: Stage },
    Removed { site: String, path: PathBuf },
    Copied { site: String, from: PathBuf, to: PathBuf },
    Built { site: String, dest: PathBuf, written: usize },
}

#[derive(Error, Debug)]
pub enum StageError {
    #[error("Copy target {target} is already claimed by site {claimed_by:?}")]
    DuplicateTarget { target: PathBuf, claimed_by: String },
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Copy source path is empty")]
    EmptySource,
    #[error("Copy target for {0} is empty")]
    EmptyTarget(PathBuf),
    #[error("Refusing to copy symlink {0}")]
    Symlink(PathBuf),
    #[error("Cannot copy directory {src} onto file {target}")]
    DirOntoFile { src: PathBuf, target: PathBuf },
    #[error("Site has no source directory")]
    MissingSource,
    #[error("Site has no destination directory")]
    MissingDest,
    #[error(transparent)]
    Generate(#[from] GenerateError),
}

#[derive(Error, Debug)]
#[error("Site {site:?}, {stage} stage: {source}")]
pub struct ApplyError {
    pub site: String,
    pub stage: Stage,
    #[source]
    pub source: StageError,
}

fn at(site: &str, stage: Stage) -> impl FnOnce(StageError) -> ApplyError + '_ {
    move |source| ApplyError {
        site: site.to_string(),
        stage,
        source,
    }
}

fn io_error(path: &Path) -> impl FnOnce(io::Error) -> StageError + '_ {
    move |source| StageError::Io {
        path: path.to_path_buf(),
        source,
    }
}

struct Reporter(Option<Sender<ApplyEvent>>);

impl Reporter {
    fn send(&self, event: ApplyEvent) {
        if let Some(tx) = &self.0 {
            // The printer may have gone away; progress is best effort.
            let _ = tx.send(event);
        }
    }

    fn stage(&self, site: &str, stage: Stage) {
        info!(site, %stage, "stage started");
        self.send(ApplyEvent::StageStarted {
            site: site.to_string(),
            stage,
        });
    }
}

/// Run the enabled `stages` over every site in `manifest`.
///
/// Each stage finishes for all sites, in key order, before the next one
/// starts, so no site's cleanup or copy can land after another site's build.
///
/// Events are sent to `events` as work progresses; the sender is dropped when
/// the call returns.
pub fn apply_manifest(
    manifest: &Manifest,
    stages: Stage,
    events: Option<Sender<ApplyEvent>>,
) -> Result<(), ApplyError> {
    let reporter = Reporter(events);
    let targets = collect_targets(manifest)?;

    if stages.ok(Stage::CLEANUP) {
        for (key, site) in manifest.sites.iter().filter(|(_, site)| site.cleanup) {
            reporter.stage(key, Stage::CLEANUP);
            let site_targets = targets.get(key).map(Vec::as_slice).unwrap_or_default();
            cleanup(key, site_targets, &reporter).map_err(at(key, Stage::CLEANUP))?;
        }
    }
    if stages.ok(Stage::COPY) {
        for (key, site) in manifest.sites.iter().filter(|(_, site)| !site.copies.is_empty()) {
            reporter.stage(key, Stage::COPY);
            copy_site(key, site, &reporter).map_err(at(key, Stage::COPY))?;
        }
    }
    if stages.ok(Stage::BUILD) {
        for (key, site) in &manifest.sites {
            reporter.stage(key, Stage::BUILD);
            let written = build_site(site).map_err(at(key, Stage::BUILD))?;
            reporter.send(ApplyEvent::Built {
                site: key.clone(),
                dest: site.dest.clone(),
                written,
            });
        }
    }
    Ok(())
}

/// Every copy target per site key, rejecting targets claimed twice.
pub fn collect_targets(manifest: &Manifest) -> Result<BTreeMap<String, Vec<PathBuf>>, ApplyError> {
    let mut claimed: HashMap<PathBuf, &str> = HashMap::new();
    let mut targets: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();

    for (key, site) in &manifest.sites {
        let site_targets = targets.entry(key.clone()).or_default();
        for copy in site.copies.values().flatten() {
            let normalized = normalize(&copy.target);
            if let Some(owner) = claimed.insert(normalized, key.as_str()) {
                return Err(ApplyError {
                    site: key.clone(),
                    stage: Stage::COLLECT,
                    source: StageError::DuplicateTarget {
                        target: copy.target.clone(),
                        claimed_by: owner.to_string(),
                    },
                });
            }
            site_targets.push(copy.target.clone());
        }
    }
    Ok(targets)
}

/// Absolute, lexically normalized form of `path`. The filesystem is not consulted.
pub fn normalize(path: &Path) -> PathBuf {
    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    let mut out = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if matches!(out.components().next_back(), Some(Component::Normal(_))) {
                    out.pop();
                } else if out.as_os_str().is_empty() {
                    out.push(component);
                }
            }
            other => out.push(other),
        }
    }
    out
}

fn cleanup(site: &str, targets: &[PathBuf], reporter: &Reporter) -> Result<(), StageError> {
    for target in targets {
        if remove_path(target).map_err(io_error(target))? {
            debug!(path = %target.display(), "removed");
            reporter.send(ApplyEvent::Removed {
                site: site.to_string(),
                path: target.clone(),
            });
        }
    }
    Ok(())
}

/// Remove a file, symlink or directory tree. `Ok(false)` if nothing was there.
fn remove_path(path: &Path) -> io::Result<bool> {
    let removed = match fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(path),
        Ok(_) => fs::remove_file(path),
        Err(err) => Err(err),
    };
    match removed {
        Ok(()) => Ok(true),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(err) => Err(err),
    }
}

fn copy_site(key: &str, site: &SiteConfig, reporter: &Reporter) -> Result<(), StageError> {
    for (src, targets) in &site.copies {
        for target in targets {
            let to = copy_path(src, target)?;
            reporter.send(ApplyEvent::Copied {
                site: key.to_string(),
                from: src.clone(),
                to,
            });
        }
    }
    Ok(())
}

fn has_trailing_separator(path: &Path) -> bool {
    path.to_string_lossy()
        .chars()
        .next_back()
        .is_some_and(std::path::is_separator)
}

/// Copy `src` to `target`, returning where it landed.
pub fn copy_path(src: &Path, target: &CopyTarget) -> Result<PathBuf, StageError> {
    if src.as_os_str().is_empty() {
        return Err(StageError::EmptySource);
    }
    if target.target.as_os_str().is_empty() {
        return Err(StageError::EmptyTarget(src.to_path_buf()));
    }

    let src_meta = fs::symlink_metadata(src).map_err(io_error(src))?;
    if src_meta.file_type().is_symlink() {
        return Err(StageError::Symlink(src.to_path_buf()));
    }

    let mut dest = target.target.clone();
    if src_meta.is_dir() {
        if target.force {
            remove_path(&dest).map_err(io_error(&dest))?;
        }
        if fs::metadata(&dest).is_ok_and(|meta| !meta.is_dir()) {
            return Err(StageError::DirOntoFile {
                src: src.to_path_buf(),
                target: dest,
            });
        }
        mirror_dir(src, &dest)?;
        return Ok(dest);
    }

    if has_trailing_separator(&dest) && !dest.exists() {
        fs::create_dir_all(&dest).map_err(io_error(&dest))?;
    }
    if dest.is_dir()
        && let Some(name) = src.file_name()
    {
        dest.push(name);
    }
    if target.force {
        remove_path(&dest).map_err(io_error(&dest))?;
    }
    copy_file(src, &dest)?;
    Ok(dest)
}

fn copy_file(src: &Path, dest: &Path) -> Result<(), StageError> {
    if let Some(parent) = dest.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(io_error(parent))?;
    }
    // Replace rather than write through: the old copy may be read-only.
    if fs::symlink_metadata(dest).is_ok_and(|meta| !meta.is_dir()) {
        fs::remove_file(dest).map_err(io_error(dest))?;
    }
    fs::copy(src, dest).map_err(io_error(dest))?;
    debug!(from = %src.display(), to = %dest.display(), "copied");
    Ok(())
}

/// Mirror every file under `src` into `dest`, creating directories as needed.
fn mirror_dir(src: &Path, dest: &Path) -> Result<(), StageError> {
    fs::create_dir_all(dest).map_err(io_error(dest))?;
    for entry in WalkDir::new(src).follow_links(false).sort_by_file_name() {
        let entry = entry.map_err(|err| {
            let path = err.path().unwrap_or(src).to_path_buf();
            StageError::Io {
                path,
                source: err.into(),
            }
        })?;
        let Ok(rel) = entry.path().strip_prefix(src) else {
            continue;
        };
        let target = dest.join(rel);
        let file_type = entry.file_type();
        if file_type.is_symlink() {
            warn!(path = %entry.path().display(), "skipping symlink");
        } else if file_type.is_dir() {
            fs::create_dir_all(&target).map_err(io_error(&target))?;
        } else {
            copy_file(entry.path(), &target)?;
        }
    }
    Ok(())
}

/// Generate one site, returning the number of files written.
fn build_site(site: &SiteConfig) -> Result<usize, StageError> {
    if site.source.as_os_str().is_empty() {
        return Err(StageError::MissingSource);
    }
    if site.dest.as_os_str().is_empty() {
        return Err(StageError::MissingDest);
    }

    let options = Options::new();
    let options = if site.generate_index {
        options.pipeline(IndexGenerator::new(site.generate_index_mode))
    } else {
        options
    };

    let (src, dst, title, url) = (&site.source, &site.dest, &site.title, &site.url);
    let written = if site.replaces.is_empty() {
        generate(src, dst, title, url, options)?
    } else {
        let replacer = Replacer::new(site.replaces.clone());
        generate(src, dst, title, url, options.pre_render_hook(replacer))?
    };
    Ok(written.len())
}
