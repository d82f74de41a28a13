//! Concurrent persistence of output records.
//!
//! The walk runs on its own thread and pushes [`OutputRecord`]s into a bounded
//! queue (capacity `2 × writers`). A fixed pool of `writers` workers drains the
//! queue, creating parent directories on demand and writing each file with its
//! permission bits.
//!
//! ```text
//!  walk thread ──▶ [ bounded queue ] ──▶ writer 0 ─┐
//!                                    ├─▶ writer 1 ─┼─▶ written paths
//!                                    └─▶ writer N ─┘
//!                                             │ failures
//!                                             ▼
//!                                         collector
//! ```
//!
//! ## Failure handling
//!
//! A failed write does not stop the other writers: every failure is sent to
//! an unbounded sink and collected. When the walk stops early (an error in the
//! source tree or a pipeline), the queue is closed and the records already
//! queued are still written. The call fails if either side failed, and
//! reports both when both did.
//!
//! ## Concurrency
//!
//! The writer count comes from [`Options::writers`](crate::options::Options::writers).
//! When that is `0`, `MARKSITE_WRITERS` is consulted; unset, zero, or
//! non-numeric values fall back to [`DEFAULT_WRITERS`]. Either source is
//! capped at [`MAX_WRITERS`], which also bounds the queue. The order of the
//! returned paths is not meaningful.

use crate::site::WalkError;
use crate::types::OutputRecord;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Mutex, PoisonError};
use std::thread;
use thiserror::Error;
use tracing::debug;

pub const DEFAULT_WRITERS: usize = 20;
pub const MAX_WRITERS: usize = 256;
pub const WRITERS_ENV: &str = "MARKSITE_WRITERS";

#[derive(Error, Debug)]
#[error("Failed to write {path}: {source}")]
pub struct FileWriteError {
    pub path: PathBuf,
    #[source]
    pub source: io::Error,
}

#[derive(Error, Debug)]
pub enum WriteError {
    #[error("Walk failed: {0}")]
    Walk(#[source] WalkError),
    #[error("{} file(s) failed to write: {}", .0.len(), join(.0))]
    Writes(Vec<FileWriteError>),
    #[error(
        "Walk failed: {walk}; {} file(s) also failed to write: {}",
        .writes.len(),
        join(.writes)
    )]
    Both {
        #[source]
        walk: WalkError,
        writes: Vec<FileWriteError>,
    },
    #[error("Failed to start writer pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}

impl WriteError {
    /// Every per-file failure, empty for walk-only errors.
    pub fn failures(&self) -> &[FileWriteError] {
        match self {
            WriteError::Writes(writes) | WriteError::Both { writes, .. } => writes,
            WriteError::Walk(_) | WriteError::Pool(_) => &[],
        }
    }

    pub fn walk_error(&self) -> Option<&WalkError> {
        match self {
            WriteError::Walk(walk) | WriteError::Both { walk, .. } => Some(walk),
            WriteError::Writes(_) | WriteError::Pool(_) => None,
        }
    }
}

fn join(errors: &[FileWriteError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Resolve the writer count from a configured value and an environment value.
pub fn writers_from(configured: usize, env: Option<&str>) -> usize {
    if configured > 0 {
        return configured.min(MAX_WRITERS);
    }
    env.and_then(|value| value.trim().parse::<usize>().ok())
        .filter(|&n| n > 0)
        .map_or(DEFAULT_WRITERS, |n| n.min(MAX_WRITERS))
}

/// [`writers_from`] with the value of `MARKSITE_WRITERS`.
pub fn effective_writers(configured: usize) -> usize {
    writers_from(configured, std::env::var(WRITERS_ENV).ok().as_deref())
}

/// Run `produce` on its own thread and persist everything it emits.
///
/// `produce` receives an emit callback; it returns `Err(WalkError::QueueClosed)`
/// only if every writer has gone away. Returns the written target paths.
pub fn write_records<P>(writers: usize, produce: P) -> Result<Vec<PathBuf>, WriteError>
where
    P: FnOnce(&mut dyn FnMut(OutputRecord) -> Result<(), WalkError>) -> Result<(), WalkError>
        + Send,
{
    let writers = effective_writers(writers);
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(writers)
        .thread_name(|i| format!("marksite-writer-{i}"))
        .build()?;

    let (queue_tx, queue_rx) = mpsc::sync_channel::<OutputRecord>(writers * 2);
    let (failure_tx, failure_rx) = mpsc::channel::<FileWriteError>();
    let queue = Mutex::new(queue_rx);
    let written = Mutex::new(Vec::new());

    let (walk, failures) = thread::scope(|scope| {
        let collector = scope.spawn(move || failure_rx.into_iter().collect::<Vec<_>>());
        let producer = scope.spawn(move || {
            let mut emit = |record: OutputRecord| {
                queue_tx.send(record).map_err(|_| WalkError::QueueClosed)
            };
            produce(&mut emit)
            // `queue_tx` drops here, closing the queue for the writers.
        });

        pool.scope(|s| {
            for _ in 0..writers {
                let failures = failure_tx.clone();
                let (queue, written) = (&queue, &written);
                s.spawn(move |_| drain(queue, written, failures));
            }
        });
        drop(failure_tx);

        let walk = producer
            .join()
            .unwrap_or_else(|panic| std::panic::resume_unwind(panic));
        let failures = collector
            .join()
            .unwrap_or_else(|panic| std::panic::resume_unwind(panic));
        (walk, failures)
    });

    match (walk, failures.is_empty()) {
        (Ok(()), true) => Ok(written.into_inner().unwrap_or_else(PoisonError::into_inner)),
        (Ok(()), false) => Err(WriteError::Writes(failures)),
        (Err(walk), true) => Err(WriteError::Walk(walk)),
        (Err(walk), false) => Err(WriteError::Both {
            walk,
            writes: failures,
        }),
    }
}

fn drain(
    queue: &Mutex<Receiver<OutputRecord>>,
    written: &Mutex<Vec<PathBuf>>,
    failures: Sender<FileWriteError>,
) {
    loop {
        let next = queue.lock().unwrap_or_else(PoisonError::into_inner).recv();
        let Ok(record) = next else {
            return;
        };
        match persist(&record) {
            Ok(()) => {
                debug!(target = %record.target.display(), bytes = record.data.len(), "wrote");
                written
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(record.target);
            }
            Err(err) => {
                debug!(error = %err, "write failed");
                let _ = failures.send(err);
            }
        }
    }
}

/// Write one record: create its parent directories, replace any existing
/// file at the target, and apply the record's permission bits.
pub fn persist(record: &OutputRecord) -> Result<(), FileWriteError> {
    let fail = |source: io::Error| FileWriteError {
        path: record.target.clone(),
        source,
    };

    if let Some(parent) = record.target.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(fail)?;
    }
    // A previous run may have left a read-only copy behind.
    match fs::symlink_metadata(&record.target) {
        Ok(meta) if !meta.is_dir() => fs::remove_file(&record.target).map_err(fail)?,
        _ => {}
    }
    fs::write(&record.target, &record.data).map_err(fail)?;
    set_mode(&record.target, record.effective_mode()).map_err(fail)
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode & 0o7777))
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) -> io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use tempfile::TempDir;

    fn records(root: &Path, n: usize) -> Vec<OutputRecord> {
        (0..n)
            .map(|i| {
                OutputRecord::synthetic(
                    root.join(format!("dir{}/file{i}.txt", i % 3)),
                    format!("content {i}"),
                )
            })
            .collect()
    }

    fn emit_all(
        records: Vec<OutputRecord>,
    ) -> impl FnOnce(&mut dyn FnMut(OutputRecord) -> Result<(), WalkError>) -> Result<(), WalkError>
    + Send {
        move |emit| {
            for record in records {
                emit(record)?;
            }
            Ok(())
        }
    }

    #[test]
    fn writers_from_prefers_configured_value() {
        assert_eq!(writers_from(4, Some("9")), 4);
    }

    #[test]
    fn writers_from_env_value() {
        assert_eq!(writers_from(0, Some("9")), 9);
        assert_eq!(writers_from(0, Some(" 12 ")), 12);
    }

    #[test]
    fn writers_from_caps_large_values() {
        assert_eq!(writers_from(0, Some("1000000")), MAX_WRITERS);
        assert_eq!(writers_from(10_000, None), MAX_WRITERS);
        assert_eq!(writers_from(0, Some("256")), 256);
    }

    #[test]
    fn writers_from_falls_back_to_default() {
        assert_eq!(writers_from(0, None), DEFAULT_WRITERS);
        assert_eq!(writers_from(0, Some("0")), DEFAULT_WRITERS);
        assert_eq!(writers_from(0, Some("many")), DEFAULT_WRITERS);
        assert_eq!(writers_from(0, Some("-3")), DEFAULT_WRITERS);
    }

    #[test]
    fn same_result_for_any_writer_count() {
        const N: usize = 17;
        for writers in [1, 3, N, 2 * N] {
            let tmp = TempDir::new().unwrap();
            let input = records(tmp.path(), N);
            let expected: BTreeSet<PathBuf> = input.iter().map(|r| r.target.clone()).collect();

            let written = write_records(writers, emit_all(input)).unwrap();

            assert_eq!(written.len(), N, "writers = {writers}");
            let written: BTreeSet<PathBuf> = written.into_iter().collect();
            assert_eq!(written, expected, "writers = {writers}");
            for path in &written {
                let name = path.file_stem().unwrap().to_string_lossy();
                let i = name.trim_start_matches("file");
                assert_eq!(fs::read_to_string(path).unwrap(), format!("content {i}"));
            }
        }
    }

    #[test]
    fn empty_stream_writes_nothing() {
        let written = write_records(2, emit_all(Vec::new())).unwrap();
        assert!(written.is_empty());
    }

    #[test]
    fn failures_are_collected_without_stopping_other_writes() {
        let tmp = TempDir::new().unwrap();
        // A regular file where a directory is needed.
        fs::write(tmp.path().join("blocker"), "file").unwrap();

        let mut input = records(tmp.path(), 5);
        input.push(OutputRecord::synthetic(tmp.path().join("blocker/a.txt"), "x"));
        input.push(OutputRecord::synthetic(tmp.path().join("blocker/b.txt"), "y"));

        for writers in [1, 3] {
            let err = write_records(writers, emit_all(input.clone())).unwrap_err();
            assert!(matches!(err, WriteError::Writes(_)), "{err}");
            let failed: BTreeSet<&Path> = err.failures().iter().map(|f| f.path.as_path()).collect();
            assert_eq!(
                failed,
                BTreeSet::from([
                    tmp.path().join("blocker/a.txt").as_path(),
                    tmp.path().join("blocker/b.txt").as_path()
                ])
            );
            assert!(err.to_string().starts_with("2 file(s) failed to write"));
            for record in &input[..5] {
                assert!(record.target.exists());
            }
        }
    }

    #[test]
    fn walk_error_still_drains_queued_records() {
        let tmp = TempDir::new().unwrap();
        let input = records(tmp.path(), 4);
        let targets: Vec<PathBuf> = input.iter().map(|r| r.target.clone()).collect();

        let err = write_records(2, move |emit| {
            for record in input {
                emit(record)?;
            }
            Err(WalkError::OutsideSource(PathBuf::from("/elsewhere")))
        })
        .unwrap_err();

        assert!(matches!(err, WriteError::Walk(WalkError::OutsideSource(_))));
        assert!(err.failures().is_empty());
        for target in targets {
            assert!(target.exists(), "{} not written", target.display());
        }
    }

    #[test]
    fn walk_and_write_failures_are_combined() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("blocker"), "file").unwrap();
        let bad = OutputRecord::synthetic(tmp.path().join("blocker/x.txt"), "x");

        let err = write_records(1, move |emit| {
            emit(bad)?;
            Err(WalkError::QueueClosed)
        })
        .unwrap_err();

        match &err {
            WriteError::Both { walk, writes } => {
                assert!(matches!(walk, WalkError::QueueClosed));
                assert_eq!(writes.len(), 1);
            }
            other => panic!("unexpected: {other}"),
        }
        assert!(err.walk_error().is_some());
        assert!(err.to_string().contains("1 file(s) also failed to write"));
    }

    #[test]
    fn overwrites_existing_files() {
        let tmp = TempDir::new().unwrap();
        let target = tmp.path().join("page.html");
        fs::write(&target, "old").unwrap();

        persist(&OutputRecord::synthetic(&target, "new")).unwrap();
        assert_eq!(fs::read_to_string(&target).unwrap(), "new");
    }

    #[cfg(unix)]
    #[test]
    fn permission_bits_applied() {
        use std::os::unix::fs::PermissionsExt;
        let tmp = TempDir::new().unwrap();

        let mut script = OutputRecord::synthetic(tmp.path().join("bin/run.sh"), "#!/bin/sh\n");
        script.mode = 0o755;
        let plain = OutputRecord::synthetic(tmp.path().join("plain.txt"), "text");

        write_records(2, emit_all(vec![script.clone(), plain.clone()])).unwrap();

        let mode = |p: &Path| fs::metadata(p).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode(&script.target), 0o755);
        assert_eq!(mode(&plain.target), crate::types::DEFAULT_MODE);
    }

    #[cfg(unix)]
    #[test]
    fn read_only_output_is_replaced_on_rebuild() {
        let tmp = TempDir::new().unwrap();
        let mut record = OutputRecord::synthetic(tmp.path().join("ro.txt"), "v1");
        record.mode = 0o444;
        persist(&record).unwrap();

        record.data = b"v2".to_vec();
        persist(&record).unwrap();
        assert_eq!(fs::read_to_string(&record.target).unwrap(), "v2");
    }
}
