//! reconcile
//!
//! Staleness detection and reload watching.
//!
//! # Overview
//!
//! Reconciliation proper — adopting freshly parsed records into a live
//! collection — is [`Collection::merge`](crate::core::collection::Collection::merge).
//! This module supplies the detection side: which files need re-parsing,
//! and whether the daemon logged a reload.
//!
//! Detection is advisory and purely modification-time based. A file can
//! change between a staleness check and a save; that window is accepted,
//! not closed (there is exactly one writer *inside* the process, and no
//! locking against writers outside it).
//!
//! # Log watching
//!
//! [`LogWatcher`] tails the daemon log incrementally from a remembered byte
//! offset, scanning new entries for two sentinel messages: the graceful
//! reparse signal and the process start banner. The sentinel texts are
//! configuration-level constants, overridable per watcher.

use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use log::{debug, warn};
use thiserror::Error;

use crate::core::collection::Collection;
use crate::core::types::ObjectId;
use crate::parse::log::LogLine;

/// Log message the daemon writes when told to re-read its configuration.
pub const RESTART_SENTINEL: &str = "Caught SIGHUP, restarting...";

/// Log message fragment the daemon writes when it starts.
pub const STARTUP_SENTINEL: &str = " starting... (PID=";

/// Errors from log watching.
#[derive(Debug, Error)]
pub enum WatchError {
    #[error("failed to read log '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Files whose on-disk state is newer than what the collection holds.
///
/// A file is outdated when its modification time is later than the earliest
/// load timestamp among the collection's records from that file, or when it
/// has disappeared or become unreadable since loading.
pub fn outdated_files(collection: &Collection) -> BTreeSet<PathBuf> {
    let mut outdated = BTreeSet::new();
    for file in collection.files() {
        let Some(loaded_at) = collection.earliest_load(file) else {
            continue;
        };
        match modification_time(file) {
            Some(mtime) if mtime <= loaded_at => {}
            Some(_) => {
                debug!("{} changed on disk since load", file.display());
                outdated.insert(file.to_path_buf());
            }
            None => {
                warn!("{} missing or unreadable since load", file.display());
                outdated.insert(file.to_path_buf());
            }
        }
    }
    outdated
}

/// Declared configuration files not yet represented in the collection.
///
/// `files` are explicit entries from the main configuration; `dirs` are
/// scanned for `*.cfg` entries. Either may name files that appeared after
/// the last load. Unreadable directories are skipped with a warning.
pub fn undiscovered_files<'a>(
    collection: &Collection,
    files: impl IntoIterator<Item = &'a Path>,
    dirs: impl IntoIterator<Item = &'a Path>,
) -> BTreeSet<PathBuf> {
    let known: BTreeSet<&Path> = collection.files().collect();
    let mut missing = BTreeSet::new();
    for file in files {
        if !known.contains(file) {
            missing.insert(file.to_path_buf());
        }
    }
    for dir in dirs {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("cannot scan {}: {}", dir.display(), e);
                continue;
            }
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().is_some_and(|e| e == "cfg")
                && !known.contains(path.as_path())
            {
                missing.insert(path);
            }
        }
    }
    missing
}

/// Drop parsed records that key-based reconciliation cannot match.
///
/// Records with anonymous ids — verbatim formatting blocks, kinds without a
/// primary key — have no key for [`Collection::merge`] to pair them by, so
/// re-parsing a file would accumulate one copy per reload. Before merging a
/// re-parse of `files`, the previously parsed anonymous records of those
/// files are removed; the fresh parse supersedes them. Locally created
/// records are recognisable by their missing block position and survive.
///
/// Returns the number of records dropped.
pub fn prune_unkeyed<'a>(
    collection: &mut Collection,
    files: impl IntoIterator<Item = &'a Path>,
) -> usize {
    let files: BTreeSet<&Path> = files.into_iter().collect();
    let doomed: Vec<ObjectId> = collection
        .iter()
        .filter(|r| !r.id().is_keyed())
        .filter(|r| {
            r.source()
                .map_or(false, |s| s.position.is_some() && files.contains(s.file.as_path()))
        })
        .map(|r| r.id().clone())
        .collect();
    for id in &doomed {
        collection.remove(id);
    }
    doomed.len()
}

/// True if `path` was modified after `loaded_at`, or is gone.
pub fn file_outdated(path: &Path, loaded_at: DateTime<Utc>) -> bool {
    match modification_time(path) {
        Some(mtime) => mtime > loaded_at,
        None => true,
    }
}

fn modification_time(path: &Path) -> Option<DateTime<Utc>> {
    fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .map(DateTime::from)
}

/// Incremental tail over the daemon's append-only log.
#[derive(Debug)]
pub struct LogWatcher {
    path: PathBuf,
    offset: u64,
    sentinels: Vec<String>,
}

impl LogWatcher {
    /// Watch `path` with the default sentinel pair.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            offset: 0,
            sentinels: vec![RESTART_SENTINEL.to_string(), STARTUP_SENTINEL.to_string()],
        }
    }

    /// Replace the sentinel patterns (matched as substrings).
    pub fn with_sentinels<I, S>(mut self, sentinels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sentinels = sentinels.into_iter().map(Into::into).collect();
        self
    }

    /// The watched path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The remembered byte offset.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Scan log entries appended since the last call for sentinels.
    ///
    /// Returns the timestamp of the newest sentinel entry at or after
    /// `since`, or `None`. Only complete lines are consumed; a partially
    /// written final line is left for the next call. A log that shrank
    /// (rotation, truncation) is rescanned from the start.
    pub fn reload_detected(
        &mut self,
        since: DateTime<Utc>,
    ) -> Result<Option<DateTime<Utc>>, WatchError> {
        let len = fs::metadata(&self.path).map_err(|e| self.io_err(e))?.len();
        if len < self.offset {
            debug!("{} shrank; rescanning from start", self.path.display());
            self.offset = 0;
        }

        let mut file = File::open(&self.path).map_err(|e| self.io_err(e))?;
        file.seek(SeekFrom::Start(self.offset))
            .map_err(|e| self.io_err(e))?;
        let mut buf = String::new();
        file.read_to_string(&mut buf).map_err(|e| self.io_err(e))?;

        let complete = buf.rfind('\n').map(|i| i + 1).unwrap_or(0);
        self.offset += complete as u64;

        let mut newest: Option<DateTime<Utc>> = None;
        for line in buf[..complete].lines() {
            let Some(entry) = LogLine::parse(line) else {
                continue;
            };
            if !self.sentinels.iter().any(|s| entry.message.contains(s)) {
                continue;
            }
            if let Some(time) = entry.time() {
                if time >= since && newest.map_or(true, |prev| time >= prev) {
                    newest = Some(time);
                }
            }
        }
        Ok(newest)
    }

    fn io_err(&self, source: std::io::Error) -> WatchError {
        WatchError::Io {
            path: self.path.clone(),
            source,
        }
    }
}
