//! files
//!
//! Loading and saving the daemon's files.
//!
//! # Loading
//!
//! A [`SourceFile`] ties a path to its dialect. Loading reads the file,
//! scans it, assembles records through the registry and stamps each one
//! with provenance: the path, the block's position within the file, and the
//! load timestamp the staleness detector compares against. A malformed file
//! aborts its own load entirely — the caller's collections are untouched.
//!
//! # Saving
//!
//! [`save_records`] renders records in the order given and writes them
//! back. When a file already exists at the destination and backups are
//! enabled, its full previous contents are copied to a timestamp-suffixed
//! sibling *before* the destination is truncated; a failed backup aborts
//! the save. There is no protection against another process writing the
//! same file between staleness check and save — detection is advisory.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use log::{debug, info};
use thiserror::Error;

use crate::core::collection::Batch;
use crate::core::record::{Record, SourceInfo};
use crate::core::registry::Registry;
use crate::parse::{self, ParseError};

/// Errors from file operations.
#[derive(Debug, Error)]
pub enum FileError {
    #[error("failed to read '{path}': {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write '{path}': {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to back up '{path}' to '{backup}': {source}")]
    Backup {
        path: PathBuf,
        backup: PathBuf,
        source: std::io::Error,
    },

    #[error(transparent)]
    Parse(#[from] ParseError),
}

impl FileError {
    fn read(path: &Path, source: std::io::Error) -> Self {
        Self::Read {
            path: path.to_path_buf(),
            source,
        }
    }

    fn write(path: &Path, source: std::io::Error) -> Self {
        Self::Write {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Which dialect a file uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    /// `define <kind> { ... }` object definitions.
    Objects,
    /// `<kind> { name = value }` status blocks.
    Status,
    /// Top-level `name=value` main configuration.
    MainConfig,
}

/// A path plus the dialect to read it with.
#[derive(Debug, Clone)]
pub struct SourceFile {
    path: PathBuf,
    format: FileFormat,
}

impl SourceFile {
    /// An object-definition file.
    pub fn objects(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            format: FileFormat::Objects,
        }
    }

    /// A status file.
    pub fn status(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            format: FileFormat::Status,
        }
    }

    /// The main configuration file.
    pub fn main_config(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            format: FileFormat::MainConfig,
        }
    }

    /// The file's path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read, scan and assemble the file into provenance-stamped records.
    ///
    /// Syntax errors come back annotated with this file's path.
    pub fn load(&self, registry: &Registry) -> Result<Batch, FileError> {
        let text = fs::read_to_string(&self.path).map_err(|e| FileError::read(&self.path, e))?;
        let batch = match self.format {
            FileFormat::Objects => parse::parse_objects(registry, &text),
            FileFormat::Status => parse::parse_status(registry, &text),
            FileFormat::MainConfig => parse::parse_main_config(registry, &text),
        }
        .map_err(|e| e.with_path(&self.path))?;

        let stamped: Batch = batch
            .into_iter()
            .enumerate()
            .map(|(position, mut record)| {
                record.set_source(Some(SourceInfo::new(&self.path, Some(position))));
                record
            })
            .collect();
        debug!(
            "loaded {} records from {}",
            stamped.len(),
            self.path.display()
        );
        Ok(stamped)
    }
}

/// Render `records` in the order given and write them to `path`.
///
/// With `keep_backup`, a pre-existing destination is first copied whole to
/// a timestamp-suffixed backup path; if that copy fails the destination is
/// left untouched.
pub fn save_records(
    path: &Path,
    records: &[&Record],
    keep_backup: bool,
) -> Result<(), FileError> {
    let mut content = String::new();
    for record in records {
        content.push_str(&record.render());
    }

    if keep_backup && path.exists() {
        let backup = backup_path(path, Local::now());
        fs::copy(path, &backup).map_err(|e| FileError::Backup {
            path: path.to_path_buf(),
            backup: backup.clone(),
            source: e,
        })?;
        info!("backed up {} to {}", path.display(), backup.display());
    }

    {
        let mut file = File::create(path).map_err(|e| FileError::write(path, e))?;
        file.write_all(content.as_bytes())
            .map_err(|e| FileError::write(path, e))?;
        file.sync_all().map_err(|e| FileError::write(path, e))?;
    }
    info!("wrote {} records to {}", records.len(), path.display());
    Ok(())
}

/// `<path>.bkp.<YYYYmmddHHMMSS>.<micros>` next to the original.
fn backup_path(path: &Path, at: DateTime<Local>) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(format!(
        ".bkp.{}.{:06}",
        at.format("%Y%m%d%H%M%S"),
        at.timestamp_subsec_micros()
    ));
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::registry::ROOT_KIND;
    use tempfile::TempDir;

    const HOSTS: &str = "\
define host {
\thost_name\t\tweb01
\taddress\t\t10.0.0.1
\t}
";

    #[test]
    fn load_stamps_provenance_in_order() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("hosts.cfg");
        fs::write(&path, HOSTS).unwrap();

        let registry = Registry::builtin();
        let batch = SourceFile::objects(&path).load(&registry).unwrap();
        for (i, record) in batch.iter().enumerate() {
            let source = record.source().unwrap();
            assert_eq!(source.file, path);
            assert_eq!(source.position, Some(i));
        }
    }

    #[test]
    fn load_syntax_error_names_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("bad.cfg");
        fs::write(&path, "not an object file\n").unwrap();

        let registry = Registry::builtin();
        let err = SourceFile::objects(&path).load(&registry).unwrap_err();
        assert!(err.to_string().contains("bad.cfg"));
    }

    #[test]
    fn load_missing_file_is_a_read_error() {
        let registry = Registry::builtin();
        let err = SourceFile::status("/nonexistent/status.dat")
            .load(&registry)
            .unwrap_err();
        assert!(matches!(err, FileError::Read { .. }));
    }

    #[test]
    fn main_config_load_yields_root() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nagios.cfg");
        fs::write(&path, "cfg_file=hosts.cfg\n").unwrap();

        let registry = Registry::builtin();
        let batch = SourceFile::main_config(&path).load(&registry).unwrap();
        assert_eq!(batch.iter().next().unwrap().kind(), ROOT_KIND);
    }

    #[test]
    fn save_writes_backup_before_overwriting() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("hosts.cfg");
        fs::write(&path, HOSTS).unwrap();

        let registry = Registry::builtin();
        let batch = SourceFile::objects(&path).load(&registry).unwrap();
        let records: Vec<&Record> = batch.iter().collect();
        save_records(&path, &records, true).unwrap();

        // Destination round-tripped.
        assert_eq!(fs::read_to_string(&path).unwrap(), HOSTS);

        // Exactly one backup with the previous contents.
        let backups: Vec<PathBuf> = fs::read_dir(temp.path())
            .unwrap()
            .filter_map(|e| e.ok().map(|e| e.path()))
            .filter(|p| p.file_name().unwrap().to_string_lossy().contains(".bkp."))
            .collect();
        assert_eq!(backups.len(), 1);
        assert_eq!(fs::read_to_string(&backups[0]).unwrap(), HOSTS);
    }

    #[test]
    fn save_without_backup_leaves_no_sibling() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("hosts.cfg");
        fs::write(&path, HOSTS).unwrap();

        let registry = Registry::builtin();
        let batch = SourceFile::objects(&path).load(&registry).unwrap();
        let records: Vec<&Record> = batch.iter().collect();
        save_records(&path, &records, false).unwrap();

        let count = fs::read_dir(temp.path()).unwrap().count();
        assert_eq!(count, 1);
    }

    #[test]
    fn backup_path_shape() {
        let at = Local::now();
        let p = backup_path(Path::new("/etc/nagios/hosts.cfg"), at);
        let name = p.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("hosts.cfg.bkp."));
        // date stamp plus microseconds suffix
        let suffix = name.trim_start_matches("hosts.cfg.bkp.");
        let (stamp, micros) = suffix.split_once('.').unwrap();
        assert_eq!(stamp.len(), 14);
        assert_eq!(micros.len(), 6);
    }
}
