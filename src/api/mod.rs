//! api
//!
//! The front door: configuration and status under one handle.
//!
//! # Architecture
//!
//! [`NagData`] owns two collections — objects loaded through the main
//! configuration's `cfg_file`/`cfg_dir` scope, and status blocks from the
//! status file — plus the registry handle, the configured paths, and the
//! log watcher used for reload detection. It is assembled with
//! [`NagData::builder`] and offers:
//!
//! - single-record queries (`get` / `get_or_none`) and multi-record
//!   filtering across both collections;
//! - creation and routing of new records into the right collection;
//! - mutation routed through the owning collection's transactional `set`;
//! - saving a record's file with scope enforcement and backups;
//! - reload operations that re-parse and reconcile via
//!   [`Collection::merge`], with observer callbacks around each update;
//! - the staleness surface: `config_outdated`, `status_outdated`,
//!   `reload_detected`.
//!
//! [`SimpleQuery`] is a separate convenience layer borrowing the facade,
//! with lookups by the fields people actually know (host names, service
//! descriptions, group names, comment authors).

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ::log::{info, warn};
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::core::collection::{Collection, CollectionError, MergeReport};
use crate::core::record::{Record, SourceInfo};
use crate::core::registry::{Registry, ROOT_KIND};
use crate::core::schema::Syntax;
use crate::core::types::{ListValue, ObjectId, Value};
use crate::files::{save_records, FileError, SourceFile};
use crate::parse::ParseError;
use crate::reconcile::{self, LogWatcher, WatchError};

/// Conventional location of the main configuration file.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/nagios/nagios.cfg";

/// Conventional location of the status file, used when neither the builder
/// nor the main configuration names one.
pub const DEFAULT_STATUS_PATH: &str = "/var/log/nagios/status.dat";

/// Errors from the facade.
#[derive(Debug, Error)]
pub enum ApiError {
    /// A single-record query matched nothing.
    #[error("'{kind}' ({criteria}) not found")]
    NotFound { kind: String, criteria: String },

    /// A single-record query matched more than one record.
    #[error("too many '{kind}' records match ({criteria})")]
    TooMany { kind: String, criteria: String },

    /// The registry does not know this kind.
    #[error("record kind '{kind}' is not registered")]
    UnknownKind { kind: String },

    /// A save destination outside the configured scope.
    #[error("file '{path}' is not under a configured cfg_dir and is not a configured cfg_file")]
    PathNotConfigured { path: PathBuf },

    /// A save with no destination: the record was never loaded from a file
    /// and no explicit path was given.
    #[error("record {id} has no destination file and none was given")]
    NoDestination { id: ObjectId },

    #[error(transparent)]
    Collection(#[from] CollectionError),

    #[error(transparent)]
    File(#[from] FileError),

    #[error(transparent)]
    Watch(#[from] WatchError),
}

impl From<ParseError> for ApiError {
    fn from(e: ParseError) -> Self {
        Self::File(FileError::Parse(e))
    }
}

/// Callbacks invoked around reconciliation.
///
/// Register with [`NagData::register_observer`]. All methods default to
/// no-ops; implement only what you need.
pub trait ReloadObserver {
    /// Called before freshly parsed configuration is merged in.
    fn before_config_update(&mut self, _current: &Collection, _incoming: &Collection) {}

    /// Called after a configuration merge with its outcome.
    fn after_config_update(&mut self, _report: &MergeReport) {}

    /// Called before freshly parsed status is merged in.
    fn before_status_update(&mut self, _current: &Collection, _incoming: &Collection) {}

    /// Called after a status merge with its outcome.
    fn after_status_update(&mut self, _report: &MergeReport) {}
}

/// Builder for [`NagData`].
pub struct NagDataBuilder {
    config_path: PathBuf,
    status_path: Option<PathBuf>,
    registry: Option<Arc<Registry>>,
    keep_backup: bool,
}

impl NagDataBuilder {
    /// Override the status file path (otherwise the main configuration's
    /// `status_file` directive decides, falling back to the default).
    pub fn status_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.status_path = Some(path.into());
        self
    }

    /// Use a custom registry instead of the built-in kind set.
    pub fn registry(mut self, registry: Arc<Registry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Whether saves copy the previous file contents to a backup first.
    /// Defaults to `true`.
    pub fn keep_backup(mut self, keep: bool) -> Self {
        self.keep_backup = keep;
        self
    }

    /// Load the configuration scope and the status file.
    pub fn load(self) -> Result<NagData, ApiError> {
        let registry = self
            .registry
            .unwrap_or_else(|| Arc::new(Registry::builtin()));

        let (config, root_id) = load_config_collection(&registry, &self.config_path)?;

        let status_path = self
            .status_path
            .or_else(|| {
                config
                    .get(&root_id)
                    .and_then(|root| root.get("status_file"))
                    .map(|v| PathBuf::from(v.render()))
            })
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STATUS_PATH));

        let mut status = Collection::new();
        status.extend(SourceFile::status(&status_path).load(&registry)?)?;

        let log_watcher = config
            .get(&root_id)
            .and_then(|root| root.get("log_file"))
            .map(|v| LogWatcher::new(PathBuf::from(v.render())));

        info!(
            "loaded {} config and {} status records",
            config.len(),
            status.len()
        );
        Ok(NagData {
            registry,
            config_path: self.config_path,
            status_path,
            keep_backup: self.keep_backup,
            config,
            status,
            root_id,
            observers: Vec::new(),
            log_watcher,
        })
    }
}

/// Configuration and status objects under one handle.
pub struct NagData {
    registry: Arc<Registry>,
    config_path: PathBuf,
    status_path: PathBuf,
    keep_backup: bool,
    config: Collection,
    status: Collection,
    root_id: ObjectId,
    observers: Vec<Box<dyn ReloadObserver>>,
    log_watcher: Option<LogWatcher>,
}

impl std::fmt::Debug for NagData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NagData")
            .field("registry", &self.registry)
            .field("config_path", &self.config_path)
            .field("status_path", &self.status_path)
            .field("keep_backup", &self.keep_backup)
            .field("config", &self.config)
            .field("status", &self.status)
            .field("root_id", &self.root_id)
            .field("observers", &self.observers.len())
            .field("log_watcher", &self.log_watcher)
            .finish()
    }
}

impl NagData {
    /// Start building from a main configuration file path.
    pub fn builder(config_path: impl Into<PathBuf>) -> NagDataBuilder {
        NagDataBuilder {
            config_path: config_path.into(),
            status_path: None,
            registry: None,
            keep_backup: true,
        }
    }

    /// Load with defaults from a main configuration file path.
    pub fn open(config_path: impl Into<PathBuf>) -> Result<Self, ApiError> {
        Self::builder(config_path).load()
    }

    /// The configuration collection.
    pub fn config(&self) -> &Collection {
        &self.config
    }

    /// The status collection.
    pub fn status(&self) -> &Collection {
        &self.status
    }

    /// The registry records are built from.
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Path of the main configuration file.
    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Path of the status file.
    pub fn status_path(&self) -> &Path {
        &self.status_path
    }

    /// The main configuration's root record.
    pub fn root(&self) -> Option<&Record> {
        self.config.get(&self.root_id)
    }

    /// Register reconciliation callbacks.
    pub fn register_observer(&mut self, observer: Box<dyn ReloadObserver>) {
        self.observers.push(observer);
    }

    /// The convenience query layer.
    pub fn query(&self) -> SimpleQuery<'_> {
        SimpleQuery { data: self }
    }

    // =========================================================================
    // Records
    // =========================================================================

    /// Create a detached record of a registered kind.
    pub fn new_record(&self, kind: &str) -> Result<Record, ApiError> {
        self.registry
            .new_record(kind)
            .ok_or_else(|| ApiError::UnknownKind {
                kind: kind.to_string(),
            })
    }

    /// Add a record to the collection its kind belongs to.
    ///
    /// Status-syntax kinds go to the status collection; everything else is
    /// configuration.
    pub fn add(&mut self, record: Record) -> Result<ObjectId, ApiError> {
        let id = match record.schema().syntax() {
            Syntax::Status => self.status.add(record)?,
            _ => self.config.add(record)?,
        };
        Ok(id)
    }

    /// Create a record, set its attributes, and add it.
    pub fn addnew(
        &mut self,
        kind: &str,
        fields: &[(&str, Value)],
    ) -> Result<ObjectId, ApiError> {
        let mut record = self.new_record(kind)?;
        for (attr, value) in fields {
            record.set(attr, value.clone());
        }
        self.add(record)
    }

    /// Remove a record from whichever collection holds it.
    pub fn remove(&mut self, id: &ObjectId) -> Option<Record> {
        self.config.remove(id).or_else(|| self.status.remove(id))
    }

    /// Get a record from whichever collection holds it.
    pub fn get_record(&self, id: &ObjectId) -> Option<&Record> {
        self.config.get(id).or_else(|| self.status.get(id))
    }

    /// Set an attribute through the owning collection's transactional path.
    pub fn set(
        &mut self,
        id: &ObjectId,
        attr: &str,
        value: impl Into<Value>,
    ) -> Result<ObjectId, ApiError> {
        if self.config.contains(id) {
            Ok(self.config.set(id, attr, value)?)
        } else {
            Ok(self.status.set(id, attr, value)?)
        }
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Records matching every predicate, across both collections.
    pub fn filter(&self, predicates: &[(&str, Value)]) -> Vec<&Record> {
        let mut out = self.config.filter(predicates);
        out.extend(self.status.filter(predicates));
        out
    }

    /// Records of one kind matching every predicate.
    pub fn filter_kind(&self, kind: &str, predicates: &[(&str, Value)]) -> Vec<&Record> {
        let mut out = self.config.filter_kind(kind, predicates);
        out.extend(self.status.filter_kind(kind, predicates));
        out
    }

    /// The single record of `kind` matching the predicates.
    pub fn get(&self, kind: &str, predicates: &[(&str, Value)]) -> Result<&Record, ApiError> {
        let matches = self.filter_kind(kind, predicates);
        match matches.as_slice() {
            [] => Err(ApiError::NotFound {
                kind: kind.to_string(),
                criteria: criteria_string(predicates),
            }),
            [one] => Ok(*one),
            _ => Err(ApiError::TooMany {
                kind: kind.to_string(),
                criteria: criteria_string(predicates),
            }),
        }
    }

    /// Best-effort single lookup: `None` unless exactly one record matches.
    pub fn get_or_none(&self, kind: &str, predicates: &[(&str, Value)]) -> Option<&Record> {
        let matches = self.filter_kind(kind, predicates);
        match matches.as_slice() {
            [one] => Some(*one),
            _ => None,
        }
    }

    // =========================================================================
    // Saving
    // =========================================================================

    /// Save the file a record belongs to, optionally re-homing it first.
    ///
    /// All records of the destination file are rendered in recorded block
    /// order and written together. The destination must lie inside the
    /// configured scope (`cfg_file` entries, under a `cfg_dir`, or the main
    /// configuration file itself).
    pub fn save_object(
        &mut self,
        id: &ObjectId,
        filename: Option<&Path>,
    ) -> Result<(), ApiError> {
        let in_config = self.config.contains(id);
        if !in_config && !self.status.contains(id) {
            return Err(CollectionError::UnknownRecord { id: id.clone() }.into());
        }

        let current = self
            .get_record(id)
            .and_then(Record::source)
            .cloned();
        let destination = match filename {
            Some(path) => path.to_path_buf(),
            None => current
                .as_ref()
                .map(|s| s.file.clone())
                .ok_or_else(|| ApiError::NoDestination { id: id.clone() })?,
        };
        self.ensure_in_scope(&destination)?;

        if current.as_ref().map(|s| s.file.as_path()) != Some(destination.as_path()) {
            let source = SourceInfo {
                file: destination.clone(),
                position: current.as_ref().and_then(|s| s.position),
                loaded_at: current.map(|s| s.loaded_at).unwrap_or_else(Utc::now),
            };
            if in_config {
                self.config.set_source(id, Some(source))?;
            } else {
                self.status.set_source(id, Some(source))?;
            }
        }

        self.save_file(&destination)
    }

    /// Save every record belonging to `path`.
    pub fn save_file(&mut self, path: &Path) -> Result<(), ApiError> {
        self.ensure_in_scope(path)?;
        let mut records = self.config.records_for_file(path);
        records.extend(self.status.records_for_file(path));
        save_records(path, &records, self.keep_backup)?;
        Ok(())
    }

    /// Error unless `path` is inside the configured scope.
    fn ensure_in_scope(&self, path: &Path) -> Result<(), ApiError> {
        if path == self.config_path {
            return Ok(());
        }
        let (files, dirs) = self.config_scope();
        if files.iter().any(|f| f == path) {
            return Ok(());
        }
        if dirs.iter().any(|d| path.starts_with(d)) {
            return Ok(());
        }
        Err(ApiError::PathNotConfigured {
            path: path.to_path_buf(),
        })
    }

    /// The declared `cfg_file` entries and `cfg_dir` directories.
    fn config_scope(&self) -> (Vec<PathBuf>, Vec<PathBuf>) {
        match self.root() {
            Some(root) => (path_list(root, "cfg_file"), path_list(root, "cfg_dir")),
            None => (Vec::new(), Vec::new()),
        }
    }

    // =========================================================================
    // Reload and staleness
    // =========================================================================

    /// Re-parse the whole configuration scope and reconcile it in.
    pub fn update_config(&mut self) -> Result<MergeReport, ApiError> {
        let (incoming, _) = load_config_collection(&self.registry, &self.config_path)?;
        for observer in &mut self.observers {
            observer.before_config_update(&self.config, &incoming);
        }
        let files: Vec<PathBuf> = incoming.files().map(Path::to_path_buf).collect();
        reconcile::prune_unkeyed(&mut self.config, files.iter().map(PathBuf::as_path));
        let report = self.config.merge(incoming)?;
        if let Some(root) = self.config.of_kind(ROOT_KIND).into_iter().next() {
            self.root_id = root.id().clone();
        }
        for observer in &mut self.observers {
            observer.after_config_update(&report);
        }
        info!(
            "config reload: {} added, {} replaced, {} refreshed",
            report.added.len(),
            report.replaced.len(),
            report.refreshed
        );
        Ok(report)
    }

    /// Re-parse a single configuration file and reconcile it in.
    pub fn update_config_file(&mut self, path: &Path) -> Result<MergeReport, ApiError> {
        let source = if path == self.config_path {
            SourceFile::main_config(path)
        } else {
            SourceFile::objects(path)
        };
        let batch = source.load(&self.registry)?;
        let mut incoming = Collection::new();
        incoming.extend(batch)?;

        for observer in &mut self.observers {
            observer.before_config_update(&self.config, &incoming);
        }
        reconcile::prune_unkeyed(&mut self.config, [path]);
        let report = self.config.merge(incoming)?;
        if path == self.config_path {
            if let Some(root) = self.config.of_kind(ROOT_KIND).into_iter().next() {
                self.root_id = root.id().clone();
            }
        }
        for observer in &mut self.observers {
            observer.after_config_update(&report);
        }
        Ok(report)
    }

    /// Re-parse the status file and reconcile it in.
    pub fn update_status(&mut self) -> Result<MergeReport, ApiError> {
        let batch = SourceFile::status(&self.status_path).load(&self.registry)?;
        let mut incoming = Collection::new();
        incoming.extend(batch)?;

        for observer in &mut self.observers {
            observer.before_status_update(&self.status, &incoming);
        }
        let files: Vec<PathBuf> = incoming.files().map(Path::to_path_buf).collect();
        reconcile::prune_unkeyed(&mut self.status, files.iter().map(PathBuf::as_path));
        let report = self.status.merge(incoming)?;
        for observer in &mut self.observers {
            observer.after_status_update(&report);
        }
        Ok(report)
    }

    /// Configuration files needing a re-parse: loaded files whose on-disk
    /// state changed (or vanished), plus declared files not yet loaded.
    pub fn config_outdated(&self) -> BTreeSet<PathBuf> {
        let mut outdated = reconcile::outdated_files(&self.config);
        let (files, dirs) = self.config_scope();
        outdated.extend(reconcile::undiscovered_files(
            &self.config,
            files.iter().map(PathBuf::as_path),
            dirs.iter().map(PathBuf::as_path),
        ));
        outdated
    }

    /// True if the status file changed on disk since it was loaded.
    pub fn status_outdated(&self) -> bool {
        match self.status.earliest_load(&self.status_path) {
            Some(loaded_at) => reconcile::file_outdated(&self.status_path, loaded_at),
            None => true,
        }
    }

    /// Check the daemon log for a reload at or after `since`.
    ///
    /// The watcher tails the `log_file` named by the main configuration; a
    /// configuration without one always reports `None`.
    pub fn reload_detected(
        &mut self,
        since: DateTime<Utc>,
    ) -> Result<Option<DateTime<Utc>>, ApiError> {
        if self.log_watcher.is_none() {
            let log_path = self
                .root()
                .and_then(|root| root.get("log_file"))
                .map(|v| PathBuf::from(v.render()));
            if let Some(path) = log_path {
                self.log_watcher = Some(LogWatcher::new(path));
            }
        }
        match &mut self.log_watcher {
            Some(watcher) => Ok(watcher.reload_detected(since)?),
            None => Ok(None),
        }
    }
}

/// Load the whole configuration scope into a fresh collection.
fn load_config_collection(
    registry: &Registry,
    config_path: &Path,
) -> Result<(Collection, ObjectId), ApiError> {
    let mut collection = Collection::new();
    collection.extend(SourceFile::main_config(config_path).load(registry)?)?;

    let (root_id, files, dirs) = {
        let roots = collection.of_kind(ROOT_KIND);
        let root = roots.first().ok_or_else(|| ApiError::UnknownKind {
            kind: ROOT_KIND.to_string(),
        })?;
        (
            root.id().clone(),
            path_list(root, "cfg_file"),
            path_list(root, "cfg_dir"),
        )
    };

    for file in &files {
        collection.extend(SourceFile::objects(file).load(registry)?)?;
    }
    for dir in &dirs {
        for file in cfg_dir_entries(dir) {
            collection.extend(SourceFile::objects(&file).load(registry)?)?;
        }
    }
    Ok((collection, root_id))
}

/// The `*.cfg` entries of a directory, sorted for deterministic load order.
fn cfg_dir_entries(dir: &Path) -> Vec<PathBuf> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("cannot scan cfg_dir {}: {}", dir.display(), e);
            return Vec::new();
        }
    };
    let mut files: Vec<PathBuf> = entries
        .flatten()
        .map(|e| e.path())
        .filter(|p| p.extension().is_some_and(|e| e == "cfg"))
        .collect();
    files.sort();
    files
}

/// A record attribute as a list of paths.
fn path_list(record: &Record, attr: &str) -> Vec<PathBuf> {
    let Some(value) = record.get(attr) else {
        return Vec::new();
    };
    let flat = match value {
        Value::Grouped(g) => g.flattened(),
        Value::List(l) => l.clone(),
        Value::Text(t) => return vec![PathBuf::from(t)],
    };
    match flat {
        ListValue::Plain(items) => items.into_iter().map(PathBuf::from).collect(),
        ListValue::Paired(pairs) => pairs
            .into_iter()
            .flat_map(|(a, b)| [a, b])
            .map(PathBuf::from)
            .collect(),
    }
}

fn criteria_string(predicates: &[(&str, Value)]) -> String {
    predicates
        .iter()
        .map(|(attr, value)| format!("{}='{}'", attr, value.render()))
        .collect::<Vec<_>>()
        .join(",")
}

/// Lookups by the fields people actually know.
///
/// A thin borrow of [`NagData`]; construct with [`NagData::query`].
pub struct SimpleQuery<'a> {
    data: &'a NagData,
}

impl<'a> SimpleQuery<'a> {
    /// Host by `host_name`, falling back to `address`.
    pub fn host(&self, host: &str) -> Result<&'a Record, ApiError> {
        match self.data.get("host", &[("host_name", Value::text(host))]) {
            Err(ApiError::NotFound { .. }) => {
                self.data.get("host", &[("address", Value::text(host))])
            }
            other => other,
        }
    }

    /// Service by description, optionally scoped to a host.
    pub fn service(
        &self,
        description: &str,
        host: Option<&str>,
    ) -> Result<&'a Record, ApiError> {
        match host {
            Some(host) => {
                let host = self.host(host)?;
                let name = host
                    .get("host_name")
                    .map(Value::render)
                    .unwrap_or_default();
                self.data.get(
                    "service",
                    &[
                        ("host_name", Value::text(name)),
                        ("service_description", Value::text(description)),
                    ],
                )
            }
            None => self.data.get(
                "service",
                &[("service_description", Value::text(description))],
            ),
        }
    }

    /// Hostgroup by name.
    pub fn hostgroup(&self, name: &str) -> Result<&'a Record, ApiError> {
        self.data
            .get("hostgroup", &[("hostgroup_name", Value::text(name))])
    }

    /// Servicegroup by name.
    pub fn servicegroup(&self, name: &str) -> Result<&'a Record, ApiError> {
        self.data
            .get("servicegroup", &[("servicegroup_name", Value::text(name))])
    }

    /// Status of a host, if the daemon has written one.
    pub fn host_status(&self, host: &str) -> Result<Option<&'a Record>, ApiError> {
        let host = self.host(host)?;
        let name = host
            .get("host_name")
            .map(Value::render)
            .unwrap_or_default();
        Ok(self
            .data
            .get_or_none("hoststatus", &[("host_name", Value::text(name))]))
    }

    /// Status of one service on one host.
    pub fn service_status(
        &self,
        host: &str,
        description: &str,
    ) -> Result<Option<&'a Record>, ApiError> {
        let host = self.host(host)?;
        let name = host
            .get("host_name")
            .map(Value::render)
            .unwrap_or_default();
        Ok(self.data.get_or_none(
            "servicestatus",
            &[
                ("host_name", Value::text(name)),
                ("service_description", Value::text(description)),
            ],
        ))
    }

    /// All service statuses for a host.
    pub fn host_service_statuses(&self, host: &str) -> Result<Vec<&'a Record>, ApiError> {
        let host = self.host(host)?;
        let name = host
            .get("host_name")
            .map(Value::render)
            .unwrap_or_default();
        Ok(self
            .data
            .filter_kind("servicestatus", &[("host_name", Value::text(name))]))
    }

    /// Host statuses for every member of a hostgroup.
    pub fn hostgroup_statuses(&self, name: &str) -> Result<Vec<&'a Record>, ApiError> {
        let group = self.hostgroup(name)?;
        let members = group.get("members").map(list_items).unwrap_or_default();
        let mut statuses = Vec::new();
        for member in members {
            if let Some(status) = self.host_status(&member)? {
                statuses.push(status);
            }
        }
        Ok(statuses)
    }

    /// Service statuses for every `(host, service)` member of a servicegroup.
    pub fn servicegroup_statuses(&self, name: &str) -> Result<Vec<&'a Record>, ApiError> {
        let group = self.servicegroup(name)?;
        let members = group.get("members").map(list_pairs).unwrap_or_default();
        let mut statuses = Vec::new();
        for (host, service) in members {
            if let Some(status) = self.service_status(&host, &service)? {
                statuses.push(status);
            }
        }
        Ok(statuses)
    }

    /// Comments attached to a host.
    pub fn host_comments(&self, host: &str) -> Result<Vec<&'a Record>, ApiError> {
        let host = self.host(host)?;
        let name = host
            .get("host_name")
            .map(Value::render)
            .unwrap_or_default();
        Ok(self
            .data
            .filter_kind("hostcomment", &[("host_name", Value::text(name))]))
    }

    /// Comments attached to one service on one host.
    pub fn service_comments(
        &self,
        host: &str,
        description: &str,
    ) -> Result<Vec<&'a Record>, ApiError> {
        let host = self.host(host)?;
        let name = host
            .get("host_name")
            .map(Value::render)
            .unwrap_or_default();
        Ok(self.data.filter_kind(
            "servicecomment",
            &[
                ("host_name", Value::text(name)),
                ("service_description", Value::text(description)),
            ],
        ))
    }

    /// Every host and service comment by an author.
    pub fn author_comments(&self, author: &str) -> Vec<&'a Record> {
        let mut comments = self
            .data
            .filter_kind("hostcomment", &[("author", Value::text(author))]);
        comments.extend(
            self.data
                .filter_kind("servicecomment", &[("author", Value::text(author))]),
        );
        comments
    }

    /// All hosts.
    pub fn hosts(&self) -> Vec<&'a Record> {
        self.data.config.of_kind("host")
    }

    /// All hostgroups.
    pub fn hostgroups(&self) -> Vec<&'a Record> {
        self.data.config.of_kind("hostgroup")
    }

    /// All services.
    pub fn services(&self) -> Vec<&'a Record> {
        self.data.config.of_kind("service")
    }

    /// All servicegroups.
    pub fn servicegroups(&self) -> Vec<&'a Record> {
        self.data.config.of_kind("servicegroup")
    }

    /// The daemon's info block.
    pub fn info(&self) -> Result<&'a Record, ApiError> {
        self.data.get("info", &[])
    }

    /// The daemon's program status block.
    pub fn program_status(&self) -> Result<&'a Record, ApiError> {
        self.data.get("programstatus", &[])
    }
}

/// A value's elements as a flat string list.
fn list_items(value: &Value) -> Vec<String> {
    let flat = match value {
        Value::Grouped(g) => g.flattened(),
        Value::List(l) => l.clone(),
        Value::Text(t) => return vec![t.clone()],
    };
    match flat {
        ListValue::Plain(items) => items,
        ListValue::Paired(pairs) => pairs.into_iter().flat_map(|(a, b)| [a, b]).collect(),
    }
}

/// A value's elements as pairs.
fn list_pairs(value: &Value) -> Vec<(String, String)> {
    let flat = match value {
        Value::Grouped(g) => g.flattened(),
        Value::List(l) => l.clone(),
        Value::Text(t) => ListValue::parse_paired(t),
    };
    match flat {
        ListValue::Paired(pairs) => pairs,
        ListValue::Plain(items) => items
            .chunks_exact(2)
            .map(|c| (c[0].clone(), c[1].clone()))
            .collect(),
    }
}
