//! core::collection
//!
//! Indexed container of records.
//!
//! # Architecture
//!
//! A [`Collection`] owns its member records outright: handing out only
//! shared references is what guarantees the secondary index can never
//! disagree with a member's attribute values. All mutation of owned records
//! flows through [`Collection::set`] and [`Collection::rekey`], which
//! validate primary-key uniqueness up front and move index entries together
//! with the change. Detached records are mutated directly via
//! [`Record::set`] and only checked when they enter a collection.
//!
//! # Indexes
//!
//! - uniqueness: members are keyed by [`ObjectId`], the stable identifier
//!   derived from the primary key;
//! - secondary: attribute → value → ordered id set, maintained for every
//!   attribute in the record's declared tag set;
//! - kind and source file get dedicated buckets, since every record carries
//!   them outside the attribute map.
//!
//! # Scratch batches
//!
//! [`Batch`] is the non-indexed scratch container: insertion-ordered, no
//! uniqueness enforcement, no filtering. Parse results arrive as batches and
//! are adopted with [`Collection::extend`], which reports the first key
//! conflict instead of silently collapsing duplicates.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use log::debug;
use thiserror::Error;

use super::record::{Record, SourceInfo};
use super::types::{ObjectId, Value};

/// Errors from collection operations.
#[derive(Debug, Error)]
pub enum CollectionError {
    /// A record with the same primary key is already present.
    #[error("'{kind}' record with {key} already exists in collection")]
    DuplicateKey { kind: String, key: String },

    /// The collection's kind filter rejects this record.
    #[error("record kind '{kind}' is not accepted by this collection")]
    IncompatibleKind { kind: String },

    /// The addressed record is not a member.
    #[error("no record with id {id} in collection")]
    UnknownRecord { id: ObjectId },
}

/// Insertion-ordered scratch container with no indexing.
///
/// Used for intermediate sets of records, most importantly parse results:
/// a batch tolerates duplicate keys so that a malformed file is diagnosed
/// when it is adopted by an indexed collection, not silently deduplicated.
#[derive(Debug, Default)]
pub struct Batch {
    records: Vec<Record>,
}

impl Batch {
    /// An empty batch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record.
    pub fn push(&mut self, record: Record) {
        self.records.push(record);
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True if the batch holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Iterate the records in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Record> {
        self.records.iter()
    }
}

impl IntoIterator for Batch {
    type Item = Record;
    type IntoIter = std::vec::IntoIter<Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}

impl FromIterator<Record> for Batch {
    fn from_iter<T: IntoIterator<Item = Record>>(iter: T) -> Self {
        Self {
            records: iter.into_iter().collect(),
        }
    }
}

/// Outcome of [`Collection::merge`].
#[derive(Debug, Default)]
pub struct MergeReport {
    /// Ids newly inserted (no record shared their key).
    pub added: Vec<ObjectId>,
    /// Ids whose record was replaced by the incoming version.
    pub replaced: Vec<ObjectId>,
    /// Members whose incoming version was value-identical; only provenance
    /// was refreshed.
    pub refreshed: usize,
    /// Source files touched by additions or replacements.
    pub changed_files: BTreeSet<PathBuf>,
}

impl MergeReport {
    /// True if the merge changed no member values.
    pub fn is_unchanged(&self) -> bool {
        self.added.is_empty() && self.replaced.is_empty()
    }
}

/// Indexed, uniqueness-enforcing container of records.
#[derive(Debug, Default)]
pub struct Collection {
    members: HashMap<ObjectId, Record>,
    /// attribute -> value -> member ids
    tags: HashMap<String, HashMap<Value, BTreeSet<ObjectId>>>,
    by_kind: HashMap<String, BTreeSet<ObjectId>>,
    by_file: HashMap<PathBuf, BTreeSet<ObjectId>>,
    allowed_kinds: Option<HashSet<String>>,
}

impl Collection {
    /// An empty collection accepting any record kind.
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty collection accepting only the given kinds.
    pub fn with_kinds<I, S>(kinds: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed_kinds: Some(kinds.into_iter().map(Into::into).collect()),
            ..Self::default()
        }
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// True if the collection has no members.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// True if a member with this id exists.
    pub fn contains(&self, id: &ObjectId) -> bool {
        self.members.contains_key(id)
    }

    /// Get a member by id.
    pub fn get(&self, id: &ObjectId) -> Option<&Record> {
        self.members.get(id)
    }

    /// Snapshot of every member, in no particular order.
    pub fn all(&self) -> Vec<&Record> {
        self.members.values().collect()
    }

    /// Iterate all members.
    pub fn iter(&self) -> impl Iterator<Item = &Record> {
        self.members.values()
    }

    /// Add a record.
    ///
    /// Fails with [`CollectionError::IncompatibleKind`] if a kind filter is
    /// set and rejects the record, or [`CollectionError::DuplicateKey`] if a
    /// member already holds the same id; in both cases the collection is
    /// unchanged. A staging clone added here is adopted as an independent
    /// record (use [`Collection::commit_staged`] to replace its original).
    pub fn add(&mut self, mut record: Record) -> Result<ObjectId, CollectionError> {
        if let Some(allowed) = &self.allowed_kinds {
            if !allowed.contains(record.kind()) {
                return Err(CollectionError::IncompatibleKind {
                    kind: record.kind().to_string(),
                });
            }
        }
        if self.members.contains_key(record.id()) {
            return Err(CollectionError::DuplicateKey {
                kind: record.kind().to_string(),
                key: record.key_description(),
            });
        }
        record.clear_staging();
        let id = record.id().clone();
        self.index(&record);
        self.members.insert(id.clone(), record);
        Ok(id)
    }

    /// Remove a member, returning ownership of the record.
    ///
    /// Clears the record's index residency entirely; safe to call with an id
    /// that is not a member.
    pub fn remove(&mut self, id: &ObjectId) -> Option<Record> {
        let record = self.members.remove(id)?;
        self.unindex(&record);
        Some(record)
    }

    /// Drop every member and index entry.
    pub fn clear(&mut self) {
        self.members.clear();
        self.tags.clear();
        self.by_kind.clear();
        self.by_file.clear();
    }

    /// Members of one kind.
    pub fn of_kind(&self, kind: &str) -> Vec<&Record> {
        self.resolve(self.by_kind.get(kind))
    }

    /// Members loaded from one file, unordered.
    pub fn from_file(&self, file: &Path) -> Vec<&Record> {
        self.resolve(self.by_file.get(file))
    }

    /// Members loaded from one file, in recorded block order.
    ///
    /// Records without a recorded position sort last, preserving relative
    /// insertion stability only between positioned records.
    pub fn records_for_file(&self, file: &Path) -> Vec<&Record> {
        let mut records = self.from_file(file);
        records.sort_by_key(|r| {
            r.source()
                .and_then(|s| s.position)
                .unwrap_or(usize::MAX)
        });
        records
    }

    /// Every distinct source file referenced by members.
    pub fn files(&self) -> impl Iterator<Item = &Path> {
        self.by_file.keys().map(PathBuf::as_path)
    }

    /// Earliest load timestamp among a file's records.
    pub fn earliest_load(&self, file: &Path) -> Option<DateTime<Utc>> {
        self.from_file(file)
            .iter()
            .filter_map(|r| r.source().map(|s| s.loaded_at))
            .min()
    }

    /// Members matching every `(attribute, value)` predicate.
    ///
    /// The result is the set intersection of the named index buckets; a
    /// predicate with no bucket short-circuits to the empty set. Only
    /// attributes in the record kinds' declared tag sets are indexed.
    /// Calling with no predicates is not meaningful and returns nothing.
    pub fn filter(&self, predicates: &[(&str, Value)]) -> Vec<&Record> {
        let ids = self.filter_ids(predicates);
        ids.iter().filter_map(|id| self.members.get(id)).collect()
    }

    /// Like [`Collection::filter`], additionally restricted to one kind.
    pub fn filter_kind(&self, kind: &str, predicates: &[(&str, Value)]) -> Vec<&Record> {
        if predicates.is_empty() {
            return self.of_kind(kind);
        }
        let Some(kind_ids) = self.by_kind.get(kind) else {
            return Vec::new();
        };
        self.filter_ids(predicates)
            .intersection(kind_ids)
            .filter_map(|id| self.members.get(id))
            .collect()
    }

    /// Id set matching every predicate; a fresh snapshot the caller owns.
    pub fn filter_ids(&self, predicates: &[(&str, Value)]) -> BTreeSet<ObjectId> {
        let mut iter = predicates.iter();
        let Some((attr, value)) = iter.next() else {
            return BTreeSet::new();
        };
        let Some(bucket) = self.bucket(attr, value) else {
            return BTreeSet::new();
        };
        let mut ids = bucket.clone();
        for (attr, value) in iter {
            match self.bucket(attr, value) {
                Some(bucket) => {
                    ids = ids.intersection(bucket).cloned().collect();
                    if ids.is_empty() {
                        break;
                    }
                }
                None => return BTreeSet::new(),
            }
        }
        ids
    }

    fn bucket(&self, attr: &str, value: &Value) -> Option<&BTreeSet<ObjectId>> {
        self.tags.get(attr)?.get(value)
    }

    fn resolve(&self, ids: Option<&BTreeSet<ObjectId>>) -> Vec<&Record> {
        ids.into_iter()
            .flatten()
            .filter_map(|id| self.members.get(id))
            .collect()
    }

    /// Set an attribute on an owned record, keeping indexes consistent.
    ///
    /// The value is coerced to its declared type first. Changing a
    /// primary-key attribute recomputes the id; the new key is validated
    /// against existing members *before* anything is touched, so a rejected
    /// mutation leaves both the record and the indexes exactly as they were.
    /// Returns the record's (possibly new) id.
    pub fn set(
        &mut self,
        id: &ObjectId,
        attr: &str,
        value: impl Into<Value>,
    ) -> Result<ObjectId, CollectionError> {
        let record = self
            .members
            .get(id)
            .ok_or_else(|| CollectionError::UnknownRecord { id: id.clone() })?;
        let coerced = record.schema().coerce_value(attr, value.into());

        if record.is_primary_key(attr) {
            let candidate = record.candidate_id(attr, &coerced);
            if candidate != *id && self.members.contains_key(&candidate) {
                let existing = &self.members[&candidate];
                return Err(CollectionError::DuplicateKey {
                    kind: existing.kind().to_string(),
                    key: existing.key_description(),
                });
            }
            let Some(mut record) = self.members.remove(id) else {
                return Err(CollectionError::UnknownRecord { id: id.clone() });
            };
            self.unindex(&record);
            record.set_coerced(attr, coerced);
            debug_assert_eq!(*record.id(), candidate);
            self.index(&record);
            self.members.insert(candidate.clone(), record);
            Ok(candidate)
        } else {
            let Some(record) = self.members.get_mut(id) else {
                return Err(CollectionError::UnknownRecord { id: id.clone() });
            };
            let old = record.set_coerced(attr, coerced.clone());
            self.update_tag(attr, old.as_ref(), Some(&coerced), id);
            Ok(id.clone())
        }
    }

    /// Change primary-key attributes in one validated step.
    ///
    /// Computes the would-be id from the substituted key values, rejects it
    /// if another member already owns it, and only then removes the old
    /// index entries, applies the new values and reinserts — one logical
    /// record never has two representations in the collection.
    pub fn rekey(
        &mut self,
        id: &ObjectId,
        new_keys: &[(&str, Value)],
    ) -> Result<ObjectId, CollectionError> {
        let record = self
            .members
            .get(id)
            .ok_or_else(|| CollectionError::UnknownRecord { id: id.clone() })?;
        let coerced: Vec<(&str, Value)> = new_keys
            .iter()
            .map(|(attr, value)| (*attr, record.schema().coerce_value(attr, value.clone())))
            .collect();
        let subs: Vec<(&str, &Value)> = coerced.iter().map(|(a, v)| (*a, v)).collect();
        let candidate = record.candidate_id_with(&subs);
        if candidate != *id && self.members.contains_key(&candidate) {
            let existing = &self.members[&candidate];
            return Err(CollectionError::DuplicateKey {
                kind: existing.kind().to_string(),
                key: existing.key_description(),
            });
        }

        let Some(mut record) = self.members.remove(id) else {
            return Err(CollectionError::UnknownRecord { id: id.clone() });
        };
        self.unindex(&record);
        for (attr, value) in coerced {
            record.set_coerced(attr, value);
        }
        record.recompute_id();
        debug_assert_eq!(*record.id(), candidate);
        self.index(&record);
        self.members.insert(candidate.clone(), record);
        Ok(candidate)
    }

    /// Replace a staged record's original with the staged version.
    ///
    /// The staged copy (from [`Record::staging_clone`]) may have changed
    /// primary-key attributes. If the new key collides with a member other
    /// than the original, the commit is rejected and nothing changes;
    /// otherwise the original leaves the collection and the staged version
    /// takes its place. A record that is not staged is simply added.
    pub fn commit_staged(&mut self, mut record: Record) -> Result<ObjectId, CollectionError> {
        let Some(original) = record.staged_from().cloned() else {
            return self.add(record);
        };
        record.clear_staging();
        record.recompute_id();
        if *record.id() != original && self.members.contains_key(record.id()) {
            let existing = &self.members[record.id()];
            return Err(CollectionError::DuplicateKey {
                kind: existing.kind().to_string(),
                key: existing.key_description(),
            });
        }
        self.remove(&original);
        self.add(record)
    }

    /// Move a member's index entry for `attr` between value buckets.
    ///
    /// Called automatically by [`Collection::set`]; a no-op for attributes
    /// outside the record's declared tag set and for unknown members.
    pub fn update_tag(
        &mut self,
        attr: &str,
        old: Option<&Value>,
        new: Option<&Value>,
        id: &ObjectId,
    ) {
        let Some(record) = self.members.get(id) else {
            return;
        };
        if !record.schema().is_tag(attr) {
            return;
        }
        if let Some(old) = old {
            if let Some(buckets) = self.tags.get_mut(attr) {
                if let Some(bucket) = buckets.get_mut(old) {
                    bucket.remove(id);
                    if bucket.is_empty() {
                        buckets.remove(old);
                    }
                }
            }
        }
        if let Some(new) = new {
            self.tags
                .entry(attr.to_string())
                .or_default()
                .entry(new.clone())
                .or_default()
                .insert(id.clone());
        }
    }

    /// Re-home a member to a different source file, keeping the file index
    /// consistent. Used when a record is saved to a new destination.
    pub fn set_source(
        &mut self,
        id: &ObjectId,
        source: Option<SourceInfo>,
    ) -> Result<(), CollectionError> {
        let record = self
            .members
            .get_mut(id)
            .ok_or_else(|| CollectionError::UnknownRecord { id: id.clone() })?;
        let old_file = record.source_file().map(Path::to_path_buf);
        record.set_source(source);
        let new_file = record.source_file().map(Path::to_path_buf);
        if old_file != new_file {
            if let Some(old) = old_file {
                if let Some(bucket) = self.by_file.get_mut(&old) {
                    bucket.remove(id);
                    if bucket.is_empty() {
                        self.by_file.remove(&old);
                    }
                }
            }
            if let Some(new) = new_file {
                self.by_file.entry(new).or_default().insert(id.clone());
            }
        }
        Ok(())
    }

    /// Add every record of `records`, honoring uniqueness.
    ///
    /// Stops at the first conflict; records added before the conflict stay.
    pub fn extend<I>(&mut self, records: I) -> Result<(), CollectionError>
    where
        I: IntoIterator<Item = Record>,
    {
        for record in records {
            self.add(record)?;
        }
        Ok(())
    }

    /// Reconcile freshly parsed records into this collection.
    ///
    /// For every incoming record: if a member shares its id (same primary
    /// key) and the same attribute values, only provenance and layout are
    /// refreshed; if the values differ, the member is replaced wholesale —
    /// local in-memory edits to it are discarded. Incoming records with no
    /// key match are added. Members with no incoming counterpart are left
    /// untouched, which preserves locally created, not-yet-saved records.
    pub fn merge(&mut self, other: Collection) -> Result<MergeReport, CollectionError> {
        let mut report = MergeReport::default();
        for (id, record) in other.members {
            match self.members.get(&id) {
                Some(existing) if existing.same_content(&record) => {
                    self.refresh(record);
                    report.refreshed += 1;
                }
                Some(existing) => {
                    if let Some(file) = existing.source_file() {
                        report.changed_files.insert(file.to_path_buf());
                    }
                    if let Some(file) = record.source_file() {
                        report.changed_files.insert(file.to_path_buf());
                    }
                    debug!(
                        "merge: replacing '{}' {}",
                        record.kind(),
                        record.key_description()
                    );
                    self.remove(&id);
                    self.add(record)?;
                    report.replaced.push(id);
                }
                None => {
                    if let Some(file) = record.source_file() {
                        report.changed_files.insert(file.to_path_buf());
                    }
                    self.add(record)?;
                    report.added.push(id);
                }
            }
        }
        Ok(report)
    }

    /// Take a value-identical incoming record's provenance and layout.
    fn refresh(&mut self, incoming: Record) {
        let id = incoming.id().clone();
        let old_file = self
            .members
            .get(&id)
            .and_then(|r| r.source_file().map(Path::to_path_buf));
        let new_file = incoming.source_file().map(Path::to_path_buf);
        if old_file != new_file {
            if let Some(old) = old_file {
                if let Some(bucket) = self.by_file.get_mut(&old) {
                    bucket.remove(&id);
                    if bucket.is_empty() {
                        self.by_file.remove(&old);
                    }
                }
            }
            if let Some(new) = new_file {
                self.by_file.entry(new).or_default().insert(id.clone());
            }
        }
        if let Some(record) = self.members.get_mut(&id) {
            record.set_source(incoming.source().cloned());
            record.set_layout(incoming.layout().cloned());
        }
    }

    fn index(&mut self, record: &Record) {
        let id = record.id().clone();
        self.by_kind
            .entry(record.kind().to_string())
            .or_default()
            .insert(id.clone());
        if let Some(file) = record.source_file() {
            self.by_file
                .entry(file.to_path_buf())
                .or_default()
                .insert(id.clone());
        }
        for attr in record.schema().indexed_attrs() {
            if let Some(value) = record.get(attr) {
                self.tags
                    .entry(attr.to_string())
                    .or_default()
                    .entry(value.clone())
                    .or_default()
                    .insert(id.clone());
            }
        }
    }

    fn unindex(&mut self, record: &Record) {
        let id = record.id();
        if let Some(bucket) = self.by_kind.get_mut(record.kind()) {
            bucket.remove(id);
            if bucket.is_empty() {
                self.by_kind.remove(record.kind());
            }
        }
        if let Some(file) = record.source_file() {
            if let Some(bucket) = self.by_file.get_mut(file) {
                bucket.remove(id);
                if bucket.is_empty() {
                    let file = file.to_path_buf();
                    self.by_file.remove(&file);
                }
            }
        }
        for attr in record.schema().indexed_attrs() {
            if let Some(value) = record.get(attr) {
                if let Some(buckets) = self.tags.get_mut(attr) {
                    if let Some(bucket) = buckets.get_mut(value) {
                        bucket.remove(id);
                        if bucket.is_empty() {
                            buckets.remove(value);
                        }
                    }
                }
            }
        }
    }
}

impl IntoIterator for Collection {
    type Item = Record;
    type IntoIter = std::collections::hash_map::IntoValues<ObjectId, Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.members.into_values()
    }
}
