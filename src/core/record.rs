//! core::record
//!
//! One structured entity: a typed attribute map with a kind, a stable id,
//! an optional captured layout and optional source provenance.
//!
//! # Identity
//!
//! A record's [`ObjectId`] is recomputed from `(kind, primary-key values)`
//! whenever a primary-key attribute changes. Records of kinds without a
//! primary key keep the anonymous id assigned at construction. A record with
//! a *single* declared key attribute that is not yet populated also keeps
//! its anonymous id until the attribute appears; composite keys hash their
//! absent parts explicitly.
//!
//! # Mutation
//!
//! [`Record::set`] is the detached mutation path: it coerces the value to
//! the attribute's declared type and recomputes the id when needed. Records
//! owned by a [`Collection`](crate::core::collection::Collection) are only
//! handed out behind shared references; mutating them goes through
//! `Collection::set`, which validates key uniqueness and keeps the indexes
//! in step.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::core::schema::{ObjectSchema, Syntax};
use crate::core::types::{ObjectId, PrimaryKey, Value};
use crate::layout::{define_padding, Layout};

/// Where a record was loaded from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceInfo {
    /// Source file path, as configured.
    pub file: PathBuf,
    /// Position of the record's block within the file, counting every
    /// element including verbatim formatting blocks.
    pub position: Option<usize>,
    /// When the record was parsed from the file.
    pub loaded_at: DateTime<Utc>,
}

impl SourceInfo {
    /// Provenance stamped at load time.
    pub fn new(file: impl Into<PathBuf>, position: Option<usize>) -> Self {
        Self {
            file: file.into(),
            position,
            loaded_at: Utc::now(),
        }
    }
}

/// Plain serialisable form of a record, for interchange.
///
/// Rebuilt into a [`Record`] by
/// [`Registry::record_from_structure`](crate::core::registry::Registry::record_from_structure).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Structure {
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub id: Option<ObjectId>,
    pub fields: IndexMap<String, Value>,
}

/// One structured entity.
#[derive(Debug, Clone)]
pub struct Record {
    schema: Arc<ObjectSchema>,
    id: ObjectId,
    fields: IndexMap<String, Value>,
    layout: Option<Layout>,
    source: Option<SourceInfo>,
    cloned_from: Option<ObjectId>,
}

impl Record {
    /// Create an empty record of the schema's kind.
    ///
    /// The id starts anonymous; singleton kinds (empty composite key) get
    /// their deterministic kind-level id immediately.
    pub fn new(schema: Arc<ObjectSchema>) -> Self {
        let mut record = Self {
            schema,
            id: ObjectId::anonymous(),
            fields: IndexMap::new(),
            layout: None,
            source: None,
            cloned_from: None,
        };
        if matches!(record.schema.key(), PrimaryKey::Composite(attrs) if attrs.is_empty()) {
            record.recompute_id();
        }
        record
    }

    /// The record's kind tag.
    pub fn kind(&self) -> &str {
        self.schema.kind()
    }

    /// The record's stable id.
    pub fn id(&self) -> &ObjectId {
        &self.id
    }

    /// The record's schema.
    pub fn schema(&self) -> &Arc<ObjectSchema> {
        &self.schema
    }

    /// The captured layout, if the record came from a scanned file.
    pub fn layout(&self) -> Option<&Layout> {
        self.layout.as_ref()
    }

    /// Attach or clear a captured layout.
    pub fn set_layout(&mut self, layout: Option<Layout>) {
        self.layout = layout;
    }

    /// Source provenance, if the record was loaded from a file.
    pub fn source(&self) -> Option<&SourceInfo> {
        self.source.as_ref()
    }

    /// Attach or clear source provenance.
    pub fn set_source(&mut self, source: Option<SourceInfo>) {
        self.source = source;
    }

    /// The file this record belongs to, if any.
    pub fn source_file(&self) -> Option<&Path> {
        self.source.as_ref().map(|s| s.file.as_path())
    }

    /// Get an attribute value.
    pub fn get(&self, attr: &str) -> Option<&Value> {
        self.fields.get(attr)
    }

    /// All user-visible attributes in parse/insertion order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// The attribute map itself.
    pub fn field_map(&self) -> &IndexMap<String, Value> {
        &self.fields
    }

    /// Number of attributes.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// True if the record has no attributes.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// True if `attr` is the primary key, part of it, or the bookkeeping id.
    pub fn is_primary_key(&self, attr: &str) -> bool {
        self.schema.is_primary_key(attr)
    }

    /// Set an attribute on a detached record.
    ///
    /// The value is coerced to the attribute's declared type; if the
    /// attribute is part of the primary key, the id is recomputed. Returns
    /// the previous value, if any.
    pub fn set(&mut self, attr: &str, value: impl Into<Value>) -> Option<Value> {
        let coerced = self.schema.coerce_value(attr, value.into());
        self.set_coerced(attr, coerced)
    }

    /// Set an already-coerced value. Used by the collection's transactional
    /// mutation path, which coerces up front to pre-validate the new key.
    pub(crate) fn set_coerced(&mut self, attr: &str, value: Value) -> Option<Value> {
        let old = self.fields.insert(attr.to_string(), value);
        if self.is_primary_key(attr) {
            self.recompute_id();
        }
        old
    }

    /// Fold one parsed occurrence of an attribute into the record.
    ///
    /// A repeated attribute folds into the existing value
    /// ([`Value::fold_repeat`]); the id is not recomputed — assembly
    /// recomputes once after all attributes have landed.
    pub(crate) fn fold_parsed(&mut self, attr: &str, value: Value) {
        match self.fields.get_mut(attr) {
            Some(existing) => existing.fold_repeat(value),
            None => {
                self.fields.insert(attr.to_string(), value);
            }
        }
    }

    /// Override the id, e.g. when rebuilding from an interchange structure
    /// that carried one.
    pub(crate) fn force_id(&mut self, id: ObjectId) {
        self.id = id;
    }

    /// Remove an attribute, recomputing the id if it was part of the key.
    pub fn remove(&mut self, attr: &str) -> Option<Value> {
        let old = self.fields.shift_remove(attr);
        if old.is_some() && self.is_primary_key(attr) {
            self.recompute_id();
        }
        old
    }

    /// Recompute the id from the current primary-key attribute values.
    ///
    /// Kinds without a key, and single-attribute keys whose attribute is
    /// absent, keep the current id.
    pub fn recompute_id(&mut self) {
        match self.schema.key() {
            PrimaryKey::None => {}
            PrimaryKey::Single(attr) => {
                if let Some(v) = self.fields.get(attr) {
                    self.id = ObjectId::keyed(self.kind(), [(attr.as_str(), Some(v))]);
                }
            }
            PrimaryKey::Composite(attrs) => {
                self.id = ObjectId::keyed(
                    self.kind(),
                    attrs.iter().map(|a| (a.as_str(), self.fields.get(a))),
                );
            }
        }
    }

    /// The id this record would have after replacing `attr` with `value`.
    ///
    /// Does not mutate. Used to validate key uniqueness before committing.
    pub fn candidate_id(&self, attr: &str, value: &Value) -> ObjectId {
        self.candidate_id_with(&[(attr, value)])
    }

    /// The id after applying several attribute substitutions.
    pub fn candidate_id_with(&self, subs: &[(&str, &Value)]) -> ObjectId {
        let lookup = |a: &str| {
            subs.iter()
                .find(|(k, _)| *k == a)
                .map(|(_, v)| *v)
                .or_else(|| self.fields.get(a))
        };
        match self.schema.key() {
            PrimaryKey::None => self.id.clone(),
            PrimaryKey::Single(attr) => match lookup(attr) {
                Some(v) => ObjectId::keyed(self.kind(), [(attr.as_str(), Some(v))]),
                None => self.id.clone(),
            },
            PrimaryKey::Composite(attrs) => ObjectId::keyed(
                self.kind(),
                attrs.iter().map(|a| (a.as_str(), lookup(a))),
            ),
        }
    }

    /// A disconnected copy for staging a primary-key change.
    ///
    /// The copy shares no index residency and remembers the original's id;
    /// commit it with
    /// [`Collection::commit_staged`](crate::core::collection::Collection::commit_staged).
    pub fn staging_clone(&self) -> Record {
        let mut clone = self.clone();
        clone.cloned_from = Some(self.id.clone());
        clone
    }

    /// The original this record was cloned from, while staged.
    pub fn staged_from(&self) -> Option<&ObjectId> {
        self.cloned_from.as_ref()
    }

    pub(crate) fn clear_staging(&mut self) {
        self.cloned_from = None;
    }

    /// True if `other` carries the same kind and attribute values.
    ///
    /// Layout and provenance are ignored: this is the value-level identity
    /// used by reconciliation.
    pub fn same_content(&self, other: &Record) -> bool {
        self.kind() == other.kind() && self.fields == other.fields
    }

    /// Human-readable description of the primary-key value, for messages.
    pub fn key_description(&self) -> String {
        match self.schema.key() {
            PrimaryKey::None => format!("__id='{}'", self.id),
            PrimaryKey::Single(attr) => format!(
                "{}='{}'",
                attr,
                self.fields.get(attr).map(Value::render).unwrap_or_default()
            ),
            PrimaryKey::Composite(attrs) if attrs.is_empty() => {
                format!("singleton kind '{}'", self.kind())
            }
            PrimaryKey::Composite(attrs) => attrs
                .iter()
                .filter_map(|a| self.fields.get(a).map(|v| format!("{}='{}'", a, v.render())))
                .collect::<Vec<_>>()
                .join(","),
        }
    }

    /// Serialize to the plain interchange structure.
    pub fn to_structure(&self) -> Structure {
        Structure {
            kind: self.kind().to_string(),
            id: Some(self.id.clone()),
            fields: self.fields.clone(),
        }
    }

    /// Render the record to text.
    ///
    /// A record with a captured layout renders through it, reproducing the
    /// original bytes when unmodified; otherwise the kind's canonical form
    /// is used.
    pub fn render(&self) -> String {
        match &self.layout {
            Some(layout) => layout
                .resynthesized(&self.fields, self.schema.syntax())
                .render(&self.fields),
            None => self.render_canonical(),
        }
    }

    fn render_canonical(&self) -> String {
        match self.schema.syntax() {
            Syntax::Define => {
                let mut out = format!("define {} {{\n", self.kind());
                for (attr, value) in &self.fields {
                    out.push('\t');
                    out.push_str(attr);
                    out.push_str(&define_padding(attr));
                    out.push_str(&value.render());
                    out.push('\n');
                }
                out.push_str("\t}\n\n");
                out
            }
            Syntax::Status => {
                let mut out = format!("{} {{\n", self.kind());
                for (attr, value) in &self.fields {
                    out.push('\t');
                    out.push_str(attr);
                    out.push_str(" = ");
                    out.push_str(&value.render());
                    out.push('\n');
                }
                out.push_str("\t}\n");
                out
            }
            Syntax::KeyValue => {
                let mut out = String::new();
                for (attr, value) in &self.fields {
                    match value {
                        Value::Grouped(g) => {
                            for i in 0..g.len() {
                                out.push_str(attr);
                                out.push('=');
                                out.push_str(&g.render_group(i).unwrap_or_default());
                                out.push('\n');
                            }
                        }
                        v => {
                            out.push_str(attr);
                            out.push('=');
                            out.push_str(&v.render());
                            out.push('\n');
                        }
                    }
                }
                out
            }
            // Verbatim records carry everything in their layout.
            Syntax::Verbatim => String::new(),
        }
    }
}

impl std::fmt::Display for Record {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.render())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::schema::FieldType;

    fn host_schema() -> Arc<ObjectSchema> {
        Arc::new(
            ObjectSchema::define("host")
                .primary_key(PrimaryKey::composite(["host_name", "name"]))
                .tags(["address", "alias"]),
        )
    }

    fn hoststatus_schema() -> Arc<ObjectSchema> {
        Arc::new(
            ObjectSchema::status("hoststatus")
                .primary_key(PrimaryKey::from("host_name"))
                .tags(["current_state"]),
        )
    }

    #[test]
    fn setting_key_attribute_recomputes_id() {
        let mut rec = Record::new(hoststatus_schema());
        let anon = rec.id().clone();
        assert!(!anon.is_keyed());

        rec.set("host_name", "web01");
        let keyed = rec.id().clone();
        assert!(keyed.is_keyed());
        assert_ne!(anon, keyed);

        // Same key, same id.
        let mut other = Record::new(hoststatus_schema());
        other.set("host_name", "web01");
        assert_eq!(other.id(), &keyed);

        // Non-key attributes leave the id alone.
        rec.set("current_state", "0");
        assert_eq!(rec.id(), &keyed);
    }

    #[test]
    fn single_key_absent_keeps_anonymous_id() {
        let mut rec = Record::new(hoststatus_schema());
        let anon = rec.id().clone();
        rec.set("current_state", "0");
        rec.recompute_id();
        assert_eq!(rec.id(), &anon);
    }

    #[test]
    fn composite_key_hashes_absent_parts() {
        let mut a = Record::new(host_schema());
        a.set("host_name", "web01");
        let mut b = Record::new(host_schema());
        b.set("host_name", "web01");
        assert_eq!(a.id(), b.id());

        // Populating another part of the key moves the id.
        b.set("name", "template");
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn candidate_id_matches_actual_mutation() {
        let mut rec = Record::new(hoststatus_schema());
        rec.set("host_name", "web01");
        let candidate = rec.candidate_id("host_name", &Value::text("web02"));
        rec.set("host_name", "web02");
        assert_eq!(rec.id(), &candidate);
    }

    #[test]
    fn fields_keep_insertion_order() {
        let mut rec = Record::new(host_schema());
        rec.set("host_name", "web01");
        rec.set("alias", "Web");
        rec.set("address", "10.0.0.1");
        let names: Vec<&str> = rec.fields().map(|(k, _)| k).collect();
        assert_eq!(names, ["host_name", "alias", "address"]);
    }

    #[test]
    fn staging_clone_remembers_original() {
        let mut rec = Record::new(hoststatus_schema());
        rec.set("host_name", "web01");
        let staged = rec.staging_clone();
        assert_eq!(staged.staged_from(), Some(rec.id()));
        assert!(staged.same_content(&rec));
    }

    #[test]
    fn canonical_define_rendering() {
        let mut rec = Record::new(host_schema());
        rec.set("host_name", "web01");
        rec.set("address", "10.0.0.1");
        assert_eq!(
            rec.render(),
            "define host {\n\thost_name\t\tweb01\n\taddress\t\t\t10.0.0.1\n\t}\n\n"
        );
    }

    #[test]
    fn canonical_status_rendering() {
        let mut rec = Record::new(hoststatus_schema());
        rec.set("host_name", "web01");
        rec.set("current_state", "0");
        assert_eq!(
            rec.render(),
            "hoststatus {\n\thost_name = web01\n\tcurrent_state = 0\n\t}\n"
        );
    }

    #[test]
    fn canonical_key_value_rendering_expands_groups() {
        let schema = Arc::new(
            ObjectSchema::key_value("ROOT")
                .field("cfg_file", FieldType::GroupedList)
                .field("cfg_dir", FieldType::GroupedList),
        );
        let mut rec = Record::new(schema);
        rec.set("log_file", "/var/log/nagios.log");
        rec.set("cfg_file", "/etc/nagios/hosts.cfg");
        if let Some(v) = rec.fields.get_mut("cfg_file") {
            v.fold_repeat(Value::text("/etc/nagios/services.cfg"));
        }
        assert_eq!(
            rec.render(),
            "log_file=/var/log/nagios.log\ncfg_file=/etc/nagios/hosts.cfg\ncfg_file=/etc/nagios/services.cfg\n"
        );
    }

    #[test]
    fn key_description_formats() {
        let mut rec = Record::new(host_schema());
        rec.set("host_name", "web01");
        assert_eq!(rec.key_description(), "host_name='web01'");

        let anon = Record::new(Arc::new(ObjectSchema::status("info")));
        assert!(anon.key_description().starts_with("__id='"));
    }

    #[test]
    fn structure_roundtrip_shape() {
        let mut rec = Record::new(hoststatus_schema());
        rec.set("host_name", "web01");
        let s = rec.to_structure();
        assert_eq!(s.kind, "hoststatus");
        assert_eq!(s.id.as_ref(), Some(rec.id()));
        let json = serde_json::to_string(&s).unwrap();
        let back: Structure = serde_json::from_str(&json).unwrap();
        assert_eq!(back.fields.get("host_name"), rec.get("host_name"));
    }
}
