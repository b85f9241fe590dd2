//! core::registry
//!
//! Explicit kind → schema registry.
//!
//! # Architecture
//!
//! A [`Registry`] is built once at startup — usually [`Registry::builtin`] —
//! and passed by reference (or behind an `Arc`) to everything that
//! constructs records by kind. There is no ambient global registry: two
//! registries with different kind sets can coexist in one process.
//!
//! Unknown kinds are not an error when assembling parsed input; the element
//! is skipped, which keeps loading tolerant of block types added by newer
//! daemon versions.
//!
//! # Example
//!
//! ```
//! use nagdata::core::registry::Registry;
//!
//! let registry = Registry::builtin();
//! let mut host = registry.new_record("host").unwrap();
//! host.set("host_name", "web01");
//! assert!(host.id().is_keyed());
//!
//! assert!(registry.new_record("made-up-kind").is_none());
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

use super::record::{Record, Structure};
use super::schema::{FieldType, ObjectSchema};
use super::types::PrimaryKey;
use crate::layout::Layout;

/// Kind tag of the synthetic record holding a main configuration file's
/// top-level `name=value` attributes.
pub const ROOT_KIND: &str = "ROOT";

/// Kind tag of verbatim-formatting records (comments and blank runs between
/// blocks), which round-trip through their captured layout.
pub const VERBATIM_KIND: &str = "__verbatim__";

/// Errors from registry operations.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The structure names a kind this registry does not know.
    #[error("record kind '{kind}' is not registered")]
    UnknownKind { kind: String },
}

/// Kind → schema mapping used to construct records.
#[derive(Debug, Default)]
pub struct Registry {
    schemas: HashMap<String, Arc<ObjectSchema>>,
}

impl Registry {
    /// An empty registry. Register schemas with [`Registry::register`].
    pub fn new() -> Self {
        Self::default()
    }

    /// The full built-in kind set: object-definition kinds, status kinds,
    /// the main-configuration root and the verbatim-formatting kind.
    pub fn builtin() -> Self {
        let mut r = Self::new();

        // Object definitions.
        r.register(
            ObjectSchema::define("host")
                .primary_key(PrimaryKey::composite(["host_name", "name"]))
                .tags(["address", "alias"]),
        );
        r.register(
            ObjectSchema::define("hostgroup")
                .primary_key(PrimaryKey::from("hostgroup_name"))
                .tags(["use", "name"])
                .field("members", FieldType::GroupedList),
        );
        r.register(
            ObjectSchema::define("service")
                .primary_key(PrimaryKey::composite([
                    "service_description",
                    "host_name",
                    "name",
                    "hostgroup_name",
                ]))
                .tags(["use"]),
        );
        r.register(
            ObjectSchema::define("servicegroup")
                .primary_key(PrimaryKey::from("servicegroup_name"))
                .tags(["alias"])
                .field("members", FieldType::GroupedPairList),
        );
        r.register(
            ObjectSchema::define("contact")
                .primary_key(PrimaryKey::composite(["contact_name", "name"]))
                .tags(["alias"]),
        );
        r.register(
            ObjectSchema::define("contactgroup")
                .primary_key(PrimaryKey::from("contactgroup_name"))
                .tags(["alias"])
                .field("members", FieldType::GroupedList),
        );
        r.register(ObjectSchema::define("servicedependency").primary_key(
            PrimaryKey::composite([
                "host_name",
                "service_description",
                "dependent_host_name",
                "dependent_description",
            ]),
        ));
        r.register(
            ObjectSchema::define("serviceescalation")
                .primary_key(PrimaryKey::composite(["host_name", "service_description"])),
        );
        r.register(
            ObjectSchema::define("hostdependency")
                .primary_key(PrimaryKey::composite(["host_name", "dependent_host_name"]))
                .tags(["hostgroup_name"]),
        );
        r.register(ObjectSchema::define("hostescalation").tags(["host_name", "hostgroup_name"]));
        r.register(ObjectSchema::define("hostextinfo").primary_key(PrimaryKey::from("host_name")));
        r.register(
            ObjectSchema::define("serviceextinfo")
                .primary_key(PrimaryKey::from("service_description")),
        );
        r.register(
            ObjectSchema::define("timeperiod")
                .primary_key(PrimaryKey::from("timeperiod_name"))
                .tags(["alias"]),
        );
        r.register(ObjectSchema::define("command").primary_key(PrimaryKey::from("command_name")));

        // Status blocks. The daemon writes exactly one info and one
        // programstatus block; keying them by kind lets reloads match the
        // live instance.
        r.register(ObjectSchema::status("info").singleton());
        r.register(ObjectSchema::status("programstatus").singleton());
        r.register(
            ObjectSchema::status("hoststatus")
                .primary_key(PrimaryKey::from("host_name"))
                .tags([
                    "current_state",
                    "is_flapping",
                    "has_been_checked",
                    "state_type",
                ]),
        );
        r.register(
            ObjectSchema::status("hostcomment")
                .primary_key(PrimaryKey::from("comment_id"))
                .tags(["host_name", "author"]),
        );
        r.register(
            ObjectSchema::status("servicestatus")
                .primary_key(PrimaryKey::composite(["host_name", "service_description"]))
                .tags(["is_flapping", "has_been_checked", "state_type"]),
        );
        r.register(
            ObjectSchema::status("servicecomment")
                .primary_key(PrimaryKey::from("comment_id"))
                .tags(["host_name", "service_description", "author"]),
        );
        r.register(
            ObjectSchema::status("contactstatus").primary_key(PrimaryKey::from("contact_name")),
        );

        // Main configuration root; one per loaded configuration.
        r.register(
            ObjectSchema::key_value(ROOT_KIND)
                .singleton()
                .field("cfg_file", FieldType::GroupedList)
                .field("cfg_dir", FieldType::GroupedList),
        );

        // Inter-block formatting.
        r.register(ObjectSchema::verbatim(VERBATIM_KIND));

        r
    }

    /// Register (or replace) a schema under its kind.
    pub fn register(&mut self, schema: ObjectSchema) {
        self.schemas
            .insert(schema.kind().to_string(), Arc::new(schema));
    }

    /// Look up a kind's schema.
    pub fn get(&self, kind: &str) -> Option<&Arc<ObjectSchema>> {
        self.schemas.get(kind)
    }

    /// True if the kind is registered.
    pub fn contains(&self, kind: &str) -> bool {
        self.schemas.contains_key(kind)
    }

    /// All registered kinds, unordered.
    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.schemas.keys().map(String::as_str)
    }

    /// Create an empty record of a registered kind.
    pub fn new_record(&self, kind: &str) -> Option<Record> {
        Some(Record::new(Arc::clone(self.schemas.get(kind)?)))
    }

    /// Assemble a record from one tokenizer element's parts.
    ///
    /// Returns `None` for unregistered kinds. Attribute values are coerced
    /// through the schema's field types; a repeated attribute folds into the
    /// existing value (text keeps the first occurrence, lists extend,
    /// grouped lists gain one group per occurrence). The id is computed once
    /// all attributes are in place.
    pub fn record_from_parts<I>(
        &self,
        kind: &str,
        attrs: I,
        layout: Option<Layout>,
    ) -> Option<Record>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let schema = self.schemas.get(kind)?;
        let mut record = Record::new(Arc::clone(schema));
        for (attr, raw) in attrs {
            let value = schema.coerce_raw(&attr, &raw);
            record.fold_parsed(&attr, value);
        }
        record.recompute_id();
        record.set_layout(layout);
        Some(record)
    }

    /// Rebuild a record from its interchange structure.
    ///
    /// Unlike parsing, an unknown kind is an error here: a structure is
    /// produced by this library, so a missing kind means the registries
    /// disagree. A structure without an id gets one recomputed from the
    /// primary key.
    pub fn record_from_structure(&self, structure: Structure) -> Result<Record, RegistryError> {
        let schema =
            self.schemas
                .get(&structure.kind)
                .ok_or_else(|| RegistryError::UnknownKind {
                    kind: structure.kind.clone(),
                })?;
        let mut record = Record::new(Arc::clone(schema));
        for (attr, value) in structure.fields {
            let value = schema.coerce_value(&attr, value);
            record.fold_parsed(&attr, value);
        }
        match structure.id {
            Some(id) => record.force_id(id),
            None => record.recompute_id(),
        }
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Value;
    use indexmap::IndexMap;

    #[test]
    fn builtin_covers_object_status_and_synthetic_kinds() {
        let r = Registry::builtin();
        for kind in [
            "host",
            "hostgroup",
            "service",
            "servicegroup",
            "contact",
            "contactgroup",
            "servicedependency",
            "serviceescalation",
            "hostdependency",
            "hostescalation",
            "hostextinfo",
            "serviceextinfo",
            "timeperiod",
            "command",
            "info",
            "programstatus",
            "hoststatus",
            "hostcomment",
            "servicestatus",
            "servicecomment",
            "contactstatus",
            ROOT_KIND,
            VERBATIM_KIND,
        ] {
            assert!(r.contains(kind), "missing builtin kind {kind}");
        }
    }

    #[test]
    fn unknown_kind_yields_no_record_from_parts() {
        let r = Registry::builtin();
        assert!(r
            .record_from_parts("flux-capacitor", [("a".to_string(), "b".to_string())], None)
            .is_none());
    }

    #[test]
    fn repeated_grouped_attribute_forms_groups() {
        let r = Registry::builtin();
        let record = r
            .record_from_parts(
                "hostgroup",
                [
                    ("hostgroup_name".to_string(), "web".to_string()),
                    ("members".to_string(), "a,b".to_string()),
                    ("members".to_string(), "c".to_string()),
                ],
                None,
            )
            .unwrap();
        let members = record.get("members").unwrap().as_grouped().unwrap();
        assert_eq!(members.len(), 2);
        assert_eq!(members.render(), "a,b,c");
        assert!(record.id().is_keyed());
    }

    #[test]
    fn repeated_text_attribute_keeps_first() {
        let r = Registry::builtin();
        let record = r
            .record_from_parts(
                "host",
                [
                    ("host_name".to_string(), "web01".to_string()),
                    ("alias".to_string(), "first".to_string()),
                    ("alias".to_string(), "second".to_string()),
                ],
                None,
            )
            .unwrap();
        assert_eq!(record.get("alias").unwrap().as_text(), Some("first"));
    }

    #[test]
    fn structure_roundtrip_preserves_id() {
        let r = Registry::builtin();
        let record = r
            .record_from_parts(
                "hoststatus",
                [("host_name".to_string(), "web01".to_string())],
                None,
            )
            .unwrap();
        let rebuilt = r.record_from_structure(record.to_structure()).unwrap();
        assert_eq!(rebuilt.id(), record.id());
        assert!(rebuilt.same_content(&record));
    }

    #[test]
    fn structure_without_id_recomputes() {
        let r = Registry::builtin();
        let mut fields = IndexMap::new();
        fields.insert("host_name".to_string(), Value::text("web01"));
        let structure = Structure {
            kind: "hoststatus".to_string(),
            id: None,
            fields,
        };
        let record = r.record_from_structure(structure).unwrap();
        assert!(record.id().is_keyed());

        let unknown = Structure {
            kind: "nope".to_string(),
            id: None,
            fields: IndexMap::new(),
        };
        assert!(matches!(
            r.record_from_structure(unknown),
            Err(RegistryError::UnknownKind { .. })
        ));
    }
}
