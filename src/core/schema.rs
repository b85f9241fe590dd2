//! core::schema
//!
//! Explicit per-kind schemas.
//!
//! A schema declares everything the store needs to know about one record
//! kind: its primary key, which attributes are indexed for filtering, how
//! each declared attribute parses and re-renders, and which textual syntax
//! the kind uses when no captured layout is available.
//!
//! # Example
//!
//! ```
//! use nagdata::core::schema::{FieldType, ObjectSchema};
//! use nagdata::core::types::PrimaryKey;
//!
//! let schema = ObjectSchema::define("hostgroup")
//!     .primary_key(PrimaryKey::from("hostgroup_name"))
//!     .tags(["use", "name"])
//!     .field("members", FieldType::GroupedList);
//!
//! assert!(schema.is_primary_key("hostgroup_name"));
//! assert!(schema.field_type("members").is_grouped());
//! assert_eq!(schema.field_type("alias"), FieldType::Text);
//! ```

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use super::types::{GroupedList, ListValue, PrimaryKey, Value};

/// Reserved attribute name addressing the bookkeeping id.
///
/// Not a real attribute: it cannot appear in parsed input (attribute names
/// never start with `_`), but it counts as part of the primary key for
/// [`ObjectSchema::is_primary_key`].
pub const ID_ATTR: &str = "__id";

/// Textual syntax used when a record has no captured layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Syntax {
    /// `define <kind> { ... }` object-definition blocks.
    Define,
    /// `<kind> { name = value }` status blocks.
    Status,
    /// Top-level `name=value` lines (the main configuration file).
    KeyValue,
    /// Pure formatting replayed from layout (comments, blank runs).
    Verbatim,
}

/// Typed parser/formatter for one attribute.
///
/// Declared per attribute in the kind's schema; attributes without a
/// declaration are [`FieldType::Text`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    /// Raw text, kept verbatim.
    Text,
    /// Comma-separated list.
    List,
    /// Comma-separated list read as consecutive pairs.
    PairList,
    /// Repeatable plain list; each source occurrence is one group.
    GroupedList,
    /// Repeatable pair list; each source occurrence is one group.
    GroupedPairList,
}

impl FieldType {
    /// Parse a raw string into a value of this type.
    pub fn parse(&self, raw: &str) -> Value {
        match self {
            Self::Text => Value::Text(raw.to_string()),
            Self::List => Value::List(ListValue::parse_plain(raw)),
            Self::PairList => Value::List(ListValue::parse_paired(raw)),
            Self::GroupedList => Value::Grouped(GroupedList::new(ListValue::parse_plain(raw))),
            Self::GroupedPairList => {
                Value::Grouped(GroupedList::new(ListValue::parse_paired(raw)))
            }
        }
    }

    /// True if values of this type render one line per group.
    pub fn is_grouped(&self) -> bool {
        matches!(self, Self::GroupedList | Self::GroupedPairList)
    }
}

/// Schema for one record kind.
///
/// Constructed with the builder-style methods and registered with a
/// [`Registry`](crate::core::registry::Registry) at process start.
#[derive(Debug, Clone)]
pub struct ObjectSchema {
    kind: String,
    syntax: Syntax,
    primary_key: PrimaryKey,
    tags: HashSet<String>,
    fields: HashMap<String, FieldType>,
}

impl ObjectSchema {
    /// Schema for an object-definition kind (`define <kind> { ... }`).
    pub fn define(kind: impl Into<String>) -> Self {
        Self::new(kind, Syntax::Define)
    }

    /// Schema for a status-block kind (`<kind> { name = value }`).
    pub fn status(kind: impl Into<String>) -> Self {
        Self::new(kind, Syntax::Status)
    }

    /// Schema for a key/value kind (top-level `name=value` lines).
    pub fn key_value(kind: impl Into<String>) -> Self {
        Self::new(kind, Syntax::KeyValue)
    }

    /// Schema for a verbatim-formatting kind.
    pub fn verbatim(kind: impl Into<String>) -> Self {
        Self::new(kind, Syntax::Verbatim)
    }

    fn new(kind: impl Into<String>, syntax: Syntax) -> Self {
        Self {
            kind: kind.into(),
            syntax,
            primary_key: PrimaryKey::None,
            tags: HashSet::new(),
            fields: HashMap::new(),
        }
    }

    /// Declare the primary key.
    pub fn primary_key(mut self, key: impl Into<PrimaryKey>) -> Self {
        self.primary_key = key.into();
        self
    }

    /// Declare this kind a system-level singleton.
    ///
    /// The key is the kind itself: every record of the kind gets the same
    /// deterministic id, so reconciliation matches the single live instance
    /// instead of accumulating one per reload.
    pub fn singleton(mut self) -> Self {
        self.primary_key = PrimaryKey::Composite(Vec::new());
        self
    }

    /// Declare secondary-index attributes.
    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    /// Declare a typed attribute.
    pub fn field(mut self, attr: impl Into<String>, ty: FieldType) -> Self {
        self.fields.insert(attr.into(), ty);
        self
    }

    /// The kind tag this schema describes.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// The syntax used for canonical rendering.
    pub fn syntax(&self) -> Syntax {
        self.syntax
    }

    /// The declared primary key.
    pub fn key(&self) -> &PrimaryKey {
        &self.primary_key
    }

    /// The declared secondary-index attribute set (tags only, without the
    /// primary-key attributes that are indexed implicitly).
    pub fn tag_set(&self) -> &HashSet<String> {
        &self.tags
    }

    /// True if `attr` is indexed for filtering.
    ///
    /// Primary-key attributes are always indexed, so records can be looked
    /// up by the fields that identify them.
    pub fn is_tag(&self, attr: &str) -> bool {
        self.tags.contains(attr) || self.primary_key.contains(attr)
    }

    /// Every indexed attribute: declared tags plus primary-key parts.
    pub fn indexed_attrs(&self) -> impl Iterator<Item = &str> {
        self.tags.iter().map(String::as_str).chain(
            self.primary_key
                .attrs()
                .iter()
                .map(String::as_str)
                .filter(|a| !self.tags.contains(*a)),
        )
    }

    /// The declared type of an attribute, defaulting to text.
    pub fn field_type(&self, attr: &str) -> FieldType {
        self.fields.get(attr).copied().unwrap_or(FieldType::Text)
    }

    /// True if `attr` is the primary key, part of it, or the bookkeeping id.
    pub fn is_primary_key(&self, attr: &str) -> bool {
        attr == ID_ATTR || self.primary_key.contains(attr)
    }

    /// Parse a raw attribute string according to its declared type.
    pub fn coerce_raw(&self, attr: &str, raw: &str) -> Value {
        self.field_type(attr).parse(raw)
    }

    /// Coerce an already-typed value to the attribute's declared type.
    ///
    /// Text assigned to a list-typed attribute is parsed; a value already of
    /// the declared shape passes through unchanged. A plain list assigned to
    /// a grouped attribute becomes a single group.
    pub fn coerce_value(&self, attr: &str, value: Value) -> Value {
        let ty = self.field_type(attr);
        match (ty, value) {
            (FieldType::Text, v) => v,
            (_, Value::Text(s)) => ty.parse(&s),
            (FieldType::List | FieldType::PairList, v @ Value::List(_)) => v,
            (FieldType::List | FieldType::PairList, Value::Grouped(g)) => {
                Value::List(g.flattened())
            }
            (FieldType::GroupedList | FieldType::GroupedPairList, Value::List(l)) => {
                Value::Grouped(GroupedList::new(l))
            }
            (FieldType::GroupedList | FieldType::GroupedPairList, v @ Value::Grouped(_)) => v,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_type_parsing() {
        assert_eq!(
            FieldType::Text.parse("a,b"),
            Value::Text("a,b".to_string())
        );
        assert_eq!(
            FieldType::List.parse("a, b"),
            Value::List(ListValue::Plain(vec!["a".into(), "b".into()]))
        );
        let grouped = FieldType::GroupedPairList.parse("h1,s1,h2,s2");
        let g = grouped.as_grouped().unwrap();
        assert_eq!(g.len(), 1);
        assert_eq!(g.render(), "h1,s1,h2,s2");
    }

    #[test]
    fn key_attributes_are_indexed_implicitly() {
        let schema = ObjectSchema::define("host")
            .primary_key(PrimaryKey::composite(["host_name", "name"]))
            .tags(["address", "name"]);
        assert!(schema.is_tag("address"));
        assert!(schema.is_tag("host_name"));
        assert!(schema.is_tag("name"));
        assert!(!schema.is_tag("alias"));

        let mut indexed: Vec<&str> = schema.indexed_attrs().collect();
        indexed.sort_unstable();
        assert_eq!(indexed, ["address", "host_name", "name"]);
    }

    #[test]
    fn singleton_key_is_empty_composite() {
        let schema = ObjectSchema::status("info").singleton();
        assert!(!schema.is_primary_key("created"));
        assert_eq!(schema.key().attrs().len(), 0);
        assert!(!schema.key().is_none());
    }

    #[test]
    fn primary_key_includes_bookkeeping_id() {
        let schema = ObjectSchema::define("host")
            .primary_key(PrimaryKey::composite(["host_name", "name"]));
        assert!(schema.is_primary_key("host_name"));
        assert!(schema.is_primary_key("name"));
        assert!(schema.is_primary_key(ID_ATTR));
        assert!(!schema.is_primary_key("alias"));
    }

    #[test]
    fn coerce_text_into_declared_list() {
        let schema = ObjectSchema::define("hostgroup").field("members", FieldType::GroupedList);
        let v = schema.coerce_value("members", Value::text("a,b"));
        assert_eq!(v.as_grouped().unwrap().render(), "a,b");

        // Undeclared attributes stay text.
        let v = schema.coerce_value("alias", Value::text("a,b"));
        assert_eq!(v.as_text(), Some("a,b"));
    }

    #[test]
    fn coerce_list_into_grouped_forms_single_group() {
        let schema = ObjectSchema::define("hostgroup").field("members", FieldType::GroupedList);
        let v = schema.coerce_value(
            "members",
            Value::List(ListValue::parse_plain("a,b,c")),
        );
        assert_eq!(v.as_grouped().unwrap().len(), 1);
    }
}
