//! core::types
//!
//! Strong types for the object model.
//!
//! # Types
//!
//! - [`ObjectId`] - Stable process-local record identifier
//! - [`Value`] - Tagged attribute value (text, list, grouped list)
//! - [`ListValue`] - Comma-separated list, plain or paired
//! - [`GroupedList`] - Repeatable list attribute, one group per source line
//! - [`PrimaryKey`] - Primary-key declaration for a record kind
//!
//! # Identity
//!
//! Records are addressed by [`ObjectId`], never by pointer identity. A record
//! whose kind declares a primary key gets a *keyed* id: a SHA-256 digest over
//! the kind and the primary-key attribute values, so two records with equal
//! keys always collide and a key change always moves the record to a new id.
//! A record without a primary key gets an *anonymous* id that stays stable
//! for the process lifetime.
//!
//! # Examples
//!
//! ```
//! use nagdata::core::types::{ObjectId, Value};
//!
//! let v = Value::text("web01");
//! let a = ObjectId::keyed("host", [("host_name", Some(&v))]);
//! let b = ObjectId::keyed("host", [("host_name", Some(&v))]);
//! assert_eq!(a, b);
//!
//! let c = ObjectId::anonymous();
//! let d = ObjectId::anonymous();
//! assert_ne!(c, d);
//! ```

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Stable process-local identifier for a record.
///
/// Keyed ids are content hashes of `(kind, primary-key values)` and are
/// therefore deterministic: recomputing the id of an unchanged record yields
/// the same id. Anonymous ids are random and unique per construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(String);

/// Prefix marking ids of records without a primary key.
const ANONYMOUS_PREFIX: &str = "uuid-";

impl ObjectId {
    /// Compute the keyed id for a record kind and its primary-key parts.
    ///
    /// Parts are consumed in declaration order. A part whose value is absent
    /// still contributes its attribute name plus an absence marker, so
    /// partially populated composite keys hash deterministically.
    pub fn keyed<'a, I>(kind: &str, parts: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, Option<&'a Value>)>,
    {
        let mut hasher = Sha256::new();
        hasher.update(kind.as_bytes());
        hasher.update([0xff]);
        for (attr, value) in parts {
            hasher.update(attr.as_bytes());
            hasher.update([0xfe]);
            match value {
                Some(v) => hasher.update(v.render().as_bytes()),
                None => hasher.update([0x00]),
            }
            hasher.update([0xff]);
        }
        Self(hex::encode(hasher.finalize()))
    }

    /// Create a fresh anonymous id for a record without a primary key.
    pub fn anonymous() -> Self {
        Self(format!("{}{}", ANONYMOUS_PREFIX, Uuid::new_v4().simple()))
    }

    /// True if this id was derived from primary-key values.
    pub fn is_keyed(&self) -> bool {
        !self.0.starts_with(ANONYMOUS_PREFIX)
    }

    /// Get the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Abbreviated form for log output.
    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(12)]
    }
}

impl std::fmt::Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A comma-separated list value.
///
/// `Plain` lists render each item in order; `Paired` lists hold two-element
/// tuples that render flattened, matching the on-disk form
/// (`h1,s1,h2,s2` parses to `[(h1, s1), (h2, s2)]` and renders back the same).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListValue {
    Plain(Vec<String>),
    Paired(Vec<(String, String)>),
}

impl ListValue {
    /// Parse a plain comma-separated list, trimming each item.
    pub fn parse_plain(raw: &str) -> Self {
        Self::Plain(raw.split(',').map(|s| s.trim().to_string()).collect())
    }

    /// Parse a comma-separated list as consecutive pairs.
    ///
    /// A trailing unpaired item is dropped.
    pub fn parse_paired(raw: &str) -> Self {
        let items: Vec<&str> = raw.split(',').map(str::trim).collect();
        Self::Paired(
            items
                .chunks_exact(2)
                .map(|c| (c[0].to_string(), c[1].to_string()))
                .collect(),
        )
    }

    /// Number of elements (pairs count as one element).
    pub fn len(&self) -> usize {
        match self {
            Self::Plain(v) => v.len(),
            Self::Paired(v) => v.len(),
        }
    }

    /// True if the list holds no elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Render the canonical comma-separated form.
    pub fn render(&self) -> String {
        match self {
            Self::Plain(v) => v.join(","),
            Self::Paired(v) => v
                .iter()
                .map(|(a, b)| format!("{},{}", a, b))
                .collect::<Vec<_>>()
                .join(","),
        }
    }

    /// Append all elements of `other`, keeping this list's variant when the
    /// variants disagree (mismatched input is re-chunked to fit).
    pub fn extend(&mut self, other: ListValue) {
        match (self, other) {
            (Self::Plain(a), Self::Plain(b)) => a.extend(b),
            (Self::Paired(a), Self::Paired(b)) => a.extend(b),
            (Self::Plain(a), Self::Paired(b)) => {
                for (x, y) in b {
                    a.push(x);
                    a.push(y);
                }
            }
            (Self::Paired(a), Self::Plain(b)) => {
                for c in b.chunks_exact(2) {
                    a.push((c[0].clone(), c[1].clone()));
                }
            }
        }
    }
}

/// A repeatable list attribute.
///
/// Each occurrence of the attribute in the source contributes one *group*;
/// the groups render on separate lines when the record has a captured
/// layout, and flattened into a single list otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupedList {
    groups: Vec<ListValue>,
}

impl GroupedList {
    /// Create a grouped list with one initial group.
    pub fn new(first: ListValue) -> Self {
        Self {
            groups: vec![first],
        }
    }

    /// Append a group.
    pub fn push_group(&mut self, group: ListValue) {
        self.groups.push(group);
    }

    /// The groups in source order.
    pub fn groups(&self) -> &[ListValue] {
        &self.groups
    }

    /// Number of groups.
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// True if there are no groups.
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Render a single group, if present.
    pub fn render_group(&self, index: usize) -> Option<String> {
        self.groups.get(index).map(ListValue::render)
    }

    /// Render the flattened single-line form.
    pub fn render(&self) -> String {
        self.groups
            .iter()
            .filter(|g| !g.is_empty())
            .map(ListValue::render)
            .collect::<Vec<_>>()
            .join(",")
    }

    /// All elements across groups as one list, preserving order.
    pub fn flattened(&self) -> ListValue {
        let mut iter = self.groups.iter();
        let mut acc = match iter.next() {
            Some(first) => first.clone(),
            None => ListValue::Plain(Vec::new()),
        };
        for g in iter {
            acc.extend(g.clone());
        }
        acc
    }
}

/// A typed attribute value.
///
/// The variant is decided by the attribute's declared
/// [`FieldType`](crate::core::schema::FieldType); undeclared attributes are
/// plain text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Value {
    /// Free-form text.
    Text(String),
    /// Comma-separated list.
    List(ListValue),
    /// Repeatable list, one group per source occurrence.
    Grouped(GroupedList),
}

impl Value {
    /// Convenience constructor for a text value.
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }

    /// The text content, if this is a text value.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// The list content, if this is a list value.
    pub fn as_list(&self) -> Option<&ListValue> {
        match self {
            Self::List(l) => Some(l),
            _ => None,
        }
    }

    /// The grouped content, if this is a grouped value.
    pub fn as_grouped(&self) -> Option<&GroupedList> {
        match self {
            Self::Grouped(g) => Some(g),
            _ => None,
        }
    }

    /// True if this value renders one line per group.
    pub fn is_grouped(&self) -> bool {
        matches!(self, Self::Grouped(_))
    }

    /// Render the canonical single-line text form.
    pub fn render(&self) -> String {
        match self {
            Self::Text(s) => s.clone(),
            Self::List(l) => l.render(),
            Self::Grouped(g) => g.render(),
        }
    }

    /// Fold a repeated occurrence of the same attribute into this value.
    ///
    /// Text keeps the first occurrence, lists extend, grouped lists gain the
    /// incoming groups. Used while assembling a record from parsed input
    /// where an attribute may legitimately repeat across lines.
    pub fn fold_repeat(&mut self, other: Value) {
        match (self, other) {
            (Value::Text(_), _) => {}
            (Value::List(a), Value::List(b)) => a.extend(b),
            (Value::List(a), Value::Text(t)) => a.extend(ListValue::parse_plain(&t)),
            (Value::List(_), Value::Grouped(_)) => {}
            (Value::Grouped(a), Value::Grouped(b)) => {
                for g in b.groups {
                    a.push_group(g);
                }
            }
            (Value::Grouped(a), Value::List(b)) => a.push_group(b),
            (Value::Grouped(a), Value::Text(t)) => a.push_group(ListValue::parse_plain(&t)),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.render())
    }
}

/// Primary-key declaration for a record kind.
///
/// A key is either absent, a single attribute, or an ordered tuple of
/// attributes whose combined value must be unique within a collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrimaryKey {
    None,
    Single(String),
    Composite(Vec<String>),
}

impl PrimaryKey {
    /// Create a composite key from attribute names in significance order.
    pub fn composite<I, S>(attrs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Composite(attrs.into_iter().map(Into::into).collect())
    }

    /// True if no primary key is declared.
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    /// True if `attr` is the key or one of its parts.
    pub fn contains(&self, attr: &str) -> bool {
        match self {
            Self::None => false,
            Self::Single(a) => a == attr,
            Self::Composite(parts) => parts.iter().any(|a| a == attr),
        }
    }

    /// The key attributes in declaration order.
    pub fn attrs(&self) -> &[String] {
        match self {
            Self::None => &[],
            Self::Single(a) => std::slice::from_ref(a),
            Self::Composite(parts) => parts,
        }
    }
}

impl From<&str> for PrimaryKey {
    fn from(attr: &str) -> Self {
        Self::Single(attr.to_string())
    }
}
