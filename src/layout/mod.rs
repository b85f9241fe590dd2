//! layout
//!
//! Per-record layout model driving format-preserving output.
//!
//! # Overview
//!
//! While scanning a source file the tokenizer records, for every block, the
//! exact sequence of text fragments it saw: literal fragments (whitespace,
//! attribute names, braces, comments, newlines) and *value slots* marking
//! where an attribute's value appeared. Each token carries the source line
//! it came from. Re-rendering an unmodified record replays the literals and
//! fills the slots from the current attribute values, reproducing the
//! original bytes exactly.
//!
//! After a record is mutated, [`Layout::resynthesized`] reconciles the token
//! sequence with the current attribute map:
//!
//! - lines bound to a deleted attribute are dropped;
//! - a grouped attribute consumes one original line per group, in order,
//!   and lines beyond the remaining group count are dropped;
//! - attributes with no original line (newly added, or group elements past
//!   the original count) get a synthesized line inserted immediately before
//!   the final line of the record (the closing brace for block syntax).
//!
//! Resynthesis is idempotent: applying it twice without further mutation
//! yields the same token sequence, and therefore the same bytes.

use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::core::schema::Syntax;
use crate::core::types::Value;

/// One unit of captured layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayoutToken {
    /// A literal text fragment, copied through verbatim.
    Literal { text: String, line: u32 },
    /// The value of `attr` as it stands at render time.
    Slot { attr: String, line: u32 },
}

impl LayoutToken {
    /// The source line this token was captured on.
    pub fn line(&self) -> u32 {
        match self {
            Self::Literal { line, .. } | Self::Slot { line, .. } => *line,
        }
    }
}

/// Ordered token sequence describing how one record was printed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Layout {
    tokens: Vec<LayoutToken>,
}

impl Layout {
    /// An empty layout.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a layout from an already-captured token sequence.
    pub fn from_tokens(tokens: Vec<LayoutToken>) -> Self {
        Self { tokens }
    }

    /// Append a literal fragment.
    pub fn push_literal(&mut self, text: impl Into<String>, line: u32) {
        self.tokens.push(LayoutToken::Literal {
            text: text.into(),
            line,
        });
    }

    /// Append a value slot.
    pub fn push_slot(&mut self, attr: impl Into<String>, line: u32) {
        self.tokens.push(LayoutToken::Slot {
            attr: attr.into(),
            line,
        });
    }

    /// The captured tokens.
    pub fn tokens(&self) -> &[LayoutToken] {
        &self.tokens
    }

    /// True if nothing was captured.
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Split the token sequence into physical lines.
    ///
    /// A line is a maximal run of consecutive tokens sharing a source line
    /// number. Synthesized lines get fresh numbers, so runs never merge
    /// across an insertion.
    fn lines(&self) -> Vec<&[LayoutToken]> {
        let mut out = Vec::new();
        let mut start = 0;
        for i in 1..self.tokens.len() {
            if self.tokens[i].line() != self.tokens[i - 1].line() {
                out.push(&self.tokens[start..i]);
                start = i;
            }
        }
        if start < self.tokens.len() {
            out.push(&self.tokens[start..]);
        }
        out
    }

    /// Reconcile the token sequence with the record's current attributes.
    ///
    /// See the module documentation for the line-level rules. `syntax`
    /// selects the template used for synthesized lines.
    pub fn resynthesized(&self, fields: &IndexMap<String, Value>, syntax: Syntax) -> Layout {
        let mut consumed: HashMap<&str, usize> = HashMap::new();
        let mut seen: HashSet<&str> = HashSet::new();

        let lines = self.lines();
        let mut kept: Vec<Vec<LayoutToken>> = Vec::new();
        let mut last_survived = false;
        for (i, line) in lines.iter().enumerate() {
            let mut rebuilt = Vec::with_capacity(line.len());
            let mut drop_line = false;
            for tok in *line {
                match tok {
                    LayoutToken::Literal { .. } => rebuilt.push(tok.clone()),
                    LayoutToken::Slot { attr, .. } => match fields.get(attr.as_str()) {
                        None => {
                            drop_line = true;
                            break;
                        }
                        Some(Value::Grouped(g)) => {
                            let n = consumed.entry(attr.as_str()).or_insert(0);
                            if *n < g.len() {
                                *n += 1;
                                rebuilt.push(tok.clone());
                            } else {
                                drop_line = true;
                                break;
                            }
                        }
                        Some(_) => {
                            seen.insert(attr.as_str());
                            rebuilt.push(tok.clone());
                        }
                    },
                }
            }
            if !drop_line {
                kept.push(rebuilt);
                last_survived = i == lines.len() - 1;
            }
        }

        // Synthesize lines for attributes the original text never carried,
        // numbered past every original line so runs stay distinct.
        let next_line = self
            .tokens
            .iter()
            .map(LayoutToken::line)
            .max()
            .unwrap_or(0)
            + 1;
        let mut fresh: Vec<Vec<LayoutToken>> = Vec::new();
        let mut line_no = next_line;
        for (attr, value) in fields {
            match value {
                Value::Grouped(g) => {
                    let start = consumed.get(attr.as_str()).copied().unwrap_or(0);
                    for _ in start..g.len() {
                        fresh.push(synthesized_line(attr, line_no, syntax));
                        line_no += 1;
                    }
                }
                _ => {
                    if !seen.contains(attr.as_str()) {
                        fresh.push(synthesized_line(attr, line_no, syntax));
                        line_no += 1;
                    }
                }
            }
        }

        // New lines land immediately before the final original line when it
        // survived (the closing literal), otherwise at the end.
        let mut tokens = Vec::new();
        let tail = if last_survived { kept.pop() } else { None };
        for line in kept {
            tokens.extend(line);
        }
        for line in fresh {
            tokens.extend(line);
        }
        if let Some(line) = tail {
            tokens.extend(line);
        }
        Layout { tokens }
    }

    /// Render the token sequence against the current attribute values.
    ///
    /// Literals are copied through; slots render the bound attribute, with
    /// grouped attributes consuming one group per slot in order. Call on the
    /// output of [`Layout::resynthesized`] after mutation; rendering the
    /// captured layout of an unmodified record reproduces the source bytes.
    pub fn render(&self, fields: &IndexMap<String, Value>) -> String {
        let mut out = String::new();
        let mut consumed: HashMap<&str, usize> = HashMap::new();
        for tok in &self.tokens {
            match tok {
                LayoutToken::Literal { text, .. } => out.push_str(text),
                LayoutToken::Slot { attr, .. } => match fields.get(attr.as_str()) {
                    Some(Value::Grouped(g)) => {
                        let n = consumed.entry(attr.as_str()).or_insert(0);
                        if let Some(group) = g.render_group(*n) {
                            out.push_str(&group);
                        }
                        *n += 1;
                    }
                    Some(v) => out.push_str(&v.render()),
                    None => {}
                },
            }
        }
        out
    }
}

/// Column the value starts at in synthesized object-definition lines,
/// counted from the attribute name in tab stops of eight.
const VALUE_COLUMN: usize = 24;

/// Tab run padding an attribute name out to the value column.
pub(crate) fn define_padding(attr: &str) -> String {
    "\t".repeat(VALUE_COLUMN.saturating_sub(attr.len()) / 8 + 1)
}

/// Build the token sequence for one synthesized attribute line.
fn synthesized_line(attr: &str, line: u32, syntax: Syntax) -> Vec<LayoutToken> {
    let mut toks = Vec::with_capacity(5);
    match syntax {
        Syntax::Define => {
            toks.push(LayoutToken::Literal {
                text: "\t".to_string(),
                line,
            });
            toks.push(LayoutToken::Literal {
                text: attr.to_string(),
                line,
            });
            toks.push(LayoutToken::Literal {
                text: define_padding(attr),
                line,
            });
        }
        Syntax::Status => {
            toks.push(LayoutToken::Literal {
                text: "\t".to_string(),
                line,
            });
            toks.push(LayoutToken::Literal {
                text: attr.to_string(),
                line,
            });
            toks.push(LayoutToken::Literal {
                text: " = ".to_string(),
                line,
            });
        }
        Syntax::KeyValue | Syntax::Verbatim => {
            toks.push(LayoutToken::Literal {
                text: attr.to_string(),
                line,
            });
            toks.push(LayoutToken::Literal {
                text: "=".to_string(),
                line,
            });
        }
    }
    toks.push(LayoutToken::Slot {
        attr: attr.to_string(),
        line,
    });
    toks.push(LayoutToken::Literal {
        text: "\n".to_string(),
        line,
    });
    toks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{GroupedList, ListValue};

    /// Layout of:
    /// ```text
    /// define host {
    ///     host_name       web01
    ///     alias           Web server   ; primary
    ///     }
    /// ```
    fn sample_layout() -> Layout {
        let mut l = Layout::new();
        l.push_literal("define", 0);
        l.push_literal(" ", 0);
        l.push_literal("host", 0);
        l.push_literal(" ", 0);
        l.push_literal("{", 0);
        l.push_literal("\n", 0);
        l.push_literal("\t", 1);
        l.push_literal("host_name", 1);
        l.push_literal("\t\t", 1);
        l.push_slot("host_name", 1);
        l.push_literal("\n", 1);
        l.push_literal("\t", 2);
        l.push_literal("alias", 2);
        l.push_literal("\t\t", 2);
        l.push_slot("alias", 2);
        l.push_literal("   ; primary", 2);
        l.push_literal("\n", 2);
        l.push_literal("\t", 3);
        l.push_literal("}", 3);
        l.push_literal("\n", 3);
        l
    }

    fn sample_fields() -> IndexMap<String, Value> {
        let mut f = IndexMap::new();
        f.insert("host_name".to_string(), Value::text("web01"));
        f.insert("alias".to_string(), Value::text("Web server"));
        f
    }

    #[test]
    fn unmodified_record_renders_original_bytes() {
        let layout = sample_layout();
        let fields = sample_fields();
        let expected =
            "define host {\n\thost_name\t\tweb01\n\talias\t\tWeb server   ; primary\n\t}\n";
        assert_eq!(layout.render(&fields), expected);
        // Resynthesis of an unmodified record changes nothing.
        let resynth = layout.resynthesized(&fields, Syntax::Define);
        assert_eq!(resynth.render(&fields), expected);
    }

    #[test]
    fn deleted_attribute_drops_its_line() {
        let layout = sample_layout();
        let mut fields = sample_fields();
        fields.shift_remove("alias");
        let out = layout.resynthesized(&fields, Syntax::Define).render(&fields);
        assert_eq!(out, "define host {\n\thost_name\t\tweb01\n\t}\n");
    }

    #[test]
    fn changed_value_touches_only_its_line() {
        let layout = sample_layout();
        let mut fields = sample_fields();
        fields.insert("host_name".to_string(), Value::text("web02"));
        let out = layout.resynthesized(&fields, Syntax::Define).render(&fields);
        assert_eq!(
            out,
            "define host {\n\thost_name\t\tweb02\n\talias\t\tWeb server   ; primary\n\t}\n"
        );
    }

    #[test]
    fn new_attribute_lands_before_closing_line() {
        let layout = sample_layout();
        let mut fields = sample_fields();
        fields.insert("address".to_string(), Value::text("10.0.0.1"));
        let out = layout.resynthesized(&fields, Syntax::Define).render(&fields);
        assert_eq!(
            out,
            "define host {\n\thost_name\t\tweb01\n\talias\t\tWeb server   ; primary\n\taddress\t\t\t10.0.0.1\n\t}\n"
        );
    }

    fn grouped_layout() -> (Layout, IndexMap<String, Value>) {
        let mut l = Layout::new();
        l.push_literal("define", 0);
        l.push_literal(" ", 0);
        l.push_literal("hostgroup", 0);
        l.push_literal(" ", 0);
        l.push_literal("{", 0);
        l.push_literal("\n", 0);
        for (line, _) in [(1, "a"), (2, "b"), (3, "c")] {
            l.push_literal("\t", line);
            l.push_literal("members", line);
            l.push_literal("\t\t", line);
            l.push_slot("members", line);
            l.push_literal("\n", line);
        }
        l.push_literal("\t", 4);
        l.push_literal("}", 4);
        l.push_literal("\n", 4);

        let mut g = GroupedList::new(ListValue::parse_plain("a1,a2"));
        g.push_group(ListValue::parse_plain("b1"));
        g.push_group(ListValue::parse_plain("c1,c2"));
        let mut f = IndexMap::new();
        f.insert("members".to_string(), Value::Grouped(g));
        (l, f)
    }

    #[test]
    fn grouped_attribute_consumes_one_line_per_group() {
        let (layout, fields) = grouped_layout();
        let out = layout.resynthesized(&fields, Syntax::Define).render(&fields);
        assert_eq!(
            out,
            "define hostgroup {\n\tmembers\t\ta1,a2\n\tmembers\t\tb1\n\tmembers\t\tc1,c2\n\t}\n"
        );
    }

    #[test]
    fn extra_group_appends_synthesized_line() {
        let (layout, mut fields) = grouped_layout();
        if let Some(Value::Grouped(g)) = fields.get_mut("members") {
            g.push_group(ListValue::parse_plain("d1"));
        }
        let out = layout.resynthesized(&fields, Syntax::Define).render(&fields);
        assert_eq!(
            out,
            "define hostgroup {\n\tmembers\t\ta1,a2\n\tmembers\t\tb1\n\tmembers\t\tc1,c2\n\tmembers\t\t\td1\n\t}\n"
        );
    }

    #[test]
    fn shrunken_group_drops_exhausted_lines() {
        let (layout, mut fields) = grouped_layout();
        let mut g = GroupedList::new(ListValue::parse_plain("a1,a2"));
        g.push_group(ListValue::parse_plain("b1"));
        fields.insert("members".to_string(), Value::Grouped(g));
        let out = layout.resynthesized(&fields, Syntax::Define).render(&fields);
        assert_eq!(
            out,
            "define hostgroup {\n\tmembers\t\ta1,a2\n\tmembers\t\tb1\n\t}\n"
        );
    }

    #[test]
    fn resynthesis_is_idempotent() {
        let (layout, mut fields) = grouped_layout();
        if let Some(Value::Grouped(g)) = fields.get_mut("members") {
            g.push_group(ListValue::parse_plain("d1"));
        }
        fields.insert("notes".to_string(), Value::text("added later"));
        let once = layout.resynthesized(&fields, Syntax::Define);
        let twice = once.resynthesized(&fields, Syntax::Define);
        assert_eq!(once, twice);
        assert_eq!(once.render(&fields), twice.render(&fields));
    }

    #[test]
    fn key_value_synthesis_uses_assignment_form() {
        let mut l = Layout::new();
        l.push_literal("# main configuration\n", 0);
        l.push_literal("log_file", 1);
        l.push_literal("=", 1);
        l.push_slot("log_file", 1);
        l.push_literal("\n", 1);

        let mut f = IndexMap::new();
        f.insert("log_file".to_string(), Value::text("/var/log/nagios.log"));
        f.insert("check_interval".to_string(), Value::text("60"));
        let out = l.resynthesized(&f, Syntax::KeyValue).render(&f);
        assert_eq!(
            out,
            "# main configuration\ncheck_interval=60\nlog_file=/var/log/nagios.log\n"
        );
    }
}
