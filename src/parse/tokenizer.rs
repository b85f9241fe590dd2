//! parse::tokenizer
//!
//! Line-oriented scanner for the three textual dialects.
//!
//! # Grammars
//!
//! - *Object*: `define <kind> {` followed by `name<ws>value` attribute
//!   lines, closed by `}`.
//! - *Status*: `<kind> {` followed by `name = value` attribute lines,
//!   closed by `}`. The main configuration file reuses the status attribute
//!   grammar but starts directly in attribute state, collecting top-level
//!   `name=value` lines into a synthetic root element.
//!
//! # Output
//!
//! One [`RawElement`] per top-level block. Real elements carry the block's
//! attribute pairs plus a [`Layout`] capturing every literal fragment and
//! value slot in source order; runs of pure formatting between blocks
//! (comments, blank lines) become *imaginary* elements whose layout replays
//! them verbatim. Concatenating the rendered layouts of all elements
//! reproduces the input bytes exactly.
//!
//! # Comments
//!
//! `#` and `;` open a comment at the start of a line (after leading
//! blanks); `;` also opens a trailing comment after a value. Attribute
//! values run from the first non-blank character to the first `;` or end of
//! line.

use crate::core::registry::{ROOT_KIND, VERBATIM_KIND};
use crate::layout::Layout;

use super::ParseError;

/// Whether an element is a real block or captured formatting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementKind {
    /// An object, status block, or the synthetic root.
    Real,
    /// Comments and blanks between blocks, kept for round-tripping.
    Imaginary,
}

/// One scanned top-level element.
#[derive(Debug)]
pub struct RawElement {
    pub kind: ElementKind,
    pub record_kind: String,
    /// Attribute pairs in source order; repeats are preserved.
    pub attrs: Vec<(String, String)>,
    pub layout: Option<Layout>,
}

/// Which block grammar the scanner applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Grammar {
    Object,
    Status,
}

/// Whether the scanner is between blocks or inside one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Block,
    Attrs,
}

/// Scan an object-definition file (`define <kind> { ... }` blocks).
pub fn scan_objects(input: &str) -> Result<Vec<RawElement>, ParseError> {
    Scanner::new(input, Grammar::Object, State::Block).run()
}

/// Scan a status file (`<kind> { name = value }` blocks).
pub fn scan_status(input: &str) -> Result<Vec<RawElement>, ParseError> {
    Scanner::new(input, Grammar::Status, State::Block).run()
}

/// Scan a main configuration file (top-level `name=value` lines).
///
/// Always yields exactly one real element of kind [`ROOT_KIND`] carrying the
/// file's attributes and full layout, even for a file of comments only.
pub fn scan_main_config(input: &str) -> Result<Vec<RawElement>, ParseError> {
    let mut elements = Scanner::new(input, Grammar::Status, State::Attrs).run()?;
    if !elements.iter().any(|e| e.kind == ElementKind::Real) {
        elements.push(RawElement {
            kind: ElementKind::Real,
            record_kind: ROOT_KIND.to_string(),
            attrs: Vec::new(),
            layout: Some(Layout::new()),
        });
    }
    Ok(elements)
}

struct Scanner<'a> {
    src: &'a [u8],
    text: &'a str,
    pos: usize,
    line: u32,
    state: State,
    grammar: Grammar,
    elements: Vec<RawElement>,
    /// Format tokens accumulated since the last flush or block close.
    pending: Layout,
}

fn is_blank(b: u8) -> bool {
    b == b' ' || b == b'\t'
}

fn is_eol(b: u8) -> bool {
    b == b'\r' || b == b'\n'
}

impl<'a> Scanner<'a> {
    fn new(input: &'a str, grammar: Grammar, state: State) -> Self {
        Self {
            src: input.as_bytes(),
            text: input,
            pos: 0,
            line: 0,
            state,
            grammar,
            elements: Vec::new(),
            pending: Layout::new(),
        }
    }

    fn run(mut self) -> Result<Vec<RawElement>, ParseError> {
        while self.pos < self.src.len() {
            self.scan_line()?;
        }
        // Leftover format: between blocks it is trailing formatting, inside
        // a block it belongs to the block that never closed (or, for the
        // attribute-first grammar, to the root).
        if !self.pending.is_empty() {
            match self.state {
                State::Block => self.flush_imaginary(),
                State::Attrs => {
                    self.ensure_open();
                    self.close_block();
                }
            }
        }
        Ok(self.elements)
    }

    fn scan_line(&mut self) -> Result<(), ParseError> {
        self.blanks();
        self.flush_imaginary();
        self.comment();
        self.flush_imaginary();
        match (self.state, self.grammar) {
            (State::Block, Grammar::Object) => self.object_header()?,
            (State::Attrs, Grammar::Object) => self.object_attr()?,
            (State::Block, Grammar::Status) => self.status_header()?,
            (State::Attrs, Grammar::Status) => self.status_attr()?,
        }
        self.post_comment();
        self.flush_imaginary();
        self.eol();
        self.flush_imaginary();
        Ok(())
    }

    fn peek(&self) -> Option<u8> {
        self.src.get(self.pos).copied()
    }

    fn take_while<F: Fn(u8) -> bool>(&mut self, keep: F) -> &'a str {
        let start = self.pos;
        while let Some(b) = self.peek() {
            if keep(b) {
                self.pos += 1;
            } else {
                break;
            }
        }
        &self.text[start..self.pos]
    }

    fn blanks(&mut self) {
        let start_line = self.line;
        let s = self.take_while(is_blank);
        if !s.is_empty() {
            self.pending.push_literal(s, start_line);
        }
    }

    fn comment(&mut self) {
        if matches!(self.peek(), Some(b'#') | Some(b';')) {
            let line = self.line;
            let s = self.take_while(|b| !is_eol(b));
            self.pending.push_literal(s, line);
        }
    }

    fn post_comment(&mut self) {
        if self.peek() == Some(b';') {
            let line = self.line;
            let s = self.take_while(|b| !is_eol(b));
            self.pending.push_literal(s, line);
        }
    }

    fn eol(&mut self) {
        let start = self.pos;
        if self.peek() == Some(b'\r') {
            self.pos += 1;
        }
        if self.peek() == Some(b'\n') {
            self.pos += 1;
        }
        if self.pos > start {
            self.pending.push_literal(&self.text[start..self.pos], self.line);
            self.line += 1;
        }
    }

    /// Emit accumulated formatting as an imaginary element.
    ///
    /// Only between blocks: inside a block the formatting belongs to the
    /// block's own layout.
    fn flush_imaginary(&mut self) {
        if self.state == State::Block && !self.pending.is_empty() {
            let layout = std::mem::take(&mut self.pending);
            self.elements.push(RawElement {
                kind: ElementKind::Imaginary,
                record_kind: VERBATIM_KIND.to_string(),
                attrs: Vec::new(),
                layout: Some(layout),
            });
        }
    }

    /// Attach accumulated formatting to the just-closed block.
    fn close_block(&mut self) {
        if let Some(element) = self.elements.last_mut() {
            element.layout = Some(std::mem::take(&mut self.pending));
        }
        self.state = State::Block;
    }

    /// Open the synthetic root when an attribute arrives with no block open.
    fn ensure_open(&mut self) {
        if self.elements.is_empty() {
            self.elements.push(RawElement {
                kind: ElementKind::Real,
                record_kind: ROOT_KIND.to_string(),
                attrs: Vec::new(),
                layout: None,
            });
        }
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError::Syntax {
            path: None,
            line: self.line,
            message: message.into(),
        }
    }

    /// Error unless the rest of the line is blanks, a comment, or the end.
    fn trailing_blanks(&mut self) -> Result<(), ParseError> {
        self.blanks();
        match self.peek() {
            None | Some(b';') => Ok(()),
            Some(b) if is_eol(b) => Ok(()),
            Some(_) => Err(self.error("Trailing characters")),
        }
    }

    fn object_header(&mut self) -> Result<(), ParseError> {
        match self.peek() {
            None => return Ok(()),
            Some(b) if is_eol(b) || is_blank(b) => return Ok(()),
            Some(_) => {}
        }
        let line = self.line;
        if !self.text[self.pos..].starts_with("define") {
            return Err(self.error("Definition should start from 'define'"));
        }
        self.pos += "define".len();
        match self.peek() {
            Some(b) if is_blank(b) => {}
            _ => return Err(self.error("Definition should start from 'define'")),
        }
        self.pending.push_literal("define", line);
        self.blanks();

        let kind = self.take_while(|b| !is_eol(b) && !is_blank(b) && b != b'{');
        if kind.is_empty() {
            return Err(self.error("'define' should be followed by object name"));
        }
        self.pending.push_literal(kind, line);
        self.blanks();

        if self.peek() != Some(b'{') {
            return Err(self.error("Definition should end with '{'"));
        }
        self.pending.push_literal("{", line);
        self.pos += 1;
        self.trailing_blanks()?;

        self.elements.push(RawElement {
            kind: ElementKind::Real,
            record_kind: kind.to_string(),
            attrs: Vec::new(),
            layout: None,
        });
        self.state = State::Attrs;
        Ok(())
    }

    fn object_attr(&mut self) -> Result<(), ParseError> {
        if self.peek() == Some(b'}') {
            let line = self.line;
            self.pending.push_literal("}", line);
            self.pos += 1;
            self.trailing_blanks()?;
            self.close_block();
            return Ok(());
        }
        let line = self.line;
        let attr = self.take_while(|b| !is_eol(b) && !is_blank(b));
        if attr.is_empty() {
            return Ok(());
        }
        self.pending.push_literal(attr, line);

        let mut value = "";
        if matches!(self.peek(), Some(b) if !is_eol(b)) {
            self.blanks();
            value = self.take_while(|b| b != b';' && !is_eol(b));
        }
        self.pending.push_slot(attr, line);

        self.ensure_open();
        if let Some(element) = self.elements.last_mut() {
            element.attrs.push((attr.to_string(), value.to_string()));
        }
        Ok(())
    }

    fn status_header(&mut self) -> Result<(), ParseError> {
        let line = self.line;
        let kind = self.take_while(|b| !is_eol(b) && !is_blank(b) && b != b'{');
        match self.peek() {
            None if kind.is_empty() => return Ok(()),
            None => return Err(self.error("Status object name should be followed by '{'")),
            Some(b) if kind.is_empty() && b != b'{' => return Ok(()),
            Some(b) if is_eol(b) => {
                return Err(self.error("Status object name should be followed by '{'"))
            }
            Some(_) => {}
        }
        self.pending.push_literal(kind, line);
        self.blanks();
        if self.peek() != Some(b'{') {
            return Err(self.error("Status object name should be followed by '{'"));
        }
        self.pending.push_literal("{", line);
        self.pos += 1;
        self.state = State::Attrs;
        self.trailing_blanks()?;

        self.elements.push(RawElement {
            kind: ElementKind::Real,
            record_kind: kind.to_string(),
            attrs: Vec::new(),
            layout: None,
        });
        Ok(())
    }

    fn status_attr(&mut self) -> Result<(), ParseError> {
        if self.peek() == Some(b'}') {
            let line = self.line;
            self.pending.push_literal("}", line);
            self.pos += 1;
            self.trailing_blanks()?;
            self.close_block();
            return Ok(());
        }
        let line = self.line;
        let attr = self.take_while(|b| !is_eol(b) && !is_blank(b) && b != b'=');
        if attr.is_empty() && self.peek() != Some(b'=') {
            return Ok(());
        }
        self.pending.push_literal(attr, line);

        let mut value = "";
        if matches!(self.peek(), Some(b) if !is_eol(b)) {
            self.blanks();
            if self.peek() != Some(b'=') {
                return Err(self.error("Argument name should be followed by '='"));
            }
            self.pending.push_literal("=", line);
            self.pos += 1;
            self.blanks();
            value = self.take_while(|b| b != b';' && !is_eol(b));
        }

        self.ensure_open();
        self.pending.push_slot(attr, line);
        if let Some(element) = self.elements.last_mut() {
            element.attrs.push((attr.to_string(), value.to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Render all elements' layouts back to text, filling slots with the
    /// captured raw values. Byte-exactness of this is what the whole layout
    /// machinery rests on. Every attribute is modelled as one group per
    /// occurrence so repeated attributes feed their slots in source order.
    fn reassemble(elements: &[RawElement]) -> String {
        use crate::core::types::{GroupedList, ListValue, Value};
        use indexmap::IndexMap;
        let mut out = String::new();
        for element in elements {
            let mut fields: IndexMap<String, Value> = IndexMap::new();
            for (attr, value) in &element.attrs {
                let group = ListValue::Plain(vec![value.clone()]);
                match fields.get_mut(attr) {
                    Some(Value::Grouped(g)) => g.push_group(group),
                    _ => {
                        fields.insert(attr.clone(), Value::Grouped(GroupedList::new(group)));
                    }
                }
            }
            if let Some(layout) = &element.layout {
                out.push_str(&layout.render(&fields));
            }
        }
        out
    }

    const OBJECTS: &str = "\
# hosts for the web tier
define host {
\thost_name\t\tweb01
\talias\t\tWeb server   ; primary
\taddress\t\t10.0.0.1
\t}

define hostgroup {
\thostgroup_name\tweb
\tmembers\t\tweb01,web02
\tmembers\t\tweb03
\t}
";

    #[test]
    fn object_file_elements_and_attrs() {
        let elements = scan_objects(OBJECTS).unwrap();
        let kinds: Vec<(&ElementKind, &str)> = elements
            .iter()
            .map(|e| (&e.kind, e.record_kind.as_str()))
            .collect();
        // comment, host, newline, hostgroup, then the trailing newline of
        // the last block lands in its own imaginary element.
        assert_eq!(elements[0].kind, ElementKind::Imaginary);
        let real: Vec<&RawElement> = elements
            .iter()
            .filter(|e| e.kind == ElementKind::Real)
            .collect();
        assert_eq!(real.len(), 2, "kinds: {kinds:?}");
        assert_eq!(real[0].record_kind, "host");
        assert_eq!(
            real[0].attrs,
            vec![
                ("host_name".to_string(), "web01".to_string()),
                ("alias".to_string(), "Web server   ".to_string()),
                ("address".to_string(), "10.0.0.1".to_string()),
            ]
        );
        assert_eq!(real[1].record_kind, "hostgroup");
        assert_eq!(real[1].attrs.len(), 3);
    }

    #[test]
    fn object_file_reassembles_byte_exact() {
        let elements = scan_objects(OBJECTS).unwrap();
        // The "alias" value keeps its trailing blanks; the "; primary"
        // comment is a literal. Grouped handling is exercised at the record
        // layer; here every slot is a plain value except repeated members.
        // Repeated members reassemble through grouped fold.
        assert_eq!(reassemble(&elements), OBJECTS);
    }

    #[test]
    fn missing_define_is_a_syntax_error() {
        let err = scan_objects("host {\n}\n").unwrap_err();
        match err {
            ParseError::Syntax { line, message, .. } => {
                assert_eq!(line, 0);
                assert!(message.contains("define"));
            }
        }
    }

    #[test]
    fn garbage_after_brace_is_a_syntax_error() {
        let err = scan_objects("define host { x\n}\n").unwrap_err();
        assert!(matches!(err, ParseError::Syntax { .. }));
    }

    const STATUS: &str = "\
# status written by the daemon
info {
\tcreated=1700000000
\tversion=4.4.6
\t}

hoststatus {
\thost_name=web01
\tcurrent_state=0
\t}
";

    #[test]
    fn status_file_scans_and_reassembles() {
        let elements = scan_status(STATUS).unwrap();
        let real: Vec<&RawElement> = elements
            .iter()
            .filter(|e| e.kind == ElementKind::Real)
            .collect();
        assert_eq!(real.len(), 2);
        assert_eq!(real[0].record_kind, "info");
        assert_eq!(
            real[0].attrs[0],
            ("created".to_string(), "1700000000".to_string())
        );
        assert_eq!(reassemble(&elements), STATUS);
    }

    #[test]
    fn status_name_without_brace_is_an_error() {
        let err = scan_status("hoststatus\n").unwrap_err();
        assert!(matches!(err, ParseError::Syntax { .. }));
    }

    const MAIN_CONFIG: &str = "\
# main configuration
log_file=/var/log/nagios/nagios.log
cfg_file=/etc/nagios/hosts.cfg
cfg_file=/etc/nagios/services.cfg

cfg_dir=/etc/nagios/conf.d
status_file=/var/log/nagios/status.dat
";

    #[test]
    fn main_config_collects_into_single_root() {
        let elements = scan_main_config(MAIN_CONFIG).unwrap();
        assert_eq!(elements.len(), 1);
        let root = &elements[0];
        assert_eq!(root.kind, ElementKind::Real);
        assert_eq!(root.record_kind, ROOT_KIND);
        assert_eq!(root.attrs.len(), 6);
        assert_eq!(
            root.attrs[2],
            ("cfg_file".to_string(), "/etc/nagios/services.cfg".to_string())
        );
        assert_eq!(reassemble(&elements), MAIN_CONFIG);
    }

    #[test]
    fn comment_only_main_config_still_yields_root() {
        let elements = scan_main_config("# nothing configured\n").unwrap();
        assert_eq!(elements.len(), 1);
        assert_eq!(elements[0].record_kind, ROOT_KIND);
        assert!(elements[0].attrs.is_empty());
        assert_eq!(reassemble(&elements), "# nothing configured\n");
    }

    #[test]
    fn empty_input_yields_bare_root_for_main_config() {
        let elements = scan_main_config("").unwrap();
        assert_eq!(elements.len(), 1);
        assert!(elements[0].attrs.is_empty());
        assert_eq!(reassemble(&elements), "");
    }

    #[test]
    fn inline_comment_stops_value_and_is_preserved() {
        let input = "define host {\n\thost_name\tweb01 ; keep me\n\t}\n";
        let elements = scan_objects(input).unwrap();
        let host = elements
            .iter()
            .find(|e| e.kind == ElementKind::Real)
            .unwrap();
        assert_eq!(host.attrs[0].1, "web01 ");
        assert_eq!(reassemble(&elements), input);
    }

    #[test]
    fn attr_without_value_gets_empty_string() {
        let input = "define host {\n\tflag\n\t}\n";
        let elements = scan_objects(input).unwrap();
        let host = elements
            .iter()
            .find(|e| e.kind == ElementKind::Real)
            .unwrap();
        assert_eq!(host.attrs[0], ("flag".to_string(), String::new()));
        assert_eq!(reassemble(&elements), input);
    }

    #[test]
    fn unclosed_block_keeps_its_layout() {
        let input = "define host {\n\thost_name\tweb01\n";
        let elements = scan_objects(input).unwrap();
        let host = elements
            .iter()
            .find(|e| e.kind == ElementKind::Real)
            .unwrap();
        assert!(host.layout.is_some());
        assert_eq!(reassemble(&elements), input);
    }

    #[test]
    fn crlf_line_endings_roundtrip() {
        let input = "define host {\r\n\thost_name\tweb01\r\n\t}\r\n";
        let elements = scan_objects(input).unwrap();
        assert_eq!(reassemble(&elements), input);
    }
}
