//! parse
//!
//! Turning file text into record batches.
//!
//! # Modules
//!
//! - [`tokenizer`] - Line-oriented scanner for the block dialects
//! - [`log`] - The `[unix-timestamp] message` log-line form
//!
//! # Pipeline
//!
//! The scanner yields one element per top-level block; assembly looks each
//! element's kind up in the registry and builds a [`Record`] with coerced
//! attribute values and the captured layout attached. Unknown kinds are
//! skipped silently so newer daemon block types don't break loading; a
//! syntax error aborts the whole input (no partial batch).

pub mod log;
pub mod tokenizer;

use std::path::PathBuf;

use ::log::debug;
use thiserror::Error;

use crate::core::collection::Batch;
use crate::core::registry::Registry;

use self::tokenizer::RawElement;

/// Errors from parsing.
#[derive(Debug, Error)]
pub enum ParseError {
    /// The input violates the block grammar.
    #[error("syntax error{} at line {line}: {message}", fmt_path(.path))]
    Syntax {
        /// Source file, filled in by the file layer before re-raising.
        path: Option<PathBuf>,
        line: u32,
        message: String,
    },
}

fn fmt_path(path: &Option<PathBuf>) -> String {
    match path {
        Some(p) => format!(" in {}", p.display()),
        None => String::new(),
    }
}

impl ParseError {
    /// Annotate the error with the file it came from.
    pub fn with_path(self, path: impl Into<PathBuf>) -> Self {
        match self {
            Self::Syntax { line, message, .. } => Self::Syntax {
                path: Some(path.into()),
                line,
                message,
            },
        }
    }
}

/// Parse an object-definition file into a batch of records.
pub fn parse_objects(registry: &Registry, input: &str) -> Result<Batch, ParseError> {
    assemble(registry, tokenizer::scan_objects(input)?)
}

/// Parse a status file into a batch of records.
pub fn parse_status(registry: &Registry, input: &str) -> Result<Batch, ParseError> {
    assemble(registry, tokenizer::scan_status(input)?)
}

/// Parse a main configuration file.
///
/// The batch holds the synthetic root record first, followed by nothing:
/// the whole file, formatting included, belongs to the root's layout.
pub fn parse_main_config(registry: &Registry, input: &str) -> Result<Batch, ParseError> {
    assemble(registry, tokenizer::scan_main_config(input)?)
}

fn assemble(registry: &Registry, elements: Vec<RawElement>) -> Result<Batch, ParseError> {
    let mut batch = Batch::new();
    for element in elements {
        match registry.record_from_parts(&element.record_kind, element.attrs, element.layout) {
            Some(record) => batch.push(record),
            None => debug!("skipping block of unregistered kind '{}'", element.record_kind),
        }
    }
    Ok(batch)
}
