//! nagdata - Indexed, format-preserving access to Nagios object and status files
//!
//! This crate keeps an in-memory, indexed representation of the records in a
//! monitoring configuration — object definitions, the status file, the main
//! configuration — and writes edits back without disturbing a byte of the
//! text the user did not change: comments, blank lines, padding and block
//! order all survive a load/save round trip.
//!
//! # Architecture
//!
//! The codebase is layered; each layer only reaches down:
//!
//! - [`api`] - Facade owning both collections, saving, reload reconciliation
//! - [`reconcile`] - Staleness detection and daemon-log watching
//! - [`files`] - File handles, provenance stamping, backup-then-write saves
//! - [`parse`] - Tokenizer for the block dialects and the log-line form
//! - [`layout`] - Per-record layout model driving format-preserving output
//! - [`core`] - Records, schemas, the indexed collection, the kind registry
//!
//! # Correctness Invariants
//!
//! 1. No two members of an indexed collection ever share a primary key
//! 2. Index buckets always agree with member attribute values
//! 3. A rejected mutation leaves records and indexes untouched
//! 4. Re-serializing an unmodified record reproduces its original bytes
//!
//! # Example
//!
//! ```no_run
//! use nagdata::api::NagData;
//! use nagdata::core::types::Value;
//!
//! let mut data = NagData::open("/etc/nagios/nagios.cfg").unwrap();
//!
//! let web = data.get("host", &[("host_name", Value::text("web01"))]).unwrap();
//! let id = web.id().clone();
//!
//! data.set(&id, "address", "10.0.0.9").unwrap();
//! data.save_object(&id, None).unwrap();
//! ```

pub mod api;
pub mod core;
pub mod files;
pub mod layout;
pub mod parse;
pub mod reconcile;
