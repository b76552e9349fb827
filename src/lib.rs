//! zotindex - citation-key completion and note export for a Zotero library.
//!
//! zotindex reads a Zotero library together with the citation keys that the
//! Better BibTeX plugin keeps for it. From these it builds an in-memory
//! [`ReferenceIndex`]. The index answers several kinds of request:
//! completion of partial keys, attachment and record lookups, and markdown
//! export of PDF annotations and notes with inline `[@key]` citations.
//!
//! Both stores are read through private snapshots. Zotero locks its live
//! database while it runs, and the snapshots avoid that lock.
//!
//! # Quick start
//!
//! ```no_run
//! use zotindex::{Engine, EngineOptions};
//!
//! let mut engine = Engine::open(&EngineOptions::default()).unwrap();
//! for line in engine.matches("lee", "notes/graphs.md") {
//!     println!(
//!         "{} {} {}",
//!         line.citation_key, line.author_summary, line.label
//!     );
//! }
//! ```

pub mod annotations;
pub mod cli;
pub mod collections;
pub mod config;
pub mod config_db;
pub mod converter;
pub mod data_dir;
pub mod engine;
pub mod error;
pub mod index;
pub mod matcher;
pub mod mcp;
pub mod notes;
pub mod reference;
pub mod resolver;
pub mod snapshot;

#[cfg(test)]
mod fixtures;

pub use config_db::ConfigDb;
pub use data_dir::DataDir;
pub use engine::{Engine, EngineOptions};
pub use error::{Error, Result};
pub use index::ReferenceIndex;
pub use reference::Reference;
pub use resolver::AttachmentLookup;
