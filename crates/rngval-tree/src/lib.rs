//! # rngval-tree
//!
//! A minimal DOM-like arena tree: elements, attributes, text, comments, and
//! processing instructions, with parent pointers and document-order
//! children. This crate exists to give [`rngval-core`](https://docs.rs/rngval-core)
//! something concrete to validate in its own tests and examples — it is not
//! meant to replace a host application's own tree representation. `rngval-core`
//! is written against the `NodeId`/`Document` shapes here but does not require
//! them; a host with its own tree model re-implements the small set of
//! accessor methods the validator actually calls.
//!
//! ## Modules
//!
//! - [`node`] — the arena (`Document`), node identity (`NodeId`), and the
//!   borrowed [`node::NodeKind`] view used for pattern matching.
//! - [`qname`] — expanded (namespace, local-name) pairs.
//! - [`fragment`] — a minimal well-formed-XML-subset reader (`safe_parse`,
//!   `parse_fragment`), used only to build test documents and to back
//!   `speculatively_validate_fragment` in `rngval-core`.
//!
//! Text nodes are kept normalized (no adjacent or empty text nodes) by
//! construction — see [`node::Document::append_child`].

pub mod fragment;
pub mod node;
pub mod qname;

pub use fragment::{parse_fragment, safe_parse, ParsingError};
pub use node::{Document, NodeId, NodeKind};
pub use qname::QName;
