//! An incremental, pausable validator for tree-shaped documents against a
//! Relax-NG-like content model.
//!
//! # Overview
//!
//! A [`Validator`](validator::Validator) walks a [`rngval_tree::Document`]
//! one atomic event at a time, driving a [`rngval_grammar::walker::Walker`]
//! forward. Traversal ([`traversal`]) is cooperative: a host calls
//! [`Validator::cycle`](validator::Validator::cycle) with a time budget, and
//! the engine stops as soon as it's spent, leaving enough state behind
//! ([`annotations`], [`cache`]) to resume exactly where it left off or to
//! answer point-in-time queries ([`query`]) without disturbing that state.
//!
//! When the host tells the engine a subtree changed, [`reset`] discards
//! everything downstream of the change and [`Validator::reset_to`] replays
//! back up to it, so the next `cycle()` redoes only the invalidated part.
//!
//! # Example
//!
//! ```
//! use rngval_core::validator::{Validator, ValidatorOptions};
//! use rngval_grammar::name::{Name, NameTest};
//! use rngval_grammar::pattern::{self, ElementDef};
//! use rngval_grammar::walker::{DerivativeWalker, Grammar};
//! use rngval_tree::{Document, QName};
//! use std::time::Duration;
//!
//! let item = pattern::element(NameTest::Name(Name::local("item")), pattern::empty(), pattern::empty());
//! let grammar = Grammar::new(
//!     NameTest::Name(Name::local("list")),
//!     ElementDef { attrs: pattern::empty(), content: pattern::zero_or_more(item) },
//! );
//!
//! let mut doc = Document::new();
//! let list = doc.create_element(QName::local("list"));
//! doc.append_child(doc.document_node(), list);
//! let item_node = doc.create_element(QName::local("item"));
//! doc.append_child(list, item_node);
//!
//! let mut validator: Validator<DerivativeWalker> =
//!     Validator::new(&doc, grammar, ValidatorOptions::default());
//! validator.start();
//! validator.cycle(&doc, Duration::from_millis(50)).unwrap();
//! assert!(validator.errors().is_empty());
//! ```

pub mod annotations;
pub mod cache;
pub mod errors;
pub mod events;
pub mod fragment;
pub mod index;
pub mod progress;
pub mod query;
pub mod reset;
pub mod scheduler;
pub mod traversal;
pub mod validator;

pub use errors::{EngineError, ValidationError};
pub use events::{EventBus, EventName, EventPayload, ListenerAction, ListenerId};
pub use index::EventIndex;
pub use progress::{Progress, WorkingState};
pub use validator::{Validator, ValidatorOptions};
