//! # rngval-grammar
//!
//! A small reference grammar engine: a Brzozowski-derivative pattern
//! language ([`pattern`]) and the [`walker::Walker`] trait/[`walker::DerivativeWalker`]
//! implementation `rngval-core` drives.
//!
//! This crate stands in for "a pre-compiled Relax NG grammar" per SPEC_FULL.md
//! §1 and §4.8. It is intentionally small: no `grammar`/`define`/`ref`
//! composition, no datatype libraries, no `except` name classes. Production
//! users of `rngval-core` are expected to implement [`walker::Walker`] against
//! their own compiled schema (e.g. a real Relax NG or XSD engine) — this
//! crate exists so `rngval-core` has something concrete to validate against
//! in its own test suite and so this repository demonstrates a working
//! end-to-end example.
//!
//! ## Building a grammar
//!
//! ```
//! use rngval_grammar::name::{Name, NameTest};
//! use rngval_grammar::pattern::{self, ElementDef};
//! use rngval_grammar::walker::{Event, Grammar, Walker};
//!
//! // <a><b/></a>
//! let b = pattern::element(NameTest::Name(Name::local("b")), pattern::empty(), pattern::empty());
//! let grammar = Grammar::new(
//!     NameTest::Name(Name::local("a")),
//!     ElementDef { attrs: pattern::empty(), content: b },
//! );
//!
//! let mut walker = grammar.new_walker();
//! walker.fire_event(&Event::EnterStartTag(Name::local("a"))).unwrap();
//! walker.fire_event(&Event::LeaveStartTag).unwrap();
//! walker.fire_event(&Event::EnterStartTag(Name::local("b"))).unwrap();
//! walker.fire_event(&Event::LeaveStartTag).unwrap();
//! walker.fire_event(&Event::EndTag(Name::local("b"))).unwrap();
//! walker.fire_event(&Event::EndTag(Name::local("a"))).unwrap();
//! walker.end().unwrap();
//! ```

pub mod error;
pub mod name;
pub mod pattern;
pub mod walker;

pub use error::GrammarError;
pub use name::{Name, NameTest};
pub use walker::{DerivativeWalker, Event, Grammar, PossibleEvent, Walker};
