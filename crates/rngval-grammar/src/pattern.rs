//! A small Brzozowski-derivative pattern language, the content-model core of
//! [`crate::walker::DerivativeWalker`].
//!
//! This is deliberately not a full Relax NG simplification engine (no
//! `grammar`/`define`/`ref`, no datatype libraries, no `except` name
//! classes). Two structural simplifications are documented here rather than
//! hidden:
//!
//! - [`Pattern::Choice`] and [`Pattern::Interleave`] derive against the
//!   *first* alternative that accepts the incoming token, not the full set
//!   of ambiguity-preserving alternatives a production validator would keep
//!   alive. For grammars without overlapping alternatives (the common case,
//!   and the only case this crate's own test grammars use) this is
//!   observationally identical to the full algorithm.
//! - [`Pattern::OneOrMore`] is expanded lazily, one repetition at a time,
//!   rather than kept in closed form; this is standard and not a
//!   simplification, just an implementation note.

use crate::name::{Name, NameTest};
use std::rc::Rc;

/// One attribute or element content definition. Kept separate from
/// [`Pattern`] so that an `Element` alternative can carry its own
/// self-contained attribute pattern and content pattern, matching how Relax
/// NG element content models are independent of where the element nests.
#[derive(Debug, Clone)]
pub struct ElementDef {
    pub attrs: Rc<Pattern>,
    pub content: Rc<Pattern>,
}

#[derive(Debug, Clone)]
pub enum Pattern {
    /// Matches zero tokens; always satisfiable as-is.
    Empty,
    /// Matches nothing, ever; a dead branch.
    NotAllowed,
    /// Matches a single text event carrying any string.
    Text,
    /// Matches a single text (or attribute-value) event equal to this exact
    /// string — used for attribute value patterns that require a literal.
    Value(String),
    /// A single child element with this name and its own content model.
    Element(NameTest, Rc<ElementDef>),
    /// A single attribute with this name, whose value must match the given
    /// value pattern (`Text`, `Value`, or `Empty` for a value-less marker).
    Attribute(NameTest, Rc<Pattern>),
    /// An ordered sequence of sub-patterns.
    Group(Vec<Rc<Pattern>>),
    /// An unordered sequence: each sub-pattern must occur, in any order.
    Interleave(Vec<Rc<Pattern>>),
    /// Exactly one of these alternatives.
    Choice(Vec<Rc<Pattern>>),
    /// One or more repetitions of the sub-pattern.
    OneOrMore(Rc<Pattern>),
}

pub fn empty() -> Rc<Pattern> {
    Rc::new(Pattern::Empty)
}

pub fn not_allowed() -> Rc<Pattern> {
    Rc::new(Pattern::NotAllowed)
}

pub fn text() -> Rc<Pattern> {
    Rc::new(Pattern::Text)
}

pub fn value(s: impl Into<String>) -> Rc<Pattern> {
    Rc::new(Pattern::Value(s.into()))
}

pub fn element(name: NameTest, attrs: Rc<Pattern>, content: Rc<Pattern>) -> Rc<Pattern> {
    Rc::new(Pattern::Element(name, Rc::new(ElementDef { attrs, content })))
}

pub fn attribute(name: NameTest, value_pattern: Rc<Pattern>) -> Rc<Pattern> {
    Rc::new(Pattern::Attribute(name, value_pattern))
}

pub fn group(parts: Vec<Rc<Pattern>>) -> Rc<Pattern> {
    Rc::new(Pattern::Group(parts))
}

pub fn interleave(parts: Vec<Rc<Pattern>>) -> Rc<Pattern> {
    Rc::new(Pattern::Interleave(parts))
}

pub fn choice(parts: Vec<Rc<Pattern>>) -> Rc<Pattern> {
    Rc::new(Pattern::Choice(parts))
}

pub fn one_or_more(p: Rc<Pattern>) -> Rc<Pattern> {
    Rc::new(Pattern::OneOrMore(p))
}

pub fn optional(p: Rc<Pattern>) -> Rc<Pattern> {
    choice(vec![p, empty()])
}

pub fn zero_or_more(p: Rc<Pattern>) -> Rc<Pattern> {
    optional(one_or_more(p))
}

/// `true` if `pattern` is satisfied having consumed zero further tokens.
pub fn nullable(pattern: &Pattern) -> bool {
    match pattern {
        Pattern::Empty => true,
        Pattern::NotAllowed => false,
        Pattern::Text => true,
        Pattern::Value(_) => false,
        Pattern::Element(..) => false,
        Pattern::Attribute(..) => false,
        Pattern::Group(parts) | Pattern::Interleave(parts) => parts.iter().all(|p| nullable(p)),
        Pattern::Choice(parts) => parts.iter().any(|p| nullable(p)),
        Pattern::OneOrMore(p) => nullable(p),
    }
}

/// Attempts to consume one child-element token named `name` against
/// `pattern`. On success: the remaining pattern at this nesting level, the
/// matched element's own definition, and whether the match only succeeded
/// via a wildcard name-test.
pub fn derive_element(
    pattern: &Rc<Pattern>,
    name: &Name,
) -> Option<(Rc<Pattern>, Rc<ElementDef>, bool)> {
    match pattern.as_ref() {
        Pattern::Element(test, def) => {
            if test.matches(name) {
                Some((empty(), def.clone(), test.is_wildcard()))
            } else {
                None
            }
        }
        Pattern::Group(parts) => derive_seq_element(parts, name, false),
        Pattern::Interleave(parts) => derive_seq_element(parts, name, true),
        Pattern::Choice(parts) => parts.iter().find_map(|p| derive_element(p, name)),
        Pattern::OneOrMore(inner) => {
            let (remainder, def, wildcard) = derive_element(inner, name)?;
            let continued = if nullable(&remainder) {
                choice(vec![remainder, group(vec![inner.clone(), pattern.clone()])])
            } else {
                group(vec![remainder, pattern.clone()])
            };
            Some((continued, def, wildcard))
        }
        _ => None,
    }
}

fn derive_seq_element(
    parts: &[Rc<Pattern>],
    name: &Name,
    interleaved: bool,
) -> Option<(Rc<Pattern>, Rc<ElementDef>, bool)> {
    for (i, part) in parts.iter().enumerate() {
        if let Some((remainder, def, wildcard)) = derive_element(part, name) {
            let mut rebuilt = parts.to_vec();
            rebuilt[i] = remainder;
            let rebuilt = if interleaved {
                Rc::new(Pattern::Interleave(rebuilt))
            } else {
                Rc::new(Pattern::Group(rebuilt))
            };
            return Some((rebuilt, def, wildcard));
        }
        if !interleaved && !nullable(part) {
            // Ordered group: can't skip past a non-nullable, non-matching slot.
            return None;
        }
    }
    None
}

/// Attempts to consume one attribute token named `name`. On success: the
/// remaining attrs pattern, the attribute's value pattern, and whether the
/// match only succeeded via a wildcard name-test.
pub fn derive_attribute(
    pattern: &Rc<Pattern>,
    name: &Name,
) -> Option<(Rc<Pattern>, Rc<Pattern>, bool)> {
    match pattern.as_ref() {
        Pattern::Attribute(test, value_pattern) => {
            if test.matches(name) {
                Some((empty(), value_pattern.clone(), test.is_wildcard()))
            } else {
                None
            }
        }
        Pattern::Group(parts) | Pattern::Interleave(parts) => {
            for (i, part) in parts.iter().enumerate() {
                if let Some((remainder, value_pattern, wildcard)) = derive_attribute(part, name) {
                    let mut rebuilt = parts.to_vec();
                    rebuilt[i] = remainder;
                    let rebuilt = Rc::new(match pattern.as_ref() {
                        Pattern::Interleave(_) => Pattern::Interleave(rebuilt),
                        _ => Pattern::Group(rebuilt),
                    });
                    return Some((rebuilt, value_pattern, wildcard));
                }
            }
            None
        }
        Pattern::Choice(parts) => parts.iter().find_map(|p| derive_attribute(p, name)),
        Pattern::OneOrMore(inner) => {
            let (remainder, value_pattern, wildcard) = derive_attribute(inner, name)?;
            let continued = if nullable(&remainder) {
                choice(vec![remainder, group(vec![inner.clone(), pattern.clone()])])
            } else {
                group(vec![remainder, pattern.clone()])
            };
            Some((continued, value_pattern, wildcard))
        }
        _ => None,
    }
}

/// Attempts to consume one text token. On success, the remaining pattern.
pub fn derive_text(pattern: &Rc<Pattern>) -> Option<Rc<Pattern>> {
    match pattern.as_ref() {
        Pattern::Text => Some(empty()),
        Pattern::Value(_) => None, // a literal Value pattern is attribute-only in this engine
        Pattern::Group(parts) => {
            for (i, part) in parts.iter().enumerate() {
                if let Some(remainder) = derive_text(part) {
                    let mut rebuilt = parts.to_vec();
                    rebuilt[i] = remainder;
                    return Some(group(rebuilt));
                }
                if !nullable(part) {
                    return None;
                }
            }
            None
        }
        Pattern::Interleave(parts) => {
            for (i, part) in parts.iter().enumerate() {
                if let Some(remainder) = derive_text(part) {
                    let mut rebuilt = parts.to_vec();
                    rebuilt[i] = remainder;
                    return Some(interleave(rebuilt));
                }
            }
            None
        }
        Pattern::Choice(parts) => parts.iter().find_map(derive_text),
        Pattern::OneOrMore(inner) => {
            let remainder = derive_text(inner)?;
            let continued = if nullable(&remainder) {
                choice(vec![remainder, group(vec![inner.clone(), pattern.clone()])])
            } else {
                group(vec![remainder, pattern.clone()])
            };
            Some(continued)
        }
        _ => None,
    }
}

/// Every element `NameTest` reachable as the *next* child token, used for
/// `possible()` and for composing diagnostic "expected one of" messages.
pub fn possible_elements(pattern: &Pattern, out: &mut Vec<NameTest>) {
    match pattern {
        Pattern::Element(test, _) => out.push(test.clone()),
        Pattern::Group(parts) => {
            for part in parts {
                possible_elements(part, out);
                if !nullable(part) {
                    break;
                }
            }
        }
        Pattern::Interleave(parts) | Pattern::Choice(parts) => {
            for part in parts {
                possible_elements(part, out);
            }
        }
        Pattern::OneOrMore(inner) => possible_elements(inner, out),
        _ => {}
    }
}

pub fn possible_attributes(pattern: &Pattern, out: &mut Vec<NameTest>) {
    match pattern {
        Pattern::Attribute(test, _) => out.push(test.clone()),
        Pattern::Group(parts) | Pattern::Interleave(parts) => {
            for part in parts {
                possible_attributes(part, out);
            }
        }
        Pattern::Choice(parts) => {
            for part in parts {
                possible_attributes(part, out);
            }
        }
        Pattern::OneOrMore(inner) => possible_attributes(inner, out),
        _ => {}
    }
}

/// Whether `pattern` can accept a text token somewhere at this level.
pub fn accepts_text(pattern: &Pattern) -> bool {
    match pattern {
        Pattern::Text => true,
        Pattern::Group(parts) => {
            for part in parts {
                if accepts_text(part) {
                    return true;
                }
                if !nullable(part) {
                    return false;
                }
            }
            false
        }
        Pattern::Interleave(parts) | Pattern::Choice(parts) => parts.iter().any(|p| accepts_text(p)),
        Pattern::OneOrMore(inner) => accepts_text(inner),
        _ => false,
    }
}
