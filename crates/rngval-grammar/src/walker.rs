use crate::error::GrammarError;
use crate::name::{Name, NameTest};
use crate::pattern::{self, ElementDef, Pattern};
use std::collections::HashMap;
use std::rc::Rc;

/// An atomic notification fed into a [`Walker`] — see the glossary in
/// SPEC_FULL.md. `rngval-core`'s traversal state machine is the only caller.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    EnterStartTag(Name),
    AttributeName(Name),
    AttributeValue(String),
    LeaveStartTag,
    Text(String),
    EndTag(Name),
}

/// One entry in a [`Walker::possible`] result: a kind of event the walker
/// would currently accept, without committing to firing it.
#[derive(Debug, Clone, PartialEq)]
pub enum PossibleEvent {
    EnterStartTag(NameTest),
    AttributeName(NameTest),
    Text,
    EndTag,
}

impl PossibleEvent {
    /// Per the glossary: a match permitted only by a wildcard name-test.
    pub fn is_wildcard(&self) -> bool {
        match self {
            PossibleEvent::EnterStartTag(t) | PossibleEvent::AttributeName(t) => t.is_wildcard(),
            PossibleEvent::Text | PossibleEvent::EndTag => false,
        }
    }
}

/// The opaque grammar-derivative cursor this crate provides, per §1: a
/// clone-able walker that moves forward by consuming events and answers
/// "what's possible here" / "can the document end here". `rngval-core` is
/// written against this trait, not against `DerivativeWalker` directly, so a
/// host can swap in a walker backed by a real compiled Relax NG schema.
pub trait Walker: Clone {
    fn fire_event(&mut self, event: &Event) -> Result<(), Vec<GrammarError>>;
    fn possible(&self) -> Vec<PossibleEvent>;
    fn end(&mut self) -> Result<(), Vec<GrammarError>>;
    fn can_end(&self) -> bool;
    fn resolve_name(&self, prefix: &str) -> Option<String>;
    fn unresolve_name(&self, uri: &str) -> Option<String>;
}

/// A grammar: a compiled pattern tree plus a static prefix↔URI table. This
/// reference engine resolves names grammar-wide rather than per in-scope
/// `xmlns` declaration — contextual prefix resolution belongs to the tree
/// side (`rngval-core` tracks in-scope mappings itself via `enterContext`).
#[derive(Debug, Clone)]
pub struct Grammar {
    start: Rc<Pattern>,
    prefix_to_uri: HashMap<String, String>,
}

impl Grammar {
    /// `root` is the grammar's single top-level element alternative — Relax
    /// NG grammars always reduce to exactly one element pattern at the top.
    pub fn new(root_name: NameTest, root: ElementDef) -> Self {
        Self {
            start: pattern::element(root_name, root.attrs, root.content),
            prefix_to_uri: HashMap::new(),
        }
    }

    pub fn with_namespace(mut self, prefix: impl Into<String>, uri: impl Into<String>) -> Self {
        self.prefix_to_uri.insert(prefix.into(), uri.into());
        self
    }

    pub fn schema_namespaces(&self) -> Vec<String> {
        let mut uris: Vec<String> = self.prefix_to_uri.values().cloned().collect();
        uris.sort();
        uris.dedup();
        uris
    }

    pub fn new_walker(&self) -> DerivativeWalker {
        DerivativeWalker {
            prefix_to_uri: Rc::new(self.prefix_to_uri.clone()),
            stack: vec![Frame {
                attrs: pattern::empty(),
                content: self.start.clone(),
                in_attrs: false,
                pending_attribute: None,
            }],
        }
    }
}

#[derive(Debug, Clone)]
struct Frame {
    attrs: Rc<Pattern>,
    content: Rc<Pattern>,
    in_attrs: bool,
    pending_attribute: Option<(Name, Rc<Pattern>)>,
}

/// The reference [`Walker`] implementation: a persistent stack of content
/// derivatives. Cloning is a `Vec` clone of `Rc`-wrapped patterns — cheap
/// relative to replaying events from the root, per the design note in
/// SPEC_FULL.md §4.8.
#[derive(Debug, Clone)]
pub struct DerivativeWalker {
    prefix_to_uri: Rc<HashMap<String, String>>,
    stack: Vec<Frame>,
}

impl DerivativeWalker {
    fn top(&self) -> &Frame {
        self.stack.last().expect("walker stack is never empty")
    }

    fn top_mut(&mut self) -> &mut Frame {
        self.stack.last_mut().expect("walker stack is never empty")
    }
}

impl Walker for DerivativeWalker {
    fn fire_event(&mut self, event: &Event) -> Result<(), Vec<GrammarError>> {
        match event {
            Event::EnterStartTag(name) => {
                let content = self.top().content.clone();
                match pattern::derive_element(&content, name) {
                    Some((remainder, def, _wildcard)) => {
                        self.top_mut().content = remainder;
                        self.stack.push(Frame {
                            attrs: def.attrs.clone(),
                            content: def.content.clone(),
                            in_attrs: true,
                            pending_attribute: None,
                        });
                        Ok(())
                    }
                    None => {
                        let mut expected = Vec::new();
                        pattern::possible_elements(&content, &mut expected);
                        Err(vec![GrammarError::OutOfPlaceElement {
                            name: name.clone(),
                            expected,
                        }])
                    }
                }
            }
            Event::AttributeName(name) => {
                let attrs = self.top().attrs.clone();
                match pattern::derive_attribute(&attrs, name) {
                    Some((remainder, value_pattern, _wildcard)) => {
                        let top = self.top_mut();
                        top.attrs = remainder;
                        top.pending_attribute = Some((name.clone(), value_pattern));
                        Ok(())
                    }
                    None => {
                        self.top_mut().pending_attribute = None;
                        Err(vec![GrammarError::AttributeNotAllowed { name: name.clone() }])
                    }
                }
            }
            Event::AttributeValue(value) => {
                let Some((name, value_pattern)) = self.top_mut().pending_attribute.take() else {
                    return Ok(()); // the attributeName already failed; avoid double-reporting
                };
                match value_pattern.as_ref() {
                    Pattern::Text => Ok(()),
                    Pattern::Value(expected) if expected == value => Ok(()),
                    Pattern::Empty if value.is_empty() => Ok(()),
                    _ => Err(vec![GrammarError::WrongAttributeValue {
                        name,
                        value: value.clone(),
                    }]),
                }
            }
            Event::LeaveStartTag => {
                let top = self.top_mut();
                let ok = pattern::nullable(&top.attrs);
                top.in_attrs = false;
                if ok {
                    Ok(())
                } else {
                    Err(vec![GrammarError::MissingAttribute])
                }
            }
            Event::Text(value) => {
                let content = self.top().content.clone();
                match pattern::derive_text(&content) {
                    Some(remainder) => {
                        self.top_mut().content = remainder;
                        Ok(())
                    }
                    None => {
                        let _ = value;
                        Err(vec![GrammarError::TextNotAllowed])
                    }
                }
            }
            Event::EndTag(_name) => {
                let content = self.top().content.clone();
                let result = if pattern::nullable(&content) {
                    Ok(())
                } else {
                    let mut expected = Vec::new();
                    pattern::possible_elements(&content, &mut expected);
                    Err(vec![GrammarError::MissingElement { expected }])
                };
                self.stack.pop();
                result
            }
        }
    }

    fn possible(&self) -> Vec<PossibleEvent> {
        let top = self.top();
        let mut out = Vec::new();
        if top.in_attrs {
            let mut names = Vec::new();
            pattern::possible_attributes(&top.attrs, &mut names);
            out.extend(names.into_iter().map(PossibleEvent::AttributeName));
        } else {
            let mut names = Vec::new();
            pattern::possible_elements(&top.content, &mut names);
            out.extend(names.into_iter().map(PossibleEvent::EnterStartTag));
            if pattern::accepts_text(&top.content) {
                out.push(PossibleEvent::Text);
            }
            if pattern::nullable(&top.content) {
                out.push(PossibleEvent::EndTag);
            }
        }
        out
    }

    fn end(&mut self) -> Result<(), Vec<GrammarError>> {
        if self.stack.len() == 1 && pattern::nullable(&self.top().content) {
            Ok(())
        } else {
            let mut expected = Vec::new();
            pattern::possible_elements(&self.top().content, &mut expected);
            Err(vec![GrammarError::MissingElement { expected }])
        }
    }

    fn can_end(&self) -> bool {
        self.stack.len() == 1 && pattern::nullable(&self.top().content)
    }

    fn resolve_name(&self, prefix: &str) -> Option<String> {
        self.prefix_to_uri.get(prefix).cloned()
    }

    fn unresolve_name(&self, uri: &str) -> Option<String> {
        self.prefix_to_uri
            .iter()
            .find(|(_, v)| v.as_str() == uri)
            .map(|(k, _)| k.clone())
    }
}
