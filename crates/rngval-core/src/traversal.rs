//! The per-element traversal state machine (§4.1).
//!
//! Each element the traversal visits passes through three stages in order:
//! `Contents` (of its parent, up to and including the moment its start tag
//! fires) → `StartTagAndAttributes` (its own attributes) → `Contents` (its
//! own children, down to its end tag). The document node itself only ever
//! has a `Contents` stage — it never gets a start tag of its own, so reaching
//! the end of its single child slot finishes the whole walk rather than
//! firing an `EndTag`.
//!
//! [`Traversal::step`] advances by exactly one grammar [`Event`] (or, for
//! skipped comments/PIs/namespace declarations, by zero events) so that a
//! host-driven [`cycle`](crate::scheduler) loop can bound work by step count.

use rngval_grammar::walker::{Event, PossibleEvent, Walker};
use rngval_grammar::name::Name as GrammarName;
use rngval_grammar::error::GrammarError;
use rngval_tree::{Document, NodeId, NodeKind, QName};

use crate::annotations::Annotations;
use crate::index::EventIndex;
use crate::progress::ProgressTracker;

fn to_grammar_name(name: &QName) -> GrammarName {
    GrammarName::new(name.ns.clone(), name.local.clone())
}

/// §4.7: whether `name` would currently only be admitted via a wildcard
/// name-test — true when at least one matching entry in `possible` is a
/// wildcard and none is an exact match. Shared by `step_contents`'s
/// `EnterStartTag` check and `step_attributes`'s `AttributeName` check.
fn admitted_only_by_wildcard(possible: &[PossibleEvent], name: &GrammarName, is_attribute: bool) -> bool {
    let mut matched_exact = false;
    let mut matched_wildcard = false;
    for event in possible {
        let test = match (event, is_attribute) {
            (PossibleEvent::EnterStartTag(t), false) => Some(t),
            (PossibleEvent::AttributeName(t), true) => Some(t),
            _ => None,
        };
        let Some(test) = test else { continue };
        if test.matches(name) {
            if test.is_wildcard() {
                matched_wildcard = true;
            } else {
                matched_exact = true;
            }
        }
    }
    matched_wildcard && !matched_exact
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Contents { child_index: usize },
    StartTagAndAttributes { attr_index: usize },
}

#[derive(Debug, Clone, Copy)]
struct Frame {
    node: NodeId,
    stage: Stage,
}

/// What one [`Traversal::step`] call accomplished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// An event fired (or a non-significant node was skipped); more work may
    /// remain.
    Progressed,
    /// The document's single top-level element has been fully closed and
    /// the walker's final `end()` check has run.
    Finished,
}

/// Where traversal currently sits — used by the walker cache to decide which
/// phase key to stash a clone under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CurrentPhase {
    Contents,
    StartTagAndAttributes,
}

pub struct Traversal {
    stack: Vec<Frame>,
    progress: ProgressTracker,
    finished: bool,
    wildcard_change: Option<NodeId>,
}

impl Traversal {
    pub fn new(doc: &Document) -> Self {
        let mut progress = ProgressTracker::new();
        progress.push_level(doc.children(doc.document_node()).len());
        Self {
            stack: vec![Frame {
                node: doc.document_node(),
                stage: Stage::Contents { child_index: 0 },
            }],
            progress,
            finished: false,
            wildcard_change: None,
        }
    }

    /// The node whose `possible-due-to-wildcard` annotation changed during
    /// the most recent [`step`](Self::step) call, if any — drained so a
    /// caller that checks after every step never double-reports one.
    pub fn take_wildcard_change(&mut self) -> Option<NodeId> {
        self.wildcard_change.take()
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn progress_fraction(&self) -> f64 {
        self.progress.fraction()
    }

    /// The node traversal is currently positioned at (the element whose
    /// contents or start tag is being processed), or `None` once finished.
    pub fn current_node(&self) -> Option<NodeId> {
        self.stack.last().map(|f| f.node)
    }

    pub fn current_phase(&self) -> Option<CurrentPhase> {
        self.stack.last().map(|f| match f.stage {
            Stage::Contents { .. } => CurrentPhase::Contents,
            Stage::StartTagAndAttributes { .. } => CurrentPhase::StartTagAndAttributes,
        })
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// The content child the next `step()` will act on, if the current frame
    /// is in its `Contents` stage and has one left. Used by the reset
    /// protocol to stop a catch-up replay exactly before a given node would
    /// be (re-)entered, without firing that node's events.
    pub fn peek_next_content_child(&self, doc: &Document) -> Option<NodeId> {
        let frame = self.stack.last()?;
        match frame.stage {
            Stage::Contents { child_index } => doc.children(frame.node).get(child_index).copied(),
            Stage::StartTagAndAttributes { .. } => None,
        }
    }

    /// How many of the current frame's content children have already been
    /// consumed, if the frame is in its `Contents` stage — used by
    /// `possible_where` to scan every position `0..=child_count()` a
    /// container could accept a new child at.
    pub fn content_child_index(&self) -> Option<usize> {
        match self.stack.last()?.stage {
            Stage::Contents { child_index } => Some(child_index),
            Stage::StartTagAndAttributes { .. } => None,
        }
    }

    fn top_mut(&mut self) -> &mut Frame {
        self.stack.last_mut().expect("traversal stack is never empty while not finished")
    }

    /// Advance by one atomic unit of work. Returns `Err` with the errors a
    /// fired event produced — the caller (the validator) is responsible for
    /// wrapping them into [`ValidationError`](crate::errors::ValidationError)
    /// records and continues driving traversal regardless, matching the
    /// reference grammar engine's own "pop and carry on" recovery (see
    /// `DerivativeWalker::fire_event`'s `EndTag` arm).
    pub fn step<W: Walker>(
        &mut self,
        doc: &Document,
        walker: &mut W,
        index: &mut EventIndex,
        annotations: &mut Annotations,
    ) -> Result<StepOutcome, Vec<GrammarError>> {
        if self.finished {
            return Ok(StepOutcome::Finished);
        }
        let frame = *self.stack.last().expect("traversal stack is never empty while not finished");
        match frame.stage {
            Stage::Contents { child_index } => self.step_contents(doc, walker, index, annotations, frame.node, child_index),
            Stage::StartTagAndAttributes { attr_index } => {
                self.step_attributes(doc, walker, index, annotations, frame.node, attr_index)
            }
        }
    }

    fn step_contents<W: Walker>(
        &mut self,
        doc: &Document,
        walker: &mut W,
        index: &mut EventIndex,
        annotations: &mut Annotations,
        node: NodeId,
        child_index: usize,
    ) -> Result<StepOutcome, Vec<GrammarError>> {
        let children = doc.children(node);
        if child_index >= children.len() {
            return self.close_contents(doc, walker, index, annotations, node);
        }
        let child = children[child_index];
        match doc.kind(child) {
            NodeKind::Element { name } => {
                let gname = to_grammar_name(name);
                let wildcard_only = admitted_only_by_wildcard(&walker.possible(), &gname, false);
                let result = walker.fire_event(&Event::EnterStartTag(gname));
                *index = index.next();
                if annotations.set_wildcard(child, wildcard_only) {
                    self.wildcard_change = Some(child);
                }
                self.top_mut().stage = Stage::Contents {
                    child_index: child_index + 1,
                };
                self.stack.push(Frame {
                    node: child,
                    stage: Stage::StartTagAndAttributes { attr_index: 0 },
                });
                result.map(|_| StepOutcome::Progressed)
            }
            NodeKind::Text(text) => {
                if text.is_empty() {
                    self.top_mut().stage = Stage::Contents {
                        child_index: child_index + 1,
                    };
                    return Ok(StepOutcome::Progressed);
                }
                let result = walker.fire_event(&Event::Text(text.to_string()));
                *index = index.next();
                self.top_mut().stage = Stage::Contents {
                    child_index: child_index + 1,
                };
                self.progress.advance();
                result.map(|_| StepOutcome::Progressed)
            }
            NodeKind::Comment(_) | NodeKind::Pi { .. } => {
                self.top_mut().stage = Stage::Contents {
                    child_index: child_index + 1,
                };
                self.progress.advance();
                Ok(StepOutcome::Progressed)
            }
            NodeKind::Document | NodeKind::Attribute { .. } => {
                unreachable!("attributes and the document node are never content children")
            }
        }
    }

    fn close_contents<W: Walker>(
        &mut self,
        doc: &Document,
        walker: &mut W,
        index: &mut EventIndex,
        annotations: &mut Annotations,
        node: NodeId,
    ) -> Result<StepOutcome, Vec<GrammarError>> {
        if self.stack.len() == 1 {
            let result = walker.end();
            self.finished = true;
            return result.map(|_| StepOutcome::Finished);
        }
        let name = doc
            .element_name(node)
            .expect("a non-root Contents frame is always an element")
            .clone();
        let result = walker.fire_event(&Event::EndTag(to_grammar_name(&name)));
        *index = index.next();
        annotations.set_after(node, *index);
        self.stack.pop();
        self.progress.pop_level();
        self.progress.advance();
        result.map(|_| StepOutcome::Progressed)
    }

    fn step_attributes<W: Walker>(
        &mut self,
        doc: &Document,
        walker: &mut W,
        index: &mut EventIndex,
        annotations: &mut Annotations,
        node: NodeId,
        attr_index: usize,
    ) -> Result<StepOutcome, Vec<GrammarError>> {
        if attr_index == 0 {
            annotations.set_before_attributes(node, *index);
        }
        let attrs: Vec<NodeId> = doc.attributes(node).collect();
        if attr_index >= attrs.len() {
            let result = walker.fire_event(&Event::LeaveStartTag);
            *index = index.next();
            annotations.set_after_start(node, *index);
            annotations.set_after_attributes(node, *index);
            let content_len = doc.children(node).len();
            self.top_mut().stage = Stage::Contents { child_index: 0 };
            self.progress.push_level(content_len);
            return result.map(|_| StepOutcome::Progressed);
        }

        let attr = attrs[attr_index];
        let NodeKind::Attribute { name, value } = doc.kind(attr) else {
            unreachable!("attributes() only yields attribute nodes")
        };

        // Namespace declarations configure the in-scope prefix mapping on
        // the host side; they are never fed to the grammar as content.
        if Document::is_namespace_declaration(name) {
            self.top_mut().stage = Stage::StartTagAndAttributes {
                attr_index: attr_index + 1,
            };
            return Ok(StepOutcome::Progressed);
        }

        let gname = to_grammar_name(name);
        let value = value.to_string();
        let wildcard_only = admitted_only_by_wildcard(&walker.possible(), &gname, true);
        let name_result = walker.fire_event(&Event::AttributeName(gname));
        *index = index.next();
        if annotations.set_wildcard(node, wildcard_only) {
            self.wildcard_change = Some(node);
        }
        if let Err(errors) = name_result {
            self.top_mut().stage = Stage::StartTagAndAttributes {
                attr_index: attr_index + 1,
            };
            return Err(errors);
        }
        let value_result = walker.fire_event(&Event::AttributeValue(value));
        *index = index.next();
        self.top_mut().stage = Stage::StartTagAndAttributes {
            attr_index: attr_index + 1,
        };
        value_result.map(|_| StepOutcome::Progressed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rngval_grammar::name::NameTest;
    use rngval_grammar::pattern;
    use rngval_grammar::walker::Grammar;

    fn doc_with_one_child(child_local: &str) -> (Document, NodeId) {
        let mut doc = Document::new();
        let root = doc.create_element(QName::local("root"));
        doc.append_child(doc.document_node(), root);
        let child = doc.create_element(QName::local(child_local));
        doc.append_child(root, child);
        (doc, root)
    }

    fn simple_grammar() -> Grammar {
        let inner = pattern::element(NameTest::Name(GrammarName::local("child")), pattern::empty(), pattern::empty());
        Grammar::new(
            NameTest::Name(GrammarName::local("root")),
            rngval_grammar::pattern::ElementDef {
                attrs: pattern::empty(),
                content: inner,
            },
        )
    }

    #[test]
    fn walks_a_well_formed_document_to_finished() {
        let (doc, _root) = doc_with_one_child("child");
        let grammar = simple_grammar();
        let mut walker = grammar.new_walker();
        let mut traversal = Traversal::new(&doc);
        let mut index = EventIndex::ZERO;
        let mut annotations = Annotations::new();

        let mut steps = 0;
        loop {
            match traversal.step(&doc, &mut walker, &mut index, &mut annotations) {
                Ok(StepOutcome::Finished) => break,
                Ok(StepOutcome::Progressed) => {}
                Err(errors) => panic!("unexpected validation errors: {errors:?}"),
            }
            steps += 1;
            assert!(steps < 100, "traversal did not terminate");
        }
        assert!(traversal.is_finished());
        assert_eq!(traversal.progress_fraction(), 1.0);
    }

    #[test]
    fn reports_an_out_of_place_element_and_keeps_going() {
        let (doc, _root) = doc_with_one_child("wrong");
        let grammar = simple_grammar();
        let mut walker = grammar.new_walker();
        let mut traversal = Traversal::new(&doc);
        let mut index = EventIndex::ZERO;
        let mut annotations = Annotations::new();

        // first step: document -> enters root's start tag (always accepted
        // at this level since root is the grammar's only alternative)
        assert!(traversal
            .step(&doc, &mut walker, &mut index, &mut annotations)
            .is_ok());
        // second step: root's LeaveStartTag (no attributes)
        assert!(traversal
            .step(&doc, &mut walker, &mut index, &mut annotations)
            .is_ok());
        // third step: enters "wrong" as root's child -> rejected
        let result = traversal.step(&doc, &mut walker, &mut index, &mut annotations);
        assert!(matches!(result, Err(ref errs) if matches!(errs[0], GrammarError::OutOfPlaceElement { .. })));
    }
}
