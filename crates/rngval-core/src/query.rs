//! Read-only queries against already-validated state (§4.6, §6).
//!
//! Every query here ([`possible_at`], [`possible_where`],
//! [`speculatively_validate`], [`resolve_name_at`], ...) rebuilds a walker
//! from a fresh grammar start and replays traversal up to the point in
//! question, so the live validator's traversal position, walker cache, and
//! annotations are never touched. This is what makes these queries safe to
//! call from inside an `error` listener mid-dispatch.
//!
//! The replay always starts from the document root rather than consulting
//! the walker cache (see `reset.rs`'s module doc for the same tradeoff
//! elsewhere) — correct, but not as fast as it could be for a query near the
//! end of a large document.

use rngval_grammar::name::Name;
use rngval_grammar::walker::{Grammar, PossibleEvent, Walker};
use rngval_tree::{Document, NodeId, ParsingError};

use crate::annotations::Annotations;
use crate::errors::{EngineError, ValidationError};
use crate::fragment::parse_standalone_fragment;
use crate::index::EventIndex;
use crate::traversal::{CurrentPhase, Traversal};

/// Scans every content position `0..=container.child_count()` and returns the
/// indices where firing `name(params)` would be accepted, per §4.6 — not a
/// synonym for "the current walker's possible set" (that's [`possible_at`]
/// with `walker.possible()`, used by callers who only care about the live
/// position). `name` is one of `"enterStartTag"`, `"attributeName"`,
/// `"text"`, `"endTag"`; `params` for the first two is `[uri, local]` with an
/// empty `uri` meaning no namespace, and is ignored for the latter two.
/// Acceptance is determined by intersecting with each position's trial
/// `possible()` set, never by actually firing the event.
pub fn possible_where<W: Walker + Clone>(
    doc: &Document,
    new_walker: impl Fn() -> W,
    container: NodeId,
    name: &str,
    params: &[String],
) -> Result<Vec<usize>, EngineError> {
    let child_count = doc.children(container).len();
    let mut hits = Vec::new();
    for position in 0..=child_count {
        let walker = replay_until(doc, &new_walker, |t| {
            t.current_node() == Some(container)
                && t.current_phase() == Some(CurrentPhase::Contents)
                && t.content_child_index() == Some(position)
        })?;
        if event_is_possible(&walker, name, params) {
            hits.push(position);
        }
    }
    Ok(hits)
}

fn event_is_possible<W: Walker>(walker: &W, name: &str, params: &[String]) -> bool {
    let possible = walker.possible();
    match name {
        "enterStartTag" => {
            let Some(target) = trial_name(params) else { return false };
            possible
                .iter()
                .any(|p| matches!(p, PossibleEvent::EnterStartTag(t) if t.matches(&target)))
        }
        "attributeName" => {
            let Some(target) = trial_name(params) else { return false };
            possible
                .iter()
                .any(|p| matches!(p, PossibleEvent::AttributeName(t) if t.matches(&target)))
        }
        "text" => possible.iter().any(|p| matches!(p, PossibleEvent::Text)),
        "endTag" => possible.iter().any(|p| matches!(p, PossibleEvent::EndTag)),
        _ => false,
    }
}

fn trial_name(params: &[String]) -> Option<Name> {
    let [uri, local] = params else { return None };
    let ns = if uri.is_empty() { None } else { Some(uri.clone()) };
    Some(Name::new(ns, local.clone()))
}

/// What's acceptable as the next content token inside `node`.
pub fn possible_at<W: Walker + Clone>(
    doc: &Document,
    new_walker: impl Fn() -> W,
    node: NodeId,
) -> Result<Vec<PossibleEvent>, EngineError> {
    Ok(walker_after_attributes(doc, new_walker, node)?.possible())
}

/// Replays from a fresh grammar walker up to the point where `node`'s own
/// start tag and attributes have just closed, returning that walker clone.
pub fn walker_after_attributes<W: Walker + Clone>(
    doc: &Document,
    new_walker: impl Fn() -> W,
    node: NodeId,
) -> Result<W, EngineError> {
    replay_until(doc, new_walker, |t| {
        t.current_node() == Some(node) && t.current_phase() == Some(CurrentPhase::Contents)
    })
}

/// Replays up to the point just after `node`'s end tag fired (or, if `node`
/// is the document's root element, the final `end()` check).
pub fn walker_after_end<W: Walker + Clone>(
    doc: &Document,
    new_walker: impl Fn() -> W,
    node: NodeId,
) -> Result<W, EngineError> {
    let mut entered = false;
    replay_until(doc, new_walker, move |t| {
        if t.current_node() == Some(node) {
            entered = true;
            return false;
        }
        entered && (t.is_finished() || t.current_node() != Some(node))
    })
}

fn replay_until<W, F>(
    doc: &Document,
    new_walker: impl Fn() -> W,
    mut stop: F,
) -> Result<W, EngineError>
where
    W: Walker + Clone,
    F: FnMut(&Traversal) -> bool,
{
    let mut walker = new_walker();
    let mut traversal = Traversal::new(doc);
    let mut index = EventIndex::ZERO;
    let mut annotations = Annotations::new();
    let budget = doc_node_budget(doc);
    let mut steps = 0usize;
    loop {
        if stop(&traversal) {
            return Ok(walker);
        }
        if traversal.is_finished() {
            return Err(EngineError::CacheCorruption);
        }
        let _ = traversal.step(doc, &mut walker, &mut index, &mut annotations);
        steps += 1;
        if steps > budget {
            return Err(EngineError::CacheCorruption);
        }
    }
}

/// An upper bound on the number of `step()` calls a full replay can take,
/// generous enough that only a genuinely unreachable target (a node from a
/// different document, say) would exhaust it.
fn doc_node_budget(doc: &Document) -> usize {
    fn count(doc: &Document, node: NodeId, acc: &mut usize) {
        *acc += 1;
        for &child in doc.children(node) {
            count(doc, child, acc);
        }
    }
    let mut acc = 0;
    count(doc, doc.document_node(), &mut acc);
    acc.saturating_mul(8).max(64)
}

/// Validates a standalone subtree against the content model `node` expects
/// next, without touching the real validator's traversal, cache, or
/// annotations.
pub fn speculatively_validate<W: Walker + Clone>(
    doc: &Document,
    new_walker: impl Fn() -> W,
    node: NodeId,
    fragment: &Document,
) -> Result<Vec<ValidationError>, EngineError> {
    let mut walker = walker_after_attributes(doc, new_walker, node)?;
    let mut traversal = Traversal::new(fragment);
    let mut index = EventIndex::ZERO;
    let mut annotations = Annotations::new();
    let mut errors = Vec::new();
    loop {
        match traversal.step(fragment, &mut walker, &mut index, &mut annotations) {
            Ok(outcome) if outcome == crate::traversal::StepOutcome::Finished => break,
            Ok(_) => {}
            Err(grammar_errors) => {
                for e in grammar_errors {
                    errors.push(ValidationError::new(e, None, None, index));
                }
            }
        }
    }
    Ok(errors)
}

/// Parses `source` as a standalone fragment, then runs
/// [`speculatively_validate`] against it.
pub fn speculatively_validate_fragment<W: Walker + Clone>(
    doc: &Document,
    new_walker: impl Fn() -> W,
    node: NodeId,
    source: &str,
) -> Result<Vec<ValidationError>, FragmentQueryError> {
    let fragment = parse_standalone_fragment(source).map_err(FragmentQueryError::Parse)?;
    speculatively_validate(doc, new_walker, node, &fragment).map_err(FragmentQueryError::Engine)
}

#[derive(Debug, thiserror::Error)]
pub enum FragmentQueryError {
    #[error(transparent)]
    Parse(#[from] ParsingError),
    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// This reference grammar resolves prefixes grammar-wide rather than per
/// in-scope `xmlns` declaration (see `Grammar`'s doc comment), so `node`'s
/// position doesn't affect the answer.
pub fn resolve_name_at(grammar: &Grammar, _node: NodeId, prefix: &str) -> Option<String> {
    grammar.new_walker().resolve_name(prefix)
}

pub fn unresolve_name_at(grammar: &Grammar, _node: NodeId, uri: &str) -> Option<String> {
    grammar.new_walker().unresolve_name(uri)
}

/// All recorded errors owned by `node`, in the order they were raised.
pub fn errors_for(errors: &[ValidationError], node: NodeId) -> Vec<&ValidationError> {
    errors.iter().filter(|e| e.node == Some(node)).collect()
}

/// Scans every element in `doc` for `xmlns`/`xmlns:*` declarations and
/// groups their URIs by prefix (`""` for the default namespace). Always a
/// fresh walk of the tree — unlike the schema's own namespace table, the
/// document's in-scope declarations can change on every edit, so nothing is
/// cached here.
pub fn document_namespaces(doc: &Document) -> std::collections::HashMap<String, Vec<String>> {
    use rngval_tree::NodeKind;

    fn prefix_of(name: &rngval_tree::QName) -> &str {
        if name.local == "xmlns" {
            ""
        } else {
            &name.local
        }
    }

    fn walk(doc: &Document, node: NodeId, out: &mut std::collections::HashMap<String, Vec<String>>) {
        if matches!(doc.kind(node), NodeKind::Element { .. }) {
            for attr in doc.attributes(node) {
                if let NodeKind::Attribute { name, value } = doc.kind(attr) {
                    if Document::is_namespace_declaration(name) {
                        out.entry(prefix_of(name).to_string())
                            .or_default()
                            .push(value.to_string());
                    }
                }
            }
        }
        for &child in doc.children(node) {
            walk(doc, child, out);
        }
    }

    let mut out = std::collections::HashMap::new();
    walk(doc, doc.document_node(), &mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use rngval_grammar::name::{Name, NameTest};
    use rngval_grammar::pattern::{self, ElementDef};
    use rngval_tree::QName;

    fn grammar() -> Grammar {
        // root -> (child, leaf*)
        let leaf = pattern::element(NameTest::Name(Name::local("leaf")), pattern::empty(), pattern::empty());
        let child = pattern::element(
            NameTest::Name(Name::local("child")),
            pattern::empty(),
            pattern::zero_or_more(leaf),
        );
        Grammar::new(
            NameTest::Name(Name::local("root")),
            ElementDef {
                attrs: pattern::empty(),
                content: child,
            },
        )
        .with_namespace("x", "urn:example")
    }

    fn document() -> (Document, NodeId, NodeId) {
        let mut doc = Document::new();
        let root = doc.create_element(QName::local("root"));
        doc.append_child(doc.document_node(), root);
        let child = doc.create_element(QName::local("child"));
        doc.append_child(root, child);
        (doc, root, child)
    }

    #[test]
    fn possible_at_reports_leaf_as_the_only_option_inside_child() {
        let (doc, _root, child) = document();
        let g = grammar();
        let possible = possible_at(&doc, || g.new_walker(), child).unwrap();
        assert!(possible
            .iter()
            .any(|p| matches!(p, PossibleEvent::EnterStartTag(t) if t.matches(&Name::local("leaf")))));
    }

    #[test]
    fn possible_at_for_an_unreachable_node_errors() {
        let (doc, _root, _child) = document();
        let g = grammar();
        let mut other = Document::new();
        let stray = other.create_element(QName::local("stray"));
        assert!(possible_at(&doc, || g.new_walker(), stray).is_err());
    }

    #[test]
    fn possible_where_scans_every_content_position_for_the_named_event() {
        let (doc, root, _child) = document();
        let g = grammar();

        let positions = possible_where(
            &doc,
            || g.new_walker(),
            root,
            "enterStartTag",
            &["".to_string(), "child".to_string()],
        )
        .unwrap();
        assert_eq!(positions, vec![0]);

        // "leaf" is only valid under "child", never directly under "root".
        let positions = possible_where(
            &doc,
            || g.new_walker(),
            root,
            "enterStartTag",
            &["".to_string(), "leaf".to_string()],
        )
        .unwrap();
        assert!(positions.is_empty());
    }

    #[test]
    fn speculative_validation_does_not_affect_later_real_validation() {
        let (doc, _root, child) = document();
        let g = grammar();
        let fragment = parse_standalone_fragment("<leaf/>").unwrap();
        let errors = speculatively_validate(&doc, || g.new_walker(), child, &fragment).unwrap();
        assert!(errors.is_empty());

        // running it again with a bad fragment doesn't leak into a second,
        // unrelated speculative call
        let bad_fragment = parse_standalone_fragment("<nope/>").unwrap();
        let errors = speculatively_validate(&doc, || g.new_walker(), child, &bad_fragment).unwrap();
        assert!(!errors.is_empty());

        let errors = speculatively_validate(&doc, || g.new_walker(), child, &fragment).unwrap();
        assert!(errors.is_empty());
    }

    #[test]
    fn document_namespaces_groups_uris_by_prefix() {
        let mut doc = Document::new();
        let root = doc.create_element(QName::local("root"));
        doc.append_child(doc.document_node(), root);
        doc.set_attribute(root, QName::local("xmlns"), "urn:default");
        doc.set_attribute(
            root,
            QName::new(Some("xmlns".to_string()), "x"),
            "urn:example",
        );
        let child = doc.create_element(QName::local("child"));
        doc.append_child(root, child);
        doc.set_attribute(
            child,
            QName::new(Some("xmlns".to_string()), "x"),
            "urn:example-override",
        );

        let namespaces = document_namespaces(&doc);
        assert_eq!(namespaces.get(""), Some(&vec!["urn:default".to_string()]));
        assert_eq!(
            namespaces.get("x"),
            Some(&vec!["urn:example".to_string(), "urn:example-override".to_string()])
        );
    }

    #[test]
    fn resolve_name_at_consults_the_grammar_namespace_table() {
        let (doc, root, _child) = document();
        let g = grammar();
        let _ = &doc;
        assert_eq!(
            resolve_name_at(&g, root, "x"),
            Some("urn:example".to_string())
        );
        assert_eq!(
            unresolve_name_at(&g, root, "urn:example"),
            Some("x".to_string())
        );
    }
}
