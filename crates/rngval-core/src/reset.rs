//! Reset-to-point invalidation (§4.5).
//!
//! `reset_to`/`restart_at` let a host tell the engine "this node's subtree
//! changed, forget everything learned from here on". This module owns the
//! bookkeeping side of that: picking the [`EventIndex`] to invalidate from,
//! purging the walker cache and annotation table, and splitting off the
//! errors that no longer apply. It does not re-run the traversal itself —
//! `Validator::reset_to` (in `validator.rs`) does that by replaying
//! `Traversal::step` from the document root up to the chosen index. The
//! walker cache accelerates arbitrary-point *queries*; reset's own replay
//! always starts from the root, which is simpler to reason about and still
//! correct, at the cost of not reusing a pre-reset cached walker for the
//! replay itself.

use rngval_tree::{Document, NodeId};

use crate::annotations::Annotations;
use crate::cache::WalkerCache;
use crate::errors::ValidationError;
use crate::index::EventIndex;

/// The event index a reset targeting `node` should invalidate from.
///
/// If `node` was itself already visited (it has an `event_index_after_start`
/// annotation), that index is the answer — this is the common case: the
/// host wants to re-derive everything from `node`'s own start tag onward.
///
/// If `node` is new (inserted by the host since the last cycle, so it has no
/// annotation of its own) there is nothing to read off `node` directly, but
/// invalidating nothing would leave the previously recorded end-of-parent
/// state stale: the parent's content no longer matches what was validated.
/// Instead this walks backward — previous sibling, then up to the parent and
/// *its* previous sibling, and so on — until it finds a position that was
/// actually reached, and invalidates from just after it. A document that was
/// never reached at all (or whose entire prefix up to `node` is also new)
/// bottoms out at [`EventIndex::ZERO`], i.e. a full re-validation, which is
/// always correct even if not the cheapest possible answer.
pub fn target_index(doc: &Document, annotations: &Annotations, node: NodeId) -> EventIndex {
    if let Some(at) = annotations.get(node).and_then(|a| a.event_index_after_start) {
        return at;
    }
    let Some(parent) = doc.parent(node) else {
        return EventIndex::ZERO;
    };
    let siblings = doc.children(parent);
    let Some(pos) = siblings.iter().position(|&s| s == node) else {
        return EventIndex::ZERO;
    };
    if pos > 0 {
        let prev = siblings[pos - 1];
        if let Some(at) = annotations.get(prev).and_then(|a| a.event_index_after) {
            return at;
        }
        return target_index(doc, annotations, prev);
    }
    if parent == doc.document_node() {
        return EventIndex::ZERO;
    }
    if let Some(at) = annotations.get(parent).and_then(|a| a.event_index_after_attributes) {
        return at;
    }
    target_index(doc, annotations, parent)
}

/// The result of invalidating state at or after `at`: the errors that were
/// dropped, for the caller to fold into a `reset-errors` event payload.
/// The index to report as a `reset-errors` event's `at` payload: the first
/// event index that actually goes stale, as opposed to [`target_index`]'s
/// walker-resume threshold (which may sit earlier, at the last reached
/// position, rather than at the first annotation that gets dropped).
///
/// Walks from `node` itself up through its ancestors, returning the first
/// `event_index_after` found — a node's own close always comes before any
/// ancestor's, so the nearest one with a recorded close is the earliest
/// stale index. `None` if no ancestor (including `node`) was ever closed,
/// meaning nothing is actually stale yet.
pub fn first_dropped_index(doc: &Document, annotations: &Annotations, node: NodeId) -> Option<EventIndex> {
    let mut current = Some(node);
    while let Some(n) = current {
        if let Some(at) = annotations.get(n).and_then(|a| a.event_index_after) {
            return Some(at);
        }
        current = doc.parent(n);
    }
    None
}

pub struct Invalidated {
    pub dropped_errors: Vec<ValidationError>,
}

/// Applies steps 2-5 of the reset protocol: purge cached walkers, clear
/// annotations, and split errors at `at`. Does not touch traversal position
/// or the live walker — the caller replaces those wholesale and replays.
pub fn invalidate_from<W>(
    cache: &mut WalkerCache<W>,
    annotations: &mut Annotations,
    errors: &mut Vec<ValidationError>,
    at: EventIndex,
) -> Invalidated
where
    W: Clone,
{
    cache.purge_from(at);
    annotations.clear_from(at);
    let mut kept = Vec::with_capacity(errors.len());
    let mut dropped = Vec::new();
    for error in errors.drain(..) {
        if error.at < at {
            kept.push(error);
        } else {
            dropped.push(error);
        }
    }
    *errors = kept;
    Invalidated {
        dropped_errors: dropped,
    }
}
