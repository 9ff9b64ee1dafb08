//! Per-node side table (§3 "Annotations", §4.1, §4.5).
//!
//! The traversal state machine never stores validation bookkeeping on the
//! tree itself — the tree is the host's, not ours. Instead every fact the
//! engine needs to recall about a node (when it entered content, when its
//! attributes closed, whether a wildcard match touched it) lives here, keyed
//! by [`NodeId`]. The reset protocol (§4.5) walks this table to decide what
//! to invalidate, so every annotation setter has a matching "clear at or
//! after" in [`Annotations::clear_from`].

use std::collections::HashMap;

use rngval_tree::NodeId;

use crate::index::EventIndex;

/// One node's recorded facts. Fields are populated progressively as
/// traversal passes through the node's three stages; a field that is `None`
/// means traversal has not yet reached that stage for this node.
#[derive(Debug, Clone, Default)]
pub struct Annotation {
    pub event_index_after_start: Option<EventIndex>,
    pub event_index_before_attributes: Option<EventIndex>,
    pub event_index_after_attributes: Option<EventIndex>,
    pub event_index_after: Option<EventIndex>,
    pub possible_due_to_wildcard: bool,
    pub error_ids: Vec<usize>,
}

/// A read of a single annotation field, for [`node_property`](crate::validator::Validator::node_property).
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Index(EventIndex),
    Bool(bool),
    ErrorIds(Vec<usize>),
}

#[derive(Debug, Clone, Default)]
pub struct Annotations {
    by_node: HashMap<NodeId, Annotation>,
}

impl Annotations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, node: NodeId) -> Option<&Annotation> {
        self.by_node.get(&node)
    }

    fn entry(&mut self, node: NodeId) -> &mut Annotation {
        self.by_node.entry(node).or_default()
    }

    pub fn set_after_start(&mut self, node: NodeId, at: EventIndex) {
        self.entry(node).event_index_after_start = Some(at);
    }

    pub fn set_before_attributes(&mut self, node: NodeId, at: EventIndex) {
        self.entry(node).event_index_before_attributes = Some(at);
    }

    pub fn set_after_attributes(&mut self, node: NodeId, at: EventIndex) {
        self.entry(node).event_index_after_attributes = Some(at);
    }

    pub fn set_after(&mut self, node: NodeId, at: EventIndex) {
        self.entry(node).event_index_after = Some(at);
    }

    /// Records whether `node`'s most recent admitting event (its own start
    /// tag, or one of its attribute names) was accepted only via a wildcard
    /// name-test. Returns whether this differs from the previously stored
    /// value — the traversal layer uses this to decide whether to surface a
    /// `possible-due-to-wildcard-change` event.
    pub fn set_wildcard(&mut self, node: NodeId, value: bool) -> bool {
        let entry = self.entry(node);
        let changed = entry.possible_due_to_wildcard != value;
        entry.possible_due_to_wildcard = value;
        changed
    }

    pub fn add_error_id(&mut self, node: NodeId, error_id: usize) {
        self.entry(node).error_ids.push(error_id);
    }

    /// Per §4.5 step 3: drop every annotation whose stored `event_index_after`
    /// (the node's own close) is at or beyond `at` — a node that opened
    /// before the reset point but whose contents or close extend past it is
    /// still stale and must be re-annotated from scratch. A node that opened
    /// but never closed (still open when the reset happened) has no
    /// `event_index_after` yet, so its `event_index_after_start` is used
    /// instead. Annotations with neither field set were never reached at all
    /// and are left alone.
    pub fn clear_from(&mut self, at: EventIndex) {
        self.by_node.retain(|_, a| {
            let marker = a.event_index_after.or(a.event_index_after_start);
            marker.map_or(true, |idx| idx < at)
        });
    }

    pub fn property(&self, node: NodeId, key: &str) -> Option<PropertyValue> {
        let a = self.get(node)?;
        match key {
            "event-index-after-start" => a.event_index_after_start.map(PropertyValue::Index),
            "event-index-before-attributes" => {
                a.event_index_before_attributes.map(PropertyValue::Index)
            }
            "event-index-after-attributes" => {
                a.event_index_after_attributes.map(PropertyValue::Index)
            }
            "event-index-after" => a.event_index_after.map(PropertyValue::Index),
            "possible-due-to-wildcard" => Some(PropertyValue::Bool(a.possible_due_to_wildcard)),
            "error-ids" => Some(PropertyValue::ErrorIds(a.error_ids.clone())),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rngval_tree::{Document, QName};

    #[test]
    fn clear_from_drops_reached_nodes_at_or_after_target() {
        let mut doc = Document::new();
        let n1 = doc.create_element(QName::local("a"));
        let n2 = doc.create_element(QName::local("b"));

        let mut a = Annotations::new();
        a.set_after_start(n1, EventIndex(5));
        a.set_after_start(n2, EventIndex(10));
        a.clear_from(EventIndex(10));
        assert!(a.get(n1).is_some());
        assert!(a.get(n2).is_none());
    }

    #[test]
    fn property_reads_reflect_setters() {
        let mut doc = Document::new();
        let n3 = doc.create_element(QName::local("a"));
        let n4 = doc.create_element(QName::local("b"));

        let mut a = Annotations::new();
        assert!(a.set_wildcard(n3, true));
        assert!(!a.set_wildcard(n3, true), "no change when the value repeats");
        a.add_error_id(n3, 7);
        assert_eq!(
            a.property(n3, "possible-due-to-wildcard"),
            Some(PropertyValue::Bool(true))
        );
        assert_eq!(
            a.property(n3, "error-ids"),
            Some(PropertyValue::ErrorIds(vec![7]))
        );
        assert_eq!(a.property(n4, "error-ids"), None);
    }

    #[test]
    fn set_wildcard_reports_a_change_back_to_false() {
        let mut doc = Document::new();
        let n = doc.create_element(QName::local("a"));
        let mut a = Annotations::new();
        assert!(a.set_wildcard(n, true));
        assert!(a.set_wildcard(n, false));
        assert_eq!(
            a.property(n, "possible-due-to-wildcard"),
            Some(PropertyValue::Bool(false))
        );
    }
}
