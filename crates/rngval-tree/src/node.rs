use crate::qname::QName;
use std::fmt;

/// An arena index into a [`Document`].
///
/// `NodeId` is `Copy` and stable for the lifetime of the `Document` it was
/// issued from — it is never invalidated by mutation of *other* nodes, only
/// by removal of the node it addresses.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
pub struct NodeId(pub(crate) u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A borrowed view of one node's content, without its tree position.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind<'a> {
    Document,
    Element { name: &'a QName },
    Attribute { name: &'a QName, value: &'a str },
    Text(&'a str),
    Comment(&'a str),
    Pi { target: &'a str, data: &'a str },
}

impl NodeKind<'_> {
    /// Per §3: "Validation concerns only element, attribute, and text nodes;
    /// comments and PIs are skipped."
    pub fn is_validation_significant(&self) -> bool {
        matches!(
            self,
            NodeKind::Element { .. } | NodeKind::Attribute { .. } | NodeKind::Text(_)
        )
    }
}

#[derive(Debug, Clone)]
pub(crate) enum NodeData {
    Document,
    Element {
        name: QName,
        // Ordered, insertion-stable; NOT validation-significant order-wise
        // per §3, only present for iteration and duplicate detection.
        attributes: Vec<NodeId>,
    },
    Attribute {
        name: QName,
        value: String,
    },
    Text(String),
    Comment(String),
    Pi {
        target: String,
        data: String,
    },
}

#[derive(Debug, Clone)]
pub(crate) struct NodeEntry {
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) data: NodeData,
}

/// A minimal DOM-like document: an arena of nodes with parent pointers and
/// ordered children, enough to drive an incremental validator.
///
/// Attributes are modeled as their own addressable nodes (matching the tree
/// node taxonomy in §3) but are kept in a separate per-element list, not in
/// `children`, mirroring how DOM `childNodes` excludes attributes.
///
/// Text nodes are kept normalized: [`Document::append_child`] and
/// [`Document::insert_before`] merge an inserted text node into an adjacent
/// trailing text sibling, and never insert an empty text node.
#[derive(Debug, Clone, Default)]
pub struct Document {
    nodes: Vec<NodeEntry>,
    root: Option<NodeId>,
}

impl Document {
    pub fn new() -> Self {
        Self {
            nodes: vec![NodeEntry {
                parent: None,
                children: Vec::new(),
                data: NodeData::Document,
            }],
            root: None,
        }
    }

    /// The synthetic document node, always `NodeId(0)`.
    pub fn document_node(&self) -> NodeId {
        NodeId(0)
    }

    /// The document element, if one has been attached yet.
    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    fn push(&mut self, data: NodeData) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(NodeEntry {
            parent: None,
            children: Vec::new(),
            data,
        });
        id
    }

    pub fn create_element(&mut self, name: QName) -> NodeId {
        self.push(NodeData::Element {
            name,
            attributes: Vec::new(),
        })
    }

    pub fn create_text(&mut self, text: impl Into<String>) -> NodeId {
        self.push(NodeData::Text(text.into()))
    }

    pub fn create_comment(&mut self, text: impl Into<String>) -> NodeId {
        self.push(NodeData::Comment(text.into()))
    }

    pub fn create_pi(&mut self, target: impl Into<String>, data: impl Into<String>) -> NodeId {
        self.push(NodeData::Pi {
            target: target.into(),
            data: data.into(),
        })
    }

    fn entry(&self, id: NodeId) -> &NodeEntry {
        &self.nodes[id.0 as usize]
    }

    fn entry_mut(&mut self, id: NodeId) -> &mut NodeEntry {
        &mut self.nodes[id.0 as usize]
    }

    pub fn kind(&self, id: NodeId) -> NodeKind<'_> {
        match &self.entry(id).data {
            NodeData::Document => NodeKind::Document,
            NodeData::Element { name, .. } => NodeKind::Element { name },
            NodeData::Attribute { name, value } => NodeKind::Attribute { name, value },
            NodeData::Text(text) => NodeKind::Text(text),
            NodeData::Comment(text) => NodeKind::Comment(text),
            NodeData::Pi { target, data } => NodeKind::Pi { target, data },
        }
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.entry(id).parent
    }

    /// Ordered content children (excludes attributes, matching DOM `childNodes`).
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.entry(id).children
    }

    /// `true` if `ancestor` is `node` itself or a proper ancestor of it.
    pub fn is_ancestor_or_self(&self, ancestor: NodeId, mut node: NodeId) -> bool {
        loop {
            if node == ancestor {
                return true;
            }
            match self.parent(node) {
                Some(p) => node = p,
                None => return false,
            }
        }
    }

    /// Document-order comparison: `true` if `a` strictly precedes `b`.
    ///
    /// Used by the reset protocol (§4.5) to decide which cache entries and
    /// annotations lie "at or after" a reset target.
    pub fn precedes(&self, a: NodeId, b: NodeId) -> bool {
        if a == b {
            return false;
        }
        let path_a = self.ancestor_chain(a);
        let path_b = self.ancestor_chain(b);
        // Walk both chains (root-first) to find the lowest common ancestor,
        // then compare sibling indices at the point of divergence.
        let mut i = 0;
        while i < path_a.len() && i < path_b.len() && path_a[i] == path_b[i] {
            i += 1;
        }
        if i == path_a.len() {
            // a is an ancestor of b => a precedes b (opens before b opens)
            return true;
        }
        if i == path_b.len() {
            return false;
        }
        let parent = path_a[i - 1];
        let siblings = self.children(parent);
        let pos_a = siblings.iter().position(|&n| n == path_a[i]);
        let pos_b = siblings.iter().position(|&n| n == path_b[i]);
        match (pos_a, pos_b) {
            (Some(pa), Some(pb)) => pa < pb,
            _ => false,
        }
    }

    fn ancestor_chain(&self, node: NodeId) -> Vec<NodeId> {
        let mut chain = vec![node];
        let mut cur = node;
        while let Some(p) = self.parent(cur) {
            chain.push(p);
            cur = p;
        }
        chain.reverse();
        chain
    }

    /// Appends `child` as the last content child of `parent`, merging into a
    /// trailing text sibling if both are text (keeps text normalized per §3).
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.insert_before(parent, child, None);
    }

    /// Inserts `child` before `before` (or at the end, if `before` is `None`).
    pub fn insert_before(&mut self, parent: NodeId, child: NodeId, before: Option<NodeId>) {
        if let NodeData::Text(ref text) = self.entry(child).data {
            if text.is_empty() {
                return; // never insert empty text nodes
            }
        }

        // Try merging into the preceding sibling if both sides are text.
        if let NodeData::Text(incoming) = self.entry(child).data.clone() {
            let preceding = match before {
                Some(b) => {
                    let siblings = self.children(parent);
                    let idx = siblings.iter().position(|&n| n == b);
                    idx.and_then(|i| i.checked_sub(1)).map(|i| siblings[i])
                }
                None => self.children(parent).last().copied(),
            };
            if let Some(prev) = preceding {
                if let NodeData::Text(existing) = &mut self.entry_mut(prev).data {
                    existing.push_str(&incoming);
                    return;
                }
            }
        }

        self.entry_mut(child).parent = Some(parent);
        let siblings = &mut self.entry_mut(parent).children;
        match before {
            Some(b) => {
                let idx = siblings.iter().position(|&n| n == b).unwrap_or(siblings.len());
                siblings.insert(idx, child);
            }
            None => siblings.push(child),
        }

        if self.parent(parent).is_none() && parent == self.document_node() && self.root.is_none() {
            if matches!(self.entry(child).data, NodeData::Element { .. }) {
                self.root = Some(child);
            }
        }
    }

    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) {
        let siblings = &mut self.entry_mut(parent).children;
        siblings.retain(|&n| n != child);
        self.entry_mut(child).parent = None;
        if self.root == Some(child) {
            self.root = None;
        }
    }

    pub fn set_attribute(&mut self, element: NodeId, name: QName, value: impl Into<String>) {
        let value = value.into();
        let existing = match &self.entry(element).data {
            NodeData::Element { attributes, .. } => attributes.iter().copied().find(|&a| {
                matches!(&self.entry(a).data, NodeData::Attribute { name: n, .. } if *n == name)
            }),
            _ => None,
        };
        if let Some(attr_id) = existing {
            if let NodeData::Attribute { value: v, .. } = &mut self.entry_mut(attr_id).data {
                *v = value;
            }
            return;
        }
        let attr_id = self.push(NodeData::Attribute { name, value });
        self.entry_mut(attr_id).parent = Some(element);
        if let NodeData::Element { attributes, .. } = &mut self.entry_mut(element).data {
            attributes.push(attr_id);
        }
    }

    /// Attributes of `element` in document order (insertion order).
    pub fn attributes(&self, element: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        let ids: &[NodeId] = match &self.entry(element).data {
            NodeData::Element { attributes, .. } => attributes,
            _ => &[],
        };
        ids.iter().copied()
    }

    pub fn element_name(&self, element: NodeId) -> Option<&QName> {
        match &self.entry(element).data {
            NodeData::Element { name, .. } => Some(name),
            _ => None,
        }
    }

    /// `true` for `xmlns` and `xmlns:*` attribute names — these update the
    /// in-scope namespace mapping rather than being fired as ordinary
    /// `attributeName`/`attributeValue` events (§4.1, stage 2).
    pub fn is_namespace_declaration(name: &QName) -> bool {
        name.local == "xmlns" || name.ns.as_deref() == Some("xmlns")
    }
}
