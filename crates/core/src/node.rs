//! The element tree produced by [`crate::parse`] and its position lookups.
//!
//! Nodes live in an arena owned by [`Document`]. Slot 0 is a synthetic root
//! spanning the whole text; it has no tag and is never returned by the
//! lookups, which report "no element here" as `None` instead.

use std::collections::HashSet;
use std::ops::Deref;

use serde::Serialize;

use crate::error::ParseError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeId(usize);

impl NodeId {
    pub const ROOT: NodeId = NodeId(0);

    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Attribute {
    pub name: String,
    /// Offset of the attribute name.
    pub offset: usize,
    /// Unquoted value, `None` when the attribute has no `=value` part.
    pub value: Option<String>,
}

impl Attribute {
    /// End of the attribute name.
    pub fn end(&self) -> usize {
        self.offset + self.name.len()
    }

    /// Offset of the first character inside the quotes, assuming the value is
    /// written as `name="value"`.
    pub fn value_offset(&self) -> Option<usize> {
        self.value.as_ref().map(|_| self.end() + 2)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    /// `None` for a bare `<` that was never followed by a name.
    pub tag: Option<String>,
    pub start: usize,
    pub end: usize,
    /// The element was ended by a matching end tag or `/>`.
    pub closed: bool,
    pub end_tag_start: Option<usize>,
    /// Trimmed, non-empty text runs directly inside this element.
    pub text_contents: Vec<String>,
    /// Attributes in document order, duplicates included.
    pub attributes: Vec<Attribute>,
    pub children: Vec<NodeId>,
    pub parent: Option<NodeId>,
}

impl Node {
    fn new(start: usize, end: usize, parent: Option<NodeId>) -> Self {
        Node {
            tag: None,
            start,
            end,
            closed: false,
            end_tag_start: None,
            text_contents: Vec::new(),
            attributes: Vec::new(),
            children: Vec::new(),
            parent,
        }
    }

    /// Case-insensitive comparison against an already lowercased name.
    pub fn is_same_tag(&self, lowercase_tag: &str) -> bool {
        self.tag
            .as_deref()
            .is_some_and(|tag| tag.eq_ignore_ascii_case(lowercase_tag))
    }

    /// Distinct attribute names in first-seen order.
    pub fn attribute_names(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.attributes
            .iter()
            .map(|a| a.name.as_str())
            .filter(|name| seen.insert(*name))
            .collect()
    }

    /// Value of the first attribute called `name`. `None` when the attribute
    /// is absent or has no value.
    pub fn attribute_value(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.name == name)
            .and_then(|a| a.value.as_deref())
    }

    /// Name offsets of every occurrence of `name`.
    pub fn attribute_offsets(&self, name: &str) -> Vec<usize> {
        self.attributes
            .iter()
            .filter(|a| a.name == name)
            .map(|a| a.offset)
            .collect()
    }

    /// Names that occur more than once, each reported once.
    pub fn duplicated_attributes(&self) -> Vec<&str> {
        self.attribute_names()
            .into_iter()
            .filter(|name| self.attributes.iter().filter(|a| a.name == *name).count() > 1)
            .collect()
    }

    /// The attribute whose name covers `offset`, ends inclusive.
    pub fn attribute_at_offset(&self, offset: usize) -> Option<&Attribute> {
        self.attributes
            .iter()
            .find(|a| offset >= a.offset && offset <= a.end())
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty() && self.text_contents.is_empty()
    }
}

/// A node together with the document it lives in, so it can walk to its
/// parent and children.
#[derive(Debug, Clone, Copy)]
pub struct NodeRef<'a> {
    doc: &'a Document,
    id: NodeId,
}

impl<'a> NodeRef<'a> {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn node(&self) -> &'a Node {
        &self.doc.nodes[self.id.0]
    }

    /// The enclosing element, `None` for top-level elements.
    pub fn parent(&self) -> Option<NodeRef<'a>> {
        self.node()
            .parent
            .filter(|&p| p != NodeId::ROOT)
            .map(|id| self.doc.get(id))
    }

    pub fn children(&self) -> impl Iterator<Item = NodeRef<'a>> + 'a {
        let doc = self.doc;
        self.node().children.iter().map(move |&id| doc.get(id))
    }

    pub fn first_child(&self) -> Option<NodeRef<'a>> {
        self.node().children.first().map(|&id| self.doc.get(id))
    }

    pub fn last_child(&self) -> Option<NodeRef<'a>> {
        self.node().children.last().map(|&id| self.doc.get(id))
    }
}

impl Deref for NodeRef<'_> {
    type Target = Node;

    fn deref(&self) -> &Node {
        self.node()
    }
}

impl PartialEq for NodeRef<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.doc, other.doc) && self.id == other.id
    }
}

/// A parsed WXML document: the element arena and every problem found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    nodes: Vec<Node>,
    errors: Vec<ParseError>,
}

impl Document {
    pub(crate) fn new(text_len: usize) -> Self {
        Document {
            nodes: vec![Node::new(0, text_len, None)],
            errors: Vec::new(),
        }
    }

    pub(crate) fn push_child(&mut self, parent: NodeId, start: usize, end: usize) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node::new(start, end, Some(parent)));
        self.nodes[parent.0].children.push(id);
        id
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0]
    }

    pub(crate) fn push_error(&mut self, error: ParseError) {
        self.errors.push(error);
    }

    pub fn errors(&self) -> &[ParseError] {
        &self.errors
    }

    /// Length of the text this document was parsed from.
    pub fn text_len(&self) -> usize {
        self.nodes[0].end
    }

    /// Top-level elements in document order.
    pub fn roots(&self) -> impl Iterator<Item = NodeRef<'_>> {
        self.get(NodeId::ROOT).children()
    }

    /// Every element in document order (pre-order).
    pub fn descendants(&self) -> Vec<NodeRef<'_>> {
        let mut out = Vec::with_capacity(self.nodes.len().saturating_sub(1));
        let mut stack: Vec<NodeId> = self.nodes[0].children.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            out.push(self.get(id));
            stack.extend(self.nodes[id.0].children.iter().rev());
        }
        out
    }

    pub fn get(&self, id: NodeId) -> NodeRef<'_> {
        NodeRef { doc: self, id }
    }

    /// Innermost element whose range strictly contains `offset` on the left
    /// and inclusively on the right.
    ///
    /// # Panics
    ///
    /// Panics if `offset` is past the end of the text.
    pub fn find_node_at(&self, offset: usize) -> Option<NodeRef<'_>> {
        self.check_offset(offset);
        let mut curr = NodeId::ROOT;
        loop {
            let Some(child) = self.last_child_starting_before(curr, offset) else {
                break;
            };
            let node = &self.nodes[child.0];
            if offset > node.start && offset <= node.end {
                curr = child;
            } else {
                break;
            }
        }
        self.element(curr)
    }

    /// The element that most plausibly "owns" the cursor when typing at
    /// `offset`: the innermost element starting before it, descending into a
    /// child that still contains the offset, or that ends where its last
    /// child ends.
    ///
    /// # Panics
    ///
    /// Panics if `offset` is past the end of the text.
    pub fn find_node_before(&self, offset: usize) -> Option<NodeRef<'_>> {
        self.check_offset(offset);
        let mut curr = NodeId::ROOT;
        while let Some(child) = self.last_child_starting_before(curr, offset) {
            let node = &self.nodes[child.0];
            if offset <= node.start {
                break;
            }
            curr = child;
            if offset < node.end {
                continue;
            }
            let ends_with_last_child = node
                .children
                .last()
                .is_some_and(|last| self.nodes[last.0].end == node.end);
            if !ends_with_last_child {
                break;
            }
        }
        self.element(curr)
    }

    /// The child of `parent` with the greatest start below `offset`.
    fn last_child_starting_before(&self, parent: NodeId, offset: usize) -> Option<NodeId> {
        let children = &self.nodes[parent.0].children;
        let idx = children.partition_point(|c| self.nodes[c.0].start < offset);
        idx.checked_sub(1).map(|i| children[i])
    }

    fn element(&self, id: NodeId) -> Option<NodeRef<'_>> {
        (id != NodeId::ROOT).then(|| self.get(id))
    }

    fn check_offset(&self, offset: usize) {
        assert!(
            offset <= self.text_len(),
            "offset {offset} is past the end of the document (len {})",
            self.text_len()
        );
    }

    pub fn to_json_value(&self) -> serde_json::Value {
        serde_json::json!({
            "roots":  self.roots().map(|n| node_json(&n)).collect::<Vec<_>>(),
            "errors": self.errors.iter().map(ParseError::to_json_value).collect::<Vec<_>>(),
        })
    }
}

fn node_json(node: &NodeRef<'_>) -> serde_json::Value {
    serde_json::json!({
        "tag":         node.tag,
        "start":       node.start,
        "end":         node.end,
        "closed":      node.closed,
        "endTagStart": node.end_tag_start,
        "attributes":  node.attributes,
        "text":        node.text_contents,
        "children":    node.children().map(|c| node_json(&c)).collect::<Vec<_>>(),
    })
}
