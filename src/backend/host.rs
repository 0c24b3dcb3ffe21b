//! In-memory host tree and the element-building primitives layouts use.

use std::fmt::Write as _;

/// Index of a node in a [`HostTree`].
pub type NodeId = usize;

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Root,
    Element {
        tag: String,
        /// Insertion ordered; re-setting a name overwrites in place
        attributes: Vec<(String, String)>,
    },
    Text(String),
}

#[derive(Debug, Clone)]
pub struct HostNode {
    pub kind: NodeKind,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
}

/// Arena of host nodes. Node 0 is the root.
#[derive(Debug, Clone)]
pub struct HostTree {
    nodes: Vec<HostNode>,
}

impl Default for HostTree {
    fn default() -> Self {
        Self::new()
    }
}

impl HostTree {
    pub const ROOT: NodeId = 0;

    pub fn new() -> Self {
        Self {
            nodes: vec![HostNode {
                kind: NodeKind::Root,
                parent: None,
                children: Vec::new(),
            }],
        }
    }

    fn append(&mut self, parent: NodeId, kind: NodeKind) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(HostNode {
            kind,
            parent: Some(parent),
            children: Vec::new(),
        });
        self.nodes[parent].children.push(id);
        id
    }

    pub fn create_element(&mut self, parent: NodeId, tag: &str) -> NodeId {
        self.append(
            parent,
            NodeKind::Element {
                tag: tag.to_string(),
                attributes: Vec::new(),
            },
        )
    }

    pub fn create_text(&mut self, parent: NodeId, text: &str) -> NodeId {
        self.append(parent, NodeKind::Text(text.to_string()))
    }

    pub fn node(&self, id: NodeId) -> Option<&HostNode> {
        self.nodes.get(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 1
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes.get(id).map_or(&[][..], |n| n.children.as_slice())
    }

    pub fn tag(&self, id: NodeId) -> Option<&str> {
        match &self.nodes.get(id)?.kind {
            NodeKind::Element { tag, .. } => Some(tag.as_str()),
            _ => None,
        }
    }

    pub fn attribute(&self, id: NodeId, name: &str) -> Option<&str> {
        match &self.nodes.get(id)?.kind {
            NodeKind::Element { attributes, .. } => attributes
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, v)| v.as_str()),
            _ => None,
        }
    }

    /// Set an attribute on an element. Non-element nodes are ignored.
    pub fn set_attribute(&mut self, id: NodeId, name: &str, value: &str) {
        if let Some(HostNode {
            kind: NodeKind::Element { attributes, .. },
            ..
        }) = self.nodes.get_mut(id)
        {
            match attributes.iter_mut().find(|(n, _)| n == name) {
                Some((_, existing)) => *existing = value.to_string(),
                None => attributes.push((name.to_string(), value.to_string())),
            }
        }
    }

    pub fn remove_attribute(&mut self, id: NodeId, name: &str) {
        if let Some(HostNode {
            kind: NodeKind::Element { attributes, .. },
            ..
        }) = self.nodes.get_mut(id)
        {
            attributes.retain(|(n, _)| n != name);
        }
    }

    pub fn text(&self, id: NodeId) -> Option<&str> {
        match &self.nodes.get(id)?.kind {
            NodeKind::Text(text) => Some(text.as_str()),
            _ => None,
        }
    }

    pub fn set_text(&mut self, id: NodeId, text: &str) {
        if let Some(HostNode {
            kind: NodeKind::Text(existing),
            ..
        }) = self.nodes.get_mut(id)
        {
            *existing = text.to_string();
        }
    }

    /// All element ids with the given tag, in document order.
    pub fn find_by_tag(&self, tag: &str) -> Vec<NodeId> {
        let mut found = Vec::new();
        self.walk(Self::ROOT, &mut |id: NodeId, node: &HostNode| {
            if matches!(&node.kind, NodeKind::Element { tag: t, .. } if t == tag) {
                found.push(id);
            }
        });
        found
    }

    fn walk(&self, id: NodeId, visit: &mut dyn FnMut(NodeId, &HostNode)) {
        let node = &self.nodes[id];
        visit(id, node);
        for &child in &node.children {
            self.walk(child, visit);
        }
    }

    /// Serialise the tree as HTML.
    pub fn to_html(&self) -> String {
        let mut out = String::new();
        for &child in self.children(Self::ROOT) {
            self.write_html(child, &mut out);
        }
        out
    }

    fn write_html(&self, id: NodeId, out: &mut String) {
        let node = &self.nodes[id];
        match &node.kind {
            NodeKind::Root => {}
            NodeKind::Text(text) => out.push_str(&escape(text)),
            NodeKind::Element { tag, attributes } => {
                let _ = write!(out, "<{}", tag);
                for (name, value) in attributes {
                    let _ = write!(out, " {}=\"{}\"", name, escape(value));
                }
                out.push('>');
                for &child in &node.children {
                    self.write_html(child, out);
                }
                let _ = write!(out, "</{}>", tag);
            }
        }
    }
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Element construction state for one render pass.
///
/// `element()` is the most recently opened element, which between
/// `open_element` and `flush_element` is still under construction.
#[derive(Debug)]
pub struct ElementStack {
    tree: HostTree,
    open: Vec<NodeId>,
    constructing: Option<NodeId>,
}

impl ElementStack {
    pub fn new(tree: HostTree) -> Self {
        Self {
            tree,
            open: Vec::new(),
            constructing: None,
        }
    }

    pub fn tree(&self) -> &HostTree {
        &self.tree
    }

    pub fn tree_mut(&mut self) -> &mut HostTree {
        &mut self.tree
    }

    pub fn into_tree(self) -> HostTree {
        self.tree
    }

    fn parent(&self) -> NodeId {
        self.open.last().copied().unwrap_or(HostTree::ROOT)
    }

    /// Current element, if any is open.
    pub fn element(&self) -> Option<NodeId> {
        self.open.last().copied()
    }

    pub fn constructing(&self) -> Option<NodeId> {
        self.constructing
    }

    pub fn depth(&self) -> usize {
        self.open.len()
    }

    pub fn open_element(&mut self, tag: &str) -> NodeId {
        let parent = self.parent();
        let id = self.tree.create_element(parent, tag);
        self.open.push(id);
        self.constructing = Some(id);
        id
    }

    pub fn flush_element(&mut self) {
        self.constructing = None;
    }

    pub fn close_element(&mut self) -> Option<NodeId> {
        self.constructing = None;
        self.open.pop()
    }

    pub fn append_text(&mut self, text: &str) -> NodeId {
        let parent = self.parent();
        self.tree.create_text(parent, text)
    }

    /// Operations handle for the current element.
    pub fn operations(&mut self) -> Option<ElementOperations<'_>> {
        let element = self.element()?;
        Some(ElementOperations {
            tree: &mut self.tree,
            element,
        })
    }
}

/// Attribute-level access to one element, handed to
/// `ComponentManager::did_create_element`.
pub struct ElementOperations<'a> {
    tree: &'a mut HostTree,
    element: NodeId,
}

impl<'a> ElementOperations<'a> {
    pub fn element(&self) -> NodeId {
        self.element
    }

    pub fn set_attribute(&mut self, name: &str, value: &str) {
        self.tree.set_attribute(self.element, name, value);
    }

    pub fn remove_attribute(&mut self, name: &str) {
        self.tree.remove_attribute(self.element, name);
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.tree.attribute(self.element, name)
    }

    /// Append to the space separated `class` attribute.
    pub fn add_class(&mut self, class: &str) {
        let merged = match self.tree.attribute(self.element, "class") {
            Some(existing) if !existing.is_empty() => format!("{} {}", existing, class),
            _ => class.to_string(),
        };
        self.tree.set_attribute(self.element, "class", &merged);
    }
}
