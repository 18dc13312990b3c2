use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    io::{Read, Write},
};

/// Stable index of a node inside a [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub name: String,
    pub attributes: BTreeMap<String, String>,
    pub children: Vec<NodeId>,
    pub parent: Option<NodeId>,
}

/// Attributed tree of named nodes held in an arena, so deferred entries
/// can refer to nodes by index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    nodes: Vec<Node>,
}

#[derive(Serialize, Deserialize)]
struct TreeNode {
    name: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    attributes: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    children: Vec<TreeNode>,
}

impl Document {
    pub fn new(root: &str) -> Self {
        Self {
            nodes: vec![Node {
                name: root.to_string(),
                attributes: BTreeMap::new(),
                children: vec![],
                parent: None,
            }],
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    pub fn name(&self, id: NodeId) -> &str {
        self.node(id).map(|n| n.name.as_str()).unwrap_or_default()
    }

    pub fn add_child(&mut self, parent: NodeId, name: &str) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            name: name.to_string(),
            attributes: BTreeMap::new(),
            children: vec![],
            parent: Some(parent),
        });
        if let Some(parent) = self.nodes.get_mut(parent.0) {
            parent.children.push(id);
        }
        id
    }

    pub fn set_attribute(&mut self, id: NodeId, key: &str, value: impl ToString) {
        if let Some(node) = self.nodes.get_mut(id.0) {
            node.attributes.insert(key.to_string(), value.to_string());
        }
    }

    pub fn attribute(&self, id: NodeId, key: &str) -> Option<&str> {
        self.node(id)?.attributes.get(key).map(String::as_str)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.node(id).map(|n| n.children.as_slice()).unwrap_or_default()
    }

    pub fn children_named<'a>(&'a self, id: NodeId, name: &'a str) -> impl Iterator<Item = NodeId> + 'a {
        self.children(id)
            .iter()
            .copied()
            .filter(move |child| self.name(*child) == name)
    }

    pub fn child_named(&self, id: NodeId, name: &str) -> Option<NodeId> {
        self.children_named(id, name).next()
    }

    /// Every node below `id` in document order.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut found = vec![];
        let mut stack: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(next) = stack.pop() {
            found.push(next);
            stack.extend(self.children(next).iter().rev().copied());
        }
        found
    }

    fn to_tree(&self, id: NodeId) -> TreeNode {
        TreeNode {
            name: self.name(id).to_string(),
            attributes: self
                .node(id)
                .map(|n| n.attributes.clone())
                .unwrap_or_default(),
            children: self.children(id).iter().map(|c| self.to_tree(*c)).collect(),
        }
    }

    fn insert_tree(&mut self, parent: NodeId, tree: TreeNode) {
        let id = self.add_child(parent, &tree.name);
        if let Some(node) = self.nodes.get_mut(id.0) {
            node.attributes = tree.attributes;
        }
        for child in tree.children {
            self.insert_tree(id, child);
        }
    }

    pub fn to_json(&self, pretty: bool) -> Result<String, serde_json::Error> {
        let tree = self.to_tree(self.root());
        if pretty {
            serde_json::to_string_pretty(&tree)
        } else {
            serde_json::to_string(&tree)
        }
    }

    pub fn write_to<W: Write>(&self, writer: W, pretty: bool) -> Result<(), serde_json::Error> {
        let tree = self.to_tree(self.root());
        if pretty {
            serde_json::to_writer_pretty(writer, &tree)
        } else {
            serde_json::to_writer(writer, &tree)
        }
    }

    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        Ok(Self::from_tree(serde_json::from_str(text)?))
    }

    pub fn read_from<R: Read>(reader: R) -> Result<Self, serde_json::Error> {
        Ok(Self::from_tree(serde_json::from_reader(reader)?))
    }

    fn from_tree(tree: TreeNode) -> Self {
        let mut document = Document::new(&tree.name);
        let root = document.root();
        document.nodes[0].attributes = tree.attributes;
        for child in tree.children {
            document.insert_tree(root, child);
        }
        document
    }
}
