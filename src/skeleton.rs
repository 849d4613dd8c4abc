// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Skeleton graph: keypoint nodes, drawn connections and left/right symmetry.
//!
//! The graph defines what a keypoint is for a project. Node insertion order is
//! the keypoint order used by label tables and by the training configuration,
//! and symmetry pairs drive the horizontal-flip permutation.

use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::color::Color;
use crate::error::{LabelError, Result};
use crate::skipped;

/// Prefix of automatically generated node names (`Node1`, `Node2`, ...).
const AUTO_NAME_PREFIX: &str = "Node";

/// How a node is drawn by the editor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeShape {
    /// Circle marker.
    #[default]
    Circle,
    /// Square marker.
    Square,
    /// Free text label.
    Text,
}

impl NodeShape {
    /// Returns the string representation used in skeleton files.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Circle => "circle",
            Self::Square => "square",
            Self::Text => "text",
        }
    }
}

impl fmt::Display for NodeShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A keypoint node.
///
/// Only `name` carries meaning for the label store; the remaining fields are
/// presentation data round-tripped through the skeleton file.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    /// Unique keypoint name.
    pub name: String,
    /// Marker shape.
    pub shape: NodeShape,
    /// Marker color.
    pub color: Color,
    /// Outline thickness in pixels.
    pub thickness: u32,
    /// Whether the marker is filled.
    pub filled: bool,
    /// Default layout x position (editor coordinates).
    pub x: f64,
    /// Default layout y position (editor coordinates).
    pub y: f64,
    /// Display text, only meaningful for [`NodeShape::Text`].
    pub text: Option<String>,
}

impl Node {
    /// Create a circle node with default style at the given position.
    #[must_use]
    pub fn new(name: impl Into<String>, x: f64, y: f64) -> Self {
        Self {
            name: name.into(),
            shape: NodeShape::Circle,
            color: Color::NODE_DEFAULT,
            thickness: 1,
            filled: false,
            x,
            y,
            text: None,
        }
    }

    /// Text shown for a text node, falling back to the node name.
    #[must_use]
    pub fn display_text(&self) -> &str {
        self.text.as_deref().unwrap_or(&self.name)
    }
}

/// Unordered pair of two distinct node names.
///
/// Stored with the lexicographically smaller name first so that `(a, b)` and
/// `(b, a)` compare equal.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodePair(String, String);

impl NodePair {
    /// Build a pair, or `None` when both names are the same.
    #[must_use]
    pub fn new(a: &str, b: &str) -> Option<Self> {
        match a.cmp(b) {
            std::cmp::Ordering::Less => Some(Self(a.to_string(), b.to_string())),
            std::cmp::Ordering::Greater => Some(Self(b.to_string(), a.to_string())),
            std::cmp::Ordering::Equal => None,
        }
    }

    /// Both names, smaller first.
    #[must_use]
    pub fn names(&self) -> (&str, &str) {
        (&self.0, &self.1)
    }

    /// Whether `name` is one of the two ends.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.0 == name || self.1 == name
    }

    /// The end opposite to `name`.
    #[must_use]
    pub fn other(&self, name: &str) -> Option<&str> {
        if self.0 == name {
            Some(&self.1)
        } else if self.1 == name {
            Some(&self.0)
        } else {
            None
        }
    }

    fn renamed(&self, old: &str, new: &str) -> Option<Self> {
        let swap = |n: &str| if n == old { new.to_string() } else { n.to_string() };
        Self::new(&swap(&self.0), &swap(&self.1))
    }
}

/// Graph of keypoint nodes, connection edges and symmetry pairs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SkeletonGraph {
    nodes: Vec<Node>,
    edges: BTreeSet<NodePair>,
    symmetry: BTreeSet<NodePair>,
    node_counter: usize,
}

impl SkeletonGraph {
    /// Create an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the graph has no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Nodes in insertion order.
    #[must_use]
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Node names in insertion order.
    #[must_use]
    pub fn node_names(&self) -> Vec<String> {
        self.nodes.iter().map(|n| n.name.clone()).collect()
    }

    /// Look up a node by name.
    #[must_use]
    pub fn node(&self, name: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.name == name)
    }

    /// Whether a node with this name exists.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.node(name).is_some()
    }

    /// Insertion index of a node.
    #[must_use]
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.nodes.iter().position(|n| n.name == name)
    }

    /// Connection edges, sorted.
    pub fn edges(&self) -> impl Iterator<Item = &NodePair> {
        self.edges.iter()
    }

    /// Symmetry pairs, sorted.
    pub fn symmetry_pairs(&self) -> impl Iterator<Item = &NodePair> {
        self.symmetry.iter()
    }

    /// The symmetry partner of a node, if it has one.
    #[must_use]
    pub fn symmetry_partner(&self, name: &str) -> Option<&str> {
        self.symmetry.iter().find_map(|pair| pair.other(name))
    }

    /// Add a node with a freshly generated `Node{n}` name.
    ///
    /// The counter only moves forward and skips names that are already taken.
    #[allow(clippy::too_many_arguments)]
    pub fn add_node(
        &mut self,
        shape: NodeShape,
        color: Color,
        thickness: u32,
        filled: bool,
        x: f64,
        y: f64,
        text: Option<String>,
    ) -> &Node {
        let name = loop {
            self.node_counter += 1;
            let candidate = format!("{AUTO_NAME_PREFIX}{}", self.node_counter);
            if !self.contains(&candidate) {
                break candidate;
            }
        };

        self.nodes.push(Node {
            name,
            shape,
            color,
            thickness,
            filled,
            x,
            y,
            text,
        });
        &self.nodes[self.nodes.len() - 1]
    }

    /// Insert a fully specified node.
    ///
    /// # Errors
    ///
    /// Returns [`LabelError::DuplicateName`] if the name is taken.
    pub fn insert_node(&mut self, node: Node) -> Result<()> {
        if self.contains(&node.name) {
            return Err(LabelError::DuplicateName(node.name));
        }
        self.nodes.push(node);
        Ok(())
    }

    /// Remove a node together with every edge and symmetry pair touching it.
    ///
    /// Unknown names are ignored.
    pub fn remove_node(&mut self, name: &str) {
        let Some(index) = self.index_of(name) else {
            return;
        };
        self.nodes.remove(index);
        self.edges.retain(|e| !e.contains(name));
        self.symmetry.retain(|s| !s.contains(name));
    }

    /// Rename a node and rewrite all edges and symmetry pairs that use it.
    ///
    /// # Errors
    ///
    /// Returns [`LabelError::DuplicateName`] if `new` already exists and
    /// [`LabelError::NotFound`] if `old` does not. The graph is unchanged on error.
    pub fn rename_node(&mut self, old: &str, new: &str) -> Result<()> {
        if self.contains(new) {
            return Err(LabelError::DuplicateName(new.to_string()));
        }
        let index = self
            .index_of(old)
            .ok_or_else(|| LabelError::NotFound(old.to_string()))?;

        self.nodes[index].name = new.to_string();
        self.edges = self
            .edges
            .iter()
            .filter_map(|e| e.renamed(old, new))
            .collect();
        self.symmetry = self
            .symmetry
            .iter()
            .filter_map(|s| s.renamed(old, new))
            .collect();
        Ok(())
    }

    /// Move a node's default layout position.
    ///
    /// # Errors
    ///
    /// Returns [`LabelError::NotFound`] for an unknown node.
    pub fn move_node(&mut self, name: &str, x: f64, y: f64) -> Result<()> {
        let node = self.node_mut(name)?;
        node.x = x;
        node.y = y;
        Ok(())
    }

    /// Replace a node's presentation style.
    ///
    /// # Errors
    ///
    /// Returns [`LabelError::NotFound`] for an unknown node.
    pub fn set_node_style(
        &mut self,
        name: &str,
        shape: NodeShape,
        color: Color,
        thickness: u32,
        filled: bool,
        text: Option<String>,
    ) -> Result<()> {
        let node = self.node_mut(name)?;
        node.shape = shape;
        node.color = color;
        node.thickness = thickness;
        node.filled = filled;
        node.text = text;
        Ok(())
    }

    fn node_mut(&mut self, name: &str) -> Result<&mut Node> {
        self.nodes
            .iter_mut()
            .find(|n| n.name == name)
            .ok_or_else(|| LabelError::NotFound(name.to_string()))
    }

    /// Connect two nodes.
    ///
    /// Returns `false` for a self-edge, an unknown node or an existing edge.
    pub fn add_edge(&mut self, a: &str, b: &str) -> bool {
        let Some(pair) = NodePair::new(a, b) else {
            return false;
        };
        if !self.contains(a) || !self.contains(b) {
            return false;
        }
        self.edges.insert(pair)
    }

    /// Remove a connection if present.
    pub fn remove_edge(&mut self, a: &str, b: &str) {
        if let Some(pair) = NodePair::new(a, b) {
            self.edges.remove(&pair);
        }
    }

    /// Declare two nodes as left/right mirrors.
    ///
    /// Returns `false` when `a == b`, either node is unknown, or either node
    /// already belongs to a symmetry pair.
    pub fn add_symmetry(&mut self, a: &str, b: &str) -> bool {
        let Some(pair) = NodePair::new(a, b) else {
            return false;
        };
        if !self.contains(a) || !self.contains(b) {
            return false;
        }
        if self.symmetry.iter().any(|s| s.contains(a) || s.contains(b)) {
            return false;
        }
        self.symmetry.insert(pair)
    }

    /// Remove a symmetry pair if present.
    pub fn remove_symmetry(&mut self, a: &str, b: &str) {
        if let Some(pair) = NodePair::new(a, b) {
            self.symmetry.remove(&pair);
        }
    }

    /// Derive `(keypoint_count, flip_permutation, keypoint_names)`.
    ///
    /// The permutation starts as the identity and swaps the indices of each
    /// symmetry pair, so nodes without a partner map to themselves.
    #[must_use]
    pub fn training_metadata(&self) -> (usize, Vec<usize>, Vec<String>) {
        let names = self.node_names();
        let mut flip: Vec<usize> = (0..names.len()).collect();

        for pair in &self.symmetry {
            let (a, b) = pair.names();
            if let (Some(i), Some(j)) = (self.index_of(a), self.index_of(b)) {
                flip.swap(i, j);
            }
        }

        (names.len(), flip, names)
    }

    /// Load a graph from a skeleton YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid YAML.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            LabelError::IoError(format!("Failed to read skeleton {}: {e}", path.display()))
        })?;
        Self::from_yaml_str(&text)
    }

    /// Replace this graph with the contents of a skeleton file (no merge).
    ///
    /// # Errors
    ///
    /// Returns an error if loading fails; `self` is untouched in that case.
    pub fn reload<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        *self = Self::load(path)?;
        Ok(())
    }

    /// Save the graph as skeleton YAML.
    ///
    /// # Errors
    ///
    /// Returns [`LabelError::DuplicateName`] if two nodes share a name, or an
    /// IO error if the file cannot be written.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let yaml = self.to_yaml_string()?;
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, yaml).map_err(|e| {
            LabelError::IoError(format!("Failed to write skeleton {}: {e}", path.display()))
        })
    }

    /// Parse skeleton YAML.
    ///
    /// Repeated node names, malformed or dangling connections, and symmetry
    /// entries that would put a node in a second pair are skipped with a warning.
    ///
    /// # Errors
    ///
    /// Returns [`LabelError::YamlError`] if the text is not a skeleton document.
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let mut graph = Self::new();
        if text.trim().is_empty() {
            return Ok(graph);
        }
        let file: SkeletonFile = serde_yaml::from_str(text)?;

        for record in file.nodes {
            if graph.contains(&record.name) {
                skipped!(format!("Skeleton node '{}'", record.name), "repeated name");
                continue;
            }
            if let Some(n) = record
                .name
                .strip_prefix(AUTO_NAME_PREFIX)
                .and_then(|s| s.parse::<usize>().ok())
            {
                graph.node_counter = graph.node_counter.max(n);
            }
            let text = if record.shape == NodeShape::Text {
                record.text
            } else {
                None
            };
            graph.nodes.push(Node {
                name: record.name,
                shape: record.shape,
                color: record.color,
                thickness: record.line_thickness,
                filled: record.filled,
                x: record.position[0],
                y: record.position[1],
                text,
            });
        }

        for conn in &file.connections {
            if let [a, b] = conn.as_slice() {
                if !graph.add_edge(a, b) {
                    skipped!(format!("Skeleton connection [{a}, {b}]"), "self, unknown or repeated node");
                }
            } else {
                skipped!("Skeleton connection", "{} names instead of 2", conn.len());
            }
        }

        for sym in &file.symmetry {
            if let [a, b] = sym.as_slice() {
                if !graph.add_symmetry(a, b) {
                    skipped!(format!("Symmetry pair [{a}, {b}]"), "unknown node or node already paired");
                }
            } else {
                skipped!("Symmetry entry", "{} names instead of 2", sym.len());
            }
        }

        Ok(graph)
    }

    /// Serialize the graph as skeleton YAML.
    ///
    /// # Errors
    ///
    /// Returns [`LabelError::DuplicateName`] if two nodes share a name.
    pub fn to_yaml_string(&self) -> Result<String> {
        let mut seen = HashSet::new();
        for node in &self.nodes {
            if !seen.insert(node.name.as_str()) {
                return Err(LabelError::DuplicateName(node.name.clone()));
            }
        }

        let pair_list = |set: &BTreeSet<NodePair>| {
            set.iter()
                .map(|p| vec![p.0.clone(), p.1.clone()])
                .collect::<Vec<_>>()
        };

        let file = SkeletonFile {
            nodes: self
                .nodes
                .iter()
                .map(|n| NodeRecord {
                    name: n.name.clone(),
                    shape: n.shape,
                    color: n.color,
                    line_thickness: n.thickness,
                    filled: n.filled,
                    position: [n.x, n.y],
                    text: (n.shape == NodeShape::Text).then(|| n.display_text().to_string()),
                })
                .collect(),
            connections: pair_list(&self.edges),
            symmetry: pair_list(&self.symmetry),
        };

        Ok(serde_yaml::to_string(&file)?)
    }
}

/// On-disk skeleton document.
#[derive(Debug, Serialize, Deserialize)]
struct SkeletonFile {
    #[serde(default)]
    nodes: Vec<NodeRecord>,
    #[serde(default)]
    connections: Vec<Vec<String>>,
    #[serde(default)]
    symmetry: Vec<Vec<String>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct NodeRecord {
    name: String,
    #[serde(default)]
    shape: NodeShape,
    #[serde(default)]
    color: Color,
    #[serde(default = "default_thickness")]
    line_thickness: u32,
    #[serde(default)]
    filled: bool,
    #[serde(default)]
    position: [f64; 2],
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

const fn default_thickness() -> u32 {
    1
}
