//! Node representation and name unification for circuit graphs.

use std::fmt;

use indexmap::IndexMap;
use serde::Serialize;

/// Unique identifier for a node within one scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    /// The ground node (node 0).
    pub const GROUND: NodeId = NodeId(0);

    /// Create a new NodeId from a raw value.
    pub fn new(id: u32) -> Self {
        NodeId(id)
    }

    /// Get the raw node ID value.
    pub fn as_u32(self) -> u32 {
        self.0
    }

    /// Check if this is the ground node.
    pub fn is_ground(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_ground() {
            write!(f, "GND")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

/// A node in the circuit graph.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Node {
    id: NodeId,
    /// Spelling of the first occurrence in the netlist.
    name: String,
}

impl Node {
    /// Create a new node with the given ID and name.
    pub fn new(id: NodeId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }

    /// Get the node's ID.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Get the node's name as first written.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Check if this is the ground node.
    pub fn is_ground(&self) -> bool {
        self.id.is_ground()
    }
}

/// Canonical name to id mapping for one node scope.
///
/// Names are matched case-insensitively. The literal `0` is always bound
/// to [`NodeId::GROUND`]; other names get ids in order of first use.
/// Several names may map to one id once an alias has been folded into
/// ground.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeTable {
    names: IndexMap<String, NodeId>,
    nodes: IndexMap<NodeId, Node>,
    next_id: u32,
}

impl Default for NodeTable {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeTable {
    /// Create a table holding only the ground node.
    pub fn new() -> Self {
        let mut table = Self {
            names: IndexMap::new(),
            nodes: IndexMap::new(),
            next_id: 1, // 0 is reserved for ground
        };
        table.names.insert("0".to_string(), NodeId::GROUND);
        table
            .nodes
            .insert(NodeId::GROUND, Node::new(NodeId::GROUND, "0"));
        table
    }

    fn key(name: &str) -> String {
        name.to_uppercase()
    }

    /// Return the id for `name`, assigning a fresh one on first use.
    pub fn unify(&mut self, name: &str) -> NodeId {
        let key = Self::key(name);
        if let Some(&id) = self.names.get(&key) {
            return id;
        }
        let id = NodeId::new(self.next_id);
        self.next_id += 1;
        self.names.insert(key, id);
        self.nodes.insert(id, Node::new(id, name));
        id
    }

    /// Look up a node id by name without creating it.
    pub fn lookup(&self, name: &str) -> Option<NodeId> {
        self.names.get(&Self::key(name)).copied()
    }

    /// Get a node by id.
    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    /// Display name for an id, `0` for ground.
    pub fn name_of(&self, id: NodeId) -> Option<&str> {
        self.nodes.get(&id).map(Node::name)
    }

    /// The ground node.
    pub fn ground(&self) -> &Node {
        &self.nodes[&NodeId::GROUND]
    }

    /// Iterate over all canonical nodes, ground first.
    pub fn iter(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Number of canonical nodes, ground included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// A table always holds ground, so it is never empty.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Iterate over `(name, id)` bindings, aliases included.
    pub fn bindings(&self) -> impl Iterator<Item = (&str, NodeId)> {
        self.names.iter().map(|(name, id)| (name.as_str(), *id))
    }

    /// Fold the node named `alias` into ground.
    ///
    /// Returns the id the alias had before folding, or `None` when it was
    /// already ground. Every name bound to that id is rebound to ground.
    pub fn fold_into_ground(&mut self, alias: &str) -> crate::Result<Option<NodeId>> {
        let id = self
            .lookup(alias)
            .ok_or_else(|| crate::Error::NodeNotFound(alias.to_string()))?;
        if id.is_ground() {
            return Ok(None);
        }
        for bound in self.names.values_mut() {
            if *bound == id {
                *bound = NodeId::GROUND;
            }
        }
        self.nodes.shift_remove(&id);
        Ok(Some(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ground_node() {
        assert!(NodeId::GROUND.is_ground());
        assert_eq!(NodeId::GROUND.as_u32(), 0);
        assert_eq!(NodeId::GROUND.to_string(), "GND");
    }

    #[test]
    fn test_node_id() {
        let id = NodeId::new(42);
        assert!(!id.is_ground());
        assert_eq!(id.as_u32(), 42);
        assert_eq!(id.to_string(), "42");
    }

    #[test]
    fn test_unify_is_case_insensitive() {
        let mut table = NodeTable::new();
        let vdd = table.unify("vdd");
        assert_eq!(table.unify("VDD"), vdd);
        assert_eq!(table.name_of(vdd), Some("vdd"));
        assert_eq!(table.unify("0"), NodeId::GROUND);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_ids_follow_first_use() {
        let mut table = NodeTable::new();
        assert_eq!(table.unify("in").as_u32(), 1);
        assert_eq!(table.unify("out").as_u32(), 2);
        assert_eq!(table.unify("in").as_u32(), 1);
    }

    #[test]
    fn test_fold_into_ground() {
        let mut table = NodeTable::new();
        table.unify("1");
        let five = table.unify("5");

        assert_eq!(table.fold_into_ground("5").unwrap(), Some(five));
        assert_eq!(table.lookup("5"), Some(NodeId::GROUND));
        assert!(table.get(five).is_none());
        assert_eq!(table.len(), 2);

        // Second fold is a no-op.
        assert_eq!(table.fold_into_ground("5").unwrap(), None);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_fold_unknown_node() {
        let mut table = NodeTable::new();
        assert!(matches!(
            table.fold_into_ground("9"),
            Err(crate::Error::NodeNotFound(_))
        ));
    }
}
