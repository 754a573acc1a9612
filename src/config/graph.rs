//! The component graph: an arena of config nodes rooted at index 0.

use std::collections::HashMap;

use super::error::ConfigError;
use super::id::NodeIndex;
use super::node::{ComponentFamily, ConfigNode, ParamValue, PortTarget};

/// Root-rooted collection of config nodes.
///
/// Nodes live in a dense arena; paths (`root.cpu0`) are derived from the
/// parent chain at insertion time and kept for the description text and the
/// engine's resolver callback. All hot-path lookups go through `NodeIndex`.
pub struct ComponentGraph {
    nodes: Vec<ConfigNode>,
    paths: Vec<String>,
    by_path: HashMap<String, NodeIndex>,
}

impl ComponentGraph {
    /// Create a graph holding only the root node.
    ///
    /// The root carries the global clock: its `clock` parameter (ticks per
    /// second) is required and read by the instantiation pipeline.
    pub fn new() -> Self {
        let mut root = ConfigNode::new("root", ComponentFamily::Root);
        root.required.insert("clock".to_string());
        let mut by_path = HashMap::new();
        by_path.insert("root".to_string(), NodeIndex(0));
        Self {
            nodes: vec![root],
            paths: vec!["root".to_string()],
            by_path,
        }
    }

    pub fn root(&self) -> NodeIndex {
        NodeIndex(0)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, idx: NodeIndex) -> &ConfigNode {
        &self.nodes[idx.0]
    }

    pub fn path(&self, idx: NodeIndex) -> &str {
        &self.paths[idx.0]
    }

    /// Path -> index lookup, used as the engine's resolver callback.
    pub fn resolve(&self, path: &str) -> Option<NodeIndex> {
        self.by_path.get(path).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeIndex, &ConfigNode)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (NodeIndex(i), n))
    }

    /// Add a component under `parent`. Names must be unique per parent.
    pub fn add_child(
        &mut self,
        parent: NodeIndex,
        name: impl Into<String>,
        family: ComponentFamily,
    ) -> Result<NodeIndex, ConfigError> {
        let name = name.into();
        let path = format!("{}.{}", self.paths[parent.0], name);
        if self.by_path.contains_key(&path) {
            return Err(ConfigError::DuplicateChild {
                parent: self.paths[parent.0].clone(),
                name,
            });
        }
        let idx = NodeIndex(self.nodes.len());
        self.nodes.push(ConfigNode::new(name, family));
        self.nodes[parent.0].children.push(idx);
        self.by_path.insert(path.clone(), idx);
        self.paths.push(path);
        Ok(idx)
    }

    pub fn set_param(&mut self, node: NodeIndex, name: impl Into<String>, value: ParamValue) {
        self.nodes[node.0].params.insert(name.into(), value);
    }

    /// Mark a parameter as required: validation fails if it has no value.
    pub fn require_param(&mut self, node: NodeIndex, name: impl Into<String>) {
        self.nodes[node.0].required.insert(name.into());
    }

    /// Declare a named, initially unconnected port.
    pub fn add_port(&mut self, node: NodeIndex, name: impl Into<String>) {
        self.nodes[node.0].ports.insert(name.into(), None);
    }

    /// Point a declared port at a peer node's port.
    ///
    /// The local port must already be declared; whether the peer actually
    /// declares `peer_port` is checked by [`validate`](Self::validate), so a
    /// dangling reference is representable until instantiation.
    pub fn bind_port(
        &mut self,
        node: NodeIndex,
        port: &str,
        peer: NodeIndex,
        peer_port: impl Into<String>,
    ) -> Result<(), ConfigError> {
        let slot = self.nodes[node.0].ports.get_mut(port).ok_or_else(|| {
            ConfigError::NoSuchPort {
                path: self.paths[node.0].clone(),
                port: port.to_string(),
            }
        })?;
        *slot = Some(PortTarget {
            node: peer,
            port: peer_port.into(),
        });
        Ok(())
    }

    /// Check the pre-instantiation invariants: every required parameter has
    /// a value, every node-valued parameter points into this graph, and
    /// every bound port resolves to a declared peer port.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (idx, node) in self.iter() {
            for req in &node.required {
                if !node.params.contains_key(req) {
                    return Err(ConfigError::MissingParam {
                        path: self.paths[idx.0].clone(),
                        param: req.clone(),
                    });
                }
            }
            for (param, value) in &node.params {
                if dangling_ref(value, self.nodes.len()) {
                    return Err(ConfigError::DanglingNodeRef {
                        path: self.paths[idx.0].clone(),
                        param: param.clone(),
                    });
                }
            }
            for (port, target) in node.bound_ports() {
                let peer = &self.nodes[target.node.0];
                if !peer.ports.contains_key(&target.port) {
                    return Err(ConfigError::UnresolvedPort {
                        path: self.paths[idx.0].clone(),
                        port: port.to_string(),
                        peer_path: self.paths[target.node.0].clone(),
                        peer_port: target.port.clone(),
                    });
                }
            }
        }
        Ok(())
    }
}

impl Default for ComponentGraph {
    fn default() -> Self {
        Self::new()
    }
}

fn dangling_ref(value: &ParamValue, len: usize) -> bool {
    match value {
        ParamValue::Node(idx) => idx.0 >= len,
        ParamValue::List(items) => items.iter().any(|v| dangling_ref(v, len)),
        _ => false,
    }
}
