//! Config node types: one node per simulated component.

use std::collections::{BTreeMap, BTreeSet};

use super::id::NodeIndex;

/// Capability tag carried by every component.
///
/// Operations that only make sense for some component kinds (switchover,
/// port wiring rules) are guarded on this tag instead of inspecting the
/// instance at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentFamily {
    Root,
    Processor,
    CacheController,
    MemoryController,
    Bus,
    Device,
}

impl ComponentFamily {
    /// Lower-case label used in the rendered graph description.
    pub fn label(self) -> &'static str {
        match self {
            ComponentFamily::Root => "root",
            ComponentFamily::Processor => "processor",
            ComponentFamily::CacheController => "cache_controller",
            ComponentFamily::MemoryController => "memory_controller",
            ComponentFamily::Bus => "bus",
            ComponentFamily::Device => "device",
        }
    }
}

/// A parameter value on a config node.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    /// Non-owning reference to another node in the same graph.
    Node(NodeIndex),
    List(Vec<ParamValue>),
}

impl ParamValue {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            ParamValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParamValue::Bool(v) => Some(*v),
            _ => None,
        }
    }
}

/// Target of a bound port: a peer node and the name of the peer's port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortTarget {
    pub node: NodeIndex,
    pub port: String,
}

/// Declarative description of one simulated component.
///
/// Immutable once instantiation begins: the graph is consumed by value at
/// that point, so no mutation path remains.
#[derive(Debug)]
pub struct ConfigNode {
    pub(crate) name: String,
    pub(crate) family: ComponentFamily,
    pub(crate) params: BTreeMap<String, ParamValue>,
    pub(crate) required: BTreeSet<String>,
    pub(crate) ports: BTreeMap<String, Option<PortTarget>>,
    pub(crate) children: Vec<NodeIndex>,
}

impl ConfigNode {
    pub(crate) fn new(name: impl Into<String>, family: ComponentFamily) -> Self {
        Self {
            name: name.into(),
            family,
            params: BTreeMap::new(),
            required: BTreeSet::new(),
            ports: BTreeMap::new(),
            children: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn family(&self) -> ComponentFamily {
        self.family
    }

    pub fn param(&self, name: &str) -> Option<&ParamValue> {
        self.params.get(name)
    }

    pub fn children(&self) -> &[NodeIndex] {
        &self.children
    }

    /// All declared ports, bound or not, in name order.
    pub fn ports(&self) -> impl Iterator<Item = (&str, Option<&PortTarget>)> {
        self.ports.iter().map(|(k, v)| (k.as_str(), v.as_ref()))
    }

    /// Only the ports that reference a peer, in name order.
    pub fn bound_ports(&self) -> impl Iterator<Item = (&str, &PortTarget)> {
        self.ports
            .iter()
            .filter_map(|(k, v)| v.as_ref().map(|t| (k.as_str(), t)))
    }
}
