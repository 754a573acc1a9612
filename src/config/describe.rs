//! Rendering of the graph description text.
//!
//! One section per node, keyed by its path from root. The text is written
//! to the run's output directory at instantiation time and stored inside
//! every checkpoint, where it doubles as the topology guard on restore.

use std::fmt::Write as _;

use super::graph::ComponentGraph;
use super::node::ParamValue;

/// Render the whole graph as ini-style text. Deterministic: sections follow
/// node index order, keys within a section are sorted.
pub fn render_description(graph: &ComponentGraph) -> String {
    let mut out = String::new();
    for (idx, node) in graph.iter() {
        if idx.0 > 0 {
            out.push('\n');
        }
        // Section writes into a String cannot fail.
        let _ = writeln!(out, "[{}]", graph.path(idx));
        let _ = writeln!(out, "family={}", node.family().label());
        for (name, value) in &node.params {
            let _ = writeln!(out, "{name}={}", render_value(graph, value));
        }
        for (name, target) in node.ports() {
            match target {
                Some(t) => {
                    let _ = writeln!(out, "port.{name}={}:{}", graph.path(t.node), t.port);
                }
                None => {
                    let _ = writeln!(out, "port.{name}=");
                }
            }
        }
    }
    out
}

fn render_value(graph: &ComponentGraph, value: &ParamValue) -> String {
    match value {
        ParamValue::Bool(v) => v.to_string(),
        ParamValue::Int(v) => v.to_string(),
        ParamValue::Float(v) => v.to_string(),
        ParamValue::Text(v) => v.clone(),
        ParamValue::Node(idx) => graph.path(*idx).to_string(),
        ParamValue::List(items) => {
            let rendered: Vec<String> =
                items.iter().map(|v| render_value(graph, v)).collect();
            format!("[{}]", rendered.join(", "))
        }
    }
}
