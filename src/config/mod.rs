//! Component graph: the declarative description of the simulated machine,
//! built entirely before instantiation.

mod describe;
mod error;
mod graph;
mod id;
mod node;

pub use describe::render_description;
pub use error::ConfigError;
pub use graph::ComponentGraph;
pub use id::NodeIndex;
pub use node::{ComponentFamily, ConfigNode, ParamValue, PortTarget};
