/// Stable index of a config node, assigned at graph-build time.
///
/// Indices are dense (root is 0) so per-node lookups during instantiation
/// and port wiring are array accesses, not string lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeIndex(pub usize);
