/// Opaque identifier of a native-side component object.
///
/// The engine owns the underlying resource; the coordination layer only
/// holds the handle and issues further operations through it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NativeHandle(pub usize);

/// Identifier of a counted drain barrier inside the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BarrierHandle(pub usize);
