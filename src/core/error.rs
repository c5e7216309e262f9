//! Exposes the framegraph error type

use thiserror::Error;

use crate::graph::QueueType;

/// Error type that framegraph can return.
///
/// Functions in this crate return [`anyhow::Result`]. To match on a specific failure,
/// use `err.downcast_ref::<Error>()`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A handle was used on a graph it does not belong to, or it points past the end of the graph's storage.
    /// This happens when a handle from another frame's graph is kept around.
    #[error("Invalid {kind} handle (index {index}, generation {generation}) for graph {graph}.")]
    InvalidHandle {
        /// Kind of object the handle refers to.
        kind: &'static str,
        /// Index stored in the handle.
        index: u32,
        /// Generation stored in the handle.
        generation: u32,
        /// Generation of the graph the handle was used on.
        graph: u32,
    },
    /// The graph was already executed. A pass graph can only be executed once.
    #[error("Pass graph was already executed, create a new graph for the next frame.")]
    AlreadyExecuted,
    /// Tried to resolve a resource that was culled from the graph.
    #[error("Resource `{0}` was culled, no physical resource is bound to it.")]
    ResourceCulled(String),
    /// Tried to resolve a resource, view or bind group that has not been devirtualized (yet).
    #[error("`{0}` was not devirtualized.")]
    NotDevirtualized(String),
    /// Two queues inside the same timeline segment access a resource in a conflicting way.
    #[error("Passes `{first}` ({first_queue:?}) and `{second}` ({second_queue:?}) access resource `{resource}` concurrently, use add_sync_point() to split them.")]
    CrossQueueHazard {
        /// Name of the resource.
        resource: String,
        /// Name of the first pass.
        first: String,
        /// Queue of the first pass.
        first_queue: QueueType,
        /// Name of the second pass.
        second: String,
        /// Queue of the second pass.
        second_queue: QueueType,
    },
    /// A bind group description contains the same binding name twice.
    #[error("Binding `{0}` was already added to this bind group.")]
    DuplicateBinding(String),
    /// A bind group description uses a binding name that is not present in its layout.
    #[error("Binding `{0}` does not exist in the bind group layout.")]
    UnknownBinding(String),
    /// A binding was given a view of the wrong type (e.g. a texture view for a uniform buffer).
    #[error("Binding `{0}` was given a view of the wrong type.")]
    BindingTypeMismatch(String),
    /// Buffer upload requested for a buffer that was not created with `MAP_WRITE` usage.
    #[error("Buffer `{0}` cannot be mapped for writing.")]
    BufferNotMappable(String),
    /// Buffer upload range lies outside the destination buffer.
    #[error("Upload of {size} bytes at offset {offset} does not fit in buffer `{buffer}` of {capacity} bytes.")]
    UploadOutOfRange {
        /// Name of the buffer.
        buffer: String,
        /// Destination offset.
        offset: u64,
        /// Upload size.
        size: u64,
        /// Buffer size.
        capacity: u64,
    },
    /// Invalidating a resource pool while some of its resources are still referenced.
    #[error("Resource pool still has {0} resources in use.")]
    PoolResourceInUse(usize),
    /// Dependency graph contains a cycle and is impossible to resolve.
    #[error("Dependency graph contains cycle.")]
    GraphHasCycle,
    /// The underlying device failed.
    #[error("Device failure: `{0}`")]
    DeviceFailure(String),
    /// Uncategorized error.
    #[error("Uncategorized error: `{0}`")]
    Uncategorized(&'static str),
}
