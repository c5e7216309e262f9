//! Re-exports of the types and traits needed to build and execute a graph.
//!
//! The RHI types whose names clash with graph types (`QueueType` and `BindGroupEntry`) are not exported here, use them
//! through [`rhi`](crate::rhi) instead.

pub use crate::core::error::Error;
pub use crate::core::settings::{CrossQueuePolicy, GraphSettings, GraphSettingsBuilder};

pub use crate::cache::ResourceViewCache;
pub use crate::context::GraphContext;
pub use crate::pool::{BufferPool, Poolable, PooledRef, ResourcePool, TexturePool};

pub use crate::graph::bind_group::{BindGroupDesc, BindGroupEntry};
pub use crate::graph::handle::{BindGroupRef, BufferRef, BufferViewRef, ResourceRef, TextureRef, TextureViewRef};
pub use crate::graph::pass::{
    ColorAttachment, CopyPassDesc, DepthStencilAttachment, Pass, PassBuilder, PassType, QueueType, RasterPassDesc,
};
pub use crate::graph::pass_graph::{GraphExecuteInfo, GraphState, PassGraph};
pub use crate::graph::physical_resource::{PhysicalResource, PhysicalResourceBindings};
pub use crate::graph::resource::{ResourceState, ResourceType};
pub use crate::graph::task_graph::{DependencyGraph, DependencyKind, GraphViz};
pub use crate::graph::virtual_resource::VirtualResource;
pub use crate::graph::BufferUploadInfo;

pub use crate::sync::submit_batch::{SubmitBatch, SubmitHandle};

pub use crate::rhi::{
    BindGroup, BindGroupLayout, Buffer, BufferView, CommandBuffer, CommandRecorder, ComputePassCommandRecorder,
    ComputePipeline, CopyPassCommandRecorder, Device, Fence, Queue, RasterPassCommandRecorder, RasterPipeline, Sampler,
    Semaphore, Texture, TextureView,
};
pub use crate::rhi::{
    BindingType, BufferCreateInfo, BufferState, BufferUsageFlags, BufferViewCreateInfo, BufferViewType, Extent3D, Format,
    LoadOp, MapMode, ResourceBinding, StoreOp, TextureAspect, TextureCreateInfo, TextureDimension, TextureState,
    TextureUsageFlags, TextureViewCreateInfo, TextureViewDimension, TextureViewType,
};
