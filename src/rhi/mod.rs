//! Contract of the rendering hardware interface the graph drives.
//!
//! The graph never talks to a graphics API directly. Everything it needs from a device is expressed through the traits
//! in this module: object creation, command recording and queue submission. A backend implements these traits,
//! and the graph consumes them as trait objects.
//!
//! Two implementations ship with this crate:
//! - [`dummy`] is a headless device that records every call into an inspectable log. It is used by the tests.
//! - [`vulkan`] (behind the `vulkan` feature) is not a device, but a table translating the states and formats in [`types`]
//!   to Vulkan, for backends built on `ash`.
//!
//! All objects are used from a single thread. None of the traits require `Send` or `Sync`.

use std::fmt::Debug;
use std::ptr::NonNull;
use std::sync::Arc;

use anyhow::Result;

pub use types::*;

pub mod types;
pub mod dummy;
#[cfg(feature = "vulkan")]
pub mod vulkan;

/// A logical GPU device.
pub trait Device: Debug {
    /// Get the queue of the given type. Devices without a dedicated queue of that type may return their graphics queue.
    fn queue(&self, ty: QueueType) -> Result<Arc<dyn Queue>>;
    fn create_buffer(&self, info: &BufferCreateInfo) -> Result<Arc<dyn Buffer>>;
    fn create_texture(&self, info: &TextureCreateInfo) -> Result<Arc<dyn Texture>>;
    fn create_bind_group(&self, info: &BindGroupCreateInfo) -> Result<Arc<dyn BindGroup>>;
    fn create_command_buffer(&self) -> Result<Box<dyn CommandBuffer>>;
    /// Create a binary semaphore.
    fn create_semaphore(&self) -> Result<Arc<dyn Semaphore>>;
    fn create_fence(&self, signaled: bool) -> Result<Arc<dyn Fence>>;
}

pub trait Buffer: Debug {
    fn create_info(&self) -> &BufferCreateInfo;
    /// Backend handle of this buffer. Must be unique among live buffers and textures.
    fn native_handle(&self) -> u64;
    fn create_buffer_view(&self, info: &BufferViewCreateInfo) -> Result<Arc<dyn BufferView>>;
    /// Map a range of the buffer into host memory. The pointer stays valid until [`Buffer::unmap`] is called.
    fn map(&self, mode: MapMode, offset: u64, length: u64) -> Result<NonNull<u8>>;
    fn unmap(&self);
}

pub trait Texture: Debug {
    fn create_info(&self) -> &TextureCreateInfo;
    /// Backend handle of this texture. Must be unique among live buffers and textures.
    fn native_handle(&self) -> u64;
    fn create_texture_view(&self, info: &TextureViewCreateInfo) -> Result<Arc<dyn TextureView>>;
}

pub trait BufferView: Debug {
    fn native_handle(&self) -> u64;
}

pub trait TextureView: Debug {
    fn native_handle(&self) -> u64;
}

pub trait Sampler: Debug {
    fn native_handle(&self) -> u64;
}

pub trait BindGroupLayout: Debug {
    /// Look up a binding slot by its name in the shader.
    fn find_binding(&self, name: &str) -> Option<ResourceBinding>;
}

pub trait BindGroup: Debug {
    fn native_handle(&self) -> u64;
}

pub trait ComputePipeline: Debug {
    fn native_handle(&self) -> u64;
}

pub trait RasterPipeline: Debug {
    fn native_handle(&self) -> u64;
}

pub trait Semaphore: Debug {
    fn native_handle(&self) -> u64;
}

pub trait Fence: Debug {
    fn native_handle(&self) -> u64;
    fn is_signaled(&self) -> bool;
    fn reset(&self);
    /// Block until the fence is signaled.
    fn wait(&self);
}

pub trait CommandBuffer: Debug {
    fn native_handle(&self) -> u64;
    /// Start recording into this command buffer.
    fn begin(&mut self) -> Result<Box<dyn CommandRecorder + '_>>;
}

/// Records commands outside of any pass.
pub trait CommandRecorder {
    fn resource_barrier(&mut self, barrier: &Barrier);
    fn begin_copy_pass(&mut self) -> Box<dyn CopyPassCommandRecorder + '_>;
    fn begin_compute_pass(&mut self) -> Box<dyn ComputePassCommandRecorder + '_>;
    fn begin_raster_pass(&mut self, info: &RasterPassBeginInfo) -> Box<dyn RasterPassCommandRecorder + '_>;
    fn push_debug_label(&mut self, name: &str, color: [f32; 4]);
    fn pop_debug_label(&mut self);
    /// Finish recording.
    fn end(&mut self);
}

pub trait CopyPassCommandRecorder {
    fn copy_buffer_to_buffer(&mut self, src: &dyn Buffer, src_offset: u64, dst: &dyn Buffer, dst_offset: u64, size: u64);
    fn copy_buffer_to_texture(&mut self, src: &dyn Buffer, dst: &dyn Texture, info: &BufferTextureCopyInfo);
    fn copy_texture_to_buffer(&mut self, src: &dyn Texture, dst: &dyn Buffer, info: &BufferTextureCopyInfo);
    fn copy_texture_to_texture(&mut self, src: &dyn Texture, dst: &dyn Texture, info: &TextureCopyInfo);
    fn end(&mut self);
}

pub trait ComputePassCommandRecorder {
    fn set_pipeline(&mut self, pipeline: &dyn ComputePipeline);
    fn set_bind_group(&mut self, index: u32, bind_group: &dyn BindGroup);
    fn dispatch(&mut self, group_count_x: u32, group_count_y: u32, group_count_z: u32);
    fn end(&mut self);
}

pub trait RasterPassCommandRecorder {
    fn set_pipeline(&mut self, pipeline: &dyn RasterPipeline);
    fn set_bind_group(&mut self, index: u32, bind_group: &dyn BindGroup);
    fn set_viewport(&mut self, x: f32, y: f32, width: f32, height: f32, min_depth: f32, max_depth: f32);
    fn set_scissor(&mut self, left: u32, top: u32, right: u32, bottom: u32);
    fn set_vertex_buffer(&mut self, slot: u32, view: &dyn BufferView);
    fn set_index_buffer(&mut self, view: &dyn BufferView);
    fn draw(&mut self, vertex_count: u32, instance_count: u32, first_vertex: u32, first_instance: u32);
    fn draw_indexed(&mut self, index_count: u32, instance_count: u32, first_index: u32, base_vertex: i32, first_instance: u32);
    fn end(&mut self);
}

/// Wait and signal primitives of one queue submission.
#[derive(Debug, Clone, Default)]
pub struct QueueSubmitInfo {
    pub wait_semaphores: Vec<Arc<dyn Semaphore>>,
    pub signal_semaphores: Vec<Arc<dyn Semaphore>>,
    pub signal_fence: Option<Arc<dyn Fence>>,
}

pub trait Queue: Debug {
    fn queue_type(&self) -> QueueType;
    /// Submit a command buffer. A submission without a command buffer only waits and signals.
    fn submit(&self, cmd: Option<&dyn CommandBuffer>, info: &QueueSubmitInfo) -> Result<()>;
}
