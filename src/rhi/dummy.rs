//! Headless RHI device that executes nothing and records every call into a command log.
//!
//! Every object gets a unique, non-zero native handle. Commands recorded through any recorder, object creation and
//! destruction, and queue submissions all end up in one log that tests can inspect through [`DummyDevice::commands`].
//! Submissions complete immediately: a fence passed to [`Queue::submit`] is signaled right away.
//!
//! # Example
//! ```
//! use std::sync::Arc;
//! use framegraph::prelude::*;
//! use framegraph::rhi::dummy::{Command, DummyDevice};
//!
//! let device = DummyDevice::new();
//! let buffer = device.create_buffer(&BufferCreateInfo::new("vertices", 64, BufferUsageFlags::VERTEX))?;
//! assert!(device.commands().contains(&Command::CreateBuffer {
//!     handle: buffer.native_handle(),
//!     name: "vertices".to_string(),
//! }));
//! # Ok::<(), anyhow::Error>(())
//! ```

use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::ptr::NonNull;
use std::rc::Rc;
use std::sync::Arc;

use anyhow::Result;

use crate::core::error::Error;
use crate::rhi::*;

/// One entry in the command log of a [`DummyDevice`].
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    CreateBuffer { handle: u64, name: String },
    DestroyBuffer { handle: u64 },
    CreateTexture { handle: u64, name: String },
    DestroyTexture { handle: u64 },
    CreateBufferView { buffer: u64, view: u64 },
    CreateTextureView { texture: u64, view: u64 },
    DestroyView { view: u64 },
    CreateBindGroup { handle: u64, entries: Vec<(u32, u64)> },
    Map { buffer: u64, offset: u64, length: u64 },
    Unmap { buffer: u64 },
    Begin { cmd: u64 },
    BufferBarrier { buffer: u64, before: BufferState, after: BufferState },
    TextureBarrier { texture: u64, before: TextureState, after: TextureState },
    BeginCopyPass,
    CopyBufferToBuffer { src: u64, dst: u64, size: u64 },
    CopyBufferToTexture { src: u64, dst: u64 },
    CopyTextureToBuffer { src: u64, dst: u64 },
    CopyTextureToTexture { src: u64, dst: u64 },
    BeginComputePass,
    SetComputePipeline { pipeline: u64 },
    SetBindGroup { index: u32, bind_group: u64 },
    Dispatch { x: u32, y: u32, z: u32 },
    BeginRasterPass { color_attachments: Vec<u64>, depth_stencil_attachment: Option<u64> },
    SetRasterPipeline { pipeline: u64 },
    SetViewport { width: f32, height: f32 },
    SetScissor { right: u32, bottom: u32 },
    SetVertexBuffer { slot: u32, view: u64 },
    SetIndexBuffer { view: u64 },
    Draw { vertex_count: u32, instance_count: u32 },
    DrawIndexed { index_count: u32, instance_count: u32 },
    EndPass,
    PushDebugLabel { name: String },
    PopDebugLabel,
    End { cmd: u64 },
    Submit {
        queue: QueueType,
        cmd: Option<u64>,
        wait: Vec<u64>,
        signal: Vec<u64>,
        fence: Option<u64>,
    },
}

#[derive(Debug, Default)]
struct DummyShared {
    next_handle: Cell<u64>,
    log: RefCell<Vec<Command>>,
    fail_allocations: Cell<bool>,
    signaled_fences: RefCell<HashSet<u64>>,
}

impl DummyShared {
    fn next_handle(&self) -> u64 {
        let handle = self.next_handle.get() + 1;
        self.next_handle.set(handle);
        handle
    }

    fn push(&self, command: Command) {
        self.log.borrow_mut().push(command);
    }
}

/// Headless device. Cloning it gives another handle to the same device and command log.
#[derive(Debug, Clone)]
pub struct DummyDevice {
    shared: Rc<DummyShared>,
    queues: Vec<Arc<DummyQueue>>,
}

impl Default for DummyDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl DummyDevice {
    /// Create a new device with one graphics, one compute and one transfer queue.
    pub fn new() -> Self {
        let shared = Rc::new(DummyShared::default());
        let queues = [QueueType::Graphics, QueueType::Compute, QueueType::Transfer]
            .into_iter()
            .map(|ty| {
                Arc::new(DummyQueue {
                    ty,
                    shared: shared.clone(),
                })
            })
            .collect();
        Self {
            shared,
            queues,
        }
    }

    /// Get a copy of the full command log.
    pub fn commands(&self) -> Vec<Command> {
        self.shared.log.borrow().clone()
    }

    /// Take the command log, leaving it empty.
    pub fn take_commands(&self) -> Vec<Command> {
        self.shared.log.take()
    }

    /// Get the commands recorded into a single command buffer, excluding its `Begin` and `End` markers.
    /// Returns an empty list if the command buffer was never recorded.
    pub fn commands_in(&self, cmd: u64) -> Vec<Command> {
        let log = self.shared.log.borrow();
        let Some(begin) = log.iter().position(|c| *c == Command::Begin { cmd }) else { return vec![] };
        log[begin + 1..]
            .iter()
            .take_while(|c| **c != Command::End { cmd })
            .cloned()
            .collect()
    }

    /// Get all queue submissions in submission order.
    pub fn submissions(&self) -> Vec<Command> {
        self.shared
            .log
            .borrow()
            .iter()
            .filter(|c| matches!(c, Command::Submit { .. }))
            .cloned()
            .collect()
    }

    /// Make every following buffer and texture creation fail.
    pub fn fail_allocations(&self, fail: bool) {
        self.shared.fail_allocations.set(fail);
    }

    /// Create a buffer and return it with its concrete type, so its memory can be inspected.
    pub fn create_dummy_buffer(&self, info: &BufferCreateInfo) -> Result<Arc<DummyBuffer>> {
        if self.shared.fail_allocations.get() {
            return Err(Error::DeviceFailure(format!("out of memory creating buffer `{}`", info.debug_name)).into());
        }
        let handle = self.shared.next_handle();
        self.shared.push(Command::CreateBuffer {
            handle,
            name: info.debug_name.clone(),
        });
        let mappable = info.usages.intersects(BufferUsageFlags::MAP_READ | BufferUsageFlags::MAP_WRITE);
        Ok(Arc::new(DummyBuffer {
            handle,
            info: info.clone(),
            memory: RefCell::new(if mappable { vec![0; info.size as usize] } else { vec![] }),
            shared: self.shared.clone(),
        }))
    }

    /// Create a texture and return it with its concrete type.
    pub fn create_dummy_texture(&self, info: &TextureCreateInfo) -> Result<Arc<DummyTexture>> {
        if self.shared.fail_allocations.get() {
            return Err(Error::DeviceFailure(format!("out of memory creating texture `{}`", info.debug_name)).into());
        }
        let handle = self.shared.next_handle();
        self.shared.push(Command::CreateTexture {
            handle,
            name: info.debug_name.clone(),
        });
        Ok(Arc::new(DummyTexture {
            handle,
            info: info.clone(),
            shared: self.shared.clone(),
        }))
    }

    /// Create a bind group layout from a list of named bindings.
    pub fn create_bind_group_layout<S: Into<String>>(
        &self,
        bindings: impl IntoIterator<Item = (S, ResourceBinding)>,
    ) -> Arc<DummyBindGroupLayout> {
        Arc::new(DummyBindGroupLayout {
            bindings: bindings.into_iter().map(|(name, binding)| (name.into(), binding)).collect(),
        })
    }

    pub fn create_sampler(&self) -> Arc<DummyObject> {
        Arc::new(DummyObject(self.shared.next_handle()))
    }

    pub fn create_compute_pipeline(&self) -> Arc<DummyObject> {
        Arc::new(DummyObject(self.shared.next_handle()))
    }

    pub fn create_raster_pipeline(&self) -> Arc<DummyObject> {
        Arc::new(DummyObject(self.shared.next_handle()))
    }
}

impl Device for DummyDevice {
    fn queue(&self, ty: QueueType) -> Result<Arc<dyn Queue>> {
        let queue = self
            .queues
            .iter()
            .find(|queue| queue.ty == ty)
            .ok_or_else(|| Error::DeviceFailure(format!("no {ty:?} queue")))?;
        Ok(queue.clone())
    }

    fn create_buffer(&self, info: &BufferCreateInfo) -> Result<Arc<dyn Buffer>> {
        Ok(self.create_dummy_buffer(info)?)
    }

    fn create_texture(&self, info: &TextureCreateInfo) -> Result<Arc<dyn Texture>> {
        Ok(self.create_dummy_texture(info)?)
    }

    fn create_bind_group(&self, info: &BindGroupCreateInfo) -> Result<Arc<dyn BindGroup>> {
        let handle = self.shared.next_handle();
        let entries = info
            .entries
            .iter()
            .map(|entry| {
                let resource = match &entry.resource {
                    BindGroupEntryResource::Sampler(sampler) => sampler.native_handle(),
                    BindGroupEntryResource::BufferView(view) => view.native_handle(),
                    BindGroupEntryResource::TextureView(view) => view.native_handle(),
                };
                (entry.binding.index, resource)
            })
            .collect();
        self.shared.push(Command::CreateBindGroup {
            handle,
            entries,
        });
        Ok(Arc::new(DummyObject(handle)))
    }

    fn create_command_buffer(&self) -> Result<Box<dyn CommandBuffer>> {
        Ok(Box::new(DummyCommandBuffer {
            handle: self.shared.next_handle(),
            shared: self.shared.clone(),
        }))
    }

    fn create_semaphore(&self) -> Result<Arc<dyn Semaphore>> {
        Ok(Arc::new(DummyObject(self.shared.next_handle())))
    }

    fn create_fence(&self, signaled: bool) -> Result<Arc<dyn Fence>> {
        let handle = self.shared.next_handle();
        if signaled {
            self.shared.signaled_fences.borrow_mut().insert(handle);
        }
        Ok(Arc::new(DummyFence {
            handle,
            shared: self.shared.clone(),
        }))
    }
}

/// Object that only carries a handle. Used for samplers, pipelines, bind groups and semaphores.
#[derive(Debug)]
pub struct DummyObject(u64);

impl Sampler for DummyObject {
    fn native_handle(&self) -> u64 {
        self.0
    }
}

impl ComputePipeline for DummyObject {
    fn native_handle(&self) -> u64 {
        self.0
    }
}

impl RasterPipeline for DummyObject {
    fn native_handle(&self) -> u64 {
        self.0
    }
}

impl BindGroup for DummyObject {
    fn native_handle(&self) -> u64 {
        self.0
    }
}

impl Semaphore for DummyObject {
    fn native_handle(&self) -> u64 {
        self.0
    }
}

#[derive(Debug)]
pub struct DummyBuffer {
    handle: u64,
    info: BufferCreateInfo,
    memory: RefCell<Vec<u8>>,
    shared: Rc<DummyShared>,
}

impl DummyBuffer {
    /// Get a copy of the host visible memory of this buffer. Empty if the buffer is not mappable.
    pub fn contents(&self) -> Vec<u8> {
        self.memory.borrow().clone()
    }
}

impl Buffer for DummyBuffer {
    fn create_info(&self) -> &BufferCreateInfo {
        &self.info
    }

    fn native_handle(&self) -> u64 {
        self.handle
    }

    fn create_buffer_view(&self, _info: &BufferViewCreateInfo) -> Result<Arc<dyn BufferView>> {
        let view = self.shared.next_handle();
        self.shared.push(Command::CreateBufferView {
            buffer: self.handle,
            view,
        });
        Ok(Arc::new(DummyView {
            handle: view,
            shared: self.shared.clone(),
        }))
    }

    fn map(&self, _mode: MapMode, offset: u64, length: u64) -> Result<NonNull<u8>> {
        let mut memory = self.memory.borrow_mut();
        if memory.is_empty() {
            return Err(Error::BufferNotMappable(self.info.debug_name.clone()).into());
        }
        if offset.saturating_add(length) > memory.len() as u64 {
            return Err(Error::UploadOutOfRange {
                buffer: self.info.debug_name.clone(),
                offset,
                size: length,
                capacity: memory.len() as u64,
            }
            .into());
        }
        self.shared.push(Command::Map {
            buffer: self.handle,
            offset,
            length,
        });
        // The vector is never resized, so the pointer outlives the borrow.
        let ptr = memory[offset as usize..].as_mut_ptr();
        NonNull::new(ptr).ok_or_else(|| Error::DeviceFailure("mapped a null pointer".to_string()).into())
    }

    fn unmap(&self) {
        self.shared.push(Command::Unmap {
            buffer: self.handle,
        });
    }
}

impl Drop for DummyBuffer {
    fn drop(&mut self) {
        self.shared.push(Command::DestroyBuffer {
            handle: self.handle,
        });
    }
}

#[derive(Debug)]
pub struct DummyTexture {
    handle: u64,
    info: TextureCreateInfo,
    shared: Rc<DummyShared>,
}

impl Texture for DummyTexture {
    fn create_info(&self) -> &TextureCreateInfo {
        &self.info
    }

    fn native_handle(&self) -> u64 {
        self.handle
    }

    fn create_texture_view(&self, _info: &TextureViewCreateInfo) -> Result<Arc<dyn TextureView>> {
        let view = self.shared.next_handle();
        self.shared.push(Command::CreateTextureView {
            texture: self.handle,
            view,
        });
        Ok(Arc::new(DummyView {
            handle: view,
            shared: self.shared.clone(),
        }))
    }
}

impl Drop for DummyTexture {
    fn drop(&mut self) {
        self.shared.push(Command::DestroyTexture {
            handle: self.handle,
        });
    }
}

#[derive(Debug)]
pub struct DummyView {
    handle: u64,
    shared: Rc<DummyShared>,
}

impl BufferView for DummyView {
    fn native_handle(&self) -> u64 {
        self.handle
    }
}

impl TextureView for DummyView {
    fn native_handle(&self) -> u64 {
        self.handle
    }
}

impl Drop for DummyView {
    fn drop(&mut self) {
        self.shared.push(Command::DestroyView {
            view: self.handle,
        });
    }
}

/// Bind group layout that resolves binding names from a fixed table.
#[derive(Debug)]
pub struct DummyBindGroupLayout {
    bindings: Vec<(String, ResourceBinding)>,
}

impl BindGroupLayout for DummyBindGroupLayout {
    fn find_binding(&self, name: &str) -> Option<ResourceBinding> {
        self.bindings
            .iter()
            .find(|(binding, _)| binding == name)
            .map(|(_, binding)| *binding)
    }
}

#[derive(Debug)]
pub struct DummyFence {
    handle: u64,
    shared: Rc<DummyShared>,
}

impl Fence for DummyFence {
    fn native_handle(&self) -> u64 {
        self.handle
    }

    fn is_signaled(&self) -> bool {
        self.shared.signaled_fences.borrow().contains(&self.handle)
    }

    fn reset(&self) {
        self.shared.signaled_fences.borrow_mut().remove(&self.handle);
    }

    fn wait(&self) {}
}

#[derive(Debug)]
pub struct DummyQueue {
    ty: QueueType,
    shared: Rc<DummyShared>,
}

impl Queue for DummyQueue {
    fn queue_type(&self) -> QueueType {
        self.ty
    }

    fn submit(&self, cmd: Option<&dyn CommandBuffer>, info: &QueueSubmitInfo) -> Result<()> {
        let fence = info.signal_fence.as_ref().map(|fence| fence.native_handle());
        self.shared.push(Command::Submit {
            queue: self.ty,
            cmd: cmd.map(|cmd| cmd.native_handle()),
            wait: info.wait_semaphores.iter().map(|s| s.native_handle()).collect(),
            signal: info.signal_semaphores.iter().map(|s| s.native_handle()).collect(),
            fence,
        });
        if let Some(fence) = fence {
            self.shared.signaled_fences.borrow_mut().insert(fence);
        }
        Ok(())
    }
}

#[derive(Debug)]
pub struct DummyCommandBuffer {
    handle: u64,
    shared: Rc<DummyShared>,
}

impl CommandBuffer for DummyCommandBuffer {
    fn native_handle(&self) -> u64 {
        self.handle
    }

    fn begin(&mut self) -> Result<Box<dyn CommandRecorder + '_>> {
        self.shared.push(Command::Begin {
            cmd: self.handle,
        });
        Ok(Box::new(DummyRecorder {
            cmd: self.handle,
            shared: &self.shared,
        }))
    }
}

struct DummyRecorder<'a> {
    cmd: u64,
    shared: &'a DummyShared,
}

impl CommandRecorder for DummyRecorder<'_> {
    fn resource_barrier(&mut self, barrier: &Barrier) {
        self.shared.push(match barrier {
            Barrier::Buffer(transition) => Command::BufferBarrier {
                buffer: transition.buffer.native_handle(),
                before: transition.before,
                after: transition.after,
            },
            Barrier::Texture(transition) => Command::TextureBarrier {
                texture: transition.texture.native_handle(),
                before: transition.before,
                after: transition.after,
            },
        });
    }

    fn begin_copy_pass(&mut self) -> Box<dyn CopyPassCommandRecorder + '_> {
        self.shared.push(Command::BeginCopyPass);
        Box::new(DummyPassRecorder {
            shared: self.shared,
        })
    }

    fn begin_compute_pass(&mut self) -> Box<dyn ComputePassCommandRecorder + '_> {
        self.shared.push(Command::BeginComputePass);
        Box::new(DummyPassRecorder {
            shared: self.shared,
        })
    }

    fn begin_raster_pass(&mut self, info: &RasterPassBeginInfo) -> Box<dyn RasterPassCommandRecorder + '_> {
        self.shared.push(Command::BeginRasterPass {
            color_attachments: info.color_attachments.iter().map(|a| a.view.native_handle()).collect(),
            depth_stencil_attachment: info
                .depth_stencil_attachment
                .as_ref()
                .map(|a| a.view.native_handle()),
        });
        Box::new(DummyPassRecorder {
            shared: self.shared,
        })
    }

    fn push_debug_label(&mut self, name: &str, _color: [f32; 4]) {
        self.shared.push(Command::PushDebugLabel {
            name: name.to_string(),
        });
    }

    fn pop_debug_label(&mut self) {
        self.shared.push(Command::PopDebugLabel);
    }

    fn end(&mut self) {
        self.shared.push(Command::End {
            cmd: self.cmd,
        });
    }
}

struct DummyPassRecorder<'a> {
    shared: &'a DummyShared,
}

impl CopyPassCommandRecorder for DummyPassRecorder<'_> {
    fn copy_buffer_to_buffer(&mut self, src: &dyn Buffer, _src_offset: u64, dst: &dyn Buffer, _dst_offset: u64, size: u64) {
        self.shared.push(Command::CopyBufferToBuffer {
            src: src.native_handle(),
            dst: dst.native_handle(),
            size,
        });
    }

    fn copy_buffer_to_texture(&mut self, src: &dyn Buffer, dst: &dyn Texture, _info: &BufferTextureCopyInfo) {
        self.shared.push(Command::CopyBufferToTexture {
            src: src.native_handle(),
            dst: dst.native_handle(),
        });
    }

    fn copy_texture_to_buffer(&mut self, src: &dyn Texture, dst: &dyn Buffer, _info: &BufferTextureCopyInfo) {
        self.shared.push(Command::CopyTextureToBuffer {
            src: src.native_handle(),
            dst: dst.native_handle(),
        });
    }

    fn copy_texture_to_texture(&mut self, src: &dyn Texture, dst: &dyn Texture, _info: &TextureCopyInfo) {
        self.shared.push(Command::CopyTextureToTexture {
            src: src.native_handle(),
            dst: dst.native_handle(),
        });
    }

    fn end(&mut self) {
        self.shared.push(Command::EndPass);
    }
}

impl ComputePassCommandRecorder for DummyPassRecorder<'_> {
    fn set_pipeline(&mut self, pipeline: &dyn ComputePipeline) {
        self.shared.push(Command::SetComputePipeline {
            pipeline: pipeline.native_handle(),
        });
    }

    fn set_bind_group(&mut self, index: u32, bind_group: &dyn BindGroup) {
        self.shared.push(Command::SetBindGroup {
            index,
            bind_group: bind_group.native_handle(),
        });
    }

    fn dispatch(&mut self, x: u32, y: u32, z: u32) {
        self.shared.push(Command::Dispatch {
            x,
            y,
            z,
        });
    }

    fn end(&mut self) {
        self.shared.push(Command::EndPass);
    }
}

impl RasterPassCommandRecorder for DummyPassRecorder<'_> {
    fn set_pipeline(&mut self, pipeline: &dyn RasterPipeline) {
        self.shared.push(Command::SetRasterPipeline {
            pipeline: pipeline.native_handle(),
        });
    }

    fn set_bind_group(&mut self, index: u32, bind_group: &dyn BindGroup) {
        self.shared.push(Command::SetBindGroup {
            index,
            bind_group: bind_group.native_handle(),
        });
    }

    fn set_viewport(&mut self, _x: f32, _y: f32, width: f32, height: f32, _min_depth: f32, _max_depth: f32) {
        self.shared.push(Command::SetViewport {
            width,
            height,
        });
    }

    fn set_scissor(&mut self, _left: u32, _top: u32, right: u32, bottom: u32) {
        self.shared.push(Command::SetScissor {
            right,
            bottom,
        });
    }

    fn set_vertex_buffer(&mut self, slot: u32, view: &dyn BufferView) {
        self.shared.push(Command::SetVertexBuffer {
            slot,
            view: view.native_handle(),
        });
    }

    fn set_index_buffer(&mut self, view: &dyn BufferView) {
        self.shared.push(Command::SetIndexBuffer {
            view: view.native_handle(),
        });
    }

    fn draw(&mut self, vertex_count: u32, instance_count: u32, _first_vertex: u32, _first_instance: u32) {
        self.shared.push(Command::Draw {
            vertex_count,
            instance_count,
        });
    }

    fn draw_indexed(&mut self, index_count: u32, instance_count: u32, _first_index: u32, _base_vertex: i32, _first_instance: u32) {
        self.shared.push(Command::DrawIndexed {
            index_count,
            instance_count,
        });
    }

    fn end(&mut self) {
        self.shared.push(Command::EndPass);
    }
}
