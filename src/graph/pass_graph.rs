//! The pass graph module holds the render graph implementation.
//!
//! A [`PassGraph`] is built once per frame: declare resources, views, bind groups and passes, then call
//! [`PassGraph::execute`]. Execution compiles the declared accesses, culls passes and resources that do not contribute to
//! anything observable, binds physical resources, records one command buffer per queue per timeline segment and submits them.
//! Afterwards the graph can only be inspected. Create a new graph for the next frame.

use std::sync::Arc;

use anyhow::Result;

use crate::context::GraphContext;
use crate::core::error::Error;
use crate::graph::analysis::{build_dependency_graph, compile_pass_read_writes, schedule, CompiledGraph};
use crate::graph::bind_group::{BindGroupDesc, BindGroupEntry, VirtualBindGroup};
use crate::graph::cull::{cull, cull_unused_resources};
use crate::graph::devirtualize::{devirtualize, perform_buffer_uploads, BufferUploadInfo};
use crate::graph::handle::{
    next_graph_id, BindGroupRef, BufferRef, BufferViewRef, Handle, HandleKind, ResourceRef, TextureRef, TextureViewRef,
};
use crate::graph::pass::{CopyPassDesc, Pass, PassBuilder, PassKind, RasterPassDesc};
use crate::graph::physical_resource::PhysicalResourceBindings;
use crate::graph::record::record_graph;
use crate::graph::task_graph::DependencyGraph;
use crate::graph::virtual_resource::{ResourceKind, VirtualResource, VirtualResourceView, ViewKind};
use crate::rhi::{
    Buffer, BufferCreateInfo, BufferState, BufferUsageFlags, BufferViewCreateInfo, CommandBuffer, ComputePassCommandRecorder,
    CopyPassCommandRecorder, Fence, RasterPassCommandRecorder, Semaphore, Texture, TextureCreateInfo, TextureState,
    TextureViewCreateInfo,
};
use crate::sync::submit_batch::submit_segments;

/// The stage a [`PassGraph`] is in. Execution moves through the stages in order and never goes back.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum GraphState {
    /// Resources and passes can be declared.
    Building,
    Compiling,
    /// Culling and scheduling.
    Culling,
    Devirtualizing,
    Recording,
    /// Every command buffer was submitted.
    Submitted,
}

/// Synchronization with work outside the graph.
#[derive(Debug, Clone, Default)]
pub struct GraphExecuteInfo {
    /// Waited on before the first pass executes.
    pub wait_semaphores: Vec<Arc<dyn Semaphore>>,
    /// Signaled after the last pass completed.
    pub signal_semaphores: Vec<Arc<dyn Semaphore>>,
    /// Signaled after the last pass completed.
    pub signal_fence: Option<Arc<dyn Fence>>,
}

/// A render graph for a single frame.
///
/// Every object declared on the graph is referred to by a handle that is only valid for this graph. Using a handle on
/// another graph fails with [`Error::InvalidHandle`].
///
/// # Example
/// ```
/// # use std::sync::Arc;
/// # use framegraph::prelude::*;
/// # use framegraph::rhi::dummy::DummyDevice;
/// let device = DummyDevice::new();
/// let context = GraphContext::new(Arc::new(device.clone()), GraphSettings::default());
/// let fence = device.create_fence(false)?;
///
/// let mut graph = PassGraph::new(&context);
/// let staging = graph.create_buffer(BufferCreateInfo::new("staging", 256, BufferUsageFlags::MAP_WRITE | BufferUsageFlags::COPY_SRC))?;
/// let output = graph.import_buffer(device.create_buffer(&BufferCreateInfo::new("output", 256, BufferUsageFlags::COPY_DST))?, BufferState::Undefined)?;
/// graph.queue_buffer_upload(staging, BufferUploadInfo { data: vec![1; 256], dst_offset: 0 })?;
/// graph.add_copy_pass("upload", CopyPassDesc::new().src(staging).dst(output), move |bindings, pass| {
///     pass.copy_buffer_to_buffer(bindings.buffer(staging)?.as_ref(), 0, bindings.buffer(output)?.as_ref(), 0, 256);
///     Ok(())
/// })?;
/// graph.execute(&GraphExecuteInfo {
///     signal_fence: Some(fence.clone()),
///     ..Default::default()
/// })?;
/// assert_eq!(graph.state(), GraphState::Submitted);
/// # Ok::<(), anyhow::Error>(())
/// ```
#[derive(Derivative)]
#[derivative(Debug)]
pub struct PassGraph<'a> {
    #[derivative(Debug = "ignore")]
    context: &'a GraphContext,
    id: u32,
    state: GraphState,
    executed: bool,
    resources: Vec<VirtualResource>,
    views: Vec<VirtualResourceView>,
    bind_groups: Vec<VirtualBindGroup>,
    passes: Vec<Pass<'a>>,
    /// Pass indices a new timeline segment starts at.
    sync_points: Vec<usize>,
    uploads: Vec<(BufferRef, BufferUploadInfo)>,
    #[derivative(Debug = "ignore")]
    compiled: Option<CompiledGraph>,
    bindings: Option<PhysicalResourceBindings>,
    command_buffers: Vec<Box<dyn CommandBuffer>>,
    semaphores: Vec<Arc<dyn Semaphore>>,
}

impl<'a> PassGraph<'a> {
    /// Create a new, empty graph. Physical resources are taken from the pools of `context`.
    pub fn new(context: &'a GraphContext) -> Self {
        let id = next_graph_id();
        trace!("Created pass graph {}", id);
        Self {
            context,
            id,
            state: GraphState::Building,
            executed: false,
            resources: vec![],
            views: vec![],
            bind_groups: vec![],
            passes: vec![],
            sync_points: vec![],
            uploads: vec![],
            compiled: None,
            bindings: None,
            command_buffers: vec![],
            semaphores: vec![],
        }
    }

    fn ensure_building(&self) -> Result<()> {
        if self.executed {
            return Err(Error::AlreadyExecuted.into());
        }
        Ok(())
    }

    fn check<T: HandleKind>(&self, handle: Handle<T>, len: usize) -> Result<usize> {
        if handle.generation() != self.id || handle.index() >= len {
            return Err(handle.invalid_error(self.id).into());
        }
        Ok(handle.index())
    }

    fn check_buffer(&self, buffer: BufferRef) -> Result<usize> {
        let index = self.check(buffer, self.resources.len())?;
        match self.resources[index].kind {
            ResourceKind::Buffer(_) => Ok(index),
            ResourceKind::Texture(_) => Err(buffer.invalid_error(self.id).into()),
        }
    }

    fn check_texture(&self, texture: TextureRef) -> Result<usize> {
        let index = self.check(texture, self.resources.len())?;
        match self.resources[index].kind {
            ResourceKind::Texture(_) => Ok(index),
            ResourceKind::Buffer(_) => Err(texture.invalid_error(self.id).into()),
        }
    }

    fn check_buffer_view(&self, view: BufferViewRef) -> Result<usize> {
        let index = self.check(view, self.views.len())?;
        match self.views[index].kind {
            ViewKind::Buffer { .. } => Ok(index),
            ViewKind::Texture { .. } => Err(view.invalid_error(self.id).into()),
        }
    }

    fn check_texture_view(&self, view: TextureViewRef) -> Result<usize> {
        let index = self.check(view, self.views.len())?;
        match self.views[index].kind {
            ViewKind::Texture { .. } => Ok(index),
            ViewKind::Buffer { .. } => Err(view.invalid_error(self.id).into()),
        }
    }

    fn push_resource(&mut self, resource: VirtualResource) -> usize {
        #[cfg(feature = "log-objects")]
        trace!("Declared {} resource `{}` in graph {}", if resource.is_imported() { "imported" } else { "transient" }, resource.name(), self.id);
        self.resources.push(resource);
        self.resources.len() - 1
    }

    /// Declare a transient buffer. It is backed by a pooled buffer while the graph executes.
    pub fn create_buffer(&mut self, desc: BufferCreateInfo) -> Result<BufferRef> {
        self.ensure_building()?;
        let index = self.push_resource(VirtualResource::transient(ResourceKind::Buffer(desc)));
        Ok(Handle::new(index, self.id))
    }

    /// Declare a transient texture. It is backed by a pooled texture while the graph executes.
    pub fn create_texture(&mut self, desc: TextureCreateInfo) -> Result<TextureRef> {
        self.ensure_building()?;
        let index = self.push_resource(VirtualResource::transient(ResourceKind::Texture(desc)));
        Ok(Handle::new(index, self.id))
    }

    /// Import a buffer created outside the graph. It is in `initial` state before its first use, and is returned to
    /// that state after its last use, unless it is undefined.
    pub fn import_buffer(&mut self, buffer: Arc<dyn Buffer>, initial: BufferState) -> Result<BufferRef> {
        self.import_buffer_with_final_state(buffer, initial, initial)
    }

    /// Import a buffer created outside the graph, and transition it to `final_state` after its last use.
    pub fn import_buffer_with_final_state(
        &mut self,
        buffer: Arc<dyn Buffer>,
        initial: BufferState,
        final_state: BufferState,
    ) -> Result<BufferRef> {
        self.ensure_building()?;
        let index = self.push_resource(VirtualResource::imported_buffer(buffer, initial, final_state));
        Ok(Handle::new(index, self.id))
    }

    /// Import a texture created outside the graph. It is in `initial` state before its first use, and is returned to
    /// that state after its last use, unless it is undefined.
    pub fn import_texture(&mut self, texture: Arc<dyn Texture>, initial: TextureState) -> Result<TextureRef> {
        self.import_texture_with_final_state(texture, initial, initial)
    }

    /// Import a texture created outside the graph, and transition it to `final_state` after its last use.
    /// This is how a swapchain image is handed back for presenting.
    pub fn import_texture_with_final_state(
        &mut self,
        texture: Arc<dyn Texture>,
        initial: TextureState,
        final_state: TextureState,
    ) -> Result<TextureRef> {
        self.ensure_building()?;
        let index = self.push_resource(VirtualResource::imported_texture(texture, initial, final_state));
        Ok(Handle::new(index, self.id))
    }

    /// Declare a view over a buffer of this graph.
    /// # Errors
    /// * Fails with [`Error::InvalidHandle`] if `buffer` does not belong to this graph.
    pub fn create_buffer_view(&mut self, buffer: BufferRef, desc: BufferViewCreateInfo) -> Result<BufferViewRef> {
        self.ensure_building()?;
        self.check_buffer(buffer)?;
        self.views.push(VirtualResourceView {
            kind: ViewKind::Buffer {
                buffer,
                desc,
            },
        });
        Ok(Handle::new(self.views.len() - 1, self.id))
    }

    /// Declare a view over a texture of this graph.
    /// # Errors
    /// * Fails with [`Error::InvalidHandle`] if `texture` does not belong to this graph.
    pub fn create_texture_view(&mut self, texture: TextureRef, desc: TextureViewCreateInfo) -> Result<TextureViewRef> {
        self.ensure_building()?;
        self.check_texture(texture)?;
        self.views.push(VirtualResourceView {
            kind: ViewKind::Texture {
                texture,
                desc,
            },
        });
        Ok(Handle::new(self.views.len() - 1, self.id))
    }

    /// Declare a bind group. It is only created if a pass using it survives culling.
    /// # Errors
    /// * Fails with [`Error::InvalidHandle`] if a view in `desc` does not belong to this graph.
    pub fn allocate_bind_group(&mut self, desc: BindGroupDesc) -> Result<BindGroupRef> {
        self.ensure_building()?;
        for (_, entry) in desc.entries() {
            match entry {
                BindGroupEntry::Sampler(_) => {}
                BindGroupEntry::UniformBuffer(view) | BindGroupEntry::StorageBuffer(view) | BindGroupEntry::RwStorageBuffer(view) => {
                    self.check_buffer_view(*view)?;
                }
                BindGroupEntry::Texture(view) | BindGroupEntry::StorageTexture(view) => {
                    self.check_texture_view(*view)?;
                }
            }
        }
        self.bind_groups.push(VirtualBindGroup {
            desc,
        });
        Ok(Handle::new(self.bind_groups.len() - 1, self.id))
    }

    /// Add a pass to the graph. Passes execute in the order they are added, per queue and timeline segment.
    /// # Errors
    /// * Fails with [`Error::InvalidHandle`] if the pass references a resource, view or bind group of another graph.
    pub fn add_pass(&mut self, pass: Pass<'a>) -> Result<()> {
        self.ensure_building()?;
        let mut declared = 0;
        match &pass.kind {
            PassKind::Copy { desc, .. } => {
                for resource in desc.copy_srcs.iter().chain(&desc.copy_dsts) {
                    self.check(*resource, self.resources.len())?;
                    declared += 1;
                }
            }
            PassKind::Compute { .. } => {}
            PassKind::Raster { desc, .. } => {
                for attachment in &desc.color_attachments {
                    self.check_texture_view(attachment.view)?;
                    declared += 1;
                }
                if let Some(attachment) = &desc.depth_stencil_attachment {
                    self.check_texture_view(attachment.view)?;
                    declared += 1;
                }
            }
        }
        for group in pass.bind_groups() {
            let index = self.check(*group, self.bind_groups.len())?;
            declared += self.bind_groups[index].desc.entries().filter(|(_, entry)| entry.access().is_some()).count();
        }
        if declared == 0 {
            warn!("Pass `{}` does not access any resource", pass.name);
        }
        trace!("Added {:?} pass `{}` on queue {:?}", pass.pass_type(), pass.name, pass.queue);
        self.passes.push(pass);
        Ok(())
    }

    /// Add a copy pass on the main queue. Use [`PassBuilder`] for other queues.
    pub fn add_copy_pass(
        &mut self,
        name: impl Into<String>,
        desc: CopyPassDesc,
        func: impl FnMut(&PhysicalResourceBindings, &mut dyn CopyPassCommandRecorder) -> Result<()> + 'a,
    ) -> Result<()> {
        self.add_pass(PassBuilder::copy(name, desc, func).build())
    }

    /// Add a compute pass on the main queue. Use [`PassBuilder`] for other queues.
    pub fn add_compute_pass(
        &mut self,
        name: impl Into<String>,
        bind_groups: &[BindGroupRef],
        func: impl FnMut(&PhysicalResourceBindings, &mut dyn ComputePassCommandRecorder) -> Result<()> + 'a,
    ) -> Result<()> {
        let builder = bind_groups
            .iter()
            .try_fold(PassBuilder::compute(name, func), |builder, group| builder.bind_group(*group))?;
        self.add_pass(builder.build())
    }

    /// Add a raster pass.
    pub fn add_raster_pass(
        &mut self,
        name: impl Into<String>,
        desc: RasterPassDesc,
        bind_groups: &[BindGroupRef],
        func: impl FnMut(&PhysicalResourceBindings, &mut dyn RasterPassCommandRecorder) -> Result<()> + 'a,
    ) -> Result<()> {
        let builder = bind_groups
            .iter()
            .try_fold(PassBuilder::raster(name, desc, func), |builder, group| builder.bind_group(*group))?;
        self.add_pass(builder.build())
    }

    /// End the current timeline segment. Passes added after this point only start after every pass added before it
    /// completed, on all queues.
    pub fn add_sync_point(&mut self) -> Result<()> {
        self.ensure_building()?;
        if self.sync_points.last() != Some(&self.passes.len()) {
            self.sync_points.push(self.passes.len());
        }
        Ok(())
    }

    /// Keep a resource, and the passes writing it, from being culled. The resource never shares memory with another one.
    pub fn mark_as_used(&mut self, resource: impl Into<ResourceRef>) -> Result<()> {
        self.ensure_building()?;
        let index = self.check(resource.into(), self.resources.len())?;
        self.resources[index].force_used = true;
        Ok(())
    }

    /// Copy data into a buffer right before the graph's passes are recorded.
    /// # Errors
    /// * Fails with [`Error::BufferNotMappable`] if the buffer was not created with [`BufferUsageFlags::MAP_WRITE`].
    /// * Fails with [`Error::UploadOutOfRange`] if the data does not fit in the buffer at the given offset.
    pub fn queue_buffer_upload(&mut self, buffer: BufferRef, upload: BufferUploadInfo) -> Result<()> {
        self.ensure_building()?;
        let index = self.check_buffer(buffer)?;
        let ResourceKind::Buffer(desc) = &self.resources[index].kind else {
            return Err(buffer.invalid_error(self.id).into());
        };
        if !desc.usages.contains(BufferUsageFlags::MAP_WRITE) {
            return Err(Error::BufferNotMappable(desc.debug_name.clone()).into());
        }
        let size = upload.data.len() as u64;
        if upload.dst_offset.checked_add(size).map_or(true, |end| end > desc.size) {
            return Err(Error::UploadOutOfRange {
                buffer: desc.debug_name.clone(),
                offset: upload.dst_offset,
                size,
                capacity: desc.size,
            }
            .into());
        }
        self.uploads.push((buffer, upload));
        Ok(())
    }

    /// Compile, devirtualize, record and submit the graph. This can only be done once.
    ///
    /// Does not wait for the GPU. Use the fence in `info` for that. Command buffers and semaphores used by the submissions
    /// are kept alive by the graph, so it must not be dropped before the GPU finished executing it.
    /// # Errors
    /// * Fails with [`Error::AlreadyExecuted`] if the graph was executed before, even if that execution failed.
    /// * Fails with [`Error::CrossQueueHazard`] if passes on different queues race on a resource and the
    ///   [`CrossQueuePolicy`](crate::CrossQueuePolicy) is `Reject`.
    /// * Errors returned by pass callbacks and by the device are passed through unchanged.
    pub fn execute(&mut self, info: &GraphExecuteInfo) -> Result<()> {
        self.ensure_building()?;
        self.executed = true;
        let context = self.context;
        let settings = context.settings();
        debug!(
            "Executing pass graph {} with {} passes and {} resources",
            self.id,
            self.passes.len(),
            self.resources.len()
        );

        self.state = GraphState::Compiling;
        let mut compiled = compile_pass_read_writes(&self.resources, &self.views, &self.bind_groups, &self.passes);

        self.state = GraphState::Culling;
        if settings.cull_passes {
            cull(&mut compiled, &self.resources, &self.passes);
        } else {
            cull_unused_resources(&mut compiled, &self.resources);
        }
        schedule(&mut compiled, &self.resources, &self.passes, &self.sync_points, settings.cross_queue_policy)?;
        build_dependency_graph(&mut compiled, &self.resources, &self.passes)?;
        debug!(
            "Scheduled {} passes in {} timeline segments, {} cross-queue dependencies",
            compiled.positions.len(),
            compiled.segments.len(),
            compiled.dependencies.cross_queue_count()
        );
        let compiled = &*self.compiled.insert(compiled);

        self.state = GraphState::Devirtualizing;
        let bindings = &*self.bindings.insert(devirtualize(
            context,
            self.id,
            &self.resources,
            &self.views,
            &self.bind_groups,
            &self.passes,
            compiled,
            &self.uploads,
            settings.alias_resources,
        )?);
        perform_buffer_uploads(bindings, &self.uploads)?;

        self.state = GraphState::Recording;
        let recorded = record_graph(context, &self.resources, &mut self.passes, compiled, bindings)?;
        self.command_buffers = recorded.command_buffers;

        self.semaphores = submit_segments(context.device().clone(), &recorded.segments, &self.command_buffers, info)?;
        self.state = GraphState::Submitted;
        Ok(())
    }

    /// Get the stage this graph is in.
    pub fn state(&self) -> GraphState {
        self.state
    }

    /// Get a virtual resource declared on this graph.
    pub fn resource(&self, resource: impl Into<ResourceRef>) -> Result<&VirtualResource> {
        let index = self.check(resource.into(), self.resources.len())?;
        Ok(&self.resources[index])
    }

    /// Amount of passes added to this graph, including those that were culled.
    pub fn pass_count(&self) -> usize {
        self.passes.len()
    }

    /// Get the dependency graph between the surviving passes. `None` until the graph was scheduled during execution.
    pub fn dependency_graph(&self) -> Option<&DependencyGraph> {
        self.compiled.as_ref().map(|compiled| &compiled.dependencies)
    }

    /// Get the physical resources bound during execution.
    /// # Errors
    /// * Fails with [`Error::NotDevirtualized`] if the graph was not devirtualized yet.
    pub fn physical_bindings(&self) -> Result<&PhysicalResourceBindings> {
        self.bindings
            .as_ref()
            .ok_or_else(|| Error::NotDevirtualized(format!("pass graph {}", self.id)).into())
    }

    /// Names of the passes that were culled. Empty until the graph was executed.
    pub fn culled_passes(&self) -> Vec<&str> {
        match &self.compiled {
            None => vec![],
            Some(compiled) => self
                .passes
                .iter()
                .zip(&compiled.culled_passes)
                .filter(|(_, culled)| **culled)
                .map(|(pass, _)| pass.name())
                .collect(),
        }
    }

    /// Whether a resource was culled.
    /// # Errors
    /// * Fails with [`Error::InvalidHandle`] if `resource` does not belong to this graph.
    /// * Fails with [`Error::NotDevirtualized`] if the graph was not compiled yet.
    pub fn is_culled(&self, resource: impl Into<ResourceRef>) -> Result<bool> {
        let index = self.check(resource.into(), self.resources.len())?;
        let compiled = self
            .compiled
            .as_ref()
            .ok_or_else(|| Error::NotDevirtualized(self.resources[index].name().to_string()))?;
        Ok(compiled.culled_resources[index])
    }

    /// Amount of command buffers that were submitted.
    pub fn command_buffer_count(&self) -> usize {
        self.command_buffers.len()
    }
}
