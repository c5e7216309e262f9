use std::sync::Arc;

use anyhow::Result;

use crate::core::error::Error;
use crate::graph::handle::{BindGroupRef, BufferRef, BufferViewRef, Handle, HandleKind, ResourceRef, TextureRef, TextureViewRef};
use crate::rhi::{BindGroup, Buffer, BufferView, Texture, TextureView};

/// Describes any physical resource a virtual resource can be bound to.
#[derive(Debug, Clone)]
pub enum PhysicalResource {
    Buffer(Arc<dyn Buffer>),
    Texture(Arc<dyn Texture>),
}

impl PhysicalResource {
    pub fn native_handle(&self) -> u64 {
        match self {
            PhysicalResource::Buffer(buffer) => buffer.native_handle(),
            PhysicalResource::Texture(texture) => texture.native_handle(),
        }
    }
}

/// Describes a physical view.
#[derive(Debug, Clone)]
pub enum PhysicalView {
    Buffer(Arc<dyn BufferView>),
    Texture(Arc<dyn TextureView>),
}

/// Physical objects bound to the virtual objects of one executed [`PassGraph`](crate::PassGraph).
///
/// Every object that survived culling is bound, culled objects are not. Aliased resources share one physical resource
/// (and one state slot). The bindings never change after they were created.
///
/// Pass callbacks receive these bindings to look up the objects they record commands for:
/// ```
/// # use std::sync::Arc;
/// # use framegraph::prelude::*;
/// # use framegraph::rhi::dummy::DummyDevice;
/// # let device = DummyDevice::new();
/// # let context = GraphContext::new(Arc::new(device.clone()), GraphSettings::default());
/// # let mut graph = PassGraph::new(&context);
/// let src = graph.create_buffer(BufferCreateInfo::new("src", 64, BufferUsageFlags::COPY_SRC))?;
/// let dst = graph.create_buffer(BufferCreateInfo::new("dst", 64, BufferUsageFlags::COPY_DST))?;
/// graph.mark_as_used(dst)?;
/// graph.add_copy_pass("copy", CopyPassDesc::new().src(src).dst(dst), move |bindings, pass| {
///     pass.copy_buffer_to_buffer(bindings.buffer(src)?.as_ref(), 0, bindings.buffer(dst)?.as_ref(), 0, 64);
///     Ok(())
/// })?;
/// graph.execute(&GraphExecuteInfo::default())?;
/// # Ok::<(), anyhow::Error>(())
/// ```
#[derive(Debug)]
pub struct PhysicalResourceBindings {
    graph: u32,
    resource_names: Vec<String>,
    /// Physical slot of every resource, `None` if culled.
    resources: Vec<Option<usize>>,
    slots: Vec<PhysicalResource>,
    view_names: Vec<String>,
    views: Vec<Option<PhysicalView>>,
    bind_group_names: Vec<String>,
    bind_groups: Vec<Option<Arc<dyn BindGroup>>>,
}

impl PhysicalResourceBindings {
    pub(crate) fn new(graph: u32, resource_names: Vec<String>, view_names: Vec<String>, bind_group_names: Vec<String>) -> Self {
        Self {
            graph,
            resources: vec![None; resource_names.len()],
            resource_names,
            slots: vec![],
            views: vec![None; view_names.len()],
            view_names,
            bind_groups: vec![None; bind_group_names.len()],
            bind_group_names,
        }
    }

    /// Add a physical resource and get its slot.
    pub(crate) fn add_slot(&mut self, resource: PhysicalResource) -> usize {
        self.slots.push(resource);
        self.slots.len() - 1
    }

    pub(crate) fn bind_resource(&mut self, index: usize, slot: usize) {
        self.resources[index] = Some(slot);
    }

    pub(crate) fn bind_view(&mut self, index: usize, view: PhysicalView) {
        self.views[index] = Some(view);
    }

    pub(crate) fn bind_bind_group(&mut self, index: usize, bind_group: Arc<dyn BindGroup>) {
        self.bind_groups[index] = Some(bind_group);
    }

    /// Physical slot of a resource, `None` if it was culled.
    pub(crate) fn slot_of(&self, index: usize) -> Option<usize> {
        self.resources.get(index).copied().flatten()
    }

    pub(crate) fn slot(&self, slot: usize) -> Option<&PhysicalResource> {
        self.slots.get(slot)
    }

    pub(crate) fn physical_view(&self, index: usize) -> Option<&PhysicalView> {
        self.views.get(index).and_then(|view| view.as_ref())
    }

    /// Amount of distinct physical resources bound. Lower than the amount of surviving resources if some were aliased.
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    fn check<T: HandleKind>(&self, handle: Handle<T>, len: usize) -> Result<usize> {
        if handle.generation() != self.graph || handle.index() >= len {
            return Err(handle.invalid_error(self.graph).into());
        }
        Ok(handle.index())
    }

    /// Resolve a virtual resource to its physical resource.
    /// # Errors
    /// * Fails with [`Error::InvalidHandle`] if the handle does not belong to this graph.
    /// * Fails with [`Error::ResourceCulled`] if the resource was culled.
    pub fn resource(&self, resource: ResourceRef) -> Result<&PhysicalResource> {
        let index = self.check(resource, self.resources.len())?;
        let slot = self.resources[index].ok_or_else(|| Error::ResourceCulled(self.resource_names[index].clone()))?;
        self.slots
            .get(slot)
            .ok_or_else(|| Error::NotDevirtualized(self.resource_names[index].clone()).into())
    }

    /// Resolve a virtual buffer to its physical buffer.
    /// # Errors
    /// See [`PhysicalResourceBindings::resource`].
    pub fn buffer(&self, buffer: BufferRef) -> Result<&Arc<dyn Buffer>> {
        match self.resource(buffer.into())? {
            PhysicalResource::Buffer(buffer) => Ok(buffer),
            PhysicalResource::Texture(_) => Err(buffer.invalid_error(self.graph).into()),
        }
    }

    /// Resolve a virtual texture to its physical texture.
    /// # Errors
    /// See [`PhysicalResourceBindings::resource`].
    pub fn texture(&self, texture: TextureRef) -> Result<&Arc<dyn Texture>> {
        match self.resource(texture.into())? {
            PhysicalResource::Texture(texture) => Ok(texture),
            PhysicalResource::Buffer(_) => Err(texture.invalid_error(self.graph).into()),
        }
    }

    fn view<T: HandleKind>(&self, view: Handle<T>) -> Result<&PhysicalView> {
        let index = self.check(view, self.views.len())?;
        self.views[index]
            .as_ref()
            .ok_or_else(|| Error::ResourceCulled(self.view_names[index].clone()).into())
    }

    /// Resolve a virtual buffer view. Views of culled resources are culled as well.
    pub fn buffer_view(&self, view: BufferViewRef) -> Result<&Arc<dyn BufferView>> {
        match self.view(view)? {
            PhysicalView::Buffer(physical) => Ok(physical),
            PhysicalView::Texture(_) => Err(view.invalid_error(self.graph).into()),
        }
    }

    /// Resolve a virtual texture view. Views of culled resources are culled as well.
    pub fn texture_view(&self, view: TextureViewRef) -> Result<&Arc<dyn TextureView>> {
        match self.view(view)? {
            PhysicalView::Texture(physical) => Ok(physical),
            PhysicalView::Buffer(_) => Err(view.invalid_error(self.graph).into()),
        }
    }

    /// Resolve a bind group. Only bind groups used by a pass that survived culling are created.
    pub fn bind_group(&self, bind_group: BindGroupRef) -> Result<&Arc<dyn BindGroup>> {
        let index = self.check(bind_group, self.bind_groups.len())?;
        self.bind_groups[index]
            .as_ref()
            .ok_or_else(|| Error::ResourceCulled(self.bind_group_names[index].clone()).into())
    }
}
