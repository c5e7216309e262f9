use std::sync::Arc;

use crate::graph::handle::{BufferRef, ResourceRef, TextureRef};
use crate::graph::resource::{ResourceState, ResourceType};
use crate::rhi::{
    Buffer, BufferCreateInfo, BufferState, BufferViewCreateInfo, Texture, TextureCreateInfo, TextureState, TextureViewCreateInfo,
};

/// Descriptor of a virtual resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Buffer(BufferCreateInfo),
    Texture(TextureCreateInfo),
}

/// A resource created outside the graph.
#[derive(Debug, Clone)]
pub enum ImportedResource {
    Buffer(Arc<dyn Buffer>),
    Texture(Arc<dyn Texture>),
}

#[derive(Debug, Clone)]
pub(crate) enum ResourceOrigin {
    /// Backed by a pooled resource during execution.
    Transient,
    /// Backed by an imported resource, which is returned to `final_state` after its last use.
    Imported {
        resource: ImportedResource,
        final_state: ResourceState,
    },
}

/// Represents a virtual resource in a pass graph. Virtual resources are only bound to physical resources when the graph
/// is executed, and only if they survive culling.
#[derive(Debug, Clone)]
pub struct VirtualResource {
    pub(crate) kind: ResourceKind,
    pub(crate) origin: ResourceOrigin,
    pub(crate) force_used: bool,
}

impl VirtualResource {
    pub(crate) fn transient(kind: ResourceKind) -> Self {
        Self {
            kind,
            origin: ResourceOrigin::Transient,
            force_used: false,
        }
    }

    pub(crate) fn imported_buffer(buffer: Arc<dyn Buffer>, initial: BufferState, final_state: BufferState) -> Self {
        let mut desc = buffer.create_info().clone();
        desc.initial_state = initial;
        Self {
            kind: ResourceKind::Buffer(desc),
            origin: ResourceOrigin::Imported {
                resource: ImportedResource::Buffer(buffer),
                final_state: ResourceState::Buffer(final_state),
            },
            force_used: false,
        }
    }

    pub(crate) fn imported_texture(texture: Arc<dyn Texture>, initial: TextureState, final_state: TextureState) -> Self {
        let mut desc = texture.create_info().clone();
        desc.initial_state = initial;
        Self {
            kind: ResourceKind::Texture(desc),
            origin: ResourceOrigin::Imported {
                resource: ImportedResource::Texture(texture),
                final_state: ResourceState::Texture(final_state),
            },
            force_used: false,
        }
    }

    /// Get the debug name of this resource.
    pub fn name(&self) -> &str {
        match &self.kind {
            ResourceKind::Buffer(desc) => &desc.debug_name,
            ResourceKind::Texture(desc) => &desc.debug_name,
        }
    }

    /// Get the resource type of this virtual resource
    pub fn resource_type(&self) -> ResourceType {
        match self.kind {
            ResourceKind::Buffer(_) => ResourceType::Buffer,
            ResourceKind::Texture(_) => ResourceType::Texture,
        }
    }

    pub fn kind(&self) -> &ResourceKind {
        &self.kind
    }

    /// Whether this resource was imported into the graph.
    pub fn is_imported(&self) -> bool {
        matches!(self.origin, ResourceOrigin::Imported { .. })
    }

    /// Whether this resource is exempt from culling, see [`PassGraph::mark_as_used`](crate::PassGraph::mark_as_used).
    pub fn is_force_used(&self) -> bool {
        self.force_used
    }

    /// State the resource is in before its first use in the graph.
    pub fn initial_state(&self) -> ResourceState {
        match &self.kind {
            ResourceKind::Buffer(desc) => ResourceState::Buffer(desc.initial_state),
            ResourceKind::Texture(desc) => ResourceState::Texture(desc.initial_state),
        }
    }

    /// State an imported resource is returned to after its last use. `None` for transient resources.
    pub fn final_state(&self) -> Option<ResourceState> {
        match &self.origin {
            ResourceOrigin::Transient => None,
            ResourceOrigin::Imported { final_state, .. } => Some(*final_state),
        }
    }
}

/// Descriptor of a virtual resource view.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ViewKind {
    Buffer {
        buffer: BufferRef,
        desc: BufferViewCreateInfo,
    },
    Texture {
        texture: TextureRef,
        desc: TextureViewCreateInfo,
    },
}

/// A view over a virtual resource. Created from the view cache when the graph is executed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VirtualResourceView {
    pub(crate) kind: ViewKind,
}

impl VirtualResourceView {
    /// Get the resource this view looks at.
    pub fn resource(&self) -> ResourceRef {
        match &self.kind {
            ViewKind::Buffer { buffer, .. } => (*buffer).into(),
            ViewKind::Texture { texture, .. } => (*texture).into(),
        }
    }

    pub fn kind(&self) -> &ViewKind {
        &self.kind
    }
}
