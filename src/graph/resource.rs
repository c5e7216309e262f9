use crate::rhi::{BufferState, TextureState};

/// Type of a resource in the pass graph.
#[derive(Debug, Copy, Clone, Hash, PartialEq, Eq)]
pub enum ResourceType {
    /// Buffer resource
    Buffer,
    /// Texture resource
    Texture,
}

/// State of either kind of resource.
#[derive(Debug, Copy, Clone, Hash, PartialEq, Eq)]
pub enum ResourceState {
    Buffer(BufferState),
    Texture(TextureState),
}

impl ResourceState {
    /// Whether the contents of a resource in this state are undefined.
    pub fn is_undefined(&self) -> bool {
        matches!(self, ResourceState::Buffer(BufferState::Undefined) | ResourceState::Texture(TextureState::Undefined))
    }
}

/// How a pass uses a resource.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub(crate) enum ResourceUsage {
    CopySrc,
    CopyDst,
    UniformBuffer,
    StorageBuffer,
    RwStorageBuffer,
    Texture,
    StorageTexture,
    ColorAttachment,
    DepthStencilAttachment { read_only: bool },
}

impl ResourceUsage {
    /// Whether this usage is a read operation. Every other usage writes the resource.
    pub fn is_read(&self) -> bool {
        match self {
            ResourceUsage::CopySrc => true,
            ResourceUsage::CopyDst => false,
            ResourceUsage::UniformBuffer => true,
            ResourceUsage::StorageBuffer => true,
            ResourceUsage::RwStorageBuffer => false,
            ResourceUsage::Texture => true,
            ResourceUsage::StorageTexture => false,
            ResourceUsage::ColorAttachment => false,
            ResourceUsage::DepthStencilAttachment { read_only } => *read_only,
        }
    }

    /// State a resource of the given type must be in for this usage.
    pub fn required_state(&self, ty: ResourceType) -> ResourceState {
        match ty {
            ResourceType::Buffer => ResourceState::Buffer(match self {
                ResourceUsage::CopySrc => BufferState::CopySrc,
                ResourceUsage::CopyDst => BufferState::CopyDst,
                ResourceUsage::UniformBuffer => BufferState::ShaderReadOnly,
                ResourceUsage::StorageBuffer => BufferState::Storage,
                _ => BufferState::RwStorage,
            }),
            ResourceType::Texture => ResourceState::Texture(match self {
                ResourceUsage::CopySrc => TextureState::CopySrc,
                ResourceUsage::CopyDst => TextureState::CopyDst,
                ResourceUsage::StorageTexture => TextureState::Storage,
                ResourceUsage::ColorAttachment => TextureState::RenderTarget,
                ResourceUsage::DepthStencilAttachment { read_only: true } => TextureState::DepthStencilReadonly,
                ResourceUsage::DepthStencilAttachment { read_only: false } => TextureState::DepthStencilWrite,
                _ => TextureState::ShaderReadOnly,
            }),
        }
    }
}
