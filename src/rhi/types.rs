//! Plain descriptor and state types shared between the graph and an RHI backend.
//!
//! Descriptors derive `PartialEq, Eq, Hash`, since the resource pool and view cache use them as keys.

use std::sync::Arc;

use bitflags::bitflags;

use crate::rhi::{BindGroupLayout, Buffer, BufferView, Sampler, Texture, TextureView};

bitflags! {
    /// Ways a buffer may be used. A buffer can only be bound or transitioned to states its usages allow.
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
    pub struct BufferUsageFlags: u32 {
        /// Buffer can be mapped for reading on the host.
        const MAP_READ = 0x1;
        /// Buffer can be mapped for writing on the host. Required for buffer uploads.
        const MAP_WRITE = 0x2;
        const COPY_SRC = 0x4;
        const COPY_DST = 0x8;
        const INDEX = 0x10;
        const VERTEX = 0x20;
        const UNIFORM = 0x40;
        const STORAGE = 0x80;
        const RW_STORAGE = 0x100;
        const INDIRECT = 0x200;
        const QUERY_RESOLVE = 0x400;
    }
}

bitflags! {
    /// Ways a texture may be used.
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
    pub struct TextureUsageFlags: u32 {
        const COPY_SRC = 0x1;
        const COPY_DST = 0x2;
        /// Texture can be sampled in a shader.
        const TEXTURE_BINDING = 0x4;
        /// Texture can be bound as a storage image.
        const STORAGE_BINDING = 0x8;
        /// Texture can be used as a color attachment.
        const RENDER_ATTACHMENT = 0x10;
        const DEPTH_STENCIL_ATTACHMENT = 0x20;
    }
}

/// Synchronization state of a buffer.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
pub enum BufferState {
    #[default]
    Undefined,
    /// Host visible staging memory.
    Staging,
    CopySrc,
    CopyDst,
    /// Read in shaders, as a uniform or read-only storage buffer.
    ShaderReadOnly,
    /// Read in shaders as a storage buffer.
    Storage,
    /// Read and written in shaders.
    RwStorage,
}

/// Synchronization state (and layout) of a texture.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
pub enum TextureState {
    #[default]
    Undefined,
    CopySrc,
    CopyDst,
    /// Sampled in shaders.
    ShaderReadOnly,
    /// Used as a color attachment.
    RenderTarget,
    /// Bound as a storage image.
    Storage,
    DepthStencilReadonly,
    DepthStencilWrite,
    /// Ready to be presented to the screen.
    Present,
}

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
pub enum TextureDimension {
    D1,
    #[default]
    D2,
    D3,
}

/// Pixel formats understood by the graph. Backends translate these to their native formats.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Format {
    #[default]
    Rgba8Unorm,
    Bgra8Unorm,
    Rgba8Srgb,
    Bgra8Srgb,
    Rgba16Float,
    Rgba32Float,
    R32Float,
    R32Uint,
    D16Unorm,
    D24UnormS8Uint,
    D32Float,
    D32FloatS8Uint,
}

impl Format {
    /// Whether this format has a depth component.
    pub fn is_depth(&self) -> bool {
        matches!(self, Format::D16Unorm | Format::D24UnormS8Uint | Format::D32Float | Format::D32FloatS8Uint)
    }

    /// Whether this format has a stencil component.
    pub fn has_stencil(&self) -> bool {
        matches!(self, Format::D24UnormS8Uint | Format::D32FloatS8Uint)
    }
}

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Extent3D {
    pub width: u32,
    pub height: u32,
    pub depth: u32,
}

impl Extent3D {
    /// Extent of a 2D texture.
    pub fn new_2d(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            depth: 1,
        }
    }
}

/// Creation parameters of a buffer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BufferCreateInfo {
    /// Size in bytes.
    pub size: u64,
    pub usages: BufferUsageFlags,
    /// State the buffer is in after creation.
    pub initial_state: BufferState,
    pub debug_name: String,
}

impl BufferCreateInfo {
    /// Create a buffer descriptor with an undefined initial state.
    pub fn new(debug_name: impl Into<String>, size: u64, usages: BufferUsageFlags) -> Self {
        Self {
            size,
            usages,
            initial_state: BufferState::Undefined,
            debug_name: debug_name.into(),
        }
    }
}

/// Creation parameters of a texture.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TextureCreateInfo {
    pub dimension: TextureDimension,
    pub extent: Extent3D,
    pub format: Format,
    pub usages: TextureUsageFlags,
    pub mip_levels: u8,
    pub samples: u8,
    /// State the texture is in after creation.
    pub initial_state: TextureState,
    pub debug_name: String,
}

impl Default for TextureCreateInfo {
    fn default() -> Self {
        Self {
            dimension: TextureDimension::D2,
            extent: Extent3D::new_2d(1, 1),
            format: Format::Rgba8Unorm,
            usages: TextureUsageFlags::empty(),
            mip_levels: 1,
            samples: 1,
            initial_state: TextureState::Undefined,
            debug_name: String::new(),
        }
    }
}

impl TextureCreateInfo {
    /// Create a single-mip, single-sample 2D texture descriptor with an undefined initial state.
    pub fn new_2d(
        debug_name: impl Into<String>,
        width: u32,
        height: u32,
        format: Format,
        usages: TextureUsageFlags,
    ) -> Self {
        Self {
            extent: Extent3D::new_2d(width, height),
            format,
            usages,
            debug_name: debug_name.into(),
            ..Default::default()
        }
    }
}

/// How a buffer view is used.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
pub enum BufferViewType {
    Vertex,
    Index,
    #[default]
    UniformBinding,
    StorageBinding,
    RwStorageBinding,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Hash)]
pub struct BufferViewCreateInfo {
    pub ty: BufferViewType,
    /// Offset in bytes.
    pub offset: u64,
    /// Size in bytes.
    pub size: u64,
}

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
pub enum TextureViewDimension {
    D1,
    #[default]
    D2,
    D2Array,
    Cube,
    CubeArray,
    D3,
}

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
pub enum TextureAspect {
    #[default]
    Color,
    Depth,
    Stencil,
    DepthStencil,
}

/// How a texture view is used.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
pub enum TextureViewType {
    #[default]
    TextureBinding,
    StorageBinding,
    ColorAttachment,
    DepthStencil,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TextureViewCreateInfo {
    pub ty: TextureViewType,
    pub dimension: TextureViewDimension,
    pub aspect: TextureAspect,
    pub base_mip_level: u8,
    pub mip_level_num: u8,
    pub base_array_layer: u8,
    pub array_layer_num: u8,
}

impl Default for TextureViewCreateInfo {
    fn default() -> Self {
        Self {
            ty: TextureViewType::TextureBinding,
            dimension: TextureViewDimension::D2,
            aspect: TextureAspect::Color,
            base_mip_level: 0,
            mip_level_num: 1,
            base_array_layer: 0,
            array_layer_num: 1,
        }
    }
}

impl TextureViewCreateInfo {
    /// View over the first mip and layer of a 2D texture.
    pub fn new_2d(ty: TextureViewType, aspect: TextureAspect) -> Self {
        Self {
            ty,
            aspect,
            ..Default::default()
        }
    }
}

/// Kind of a slot in a bind group layout.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum BindingType {
    UniformBuffer,
    StorageBuffer,
    RwStorageBuffer,
    Sampler,
    Texture,
    StorageTexture,
}

/// A slot in a bind group layout, as found by name through [`BindGroupLayout::find_binding`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct ResourceBinding {
    pub ty: BindingType,
    pub index: u32,
}

/// Physical object bound in one bind group slot.
#[derive(Debug, Clone)]
pub enum BindGroupEntryResource {
    Sampler(Arc<dyn Sampler>),
    BufferView(Arc<dyn BufferView>),
    TextureView(Arc<dyn TextureView>),
}

#[derive(Debug, Clone)]
pub struct BindGroupEntry {
    pub binding: ResourceBinding,
    pub resource: BindGroupEntryResource,
}

#[derive(Debug, Clone)]
pub struct BindGroupCreateInfo {
    pub layout: Arc<dyn BindGroupLayout>,
    pub entries: Vec<BindGroupEntry>,
    pub debug_name: String,
}

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
pub enum LoadOp {
    Load,
    #[default]
    Clear,
}

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
pub enum StoreOp {
    #[default]
    Store,
    Discard,
}

/// Hardware queue families an RHI device exposes.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum QueueType {
    Graphics,
    Compute,
    Transfer,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum MapMode {
    Read,
    Write,
}

#[derive(Debug, Clone)]
pub struct RasterColorAttachment {
    pub view: Arc<dyn TextureView>,
    pub load_op: LoadOp,
    pub store_op: StoreOp,
    pub clear_value: [f32; 4],
}

#[derive(Debug, Clone)]
pub struct RasterDepthStencilAttachment {
    pub view: Arc<dyn TextureView>,
    pub depth_load_op: LoadOp,
    pub depth_store_op: StoreOp,
    pub depth_clear_value: f32,
    pub depth_read_only: bool,
    pub stencil_load_op: LoadOp,
    pub stencil_store_op: StoreOp,
    pub stencil_clear_value: u32,
    pub stencil_read_only: bool,
}

/// Attachments a raster pass renders to.
#[derive(Debug, Clone, Default)]
pub struct RasterPassBeginInfo {
    pub color_attachments: Vec<RasterColorAttachment>,
    pub depth_stencil_attachment: Option<RasterDepthStencilAttachment>,
}

#[derive(Debug, Clone)]
pub struct BufferTransition {
    pub buffer: Arc<dyn Buffer>,
    pub before: BufferState,
    pub after: BufferState,
}

#[derive(Debug, Clone)]
pub struct TextureTransition {
    pub texture: Arc<dyn Texture>,
    pub before: TextureState,
    pub after: TextureState,
}

/// A state transition recorded through [`CommandRecorder::resource_barrier`](crate::rhi::CommandRecorder::resource_barrier).
#[derive(Debug, Clone)]
pub enum Barrier {
    Buffer(BufferTransition),
    Texture(TextureTransition),
}

/// Region of a buffer-texture copy.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
pub struct BufferTextureCopyInfo {
    pub buffer_offset: u64,
    pub mip_level: u8,
    pub base_array_layer: u8,
    pub extent: Extent3D,
}

/// Region of a texture-texture copy.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
pub struct TextureCopyInfo {
    pub src_mip_level: u8,
    pub dst_mip_level: u8,
    pub extent: Extent3D,
}
