//! Translation tables from RHI states, formats and attachment operations to Vulkan.
//!
//! A Vulkan backend can use these to implement [`CommandRecorder::resource_barrier`](crate::rhi::CommandRecorder::resource_barrier)
//! from the transitions the graph records:
//! ```
//! use ash::vk;
//! use framegraph::rhi::TextureState;
//! use framegraph::rhi::vulkan::{IntoVulkanType, SyncScope};
//!
//! let layout: vk::ImageLayout = TextureState::RenderTarget.into_vulkan();
//! assert_eq!(layout, vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL);
//! assert_eq!(TextureState::RenderTarget.stage(), vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT);
//! ```

use ash::vk;
use ash::vk::Handle;

use crate::rhi::{
    BufferState, BufferTransition, Format, LoadOp, QueueType, StoreOp, TextureAspect, TextureState, TextureTransition,
};

/// Convert an object into a vulkan type
pub trait IntoVulkanType {
    /// Output Vulkan type
    type Output;

    /// Consume self and return a vulkan type
    fn into_vulkan(self) -> Self::Output;
}

/// Pipeline stages and access types that make up one side of a Vulkan barrier.
pub trait SyncScope {
    /// Pipeline stages in which a resource in this state is accessed.
    fn stage(&self) -> vk::PipelineStageFlags2;
    /// Memory access performed on a resource in this state.
    fn access(&self) -> vk::AccessFlags2;
}

impl IntoVulkanType for TextureState {
    type Output = vk::ImageLayout;

    fn into_vulkan(self) -> Self::Output {
        match self {
            TextureState::Undefined => vk::ImageLayout::UNDEFINED,
            TextureState::CopySrc => vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
            TextureState::CopyDst => vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            TextureState::ShaderReadOnly => vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            TextureState::RenderTarget => vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            TextureState::Storage => vk::ImageLayout::GENERAL,
            TextureState::DepthStencilReadonly => vk::ImageLayout::DEPTH_STENCIL_READ_ONLY_OPTIMAL,
            TextureState::DepthStencilWrite => vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
            TextureState::Present => vk::ImageLayout::PRESENT_SRC_KHR,
        }
    }
}

impl SyncScope for TextureState {
    fn stage(&self) -> vk::PipelineStageFlags2 {
        match self {
            TextureState::Undefined => vk::PipelineStageFlags2::TOP_OF_PIPE,
            TextureState::CopySrc | TextureState::CopyDst => vk::PipelineStageFlags2::ALL_TRANSFER,
            TextureState::ShaderReadOnly | TextureState::Storage => {
                vk::PipelineStageFlags2::FRAGMENT_SHADER | vk::PipelineStageFlags2::COMPUTE_SHADER
            }
            TextureState::RenderTarget => vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT,
            // Depth/stencil loads happen in EARLY_FRAGMENT_TESTS, writes in LATE_FRAGMENT_TESTS.
            TextureState::DepthStencilReadonly | TextureState::DepthStencilWrite => {
                vk::PipelineStageFlags2::EARLY_FRAGMENT_TESTS | vk::PipelineStageFlags2::LATE_FRAGMENT_TESTS
            }
            TextureState::Present => vk::PipelineStageFlags2::BOTTOM_OF_PIPE,
        }
    }

    fn access(&self) -> vk::AccessFlags2 {
        match self {
            TextureState::Undefined => vk::AccessFlags2::NONE,
            TextureState::CopySrc => vk::AccessFlags2::TRANSFER_READ,
            TextureState::CopyDst => vk::AccessFlags2::TRANSFER_WRITE,
            TextureState::ShaderReadOnly => vk::AccessFlags2::SHADER_READ,
            TextureState::RenderTarget => {
                vk::AccessFlags2::COLOR_ATTACHMENT_READ | vk::AccessFlags2::COLOR_ATTACHMENT_WRITE
            }
            TextureState::Storage => vk::AccessFlags2::SHADER_STORAGE_READ | vk::AccessFlags2::SHADER_STORAGE_WRITE,
            TextureState::DepthStencilReadonly => vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_READ,
            TextureState::DepthStencilWrite => {
                vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_READ | vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_WRITE
            }
            TextureState::Present => vk::AccessFlags2::NONE,
        }
    }
}

impl SyncScope for BufferState {
    fn stage(&self) -> vk::PipelineStageFlags2 {
        match self {
            BufferState::Undefined => vk::PipelineStageFlags2::TOP_OF_PIPE,
            BufferState::Staging => vk::PipelineStageFlags2::HOST,
            BufferState::CopySrc | BufferState::CopyDst => vk::PipelineStageFlags2::ALL_TRANSFER,
            BufferState::ShaderReadOnly | BufferState::Storage | BufferState::RwStorage => {
                vk::PipelineStageFlags2::VERTEX_SHADER
                    | vk::PipelineStageFlags2::FRAGMENT_SHADER
                    | vk::PipelineStageFlags2::COMPUTE_SHADER
            }
        }
    }

    fn access(&self) -> vk::AccessFlags2 {
        match self {
            BufferState::Undefined => vk::AccessFlags2::NONE,
            BufferState::Staging => vk::AccessFlags2::HOST_WRITE,
            BufferState::CopySrc => vk::AccessFlags2::TRANSFER_READ,
            BufferState::CopyDst => vk::AccessFlags2::TRANSFER_WRITE,
            BufferState::ShaderReadOnly => vk::AccessFlags2::UNIFORM_READ | vk::AccessFlags2::SHADER_STORAGE_READ,
            BufferState::Storage => vk::AccessFlags2::SHADER_STORAGE_READ,
            BufferState::RwStorage => vk::AccessFlags2::SHADER_STORAGE_READ | vk::AccessFlags2::SHADER_STORAGE_WRITE,
        }
    }
}

impl IntoVulkanType for Format {
    type Output = vk::Format;

    fn into_vulkan(self) -> Self::Output {
        match self {
            Format::Rgba8Unorm => vk::Format::R8G8B8A8_UNORM,
            Format::Bgra8Unorm => vk::Format::B8G8R8A8_UNORM,
            Format::Rgba8Srgb => vk::Format::R8G8B8A8_SRGB,
            Format::Bgra8Srgb => vk::Format::B8G8R8A8_SRGB,
            Format::Rgba16Float => vk::Format::R16G16B16A16_SFLOAT,
            Format::Rgba32Float => vk::Format::R32G32B32A32_SFLOAT,
            Format::R32Float => vk::Format::R32_SFLOAT,
            Format::R32Uint => vk::Format::R32_UINT,
            Format::D16Unorm => vk::Format::D16_UNORM,
            Format::D24UnormS8Uint => vk::Format::D24_UNORM_S8_UINT,
            Format::D32Float => vk::Format::D32_SFLOAT,
            Format::D32FloatS8Uint => vk::Format::D32_SFLOAT_S8_UINT,
        }
    }
}

impl IntoVulkanType for LoadOp {
    type Output = vk::AttachmentLoadOp;

    fn into_vulkan(self) -> Self::Output {
        match self {
            LoadOp::Load => vk::AttachmentLoadOp::LOAD,
            LoadOp::Clear => vk::AttachmentLoadOp::CLEAR,
        }
    }
}

impl IntoVulkanType for StoreOp {
    type Output = vk::AttachmentStoreOp;

    fn into_vulkan(self) -> Self::Output {
        match self {
            StoreOp::Store => vk::AttachmentStoreOp::STORE,
            StoreOp::Discard => vk::AttachmentStoreOp::DONT_CARE,
        }
    }
}

impl IntoVulkanType for TextureAspect {
    type Output = vk::ImageAspectFlags;

    fn into_vulkan(self) -> Self::Output {
        match self {
            TextureAspect::Color => vk::ImageAspectFlags::COLOR,
            TextureAspect::Depth => vk::ImageAspectFlags::DEPTH,
            TextureAspect::Stencil => vk::ImageAspectFlags::STENCIL,
            TextureAspect::DepthStencil => vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL,
        }
    }
}

impl IntoVulkanType for QueueType {
    type Output = vk::QueueFlags;

    fn into_vulkan(self) -> Self::Output {
        match self {
            QueueType::Graphics => vk::QueueFlags::GRAPHICS,
            QueueType::Compute => vk::QueueFlags::COMPUTE,
            QueueType::Transfer => vk::QueueFlags::TRANSFER,
        }
    }
}

/// Build the image barrier for a texture transition. The texture's native handle is taken to be a `VkImage`.
/// All mips and layers of the aspect are transitioned.
pub fn image_barrier(transition: &TextureTransition, aspect: TextureAspect) -> vk::ImageMemoryBarrier2 {
    let info = transition.texture.create_info();
    vk::ImageMemoryBarrier2 {
        s_type: vk::StructureType::IMAGE_MEMORY_BARRIER_2,
        p_next: std::ptr::null(),
        src_stage_mask: transition.before.stage(),
        src_access_mask: transition.before.access(),
        dst_stage_mask: transition.after.stage(),
        dst_access_mask: transition.after.access(),
        old_layout: transition.before.into_vulkan(),
        new_layout: transition.after.into_vulkan(),
        src_queue_family_index: vk::QUEUE_FAMILY_IGNORED,
        dst_queue_family_index: vk::QUEUE_FAMILY_IGNORED,
        image: vk::Image::from_raw(transition.texture.native_handle()),
        subresource_range: vk::ImageSubresourceRange {
            aspect_mask: aspect.into_vulkan(),
            base_mip_level: 0,
            level_count: info.mip_levels as u32,
            base_array_layer: 0,
            layer_count: vk::REMAINING_ARRAY_LAYERS,
        },
    }
}

/// Build the barrier for a buffer transition.
pub fn buffer_barrier(transition: &BufferTransition) -> vk::MemoryBarrier2 {
    // Every driver implements buffer barriers as global memory barriers, so we do the same.
    vk::MemoryBarrier2 {
        s_type: vk::StructureType::MEMORY_BARRIER_2,
        p_next: std::ptr::null(),
        src_stage_mask: transition.before.stage(),
        src_access_mask: transition.before.access(),
        dst_stage_mask: transition.after.stage(),
        dst_access_mask: transition.after.access(),
    }
}
