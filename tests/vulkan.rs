#![cfg(feature = "vulkan")]

use anyhow::Result;
use ash::vk;
use ash::vk::Handle;

use framegraph::prelude::*;
use framegraph::rhi::vulkan::{buffer_barrier, image_barrier, IntoVulkanType, SyncScope};
use framegraph::rhi::{BufferTransition, TextureTransition};

mod framework;

#[test]
pub fn texture_states_map_to_layouts() {
    assert_eq!(TextureState::Undefined.into_vulkan(), vk::ImageLayout::UNDEFINED);
    assert_eq!(TextureState::Storage.into_vulkan(), vk::ImageLayout::GENERAL);
    assert_eq!(TextureState::Present.into_vulkan(), vk::ImageLayout::PRESENT_SRC_KHR);
    assert_eq!(TextureState::DepthStencilWrite.into_vulkan(), vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL);
    assert_eq!(Format::Bgra8Srgb.into_vulkan(), vk::Format::B8G8R8A8_SRGB);
    assert_eq!(TextureAspect::DepthStencil.into_vulkan(), vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL);
}

#[test]
pub fn image_barrier_covers_transition() -> Result<()> {
    let context = framework::make_context()?;
    let texture = context.device.create_texture(&framework::texture_desc("target"))?;
    let barrier = image_barrier(
        &TextureTransition {
            texture: texture.clone(),
            before: TextureState::RenderTarget,
            after: TextureState::ShaderReadOnly,
        },
        TextureAspect::Color,
    );

    assert_eq!(barrier.old_layout, vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL);
    assert_eq!(barrier.new_layout, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL);
    assert_eq!(barrier.src_stage_mask, vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT);
    assert!(barrier.dst_access_mask.contains(vk::AccessFlags2::SHADER_READ));
    assert_eq!(barrier.image.as_raw(), texture.native_handle());
    assert_eq!(barrier.subresource_range.aspect_mask, vk::ImageAspectFlags::COLOR);
    assert_eq!(barrier.subresource_range.level_count, 1);
    Ok(())
}

#[test]
pub fn buffer_barrier_covers_transition() -> Result<()> {
    let context = framework::make_context()?;
    let buffer = context.device.create_buffer(&framework::buffer_desc("buffer", 64))?;
    let barrier = buffer_barrier(&BufferTransition {
        buffer,
        before: BufferState::Staging,
        after: BufferState::CopySrc,
    });

    assert_eq!(barrier.src_stage_mask, vk::PipelineStageFlags2::HOST);
    assert_eq!(barrier.src_access_mask, vk::AccessFlags2::HOST_WRITE);
    assert_eq!(barrier.dst_stage_mask, BufferState::CopySrc.stage());
    assert_eq!(barrier.dst_access_mask, vk::AccessFlags2::TRANSFER_READ);
    Ok(())
}
