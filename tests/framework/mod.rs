#![allow(dead_code)]

use std::sync::Arc;

use anyhow::Result;

use framegraph::prelude::*;
use framegraph::rhi::dummy::{Command, DummyDevice};

pub struct Context {
    pub device: DummyDevice,
    pub graph: GraphContext,
}

/// Creates a graph context on a headless dummy device, ready for automated tests
pub fn make_context() -> Result<Context> {
    make_context_with_settings(|settings| settings)
}

/// Create a graph context on a headless dummy device, with custom graph settings
pub fn make_context_with_settings<F: FnOnce(GraphSettingsBuilder) -> GraphSettingsBuilder>(callback: F) -> Result<Context> {
    let _ = pretty_env_logger::try_init();
    let device = DummyDevice::new();
    let settings = callback(GraphSettingsBuilder::new()).build();
    let graph = GraphContext::new(Arc::new(device.clone()), settings);
    Ok(Context {
        device,
        graph,
    })
}

pub fn buffer_desc(name: &str, size: u64) -> BufferCreateInfo {
    BufferCreateInfo::new(name, size, BufferUsageFlags::COPY_SRC | BufferUsageFlags::COPY_DST | BufferUsageFlags::STORAGE)
}

pub fn texture_desc(name: &str) -> TextureCreateInfo {
    TextureCreateInfo::new_2d(
        name,
        256,
        256,
        Format::Rgba8Unorm,
        TextureUsageFlags::TEXTURE_BINDING | TextureUsageFlags::STORAGE_BINDING | TextureUsageFlags::RENDER_ATTACHMENT,
    )
}

pub fn color_view() -> TextureViewCreateInfo {
    TextureViewCreateInfo::new_2d(TextureViewType::ColorAttachment, TextureAspect::Color)
}

pub fn storage_view() -> TextureViewCreateInfo {
    TextureViewCreateInfo::new_2d(TextureViewType::StorageBinding, TextureAspect::Color)
}

pub fn binding(ty: BindingType, index: u32) -> ResourceBinding {
    ResourceBinding {
        ty,
        index,
    }
}

/// All state transitions recorded for a texture, in recording order.
pub fn texture_transitions(commands: &[Command], texture: u64) -> Vec<(TextureState, TextureState)> {
    commands
        .iter()
        .filter_map(|command| match command {
            Command::TextureBarrier {
                texture: t,
                before,
                after,
            } if *t == texture => Some((*before, *after)),
            _ => None,
        })
        .collect()
}

/// All state transitions recorded for a buffer, in recording order.
pub fn buffer_transitions(commands: &[Command], buffer: u64) -> Vec<(BufferState, BufferState)> {
    commands
        .iter()
        .filter_map(|command| match command {
            Command::BufferBarrier {
                buffer: b,
                before,
                after,
            } if *b == buffer => Some((*before, *after)),
            _ => None,
        })
        .collect()
}

/// Names of the passes recorded, taken from their debug labels.
pub fn recorded_passes(commands: &[Command]) -> Vec<String> {
    commands
        .iter()
        .filter_map(|command| match command {
            Command::PushDebugLabel {
                name,
            } => Some(name.clone()),
            _ => None,
        })
        .collect()
}

/// Position of the first command matching `predicate`.
pub fn position_of(commands: &[Command], predicate: impl Fn(&Command) -> bool) -> Option<usize> {
    commands.iter().position(predicate)
}

pub fn error_of(result: Result<impl std::fmt::Debug>) -> Error {
    let err = result.expect_err("Operation should fail");
    err.downcast_ref::<Error>().cloned().expect("Error should be a framegraph error")
}
