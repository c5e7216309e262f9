//! Per-device state shared by all graphs built on that device.

use std::cell::{Ref, RefCell, RefMut};
use std::sync::Arc;

use crate::cache::ResourceViewCache;
use crate::core::settings::GraphSettings;
use crate::pool::{BufferPool, TexturePool};
use crate::rhi::Device;

/// Owns the resource pools and view cache of one device, and the settings graphs on it are executed with.
///
/// A new [`PassGraph`](crate::PassGraph) is created from a context every frame. Call [`GraphContext::tick`] once per
/// frame, after the previous frame's graph was dropped, to release resources that are no longer used.
///
/// The context is meant to be used from the render thread only. It is not `Sync`.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct GraphContext {
    #[derivative(Debug = "ignore")]
    device: Arc<dyn Device>,
    settings: GraphSettings,
    buffers: RefCell<BufferPool>,
    textures: RefCell<TexturePool>,
    views: RefCell<ResourceViewCache>,
}

impl GraphContext {
    /// Create a context for a device.
    pub fn new(device: Arc<dyn Device>, settings: GraphSettings) -> Self {
        let latency = settings.pool_release_latency;
        Self {
            buffers: RefCell::new(BufferPool::new(device.clone(), latency)),
            textures: RefCell::new(TexturePool::new(device.clone(), latency)),
            views: RefCell::new(ResourceViewCache::new()),
            device,
            settings,
        }
    }

    /// Get the device this context was created for.
    pub fn device(&self) -> &Arc<dyn Device> {
        &self.device
    }

    pub fn settings(&self) -> &GraphSettings {
        &self.settings
    }

    pub fn buffer_pool(&self) -> Ref<'_, BufferPool> {
        self.buffers.borrow()
    }

    pub fn texture_pool(&self) -> Ref<'_, TexturePool> {
        self.textures.borrow()
    }

    pub fn view_cache(&self) -> Ref<'_, ResourceViewCache> {
        self.views.borrow()
    }

    pub(crate) fn buffer_pool_mut(&self) -> RefMut<'_, BufferPool> {
        self.buffers.borrow_mut()
    }

    pub(crate) fn texture_pool_mut(&self) -> RefMut<'_, TexturePool> {
        self.textures.borrow_mut()
    }

    pub(crate) fn view_cache_mut(&self) -> RefMut<'_, ResourceViewCache> {
        self.views.borrow_mut()
    }

    /// Drop all cached views of an imported resource. Call this before destroying a resource that was imported into a graph,
    /// for example when recreating a swapchain.
    pub fn forget_imported(&self, native_handle: u64) {
        self.views.borrow_mut().invalidate(native_handle);
    }

    /// Advance one frame. Ages pooled resources and cached views, and releases those that were unused for too long.
    pub fn tick(&self) {
        let buffers = self.buffers.borrow_mut().tick();
        let textures = self.textures.borrow_mut().tick();
        let mut views = self.views.borrow_mut();
        for handle in buffers.iter().map(|b| b.native_handle()).chain(textures.iter().map(|t| t.native_handle())) {
            views.invalidate(handle);
        }
        views.next_frame();
        if !buffers.is_empty() || !textures.is_empty() {
            debug!("Released {} pooled buffers and {} pooled textures", buffers.len(), textures.len());
        }
    }
}
