//! Time-to-live cache of resource views, keyed by the physical resource and the view descriptor.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use anyhow::Result;

use crate::rhi::{Buffer, BufferView, BufferViewCreateInfo, Texture, TextureView, TextureViewCreateInfo};

/// An RHI object that can be stored in a [`Cache`].
pub trait Resource {
    type Key: Hash + Eq + Clone;
    /// Object the cached resource is created from.
    type Source: ?Sized;
    const MAX_TIME_TO_LIVE: u32;

    fn create(source: &Self::Source, key: &Self::Key) -> Result<Arc<Self>>;
    fn source_handle(source: &Self::Source) -> u64;
}

impl Resource for dyn BufferView {
    type Key = BufferViewCreateInfo;
    type Source = dyn Buffer;
    const MAX_TIME_TO_LIVE: u32 = 8;

    fn create(source: &Self::Source, key: &Self::Key) -> Result<Arc<Self>> {
        source.create_buffer_view(key)
    }

    fn source_handle(source: &Self::Source) -> u64 {
        source.native_handle()
    }
}

impl Resource for dyn TextureView {
    type Key = TextureViewCreateInfo;
    type Source = dyn Texture;
    const MAX_TIME_TO_LIVE: u32 = 8;

    fn create(source: &Self::Source, key: &Self::Key) -> Result<Arc<Self>> {
        source.create_texture_view(key)
    }

    fn source_handle(source: &Self::Source) -> u64 {
        source.native_handle()
    }
}

struct Entry<R: ?Sized> {
    pub value: Arc<R>,
    pub ttl: u32,
}

pub struct Cache<R> where R: Resource + ?Sized {
    store: HashMap<(u64, R::Key), Entry<R>>,
}

impl<R> Default for Cache<R> where R: Resource + ?Sized {
    fn default() -> Self {
        Self {
            store: Default::default(),
        }
    }
}

impl<R> Cache<R> where R: Resource + ?Sized {
    pub fn get_or_create(&mut self, source: &R::Source, key: &R::Key) -> Result<Arc<R>> {
        let key = (R::source_handle(source), key.clone());
        if let Some(entry) = self.store.get_mut(&key) {
            entry.ttl = R::MAX_TIME_TO_LIVE;
            return Ok(entry.value.clone());
        }
        let value = R::create(source, &key.1)?;
        #[cfg(feature = "log-objects")]
        trace!("Created cached view for resource {:#x}", key.0);
        self.store.insert(key, Entry {
            value: value.clone(),
            ttl: R::MAX_TIME_TO_LIVE,
        });
        Ok(value)
    }

    /// Drop every view of a resource.
    pub fn invalidate(&mut self, source_handle: u64) {
        self.store.retain(|(source, _), _| *source != source_handle);
    }

    /// Advance time-to-live values in the cache, deleting objects values that have not been accessed for a while.
    pub(crate) fn next_frame(&mut self) {
        self.store.iter_mut().for_each(|(_, entry)| entry.ttl -= 1);
        self.store.retain(|_, entry| entry.ttl != 0);
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }
}

/// Caches buffer and texture views per physical resource, so devirtualizing a graph does not recreate views every frame.
#[derive(Default)]
pub struct ResourceViewCache {
    buffer_views: Cache<dyn BufferView>,
    texture_views: Cache<dyn TextureView>,
}

impl std::fmt::Debug for ResourceViewCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceViewCache")
            .field("buffer_views", &self.buffer_views.len())
            .field("texture_views", &self.texture_views.len())
            .finish()
    }
}

impl ResourceViewCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a cached view of the buffer, or create one.
    pub fn get_or_create_buffer_view(&mut self, buffer: &(dyn Buffer + 'static), desc: &BufferViewCreateInfo) -> Result<Arc<dyn BufferView>> {
        self.buffer_views.get_or_create(buffer, desc)
    }

    /// Get a cached view of the texture, or create one.
    pub fn get_or_create_texture_view(&mut self, texture: &(dyn Texture + 'static), desc: &TextureViewCreateInfo) -> Result<Arc<dyn TextureView>> {
        self.texture_views.get_or_create(texture, desc)
    }

    /// Drop every cached view of the resource with this native handle. Must be called before the resource is destroyed.
    pub fn invalidate(&mut self, resource_handle: u64) {
        #[cfg(feature = "log-objects")]
        trace!("Invalidating cached views of resource {:#x}", resource_handle);
        self.buffer_views.invalidate(resource_handle);
        self.texture_views.invalidate(resource_handle);
    }

    /// Advance one frame, dropping views that were not used for a while.
    pub(crate) fn next_frame(&mut self) {
        self.buffer_views.next_frame();
        self.texture_views.next_frame();
    }

    /// Total amount of cached views.
    pub fn len(&self) -> usize {
        self.buffer_views.len() + self.texture_views.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
