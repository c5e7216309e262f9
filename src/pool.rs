//! Descriptor-keyed pools of GPU resources, reused across frames.
//!
//! A pool hands out [`PooledRef`]s. While a pooled resource is referenced outside of the pool it is never handed out
//! again, and it is never destroyed. Once every outside reference is dropped, the next [`ResourcePool::allocate`] with an
//! equal descriptor reuses it. Resources that stay unused for [`GraphSettings::pool_release_latency`](crate::GraphSettings::pool_release_latency)
//! calls to [`ResourcePool::tick`] are released.
//!
//! # Example
//! ```
//! use std::sync::Arc;
//! use framegraph::prelude::*;
//! use framegraph::rhi::dummy::DummyDevice;
//!
//! let device: Arc<dyn Device> = Arc::new(DummyDevice::new());
//! let mut pool = BufferPool::new(device, 2);
//! let desc = BufferCreateInfo::new("scratch", 256, BufferUsageFlags::STORAGE);
//! let handle = pool.allocate(&desc)?.native_handle();
//! // The first reference was dropped, so the same buffer is handed out again.
//! assert_eq!(pool.allocate(&desc)?.native_handle(), handle);
//! assert_eq!(pool.size(), 1);
//! # Ok::<(), anyhow::Error>(())
//! ```

use std::cell::Cell;
use std::fmt::Debug;
use std::ops::Deref;
use std::sync::Arc;

use anyhow::Result;

use crate::core::error::Error;
use crate::rhi::{Buffer, BufferCreateInfo, Device, Texture, TextureCreateInfo};

/// Indicates that this RHI object can be pooled in a [`ResourcePool`].
pub trait Poolable: Debug {
    /// Descriptor the resource is created from.
    type Desc: Debug + Clone + PartialEq;

    /// Object kind, used in log messages.
    const KIND: &'static str;

    /// Create a new resource through the device.
    fn create(device: &dyn Device, desc: &Self::Desc) -> Result<Arc<Self>>;

    /// Backend handle of the resource.
    fn handle(&self) -> u64;

    /// Whether a resource created from `pooled` can stand in for one created from `requested`.
    ///
    /// Descriptors are compared by value, except for their debug names. A pooled resource keeps the name it was created
    /// with when a request under another name reuses it.
    fn compatible(pooled: &Self::Desc, requested: &Self::Desc) -> bool;
}

impl Poolable for dyn Buffer {
    type Desc = BufferCreateInfo;
    const KIND: &'static str = "buffer";

    fn create(device: &dyn Device, desc: &Self::Desc) -> Result<Arc<Self>> {
        device.create_buffer(desc)
    }

    fn handle(&self) -> u64 {
        self.native_handle()
    }

    /// Every field but `debug_name`.
    fn compatible(pooled: &Self::Desc, requested: &Self::Desc) -> bool {
        pooled.size == requested.size
            && pooled.usages == requested.usages
            && pooled.initial_state == requested.initial_state
    }
}

impl Poolable for dyn Texture {
    type Desc = TextureCreateInfo;
    const KIND: &'static str = "texture";

    fn create(device: &dyn Device, desc: &Self::Desc) -> Result<Arc<Self>> {
        device.create_texture(desc)
    }

    fn handle(&self) -> u64 {
        self.native_handle()
    }

    /// Every field but `debug_name`.
    fn compatible(pooled: &Self::Desc, requested: &Self::Desc) -> bool {
        pooled.dimension == requested.dimension
            && pooled.extent == requested.extent
            && pooled.format == requested.format
            && pooled.usages == requested.usages
            && pooled.mip_levels == requested.mip_levels
            && pooled.samples == requested.samples
            && pooled.initial_state == requested.initial_state
    }
}

/// A resource owned by a pool, together with the descriptor it was created from.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct PooledResource<P: Poolable + ?Sized> {
    resource: Arc<P>,
    desc: P::Desc,
    #[derivative(Debug = "ignore")]
    age: Cell<u32>,
}

impl<P: Poolable + ?Sized> PooledResource<P> {
    /// Get the pooled RHI object.
    pub fn resource(&self) -> &Arc<P> {
        &self.resource
    }

    /// Get the descriptor this resource was created from.
    pub fn desc(&self) -> &P::Desc {
        &self.desc
    }
}

impl<P: Poolable + ?Sized> Deref for PooledResource<P> {
    type Target = P;

    fn deref(&self) -> &Self::Target {
        &self.resource
    }
}

/// Shared reference to a pooled resource. Holding one keeps the resource reserved.
pub type PooledRef<P> = Arc<PooledResource<P>>;

/// Pool of RHI resources, keyed by descriptor.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct ResourcePool<P: Poolable + ?Sized> {
    #[derivative(Debug = "ignore")]
    device: Arc<dyn Device>,
    entries: Vec<PooledRef<P>>,
    release_latency: u32,
}

/// Pool of transient buffers.
pub type BufferPool = ResourcePool<dyn Buffer>;
/// Pool of transient textures.
pub type TexturePool = ResourcePool<dyn Texture>;

impl<P: Poolable + ?Sized> ResourcePool<P> {
    /// Create an empty pool. Unreferenced resources are released after `release_latency` ticks.
    pub fn new(device: Arc<dyn Device>, release_latency: u32) -> Self {
        Self {
            device,
            entries: vec![],
            release_latency,
        }
    }

    /// Get a resource matching `desc`. An unreferenced pooled resource with a compatible descriptor is reused,
    /// otherwise a new one is created.
    /// # Errors
    /// * Fails if the device fails to create the resource.
    pub fn allocate(&mut self, desc: &P::Desc) -> Result<PooledRef<P>> {
        let reusable = self
            .entries
            .iter()
            .find(|entry| !Self::in_use(entry) && P::compatible(&entry.desc, desc));
        if let Some(entry) = reusable {
            entry.age.set(0);
            return Ok(entry.clone());
        }

        let resource = P::create(self.device.as_ref(), desc).map_err(|e| {
            if matches!(e.downcast_ref::<Error>(), Some(Error::DeviceFailure(_))) {
                e
            } else {
                anyhow::Error::from(Error::DeviceFailure(format!("{e:#}")))
            }
        })?;
        #[cfg(feature = "log-objects")]
        trace!("Created new pooled {} {:#x} ({:?})", P::KIND, resource.handle(), desc);
        let entry = Arc::new(PooledResource {
            resource,
            desc: desc.clone(),
            age: Cell::new(0),
        });
        self.entries.push(entry.clone());
        Ok(entry)
    }

    /// Advance one frame. Unreferenced resources age by one and are removed once they reach the release latency,
    /// referenced resources are reset to age zero.
    /// Returns the removed resources. They are destroyed when the returned list is dropped.
    pub fn tick(&mut self) -> Vec<PooledRef<P>> {
        let latency = self.release_latency;
        let mut released = Vec::new();
        for entry in std::mem::take(&mut self.entries) {
            if Self::in_use(&entry) {
                entry.age.set(0);
                self.entries.push(entry);
                continue;
            }
            entry.age.set(entry.age.get() + 1);
            if entry.age.get() >= latency {
                #[cfg(feature = "log-objects")]
                trace!("Releasing pooled {} {:#x}", P::KIND, entry.resource.handle());
                released.push(entry);
            } else {
                self.entries.push(entry);
            }
        }
        released
    }

    /// Amount of resources in the pool, referenced or not.
    pub fn size(&self) -> usize {
        self.entries.len()
    }

    /// Release every resource in the pool.
    /// # Errors
    /// * Fails with [`Error::PoolResourceInUse`] if any resource is still referenced. The pool is left untouched.
    pub fn invalidate(&mut self) -> Result<()> {
        let in_use = self.entries.iter().filter(|entry| Self::in_use(entry)).count();
        if in_use > 0 {
            return Err(Error::PoolResourceInUse(in_use).into());
        }
        self.entries.clear();
        Ok(())
    }

    /// A pooled resource is in use while anything outside the pool holds either the pooled reference or the object itself.
    fn in_use(entry: &PooledRef<P>) -> bool {
        Arc::strong_count(entry) > 1 || Arc::strong_count(&entry.resource) > 1
    }

    /// Get the release latency of this pool.
    pub fn release_latency(&self) -> u32 {
        self.release_latency
    }
}
