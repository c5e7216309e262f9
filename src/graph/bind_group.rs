//! Bind groups over virtual resource views.
//!
//! A [`BindGroupDesc`] names the views and samplers bound to each slot of a bind group layout. Slots are matched to the
//! layout by name when the graph is executed. The kind of each entry also tells the graph how the pass that binds the group
//! accesses the viewed resource: uniform buffers, storage buffers and textures are read, rw-storage buffers and
//! storage textures are written.
//!
//! # Example
//! ```
//! # use framegraph::prelude::*;
//! # use framegraph::rhi::dummy::DummyDevice;
//! # use std::sync::Arc;
//! # let device = DummyDevice::new();
//! # let layout = device.create_bind_group_layout([
//! #     ("input", ResourceBinding { ty: BindingType::Texture, index: 0 }),
//! #     ("output", ResourceBinding { ty: BindingType::StorageTexture, index: 1 }),
//! # ]);
//! # let context = GraphContext::new(Arc::new(device.clone()), GraphSettings::default());
//! # let mut graph = PassGraph::new(&context);
//! # let desc = TextureCreateInfo::new_2d("image", 64, 64, Format::Rgba8Unorm,
//! #     TextureUsageFlags::TEXTURE_BINDING | TextureUsageFlags::STORAGE_BINDING);
//! # let input = graph.create_texture(desc.clone())?;
//! # let output = graph.create_texture(desc)?;
//! let input_view = graph.create_texture_view(input, TextureViewCreateInfo::default())?;
//! let output_view = graph.create_texture_view(output, TextureViewCreateInfo::new_2d(TextureViewType::StorageBinding, TextureAspect::Color))?;
//! let group = graph.allocate_bind_group(
//!     BindGroupDesc::new(layout)
//!         .texture("input", input_view)?
//!         .storage_texture("output", output_view)?,
//! )?;
//! # Ok::<(), anyhow::Error>(())
//! ```

use std::sync::Arc;

use anyhow::Result;

use crate::core::error::Error;
use crate::graph::handle::{BufferViewRef, TextureViewRef};
use crate::graph::resource::ResourceUsage;
use crate::rhi::{BindGroupLayout, BindingType, Sampler};

/// What is bound to one named slot of a bind group.
#[derive(Debug, Clone)]
pub enum BindGroupEntry {
    Sampler(Arc<dyn Sampler>),
    UniformBuffer(BufferViewRef),
    StorageBuffer(BufferViewRef),
    RwStorageBuffer(BufferViewRef),
    Texture(TextureViewRef),
    StorageTexture(TextureViewRef),
}

/// A view referenced by a bind group entry.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum EntryView {
    Buffer(BufferViewRef),
    Texture(TextureViewRef),
}

impl BindGroupEntry {
    /// Binding type a layout slot must have to accept this entry.
    pub fn binding_type(&self) -> BindingType {
        match self {
            BindGroupEntry::Sampler(_) => BindingType::Sampler,
            BindGroupEntry::UniformBuffer(_) => BindingType::UniformBuffer,
            BindGroupEntry::StorageBuffer(_) => BindingType::StorageBuffer,
            BindGroupEntry::RwStorageBuffer(_) => BindingType::RwStorageBuffer,
            BindGroupEntry::Texture(_) => BindingType::Texture,
            BindGroupEntry::StorageTexture(_) => BindingType::StorageTexture,
        }
    }

    /// The view this entry binds, and how the viewed resource is accessed. Samplers access no resource.
    pub(crate) fn access(&self) -> Option<(EntryView, ResourceUsage)> {
        match self {
            BindGroupEntry::Sampler(_) => None,
            BindGroupEntry::UniformBuffer(view) => Some((EntryView::Buffer(*view), ResourceUsage::UniformBuffer)),
            BindGroupEntry::StorageBuffer(view) => Some((EntryView::Buffer(*view), ResourceUsage::StorageBuffer)),
            BindGroupEntry::RwStorageBuffer(view) => Some((EntryView::Buffer(*view), ResourceUsage::RwStorageBuffer)),
            BindGroupEntry::Texture(view) => Some((EntryView::Texture(*view), ResourceUsage::Texture)),
            BindGroupEntry::StorageTexture(view) => Some((EntryView::Texture(*view), ResourceUsage::StorageTexture)),
        }
    }
}

/// Describes a bind group: a layout and the named entries bound to it.
#[derive(Debug, Clone)]
pub struct BindGroupDesc {
    pub(crate) layout: Arc<dyn BindGroupLayout>,
    pub(crate) entries: Vec<(String, BindGroupEntry)>,
    pub(crate) debug_name: String,
}

impl BindGroupDesc {
    /// Create an empty bind group description for a layout.
    pub fn new(layout: Arc<dyn BindGroupLayout>) -> Self {
        Self {
            layout,
            entries: vec![],
            debug_name: String::new(),
        }
    }

    /// Set the debug name of the bind group.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.debug_name = name.into();
        self
    }

    /// Add an entry under a binding name.
    /// # Errors
    /// * Fails with [`Error::DuplicateBinding`] if an entry with this name was already added.
    pub fn entry(mut self, name: impl Into<String>, entry: BindGroupEntry) -> Result<Self> {
        let name = name.into();
        if self.entries.iter().any(|(existing, _)| *existing == name) {
            return Err(Error::DuplicateBinding(name).into());
        }
        self.entries.push((name, entry));
        Ok(self)
    }

    pub fn sampler(self, name: impl Into<String>, sampler: Arc<dyn Sampler>) -> Result<Self> {
        self.entry(name, BindGroupEntry::Sampler(sampler))
    }

    pub fn uniform_buffer(self, name: impl Into<String>, view: BufferViewRef) -> Result<Self> {
        self.entry(name, BindGroupEntry::UniformBuffer(view))
    }

    pub fn storage_buffer(self, name: impl Into<String>, view: BufferViewRef) -> Result<Self> {
        self.entry(name, BindGroupEntry::StorageBuffer(view))
    }

    pub fn rw_storage_buffer(self, name: impl Into<String>, view: BufferViewRef) -> Result<Self> {
        self.entry(name, BindGroupEntry::RwStorageBuffer(view))
    }

    pub fn texture(self, name: impl Into<String>, view: TextureViewRef) -> Result<Self> {
        self.entry(name, BindGroupEntry::Texture(view))
    }

    pub fn storage_texture(self, name: impl Into<String>, view: TextureViewRef) -> Result<Self> {
        self.entry(name, BindGroupEntry::StorageTexture(view))
    }

    /// Get the entries, in the order they were added.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &BindGroupEntry)> {
        self.entries.iter().map(|(name, entry)| (name.as_str(), entry))
    }
}

/// A bind group allocated in a pass graph.
#[derive(Debug, Clone)]
pub struct VirtualBindGroup {
    pub(crate) desc: BindGroupDesc,
}

impl VirtualBindGroup {
    pub fn desc(&self) -> &BindGroupDesc {
        &self.desc
    }
}
