//! Binds the surviving virtual objects of a graph to physical RHI objects.

use std::sync::Arc;

use anyhow::Result;

use crate::context::GraphContext;
use crate::core::error::Error;
use crate::graph::analysis::{CompiledGraph, Lifetime};
use crate::graph::bind_group::{BindGroupEntry, VirtualBindGroup};
use crate::graph::handle::BufferRef;
use crate::graph::pass::Pass;
use crate::graph::physical_resource::{PhysicalResource, PhysicalResourceBindings, PhysicalView};
use crate::graph::virtual_resource::{ImportedResource, ResourceKind, ResourceOrigin, VirtualResource, VirtualResourceView, ViewKind};
use crate::pool::Poolable;
use crate::rhi::{BindGroupCreateInfo, BindGroupEntryResource, Buffer, MapMode, Texture};

/// CPU data to copy into a buffer before the graph's passes execute.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BufferUploadInfo {
    pub data: Vec<u8>,
    /// Offset in the destination buffer, in bytes.
    pub dst_offset: u64,
}

/// A physical resource shared by transient resources with disjoint lifetimes.
struct AliasSlot {
    slot: usize,
    kind: ResourceKind,
    /// Lifetime of the latest resource bound to this slot. `None` while that resource is never used by a pass,
    /// the slot can then not be handed on.
    lifetime: Option<Lifetime>,
}

fn compatible(pooled: &ResourceKind, requested: &ResourceKind) -> bool {
    match (pooled, requested) {
        (ResourceKind::Buffer(pooled), ResourceKind::Buffer(requested)) => <dyn Buffer as Poolable>::compatible(pooled, requested),
        (ResourceKind::Texture(pooled), ResourceKind::Texture(requested)) => <dyn Texture as Poolable>::compatible(pooled, requested),
        _ => false,
    }
}

fn allocate(context: &GraphContext, kind: &ResourceKind) -> Result<PhysicalResource> {
    Ok(match kind {
        ResourceKind::Buffer(desc) => PhysicalResource::Buffer(context.buffer_pool_mut().allocate(desc)?.resource().clone()),
        ResourceKind::Texture(desc) => PhysicalResource::Texture(context.texture_pool_mut().allocate(desc)?.resource().clone()),
    })
}

/// Bind every surviving resource to a pooled or imported resource, and create the views and bind groups over them.
///
/// Transient resources are handled in order of first use. With `alias` set, a transient resource takes over the
/// physical resource of an earlier one with a compatible descriptor whose lifetime has ended. Resources that receive a
/// buffer upload are never bound to a physical resource that was used before them. Force used resources never share
/// their physical resource with any other resource.
pub(crate) fn devirtualize(
    context: &GraphContext,
    graph: u32,
    resources: &[VirtualResource],
    views: &[VirtualResourceView],
    bind_groups: &[VirtualBindGroup],
    passes: &[Pass],
    compiled: &CompiledGraph,
    uploads: &[(BufferRef, BufferUploadInfo)],
    alias: bool,
) -> Result<PhysicalResourceBindings> {
    let mut bindings = PhysicalResourceBindings::new(
        graph,
        resources.iter().map(|resource| resource.name().to_string()).collect(),
        views
            .iter()
            .map(|view| format!("view of {}", resources[view.resource().index()].name()))
            .collect(),
        bind_groups.iter().map(|group| group.desc.debug_name.clone()).collect(),
    );

    let mut transients = Vec::new();
    for (index, resource) in resources.iter().enumerate() {
        if compiled.culled_resources[index] {
            continue;
        }
        match &resource.origin {
            ResourceOrigin::Imported {
                resource: imported,
                ..
            } => {
                let physical = match imported {
                    ImportedResource::Buffer(buffer) => PhysicalResource::Buffer(buffer.clone()),
                    ImportedResource::Texture(texture) => PhysicalResource::Texture(texture.clone()),
                };
                let slot = bindings.add_slot(physical);
                bindings.bind_resource(index, slot);
            }
            ResourceOrigin::Transient => transients.push(index),
        }
    }
    // Resources without a use sort last.
    transients.sort_by_key(|index| (compiled.lifetimes[*index].is_none(), compiled.lifetimes[*index].map(|l| l.first)));

    let mut alias_slots: Vec<AliasSlot> = vec![];
    let mut aliased = 0;
    for index in transients {
        let resource = &resources[index];
        let lifetime = compiled.lifetimes[index];
        let uploaded = uploads.iter().any(|(buffer, _)| buffer.index() == index);
        let pinned = uploaded || resource.is_force_used();
        let donor = match (alias, lifetime, pinned) {
            (true, Some(lifetime), false) => alias_slots.iter_mut().find(|candidate| {
                compatible(&candidate.kind, &resource.kind)
                    && candidate.lifetime.map(|l| l.ends_before(&lifetime)).unwrap_or(false)
            }),
            _ => None,
        };

        match donor {
            Some(donor) => {
                trace!("Resource `{}` aliases physical slot {}", resource.name(), donor.slot);
                donor.lifetime = lifetime;
                bindings.bind_resource(index, donor.slot);
                aliased += 1;
            }
            None => {
                let slot = bindings.add_slot(allocate(context, &resource.kind)?);
                bindings.bind_resource(index, slot);
                // The memory of a force used resource is never handed to a later resource.
                alias_slots.push(AliasSlot {
                    slot,
                    kind: resource.kind.clone(),
                    lifetime: if resource.is_force_used() { None } else { lifetime },
                });
            }
        }
    }
    if aliased > 0 {
        debug!("Aliased {} transient resources onto {} physical resources", aliased, alias_slots.len());
    }

    devirtualize_views(context, &mut bindings, resources, views)?;
    devirtualize_bind_groups(context, &mut bindings, bind_groups, passes, compiled)?;
    Ok(bindings)
}

fn devirtualize_views(
    context: &GraphContext,
    bindings: &mut PhysicalResourceBindings,
    resources: &[VirtualResource],
    views: &[VirtualResourceView],
) -> Result<()> {
    let mut cache = context.view_cache_mut();
    for (index, view) in views.iter().enumerate() {
        let Some(slot) = bindings.slot_of(view.resource().index()) else { continue };
        let physical = match (&view.kind, bindings.slot(slot)) {
            (ViewKind::Buffer { desc, .. }, Some(PhysicalResource::Buffer(buffer))) => {
                PhysicalView::Buffer(cache.get_or_create_buffer_view(buffer.as_ref(), desc)?)
            }
            (ViewKind::Texture { desc, .. }, Some(PhysicalResource::Texture(texture))) => {
                PhysicalView::Texture(cache.get_or_create_texture_view(texture.as_ref(), desc)?)
            }
            _ => return Err(Error::NotDevirtualized(resources[view.resource().index()].name().to_string()).into()),
        };
        bindings.bind_view(index, physical);
    }
    Ok(())
}

fn devirtualize_bind_groups(
    context: &GraphContext,
    bindings: &mut PhysicalResourceBindings,
    bind_groups: &[VirtualBindGroup],
    passes: &[Pass],
    compiled: &CompiledGraph,
) -> Result<()> {
    let mut used = vec![false; bind_groups.len()];
    for (index, pass) in passes.iter().enumerate() {
        if compiled.culled_passes[index] {
            continue;
        }
        for group in pass.bind_groups() {
            used[group.index()] = true;
        }
    }

    for (index, group) in bind_groups.iter().enumerate() {
        if !used[index] {
            continue;
        }
        let desc = &group.desc;
        let mut entries = Vec::with_capacity(desc.entries.len());
        for (name, entry) in desc.entries() {
            let binding = desc
                .layout
                .find_binding(name)
                .ok_or_else(|| Error::UnknownBinding(name.to_string()))?;
            if binding.ty != entry.binding_type() {
                return Err(Error::BindingTypeMismatch(name.to_string()).into());
            }
            let resource = match entry {
                BindGroupEntry::Sampler(sampler) => BindGroupEntryResource::Sampler(sampler.clone()),
                BindGroupEntry::UniformBuffer(view)
                | BindGroupEntry::StorageBuffer(view)
                | BindGroupEntry::RwStorageBuffer(view) => BindGroupEntryResource::BufferView(bindings.buffer_view(*view)?.clone()),
                BindGroupEntry::Texture(view) | BindGroupEntry::StorageTexture(view) => {
                    BindGroupEntryResource::TextureView(bindings.texture_view(*view)?.clone())
                }
            };
            entries.push(crate::rhi::BindGroupEntry {
                binding,
                resource,
            });
        }
        let physical = context.device().create_bind_group(&BindGroupCreateInfo {
            layout: desc.layout.clone(),
            entries,
            debug_name: desc.debug_name.clone(),
        })?;
        bindings.bind_bind_group(index, physical);
    }
    Ok(())
}

/// Copy queued uploads into their buffers through a host mapping. Uploads into culled buffers are skipped.
pub(crate) fn perform_buffer_uploads(
    bindings: &PhysicalResourceBindings,
    uploads: &[(BufferRef, BufferUploadInfo)],
) -> Result<()> {
    for (buffer, upload) in uploads {
        let physical: &Arc<dyn Buffer> = match bindings.buffer(*buffer) {
            Ok(physical) => physical,
            Err(e) if matches!(e.downcast_ref::<Error>(), Some(Error::ResourceCulled(_))) => continue,
            Err(e) => return Err(e),
        };
        if upload.data.is_empty() {
            continue;
        }
        let length = upload.data.len() as u64;
        let ptr = physical.map(MapMode::Write, upload.dst_offset, length)?;
        // SAFETY: the mapping covers `length` bytes starting at `dst_offset`, and stays valid until unmap.
        unsafe {
            std::ptr::copy_nonoverlapping(upload.data.as_ptr(), ptr.as_ptr(), upload.data.len());
        }
        physical.unmap();
        trace!("Uploaded {} bytes to buffer `{}`", length, physical.create_info().debug_name);
    }
    Ok(())
}
