//! Records the surviving passes of a graph into command buffers, one per queue per timeline segment.

use std::collections::HashMap;

use anyhow::Result;

use crate::context::GraphContext;
use crate::core::error::Error;
use crate::graph::analysis::CompiledGraph;
use crate::graph::pass::{Pass, PassKind, QueueType, RasterPassDesc};
use crate::graph::physical_resource::{PhysicalResource, PhysicalResourceBindings};
use crate::graph::resource::ResourceState;
use crate::graph::virtual_resource::VirtualResource;
use crate::rhi::{
    Barrier, BufferState, BufferTransition, CommandBuffer, CommandRecorder, RasterColorAttachment,
    RasterDepthStencilAttachment, RasterPassBeginInfo, TextureState, TextureTransition,
};

/// Command buffers recorded for a graph, and the command buffer of every queue in every segment.
#[derive(Debug, Default)]
pub(crate) struct RecordedGraph {
    pub command_buffers: Vec<Box<dyn CommandBuffer>>,
    /// Per segment, the queues with their command buffer index.
    pub segments: Vec<Vec<(QueueType, usize)>>,
}

/// Tracks the current state of every physical resource slot while recording.
struct StateTracker {
    states: Vec<Option<ResourceState>>,
}

impl StateTracker {
    fn new(resources: &[VirtualResource], bindings: &PhysicalResourceBindings) -> Self {
        let mut states = vec![None; bindings.slot_count()];
        for (index, resource) in resources.iter().enumerate() {
            let Some(slot) = bindings.slot_of(index) else { continue };
            // Aliased resources start from the state their donor left behind.
            if states[slot].is_none() {
                states[slot] = Some(resource.initial_state());
            }
        }
        Self {
            states,
        }
    }

    /// Transition a slot to `state`, recording a barrier only if it is in another state.
    fn transition(
        &mut self,
        recorder: &mut dyn CommandRecorder,
        bindings: &PhysicalResourceBindings,
        slot: usize,
        state: ResourceState,
    ) -> Result<()> {
        let current = self.states[slot];
        if current == Some(state) {
            return Ok(());
        }
        let barrier = match (bindings.slot(slot), state) {
            (Some(PhysicalResource::Buffer(buffer)), ResourceState::Buffer(after)) => Barrier::Buffer(BufferTransition {
                buffer: buffer.clone(),
                before: match current {
                    Some(ResourceState::Buffer(before)) => before,
                    _ => BufferState::Undefined,
                },
                after,
            }),
            (Some(PhysicalResource::Texture(texture)), ResourceState::Texture(after)) => Barrier::Texture(TextureTransition {
                texture: texture.clone(),
                before: match current {
                    Some(ResourceState::Texture(before)) => before,
                    _ => TextureState::Undefined,
                },
                after,
            }),
            _ => return Err(Error::Uncategorized("Resource state does not match its resource type").into()),
        };
        trace!("Transition slot {} from {:?} to {:?}", slot, current, state);
        recorder.resource_barrier(&barrier);
        self.states[slot] = Some(state);
        Ok(())
    }
}

#[cfg(feature = "debug-markers")]
fn annotate_pass(pass: &Pass, recorder: &mut dyn CommandRecorder, enabled: bool) -> bool {
    if enabled {
        recorder.push_debug_label(&pass.name, pass.color.unwrap_or([1.0, 1.0, 1.0, 1.0]));
    }
    enabled
}

#[cfg(not(feature = "debug-markers"))]
fn annotate_pass(_: &Pass, _: &mut dyn CommandRecorder, _: bool) -> bool {
    false
}

fn raster_begin_info(desc: &RasterPassDesc, bindings: &PhysicalResourceBindings) -> Result<RasterPassBeginInfo> {
    let color_attachments = desc
        .color_attachments
        .iter()
        .map(|attachment| {
            Ok(RasterColorAttachment {
                view: bindings.texture_view(attachment.view)?.clone(),
                load_op: attachment.load_op,
                store_op: attachment.store_op,
                clear_value: attachment.clear_value,
            })
        })
        .collect::<Result<Vec<_>>>()?;
    let depth_stencil_attachment = match &desc.depth_stencil_attachment {
        None => None,
        Some(attachment) => Some(RasterDepthStencilAttachment {
            view: bindings.texture_view(attachment.view)?.clone(),
            depth_load_op: attachment.depth_load_op,
            depth_store_op: attachment.depth_store_op,
            depth_clear_value: attachment.depth_clear_value,
            depth_read_only: attachment.depth_read_only,
            stencil_load_op: attachment.stencil_load_op,
            stencil_store_op: attachment.stencil_store_op,
            stencil_clear_value: attachment.stencil_clear_value,
            stencil_read_only: attachment.stencil_read_only,
        }),
    };
    Ok(RasterPassBeginInfo {
        color_attachments,
        depth_stencil_attachment,
    })
}

fn record_pass(
    pass: &mut Pass,
    recorder: &mut dyn CommandRecorder,
    bindings: &PhysicalResourceBindings,
    debug_labels: bool,
) -> Result<()> {
    let annotated = annotate_pass(pass, recorder, debug_labels);

    if let Some(pre) = &mut pass.pre {
        pre(bindings, &mut *recorder)?;
    }

    match &mut pass.kind {
        PassKind::Copy { func, .. } => {
            let mut copy = recorder.begin_copy_pass();
            func(bindings, &mut *copy)?;
            copy.end();
        }
        PassKind::Compute { func, .. } => {
            let mut compute = recorder.begin_compute_pass();
            func(bindings, &mut *compute)?;
            compute.end();
        }
        PassKind::Raster { desc, func, .. } => {
            let info = raster_begin_info(desc, bindings)?;
            let mut raster = recorder.begin_raster_pass(&info);
            func(bindings, &mut *raster)?;
            raster.end();
        }
    }

    if let Some(post) = &mut pass.post {
        post(bindings, &mut *recorder)?;
    }

    if annotated {
        recorder.pop_debug_label();
    }
    Ok(())
}

/// Record every surviving pass. Before each pass, the resources it accesses are transitioned to the state it requires.
/// After its last use, an imported resource is transitioned to its final state, unless that state is undefined.
pub(crate) fn record_graph(
    context: &GraphContext,
    resources: &[VirtualResource],
    passes: &mut [Pass],
    compiled: &CompiledGraph,
    bindings: &PhysicalResourceBindings,
) -> Result<RecordedGraph> {
    let debug_labels = context.settings().debug_labels;
    let mut tracker = StateTracker::new(resources, bindings);
    let mut recorded = RecordedGraph::default();

    // The pass after which each imported resource is returned to its final state.
    let mut finalize: HashMap<usize, Vec<usize>> = HashMap::new();
    for (index, resource) in resources.iter().enumerate() {
        if !resource.is_imported() {
            continue;
        }
        let last = compiled
            .users
            .get_vec(&index)
            .into_iter()
            .flatten()
            .filter_map(|pass| compiled.positions.get(pass).map(|position| (*position, *pass)))
            .max();
        if let Some((_, pass)) = last {
            finalize.entry(pass).or_default().push(index);
        }
    }

    for segment in &compiled.segments {
        let mut queues = Vec::with_capacity(segment.queues.len());
        for (queue, queue_passes) in &segment.queues {
            let mut cmd = context.device().create_command_buffer()?;
            {
                let mut recorder = cmd.begin()?;
                for pass_index in queue_passes {
                    let accesses = &compiled.passes[*pass_index];
                    for (resource, usage) in &accesses.accesses {
                        let Some(slot) = bindings.slot_of(*resource) else { continue };
                        let state = usage.required_state(resources[*resource].resource_type());
                        tracker.transition(recorder.as_mut(), bindings, slot, state)?;
                    }

                    record_pass(&mut passes[*pass_index], recorder.as_mut(), bindings, debug_labels)?;

                    for resource in finalize.get(pass_index).into_iter().flatten() {
                        let (Some(slot), Some(state)) = (bindings.slot_of(*resource), resources[*resource].final_state()) else {
                            continue;
                        };
                        // Nothing to hand back for resources imported without defined contents.
                        if state.is_undefined() {
                            continue;
                        }
                        tracker.transition(recorder.as_mut(), bindings, slot, state)?;
                    }
                }
                recorder.end();
            }
            recorded.command_buffers.push(cmd);
            queues.push((*queue, recorded.command_buffers.len() - 1));
        }
        recorded.segments.push(queues);
    }

    Ok(recorded)
}
