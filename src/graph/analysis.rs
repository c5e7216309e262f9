//! Derives what every pass reads and writes, partitions the passes into timeline segments, checks cross-queue hazards and
//! builds the dependency graph.
//!
//! A timeline segment is a run of passes between two sync points. Within a segment each queue executes its passes in
//! declaration order, and different queues run concurrently. Segments execute one after another: every submission of
//! a segment waits for all submissions of the previous one.

use std::collections::{HashMap, HashSet};

use anyhow::Result;
use multimap::MultiMap;
use petgraph::algo::is_cyclic_directed;
use petgraph::graph::NodeIndex;

use crate::core::error::Error;
use crate::core::settings::CrossQueuePolicy;
use crate::graph::bind_group::{EntryView, VirtualBindGroup};
use crate::graph::pass::{Pass, PassKind, QueueType};
use crate::graph::resource::{ResourceState, ResourceUsage};
use crate::graph::task_graph::{Dependency, DependencyGraph, DependencyKind, PassNode};
use crate::graph::virtual_resource::{VirtualResource, VirtualResourceView};

/// Resource accesses of one pass.
#[derive(Debug, Clone, Default)]
pub(crate) struct PassAccesses {
    /// Every access in the order it is declared, without duplicates.
    pub accesses: Vec<(usize, ResourceUsage)>,
    pub reads: HashSet<usize>,
    pub writes: HashSet<usize>,
}

impl PassAccesses {
    fn add(&mut self, resource: usize, usage: ResourceUsage) {
        if self.accesses.contains(&(resource, usage)) {
            return;
        }
        self.accesses.push((resource, usage));
        if usage.is_read() {
            self.reads.insert(resource);
        } else {
            self.writes.insert(resource);
        }
    }

    /// Whether this pass accesses a resource at all.
    pub fn touches(&self, resource: usize) -> bool {
        self.reads.contains(&resource) || self.writes.contains(&resource)
    }
}

/// Passes of one timeline segment, per queue.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Segment {
    /// Queues in [`QueueType::ALL`] order, each with its passes in declaration order. Queues without passes are omitted.
    pub queues: Vec<(QueueType, Vec<usize>)>,
}

impl Segment {
    fn is_empty(&self) -> bool {
        self.queues.is_empty()
    }

    fn push(&mut self, queue: QueueType, pass: usize) {
        match self.queues.iter_mut().find(|(q, _)| *q == queue) {
            Some((_, passes)) => passes.push(pass),
            None => {
                self.queues.push((queue, vec![pass]));
                self.queues.sort_by_key(|(q, _)| *q);
            }
        }
    }
}

/// Position of a pass in the schedule.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) struct SchedulePosition {
    pub segment: usize,
    pub queue: QueueType,
    /// Position within the queue's pass list of the segment.
    pub index: usize,
}

/// First and last use of a resource in the schedule.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) struct Lifetime {
    pub first: SchedulePosition,
    pub last: SchedulePosition,
    /// Whether every use is on one queue within one segment.
    pub single_queue: bool,
}

impl Lifetime {
    /// Whether this lifetime is over before `other` starts, so both can share a physical resource.
    pub fn ends_before(&self, other: &Lifetime) -> bool {
        if self.last.segment < other.first.segment {
            return true;
        }
        self.single_queue
            && other.single_queue
            && self.first.segment == other.first.segment
            && self.first.queue == other.first.queue
            && self.last.index < other.first.index
    }
}

/// Everything derived from the declared passes and resources during execution.
#[derive(Debug, Clone, Default)]
pub(crate) struct CompiledGraph {
    pub passes: Vec<PassAccesses>,
    /// Amount of passes reading each resource, plus one for imported and force-used resources.
    pub read_counts: Vec<u32>,
    /// Passes accessing each resource, in declaration order.
    pub users: MultiMap<usize, usize>,
    pub culled_passes: Vec<bool>,
    pub culled_resources: Vec<bool>,
    pub segments: Vec<Segment>,
    /// Schedule position of every surviving pass.
    pub positions: HashMap<usize, SchedulePosition>,
    pub lifetimes: Vec<Option<Lifetime>>,
    pub dependencies: DependencyGraph,
}

fn bind_group_accesses(
    accesses: &mut PassAccesses,
    group: &VirtualBindGroup,
    views: &[VirtualResourceView],
) {
    for (_, entry) in group.desc.entries() {
        let Some((view, usage)) = entry.access() else { continue };
        let index = match view {
            EntryView::Buffer(view) => view.index(),
            EntryView::Texture(view) => view.index(),
        };
        accesses.add(views[index].resource().index(), usage);
    }
}

/// Derive the reads and writes of every pass, and the read count of every resource.
///
/// Copy sources are reads and destinations writes. Bind group entries are reads unless bound as rw-storage buffer or
/// storage texture. Color attachments are writes, a depth-stencil attachment is a read only if neither depth nor stencil
/// are written. Handles were validated when the passes were added.
pub(crate) fn compile_pass_read_writes(
    resources: &[VirtualResource],
    views: &[VirtualResourceView],
    bind_groups: &[VirtualBindGroup],
    passes: &[Pass],
) -> CompiledGraph {
    let mut compiled = CompiledGraph {
        read_counts: resources
            .iter()
            .map(|resource| u32::from(resource.is_imported() || resource.is_force_used()))
            .collect(),
        culled_passes: vec![false; passes.len()],
        culled_resources: vec![false; resources.len()],
        lifetimes: vec![None; resources.len()],
        ..Default::default()
    };

    for (index, pass) in passes.iter().enumerate() {
        let mut accesses = PassAccesses::default();
        match &pass.kind {
            PassKind::Copy { desc, .. } => {
                for src in &desc.copy_srcs {
                    accesses.add(src.index(), ResourceUsage::CopySrc);
                }
                for dst in &desc.copy_dsts {
                    accesses.add(dst.index(), ResourceUsage::CopyDst);
                }
            }
            PassKind::Compute { bind_groups: groups, .. } => {
                for group in groups {
                    bind_group_accesses(&mut accesses, &bind_groups[group.index()], views);
                }
            }
            PassKind::Raster { desc, bind_groups: groups, .. } => {
                for group in groups {
                    bind_group_accesses(&mut accesses, &bind_groups[group.index()], views);
                }
                for attachment in &desc.color_attachments {
                    accesses.add(views[attachment.view.index()].resource().index(), ResourceUsage::ColorAttachment);
                }
                if let Some(attachment) = &desc.depth_stencil_attachment {
                    accesses.add(
                        views[attachment.view.index()].resource().index(),
                        ResourceUsage::DepthStencilAttachment {
                            read_only: attachment.is_read_only(),
                        },
                    );
                }
            }
        }

        for read in &accesses.reads {
            compiled.read_counts[*read] += 1;
        }
        let mut touched = accesses.reads.union(&accesses.writes).copied().collect::<Vec<_>>();
        touched.sort_unstable();
        for resource in touched {
            compiled.users.insert(resource, index);
        }
        compiled.passes.push(accesses);
    }

    compiled
}

/// Whether two passes running concurrently on different queues would race on a resource: one of them writes it, or both
/// read it and need a state it is not in when the segment starts. `entry_states` holds the state every resource is in at
/// the start of the segment, `None` for transient resources no earlier segment used. Returns the first resource they
/// race on.
fn conflicting_resource(
    a: &PassAccesses,
    b: &PassAccesses,
    resources: &[VirtualResource],
    entry_states: &[Option<ResourceState>],
) -> Option<usize> {
    let mut candidates = a
        .writes
        .iter()
        .filter(|resource| b.touches(**resource))
        .chain(a.reads.iter().filter(|resource| b.writes.contains(resource)))
        .copied()
        .collect::<Vec<_>>();
    candidates.sort_unstable();
    if let Some(resource) = candidates.first() {
        return Some(*resource);
    }

    let states = |accesses: &PassAccesses, resource: usize| -> Vec<ResourceState> {
        accesses
            .accesses
            .iter()
            .filter(|(r, _)| *r == resource)
            .map(|(_, usage)| usage.required_state(resources[resource].resource_type()))
            .collect()
    };
    let mut shared = a.reads.intersection(&b.reads).copied().collect::<Vec<_>>();
    shared.sort_unstable();
    shared.into_iter().find(|resource| {
        let required = states(a, *resource);
        // Only one of the queues records the transition, the other one would read without a barrier.
        required != states(b, *resource)
            || required.iter().any(|state| entry_states[*resource] != Some(*state))
    })
}

/// Partition the surviving passes into timeline segments.
///
/// A new segment starts at every sync point. Passes in one segment on different queues must not race on a resource.
/// Reading a resource on two queues of one segment only counts as a race if the resource needs a transition first.
/// With [`CrossQueuePolicy::Reject`] such a race fails with [`Error::CrossQueueHazard`], with
/// [`CrossQueuePolicy::AutoSync`] the offending pass starts a new segment. Empty segments are dropped.
pub(crate) fn schedule(
    compiled: &mut CompiledGraph,
    resources: &[VirtualResource],
    passes: &[Pass],
    sync_points: &[usize],
    policy: CrossQueuePolicy,
) -> Result<()> {
    let mut segments = Vec::new();
    let mut current = Segment::default();
    // Transient resources have no defined contents until a pass used them.
    let mut states = resources
        .iter()
        .map(|resource| resource.is_imported().then(|| resource.initial_state()))
        .collect::<Vec<_>>();
    let mut entry_states = states.clone();

    for (index, pass) in passes.iter().enumerate() {
        if sync_points.contains(&index) && !current.is_empty() {
            segments.push(std::mem::take(&mut current));
            entry_states.clone_from(&states);
        }
        if compiled.culled_passes[index] {
            continue;
        }

        let conflict = current
            .queues
            .iter()
            .filter(|(queue, _)| *queue != pass.queue)
            .flat_map(|(_, others)| others.iter())
            .find_map(|other| {
                conflicting_resource(&compiled.passes[*other], &compiled.passes[index], resources, &entry_states)
                    .map(|r| (*other, r))
            });

        if let Some((other, resource)) = conflict {
            match policy {
                CrossQueuePolicy::Reject => {
                    return Err(Error::CrossQueueHazard {
                        resource: resources[resource].name().to_string(),
                        first: passes[other].name.clone(),
                        first_queue: passes[other].queue,
                        second: pass.name.clone(),
                        second_queue: pass.queue,
                    }
                    .into());
                }
                CrossQueuePolicy::AutoSync => {
                    debug!(
                        "Pass `{}` races with pass `{}` on resource `{}`, starting a new timeline segment",
                        pass.name,
                        passes[other].name,
                        resources[resource].name()
                    );
                    segments.push(std::mem::take(&mut current));
                    entry_states.clone_from(&states);
                }
            }
        }
        current.push(pass.queue, index);
        for (resource, usage) in &compiled.passes[index].accesses {
            states[*resource] = Some(usage.required_state(resources[*resource].resource_type()));
        }
    }
    if !current.is_empty() {
        segments.push(current);
    }

    compiled.positions.clear();
    for (segment_index, segment) in segments.iter().enumerate() {
        for (queue, queue_passes) in &segment.queues {
            for (index, pass) in queue_passes.iter().enumerate() {
                compiled.positions.insert(
                    *pass,
                    SchedulePosition {
                        segment: segment_index,
                        queue: *queue,
                        index,
                    },
                );
            }
        }
    }
    compiled.segments = segments;
    compute_lifetimes(compiled);
    Ok(())
}

fn compute_lifetimes(compiled: &mut CompiledGraph) {
    for (resource, users) in compiled.users.iter_all() {
        let positions = users
            .iter()
            .filter_map(|pass| compiled.positions.get(pass))
            .copied()
            .collect::<Vec<_>>();
        let (Some(first), Some(last)) = (positions.iter().min(), positions.iter().max()) else { continue };
        let single_queue = positions
            .iter()
            .all(|p| p.segment == first.segment && p.queue == first.queue);
        compiled.lifetimes[*resource] = Some(Lifetime {
            first: *first,
            last: *last,
            single_queue,
        });
    }
}

/// Build the dependency graph over the surviving passes. Edges always point from an earlier to a later declared pass.
/// # Errors
/// * Fails with [`Error::GraphHasCycle`] if declaration order is not a topological order of the graph.
pub(crate) fn build_dependency_graph(
    compiled: &mut CompiledGraph,
    resources: &[VirtualResource],
    passes: &[Pass],
) -> Result<()> {
    let mut graph = DependencyGraph::default();
    let mut nodes: HashMap<usize, NodeIndex> = HashMap::new();
    for (index, pass) in passes.iter().enumerate() {
        if compiled.culled_passes[index] {
            continue;
        }
        let node = graph.add_pass(PassNode {
            pass: index,
            name: pass.name.clone(),
            queue: pass.queue,
        });
        nodes.insert(index, node);
    }

    for (resource, users) in compiled.users.iter_all() {
        let mut last_writer: Option<usize> = None;
        let mut readers: Vec<usize> = vec![];
        for pass in users.iter().copied().filter(|pass| !compiled.culled_passes[*pass]) {
            let accesses = &compiled.passes[pass];
            let reads = accesses.reads.contains(resource);
            let writes = accesses.writes.contains(resource);
            let mut edge = |from: usize, kind: DependencyKind| {
                graph.add_dependency(
                    nodes[&from],
                    nodes[&pass],
                    Dependency {
                        resource: resources[*resource].name().to_string(),
                        kind,
                        cross_queue: passes[from].queue != passes[pass].queue,
                    },
                );
            };

            if reads {
                if let Some(writer) = last_writer {
                    edge(writer, DependencyKind::ReadAfterWrite);
                }
            }
            if writes {
                let earlier_readers = readers.iter().copied().filter(|reader| *reader != pass).collect::<Vec<_>>();
                for reader in &earlier_readers {
                    edge(*reader, DependencyKind::WriteAfterRead);
                }
                if let (false, true, Some(writer)) = (reads, earlier_readers.is_empty(), last_writer) {
                    edge(writer, DependencyKind::WriteAfterWrite);
                }
                last_writer = Some(pass);
                readers.clear();
            } else if reads {
                readers.push(pass);
            }
        }
    }

    if is_cyclic_directed(&graph.graph) {
        return Err(Error::GraphHasCycle.into());
    }
    compiled.dependencies = graph;
    Ok(())
}
