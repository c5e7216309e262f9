//! Removes passes and resources that do not contribute to anything observable.
//!
//! Imported and force-used resources are observable. A pass survives if it writes a resource that survives, and every
//! resource read by a surviving pass survives. This is computed backwards over the passes in declaration order, using
//! the read counts from [`compile_pass_read_writes`](crate::graph::analysis::compile_pass_read_writes): a resource nobody
//! reads is culled, a pass whose writes are all culled (including a pass without writes) is culled and stops counting as
//! a reader of its inputs.

use crate::graph::analysis::CompiledGraph;
use crate::graph::pass::Pass;
use crate::graph::virtual_resource::VirtualResource;

/// Cull passes, then every resource no surviving pass touches. Imported and force-used resources are never culled.
pub(crate) fn cull(compiled: &mut CompiledGraph, resources: &[VirtualResource], passes: &[Pass]) {
    let mut read_counts = compiled.read_counts.clone();
    let mut unread = read_counts.iter().map(|count| *count == 0).collect::<Vec<_>>();

    for index in (0..passes.len()).rev() {
        let accesses = &compiled.passes[index];
        if !accesses.writes.iter().all(|write| unread[*write]) {
            continue;
        }
        compiled.culled_passes[index] = true;
        for read in &accesses.reads {
            read_counts[*read] -= 1;
            if read_counts[*read] == 0 {
                unread[*read] = true;
            }
        }
    }

    cull_unused_resources(compiled, resources);

    let culled = compiled.culled_passes.iter().filter(|culled| **culled).count();
    if culled > 0 {
        debug!(
            "Culled {} of {} passes and {} of {} resources",
            culled,
            passes.len(),
            compiled.culled_resources.iter().filter(|culled| **culled).count(),
            resources.len()
        );
    }
    for (index, pass) in passes.iter().enumerate() {
        if compiled.culled_passes[index] {
            trace!("Culled pass `{}`", pass.name);
        }
    }
}

/// Mark every resource that no surviving pass touches as culled, unless it is imported or force-used.
/// With culling disabled, this is the only thing that runs.
pub(crate) fn cull_unused_resources(compiled: &mut CompiledGraph, resources: &[VirtualResource]) {
    for (index, resource) in resources.iter().enumerate() {
        let used = compiled
            .users
            .get_vec(&index)
            .map(|users| users.iter().any(|pass| !compiled.culled_passes[*pass]))
            .unwrap_or(false);
        compiled.culled_resources[index] = !used && !resource.is_imported() && !resource.is_force_used();
        if !used && resource.is_imported() {
            warn!("Imported resource `{}` is never used", resource.name());
        }
    }
}
