use anyhow::Result;

use framegraph::prelude::*;
use framegraph::rhi::dummy::Command;
use framegraph::rhi::QueueType as HardwareQueue;

mod framework;

/// Unpack a submission from the command log as (queue, has command buffer, waits, signals).
fn unpack(submission: &Command) -> (HardwareQueue, bool, Vec<u64>, Vec<u64>) {
    match submission {
        Command::Submit {
            queue,
            cmd,
            wait,
            signal,
            ..
        } => (*queue, cmd.is_some(), wait.clone(), signal.clone()),
        other => panic!("Expected a submission, got {other:?}"),
    }
}

fn layout(context: &framework::Context, bindings: &[(&str, BindingType)]) -> std::sync::Arc<dyn BindGroupLayout> {
    context.device.create_bind_group_layout(
        bindings
            .iter()
            .enumerate()
            .map(|(index, (name, ty))| (*name, framework::binding(*ty, index as u32))),
    )
}

/// Declares an async copy pass writing `a`, followed by an async compute pass reading `a` and writing `output`.
fn declare_upload_and_consume<'a>(graph: &mut PassGraph<'a>, context: &framework::Context, sync: bool) -> Result<()> {
    let output = context.device.create_buffer(&framework::buffer_desc("output", 64))?;
    let a = graph.create_buffer(framework::buffer_desc("a", 64))?;
    let output = graph.import_buffer(output, BufferState::Undefined)?;
    let input_view = graph.create_buffer_view(a, BufferViewCreateInfo::default())?;
    let output_view = graph.create_buffer_view(output, BufferViewCreateInfo::default())?;
    let group = graph.allocate_bind_group(
        BindGroupDesc::new(layout(context, &[("input", BindingType::StorageBuffer), ("output", BindingType::RwStorageBuffer)]))
            .storage_buffer("input", input_view)?
            .rw_storage_buffer("output", output_view)?,
    )?;

    graph.add_pass(PassBuilder::copy("upload", CopyPassDesc::new().dst(a), |_, _| Ok(())).async_copy()?.build())?;
    if sync {
        graph.add_sync_point()?;
    }
    graph.add_pass(
        PassBuilder::compute("consume", |_, _| Ok(()))
            .bind_group(group)?
            .async_compute()?
            .build(),
    )?;
    Ok(())
}

/// Declares a compute pass on the main queue and one on the async compute queue, both reading `source` as a storage
/// buffer and writing their own imported output.
fn declare_shared_reads<'a>(graph: &mut PassGraph<'a>, context: &framework::Context, source: BufferRef) -> Result<()> {
    let source_view = graph.create_buffer_view(source, BufferViewCreateInfo::default())?;
    for (name, async_compute) in [("read on main", false), ("read on compute", true)] {
        let output = context.device.create_buffer(&framework::buffer_desc(&format!("{name} output"), 64))?;
        let output = graph.import_buffer(output, BufferState::Undefined)?;
        let output_view = graph.create_buffer_view(output, BufferViewCreateInfo::default())?;
        let group = graph.allocate_bind_group(
            BindGroupDesc::new(layout(context, &[("input", BindingType::StorageBuffer), ("output", BindingType::RwStorageBuffer)]))
                .storage_buffer("input", source_view)?
                .rw_storage_buffer("output", output_view)?,
        )?;
        let mut builder = PassBuilder::compute(name, |_, _| Ok(())).bind_group(group)?;
        if async_compute {
            builder = builder.async_compute()?;
        }
        graph.add_pass(builder.build())?;
    }
    Ok(())
}

/// Fills the transient buffer `a` on the main queue, then reads it from two queues after a sync point.
fn declare_fill_and_shared_reads<'a>(graph: &mut PassGraph<'a>, context: &framework::Context) -> Result<BufferRef> {
    let a = graph.create_buffer(framework::buffer_desc("a", 64))?;
    graph.add_copy_pass("fill", CopyPassDesc::new().dst(a), |_, _| Ok(()))?;
    graph.add_sync_point()?;
    declare_shared_reads(graph, context, a)?;
    Ok(a)
}

#[test]
pub fn segments_are_chained_with_semaphores() -> Result<()> {
    let context = framework::make_context()?;
    let wait = context.device.create_semaphore()?;
    let signal = context.device.create_semaphore()?;
    let fence = context.device.create_fence(false)?;
    let final_output = context.device.create_buffer(&framework::buffer_desc("final", 64))?;

    let mut graph = PassGraph::new(&context.graph);
    declare_upload_and_consume(&mut graph, &context, true)?;
    let final_output = graph.import_buffer(final_output, BufferState::Undefined)?;
    let output = graph.create_buffer(framework::buffer_desc("intermediate", 64))?;
    graph.add_sync_point()?;
    // Adding a second sync point at the same position changes nothing.
    graph.add_sync_point()?;
    graph.add_copy_pass("produce", CopyPassDesc::new().dst(output), |_, _| Ok(()))?;
    graph.add_copy_pass("finish", CopyPassDesc::new().src(output).dst(final_output), |_, _| Ok(()))?;
    graph.execute(&GraphExecuteInfo {
        wait_semaphores: vec![wait.clone()],
        signal_semaphores: vec![signal.clone()],
        signal_fence: Some(fence.clone()),
    })?;

    assert_eq!(graph.command_buffer_count(), 3);
    let submissions = context.device.submissions();
    assert_eq!(submissions.len(), 3);
    let (copy_queue, copy_cmd, copy_wait, copy_signal) = unpack(&submissions[0]);
    let (compute_queue, compute_cmd, compute_wait, compute_signal) = unpack(&submissions[1]);
    let (main_queue, main_cmd, main_wait, main_signal) = unpack(&submissions[2]);

    assert_eq!((copy_queue, compute_queue, main_queue), (HardwareQueue::Transfer, HardwareQueue::Compute, HardwareQueue::Graphics));
    assert!(copy_cmd && compute_cmd && main_cmd);
    assert_eq!(copy_wait, vec![wait.native_handle()]);
    assert_eq!(copy_signal.len(), 1);
    assert_eq!(compute_wait, copy_signal);
    assert_eq!(compute_signal.len(), 1);
    assert_eq!(main_wait, compute_signal);
    assert_eq!(main_signal, vec![signal.native_handle()]);
    assert!(matches!(&submissions[2], Command::Submit { fence: Some(f), .. } if *f == fence.native_handle()));
    assert!(fence.is_signaled());
    Ok(())
}

#[test]
pub fn concurrent_queues_fork_and_join() -> Result<()> {
    let context = framework::make_context()?;
    let wait = context.device.create_semaphore()?;
    let signal = context.device.create_semaphore()?;
    let streamed = context.device.create_buffer(&framework::buffer_desc("streamed", 64))?;
    let simulated = context.device.create_buffer(&framework::buffer_desc("simulated", 64))?;

    let mut graph = PassGraph::new(&context.graph);
    let streamed = graph.import_buffer(streamed, BufferState::Undefined)?;
    let simulated = graph.import_buffer(simulated, BufferState::Undefined)?;
    let view = graph.create_buffer_view(simulated, BufferViewCreateInfo::default())?;
    let group = graph.allocate_bind_group(
        BindGroupDesc::new(layout(&context, &[("particles", BindingType::RwStorageBuffer)])).rw_storage_buffer("particles", view)?,
    )?;
    graph.add_pass(PassBuilder::copy("stream", CopyPassDesc::new().dst(streamed), |_, _| Ok(())).async_copy()?.build())?;
    graph.add_pass(
        PassBuilder::compute("simulate", |_, _| Ok(()))
            .bind_group(group)?
            .async_compute()?
            .build(),
    )?;
    graph.execute(&GraphExecuteInfo {
        wait_semaphores: vec![wait.clone()],
        signal_semaphores: vec![signal.clone()],
        signal_fence: None,
    })?;

    let submissions = context.device.submissions();
    assert_eq!(submissions.len(), 4);
    let (fork_queue, fork_cmd, fork_wait, fork_signal) = unpack(&submissions[0]);
    let (compute_queue, _, compute_wait, compute_signal) = unpack(&submissions[1]);
    let (copy_queue, _, copy_wait, copy_signal) = unpack(&submissions[2]);
    let (join_queue, join_cmd, join_wait, join_signal) = unpack(&submissions[3]);

    assert_eq!(fork_queue, HardwareQueue::Graphics);
    assert!(!fork_cmd);
    assert_eq!(fork_wait, vec![wait.native_handle()]);
    assert_eq!(fork_signal.len(), 2);
    assert_eq!(compute_queue, HardwareQueue::Compute);
    assert_eq!(copy_queue, HardwareQueue::Transfer);
    assert_eq!(compute_wait, vec![fork_signal[0]]);
    assert_eq!(copy_wait, vec![fork_signal[1]]);

    assert_eq!(join_queue, HardwareQueue::Graphics);
    assert!(!join_cmd);
    assert_eq!(join_wait, [compute_signal, copy_signal].concat());
    assert_eq!(join_signal, vec![signal.native_handle()]);
    Ok(())
}

#[test]
pub fn cross_queue_hazards_are_rejected() -> Result<()> {
    let context = framework::make_context()?;
    let mut graph = PassGraph::new(&context.graph);
    declare_upload_and_consume(&mut graph, &context, false)?;

    let error = framework::error_of(graph.execute(&GraphExecuteInfo::default()));
    assert_eq!(
        error,
        Error::CrossQueueHazard {
            resource: "a".to_string(),
            first: "upload".to_string(),
            first_queue: QueueType::AsyncCopy,
            second: "consume".to_string(),
            second_queue: QueueType::AsyncCompute,
        }
    );
    assert_eq!(graph.state(), GraphState::Culling);
    assert!(context.device.submissions().is_empty());
    assert_eq!(framework::error_of(graph.execute(&GraphExecuteInfo::default())), Error::AlreadyExecuted);
    Ok(())
}

#[test]
pub fn sync_points_resolve_hazards() -> Result<()> {
    let context = framework::make_context()?;
    let mut graph = PassGraph::new(&context.graph);
    declare_upload_and_consume(&mut graph, &context, true)?;
    graph.execute(&GraphExecuteInfo::default())?;

    // The last segment runs on the compute queue, so an empty main queue submission joins it.
    assert_eq!(context.device.submissions().len(), 3);
    let dependencies = graph.dependency_graph().expect("Graph should be compiled");
    assert_eq!(dependencies.cross_queue_count(), 1);
    assert!(dependencies.dot()?.contains("dashed"));
    Ok(())
}

#[test]
pub fn hazards_can_be_synchronized_automatically() -> Result<()> {
    let context = framework::make_context_with_settings(|settings| settings.cross_queue_policy(CrossQueuePolicy::AutoSync))?;
    let mut graph = PassGraph::new(&context.graph);
    declare_upload_and_consume(&mut graph, &context, false)?;
    graph.execute(&GraphExecuteInfo::default())?;

    let submissions = context.device.submissions();
    assert_eq!(submissions.len(), 3);
    assert_eq!(unpack(&submissions[0]).0, HardwareQueue::Transfer);
    assert_eq!(unpack(&submissions[1]).0, HardwareQueue::Compute);
    assert_eq!(unpack(&submissions[2]).0, HardwareQueue::Graphics);
    // The compute queue waits for the copy queue.
    assert_eq!(unpack(&submissions[1]).2, unpack(&submissions[0]).3);

    let dependencies = graph.dependency_graph().expect("Graph should be compiled");
    assert_eq!(dependencies.cross_queue_count(), 1);
    let edges = dependencies.dependencies_of("consume");
    assert!(edges
        .iter()
        .any(|(pass, dependency)| *pass == "upload" && dependency.kind == DependencyKind::ReadAfterWrite));
    Ok(())
}

#[test]
pub fn shared_reads_in_different_states_are_hazards() -> Result<()> {
    let context = framework::make_context()?;
    let output = context.device.create_buffer(&framework::buffer_desc("output", 64))?;
    let source = context.device.create_buffer(&framework::buffer_desc("source", 64))?;
    let mut graph = PassGraph::new(&context.graph);
    let source = graph.import_buffer(source, BufferState::CopySrc)?;
    let output = graph.import_buffer(output, BufferState::Undefined)?;
    let source_view = graph.create_buffer_view(source, BufferViewCreateInfo::default())?;
    let output_view = graph.create_buffer_view(output, BufferViewCreateInfo::default())?;
    let group = graph.allocate_bind_group(
        BindGroupDesc::new(layout(&context, &[("input", BindingType::UniformBuffer), ("output", BindingType::RwStorageBuffer)]))
            .uniform_buffer("input", source_view)?
            .rw_storage_buffer("output", output_view)?,
    )?;
    let scratch = graph.create_buffer(framework::buffer_desc("scratch", 64))?;
    graph.mark_as_used(scratch)?;
    graph.add_copy_pass("read on main", CopyPassDesc::new().src(source).dst(scratch), |_, _| Ok(()))?;
    graph.add_pass(
        PassBuilder::compute("read on compute", |_, _| Ok(()))
            .bind_group(group)?
            .async_compute()?
            .build(),
    )?;

    let error = framework::error_of(graph.execute(&GraphExecuteInfo::default()));
    assert!(matches!(error, Error::CrossQueueHazard { resource, .. } if resource == "source"));
    Ok(())
}

#[test]
pub fn shared_reads_needing_a_transition_are_hazards() -> Result<()> {
    let context = framework::make_context()?;
    let mut graph = PassGraph::new(&context.graph);
    declare_fill_and_shared_reads(&mut graph, &context)?;

    let error = framework::error_of(graph.execute(&GraphExecuteInfo::default()));
    assert_eq!(
        error,
        Error::CrossQueueHazard {
            resource: "a".to_string(),
            first: "read on main".to_string(),
            first_queue: QueueType::Main,
            second: "read on compute".to_string(),
            second_queue: QueueType::AsyncCompute,
        }
    );
    assert!(context.device.submissions().is_empty());
    Ok(())
}

#[test]
pub fn shared_reads_needing_a_transition_are_synchronized_automatically() -> Result<()> {
    let context = framework::make_context_with_settings(|settings| settings.cross_queue_policy(CrossQueuePolicy::AutoSync))?;
    let mut graph = PassGraph::new(&context.graph);
    let a = declare_fill_and_shared_reads(&mut graph, &context)?;
    graph.execute(&GraphExecuteInfo::default())?;

    // fill, read on main and read on compute each get their own segment. The last one is joined on the main queue.
    let submissions = context.device.submissions();
    assert_eq!(submissions.len(), 4);
    assert_eq!(unpack(&submissions[1]).0, HardwareQueue::Graphics);
    assert_eq!(unpack(&submissions[2]).0, HardwareQueue::Compute);
    // The compute read waits until the main queue transitioned `a`.
    assert_eq!(unpack(&submissions[2]).2, unpack(&submissions[1]).3);

    let handle = graph.physical_bindings()?.buffer(a)?.native_handle();
    assert_eq!(
        framework::buffer_transitions(&context.device.commands(), handle),
        vec![(BufferState::Undefined, BufferState::CopyDst), (BufferState::CopyDst, BufferState::Storage)]
    );
    Ok(())
}

#[test]
pub fn shared_reads_in_the_entry_state_run_concurrently() -> Result<()> {
    let context = framework::make_context()?;
    let source = context.device.create_buffer(&framework::buffer_desc("source", 64))?;
    let source_handle = source.native_handle();
    let mut graph = PassGraph::new(&context.graph);
    let source = graph.import_buffer(source, BufferState::Storage)?;
    declare_shared_reads(&mut graph, &context, source)?;
    graph.execute(&GraphExecuteInfo::default())?;

    let submissions = context.device.submissions();
    assert!(submissions.iter().any(|s| unpack(s).0 == HardwareQueue::Compute));
    assert!(submissions.iter().any(|s| unpack(s).0 == HardwareQueue::Graphics && unpack(s).1));
    assert!(framework::buffer_transitions(&context.device.commands(), source_handle).is_empty());
    let dependencies = graph.dependency_graph().expect("Graph should be compiled");
    assert_eq!(dependencies.cross_queue_count(), 0);
    Ok(())
}
