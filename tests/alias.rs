use anyhow::Result;

use framegraph::prelude::*;
use framegraph::rhi::dummy::Command;

mod framework;

struct Declared {
    first: BufferRef,
    second: BufferRef,
}

/// Two transient buffers with equal descriptors, each written and then read by a copy into a differently sized output.
fn declare_disjoint(graph: &mut PassGraph, overlapping: bool) -> Result<Declared> {
    let first = graph.create_buffer(framework::buffer_desc("first", 64))?;
    let second = graph.create_buffer(framework::buffer_desc("second", 64))?;
    let first_out = graph.create_buffer(framework::buffer_desc("first out", 32))?;
    let second_out = graph.create_buffer(framework::buffer_desc("second out", 48))?;
    graph.mark_as_used(first_out)?;
    graph.mark_as_used(second_out)?;

    graph.add_copy_pass("fill first", CopyPassDesc::new().dst(first), |_, _| Ok(()))?;
    if overlapping {
        graph.add_copy_pass("fill second", CopyPassDesc::new().dst(second), |_, _| Ok(()))?;
        graph.add_copy_pass("read first", CopyPassDesc::new().src(first).dst(first_out), |_, _| Ok(()))?;
    } else {
        graph.add_copy_pass("read first", CopyPassDesc::new().src(first).dst(first_out), |_, _| Ok(()))?;
        graph.add_copy_pass("fill second", CopyPassDesc::new().dst(second), |_, _| Ok(()))?;
    }
    graph.add_copy_pass("read second", CopyPassDesc::new().src(second).dst(second_out), |_, _| Ok(()))?;
    Ok(Declared {
        first,
        second,
    })
}

#[test]
pub fn disjoint_lifetimes_share_memory() -> Result<()> {
    let context = framework::make_context()?;
    let mut graph = PassGraph::new(&context.graph);
    let declared = declare_disjoint(&mut graph, false)?;
    graph.execute(&GraphExecuteInfo::default())?;

    let bindings = graph.physical_bindings()?;
    let first = bindings.buffer(declared.first)?.native_handle();
    let second = bindings.buffer(declared.second)?.native_handle();
    assert_eq!(first, second);
    assert_eq!(bindings.slot_count(), 3);
    assert_eq!(context.graph.buffer_pool().size(), 3);

    // The second buffer continues from the state the first one left the memory in.
    assert_eq!(
        framework::buffer_transitions(&context.device.commands(), first),
        vec![
            (BufferState::Undefined, BufferState::CopyDst),
            (BufferState::CopyDst, BufferState::CopySrc),
            (BufferState::CopySrc, BufferState::CopyDst),
            (BufferState::CopyDst, BufferState::CopySrc),
        ]
    );
    Ok(())
}

#[test]
pub fn aliasing_can_be_disabled() -> Result<()> {
    let context = framework::make_context_with_settings(|settings| settings.alias_resources(false))?;
    let mut graph = PassGraph::new(&context.graph);
    let declared = declare_disjoint(&mut graph, false)?;
    graph.execute(&GraphExecuteInfo::default())?;

    let bindings = graph.physical_bindings()?;
    assert_ne!(bindings.buffer(declared.first)?.native_handle(), bindings.buffer(declared.second)?.native_handle());
    assert_eq!(bindings.slot_count(), 4);
    Ok(())
}

#[test]
pub fn overlapping_lifetimes_are_not_aliased() -> Result<()> {
    let context = framework::make_context()?;
    let mut graph = PassGraph::new(&context.graph);
    let declared = declare_disjoint(&mut graph, true)?;
    graph.execute(&GraphExecuteInfo::default())?;

    let bindings = graph.physical_bindings()?;
    assert_ne!(bindings.buffer(declared.first)?.native_handle(), bindings.buffer(declared.second)?.native_handle());
    assert_eq!(bindings.slot_count(), 4);
    Ok(())
}

#[test]
pub fn force_used_resources_are_not_aliased() -> Result<()> {
    let context = framework::make_context()?;
    let output = context.device.create_buffer(&framework::buffer_desc("output", 64))?;
    let mut graph = PassGraph::new(&context.graph);
    let readback = graph.create_buffer(framework::buffer_desc("readback", 64))?;
    let scratch = graph.create_buffer(framework::buffer_desc("scratch", 64))?;
    let output = graph.import_buffer(output, BufferState::Undefined)?;
    graph.mark_as_used(readback)?;

    graph.add_copy_pass("fill readback", CopyPassDesc::new().dst(readback), |_, _| Ok(()))?;
    graph.add_copy_pass("fill scratch", CopyPassDesc::new().dst(scratch), |_, _| Ok(()))?;
    graph.add_copy_pass("copy scratch", CopyPassDesc::new().src(scratch).dst(output), |_, _| Ok(()))?;
    graph.execute(&GraphExecuteInfo::default())?;

    assert!(!graph.is_culled(readback)?);
    let bindings = graph.physical_bindings()?;
    assert_ne!(bindings.buffer(readback)?.native_handle(), bindings.buffer(scratch)?.native_handle());
    assert_eq!(bindings.slot_count(), 3);
    Ok(())
}

#[test]
pub fn upload_targets_get_fresh_memory() -> Result<()> {
    let context = framework::make_context()?;
    let desc = BufferCreateInfo::new("staging", 64, BufferUsageFlags::MAP_WRITE | BufferUsageFlags::COPY_SRC | BufferUsageFlags::COPY_DST);
    let mut graph = PassGraph::new(&context.graph);
    let first = graph.create_buffer(desc.clone())?;
    let second = graph.create_buffer(desc)?;
    let first_out = graph.create_buffer(framework::buffer_desc("first out", 32))?;
    let second_out = graph.create_buffer(framework::buffer_desc("second out", 48))?;
    graph.mark_as_used(first_out)?;
    graph.mark_as_used(second_out)?;
    graph.queue_buffer_upload(
        second,
        BufferUploadInfo {
            data: vec![7; 16],
            dst_offset: 0,
        },
    )?;
    graph.add_copy_pass("fill first", CopyPassDesc::new().dst(first), |_, _| Ok(()))?;
    graph.add_copy_pass("read first", CopyPassDesc::new().src(first).dst(first_out), |_, _| Ok(()))?;
    graph.add_copy_pass("read second", CopyPassDesc::new().src(second).dst(second_out), |_, _| Ok(()))?;
    graph.execute(&GraphExecuteInfo::default())?;

    let bindings = graph.physical_bindings()?;
    assert_ne!(bindings.buffer(first)?.native_handle(), bindings.buffer(second)?.native_handle());
    Ok(())
}

#[test]
pub fn uploads_are_written_before_recording() -> Result<()> {
    let context = framework::make_context()?;
    let staging = context.device.create_dummy_buffer(&BufferCreateInfo::new(
        "staging",
        16,
        BufferUsageFlags::MAP_WRITE | BufferUsageFlags::COPY_SRC,
    ))?;
    let output = context.device.create_buffer(&framework::buffer_desc("output", 16))?;
    let staging_handle = staging.native_handle();

    let mut graph = PassGraph::new(&context.graph);
    let source = graph.import_buffer(staging.clone(), BufferState::Staging)?;
    let output = graph.import_buffer(output, BufferState::Undefined)?;
    graph.queue_buffer_upload(
        source,
        BufferUploadInfo {
            data: vec![1, 2, 3, 4],
            dst_offset: 4,
        },
    )?;
    graph.add_copy_pass("copy", CopyPassDesc::new().src(source).dst(output), move |bindings, pass| {
        let src = bindings.buffer(source)?;
        let dst = bindings.buffer(output)?;
        pass.copy_buffer_to_buffer(src.as_ref(), 0, dst.as_ref(), 0, 16);
        Ok(())
    })?;
    graph.execute(&GraphExecuteInfo::default())?;

    assert_eq!(staging.contents()[..8], [0, 0, 0, 0, 1, 2, 3, 4]);
    let commands = context.device.commands();
    let map = framework::position_of(&commands, |c| {
        *c == Command::Map {
            buffer: staging_handle,
            offset: 4,
            length: 4,
        }
    });
    let unmap = framework::position_of(&commands, |c| {
        *c == Command::Unmap {
            buffer: staging_handle,
        }
    });
    let begin = framework::position_of(&commands, |c| matches!(c, Command::Begin { .. }));
    assert!(map.is_some());
    assert!(map < unmap);
    assert!(unmap < begin);
    assert_eq!(
        framework::buffer_transitions(&commands, staging_handle),
        vec![
            (BufferState::Staging, BufferState::CopySrc),
            (BufferState::CopySrc, BufferState::Staging)
        ]
    );
    Ok(())
}

#[test]
pub fn uploads_into_culled_buffers_are_skipped() -> Result<()> {
    let context = framework::make_context()?;
    let mut graph = PassGraph::new(&context.graph);
    let unused = graph.create_buffer(BufferCreateInfo::new("unused", 16, BufferUsageFlags::MAP_WRITE))?;
    graph.queue_buffer_upload(
        unused,
        BufferUploadInfo {
            data: vec![1; 16],
            dst_offset: 0,
        },
    )?;
    graph.execute(&GraphExecuteInfo::default())?;

    assert!(graph.is_culled(unused)?);
    assert!(!context
        .device
        .commands()
        .iter()
        .any(|c| matches!(c, Command::Map { .. } | Command::CreateBuffer { .. })));
    Ok(())
}
