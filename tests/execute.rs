use std::cell::RefCell;

use anyhow::{anyhow, Result};

use framegraph::prelude::*;
use framegraph::rhi::dummy::Command;
use framegraph::rhi::QueueType as HardwareQueue;

mod framework;

#[test]
pub fn compute_output_is_sampled_by_raster_pass() -> Result<()> {
    let context = framework::make_context()?;
    let device = &context.device;
    let storage_layout = device.create_bind_group_layout([("output", framework::binding(BindingType::StorageTexture, 0))]);
    let sampled_layout = device.create_bind_group_layout([("input", framework::binding(BindingType::Texture, 0))]);
    let pipeline = device.create_compute_pipeline();
    let target = device.create_texture(&framework::texture_desc("target"))?;

    let mut graph = PassGraph::new(&context.graph);
    let image = graph.create_texture(framework::texture_desc("image"))?;
    let storage = graph.create_texture_view(image, framework::storage_view())?;
    let sampled = graph.create_texture_view(image, TextureViewCreateInfo::default())?;
    let target = graph.import_texture(target, TextureState::Undefined)?;
    let target_view = graph.create_texture_view(target, framework::color_view())?;
    let write_group = graph.allocate_bind_group(BindGroupDesc::new(storage_layout).storage_texture("output", storage)?)?;
    let read_group = graph.allocate_bind_group(BindGroupDesc::new(sampled_layout).texture("input", sampled)?)?;

    graph.add_compute_pass("generate", &[write_group], move |bindings, pass| {
        pass.set_pipeline(pipeline.as_ref());
        pass.set_bind_group(0, bindings.bind_group(write_group)?.as_ref());
        pass.dispatch(16, 16, 1);
        Ok(())
    })?;
    graph.add_raster_pass(
        "present",
        RasterPassDesc::new().color_attachment(ColorAttachment::new(target_view)),
        &[read_group],
        move |bindings, pass| {
            pass.set_bind_group(0, bindings.bind_group(read_group)?.as_ref());
            pass.draw(3, 1, 0, 0);
            Ok(())
        },
    )?;
    graph.execute(&GraphExecuteInfo::default())?;

    let bindings = graph.physical_bindings()?;
    let image = bindings.texture(image)?.native_handle();
    let target = bindings.texture(target)?.native_handle();
    let commands = device.commands();
    assert_eq!(
        framework::texture_transitions(&commands, image),
        vec![
            (TextureState::Undefined, TextureState::Storage),
            (TextureState::Storage, TextureState::ShaderReadOnly)
        ]
    );
    assert_eq!(
        framework::texture_transitions(&commands, target),
        vec![(TextureState::Undefined, TextureState::RenderTarget)]
    );
    let dispatch = framework::position_of(&commands, |c| matches!(c, Command::Dispatch { .. }));
    let draw = framework::position_of(&commands, |c| matches!(c, Command::Draw { .. }));
    assert!(dispatch < draw);
    assert!(dispatch.is_some());

    // Both passes run on the main queue, in a single command buffer.
    assert_eq!(graph.command_buffer_count(), 1);
    let submissions = device.submissions();
    assert_eq!(submissions.len(), 1);
    assert!(matches!(
        &submissions[0],
        Command::Submit { queue: HardwareQueue::Graphics, cmd: Some(_), wait, signal, fence: None }
            if wait.is_empty() && signal.is_empty()
    ));
    assert_eq!(graph.state(), GraphState::Submitted);
    Ok(())
}

#[test]
pub fn compute_output_buffer_is_read_by_raster_pass() -> Result<()> {
    let context = framework::make_context()?;
    let device = &context.device;
    let write_layout = device.create_bind_group_layout([("particles", framework::binding(BindingType::RwStorageBuffer, 0))]);
    let read_layout = device.create_bind_group_layout([("particles", framework::binding(BindingType::UniformBuffer, 0))]);
    let target = device.create_texture(&framework::texture_desc("target"))?;

    let mut graph = PassGraph::new(&context.graph);
    let particles = graph.create_buffer(BufferCreateInfo::new(
        "particles",
        256,
        BufferUsageFlags::COPY_DST | BufferUsageFlags::STORAGE,
    ))?;
    let view = graph.create_buffer_view(particles, BufferViewCreateInfo::default())?;
    let target = graph.import_texture(target, TextureState::Undefined)?;
    let target_view = graph.create_texture_view(target, framework::color_view())?;
    let write_group = graph.allocate_bind_group(BindGroupDesc::new(write_layout).rw_storage_buffer("particles", view)?)?;
    let read_group = graph.allocate_bind_group(BindGroupDesc::new(read_layout).uniform_buffer("particles", view)?)?;

    graph.add_compute_pass("simulate", &[write_group], |_, pass| {
        pass.dispatch(4, 1, 1);
        Ok(())
    })?;
    graph.add_raster_pass(
        "draw particles",
        RasterPassDesc::new().color_attachment(ColorAttachment::new(target_view)),
        &[read_group],
        |_, pass| {
            pass.draw(256, 1, 0, 0);
            Ok(())
        },
    )?;
    graph.execute(&GraphExecuteInfo::default())?;

    let particles = graph.physical_bindings()?.buffer(particles)?.native_handle();
    let commands = context.device.commands();
    assert_eq!(
        framework::buffer_transitions(&commands, particles),
        vec![
            (BufferState::Undefined, BufferState::RwStorage),
            (BufferState::RwStorage, BufferState::ShaderReadOnly)
        ]
    );
    let dispatch = framework::position_of(&commands, |c| matches!(c, Command::Dispatch { .. }));
    let read_barrier = framework::position_of(&commands, |c| {
        *c == Command::BufferBarrier {
            buffer: particles,
            before: BufferState::RwStorage,
            after: BufferState::ShaderReadOnly,
        }
    });
    let draw = framework::position_of(&commands, |c| matches!(c, Command::Draw { .. }));
    assert!(dispatch.is_some());
    assert!(dispatch < read_barrier);
    assert!(read_barrier < draw);
    Ok(())
}

#[test]
pub fn imported_texture_is_returned_in_final_state() -> Result<()> {
    let context = framework::make_context()?;
    let device = &context.device;
    let swapchain = device.create_texture(&framework::texture_desc("swapchain"))?;
    let handle = swapchain.native_handle();
    let fence = device.create_fence(false)?;

    let mut graph = PassGraph::new(&context.graph);
    let swapchain = graph.import_texture_with_final_state(swapchain, TextureState::Present, TextureState::Present)?;
    let view = graph.create_texture_view(swapchain, framework::color_view())?;
    graph.add_raster_pass(
        "clear",
        RasterPassDesc::new().color_attachment(ColorAttachment::new(view).clear_value([0.0, 0.0, 0.0, 1.0])),
        &[],
        |_, _| Ok(()),
    )?;
    graph.execute(&GraphExecuteInfo {
        signal_fence: Some(fence.clone()),
        ..Default::default()
    })?;

    let commands = device.commands();
    assert_eq!(
        framework::texture_transitions(&commands, handle),
        vec![
            (TextureState::Present, TextureState::RenderTarget),
            (TextureState::RenderTarget, TextureState::Present)
        ]
    );
    let end_pass = framework::position_of(&commands, |c| *c == Command::EndPass);
    let returned = framework::position_of(&commands, |c| {
        *c == Command::TextureBarrier {
            texture: handle,
            before: TextureState::RenderTarget,
            after: TextureState::Present,
        }
    });
    assert!(end_pass.is_some());
    assert!(end_pass < returned);
    assert!(fence.is_signaled());
    assert!(matches!(&device.submissions()[0], Command::Submit { fence: Some(f), .. } if *f == fence.native_handle()));
    Ok(())
}

#[test]
pub fn hooks_run_around_the_pass() -> Result<()> {
    let context = framework::make_context()?;
    let order = RefCell::new(vec![]);
    let output = context.device.create_buffer(&framework::buffer_desc("output", 64))?;
    let mut graph = PassGraph::new(&context.graph);
    let output = graph.import_buffer(output, BufferState::Undefined)?;
    let pass = PassBuilder::copy("fill", CopyPassDesc::new().dst(output), |_, _| {
        order.borrow_mut().push("pass");
        Ok(())
    })
    .pre_execute(|_, _| {
        order.borrow_mut().push("pre");
        Ok(())
    })
    .post_execute(|_, _| {
        order.borrow_mut().push("post");
        Ok(())
    })
    .build();
    graph.add_pass(pass)?;
    graph.execute(&GraphExecuteInfo::default())?;
    drop(graph);

    assert_eq!(*order.borrow(), vec!["pre", "pass", "post"]);
    Ok(())
}

#[test]
pub fn callback_errors_abort_execution() -> Result<()> {
    let context = framework::make_context()?;
    let output = context.device.create_buffer(&framework::buffer_desc("output", 64))?;
    let mut graph = PassGraph::new(&context.graph);
    let output = graph.import_buffer(output, BufferState::Undefined)?;
    graph.add_copy_pass("broken", CopyPassDesc::new().dst(output), |_, _| Err(anyhow!("pipeline missing")))?;

    let error = graph.execute(&GraphExecuteInfo::default()).expect_err("Execution should fail");
    assert_eq!(error.to_string(), "pipeline missing");
    assert_eq!(graph.state(), GraphState::Recording);
    assert!(context.device.submissions().is_empty());
    assert_eq!(framework::error_of(graph.execute(&GraphExecuteInfo::default())), Error::AlreadyExecuted);
    Ok(())
}

#[test]
pub fn empty_graph_still_signals() -> Result<()> {
    let context = framework::make_context()?;
    let wait = context.device.create_semaphore()?;
    let signal = context.device.create_semaphore()?;
    let fence = context.device.create_fence(false)?;
    let mut graph = PassGraph::new(&context.graph);
    graph.execute(&GraphExecuteInfo {
        wait_semaphores: vec![wait.clone()],
        signal_semaphores: vec![signal.clone()],
        signal_fence: Some(fence.clone()),
    })?;

    assert_eq!(graph.command_buffer_count(), 0);
    assert_eq!(
        context.device.submissions(),
        vec![Command::Submit {
            queue: HardwareQueue::Graphics,
            cmd: None,
            wait: vec![wait.native_handle()],
            signal: vec![signal.native_handle()],
            fence: Some(fence.native_handle()),
        }]
    );
    assert!(fence.is_signaled());
    Ok(())
}

#[cfg(feature = "debug-markers")]
#[test]
pub fn debug_labels_wrap_passes() -> Result<()> {
    let context = framework::make_context()?;
    let output = context.device.create_buffer(&framework::buffer_desc("output", 64))?;
    let mut graph = PassGraph::new(&context.graph);
    let scratch = graph.create_buffer(framework::buffer_desc("scratch", 64))?;
    let output = graph.import_buffer(output, BufferState::Undefined)?;
    graph.add_copy_pass("fill", CopyPassDesc::new().dst(scratch), |_, _| Ok(()))?;
    graph.add_copy_pass("copy", CopyPassDesc::new().src(scratch).dst(output), |_, _| Ok(()))?;
    graph.execute(&GraphExecuteInfo::default())?;

    let commands = context.device.commands();
    assert_eq!(framework::recorded_passes(&commands), vec!["fill", "copy"]);
    let labels = commands.iter().filter(|c| **c == Command::PopDebugLabel).count();
    assert_eq!(labels, 2);
    Ok(())
}

#[test]
pub fn debug_labels_can_be_disabled() -> Result<()> {
    let context = framework::make_context_with_settings(|settings| settings.debug_labels(false))?;
    let output = context.device.create_buffer(&framework::buffer_desc("output", 64))?;
    let mut graph = PassGraph::new(&context.graph);
    let output = graph.import_buffer(output, BufferState::Undefined)?;
    graph.add_copy_pass("fill", CopyPassDesc::new().dst(output), |_, _| Ok(()))?;
    graph.execute(&GraphExecuteInfo::default())?;

    let commands = context.device.commands();
    assert!(framework::recorded_passes(&commands).is_empty());
    assert!(!commands.contains(&Command::PopDebugLabel));
    assert!(commands.contains(&Command::BeginCopyPass));
    Ok(())
}

#[test]
pub fn dependency_graph_exports_to_dot() -> Result<()> {
    let context = framework::make_context()?;
    let output = context.device.create_buffer(&framework::buffer_desc("output", 64))?;
    let mut graph = PassGraph::new(&context.graph);
    let staging = graph.create_buffer(framework::buffer_desc("staging", 64))?;
    let output = graph.import_buffer(output, BufferState::Undefined)?;
    graph.add_copy_pass("fill", CopyPassDesc::new().dst(staging), |_, _| Ok(()))?;
    graph.add_copy_pass("copy", CopyPassDesc::new().src(staging).dst(output), |_, _| Ok(()))?;
    graph.execute(&GraphExecuteInfo::default())?;

    let dependencies = graph.dependency_graph().expect("Graph should be compiled");
    let edges = dependencies.dependencies_of("copy");
    assert_eq!(edges.len(), 1);
    assert_eq!(edges[0].0, "fill");
    assert_eq!(edges[0].1.kind, DependencyKind::ReadAfterWrite);
    assert!(!edges[0].1.cross_queue);

    let dot = dependencies.dot()?;
    assert!(dot.contains("fill (Main)"));
    assert!(dot.contains("RAW staging"));
    assert!(!dot.contains("dashed"));
    Ok(())
}
