use std::cell::RefCell;

use anyhow::Result;

use framegraph::prelude::*;

mod framework;

#[test]
pub fn passes_without_observable_output_are_culled() -> Result<()> {
    let context = framework::make_context()?;
    let executed = RefCell::new(vec![]);
    let mut graph = PassGraph::new(&context.graph);
    let a = graph.create_buffer(framework::buffer_desc("a", 64))?;
    let b = graph.create_buffer(framework::buffer_desc("b", 64))?;
    let c = graph.create_buffer(framework::buffer_desc("c", 64))?;
    graph.mark_as_used(b)?;

    graph.add_copy_pass("produce a", CopyPassDesc::new().dst(a), |_, _| {
        executed.borrow_mut().push("produce a");
        Ok(())
    })?;
    graph.add_copy_pass("a to b", CopyPassDesc::new().src(a).dst(b), |_, _| {
        executed.borrow_mut().push("a to b");
        Ok(())
    })?;
    graph.add_copy_pass("a to c", CopyPassDesc::new().src(a).dst(c), |_, _| {
        executed.borrow_mut().push("a to c");
        Ok(())
    })?;
    graph.execute(&GraphExecuteInfo::default())?;

    assert_eq!(graph.culled_passes(), vec!["a to c"]);
    assert!(!graph.is_culled(a)?);
    assert!(!graph.is_culled(b)?);
    assert!(graph.is_culled(c)?);
    assert_eq!(
        framework::error_of(graph.physical_bindings()?.buffer(c)),
        Error::ResourceCulled("c".to_string())
    );
    drop(graph);
    assert_eq!(*executed.borrow(), vec!["produce a", "a to b"]);
    Ok(())
}

#[test]
pub fn culling_propagates_through_chains() -> Result<()> {
    let context = framework::make_context()?;
    let mut graph = PassGraph::new(&context.graph);
    let a = graph.create_buffer(framework::buffer_desc("a", 64))?;
    let b = graph.create_buffer(framework::buffer_desc("b", 64))?;
    let c = graph.create_buffer(framework::buffer_desc("c", 64))?;
    graph.add_copy_pass("first", CopyPassDesc::new().dst(a), |_, _| Ok(()))?;
    graph.add_copy_pass("second", CopyPassDesc::new().src(a).dst(b), |_, _| Ok(()))?;
    graph.add_copy_pass("third", CopyPassDesc::new().src(b).dst(c), |_, _| Ok(()))?;
    graph.execute(&GraphExecuteInfo::default())?;

    // Nothing is observable, so the whole chain goes.
    assert_eq!(graph.culled_passes(), vec!["first", "second", "third"]);
    assert_eq!(graph.physical_bindings()?.slot_count(), 0);
    assert_eq!(context.graph.buffer_pool().size(), 0);
    // An empty graph still makes one submission.
    assert_eq!(context.device.submissions().len(), 1);
    Ok(())
}

#[test]
pub fn imported_resources_keep_their_writers() -> Result<()> {
    let context = framework::make_context()?;
    let output = context.device.create_buffer(&framework::buffer_desc("output", 64))?;
    let unused = context.device.create_buffer(&framework::buffer_desc("unused", 64))?;
    let mut graph = PassGraph::new(&context.graph);
    let scratch = graph.create_buffer(framework::buffer_desc("scratch", 64))?;
    let output = graph.import_buffer(output, BufferState::Undefined)?;
    let unused = graph.import_buffer(unused, BufferState::Undefined)?;
    graph.add_copy_pass("fill", CopyPassDesc::new().dst(scratch), |_, _| Ok(()))?;
    graph.add_copy_pass("write", CopyPassDesc::new().src(scratch).dst(output), |_, _| Ok(()))?;
    graph.execute(&GraphExecuteInfo::default())?;

    assert!(graph.culled_passes().is_empty());
    assert!(!graph.is_culled(output)?);
    // Imported resources are never culled, even without a pass using them.
    assert!(!graph.is_culled(unused)?);
    assert!(graph.physical_bindings()?.buffer(unused).is_ok());
    Ok(())
}

#[test]
pub fn passes_without_writes_are_culled() -> Result<()> {
    let context = framework::make_context()?;
    let layout = context
        .device
        .create_bind_group_layout([("input", framework::binding(BindingType::Texture, 0))]);
    let texture = context.device.create_texture(&framework::texture_desc("input"))?;
    let mut graph = PassGraph::new(&context.graph);
    let input = graph.import_texture(texture, TextureState::ShaderReadOnly)?;
    let view = graph.create_texture_view(input, TextureViewCreateInfo::default())?;
    let group = graph.allocate_bind_group(BindGroupDesc::new(layout).name("inputs").texture("input", view)?)?;
    graph.add_compute_pass("read only", &[group], |_, _| Ok(()))?;
    graph.execute(&GraphExecuteInfo::default())?;

    assert_eq!(graph.culled_passes(), vec!["read only"]);
    // Bind groups are only created for passes that survive.
    assert_eq!(
        framework::error_of(graph.physical_bindings()?.bind_group(group)),
        Error::ResourceCulled("inputs".to_string())
    );
    Ok(())
}

#[test]
pub fn culling_can_be_disabled() -> Result<()> {
    let context = framework::make_context_with_settings(|settings| settings.cull_passes(false))?;
    let mut graph = PassGraph::new(&context.graph);
    let a = graph.create_buffer(framework::buffer_desc("a", 64))?;
    let b = graph.create_buffer(framework::buffer_desc("b", 64))?;
    let never_used = graph.create_buffer(framework::buffer_desc("never used", 64))?;
    let forced = graph.create_buffer(framework::buffer_desc("forced", 32))?;
    graph.mark_as_used(forced)?;
    graph.add_copy_pass("first", CopyPassDesc::new().dst(a), |_, _| Ok(()))?;
    graph.add_copy_pass("second", CopyPassDesc::new().src(a).dst(b), |_, _| Ok(()))?;
    graph.execute(&GraphExecuteInfo::default())?;

    assert!(graph.culled_passes().is_empty());
    assert!(!graph.is_culled(b)?);
    // Resources no pass touches are still not allocated.
    assert!(graph.is_culled(never_used)?);
    // Unless they are explicitly used.
    assert!(!graph.is_culled(forced)?);
    assert!(graph.physical_bindings()?.buffer(forced).is_ok());
    Ok(())
}
