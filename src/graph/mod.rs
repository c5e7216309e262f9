//! The graph module holds the render graph. Each frame, passes and the resources they access are declared on a
//! [`PassGraph`](pass_graph::PassGraph). When the graph is executed, barriers between passes are derived from the declared
//! accesses, passes that contribute nothing are culled, and the surviving virtual resources are bound to pooled or
//! imported physical resources before the passes are recorded and submitted.
//!
//! All resources are declared as virtual resources and referred to by typed handles such as
//! [`BufferRef`](handle::BufferRef) and [`TextureRef`](handle::TextureRef). Pass callbacks resolve them to physical
//! resources through the [`PhysicalResourceBindings`](physical_resource::PhysicalResourceBindings) they receive.
//!
//! Passes run on one of three logical queues, see [`QueueType`]. Passes on different queues only synchronize at
//! sync points, added with [`PassGraph::add_sync_point`](pass_graph::PassGraph::add_sync_point). Everything between two
//! sync points forms a timeline segment.
//!
//! Through the [`GraphViz`](task_graph::GraphViz) trait, it's possible to export a graphviz-compatible dot file to display
//! the dependencies between the passes of an executed graph.
//!
//! # Example
//!
//! Rendering into a swapchain image. The image is imported in the `Present` state, and handed back in that state after
//! the last pass using it.
//! ```
//! # use std::sync::Arc;
//! # use framegraph::prelude::*;
//! # use framegraph::rhi::dummy::DummyDevice;
//! # let device = DummyDevice::new();
//! # let context = GraphContext::new(Arc::new(device.clone()), GraphSettings::default());
//! # let swapchain_image = device.create_texture(&TextureCreateInfo::new_2d("swapchain", 800, 600, Format::Bgra8Unorm, TextureUsageFlags::RENDER_ATTACHMENT))?;
//! let mut graph = PassGraph::new(&context);
//! let swapchain = graph.import_texture_with_final_state(swapchain_image, TextureState::Present, TextureState::Present)?;
//! let view = graph.create_texture_view(swapchain, TextureViewCreateInfo::new_2d(TextureViewType::ColorAttachment, TextureAspect::Color))?;
//! graph.add_raster_pass(
//!     "clear",
//!     RasterPassDesc::new().color_attachment(ColorAttachment::new(view).clear_value([0.1, 0.1, 0.1, 1.0])),
//!     &[],
//!     |_, _| Ok(()),
//! )?;
//! graph.execute(&GraphExecuteInfo::default())?;
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod bind_group;
pub mod handle;
pub mod pass;
pub mod pass_graph;
pub mod physical_resource;
pub mod resource;
pub mod task_graph;
pub mod virtual_resource;

pub(crate) mod analysis;
pub(crate) mod cull;
pub(crate) mod devirtualize;
pub(crate) mod record;

pub use devirtualize::BufferUploadInfo;
pub use pass::QueueType;
