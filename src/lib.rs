//! Per-frame render graph with automatic barriers, culling, resource pooling and multi-queue submission.
//!
//! Framegraph drives any graphics API that implements the traits in [`rhi`]. Every frame, the passes of that frame and the
//! resources they read and write are declared on a [`PassGraph`]. When the graph is executed, it
//! - culls passes whose results are never used,
//! - binds transient resources to pooled GPU resources, letting resources with disjoint lifetimes share memory,
//! - records every pass with the barriers it needs, and
//! - submits the work to up to three queues, synchronized with semaphores.
//!
//! To get started, the easiest way is to simply
//! ```
//! // Import all important types and traits
//! use framegraph::prelude::*;
//! ```
//!
//! # Example
//!
//! Pooled resources and cached views live in a [`GraphContext`], created once per device. The [`rhi::dummy`] device
//! used here records everything it is asked to do, instead of executing it.
//! ```
//! use std::sync::Arc;
//! use framegraph::prelude::*;
//! use framegraph::rhi::dummy::DummyDevice;
//!
//! let device = DummyDevice::new();
//! let settings = GraphSettingsBuilder::new()
//!     .pool_release_latency(3)
//!     .build();
//! let context = GraphContext::new(Arc::new(device.clone()), settings);
//!
//! for _frame in 0..3 {
//!     let mut graph = PassGraph::new(&context);
//!     let scratch = graph.create_buffer(BufferCreateInfo::new("scratch", 1024, BufferUsageFlags::COPY_DST | BufferUsageFlags::COPY_SRC))?;
//!     let readback = graph.create_buffer(BufferCreateInfo::new("readback", 1024, BufferUsageFlags::COPY_DST | BufferUsageFlags::MAP_READ))?;
//!     graph.mark_as_used(readback)?;
//!     graph.add_copy_pass("clear", CopyPassDesc::new().dst(scratch), |_, _| Ok(()))?;
//!     graph.add_copy_pass("readback", CopyPassDesc::new().src(scratch).dst(readback), |_, _| Ok(()))?;
//!     graph.execute(&GraphExecuteInfo::default())?;
//!     drop(graph);
//!     context.tick();
//! }
//! // Both buffers were created in the first frame, and reused afterwards.
//! assert_eq!(context.buffer_pool().size(), 2);
//! # Ok::<(), anyhow::Error>(())
//! ```
//!
//! For further example code, check out the following modules
//! - [`graph`] for declaring passes and resources.
//! - [`pool`] and [`cache`] for the resources reused across frames.
//! - [`sync`] for queue submission.
//! - [`rhi`] for the interface a graphics backend implements.

#[macro_use]
extern crate derivative;
#[macro_use]
extern crate log;

pub mod prelude;
pub use crate::prelude::*;

pub mod cache;
pub mod context;
pub mod core;
pub mod graph;
pub mod pool;
pub mod rhi;
pub mod sync;

static_assertions::assert_not_impl_any!(GraphContext: Sync);
static_assertions::assert_not_impl_any!(PassGraph<'static>: Sync, Send);
