//! This module mainly exposes the [`PassBuilder`] struct, used for correctly defining passes in a
//! [`PassGraph`](crate::PassGraph).
//!
//! There are three kinds of passes. A copy pass declares the resources it copies from and to through a [`CopyPassDesc`].
//! A compute pass accesses resources only through its bind groups. A raster pass renders to the attachments in its
//! [`RasterPassDesc`], and can additionally access resources through bind groups. The graph derives every read and write
//! of a pass from these declarations, so a pass must declare everything it touches.
//!
//! Each pass stores a closure that is called when the pass is recorded. It receives the physical resources bound to the
//! graph and a recorder scoped to the pass type. Additionally, a color can be given to each pass
//! which will show up in debuggers like [*RenderDoc*](https://renderdoc.org/) if the `debug-markers` feature is enabled.
//!
//! # Example
//!
//! A compute pass that writes a storage texture on the async compute queue, followed by a raster pass on the main queue
//! that samples it.
//! ```
//! # use std::sync::Arc;
//! # use framegraph::prelude::*;
//! # use framegraph::rhi::dummy::DummyDevice;
//! # let device = DummyDevice::new();
//! # let context = GraphContext::new(Arc::new(device.clone()), GraphSettings::default());
//! # let layout = device.create_bind_group_layout([("image", ResourceBinding { ty: BindingType::StorageTexture, index: 0 })]);
//! # let sample_layout = device.create_bind_group_layout([("image", ResourceBinding { ty: BindingType::Texture, index: 0 })]);
//! let mut graph = PassGraph::new(&context);
//! let image = graph.create_texture(TextureCreateInfo::new_2d("image", 128, 128, Format::Rgba8Unorm,
//!     TextureUsageFlags::STORAGE_BINDING | TextureUsageFlags::TEXTURE_BINDING))?;
//! let target = graph.create_texture(TextureCreateInfo::new_2d("target", 128, 128, Format::Rgba8Unorm,
//!     TextureUsageFlags::RENDER_ATTACHMENT))?;
//! let storage_view = graph.create_texture_view(image, TextureViewCreateInfo::new_2d(TextureViewType::StorageBinding, TextureAspect::Color))?;
//! let sampled_view = graph.create_texture_view(image, TextureViewCreateInfo::default())?;
//! let target_view = graph.create_texture_view(target, TextureViewCreateInfo::new_2d(TextureViewType::ColorAttachment, TextureAspect::Color))?;
//! let write_group = graph.allocate_bind_group(BindGroupDesc::new(layout).storage_texture("image", storage_view)?)?;
//! let read_group = graph.allocate_bind_group(BindGroupDesc::new(sample_layout).texture("image", sampled_view)?)?;
//!
//! let generate = PassBuilder::compute("generate", |_, pass| {
//!         pass.dispatch(16, 16, 1);
//!         Ok(())
//!     })
//!     .async_compute()?
//!     .bind_group(write_group)?
//!     .build();
//! graph.add_pass(generate)?;
//! // The compute pass runs on another queue, so the raster pass must be in the next timeline segment.
//! graph.add_sync_point()?;
//! let display = PassBuilder::raster(
//!         "display",
//!         RasterPassDesc::new().color_attachment(ColorAttachment::new(target_view)),
//!         |_, pass| {
//!             pass.draw(3, 1, 0, 0);
//!             Ok(())
//!         },
//!     )
//!     .bind_group(read_group)?
//!     .build();
//! graph.add_pass(display)?;
//! graph.mark_as_used(target)?;
//! # Ok::<(), anyhow::Error>(())
//! ```

use anyhow::Result;

use crate::core::error::Error;
use crate::graph::handle::{BindGroupRef, ResourceRef, TextureViewRef};
use crate::graph::physical_resource::PhysicalResourceBindings;
use crate::rhi;
use crate::rhi::{
    CommandRecorder, ComputePassCommandRecorder, CopyPassCommandRecorder, LoadOp, RasterPassCommandRecorder, StoreOp,
};

/// Logical queue a pass runs on.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum QueueType {
    /// Graphics queue. Raster passes always run here.
    Main,
    AsyncCompute,
    AsyncCopy,
}

impl QueueType {
    /// Every queue, in the order their command buffers are recorded and submitted within a timeline segment.
    pub const ALL: [QueueType; 3] = [QueueType::Main, QueueType::AsyncCompute, QueueType::AsyncCopy];

    /// The hardware queue family this logical queue submits to.
    pub fn rhi_queue(&self) -> rhi::QueueType {
        match self {
            QueueType::Main => rhi::QueueType::Graphics,
            QueueType::AsyncCompute => rhi::QueueType::Compute,
            QueueType::AsyncCopy => rhi::QueueType::Transfer,
        }
    }
}

/// The kind of a pass, without its payload.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum PassType {
    Copy,
    Compute,
    Raster,
}

/// Resources read and written by a copy pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CopyPassDesc {
    pub copy_srcs: Vec<ResourceRef>,
    pub copy_dsts: Vec<ResourceRef>,
}

impl CopyPassDesc {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a resource the pass copies from.
    pub fn src(mut self, resource: impl Into<ResourceRef>) -> Self {
        self.copy_srcs.push(resource.into());
        self
    }

    /// Declare a resource the pass copies to.
    pub fn dst(mut self, resource: impl Into<ResourceRef>) -> Self {
        self.copy_dsts.push(resource.into());
        self
    }
}

/// A color attachment of a raster pass.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ColorAttachment {
    pub view: TextureViewRef,
    pub load_op: LoadOp,
    pub store_op: StoreOp,
    pub clear_value: [f32; 4],
}

impl ColorAttachment {
    /// Attachment that is cleared to opaque black and stored.
    pub fn new(view: TextureViewRef) -> Self {
        Self {
            view,
            load_op: LoadOp::Clear,
            store_op: StoreOp::Store,
            clear_value: [0.0, 0.0, 0.0, 1.0],
        }
    }

    pub fn load_op(mut self, op: LoadOp) -> Self {
        self.load_op = op;
        self
    }

    pub fn store_op(mut self, op: StoreOp) -> Self {
        self.store_op = op;
        self
    }

    pub fn clear_value(mut self, value: [f32; 4]) -> Self {
        self.clear_value = value;
        self
    }
}

/// The depth-stencil attachment of a raster pass.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct DepthStencilAttachment {
    pub view: TextureViewRef,
    pub depth_load_op: LoadOp,
    pub depth_store_op: StoreOp,
    pub depth_clear_value: f32,
    pub depth_read_only: bool,
    pub stencil_load_op: LoadOp,
    pub stencil_store_op: StoreOp,
    pub stencil_clear_value: u32,
    pub stencil_read_only: bool,
}

impl DepthStencilAttachment {
    /// Attachment whose depth is cleared to 1.0 and stencil to 0, both stored.
    pub fn new(view: TextureViewRef) -> Self {
        Self {
            view,
            depth_load_op: LoadOp::Clear,
            depth_store_op: StoreOp::Store,
            depth_clear_value: 1.0,
            depth_read_only: false,
            stencil_load_op: LoadOp::Clear,
            stencil_store_op: StoreOp::Store,
            stencil_clear_value: 0,
            stencil_read_only: false,
        }
    }

    /// Load depth and stencil and never write them. The attachment then counts as a read of its texture.
    pub fn read_only(mut self) -> Self {
        self.depth_load_op = LoadOp::Load;
        self.stencil_load_op = LoadOp::Load;
        self.depth_read_only = true;
        self.stencil_read_only = true;
        self
    }

    pub fn depth_clear_value(mut self, value: f32) -> Self {
        self.depth_clear_value = value;
        self
    }

    pub fn stencil_clear_value(mut self, value: u32) -> Self {
        self.stencil_clear_value = value;
        self
    }

    /// Whether neither depth nor stencil are written.
    pub fn is_read_only(&self) -> bool {
        self.depth_read_only && self.stencil_read_only
    }
}

/// Attachments of a raster pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RasterPassDesc {
    pub color_attachments: Vec<ColorAttachment>,
    pub depth_stencil_attachment: Option<DepthStencilAttachment>,
}

impl RasterPassDesc {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn color_attachment(mut self, attachment: ColorAttachment) -> Self {
        self.color_attachments.push(attachment);
        self
    }

    pub fn depth_stencil_attachment(mut self, attachment: DepthStencilAttachment) -> Self {
        self.depth_stencil_attachment = Some(attachment);
        self
    }
}

/// Records the commands of a copy pass.
pub type CopyPassFn<'a> = Box<dyn FnMut(&PhysicalResourceBindings, &mut dyn CopyPassCommandRecorder) -> Result<()> + 'a>;
/// Records the commands of a compute pass.
pub type ComputePassFn<'a> = Box<dyn FnMut(&PhysicalResourceBindings, &mut dyn ComputePassCommandRecorder) -> Result<()> + 'a>;
/// Records the commands of a raster pass.
pub type RasterPassFn<'a> = Box<dyn FnMut(&PhysicalResourceBindings, &mut dyn RasterPassCommandRecorder) -> Result<()> + 'a>;
/// Called right before or after a pass, outside of it. Can be used to record extra barriers or debug labels.
pub type PassHookFn<'a> = Box<dyn FnMut(&PhysicalResourceBindings, &mut dyn CommandRecorder) -> Result<()> + 'a>;

/// The kind of a pass, together with its declared resources and callback.
#[derive(Derivative)]
#[derivative(Debug)]
pub enum PassKind<'a> {
    Copy {
        desc: CopyPassDesc,
        #[derivative(Debug = "ignore")]
        func: CopyPassFn<'a>,
    },
    Compute {
        bind_groups: Vec<BindGroupRef>,
        #[derivative(Debug = "ignore")]
        func: ComputePassFn<'a>,
    },
    Raster {
        desc: RasterPassDesc,
        bind_groups: Vec<BindGroupRef>,
        #[derivative(Debug = "ignore")]
        func: RasterPassFn<'a>,
    },
}

/// Represents one pass in a pass graph. You can obtain one using a [`PassBuilder`].
#[derive(Derivative)]
#[derivative(Debug)]
pub struct Pass<'a> {
    pub(crate) name: String,
    pub(crate) queue: QueueType,
    pub(crate) kind: PassKind<'a>,
    #[derivative(Debug = "ignore")]
    pub(crate) pre: Option<PassHookFn<'a>>,
    #[derivative(Debug = "ignore")]
    pub(crate) post: Option<PassHookFn<'a>>,
    pub(crate) color: Option<[f32; 4]>,
}

impl<'a> Pass<'a> {
    /// Get the pass name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the queue this pass runs on.
    pub fn queue(&self) -> QueueType {
        self.queue
    }

    pub fn pass_type(&self) -> PassType {
        match self.kind {
            PassKind::Copy { .. } => PassType::Copy,
            PassKind::Compute { .. } => PassType::Compute,
            PassKind::Raster { .. } => PassType::Raster,
        }
    }

    /// Get the bind groups used by this pass. Copy passes have none.
    pub fn bind_groups(&self) -> &[BindGroupRef] {
        match &self.kind {
            PassKind::Copy { .. } => &[],
            PassKind::Compute { bind_groups, .. } => bind_groups,
            PassKind::Raster { bind_groups, .. } => bind_groups,
        }
    }
}

/// Used to create [`Pass`] objects correctly.
/// # Example
/// See the [`pass`](crate::graph::pass) module level documentation.
#[derive(Debug)]
pub struct PassBuilder<'a> {
    inner: Pass<'a>,
}

impl<'a> PassBuilder<'a> {
    fn with_kind(name: impl Into<String>, kind: PassKind<'a>) -> Self {
        Self {
            inner: Pass {
                name: name.into(),
                queue: QueueType::Main,
                kind,
                pre: None,
                post: None,
                color: None,
            },
        }
    }

    /// Create a new copy pass.
    pub fn copy(
        name: impl Into<String>,
        desc: CopyPassDesc,
        func: impl FnMut(&PhysicalResourceBindings, &mut dyn CopyPassCommandRecorder) -> Result<()> + 'a,
    ) -> Self {
        Self::with_kind(
            name,
            PassKind::Copy {
                desc,
                func: Box::new(func),
            },
        )
    }

    /// Create a new compute pass. Its resources are declared through [`PassBuilder::bind_group`].
    pub fn compute(
        name: impl Into<String>,
        func: impl FnMut(&PhysicalResourceBindings, &mut dyn ComputePassCommandRecorder) -> Result<()> + 'a,
    ) -> Self {
        Self::with_kind(
            name,
            PassKind::Compute {
                bind_groups: vec![],
                func: Box::new(func),
            },
        )
    }

    /// Create a new raster pass rendering to the attachments in `desc`.
    pub fn raster(
        name: impl Into<String>,
        desc: RasterPassDesc,
        func: impl FnMut(&PhysicalResourceBindings, &mut dyn RasterPassCommandRecorder) -> Result<()> + 'a,
    ) -> Self {
        Self::with_kind(
            name,
            PassKind::Raster {
                desc,
                bind_groups: vec![],
                func: Box::new(func),
            },
        )
    }

    /// Run this pass on the async copy queue.
    /// # Errors
    /// * Fails if this is not a copy pass.
    pub fn async_copy(mut self) -> Result<Self> {
        if !matches!(self.inner.kind, PassKind::Copy { .. }) {
            return Err(Error::Uncategorized("Only copy passes can run on the async copy queue").into());
        }
        self.inner.queue = QueueType::AsyncCopy;
        Ok(self)
    }

    /// Run this pass on the async compute queue.
    /// # Errors
    /// * Fails if this is a raster pass, raster passes always run on the main queue.
    pub fn async_compute(mut self) -> Result<Self> {
        if matches!(self.inner.kind, PassKind::Raster { .. }) {
            return Err(Error::Uncategorized("Raster passes cannot run on the async compute queue").into());
        }
        self.inner.queue = QueueType::AsyncCompute;
        Ok(self)
    }

    /// Use a bind group in this pass. Every resource viewed by the bind group is accessed by the pass.
    /// # Errors
    /// * Fails if this is a copy pass.
    pub fn bind_group(mut self, bind_group: BindGroupRef) -> Result<Self> {
        match &mut self.inner.kind {
            PassKind::Copy { .. } => return Err(Error::Uncategorized("Copy passes cannot use bind groups").into()),
            PassKind::Compute { bind_groups, .. } => bind_groups.push(bind_group),
            PassKind::Raster { bind_groups, .. } => bind_groups.push(bind_group),
        }
        Ok(self)
    }

    /// Set the color of this pass. This can show up in graphics debuggers like RenderDoc.
    #[cfg(feature = "debug-markers")]
    pub fn color(mut self, color: [f32; 4]) -> Self {
        self.inner.color = Some(color);
        self
    }

    /// Set a function that is called right before the pass begins.
    pub fn pre_execute(
        mut self,
        func: impl FnMut(&PhysicalResourceBindings, &mut dyn CommandRecorder) -> Result<()> + 'a,
    ) -> Self {
        self.inner.pre = Some(Box::new(func));
        self
    }

    /// Set a function that is called right after the pass ends.
    pub fn post_execute(
        mut self,
        func: impl FnMut(&PhysicalResourceBindings, &mut dyn CommandRecorder) -> Result<()> + 'a,
    ) -> Self {
        self.inner.post = Some(Box::new(func));
        self
    }

    /// Obtain a built [`Pass`] object.
    pub fn build(self) -> Pass<'a> {
        self.inner
    }
}
