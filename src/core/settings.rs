//! Exposes the settings that control how a [`PassGraph`](crate::PassGraph) is compiled and executed.

/// Decides what happens when two queues access the same resource in a conflicting way inside one timeline segment.
///
/// Within a segment, passes on different queues run concurrently, so a read on one queue and a write on another
/// (or two writes) have no ordering guarantee. Reads on two queues conflict as well when the resource needs a state
/// transition first.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
pub enum CrossQueuePolicy {
    /// Fail execution with [`Error::CrossQueueHazard`](crate::Error::CrossQueueHazard).
    /// The caller must separate the passes using [`PassGraph::add_sync_point`](crate::PassGraph::add_sync_point).
    #[default]
    Reject,
    /// Start a new timeline segment right before the offending pass, as if a sync point was added there.
    AutoSync,
}

/// Settings used by a [`GraphContext`](crate::GraphContext) and every graph built on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphSettings {
    /// Amount of [`GraphContext::tick`](crate::GraphContext::tick) calls an unreferenced pooled resource survives before it is destroyed.
    pub pool_release_latency: u32,
    /// What to do with conflicting accesses from different queues inside one segment.
    pub cross_queue_policy: CrossQueuePolicy,
    /// Let transient resources with equal descriptors and disjoint lifetimes share one physical resource.
    pub alias_resources: bool,
    /// Remove passes and resources that do not contribute to an imported or explicitly used resource.
    pub cull_passes: bool,
    /// Wrap every pass in a debug label. Only has effect when the `debug-markers` feature is enabled.
    pub debug_labels: bool,
}

impl Default for GraphSettings {
    fn default() -> Self {
        GraphSettingsBuilder::new().build()
    }
}

/// The settings builder is a convenience struct to easily create [`GraphSettings`].
///
/// For information about each of the fields, see [`GraphSettings`].
/// # Example
/// ```
/// # use framegraph::*;
/// let settings = GraphSettingsBuilder::new()
///     .pool_release_latency(3)
///     .cross_queue_policy(CrossQueuePolicy::AutoSync)
///     .alias_resources(false)
///     .build();
/// ```
#[derive(Debug)]
pub struct GraphSettingsBuilder {
    inner: GraphSettings,
}

impl Default for GraphSettingsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphSettingsBuilder {
    /// Create a new settings builder with default settings.
    pub fn new() -> Self {
        GraphSettingsBuilder {
            inner: GraphSettings {
                pool_release_latency: 2,
                cross_queue_policy: CrossQueuePolicy::Reject,
                alias_resources: true,
                cull_passes: true,
                debug_labels: true,
            },
        }
    }

    /// Sets the amount of frames an unused pooled resource is kept alive.
    pub fn pool_release_latency(mut self, latency: u32) -> Self {
        self.inner.pool_release_latency = latency;
        self
    }

    /// Sets the policy for cross-queue hazards.
    pub fn cross_queue_policy(mut self, policy: CrossQueuePolicy) -> Self {
        self.inner.cross_queue_policy = policy;
        self
    }

    /// Enable or disable aliasing of transient resources.
    pub fn alias_resources(mut self, enabled: bool) -> Self {
        self.inner.alias_resources = enabled;
        self
    }

    /// Enable or disable culling. With culling disabled every declared pass is recorded.
    pub fn cull_passes(mut self, enabled: bool) -> Self {
        self.inner.cull_passes = enabled;
        self
    }

    /// Enable or disable per-pass debug labels.
    pub fn debug_labels(mut self, enabled: bool) -> Self {
        self.inner.debug_labels = enabled;
        self
    }

    /// Build the resulting settings.
    pub fn build(self) -> GraphSettings {
        self.inner
    }
}
