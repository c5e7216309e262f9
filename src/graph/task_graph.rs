//! The dependency graph between the passes of a compiled [`PassGraph`](crate::PassGraph).
//!
//! Through the [`GraphViz`] trait, it's possible to export a graphviz-compatible dot file to display the graph.
//! ```
//! # use std::sync::Arc;
//! # use framegraph::prelude::*;
//! # use framegraph::rhi::dummy::DummyDevice;
//! # let context = GraphContext::new(Arc::new(DummyDevice::new()), GraphSettings::default());
//! let mut graph = PassGraph::new(&context);
//! let a = graph.create_buffer(BufferCreateInfo::new("a", 64, BufferUsageFlags::COPY_SRC | BufferUsageFlags::COPY_DST))?;
//! let b = graph.create_buffer(BufferCreateInfo::new("b", 64, BufferUsageFlags::COPY_DST))?;
//! graph.mark_as_used(b)?;
//! graph.add_copy_pass("fill", CopyPassDesc::new().dst(a), |_, _| Ok(()))?;
//! graph.add_copy_pass("copy", CopyPassDesc::new().src(a).dst(b), |_, _| Ok(()))?;
//! graph.execute(&GraphExecuteInfo::default())?;
//! let dot = graph.dependency_graph().expect("graph was compiled").dot()?;
//! assert!(dot.contains("fill"));
//! # Ok::<(), anyhow::Error>(())
//! ```

use anyhow::Result;
use petgraph::dot::Dot;
use petgraph::graph::{EdgeReference, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::{Direction, Graph};

use crate::graph::pass::QueueType;

/// Trait to export a graph to a graphviz-compatible dot format.
pub trait GraphViz {
    /// Get the graphviz representation of this graph.
    fn dot(&self) -> Result<String>;
}

/// Why one pass has to run after another.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum DependencyKind {
    /// The later pass reads what the earlier pass wrote.
    ReadAfterWrite,
    /// The later pass overwrites what the earlier pass read.
    WriteAfterRead,
    /// Both passes write the resource.
    WriteAfterWrite,
}

/// A pass in the dependency graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassNode {
    /// Index of the pass in declaration order.
    pub pass: usize,
    pub name: String,
    pub queue: QueueType,
}

/// An edge in the dependency graph, from the earlier to the later pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    /// Name of the resource the dependency is on.
    pub resource: String,
    pub kind: DependencyKind,
    /// Whether both passes run on different queues. These dependencies are resolved with semaphores between timeline
    /// segments, all others with barriers.
    pub cross_queue: bool,
}

/// Ordering constraints between the passes that survived culling.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    pub(crate) graph: Graph<PassNode, Dependency>,
}

impl DependencyGraph {
    /// Get the underlying petgraph graph.
    pub fn graph(&self) -> &Graph<PassNode, Dependency> {
        &self.graph
    }

    pub(crate) fn add_pass(&mut self, node: PassNode) -> NodeIndex {
        self.graph.add_node(node)
    }

    pub(crate) fn add_dependency(&mut self, from: NodeIndex, to: NodeIndex, dependency: Dependency) {
        self.graph.add_edge(from, to, dependency);
    }

    /// Find the node of a pass by name.
    pub fn find_pass(&self, name: &str) -> Option<NodeIndex> {
        self.graph.node_indices().find(|node| self.graph[*node].name == name)
    }

    /// All dependencies of a pass on earlier passes, as (earlier pass name, dependency).
    pub fn dependencies_of(&self, name: &str) -> Vec<(&str, &Dependency)> {
        let Some(node) = self.find_pass(name) else { return vec![] };
        self.graph
            .edges_directed(node, Direction::Incoming)
            .map(|edge| (self.graph[edge.source()].name.as_str(), edge.weight()))
            .collect()
    }

    /// Amount of dependencies that cross queues.
    pub fn cross_queue_count(&self) -> usize {
        self.graph.edge_weights().filter(|dep| dep.cross_queue).count()
    }

    fn get_edge_attributes(_: &Graph<PassNode, Dependency>, edge: EdgeReference<Dependency>) -> String {
        if edge.weight().cross_queue {
            String::from("style = dashed")
        } else {
            String::from("")
        }
    }

    fn get_node_attributes(_: &Graph<PassNode, Dependency>, node: (NodeIndex, &PassNode)) -> String {
        match node.1.queue {
            QueueType::Main => String::from("fillcolor = \"#5e6df7\""),
            QueueType::AsyncCompute => String::from("fillcolor = \"#f75e70\""),
            QueueType::AsyncCopy => String::from("fillcolor = \"#5ef78b\""),
        }
    }
}

impl std::fmt::Display for PassNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({:?})", self.name, self.queue)
    }
}

impl std::fmt::Display for Dependency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self.kind {
            DependencyKind::ReadAfterWrite => "RAW",
            DependencyKind::WriteAfterRead => "WAR",
            DependencyKind::WriteAfterWrite => "WAW",
        };
        write!(f, "{} {}", kind, self.resource)
    }
}

impl GraphViz for DependencyGraph {
    fn dot(&self) -> Result<String> {
        let dot = Dot::with_attr_getters(
            &self.graph,
            &[],
            &Self::get_edge_attributes,
            &Self::get_node_attributes,
        );
        Ok(format!("{}", dot))
    }
}
