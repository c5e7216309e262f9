//! Typed handles into the storage of a [`PassGraph`](crate::PassGraph).
//!
//! A handle stores an index and the id of the graph that created it. Every graph takes a fresh id from a process-wide
//! counter, so a handle used on a graph it does not belong to (including the graph of a previous frame) is detected and
//! rejected with [`Error::InvalidHandle`](crate::Error::InvalidHandle).

use std::fmt::{Debug, Formatter};
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU32, Ordering};

static NEXT_GRAPH_ID: AtomicU32 = AtomicU32::new(1);

/// Get a graph id that was never handed out before.
pub(crate) fn next_graph_id() -> u32 {
    NEXT_GRAPH_ID.fetch_add(1, Ordering::Relaxed)
}

/// Names the kind of object a [`Handle`] points to.
pub trait HandleKind {
    const NAME: &'static str;
}

macro_rules! handle_kinds {
    ($($(#[$meta:meta])* $kind:ident => $name:literal),* $(,)?) => {
        $(
            $(#[$meta])*
            #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
            pub enum $kind {}

            impl HandleKind for $kind {
                const NAME: &'static str = $name;
            }
        )*
    };
}

handle_kinds! {
    /// Any virtual resource, buffer or texture.
    ResourceKindTag => "resource",
    BufferKindTag => "buffer",
    TextureKindTag => "texture",
    BufferViewKindTag => "buffer view",
    TextureViewKindTag => "texture view",
    BindGroupKindTag => "bind group",
}

/// Index of an object in a graph, tagged with the graph it belongs to.
pub struct Handle<T: HandleKind> {
    index: u32,
    generation: u32,
    _marker: PhantomData<fn() -> T>,
}

pub type ResourceRef = Handle<ResourceKindTag>;
pub type BufferRef = Handle<BufferKindTag>;
pub type TextureRef = Handle<TextureKindTag>;
pub type BufferViewRef = Handle<BufferViewKindTag>;
pub type TextureViewRef = Handle<TextureViewKindTag>;
pub type BindGroupRef = Handle<BindGroupKindTag>;

impl<T: HandleKind> Handle<T> {
    pub(crate) fn new(index: usize, generation: u32) -> Self {
        Self {
            index: index as u32,
            generation,
            _marker: PhantomData,
        }
    }

    /// Index of the object in its graph's storage.
    pub fn index(&self) -> usize {
        self.index as usize
    }

    /// Id of the graph this handle was created by.
    pub fn generation(&self) -> u32 {
        self.generation
    }

    pub(crate) fn invalid_error(&self, graph: u32) -> crate::Error {
        crate::Error::InvalidHandle {
            kind: T::NAME,
            index: self.index,
            generation: self.generation,
            graph,
        }
    }
}

impl<T: HandleKind> Clone for Handle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: HandleKind> Copy for Handle<T> {}

impl<T: HandleKind> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index && self.generation == other.generation
    }
}

impl<T: HandleKind> Eq for Handle<T> {}

impl<T: HandleKind> Hash for Handle<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.index.hash(state);
        self.generation.hash(state);
    }
}

impl<T: HandleKind> Debug for Handle<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}@{}", T::NAME, self.index, self.generation)
    }
}

impl From<BufferRef> for ResourceRef {
    fn from(value: BufferRef) -> Self {
        ResourceRef::new(value.index(), value.generation)
    }
}

impl From<TextureRef> for ResourceRef {
    fn from(value: TextureRef) -> Self {
        ResourceRef::new(value.index(), value.generation)
    }
}
