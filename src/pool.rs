//! Allocation reuse across frames and passes.
//!
//! Compiled graph metadata is rebuilt every frame. [`Pooled<T>`] keeps the
//! arenas alive between frames so a `clear()` drops the contents but not the
//! capacity. [`ScratchPool`] hands out per-pass scratch objects that are
//! reclaimed when the pass ends.
//!
//! # Example
//!
//! ```
//! use frame_graph::pool::{Poolable, Pooled};
//!
//! #[derive(Debug, Default)]
//! struct Indices {
//!     data: Vec<u32>,
//! }
//!
//! impl Poolable for Indices {
//!     fn new_empty() -> Self {
//!         Self::default()
//!     }
//!     fn reset(&mut self) {
//!         self.data.clear();
//!     }
//! }
//!
//! let mut pooled = Pooled::<Indices>::default();
//! pooled.activate().data.extend_from_slice(&[1, 2, 3]);
//! pooled.release();
//! assert!(pooled.is_pooled());
//! assert!(pooled.inner().data.capacity() >= 3);
//! ```

use std::any::{Any, TypeId};
use std::collections::HashMap;

/// Types that can be cleared while keeping their allocations.
pub trait Poolable {
    /// Create a new empty instance for pool initialization.
    fn new_empty() -> Self;

    /// Reset to an empty state, preserving capacity (`Vec::clear`, not `Vec::new`).
    fn reset(&mut self);
}

impl<T> Poolable for Vec<T> {
    fn new_empty() -> Self {
        Vec::new()
    }

    fn reset(&mut self) {
        self.clear();
    }
}

/// A value that is either in use this frame or parked with its allocation intact.
#[derive(Debug)]
pub enum Pooled<T: Poolable> {
    /// Holds valid data for the current frame.
    Active(T),
    /// Cleared, waiting for the next frame.
    Pooled(T),
}

impl<T: Poolable> Pooled<T> {
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active(_))
    }

    pub fn is_pooled(&self) -> bool {
        matches!(self, Self::Pooled(_))
    }

    /// The active value, or `None` while pooled.
    pub fn get(&self) -> Option<&T> {
        match self {
            Self::Active(t) => Some(t),
            Self::Pooled(_) => None,
        }
    }

    pub fn get_mut(&mut self) -> Option<&mut T> {
        match self {
            Self::Active(t) => Some(t),
            Self::Pooled(_) => None,
        }
    }

    /// Reset the value and park it. No-op if already pooled.
    pub fn release(&mut self) {
        if let Self::Active(t) = self {
            t.reset();
            let taken = std::mem::replace(t, T::new_empty());
            *self = Self::Pooled(taken);
        }
    }

    /// Mark the (already cleared) value as in use and return it for filling.
    pub fn activate(&mut self) -> &mut T {
        if let Self::Pooled(t) = self {
            let taken = std::mem::replace(t, T::new_empty());
            *self = Self::Active(taken);
        }
        match self {
            Self::Active(t) | Self::Pooled(t) => t,
        }
    }

    pub fn inner(&self) -> &T {
        match self {
            Self::Active(t) | Self::Pooled(t) => t,
        }
    }
}

impl<T: Poolable> Default for Pooled<T> {
    fn default() -> Self {
        Self::Pooled(T::new_empty())
    }
}

/// Per-frame scratch allocator handed to pass callbacks.
///
/// Objects obtained with [`ScratchPool::alloc`] stay valid until the end of
/// the pass that requested them; the execution driver then calls
/// [`ScratchPool::release_pass_allocations`], which resets them and returns
/// them to per-type free lists for the next pass.
#[derive(Default)]
pub struct ScratchPool {
    free: HashMap<TypeId, Vec<Box<dyn Any>>>,
    in_use: Vec<(TypeId, Box<dyn Any>)>,
    resetters: HashMap<TypeId, fn(&mut dyn Any)>,
}

impl std::fmt::Debug for ScratchPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScratchPool")
            .field("in_use", &self.in_use.len())
            .field("free", &self.free_count())
            .finish()
    }
}

fn reset_erased<T: Poolable + 'static>(value: &mut dyn Any) {
    if let Some(value) = value.downcast_mut::<T>() {
        value.reset();
    }
}

impl ScratchPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Borrow an empty scratch object of type `T` for the rest of the pass.
    pub fn alloc<T: Poolable + 'static>(&mut self) -> &mut T {
        let type_id = TypeId::of::<T>();
        self.resetters.entry(type_id).or_insert(reset_erased::<T>);
        let value = self
            .free
            .get_mut(&type_id)
            .and_then(Vec::pop)
            .unwrap_or_else(|| Box::new(T::new_empty()) as Box<dyn Any>);
        self.in_use.push((type_id, value));

        let (_, last) = self
            .in_use
            .last_mut()
            .unwrap_or_else(|| unreachable!("value was just pushed"));
        match last.downcast_mut::<T>() {
            Some(value) => value,
            None => unreachable!("free lists are keyed by TypeId"),
        }
    }

    /// Objects handed out during the current pass.
    pub fn in_use_count(&self) -> usize {
        self.in_use.len()
    }

    /// Objects parked for reuse.
    pub fn free_count(&self) -> usize {
        self.free.values().map(Vec::len).sum()
    }

    /// Reset every object handed out since the last call and park it.
    pub fn release_pass_allocations(&mut self) {
        for (type_id, mut value) in self.in_use.drain(..) {
            if let Some(reset) = self.resetters.get(&type_id) {
                reset(&mut *value);
            }
            self.free.entry(type_id).or_default().push(value);
        }
    }
}
