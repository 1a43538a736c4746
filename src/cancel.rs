//! Composable cancellation handles.
//!
//! A [`Cancellable`] is a capability to stop some in-flight work. Leaf
//! handles wrap a single unit of work (a spawned tokio task, an operation);
//! [`GroupCancellable`] fans one `cancel()` out to every child it holds.

use std::mem;
use std::sync::Arc;

use crate::lock::Locked;

/// Something that can be cancelled. `cancel` must be idempotent.
pub trait Cancellable: Send + Sync {
    fn cancel(&self);
}

impl Cancellable for tokio::task::AbortHandle {
    fn cancel(&self) {
        self.abort();
    }
}

impl<C: Cancellable + ?Sized> Cancellable for Arc<C> {
    fn cancel(&self) {
        (**self).cancel();
    }
}

#[derive(Default)]
struct GroupState {
    is_cancelled: bool,
    children: Vec<Arc<dyn Cancellable>>,
}

/// Aggregate handle that cancels all of its children exactly once.
///
/// Once cancelled the group stays cancelled: children added afterwards are
/// cancelled on the spot and never stored. Children are always cancelled
/// outside the lock, so a child may touch the group from its own `cancel`.
#[derive(Default)]
pub struct GroupCancellable {
    state: Locked<GroupState>,
}

impl GroupCancellable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a child, or cancel it immediately if the group is already cancelled.
    pub fn add(&self, child: Arc<dyn Cancellable>) {
        let rejected = self.state.with_lock(|state| {
            if state.is_cancelled {
                Some(child)
            } else {
                state.children.push(child);
                None
            }
        });
        if let Some(child) = rejected {
            child.cancel();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.with_lock(|state| state.is_cancelled)
    }

    /// Number of children currently held.
    pub fn len(&self) -> usize {
        self.state.with_lock(|state| state.children.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Cancellable for GroupCancellable {
    fn cancel(&self) {
        let drained = self.state.with_lock(|state| {
            state.is_cancelled = true;
            mem::take(&mut state.children)
        });
        for child in drained {
            child.cancel();
        }
    }
}

impl std::fmt::Debug for GroupCancellable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (is_cancelled, children) = self
            .state
            .with_lock(|state| (state.is_cancelled, state.children.len()));
        f.debug_struct("GroupCancellable")
            .field("is_cancelled", &is_cancelled)
            .field("children", &children)
            .finish()
    }
}
