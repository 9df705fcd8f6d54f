//! Per-thread stack of keys currently under construction.
//!
//! Every `get`/`make` pushes its (already aliased) key before running a strategy and pops it on drop,
//! so a key that re-appears in its own dependency chain is reported as a cycle instead of recursing forever.

use alloc::vec::Vec;
use std::cell::RefCell;

use crate::{Key, ResolveErrorKind};

std::thread_local! {
    static RESOLVE_STACK: RefCell<Vec<(u64, Key)>> = const { RefCell::new(Vec::new()) };
}

#[derive(Debug)]
pub(crate) struct ResolveGuard {
    _private: (),
}

impl ResolveGuard {
    /// Pushes `key` for the container `container_id`.
    ///
    /// # Errors
    /// Returns [`ResolveErrorKind::CyclicDependency`] with the chain from the first occurrence of `key`
    /// when it's already being resolved by the same container on this thread.
    pub(crate) fn push(container_id: u64, key: &Key) -> Result<Self, ResolveErrorKind> {
        RESOLVE_STACK.with(|stack| {
            let mut stack = stack.borrow_mut();
            if let Some(position) = stack.iter().position(|(id, pushed)| *id == container_id && pushed == key) {
                let chain = stack[position..]
                    .iter()
                    .filter(|(id, _)| *id == container_id)
                    .map(|(_, pushed)| pushed.clone())
                    .chain([key.clone()])
                    .collect();
                return Err(ResolveErrorKind::CyclicDependency { chain });
            }
            stack.push((container_id, key.clone()));
            Ok(Self { _private: () })
        })
    }
}

impl Drop for ResolveGuard {
    fn drop(&mut self) {
        RESOLVE_STACK.with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}
