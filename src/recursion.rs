//! Scoped recursion-depth limits.
//!
//! Recursive tree operations (construction, deep copy, crossover) consult
//! [`limit`] to decide how deep they may descend. A [`RecursionGuard`]
//! raises or lowers that limit for the duration of one operation and puts
//! the previous value back when dropped, including during unwinding.
//!
//! The limit is thread-local: guards on different threads never interfere.
//! Nested guards restore the outer limit verbatim on exit; limits are not
//! merged.
//!
//! # Examples
//!
//! ```
//! use u_gpsearch::recursion::{self, RecursionGuard};
//!
//! let outer = recursion::limit();
//! {
//!     let _guard = RecursionGuard::acquire(1500);
//!     assert_eq!(recursion::limit(), 1500);
//! }
//! assert_eq!(recursion::limit(), outer);
//! ```

use crate::error::OperatorError;
use std::cell::Cell;
use std::marker::PhantomData;

/// Limit in force when no guard is active.
pub const DEFAULT_LIMIT: usize = 1000;

thread_local! {
    static LIMIT: Cell<usize> = const { Cell::new(DEFAULT_LIMIT) };
}

/// Returns the recursion-depth limit currently in force on this thread.
pub fn limit() -> usize {
    LIMIT.with(Cell::get)
}

/// Fails with [`OperatorError::StackExhausted`] if `depth` exceeds [`limit`].
///
/// Tree operators call this as they descend.
pub fn check_depth(depth: usize) -> Result<(), OperatorError> {
    let limit = limit();
    if depth > limit {
        Err(OperatorError::StackExhausted { depth, limit })
    } else {
        Ok(())
    }
}

/// RAII guard that holds a recursion limit until dropped.
#[must_use = "the limit is restored as soon as the guard is dropped"]
#[derive(Debug)]
pub struct RecursionGuard {
    previous: usize,
    // Thread-local state: the guard must be dropped on the thread that made it.
    _not_send: PhantomData<*const ()>,
}

impl RecursionGuard {
    /// Sets the limit to `limit` and remembers the previous one.
    pub fn acquire(limit: usize) -> Self {
        let previous = LIMIT.with(|cell| cell.replace(limit));
        Self {
            previous,
            _not_send: PhantomData,
        }
    }

    /// The limit that will be restored on drop.
    pub fn previous(&self) -> usize {
        self.previous
    }
}

impl Drop for RecursionGuard {
    fn drop(&mut self) {
        LIMIT.with(|cell| cell.set(self.previous));
    }
}

/// Runs `op` with the recursion limit set to `limit`.
pub fn with_limit<T>(limit: usize, op: impl FnOnce() -> T) -> T {
    let _guard = RecursionGuard::acquire(limit);
    op()
}
