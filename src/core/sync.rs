//! Synchronization utilities for robust mutex handling
//!
//! Ledger and pool state live behind `std::sync::Mutex`. A panic while one of
//! those locks is held poisons it; these helpers turn the poison into the
//! caller's error type instead of propagating the panic.

use std::sync::{LockResult, Mutex, MutexGuard};

/// Handle poisoned mutex cases with consistent error handling
///
/// # Examples
/// ```
/// use std::sync::Mutex;
/// use callqueue::core::sync::handle_mutex_poison;
/// use callqueue::queue::api::QueueError;
///
/// let mutex = Mutex::new(42);
/// let guard = handle_mutex_poison(mutex.lock(), |message| QueueError::Internal { message })
///     .unwrap();
/// assert_eq!(*guard, 42);
/// ```
pub fn handle_mutex_poison<T, E>(
    result: LockResult<T>,
    error_constructor: impl FnOnce(String) -> E,
) -> Result<T, E> {
    result.map_err(|poison_err| {
        error_constructor(format!(
            "Internal synchronisation error (mutex poisoned). A panic occurred while holding a lock. PoisonError: {:?}",
            poison_err
        ))
    })
}

/// Lock a mutex, recovering the guard from a poisoned lock.
///
/// Used on paths that cannot report an error (drop guards, bookkeeping after
/// a task finished) where the protected state is still consistent because
/// every critical section is a single read-modify-write.
pub fn lock_recovering<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| {
        log::warn!("Recovering poisoned lock");
        poisoned.into_inner()
    })
}
