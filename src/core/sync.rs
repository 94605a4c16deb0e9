//! Synchronisation helpers for mutex poisoning

use std::sync::LockResult;

/// Convert a poisoned lock into an application error
///
/// # Examples
/// ```
/// use std::sync::Mutex;
/// use repoharvest::core::sync::handle_mutex_poison;
/// use repoharvest::scanner::ScanError;
///
/// let mutex = Mutex::new(42);
/// let guard = handle_mutex_poison(mutex.lock(), |message| ScanError::Internal { message })
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
