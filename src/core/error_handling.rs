//! Generic error handling utilities
//!
//! Unified reporting for errors that can tell apart problems the operator can
//! fix (bad configuration, missing credentials) from system failures.

/// Trait for errors that can distinguish between user-actionable and system errors
///
/// When `is_user_actionable()` returns `true`, `user_message()` should return
/// `Some(message)`; otherwise it should return `None`.
pub trait ContextualError: std::error::Error {
    /// Returns true if this error carries a message the operator can act on
    fn is_user_actionable(&self) -> bool;

    /// The operator-facing message for user-actionable errors
    fn user_message(&self) -> Option<&str>;
}

/// Log an error with the detail level its kind deserves
///
/// User-actionable errors print their own message; system errors print the
/// operation context and keep the detail at debug level.
pub fn log_error_with_context<E: ContextualError + std::fmt::Display + std::fmt::Debug>(
    error: &E,
    operation_context: &str,
) {
    match error.user_message() {
        Some(user_msg) if error.is_user_actionable() => log::error!("FATAL: {}", user_msg),
        _ => log::error!("FATAL: {}", operation_context),
    }
    log::debug!("DETAIL: {}", error);
    log::debug!("DEBUG_DETAILS: {:?}", error);
}
