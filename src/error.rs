//! Error types for the kernel, the application lifecycle and the host factory

use std::any::TypeId;
use thiserror::Error;

/// Boxed error returned by user-supplied hooks and disposers
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur during dependency injection operations
#[derive(Error, Debug)]
pub enum DiError {
    /// Service was not found in the container
    #[error("Service not found: {type_name}")]
    NotFound {
        type_name: &'static str,
        type_id: TypeId,
    },

    /// Container is locked and cannot be modified
    #[error("Container is locked - cannot register new services")]
    Locked,

    /// Container has been disposed and no longer serves requests
    #[error("Container has been disposed")]
    Disposed,

    /// One or more disposers failed while the container was released
    #[error("Container disposal failed ({} disposer(s)): {}", .failures.len(), .failures.join("; "))]
    DisposeFailed { failures: Vec<String> },

    /// Internal error
    #[error("Internal DI error: {0}")]
    Internal(String),
}

impl DiError {
    /// Create a NotFound error for a type
    #[inline]
    pub fn not_found<T: 'static>() -> Self {
        Self::NotFound {
            type_name: std::any::type_name::<T>(),
            type_id: TypeId::of::<T>(),
        }
    }
}

/// Result type alias for DI operations
pub type Result<T> = std::result::Result<T, DiError>;

/// Errors raised by [`HostedApplication`](crate::HostedApplication) lifecycle transitions.
#[derive(Error, Debug)]
pub enum LifecycleError {
    /// The `create_kernel` hook failed; the kernel handle stays absent
    #[error("Failed to create kernel: {0}")]
    KernelCreation(#[source] BoxError),

    /// The kernel could not release its resources on shutdown
    #[error("Failed to dispose kernel: {0}")]
    Dispose(#[source] DiError),

    /// A kernel operation failed during startup
    #[error("Kernel error during startup: {0}")]
    Kernel(#[from] DiError),

    /// Startup was invoked while the application is already running
    #[error("Application is already running")]
    AlreadyRunning,

    /// Startup was invoked after the application was stopped
    #[error("Application has already been stopped")]
    AlreadyStopped,
}

/// Errors raised by the [`HostFactory`](crate::HostFactory) and service hosts.
#[derive(Error, Debug)]
pub enum HostError {
    /// No kernel has been published, or it has been released
    #[error("No kernel is available - application not started or already stopped")]
    KernelUnavailable,

    /// The host has not been opened yet
    #[error("Service host for {contract} is not open")]
    NotOpen { contract: &'static str },

    /// The host has been closed
    #[error("Service host for {contract} is closed")]
    Closed { contract: &'static str },

    /// Resolution through the kernel failed
    #[error(transparent)]
    Kernel(#[from] DiError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispose_failed_message_lists_failures() {
        let err = DiError::DisposeFailed {
            failures: vec!["db: timeout".into(), "cache: closed".into()],
        };
        assert_eq!(
            err.to_string(),
            "Container disposal failed (2 disposer(s)): db: timeout; cache: closed"
        );
    }

    #[test]
    fn test_kernel_creation_keeps_source() {
        use std::error::Error as _;

        let err = LifecycleError::KernelCreation("missing module".into());
        assert!(err.to_string().contains("missing module"));
        assert!(err.source().is_some());
    }

    #[test]
    fn test_host_error_is_transparent_over_kernel() {
        let err = HostError::from(DiError::not_found::<u32>());
        assert_eq!(err.to_string(), "Service not found: u32");
    }
}
