//! Error types for the sandbox.

use thiserror::Error;
use unveil_net::RegistryError;

/// A contract violation raised inside a host object.
///
/// These are never handed to the script as a recoverable exception. The first
/// one raised during an evaluation halts it and is returned to the host as
/// [`SandboxError::Fatal`].
#[derive(Debug, Error)]
pub enum BridgeError {
    /// The connection registry refused the operation.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// `XMLHttpRequest.open()` was called with `async = true`. The sandbox has
    /// no event loop, so only synchronous requests exist.
    #[error("asynchronous XMLHttpRequest is not supported")]
    AsyncRequest,
}

/// Errors returned to the host by [`crate::Sandbox`].
#[derive(Debug, Error)]
pub enum SandboxError {
    /// A host object hit a contract violation and the evaluation was halted.
    #[error("fatal bridge error: {0}")]
    Fatal(#[from] BridgeError),

    /// The synthetic browser environment could not be installed.
    #[error("failed to bootstrap the browser environment: {0}")]
    Bootstrap(String),
}
