//! Error types for the network layer.

use thiserror::Error;

use crate::registry::ConnectionId;

/// A failure inside a transport while building a handle or moving bytes.
///
/// These are recoverable: the registry reports a failed request as status `0`
/// rather than surfacing the error to the script.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The HTTP client behind a handle could not be built.
    #[error("failed to create HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    /// The request URL did not parse.
    #[error("invalid request URL `{url}`: {source}")]
    InvalidUrl {
        /// The URL as handed to the transport.
        url: String,
        /// Parser error.
        source: url::ParseError,
    },

    /// Sending the request or reading the response failed.
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The transport refused to serve the request.
    #[error("transport unavailable: {0}")]
    Unavailable(String),
}

/// A broken contract between the bridge and the registry.
///
/// None of these can be triggered by well-formed script input alone. They mean
/// the bridge is miswired or the script asked for something the sandbox
/// refuses to emulate, and the caller must abort the evaluation.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// No connection is registered for this identity. Either it was never
    /// opened or it has already been closed.
    #[error("no connection registered for {0}")]
    UnknownConnection(ConnectionId),

    /// Only `GET`, `POST` and `PUT` are supported.
    #[error("unsupported HTTP method `{0}`")]
    UnsupportedMethod(String),

    /// The transport could not allocate a request handle.
    #[error("failed to allocate request handle: {0}")]
    HandleAllocation(#[source] TransportError),
}
