//! Network plumbing for the unveil sandbox.
//!
//! # Scope
//!
//! This crate provides:
//! - **Transport** - the [`Transport`] / [`RequestHandle`] seam between the
//!   sandbox and whatever actually moves bytes
//! - **HTTP** - a blocking `reqwest` implementation with its own cookie jar
//! - **Connection Registry** - the map from a live script object's identity
//!   to the native connection backing it
//!
//! Everything here is single-threaded and blocking. A request suspends the
//! caller until the response body has been read.

pub mod error;
pub mod http;
pub mod jar;
#[cfg(any(test, feature = "test-util"))]
pub mod mock;
pub mod registry;
pub mod transport;

pub use error::{RegistryError, TransportError};
pub use http::HttpTransport;
pub use jar::CookieJar;
pub use registry::{Connection, ConnectionId, ConnectionRegistry, Exchange};
pub use transport::{
    Credentials, DEFAULT_USER_AGENT, HandleOptions, Method, Request, RequestHandle, Transport,
};
