//! Connection registry.
//!
//! Script objects live on the engine's garbage-collected heap; request
//! handles are native resources. The two never point at each other. A host
//! object only holds a [`ConnectionId`], and the registry owns the
//! [`Connection`] behind it from `open` until the engine releases the object.
//!
//! ```text
//!  new Element("img") ──► open() ──► ConnectionId(7) ──► Connection { handle, buffer }
//!  img.src = "..."    ──► perform(ConnectionId(7), GET ...)
//!  (object collected) ──► release(ConnectionId(7))  // handle dropped here, once
//! ```

use std::collections::HashMap;
use std::fmt;

use crate::error::RegistryError;
use crate::transport::{HandleOptions, Request, RequestHandle, Transport};

/// Identity of a live host object, used as the registry key.
///
/// Allocated by [`ConnectionRegistry::open`] and never reused by the same
/// registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// The raw numeric identity.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "connection#{}", self.0)
    }
}

/// The native state backing one host object.
pub struct Connection {
    handle: Box<dyn RequestHandle>,
    /// Every response body received on this connection, appended in order.
    buffer: Vec<u8>,
    /// Request recorded by `XMLHttpRequest.open()` for the next `send()`.
    prepared: Option<Request>,
}

impl Connection {
    /// All response bytes received so far. Never cleared.
    #[must_use]
    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    /// The request recorded for the next `send()`, if `open()` was called.
    #[must_use]
    pub const fn prepared(&self) -> Option<&Request> {
        self.prepared.as_ref()
    }

    /// Record the request a later `send()` performs. Replaces any previous one.
    pub fn prepare(&mut self, request: Request) {
        self.prepared = Some(request);
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("buffered", &self.buffer.len())
            .field("prepared", &self.prepared)
            .finish_non_exhaustive()
    }
}

/// Result of one performed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exchange {
    /// HTTP status, or `0` when no response was received.
    pub status: u16,
    /// The handle's cookie jar after the request, as raw records.
    pub cookies: Vec<String>,
}

/// Owner of every open [`Connection`].
pub struct ConnectionRegistry {
    transport: Box<dyn Transport>,
    options: HandleOptions,
    connections: HashMap<ConnectionId, Connection>,
    next_id: u64,
    /// Set by [`Self::shutdown`]. Late releases are expected after this.
    sealed: bool,
}

impl ConnectionRegistry {
    /// Create an empty registry that opens handles on `transport`.
    #[must_use]
    pub fn new(transport: Box<dyn Transport>, options: HandleOptions) -> Self {
        Self {
            transport,
            options,
            connections: HashMap::new(),
            next_id: 1,
            sealed: false,
        }
    }

    /// Options every new handle is configured with.
    #[must_use]
    pub const fn options(&self) -> &HandleOptions {
        &self.options
    }

    /// Open a connection for a newly constructed host object.
    ///
    /// The handle is configured from [`HandleOptions`] with an empty cookie
    /// engine. A non-empty `seed_cookie` becomes its initial cookie state.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::HandleAllocation`] if the transport cannot
    /// allocate a handle.
    pub fn open(&mut self, seed_cookie: Option<&str>) -> Result<ConnectionId, RegistryError> {
        let mut handle = self
            .transport
            .create_handle(&self.options)
            .map_err(RegistryError::HandleAllocation)?;

        if let Some(seed) = seed_cookie.filter(|seed| !seed.is_empty()) {
            handle.seed_cookies(seed);
        }

        let id = ConnectionId(self.next_id);
        self.next_id += 1;
        let _ = self.connections.insert(
            id,
            Connection {
                handle,
                buffer: Vec::new(),
                prepared: None,
            },
        );
        log::debug!("{id}: opened ({} live)", self.connections.len());
        Ok(id)
    }

    /// Look up the connection for `id`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::UnknownConnection`] if `id` has no entry.
    pub fn get(&mut self, id: ConnectionId) -> Result<&mut Connection, RegistryError> {
        self.connections
            .get_mut(&id)
            .ok_or(RegistryError::UnknownConnection(id))
    }

    /// Close the connection for `id`, dropping its handle and buffer.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::UnknownConnection`] if `id` has no entry,
    /// which includes closing the same id twice.
    pub fn close(&mut self, id: ConnectionId) -> Result<(), RegistryError> {
        match self.connections.remove(&id) {
            Some(connection) => {
                log::debug!(
                    "{id}: closed after {} buffered bytes ({} live)",
                    connection.buffer.len(),
                    self.connections.len()
                );
                Ok(())
            }
            None => Err(RegistryError::UnknownConnection(id)),
        }
    }

    /// Close on behalf of the engine when it releases the owning object.
    ///
    /// Before [`Self::shutdown`] this is [`Self::close`] and a missing entry is
    /// reported as an error. After shutdown every connection has already been
    /// closed, so the call is ignored.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::UnknownConnection`] if the registry is live and
    /// `id` has no entry.
    pub fn release(&mut self, id: ConnectionId) -> Result<(), RegistryError> {
        if self.sealed {
            return Ok(());
        }
        self.close(id)
    }

    /// Perform one blocking request on `id`'s connection.
    ///
    /// The response body is appended to the connection's buffer. A transport
    /// failure is not an error here: it is reported as status `0`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::UnknownConnection`] if `id` has no entry.
    pub fn perform(&mut self, id: ConnectionId, request: &Request) -> Result<Exchange, RegistryError> {
        let connection = self.get(id)?;
        let status = match connection.handle.perform(request, &mut connection.buffer) {
            Ok(status) => status,
            Err(err) => {
                log::debug!("{id}: {} {} failed: {err}", request.method, request.url);
                0
            }
        };
        log::debug!("{id}: {} {} -> {status}", request.method, request.url);

        Ok(Exchange {
            status,
            cookies: connection.handle.cookie_list(),
        })
    }

    /// Record the request a later [`Self::perform_prepared`] performs.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::UnknownConnection`] if `id` has no entry.
    pub fn prepare(&mut self, id: ConnectionId, request: Request) -> Result<(), RegistryError> {
        self.get(id)?.prepare(request);
        Ok(())
    }

    /// Perform the prepared request on `id` with `body` attached.
    ///
    /// Returns the request as sent together with its exchange, or `None`
    /// without touching the network if nothing was prepared.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::UnknownConnection`] if `id` has no entry.
    pub fn perform_prepared(
        &mut self,
        id: ConnectionId,
        body: Option<String>,
    ) -> Result<Option<(Request, Exchange)>, RegistryError> {
        let Some(request) = self.get(id)?.prepared().cloned() else {
            log::debug!("{id}: nothing prepared, no request sent");
            return Ok(None);
        };
        let request = request.with_body(body);
        let exchange = self.perform(id, &request)?;
        Ok(Some((request, exchange)))
    }

    /// Response bytes received so far on `id`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::UnknownConnection`] if `id` has no entry.
    pub fn buffer(&mut self, id: ConnectionId) -> Result<&[u8], RegistryError> {
        self.get(id).map(|connection| connection.buffer())
    }

    /// Whether `id` has an open connection.
    #[must_use]
    pub fn contains(&self, id: ConnectionId) -> bool {
        self.connections.contains_key(&id)
    }

    /// Number of open connections.
    #[must_use]
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    /// Whether no connection is open.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Whether [`Self::shutdown`] has run.
    #[must_use]
    pub const fn is_sealed(&self) -> bool {
        self.sealed
    }

    /// Close every remaining connection and seal the registry.
    ///
    /// Returns how many connections were still open.
    pub fn shutdown(&mut self) -> usize {
        let remaining = self.connections.len();
        self.connections.clear();
        self.sealed = true;
        if remaining > 0 {
            log::debug!("registry shutdown closed {remaining} connection(s)");
        }
        remaining
    }
}

impl fmt::Debug for ConnectionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionRegistry")
            .field("options", &self.options)
            .field("connections", &self.connections.len())
            .field("next_id", &self.next_id)
            .field("sealed", &self.sealed)
            .finish_non_exhaustive()
    }
}
