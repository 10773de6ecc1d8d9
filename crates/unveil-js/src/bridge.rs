//! State shared between the sandbox and its host objects.
//!
//! Every host function reaches the sandbox through a [`SandboxHandle`]
//! captured when the function object was built. The handle points at one
//! [`SandboxState`] per [`crate::Sandbox`]: the document's cookie string, the
//! base URL of the current evaluation, the connection registry, and the slot
//! that records the first fatal error.
//!
//! The registry is only ever borrowed for the duration of a single registry
//! call and never across a call back into the engine.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use boa_engine::{JsError, JsNativeError, JsResult};
use boa_gc::{Finalize, Trace};
use unveil_common::{compact, resolve_url, strip_assignment_attributes};
use unveil_net::{ConnectionId, ConnectionRegistry, Exchange, Method, Request};

use crate::error::BridgeError;

/// One request performed by a host object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestRecord {
    /// HTTP method.
    pub method: Method,
    /// Absolute URL after resolution against the base URL.
    pub url: String,
    /// Response status, `0` on transport failure.
    pub status: u16,
}

/// Mutable state behind one sandbox.
pub(crate) struct SandboxState {
    cookie: RefCell<String>,
    base_url: RefCell<String>,
    registry: Rc<RefCell<ConnectionRegistry>>,
    fatal: RefCell<Option<BridgeError>>,
    requests: RefCell<Vec<RequestRecord>>,
}

impl SandboxState {
    pub(crate) fn new(registry: ConnectionRegistry) -> Self {
        Self {
            cookie: RefCell::new(String::new()),
            base_url: RefCell::new(String::new()),
            registry: Rc::new(RefCell::new(registry)),
            fatal: RefCell::new(None),
            requests: RefCell::new(Vec::new()),
        }
    }

    /// Start a new evaluation against `base_url`.
    pub(crate) fn begin(&self, base_url: &str) {
        base_url.clone_into(&mut self.base_url.borrow_mut());
        // A fatal error is handed out by the evaluation that raised it.
        if let Some(stale) = self.fatal.borrow_mut().take() {
            log::warn!("discarding unreported fatal error: {stale}");
        }
    }

    pub(crate) fn document_cookie(&self) -> String {
        self.cookie.borrow().clone()
    }

    /// `document.cookie = value` from script or from the host seed.
    pub(crate) fn assign_document_cookie(&self, value: &str) {
        let stored = strip_assignment_attributes(value);
        log::trace!("document.cookie <- {stored:?}");
        stored.clone_into(&mut self.cookie.borrow_mut());
    }

    /// Resolve a script-supplied href against the current base URL.
    pub(crate) fn resolve(&self, href: &str) -> String {
        resolve_url(href, &self.base_url.borrow())
    }

    /// Open a connection for a new host object, seeded with the document's
    /// current cookies.
    pub(crate) fn open_connection(&self) -> Result<ConnectionLease, BridgeError> {
        let seed = self.document_cookie();
        let id = self.registry.borrow_mut().open(Some(&seed))?;
        Ok(ConnectionLease {
            id,
            registry: Rc::downgrade(&self.registry),
        })
    }

    /// Record the request a later [`Self::send_prepared`] performs.
    pub(crate) fn prepare(&self, id: ConnectionId, request: Request) -> Result<(), BridgeError> {
        self.registry.borrow_mut().prepare(id, request)?;
        Ok(())
    }

    /// Perform the prepared request with `body`. Without a prepared request
    /// nothing goes out and the status is `0`.
    pub(crate) fn send_prepared(
        &self,
        id: ConnectionId,
        body: Option<String>,
    ) -> Result<u16, BridgeError> {
        let performed = self.registry.borrow_mut().perform_prepared(id, body)?;
        Ok(performed.map_or(0, |(request, exchange)| self.absorb(&request, exchange)))
    }

    /// Perform `request` on `id` and fold the connection's cookies back into
    /// the document.
    pub(crate) fn perform(&self, id: ConnectionId, request: &Request) -> Result<u16, BridgeError> {
        let exchange = self.registry.borrow_mut().perform(id, request)?;
        Ok(self.absorb(request, exchange))
    }

    /// Log a finished request and replace `document.cookie` with the
    /// connection's compacted cookies, unless there are none.
    fn absorb(&self, request: &Request, exchange: Exchange) -> u16 {
        self.requests.borrow_mut().push(RequestRecord {
            method: request.method,
            url: request.url.clone(),
            status: exchange.status,
        });

        let cookies = compact(&exchange.cookies);
        if !cookies.is_empty() {
            log::trace!("document.cookie <- {cookies:?}");
            *self.cookie.borrow_mut() = cookies;
        }
        exchange.status
    }

    /// Requests performed since `start`.
    pub(crate) fn requests_since(&self, start: usize) -> Vec<RequestRecord> {
        self.requests
            .borrow()
            .get(start..)
            .map(<[RequestRecord]>::to_vec)
            .unwrap_or_default()
    }

    pub(crate) fn request_count(&self) -> usize {
        self.requests.borrow().len()
    }

    pub(crate) fn open_connections(&self) -> usize {
        self.registry.borrow().len()
    }

    /// Close every connection and ignore later releases.
    pub(crate) fn shutdown(&self) -> usize {
        self.registry.borrow_mut().shutdown()
    }

    /// Record `error` as fatal and build the exception that unwinds the
    /// script. Only the first fatal error of an evaluation is kept.
    ///
    /// The exception is of the runtime-limit kind, which the engine unwinds
    /// through every frame without running `catch` or `finally` blocks.
    pub(crate) fn fail(&self, error: BridgeError) -> JsError {
        log::error!("fatal: {error}");
        let message = format!("unveil: {error}");
        let mut slot = self.fatal.borrow_mut();
        if slot.is_none() {
            *slot = Some(error);
        }
        JsNativeError::runtime_limit().with_message(message).into()
    }

    /// Refuse to do anything once a fatal error has been raised.
    ///
    /// Script code cannot observe the fatal exception, but `onunload` and
    /// getters the host reads may still reach a host function.
    pub(crate) fn ensure_live(&self) -> JsResult<()> {
        if self.fatal.borrow().is_some() {
            return Err(JsNativeError::runtime_limit()
                .with_message("unveil: sandbox halted after a fatal error")
                .into());
        }
        Ok(())
    }

    pub(crate) fn take_fatal(&self) -> Option<BridgeError> {
        self.fatal.borrow_mut().take()
    }
}

/// Shared pointer to [`SandboxState`], captured by host functions.
#[derive(Clone, Trace, Finalize)]
pub(crate) struct SandboxHandle {
    #[unsafe_ignore_trace]
    state: Rc<SandboxState>,
}

impl SandboxHandle {
    pub(crate) const fn new(state: Rc<SandboxState>) -> Self {
        Self { state }
    }

    pub(crate) fn state(&self) -> &SandboxState {
        &self.state
    }
}

/// Ownership of one registry entry by one host object.
///
/// Dropping the lease is the finalizer: when the engine collects the object
/// that holds it, its connection is released. Once the sandbox has shut the
/// registry down the release is a no-op.
pub(crate) struct ConnectionLease {
    id: ConnectionId,
    registry: Weak<RefCell<ConnectionRegistry>>,
}

impl ConnectionLease {
    pub(crate) const fn id(&self) -> ConnectionId {
        self.id
    }
}

impl Drop for ConnectionLease {
    fn drop(&mut self) {
        let Some(shared) = self.registry.upgrade() else {
            return;
        };
        let Ok(mut registry) = shared.try_borrow_mut() else {
            log::error!("{}: registry busy at release, left for shutdown", self.id);
            return;
        };
        if let Err(err) = registry.release(self.id) {
            log::error!("{err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use boa_engine::error::JsNativeErrorKind;
    use unveil_net::HandleOptions;
    use unveil_net::mock::{Route, ScriptedTransport, netscape_record};

    fn is_runtime_limit(error: &JsError) -> bool {
        matches!(
            error.as_native().map(|native| &native.kind),
            Some(JsNativeErrorKind::RuntimeLimit)
        )
    }

    fn state_with(transport: &ScriptedTransport) -> SandboxState {
        let registry = ConnectionRegistry::new(Box::new(transport.clone()), HandleOptions::default());
        SandboxState::new(registry)
    }

    #[test]
    fn test_dropping_lease_closes_connection() {
        let transport = ScriptedTransport::new();
        let state = state_with(&transport);

        let lease = state.open_connection().unwrap();
        let id = lease.id();
        assert!(state.registry.borrow().contains(id));

        drop(lease);
        assert!(!state.registry.borrow().contains(id));
        assert_eq!(transport.handles_live(), 0);
    }

    #[test]
    fn test_lease_dropped_after_shutdown_is_ignored() {
        let transport = ScriptedTransport::new();
        let state = state_with(&transport);

        let first = state.open_connection().unwrap();
        let second = state.open_connection().unwrap();
        assert_eq!(state.shutdown(), 2);
        assert_eq!(transport.handles_live(), 0);

        drop(first);
        drop(second);
        assert_eq!(state.open_connections(), 0);
    }

    #[test]
    fn test_open_seeds_document_cookie() {
        let transport = ScriptedTransport::new();
        let state = state_with(&transport);

        let _empty = state.open_connection().unwrap();
        state.assign_document_cookie("sid=1");
        let _seeded = state.open_connection().unwrap();

        assert_eq!(transport.seeds(), vec!["sid=1".to_string()]);
    }

    #[test]
    fn test_perform_folds_cookies_into_document() {
        let transport = ScriptedTransport::new().with_route(
            "https://example.com/pixel",
            Route::new(204).with_cookie(netscape_record("example.com", "track", "42")),
        );
        let state = state_with(&transport);
        state.assign_document_cookie("sid=1");

        let lease = state.open_connection().unwrap();
        let status = state
            .perform(lease.id(), &Request::get("https://example.com/pixel"))
            .unwrap();

        assert_eq!(status, 204);
        assert_eq!(state.document_cookie(), "sid=1; track=42");
        assert_eq!(
            state.requests_since(0),
            vec![RequestRecord {
                method: Method::Get,
                url: "https://example.com/pixel".to_string(),
                status: 204,
            }]
        );
    }

    #[test]
    fn test_failed_request_keeps_document_cookie() {
        let transport = ScriptedTransport::new();
        let state = state_with(&transport);
        state.assign_document_cookie("a=1");

        let lease = state.open_connection().unwrap();
        let status = state
            .perform(lease.id(), &Request::get("https://unreachable.test/"))
            .unwrap();

        assert_eq!(status, 0);
        assert_eq!(state.document_cookie(), "a=1");
    }

    #[test]
    fn test_send_without_prepare_is_silent() {
        let transport = ScriptedTransport::new();
        let state = state_with(&transport);

        let lease = state.open_connection().unwrap();
        assert_eq!(state.send_prepared(lease.id(), Some("x".to_string())).unwrap(), 0);
        assert!(transport.requests().is_empty());
        assert_eq!(state.request_count(), 0);
    }

    #[test]
    fn test_first_fatal_error_wins() {
        let transport = ScriptedTransport::new();
        let state = state_with(&transport);
        assert!(state.ensure_live().is_ok());

        assert!(is_runtime_limit(&state.fail(BridgeError::AsyncRequest)));
        let _ = state.fail(BridgeError::Registry(
            unveil_net::RegistryError::UnsupportedMethod("DELETE".to_string()),
        ));

        let halted = state.ensure_live().unwrap_err();
        assert!(is_runtime_limit(&halted));
        assert!(matches!(state.take_fatal(), Some(BridgeError::AsyncRequest)));
        assert!(state.ensure_live().is_ok());
    }

    #[test]
    fn test_assignment_strips_trailing_attributes() {
        let state = state_with(&ScriptedTransport::new());
        state.assign_document_cookie("a=1; path=/; expires=Wed, 01 Jan 2031 00:00:00 GMT");
        assert_eq!(state.document_cookie(), "a=1");
    }
}
