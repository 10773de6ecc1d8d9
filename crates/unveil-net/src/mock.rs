//! In-memory transport for tests.
//!
//! [`ScriptedTransport`] serves canned responses by exact URL, records every
//! request it sees, and counts handle allocation and release so tests can
//! check connection lifetimes without touching the network.

use std::cell::RefCell;
use std::collections::HashMap;
use std::io::Write;
use std::rc::Rc;

use crate::error::TransportError;
use crate::transport::{Credentials, HandleOptions, Method, Request, RequestHandle, Transport};

/// Build a Netscape cookie-file line like the HTTP transport reports.
#[must_use]
pub fn netscape_record(domain: &str, name: &str, value: &str) -> String {
    format!("{domain}\tFALSE\t/\tFALSE\t0\t{name}\t{value}")
}

/// Canned response for one URL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Route {
    /// Status code to report.
    pub status: u16,
    /// Body to write into the connection's buffer.
    pub body: String,
    /// Raw cookie records added to the handle's jar.
    pub cookies: Vec<String>,
}

impl Route {
    /// A response with `status`, no body and no cookies.
    #[must_use]
    pub fn new(status: u16) -> Self {
        Self {
            status,
            ..Self::default()
        }
    }

    /// Set the body.
    #[must_use]
    pub fn with_body(mut self, body: &str) -> Self {
        self.body = body.to_string();
        self
    }

    /// Add a raw cookie record.
    #[must_use]
    pub fn with_cookie(mut self, record: String) -> Self {
        self.cookies.push(record);
        self
    }
}

/// A request as observed by the scripted transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    /// Index of the handle that performed it, in allocation order.
    pub handle: usize,
    /// HTTP method.
    pub method: Method,
    /// Request URL.
    pub url: String,
    /// Request body.
    pub body: Option<String>,
    /// Credentials.
    pub credentials: Credentials,
    /// The handle's cookie records at the time of the request.
    pub cookies: Vec<String>,
}

#[derive(Debug, Default)]
struct Shared {
    routes: HashMap<String, Route>,
    requests: Vec<RecordedRequest>,
    options: Vec<HandleOptions>,
    seeds: Vec<String>,
    created: usize,
    dropped: usize,
    refuse: bool,
}

/// Transport that answers from a fixed route table.
///
/// Clones share state, so a test can keep one clone for inspection and hand
/// another to the code under test. Unknown URLs fail like a refused
/// connection.
#[derive(Debug, Clone, Default)]
pub struct ScriptedTransport {
    shared: Rc<RefCell<Shared>>,
}

impl ScriptedTransport {
    /// A transport with no routes.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `route` for requests to exactly `url`.
    #[must_use]
    pub fn with_route(self, url: &str, route: Route) -> Self {
        let _ = self.shared.borrow_mut().routes.insert(url.to_string(), route);
        self
    }

    /// Make every later `create_handle` call fail.
    pub fn refuse_handles(&self) {
        self.shared.borrow_mut().refuse = true;
    }

    /// Every request performed so far, in order.
    #[must_use]
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.shared.borrow().requests.clone()
    }

    /// Options each handle was created with, in allocation order.
    #[must_use]
    pub fn handle_options(&self) -> Vec<HandleOptions> {
        self.shared.borrow().options.clone()
    }

    /// Non-empty seeds installed on handles, in order.
    #[must_use]
    pub fn seeds(&self) -> Vec<String> {
        self.shared.borrow().seeds.clone()
    }

    /// How many handles were allocated.
    #[must_use]
    pub fn handles_created(&self) -> usize {
        self.shared.borrow().created
    }

    /// How many handles were dropped.
    #[must_use]
    pub fn handles_dropped(&self) -> usize {
        self.shared.borrow().dropped
    }

    /// Handles allocated and not yet dropped.
    #[must_use]
    pub fn handles_live(&self) -> usize {
        let shared = self.shared.borrow();
        shared.created - shared.dropped
    }
}

impl Transport for ScriptedTransport {
    fn create_handle(
        &self,
        options: &HandleOptions,
    ) -> Result<Box<dyn RequestHandle>, TransportError> {
        let mut shared = self.shared.borrow_mut();
        if shared.refuse {
            return Err(TransportError::Unavailable("handle allocation refused".to_string()));
        }
        let index = shared.created;
        shared.created += 1;
        shared.options.push(options.clone());
        Ok(Box::new(ScriptedHandle {
            index,
            shared: Rc::clone(&self.shared),
            jar: Vec::new(),
        }))
    }
}

struct ScriptedHandle {
    index: usize,
    shared: Rc<RefCell<Shared>>,
    jar: Vec<String>,
}

/// Cookie name of a tab-delimited record, if it is one.
fn record_name(record: &str) -> Option<&str> {
    let mut fields = record.rsplit('\t');
    let _value = fields.next()?;
    fields.next()
}

impl RequestHandle for ScriptedHandle {
    /// Seeds land in the jar as one domainless record per pair, the shape
    /// the HTTP transport's jar reports them in.
    fn seed_cookies(&mut self, cookies: &str) {
        self.shared.borrow_mut().seeds.push(cookies.to_string());
        let pairs = cookies
            .split(';')
            .filter_map(|pair| pair.split_once('='))
            .map(|(name, value)| (name.trim(), value.trim()))
            .filter(|(name, _)| !name.is_empty());
        for (name, value) in pairs {
            self.jar.push(netscape_record("", name, value));
        }
    }

    fn perform(&mut self, request: &Request, sink: &mut dyn Write) -> Result<u16, TransportError> {
        let route = {
            let mut shared = self.shared.borrow_mut();
            shared.requests.push(RecordedRequest {
                handle: self.index,
                method: request.method,
                url: request.url.clone(),
                body: request.body.clone(),
                credentials: request.credentials.clone(),
                cookies: self.jar.clone(),
            });
            shared.routes.get(&request.url).cloned()
        };

        let Some(route) = route else {
            return Err(TransportError::Unavailable(format!(
                "connection refused: {}",
                request.url
            )));
        };

        for record in route.cookies {
            let name = record_name(&record).map(str::to_string);
            self.jar
                .retain(|existing| name.is_none() || record_name(existing) != name.as_deref());
            self.jar.push(record);
        }
        sink.write_all(route.body.as_bytes())
            .map_err(|err| TransportError::Unavailable(err.to_string()))?;
        Ok(route.status)
    }

    fn cookie_list(&self) -> Vec<String> {
        self.jar.clone()
    }
}

impl Drop for ScriptedHandle {
    fn drop(&mut self) {
        self.shared.borrow_mut().dropped += 1;
    }
}
