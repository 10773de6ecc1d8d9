//! The seam between the sandbox and the code that performs requests.
//!
//! A [`Transport`] hands out [`RequestHandle`]s. Each handle is one native
//! connection: it owns its own cookie engine, performs one blocking request at
//! a time, and can report its cookie jar as raw record lines.

use std::fmt;
use std::io::Write;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{RegistryError, TransportError};

/// User-Agent sent with every sandbox request.
///
/// A plain desktop Firefox, so loader scripts that compare `navigator` against
/// the request headers see a consistent browser.
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64; rv:81.0) Gecko/20100101 Firefox/81.0";

/// HTTP methods the sandbox will issue.
///
/// [XMLHttpRequest § 3.5.1 open()](https://xhr.spec.whatwg.org/#the-open()-method)
///
/// Anything beyond these three is refused rather than emulated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// `GET`
    Get,
    /// `POST`
    Post,
    /// `PUT`
    Put,
}

impl Method {
    /// The method token as it appears on the wire.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
        }
    }
}

impl FromStr for Method {
    type Err = RegistryError;

    /// Parse a method token. Matching is exact and case-sensitive.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "GET" => Ok(Self::Get),
            "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            other => Err(RegistryError::UnsupportedMethod(other.to_string())),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Optional HTTP credentials passed to `XMLHttpRequest.open()`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    /// User name, if the script supplied one.
    pub username: Option<String>,
    /// Password, if the script supplied one.
    pub password: Option<String>,
}

impl Credentials {
    /// Whether neither a user name nor a password was supplied.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.username.is_none() && self.password.is_none()
    }
}

/// One request to perform on a handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// HTTP method.
    pub method: Method,
    /// Absolute request URL.
    pub url: String,
    /// Request body, if any.
    pub body: Option<String>,
    /// Credentials, if any.
    pub credentials: Credentials,
}

impl Request {
    /// A request with no body and no credentials.
    #[must_use]
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            body: None,
            credentials: Credentials::default(),
        }
    }

    /// A plain `GET`.
    #[must_use]
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::Get, url)
    }

    /// Attach a body.
    #[must_use]
    pub fn with_body(mut self, body: Option<String>) -> Self {
        self.body = body;
        self
    }

    /// Attach credentials.
    #[must_use]
    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }
}

/// Settings applied to every handle when it is opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandleOptions {
    /// User-Agent header value.
    pub user_agent: String,
    /// Enable TCP keep-alive on the connection.
    pub keep_alive: bool,
    /// Per-request timeout. `None` waits indefinitely.
    pub timeout: Option<Duration>,
}

impl Default for HandleOptions {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            keep_alive: true,
            timeout: None,
        }
    }
}

/// A source of request handles.
pub trait Transport {
    /// Allocate and configure a new handle. The handle starts with an empty
    /// cookie engine: it records `Set-Cookie` responses itself.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] if the handle cannot be allocated.
    fn create_handle(&self, options: &HandleOptions)
    -> Result<Box<dyn RequestHandle>, TransportError>;
}

/// One native connection.
pub trait RequestHandle {
    /// Install `cookies` (a `name=value; name=value` string) as the initial
    /// cookie state of this handle.
    fn seed_cookies(&mut self, cookies: &str);

    /// Perform one blocking request, writing the response body into `sink`.
    /// Returns the HTTP status code.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] if the request could not be completed.
    fn perform(&mut self, request: &Request, sink: &mut dyn Write) -> Result<u16, TransportError>;

    /// Snapshot of the handle's cookie jar as raw record lines.
    fn cookie_list(&self) -> Vec<String>;
}
