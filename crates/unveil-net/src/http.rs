//! Blocking HTTP transport built on `reqwest`.
//!
//! All handles share one `reqwest::blocking::Client` per set of
//! [`HandleOptions`]. A blocking client owns a runtime thread, so building one
//! per script object would cost a thread for every `createElement` call. Each
//! handle keeps its own [`CookieJar`], so cookies set on one script object's
//! connection never leak into another's except through `document.cookie`.
//!
//! Redirects are not followed: the `Set-Cookie` headers of every hop matter to
//! loader scripts, and a script that wants the next hop requests it itself.

use std::cell::RefCell;
use std::io::Write;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{COOKIE, SET_COOKIE};
use reqwest::redirect::Policy;
use url::Url;

use crate::error::TransportError;
use crate::jar::CookieJar;
use crate::transport::{HandleOptions, Method, Request, RequestHandle, Transport};

/// TCP keep-alive probe interval when keep-alive is enabled.
const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(60);

/// Transport that performs real network requests.
#[derive(Debug, Default)]
pub struct HttpTransport {
    clients: RefCell<Vec<(HandleOptions, Client)>>,
}

impl HttpTransport {
    /// Create the transport. Clients are built on first use.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            clients: RefCell::new(Vec::new()),
        }
    }

    /// Number of distinct clients built so far.
    #[must_use]
    pub fn client_count(&self) -> usize {
        self.clients.borrow().len()
    }

    /// The shared client for `options`, built the first time they are seen.
    fn client_for(&self, options: &HandleOptions) -> Result<Client, TransportError> {
        let mut clients = self.clients.borrow_mut();
        if let Some((_, client)) = clients.iter().find(|(built, _)| built == options) {
            return Ok(client.clone());
        }

        let mut builder = Client::builder()
            .user_agent(options.user_agent.clone())
            .redirect(Policy::none())
            .timeout(options.timeout);
        builder = if options.keep_alive {
            builder.tcp_keepalive(KEEPALIVE_INTERVAL)
        } else {
            builder.pool_max_idle_per_host(0)
        };

        let client = builder.build().map_err(TransportError::Client)?;
        log::debug!("built HTTP client for {:?}", options.user_agent);
        clients.push((options.clone(), client.clone()));
        Ok(client)
    }
}

impl Transport for HttpTransport {
    fn create_handle(
        &self,
        options: &HandleOptions,
    ) -> Result<Box<dyn RequestHandle>, TransportError> {
        Ok(Box::new(HttpHandle {
            client: self.client_for(options)?,
            jar: CookieJar::new(),
        }))
    }
}

/// One connection: a handle on the shared client plus the cookies it has
/// collected.
#[derive(Debug)]
struct HttpHandle {
    client: Client,
    jar: CookieJar,
}

impl RequestHandle for HttpHandle {
    fn seed_cookies(&mut self, cookies: &str) {
        self.jar.seed(cookies);
    }

    fn perform(&mut self, request: &Request, sink: &mut dyn Write) -> Result<u16, TransportError> {
        let url = Url::parse(&request.url).map_err(|source| TransportError::InvalidUrl {
            url: request.url.clone(),
            source,
        })?;

        let mut builder = self.client.request(http_method(request.method), url.as_str());
        if let Some(cookie) = self.jar.header_for(&url) {
            builder = builder.header(COOKIE, cookie);
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }
        if !request.credentials.is_empty() {
            let username = request.credentials.username.clone().unwrap_or_default();
            builder = builder.basic_auth(username, request.credentials.password.clone());
        }

        let mut response = builder.send()?;
        for value in response.headers().get_all(SET_COOKIE) {
            match value.to_str() {
                Ok(set_cookie) => self.jar.store(&url, set_cookie),
                Err(_) => log::debug!("ignoring non-ASCII Set-Cookie from {url}"),
            }
        }

        let status = response.status().as_u16();
        let _ = response.copy_to(sink)?;
        Ok(status)
    }

    fn cookie_list(&self) -> Vec<String> {
        self.jar.records()
    }
}

fn http_method(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
    }
}
