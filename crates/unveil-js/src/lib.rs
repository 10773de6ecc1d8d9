//! Browser emulation sandbox for crawled page scripts.
//!
//! Uses [Boa](https://boajs.dev/) as the JavaScript engine.
//!
//! A crawler that fetched a page hands its inline scripts to a [`Sandbox`]
//! together with the page URL and the cookies it already holds. The script
//! runs against a minimal browser surface. Every `img.src = ...` assignment
//! and every `XMLHttpRequest` really goes out on the network, and whatever
//! cookies come back are folded into `document.cookie`. When the script is
//! done, the host reads the final cookie string back out.
//!
//! # Example
//!
//! ```no_run
//! use unveil_js::{Sandbox, SandboxConfig};
//!
//! let mut sandbox = Sandbox::new(SandboxConfig::default())?;
//! let cookies = sandbox.evaluate(
//!     "https://example.com/",
//!     "document.createElement('img').src = '/beacon.gif';",
//!     "sid=abc",
//! )?;
//! println!("{cookies}");
//! # Ok::<(), unveil_js::SandboxError>(())
//! ```
//!
//! # Implemented
//!
//! - `document.cookie` get/set
//! - `document.createElement()` returning an `Element` whose `src` setter
//!   performs a GET
//! - Synchronous `XMLHttpRequest` with `open()`, `send()`, `readyState`,
//!   `status` and `onreadystatechange`
//! - `window`, `navigator`, `location`, `outerWidth`/`outerHeight`
//! - `onunload`, called once after the script
//! - `console.*` routed to the `log` facade
//!
//! # Not Implemented
//!
//! - Asynchronous requests, timers and the event loop
//! - A DOM tree, layout or rendering
//! - Response bodies exposed to the script

mod binding;
mod bridge;
mod config;
mod error;
mod globals;

use std::rc::Rc;

use boa_engine::{Context, JsError, JsValue, Source, js_string};
use unveil_net::{ConnectionRegistry, HttpTransport, Transport};

pub use bridge::RequestRecord;
pub use config::SandboxConfig;
pub use error::{BridgeError, SandboxError};

use bridge::{SandboxHandle, SandboxState};

/// Log target for uncaught script exceptions.
pub const SCRIPT_LOG_TARGET: &str = "unveil::script";

/// Everything one evaluation produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Evaluation {
    /// `document.cookie` after the script and `onunload` ran.
    pub cookies: String,
    /// Uncaught exceptions, in the order they were reported.
    pub exceptions: Vec<String>,
    /// Requests performed by host objects during this evaluation.
    pub requests: Vec<RequestRecord>,
}

/// A JavaScript context with the browser surface installed.
///
/// One sandbox runs scripts one at a time on the calling thread. State such
/// as `document.cookie` and global variables carries over between
/// evaluations. Dropping the sandbox closes every connection its host
/// objects still hold.
pub struct Sandbox {
    /// The Boa JavaScript context.
    context: Context,
    state: Rc<SandboxState>,
    exception_handler: Box<dyn FnMut(&str)>,
}

impl Sandbox {
    /// Create a sandbox that talks HTTP through `reqwest`.
    ///
    /// # Errors
    ///
    /// Returns [`SandboxError::Bootstrap`] if the browser surface cannot be
    /// installed.
    pub fn new(config: SandboxConfig) -> Result<Self, SandboxError> {
        Self::with_transport(config, Box::new(HttpTransport::new()))
    }

    /// Create a sandbox whose connections are opened on `transport`.
    ///
    /// # Errors
    ///
    /// Returns [`SandboxError::Bootstrap`] if the browser surface cannot be
    /// installed.
    pub fn with_transport(
        config: SandboxConfig,
        transport: Box<dyn Transport>,
    ) -> Result<Self, SandboxError> {
        let registry = ConnectionRegistry::new(transport, config.handle_options());
        let state = Rc::new(SandboxState::new(registry));

        let mut context = Context::default();
        config.apply_limits(&mut context);
        globals::register_globals(&mut context, &SandboxHandle::new(Rc::clone(&state)), &config)
            .map_err(|err| SandboxError::Bootstrap(err.to_string()))?;
        log::debug!("sandbox ready ({:?})", config.user_agent);

        Ok(Self {
            context,
            state,
            exception_handler: Box::new(|report| {
                log::warn!(target: SCRIPT_LOG_TARGET, "uncaught exception: {report}");
            }),
        })
    }

    /// Replace the callback that receives uncaught script exceptions.
    ///
    /// The default logs them at `warn` level under [`SCRIPT_LOG_TARGET`].
    pub fn set_exception_handler(&mut self, handler: impl FnMut(&str) + 'static) {
        self.exception_handler = Box::new(handler);
    }

    /// Run `script` as if loaded from `base_url` and return the resulting
    /// `document.cookie`.
    ///
    /// See [`Self::evaluate_detailed`].
    ///
    /// # Errors
    ///
    /// Returns [`SandboxError::Fatal`] if a host object hit a contract
    /// violation. Script exceptions are not errors.
    pub fn evaluate(
        &mut self,
        base_url: &str,
        script: &str,
        seed_cookies: &str,
    ) -> Result<String, SandboxError> {
        self.evaluate_detailed(base_url, script, seed_cookies)
            .map(|evaluation| evaluation.cookies)
    }

    /// Run `script` as if loaded from `base_url`.
    ///
    /// STEP 1: Remember `base_url` for resolving relative URLs.
    /// STEP 2: If `seed_cookies` is non-empty, assign it to `document.cookie`.
    /// STEP 3: Evaluate `script`. An uncaught exception is reported to the
    ///         exception handler and evaluation continues.
    /// STEP 4: If `window.onunload` is callable, call it once.
    /// STEP 5: Read back `document.cookie`.
    ///
    /// # Errors
    ///
    /// Returns [`SandboxError::Fatal`] if a host object hit a contract
    /// violation during STEP 3 or STEP 4. The rest of the evaluation is
    /// skipped.
    pub fn evaluate_detailed(
        &mut self,
        base_url: &str,
        script: &str,
        seed_cookies: &str,
    ) -> Result<Evaluation, SandboxError> {
        // STEP 1
        self.state.begin(base_url);
        let first_request = self.state.request_count();
        let mut exceptions = Vec::new();

        // STEP 2
        if !seed_cookies.is_empty() {
            self.state.assign_document_cookie(seed_cookies);
        }

        // STEP 3
        let result = self.context.eval(Source::from_bytes(script));
        self.check_fatal()?;
        if let Err(error) = result {
            self.report(&error, &mut exceptions);
        }

        // STEP 4
        self.run_onunload(&mut exceptions);
        self.check_fatal()?;

        // STEP 5
        let evaluation = Evaluation {
            cookies: self.state.document_cookie(),
            exceptions,
            requests: self.state.requests_since(first_request),
        };
        log::debug!(
            "evaluation of {base_url} done: {} request(s), {} exception(s)",
            evaluation.requests.len(),
            evaluation.exceptions.len()
        );
        Ok(evaluation)
    }

    /// The current `document.cookie`.
    #[must_use]
    pub fn cookies(&self) -> String {
        self.state.document_cookie()
    }

    /// Connections held by host objects the engine has not yet collected.
    #[must_use]
    pub fn open_connections(&self) -> usize {
        self.state.open_connections()
    }

    fn run_onunload(&mut self, exceptions: &mut Vec<String>) {
        let global = self.context.global_object();
        let handler = match global.get(js_string!("onunload"), &mut self.context) {
            Ok(handler) => handler,
            Err(error) => {
                self.report(&error, exceptions);
                return;
            }
        };
        let Some(function) = handler.as_callable() else {
            return;
        };
        let Err(error) = function.call(&JsValue::undefined(), &[], &mut self.context) else {
            return;
        };
        // The exception unwinding a fatal error is not the script's own.
        if self.state.ensure_live().is_ok() {
            self.report(&error, exceptions);
        }
    }

    fn check_fatal(&self) -> Result<(), SandboxError> {
        match self.state.take_fatal() {
            Some(error) => Err(SandboxError::Fatal(error)),
            None => Ok(()),
        }
    }

    fn report(&mut self, error: &JsError, exceptions: &mut Vec<String>) {
        let report = error
            .try_native(&mut self.context)
            .map_or_else(|_| error.to_string(), |native| native.to_string());
        (self.exception_handler)(&report);
        exceptions.push(report);
    }
}

impl Drop for Sandbox {
    fn drop(&mut self) {
        let closed = self.state.shutdown();
        log::debug!("sandbox dropped, {closed} connection(s) closed");
    }
}

impl std::fmt::Debug for Sandbox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sandbox")
            .field("cookies", &self.state.document_cookie())
            .field("open_connections", &self.state.open_connections())
            .finish_non_exhaustive()
    }
}
