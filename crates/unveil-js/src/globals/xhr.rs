//! `XMLHttpRequest` interface.
//!
//! [XMLHttpRequest Standard](https://xhr.spec.whatwg.org/)
//!
//! Synchronous only. There is no event loop, so `send()` blocks until the
//! response is in, moves straight from `UNSENT` to `DONE`, and invokes
//! `onreadystatechange` once. Response bodies are buffered on the connection
//! but never exposed to the script.

use std::cell::Cell;

use boa_engine::{Context, JsArgs, JsData, JsObject, JsResult, JsValue, js_string};
use boa_gc::{Finalize, Trace};
use unveil_net::{ConnectionId, Credentials, Method, Request};

use crate::binding::{HostClass, Member, string_arg, with_host_data};
use crate::bridge::{ConnectionLease, SandboxHandle};
use crate::error::BridgeError;

/// [§ 3.3 readyState](https://xhr.spec.whatwg.org/#states)
///
/// Only the two states a synchronous request can be observed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReadyState {
    /// "The object has been constructed."
    Unsent = 0,
    /// "The data transfer has been completed or something went wrong during
    /// the transfer."
    Done = 4,
}

impl ReadyState {
    const fn code(self) -> i32 {
        self as i32
    }
}

/// Native half of an `XMLHttpRequest`.
#[derive(Trace, Finalize, JsData)]
pub(crate) struct Xhr {
    #[unsafe_ignore_trace]
    lease: ConnectionLease,
    #[unsafe_ignore_trace]
    ready_state: Cell<ReadyState>,
    #[unsafe_ignore_trace]
    status: Cell<u16>,
}

impl Xhr {
    fn connection(&self) -> ConnectionId {
        self.lease.id()
    }

    fn complete(&self, status: u16) {
        self.status.set(status);
        self.ready_state.set(ReadyState::Done);
    }
}

impl HostClass for Xhr {
    const NAME: &'static str = "XMLHttpRequest";

    /// `new XMLHttpRequest()`
    ///
    /// Opens a connection seeded with the document's current cookies.
    fn construct(
        _args: &[JsValue],
        handle: &SandboxHandle,
        _context: &mut Context,
    ) -> JsResult<Self> {
        let state = handle.state();
        state.ensure_live()?;
        let lease = state.open_connection().map_err(|err| state.fail(err))?;
        log::trace!("{}: new XMLHttpRequest()", lease.id());
        Ok(Self {
            lease,
            ready_state: Cell::new(ReadyState::Unsent),
            status: Cell::new(0),
        })
    }

    fn members() -> Vec<Member> {
        vec![
            Member::Method("open", 2, open),
            Member::Method("send", 0, send),
            Member::Accessor {
                name: "readyState",
                get: Some(get_ready_state),
                set: None,
            },
            Member::Accessor {
                name: "status",
                get: Some(get_status),
                set: None,
            },
            Member::Constant("UNSENT", ReadyState::Unsent.code()),
            Member::Constant("DONE", ReadyState::Done.code()),
        ]
    }

    /// `onreadystatechange` starts out as an own `null` data property.
    fn initialize(instance: &JsObject, _args: &[JsValue], context: &mut Context) -> JsResult<()> {
        let _ = instance.set(js_string!("onreadystatechange"), JsValue::null(), false, context)?;
        Ok(())
    }
}

/// `xhr.open(method, url, async, user, password)`
///
/// [§ 3.5.1 open()](https://xhr.spec.whatwg.org/#the-open()-method)
///
/// Records the request for the next `send()`. Nothing goes out yet.
///
/// STEP 1: `async` must be falsy. A missing argument counts as `false`.
/// STEP 2: `method` must be exactly `GET`, `POST` or `PUT`.
/// STEP 3: Resolve `url` against the evaluation's base URL.
/// STEP 4: Keep `user` and `password` as credentials when given.
///
/// Violating STEP 1 or STEP 2 halts the evaluation.
fn open(
    this: &JsValue,
    args: &[JsValue],
    handle: &SandboxHandle,
    context: &mut Context,
) -> JsResult<JsValue> {
    let state = handle.state();
    state.ensure_live()?;
    let id = with_host_data(this, Xhr::connection)?;
    let method = string_arg(args, 0, context)?.unwrap_or_default();
    let href = string_arg(args, 1, context)?.unwrap_or_default();
    let asynchronous = args.get_or_undefined(2).to_boolean();
    let credentials = Credentials {
        username: string_arg(args, 3, context)?,
        password: string_arg(args, 4, context)?,
    };

    // STEP 1
    if asynchronous {
        return Err(state.fail(BridgeError::AsyncRequest));
    }

    // STEP 2
    let method: Method = method
        .parse()
        .map_err(|err| state.fail(BridgeError::Registry(err)))?;

    // STEP 3 + 4
    let request = Request::new(method, state.resolve(&href)).with_credentials(credentials);
    state.prepare(id, request).map_err(|err| state.fail(err))?;
    Ok(JsValue::undefined())
}

/// `xhr.send(body)`
///
/// [§ 3.5.6 send()](https://xhr.spec.whatwg.org/#the-send()-method)
///
/// STEP 1: Perform the request recorded by `open()` with `body`, blocking
///         until the response is in. Without a prior `open()` nothing is
///         sent and the status is `0`.
/// STEP 2: Set `status`, then `readyState` to `DONE`.
/// STEP 3: If `onreadystatechange` is callable, call it with the request as
///         `this`.
fn send(
    this: &JsValue,
    args: &[JsValue],
    handle: &SandboxHandle,
    context: &mut Context,
) -> JsResult<JsValue> {
    let state = handle.state();
    state.ensure_live()?;
    let id = with_host_data(this, Xhr::connection)?;
    let body = string_arg(args, 0, context)?;

    // STEP 1
    let status = state
        .send_prepared(id, body)
        .map_err(|err| state.fail(err))?;

    // STEP 2
    with_host_data(this, |xhr: &Xhr| xhr.complete(status))?;

    // STEP 3
    if let Some(receiver) = this.as_object() {
        let callback = receiver.get(js_string!("onreadystatechange"), context)?;
        if let Some(function) = callback.as_callable() {
            let _ = function.call(this, &[], context)?;
        }
    }
    Ok(JsValue::undefined())
}

/// [§ 3.3 readyState](https://xhr.spec.whatwg.org/#dom-xmlhttprequest-readystate)
fn get_ready_state(
    this: &JsValue,
    _args: &[JsValue],
    _handle: &SandboxHandle,
    _context: &mut Context,
) -> JsResult<JsValue> {
    let state = with_host_data(this, |xhr: &Xhr| xhr.ready_state.get())?;
    Ok(JsValue::from(state.code()))
}

/// [§ 3.6.2 status](https://xhr.spec.whatwg.org/#the-status-attribute)
fn get_status(
    this: &JsValue,
    _args: &[JsValue],
    _handle: &SandboxHandle,
    _context: &mut Context,
) -> JsResult<JsValue> {
    let status = with_host_data(this, |xhr: &Xhr| xhr.status.get())?;
    Ok(JsValue::from(i32::from(status)))
}
