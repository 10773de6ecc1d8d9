//! Element interface.
//!
//! [§ 4.9 Interface Element](https://dom.spec.whatwg.org/#interface-element)
//!
//! An element is never attached to a tree. What matters is that assigning
//! `src` fetches the URL, the way an `<img>` or `<script>` would, and that the
//! response's cookies land in `document.cookie`.

use boa_engine::{Context, JsArgs, JsData, JsObject, JsResult, JsString, JsValue, js_string};
use boa_gc::{Finalize, Trace};
use unveil_net::{ConnectionId, Request};

use crate::binding::{HostClass, Member, string_arg, with_host_data};
use crate::bridge::{ConnectionLease, SandboxHandle};

/// Native half of an `Element`.
#[derive(Trace, Finalize, JsData)]
pub(crate) struct Element {
    tag: String,
    #[unsafe_ignore_trace]
    lease: ConnectionLease,
}

impl Element {
    fn connection(&self) -> ConnectionId {
        self.lease.id()
    }
}

impl HostClass for Element {
    const NAME: &'static str = "Element";
    const LENGTH: usize = 1;

    /// `new Element(tag)`
    ///
    /// Opens a connection seeded with the document's current cookies.
    fn construct(args: &[JsValue], handle: &SandboxHandle, context: &mut Context) -> JsResult<Self> {
        let state = handle.state();
        state.ensure_live()?;
        let tag = string_arg(args, 0, context)?.unwrap_or_default();
        let lease = state.open_connection().map_err(|err| state.fail(err))?;
        log::trace!("{}: new Element({tag:?})", lease.id());
        Ok(Self { tag, lease })
    }

    fn members() -> Vec<Member> {
        vec![
            Member::Accessor {
                name: "src",
                get: None,
                set: Some(set_src),
            },
            Member::Accessor {
                name: "tagName",
                get: Some(get_tag_name),
                set: None,
            },
        ]
    }

    /// `tag` is a plain own data property holding the constructor argument.
    fn initialize(instance: &JsObject, args: &[JsValue], context: &mut Context) -> JsResult<()> {
        let tag = args.get_or_undefined(0).clone();
        let _ = instance.set(js_string!("tag"), tag, false, context)?;
        Ok(())
    }
}

/// `element.src = href`
///
/// STEP 1: Resolve `href` against the evaluation's base URL.
/// STEP 2: GET it on the element's connection and wait for the response.
/// STEP 3: Replace `document.cookie` with the connection's cookies.
///
/// A transport failure is not reported to the script.
fn set_src(
    this: &JsValue,
    args: &[JsValue],
    handle: &SandboxHandle,
    context: &mut Context,
) -> JsResult<JsValue> {
    let state = handle.state();
    state.ensure_live()?;
    let href = string_arg(args, 0, context)?.unwrap_or_default();
    let id = with_host_data(this, Element::connection)?;

    // STEP 1
    let url = state.resolve(&href);

    // STEP 2 + 3
    let _status = state
        .perform(id, &Request::get(url))
        .map_err(|err| state.fail(err))?;
    Ok(JsValue::undefined())
}

/// [§ 4.9 tagName](https://dom.spec.whatwg.org/#dom-element-tagname)
///
/// "If this is in the HTML namespace and its node document is an HTML
/// document, then set qualifiedName to qualifiedName in ASCII uppercase."
fn get_tag_name(
    this: &JsValue,
    _args: &[JsValue],
    _handle: &SandboxHandle,
    _context: &mut Context,
) -> JsResult<JsValue> {
    let tag = with_host_data(this, |element: &Element| element.tag.to_ascii_uppercase())?;
    Ok(JsString::from(tag).into())
}
