//! Document interface.
//!
//! [§ 3.1 The Document object](https://html.spec.whatwg.org/multipage/dom.html#the-document-object)
//!
//! Only the part loaders touch exists: the `cookie` accessor. The cookie
//! string itself lives in the sandbox state rather than on the instance, so
//! every `HTMLDocument` in a sandbox sees the same value and host objects can
//! update it without going through the script.

use boa_engine::{Context, JsData, JsResult, JsString, JsValue};
use boa_gc::{Finalize, Trace};

use crate::binding::{HostClass, Member, string_arg};
use crate::bridge::SandboxHandle;

/// Native half of an `HTMLDocument`. Holds nothing of its own.
#[derive(Debug, Trace, Finalize, JsData)]
pub(crate) struct HtmlDocument;

impl HostClass for HtmlDocument {
    const NAME: &'static str = "HTMLDocument";

    fn construct(
        _args: &[JsValue],
        handle: &SandboxHandle,
        _context: &mut Context,
    ) -> JsResult<Self> {
        handle.state().ensure_live()?;
        Ok(Self)
    }

    fn members() -> Vec<Member> {
        vec![Member::Accessor {
            name: "cookie",
            get: Some(get_cookie),
            set: Some(set_cookie),
        }]
    }
}

/// `document.cookie` getter.
///
/// [§ 3.1.3 cookie](https://html.spec.whatwg.org/multipage/dom.html#dom-document-cookie)
///
/// Returns the stored string verbatim.
fn get_cookie(
    _this: &JsValue,
    _args: &[JsValue],
    handle: &SandboxHandle,
    _context: &mut Context,
) -> JsResult<JsValue> {
    Ok(JsString::from(handle.state().document_cookie()).into())
}

/// `document.cookie = value` setter.
///
/// Stores the assignment after dropping a trailing `path=` attribute and an
/// `expires=` attribute next to it. Nothing else is interpreted.
fn set_cookie(
    _this: &JsValue,
    args: &[JsValue],
    handle: &SandboxHandle,
    context: &mut Context,
) -> JsResult<JsValue> {
    let state = handle.state();
    state.ensure_live()?;
    let value = string_arg(args, 0, context)?.unwrap_or_default();
    state.assign_document_cookie(&value);
    Ok(JsValue::undefined())
}
