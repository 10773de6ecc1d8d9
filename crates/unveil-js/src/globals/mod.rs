//! JavaScript global objects.
//!
//! Registers everything a page script expects to find before its first
//! statement runs.
//!
//! # Implemented
//!
//! - `console` - [Console Standard](https://console.spec.whatwg.org/)
//! - `window` - [§ 7.2 The Window object](https://html.spec.whatwg.org/multipage/window-object.html)
//! - `document` - [§ 3.1 The Document object](https://html.spec.whatwg.org/multipage/dom.html#the-document-object)
//! - `Element` / `DOMElement` - [§ 4.9 Interface Element](https://dom.spec.whatwg.org/#interface-element)
//! - `XMLHttpRequest` - [XMLHttpRequest Standard](https://xhr.spec.whatwg.org/)
//! - `navigator`, `location`, `outerWidth` / `outerHeight` - static values
//!
//! # Not Implemented
//!
//! - `setTimeout`/`setInterval` - [§ 8.6 Timers](https://html.spec.whatwg.org/multipage/timers-and-user-prompts.html#timers)
//!   There is no event loop to run them on.

mod bootstrap;
mod console;
mod document;
mod element;
mod xhr;

use boa_engine::{Context, JsResult, JsValue, Source, js_string, property::Attribute};

use crate::binding::register_class;
use crate::bridge::SandboxHandle;
use crate::config::SandboxConfig;

/// Register all global objects on the context.
///
/// [§ 8.1.6.1 Realms and their counterparts](https://html.spec.whatwg.org/multipage/webappapis.html#realms-settings-objects-global-objects)
///
/// STEP 1: `console`.
/// STEP 2: `window` as the global object itself, and `onunload = null`.
/// STEP 3: The host classes.
/// STEP 4: The bootstrap script, which creates `document` and the static
///         browser surface.
pub(crate) fn register_globals(
    context: &mut Context,
    handle: &SandboxHandle,
    config: &SandboxConfig,
) -> JsResult<()> {
    // STEP 1
    console::register_console(context)?;

    // STEP 2
    let global = context.global_object();
    context.register_global_property(js_string!("window"), global, Attribute::all())?;
    context.register_global_property(js_string!("onunload"), JsValue::null(), Attribute::all())?;

    // STEP 3
    let _ = register_class::<document::HtmlDocument>(context, handle)?;
    let element = register_class::<element::Element>(context, handle)?;
    context.register_global_property(
        js_string!("DOMElement"),
        element,
        Attribute::WRITABLE | Attribute::CONFIGURABLE,
    )?;
    let _ = register_class::<xhr::Xhr>(context, handle)?;

    // STEP 4
    let _ = context.eval(Source::from_bytes(&bootstrap::bootstrap_source(config)))?;
    Ok(())
}
