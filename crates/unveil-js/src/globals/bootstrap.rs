//! Synthetic browser surface installed before any page script runs.
//!
//! Loader scripts probe a handful of globals to decide whether they are in a
//! real browser. This script answers those probes with plausible values for a
//! desktop Firefox on Linux.

use crate::config::SandboxConfig;

/// Build the bootstrap script for `config`.
///
/// Expects `window`, `HTMLDocument` and `Element` to be bound already.
pub(crate) fn bootstrap_source(config: &SandboxConfig) -> String {
    // JSON string literals are valid JavaScript string literals.
    let user_agent = serde_json::Value::String(config.user_agent.clone()).to_string();
    let outer_width = config.outer_width;
    let outer_height = config.outer_height;

    format!(
        r"var toString = function () {{ return '[object Window]'; }};
var document = new HTMLDocument();
document.cookie = '';
HTMLDocument.prototype.createElement = function (tag) {{ return new Element(tag); }};
var WebGLRenderingContext = function () {{}};
var location = {{ reload: function () {{}} }};
var constructor = {{ toString: function () {{ return 'function Window() {{ [native code] }}'; }} }};
var outerWidth = {outer_width}, outerHeight = {outer_height};
var WebAssembly = new Object();
var navigator = {{
  vendor: '',
  appName: 'Netscape',
  plugins: new Array(),
  platform: 'Linux x86_64',
  oscpu: 'Linux x86_64',
  webdriver: false,
  globalThis: window,
  language: 'en-US',
  userAgent: {user_agent}
}};
"
    )
}
