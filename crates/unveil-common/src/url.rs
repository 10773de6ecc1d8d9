//! URL resolution utilities.
//!
//! [URL Standard](https://url.spec.whatwg.org/)
//!
//! Scripts hand the sandbox whatever they find in the page: absolute URLs,
//! root-relative paths, bare file names, protocol-relative `//host/...`
//! references. Every request URL goes through [`resolve_url`] against the
//! base URL of the current evaluation before it reaches the transport.

use url::Url;

/// Resolve a potentially relative URL against the evaluation's base URL.
///
/// # Algorithm
///
/// [§ 2.5 URLs](https://html.spec.whatwg.org/multipage/urls-and-fetching.html#resolving-urls)
///
/// STEP 1: "If url is an absolute URL, return url."
///
/// STEP 2: "Otherwise, resolve url relative to base."
///
/// If the base itself does not parse (hosts sometimes pass a bare prefix such
/// as a host name without a scheme), the href is appended to the base
/// verbatim.
///
/// # Example
///
/// ```
/// use unveil_common::resolve_url;
///
/// let base = "https://example.com/landing/index.html";
/// assert_eq!(resolve_url("/go.js", base), "https://example.com/go.js");
/// assert_eq!(resolve_url("next", base), "https://example.com/landing/next");
/// assert_eq!(resolve_url("https://cdn.test/a.js", base), "https://cdn.test/a.js");
/// ```
#[must_use]
pub fn resolve_url(href: &str, base_url: &str) -> String {
    // STEP 1: Check if href is already absolute.
    //
    // [URL Standard § 4.3](https://url.spec.whatwg.org/#url-parsing)
    // "An absolute-URL string is a URL-scheme string, followed by U+003A (:),
    // followed by a scheme-specific part."
    //
    // The script's own spelling is kept so the request goes out exactly as the
    // script wrote it.
    if Url::parse(href).is_ok() {
        return href.to_string();
    }

    // STEP 2: Resolve relative URL against base.
    match Url::parse(base_url).and_then(|base| base.join(href)) {
        Ok(resolved) => resolved.into(),
        Err(_) => format!("{base_url}{href}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://example.com/dir/page.html?q=1";

    #[test]
    fn test_absolute_urls_pass_through() {
        assert_eq!(resolve_url("http://other.test/x", BASE), "http://other.test/x");
        assert_eq!(resolve_url("https://other.test", BASE), "https://other.test");
        assert_eq!(resolve_url("data:text/plain,hi", BASE), "data:text/plain,hi");
    }

    #[test]
    fn test_root_relative_path() {
        assert_eq!(resolve_url("/track?id=7", BASE), "https://example.com/track?id=7");
    }

    #[test]
    fn test_document_relative_path() {
        assert_eq!(resolve_url("img.gif", BASE), "https://example.com/dir/img.gif");
        assert_eq!(resolve_url("../up.js", BASE), "https://example.com/up.js");
    }

    #[test]
    fn test_protocol_relative() {
        assert_eq!(resolve_url("//cdn.test/l.js", BASE), "https://cdn.test/l.js");
    }

    #[test]
    fn test_origin_only_base() {
        assert_eq!(
            resolve_url("challenge", "https://example.com/"),
            "https://example.com/challenge"
        );
    }

    #[test]
    fn test_unparseable_base_concatenates() {
        assert_eq!(resolve_url("/path", "example.com"), "example.com/path");
        assert_eq!(resolve_url("/path", ""), "/path");
    }
}
