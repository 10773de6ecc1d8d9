//! Per-handle cookie engine for the HTTP transport.
//!
//! [RFC 6265 § 5 User Agent Requirements](https://www.rfc-editor.org/rfc/rfc6265#section-5)
//!
//! Each handle keeps its own jar, the way a native HTTP library tracks
//! `Set-Cookie` headers per easy handle. The jar can be seeded from a
//! `document.cookie` string and reports its contents as Netscape cookie-file
//! lines:
//!
//! ```text
//! domain <TAB> include-subdomains <TAB> path <TAB> secure <TAB> expires <TAB> name <TAB> value
//! ```
//!
//! NOTE: Only what loader scripts exercise is implemented: Domain, Path,
//! Secure, `HttpOnly`, Expires and Max-Age. `SameSite` and the public suffix
//! list are ignored.

use chrono::{DateTime, NaiveDateTime, Utc};
use url::Url;

/// `Expires` formats seen in the wild besides RFC 2822.
const LEGACY_EXPIRES_FORMATS: &[&str] = &[
    "%a, %d-%b-%Y %H:%M:%S GMT",
    "%a, %d-%b-%y %H:%M:%S GMT",
    "%A, %d-%b-%y %H:%M:%S GMT",
];

/// Netscape cookie-file prefix for `HttpOnly` cookies.
const HTTP_ONLY_PREFIX: &str = "#HttpOnly_";

#[derive(Debug, Clone, PartialEq, Eq)]
struct StoredCookie {
    /// Lowercased domain without a leading dot. Empty for seeded cookies,
    /// which are sent to every host.
    domain: String,
    host_only: bool,
    path: String,
    secure: bool,
    http_only: bool,
    /// Unix timestamp, `0` for session cookies.
    expires: i64,
    name: String,
    value: String,
}

impl StoredCookie {
    fn is_expired(&self, now: i64) -> bool {
        self.expires != 0 && self.expires <= now
    }

    fn same_slot(&self, other: &Self) -> bool {
        self.name == other.name && self.domain == other.domain && self.path == other.path
    }

    fn matches(&self, url: &Url) -> bool {
        if self.secure && url.scheme() != "https" {
            return false;
        }
        let host = url.host_str().unwrap_or_default().to_ascii_lowercase();
        let domain_ok = if self.domain.is_empty() {
            true
        } else if self.host_only {
            host == self.domain
        } else {
            host == self.domain || host.ends_with(&format!(".{}", self.domain))
        };
        domain_ok && path_matches(url.path(), &self.path)
    }

    fn record(&self) -> String {
        let prefix = if self.http_only { HTTP_ONLY_PREFIX } else { "" };
        let domain = if self.host_only || self.domain.is_empty() {
            self.domain.clone()
        } else {
            format!(".{}", self.domain)
        };
        format!(
            "{prefix}{domain}\t{}\t{}\t{}\t{}\t{}\t{}",
            netscape_bool(!self.host_only),
            self.path,
            netscape_bool(self.secure),
            self.expires,
            self.name,
            self.value,
        )
    }
}

/// A handle's cookie store.
#[derive(Debug, Clone, Default)]
pub struct CookieJar {
    cookies: Vec<StoredCookie>,
}

impl CookieJar {
    /// Create an empty jar.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            cookies: Vec::new(),
        }
    }

    /// Number of live cookies.
    #[must_use]
    pub fn len(&self) -> usize {
        let now = Utc::now().timestamp();
        self.cookies.iter().filter(|c| !c.is_expired(now)).count()
    }

    /// Whether the jar holds no live cookies.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Install `name=value` pairs from a `document.cookie` style string.
    ///
    /// Seeded cookies carry no domain and are sent to every host on path `/`.
    pub fn seed(&mut self, cookies: &str) {
        for pair in cookies.split(';') {
            let Some((name, value)) = pair.split_once('=') else {
                continue;
            };
            let name = name.trim();
            if name.is_empty() {
                continue;
            }
            self.insert(StoredCookie {
                domain: String::new(),
                host_only: true,
                path: "/".to_string(),
                secure: false,
                http_only: false,
                expires: 0,
                name: name.to_string(),
                value: value.trim().to_string(),
            });
        }
    }

    /// Record one `Set-Cookie` header value received from `url`.
    ///
    /// [RFC 6265 § 5.2](https://www.rfc-editor.org/rfc/rfc6265#section-5.2)
    pub fn store(&mut self, url: &Url, set_cookie: &str) {
        let now = Utc::now().timestamp();
        let mut parts = set_cookie.split(';');

        // STEP 1: "If the name-value-pair string lacks a %x3D ("=") character,
        //          ignore the set-cookie-string entirely."
        let Some((name, value)) = parts.next().and_then(|pair| pair.split_once('=')) else {
            return;
        };
        let name = name.trim();
        if name.is_empty() {
            return;
        }

        let host = url.host_str().unwrap_or_default().to_ascii_lowercase();
        let mut cookie = StoredCookie {
            domain: host.clone(),
            host_only: true,
            path: default_path(url),
            secure: false,
            http_only: false,
            expires: 0,
            name: name.to_string(),
            value: value.trim().to_string(),
        };
        let mut max_age = None;

        // STEP 2: Process attributes.
        for attribute in parts {
            let (key, val) = attribute
                .split_once('=')
                .map_or((attribute.trim(), ""), |(k, v)| (k.trim(), v.trim()));
            match key.to_ascii_lowercase().as_str() {
                "domain" if !val.is_empty() => {
                    let domain = val.trim_start_matches('.').to_ascii_lowercase();
                    // A server may only widen a cookie to a suffix of its own host.
                    if host != domain && !host.ends_with(&format!(".{domain}")) {
                        log::debug!("rejecting cookie `{name}`: domain {domain} does not cover {host}");
                        return;
                    }
                    cookie.domain = domain;
                    cookie.host_only = false;
                }
                "path" if val.starts_with('/') => cookie.path = val.to_string(),
                "secure" => cookie.secure = true,
                "httponly" => cookie.http_only = true,
                "max-age" => max_age = val.parse::<i64>().ok(),
                "expires" => {
                    if let Some(expires) = parse_expires(val) {
                        cookie.expires = expires;
                    }
                }
                _ => {}
            }
        }

        // STEP 3: Max-Age takes precedence over Expires.
        if let Some(seconds) = max_age {
            cookie.expires = if seconds <= 0 { 1 } else { now.saturating_add(seconds) };
        }

        if cookie.is_expired(now) {
            self.cookies.retain(|existing| !existing.same_slot(&cookie));
        } else {
            self.insert(cookie);
        }
    }

    /// The `Cookie` header value to send to `url`, if any cookie applies.
    #[must_use]
    pub fn header_for(&self, url: &Url) -> Option<String> {
        let now = Utc::now().timestamp();
        let pairs: Vec<String> = self
            .cookies
            .iter()
            .filter(|c| !c.is_expired(now) && c.matches(url))
            .map(|c| format!("{}={}", c.name, c.value))
            .collect();
        (!pairs.is_empty()).then(|| pairs.join("; "))
    }

    /// All live cookies as Netscape cookie-file lines, in insertion order.
    #[must_use]
    pub fn records(&self) -> Vec<String> {
        let now = Utc::now().timestamp();
        self.cookies
            .iter()
            .filter(|c| !c.is_expired(now))
            .map(StoredCookie::record)
            .collect()
    }

    fn insert(&mut self, cookie: StoredCookie) {
        if let Some(existing) = self.cookies.iter_mut().find(|c| c.same_slot(&cookie)) {
            *existing = cookie;
        } else {
            self.cookies.push(cookie);
        }
    }
}

const fn netscape_bool(value: bool) -> &'static str {
    if value { "TRUE" } else { "FALSE" }
}

/// [RFC 6265 § 5.1.4](https://www.rfc-editor.org/rfc/rfc6265#section-5.1.4)
///
/// "Output the characters of the uri-path from the first character up to,
/// but not including, the right-most %x2F ("/")."
fn default_path(url: &Url) -> String {
    let path = url.path();
    match path.rfind('/') {
        Some(0) | None => "/".to_string(),
        Some(index) => path[..index].to_string(),
    }
}

/// [RFC 6265 § 5.1.4](https://www.rfc-editor.org/rfc/rfc6265#section-5.1.4)
fn path_matches(request_path: &str, cookie_path: &str) -> bool {
    request_path == cookie_path
        || (request_path.starts_with(cookie_path)
            && (cookie_path.ends_with('/')
                || request_path[cookie_path.len()..].starts_with('/')))
}

fn parse_expires(value: &str) -> Option<i64> {
    if let Ok(date) = DateTime::parse_from_rfc2822(value) {
        return Some(date.timestamp());
    }
    LEGACY_EXPIRES_FORMATS.iter().find_map(|format| {
        NaiveDateTime::parse_from_str(value, format)
            .ok()
            .map(|naive| naive.and_utc().timestamp())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_store_host_only_cookie() {
        let mut jar = CookieJar::new();
        jar.store(&url("https://example.com/app/login"), "sid=abc; HttpOnly");
        assert_eq!(
            jar.records(),
            vec!["#HttpOnly_example.com\tFALSE\t/app\tFALSE\t0\tsid\tabc".to_string()]
        );
        assert_eq!(
            jar.header_for(&url("https://example.com/app/next")).as_deref(),
            Some("sid=abc")
        );
        assert_eq!(jar.header_for(&url("https://example.com/other")), None);
        assert_eq!(jar.header_for(&url("https://sub.example.com/app/")), None);
    }

    #[test]
    fn test_store_domain_cookie() {
        let mut jar = CookieJar::new();
        jar.store(
            &url("https://www.example.com/"),
            "cf=1; Domain=.example.com; Path=/; Secure",
        );
        assert_eq!(
            jar.records(),
            vec![".example.com\tTRUE\t/\tTRUE\t0\tcf\t1".to_string()]
        );
        assert!(jar.header_for(&url("https://cdn.example.com/x")).is_some());
        assert!(jar.header_for(&url("http://cdn.example.com/x")).is_none());
    }

    #[test]
    fn test_store_rejects_foreign_domain() {
        let mut jar = CookieJar::new();
        jar.store(&url("https://example.com/"), "x=1; Domain=evil.test");
        assert!(jar.is_empty());
    }

    #[test]
    fn test_store_replaces_same_slot() {
        let mut jar = CookieJar::new();
        let page = url("https://example.com/");
        jar.store(&page, "a=1");
        jar.store(&page, "a=2");
        assert_eq!(jar.len(), 1);
        assert_eq!(jar.header_for(&page).as_deref(), Some("a=2"));
    }

    #[test]
    fn test_max_age_zero_deletes() {
        let mut jar = CookieJar::new();
        let page = url("https://example.com/");
        jar.store(&page, "a=1");
        jar.store(&page, "a=; Max-Age=0");
        assert!(jar.is_empty());
    }

    #[test]
    fn test_past_expires_deletes() {
        let mut jar = CookieJar::new();
        let page = url("https://example.com/");
        jar.store(&page, "a=1");
        jar.store(&page, "a=gone; Expires=Thu, 01 Jan 1970 00:00:01 GMT");
        assert!(jar.is_empty());
    }

    #[test]
    fn test_future_expires_is_kept() {
        let mut jar = CookieJar::new();
        let page = url("https://example.com/");
        jar.store(&page, "a=1; expires=Fri, 01-Jan-2100 00:00:00 GMT");
        assert_eq!(jar.len(), 1);
        assert!(jar.records()[0].contains("\t4102444800\t"));
    }

    #[test]
    fn test_seed_pairs_go_everywhere() {
        let mut jar = CookieJar::new();
        jar.seed("a=1; b=2; junk");
        assert_eq!(
            jar.header_for(&url("https://any.test/deep/path")).as_deref(),
            Some("a=1; b=2")
        );
        assert_eq!(jar.records()[0], "\tFALSE\t/\tFALSE\t0\ta\t1");
    }

    #[test]
    fn test_ignores_nameless_cookie() {
        let mut jar = CookieJar::new();
        jar.store(&url("https://example.com/"), "novalue");
        jar.store(&url("https://example.com/"), "=v");
        assert!(jar.is_empty());
    }

    #[test]
    fn test_path_matching() {
        assert!(path_matches("/app", "/app"));
        assert!(path_matches("/app/x", "/app"));
        assert!(path_matches("/app/x", "/"));
        assert!(!path_matches("/application", "/app"));
    }
}
