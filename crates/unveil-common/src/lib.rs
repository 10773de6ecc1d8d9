//! Common utilities for the unveil sandbox.
//!
//! This crate provides the pure, engine-independent pieces of the bridge:
//! - **Cookie Compaction** - raw cookie-jar records to `name=value; ...`
//! - **Cookie Assignment** - the `document.cookie` setter attribute rule
//! - **URL Resolution** - relative request URLs against the evaluation base

pub mod cookie;
pub mod url;

pub use cookie::{compact, strip_assignment_attributes};
pub use self::url::resolve_url;
