//! Cookie string handling.
//!
//! Two small algorithms live here:
//!
//! - [`compact`] turns raw cookie-jar records, as reported by the transport,
//!   into the flat `name=value; name=value` form that scripts read from
//!   `document.cookie` and that goes out on a `Cookie` header.
//! - [`strip_assignment_attributes`] is the attribute rule applied when a
//!   script assigns `document.cookie = "k=v; path=/; expires=..."`.
//!
//! Neither is a general cookie parser. Loader scripts only need the output to
//! look like what a browser would hand them.

/// Candidate field delimiters, in priority order.
///
/// The transport's record layout is not assumed. Tab comes first because the
/// Netscape cookie-file layout uses it, then space, then ASCII punctuation.
const DELIMITERS: &[u8] = b"\t !\"#$%&'()*+,-./;<=>?@[\\]^_`{|}~";

/// A well-formed record has seven fields, so six delimiters.
const FIELD_SEPARATORS: usize = 6;

/// Separator between compacted pairs.
const PAIR_SEPARATOR: &str = "; ";

/// Compact raw cookie-jar records into `name=value; name=value`.
///
/// For each record the delimiter is the first candidate from [`DELIMITERS`]
/// that occurs exactly six times. The last occurrence splits off the value,
/// the one before it splits off the name, and every field before the name
/// (domain, flags, path, secure, expiry) is dropped.
///
/// Records where no candidate occurs exactly six times are assumed to already
/// be in `name=value` form and pass through unchanged. Empty records are
/// skipped. This never fails.
///
/// # Example
///
/// ```
/// use unveil_common::compact;
///
/// let records = [
///     ".example.com\tTRUE\t/\tFALSE\t0\tsid\tabc",
///     "example.com\tFALSE\t/app\tTRUE\t1700000000\ttheme\tdark",
/// ];
/// assert_eq!(compact(&records), "sid=abc; theme=dark");
/// ```
#[must_use]
pub fn compact<S: AsRef<str>>(records: &[S]) -> String {
    records
        .iter()
        .map(AsRef::as_ref)
        .filter(|record| !record.is_empty())
        .map(|record| name_value_pair(record).unwrap_or_else(|| record.to_owned()))
        .collect::<Vec<_>>()
        .join(PAIR_SEPARATOR)
}

/// Find the delimiter of a single record, if any candidate fits.
fn detect_delimiter(record: &str) -> Option<char> {
    DELIMITERS
        .iter()
        .map(|&byte| char::from(byte))
        .find(|&candidate| record.matches(candidate).count() == FIELD_SEPARATORS)
}

/// Rebuild `name=value` from a delimited record.
fn name_value_pair(record: &str) -> Option<String> {
    let delimiter = detect_delimiter(record)?;
    let (rest, value) = record.rsplit_once(delimiter)?;
    let (_, name) = rest.rsplit_once(delimiter)?;
    Some(format!("{name}={value}"))
}

/// Apply the `document.cookie` assignment rule.
///
/// Only a trailing `path=` attribute and an `expires=` attribute adjacent to
/// it are removed:
///
/// 1. If the last `;` segment contains `path=`, it is removed. If the new last
///    segment then contains `expires=`, that is removed too.
/// 2. Otherwise, if the last segment contains `expires=` and the segment right
///    before it contains `path=`, both are removed.
///
/// Anything else is kept verbatim, including a lone `expires=` with no path
/// next to it.
///
/// # Example
///
/// ```
/// use unveil_common::strip_assignment_attributes;
///
/// assert_eq!(strip_assignment_attributes("a=1; path=/; expires=Wed"), "a=1");
/// assert_eq!(strip_assignment_attributes("a=1; path=/"), "a=1");
/// assert_eq!(strip_assignment_attributes("a=1; expires=Wed"), "a=1; expires=Wed");
/// ```
#[must_use]
pub fn strip_assignment_attributes(assignment: &str) -> &str {
    let Some((head, last)) = assignment.rsplit_once(';') else {
        return assignment;
    };

    if last.contains("path=") {
        return match head.rsplit_once(';') {
            Some((before, previous)) if previous.contains("expires=") => before,
            _ => head,
        };
    }

    if !last.contains("expires=") {
        return assignment;
    }
    match head.rsplit_once(';') {
        Some((before, previous)) if previous.contains("path=") => before,
        _ => assignment,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Build a 7-field record joined by `delimiter`, with no punctuation in
    /// the fields themselves.
    fn record(delimiter: char, name: &str, value: &str) -> String {
        ["examplecom", "TRUE", "root", "FALSE", "0", name, value]
            .join(&delimiter.to_string())
    }

    #[test]
    fn test_compact_empty() {
        let records: [&str; 0] = [];
        assert_eq!(compact(&records), "");
    }

    #[test]
    fn test_compact_netscape_records() {
        let records = [
            "#HttpOnly_.example.com\tTRUE\t/\tFALSE\t0\tsid\tabc123",
            "example.com\tFALSE\t/login\tTRUE\t1893456000\tcsrf\tq9",
        ];
        assert_eq!(compact(&records), "sid=abc123; csrf=q9");
    }

    #[test]
    fn test_compact_every_candidate_delimiter() {
        for &byte in DELIMITERS {
            let delimiter = char::from(byte);
            let line = record(delimiter, "name", "value");
            assert_eq!(
                compact(&[line.as_str()]),
                "name=value",
                "delimiter {delimiter:?}"
            );
        }
    }

    #[test]
    fn test_compact_preserves_input_order() {
        let records = [record('|', "z", "1"), record('|', "a", "2"), record('|', "m", "3")];
        assert_eq!(compact(&records), "z=1; a=2; m=3");
    }

    #[test]
    fn test_compact_priority_prefers_earlier_candidate() {
        // Six tabs and six commas: tab wins, so the commas stay inside the value.
        let line = "d\tf\tp\ts\te\tn\tv,v,v,v,v,v,v";
        assert_eq!(compact(&[line]), "n=v,v,v,v,v,v,v");
    }

    #[test]
    fn test_compact_passthrough_when_no_delimiter_fits() {
        assert_eq!(compact(&["already=compact"]), "already=compact");
        assert_eq!(compact(&["a=1", "b=2"]), "a=1; b=2");
    }

    #[test]
    fn test_compact_passthrough_with_seven_delimiters() {
        let line = "a\tb\tc\td\te\tf\tg\th";
        assert_eq!(compact(&[line]), line);
    }

    #[test]
    fn test_compact_skips_empty_records() {
        assert_eq!(compact(&["", "a=1", ""]), "a=1");
    }

    #[test]
    fn test_compact_value_may_be_empty() {
        let line = "example.com\tFALSE\t/\tFALSE\t0\tflag\t";
        assert_eq!(compact(&[line]), "flag=");
    }

    #[test]
    fn test_strip_path_then_expires() {
        assert_eq!(strip_assignment_attributes("a=1; path=/; expires=Wed"), "a=1");
    }

    #[test]
    fn test_strip_path_only() {
        assert_eq!(strip_assignment_attributes("a=1; path=/"), "a=1");
    }

    #[test]
    fn test_strip_expires_without_path_is_kept() {
        assert_eq!(
            strip_assignment_attributes("a=1; expires=Wed"),
            "a=1; expires=Wed"
        );
    }

    #[test]
    fn test_strip_expires_before_path() {
        assert_eq!(strip_assignment_attributes("a=1; expires=Wed; path=/"), "a=1");
    }

    #[test]
    fn test_strip_leaves_other_attributes() {
        assert_eq!(
            strip_assignment_attributes("a=1; domain=.x.com; secure"),
            "a=1; domain=.x.com; secure"
        );
        assert_eq!(
            strip_assignment_attributes("a=1; domain=.x.com; path=/"),
            "a=1; domain=.x.com"
        );
    }

    #[test]
    fn test_strip_single_segment_untouched() {
        assert_eq!(strip_assignment_attributes("path=/"), "path=/");
        assert_eq!(strip_assignment_attributes(""), "");
    }
}
