//! JSON rendering.
//!
//! The report itself is the serialization contract, so this is nothing more
//! than pretty-printed serde output.

use crate::report::Report;

/// Formats a [`Report`] as pretty-printed JSON.
///
/// # Panics
///
/// Panics if serialization fails, which cannot happen for a well-formed
/// report (no non-string map keys, no non-finite floats).
pub fn format(report: &Report) -> String {
    serde_json::to_string_pretty(report).expect("report serialization failed")
}
