//! Cell text normalization.
//!
//! Word documents pad table cells with non-breaking spaces and uneven
//! whitespace runs; every extracted string goes through [`normalize_text`]
//! before validation or rendering.

/// Normalize a single extracted cell string.
///
/// Replaces non-breaking spaces (U+00A0) with ASCII spaces, collapses
/// every whitespace run to a single space, and trims the ends.
pub fn normalize_text(text: &str) -> String {
    text.replace('\u{00A0}', " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
