//! Conversions between canonical (slash-separated) and platform-native path text.

use std::path::MAIN_SEPARATOR;

/// Convert a canonical `a/b/c` name to the platform separator.
pub fn native_filename(name: &str) -> String {
    if MAIN_SEPARATOR == '/' {
        name.to_string()
    } else {
        name.replace('/', &MAIN_SEPARATOR.to_string())
    }
}

/// Convert a native name back to the canonical slash-separated form.
pub fn canonical_filename(name: &str) -> String {
    if MAIN_SEPARATOR == '/' {
        name.to_string()
    } else {
        name.replace(MAIN_SEPARATOR, "/")
    }
}

/// Split a relative path into its components.
///
/// Both `/` and the native separator are accepted. Empty and `.` segments are
/// dropped, so `"./a//b/"` yields `["a", "b"]`. `..` is kept; callers decide
/// whether to allow it.
pub fn components(path: &str) -> Vec<&str> {
    path.split(|c| c == '/' || c == MAIN_SEPARATOR)
        .filter(|c| !c.is_empty() && *c != ".")
        .collect()
}
