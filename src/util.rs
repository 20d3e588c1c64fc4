//! Shared utility functions.

use std::path::PathBuf;

/// Expand `~` and `~/...` paths to absolute paths using `$HOME`.
///
/// Returns the path unchanged if `$HOME` is not set or the path does not
/// start with `~`.
///
/// # Examples
/// ```
/// use cclog::util::expand_home;
///
/// assert_eq!(expand_home("/tmp"), std::path::PathBuf::from("/tmp"));
/// ```
pub fn expand_home(path: &str) -> PathBuf {
    if path == "~" {
        return std::env::var_os("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(path));
    }
    if let Some(stripped) = path.strip_prefix("~/")
        && let Some(home) = std::env::var_os("HOME")
    {
        return PathBuf::from(home).join(stripped);
    }
    PathBuf::from(path)
}

/// Keep at most `max_chars` chars of `text`, never splitting a code point.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => text[..byte_idx].to_string(),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expands_tilde_prefix() {
        if let Some(home) = std::env::var_os("HOME") {
            let result = expand_home("~/test/path");
            assert_eq!(result, PathBuf::from(home).join("test/path"));
        }
    }

    #[test]
    fn preserves_absolute_paths() {
        assert_eq!(expand_home("/tmp/file"), PathBuf::from("/tmp/file"));
    }

    #[test]
    fn preserves_relative_paths() {
        assert_eq!(expand_home("relative/path"), PathBuf::from("relative/path"));
    }

    #[test]
    fn truncates_on_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 3), "abc");
        assert_eq!(truncate_chars("abc", 10), "abc");
        assert_eq!(truncate_chars("", 0), "");
    }
}
