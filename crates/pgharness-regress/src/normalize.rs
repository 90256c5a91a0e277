//! Output normalization before comparison.
//!
//! Exactly three things are normalized: line endings (`\r\n` and `\n` are
//! equivalent), trailing whitespace on each line, and blank lines at the end
//! of the text. Everything else, including leading whitespace and blank
//! lines in the middle, is significant.

/// Splits `text` into normalized lines.
pub fn normalize_lines(text: &str) -> Vec<&str> {
    let mut lines: Vec<&str> = text.split('\n').map(str::trim_end).collect();
    while lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }
    lines
}

/// Normalized text, lines joined with `\n` and no trailing newline.
pub fn normalize(text: &str) -> String {
    normalize_lines(text).join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_crlf_and_trailing_whitespace() {
        assert_eq!(
            normalize_lines("SELECT 1;  \r\n ?column? \r\n"),
            vec!["SELECT 1;", " ?column?"]
        );
    }

    #[test]
    fn test_trailing_blank_lines_dropped() {
        assert_eq!(normalize("a\n\nb\n\n\n   \n"), "a\n\nb");
    }

    #[test]
    fn test_empty_text() {
        assert!(normalize_lines("").is_empty());
        assert!(normalize_lines("\n\r\n").is_empty());
    }

    #[test]
    fn test_leading_whitespace_kept() {
        assert_eq!(normalize_lines("  x"), vec!["  x"]);
    }
}
