//! Attachment filename sanitization.

/// Name used when nothing usable is left of a filename.
pub const DEFAULT_FILENAME: &str = "unnamed";

/// Maximum length of a sanitized filename.
pub const MAX_FILENAME_LEN: usize = 255;

/// Produce a filename that is safe to show and to derive a storage name from.
///
/// Path separators become `_`, only ASCII alphanumerics and `.`, `_`, `-`
/// survive, and no `..` sequence remains. Names longer than
/// [`MAX_FILENAME_LEN`] are truncated, keeping the extension. Applying the
/// function to its own output returns it unchanged.
///
/// ```
/// use tempmail::attachment::sanitize_filename;
///
/// assert_eq!(sanitize_filename("../../etc/passwd"), "____etc_passwd");
/// assert_eq!(sanitize_filename("report (1).pdf"), "report1.pdf");
/// assert_eq!(sanitize_filename(""), "unnamed");
/// ```
pub fn sanitize_filename(name: &str) -> String {
    if name.is_empty() {
        return DEFAULT_FILENAME.to_string();
    }

    let filtered: String = name
        .chars()
        .map(|c| if c == '/' || c == '\\' { '_' } else { c })
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        .collect();

    // Filtering can join dots that were separated by dropped characters,
    // so dot runs are collapsed only afterwards.
    let mut sanitized = collapse_dots(&filtered);

    if sanitized.len() > MAX_FILENAME_LEN {
        sanitized = collapse_dots(&truncate_keeping_extension(&sanitized));
    }

    if sanitized.is_empty() {
        DEFAULT_FILENAME.to_string()
    } else {
        sanitized
    }
}

fn collapse_dots(name: &str) -> String {
    name.replace("..", "_")
}

/// Truncate an ASCII name to [`MAX_FILENAME_LEN`], keeping the text after the
/// last dot when it fits.
fn truncate_keeping_extension(name: &str) -> String {
    match name.rsplit_once('.') {
        Some((_, ext)) if !ext.is_empty() && ext.len() + 1 < MAX_FILENAME_LEN => {
            let stem_len = MAX_FILENAME_LEN - ext.len() - 1;
            format!("{}.{}", &name[..stem_len], ext)
        }
        _ => name[..MAX_FILENAME_LEN].to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_names_unchanged() {
        assert_eq!(sanitize_filename("invoice.pdf"), "invoice.pdf");
        assert_eq!(sanitize_filename("my_file-v2.tar.gz"), "my_file-v2.tar.gz");
    }

    #[test]
    fn test_empty_name() {
        assert_eq!(sanitize_filename(""), DEFAULT_FILENAME);
    }

    #[test]
    fn test_nothing_left_after_filtering() {
        assert_eq!(sanitize_filename("日本語"), DEFAULT_FILENAME);
        assert_eq!(sanitize_filename("   "), DEFAULT_FILENAME);
    }

    #[test]
    fn test_path_separators_replaced() {
        assert_eq!(sanitize_filename("dir/file.txt"), "dir_file.txt");
        assert_eq!(sanitize_filename("C:\\Windows\\evil.exe"), "C_Windows_evil.exe");
    }

    #[test]
    fn test_traversal_removed() {
        let cases = [
            "../../etc/passwd",
            "..\\..\\boot.ini",
            "....//....//x",
            ". ./secret",
            ".é.",
        ];
        for case in cases {
            let sanitized = sanitize_filename(case);
            assert!(!sanitized.contains(".."), "{case} -> {sanitized}");
            assert!(!sanitized.contains('/'));
            assert!(!sanitized.contains('\\'));
        }
        assert_eq!(sanitize_filename("../../etc/passwd"), "____etc_passwd");
    }

    #[test]
    fn test_disallowed_characters_dropped() {
        assert_eq!(sanitize_filename("a b\tc\r\n.txt"), "abc.txt");
        assert_eq!(sanitize_filename("\"quoted\";.pdf"), "quoted.pdf");
        assert_eq!(sanitize_filename("résumé.doc"), "rsum.doc");
    }

    #[test]
    fn test_long_name_keeps_extension() {
        let name = format!("{}.pdf", "a".repeat(400));
        let sanitized = sanitize_filename(&name);
        assert_eq!(sanitized.len(), MAX_FILENAME_LEN);
        assert!(sanitized.ends_with(".pdf"));
    }

    #[test]
    fn test_long_name_without_extension() {
        let sanitized = sanitize_filename(&"b".repeat(300));
        assert_eq!(sanitized.len(), MAX_FILENAME_LEN);
    }

    #[test]
    fn test_long_name_truncation_cannot_form_dotdot() {
        let name = format!("{}.x{}.pdf", "a".repeat(250), "y".repeat(100));
        let sanitized = sanitize_filename(&name);
        assert!(sanitized.len() <= MAX_FILENAME_LEN);
        assert!(!sanitized.contains(".."));
    }

    #[test]
    fn test_idempotent() {
        let long_ext = format!("{}.{}", "n".repeat(10), "e".repeat(300));
        let dotted = format!("{}.x{}.pdf", "a".repeat(250), "y".repeat(100));
        let cases = [
            "",
            "simple.txt",
            "../../etc/passwd",
            "...",
            "....",
            ".....",
            "a.\u{e9}.b",
            "weird name (copy) [1].tar.gz",
            "\u{1F600}.png",
            long_ext.as_str(),
            dotted.as_str(),
        ];
        for case in cases {
            let once = sanitize_filename(case);
            let twice = sanitize_filename(&once);
            assert_eq!(once, twice, "not idempotent for {case:?}");
        }
    }
}
