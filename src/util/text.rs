/// Reduces an uploaded file name to a safe ASCII form.
///
/// Non-ASCII characters are dropped, path separators and runs of whitespace
/// become `_`, anything outside `[A-Za-z0-9_.-]` is removed, and leading or
/// trailing `.`/`_` are trimmed. The result may be empty, which callers treat
/// as an invalid upload.
///
/// # Examples
///
/// ```
/// use podcast_feed_editor::util::sanitize_filename;
///
/// assert_eq!(sanitize_filename("My Feed.xml"), "My_Feed.xml");
/// assert_eq!(sanitize_filename("../../etc/passwd"), "etc_passwd");
/// assert_eq!(sanitize_filename("..."), "");
/// ```
pub fn sanitize_filename(name: &str) -> String {
    let spaced: String = name
        .chars()
        .filter(char::is_ascii)
        .map(|c| if c == '/' || c == '\\' { ' ' } else { c })
        .collect();

    let joined = spaced.split_whitespace().collect::<Vec<_>>().join("_");

    joined
        .chars()
        .filter(|&c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        .collect::<String>()
        .trim_matches(|c: char| c == '.' || c == '_')
        .to_string()
}
