//! Helpers for converting between internal class names (`com/example/Outer$Inner`),
//! source names (`com.example.Outer.Inner`) and relative file paths.

/// Convert an internal name to its dotted source form.
///
/// # Example
///
/// ```
/// use rangefix::names::internal_to_source;
///
/// assert_eq!(internal_to_source("com/example/Outer$Inner"), "com.example.Outer.Inner");
/// assert_eq!(internal_to_source("Foo"), "Foo");
/// ```
pub fn internal_to_source(internal: &str) -> String {
    internal.replace(['/', '$'], ".")
}

/// Package part of an internal name, `None` for the default package.
pub fn package_of(internal: &str) -> Option<&str> {
    internal.rfind('/').map(|idx| &internal[..idx])
}

/// Everything after the package, nested classes included (`Outer$Inner`).
pub fn simple_name(internal: &str) -> &str {
    match internal.rfind('/') {
        Some(idx) => &internal[idx + 1..],
        None => internal,
    }
}

/// The innermost class name (`Inner` for `a/Outer$Inner`).
pub fn innermost_name(internal: &str) -> &str {
    let simple = simple_name(internal);
    match simple.rfind('$') {
        Some(idx) => &simple[idx + 1..],
        None => simple,
    }
}

/// Whether `reference` is `top_level` itself or a class nested inside it.
pub fn is_same_or_nested(reference: &str, top_level: &str) -> bool {
    reference == top_level
        || reference
            .strip_prefix(top_level)
            .is_some_and(|rest| rest.starts_with('$'))
}

/// Split a relative source path into the internal name of its top-level class and
/// the file extension.
///
/// Backslashes are normalized and a leading `/` is ignored.
///
/// ```
/// use rangefix::names::top_level_class_for_path;
///
/// assert_eq!(
///     top_level_class_for_path("/com/example/Foo.java"),
///     ("com/example/Foo".to_string(), Some("java".to_string()))
/// );
/// ```
pub fn top_level_class_for_path(path: &str) -> (String, Option<String>) {
    let normalized = path.replace('\\', "/");
    let trimmed = normalized.trim_start_matches('/');
    let file_start = trimmed.rfind('/').map_or(0, |idx| idx + 1);
    match trimmed[file_start..].rfind('.') {
        Some(dot) => (
            trimmed[..file_start + dot].to_string(),
            Some(trimmed[file_start + dot + 1..].to_string()),
        ),
        None => (trimmed.to_string(), None),
    }
}

/// Build the relative path for a (possibly renamed) top-level class, keeping the
/// extension and the leading `/` convention of the original path.
pub fn path_for_class(internal: &str, extension: Option<&str>, like: &str) -> String {
    let mut path = String::with_capacity(internal.len() + 8);
    if like.replace('\\', "/").starts_with('/') {
        path.push('/');
    }
    path.push_str(internal);
    if let Some(ext) = extension {
        path.push('.');
        path.push_str(ext);
    }
    path
}

/// Line terminator used by a buffer: `\r\n` if its first line ends that way.
pub fn detect_line_ending(text: &str) -> &'static str {
    match text.find('\n') {
        Some(idx) if idx > 0 && text.as_bytes()[idx - 1] == b'\r' => "\r\n",
        _ => "\n",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_package_and_simple_names() {
        assert_eq!(package_of("com/example/Foo"), Some("com/example"));
        assert_eq!(package_of("Foo"), None);
        assert_eq!(simple_name("com/example/Foo$Bar"), "Foo$Bar");
        assert_eq!(innermost_name("com/example/Foo$Bar$Baz"), "Baz");
        assert_eq!(innermost_name("Foo"), "Foo");
    }

    #[test]
    fn test_same_or_nested_does_not_match_prefix_siblings() {
        assert!(is_same_or_nested("a/Foo", "a/Foo"));
        assert!(is_same_or_nested("a/Foo$Inner", "a/Foo"));
        assert!(!is_same_or_nested("a/FooBar", "a/Foo"));
        assert!(!is_same_or_nested("a/Bar", "a/Foo"));
    }

    #[test]
    fn test_top_level_class_without_extension_or_package() {
        assert_eq!(top_level_class_for_path("Foo"), ("Foo".to_string(), None));
        assert_eq!(
            top_level_class_for_path("a\\b\\Foo.java"),
            ("a/b/Foo".to_string(), Some("java".to_string()))
        );
        // Dots in directories are not extensions
        assert_eq!(
            top_level_class_for_path("a.b/Foo"),
            ("a.b/Foo".to_string(), None)
        );
    }

    #[test]
    fn test_path_for_class_keeps_leading_slash() {
        assert_eq!(
            path_for_class("x/y/Bar", Some("java"), "/a/Foo.java"),
            "/x/y/Bar.java"
        );
        assert_eq!(path_for_class("x/Bar", Some("java"), "a/Foo.java"), "x/Bar.java");
        assert_eq!(path_for_class("Bar", None, "Foo"), "Bar");
    }

    #[test]
    fn test_detect_line_ending() {
        assert_eq!(detect_line_ending("a\r\nb"), "\r\n");
        assert_eq!(detect_line_ending("a\nb\r\n"), "\n");
        assert_eq!(detect_line_ending("no newline"), "\n");
    }
}
