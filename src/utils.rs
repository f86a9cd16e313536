//! Object path helpers
//!
//! Paths are joined and cleaned lexically with `/` as the only separator,
//! independent of the host platform: object names are not filesystem paths.

/// Join a base prefix and a key into a cleaned object path.
///
/// Empty elements are ignored. When both are empty the result is empty.
pub fn join_path(base: &str, key: &str) -> String {
    match (base.is_empty(), key.is_empty()) {
        (true, true) => String::new(),
        (true, false) => clean_path(key),
        (false, true) => clean_path(base),
        (false, false) => clean_path(&format!("{}/{}", base, key)),
    }
}

/// Lexically clean a path.
///
/// Repeated separators collapse, `.` elements are dropped, and `..` removes
/// the preceding element. A `..` that cannot be resolved is kept for relative
/// paths and dropped for rooted ones. An empty result is `.`.
pub fn clean_path(path: &str) -> String {
    let rooted = path.starts_with('/');
    let mut parts: Vec<&str> = Vec::new();

    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => match parts.last() {
                Some(&last) if last != ".." => {
                    parts.pop();
                }
                _ if rooted => {}
                _ => parts.push(".."),
            },
            other => parts.push(other),
        }
    }

    let joined = parts.join("/");
    match (rooted, joined.is_empty()) {
        (true, _) => format!("/{}", joined),
        (false, true) => ".".to_string(),
        (false, false) => joined,
    }
}

/// Whether a key, once cleaned, stays strictly below whatever prefix it is joined to.
///
/// Keys that resolve to the prefix itself (`.`, `a/..`) or climb out of it
/// (`..`, `a/../../b`) do not.
pub fn stays_below_prefix(key: &str) -> bool {
    let relative = clean_path(key.trim_start_matches('/'));
    relative != "." && relative != ".." && !relative.starts_with("../")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_path() {
        let cases = [
            ("", "foo123", "foo123"),
            ("base", "foo123", "base/foo123"),
            ("base/", "/foo123", "base/foo123"),
            ("a/b", "c/d", "a/b/c/d"),
            ("a//b/", "./c", "a/b/c"),
            ("/root", "k", "/root/k"),
            ("base", "../k", "k"),
            ("", "", ""),
            ("base", "", "base"),
        ];
        for (base, key, expected) in cases {
            assert_eq!(join_path(base, key), expected, "join({:?}, {:?})", base, key);
        }
    }

    #[test]
    fn test_clean_path() {
        assert_eq!(clean_path(""), ".");
        assert_eq!(clean_path("a/./b/../c"), "a/c");
        assert_eq!(clean_path("../../a"), "../../a");
        assert_eq!(clean_path("/../a"), "/a");
        assert_eq!(clean_path("///"), "/");
        assert_eq!(clean_path("a/.."), ".");
    }

    #[test]
    fn test_stays_below_prefix() {
        assert!(stays_below_prefix("foo"));
        assert!(stays_below_prefix("/foo/bar"));
        assert!(stays_below_prefix("a/../b"));
        assert!(!stays_below_prefix("."));
        assert!(!stays_below_prefix("a/.."));
        assert!(!stays_below_prefix(".."));
        assert!(!stays_below_prefix("a/../../b"));
    }
}
