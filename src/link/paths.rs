//! File name canonicalisation for `F` lines.

/// Lexically normalise a path: drop `.` and empty components, fold `x/..`.
/// Leading `..` components survive, also after a root slash.
pub fn canonicalize(path: &str) -> String {
    if path.is_empty() {
        return String::new();
    }
    let absolute = path.starts_with('/');
    let mut parts: Vec<&str> = Vec::new();
    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." if parts.last().is_some_and(|p| *p != "..") => {
                parts.pop();
            }
            _ => parts.push(part),
        }
    }
    let joined = parts.join("/");
    if absolute {
        format!("/{}", joined)
    } else {
        joined
    }
}

/// Directory prefix (with trailing slash) that relative `F` names in
/// `source` are resolved against.
pub fn fragment_dir(source: &str) -> String {
    match source.rfind('/') {
        Some(pos) => source[..=pos].to_string(),
        None => "./".to_string(),
    }
}

/// Resolve an `F` name seen in a fragment read from directory `dir`.
/// Absolute names and pseudo files such as `<built-in>` are kept verbatim.
pub fn resolve_file_name(dir: &str, name: &str) -> String {
    if name.starts_with('/') || name.starts_with('<') {
        name.to_string()
    } else {
        canonicalize(&format!("{}{}", dir, name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonicalize() {
        let cases = [
            ("a/b/c/../../../../d", "../d"),
            ("/a/b/c/../../../../d", "/../d"),
            ("a///b//c", "a/b/c"),
            ("a/b/c/d/../../../../", ""),
            ("/a/b/c/d/../../../../", "/"),
            ("a/b/c/d/../../e/../../", "a"),
            ("a/b/./c/d/", "a/b/c/d"),
            ("/.a/b/./c/d/", "/.a/b/c/d"),
            ("simplify/this/path/../../if/possible", "simplify/if/possible"),
            ("", ""),
        ];
        for (input, expected) in cases {
            assert_eq!(canonicalize(input), expected, "canonicalize({:?})", input);
        }
    }

    #[test]
    fn test_resolve_file_name() {
        assert_eq!(resolve_file_name("./", "main.c"), "main.c");
        assert_eq!(resolve_file_name("out/cg/", "../src/a.c"), "out/src/a.c");
        assert_eq!(resolve_file_name("out/", "/usr/include/stdio.h"), "/usr/include/stdio.h");
        assert_eq!(resolve_file_name("out/", "<built-in>"), "<built-in>");
        assert_eq!(fragment_dir("build/main.cg"), "build/");
        assert_eq!(fragment_dir("main.cg"), "./");
    }
}
