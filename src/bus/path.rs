//! Object path helpers.

/// Final segment of an object path; empty for `/` or a trailing separator.
pub fn leaf_name(path: &str) -> &str {
    match path.rfind('/') {
        Some(idx) => &path[idx + 1..],
        None => "",
    }
}

/// Appends one segment to `parent`.
pub fn child_path(parent: &str, name: &str) -> String {
    if parent.ends_with('/') {
        format!("{}{}", parent, name)
    } else {
        format!("{}/{}", parent, name)
    }
}

/// Whether `path` lies strictly below `root`, within `depth` levels (0 = any).
pub(crate) fn is_below(root: &str, path: &str, depth: u32) -> bool {
    let root = root.trim_end_matches('/');
    let rest = match path.strip_prefix(root) {
        Some(rest) => rest,
        None => return false,
    };
    let rest = match rest.strip_prefix('/') {
        Some(rest) if !rest.is_empty() => rest,
        _ => return false,
    };
    depth == 0 || rest.split('/').count() <= depth as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_leaf_name() {
        assert_eq!(leaf_name("/xyz/openbmc_project/inventory/system/chassis"), "chassis");
        assert_eq!(leaf_name("/"), "");
        assert_eq!(leaf_name("/a/b/"), "");
        assert_eq!(leaf_name("plain"), "");
    }

    #[test]
    fn test_child_path() {
        assert_eq!(child_path("/a/b", "assembly"), "/a/b/assembly");
        assert_eq!(child_path("/", "a"), "/a");
    }

    #[test]
    fn test_is_below() {
        assert!(is_below("/inv", "/inv/a", 0));
        assert!(is_below("/inv", "/inv/a/b/c", 0));
        assert!(!is_below("/inv", "/inv", 0));
        assert!(!is_below("/inv", "/inventory/a", 0));
        assert!(is_below("/inv", "/inv/a", 1));
        assert!(!is_below("/inv", "/inv/a/b", 1));
        assert!(is_below("/", "/a", 0));
    }
}
