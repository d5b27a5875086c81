//! Helpers for slash-separated mount paths

/// "/a//b/" -> ["a", "b"]
pub fn segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

/// Canonical form: leading slash, no trailing or doubled slashes
pub fn normalize(path: &str) -> String {
    let parts = segments(path);
    if parts.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", parts.join("/"))
    }
}

pub fn is_root(path: &str) -> bool {
    segments(path).is_empty()
}

/// Parent path and leaf name. The root has no leaf.
pub fn split_parent(path: &str) -> Option<(String, &str)> {
    let mut parts = segments(path);
    let name = parts.pop()?;
    let parent = if parts.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", parts.join("/"))
    };
    Some((parent, name))
}

pub fn join(parent: &str, name: &str) -> String {
    if is_root(parent) {
        format!("/{}", name)
    } else {
        format!("{}/{}", normalize(parent), name)
    }
}
