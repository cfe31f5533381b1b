//! Normalization of route paths and scope prefixes at registration time.

#[track_caller]
/// Prepend `prefix` to `path` and strip trailing slashes, unless the result is the root.
pub(super) fn normalize(prefix: &str, path: &str) -> String {
    if path.is_empty() {
        panic!("route paths can't be empty: use `/` for the root");
    }
    if !path.starts_with('/') {
        panic!("`{path}` is not a valid route path: it must begin with `/`");
    }
    let joined = format!("{prefix}{path}");
    let trimmed = joined.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_owned()
    } else {
        trimmed.to_owned()
    }
}

#[track_caller]
/// Append a scope prefix to the prefix of its parent.
///
/// The returned prefix never ends with `/`: `/api/` and `/api` are equivalent.
pub(super) fn join_prefix(parent: &str, prefix: &str) -> String {
    if prefix.is_empty() {
        return parent.to_owned();
    }
    if !prefix.starts_with('/') {
        panic!("`{prefix}` is not a valid scope prefix: it must be empty or begin with `/`");
    }
    if prefix.contains("//") {
        panic!("`{prefix}` is not a valid scope prefix: it can't contain empty segments");
    }
    format!("{parent}{}", prefix.trim_end_matches('/'))
}
