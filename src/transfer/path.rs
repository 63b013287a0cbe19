//! POSIX path handling for remote paths.
//!
//! Remote servers always use `/` separators, independent of the host this
//! process runs on, so `std::path` is not used for them.

/// Lexically clean a path: collapse repeated separators, drop `.`
/// segments and resolve `..` against preceding segments. `..` never climbs
/// above the root of an absolute path. Empty input becomes `"."`.
pub fn clean(raw: &str) -> String {
    let absolute = raw.starts_with('/');
    let mut parts: Vec<&str> = Vec::new();

    for segment in raw.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if parts.last().is_some_and(|p| *p != "..") {
                    parts.pop();
                } else if !absolute {
                    parts.push("..");
                }
            }
            other => parts.push(other),
        }
    }

    let joined = parts.join("/");
    match (absolute, joined.is_empty()) {
        (true, _) => format!("/{}", joined),
        (false, true) => ".".to_string(),
        (false, false) => joined,
    }
}

/// Resolve a caller-supplied path against the session home directory.
/// Empty input means the home directory itself.
pub fn resolve(home: &str, raw: &str) -> String {
    let raw = raw.trim();
    if raw.is_empty() {
        return clean(home);
    }
    if raw.starts_with('/') {
        clean(raw)
    } else {
        clean(&join(home, raw))
    }
}

pub fn join(base: &str, name: &str) -> String {
    if base.is_empty() {
        name.to_string()
    } else if base.ends_with('/') {
        format!("{}{}", base, name)
    } else {
        format!("{}/{}", base, name)
    }
}

/// Last path segment, ignoring trailing separators. The root maps to `"/"`.
pub fn base_name(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        return if path.is_empty() { "." } else { "/" };
    }
    match trimmed.rfind('/') {
        Some(idx) => &trimmed[idx + 1..],
        None => trimmed,
    }
}

/// Extension of a file name without the dot. Dotfiles have none.
pub fn extension(name: &str) -> Option<&str> {
    let name = base_name(name);
    match name.rfind('.') {
        Some(0) | None => None,
        Some(idx) if idx + 1 < name.len() => Some(&name[idx + 1..]),
        Some(_) => None,
    }
}
