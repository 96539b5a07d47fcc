//! Pure path helpers: normalization, ancestry tests and unique naming.

use std::borrow::Cow;
use std::path::{Component, Path, PathBuf};

use crate::error::FsError;

/// Lexically normalize a path: drop `.` components, fold `..` where
/// possible and strip trailing separators. The filesystem is not consulted.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let can_pop = matches!(
                    out.components().next_back(),
                    Some(Component::Normal(_))
                );
                if can_pop {
                    out.pop();
                } else if !matches!(
                    out.components().next_back(),
                    Some(Component::RootDir | Component::Prefix(_))
                ) {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    if out.as_os_str().is_empty() {
        out.push(".");
    }
    out
}

/// Resolve `path` against the filesystem: make it absolute, follow links
/// in its longest existing prefix and normalize whatever follows. Two
/// spellings of one location resolve to the same path.
///
/// Falls back to the lexical form when nothing can be resolved.
pub fn resolve(path: &Path) -> PathBuf {
    let path = if path.as_os_str().is_empty() {
        Path::new(".")
    } else {
        path
    };
    let Ok(absolute) = std::path::absolute(path) else {
        return normalize(path);
    };
    for existing in absolute.ancestors() {
        let Ok(real) = existing.canonicalize() else {
            continue;
        };
        return match absolute.strip_prefix(existing) {
            Ok(rest) if !rest.as_os_str().is_empty() => normalize(&real.join(rest)),
            _ => real,
        };
    }
    normalize(&absolute)
}

/// Whether `path` is `ancestor` itself or lies somewhere below it.
///
/// Both paths are normalized first; see [`resolve`] for comparing paths
/// that may be spelled differently. Comparison is case-insensitive on
/// Windows, matching how the filesystem resolves names there.
pub fn is_same_or_inside(ancestor: &Path, path: &Path) -> bool {
    let ancestor = normalize(ancestor);
    let path = normalize(path);
    let mut anc = ancestor.components();
    let mut sub = path.components();
    loop {
        match (anc.next(), sub.next()) {
            (None, _) => return true,
            (Some(_), None) => return false,
            (Some(a), Some(b)) => {
                if !component_eq(a.as_os_str(), b.as_os_str()) {
                    return false;
                }
            }
        }
    }
}

#[cfg(windows)]
fn component_eq(a: &std::ffi::OsStr, b: &std::ffi::OsStr) -> bool {
    a.to_string_lossy().to_lowercase() == b.to_string_lossy().to_lowercase()
}

#[cfg(not(windows))]
fn component_eq(a: &std::ffi::OsStr, b: &std::ffi::OsStr) -> bool {
    a == b
}

/// Base name of a path, or the whole path for roots.
pub fn base_name(path: &Path) -> Cow<'_, str> {
    match path.file_name() {
        Some(name) => name.to_string_lossy(),
        None => path.to_string_lossy(),
    }
}

/// Whether the path names a volume root (`/`, `C:\`).
pub fn is_volume_root(path: &Path) -> bool {
    path.parent().is_none() && path.has_root()
}

/// Case-fold a string for name matching.
pub fn fold_case(s: &str) -> String {
    s.to_lowercase()
}

/// Whether the base name of `path` contains every term.
///
/// Terms must already be case-folded.
pub fn name_contains_all(path: &Path, folded_terms: &[String]) -> bool {
    let name = fold_case(&base_name(path));
    folded_terms.iter().all(|term| name.contains(term.as_str()))
}

/// Split a name into stem and extension (extension keeps its dot).
///
/// Directories keep their whole name as the stem so that `v1.2` stays
/// `v1.2 (1)` instead of becoming `v1 (1).2`. A leading dot is part of the
/// stem (`.profile` has no extension).
pub fn split_name(name: &str, is_dir: bool) -> (&str, &str) {
    if is_dir {
        return (name, "");
    }
    match name.rfind('.') {
        Some(0) | None => (name, ""),
        Some(idx) => name.split_at(idx),
    }
}

/// Check whether anything (including a dangling link) occupies `path`.
pub fn occupied(path: &Path) -> bool {
    path.symlink_metadata().is_ok()
}

/// Find a free destination for `name` inside `folder`.
///
/// Tries `name.ext`, then `name (1).ext`, `name (2).ext` and so on up to
/// `max_suffix`. With an unchanged folder the same candidate is returned on
/// every call.
pub fn unique_destination(
    folder: &Path,
    name: &str,
    is_dir: bool,
    max_suffix: u32,
) -> Result<PathBuf, FsError> {
    let direct = folder.join(name);
    if !occupied(&direct) {
        return Ok(direct);
    }

    let (stem, ext) = split_name(name, is_dir);
    for i in 1..=max_suffix {
        let candidate = folder.join(format!("{stem} ({i}){ext}"));
        if !occupied(&candidate) {
            return Ok(candidate);
        }
    }

    Err(FsError::AlreadyExists { path: direct })
}
