//! Relative path handling for file references stored inside documents.
//!
//! References are written relative to the document so a project directory
//! can be moved as a whole, and turned back into absolute paths on load.

use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};

/// Collapses `.` and `..` without touching the filesystem. Relative inputs
/// are anchored at the current directory when it is available.
pub fn normalize(path: &Path) -> PathBuf {
    let anchored = if path.is_absolute() {
        path.to_path_buf()
    } else {
        match std::env::current_dir() {
            Ok(cwd) => cwd.join(path),
            Err(_) => path.to_path_buf(),
        }
    };

    let mut out = PathBuf::new();
    for comp in anchored.components() {
        match comp {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Canonical form of `path`, falling back to canonicalizing the parent (the
/// file itself may not exist yet) and finally to [`normalize`].
fn canonical_or_lexical(path: &Path) -> PathBuf {
    if let Ok(p) = path.canonicalize() {
        return p;
    }
    if let (Some(parent), Some(name)) = (path.parent(), path.file_name()) {
        if let Ok(p) = parent.canonicalize() {
            return p.join(name);
        }
    }
    log::debug!(
        "could not canonicalize {}, using lexical form",
        path.display()
    );
    normalize(path)
}

fn chain(path: &Path) -> Vec<OsString> {
    path.components()
        .map(|c| c.as_os_str().to_os_string())
        .collect()
}

/// Path of `to` relative to the document at `from`, using `/` separators.
///
/// `to` is returned unchanged when it is not absolute. Both paths are
/// canonicalized when possible; otherwise the comparison is made on their
/// lexical forms.
pub fn relative_path(from: &Path, to: &Path) -> String {
    if !to.is_absolute() {
        return to.to_string_lossy().into_owned();
    }

    let from = chain(&canonical_or_lexical(from));
    let to = chain(&canonical_or_lexical(to));

    let shared = from
        .iter()
        .zip(to.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut parts: Vec<String> = Vec::new();
    // The last element of `from` is the document's own file name.
    for _ in shared..from.len().saturating_sub(1) {
        parts.push("..".to_owned());
    }
    for dir in to.iter().take(to.len().saturating_sub(1)).skip(shared) {
        parts.push(dir.to_string_lossy().into_owned());
    }
    if let Some(name) = to.last() {
        parts.push(name.to_string_lossy().into_owned());
    }
    parts.join("/")
}

/// Absolute path of a reference found in the document at `document`.
pub fn resolve_path(document: &Path, reference: &str) -> PathBuf {
    let reference = Path::new(reference);
    if reference.is_absolute() {
        return normalize(reference);
    }
    let base = document.parent().unwrap_or_else(|| Path::new(""));
    normalize(&base.join(reference))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sibling_directory() {
        let rel = relative_path(
            Path::new("/project/maps/level1.tmx"),
            Path::new("/project/tiles/set.png"),
        );
        assert_eq!(rel, "../tiles/set.png");
    }

    #[test]
    fn same_directory_and_nested() {
        let doc = Path::new("/project/maps/level1.tmx");
        assert_eq!(relative_path(doc, Path::new("/project/maps/a.tsx")), "a.tsx");
        assert_eq!(
            relative_path(doc, Path::new("/project/maps/gfx/b.png")),
            "gfx/b.png"
        );
        assert_eq!(
            relative_path(doc, Path::new("/other/c.png")),
            "../../other/c.png"
        );
    }

    #[test]
    fn relative_targets_pass_through() {
        let rel = relative_path(Path::new("/project/maps/level1.tmx"), Path::new("tiles/x.png"));
        assert_eq!(rel, "tiles/x.png");
    }

    #[test]
    fn dot_segments_are_collapsed() {
        let rel = relative_path(
            Path::new("/project/maps/./level1.tmx"),
            Path::new("/project/maps/../tiles/set.png"),
        );
        assert_eq!(rel, "../tiles/set.png");
    }

    #[test]
    fn resolve_is_inverse_of_relative() {
        let doc = Path::new("/project/maps/level1.tmx");
        assert_eq!(
            resolve_path(doc, "../tiles/set.png"),
            PathBuf::from("/project/tiles/set.png")
        );
        assert_eq!(
            resolve_path(doc, "/abs/x.png"),
            PathBuf::from("/abs/x.png")
        );
    }
}
