//! Resource resolution.
//!
//! A request path maps onto the document root by its first segment:
//! `static` selects the kernel-assisted `sendfile` transfer, `dynamic`
//! selects the AIO-backed transfer, and anything else is unresolved and
//! answered with a 404. Resolution runs once, synchronously, as soon as the
//! header terminator is seen.

use std::path::{Path, PathBuf};

/// Transfer mechanism selected for a resolved resource.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResourceKind {
    /// Served with bounded `sendfile(2)` chunks.
    Static,

    /// Served through the asynchronous disk I/O bridge.
    Dynamic,
}

/// Maps a raw request path onto a file under the document root.
///
/// Returns `None` when the first segment selects neither subtree, when no
/// file name follows it, or when any segment would walk the tree (`.`/`..`
/// and empty segments are rejected, so a resolved path can never escape the
/// root).
pub fn resolve(document_root: &Path, raw_path: &str) -> Option<(PathBuf, ResourceKind)> {
    let mut segments = raw_path.split('/').filter(|s| !s.is_empty());

    let kind = match segments.next()? {
        "static" => ResourceKind::Static,
        "dynamic" => ResourceKind::Dynamic,
        _ => return None,
    };

    let mut path = document_root.join(match kind {
        ResourceKind::Static => "static",
        ResourceKind::Dynamic => "dynamic",
    });

    let mut depth = 0;
    for segment in segments {
        if segment == "." || segment == ".." {
            return None;
        }
        path.push(segment);
        depth += 1;
    }

    if depth == 0 {
        return None;
    }

    Some((path, kind))
}

#[cfg(test)]
mod tests {
    use super::{ResourceKind, resolve};
    use std::path::Path;

    #[test]
    fn classifies_by_first_segment() {
        let root = Path::new("/srv");

        let (path, kind) = resolve(root, "/static/a.txt").unwrap();
        assert_eq!(kind, ResourceKind::Static);
        assert_eq!(path, Path::new("/srv/static/a.txt"));

        let (path, kind) = resolve(root, "/dynamic/sub/b.bin").unwrap();
        assert_eq!(kind, ResourceKind::Dynamic);
        assert_eq!(path, Path::new("/srv/dynamic/sub/b.bin"));
    }

    #[test]
    fn unknown_segments_are_unresolved() {
        let root = Path::new("/srv");

        assert!(resolve(root, "/").is_none());
        assert!(resolve(root, "/other/a.txt").is_none());
        assert!(resolve(root, "/staticx/a.txt").is_none());
    }

    #[test]
    fn bare_subtree_is_unresolved() {
        let root = Path::new("/srv");

        assert!(resolve(root, "/static").is_none());
        assert!(resolve(root, "/dynamic/").is_none());
    }

    #[test]
    fn traversal_is_rejected() {
        let root = Path::new("/srv");

        assert!(resolve(root, "/static/../secret").is_none());
        assert!(resolve(root, "/static/./a.txt").is_none());
        assert!(resolve(root, "/dynamic/a/../../b").is_none());
    }
}
