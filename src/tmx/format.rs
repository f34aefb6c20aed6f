use crate::error::{MapError, Result};
use std::path::Path;

/// Human-readable name of the accepted file types, for file pickers.
pub const DESCRIPTION: &str = "Tiled map files (*.tmx, *.tsx, *.tmx.gz)";

/// What a file holds, judged by its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    /// `.tmx`
    Map,
    /// `.tmx.gz`: a map document wrapped in one gzip stream.
    CompressedMap,
    /// `.tsx`
    Tileset,
}

impl DocumentKind {
    /// Extension matching is case-insensitive.
    pub fn from_path(path: &Path) -> Result<Self> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();
        if name.ends_with(".tmx.gz") {
            Ok(DocumentKind::CompressedMap)
        } else if name.ends_with(".tmx") {
            Ok(DocumentKind::Map)
        } else if name.ends_with(".tsx") {
            Ok(DocumentKind::Tileset)
        } else {
            Err(MapError::UnsupportedFormat(path.display().to_string()))
        }
    }

    /// True for `.tmx` and `.tmx.gz`.
    pub fn is_map(self) -> bool {
        matches!(self, DocumentKind::Map | DocumentKind::CompressedMap)
    }
}

/// True for `.tmx`, `.tsx` and `.tmx.gz` files.
pub fn accepts(path: impl AsRef<Path>) -> bool {
    DocumentKind::from_path(path.as_ref()).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extensions() {
        assert!(accepts("maps/level1.tmx"));
        assert!(accepts("LEVEL1.TMX"));
        assert!(accepts("sets/terrain.tsx"));
        assert!(accepts("level1.tmx.gz"));
        assert!(!accepts("level1.gz"));
        assert!(!accepts("level1.json"));
        assert!(!accepts("tmx"));

        assert_eq!(
            DocumentKind::from_path(Path::new("a.tmx.gz")).expect("known"),
            DocumentKind::CompressedMap
        );
        assert!(DocumentKind::CompressedMap.is_map());
        assert!(!DocumentKind::Tileset.is_map());
    }
}
