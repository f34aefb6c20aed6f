use crate::properties::Properties;
use crate::tileset::TileSetId;

/// Reference from a layer cell or animation frame to a tile of a tileset
/// owned by the same map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileRef {
    /// Tileset the tile belongs to.
    pub tileset: TileSetId,
    /// Local tile id.
    pub id: u32,
}

impl TileRef {
    /// Reference to tile `id` of `tileset`.
    pub fn new(tileset: TileSetId, id: u32) -> Self {
        TileRef { tileset, id }
    }
}

/// A single tile of a tileset.
///
/// The gid is not stored: it is the owning tileset's firstgid plus `id`,
/// and only exists while a document is being written or read.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Tile {
    /// Local id, unique within the tileset.
    pub id: u32,
    /// Key into the owning tileset's image registry.
    pub image: Option<u32>,
    /// Animation played in place of the tile image.
    pub animation: Option<Sprite>,
    /// Tile properties.
    pub properties: Properties,
}

impl Tile {
    /// Tile without image, animation or properties.
    pub fn new(id: u32) -> Self {
        Tile {
            id,
            ..Default::default()
        }
    }

    /// Tile using image `image` of its tileset.
    pub fn with_image(id: u32, image: u32) -> Self {
        Tile {
            id,
            image: Some(image),
            ..Default::default()
        }
    }

    /// True when the tile has an animation.
    pub fn is_animated(&self) -> bool {
        self.animation.is_some()
    }
}

/// Animation of a tile: named keyframes, each a cycle of tile references.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sprite {
    /// Keyframes in playback order.
    pub keyframes: Vec<KeyFrame>,
}

/// A named cycle of frames.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeyFrame {
    /// Keyframe name.
    pub name: String,
    /// Frames in playback order.
    pub frames: Vec<TileRef>,
}

impl KeyFrame {
    /// Keyframe called `name` cycling through `frames`.
    pub fn new(name: impl Into<String>, frames: Vec<TileRef>) -> Self {
        KeyFrame {
            name: name.into(),
            frames,
        }
    }
}

impl Sprite {
    /// Frame count over all keyframes.
    pub fn total_frames(&self) -> usize {
        self.keyframes.iter().map(|k| k.frames.len()).sum()
    }

    /// Drops every frame that points into `tileset`.
    pub(crate) fn forget_tileset(&mut self, tileset: TileSetId) {
        for key in &mut self.keyframes {
            key.frames.retain(|f| f.tileset != tileset);
        }
    }
}
