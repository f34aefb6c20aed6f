use crate::properties::Properties;
use crate::tile::{Tile, TileRef};
use image::RgbaImage;
use macroquad::color::Color;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};

static NEXT_TILESET_ID: AtomicU32 = AtomicU32::new(1);

/// Stable handle of a tileset, used by [`TileRef`] instead of a gid.
///
/// Handles are unique for the lifetime of the process; clones of a tileset
/// share the handle of the original.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileSetId(pub(crate) u32);

impl TileSetId {
    fn next() -> Self {
        TileSetId(NEXT_TILESET_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Numeric value of the handle.
    pub fn raw(self) -> u32 {
        self.0
    }
}

/// An image owned by a tileset's image registry.
///
/// Either the decoded pixels, the file it came from, or both are known.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TileImage {
    /// Decoded pixels.
    pub image: Option<RgbaImage>,
    /// File the image was loaded from or is saved to.
    pub source: Option<PathBuf>,
}

impl TileImage {
    /// Image known only by its pixels.
    pub fn from_pixels(image: RgbaImage) -> Self {
        TileImage {
            image: Some(image),
            source: None,
        }
    }

    /// Image known only by its file.
    pub fn from_source(source: impl Into<PathBuf>) -> Self {
        TileImage {
            image: None,
            source: Some(source.into()),
        }
    }
}

/// The shared image of a tileset cut into a regular grid ("tilebmp" mode).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TileBitmap {
    /// File of the shared image.
    pub source: Option<PathBuf>,
    /// Decoded pixels of the shared image.
    pub image: Option<RgbaImage>,
    /// Colour key treated as transparent by renderers.
    pub transparent: Option<Color>,
}

/// Formats a colour as the six hex digits used by the `trans` attribute.
pub fn color_to_hex(color: Color) -> String {
    let channel = |c: f32| (c.clamp(0.0, 1.0) * 255.0).round() as u8;
    format!(
        "{:02x}{:02x}{:02x}",
        channel(color.r),
        channel(color.g),
        channel(color.b)
    )
}

/// Parses `rrggbb`, with or without a leading `#`.
pub fn color_from_hex(hex: &str) -> Option<Color> {
    let hex = hex.trim().trim_start_matches('#');
    if hex.len() != 6 {
        return None;
    }
    let rgb = u32::from_str_radix(hex, 16).ok()?;
    Some(Color::from_rgba(
        (rgb >> 16) as u8,
        (rgb >> 8) as u8,
        rgb as u8,
        255,
    ))
}

/// Number of columns and rows of `tile_w`×`tile_h` cells fitting in an image.
pub fn grid_size(
    image_w: u32,
    image_h: u32,
    tile_w: u32,
    tile_h: u32,
    spacing: u32,
    margin: u32,
) -> (u32, u32) {
    let fit = |extent: u32, tile: u32| {
        if tile == 0 {
            return 0;
        }
        let usable = extent.saturating_sub(2 * margin) + spacing;
        usable / (tile + spacing)
    };
    (fit(image_w, tile_w), fit(image_h, tile_h))
}

/// A collection of tiles sharing either one grid image or a per-tile image registry.
#[derive(Debug, Clone)]
pub struct TileSet {
    id: TileSetId,
    /// Tileset name.
    pub name: String,
    /// External `.tsx` file this tileset is stored in. When set, maps only
    /// write a reference to it.
    pub source: Option<PathBuf>,
    /// Directory prefix tile images are resolved against.
    pub base_dir: Option<String>,
    /// Tile width in pixels.
    pub tile_width: u32,
    /// Tile height in pixels.
    pub tile_height: u32,
    /// Pixels between grid tiles.
    pub spacing: u32,
    /// Pixels around the grid.
    pub margin: u32,
    /// Shared grid image; `None` for per-tile images.
    pub bitmap: Option<TileBitmap>,
    /// Tileset-level properties.
    pub properties: Properties,
    images: BTreeMap<u32, TileImage>,
    tiles: BTreeMap<u32, Tile>,
}

impl TileSet {
    /// Empty tileset with a fresh [`TileSetId`].
    pub fn new(name: impl Into<String>) -> Self {
        TileSet {
            id: TileSetId::next(),
            name: name.into(),
            source: None,
            base_dir: None,
            tile_width: 0,
            tile_height: 0,
            spacing: 0,
            margin: 0,
            bitmap: None,
            properties: Properties::new(),
            images: BTreeMap::new(),
            tiles: BTreeMap::new(),
        }
    }

    /// Handle shared by every clone of this tileset.
    pub fn id(&self) -> TileSetId {
        self.id
    }

    /// Reference to local tile `id` of this tileset.
    pub fn tile_ref(&self, id: u32) -> TileRef {
        TileRef::new(self.id, id)
    }

    /// Inserts or replaces the tile with the same id.
    pub fn add_tile(&mut self, tile: Tile) -> Option<Tile> {
        self.tiles.insert(tile.id, tile)
    }

    /// Appends an empty tile after the current highest id and returns its id.
    pub fn add_new_tile(&mut self) -> u32 {
        let id = self.gid_span();
        self.tiles.entry(id).or_insert_with(|| Tile::new(id));
        id
    }

    /// Removes tile `id` and returns it.
    pub fn remove_tile(&mut self, id: u32) -> Option<Tile> {
        self.tiles.remove(&id)
    }

    /// Tile with local id `id`.
    pub fn tile(&self, id: u32) -> Option<&Tile> {
        self.tiles.get(&id)
    }

    /// Mutable tile with local id `id`.
    pub fn tile_mut(&mut self, id: u32) -> Option<&mut Tile> {
        self.tiles.get_mut(&id)
    }

    /// Tiles in ascending id order.
    pub fn tiles(&self) -> impl Iterator<Item = &Tile> {
        self.tiles.values()
    }

    /// Mutable tiles in ascending id order.
    pub fn tiles_mut(&mut self) -> impl Iterator<Item = &mut Tile> {
        self.tiles.values_mut()
    }

    /// Number of tiles.
    pub fn tile_count(&self) -> usize {
        self.tiles.len()
    }

    /// Highest tile id, `None` when empty.
    pub fn max_tile_id(&self) -> Option<u32> {
        self.tiles.keys().next_back().copied()
    }

    /// Size of the gid range this tileset occupies: `max_tile_id + 1`, or 0 when empty.
    /// Saturates at `u32::MAX`, which no gid table can place.
    pub fn gid_span(&self) -> u32 {
        self.max_tile_id().map_or(0, |max| max.saturating_add(1))
    }

    /// True when stored in its own `.tsx` file.
    pub fn is_external(&self) -> bool {
        self.source.is_some()
    }

    /// True when tile `n` uses image `n` for every tile and image, so the
    /// tile list can be rebuilt from the image registry alone.
    pub fn is_one_for_one(&self) -> bool {
        !self.tiles.is_empty()
            && self.tiles.len() == self.images.len()
            && self.tiles.values().all(|t| t.image == Some(t.id))
    }

    /// Registers an image and returns its id. An image whose source matches an
    /// already registered one is not added twice.
    pub fn add_image(&mut self, image: TileImage) -> u32 {
        if let Some(source) = &image.source {
            if let Some(id) = self.image_id_for_source(source) {
                return id;
            }
        }
        let id = self.images.keys().next_back().map_or(0, |last| last + 1);
        self.images.insert(id, image);
        id
    }

    /// Registers an image under a fixed id, replacing any previous one.
    pub fn insert_image(&mut self, id: u32, image: TileImage) -> Option<TileImage> {
        self.images.insert(id, image)
    }

    /// Image registered under `id`.
    pub fn image(&self, id: u32) -> Option<&TileImage> {
        self.images.get(&id)
    }

    /// Images in ascending id order.
    pub fn images(&self) -> impl Iterator<Item = (u32, &TileImage)> {
        self.images.iter().map(|(id, img)| (*id, img))
    }

    /// Id of the image loaded from `source`.
    pub fn image_id_for_source(&self, source: &Path) -> Option<u32> {
        self.images
            .iter()
            .find(|(_, img)| img.source.as_deref() == Some(source))
            .map(|(id, _)| *id)
    }

    /// Installs a shared grid image and creates one tile per grid cell.
    ///
    /// Tiles that already exist keep their properties and animation. Returns
    /// the number of grid cells, which is 0 when the bitmap has no pixels.
    pub fn import_tile_bitmap(
        &mut self,
        bitmap: TileBitmap,
        tile_width: u32,
        tile_height: u32,
        spacing: u32,
        margin: u32,
    ) -> u32 {
        let count = bitmap.image.as_ref().map_or(0, |img| {
            let (cols, rows) =
                grid_size(img.width(), img.height(), tile_width, tile_height, spacing, margin);
            cols * rows
        });
        self.set_tile_bitmap(bitmap, tile_width, tile_height, spacing, margin, count);
        count
    }

    /// Like [`TileSet::import_tile_bitmap`] with an explicit cell count, for
    /// bitmaps whose pixels are not loaded.
    pub fn set_tile_bitmap(
        &mut self,
        bitmap: TileBitmap,
        tile_width: u32,
        tile_height: u32,
        spacing: u32,
        margin: u32,
        count: u32,
    ) {
        self.tile_width = tile_width;
        self.tile_height = tile_height;
        self.spacing = spacing;
        self.margin = margin;
        self.bitmap = Some(bitmap);
        for id in 0..count {
            self.tiles.entry(id).or_insert_with(|| Tile::new(id));
        }
    }

    /// Columns of the shared grid image, if one with pixels is installed.
    pub fn columns(&self) -> Option<u32> {
        let img = self.bitmap.as_ref()?.image.as_ref()?;
        let (cols, _) = grid_size(
            img.width(),
            img.height(),
            self.tile_width,
            self.tile_height,
            self.spacing,
            self.margin,
        );
        Some(cols)
    }

    /// Pixels of a single tile, cut from the grid image or taken from the registry.
    pub fn tile_image(&self, id: u32) -> Option<RgbaImage> {
        let tile = self.tiles.get(&id)?;
        if let Some(image_id) = tile.image {
            return self.images.get(&image_id)?.image.clone();
        }
        let img = self.bitmap.as_ref()?.image.as_ref()?;
        let cols = self.columns().filter(|c| *c > 0)?;
        let col = id % cols;
        let row = id / cols;
        let sx = self.margin + col * (self.tile_width + self.spacing);
        let sy = self.margin + row * (self.tile_height + self.spacing);
        if sx + self.tile_width > img.width() || sy + self.tile_height > img.height() {
            return None;
        }
        Some(image::imageops::crop_imm(img, sx, sy, self.tile_width, self.tile_height).to_image())
    }

    pub(crate) fn forget_tileset(&mut self, other: TileSetId) {
        for tile in self.tiles.values_mut() {
            if let Some(anim) = tile.animation.as_mut() {
                anim.forget_tileset(other);
            }
        }
    }
}

impl PartialEq for TileSet {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gid_span_follows_highest_id() {
        let mut ts = TileSet::new("t");
        assert_eq!(ts.gid_span(), 0);
        ts.add_tile(Tile::new(0));
        ts.add_tile(Tile::new(3));
        assert_eq!(ts.max_tile_id(), Some(3));
        assert_eq!(ts.gid_span(), 4);
        assert_eq!(ts.tile_count(), 2);
        assert_eq!(ts.add_new_tile(), 4);
    }

    #[test]
    fn grid_accounts_for_spacing_and_margin() {
        assert_eq!(grid_size(64, 32, 16, 16, 0, 0), (4, 2));
        // 1 + 16 + 2 + 16 + 2 + 16 + 1 = 54
        assert_eq!(grid_size(54, 18, 16, 16, 2, 1), (3, 1));
        assert_eq!(grid_size(10, 10, 0, 16, 0, 0), (0, 0));
    }

    #[test]
    fn import_creates_one_tile_per_cell() {
        let mut ts = TileSet::new("grid");
        let bitmap = TileBitmap {
            source: None,
            image: Some(RgbaImage::new(32, 48)),
            transparent: None,
        };
        assert_eq!(ts.import_tile_bitmap(bitmap, 16, 16, 0, 0), 6);
        assert_eq!(ts.gid_span(), 6);
        assert_eq!(ts.columns(), Some(2));
        let cut = ts.tile_image(5).expect("tile 5 is inside the bitmap");
        assert_eq!(cut.dimensions(), (16, 16));
    }

    #[test]
    fn images_with_same_source_are_shared() {
        let mut ts = TileSet::new("imgs");
        let a = ts.add_image(TileImage::from_source("/tiles/a.png"));
        let b = ts.add_image(TileImage::from_source("/tiles/b.png"));
        let again = ts.add_image(TileImage::from_source("/tiles/a.png"));
        assert_eq!(a, again);
        assert_ne!(a, b);

        ts.add_tile(Tile::with_image(0, a));
        ts.add_tile(Tile::with_image(1, b));
        assert!(ts.is_one_for_one());
        ts.add_tile(Tile::with_image(2, a));
        assert!(!ts.is_one_for_one());
        ts.remove_tile(2);
        ts.add_tile(Tile::with_image(1, a));
        assert!(!ts.is_one_for_one());
    }

    #[test]
    fn hex_colors() {
        let c = color_from_hex("#ff00ff").expect("valid hex");
        assert_eq!(color_to_hex(c), "ff00ff");
        assert!(color_from_hex("fff").is_none());
    }
}
