use crate::map::Map;
use crate::properties::Properties;
use crate::tile::TileRef;
use crate::tileset::TileSetId;
use macroquad::math::Vec2;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Position and extent of a layer, in tiles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Bounds {
    /// Column offset.
    pub x: i32,
    /// Row offset.
    pub y: i32,
    /// Width in tiles.
    pub width: u32,
    /// Height in tiles.
    pub height: u32,
}

impl Bounds {
    /// Bounds at `(x, y)` spanning `width` x `height` tiles.
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Bounds {
            x,
            y,
            width,
            height,
        }
    }

    /// True when map cell `(x, y)` lies inside.
    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.x
            && y >= self.y
            && (x - self.x) < self.width as i32
            && (y - self.y) < self.height as i32
    }
}

/// A grid of tile references, addressed in layer-local coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct TileLayer {
    width: u32,
    height: u32,
    cells: Vec<Option<TileRef>>,
    /// Pixel size overriding the map's tile size for this layer.
    pub tile_width: Option<u32>,
    /// Pixel height override for this layer.
    pub tile_height: Option<u32>,
    instance_properties: BTreeMap<(u32, u32), Properties>,
}

impl TileLayer {
    /// Empty grid of `width` x `height` cells.
    pub fn new(width: u32, height: u32) -> Self {
        TileLayer {
            width,
            height,
            cells: vec![None; width as usize * height as usize],
            tile_width: None,
            tile_height: None,
            instance_properties: BTreeMap::new(),
        }
    }

    /// Width in cells.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in cells.
    pub fn height(&self) -> u32 {
        self.height
    }

    fn index(&self, x: u32, y: u32) -> Option<usize> {
        (x < self.width && y < self.height).then(|| (y * self.width + x) as usize)
    }

    /// Cell at layer-local `(x, y)`; `None` when empty or out of range.
    pub fn tile_at(&self, x: u32, y: u32) -> Option<TileRef> {
        self.index(x, y).and_then(|i| self.cells[i])
    }

    /// Sets a cell. Returns false when `(x, y)` is outside the grid.
    pub fn set_tile_at(&mut self, x: u32, y: u32, tile: Option<TileRef>) -> bool {
        match self.index(x, y) {
            Some(i) => {
                self.cells[i] = tile;
                true
            }
            None => false,
        }
    }

    /// Cells in row-major order: y outer, x inner.
    pub fn cells(&self) -> &[Option<TileRef>] {
        &self.cells
    }

    /// Sets every cell to `tile`.
    pub fn fill(&mut self, tile: Option<TileRef>) {
        self.cells.fill(tile);
    }

    /// True when no cell holds a tile.
    pub fn is_empty(&self) -> bool {
        self.cells.iter().all(Option::is_none)
    }

    /// Properties attached to cell `(x, y)`.
    pub fn instance_properties(&self, x: u32, y: u32) -> Option<&Properties> {
        self.instance_properties.get(&(x, y))
    }

    /// Replaces the per-cell properties of `(x, y)`; an empty set removes the entry.
    pub fn set_instance_properties(&mut self, x: u32, y: u32, props: Properties) {
        if props.is_empty() || self.index(x, y).is_none() {
            self.instance_properties.remove(&(x, y));
        } else {
            self.instance_properties.insert((x, y), props);
        }
    }

    /// Per-cell property overlays in row-major order, skipping empty sets.
    pub fn instance_properties_iter(&self) -> impl Iterator<Item = ((u32, u32), &Properties)> {
        let mut cells: Vec<_> = self
            .instance_properties
            .iter()
            .filter(|(_, p)| !p.is_empty())
            .map(|(&(x, y), p)| ((x, y), p))
            .collect();
        cells.sort_by_key(|&((x, y), _)| (y, x));
        cells.into_iter()
    }

    pub(crate) fn clear_tileset(&mut self, tileset: TileSetId) {
        for cell in &mut self.cells {
            if matches!(cell, Some(t) if t.tileset == tileset) {
                *cell = None;
            }
        }
    }

    /// Resizes the grid, moving old content by `(dx, dy)`; cells pushed
    /// outside the new extent are dropped.
    fn resize(&mut self, width: u32, height: u32, dx: i32, dy: i32) {
        let mut resized = TileLayer::new(width, height);
        resized.tile_width = self.tile_width;
        resized.tile_height = self.tile_height;
        for y in 0..self.height {
            for x in 0..self.width {
                let nx = x as i64 + dx as i64;
                let ny = y as i64 + dy as i64;
                if nx < 0 || ny < 0 || nx >= width as i64 || ny >= height as i64 {
                    continue;
                }
                let (nx, ny) = (nx as u32, ny as u32);
                resized.set_tile_at(nx, ny, self.tile_at(x, y));
                if let Some(props) = self.instance_properties.remove(&(x, y)) {
                    resized.instance_properties.insert((nx, ny), props);
                }
            }
        }
        *self = resized;
    }
}

/// A positioned, optionally sized object of an object group.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MapObject {
    /// Object name.
    pub name: String,
    /// Free-form type tag; empty means untyped.
    pub kind: String,
    /// Position in pixels.
    pub position: Vec2,
    /// Zero components mean "no size".
    pub size: Vec2,
    /// Image drawn for the object, if any.
    pub image_source: Option<PathBuf>,
    /// Object properties.
    pub properties: Properties,
}

impl MapObject {
    /// Object at `position` with no size.
    pub fn new(name: impl Into<String>, position: Vec2) -> Self {
        MapObject {
            name: name.into(),
            position,
            ..Default::default()
        }
    }
}

/// Layer variants. Selection overlays share the tile grid shape.
#[derive(Debug, Clone, PartialEq)]
pub enum LayerKind {
    /// Tile grid.
    Tiles(TileLayer),
    /// Object group.
    Objects(Vec<MapObject>),
    /// Selection overlay.
    Selection(TileLayer),
}

impl LayerKind {
    /// XML element name the variant is stored under.
    pub fn element_name(&self) -> &'static str {
        match self {
            LayerKind::Tiles(_) => "layer",
            LayerKind::Objects(_) => "objectgroup",
            LayerKind::Selection(_) => "selection",
        }
    }
}

/// A layer of a map.
///
/// Layers do not point back at their map. Mutations that must notify
/// listeners go through [`Map`] with the layer's [`crate::LayerId`].
#[derive(Debug, Clone, PartialEq)]
pub struct MapLayer {
    /// Layer name.
    pub name: String,
    bounds: Bounds,
    /// Hidden layers are not drawn.
    pub visible: bool,
    /// Locked layers should not be edited.
    pub locked: bool,
    opacity: f32,
    /// Distance of the layer's view plane, used for parallax.
    pub view_plane_distance: f32,
    /// Layer scrolls as if at infinite distance.
    pub view_plane_infinitely_far_away: bool,
    /// Layer properties.
    pub properties: Properties,
    kind: LayerKind,
}

impl MapLayer {
    fn with_kind(name: impl Into<String>, bounds: Bounds, kind: LayerKind) -> Self {
        MapLayer {
            name: name.into(),
            bounds,
            visible: true,
            locked: false,
            opacity: 1.0,
            view_plane_distance: 0.0,
            view_plane_infinitely_far_away: false,
            properties: Properties::new(),
            kind,
        }
    }

    /// Tile layer covering `width` x `height` tiles at the origin.
    pub fn new_tile_layer(name: impl Into<String>, width: u32, height: u32) -> Self {
        Self::with_kind(
            name,
            Bounds::new(0, 0, width, height),
            LayerKind::Tiles(TileLayer::new(width, height)),
        )
    }

    /// Empty object group covering `width` x `height` tiles.
    pub fn new_object_group(name: impl Into<String>, width: u32, height: u32) -> Self {
        Self::with_kind(
            name,
            Bounds::new(0, 0, width, height),
            LayerKind::Objects(Vec::new()),
        )
    }

    /// Empty selection overlay.
    pub fn new_selection(name: impl Into<String>, width: u32, height: u32) -> Self {
        Self::with_kind(
            name,
            Bounds::new(0, 0, width, height),
            LayerKind::Selection(TileLayer::new(width, height)),
        )
    }

    /// Offset and extent in tiles.
    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    /// Content of the layer.
    pub fn kind(&self) -> &LayerKind {
        &self.kind
    }

    /// Width in tiles.
    pub fn width(&self) -> u32 {
        self.bounds.width
    }

    /// Height in tiles.
    pub fn height(&self) -> u32 {
        self.bounds.height
    }

    /// Opacity in `[0.0, 1.0]`.
    pub fn opacity(&self) -> f32 {
        self.opacity
    }

    /// Clamps into `[0.0, 1.0]`.
    pub fn set_opacity(&mut self, opacity: f32) {
        self.opacity = opacity.clamp(0.0, 1.0);
    }

    /// True when map cell `(x, y)` lies inside the layer.
    pub fn contains(&self, x: i32, y: i32) -> bool {
        self.bounds.contains(x, y)
    }

    /// Moves the layer by `(dx, dy)` tiles.
    pub fn translate(&mut self, dx: i32, dy: i32) {
        self.bounds.x += dx;
        self.bounds.y += dy;
    }

    /// Places the layer's top-left corner at `(x, y)`.
    pub fn set_offset(&mut self, x: i32, y: i32) {
        self.bounds.x = x;
        self.bounds.y = y;
    }

    /// Advisory: callers should not edit hidden or locked layers.
    pub fn can_edit(&self) -> bool {
        self.visible && !self.locked
    }

    /// Grid of tile and selection layers.
    pub fn tiles(&self) -> Option<&TileLayer> {
        match &self.kind {
            LayerKind::Tiles(grid) | LayerKind::Selection(grid) => Some(grid),
            LayerKind::Objects(_) => None,
        }
    }

    /// Mutable grid. A grid swapped in with a size other than the layer's
    /// bounds makes the layer fail to save; use [`MapLayer::resize`] instead.
    pub fn tiles_mut(&mut self) -> Option<&mut TileLayer> {
        match &mut self.kind {
            LayerKind::Tiles(grid) | LayerKind::Selection(grid) => Some(grid),
            LayerKind::Objects(_) => None,
        }
    }

    /// Objects of an object group.
    pub fn objects(&self) -> Option<&[MapObject]> {
        match &self.kind {
            LayerKind::Objects(objects) => Some(objects),
            _ => None,
        }
    }

    /// Mutable objects of an object group.
    pub fn objects_mut(&mut self) -> Option<&mut Vec<MapObject>> {
        match &mut self.kind {
            LayerKind::Objects(objects) => Some(objects),
            _ => None,
        }
    }

    /// Tile at map coordinates, honouring the layer offset.
    pub fn tile_at(&self, x: i32, y: i32) -> Option<TileRef> {
        if !self.contains(x, y) {
            return None;
        }
        self.tiles()?
            .tile_at((x - self.bounds.x) as u32, (y - self.bounds.y) as u32)
    }

    /// Sets a cell at map coordinates. Returns false outside the layer or on object groups.
    pub fn set_tile_at(&mut self, x: i32, y: i32, tile: Option<TileRef>) -> bool {
        if !self.contains(x, y) {
            return false;
        }
        let (lx, ly) = ((x - self.bounds.x) as u32, (y - self.bounds.y) as u32);
        match self.tiles_mut() {
            Some(grid) => grid.set_tile_at(lx, ly, tile),
            None => false,
        }
    }

    /// Pixel tile size used by this layer: its own override, else the map's.
    pub fn tile_size(&self, map: &Map) -> (u32, u32) {
        let grid = self.tiles();
        (
            grid.and_then(|g| g.tile_width).unwrap_or(map.tile_width()),
            grid.and_then(|g| g.tile_height).unwrap_or(map.tile_height()),
        )
    }

    /// True when the layer holds no tiles or objects.
    pub fn is_empty(&self) -> bool {
        match &self.kind {
            LayerKind::Tiles(grid) | LayerKind::Selection(grid) => grid.is_empty(),
            LayerKind::Objects(objects) => objects.is_empty(),
        }
    }

    /// Changes the extent, shifting grid content by `(dx, dy)`.
    pub fn resize(&mut self, width: u32, height: u32, dx: i32, dy: i32) {
        self.bounds.width = width;
        self.bounds.height = height;
        if let Some(grid) = self.tiles_mut() {
            grid.resize(width, height, dx, dy);
        }
    }

    /// Copies name, flags, parallax settings, bounds and properties onto `other`.
    pub fn copy_attributes_to(&self, other: &mut MapLayer) {
        other.name.clone_from(&self.name);
        other.visible = self.visible;
        other.locked = self.locked;
        other.view_plane_distance = self.view_plane_distance;
        other.view_plane_infinitely_far_away = self.view_plane_infinitely_far_away;
        other.opacity = self.opacity;
        other.bounds = self.bounds;
        other.properties.replace_with(&self.properties);
    }
}
