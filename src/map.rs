use crate::error::{MapError, Result};
use crate::event::{ListenerId, Listeners, MapEvent, ParallaxChange};
use crate::gid::GidTable;
use crate::layer::MapLayer;
use crate::properties::Properties;
use crate::tile::{Tile, TileRef};
use crate::tileset::{TileSet, TileSetId};
use std::fmt;
use std::str::FromStr;

/// Index of a layer in its map's z-order (0 = bottom).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LayerId(pub usize);

/// Map projection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Orientation {
    /// Square grid.
    #[default]
    Orthogonal,
    /// Diamond grid.
    Isometric,
    /// Hexagonal grid.
    Hexagonal,
    /// Staggered rows.
    Shifted,
}

impl Orientation {
    /// Value of the `orientation` attribute.
    pub fn as_str(self) -> &'static str {
        match self {
            Orientation::Orthogonal => "orthogonal",
            Orientation::Isometric => "isometric",
            Orientation::Hexagonal => "hexagonal",
            Orientation::Shifted => "shifted",
        }
    }
}

impl FromStr for Orientation {
    type Err = MapError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "orthogonal" => Ok(Orientation::Orthogonal),
            "isometric" => Ok(Orientation::Isometric),
            "hexagonal" => Ok(Orientation::Hexagonal),
            "shifted" => Ok(Orientation::Shifted),
            other => Err(MapError::UnsupportedOrientation(other.to_owned())),
        }
    }
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The map document: tilesets in gid allocation order, layers in z-order.
#[derive(Debug, Clone)]
pub struct Map {
    /// Projection of the map.
    pub orientation: Orientation,
    width: u32,
    height: u32,
    tile_width: u32,
    tile_height: u32,
    eye_distance: f32,
    viewport_width: u32,
    viewport_height: u32,
    tilesets: Vec<TileSet>,
    layers: Vec<MapLayer>,
    /// Map-level properties.
    pub properties: Properties,
    listeners: Listeners,
}

impl Map {
    /// Empty orthogonal map of `width` x `height` tiles.
    pub fn new(width: u32, height: u32, tile_width: u32, tile_height: u32) -> Self {
        Map {
            orientation: Orientation::Orthogonal,
            width,
            height,
            tile_width,
            tile_height,
            eye_distance: 0.0,
            viewport_width: 0,
            viewport_height: 0,
            tilesets: Vec::new(),
            layers: Vec::new(),
            properties: Properties::new(),
            listeners: Listeners::default(),
        }
    }

    /// Width in tiles.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in tiles.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Tile width in pixels.
    pub fn tile_width(&self) -> u32 {
        self.tile_width
    }

    /// Tile height in pixels.
    pub fn tile_height(&self) -> u32 {
        self.tile_height
    }

    /// Fires [`MapEvent::MapChanged`] when the size changes.
    pub fn set_tile_size(&mut self, tile_width: u32, tile_height: u32) {
        if (self.tile_width, self.tile_height) != (tile_width, tile_height) {
            self.tile_width = tile_width;
            self.tile_height = tile_height;
            self.fire(MapEvent::MapChanged);
        }
    }

    /// Resizes the map and every layer, shifting layer content by `(dx, dy)`.
    pub fn resize(&mut self, width: u32, height: u32, dx: i32, dy: i32) {
        self.width = width;
        self.height = height;
        for layer in &mut self.layers {
            layer.resize(width, height, dx, dy);
        }
        self.fire(MapEvent::MapChanged);
    }

    /// Parallax eye distance.
    pub fn eye_distance(&self) -> f32 {
        self.eye_distance
    }

    /// Fires [`MapEvent::ParallaxChanged`] when the value changes.
    pub fn set_eye_distance(&mut self, eye_distance: f32) {
        if self.eye_distance != eye_distance {
            self.eye_distance = eye_distance;
            self.fire(MapEvent::ParallaxChanged {
                layer: None,
                change: ParallaxChange::EyeDistance,
            });
        }
    }

    /// Parallax viewport in pixels, `(width, height)`.
    pub fn viewport(&self) -> (u32, u32) {
        (self.viewport_width, self.viewport_height)
    }

    /// Fires [`MapEvent::ParallaxChanged`] when the size changes.
    pub fn set_viewport(&mut self, width: u32, height: u32) {
        if (self.viewport_width, self.viewport_height) != (width, height) {
            self.viewport_width = width;
            self.viewport_height = height;
            self.fire(MapEvent::ParallaxChanged {
                layer: None,
                change: ParallaxChange::Viewport,
            });
        }
    }

    /// Replaces the map properties.
    pub fn set_properties(&mut self, properties: Properties) {
        self.properties = properties;
    }

    // --- listeners ---------------------------------------------------------

    /// Registers a listener. Listeners are called synchronously, in
    /// registration order, from inside the mutating call.
    pub fn add_listener<F>(&mut self, listener: F) -> ListenerId
    where
        F: FnMut(&MapEvent) + 'static,
    {
        self.listeners.add(Box::new(listener))
    }

    /// Returns false when `id` was not registered.
    pub fn remove_listener(&mut self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }

    /// Number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Tells listeners that visible state changed outside the map's own mutators.
    pub fn fire_map_changed(&mut self) {
        self.fire(MapEvent::MapChanged);
    }

    fn fire(&mut self, event: MapEvent) {
        self.listeners.dispatch(&event);
    }

    // --- tilesets ----------------------------------------------------------

    /// Tilesets in gid allocation order.
    pub fn tilesets(&self) -> &[TileSet] {
        &self.tilesets
    }

    /// Tileset with handle `id`.
    pub fn tileset(&self, id: TileSetId) -> Option<&TileSet> {
        self.tilesets.iter().find(|ts| ts.id() == id)
    }

    /// Mutable tileset with handle `id`.
    pub fn tileset_mut(&mut self, id: TileSetId) -> Option<&mut TileSet> {
        self.tilesets.iter_mut().find(|ts| ts.id() == id)
    }

    /// Appends a tileset. Adding one the map already owns does nothing.
    pub fn add_tileset(&mut self, tileset: TileSet) -> TileSetId {
        let id = tileset.id();
        if self.tileset(id).is_none() {
            self.tilesets.push(tileset);
            self.fire(MapEvent::TilesetAdded(id));
        }
        id
    }

    /// Removes a tileset and every cell or animation frame referencing it.
    pub fn remove_tileset(&mut self, id: TileSetId) -> Option<TileSet> {
        let idx = self.tilesets.iter().position(|ts| ts.id() == id)?;
        let removed = self.tilesets.remove(idx);
        for layer in &mut self.layers {
            if let Some(grid) = layer.tiles_mut() {
                grid.clear_tileset(id);
            }
        }
        for ts in &mut self.tilesets {
            ts.forget_tileset(id);
        }
        self.fire(MapEvent::TilesetRemoved(id));
        self.fire(MapEvent::MapChanged);
        Some(removed)
    }

    /// Looks up the tile a reference points at.
    pub fn tile(&self, tile: TileRef) -> Option<&Tile> {
        self.tileset(tile.tileset)?.tile(tile.id)
    }

    /// gid ranges of the current tileset order.
    pub fn gid_table(&self) -> Result<GidTable> {
        GidTable::assign(&self.tilesets)
    }

    // --- layers ------------------------------------------------------------

    /// Layers bottom to top.
    pub fn layers(&self) -> &[MapLayer] {
        &self.layers
    }

    /// Number of layers.
    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    /// Layer at `id`.
    pub fn layer(&self, id: LayerId) -> Option<&MapLayer> {
        self.layers.get(id.0)
    }

    /// Direct access for bulk edits; fires nothing. Call
    /// [`Map::fire_map_changed`] afterwards if the change is visible.
    pub fn layer_mut(&mut self, id: LayerId) -> Option<&mut MapLayer> {
        self.layers.get_mut(id.0)
    }

    /// First layer called `name`.
    pub fn layer_by_name(&self, name: &str) -> Option<(LayerId, &MapLayer)> {
        self.layers
            .iter()
            .enumerate()
            .find(|(_, l)| l.name == name)
            .map(|(i, l)| (LayerId(i), l))
    }

    /// Puts a layer on top of the stack.
    pub fn add_layer(&mut self, layer: MapLayer) -> LayerId {
        self.layers.push(layer);
        let id = LayerId(self.layers.len() - 1);
        self.fire(MapEvent::LayerAdded(id));
        id
    }

    /// Inserts a layer at `index`, clamped to the top of the stack.
    pub fn insert_layer(&mut self, index: usize, layer: MapLayer) -> LayerId {
        let index = index.min(self.layers.len());
        self.layers.insert(index, layer);
        let id = LayerId(index);
        self.fire(MapEvent::LayerAdded(id));
        id
    }

    /// Fires [`MapEvent::LayerRemoved`].
    pub fn remove_layer(&mut self, id: LayerId) -> Option<MapLayer> {
        if id.0 >= self.layers.len() {
            return None;
        }
        let layer = self.layers.remove(id.0);
        self.fire(MapEvent::LayerRemoved(id));
        Some(layer)
    }

    /// Returns false for out-of-range or identical ids.
    pub fn swap_layers(&mut self, a: LayerId, b: LayerId) -> bool {
        if a.0 >= self.layers.len() || b.0 >= self.layers.len() || a == b {
            return false;
        }
        self.layers.swap(a.0, b.0);
        self.fire(MapEvent::LayersSwapped(a, b));
        true
    }

    /// Fires [`MapEvent::LayerRenamed`].
    pub fn set_layer_name(&mut self, id: LayerId, name: impl Into<String>) -> bool {
        let Some(layer) = self.layers.get_mut(id.0) else {
            return false;
        };
        let new_name = name.into();
        let old_name = std::mem::replace(&mut layer.name, new_name.clone());
        self.fire(MapEvent::LayerRenamed {
            layer: id,
            old_name,
            new_name,
        });
        true
    }

    /// Fires [`MapEvent::MapChanged`] when visibility changes.
    pub fn set_layer_visible(&mut self, id: LayerId, visible: bool) -> bool {
        let Some(layer) = self.layers.get_mut(id.0) else {
            return false;
        };
        if layer.visible != visible {
            layer.visible = visible;
            self.fire(MapEvent::MapChanged);
        }
        true
    }

    /// Locking changes nothing visible and fires no event.
    pub fn set_layer_locked(&mut self, id: LayerId, locked: bool) -> bool {
        match self.layers.get_mut(id.0) {
            Some(layer) => {
                layer.locked = locked;
                true
            }
            None => false,
        }
    }

    /// Clamps into `[0.0, 1.0]`; fires when a visible layer changes.
    pub fn set_layer_opacity(&mut self, id: LayerId, opacity: f32) -> bool {
        let Some(layer) = self.layers.get_mut(id.0) else {
            return false;
        };
        let before = layer.opacity();
        layer.set_opacity(opacity);
        if layer.opacity() != before && layer.visible {
            self.fire(MapEvent::MapChanged);
        }
        true
    }

    /// Fires [`MapEvent::ParallaxChanged`] for the layer on change.
    pub fn set_layer_view_plane_distance(&mut self, id: LayerId, distance: f32) -> bool {
        let Some(layer) = self.layers.get_mut(id.0) else {
            return false;
        };
        if layer.view_plane_distance != distance {
            layer.view_plane_distance = distance;
            self.fire_layer_parallax(id);
        }
        true
    }

    /// Fires [`MapEvent::ParallaxChanged`] for the layer on change.
    pub fn set_layer_view_plane_infinitely_far_away(&mut self, id: LayerId, far: bool) -> bool {
        let Some(layer) = self.layers.get_mut(id.0) else {
            return false;
        };
        if layer.view_plane_infinitely_far_away != far {
            layer.view_plane_infinitely_far_away = far;
            self.fire_layer_parallax(id);
        }
        true
    }

    fn fire_layer_parallax(&mut self, id: LayerId) {
        self.fire(MapEvent::ParallaxChanged {
            layer: Some(id),
            change: ParallaxChange::LayerViewPlane,
        });
    }

    /// Moves a layer by `(dx, dy)` tiles.
    pub fn translate_layer(&mut self, id: LayerId, dx: i32, dy: i32) -> bool {
        let Some(layer) = self.layers.get_mut(id.0) else {
            return false;
        };
        layer.translate(dx, dy);
        let visible = layer.visible;
        if visible && (dx, dy) != (0, 0) {
            self.fire(MapEvent::MapChanged);
        }
        true
    }

    /// Sets a cell of a tile or selection layer at map coordinates.
    ///
    /// Fails with [`MapError::UnresolvedTile`] when the tile's tileset is not
    /// owned by this map. Returns `Ok(false)` when the cell is outside the layer.
    pub fn set_tile_at(
        &mut self,
        id: LayerId,
        x: i32,
        y: i32,
        tile: Option<TileRef>,
    ) -> Result<bool> {
        if let Some(t) = tile {
            if self.tileset(t.tileset).is_none() {
                return Err(MapError::UnresolvedTile {
                    tileset: t.tileset.raw(),
                    tile: t.id,
                });
            }
        }
        let Some(layer) = self.layers.get_mut(id.0) else {
            return Ok(false);
        };
        let before = layer.tile_at(x, y);
        if !layer.set_tile_at(x, y, tile) {
            return Ok(false);
        }
        if before != tile && layer.visible {
            self.fire(MapEvent::MapChanged);
        }
        Ok(true)
    }
}
