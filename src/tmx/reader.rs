//! TMX reader.
//!
//! Documents are parsed into a small element tree first, then walked. All
//! tilesets are read before any layer so every gid can be resolved against
//! the complete range table built from the file's `firstgid` values.

use super::format::DocumentKind;
use super::xml::{parse_document, Element};
use crate::codec::bitmap::{decode_image, decode_raw, load_image_file, PixelFormat};
use crate::codec::layer_data::{decode_layer_data, Compression};
use crate::config::ReaderOptions;
use crate::error::{MapError, Result};
use crate::gid::{GidRange, GidTable};
use crate::layer::{MapLayer, MapObject};
use crate::map::{Map, Orientation};
use crate::path::{normalize, resolve_path};
use crate::properties::Properties;
use crate::tile::{KeyFrame, Sprite, Tile, TileRef};
use crate::tileset::{color_from_hex, grid_size, TileBitmap, TileImage, TileSet};
use base64::prelude::BASE64_STANDARD;
use base64::Engine;
use flate2::read::GzDecoder;
use image::RgbaImage;
use macroquad::math::vec2;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

/// Largest `tilecount` accepted for a shared image whose pixels could not be
/// loaded to check it.
const MAX_UNCHECKED_TILE_COUNT: u32 = 1 << 16;

/// Loads maps and tilesets from TMX.
#[derive(Debug, Clone, Copy, Default)]
pub struct TmxReader {
    options: ReaderOptions,
}

/// Animation whose frame gids are resolved once the gid table is known.
struct PendingAnimation {
    tile: u32,
    keyframes: Vec<(String, Vec<u32>)>,
}

impl TmxReader {
    /// Reader using `options`.
    pub fn new(options: ReaderOptions) -> Self {
        TmxReader { options }
    }

    /// Options this reader was built with.
    pub fn options(&self) -> ReaderOptions {
        self.options
    }

    /// Reads a `.tmx` or `.tmx.gz` file. References inside the document are
    /// resolved against its location.
    pub fn read_map(&self, path: impl AsRef<Path>) -> Result<Map> {
        let path = path.as_ref();
        let kind = DocumentKind::from_path(path)?;
        if !kind.is_map() {
            return Err(MapError::UnsupportedFormat(format!(
                "{} is not a map file",
                path.display()
            )));
        }
        log::info!("Loading map {}", path.display());

        let file = File::open(path).map_err(|e| MapError::io(path, e))?;
        let document = normalize(path);
        let map = if kind == DocumentKind::CompressedMap {
            self.read_map_from(BufReader::new(GzDecoder::new(file)), Some(&document))?
        } else {
            self.read_map_from(BufReader::new(file), Some(&document))?
        };

        log::info!(
            "Loaded map {} ({}x{}, {} tilesets, {} layers)",
            path.display(),
            map.width(),
            map.height(),
            map.tilesets().len(),
            map.layer_count()
        );
        Ok(map)
    }

    /// Reads a map document from a stream. Without `document`, references
    /// are kept exactly as written.
    pub fn read_map_from<R: BufRead>(&self, input: R, document: Option<&Path>) -> Result<Map> {
        let root = parse_document(input)?;
        Loader::new(self.options, document).map(&root)
    }

    /// Reads a standalone `.tsx` tileset. The returned tileset remembers the
    /// file as its source, so maps refer to it instead of inlining it.
    pub fn read_tileset(&self, path: impl AsRef<Path>) -> Result<TileSet> {
        let path = path.as_ref();
        if DocumentKind::from_path(path)? != DocumentKind::Tileset {
            return Err(MapError::UnsupportedFormat(format!(
                "{} is not a tileset file",
                path.display()
            )));
        }
        log::debug!("Loading tileset {}", path.display());

        let file = File::open(path).map_err(|e| MapError::io(path, e))?;
        let document = normalize(path);
        let mut tileset = self.read_tileset_from(BufReader::new(file), Some(&document))?;
        tileset.source = Some(document);
        Ok(tileset)
    }

    /// Reads a tileset document from a stream. Animation frames resolve
    /// within the tileset, starting at its `firstgid` (1 when absent).
    pub fn read_tileset_from<R: BufRead>(
        &self,
        input: R,
        document: Option<&Path>,
    ) -> Result<TileSet> {
        let root = parse_document(input)?;
        expect_root(&root, "tileset")?;
        let loader = Loader::new(self.options, document);
        let first_gid: u32 = root.parse_or("firstgid", 1)?;
        let (mut tileset, pending) = loader.tileset(&root)?;

        let (id, span) = (tileset.id(), tileset.gid_span());
        resolve_animations(&mut tileset, pending, |gid| {
            (gid >= first_gid && gid - first_gid < span).then(|| TileRef::new(id, gid - first_gid))
        })?;
        Ok(tileset)
    }
}

fn expect_root(root: &Element, expected: &'static str) -> Result<()> {
    if root.name == expected {
        Ok(())
    } else {
        Err(MapError::UnexpectedRoot {
            expected,
            found: root.name.clone(),
        })
    }
}

fn resolve_animations(
    tileset: &mut TileSet,
    pending: Vec<PendingAnimation>,
    resolve: impl Fn(u32) -> Option<TileRef>,
) -> Result<()> {
    for animation in pending {
        let mut keyframes = Vec::with_capacity(animation.keyframes.len());
        for (name, gids) in animation.keyframes {
            let frames = gids
                .into_iter()
                .map(|gid| {
                    resolve(gid).ok_or_else(|| MapError::InvalidFrameGid {
                        tileset: tileset.name.clone(),
                        tile: animation.tile,
                        gid,
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            keyframes.push(KeyFrame::new(name, frames));
        }
        if let Some(tile) = tileset.tile_mut(animation.tile) {
            tile.animation = Some(Sprite { keyframes });
        }
    }
    Ok(())
}

fn overlaps(a: &GidRange, b: &GidRange) -> bool {
    match (a.last_gid(), b.last_gid()) {
        (Some(a_last), Some(b_last)) => a.first_gid <= b_last && b.first_gid <= a_last,
        _ => false,
    }
}

fn load_pixels(path: &Path) -> Option<RgbaImage> {
    match load_image_file(path) {
        Ok(img) => Some(img),
        Err(e) => {
            log::warn!("could not load image {}: {e}", path.display());
            None
        }
    }
}

/// State of one load.
struct Loader<'a> {
    options: ReaderOptions,
    document: Option<&'a Path>,
}

impl<'a> Loader<'a> {
    fn new(options: ReaderOptions, document: Option<&'a Path>) -> Self {
        Loader { options, document }
    }

    fn resolve(&self, reference: &str) -> PathBuf {
        match self.document {
            Some(doc) => resolve_path(doc, reference),
            None => PathBuf::from(reference),
        }
    }

    fn unknown(&self, element: &Element, parent: &Element) -> Result<()> {
        if self.options.strict {
            return Err(MapError::UnknownElement {
                element: element.name.clone(),
                parent: parent.name.clone(),
                position: element.position,
            });
        }
        log::warn!(
            "skipping unknown element <{}> inside <{}> near byte {}",
            element.name,
            parent.name,
            element.position
        );
        Ok(())
    }

    fn map(&self, root: &Element) -> Result<Map> {
        expect_root(root, "map")?;
        if let Some(version) = root.attr("version") {
            if version != "1.0" {
                log::warn!("map declares version {version}, reading it as 1.0");
            }
        }

        let mut map = Map::new(
            root.parse_required("width")?,
            root.parse_required("height")?,
            root.parse_required("tilewidth")?,
            root.parse_required("tileheight")?,
        );
        if let Some(orientation) = root.attr("orientation") {
            map.orientation = orientation.parse::<Orientation>()?;
        }
        map.set_eye_distance(root.parse_or("eyeDistance", 0.0)?);
        map.set_viewport(
            root.parse_or("viewportWidth", 0)?,
            root.parse_or("viewportHeight", 0)?,
        );

        let mut ranges: Vec<GidRange> = Vec::new();
        let mut pending = Vec::new();
        for child in root.children.iter().filter(|c| c.name == "tileset") {
            let first_gid: u32 = child.parse_required("firstgid")?;
            let (tileset, animations) = match child.attr("source") {
                Some(source) => (self.external_tileset(child, source)?, Vec::new()),
                None => self.tileset(child)?,
            };
            let range = GidRange {
                first_gid,
                tileset: tileset.id(),
                span: tileset.gid_span(),
            };
            // gid 0 is "no tile"; ranges must fit in u32 and stay disjoint.
            if first_gid == 0
                || (range.span > 0 && range.last_gid().is_none())
                || ranges.iter().any(|r| overlaps(r, &range))
            {
                return Err(child.invalid("firstgid", &first_gid.to_string()));
            }
            log::debug!(
                "tileset '{}' covers {} gids from {}",
                tileset.name,
                range.span,
                first_gid
            );
            ranges.push(range);
            pending.push((tileset.id(), animations));
            map.add_tileset(tileset);
        }

        let table = GidTable::from_ranges(ranges)?;
        for (id, animations) in pending {
            if let Some(tileset) = map.tileset_mut(id) {
                resolve_animations(tileset, animations, |gid| table.resolve(gid))?;
            }
        }

        for child in &root.children {
            match child.name.as_str() {
                "tileset" => {}
                "properties" => map.set_properties(self.properties(child)?),
                "layer" | "selection" => {
                    let layer = self.tile_layer(child, &map, &table)?;
                    map.add_layer(layer);
                }
                "objectgroup" => {
                    let layer = self.object_group(child, &map)?;
                    map.add_layer(layer);
                }
                _ => self.unknown(child, root)?,
            }
        }
        if map.layer_count() == 0 {
            log::warn!("map has no layers");
        }
        Ok(map)
    }

    fn properties(&self, el: &Element) -> Result<Properties> {
        let mut props = Properties::new();
        for child in &el.children {
            if child.name != "property" {
                self.unknown(child, el)?;
                continue;
            }
            let name = child.required("name")?;
            let value = match child.attr("value") {
                Some(value) => value.to_owned(),
                None => child.text.clone(),
            };
            props.insert(name, value);
        }
        Ok(props)
    }

    // --- tilesets ----------------------------------------------------------

    fn external_tileset(&self, el: &Element, source: &str) -> Result<TileSet> {
        let path = self.resolve(source);
        let mut tileset = TmxReader::new(self.options).read_tileset(&path)?;
        if let Some(base_dir) = el.attr("basedir") {
            tileset.base_dir = Some(base_dir.to_owned());
        }
        Ok(tileset)
    }

    fn tileset(&self, el: &Element) -> Result<(TileSet, Vec<PendingAnimation>)> {
        let mut tileset = TileSet::new(el.attr("name").unwrap_or_default());
        tileset.base_dir = el.attr("basedir").map(str::to_owned);
        tileset.tile_width = el.parse_or("tilewidth", 0)?;
        tileset.tile_height = el.parse_or("tileheight", 0)?;
        tileset.spacing = el.parse_or("spacing", 0)?;
        tileset.margin = el.parse_or("margin", 0)?;
        let tile_count: Option<u32> = el.parse("tilecount")?;

        let mut tiles = Vec::new();
        for child in &el.children {
            match child.name.as_str() {
                "properties" => tileset.properties = self.properties(child)?,
                "image" if child.attr("id").is_some() => {
                    let id = child.parse_required("id")?;
                    let image = self.image(child)?;
                    tileset.insert_image(id, image);
                }
                "image" => {
                    let bitmap = self.tile_bitmap(child)?;
                    let cells = bitmap.image.as_ref().map(|img| {
                        let (cols, rows) = grid_size(
                            img.width(),
                            img.height(),
                            tileset.tile_width,
                            tileset.tile_height,
                            tileset.spacing,
                            tileset.margin,
                        );
                        cols.saturating_mul(rows)
                    });
                    let count = match (tile_count, cells) {
                        (Some(count), Some(cells)) if count > cells => {
                            return Err(el.invalid("tilecount", &count.to_string()));
                        }
                        (Some(count), None) if count > MAX_UNCHECKED_TILE_COUNT => {
                            return Err(el.invalid("tilecount", &count.to_string()));
                        }
                        (Some(count), _) => count,
                        (None, Some(cells)) => cells,
                        (None, None) => {
                            log::warn!(
                                "tileset '{}' has no tilecount and its image could not be read",
                                tileset.name
                            );
                            0
                        }
                    };
                    let (w, h, spacing, margin) = (
                        tileset.tile_width,
                        tileset.tile_height,
                        tileset.spacing,
                        tileset.margin,
                    );
                    tileset.set_tile_bitmap(bitmap, w, h, spacing, margin, count);
                }
                "tile" => tiles.push(child),
                _ => self.unknown(child, el)?,
            }
        }

        let mut pending = Vec::new();
        for child in tiles {
            self.tile(&mut tileset, child, &mut pending)?;
        }

        // Image list without tile elements: tile n shows image n for every
        // tile the count announces.
        if tileset.bitmap.is_none() && tileset.tile_count() == 0 {
            let count = tile_count.unwrap_or(0);
            if (0..count).any(|id| tileset.image(id).is_none()) {
                return Err(el.invalid("tilecount", &count.to_string()));
            }
            for id in 0..count {
                tileset.add_tile(Tile::with_image(id, id));
            }
        }
        Ok((tileset, pending))
    }

    fn tile_bitmap(&self, el: &Element) -> Result<TileBitmap> {
        let transparent = match el.attr("trans") {
            Some(raw) => Some(color_from_hex(raw).ok_or_else(|| el.invalid("trans", raw))?),
            None => None,
        };
        let TileImage { image, source } = self.image(el)?;
        Ok(TileBitmap {
            source,
            image,
            transparent,
        })
    }

    fn tile(
        &self,
        tileset: &mut TileSet,
        el: &Element,
        pending: &mut Vec<PendingAnimation>,
    ) -> Result<()> {
        let id: u32 = el.parse_required("id")?;
        let mut tile = tileset.remove_tile(id).unwrap_or_else(|| Tile::new(id));
        for child in &el.children {
            match child.name.as_str() {
                "properties" => tile.properties = self.properties(child)?,
                "image" => tile.image = Some(self.tile_image(tileset, child)?),
                "animation" => pending.push(PendingAnimation {
                    tile: id,
                    keyframes: self.keyframes(child)?,
                }),
                _ => self.unknown(child, el)?,
            }
        }
        tileset.add_tile(tile);
        Ok(())
    }

    /// Image of a single tile: either inline content or `<image id>` naming
    /// an entry of the tileset-level list.
    fn tile_image(&self, tileset: &mut TileSet, el: &Element) -> Result<u32> {
        if el.attr("source").is_none() && el.child("data").is_none() {
            let id: u32 = el.parse_required("id")?;
            if tileset.image(id).is_none() {
                return Err(el.invalid("id", &id.to_string()));
            }
            return Ok(id);
        }
        let image = self.image(el)?;
        Ok(tileset.add_image(image))
    }

    fn keyframes(&self, el: &Element) -> Result<Vec<(String, Vec<u32>)>> {
        let mut keyframes = Vec::new();
        for key in &el.children {
            if key.name != "keyframe" {
                self.unknown(key, el)?;
                continue;
            }
            let mut gids = Vec::new();
            for frame in &key.children {
                if frame.name == "tile" {
                    gids.push(frame.parse_required("gid")?);
                } else {
                    self.unknown(frame, key)?;
                }
            }
            keyframes.push((key.attr("name").unwrap_or_default().to_owned(), gids));
        }
        Ok(keyframes)
    }

    /// `<image>` with embedded `<data>`, an external `source`, or both.
    /// External files that cannot be decoded keep only their path.
    fn image(&self, el: &Element) -> Result<TileImage> {
        let source = el.attr("source").map(|s| self.resolve(s));
        let image = match el.child("data") {
            Some(data) => Some(embedded_pixels(el, data)?),
            None => match &source {
                Some(path) => load_pixels(path),
                None => {
                    return Err(MapError::MissingAttribute {
                        element: el.name.clone(),
                        attribute: "source",
                        position: el.position,
                    })
                }
            },
        };
        Ok(TileImage { image, source })
    }

    // --- layers ------------------------------------------------------------

    fn layer_attributes(&self, el: &Element, layer: &mut MapLayer) -> Result<()> {
        layer.set_offset(el.parse_or("x", 0)?, el.parse_or("y", 0)?);
        layer.visible = el.flag("visible", true)?;
        layer.locked = el.flag("locked", false)?;
        layer.set_opacity(el.parse_or("opacity", 1.0)?);
        layer.view_plane_distance = el.parse_or("viewPlaneDistance", 0.0)?;
        layer.view_plane_infinitely_far_away = el.flag("viewPlaneInfinitelyFarAway", false)?;
        Ok(())
    }

    fn tile_layer(&self, el: &Element, map: &Map, table: &GidTable) -> Result<MapLayer> {
        let name = el.attr("name").unwrap_or_default();
        let width: u32 = el.parse_or("width", map.width())?;
        let height: u32 = el.parse_or("height", map.height())?;
        let cells = usize::try_from(u64::from(width) * u64::from(height))
            .map_err(|_| el.invalid("height", &height.to_string()))?;
        // The cell count is checked against the data before the grid exists.
        let data = el.child("data").ok_or_else(|| MapError::InvalidLayerData {
            layer: name.to_owned(),
            reason: "no <data> element".to_owned(),
        })?;
        let gids = layer_gids(data, name, cells)?;

        let mut layer = if el.name == "selection" {
            MapLayer::new_selection(name, width, height)
        } else {
            MapLayer::new_tile_layer(name, width, height)
        };
        self.layer_attributes(el, &mut layer)?;
        let tile_width = el.parse("tileWidth")?;
        let tile_height = el.parse("tileHeight")?;

        let Some(grid) = layer.tiles_mut() else {
            return Ok(layer);
        };
        grid.tile_width = tile_width;
        grid.tile_height = tile_height;
        for (i, gid) in gids.into_iter().enumerate() {
            if gid == 0 {
                continue;
            }
            let tile = table.resolve(gid).ok_or_else(|| MapError::InvalidTileGid {
                layer: name.to_owned(),
                gid,
                max_gid: table.max_gid(),
            })?;
            let i = i as u32;
            grid.set_tile_at(i % width, i / width, Some(tile));
        }

        let mut properties = Properties::new();
        for child in &el.children {
            match child.name.as_str() {
                "properties" => properties = self.properties(child)?,
                "data" => {}
                "tileproperties" => {
                    for cell in &child.children {
                        if cell.name != "tile" {
                            self.unknown(cell, child)?;
                            continue;
                        }
                        let x = cell.parse_required("x")?;
                        let y = cell.parse_required("y")?;
                        let props = match cell.child("properties") {
                            Some(p) => self.properties(p)?,
                            None => Properties::new(),
                        };
                        grid.set_instance_properties(x, y, props);
                    }
                }
                _ => self.unknown(child, el)?,
            }
        }
        layer.properties = properties;
        Ok(layer)
    }

    fn object_group(&self, el: &Element, map: &Map) -> Result<MapLayer> {
        let mut layer = MapLayer::new_object_group(
            el.attr("name").unwrap_or_default(),
            el.parse_or("width", map.width())?,
            el.parse_or("height", map.height())?,
        );
        self.layer_attributes(el, &mut layer)?;

        let mut objects = Vec::new();
        for child in &el.children {
            match child.name.as_str() {
                "properties" => layer.properties = self.properties(child)?,
                "object" => objects.push(self.object(child)?),
                _ => self.unknown(child, el)?,
            }
        }
        if let Some(slot) = layer.objects_mut() {
            *slot = objects;
        }
        Ok(layer)
    }

    fn object(&self, el: &Element) -> Result<MapObject> {
        let mut object = MapObject::new(
            el.attr("name").unwrap_or_default(),
            vec2(el.parse_or("x", 0.0)?, el.parse_or("y", 0.0)?),
        );
        object.kind = el.attr("type").unwrap_or_default().to_owned();
        object.size = vec2(el.parse_or("width", 0.0)?, el.parse_or("height", 0.0)?);
        for child in &el.children {
            match child.name.as_str() {
                "properties" => object.properties = self.properties(child)?,
                "image" => object.image_source = Some(self.resolve(child.required("source")?)),
                _ => self.unknown(child, el)?,
            }
        }
        Ok(object)
    }
}

fn embedded_pixels(image: &Element, data: &Element) -> Result<RgbaImage> {
    match data.attr("encoding") {
        None | Some("base64") => {}
        Some(other) => return Err(MapError::UnsupportedEncoding(other.to_owned())),
    }
    let compact: String = data.text.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = BASE64_STANDARD.decode(compact.as_bytes())?;

    let format = image.attr("format").unwrap_or("png");
    if format.eq_ignore_ascii_case("png") {
        return decode_image(&bytes);
    }
    if !format.eq_ignore_ascii_case("raw") {
        return Err(image.invalid("format", format));
    }
    let pixel_format = image.required("pixelFormat")?;
    let pixel_format =
        PixelFormat::from_name(pixel_format).ok_or_else(|| image.invalid("pixelFormat", pixel_format))?;
    let big_endian = match image.attr("byteOrder").unwrap_or("bigEndian") {
        "bigEndian" => true,
        "littleEndian" => false,
        other => return Err(image.invalid("byteOrder", other)),
    };
    decode_raw(
        &bytes,
        image.parse_required("width")?,
        image.parse_required("height")?,
        pixel_format,
        big_endian,
    )
}

/// Cell gids of a `<data>` element in row-major order.
fn layer_gids(data: &Element, layer: &str, expected: usize) -> Result<Vec<u32>> {
    let gids = match data.attr("encoding") {
        None => data
            .children
            .iter()
            .filter(|c| c.name == "tile")
            .map(|c| c.parse_or("gid", 0))
            .collect::<Result<Vec<u32>>>()?,
        Some("base64") => {
            let compression = Compression::from_attr(data.attr("compression"))?;
            decode_layer_data(layer, &data.text, compression)?
        }
        Some("csv") => data
            .text
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| {
                s.parse().map_err(|_| MapError::InvalidLayerData {
                    layer: layer.to_owned(),
                    reason: format!("'{s}' is not a gid"),
                })
            })
            .collect::<Result<Vec<u32>>>()?,
        Some(other) => return Err(MapError::UnsupportedEncoding(other.to_owned())),
    };

    if gids.len() != expected {
        return Err(MapError::InvalidLayerData {
            layer: layer.to_owned(),
            reason: format!("expected {expected} cells, found {}", gids.len()),
        });
    }
    Ok(gids)
}
