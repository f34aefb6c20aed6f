//! TMX writer.
//!
//! gids are assigned fresh for every save from the map's tileset order
//! (see [`GidTable::assign`]); nothing about them is stored in the model.

use super::format::DocumentKind;
use super::xml::{Tag, XmlSink};
use crate::codec::bitmap::{encode_png, encode_raw, save_png_file, ImageFormat};
use crate::codec::layer_data::{encode_layer_data, Compression};
use crate::config::{ImageStrategy, WriterOptions};
use crate::error::{MapError, Result};
use crate::gid::{GidRange, GidTable};
use crate::layer::{LayerKind, MapLayer, MapObject, TileLayer};
use crate::map::Map;
use crate::path::{normalize, relative_path};
use crate::properties::Properties;
use crate::tile::{Sprite, Tile, TileRef};
use crate::tileset::{color_to_hex, TileBitmap, TileImage, TileSet};
use base64::prelude::BASE64_STANDARD;
use base64::Engine;
use flate2::write::GzEncoder;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

const MAP_DTD: &str = "http://mapeditor.org/dtd/1.0/map.dtd";

/// Serializes maps and tilesets to TMX.
#[derive(Debug, Clone, Default)]
pub struct TmxWriter {
    options: WriterOptions,
}

impl TmxWriter {
    /// Writer using `options`.
    pub fn new(options: WriterOptions) -> Self {
        TmxWriter { options }
    }

    /// Options this writer was built with.
    pub fn options(&self) -> &WriterOptions {
        &self.options
    }

    /// Writes `map` to a `.tmx` or `.tmx.gz` file. File references inside the
    /// document are made relative to `path`.
    pub fn write_map(&self, map: &Map, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let kind = DocumentKind::from_path(path)?;
        if !kind.is_map() {
            return Err(MapError::UnsupportedFormat(format!(
                "{} is not a map file",
                path.display()
            )));
        }
        log::info!("Writing map to {}", path.display());

        let file = File::create(path).map_err(|e| MapError::io(path, e))?;
        let out = BufWriter::new(file);
        if kind == DocumentKind::CompressedMap {
            let gz = GzEncoder::new(out, flate2::Compression::default());
            let gz = self.write_map_to(map, gz, Some(path))?;
            gz.finish()
                .and_then(|mut out| out.flush())
                .map_err(|e| MapError::io(path, e))?;
        } else {
            let mut out = self.write_map_to(map, out, Some(path))?;
            out.flush().map_err(|e| MapError::io(path, e))?;
        }

        log::info!(
            "Wrote {} layers and {} tilesets to {}",
            map.layer_count(),
            map.tilesets().len(),
            path.display()
        );
        Ok(())
    }

    /// Writes `map` to a stream and hands the stream back. `document` is the
    /// location relative references are computed against; without it,
    /// references are written as stored in the model.
    pub fn write_map_to<W: Write>(&self, map: &Map, out: W, document: Option<&Path>) -> Result<W> {
        let mut session = Session::new(&self.options, out, document);
        session.map(map)?;
        Ok(session.xml.into_inner())
    }

    /// Writes a standalone `.tsx` tileset. Its tiles get gids starting at 1;
    /// animation frames must stay within the tileset.
    pub fn write_tileset(&self, tileset: &TileSet, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if DocumentKind::from_path(path)? != DocumentKind::Tileset {
            return Err(MapError::UnsupportedFormat(format!(
                "{} is not a tileset file",
                path.display()
            )));
        }
        log::info!("Writing tileset '{}' to {}", tileset.name, path.display());

        let file = File::create(path).map_err(|e| MapError::io(path, e))?;
        let mut out = self.write_tileset_to(tileset, BufWriter::new(file), Some(path))?;
        out.flush().map_err(|e| MapError::io(path, e))
    }

    /// Writes `tileset` as a standalone document to `out` and returns it.
    ///
    /// References are made relative to `document` when given.
    pub fn write_tileset_to<W: Write>(
        &self,
        tileset: &TileSet,
        out: W,
        document: Option<&Path>,
    ) -> Result<W> {
        let table = GidTable::from_ranges(vec![GidRange {
            first_gid: 1,
            tileset: tileset.id(),
            span: tileset.gid_span(),
        }])?;
        let mut session = Session::new(&self.options, out, document);
        session.xml.declaration()?;
        session.inline_tileset(tileset, 1, &table)?;
        Ok(session.xml.into_inner())
    }
}

/// State of one save.
struct Session<'a, W: Write> {
    options: &'a WriterOptions,
    images: ImageStrategy,
    document: Option<&'a Path>,
    xml: XmlSink<W>,
}

impl<'a, W: Write> Session<'a, W> {
    fn new(options: &'a WriterOptions, out: W, document: Option<&'a Path>) -> Self {
        Session {
            options,
            images: options.image_strategy(),
            document,
            xml: XmlSink::new(out),
        }
    }

    /// Reference to `target` as stored in the document.
    fn reference(&self, target: &Path) -> String {
        match self.document {
            Some(doc) => relative_path(doc, target),
            None => target.to_string_lossy().into_owned(),
        }
    }

    fn map(&mut self, map: &Map) -> Result<()> {
        let table = map.gid_table()?;
        let (viewport_width, viewport_height) = map.viewport();

        self.xml.declaration()?;
        self.xml.doctype("map", MAP_DTD)?;
        self.xml.open(
            Tag::new("map")
                .attr("version", "1.0")
                .attr("orientation", map.orientation)
                .attr("width", map.width())
                .attr("height", map.height())
                .attr("tilewidth", map.tile_width())
                .attr("tileheight", map.tile_height())
                .attr("eyeDistance", map.eye_distance())
                .attr("viewportWidth", viewport_width)
                .attr("viewportHeight", viewport_height),
        )?;
        self.properties(&map.properties)?;

        for tileset in map.tilesets() {
            let first_gid = table.first_gid(tileset.id()).unwrap_or(1);
            log::debug!(
                "tileset '{}' gets {} gids from {}",
                tileset.name,
                tileset.gid_span(),
                first_gid
            );
            self.tileset(tileset, first_gid, &table)?;
        }

        if self.options.useful_comments && self.options.encode_layer_data {
            let comment = if self.options.layer_compression {
                "Layer data is compressed (GZip) binary data, encoded in Base64"
            } else {
                "Layer data is binary data, encoded in Base64"
            };
            self.xml.comment(comment)?;
        }

        for layer in map.layers() {
            log::debug!("writing {} '{}'", layer.kind().element_name(), layer.name);
            self.layer(layer, &table)?;
        }
        self.xml.close()
    }

    fn properties(&mut self, props: &Properties) -> Result<()> {
        if props.is_empty() {
            return Ok(());
        }
        self.xml.open(Tag::new("properties"))?;
        for (name, value) in props.iter() {
            let tag = Tag::new("property").attr("name", name);
            if value.contains(|c: char| c == '\n' || c == '\r') {
                self.xml.cdata_element(tag, value)?;
            } else {
                self.xml.empty(tag.attr("value", value))?;
            }
        }
        self.xml.close()
    }

    // --- tilesets ----------------------------------------------------------

    fn tileset(&mut self, tileset: &TileSet, first_gid: u32, table: &GidTable) -> Result<()> {
        match &tileset.source {
            Some(source) => {
                let source = self.reference(source);
                self.xml.empty(
                    Tag::new("tileset")
                        .attr("firstgid", first_gid)
                        .attr("source", source)
                        .attr_opt("basedir", tileset.base_dir.as_deref()),
                )
            }
            None => self.inline_tileset(tileset, first_gid, table),
        }
    }

    fn inline_tileset(&mut self, tileset: &TileSet, first_gid: u32, table: &GidTable) -> Result<()> {
        let shared = tileset.bitmap.is_some();
        let tag = Tag::new("tileset")
            .attr("firstgid", first_gid)
            .attr("name", &tileset.name)
            .attr_if(shared || tileset.tile_width != 0, "tilewidth", tileset.tile_width)
            .attr_if(shared || tileset.tile_height != 0, "tileheight", tileset.tile_height)
            .attr_if(tileset.spacing != 0, "spacing", tileset.spacing)
            .attr_if(tileset.margin != 0, "margin", tileset.margin)
            .attr("tilecount", tileset.gid_span())
            .attr_opt("basedir", tileset.base_dir.as_deref());
        self.xml.open(tag)?;
        self.properties(&tileset.properties)?;

        if let Some(bitmap) = &tileset.bitmap {
            self.tile_bitmap(tileset, bitmap)?;
            for tile in tileset
                .tiles()
                .filter(|t| !t.properties.is_empty() || t.is_animated())
            {
                self.tile(tileset, first_gid, tile, table)?;
            }
            return self.xml.close();
        }

        if self.images.tileset_list {
            for (id, image) in tileset.images() {
                self.listed_image(id, image)?;
            }
        }
        // A one-for-one tileset in list layout is rebuilt from the image list
        // alone, unless some tile carries data of its own.
        let write_tiles = !self.images.tileset_list
            || !tileset.is_one_for_one()
            || tileset
                .tiles()
                .any(|t| !t.properties.is_empty() || t.is_animated());
        if write_tiles {
            for tile in tileset.tiles() {
                self.tile(tileset, first_gid, tile, table)?;
            }
        }
        self.xml.close()
    }

    fn tile_bitmap(&mut self, tileset: &TileSet, bitmap: &TileBitmap) -> Result<()> {
        let trans = bitmap.transparent.map(color_to_hex);
        if let Some(source) = &bitmap.source {
            let source = self.reference(source);
            return self.xml.empty(
                Tag::new("image")
                    .attr("source", source)
                    .attr_opt("trans", trans),
            );
        }
        match &bitmap.image {
            Some(pixels) => self.embedded_image(Tag::new("image").attr_opt("trans", trans), pixels),
            None => {
                log::warn!("tileset '{}' has a tile bitmap with neither pixels nor source", tileset.name);
                Ok(())
            }
        }
    }

    /// One entry of the tileset-level image list.
    fn listed_image(&mut self, id: u32, image: &TileImage) -> Result<()> {
        let tag = Tag::new("image").attr("id", id);
        match (&image.source, &image.image) {
            (Some(source), _) if !self.images.embed => {
                let source = self.reference(source);
                self.xml.empty(tag.attr("source", source))
            }
            (source, Some(pixels)) => {
                let source = source.as_deref().map(|s| self.reference(s));
                self.embedded_image(tag.attr_opt("source", source), pixels)
            }
            (Some(source), None) => {
                let source = self.reference(source);
                self.xml.empty(tag.attr("source", source))
            }
            (None, None) => Err(MapError::Image(format!(
                "image {id} has neither pixels nor a source"
            ))),
        }
    }

    fn embedded_image(&mut self, tag: Tag, pixels: &image::RgbaImage) -> Result<()> {
        let strategy = self.images;
        let (tag, bytes) = match strategy.format {
            ImageFormat::Png => (tag.attr("format", "png"), encode_png(pixels)?),
            ImageFormat::Raw => (
                tag.attr("format", "raw")
                    .attr("pixelFormat", strategy.pixel_format.name())
                    .attr(
                        "byteOrder",
                        if strategy.big_endian {
                            "bigEndian"
                        } else {
                            "littleEndian"
                        },
                    )
                    .attr("width", pixels.width())
                    .attr("height", pixels.height()),
                encode_raw(pixels, strategy.pixel_format, strategy.big_endian),
            ),
        };
        self.xml.open(tag)?;
        self.xml.text_element(
            Tag::new("data").attr("encoding", "base64"),
            &BASE64_STANDARD.encode(bytes),
        )?;
        self.xml.close()
    }

    fn tile(
        &mut self,
        tileset: &TileSet,
        first_gid: u32,
        tile: &Tile,
        table: &GidTable,
    ) -> Result<()> {
        let tag = Tag::new("tile").attr("id", tile.id);
        let image = if tileset.bitmap.is_none() { tile.image } else { None };
        if tile.properties.is_empty() && tile.animation.is_none() && image.is_none() {
            return self.xml.empty(tag);
        }

        self.xml.open(tag)?;
        self.properties(&tile.properties)?;
        if let Some(image_id) = image {
            self.tile_image(tileset, tile.id, first_gid + tile.id, image_id)?;
        }
        if let Some(sprite) = &tile.animation {
            self.animation(sprite, table)?;
        }
        self.xml.close()
    }

    fn tile_image(
        &mut self,
        tileset: &TileSet,
        tile_id: u32,
        gid: u32,
        image_id: u32,
    ) -> Result<()> {
        if self.images.tileset_list {
            return self.xml.empty(Tag::new("image").attr("id", image_id));
        }
        let image = tileset.image(image_id).ok_or_else(|| {
            MapError::Image(format!(
                "tile {tile_id} of tileset '{}' uses unknown image {image_id}",
                tileset.name
            ))
        })?;

        match (&image.source, &image.image) {
            (source, Some(pixels)) if self.images.embed => {
                let source = source.as_deref().map(|s| self.reference(s));
                self.embedded_image(Tag::new("image").attr_opt("source", source), pixels)
            }
            (Some(source), _) => {
                let source = self.reference(source);
                self.xml.empty(Tag::new("image").attr("source", source))
            }
            (None, Some(pixels)) => {
                let source = self.spill(gid, pixels)?;
                self.xml.empty(Tag::new("image").attr("source", source))
            }
            (None, None) => Err(MapError::Image(format!(
                "image {image_id} of tileset '{}' has neither pixels nor a source",
                tileset.name
            ))),
        }
    }

    /// Saves a source-less tile image as `<prefix><gid>.png` next to the
    /// document and returns the reference to store.
    fn spill(&self, gid: u32, pixels: &image::RgbaImage) -> Result<String> {
        let dir = self.options.spill_dir(self.document);
        let target = dir.join(format!("{}{}.png", self.options.tile_image_prefix, gid));
        save_png_file(pixels, &target)?;
        log::debug!("spilled image of gid {gid} to {}", target.display());
        Ok(match self.document {
            Some(doc) => relative_path(doc, &normalize(&target)),
            None => target.to_string_lossy().into_owned(),
        })
    }

    fn animation(&mut self, sprite: &Sprite, table: &GidTable) -> Result<()> {
        self.xml.open(Tag::new("animation"))?;
        for key in &sprite.keyframes {
            self.xml.open(Tag::new("keyframe").attr("name", &key.name))?;
            for frame in &key.frames {
                let gid = gid_of(table, *frame)?;
                self.xml.empty(Tag::new("tile").attr("gid", gid))?;
            }
            self.xml.close()?;
        }
        self.xml.close()
    }

    // --- layers ------------------------------------------------------------

    fn layer(&mut self, layer: &MapLayer, table: &GidTable) -> Result<()> {
        let bounds = layer.bounds();
        let grid = layer.tiles();
        if let Some(grid) = grid {
            if (grid.width(), grid.height()) != (bounds.width, bounds.height) {
                return Err(MapError::InvalidLayerData {
                    layer: layer.name.clone(),
                    reason: format!(
                        "grid is {}x{} but the layer is {}x{}",
                        grid.width(),
                        grid.height(),
                        bounds.width,
                        bounds.height
                    ),
                });
            }
        }
        let tag = Tag::new(layer.kind().element_name())
            .attr("name", &layer.name)
            .attr("width", bounds.width)
            .attr("height", bounds.height)
            .attr("viewPlaneDistance", layer.view_plane_distance)
            .attr(
                "viewPlaneInfinitelyFarAway",
                layer.view_plane_infinitely_far_away,
            )
            .attr_if(bounds.x != 0, "x", bounds.x)
            .attr_if(bounds.y != 0, "y", bounds.y)
            .attr_if(!layer.visible, "visible", 0)
            .attr_if(layer.locked, "locked", 1)
            .attr_if(layer.opacity() < 1.0, "opacity", layer.opacity())
            .attr_opt("tileWidth", grid.and_then(|g| g.tile_width))
            .attr_opt("tileHeight", grid.and_then(|g| g.tile_height));

        self.xml.open(tag)?;
        self.properties(&layer.properties)?;
        match layer.kind() {
            LayerKind::Tiles(grid) | LayerKind::Selection(grid) => {
                self.tile_data(grid, table)?;
                self.instance_properties(grid)?;
            }
            LayerKind::Objects(objects) => {
                for object in objects {
                    self.object(object)?;
                }
            }
        }
        self.xml.close()
    }

    fn tile_data(&mut self, grid: &TileLayer, table: &GidTable) -> Result<()> {
        let gids = grid
            .cells()
            .iter()
            .map(|cell| match cell {
                Some(tile) => gid_of(table, *tile),
                None => Ok(0),
            })
            .collect::<Result<Vec<u32>>>()?;

        if self.options.encode_layer_data {
            let compression = if self.options.layer_compression {
                Compression::Gzip
            } else {
                Compression::None
            };
            let text = encode_layer_data(&gids, compression)?;
            self.xml.text_element(
                Tag::new("data")
                    .attr("encoding", "base64")
                    .attr_opt("compression", compression.as_attr()),
                &text,
            )
        } else {
            self.xml.open(Tag::new("data"))?;
            for gid in gids {
                self.xml.empty(Tag::new("tile").attr("gid", gid))?;
            }
            self.xml.close()
        }
    }

    fn instance_properties(&mut self, grid: &TileLayer) -> Result<()> {
        let mut cells = grid.instance_properties_iter().peekable();
        if cells.peek().is_none() {
            return Ok(());
        }
        self.xml.open(Tag::new("tileproperties"))?;
        for ((x, y), props) in cells {
            self.xml.open(Tag::new("tile").attr("x", x).attr("y", y))?;
            self.properties(props)?;
            self.xml.close()?;
        }
        self.xml.close()
    }

    fn object(&mut self, object: &MapObject) -> Result<()> {
        let tag = Tag::new("object")
            .attr("name", &object.name)
            .attr_if(!object.kind.is_empty(), "type", &object.kind)
            .attr("x", object.position.x)
            .attr("y", object.position.y)
            .attr_if(object.size.x != 0.0, "width", object.size.x)
            .attr_if(object.size.y != 0.0, "height", object.size.y);
        if object.properties.is_empty() && object.image_source.is_none() {
            return self.xml.empty(tag);
        }

        self.xml.open(tag)?;
        self.properties(&object.properties)?;
        if let Some(source) = &object.image_source {
            let source = self.reference(source);
            self.xml.empty(Tag::new("image").attr("source", source))?;
        }
        self.xml.close()
    }
}

fn gid_of(table: &GidTable, tile: TileRef) -> Result<u32> {
    table.gid_of(tile).ok_or(MapError::UnresolvedTile {
        tileset: tile.tileset.raw(),
        tile: tile.id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use macroquad::math::vec2;

    fn write(map: &Map, options: WriterOptions) -> String {
        let out = TmxWriter::new(options)
            .write_map_to(map, Vec::new(), None)
            .expect("write succeeds");
        String::from_utf8(out).expect("utf8")
    }

    fn sample_map() -> Map {
        let mut map = Map::new(2, 1, 16, 16);
        let mut a = TileSet::new("a");
        for id in 0..4 {
            a.add_tile(Tile::new(id));
        }
        let mut b = TileSet::new("b");
        b.add_tile(Tile::new(0));
        map.add_tileset(a);
        let b = map.add_tileset(b);
        let layer = map.add_layer(MapLayer::new_tile_layer("ground", 2, 1));
        map.set_tile_at(layer, 0, 0, Some(TileRef::new(b, 0)))
            .expect("owned tileset");
        map
    }

    #[test]
    fn firstgids_follow_tileset_order() {
        let xml = write(&sample_map(), WriterOptions::default());
        assert!(xml.contains(r#"<tileset firstgid="1" name="a""#), "{xml}");
        assert!(xml.contains(r#"<tileset firstgid="5" name="b""#), "{xml}");
    }

    #[test]
    fn document_header() {
        let xml = write(&sample_map(), WriterOptions::default());
        assert!(xml.starts_with(r#"<?xml version="1.0" encoding="UTF-8"?>"#));
        assert!(xml.contains(r#"<!DOCTYPE map SYSTEM "http://mapeditor.org/dtd/1.0/map.dtd">"#));
        assert!(xml.contains(r#"orientation="orthogonal" width="2" height="1" tilewidth="16" tileheight="16""#));
    }

    #[test]
    fn plain_data_lists_every_cell() {
        let options = WriterOptions {
            encode_layer_data: false,
            ..WriterOptions::default()
        };
        let xml = write(&sample_map(), options);
        let first = xml.find(r#"<tile gid="5"/>"#).expect("first cell");
        let second = xml.find(r#"<tile gid="0"/>"#).expect("second cell");
        assert!(first < second);
    }

    #[test]
    fn useful_comment_is_optional() {
        let quiet = write(&sample_map(), WriterOptions::default());
        assert!(!quiet.contains("<!--"));
        let options = WriterOptions {
            useful_comments: true,
            ..WriterOptions::default()
        };
        let chatty = write(&sample_map(), options);
        assert!(chatty.contains("<!-- Layer data is compressed (GZip) binary data, encoded in Base64 -->"));
    }

    #[test]
    fn layer_attributes_skip_defaults() {
        let mut map = sample_map();
        let id = map.add_layer(MapLayer::new_object_group("things", 2, 1));
        let xml = write(&map, WriterOptions::default());
        assert!(xml.contains(r#"<objectgroup name="things" width="2" height="1" viewPlaneDistance="0" viewPlaneInfinitelyFarAway="false">"#), "{xml}");

        map.set_layer_visible(id, false);
        map.set_layer_locked(id, true);
        map.set_layer_opacity(id, 0.5);
        map.translate_layer(id, 3, 0);
        let xml = write(&map, WriterOptions::default());
        assert!(xml.contains(r#"x="3" visible="0" locked="1" opacity="0.5""#), "{xml}");
        assert!(!xml.contains(r#"y="0""#));
    }

    #[test]
    fn objects_omit_zero_size_and_empty_type() {
        let mut map = Map::new(4, 4, 8, 8);
        let mut group = MapLayer::new_object_group("objs", 4, 4);
        let objects = group.objects_mut().expect("object group");
        objects.push(MapObject::new("spawn", vec2(1.0, 2.5)));
        let mut door = MapObject::new("door", vec2(0.0, 0.0));
        door.kind = "portal".into();
        door.size = vec2(16.0, 32.0);
        objects.push(door);
        map.add_layer(group);

        let xml = write(&map, WriterOptions::default());
        assert!(xml.contains(r#"<object name="spawn" x="1" y="2.5"/>"#), "{xml}");
        assert!(xml.contains(r#"<object name="door" type="portal" x="0" y="0" width="16" height="32"/>"#));
    }

    #[test]
    fn foreign_tile_reference_fails() {
        let mut map = Map::new(1, 1, 8, 8);
        let foreign = TileSet::new("elsewhere");
        let mut layer = MapLayer::new_tile_layer("l", 1, 1);
        layer.set_tile_at(0, 0, Some(foreign.tile_ref(0)));
        map.add_layer(layer);
        let err = TmxWriter::default()
            .write_map_to(&map, Vec::new(), None)
            .expect_err("tileset not in map");
        assert!(matches!(err, MapError::UnresolvedTile { tile: 0, .. }));
    }

    #[test]
    fn external_tileset_is_a_reference() {
        let mut map = Map::new(1, 1, 8, 8);
        let mut ts = TileSet::new("ext");
        ts.add_tile(Tile::new(0));
        ts.source = Some("/project/sets/ext.tsx".into());
        ts.base_dir = Some("gfx".into());
        map.add_tileset(ts);
        let out = TmxWriter::default()
            .write_map_to(&map, Vec::new(), Some(Path::new("/project/maps/level.tmx")))
            .expect("write");
        let xml = String::from_utf8(out).expect("utf8");
        assert!(
            xml.contains(r#"<tileset firstgid="1" source="../sets/ext.tsx" basedir="gfx"/>"#),
            "{xml}"
        );
    }

    #[test]
    fn shared_bitmap_writes_grid_and_trans() {
        let mut map = Map::new(1, 1, 8, 8);
        let mut ts = TileSet::new("grid");
        let bitmap = TileBitmap {
            source: Some("/project/tiles/grid.png".into()),
            image: None,
            transparent: crate::tileset::color_from_hex("ff00ff"),
        };
        ts.set_tile_bitmap(bitmap, 16, 16, 2, 1, 6);
        ts.tile_mut(3)
            .expect("grid cell")
            .properties
            .insert("solid", "true");
        map.add_tileset(ts);
        let out = TmxWriter::default()
            .write_map_to(&map, Vec::new(), Some(Path::new("/project/maps/level.tmx")))
            .expect("write");
        let xml = String::from_utf8(out).expect("utf8");
        assert!(xml.contains(
            r#"<tileset firstgid="1" name="grid" tilewidth="16" tileheight="16" spacing="2" margin="1" tilecount="6">"#
        ), "{xml}");
        assert!(xml.contains(r#"<image source="../tiles/grid.png" trans="ff00ff"/>"#));
        assert_eq!(xml.matches("<tile id=").count(), 1);
    }

    #[test]
    fn grid_must_match_layer_bounds() {
        let mut map = Map::new(2, 2, 8, 8);
        let mut layer = MapLayer::new_tile_layer("l", 2, 2);
        *layer.tiles_mut().expect("tile layer") = TileLayer::new(3, 3);
        map.add_layer(layer);
        let err = TmxWriter::default()
            .write_map_to(&map, Vec::new(), None)
            .expect_err("9 cells cannot describe a 2x2 layer");
        assert!(matches!(err, MapError::InvalidLayerData { ref layer, .. } if layer == "l"));
    }

    #[test]
    fn per_tile_tilesets_carry_their_tile_count() {
        let mut map = Map::new(1, 1, 8, 8);
        let mut empty = TileSet::new("empty");
        empty.add_image(TileImage::from_source("/gfx/a.png"));
        map.add_tileset(empty);
        let xml = write(&map, WriterOptions::default());
        assert!(xml.contains(r#"<tileset firstgid="1" name="empty" tilecount="0">"#), "{xml}");
    }

    #[test]
    fn exhausted_gid_space_is_an_error() {
        let mut map = Map::new(1, 1, 8, 8);
        let mut ts = TileSet::new("last");
        ts.add_tile(Tile::new(u32::MAX));
        map.add_tileset(ts);
        let err = TmxWriter::default()
            .write_map_to(&map, Vec::new(), None)
            .expect_err("no gid left for tile u32::MAX");
        assert!(matches!(err, MapError::GidOverflow { .. }));
    }
}
