// tests/common/mod.rs

#![allow(dead_code)]

use image::{Rgba, RgbaImage};
use macroquad::math::vec2;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tmx_map::{
    color_from_hex, Bounds, KeyFrame, LayerKind, Map, MapLayer, MapObject, Orientation,
    Properties, Sprite, Tile, TileBitmap, TileImage, TileRef, TileSet,
};

pub fn temp_dir(tag: &str) -> PathBuf {
    let mut dir = std::env::temp_dir();
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock went backwards")
        .as_nanos();
    dir.push(format!("tmx_map_{}_{}", tag, nanos));
    fs::create_dir_all(&dir).expect("create temp dir");
    dir
}

pub fn checker(width: u32, height: u32, seed: u8) -> RgbaImage {
    RgbaImage::from_fn(width, height, |x, y| {
        let alpha = if (x + y) % 2 == 0 { 255 } else { 128 };
        Rgba([seed, (x * 16) as u8, (y * 16) as u8, alpha])
    })
}

/// A map touching every feature the writer knows about: two tilesets (one
/// with per-tile images, one cut from a shared bitmap), a cross-tileset
/// animation, tile/object/selection layers, instance properties and a
/// multiline property.
pub fn sample_map(assets: &Path) -> Map {
    let mut map = Map::new(3, 2, 8, 8);
    map.orientation = Orientation::Hexagonal;
    map.set_eye_distance(12.5);
    map.set_viewport(320, 200);
    map.properties.insert("zeta", "last");
    map.properties.insert("alpha", "first");
    map.properties.insert("Mu", "upper");
    map.properties.insert("story", "line one\nline two");

    let mut sprites = TileSet::new("sprites");
    sprites.tile_width = 8;
    sprites.tile_height = 8;
    for id in 0..4u32 {
        let image = sprites.add_image(TileImage::from_pixels(checker(8, 8, id as u8 * 40)));
        sprites.add_tile(Tile::with_image(id, image));
    }
    sprites
        .tile_mut(1)
        .expect("tile 1")
        .properties
        .insert("solid", "true");
    let sprites = map.add_tileset(sprites);

    let mut grid = TileSet::new("grid");
    let bitmap = TileBitmap {
        source: None,
        image: Some(checker(16, 8, 7)),
        transparent: color_from_hex("ff00ff"),
    };
    assert_eq!(grid.import_tile_bitmap(bitmap, 8, 8, 0, 0), 2);
    let grid = map.add_tileset(grid);

    map.tileset_mut(sprites)
        .and_then(|ts| ts.tile_mut(2))
        .expect("tile 2")
        .animation = Some(Sprite {
        keyframes: vec![
            KeyFrame::new("spin", vec![TileRef::new(sprites, 2), TileRef::new(grid, 1)]),
            KeyFrame::new("idle", vec![TileRef::new(sprites, 0)]),
        ],
    });

    let ground = map.add_layer(MapLayer::new_tile_layer("ground", 3, 2));
    for (x, y, tile) in [
        (0, 0, TileRef::new(sprites, 1)),
        (2, 0, TileRef::new(grid, 1)),
        (1, 1, TileRef::new(sprites, 3)),
    ] {
        map.set_tile_at(ground, x, y, Some(tile))
            .expect("tileset is owned");
    }
    let layer = map.layer_mut(ground).expect("ground layer");
    layer.properties.insert("notes", "a\nb");
    layer
        .tiles_mut()
        .expect("tile layer")
        .set_instance_properties(2, 0, [("door", "north")].into_iter().collect());

    let mut overlay = MapLayer::new_tile_layer("overlay", 2, 1);
    overlay.set_offset(1, 1);
    overlay.visible = false;
    overlay.locked = true;
    overlay.set_opacity(0.5);
    overlay.view_plane_distance = 4.0;
    overlay.view_plane_infinitely_far_away = true;
    let cells = overlay.tiles_mut().expect("tile layer");
    cells.tile_width = Some(16);
    cells.tile_height = Some(16);
    assert!(overlay.set_tile_at(2, 1, Some(TileRef::new(grid, 0))));
    map.add_layer(overlay);

    let mut things = MapLayer::new_object_group("things", 3, 2);
    let objects = things.objects_mut().expect("object group");
    let mut spawn = MapObject::new("spawn", vec2(1.5, 2.0));
    spawn.properties.insert("team", "red");
    objects.push(spawn);
    let mut door = MapObject::new("door", vec2(16.0, 0.0));
    door.kind = "portal".into();
    door.size = vec2(8.0, 16.0);
    door.image_source = Some(assets.join("door.png"));
    objects.push(door);
    map.add_layer(things);

    let mut selection = MapLayer::new_selection("selection", 3, 2);
    selection.set_tile_at(0, 1, Some(TileRef::new(sprites, 0)));
    map.add_layer(selection);

    map
}

#[derive(Debug, PartialEq)]
pub struct TileShot {
    pub id: u32,
    pub properties: Properties,
    pub keyframes: Vec<(String, Vec<u32>)>,
    pub pixels: Option<RgbaImage>,
}

#[derive(Debug, PartialEq)]
pub struct TilesetShot {
    pub name: String,
    pub first_gid: u32,
    pub span: u32,
    pub external: bool,
    pub tiles: Vec<TileShot>,
}

#[derive(Debug, PartialEq)]
pub struct LayerShot {
    pub element: &'static str,
    pub name: String,
    pub bounds: Bounds,
    pub visible: bool,
    pub locked: bool,
    pub opacity: f32,
    pub view_plane: (f32, bool),
    pub properties: Properties,
    pub tile_size: (Option<u32>, Option<u32>),
    pub gids: Vec<u32>,
    pub instance_properties: Vec<((u32, u32), Properties)>,
    pub objects: Vec<MapObject>,
}

#[derive(Debug, PartialEq)]
pub struct MapShot {
    pub orientation: Orientation,
    pub size: (u32, u32),
    pub tile_size: (u32, u32),
    pub eye_distance: f32,
    pub viewport: (u32, u32),
    pub properties: Properties,
    pub tilesets: Vec<TilesetShot>,
    pub layers: Vec<LayerShot>,
}

/// Everything observable about a map, with tile references replaced by the
/// gids they get in the map's current tileset order.
pub fn snapshot(map: &Map) -> MapShot {
    let table = map.gid_table().expect("gids fit");
    let gid = |t: TileRef| table.gid_of(t).expect("reference resolves");

    let tilesets = map
        .tilesets()
        .iter()
        .map(|ts| TilesetShot {
            name: ts.name.clone(),
            first_gid: table.first_gid(ts.id()).expect("assigned"),
            span: ts.gid_span(),
            external: ts.is_external(),
            tiles: ts
                .tiles()
                .map(|t| TileShot {
                    id: t.id,
                    properties: t.properties.clone(),
                    keyframes: t
                        .animation
                        .iter()
                        .flat_map(|s| &s.keyframes)
                        .map(|k| (k.name.clone(), k.frames.iter().map(|f| gid(*f)).collect()))
                        .collect(),
                    pixels: ts.tile_image(t.id),
                })
                .collect(),
        })
        .collect();

    let layers = map
        .layers()
        .iter()
        .map(|l| {
            let grid = l.tiles();
            LayerShot {
                element: l.kind().element_name(),
                name: l.name.clone(),
                bounds: l.bounds(),
                visible: l.visible,
                locked: l.locked,
                opacity: l.opacity(),
                view_plane: (l.view_plane_distance, l.view_plane_infinitely_far_away),
                properties: l.properties.clone(),
                tile_size: (
                    grid.and_then(|g| g.tile_width),
                    grid.and_then(|g| g.tile_height),
                ),
                gids: grid
                    .map(|g| g.cells().iter().map(|c| c.map_or(0, gid)).collect())
                    .unwrap_or_default(),
                instance_properties: grid
                    .map(|g| {
                        g.instance_properties_iter()
                            .map(|(at, p)| (at, p.clone()))
                            .collect()
                    })
                    .unwrap_or_default(),
                objects: match l.kind() {
                    LayerKind::Objects(objects) => objects.clone(),
                    _ => Vec::new(),
                },
            }
        })
        .collect();

    MapShot {
        orientation: map.orientation,
        size: (map.width(), map.height()),
        tile_size: (map.tile_width(), map.tile_height()),
        eye_distance: map.eye_distance(),
        viewport: map.viewport(),
        properties: map.properties.clone(),
        tilesets,
        layers,
    }
}
