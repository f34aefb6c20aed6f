#![warn(missing_docs)]

//! Tile map document model with a TMX reader and writer.
//!
//! A [`Map`] owns its tilesets and layers; layer cells and animation frames
//! point at tiles through [`TileRef`] handles instead of gids. gids only exist
//! inside a TMX document and are assigned by [`TmxWriter`] on every save and
//! resolved by [`TmxReader`] on load.

pub mod codec;
mod config;
mod error;
mod event;
mod gid;
mod layer;
mod map;
mod path;
mod properties;
mod tile;
mod tileset;
/// TMX documents: file detection, reading and writing.
pub mod tmx {
    mod format;
    pub mod reader;
    pub mod writer;
    mod xml;

    pub use format::{accepts, DocumentKind, DESCRIPTION};
}

pub use codec::bitmap::{ImageFormat, PixelFormat};
pub use codec::layer_data::{decode_layer_data, encode_layer_data, Compression};
pub use config::{ImageStrategy, ReaderOptions, WriterOptions};
pub use error::{MapError, Result};
pub use event::{ListenerId, MapEvent, ParallaxChange};
pub use gid::{GidRange, GidTable, MAX_LUT_GID};
pub use layer::{Bounds, LayerKind, MapLayer, MapObject, TileLayer};
pub use map::{LayerId, Map, Orientation};
pub use path::{normalize, relative_path, resolve_path};
pub use properties::Properties;
pub use tile::{KeyFrame, Sprite, Tile, TileRef};
pub use tileset::{color_from_hex, color_to_hex, grid_size, TileBitmap, TileImage, TileSet, TileSetId};
pub use tmx::accepts;
pub use tmx::reader::TmxReader;
pub use tmx::writer::TmxWriter;
