use crate::codec::bitmap::{ImageFormat, PixelFormat};
use crate::error::{MapError, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

fn default_true() -> bool {
    true
}
fn default_image_format() -> String {
    "PNG".to_owned()
}
fn default_pixel_format() -> String {
    "A8R8G8B8".to_owned()
}
fn default_tile_image_prefix() -> String {
    "tile".to_owned()
}

/// Options controlling how the writer lays out a document.
///
/// Field names follow the historical preference keys, so a JSON object such
/// as `{"encodeLayerData": false, "maplocation": "out/"}` deserializes
/// directly; missing keys take their defaults.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WriterOptions {
    /// Base64 cell dump instead of one `<tile gid>` element per cell.
    #[serde(default = "default_true")]
    pub encode_layer_data: bool,
    /// gzip the cell dump before Base64 framing. Ignored for plain data.
    #[serde(default = "default_true")]
    pub layer_compression: bool,
    /// Embed images in the document instead of referencing files.
    #[serde(default = "default_true")]
    pub embed_images: bool,
    /// Collect per-tile images into one tileset-level list.
    #[serde(default)]
    pub tile_set_images: bool,
    /// `PNG` or `RAW`, case-insensitive.
    #[serde(default = "default_image_format")]
    pub image_format: String,
    /// Pixel layout for raw images, e.g. `A8R8G8B8`.
    #[serde(default = "default_pixel_format")]
    pub pixel_format: String,
    /// Byte order of raw pixels.
    #[serde(default = "default_true")]
    pub image_is_big_endian: bool,
    /// Write a comment describing how layer data is encoded.
    #[serde(default)]
    pub useful_comments: bool,
    /// File name prefix of spilled tile images.
    #[serde(default = "default_tile_image_prefix")]
    pub tile_image_prefix: String,
    /// Directory receiving spilled tile images. Empty means next to the document.
    #[serde(default, rename = "maplocation")]
    pub map_location: String,
}

impl Default for WriterOptions {
    fn default() -> Self {
        WriterOptions {
            encode_layer_data: true,
            layer_compression: true,
            embed_images: true,
            tile_set_images: false,
            image_format: default_image_format(),
            pixel_format: default_pixel_format(),
            image_is_big_endian: true,
            useful_comments: false,
            tile_image_prefix: default_tile_image_prefix(),
            map_location: String::new(),
        }
    }
}

impl WriterOptions {
    /// Parses options from a JSON object.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads options from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let txt = std::fs::read_to_string(path).map_err(|source| MapError::io(path, source))?;
        Self::from_json_str(&txt)
    }

    /// Resolves the string options into the concrete strategy used for one save.
    pub fn image_strategy(&self) -> ImageStrategy {
        ImageStrategy {
            embed: self.embed_images,
            tileset_list: self.tile_set_images,
            format: ImageFormat::from_name_or_default(&self.image_format),
            pixel_format: PixelFormat::from_name_or_default(&self.pixel_format),
            big_endian: self.image_is_big_endian,
        }
    }

    /// Directory spilled tile images are written to.
    pub(crate) fn spill_dir(&self, document: Option<&Path>) -> PathBuf {
        if !self.map_location.is_empty() {
            return PathBuf::from(&self.map_location);
        }
        document
            .and_then(Path::parent)
            .map(Path::to_path_buf)
            .unwrap_or_default()
    }
}

/// How images are written, decided once per save.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageStrategy {
    /// Embed pixels in the document.
    pub embed: bool,
    /// Tileset-level image list instead of per-tile images.
    pub tileset_list: bool,
    /// Container of embedded images.
    pub format: ImageFormat,
    /// Layout of raw pixels.
    pub pixel_format: PixelFormat,
    /// Byte order of raw pixels.
    pub big_endian: bool,
}

/// Options controlling the reader.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct ReaderOptions {
    /// Fail on unknown elements instead of skipping them with a warning.
    #[serde(default)]
    pub strict: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_json_gives_defaults() {
        let opts = WriterOptions::from_json_str("{}").expect("valid json");
        assert_eq!(opts, WriterOptions::default());
        assert!(opts.encode_layer_data);
        assert!(opts.layer_compression);
        assert!(!opts.tile_set_images);
    }

    #[test]
    fn historical_key_names() {
        let opts = WriterOptions::from_json_str(
            r#"{
              "encodeLayerData": false,
              "tileSetImages": true,
              "imageFormat": "RAW",
              "pixelFormat": "bogus",
              "imageIsBigEndian": false,
              "maplocation": "out/",
              "tileImagePrefix": "img"
            }"#,
        )
        .expect("valid json");
        assert!(!opts.encode_layer_data);
        assert!(opts.tile_set_images);
        assert_eq!(opts.map_location, "out/");
        assert_eq!(opts.tile_image_prefix, "img");

        let strategy = opts.image_strategy();
        assert_eq!(strategy.format, ImageFormat::Raw);
        assert_eq!(strategy.pixel_format, PixelFormat::A8R8G8B8);
        assert!(!strategy.big_endian);
    }

    #[test]
    fn malformed_json_is_a_config_error() {
        let err = WriterOptions::from_json_str("{ nope").expect_err("invalid json");
        assert!(matches!(err, MapError::Config(_)));
    }
}
