//! Image codec: PNG and raw pixel dumps for embedded images.

use crate::error::{MapError, Result};
use image::codecs::png::PngEncoder;
use image::{ImageEncoder, Rgba, RgbaImage};
use std::path::Path;

/// Container used for embedded image data.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ImageFormat {
    /// PNG, the default.
    #[default]
    Png,
    /// Uncompressed pixel dump described by a [`PixelFormat`].
    Raw,
}

impl ImageFormat {
    /// Case-insensitive lookup; unknown names fall back to PNG.
    pub fn from_name_or_default(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "png" => ImageFormat::Png,
            "raw" => ImageFormat::Raw,
            other => {
                log::warn!("unknown image format '{other}', using png");
                ImageFormat::Png
            }
        }
    }

    /// Value of the `format` attribute.
    pub fn as_attr(self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Raw => "raw",
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Channel {
    R,
    G,
    B,
    A,
}

/// Layout of one 32-bit pixel word, channels named from the most to the
/// least significant byte.
///
/// The byte order flag decides how the word is stored: big endian writes the
/// first named channel first, little endian writes it last. `A8R8G8B8` big
/// endian is therefore `A R G B` in the file and little endian `B G R A`.
/// The same rule applies to every layout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PixelFormat {
    /// Alpha, red, green, blue.
    #[default]
    A8R8G8B8,
    /// Red, green, blue, alpha.
    R8G8B8A8,
    /// Alpha, blue, green, red.
    A8B8G8R8,
    /// Blue, green, red, alpha.
    B8G8R8A8,
}

impl PixelFormat {
    /// Name used in options and the `pixelformat` attribute.
    pub fn name(self) -> &'static str {
        match self {
            PixelFormat::A8R8G8B8 => "A8R8G8B8",
            PixelFormat::R8G8B8A8 => "R8G8B8A8",
            PixelFormat::A8B8G8R8 => "A8B8G8R8",
            PixelFormat::B8G8R8A8 => "B8G8R8A8",
        }
    }

    /// Exact, case-sensitive lookup.
    pub fn from_name(name: &str) -> Option<Self> {
        [
            PixelFormat::A8R8G8B8,
            PixelFormat::R8G8B8A8,
            PixelFormat::A8B8G8R8,
            PixelFormat::B8G8R8A8,
        ]
        .into_iter()
        .find(|f| f.name() == name)
    }

    /// Like [`PixelFormat::from_name`], falling back to `A8R8G8B8`.
    pub fn from_name_or_default(name: &str) -> Self {
        Self::from_name(name).unwrap_or_else(|| {
            log::warn!("unknown pixel format '{name}', using A8R8G8B8");
            PixelFormat::A8R8G8B8
        })
    }

    fn channels(self) -> [Channel; 4] {
        use Channel::*;
        match self {
            PixelFormat::A8R8G8B8 => [A, R, G, B],
            PixelFormat::R8G8B8A8 => [R, G, B, A],
            PixelFormat::A8B8G8R8 => [A, B, G, R],
            PixelFormat::B8G8R8A8 => [B, G, R, A],
        }
    }
}

fn channel_value(px: &Rgba<u8>, c: Channel) -> u8 {
    match c {
        Channel::R => px[0],
        Channel::G => px[1],
        Channel::B => px[2],
        Channel::A => px[3],
    }
}

/// PNG-encodes an RGBA image.
pub fn encode_png(img: &RgbaImage) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    PngEncoder::new(&mut buf).write_image(
        img.as_raw(),
        img.width(),
        img.height(),
        image::ColorType::Rgba8,
    )?;
    Ok(buf)
}

/// Decodes any supported container (PNG) into RGBA pixels.
pub fn decode_image(bytes: &[u8]) -> Result<RgbaImage> {
    Ok(image::load_from_memory(bytes)?.to_rgba8())
}

/// Loads an image file of any format the `image` crate decodes.
pub fn load_image_file(path: &Path) -> Result<RgbaImage> {
    Ok(image::open(path)?.to_rgba8())
}

/// Writes `img` as a PNG file.
pub fn save_png_file(img: &RgbaImage, path: &Path) -> Result<()> {
    let bytes = encode_png(img)?;
    std::fs::write(path, bytes).map_err(|source| MapError::io(path, source))
}

/// Dumps pixels row-major, four bytes each, laid out per `format`.
pub fn encode_raw(img: &RgbaImage, format: PixelFormat, big_endian: bool) -> Vec<u8> {
    let mut order = format.channels();
    if !big_endian {
        order.reverse();
    }
    let mut out = Vec::with_capacity(img.as_raw().len());
    for px in img.pixels() {
        for c in order {
            out.push(channel_value(px, c));
        }
    }
    out
}

/// Inverse of [`encode_raw`].
pub fn decode_raw(
    bytes: &[u8],
    width: u32,
    height: u32,
    format: PixelFormat,
    big_endian: bool,
) -> Result<RgbaImage> {
    let expected = width as usize * height as usize * 4;
    if bytes.len() != expected {
        return Err(MapError::Image(format!(
            "raw image of {width}x{height} needs {expected} bytes, got {}",
            bytes.len()
        )));
    }
    let mut order = format.channels();
    if !big_endian {
        order.reverse();
    }
    let mut img = RgbaImage::new(width, height);
    for (px, chunk) in img.pixels_mut().zip(bytes.chunks_exact(4)) {
        for (c, byte) in order.iter().zip(chunk) {
            let slot = match c {
                Channel::R => 0,
                Channel::G => 1,
                Channel::B => 2,
                Channel::A => 3,
            };
            px[slot] = *byte;
        }
    }
    Ok(img)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> RgbaImage {
        let mut img = RgbaImage::new(2, 1);
        img.put_pixel(0, 0, Rgba([0x11, 0x22, 0x33, 0x44]));
        img.put_pixel(1, 0, Rgba([0xaa, 0xbb, 0xcc, 0xdd]));
        img
    }

    #[test]
    fn argb_byte_order() {
        let img = sample();
        assert_eq!(
            &encode_raw(&img, PixelFormat::A8R8G8B8, true)[..4],
            &[0x44, 0x11, 0x22, 0x33]
        );
        assert_eq!(
            &encode_raw(&img, PixelFormat::A8R8G8B8, false)[..4],
            &[0x33, 0x22, 0x11, 0x44]
        );
    }

    #[test]
    fn raw_round_trips_for_every_layout() {
        let img = sample();
        for format in [
            PixelFormat::A8R8G8B8,
            PixelFormat::R8G8B8A8,
            PixelFormat::A8B8G8R8,
            PixelFormat::B8G8R8A8,
        ] {
            for big_endian in [true, false] {
                let bytes = encode_raw(&img, format, big_endian);
                let back = decode_raw(&bytes, 2, 1, format, big_endian).expect("decode");
                assert_eq!(back, img, "{format:?} big_endian={big_endian}");
            }
        }
    }

    #[test]
    fn raw_size_mismatch_is_an_error() {
        assert!(decode_raw(&[0; 7], 2, 1, PixelFormat::A8R8G8B8, true).is_err());
    }

    #[test]
    fn png_round_trip() {
        let img = sample();
        let png = encode_png(&img).expect("encode");
        assert_eq!(&png[1..4], b"PNG");
        assert_eq!(decode_image(&png).expect("decode"), img);
    }

    #[test]
    fn unknown_names_fall_back() {
        assert_eq!(ImageFormat::from_name_or_default("PNG"), ImageFormat::Png);
        assert_eq!(ImageFormat::from_name_or_default("raw"), ImageFormat::Raw);
        assert_eq!(ImageFormat::from_name_or_default("tga"), ImageFormat::Png);
        assert_eq!(PixelFormat::from_name("x"), None);
        assert_eq!(PixelFormat::from_name_or_default("x"), PixelFormat::A8R8G8B8);
    }
}
