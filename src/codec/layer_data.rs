//! Binary cell dump of tile layers: one little-endian `u32` gid per cell in
//! row-major order, optionally compressed, framed as Base64 text.

use crate::error::{MapError, Result};
use base64::prelude::BASE64_STANDARD;
use base64::Engine;
use flate2::read::{GzDecoder, ZlibDecoder};
use flate2::write::{GzEncoder, ZlibEncoder};
use std::io::{Read, Write};

/// Compression applied to the cell dump before Base64 framing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Compression {
    /// Plain Base64.
    #[default]
    None,
    /// gzip stream.
    Gzip,
    /// zlib stream.
    Zlib,
}

impl Compression {
    /// Value of the `compression` attribute, `None` when uncompressed.
    pub fn as_attr(self) -> Option<&'static str> {
        match self {
            Compression::None => None,
            Compression::Gzip => Some("gzip"),
            Compression::Zlib => Some("zlib"),
        }
    }

    /// Parses the `compression` attribute. Absent or empty means uncompressed.
    pub fn from_attr(attr: Option<&str>) -> Result<Self> {
        match attr {
            None | Some("") => Ok(Compression::None),
            Some("gzip") => Ok(Compression::Gzip),
            Some("zlib") => Ok(Compression::Zlib),
            Some(other) => Err(MapError::UnsupportedCompression(other.to_owned())),
        }
    }
}

/// Serializes gids as consecutive little-endian 4-byte groups.
pub fn gids_to_bytes(gids: &[u32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(gids.len() * 4);
    for gid in gids {
        out.extend_from_slice(&gid.to_le_bytes());
    }
    out
}

/// Encodes a row-major gid grid into the Base64 text stored in `<data>`.
pub fn encode_layer_data(gids: &[u32], compression: Compression) -> Result<String> {
    let raw = gids_to_bytes(gids);
    let bytes = match compression {
        Compression::None => raw,
        Compression::Gzip => {
            let mut enc = GzEncoder::new(Vec::new(), flate2::Compression::default());
            enc.write_all(&raw)?;
            enc.finish()?
        }
        Compression::Zlib => {
            let mut enc = ZlibEncoder::new(Vec::new(), flate2::Compression::default());
            enc.write_all(&raw)?;
            enc.finish()?
        }
    };
    Ok(BASE64_STANDARD.encode(bytes))
}

/// Decodes `<data>` text back into gids. Whitespace inside the text is ignored.
pub fn decode_layer_data(layer: &str, text: &str, compression: Compression) -> Result<Vec<u32>> {
    let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    let framed = BASE64_STANDARD.decode(compact.as_bytes())?;

    let bytes = match compression {
        Compression::None => framed,
        Compression::Gzip => inflate(GzDecoder::new(&framed[..]), layer)?,
        Compression::Zlib => inflate(ZlibDecoder::new(&framed[..]), layer)?,
    };

    if bytes.len() % 4 != 0 {
        return Err(MapError::InvalidLayerData {
            layer: layer.to_owned(),
            reason: format!("{} bytes is not a whole number of gids", bytes.len()),
        });
    }

    Ok(bytes
        .chunks_exact(4)
        .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}

fn inflate(mut decoder: impl Read, layer: &str) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    decoder
        .read_to_end(&mut out)
        .map_err(|e| MapError::InvalidLayerData {
            layer: layer.to_owned(),
            reason: format!("cannot inflate: {e}"),
        })?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uncompressed_bytes_are_little_endian_row_major() {
        let text = encode_layer_data(&[5, 0], Compression::None).expect("encode");
        let bytes = BASE64_STANDARD.decode(text).expect("base64");
        assert_eq!(bytes, vec![0x05, 0, 0, 0, 0, 0, 0, 0]);

        let wide = gids_to_bytes(&[0x0102_0304]);
        assert_eq!(wide, vec![0x04, 0x03, 0x02, 0x01]);
    }

    #[test]
    fn compression_does_not_change_the_grid() {
        let gids: Vec<u32> = (0..64).map(|i| (i * 7) % 13).collect();
        for compression in [Compression::None, Compression::Gzip, Compression::Zlib] {
            let text = encode_layer_data(&gids, compression).expect("encode");
            let back = decode_layer_data("l", &text, compression).expect("decode");
            assert_eq!(back, gids, "{compression:?}");
        }
    }

    #[test]
    fn gzip_output_is_a_gzip_stream() {
        let text = encode_layer_data(&[1; 100], Compression::Gzip).expect("encode");
        let bytes = BASE64_STANDARD.decode(text).expect("base64");
        assert_eq!(&bytes[..2], &[0x1f, 0x8b]);
    }

    #[test]
    fn whitespace_in_text_is_ignored() {
        let text = encode_layer_data(&[1, 2, 3], Compression::None).expect("encode");
        let (a, b) = text.split_at(4);
        let spaced = format!("\n   {a}\n  {b}\n ");
        assert_eq!(
            decode_layer_data("l", &spaced, Compression::None).expect("decode"),
            vec![1, 2, 3]
        );
    }

    #[test]
    fn ragged_stream_is_rejected() {
        let text = BASE64_STANDARD.encode([1u8, 2, 3]);
        let err = decode_layer_data("ground", &text, Compression::None).expect_err("3 bytes");
        assert!(matches!(err, MapError::InvalidLayerData { layer, .. } if layer == "ground"));
    }

    #[test]
    fn garbage_compressed_stream_is_rejected() {
        let text = BASE64_STANDARD.encode([0u8; 8]);
        let err = decode_layer_data("l", &text, Compression::Gzip).expect_err("not gzip");
        assert!(matches!(err, MapError::InvalidLayerData { .. }));
    }

    #[test]
    fn compression_tokens() {
        assert_eq!(Compression::from_attr(None).expect("none"), Compression::None);
        assert_eq!(Compression::from_attr(Some("gzip")).expect("gzip"), Compression::Gzip);
        assert!(matches!(
            Compression::from_attr(Some("lz4")),
            Err(MapError::UnsupportedCompression(c)) if c == "lz4"
        ));
    }
}
