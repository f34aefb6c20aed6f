use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Error type for reading, writing and editing tile maps.
#[derive(Debug, Error)]
pub enum MapError {
    /// A file could not be opened, read or written.
    #[error("I/O error on {path}: {source}")]
    Io {
        /// File the operation was working on.
        path: PathBuf,
        /// Underlying error.
        source: io::Error,
    },

    /// The output or input stream failed mid-document.
    #[error("stream error: {0}")]
    Stream(#[from] io::Error),

    /// The document is not well-formed XML.
    #[error("XML error near byte {position}: {source}")]
    Xml {
        /// Approximate byte offset in the document.
        position: u64,
        /// Underlying parser error.
        source: quick_xml::Error,
    },

    /// The XML writer rejected an event.
    #[error("XML writer error: {0}")]
    XmlWrite(#[from] quick_xml::Error),

    /// A required attribute is absent.
    #[error("<{element}> near byte {position} is missing attribute '{attribute}'")]
    MissingAttribute {
        /// Element name.
        element: String,
        /// Attribute name.
        attribute: &'static str,
        /// Approximate byte offset of the element.
        position: u64,
    },

    /// An attribute holds a value that cannot be parsed.
    #[error("<{element}> near byte {position} has invalid {attribute}=\"{value}\"")]
    InvalidAttribute {
        /// Element name.
        element: String,
        /// Attribute name.
        attribute: String,
        /// Raw attribute text.
        value: String,
        /// Approximate byte offset of the element.
        position: u64,
    },

    /// An element that is not part of the format was found in strict mode.
    #[error("unknown element <{element}> inside <{parent}> near byte {position}")]
    UnknownElement {
        /// Unknown element name.
        element: String,
        /// Enclosing element name.
        parent: String,
        /// Approximate byte offset of the element.
        position: u64,
    },

    /// The document ended inside an element.
    #[error("document ends inside <{element}>")]
    UnclosedElement {
        /// Innermost open element.
        element: String,
    },

    /// The document root is not the expected element.
    #[error("expected <{expected}> as document root, found <{found}>")]
    UnexpectedRoot {
        /// Root the caller asked for.
        expected: &'static str,
        /// Root actually found.
        found: String,
    },

    /// A layer cell references a gid no tileset covers.
    #[error("layer '{layer}' references gid {gid}, but the highest known gid is {max_gid}")]
    InvalidTileGid {
        /// Layer name.
        layer: String,
        /// Offending gid.
        gid: u32,
        /// Highest gid covered by a tileset.
        max_gid: u32,
    },

    /// An animation frame references a gid no tileset covers.
    #[error("animation of tile {tile} in tileset '{tileset}' references unknown gid {gid}")]
    InvalidFrameGid {
        /// Tileset name.
        tileset: String,
        /// Local id of the animated tile.
        tile: u32,
        /// Offending gid.
        gid: u32,
    },

    /// A gid range does not fit below `u32::MAX`.
    #[error("gid range starting at {first_gid} with {span} tiles runs past the last gid")]
    GidOverflow {
        /// First gid of the range.
        first_gid: u32,
        /// Number of gids the range needs.
        span: u32,
    },

    /// A tile reference points at a tileset or tile that does not exist in the map.
    #[error("tile {tile} of tileset {tileset} is not part of this map")]
    UnresolvedTile {
        /// Tileset handle.
        tileset: u32,
        /// Local tile id.
        tile: u32,
    },

    /// Layer data decoded to the wrong number of cells or a ragged byte stream.
    #[error("invalid data for layer '{layer}': {reason}")]
    InvalidLayerData {
        /// Layer name.
        layer: String,
        /// What went wrong.
        reason: String,
    },

    /// Unknown map orientation token.
    #[error("unsupported orientation '{0}'")]
    UnsupportedOrientation(String),

    /// Unknown data encoding token.
    #[error("unsupported data encoding '{0}'")]
    UnsupportedEncoding(String),

    /// Unknown data compression token.
    #[error("unsupported data compression '{0}'")]
    UnsupportedCompression(String),

    /// File extension is not one of `.tmx`, `.tsx` or `.tmx.gz`.
    #[error("unsupported file format: {0}")]
    UnsupportedFormat(String),

    /// Base64 framing could not be decoded.
    #[error("invalid base64 data: {0}")]
    Base64(#[from] base64::DecodeError),

    /// Image encode or decode failure.
    #[error("image error: {0}")]
    Image(String),

    /// Writer options could not be parsed.
    #[error("invalid writer options: {0}")]
    Config(#[from] serde_json::Error),
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, MapError>;

impl MapError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        MapError::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<::image::ImageError> for MapError {
    fn from(err: ::image::ImageError) -> Self {
        MapError::Image(err.to_string())
    }
}
