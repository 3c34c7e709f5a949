use thiserror::Error;

/// A structural check on the container preamble that did not hold.
///
/// Every variant is fatal: a file that fails one of these checks cannot be
/// decoded at all, and no raster is produced.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    /// The first 7 bytes are not the `TLG0.0\0` container signature.
    #[error("container magic mismatch: expected {expected:02x?}, got {found:02x?}")]
    ContainerMagic { expected: Vec<u8>, found: Vec<u8> },

    /// The metadata section does not start with `sds\x1a`.
    #[error("metadata marker mismatch: expected {expected:02x?}, got {found:02x?}")]
    MetadataMarker { expected: Vec<u8>, found: Vec<u8> },

    /// The input ended before a `TLG5.0\0` signature was found.
    #[error("sub-format signature TLG5.0 not found after scanning {scanned} bytes")]
    SubFormatNotFound { scanned: u64 },

    /// The raw stream does not start with `raw\x1a`.
    #[error("raw data marker mismatch: expected {expected:02x?}, got {found:02x?}")]
    RawMarker { expected: Vec<u8>, found: Vec<u8> },

    /// A fixed-size header field could not be read in full.
    #[error("header truncated while reading {field}")]
    Truncated { field: &'static str },

    /// A geometry field holds a value the block layout cannot use.
    #[error("invalid {field}: {value}")]
    InvalidGeometry { field: &'static str, value: u32 },

    /// The raster or one decoded plane would exceed the decode limit.
    #[error("image {width}x{height} with block height {block_height} exceeds the {limit}-byte decode limit")]
    ImageTooLarge {
        width: u32,
        height: u32,
        block_height: u32,
        limit: u64,
    },
}

/// Top-level error for decode sessions.
#[derive(Debug, Error)]
pub enum TlgError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("format error: {0}")]
    Format(#[from] FormatError),
}

pub type Result<T> = std::result::Result<T, TlgError>;
