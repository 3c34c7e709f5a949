use std::io::{self, Read};

use serde::Serialize;
use tracing::{debug, trace};

use crate::error::{FormatError, Result, TlgError};
use crate::raster::BYTES_PER_PIXEL;

/// Container signature: `TLG0.0\0`.
pub const CONTAINER_MAGIC: &[u8; 7] = b"TLG0.0\x00";

/// Marker opening the metadata section that follows the container magic.
pub const METADATA_MARKER: &[u8; 4] = b"sds\x1a";

/// Signature of the embedded TLG5 stream. Its offset is not fixed.
pub const SUB_FORMAT_MAGIC: &[u8; 7] = b"TLG5.0\x00";

/// Marker opening the raw TLG5 stream.
pub const RAW_MARKER: &[u8; 4] = b"raw\x1a";

/// TLG5 always stores three channels; alpha is synthesized on assembly.
pub const CHANNEL_COUNT: usize = 3;

/// Size of one entry in the block-size table.
pub const BLOCK_SIZE_ENTRY: u64 = 4;

/// Largest RGBA raster, and largest single decoded plane, a header may ask
/// for. 16384 x 16384 pixels.
pub const MAX_IMAGE_BYTES: u64 = 1 << 30;

// ── Header ─────────────────────────────────────────────────────────────────

/// Geometry of a TLG5 image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Header {
    pub channel_count: usize,
    pub image_width: u32,
    pub image_height: u32,
    /// Rows per block; the last block row may be shorter.
    pub block_height: u32,
}

impl Header {
    /// Number of block rows, `ceil(height / block_height)`.
    pub fn block_count(&self) -> u32 {
        self.image_height.div_ceil(self.block_height)
    }

    /// Decompressed size of one channel plane: `width * block_height`.
    pub fn plane_size(&self) -> usize {
        self.image_width as usize * self.block_height as usize
    }

    /// Bytes of the block-size table that precedes the block records.
    pub fn block_table_len(&self) -> u64 {
        BLOCK_SIZE_ENTRY * self.block_count() as u64
    }
}

// ── Low-level reads ────────────────────────────────────────────────────────

/// Fill `buf`, mapping a short read to `FormatError::Truncated`.
fn read_field<R: Read>(stream: &mut R, buf: &mut [u8], field: &'static str) -> Result<()> {
    stream.read_exact(buf).map_err(|e| -> TlgError {
        match e.kind() {
            io::ErrorKind::UnexpectedEof => FormatError::Truncated { field }.into(),
            _ => e.into(),
        }
    })
}

fn read_u32_field<R: Read>(stream: &mut R, field: &'static str) -> Result<u32> {
    let mut buf = [0u8; 4];
    read_field(stream, &mut buf, field)?;
    Ok(u32::from_le_bytes(buf))
}

/// Discard exactly `len` bytes, or fewer if the stream ends first.
///
/// Returns the number of bytes actually skipped.
pub(crate) fn skip<R: Read>(stream: &mut R, len: u64) -> io::Result<u64> {
    io::copy(&mut stream.by_ref().take(len), &mut io::sink())
}

/// Read one byte, `None` at end of stream.
fn next_byte<R: Read>(stream: &mut R) -> io::Result<Option<u8>> {
    let mut b = [0u8; 1];
    loop {
        match stream.read(&mut b) {
            Ok(0) => return Ok(None),
            Ok(_) => return Ok(Some(b[0])),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
}

/// Advance `stream` until just past the next occurrence of `needle`.
///
/// Returns the number of bytes consumed before the needle started.
fn scan_for<R: Read>(stream: &mut R, needle: &[u8; 7]) -> Result<u64> {
    let mut window = [0u8; 7];
    let mut filled = 0usize;
    let mut consumed = 0u64;
    while let Some(b) = next_byte(stream)? {
        consumed += 1;
        if filled < window.len() {
            window[filled] = b;
            filled += 1;
        } else {
            window.rotate_left(1);
            window[6] = b;
        }
        if filled == window.len() && &window == needle {
            return Ok(consumed - needle.len() as u64);
        }
    }
    Err(FormatError::SubFormatNotFound { scanned: consumed }.into())
}

// ── Header reader ──────────────────────────────────────────────────────────

/// Parse the container preamble and leave `stream` at the block-size table.
///
/// # Layout
/// ```text
/// "TLG0.0\0"  "sds\x1a"  L:u32  [L bytes metadata]
/// [preamble of any length]  "TLG5.0\0"  "raw\x1a"
/// channels:u8  width:u32  height:u32  block_height:u32
/// ```
pub fn read_header<R: Read>(stream: &mut R) -> Result<Header> {
    let mut magic = [0u8; 7];
    read_field(stream, &mut magic, "container magic")?;
    if &magic != CONTAINER_MAGIC {
        return Err(FormatError::ContainerMagic {
            expected: CONTAINER_MAGIC.to_vec(),
            found: magic.to_vec(),
        }
        .into());
    }

    let mut marker = [0u8; 4];
    read_field(stream, &mut marker, "metadata marker")?;
    if &marker != METADATA_MARKER {
        return Err(FormatError::MetadataMarker {
            expected: METADATA_MARKER.to_vec(),
            found: marker.to_vec(),
        }
        .into());
    }
    let metadata_len = read_u32_field(stream, "metadata length")?;
    let skipped = skip(stream, metadata_len as u64)?;
    trace!(metadata_len, skipped, "skipped metadata section");

    let preamble = scan_for(stream, SUB_FORMAT_MAGIC)?;
    if preamble > 0 {
        trace!(preamble, "skipped bytes before TLG5.0 signature");
    }

    let mut raw = [0u8; 4];
    read_field(stream, &mut raw, "raw data marker")?;
    if &raw != RAW_MARKER {
        return Err(FormatError::RawMarker {
            expected: RAW_MARKER.to_vec(),
            found: raw.to_vec(),
        }
        .into());
    }

    // Channel descriptor: always RGB for this format.
    let mut channels = [0u8; 1];
    read_field(stream, &mut channels, "channel descriptor")?;

    let image_width = read_u32_field(stream, "image width")?;
    let image_height = read_u32_field(stream, "image height")?;
    let block_height = read_u32_field(stream, "block height")?;

    for (field, value) in [
        ("image width", image_width),
        ("image height", image_height),
        ("block height", block_height),
    ] {
        if value == 0 {
            return Err(FormatError::InvalidGeometry { field, value }.into());
        }
    }

    let raster_bytes = (image_width as u64)
        .checked_mul(image_height as u64)
        .and_then(|n| n.checked_mul(BYTES_PER_PIXEL as u64));
    let plane_bytes = (image_width as u64).checked_mul(block_height as u64);
    for bytes in [raster_bytes, plane_bytes] {
        if !bytes.is_some_and(|n| n <= MAX_IMAGE_BYTES) {
            return Err(FormatError::ImageTooLarge {
                width: image_width,
                height: image_height,
                block_height,
                limit: MAX_IMAGE_BYTES,
            }
            .into());
        }
    }

    let header = Header {
        channel_count: CHANNEL_COUNT,
        image_width,
        image_height,
        block_height,
    };
    debug!(
        width = image_width,
        height = image_height,
        block_height,
        descriptor = channels[0],
        "parsed TLG5 header"
    );
    Ok(header)
}

// ── Block records ──────────────────────────────────────────────────────────

/// One `[stored:u8][len:u32][payload]` record from the block stream.
#[derive(Debug, Clone, Default)]
pub struct BlockRecord {
    /// Payload is the channel plane verbatim, no decompression.
    pub stored: bool,
    /// Length declared in the record header.
    pub declared_len: u32,
    /// Payload bytes; shorter than `declared_len` if the stream ended early.
    pub payload: Vec<u8>,
}

impl BlockRecord {
    /// Read the next record. `Ok(None)` if the stream ends inside the
    /// 5-byte record header.
    pub fn read_from<R: Read>(stream: &mut R) -> io::Result<Option<Self>> {
        let mut head = [0u8; 5];
        let mut filled = 0;
        while filled < head.len() {
            match stream.read(&mut head[filled..]) {
                Ok(0) => return Ok(None),
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        let stored = head[0] != 0;
        let declared_len = u32::from_le_bytes([head[1], head[2], head[3], head[4]]);

        let mut payload = Vec::with_capacity(declared_len.min(1 << 24) as usize);
        stream
            .by_ref()
            .take(declared_len as u64)
            .read_to_end(&mut payload)?;

        Ok(Some(Self {
            stored,
            declared_len,
            payload,
        }))
    }

    /// Whether the stream ended before the declared payload length.
    pub fn is_truncated(&self) -> bool {
        self.payload.len() < self.declared_len as usize
    }
}
