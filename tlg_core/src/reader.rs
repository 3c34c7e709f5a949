use std::fs::File;
use std::io::{self, BufReader, Read};
use std::ops::Range;
use std::path::Path;

use serde::Serialize;
use tracing::{debug, trace, warn};
use xxhash_rust::xxh3::xxh3_64;

use crate::assembler::PixelAssembler;
use crate::error::Result;
use crate::format::{read_header, skip, BlockRecord, Header, BLOCK_SIZE_ENTRY};
use crate::lzss::LzssDecompressor;
use crate::raster::Raster;

/// Colour channel of a stored plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Blue,
    Green,
    Red,
}

impl Channel {
    pub fn name(self) -> &'static str {
        match self {
            Channel::Blue => "blue",
            Channel::Green => "green",
            Channel::Red => "red",
        }
    }
}

/// What one block record looked like on disk, and what it decoded to.
#[derive(Debug, Clone, Serialize)]
pub struct BlockSummary {
    /// Zero-based block row.
    pub block_row: u32,
    pub channel: Channel,
    pub stored: bool,
    pub declared_len: u32,
    pub payload_len: usize,
    pub decoded_len: usize,
    /// xxhash3-64 of the payload, when requested.
    pub checksum: Option<u64>,
}

/// The decoded planes of one block row.
#[derive(Debug, Clone)]
pub struct BlockRow {
    pub block_row: u32,
    /// Image rows covered, clamped to the image height.
    pub rows: Range<u32>,
    /// Planes in storage order: blue, green, red.
    pub planes: [Vec<u8>; 3],
    pub summaries: [BlockSummary; 3],
}

/// Walks block records row by row through one shared decompressor.
///
/// The stream must be positioned just past the block-size table. Stored
/// planes bypass the decompressor and leave its dictionary untouched.
pub struct BlockRows<'a, R> {
    stream: &'a mut R,
    header: Header,
    lzss: LzssDecompressor,
    next_block_row: u32,
    checksums: bool,
    done: bool,
}

impl<'a, R: Read> BlockRows<'a, R> {
    pub fn new(stream: &'a mut R, header: Header, lzss: LzssDecompressor) -> Self {
        Self {
            stream,
            header,
            lzss,
            next_block_row: 0,
            checksums: false,
            done: false,
        }
    }

    /// Also hash each payload into [`BlockSummary::checksum`].
    pub fn with_checksums(mut self, enabled: bool) -> Self {
        self.checksums = enabled;
        self
    }

    /// Read and decode one record of the current block row.
    fn read_channel(
        &mut self,
        block_row: u32,
        channel: Channel,
    ) -> io::Result<Option<(Vec<u8>, BlockSummary)>> {
        let Some(record) = BlockRecord::read_from(&mut *self.stream)? else {
            warn!(
                block_row,
                channel = channel.name(),
                "block stream ended early; remaining rows left blank"
            );
            self.done = true;
            return Ok(None);
        };
        if record.is_truncated() {
            warn!(
                block_row,
                channel = channel.name(),
                declared = record.declared_len,
                available = record.payload.len(),
                "block payload truncated"
            );
        }

        let checksum = self.checksums.then(|| xxh3_64(&record.payload));
        let payload_len = record.payload.len();
        let plane = if record.stored {
            record.payload
        } else {
            self.lzss.decompress(&record.payload, self.header.plane_size())
        };
        trace!(
            block_row,
            channel = channel.name(),
            stored = record.stored,
            payload_len,
            decoded_len = plane.len(),
            "decoded block record"
        );

        let summary = BlockSummary {
            block_row,
            channel,
            stored: record.stored,
            declared_len: record.declared_len,
            payload_len,
            decoded_len: plane.len(),
            checksum,
        };
        Ok(Some((plane, summary)))
    }

    /// Decode the next block row.
    ///
    /// Returns `Ok(None)` once every block row has been read, or earlier if
    /// the stream ends inside a record header. A short payload is decoded
    /// from whatever bytes are present.
    pub fn next_row(&mut self) -> io::Result<Option<BlockRow>> {
        if self.done || self.next_block_row >= self.header.block_count() {
            return Ok(None);
        }
        let block_row = self.next_block_row;
        let y = block_row * self.header.block_height;
        let rows = y..y.saturating_add(self.header.block_height).min(self.header.image_height);

        let Some((blue, blue_info)) = self.read_channel(block_row, Channel::Blue)? else {
            return Ok(None);
        };
        let Some((green, green_info)) = self.read_channel(block_row, Channel::Green)? else {
            return Ok(None);
        };
        let Some((red, red_info)) = self.read_channel(block_row, Channel::Red)? else {
            return Ok(None);
        };

        self.next_block_row += 1;
        Ok(Some(BlockRow {
            block_row,
            rows,
            planes: [blue, green, red],
            summaries: [blue_info, green_info, red_info],
        }))
    }
}

// ── Orchestration ──────────────────────────────────────────────────────────

/// Decode the block stream that follows `header` into an RGBA raster.
///
/// `stream` must be positioned where [`read_header`] left it. A fresh,
/// zero-seeded decompressor is used for the whole image.
pub fn decode_image<R, A>(stream: &mut R, header: &Header, assembler: &A) -> Result<Raster>
where
    R: Read,
    A: PixelAssembler + ?Sized,
{
    decode_image_with(stream, header, assembler, LzssDecompressor::new())
}

/// As [`decode_image`], with a caller-prepared decompressor (custom
/// dictionary seed or cursor).
pub fn decode_image_with<R, A>(
    stream: &mut R,
    header: &Header,
    assembler: &A,
    lzss: LzssDecompressor,
) -> Result<Raster>
where
    R: Read,
    A: PixelAssembler + ?Sized,
{
    let mut raster = Raster::new(header.image_width, header.image_height);

    // Each record carries its own length, so the size table is not needed.
    let table_len = header.block_table_len();
    let skipped = skip(stream, table_len)?;
    if skipped < table_len {
        warn!(table_len, skipped, "block-size table truncated; image left blank");
        return Ok(raster);
    }

    let mut rows = BlockRows::new(stream, *header, lzss);
    while let Some(row) = rows.next_row()? {
        let [b, g, r] = &row.planes;
        assembler.assemble(
            &mut raster,
            [b.as_slice(), g.as_slice(), r.as_slice()],
            header.image_width,
            row.rows.clone(),
            header.channel_count,
        );
    }
    debug!(
        width = header.image_width,
        height = header.image_height,
        block_rows = header.block_count(),
        "decoded image"
    );
    Ok(raster)
}

// ── Inspection ─────────────────────────────────────────────────────────────

/// Block layout of a file, gathered by [`Reader::scan_blocks`].
#[derive(Debug, Clone, Serialize)]
pub struct BlockScan {
    pub header: Header,
    /// Entries of the block-size table, in block-row order.
    pub block_sizes: Vec<u32>,
    pub records: Vec<BlockSummary>,
    /// False if the file ended before every block row was read.
    pub complete: bool,
}

impl BlockScan {
    pub fn stored_count(&self) -> usize {
        self.records.iter().filter(|r| r.stored).count()
    }

    pub fn compressed_count(&self) -> usize {
        self.records.len() - self.stored_count()
    }

    /// Total payload bytes across all records.
    pub fn payload_size(&self) -> u64 {
        self.records.iter().map(|r| r.payload_len as u64).sum()
    }

    /// Total decoded plane bytes across all records.
    pub fn decoded_size(&self) -> u64 {
        self.records.iter().map(|r| r.decoded_len as u64).sum()
    }

    /// Decoded / payload bytes.
    pub fn ratio(&self) -> f64 {
        let payload = self.payload_size();
        if payload == 0 {
            return 1.0;
        }
        self.decoded_size() as f64 / payload as f64
    }
}

// ── Reader ─────────────────────────────────────────────────────────────────

/// One decode session over a TLG5 file or stream.
///
/// # Open sequence
/// 1. Parse and validate the container preamble ([`read_header`]).
/// 2. Leave the stream at the block-size table.
///
/// Every consuming method walks the block stream once with its own
/// decompressor, so a `Reader` decodes exactly one image.
pub struct Reader<R> {
    stream: R,
    header: Header,
}

impl Reader<BufReader<File>> {
    /// Open a TLG5 file from disk.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        Self::new(BufReader::new(file))
    }
}

impl<R: Read> Reader<R> {
    /// Read the header from `stream`.
    ///
    /// The header scan reads one byte at a time, so unbuffered sources should
    /// be wrapped in a `BufReader`.
    pub fn new(mut stream: R) -> Result<Self> {
        let header = read_header(&mut stream)?;
        Ok(Self { stream, header })
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Decode the whole image.
    pub fn decode<A: PixelAssembler + ?Sized>(self, assembler: &A) -> Result<Raster> {
        self.decode_with(assembler, LzssDecompressor::new())
    }

    /// Decode the whole image through `lzss`.
    pub fn decode_with<A: PixelAssembler + ?Sized>(
        mut self,
        assembler: &A,
        lzss: LzssDecompressor,
    ) -> Result<Raster> {
        decode_image_with(&mut self.stream, &self.header, assembler, lzss)
    }

    /// Read the block-size table and summarize every block record.
    pub fn scan_blocks(mut self) -> Result<BlockScan> {
        let count = self.header.block_count();
        let mut block_sizes = Vec::with_capacity(count.min(1 << 16) as usize);
        let mut entry = [0u8; BLOCK_SIZE_ENTRY as usize];
        for _ in 0..count {
            match self.stream.read_exact(&mut entry) {
                Ok(()) => block_sizes.push(u32::from_le_bytes(entry)),
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                    warn!(read = block_sizes.len(), expected = count, "block-size table truncated");
                    return Ok(BlockScan {
                        header: self.header,
                        block_sizes,
                        records: Vec::new(),
                        complete: false,
                    });
                }
                Err(e) => return Err(e.into()),
            }
        }

        let mut records = Vec::with_capacity(count.min(1 << 16) as usize * 3);
        let mut rows =
            BlockRows::new(&mut self.stream, self.header, LzssDecompressor::new()).with_checksums(true);
        let mut read_rows = 0u32;
        while let Some(row) = rows.next_row()? {
            records.extend(row.summaries);
            read_rows += 1;
        }

        Ok(BlockScan {
            header: self.header,
            block_sizes,
            records,
            complete: read_rows == count,
        })
    }

    /// Decode block rows up to `block_row` and return that row's plane for
    /// `channel`.
    ///
    /// Earlier rows must be decoded as well, since the dictionary carries
    /// over between blocks. `Ok(None)` if the file ends first or `block_row`
    /// is past the last block row.
    pub fn read_plane(mut self, block_row: u32, channel: Channel) -> Result<Option<Vec<u8>>> {
        skip(&mut self.stream, self.header.block_table_len())?;
        let mut rows = BlockRows::new(&mut self.stream, self.header, LzssDecompressor::new());
        while let Some(row) = rows.next_row()? {
            if row.block_row == block_row {
                let [blue, green, red] = row.planes;
                let plane = match channel {
                    Channel::Blue => blue,
                    Channel::Green => green,
                    Channel::Red => red,
                };
                return Ok(Some(plane));
            }
        }
        Ok(None)
    }
}
