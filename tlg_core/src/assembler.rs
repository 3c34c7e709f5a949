use std::ops::Range;

use crate::raster::Raster;

/// Turns the three decoded channel planes of one block row into pixels.
///
/// The orchestrator calls `assemble` once per block row, after all three
/// planes for that row are available. Implementations:
/// - Receive planes in storage order: blue, green, red.
/// - Must write only the rows in `rows`; `rows.end` never exceeds the image
///   height even when the last block row is short.
/// - Read sample `(y - rows.start) * width + x` of each plane for pixel
///   `(x, y)`. Planes may be shorter than `width * block_height` when the
///   block data was truncated.
pub trait PixelAssembler {
    fn assemble(
        &self,
        raster: &mut Raster,
        planes: [&[u8]; 3],
        width: u32,
        rows: Range<u32>,
        channel_count: usize,
    );
}
