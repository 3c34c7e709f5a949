use std::ops::Range;

use tlg_core::raster::{Raster, BYTES_PER_PIXEL};
use tlg_core::PixelAssembler;

/// Fully opaque alpha, the default for synthesized pixels.
pub const OPAQUE: u8 = 0xff;

/// Assembles blue, green and red planes into RGBA pixels.
///
/// TLG5 stores no alpha plane, so every written pixel gets the same
/// configured `alpha`. A pixel is written only when all three planes hold a
/// sample for it; pixels past the end of a truncated plane keep their
/// zeroed state.
#[derive(Debug, Clone, Copy)]
pub struct BgrAssembler {
    pub alpha: u8,
}

impl Default for BgrAssembler {
    fn default() -> Self {
        Self { alpha: OPAQUE }
    }
}

impl BgrAssembler {
    pub fn new(alpha: u8) -> Self {
        Self { alpha }
    }
}

impl PixelAssembler for BgrAssembler {
    fn assemble(
        &self,
        raster: &mut Raster,
        planes: [&[u8]; 3],
        width: u32,
        rows: Range<u32>,
        _channel_count: usize,
    ) {
        let [blue, green, red] = planes;
        let columns = width.min(raster.width()) as usize;
        let end = rows.end.min(raster.height());

        for y in rows.start..end {
            let base = (y - rows.start) as usize * width as usize;
            let row = raster.row_mut(y);
            for (x, px) in row.chunks_exact_mut(BYTES_PER_PIXEL).take(columns).enumerate() {
                let i = base + x;
                let (Some(&b), Some(&g), Some(&r)) = (blue.get(i), green.get(i), red.get(i)) else {
                    return;
                };
                px.copy_from_slice(&[r, g, b, self.alpha]);
            }
        }
    }
}
