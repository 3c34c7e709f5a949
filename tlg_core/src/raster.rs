/// Bytes per pixel: R, G, B, A.
pub const BYTES_PER_PIXEL: usize = 4;

/// Row-major RGBA8 image buffer.
///
/// Allocated zeroed at full size and never resized; decoding fills it block
/// row by block row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Raster {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl Raster {
    /// Zeroed raster of `width x height` pixels.
    ///
    /// # Panics
    /// If the buffer size overflows `usize`. Headers from
    /// [`read_header`](crate::read_header) are already bounded.
    pub fn new(width: u32, height: u32) -> Self {
        let len = (width as usize)
            .checked_mul(height as usize)
            .and_then(|n| n.checked_mul(BYTES_PER_PIXEL));
        let Some(len) = len else {
            panic!("raster {width}x{height} overflows usize");
        };
        Self {
            width,
            height,
            pixels: vec![0u8; len],
        }
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Bytes in one row.
    #[inline]
    pub fn stride(&self) -> usize {
        self.width as usize * BYTES_PER_PIXEL
    }

    /// The RGBA value at `(x, y)`.
    ///
    /// # Panics
    /// If `(x, y)` lies outside the raster.
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        assert!(x < self.width && y < self.height, "pixel ({x}, {y}) out of bounds");
        let i = y as usize * self.stride() + x as usize * BYTES_PER_PIXEL;
        [
            self.pixels[i],
            self.pixels[i + 1],
            self.pixels[i + 2],
            self.pixels[i + 3],
        ]
    }

    /// Mutable view of row `y`.
    pub fn row_mut(&mut self, y: u32) -> &mut [u8] {
        let stride = self.stride();
        let start = y as usize * stride;
        &mut self.pixels[start..start + stride]
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.pixels
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.pixels
    }
}
