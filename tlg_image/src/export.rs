use std::fs;
use std::path::Path;

use image::{ColorType, ImageFormat};
use thiserror::Error;
use tracing::debug;

use tlg_core::{LzssDecompressor, Raster, Reader, TlgError, DICTIONARY_SIZE};

use crate::bgr::{BgrAssembler, OPAQUE};

#[derive(Debug, Error)]
pub enum ExportError {
    #[error(transparent)]
    Decode(#[from] TlgError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("PNG encoding failed: {0}")]
    Encode(#[from] image::ImageError),
}

/// Knobs for turning a TLG5 file into pixels.
#[derive(Debug, Clone)]
pub struct DecodeOptions {
    /// Alpha written for every decoded pixel.
    pub alpha: u8,
    /// Initial dictionary contents; zeroed when `None`.
    pub dictionary: Option<Box<[u8; DICTIONARY_SIZE]>>,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            alpha: OPAQUE,
            dictionary: None,
        }
    }
}

impl DecodeOptions {
    fn decompressor(&self) -> LzssDecompressor {
        match &self.dictionary {
            Some(seed) => LzssDecompressor::with_dictionary(seed),
            None => LzssDecompressor::new(),
        }
    }
}

/// Decode a TLG5 file into an RGBA raster.
pub fn decode_file(path: impl AsRef<Path>, options: &DecodeOptions) -> Result<Raster, ExportError> {
    let path = path.as_ref();
    let reader = Reader::open(path)?;
    debug!(path = %path.display(), header = ?reader.header(), "decoding");
    let raster = reader.decode_with(&BgrAssembler::new(options.alpha), options.decompressor())?;
    Ok(raster)
}

/// Encode `raster` as an RGBA8 PNG at `path`.
pub fn save_png(raster: &Raster, path: impl AsRef<Path>) -> Result<(), ExportError> {
    image::save_buffer_with_format(
        path,
        raster.as_bytes(),
        raster.width(),
        raster.height(),
        ColorType::Rgba8,
        ImageFormat::Png,
    )?;
    Ok(())
}

/// Decode `input` and write it as PNG to `output`, creating parent
/// directories as needed.
pub fn convert_file(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    options: &DecodeOptions,
) -> Result<Raster, ExportError> {
    let output = output.as_ref();
    let raster = decode_file(input, options)?;
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    save_png(&raster, output)?;
    debug!(output = %output.display(), "wrote PNG");
    Ok(raster)
}
