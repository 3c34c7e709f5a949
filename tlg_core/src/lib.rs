pub mod assembler;
pub mod error;
pub mod format;
pub mod lzss;
pub mod raster;
pub mod reader;

pub use assembler::PixelAssembler;
pub use error::{FormatError, Result, TlgError};
pub use format::{read_header, BlockRecord, Header, CHANNEL_COUNT};
pub use lzss::{LzssDecompressor, DICTIONARY_SIZE};
pub use raster::Raster;
pub use reader::{decode_image, decode_image_with, BlockScan, BlockSummary, Channel, Reader};
