mod bgr;
mod export;

pub use bgr::{BgrAssembler, OPAQUE};
pub use export::{convert_file, decode_file, save_png, DecodeOptions, ExportError};
