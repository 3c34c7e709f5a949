/// Pixel assembly and PNG export tests.
use tlg_core::format::{CONTAINER_MAGIC, METADATA_MARKER, RAW_MARKER, SUB_FORMAT_MAGIC};
use tlg_core::{FormatError, PixelAssembler, Raster, TlgError, DICTIONARY_SIZE};
use tlg_image::{convert_file, decode_file, save_png, BgrAssembler, DecodeOptions, ExportError};

// ── helpers ───────────────────────────────────────────────────────────────

fn temp_path(name: &str) -> std::path::PathBuf {
    std::env::temp_dir().join(format!("tlg_test_{}", name))
}

/// Single-block-row container with every plane stored verbatim.
fn stored_container(width: u32, height: u32, planes: [&[u8]; 3]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(CONTAINER_MAGIC);
    out.extend_from_slice(METADATA_MARKER);
    out.extend_from_slice(&0u32.to_le_bytes());
    out.extend_from_slice(SUB_FORMAT_MAGIC);
    out.extend_from_slice(RAW_MARKER);
    out.push(3);
    out.extend_from_slice(&width.to_le_bytes());
    out.extend_from_slice(&height.to_le_bytes());
    out.extend_from_slice(&height.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());
    for plane in planes {
        out.push(1);
        out.extend_from_slice(&(plane.len() as u32).to_le_bytes());
        out.extend_from_slice(plane);
    }
    out
}

// ── assembler ─────────────────────────────────────────────────────────────

#[test]
fn test_assembler_reorders_bgr() {
    let mut raster = Raster::new(2, 1);
    BgrAssembler::default().assemble(&mut raster, [&[1, 2], &[3, 4], &[5, 6]], 2, 0..1, 3);
    assert_eq!(raster.as_bytes(), &[5, 3, 1, 0xff, 6, 4, 2, 0xff]);
}

#[test]
fn test_assembler_writes_only_its_rows() {
    let mut raster = Raster::new(1, 4);
    let planes: [&[u8]; 3] = [&[10, 11], &[20, 21], &[30, 31]];
    BgrAssembler::new(7).assemble(&mut raster, planes, 1, 2..4, 3);

    assert_eq!(raster.pixel(0, 0), [0, 0, 0, 0]);
    assert_eq!(raster.pixel(0, 1), [0, 0, 0, 0]);
    assert_eq!(raster.pixel(0, 2), [30, 20, 10, 7]);
    assert_eq!(raster.pixel(0, 3), [31, 21, 11, 7]);
}

#[test]
fn test_assembler_stops_at_short_plane() {
    let mut raster = Raster::new(3, 1);
    let planes: [&[u8]; 3] = [&[1, 2, 3], &[4], &[7, 8, 9]];
    BgrAssembler::default().assemble(&mut raster, planes, 3, 0..1, 3);
    assert_eq!(raster.pixel(0, 0), [7, 4, 1, 0xff]);
    assert_eq!(raster.pixel(1, 0), [0, 0, 0, 0]);
    assert_eq!(raster.pixel(2, 0), [0, 0, 0, 0]);
}

// ── export ────────────────────────────────────────────────────────────────

#[test]
fn test_convert_file_writes_png() {
    let input = temp_path("convert.tlg");
    let output = temp_path("convert_out/nested/convert.png");
    std::fs::write(
        &input,
        stored_container(2, 1, [&[0x10, 0x20], &[0x30, 0x40], &[0x50, 0x60]]),
    )
    .unwrap();

    let raster = convert_file(&input, &output, &DecodeOptions::default()).unwrap();
    assert_eq!(raster.pixel(0, 0), [0x50, 0x30, 0x10, 0xff]);

    let png = image::open(&output).unwrap().to_rgba8();
    assert_eq!(png.dimensions(), (2, 1));
    assert_eq!(png.get_pixel(1, 0).0, [0x60, 0x40, 0x20, 0xff]);
}

#[test]
fn test_decode_file_with_options() {
    let input = temp_path("options.tlg");
    std::fs::write(&input, stored_container(1, 1, [&[1], &[2], &[3]])).unwrap();

    let options = DecodeOptions {
        alpha: 0x40,
        dictionary: Some(Box::new([0u8; DICTIONARY_SIZE])),
    };
    let raster = decode_file(&input, &options).unwrap();
    assert_eq!(raster.as_bytes(), &[3, 2, 1, 0x40]);
}

#[test]
fn test_decode_file_rejects_non_tlg() {
    let input = temp_path("not_tlg.tlg");
    std::fs::write(&input, b"\x89PNG\r\n\x1a\n not a tlg").unwrap();
    let err = decode_file(&input, &DecodeOptions::default()).unwrap_err();
    assert!(matches!(err, ExportError::Decode(_)), "got {err:?}");
    assert!(err.to_string().contains("container magic"), "got {err}");
}

#[test]
fn test_convert_file_rejects_oversized_header() {
    let input = temp_path("oversized.tlg");
    let output = temp_path("oversized.png");
    let mut bytes = stored_container(4096, 1, [&[1], &[2], &[3]]);
    // Block height follows the channel byte, width and height.
    let at = CONTAINER_MAGIC.len() + METADATA_MARKER.len() + 4 + SUB_FORMAT_MAGIC.len()
        + RAW_MARKER.len() + 1 + 8;
    bytes[at..at + 4].copy_from_slice(&u32::MAX.to_le_bytes());
    std::fs::write(&input, bytes).unwrap();

    let err = convert_file(&input, &output, &DecodeOptions::default()).unwrap_err();
    assert!(
        matches!(err, ExportError::Decode(TlgError::Format(FormatError::ImageTooLarge { .. }))),
        "got {err:?}"
    );
    assert!(!output.exists());
}

#[test]
fn test_save_png_roundtrip_pixels() {
    let mut raster = Raster::new(3, 2);
    BgrAssembler::default().assemble(
        &mut raster,
        [&[1, 2, 3, 4, 5, 6], &[7, 8, 9, 10, 11, 12], &[13, 14, 15, 16, 17, 18]],
        3,
        0..2,
        3,
    );
    let path = temp_path("save.png");
    save_png(&raster, &path).unwrap();

    let png = image::open(&path).unwrap().to_rgba8();
    assert_eq!(png.into_raw(), raster.into_bytes());
}
