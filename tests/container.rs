//! Container export and decode integration tests.

use bitframe::container::{self, ContainerFormat, ExportMeta};
use bitframe::ingest::Dimensions;
use bitframe::metadata::RenderMeta;
use bitframe::{BitframeError, FrameSequence, PackedFrame, decode_container};

/// Three 10x2 frames (4 bytes each).
fn sample_frames() -> Vec<PackedFrame> {
    [
        [0x00, 0x00, 0x00, 0x00],
        [0xFF, 0xC0, 0x80, 0x40],
        [0x12, 0x34, 0x56, 0x40],
    ]
    .into_iter()
    .map(|bytes| PackedFrame::from_bytes(bytes.to_vec(), 10, 2).unwrap())
    .collect()
}

fn sample_meta() -> ExportMeta {
    let render = RenderMeta::new(10, 2, 0.25, 3, 12.0);
    ExportMeta::new("clip.mp4", &render, 100, true)
}

// ── Metadata ───────────────────────────────────────────────────────

#[test]
fn export_meta_rounds_fps() {
    let render = RenderMeta::new(8, 8, 3.0, 100, 100.0 / 3.0);
    let meta = ExportMeta::new("clip.mp4", &render, 128, false);
    assert_eq!(meta.fps, 33.333);
    assert_eq!(meta.bytes_per_frame, 8);
    assert_eq!(meta.title, "bitframe");
}

#[test]
fn export_meta_from_sequence_defaults_threshold() {
    let sequence = FrameSequence::from_flat(&[0; 4], 8, 2, None, Some(10.0)).unwrap();
    let meta = ExportMeta::from_sequence("raw", &sequence);
    assert_eq!((meta.threshold, meta.invert), (128, false));
    assert_eq!(meta.frame_count, 2);
}

// ── Binary ─────────────────────────────────────────────────────────

#[test]
fn binary_concatenates_frames() {
    let bytes = container::to_binary(&sample_frames());
    assert_eq!(bytes.len(), 12);
    assert_eq!(&bytes[4..8], &[0xFF, 0xC0, 0x80, 0x40]);
}

#[test]
fn binary_decodes_with_dimensions() {
    let bytes = container::to_binary(&sample_frames());
    let decoded = decode_container(&bytes, Some(Dimensions::new(10, 2).with_fps(12.0))).unwrap();

    assert!(decoded.meta.is_none());
    assert_eq!(decoded.sequence.frames(), sample_frames().as_slice());
    assert_eq!(decoded.sequence.meta().fps, 12.0);
    assert_eq!(decoded.sequence.meta().duration, 0.25);
}

#[test]
fn binary_without_dimensions_is_an_error() {
    let bytes = container::to_binary(&sample_frames());
    let error = decode_container(&bytes, None).unwrap_err();
    assert!(matches!(error, BitframeError::DecodeError { ref field, .. } if field == "width"));
}

#[test]
fn binary_ignores_trailing_partial_frame() {
    let mut bytes = container::to_binary(&sample_frames());
    bytes.extend_from_slice(&[0xAA, 0xBB]);
    let decoded = decode_container(&bytes, Some(Dimensions::new(10, 2))).unwrap();
    assert_eq!(decoded.sequence.len(), 3);
    assert_eq!(decoded.sequence.meta().fps, 30.0);
}

#[test]
fn binary_starting_with_a_brace_decodes_as_binary() {
    // 0x7B packs the row 01111011.
    let decoded = decode_container(&[0x7B], Some(Dimensions::new(8, 1))).unwrap();
    assert!(decoded.meta.is_none());
    assert_eq!(decoded.sequence.len(), 1);
    assert_eq!(decoded.sequence.frames()[0].as_bytes(), &[0x7B]);
}

#[test]
fn binary_with_whitespace_before_a_brace_decodes_as_binary() {
    let bytes = [0x20, 0x0A, 0x7B, 0x22, 0x09, 0x0D, 0x7B, 0x7D];
    let decoded = decode_container(&bytes, Some(Dimensions::new(16, 2))).unwrap();
    assert_eq!(decoded.sequence.len(), 2);
    assert_eq!(decoded.sequence.to_flat(), bytes.to_vec());
}

#[test]
fn json_is_still_preferred_when_dimensions_are_given() {
    let json = container::to_json_hex(&sample_frames(), &sample_meta()).unwrap();
    let decoded = decode_container(json.as_bytes(), Some(Dimensions::new(8, 1))).unwrap();
    assert!(decoded.meta.is_some());
    assert_eq!(decoded.sequence.frames(), sample_frames().as_slice());
}

// ── JSON ───────────────────────────────────────────────────────────

#[test]
fn json_hex_document_shape() {
    let json = container::to_json_hex(&sample_frames(), &sample_meta()).unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();

    assert_eq!(value["width"], 10);
    assert_eq!(value["height"], 2);
    assert_eq!(value["frames"], 3);
    assert_eq!(value["bytesPerFrame"], 4);
    assert_eq!(value["threshold"], 100);
    assert_eq!(value["invert"], true);
    assert_eq!(value["source"], "clip.mp4");
    assert_eq!(value["data"][1], "ffc08040");
    assert!(value.get("encoding").is_none());
}

#[test]
fn json_base64_marks_encoding() {
    let json = container::to_json_base64(&sample_frames(), &sample_meta()).unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["encoding"], "base64");
    assert_eq!(value["data"][0], "AAAAAA==");
}

#[test]
fn json_formats_decode_to_the_same_frames() {
    let frames = sample_frames();
    let meta = sample_meta();
    for json in [
        container::to_json_hex(&frames, &meta).unwrap(),
        container::to_json_base64(&frames, &meta).unwrap(),
    ] {
        let decoded = decode_container(json.as_bytes(), None).unwrap();
        assert_eq!(decoded.sequence.frames(), frames.as_slice());
        assert_eq!(decoded.sequence.width(), 10);
        assert_eq!(decoded.sequence.meta().fps, 12.0);

        let embedded = decoded.meta.unwrap();
        assert_eq!(embedded.source, "clip.mp4");
        assert_eq!((embedded.threshold, embedded.invert), (100, true));

        let packing = decoded.sequence.packing().unwrap();
        assert_eq!((packing.threshold, packing.invert), (100, true));
    }
}

#[test]
fn json_decode_accepts_leading_whitespace_and_defaults() {
    let json = r#"
        {"width": 8, "height": 1, "frames": 2, "bytesPerFrame": 1, "data": ["0f", "f0"]}
    "#;
    let decoded = decode_container(json.as_bytes(), None).unwrap();
    let bytes: Vec<&[u8]> = decoded.sequence.frames().iter().map(PackedFrame::as_bytes).collect();
    assert_eq!(bytes, vec![&[0x0F][..], &[0xF0][..]]);
    assert_eq!(decoded.meta.unwrap().title, "bitframe");
}

#[test]
fn json_bytes_per_frame_mismatch() {
    let json = r#"{"width": 10, "height": 2, "frames": 0, "bytesPerFrame": 3, "data": []}"#;
    let error = decode_container(json.as_bytes(), None).unwrap_err();
    assert!(
        matches!(error, BitframeError::DecodeError { ref field, .. } if field == "bytesPerFrame")
    );
}

#[test]
fn json_short_frame_names_its_index() {
    let json =
        r#"{"width": 8, "height": 2, "frames": 2, "bytesPerFrame": 2, "data": ["ffff", "ff"]}"#;
    let error = decode_container(json.as_bytes(), None).unwrap_err();
    assert!(matches!(error, BitframeError::DecodeError { ref field, .. } if field == "data[1]"));
}

#[test]
fn json_bad_hex_names_its_index() {
    let json = r#"{"width": 8, "height": 1, "frames": 1, "bytesPerFrame": 1, "data": ["zz"]}"#;
    let error = decode_container(json.as_bytes(), None).unwrap_err();
    assert!(matches!(error, BitframeError::DecodeError { ref field, .. } if field == "data[0]"));
}

#[test]
fn json_frame_count_mismatch_keeps_actual_frames() {
    let json = r#"{"width": 8, "height": 1, "frames": 5, "bytesPerFrame": 1, "data": ["01"]}"#;
    let decoded = decode_container(json.as_bytes(), None).unwrap();
    assert_eq!(decoded.sequence.len(), 1);
    assert_eq!(decoded.sequence.meta().frame_count, 1);
}

#[test]
fn malformed_json_is_a_json_error() {
    let error = decode_container(b"{\"width\": ", None).unwrap_err();
    assert!(matches!(error, BitframeError::Json(_)));
}

// ── C header ───────────────────────────────────────────────────────

#[test]
fn c_header_layout() {
    let header = container::to_c_header(&sample_frames(), &sample_meta());

    assert!(header.starts_with("#pragma once\n#include <Arduino.h>\n"));
    assert!(header.contains("#define BITFRAME_WIDTH 10\n"));
    assert!(header.contains("#define BITFRAME_HEIGHT 2\n"));
    assert!(header.contains("#define BITFRAME_FRAMES 3\n"));
    assert!(header.contains("#define BITFRAME_BYTES_PER_FRAME 4\n"));
    assert!(header.contains("const uint8_t BITFRAME_FRAMES_DATA[] PROGMEM = {\n"));
    assert!(header.ends_with("};\n"));

    let data_lines: Vec<&str> = header
        .lines()
        .filter(|line| line.trim_start().starts_with("0x"))
        .collect();
    assert_eq!(data_lines.len(), 1);
    assert_eq!(data_lines[0].matches("0x").count(), 12);
    assert!(data_lines[0].contains("0xff, 0xc0, 0x80, 0x40"));
}

#[test]
fn c_header_wraps_at_sixteen_bytes() {
    let frames: Vec<PackedFrame> = (0..5)
        .map(|_| PackedFrame::from_bytes(vec![0xAB; 8], 8, 8).unwrap())
        .collect();
    let meta = ExportMeta::new("clip", &RenderMeta::new(8, 8, 1.0, 5, 5.0), 128, false)
        .with_title("bad apple");
    let header = container::to_c_header(&frames, &meta);

    assert!(header.contains("#define BAD_APPLE_WIDTH 8\n"));
    let data_lines: Vec<&str> = header
        .lines()
        .filter(|line| line.trim_start().starts_with("0x"))
        .collect();
    assert_eq!(data_lines.len(), 3);
    assert_eq!(data_lines[0].matches("0x").count(), 16);
    assert_eq!(data_lines[2].matches("0x").count(), 8);
}

// ── Gzip ───────────────────────────────────────────────────────────

#[cfg(feature = "gzip")]
#[test]
fn gzip_binary_round_trip() {
    let frames = sample_frames();
    let encoded = container::to_binary_gzip(&frames).unwrap();
    assert_eq!(encoded.format, ContainerFormat::BinaryGzip);
    assert!(container::is_gzip(&encoded.bytes));

    let decoded = decode_container(&encoded.bytes, Some(Dimensions::new(10, 2))).unwrap();
    assert_eq!(decoded.sequence.frames(), frames.as_slice());
}

#[cfg(feature = "gzip")]
#[test]
fn gzip_json_round_trip() {
    let frames = sample_frames();
    let encoded = container::to_json_base64_gzip(&frames, &sample_meta()).unwrap();
    assert_eq!(encoded.format, ContainerFormat::JsonBase64Gzip);

    let decoded = decode_container(&encoded.bytes, None).unwrap();
    assert_eq!(decoded.sequence.frames(), frames.as_slice());
    assert_eq!(decoded.meta.unwrap().encoding.as_deref(), Some("base64"));
}

#[cfg(not(feature = "gzip"))]
#[test]
fn gzip_formats_fall_back_without_feature() {
    let encoded = container::to_binary_gzip(&sample_frames()).unwrap();
    assert_eq!(encoded.format, ContainerFormat::Binary);
    assert_eq!(encoded.bytes, container::to_binary(&sample_frames()));

    let error = decode_container(&[0x1F, 0x8B, 0x08, 0x00], None).unwrap_err();
    assert!(matches!(error, BitframeError::UnsupportedCapability(_)));
}

// ── Export ─────────────────────────────────────────────────────────

#[test]
fn export_file_name_carries_shape() {
    let meta = sample_meta();
    assert_eq!(
        container::export_file_name("clip", &meta, ContainerFormat::Binary),
        "clip-10x2@12.bin"
    );
    assert_eq!(
        container::export_file_name("clip", &meta, ContainerFormat::JsonBase64Gzip),
        "clip-10x2@12.base64.json.gz"
    );
}

#[test]
fn exported_files_decode_from_their_names() {
    let temporary_directory = tempfile::tempdir().expect("Failed to create temp dir");
    let frames = sample_frames();
    let meta = sample_meta();

    for format in [ContainerFormat::Binary, ContainerFormat::JsonHex, ContainerFormat::BinaryGzip] {
        let encoded = container::export(format, &frames, &meta).unwrap();
        let name = container::export_file_name("clip", &meta, encoded.format);
        let path = temporary_directory.path().join(&name);
        std::fs::write(&path, &encoded.bytes).unwrap();

        let dimensions = bitframe::parse_file_name(&name).ok();
        let bytes = std::fs::read(&path).unwrap();
        let decoded = decode_container(&bytes, dimensions).unwrap();
        assert_eq!(decoded.sequence.frames(), frames.as_slice(), "{name}");
        assert_eq!(decoded.sequence.meta().fps, 12.0, "{name}");
    }
}

#[test]
fn format_names() {
    for format in ContainerFormat::ALL {
        assert_eq!(ContainerFormat::from_name(&format.to_string()), Some(format));
        assert_eq!(
            ContainerFormat::from_file_name(&format!("clip.{}", format.extension())),
            Some(format)
        );
    }
    assert!(ContainerFormat::BinaryGzip.is_compressed());
    assert!(!ContainerFormat::CHeader.is_compressed());
}
