//! Bitstream codec integration tests.

use bitframe::codec::{self, bytes_per_frame, bytes_per_row, luminance};
use bitframe::{BitframeError, PackedFrame, PixelBuffer, PixelFormat, get_pixel_in_sequence};

fn gray(width: u32, height: u32, data: Vec<u8>) -> PixelBuffer {
    PixelBuffer::new(width, height, PixelFormat::Gray8, data).expect("valid buffer")
}

// ── Geometry ───────────────────────────────────────────────────────

#[test]
fn rows_round_up_to_whole_bytes() {
    assert_eq!(bytes_per_row(1), 1);
    assert_eq!(bytes_per_row(8), 1);
    assert_eq!(bytes_per_row(9), 2);
    assert_eq!(bytes_per_frame(128, 64), 1024);
    assert_eq!(bytes_per_frame(10, 3), 6);
}

#[test]
fn luminance_weights() {
    assert_eq!(luminance(0, 0, 0), 0);
    assert_eq!(luminance(255, 255, 255), 255);
    assert_eq!(luminance(255, 0, 0), 76);
    assert_eq!(luminance(0, 255, 0), 149);
    assert_eq!(luminance(0, 0, 255), 29);
}

// ── Packing ────────────────────────────────────────────────────────

#[test]
fn pack_is_msb_first() {
    let pixels = gray(8, 1, vec![255, 0, 0, 0, 0, 0, 0, 255]);
    let packed = codec::pack(&pixels, 128, false);
    assert_eq!(packed.as_bytes(), &[0b1000_0001]);
}

#[test]
fn pack_pads_each_row() {
    // 10x2: first row all on, second row only the last pixel on.
    let mut data = vec![255; 10];
    data.extend_from_slice(&[0, 0, 0, 0, 0, 0, 0, 0, 0, 255]);
    let packed = codec::pack(&gray(10, 2, data), 128, false);
    assert_eq!(packed.as_bytes(), &[0xFF, 0b1100_0000, 0x00, 0b0100_0000]);
}

#[test]
fn threshold_is_inclusive() {
    let pixels = gray(3, 1, vec![127, 128, 129]);
    assert_eq!(codec::pack(&pixels, 128, false).as_bytes(), &[0b0110_0000]);
}

#[test]
fn invert_flips_pixels_but_not_padding() {
    let pixels = gray(3, 1, vec![0, 255, 0]);
    assert_eq!(codec::pack(&pixels, 128, true).as_bytes(), &[0b1010_0000]);
}

#[test]
fn threshold_zero_turns_everything_on() {
    let pixels = gray(4, 1, vec![0, 0, 0, 0]);
    assert_eq!(codec::pack(&pixels, 0, false).as_bytes(), &[0xF0]);
}

#[test]
fn pack_rgba_uses_luminance() {
    let data = vec![
        255, 0, 0, 255, // red, luminance 76
        0, 255, 0, 255, // green, luminance 149
    ];
    let pixels = PixelBuffer::new(2, 1, PixelFormat::Rgba8, data).unwrap();
    assert_eq!(codec::pack(&pixels, 100, false).as_bytes(), &[0b0100_0000]);
}

#[test]
fn pack_rgb_and_rgba_agree() {
    let rgb = PixelBuffer::filled(9, 2, PixelFormat::Rgb8, &[200, 200, 200]).unwrap();
    let rgba = PixelBuffer::filled(9, 2, PixelFormat::Rgba8, &[200, 200, 200, 0]).unwrap();
    assert_eq!(codec::pack(&rgb, 128, false), codec::pack(&rgba, 128, false));
}

// ── Unpacking ──────────────────────────────────────────────────────

#[test]
fn unpack_restores_binarized_pixels() {
    let pixels = gray(10, 2, (0..20).map(|i| if i % 3 == 0 { 255 } else { 0 }).collect());
    let packed = codec::pack(&pixels, 128, false);
    let unpacked = codec::unpack(packed.as_bytes(), 10, 2).unwrap();

    assert_eq!(unpacked.format(), PixelFormat::Rgba8);
    for y in 0..2 {
        for x in 0..10 {
            assert_eq!(
                unpacked.luminance_at(x, y),
                pixels.luminance_at(x, y),
                "pixel ({x}, {y})"
            );
        }
    }
}

#[test]
fn unpack_truncated_input_reads_off() {
    let unpacked = codec::unpack(&[0xFF], 8, 2).unwrap();
    assert_eq!(unpacked.luminance_at(0, 0), Some(255));
    assert_eq!(unpacked.luminance_at(0, 1), Some(0));
}

#[test]
fn unpack_rejects_zero_dimensions() {
    assert!(matches!(
        codec::unpack(&[], 0, 4),
        Err(BitframeError::InvalidDimensions { width: 0, height: 4 })
    ));
}

// ── Pixel access ───────────────────────────────────────────────────

#[test]
fn get_pixel_reads_bits() {
    let frame = [0b0100_0000, 0b0000_0001];
    assert!(!codec::get_pixel(&frame, 0, 0, 16));
    assert!(codec::get_pixel(&frame, 1, 0, 16));
    assert!(codec::get_pixel(&frame, 15, 0, 16));
    assert!(!codec::get_pixel(&frame, 16, 0, 16));
    assert!(!codec::get_pixel(&frame, 0, 5, 16));
}

#[test]
fn get_pixel_in_sequence_offsets_by_frame() {
    // Two 8x2 frames.
    let data = [0x00, 0x00, 0x80, 0x01];
    assert!(!get_pixel_in_sequence(&data, 0, 0, 0, 8, 2));
    assert!(get_pixel_in_sequence(&data, 1, 0, 0, 8, 2));
    assert!(get_pixel_in_sequence(&data, 1, 7, 1, 8, 2));
    assert!(!get_pixel_in_sequence(&data, 2, 0, 0, 8, 2));
    assert!(!get_pixel_in_sequence(&data, 1, 0, 2, 8, 2));
}

// ── Buffers ────────────────────────────────────────────────────────

#[test]
fn pixel_buffer_validates_length() {
    let result = PixelBuffer::new(2, 2, PixelFormat::Rgb8, vec![0; 11]);
    assert!(matches!(
        result,
        Err(BitframeError::PixelBufferMismatch {
            expected: 12,
            actual: 11
        })
    ));
}

#[test]
fn pixel_buffer_rejects_zero_dimensions() {
    let result = PixelBuffer::new(0, 2, PixelFormat::Gray8, vec![]);
    assert!(matches!(result, Err(BitframeError::InvalidDimensions { .. })));
}

#[test]
fn packed_frame_from_bytes_checks_geometry() {
    assert!(PackedFrame::from_bytes(vec![0; 6], 10, 3).is_ok());
    let error = PackedFrame::from_bytes(vec![0; 5], 10, 3).unwrap_err();
    assert!(matches!(error, BitframeError::DecodeError { ref field, .. } if field == "frame"));
}

#[test]
fn gray_conversion_uses_packing_luminance() {
    let image = image::DynamicImage::ImageRgb8(image::RgbImage::from_pixel(
        2,
        1,
        image::Rgb([255, 0, 0]),
    ));
    let gray = PixelBuffer::from_image(&image, PixelFormat::Gray8).unwrap();
    assert_eq!(gray.as_bytes(), &[76, 76]);
    assert_eq!(codec::pack(&gray, 60, false).as_bytes(), &[0xC0]);
}

#[test]
fn image_round_trip() {
    let pixels = gray(3, 2, vec![0, 255, 10, 20, 30, 40]);
    let image = pixels.to_image().unwrap();
    let back = PixelBuffer::from_image(&image, PixelFormat::Gray8).unwrap();
    assert_eq!(back, pixels);
}
