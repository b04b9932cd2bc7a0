//! RGB565 → RGB888 conversion.
//!
//! The camera sends one 16-bit sample per pixel, high byte first. Each
//! channel is widened by a plain left shift (red/blue by 3, green by 2),
//! leaving the low bits zero, so full-scale white comes out as
//! `F8 FC F8`.

// ── Constants ────────────────────────────────────────────────────

pub const RGB565_MASK_RED: u16 = 0xF800;
pub const RGB565_MASK_GREEN: u16 = 0x07E0;
pub const RGB565_MASK_BLUE: u16 = 0x001F;

/// Bytes per pixel on the wire.
pub const RAW_BYTES_PER_PIXEL: usize = 2;
/// Bytes per pixel after conversion.
pub const RGB_BYTES_PER_PIXEL: usize = 3;

// ── Conversion ───────────────────────────────────────────────────

/// Convert one packed sample to an `[r, g, b]` triple.
#[inline]
pub const fn rgb565_to_rgb888(sample: u16) -> [u8; 3] {
    let r = ((sample & RGB565_MASK_RED) >> 11) as u8;
    let g = ((sample & RGB565_MASK_GREEN) >> 5) as u8;
    let b = (sample & RGB565_MASK_BLUE) as u8;
    [r << 3, g << 2, b << 3]
}

/// Convert a whole raw buffer into `out`.
///
/// `raw` is read two bytes at a time, high byte first. `out` must hold
/// exactly `raw.len() / 2 * 3` bytes.
///
/// # Panics
///
/// Panics if `raw` has odd length or `out` is the wrong size.
pub fn convert_frame(raw: &[u8], out: &mut [u8]) {
    assert!(
        raw.len() % RAW_BYTES_PER_PIXEL == 0,
        "raw buffer length {} is not a whole number of pixels",
        raw.len()
    );
    assert_eq!(
        out.len(),
        raw.len() / RAW_BYTES_PER_PIXEL * RGB_BYTES_PER_PIXEL,
        "display buffer size does not match raw buffer"
    );

    for (src, dst) in raw
        .chunks_exact(RAW_BYTES_PER_PIXEL)
        .zip(out.chunks_exact_mut(RGB_BYTES_PER_PIXEL))
    {
        let sample = u16::from_be_bytes([src[0], src[1]]);
        dst.copy_from_slice(&rgb565_to_rgb888(sample));
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn all_bits_set_is_shift_not_full_scale() {
        assert_eq!(rgb565_to_rgb888(0xFFFF), [0xF8, 0xFC, 0xF8]);
    }

    #[test]
    fn black_stays_black() {
        assert_eq!(rgb565_to_rgb888(0x0000), [0, 0, 0]);
    }

    #[test]
    fn single_channels() {
        assert_eq!(rgb565_to_rgb888(RGB565_MASK_RED), [0xF8, 0, 0]);
        assert_eq!(rgb565_to_rgb888(RGB565_MASK_GREEN), [0, 0xFC, 0]);
        assert_eq!(rgb565_to_rgb888(RGB565_MASK_BLUE), [0, 0, 0xF8]);
        // Lowest bit of each channel.
        assert_eq!(rgb565_to_rgb888(0x0821), [0x08, 0x04, 0x08]);
    }

    #[test]
    fn convert_frame_reads_high_byte_first() {
        // 0xF800 (red), then 0x001F (blue).
        let raw = [0xF8, 0x00, 0x00, 0x1F];
        let mut out = [0u8; 6];
        convert_frame(&raw, &mut out);
        assert_eq!(out, [0xF8, 0, 0, 0, 0, 0xF8]);
    }

    #[test]
    #[should_panic(expected = "does not match")]
    fn convert_frame_rejects_wrong_output_size() {
        let raw = [0u8; 4];
        let mut out = [0u8; 5];
        convert_frame(&raw, &mut out);
    }

    proptest! {
        #[test]
        fn low_bits_are_always_clear(sample in any::<u16>()) {
            let [r, g, b] = rgb565_to_rgb888(sample);
            prop_assert_eq!(r & 0x07, 0);
            prop_assert_eq!(g & 0x03, 0);
            prop_assert_eq!(b & 0x07, 0);
        }

        #[test]
        fn channels_recover_original_sample(sample in any::<u16>()) {
            let [r, g, b] = rgb565_to_rgb888(sample);
            let packed = ((r as u16 >> 3) << 11) | ((g as u16 >> 2) << 5) | (b as u16 >> 3);
            prop_assert_eq!(packed, sample);
        }
    }
}
