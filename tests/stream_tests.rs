//! Stream Encoding Tests
//!
//! Tests for:
//! - The 90-layout taxonomy and tag parsing
//! - Byte sizes and per-message pixel budgets
//! - Round-trips: 8-bit identity modulo clamping, 16-bit within one LSB
//! - W channel emitting zero, big-endian component order

use freyr::stream::{Channel, Depth, Encoding};
use freyr::{Led, hsv};

fn decode(encoding: Encoding, bytes: &[u8]) -> Led {
    let width = encoding.depth().bytes();
    let mut led = Led::BLACK;
    for (i, channel) in encoding.channels().iter().enumerate() {
        let raw = &bytes[i * width..(i + 1) * width];
        let mut value = 0u32;
        for &b in raw {
            value = (value << 8) | u32::from(b);
        }
        let max = ((1u64 << (8 * width)) - 1) as f32;
        let v = value as f32 / max;
        match channel {
            Channel::R => led.r = v,
            Channel::G => led.g = v,
            Channel::B => led.b = v,
            Channel::W => {}
        }
    }
    led
}

// ============================================================================
// Taxonomy
// ============================================================================

#[test]
fn ninety_layouts_parse_by_name() {
    let all = Encoding::all();
    assert_eq!(all.len(), 90);
    for encoding in &all {
        let parsed = Encoding::parse(&encoding.name());
        assert_eq!(parsed, Some(*encoding), "tag {}", encoding.name());
    }
}

#[test]
fn byte_sizes_and_message_budgets() {
    let rgb8 = Encoding::parse("rgb8").unwrap();
    assert_eq!(rgb8.bytes_per_pixel(), 3);
    assert_eq!(rgb8.pixels_per_message(), 256);

    let grb16 = Encoding::parse("grb16").unwrap();
    assert_eq!(grb16.bytes_per_pixel(), 6);
    assert_eq!(grb16.pixels_per_message(), 128);

    let bgr24 = Encoding::parse("bgr24").unwrap();
    assert_eq!(bgr24.bytes_per_pixel(), 9);
    assert_eq!(bgr24.pixels_per_message(), 85);

    let rgbw16 = Encoding::parse("rgbw16").unwrap();
    assert_eq!(rgbw16.bytes_per_pixel(), 8);
    assert_eq!(rgbw16.pixels_per_message(), 96);
}

#[test]
fn component_order_follows_permutation() {
    let grb8 = Encoding::parse("grb8").unwrap();
    let mut out = Vec::new();
    grb8.encode(Led::new(1.0, 0.5, 0.0), &mut out);
    assert_eq!(out, vec![127, 255, 0]);
}

#[test]
fn sixteen_bit_components_are_big_endian() {
    let rgb16 = Encoding::parse("rgb16").unwrap();
    let mut out = Vec::new();
    rgb16.encode(Led::new(1.0, 0.0, 0.0), &mut out);
    assert_eq!(out, vec![0xff, 0xff, 0, 0, 0, 0]);
}

#[test]
fn w_channel_emits_zero() {
    let wrgb8 = Encoding::parse("wrgb8").unwrap();
    let mut out = Vec::new();
    wrgb8.encode(Led::new(1.0, 1.0, 1.0), &mut out);
    assert_eq!(out, vec![0, 255, 255, 255]);
}

// ============================================================================
// Round-trips
// ============================================================================

#[test]
fn eight_bit_round_trip_is_identity_modulo_clamp() {
    let tolerance = 1.0 / 255.0 + 1e-6;
    for encoding in Encoding::all().into_iter().filter(|e| e.depth() == Depth::Eight) {
        for sample in [-0.5f32, 0.0, 0.125, 0.5, 0.9, 1.0, 2.0] {
            let led = Led::new(sample, 1.0 - sample.clamp(0.0, 1.0), sample * 0.5);
            let mut bytes = Vec::new();
            encoding.encode(led, &mut bytes);
            let decoded = decode(encoding, &bytes);
            assert!((decoded.r - led.r.clamp(0.0, 1.0)).abs() <= tolerance);
            assert!((decoded.g - led.g.clamp(0.0, 1.0)).abs() <= tolerance);
            assert!((decoded.b - led.b.clamp(0.0, 1.0)).abs() <= tolerance);
        }
    }
}

#[test]
fn sixteen_bit_round_trip_within_one_lsb() {
    let tolerance = 1.0 / 65535.0 + 1e-7;
    let encoding = Encoding::parse("rgbw16").unwrap();
    for hue in 0..12 {
        let led = hsv(hue as f32 * 30.0, 0.8, 0.9);
        let mut bytes = Vec::new();
        encoding.encode(led, &mut bytes);
        let decoded = decode(encoding, &bytes);
        assert!((decoded.r - led.r).abs() <= tolerance);
        assert!((decoded.g - led.g).abs() <= tolerance);
        assert!((decoded.b - led.b).abs() <= tolerance);
    }
}
