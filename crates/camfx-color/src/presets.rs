//! Procedural cinematic grading presets.

use camfx_core::LutId;

use crate::lut::{generate_identity_lut, LutData};

/// Rec. 709 luma.
#[inline]
fn luma([r, g, b]: [f32; 3]) -> f32 {
    0.2126 * r + 0.7152 * g + 0.0722 * b
}

/// Smooth contrast curve pivoting on mid-grey; `amount` 0 is linear.
#[inline]
fn s_curve(x: f32, amount: f32) -> f32 {
    let smooth = x * x * (3.0 - 2.0 * x);
    x + (smooth - x) * amount
}

#[inline]
fn saturate(rgb: [f32; 3], amount: f32) -> [f32; 3] {
    let y = luma(rgb);
    [
        y + (rgb[0] - y) * amount,
        y + (rgb[1] - y) * amount,
        y + (rgb[2] - y) * amount,
    ]
}

#[inline]
fn mix(a: [f32; 3], b: [f32; 3], t: f32) -> [f32; 3] {
    [
        a[0] + (b[0] - a[0]) * t,
        a[1] + (b[1] - a[1]) * t,
        a[2] + (b[2] - a[2]) * t,
    ]
}

fn teal_orange(rgb: [f32; 3]) -> [f32; 3] {
    let y = luma(rgb);
    let shadow = (1.0 - y).powi(2);
    let highlight = y * y;
    let [r, g, b] = rgb;
    [
        s_curve(r - 0.08 * shadow + 0.10 * highlight, 0.3),
        s_curve(g + 0.03 * shadow + 0.02 * highlight, 0.3),
        s_curve(b + 0.10 * shadow - 0.10 * highlight, 0.3),
    ]
}

fn film_noir(rgb: [f32; 3]) -> [f32; 3] {
    let y = s_curve(s_curve(luma(rgb), 1.0), 0.5);
    [y, y, y * 0.98]
}

fn vintage_warm(rgb: [f32; 3]) -> [f32; 3] {
    let [r, g, b] = saturate(rgb, 0.75);
    // lifted blacks, rolled-off whites
    let lift = |x: f32| 0.08 + x * 0.86;
    [lift(r * 1.06), lift(g * 1.0), lift(b * 0.85)]
}

fn cool_blue(rgb: [f32; 3]) -> [f32; 3] {
    let [r, g, b] = rgb;
    [r * 0.88, g * 0.98 + 0.01, b * 1.08 + 0.04]
}

fn bleach_bypass(rgb: [f32; 3]) -> [f32; 3] {
    let y = luma(rgb);
    let desat = mix(rgb, [y, y, y], 0.5);
    [
        s_curve(desat[0], 0.6),
        s_curve(desat[1], 0.6),
        s_curve(desat[2], 0.6),
    ]
}

fn golden_hour(rgb: [f32; 3]) -> [f32; 3] {
    let y = luma(rgb);
    let warm = 0.5 + 0.5 * y;
    let [r, g, b] = saturate(rgb, 1.1);
    [r * (1.0 + 0.12 * warm) + 0.02, g * (1.0 + 0.04 * warm), b * (1.0 - 0.15 * warm)]
}

fn matrix_green(rgb: [f32; 3]) -> [f32; 3] {
    let y = luma(rgb);
    let [r, g, b] = mix(rgb, [y, y, y], 0.6);
    [r * 0.8, s_curve(g * 1.15 + 0.03, 0.4), b * 0.75]
}

/// Generate the preset LUT for `id` at edge length `size`.
///
/// `LutId::None` yields the identity LUT.
pub fn generate_preset(id: LutId, size: usize) -> LutData {
    let f: fn([f32; 3]) -> [f32; 3] = match id {
        LutId::None => return generate_identity_lut(size),
        LutId::TealOrange => teal_orange,
        LutId::FilmNoir => film_noir,
        LutId::VintageWarm => vintage_warm,
        LutId::CoolBlue => cool_blue,
        LutId::BleachBypass => bleach_bypass,
        LutId::GoldenHour => golden_hour,
        LutId::MatrixGreen => matrix_green,
    };
    LutData::from_fn(id.name(), size, f)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_is_identity() {
        assert!(generate_preset(LutId::None, 8).is_identity(1e-6));
    }

    #[test]
    fn presets_are_distinct_and_in_range() {
        for id in LutId::PRESETS {
            let lut = generate_preset(id, 8);
            assert_eq!(lut.name, id.name());
            assert_eq!(lut.data.len(), 512);
            assert!(!lut.is_identity(0.01), "{id:?} should not be identity");
            assert!(lut
                .data
                .iter()
                .all(|c| c.iter().all(|v| (0.0..=1.0).contains(v))));
        }
    }

    #[test]
    fn film_noir_is_monochrome() {
        let lut = generate_preset(LutId::FilmNoir, 8);
        let [r, g, _] = lut.apply([0.9, 0.1, 0.3]);
        assert!((r - g).abs() < 1e-5);
    }

    #[test]
    fn teal_orange_warms_highlights() {
        let lut = generate_preset(LutId::TealOrange, 16);
        let [r, _, b] = lut.apply([0.85, 0.85, 0.85]);
        assert!(r > b);
        let [r, _, b] = lut.apply([0.15, 0.15, 0.15]);
        assert!(b > r);
    }
}
