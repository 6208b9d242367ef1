//! 3D LUT data: generation, blending, `.cube` parsing and 2D packing.
//!
//! Cells are stored red-fastest: index `r + g * N + b * N * N`. Every
//! component lives in `[0, 1]` and the input domain is always `[0, 1]`.

use crate::error::ColorError;

/// Smallest usable LUT edge length.
pub const MIN_LUT_SIZE: usize = 2;
/// Largest LUT edge length accepted from files or config.
pub const MAX_LUT_SIZE: usize = 64;

/// A named 3D look-up table of edge length `size`.
#[derive(Debug, Clone, PartialEq)]
pub struct LutData {
    pub name: String,
    pub size: usize,
    pub data: Vec<[f32; 3]>,
}

impl LutData {
    /// Build a LUT by evaluating `f` at every lattice point.
    pub fn from_fn(name: impl Into<String>, size: usize, f: impl Fn([f32; 3]) -> [f32; 3]) -> Self {
        let size = size.clamp(MIN_LUT_SIZE, MAX_LUT_SIZE);
        let n = (size - 1) as f32;
        let mut data = Vec::with_capacity(size * size * size);
        for b in 0..size {
            for g in 0..size {
                for r in 0..size {
                    let out = f([r as f32 / n, g as f32 / n, b as f32 / n]);
                    data.push([
                        out[0].clamp(0.0, 1.0),
                        out[1].clamp(0.0, 1.0),
                        out[2].clamp(0.0, 1.0),
                    ]);
                }
            }
        }
        Self {
            name: name.into(),
            size,
            data,
        }
    }

    /// Parse a `.cube` file containing a 3D LUT.
    pub fn from_cube(name: impl Into<String>, content: &str) -> Result<Self, ColorError> {
        let mut size = 0usize;
        let mut data = Vec::new();

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with("TITLE") {
                continue;
            }
            if let Some(rest) = line.strip_prefix("LUT_3D_SIZE") {
                size = rest
                    .trim()
                    .parse()
                    .map_err(|e| ColorError::Parse(format!("bad LUT_3D_SIZE: {}", e)))?;
                continue;
            }
            if let Some(rest) = line.strip_prefix("DOMAIN_MIN") {
                check_domain(rest, 0.0)?;
                continue;
            }
            if let Some(rest) = line.strip_prefix("DOMAIN_MAX") {
                check_domain(rest, 1.0)?;
                continue;
            }
            if line.starts_with("LUT_1D_SIZE") {
                return Err(ColorError::InvalidLut("expected 3D LUT, got 1D".into()));
            }

            let vals: Vec<f32> = line
                .split_whitespace()
                .filter_map(|s| s.parse().ok())
                .collect();
            if vals.len() == 3 {
                data.push([
                    vals[0].clamp(0.0, 1.0),
                    vals[1].clamp(0.0, 1.0),
                    vals[2].clamp(0.0, 1.0),
                ]);
            }
        }

        if size == 0 {
            return Err(ColorError::InvalidLut("missing LUT_3D_SIZE".into()));
        }
        if !(MIN_LUT_SIZE..=MAX_LUT_SIZE).contains(&size) {
            return Err(ColorError::InvalidLut(format!(
                "LUT_3D_SIZE {size} outside {MIN_LUT_SIZE}..={MAX_LUT_SIZE}"
            )));
        }
        let expected = size * size * size;
        if data.len() != expected {
            return Err(ColorError::DimensionMismatch {
                expected,
                got: data.len(),
            });
        }

        Ok(Self {
            name: name.into(),
            size,
            data,
        })
    }

    #[inline]
    fn index(&self, r: usize, g: usize, b: usize) -> usize {
        r + g * self.size + b * self.size * self.size
    }

    /// Lattice value at integer coordinates.
    #[inline]
    pub fn cell(&self, r: usize, g: usize, b: usize) -> [f32; 3] {
        self.data[self.index(r, g, b)]
    }

    /// Whether every cell maps to its own lattice coordinate within `eps`.
    pub fn is_identity(&self, eps: f32) -> bool {
        let reference = generate_identity_lut(self.size);
        self.data
            .iter()
            .zip(&reference.data)
            .all(|(a, b)| (0..3).all(|c| (a[c] - b[c]).abs() <= eps))
    }

    /// Apply the LUT to an RGB triplet using trilinear interpolation.
    pub fn apply(&self, rgb: [f32; 3]) -> [f32; 3] {
        let s = self.size;
        let n = (s - 1) as f32;

        let coords = [
            rgb[0].clamp(0.0, 1.0) * n,
            rgb[1].clamp(0.0, 1.0) * n,
            rgb[2].clamp(0.0, 1.0) * n,
        ];

        let r0 = (coords[0] as usize).min(s - 2);
        let g0 = (coords[1] as usize).min(s - 2);
        let b0 = (coords[2] as usize).min(s - 2);
        let (r1, g1, b1) = (r0 + 1, g0 + 1, b0 + 1);
        let fr = coords[0] - r0 as f32;
        let fg = coords[1] - g0 as f32;
        let fb = coords[2] - b0 as f32;

        let c000 = self.cell(r0, g0, b0);
        let c100 = self.cell(r1, g0, b0);
        let c010 = self.cell(r0, g1, b0);
        let c110 = self.cell(r1, g1, b0);
        let c001 = self.cell(r0, g0, b1);
        let c101 = self.cell(r1, g0, b1);
        let c011 = self.cell(r0, g1, b1);
        let c111 = self.cell(r1, g1, b1);

        let mut out = [0.0f32; 3];
        for c in 0..3 {
            let c00 = c000[c] * (1.0 - fr) + c100[c] * fr;
            let c10 = c010[c] * (1.0 - fr) + c110[c] * fr;
            let c01 = c001[c] * (1.0 - fr) + c101[c] * fr;
            let c11 = c011[c] * (1.0 - fr) + c111[c] * fr;
            let c0 = c00 * (1.0 - fg) + c10 * fg;
            let c1 = c01 * (1.0 - fg) + c11 * fg;
            out[c] = c0 * (1.0 - fb) + c1 * fb;
        }
        out
    }

    /// Lay the cube out as a 2D texture: `N` blue slices side by side,
    /// `N * N` texels wide and `N` tall. Texel `(b * N + r, g)` holds cell
    /// `(r, g, b)`; alpha is always 1.
    pub fn pack_2d(&self) -> PackedLut {
        let n = self.size;
        let width = n * n;
        let mut texels = vec![[0.0f32, 0.0, 0.0, 1.0]; width * n];
        for b in 0..n {
            for g in 0..n {
                for r in 0..n {
                    let [cr, cg, cb] = self.cell(r, g, b);
                    texels[g * width + b * n + r] = [cr, cg, cb, 1.0];
                }
            }
        }
        PackedLut {
            name: self.name.clone(),
            size: n,
            width: width as u32,
            height: n as u32,
            texels,
        }
    }
}

fn check_domain(rest: &str, expected: f32) -> Result<(), ColorError> {
    let vals: Vec<f32> = rest
        .split_whitespace()
        .filter_map(|s| s.parse().ok())
        .collect();
    if vals.len() != 3 {
        return Err(ColorError::Parse(format!("bad domain line: {}", rest.trim())));
    }
    if vals.iter().any(|v| (v - expected).abs() > 1e-6) {
        let min = vals.iter().copied().fold(f32::INFINITY, f32::min);
        let max = vals.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        return Err(ColorError::UnsupportedDomain { min, max });
    }
    Ok(())
}

/// A LUT packed into a `N² x N` RGBA float image, ready for texture upload.
#[derive(Debug, Clone, PartialEq)]
pub struct PackedLut {
    pub name: String,
    pub size: usize,
    pub width: u32,
    pub height: u32,
    pub texels: Vec<[f32; 4]>,
}

impl PackedLut {
    #[inline]
    fn load(&self, x: usize, y: usize) -> [f32; 4] {
        self.texels[y * self.width as usize + x]
    }

    /// Sample exactly as the grading shader does: bilinear red/green inside
    /// the two neighbouring blue slices, then a linear blend between them.
    pub fn sample(&self, rgb: [f32; 3]) -> [f32; 3] {
        let n = self.size;
        let max = (n - 1) as f32;
        let scaled = [
            rgb[0].clamp(0.0, 1.0) * max,
            rgb[1].clamp(0.0, 1.0) * max,
            rgb[2].clamp(0.0, 1.0) * max,
        ];
        let r0 = scaled[0].floor() as usize;
        let g0 = scaled[1].floor() as usize;
        let b0 = scaled[2].floor() as usize;
        let r1 = (r0 + 1).min(n - 1);
        let g1 = (g0 + 1).min(n - 1);
        let b1 = (b0 + 1).min(n - 1);
        let fr = scaled[0] - r0 as f32;
        let fg = scaled[1] - g0 as f32;
        let fb = scaled[2] - b0 as f32;

        let slice = |b: usize| -> [f32; 3] {
            let x0 = b * n + r0;
            let x1 = b * n + r1;
            let t00 = self.load(x0, g0);
            let t10 = self.load(x1, g0);
            let t01 = self.load(x0, g1);
            let t11 = self.load(x1, g1);
            let mut out = [0.0f32; 3];
            for c in 0..3 {
                let top = t00[c] + (t10[c] - t00[c]) * fr;
                let bottom = t01[c] + (t11[c] - t01[c]) * fr;
                out[c] = top + (bottom - top) * fg;
            }
            out
        };

        let lo = slice(b0);
        let hi = slice(b1);
        [
            lo[0] + (hi[0] - lo[0]) * fb,
            lo[1] + (hi[1] - lo[1]) * fb,
            lo[2] + (hi[2] - lo[2]) * fb,
        ]
    }

    /// Graded color mixed back with the source by `intensity` in `[0, 1]`.
    pub fn grade(&self, rgb: [f32; 3], intensity: f32) -> [f32; 3] {
        let t = intensity.clamp(0.0, 1.0);
        let graded = self.sample(rgb);
        [
            rgb[0] + (graded[0] - rgb[0]) * t,
            rgb[1] + (graded[1] - rgb[1]) * t,
            rgb[2] + (graded[2] - rgb[2]) * t,
        ]
    }
}

/// LUT that maps every cell to its own coordinate.
pub fn generate_identity_lut(size: usize) -> LutData {
    LutData::from_fn("Identity", size, |rgb| rgb)
}

/// Cell-wise linear blend: `a * (1 - t) + b * t`, with `t` clamped to `[0, 1]`.
///
/// The endpoints are exact: `t == 0` returns `a`'s cells and `t == 1`
/// returns `b`'s.
pub fn blend_luts(a: &LutData, b: &LutData, t: f32) -> Result<LutData, ColorError> {
    if a.size != b.size {
        return Err(ColorError::SizeMismatch {
            left: a.size,
            right: b.size,
        });
    }
    let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };
    let data = if t == 0.0 {
        a.data.clone()
    } else if t == 1.0 {
        b.data.clone()
    } else {
        a.data
            .iter()
            .zip(&b.data)
            .map(|(x, y)| {
                [
                    x[0] + (y[0] - x[0]) * t,
                    x[1] + (y[1] - x[1]) * t,
                    x[2] + (y[2] - x[2]) * t,
                ]
            })
            .collect()
    };
    Ok(LutData {
        name: format!("{} / {} ({:.0}%)", a.name, b.name, t * 100.0),
        size: a.size,
        data,
    })
}
