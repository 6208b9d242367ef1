//! Geometric primitives for 2D view transformations.

use bytemuck::{Pod, Zeroable};
use glam::Affine2;
use serde::{Deserialize, Serialize};

/// 2D vector.
pub type Vec2 = glam::Vec2;

/// Axis-aligned rectangle in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, Pod, Zeroable)]
#[repr(C)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    /// Create a new rectangle.
    #[inline]
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Largest rectangle of the given aspect ratio (width / height) centered
    /// inside `width` x `height`.
    pub fn fit_aspect(width: f32, height: f32, aspect: f32) -> Self {
        if aspect <= 0.0 || width <= 0.0 || height <= 0.0 {
            return Self::new(0.0, 0.0, width.max(0.0), height.max(0.0));
        }
        let src = width / height;
        let (w, h) = if aspect > src {
            (width, width / aspect)
        } else {
            (height * aspect, height)
        };
        Self::new((width - w) * 0.5, (height - h) * 0.5, w, h)
    }
}

/// 2D affine view transform around the frame center.
///
/// Maps output pixel coordinates to source pixel coordinates when inverted,
/// which is how the geometry stage samples.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform2D {
    inner: Affine2,
}

impl Transform2D {
    /// Identity transform.
    pub const IDENTITY: Self = Self {
        inner: Affine2::IDENTITY,
    };

    /// Build the camera view transform for a `width` x `height` frame.
    ///
    /// `pan` is expressed as a fraction of the half-frame, `rotation_deg` in
    /// degrees clockwise. Mirroring flips horizontally before everything else.
    pub fn view(
        width: f32,
        height: f32,
        zoom: f32,
        rotation_deg: f32,
        pan: Vec2,
        mirror: bool,
    ) -> Self {
        let center = Vec2::new(width * 0.5, height * 0.5);
        let offset = Vec2::new(pan.x * width * 0.5, pan.y * height * 0.5);
        let flip = if mirror { -1.0 } else { 1.0 };
        let inner = Affine2::from_translation(center + offset)
            * Affine2::from_angle(rotation_deg.to_radians())
            * Affine2::from_scale(Vec2::new(zoom * flip, zoom))
            * Affine2::from_translation(-center);
        Self { inner }
    }

    /// Transform a point.
    #[inline]
    pub fn transform_point(self, point: Vec2) -> Vec2 {
        self.inner.transform_point2(point)
    }

    /// Get the inverse transform.
    #[inline]
    pub fn inverse(self) -> Self {
        Self {
            inner: self.inner.inverse(),
        }
    }

    /// Whether this transform leaves every point where it is.
    pub fn is_identity(self) -> bool {
        self.inner.abs_diff_eq(Affine2::IDENTITY, 1e-6)
    }
}

impl Default for Transform2D {
    fn default() -> Self {
        Self::IDENTITY
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fit_aspect_pillarbox() {
        let r = Rect::fit_aspect(1920.0, 1080.0, 1.0);
        assert!((r.width - 1080.0).abs() < 0.01);
        assert!((r.x - 420.0).abs() < 0.01);
        assert_eq!(r.y, 0.0);
    }

    #[test]
    fn test_fit_aspect_letterbox_and_degenerate() {
        let r = Rect::fit_aspect(1000.0, 1000.0, 2.0);
        assert_eq!(r, Rect::new(0.0, 250.0, 1000.0, 500.0));
        assert_eq!(Rect::fit_aspect(0.0, 10.0, 1.0), Rect::new(0.0, 0.0, 0.0, 10.0));
    }

    #[test]
    fn test_view_identity() {
        let t = Transform2D::view(640.0, 480.0, 1.0, 0.0, Vec2::ZERO, false);
        assert!(t.is_identity());
    }

    #[test]
    fn test_view_zoom_keeps_center() {
        let t = Transform2D::view(640.0, 480.0, 2.0, 0.0, Vec2::ZERO, false);
        let c = t.transform_point(Vec2::new(320.0, 240.0));
        assert!((c - Vec2::new(320.0, 240.0)).length() < 1e-3);
        let p = t.transform_point(Vec2::new(420.0, 240.0));
        assert!((p.x - 520.0).abs() < 1e-3);
    }

    #[test]
    fn test_view_mirror() {
        let t = Transform2D::view(100.0, 100.0, 1.0, 0.0, Vec2::ZERO, true);
        let p = t.inverse().transform_point(Vec2::new(10.0, 20.0));
        assert!((p.x - 90.0).abs() < 1e-3);
        assert!((p.y - 20.0).abs() < 1e-3);
    }
}
