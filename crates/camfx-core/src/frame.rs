//! Frame buffer types for video frames in CPU memory.
//!
//! Frames are tightly packed (no row padding) so a whole frame can be handed
//! to the GPU or moved across a thread boundary without repacking.

use crate::error::{CamFxError, Result};
use serde::{Deserialize, Serialize};

/// Pixel format enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PixelFormat {
    /// 8-bit RGBA (32 bits per pixel)
    #[default]
    Rgba8,
    /// 8-bit grayscale
    Gray8,
}

impl PixelFormat {
    /// Bytes per pixel.
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            Self::Rgba8 => 4,
            Self::Gray8 => 1,
        }
    }

    /// Calculate total bytes needed for a frame of this format.
    pub fn frame_size(self, width: u32, height: u32) -> usize {
        width as usize * height as usize * self.bytes_per_pixel()
    }
}

/// A video frame in CPU memory.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameBuffer {
    /// Pixel format
    pub format: PixelFormat,
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Packed pixel data, row-major
    pub data: Vec<u8>,
}

impl FrameBuffer {
    /// Create a zeroed frame buffer with the given dimensions and format.
    pub fn new(width: u32, height: u32, format: PixelFormat) -> Self {
        Self {
            format,
            width,
            height,
            data: vec![0u8; format.frame_size(width, height)],
        }
    }

    /// Wrap existing RGBA8 pixel data.
    pub fn from_rgba(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        let expected = PixelFormat::Rgba8.frame_size(width, height);
        if data.len() != expected {
            return Err(CamFxError::InvalidParameter(format!(
                "RGBA buffer for {width}x{height} needs {expected} bytes, got {}",
                data.len()
            )));
        }
        Ok(Self {
            format: PixelFormat::Rgba8,
            width,
            height,
            data,
        })
    }

    /// Create an RGBA8 frame filled with a single color.
    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let mut frame = Self::new(width, height, PixelFormat::Rgba8);
        frame.fill(rgba);
        frame
    }

    /// Width and height as a tuple.
    #[inline]
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// No pixels: zero width or height.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Whether `other` has the same pixel dimensions.
    #[inline]
    pub fn same_size(&self, other: &Self) -> bool {
        self.width == other.width && self.height == other.height
    }

    /// Bytes per row.
    #[inline]
    pub fn stride(&self) -> usize {
        self.width as usize * self.format.bytes_per_pixel()
    }

    /// Total memory usage of this frame in bytes.
    pub fn memory_size(&self) -> usize {
        self.data.len()
    }

    /// Get a row of pixel data.
    #[inline]
    pub fn row(&self, y: u32) -> &[u8] {
        let stride = self.stride();
        let start = y as usize * stride;
        &self.data[start..start + stride]
    }

    /// Get a mutable row of pixel data.
    #[inline]
    pub fn row_mut(&mut self, y: u32) -> &mut [u8] {
        let stride = self.stride();
        let start = y as usize * stride;
        &mut self.data[start..start + stride]
    }

    /// RGBA pixel at (x, y), clamped to the frame edges. Transparent black
    /// for an empty frame.
    #[inline]
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        if self.is_empty() {
            return [0; 4];
        }
        let x = x.min(self.width.saturating_sub(1)) as usize;
        let y = y.min(self.height.saturating_sub(1)) as usize;
        match self.format {
            PixelFormat::Rgba8 => {
                let i = (y * self.width as usize + x) * 4;
                [
                    self.data[i],
                    self.data[i + 1],
                    self.data[i + 2],
                    self.data[i + 3],
                ]
            }
            PixelFormat::Gray8 => {
                let v = self.data[y * self.width as usize + x];
                [v, v, v, 255]
            }
        }
    }

    /// Overwrite the RGBA pixel at (x, y). Out-of-bounds writes are ignored.
    #[inline]
    pub fn set_pixel(&mut self, x: u32, y: u32, rgba: [u8; 4]) {
        if x >= self.width || y >= self.height || self.format != PixelFormat::Rgba8 {
            return;
        }
        let i = (y as usize * self.width as usize + x as usize) * 4;
        self.data[i..i + 4].copy_from_slice(&rgba);
    }

    /// View the frame as RGBA pixels.
    pub fn pixels(&self) -> &[[u8; 4]] {
        debug_assert_eq!(self.format, PixelFormat::Rgba8);
        bytemuck::cast_slice(&self.data)
    }

    /// View the frame as mutable RGBA pixels.
    pub fn pixels_mut(&mut self) -> &mut [[u8; 4]] {
        debug_assert_eq!(self.format, PixelFormat::Rgba8);
        bytemuck::cast_slice_mut(&mut self.data)
    }

    /// Fill every pixel with a color.
    pub fn fill(&mut self, rgba: [u8; 4]) {
        for px in self.pixels_mut() {
            *px = rgba;
        }
    }

    /// Change dimensions, reusing the existing allocation where possible.
    ///
    /// Returns `true` when the dimensions actually changed. Contents are
    /// undefined after a resize.
    pub fn resize(&mut self, width: u32, height: u32) -> bool {
        if self.width == width && self.height == height {
            return false;
        }
        self.width = width;
        self.height = height;
        self.data.resize(self.format.frame_size(width, height), 0);
        true
    }

    /// Copy pixel data from a frame of the same size and format.
    pub fn copy_from(&mut self, other: &Self) -> Result<()> {
        if !self.same_size(other) || self.format != other.format {
            return Err(CamFxError::DimensionMismatch {
                expected_width: self.width,
                expected_height: self.height,
                width: other.width,
                height: other.height,
            });
        }
        self.data.copy_from_slice(&other.data);
        Ok(())
    }

    /// Create a test pattern frame (color bars).
    pub fn test_pattern(width: u32, height: u32) -> Self {
        let mut frame = Self::new(width, height, PixelFormat::Rgba8);
        let colors: [[u8; 4]; 8] = [
            [255, 255, 255, 255], // White
            [255, 255, 0, 255],   // Yellow
            [0, 255, 255, 255],   // Cyan
            [0, 255, 0, 255],     // Green
            [255, 0, 255, 255],   // Magenta
            [255, 0, 0, 255],     // Red
            [0, 0, 255, 255],     // Blue
            [0, 0, 0, 255],       // Black
        ];
        for y in 0..height {
            let row = frame.row_mut(y);
            for x in 0..width {
                let i = (x * 4) as usize;
                let bar = (x * 8 / width.max(1)) as usize;
                row[i..i + 4].copy_from_slice(&colors[bar.min(7)]);
            }
        }
        frame
    }

    /// Create a high-frequency checkerboard frame with the given cell size.
    pub fn checkerboard(width: u32, height: u32, cell: u32) -> Self {
        let cell = cell.max(1);
        let mut frame = Self::new(width, height, PixelFormat::Rgba8);
        for y in 0..height {
            for x in 0..width {
                let on = ((x / cell) + (y / cell)) % 2 == 0;
                let v = if on { 230 } else { 25 };
                frame.set_pixel(x, y, [v, v, v, 255]);
            }
        }
        frame
    }
}
