//! GPU texture and readback buffer management.

use camfx_color::PackedLut;
use camfx_core::{FrameBuffer, PixelFormat};

use crate::error::GpuError;

/// A GPU texture that can hold video frame data.
pub struct GpuTexture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub width: u32,
    pub height: u32,
    pub format: wgpu::TextureFormat,
}

impl GpuTexture {
    /// Create a new GPU texture with the given dimensions.
    pub fn new(
        device: &wgpu::Device,
        width: u32,
        height: u32,
        format: wgpu::TextureFormat,
        usage: wgpu::TextureUsages,
        label: Option<&str>,
    ) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label,
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage,
            view_formats: &[],
        });

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        Self {
            texture,
            view,
            width,
            height,
            format,
        }
    }

    /// Texture the camera frame is uploaded into.
    pub fn for_video_frame(device: &wgpu::Device, width: u32, height: u32) -> Self {
        Self::new(
            device,
            width,
            height,
            wgpu::TextureFormat::Rgba8Unorm,
            wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            Some("Video Frame Texture"),
        )
    }

    /// Create a render target texture.
    pub fn render_target(device: &wgpu::Device, width: u32, height: u32, label: &str) -> Self {
        Self::new(
            device,
            width,
            height,
            wgpu::TextureFormat::Rgba8Unorm,
            wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::COPY_SRC,
            Some(label),
        )
    }

    /// Float texture holding a packed 3D LUT.
    pub fn for_lut(device: &wgpu::Device, lut: &PackedLut) -> Self {
        Self::new(
            device,
            lut.width,
            lut.height,
            wgpu::TextureFormat::Rgba32Float,
            wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            Some("LUT Texture"),
        )
    }

    fn extent(&self) -> wgpu::Extent3d {
        wgpu::Extent3d {
            width: self.width,
            height: self.height,
            depth_or_array_layers: 1,
        }
    }

    /// Upload a FrameBuffer to this texture.
    pub fn upload_frame(&self, queue: &wgpu::Queue, frame: &FrameBuffer) -> Result<(), GpuError> {
        if frame.format != PixelFormat::Rgba8 {
            return Err(GpuError::UnsupportedFrame(
                "only RGBA8 frames can be uploaded".to_string(),
            ));
        }

        if frame.width != self.width || frame.height != self.height {
            return Err(GpuError::UnsupportedFrame(format!(
                "frame size {}x{} doesn't match texture size {}x{}",
                frame.width, frame.height, self.width, self.height
            )));
        }

        queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &self.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &frame.data,
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(frame.stride() as u32),
                rows_per_image: Some(self.height),
            },
            self.extent(),
        );

        Ok(())
    }

    /// Upload packed LUT texels.
    pub fn upload_lut(&self, queue: &wgpu::Queue, lut: &PackedLut) {
        queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &self.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            bytemuck::cast_slice(&lut.texels),
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(lut.width * 16),
                rows_per_image: Some(lut.height),
            },
            self.extent(),
        );
    }

    /// Memory usage estimate in bytes.
    pub fn memory_size(&self) -> usize {
        let bytes_per_pixel = match self.format {
            wgpu::TextureFormat::Rgba8UnormSrgb | wgpu::TextureFormat::Rgba8Unorm => 4,
            wgpu::TextureFormat::Rgba16Float => 8,
            wgpu::TextureFormat::Rgba32Float => 16,
            _ => 4,
        };
        (self.width * self.height) as usize * bytes_per_pixel
    }

    /// Release the GPU allocation now rather than at drop.
    pub fn destroy(&self) {
        self.texture.destroy();
    }
}

/// Row pitch for texture-to-buffer copies, padded to
/// `COPY_BYTES_PER_ROW_ALIGNMENT`.
#[inline]
pub fn padded_bytes_per_row(width: u32) -> u32 {
    let unpadded = width * 4;
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    unpadded.div_ceil(align) * align
}

/// Copy padded rows from a mapped readback buffer into a tightly packed frame.
pub fn unpad_rows(padded: &[u8], padded_row: usize, frame: &mut FrameBuffer) {
    let stride = frame.stride();
    for (y, dst) in frame.data.chunks_exact_mut(stride).enumerate() {
        let start = y * padded_row;
        dst.copy_from_slice(&padded[start..start + stride]);
    }
}

/// Tracks the dimensions GPU resources were last allocated for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CachedDims {
    dims: Option<(u32, u32)>,
    allocations: u64,
}

impl CachedDims {
    pub fn needs_update(&self, width: u32, height: u32) -> bool {
        self.dims != Some((width, height))
    }

    pub fn update(&mut self, width: u32, height: u32) {
        self.dims = Some((width, height));
        self.allocations += 1;
    }

    pub fn reset(&mut self) {
        self.dims = None;
    }

    /// How many times resources were (re)allocated.
    pub fn allocations(&self) -> u64 {
        self.allocations
    }
}
