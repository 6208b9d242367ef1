//! wgpu renderer for the face-warp and LUT-grade passes.

use std::time::Instant;

use bytemuck::{Pod, Zeroable};
use camfx_color::{PackedLut, WarpUniforms};
use camfx_core::FrameBuffer;
use tracing::{debug, info, warn};

use crate::backoff::InitBackoff;
use crate::config::GpuConfig;
use crate::context::GpuContext;
use crate::error::GpuError;
use crate::texture::{padded_bytes_per_row, unpad_rows, CachedDims, GpuTexture};
use crate::GradeRequest;

const WARP_SHADER: &str = concat!(
    include_str!("shaders/fullscreen.wgsl"),
    include_str!("shaders/warp.wgsl")
);
const GRADE_SHADER: &str = concat!(
    include_str!("shaders/fullscreen.wgsl"),
    include_str!("shaders/grade.wgsl")
);

const TARGET_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// Uniform block for the grade pass. Matches `GradeParams` in `grade.wgsl`.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct GradeUniforms {
    lut_size: u32,
    intensity: f32,
    _pad: [f32; 2],
}

/// Lifecycle of the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RendererState {
    /// No attempt made yet.
    Uninitialized,
    Ready,
    /// Last attempt failed; another is scheduled.
    Retrying,
    /// Retry budget spent; the GPU is not used again this session.
    Disabled,
    /// Resources released by `release()`.
    Released,
}

/// Per-size render targets and the readback buffer.
struct FrameTargets {
    source: GpuTexture,
    intermediate: GpuTexture,
    output: GpuTexture,
    readback: wgpu::Buffer,
    padded_row: u32,
}

impl FrameTargets {
    fn destroy(&self) {
        self.source.destroy();
        self.intermediate.destroy();
        self.output.destroy();
        self.readback.destroy();
    }
}

/// Every GPU object the renderer owns. Dropped as a unit on context loss.
struct GpuResources {
    ctx: GpuContext,
    warp_pipeline: wgpu::RenderPipeline,
    grade_pipeline: wgpu::RenderPipeline,
    warp_layout: wgpu::BindGroupLayout,
    grade_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    warp_uniforms: wgpu::Buffer,
    grade_uniforms: wgpu::Buffer,
    targets: Option<FrameTargets>,
    lut: Option<(String, usize, GpuTexture)>,
}

fn texture_entry(binding: u32, filterable: bool) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    }
}

fn uniform_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

/// Build a fullscreen render pipeline. The shader module is dropped on return.
fn create_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    source: &str,
    label: &str,
) -> wgpu::RenderPipeline {
    let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Wgsl(source.into()),
    });
    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some(label),
        bind_group_layouts: &[layout],
        push_constant_ranges: &[],
    });
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(&pipeline_layout),
        vertex: wgpu::VertexState {
            module: &module,
            entry_point: Some("vs_main"),
            compilation_options: Default::default(),
            buffers: &[],
        },
        fragment: Some(wgpu::FragmentState {
            module: &module,
            entry_point: Some("fs_main"),
            compilation_options: Default::default(),
            targets: &[Some(wgpu::ColorTargetState {
                format: TARGET_FORMAT,
                blend: None,
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),
        primitive: wgpu::PrimitiveState::default(),
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
        cache: None,
    })
}

fn run_pass(
    encoder: &mut wgpu::CommandEncoder,
    pipeline: &wgpu::RenderPipeline,
    bind_group: &wgpu::BindGroup,
    target: &wgpu::TextureView,
    label: &str,
) {
    let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
        label: Some(label),
        color_attachments: &[Some(wgpu::RenderPassColorAttachment {
            view: target,
            resolve_target: None,
            ops: wgpu::Operations {
                load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                store: wgpu::StoreOp::Store,
            },
        })],
        depth_stencil_attachment: None,
        timestamp_writes: None,
        occlusion_query_set: None,
    });
    pass.set_pipeline(pipeline);
    pass.set_bind_group(0, bind_group, &[]);
    pass.draw(0..3, 0..1);
}

impl GpuResources {
    fn create() -> Result<Self, GpuError> {
        let ctx = GpuContext::new_blocking()?;
        let device = &ctx.device;

        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let warp_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("warp_bind_group_layout"),
            entries: &[
                texture_entry(0, true),
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
                uniform_entry(2),
            ],
        });
        let grade_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("grade_bind_group_layout"),
            entries: &[texture_entry(0, false), texture_entry(1, false), uniform_entry(2)],
        });

        let warp_pipeline = create_pipeline(device, &warp_layout, WARP_SHADER, "warp_pipeline");
        let grade_pipeline = create_pipeline(device, &grade_layout, GRADE_SHADER, "grade_pipeline");

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("warp_sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let warp_uniforms = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("warp_uniforms"),
            size: std::mem::size_of::<WarpUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let grade_uniforms = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("grade_uniforms"),
            size: std::mem::size_of::<GradeUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        if let Some(err) = pollster::block_on(device.pop_error_scope()) {
            return Err(GpuError::Shader(err.to_string()));
        }

        Ok(Self {
            ctx,
            warp_pipeline,
            grade_pipeline,
            warp_layout,
            grade_layout,
            sampler,
            warp_uniforms,
            grade_uniforms,
            targets: None,
            lut: None,
        })
    }

    fn ensure_targets(&mut self, dims: &mut CachedDims, width: u32, height: u32) {
        if self.targets.is_some() && !dims.needs_update(width, height) {
            return;
        }
        debug!(width, height, "Allocating GPU frame targets");
        if let Some(old) = self.targets.take() {
            old.destroy();
        }
        let device = &self.ctx.device;
        let padded_row = padded_bytes_per_row(width);
        self.targets = Some(FrameTargets {
            source: GpuTexture::for_video_frame(device, width, height),
            intermediate: GpuTexture::render_target(device, width, height, "warp_target"),
            output: GpuTexture::render_target(device, width, height, "grade_target"),
            readback: device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("readback_buffer"),
                size: padded_row as u64 * height as u64,
                usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
                mapped_at_creation: false,
            }),
            padded_row,
        });
        dims.update(width, height);
    }

    fn ensure_lut(&mut self, lut: &PackedLut) {
        if let Some((name, size, _)) = &self.lut {
            if *name == lut.name && *size == lut.size {
                return;
            }
        }
        if let Some((_, _, old)) = self.lut.take() {
            old.destroy();
        }
        let texture = GpuTexture::for_lut(&self.ctx.device, lut);
        texture.upload_lut(&self.ctx.queue, lut);
        debug!(lut = %lut.name, size = lut.size, "Uploaded LUT texture");
        self.lut = Some((lut.name.clone(), lut.size, texture));
    }

    fn render(
        &mut self,
        dims: &mut CachedDims,
        frame: &mut FrameBuffer,
        request: &GradeRequest<'_>,
    ) -> Result<(), GpuError> {
        if request.is_noop() {
            return Ok(());
        }
        self.ensure_targets(dims, frame.width, frame.height);
        if let Some(lut) = request.lut {
            self.ensure_lut(lut);
        }

        let device = &self.ctx.device;
        let queue = &self.ctx.queue;
        let targets = self.targets.as_ref().ok_or(GpuError::NotReady)?;
        targets.source.upload_frame(queue, frame)?;

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("grade_encoder"),
        });

        let mut input = &targets.source;
        if let Some(warp) = &request.warp {
            queue.write_buffer(&self.warp_uniforms, 0, bytemuck::bytes_of(warp));
            let dst = if request.lut.is_some() {
                &targets.intermediate
            } else {
                &targets.output
            };
            let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("warp_bind_group"),
                layout: &self.warp_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: wgpu::BindingResource::TextureView(&input.view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::Sampler(&self.sampler),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: self.warp_uniforms.as_entire_binding(),
                    },
                ],
            });
            run_pass(&mut encoder, &self.warp_pipeline, &bind_group, &dst.view, "warp_pass");
            input = dst;
        }

        if let (Some(lut), Some((_, _, lut_texture))) = (request.lut, &self.lut) {
            let uniforms = GradeUniforms {
                lut_size: lut.size as u32,
                intensity: request.intensity.clamp(0.0, 1.0),
                _pad: [0.0; 2],
            };
            queue.write_buffer(&self.grade_uniforms, 0, bytemuck::bytes_of(&uniforms));
            let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("grade_bind_group"),
                layout: &self.grade_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: wgpu::BindingResource::TextureView(&input.view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::TextureView(&lut_texture.view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: self.grade_uniforms.as_entire_binding(),
                    },
                ],
            });
            run_pass(
                &mut encoder,
                &self.grade_pipeline,
                &bind_group,
                &targets.output.view,
                "grade_pass",
            );
            input = &targets.output;
        }

        encoder.copy_texture_to_buffer(
            wgpu::ImageCopyTexture {
                texture: &input.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::ImageCopyBuffer {
                buffer: &targets.readback,
                layout: wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(targets.padded_row),
                    rows_per_image: Some(frame.height),
                },
            },
            wgpu::Extent3d {
                width: frame.width,
                height: frame.height,
                depth_or_array_layers: 1,
            },
        );
        queue.submit(std::iter::once(encoder.finish()));

        let slice = targets.readback.slice(..);
        let (sender, receiver) = crossbeam_channel::bounded(1);
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });
        let _ = device.poll(wgpu::Maintain::Wait);
        receiver
            .recv()
            .map_err(|_| GpuError::Readback("map callback dropped".into()))?
            .map_err(|e| GpuError::Readback(e.to_string()))?;

        {
            let mapped = slice.get_mapped_range();
            unpad_rows(&mapped, targets.padded_row as usize, frame);
        }
        targets.readback.unmap();
        Ok(())
    }

    fn destroy(&mut self) {
        if let Some(targets) = self.targets.take() {
            targets.destroy();
        }
        if let Some((_, _, lut)) = self.lut.take() {
            lut.destroy();
        }
        self.warp_uniforms.destroy();
        self.grade_uniforms.destroy();
    }
}

/// GPU grading renderer with lazy, retried initialization and
/// context-loss recovery.
pub struct GpuRenderer {
    state: RendererState,
    backoff: InitBackoff,
    resources: Option<GpuResources>,
    dims: CachedDims,
    recoveries: u64,
}

impl GpuRenderer {
    /// Create an uninitialized renderer. The first `process` call attempts
    /// to acquire the GPU.
    pub fn new(config: &GpuConfig) -> Self {
        Self {
            state: RendererState::Uninitialized,
            backoff: InitBackoff::new(config.max_init_attempts, config.backoff_base()),
            resources: None,
            dims: CachedDims::default(),
            recoveries: 0,
        }
    }

    pub fn state(&self) -> RendererState {
        self.state
    }

    /// Adapter description once initialized.
    pub fn adapter_info(&self) -> Option<wgpu::AdapterInfo> {
        self.resources.as_ref().map(|r| r.ctx.adapter_info())
    }

    /// Number of times frame targets were (re)allocated.
    pub fn target_allocations(&self) -> u64 {
        self.dims.allocations()
    }

    /// Number of context-loss recoveries.
    pub fn recoveries(&self) -> u64 {
        self.recoveries
    }

    fn ensure_ready(&mut self, now: Instant) -> Result<(), GpuError> {
        match self.state {
            RendererState::Disabled | RendererState::Released => return Err(GpuError::Disabled),
            RendererState::Ready => {
                let lost = self.resources.as_ref().map_or(true, |r| r.ctx.is_lost());
                if !lost {
                    return Ok(());
                }
                let reason = self.resources.as_ref().and_then(|r| r.ctx.loss_reason());
                info!(reason = reason.as_deref().unwrap_or("unknown"), "GPU context lost; recreating resources");
                self.teardown();
                self.recoveries += 1;
                self.state = RendererState::Uninitialized;
            }
            RendererState::Uninitialized | RendererState::Retrying => {}
        }

        if !self.backoff.can_attempt(now) {
            return Err(GpuError::NotReady);
        }

        match GpuResources::create() {
            Ok(resources) => {
                info!(adapter = %resources.ctx.adapter_info().name, "GPU renderer ready");
                self.resources = Some(resources);
                self.backoff.record_success();
                self.state = RendererState::Ready;
                Ok(())
            }
            Err(e) => match self.backoff.record_failure(now) {
                Some(delay) => {
                    warn!(
                        attempt = self.backoff.failures(),
                        retry_in_ms = delay.as_millis() as u64,
                        error = %e,
                        "GPU initialization failed; will retry"
                    );
                    self.state = RendererState::Retrying;
                    Err(e)
                }
                None => {
                    warn!(error = %e, "GPU initialization failed; using software grading for this session");
                    self.state = RendererState::Disabled;
                    Err(e)
                }
            },
        }
    }

    /// Run the warp and grade passes on `frame` in place.
    pub fn process(
        &mut self,
        frame: &mut FrameBuffer,
        request: &GradeRequest<'_>,
        now: Instant,
    ) -> Result<(), GpuError> {
        self.ensure_ready(now)?;
        let resources = self.resources.as_mut().ok_or(GpuError::NotReady)?;
        let result = resources.render(&mut self.dims, frame, request);
        if let Err(e) = &result {
            if !matches!(e, GpuError::UnsupportedFrame(_)) {
                resources.ctx.mark_lost(e.to_string());
            }
        }
        result
    }

    fn teardown(&mut self) {
        if let Some(mut resources) = self.resources.take() {
            resources.destroy();
        }
        self.dims.reset();
    }

    /// Destroy every texture and buffer. Safe to call more than once.
    pub fn release(&mut self) {
        if self.state == RendererState::Released {
            return;
        }
        self.teardown();
        self.state = RendererState::Released;
        debug!("GPU renderer released");
    }
}

impl Drop for GpuRenderer {
    fn drop(&mut self) {
        self.release();
    }
}
