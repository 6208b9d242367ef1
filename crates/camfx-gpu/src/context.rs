//! GPU context management.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{info, warn};

use crate::error::GpuError;

/// GPU context holding device and queue.
///
/// The device-lost callback and the uncaptured-error handler both raise a
/// shared flag; the renderer checks it before every frame and rebuilds.
pub struct GpuContext {
    pub instance: wgpu::Instance,
    pub adapter: wgpu::Adapter,
    pub device: Arc<wgpu::Device>,
    pub queue: Arc<wgpu::Queue>,
    lost: Arc<AtomicBool>,
    loss_reason: Arc<Mutex<Option<String>>>,
}

impl GpuContext {
    /// Create a new GPU context.
    pub async fn new() -> Result<Self, GpuError> {
        #[cfg(target_os = "macos")]
        let backends = wgpu::Backends::METAL;
        #[cfg(not(target_os = "macos"))]
        let backends = wgpu::Backends::PRIMARY | wgpu::Backends::GL;

        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends,
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok_or(GpuError::NoAdapter)?;

        info!("Using GPU adapter: {:?}", adapter.get_info());

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("CamFX Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::downlevel_defaults()
                        .using_resolution(adapter.limits()),
                    memory_hints: wgpu::MemoryHints::Performance,
                },
                None,
            )
            .await
            .map_err(|e| GpuError::RequestDevice(e.to_string()))?;

        let lost = Arc::new(AtomicBool::new(false));
        let loss_reason = Arc::new(Mutex::new(None));

        let flag = Arc::clone(&lost);
        let reason_slot = Arc::clone(&loss_reason);
        device.set_device_lost_callback(move |reason, message| {
            warn!(?reason, %message, "GPU device lost");
            *reason_slot.lock() = Some(message);
            flag.store(true, Ordering::Release);
        });

        let flag = Arc::clone(&lost);
        let reason_slot = Arc::clone(&loss_reason);
        device.on_uncaptured_error(Box::new(move |err| {
            warn!(error = %err, "Uncaptured GPU error");
            *reason_slot.lock() = Some(err.to_string());
            flag.store(true, Ordering::Release);
        }));

        Ok(Self {
            instance,
            adapter,
            device: Arc::new(device),
            queue: Arc::new(queue),
            lost,
            loss_reason,
        })
    }

    /// Create a new GPU context (blocking version).
    pub fn new_blocking() -> Result<Self, GpuError> {
        pollster::block_on(Self::new())
    }

    /// Get adapter info.
    pub fn adapter_info(&self) -> wgpu::AdapterInfo {
        self.adapter.get_info()
    }

    /// Whether the device was lost or reported an uncaptured error.
    pub fn is_lost(&self) -> bool {
        self.lost.load(Ordering::Acquire)
    }

    /// Flag the context as lost, e.g. after a failed submission.
    pub fn mark_lost(&self, reason: impl Into<String>) {
        *self.loss_reason.lock() = Some(reason.into());
        self.lost.store(true, Ordering::Release);
    }

    /// Message attached to the most recent loss.
    pub fn loss_reason(&self) -> Option<String> {
        self.loss_reason.lock().clone()
    }
}
