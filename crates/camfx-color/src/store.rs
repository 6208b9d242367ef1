//! Cache of generated LUTs and the most recent warp uniforms.

use std::collections::HashMap;
use std::sync::Arc;

use camfx_core::{FaceLandmarks, LutId};
use tracing::debug;

use crate::error::ColorError;
use crate::lut::{LutData, PackedLut, MAX_LUT_SIZE, MIN_LUT_SIZE};
use crate::presets::generate_preset;
use crate::warp::{WarpStrengths, WarpUniforms};

/// Default LUT edge length used by the renderer.
pub const DEFAULT_LUT_SIZE: usize = 32;

/// Generates cinematic LUTs on first use and keeps them for the session.
#[derive(Debug, Default)]
pub struct LutStore {
    presets: HashMap<(LutId, usize), Arc<LutData>>,
    packed: HashMap<(LutId, usize), Arc<PackedLut>>,
    custom: HashMap<String, Arc<LutData>>,
    last_warp: Option<(FaceLandmarks, [u32; 4], u32, Option<WarpUniforms>)>,
    generated: usize,
}

impl LutStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Preset LUT for `id` at edge length `size`, generated on first request.
    pub fn get(&mut self, id: LutId, size: usize) -> Arc<LutData> {
        let size = size.clamp(MIN_LUT_SIZE, MAX_LUT_SIZE);
        if let Some(lut) = self.presets.get(&(id, size)) {
            return Arc::clone(lut);
        }
        let lut = Arc::new(generate_preset(id, size));
        self.generated += 1;
        debug!(lut = %lut.name, size, "Generated LUT");
        self.presets.insert((id, size), Arc::clone(&lut));
        lut
    }

    /// Packed texture data for a preset, cached alongside the cube.
    pub fn packed(&mut self, id: LutId, size: usize) -> Arc<PackedLut> {
        let size = size.clamp(MIN_LUT_SIZE, MAX_LUT_SIZE);
        if let Some(p) = self.packed.get(&(id, size)) {
            return Arc::clone(p);
        }
        let packed = Arc::new(self.get(id, size).pack_2d());
        self.packed.insert((id, size), Arc::clone(&packed));
        packed
    }

    /// Parse and register a user `.cube` LUT under `name`.
    pub fn load_cube(&mut self, name: &str, content: &str) -> Result<Arc<LutData>, ColorError> {
        let lut = Arc::new(LutData::from_cube(name, content)?);
        debug!(lut = name, size = lut.size, "Loaded .cube LUT");
        self.custom.insert(name.to_string(), Arc::clone(&lut));
        Ok(lut)
    }

    pub fn custom(&self, name: &str) -> Option<Arc<LutData>> {
        self.custom.get(name).cloned()
    }

    /// Number of preset LUTs generated so far.
    pub fn generated_count(&self) -> usize {
        self.generated
    }

    /// Warp uniforms for the given landmarks, reusing the previous result
    /// when nothing changed.
    pub fn warp_uniforms(
        &mut self,
        landmarks: &FaceLandmarks,
        strengths: &WarpStrengths,
        aspect: f32,
    ) -> Option<WarpUniforms> {
        let key = [
            strengths.eye_enlarge.to_bits(),
            strengths.face_slim.to_bits(),
            strengths.nose_slim.to_bits(),
            strengths.mouth_scale.to_bits(),
        ];
        if let Some((lm, k, a, uniforms)) = &self.last_warp {
            if lm == landmarks && *k == key && *a == aspect.to_bits() {
                return *uniforms;
            }
        }
        let uniforms = WarpUniforms::from_landmarks(landmarks, strengths, aspect);
        self.last_warp = Some((*landmarks, key, aspect.to_bits(), uniforms));
        uniforms
    }

    /// Drop every cached entry.
    pub fn clear(&mut self) {
        self.presets.clear();
        self.packed.clear();
        self.custom.clear();
        self.last_warp = None;
    }
}
