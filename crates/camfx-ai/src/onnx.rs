//! ONNX Runtime person segmentation.
//!
//! Runs a selfie-segmentation model (NHWC float input, single-channel
//! probability output). Gated behind the `onnx` feature.

use std::path::{Path, PathBuf};

use camfx_core::{FrameBuffer, PixelFormat};
use ndarray::Array4;
use tracing::info;

use crate::backend::{InferenceOutput, SegmentationBackend};
use crate::error::{AiError, AiResult};
use crate::mask::MaskBuffer;

/// File name looked up in the models directory.
pub const SEGMENTATION_MODEL_FILE: &str = "selfie_segmentation.onnx";

const INPUT_SIZE: u32 = 256;

pub struct OnnxSegmenter {
    model_path: PathBuf,
    intra_threads: usize,
    session: Option<ort::session::Session>,
}

impl OnnxSegmenter {
    pub fn new(model_path: impl Into<PathBuf>) -> Self {
        Self {
            model_path: model_path.into(),
            intra_threads: 2,
            session: None,
        }
    }

    /// Segmenter for the default model file inside `models_dir`.
    pub fn from_models_dir(models_dir: &Path) -> Self {
        Self::new(models_dir.join(SEGMENTATION_MODEL_FILE))
    }

    pub fn with_intra_threads(mut self, threads: usize) -> Self {
        self.intra_threads = threads.max(1);
        self
    }

    pub fn model_path(&self) -> &Path {
        &self.model_path
    }

    /// Nearest-neighbour resize into a `1×S×S×3` tensor in 0–1.
    fn preprocess_nhwc(frame: &FrameBuffer) -> Vec<f32> {
        let size = INPUT_SIZE;
        let mut output = vec![0.0f32; (size * size * 3) as usize];
        let x_ratio = frame.width as f32 / size as f32;
        let y_ratio = frame.height as f32 / size as f32;

        for y in 0..size {
            for x in 0..size {
                let p = frame.pixel((x as f32 * x_ratio) as u32, (y as f32 * y_ratio) as u32);
                let out = ((y * size + x) * 3) as usize;
                output[out] = p[0] as f32 / 255.0;
                output[out + 1] = p[1] as f32 / 255.0;
                output[out + 2] = p[2] as f32 / 255.0;
            }
        }
        output
    }
}

impl SegmentationBackend for OnnxSegmenter {
    fn name(&self) -> &str {
        "onnx-selfie"
    }

    fn initialize(&mut self) -> AiResult<()> {
        if self.session.is_some() {
            return Ok(());
        }
        if !self.model_path.exists() {
            return Err(AiError::ModelNotFound {
                path: self.model_path.clone(),
            });
        }

        let session = ort::session::Session::builder()
            .map_err(|e| AiError::Onnx(format!("session builder: {e}")))?
            .with_intra_threads(self.intra_threads)
            .map_err(|e| AiError::Onnx(format!("intra threads: {e}")))?
            .commit_from_file(&self.model_path)
            .map_err(|e| AiError::Onnx(format!("load {}: {e}", self.model_path.display())))?;

        info!(path = %self.model_path.display(), "Loaded segmentation model");
        self.session = Some(session);
        Ok(())
    }

    fn infer(&mut self, frame: &FrameBuffer) -> AiResult<InferenceOutput> {
        let session = self.session.as_mut().ok_or(AiError::ModelNotLoaded)?;
        if frame.format != PixelFormat::Rgba8 || frame.width == 0 || frame.height == 0 {
            return Err(AiError::PreprocessError(
                "segmentation needs a non-empty RGBA8 frame".into(),
            ));
        }

        let input = Array4::from_shape_vec(
            (1, INPUT_SIZE as usize, INPUT_SIZE as usize, 3),
            Self::preprocess_nhwc(frame),
        )
        .map_err(|e| AiError::PreprocessError(e.to_string()))?;
        let tensor =
            ort::value::Tensor::from_array(input).map_err(|e| AiError::Onnx(e.to_string()))?;

        let outputs = session
            .run(ort::inputs![tensor])
            .map_err(|e| AiError::Inference(e.to_string()))?;
        let output = outputs
            .iter()
            .next()
            .ok_or_else(|| AiError::Inference("model produced no output".into()))?;
        let (_shape, data) = output
            .1
            .try_extract_tensor::<f32>()
            .map_err(|e| AiError::Onnx(e.to_string()))?;

        let expected = (INPUT_SIZE * INPUT_SIZE) as usize;
        if data.len() < expected {
            return Err(AiError::Inference(format!(
                "mask has {} values, expected {expected}",
                data.len()
            )));
        }
        let bytes = data[..expected]
            .iter()
            .map(|v| (v.clamp(0.0, 1.0) * 255.0).round() as u8)
            .collect();
        let mask = MaskBuffer::from_data(INPUT_SIZE, INPUT_SIZE, bytes)?;

        Ok(InferenceOutput {
            mask,
            landmarks: None,
        })
    }

    fn dispose(&mut self) {
        self.session = None;
    }
}
