//! Learned perceptual-quality model.
//!
//! The pipeline only needs a single operation from the model, scoring one RGB
//! frame, so the model is abstracted behind [`QualityModel`]. The provided
//! implementation runs a HyperIQA-style regression network exported to ONNX,
//! with automatic execution provider selection:
//! - CUDA on Linux with NVIDIA GPU (when `cuda` feature enabled)
//! - CoreML on macOS
//! - CPU fallback on all platforms

use crate::{Error, Result};
use image::imageops::{self, FilterType};
use image::RgbImage;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::{Tensor, Value};
use rand::Rng;
use roadframe_core::CropMode;
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info};

/// ImageNet channel means used to normalize model input
const MEAN: [f32; 3] = [0.485, 0.456, 0.406];
/// ImageNet channel standard deviations
const STD: [f32; 3] = [0.229, 0.224, 0.225];

/// A pretrained model estimating human-perceived image quality.
///
/// Implementations must be safe to call from several threads; the ONNX
/// implementation serializes inference internally.
pub trait QualityModel: Send + Sync {
    /// Scores one frame; higher is better
    fn score(&self, image: &RgbImage) -> Result<f64>;
}

/// Input geometry of the perceptual model
#[derive(Debug, Clone)]
pub struct OnnxModelConfig {
    /// Width the frame is resized to before cropping
    pub resize_width: u32,
    /// Height the frame is resized to before cropping
    pub resize_height: u32,
    /// Side of the square crop fed to the network
    pub crop_size: u32,
    pub crop_mode: CropMode,
}

impl Default for OnnxModelConfig {
    fn default() -> Self {
        Self {
            resize_width: 384,
            resize_height: 512,
            crop_size: 224,
            crop_mode: CropMode::Random,
        }
    }
}

/// Perceptual quality model backed by ONNX Runtime
pub struct OnnxQualityModel {
    session: Mutex<Session>,
    output_name: String,
    config: OnnxModelConfig,
}

impl OnnxQualityModel {
    /// Loads the model weights from `model_path`.
    ///
    /// Fails with [`Error::ModelLoad`] if the file is missing or not a valid
    /// model.
    pub fn load(model_path: &Path, config: OnnxModelConfig) -> Result<Self> {
        if config.crop_size == 0
            || config.crop_size > config.resize_width
            || config.crop_size > config.resize_height
        {
            return Err(Error::InvalidInput(format!(
                "crop {} does not fit in {}x{}",
                config.crop_size, config.resize_width, config.resize_height
            )));
        }
        if !model_path.exists() {
            return Err(Error::model_load(model_path, "file not found"));
        }

        let session = create_session(model_path)?;
        let output_name = session
            .outputs
            .first()
            .map(|output| output.name.clone())
            .ok_or_else(|| Error::model_load(model_path, "model declares no outputs"))?;

        info!(
            model_path = %model_path.display(),
            crop_size = config.crop_size,
            crop_mode = ?config.crop_mode,
            "Perceptual quality model initialized"
        );

        Ok(Self {
            session: Mutex::new(session),
            output_name,
            config,
        })
    }

    /// Get the configuration.
    pub fn config(&self) -> &OnnxModelConfig {
        &self.config
    }

    /// Resize, crop and normalize a frame into NCHW tensor data
    fn preprocess(&self, image: &RgbImage) -> Result<Value> {
        if image.width() == 0 || image.height() == 0 {
            return Err(Error::InvalidInput("empty frame".into()));
        }

        let cfg = &self.config;
        let resized = imageops::resize(image, cfg.resize_width, cfg.resize_height, FilterType::Triangle);
        let (x, y) = crop_origin(
            cfg.crop_mode,
            (cfg.resize_width, cfg.resize_height),
            cfg.crop_size,
            &mut rand::rng(),
        );
        let crop = imageops::crop_imm(&resized, x, y, cfg.crop_size, cfg.crop_size).to_image();

        let side = cfg.crop_size as usize;
        let shape = vec![1usize, 3, side, side];
        Tensor::from_array((shape, normalize_chw(&crop).into_boxed_slice()))
            .map(Value::from)
            .map_err(|e| Error::inference(format!("Failed to create tensor: {e}")))
    }
}

impl QualityModel for OnnxQualityModel {
    fn score(&self, image: &RgbImage) -> Result<f64> {
        let input = self.preprocess(image)?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| Error::inference("Session lock poisoned"))?;

        let outputs = session
            .run(ort::inputs![input])
            .map_err(|e| Error::inference(format!("ONNX inference failed: {e}")))?;

        let output = outputs
            .get(self.output_name.as_str())
            .ok_or_else(|| Error::inference(format!("Missing {} tensor", self.output_name)))?;

        let (_, values) = output
            .try_extract_tensor::<f32>()
            .map_err(|e| Error::inference(format!("Failed to extract tensor: {e}")))?;

        let score = values
            .first()
            .copied()
            .ok_or_else(|| Error::inference("Model returned an empty tensor"))?;
        Ok(score as f64)
    }
}

/// Top-left corner of the model crop inside a `resized` frame
pub fn crop_origin<R: Rng + ?Sized>(
    mode: CropMode,
    resized: (u32, u32),
    crop_size: u32,
    rng: &mut R,
) -> (u32, u32) {
    let max_x = resized.0.saturating_sub(crop_size);
    let max_y = resized.1.saturating_sub(crop_size);
    match mode {
        CropMode::Center => (max_x / 2, max_y / 2),
        CropMode::Random => (rng.random_range(0..=max_x), rng.random_range(0..=max_y)),
    }
}

/// HWC `u8` → CHW `f32` with ImageNet normalization
pub fn normalize_chw(image: &RgbImage) -> Vec<f32> {
    let (w, h) = (image.width() as usize, image.height() as usize);
    let mut chw = Vec::with_capacity(3 * w * h);
    for c in 0..3 {
        for pixel in image.pixels() {
            chw.push((pixel[c] as f32 / 255.0 - MEAN[c]) / STD[c]);
        }
    }
    chw
}

/// Create ONNX Runtime session with automatic execution provider selection.
fn create_session(model_path: &Path) -> Result<Session> {
    let model_bytes =
        std::fs::read(model_path).map_err(|e| Error::model_load(model_path, e))?;

    let builder = Session::builder()
        .map_err(|e| Error::model_load(model_path, format!("session builder: {e}")))?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .map_err(|e| Error::model_load(model_path, format!("optimization level: {e}")))?;

    // Try CUDA on Linux with cuda feature
    #[cfg(all(target_os = "linux", feature = "cuda"))]
    {
        use ort::execution_providers::CUDAExecutionProvider;
        if let Ok(cuda_builder) = builder
            .clone()
            .with_execution_providers([CUDAExecutionProvider::default().build()])
        {
            if let Ok(session) = cuda_builder.commit_from_memory(&model_bytes) {
                info!("Using CUDA execution provider for quality model");
                return Ok(session);
            }
        }
        debug!("CUDA execution provider not available, trying alternatives");
    }

    // Try CoreML on macOS
    #[cfg(target_os = "macos")]
    {
        use ort::execution_providers::CoreMLExecutionProvider;
        if let Ok(coreml_builder) = builder
            .clone()
            .with_execution_providers([CoreMLExecutionProvider::default().build()])
        {
            if let Ok(session) = coreml_builder.commit_from_memory(&model_bytes) {
                info!("Using CoreML execution provider for quality model");
                return Ok(session);
            }
        }
        debug!("CoreML execution provider not available, using CPU");
    }

    debug!("Using CPU execution provider for quality model");
    builder
        .commit_from_memory(&model_bytes)
        .map_err(|e| Error::model_load(model_path, e))
}
