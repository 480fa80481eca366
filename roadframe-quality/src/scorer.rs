//! Composite frame quality scoring

use crate::metrics::{laplacian_variance, rms_contrast, shannon_entropy};
use crate::{Error, QualityModel, Result};
use image::{imageops, RgbImage};
use roadframe_core::config::DEFAULT_PERCEPTUAL_PASSES;
use roadframe_core::QualityWeights;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Sub-metric values of one frame and their weighted combination
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QualityBreakdown {
    pub sharpness: f64,
    pub contrast: f64,
    pub entropy: f64,
    /// Mean of the perceptual model passes
    pub perceptual: f64,
    pub composite: f64,
}

/// Scores frames with fixed weights and a shared perceptual model
#[derive(Clone)]
pub struct QualityScorer {
    model: Arc<dyn QualityModel>,
    weights: QualityWeights,
    perceptual_passes: u32,
}

impl QualityScorer {
    /// Creates a scorer with the default weights and two perceptual passes
    pub fn new(model: Arc<dyn QualityModel>) -> Self {
        Self {
            model,
            weights: QualityWeights::default(),
            perceptual_passes: DEFAULT_PERCEPTUAL_PASSES,
        }
    }

    pub fn with_weights(mut self, weights: QualityWeights) -> Result<Self> {
        weights.validate()?;
        self.weights = weights;
        Ok(self)
    }

    /// Number of perceptual model invocations averaged per frame
    pub fn with_perceptual_passes(mut self, passes: u32) -> Result<Self> {
        if passes == 0 {
            return Err(Error::InvalidInput("perceptual passes must be at least 1".into()));
        }
        self.perceptual_passes = passes;
        Ok(self)
    }

    pub fn weights(&self) -> &QualityWeights {
        &self.weights
    }

    pub fn perceptual_passes(&self) -> u32 {
        self.perceptual_passes
    }

    /// Scores a decoded frame.
    ///
    /// Structural metrics use the luma channel; the model sees the color
    /// frame. With random crops the perceptual term, and thus the composite,
    /// varies slightly between calls on the same frame.
    pub fn score_image(&self, image: &RgbImage) -> Result<QualityBreakdown> {
        if image.width() == 0 || image.height() == 0 {
            return Err(Error::InvalidInput("empty frame".into()));
        }

        let gray = imageops::grayscale(image);
        let sharpness = laplacian_variance(&gray);
        let contrast = rms_contrast(&gray);
        let entropy = shannon_entropy(&gray);

        let mut perceptual_sum = 0.0;
        for _ in 0..self.perceptual_passes {
            perceptual_sum += self.model.score(image)?;
        }
        let perceptual = perceptual_sum / self.perceptual_passes as f64;
        if !perceptual.is_finite() {
            return Err(Error::inference(format!("non-finite model output {perceptual}")));
        }

        let w = &self.weights;
        let composite = w.sharpness * sharpness
            + w.contrast * contrast
            + w.entropy * entropy
            + w.perceptual * perceptual;

        Ok(QualityBreakdown {
            sharpness,
            contrast,
            entropy,
            perceptual,
            composite,
        })
    }

    /// Loads and scores an image file
    pub fn breakdown_path(&self, path: &Path) -> Result<QualityBreakdown> {
        let image = image::open(path)?.to_rgb8();
        self.score_image(&image)
    }

    /// Composite score of an image file.
    ///
    /// Any failure disqualifies the frame: the result is negative infinity.
    pub fn score_path(&self, path: &Path) -> f64 {
        match self.breakdown_path(path) {
            Ok(breakdown) => {
                debug!(
                    frame = %path.display(),
                    sharpness = breakdown.sharpness,
                    contrast = breakdown.contrast,
                    entropy = breakdown.entropy,
                    perceptual = breakdown.perceptual,
                    composite = breakdown.composite,
                    "Frame scored"
                );
                breakdown.composite
            }
            Err(e) => {
                debug!(frame = %path.display(), error = %e, "Frame could not be scored");
                f64::NEG_INFINITY
            }
        }
    }
}

impl std::fmt::Debug for QualityScorer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QualityScorer")
            .field("weights", &self.weights)
            .field("perceptual_passes", &self.perceptual_passes)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct ConstantModel(f64);

    impl QualityModel for ConstantModel {
        fn score(&self, _image: &RgbImage) -> Result<f64> {
            Ok(self.0)
        }
    }

    /// Returns 1, 3, 5, ... on successive calls
    struct CountingModel(AtomicU32);

    impl QualityModel for CountingModel {
        fn score(&self, _image: &RgbImage) -> Result<f64> {
            let n = self.0.fetch_add(1, Ordering::SeqCst);
            Ok(2.0 * n as f64 + 1.0)
        }
    }

    struct FailingModel;

    impl QualityModel for FailingModel {
        fn score(&self, _image: &RgbImage) -> Result<f64> {
            Err(Error::inference("model unavailable"))
        }
    }

    fn road_texture() -> RgbImage {
        RgbImage::from_fn(96, 64, |x, y| {
            let v = ((x * 37 + y * 91) % 7 * 36) as u8;
            Rgb([v, v.wrapping_add(40), 255 - v])
        })
    }

    fn scorer(model: impl QualityModel + 'static) -> QualityScorer {
        QualityScorer::new(Arc::new(model))
    }

    #[test]
    fn test_sharp_frame_scores_higher_than_blurred() {
        let scorer = scorer(ConstantModel(50.0));
        let sharp = road_texture();
        let blurred = imageops::blur(&sharp, 2.5);

        let a = scorer.score_image(&sharp).unwrap();
        let b = scorer.score_image(&blurred).unwrap();
        assert!(a.sharpness > b.sharpness);
        assert!(a.composite >= b.composite);
    }

    #[test]
    fn test_perceptual_passes_are_averaged() {
        let scorer = scorer(CountingModel(AtomicU32::new(0)));
        let breakdown = scorer.score_image(&road_texture()).unwrap();
        // (1 + 3) / 2
        assert!((breakdown.perceptual - 2.0).abs() < 1e-12);

        let scorer = scorer.with_perceptual_passes(3).unwrap();
        let breakdown = scorer.score_image(&road_texture()).unwrap();
        // (5 + 7 + 9) / 3
        assert!((breakdown.perceptual - 7.0).abs() < 1e-12);
    }

    #[test]
    fn test_composite_is_weighted_sum() {
        let scorer = scorer(ConstantModel(40.0));
        let b = scorer.score_image(&road_texture()).unwrap();
        let expected = 0.3 * b.sharpness + 0.2 * b.contrast + 0.2 * b.entropy + 0.3 * 40.0;
        assert!((b.composite - expected).abs() < 1e-9);
    }

    #[test]
    fn test_custom_weights() {
        let perceptual_only = QualityWeights {
            sharpness: 0.0,
            contrast: 0.0,
            entropy: 0.0,
            perceptual: 1.0,
        };
        let scorer = scorer(ConstantModel(12.5)).with_weights(perceptual_only).unwrap();
        let b = scorer.score_image(&road_texture()).unwrap();
        assert!((b.composite - 12.5).abs() < 1e-12);

        let unbalanced = QualityWeights {
            perceptual: 0.9,
            ..QualityWeights::default()
        };
        assert!(matches!(
            QualityScorer::new(Arc::new(ConstantModel(0.0))).with_weights(unbalanced),
            Err(Error::Core(_))
        ));
    }

    #[test]
    fn test_unreadable_frame_scores_negative_infinity() {
        let tmp = tempfile::tempdir().unwrap();
        let garbage = tmp.path().join("frame0000.jpg");
        std::fs::write(&garbage, b"\xff\xd8 truncated").unwrap();

        let scorer = scorer(ConstantModel(1.0));
        assert_eq!(scorer.score_path(&garbage), f64::NEG_INFINITY);
        assert_eq!(scorer.score_path(&tmp.path().join("missing.jpg")), f64::NEG_INFINITY);
    }

    #[test]
    fn test_model_failure_disqualifies_frame() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("frame0000.png");
        road_texture().save(&path).unwrap();

        assert_eq!(scorer(FailingModel).score_path(&path), f64::NEG_INFINITY);
        assert!(scorer(ConstantModel(1.0)).score_path(&path).is_finite());
    }

    #[test]
    fn test_zero_passes_rejected() {
        assert!(scorer(ConstantModel(1.0)).with_perceptual_passes(0).is_err());
    }
}
