//! Per-survey staging layout

use crate::PipelineConfig;
use std::path::{Path, PathBuf};

/// Directory layout of one survey inside a workspace root.
///
/// Each survey gets its own `clips/<survey>`, `frames/<survey>` and
/// `selected/<survey>` directories so runs never share staging storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SurveyLayout {
    pub root: PathBuf,
    pub survey: String,
}

impl SurveyLayout {
    pub fn new(root: impl Into<PathBuf>, survey: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            survey: survey.into(),
        }
    }

    pub fn clips_dir(&self) -> PathBuf {
        self.root.join("clips").join(&self.survey)
    }

    pub fn frames_dir(&self) -> PathBuf {
        self.root.join("frames").join(&self.survey)
    }

    pub fn output_dir(&self) -> PathBuf {
        self.root.join("selected").join(&self.survey)
    }

    /// Builds a pipeline configuration rooted in this layout
    pub fn config(&self, video_path: &Path, model_path: &Path) -> PipelineConfig {
        PipelineConfig::new(
            video_path,
            self.clips_dir(),
            self.frames_dir(),
            self.output_dir(),
            model_path,
        )
    }
}
