//! Background execution with an event stream

use crate::{Orchestrator, RunSummary};
use roadframe_core::ProgressEvent;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Notification from a background pipeline run.
///
/// A run emits zero or more `Progress` events with strictly increasing
/// `completed`, then exactly one `Completed` or `Failed`.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    Progress(ProgressEvent),
    Completed(RunSummary),
    /// Human-readable description of the fatal error
    Failed(String),
}

impl PipelineEvent {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PipelineEvent::Progress(_))
    }
}

/// Handle to a pipeline running on a blocking worker thread
pub struct PipelineHandle {
    events: mpsc::UnboundedReceiver<PipelineEvent>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Starts `orchestrator` on Tokio's blocking pool and returns immediately.
///
/// Must be called from within a Tokio runtime.
pub fn spawn_pipeline(orchestrator: Arc<Orchestrator>) -> PipelineHandle {
    let (tx, rx) = mpsc::unbounded_channel();
    let cancel = CancellationToken::new();
    let worker_cancel = cancel.clone();

    let task = tokio::task::spawn_blocking(move || {
        let progress_tx = tx.clone();
        let mut forward = move |event: ProgressEvent| {
            // The receiver may already be gone; the run still completes
            let _ = progress_tx.send(PipelineEvent::Progress(event));
        };

        let terminal = match orchestrator.run(&mut forward, &worker_cancel) {
            Ok(summary) => {
                info!(selected = summary.selected.len(), "Background pipeline finished");
                PipelineEvent::Completed(summary)
            }
            Err(e) => {
                error!(error = %e, "Background pipeline failed");
                PipelineEvent::Failed(e.to_string())
            }
        };
        let _ = tx.send(terminal);
    });

    PipelineHandle {
        events: rx,
        cancel,
        task,
    }
}

impl PipelineHandle {
    /// Next event, or `None` once the terminal event has been consumed
    pub async fn next_event(&mut self) -> Option<PipelineEvent> {
        self.events.recv().await
    }

    /// Requests cooperative cancellation; the run stops at the next clip
    /// boundary and reports `Failed`
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Discards remaining progress and resolves to the run outcome
    pub async fn wait(mut self) -> Result<RunSummary, String> {
        while let Some(event) = self.events.recv().await {
            match event {
                PipelineEvent::Progress(_) => {}
                PipelineEvent::Completed(summary) => return Ok(summary),
                PipelineEvent::Failed(message) => return Err(message),
            }
        }
        match self.task.await {
            Ok(()) => Err("pipeline worker exited without a result".to_string()),
            Err(e) => Err(format!("pipeline worker panicked: {e}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;
    use roadframe_core::PipelineConfig;
    use roadframe_quality::{QualityModel, QualityScorer};
    use std::path::Path;

    struct FlatModel;

    impl QualityModel for FlatModel {
        fn score(&self, _image: &RgbImage) -> roadframe_quality::Result<f64> {
            Ok(1.0)
        }
    }

    fn orchestrator(root: &Path) -> Arc<Orchestrator> {
        let config = PipelineConfig::new(
            root.join("missing.avi"),
            root.join("clips"),
            root.join("frames"),
            root.join("out"),
            root.join("model.onnx"),
        );
        Arc::new(Orchestrator::new(config, QualityScorer::new(Arc::new(FlatModel))))
    }

    #[tokio::test]
    async fn test_failure_is_reported_as_terminal_event() {
        let tmp = tempfile::tempdir().unwrap();
        let mut handle = spawn_pipeline(orchestrator(tmp.path()));

        let event = handle.next_event().await.unwrap();
        assert!(event.is_terminal());
        match event {
            PipelineEvent::Failed(message) => assert!(message.contains("missing.avi")),
            other => panic!("unexpected event {other:?}"),
        }
        assert!(handle.next_event().await.is_none());
    }

    #[tokio::test]
    async fn test_wait_returns_error_message() {
        let tmp = tempfile::tempdir().unwrap();
        let handle = spawn_pipeline(orchestrator(tmp.path()));
        assert!(handle.wait().await.is_err());
    }
}
