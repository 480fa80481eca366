//! Progress observers and ETA logging

use roadframe_core::ProgressEvent;
use std::time::{Duration, Instant};
use tracing::info;

/// Receives one event per completed clip, in increasing order
pub trait ProgressObserver {
    fn on_progress(&mut self, event: ProgressEvent);
}

impl<F> ProgressObserver for F
where
    F: FnMut(ProgressEvent),
{
    fn on_progress(&mut self, event: ProgressEvent) {
        self(event)
    }
}

/// Observer that ignores every event
impl ProgressObserver for () {
    fn on_progress(&mut self, _event: ProgressEvent) {}
}

/// Logs clip progress with elapsed time and ETA estimation
pub struct ProgressTracker {
    label: String,
    start_time: Instant,
}

impl ProgressTracker {
    /// Creates a new progress tracker; the clock starts now
    pub fn new(label: &str) -> Self {
        Self {
            label: label.to_string(),
            start_time: Instant::now(),
        }
    }

    /// Estimated time left, assuming the remaining clips take as long as the
    /// completed ones did on average
    pub fn eta(&self, event: ProgressEvent) -> Option<Duration> {
        estimate_remaining(self.start_time.elapsed(), event)
    }
}

impl ProgressObserver for ProgressTracker {
    fn on_progress(&mut self, event: ProgressEvent) {
        let elapsed = self.start_time.elapsed().as_secs_f64();

        if event.is_complete() {
            info!(
                completed = event.completed,
                total = event.total,
                "{} {}/{} (100.0%) - completed in {}",
                self.label,
                event.completed,
                event.total,
                format_duration(elapsed),
            );
        } else if let Some(eta) = self.eta(event) {
            info!(
                completed = event.completed,
                total = event.total,
                "{} {}/{} ({:.1}%) - elapsed: {} - ETA: {}",
                self.label,
                event.completed,
                event.total,
                event.percent(),
                format_duration(elapsed),
                format_duration(eta.as_secs_f64()),
            );
        }
    }
}

fn estimate_remaining(elapsed: Duration, event: ProgressEvent) -> Option<Duration> {
    if event.completed == 0 || event.completed >= event.total {
        return None;
    }
    let per_clip = elapsed.as_secs_f64() / event.completed as f64;
    let remaining = (event.total - event.completed) as f64 * per_clip;
    Some(Duration::from_secs_f64(remaining))
}

/// Formats seconds into a human-readable duration string
pub fn format_duration(secs: f64) -> String {
    if secs < 60.0 {
        format!("{:.1}s", secs)
    } else if secs < 3600.0 {
        let mins = (secs / 60.0).floor() as u64;
        let remaining = secs - (mins as f64 * 60.0);
        format!("{}m {:.0}s", mins, remaining)
    } else {
        let hours = (secs / 3600.0).floor() as u64;
        let remaining = secs - (hours as f64 * 3600.0);
        let mins = (remaining / 60.0).floor() as u64;
        let remaining_secs = remaining - (mins as f64 * 60.0);
        format!("{}h {}m {:.0}s", hours, mins, remaining_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(4.0), "4.0s");
        assert_eq!(format_duration(125.0), "2m 5s");
        assert_eq!(format_duration(3725.0), "1h 2m 5s");
    }

    #[test]
    fn test_estimate_remaining() {
        let eta = estimate_remaining(Duration::from_secs(10), ProgressEvent::new(2, 5)).unwrap();
        assert_eq!(eta, Duration::from_secs(15));
        assert!(estimate_remaining(Duration::from_secs(10), ProgressEvent::new(0, 5)).is_none());
        assert!(estimate_remaining(Duration::from_secs(10), ProgressEvent::new(5, 5)).is_none());
    }

    #[test]
    fn test_closure_observer() {
        let mut seen = Vec::new();
        {
            let mut observer = |event: ProgressEvent| seen.push(event.completed);
            let observer: &mut dyn ProgressObserver = &mut observer;
            observer.on_progress(ProgressEvent::new(1, 2));
            observer.on_progress(ProgressEvent::new(2, 2));
        }
        assert_eq!(seen, vec![1, 2]);
    }
}
