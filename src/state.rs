use std::sync::Arc;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

/// Where a run currently is. The latency probe runs under the previous
/// status (`Idle` on a fresh run) since it finishes in well under a second.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunStatus {
    #[default]
    Idle,
    MeasuringDownload,
    MeasuringUpload,
    Finished,
    Failed,
}

/// One charted data point. Exactly one of `download`/`upload` is meaningful
/// per sample; the other direction is reported as 0 for that tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    /// Index assigned at append time, contiguous from 0 within a run.
    pub sequence: usize,
    pub download: f64,
    pub upload: f64,
}

/// Latest known values: throughput in Mbps, ping in whole milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LiveMetrics {
    pub download: f64,
    pub upload: f64,
    pub ping: f64,
}

/// Read-only view of the engine's published state, safe to hand to a
/// presentation layer.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub status: RunStatus,
    pub samples: Vec<Sample>,
    pub metrics: LiveMetrics,
    pub progress: f64,
    pub error: Option<String>,
}

/// State owned by the currently active run.
#[derive(Debug, Default)]
pub(crate) struct RunState {
    pub run_id: u64,
    pub status: RunStatus,
    pub samples: Vec<Sample>,
    pub metrics: LiveMetrics,
    pub progress: f64,
    pub error: Option<String>,
}

impl RunState {
    /// Zeroes everything except the run id.
    pub fn clear(&mut self) {
        self.status = RunStatus::Idle;
        self.samples.clear();
        self.metrics = LiveMetrics::default();
        self.progress = 0.0;
        self.error = None;
    }

    /// Appends a sample with the next contiguous sequence number.
    pub fn push_sample(&mut self, download: f64, upload: f64) {
        let sequence = self.samples.len();
        self.samples.push(Sample {
            sequence,
            download,
            upload,
        });
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            status: self.status,
            samples: self.samples.clone(),
            metrics: self.metrics,
            progress: self.progress,
            error: self.error.clone(),
        }
    }
}

/// Handle held by one run's driver task. Carries the run's cancellation
/// token and the run id that guards every mutation: once a newer run has
/// bumped the shared id, updates through a stale handle are dropped, so a
/// superseded run can never write into its successor's state.
#[derive(Clone)]
pub(crate) struct RunHandle {
    shared: Arc<Mutex<RunState>>,
    run_id: u64,
    cancel: CancellationToken,
}

impl RunHandle {
    pub fn new(shared: Arc<Mutex<RunState>>, run_id: u64, cancel: CancellationToken) -> Self {
        Self {
            shared,
            run_id,
            cancel,
        }
    }

    pub fn run_id(&self) -> u64 {
        self.run_id
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolves when this run is cancelled or superseded.
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await
    }

    /// Applies `f` to the shared state if this handle's run is still the
    /// active one. Returns false, without running `f`, when superseded.
    pub fn update<F: FnOnce(&mut RunState)>(&self, f: F) -> bool {
        let mut state = self.shared.lock();
        if state.run_id != self.run_id {
            return false;
        }
        f(&mut state);
        true
    }

    pub fn set_status(&self, status: RunStatus) -> bool {
        self.update(|state| state.status = status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle_pair() -> (Arc<Mutex<RunState>>, RunHandle) {
        let shared = Arc::new(Mutex::new(RunState::default()));
        let handle = RunHandle::new(Arc::clone(&shared), 0, CancellationToken::new());
        (shared, handle)
    }

    #[test]
    fn samples_get_contiguous_sequence_numbers() {
        let (shared, handle) = handle_pair();
        for i in 0..5 {
            assert!(handle.update(|state| state.push_sample(i as f64, 0.0)));
        }

        let state = shared.lock();
        let sequences: Vec<_> = state.samples.iter().map(|s| s.sequence).collect();
        assert_eq!(sequences, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn stale_handle_cannot_mutate_state() {
        let (shared, handle) = handle_pair();
        shared.lock().run_id += 1; // a newer run took over

        assert!(!handle.update(|state| state.push_sample(1.0, 0.0)));
        assert!(shared.lock().samples.is_empty());
    }

    #[test]
    fn clear_is_idempotent() {
        let mut state = RunState::default();
        state.status = RunStatus::Failed;
        state.push_sample(12.0, 0.0);
        state.metrics.ping = 20.0;
        state.progress = 40.0;
        state.error = Some("boom".into());

        state.clear();
        let once = state.snapshot();
        state.clear();

        assert_eq!(once, state.snapshot());
        assert_eq!(once.status, RunStatus::Idle);
        assert!(once.samples.is_empty());
        assert_eq!(once.metrics, LiveMetrics::default());
        assert_eq!(once.progress, 0.0);
        assert!(once.error.is_none());
    }
}
