use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use reqwest::Client;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::error::{EngineError, PhaseError};
use crate::phases::{download, ping, upload};
use crate::state::{RunHandle, RunState, RunStatus, Snapshot};

/// Shown instead of the underlying error: transport detail rarely helps the
/// user and may leak proxy or endpoint internals.
const FAILURE_ADVICE: &str = "Speed test failed. This can be caused by a network issue, \
     a VPN or proxy, or a firewall. Check your connection and try again.";

/// The measurement engine. Owns the published run state and at most one
/// active run; a presentation layer drives it with [`SpeedTest::start`] and
/// [`SpeedTest::reset`] and polls [`SpeedTest::snapshot`] for everything it
/// renders.
pub struct SpeedTest {
    client: Client,
    config: EngineConfig,
    shared: Arc<Mutex<RunState>>,
    cancel: Mutex<CancellationToken>,
}

impl SpeedTest {
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(EngineError::Client)?;

        Ok(Self {
            client,
            config,
            shared: Arc::new(Mutex::new(RunState::default())),
            cancel: Mutex::new(CancellationToken::new()),
        })
    }

    /// Begins a fresh run, superseding any active one. Returns immediately;
    /// the run is observed through [`SpeedTest::snapshot`]. Must be called
    /// from within a tokio runtime.
    pub fn start(&self) {
        let run = self.supersede();
        info!(run_id = run.run_id(), "starting measurement run");

        let driver = Driver {
            client: self.client.clone(),
            config: self.config.clone(),
        };
        tokio::spawn(async move { driver.drive(run).await });
    }

    /// Cancels any active run and restores the zeroed idle state. Safe to
    /// call repeatedly.
    pub fn reset(&self) {
        self.supersede();
    }

    pub fn snapshot(&self) -> Snapshot {
        self.shared.lock().snapshot()
    }

    /// Cancels the current token, installs a fresh one, then bumps the run
    /// id and zeroes the shared state, in that order: the old run is dead
    /// before the new state exists, so its timers and callbacks can never
    /// interleave with the successor's.
    fn supersede(&self) -> RunHandle {
        let mut cancel = self.cancel.lock();
        cancel.cancel();
        *cancel = CancellationToken::new();
        let token = cancel.clone();
        drop(cancel);

        let mut state = self.shared.lock();
        state.run_id += 1;
        state.clear();
        RunHandle::new(Arc::clone(&self.shared), state.run_id, token)
    }
}

struct Driver {
    client: Client,
    config: EngineConfig,
}

impl Driver {
    /// Runs the three phases in order while ticking the progress bar, then
    /// settles the terminal state. The ticker lives inside this future, so
    /// no timer can outlive the run on any exit path.
    async fn drive(self, run: RunHandle) {
        let started = Instant::now();
        let budget_ms = self.config.total_budget().as_millis() as f64;
        let mut ticker = tokio::time::interval(self.config.progress_tick);

        let phases = self.run_phases(&run);
        tokio::pin!(phases);

        let outcome = loop {
            tokio::select! {
                outcome = &mut phases => break outcome,
                _ = ticker.tick() => {
                    let elapsed_ms = started.elapsed().as_millis() as f64;
                    let progress = (elapsed_ms / budget_ms * 100.0).min(100.0);
                    if !run.update(|state| state.progress = progress) {
                        break Err(PhaseError::Cancelled);
                    }
                }
            }
        };

        match outcome {
            Ok(()) => {
                let published = run.update(|state| {
                    state.status = RunStatus::Finished;
                    state.progress = 100.0;
                });
                if published {
                    info!(run_id = run.run_id(), "measurement run finished");
                }
            }
            // reset()/start() already put the shared state where it belongs.
            Err(PhaseError::Cancelled) => {
                debug!(run_id = run.run_id(), "measurement run cancelled");
            }
            Err(err) => {
                warn!(run_id = run.run_id(), error = %err, "measurement run failed");
                run.update(|state| {
                    state.status = RunStatus::Failed;
                    state.progress = 0.0;
                    state.error = Some(FAILURE_ADVICE.to_string());
                });
            }
        }
    }

    async fn run_phases(&self, run: &RunHandle) -> Result<(), PhaseError> {
        ping::probe_latency(&self.client, &self.config, run).await?;
        let final_download = download::measure(&self.client, &self.config, run).await?;
        upload::simulate(&self.config, run, final_download).await?;
        Ok(())
    }
}
