use std::time::{Duration, Instant};

use futures::StreamExt;
use reqwest::Client;
use tracing::debug;

use crate::config::EngineConfig;
use crate::error::PhaseError;
use crate::phases::cache_defeating_url;
use crate::state::{RunHandle, RunStatus};

/// Streams the endpoint's payload for a fixed wall-clock window, reporting
/// cumulative throughput after every chunk. The sample cadence therefore
/// follows network chunking, not a timer. Returns the last computed speed
/// (0 if no data arrived), which the upload simulator holds constant on its
/// own ticks.
pub(crate) async fn measure(
    client: &Client,
    config: &EngineConfig,
    run: &RunHandle,
) -> Result<f64, PhaseError> {
    if !run.set_status(RunStatus::MeasuringDownload) {
        return Err(PhaseError::Cancelled);
    }

    let url = cache_defeating_url(&config.endpoint);
    let request = client.get(url).send();

    let response = tokio::select! {
        _ = run.cancelled() => return Err(PhaseError::Cancelled),
        response = request => response.map_err(PhaseError::Transport)?,
    };
    let response = response.error_for_status().map_err(PhaseError::Body)?;

    let mut stream = response.bytes_stream();
    let started = Instant::now();
    let deadline = tokio::time::Instant::now() + config.download_window;
    let mut received_bytes: u64 = 0;
    let mut last_speed = 0.0;

    // Dropping the stream on any exit path aborts the underlying transfer.
    loop {
        let next = tokio::select! {
            _ = run.cancelled() => return Err(PhaseError::Cancelled),
            _ = tokio::time::sleep_until(deadline) => break,
            next = stream.next() => next,
        };

        let chunk = match next {
            Some(Ok(chunk)) => chunk,
            Some(Err(err)) => return Err(PhaseError::Body(err)),
            None => break,
        };

        let elapsed = started.elapsed();
        if elapsed >= config.download_window {
            break;
        }

        received_bytes += chunk.len() as u64;
        let speed = throughput_mbps(received_bytes, elapsed);
        last_speed = speed;

        if !run.update(|state| {
            state.metrics.download = speed;
            state.push_sample(speed, 0.0);
        }) {
            return Err(PhaseError::Cancelled);
        }
    }

    debug!(received_bytes, final_mbps = last_speed, "download window closed");
    Ok(last_speed)
}

/// Cumulative bits over elapsed seconds, in megabits per second.
pub(crate) fn throughput_mbps(received_bytes: u64, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs <= 0.0 {
        return 0.0;
    }
    (received_bytes as f64 / secs) * 8.0 / 1_000_000.0
}

#[cfg(test)]
mod tests {
    use super::throughput_mbps;
    use std::time::Duration;

    #[test]
    fn throughput_formula() {
        let mbps = throughput_mbps(1_250_000, Duration::from_millis(1000));
        assert!((mbps - 10.0).abs() < 1e-9);

        let mbps = throughput_mbps(1_250_000, Duration::from_millis(500));
        assert!((mbps - 20.0).abs() < 1e-9);
    }

    #[test]
    fn zero_elapsed_reports_zero() {
        assert_eq!(throughput_mbps(1_000_000, Duration::ZERO), 0.0);
        assert_eq!(throughput_mbps(0, Duration::from_secs(1)), 0.0);
    }
}
