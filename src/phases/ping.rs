use std::time::Instant;

use reqwest::Client;
use tracing::debug;

use crate::config::EngineConfig;
use crate::error::PhaseError;
use crate::phases::cache_defeating_url;
use crate::state::RunHandle;

/// Measures round-trip latency with a short sequence of HEAD probes and
/// publishes the rounded mean. Any probe that fails ends the whole run: a
/// partial ping would misrepresent the link before the throughput phases
/// even start.
pub(crate) async fn probe_latency(
    client: &Client,
    config: &EngineConfig,
    run: &RunHandle,
) -> Result<(), PhaseError> {
    let mut rtts_ms = Vec::with_capacity(config.ping_probes);

    for probe in 0..config.ping_probes {
        if run.is_cancelled() {
            return Err(PhaseError::Cancelled);
        }

        let url = cache_defeating_url(&config.endpoint);
        let started = Instant::now();
        let request = client.head(url).send();

        tokio::select! {
            _ = run.cancelled() => return Err(PhaseError::Cancelled),
            response = request => {
                response.map_err(PhaseError::Transport)?;
            }
        }

        let rtt = started.elapsed();
        debug!(probe, rtt_ms = rtt.as_millis() as u64, "latency probe");
        rtts_ms.push(rtt.as_secs_f64() * 1000.0);
    }

    if !rtts_ms.is_empty() {
        run.update(|state| state.metrics.ping = mean_rtt_ms(&rtts_ms));
    }

    Ok(())
}

/// Arithmetic mean rounded to the nearest whole millisecond.
fn mean_rtt_ms(rtts_ms: &[f64]) -> f64 {
    (rtts_ms.iter().sum::<f64>() / rtts_ms.len() as f64).round()
}

#[cfg(test)]
mod tests {
    use super::mean_rtt_ms;

    #[test]
    fn mean_rtt_rounds_to_whole_milliseconds() {
        assert_eq!(mean_rtt_ms(&[50.0, 60.0, 70.0]), 60.0);
        assert_eq!(mean_rtt_ms(&[10.4, 10.4, 10.4]), 10.0);
        assert_eq!(mean_rtt_ms(&[10.5]), 11.0);
    }
}
