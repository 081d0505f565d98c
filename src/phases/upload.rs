use std::time::Instant;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::config::EngineConfig;
use crate::error::PhaseError;
use crate::state::{RunHandle, RunStatus};

/// Synthesizes the upload phase. There is no upstream endpoint to push real
/// bytes at, so this emits a plausibly fluctuating rate on a fixed cadence
/// while holding the measured download speed steady in the live metrics.
/// The phase cannot fail; it only completes or gets cancelled.
pub(crate) async fn simulate(
    config: &EngineConfig,
    run: &RunHandle,
    final_download: f64,
) -> Result<(), PhaseError> {
    if !run.set_status(RunStatus::MeasuringUpload) {
        return Err(PhaseError::Cancelled);
    }

    let started = Instant::now();
    let mut ticks = tokio::time::interval_at(
        tokio::time::Instant::now() + config.upload_cadence,
        config.upload_cadence,
    );
    let mut rng = StdRng::from_entropy();

    loop {
        tokio::select! {
            _ = run.cancelled() => return Err(PhaseError::Cancelled),
            _ = ticks.tick() => {}
        }

        if started.elapsed() >= config.upload_window {
            break;
        }

        let upload = fluctuating_value(&mut rng, config.upload_base, config.upload_fluctuation);
        if !run.update(|state| {
            state.metrics.download = final_download;
            state.metrics.upload = upload;
            state.push_sample(0.0, upload);
        }) {
            return Err(PhaseError::Cancelled);
        }
    }

    debug!(final_download_mbps = final_download, "upload window closed");
    Ok(())
}

/// `base` plus uniform noise in `[-fluctuation/2, fluctuation/2]`, floored
/// at zero.
fn fluctuating_value(rng: &mut impl Rng, base: f64, fluctuation: f64) -> f64 {
    (base + (rng.gen::<f64>() - 0.5) * fluctuation).max(0.0)
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::fluctuating_value;

    #[test]
    fn fluctuating_values_stay_within_bounds() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..1000 {
            let value = fluctuating_value(&mut rng, 45.0, 20.0);
            assert!((0.0..=55.0).contains(&value), "out of range: {value}");
        }
    }

    #[test]
    fn deep_fluctuation_is_floored_at_zero() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..1000 {
            assert!(fluctuating_value(&mut rng, 1.0, 40.0) >= 0.0);
        }
    }
}
