use std::time::Duration;

use reqwest::Url;

/// A large public payload; the byte-count parameter keeps the stream alive
/// for the whole download window even on fast links.
const DEFAULT_ENDPOINT: &str = "https://speed.cloudflare.com/__down?bytes=50000000";

/// Measurement parameters. These are fixed for the lifetime of an engine;
/// the defaults are the production values and tests construct configs with
/// shortened windows.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Endpoint answering HEAD probes and serving the streamed download.
    pub endpoint: Url,
    pub ping_probes: usize,
    pub download_window: Duration,
    pub upload_window: Duration,
    pub upload_cadence: Duration,
    pub progress_tick: Duration,
    pub upload_base: f64,
    pub upload_fluctuation: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.parse().unwrap(),
            ping_probes: 3,
            download_window: Duration::from_millis(10_000),
            upload_window: Duration::from_millis(8_000),
            upload_cadence: Duration::from_millis(250),
            progress_tick: Duration::from_millis(100),
            upload_base: 45.0,
            upload_fluctuation: 20.0,
        }
    }
}

impl EngineConfig {
    /// Progress budget for a run: download plus upload. The ping phase is
    /// excluded because its duration is negligible and variable, so the bar
    /// lags true elapsed time slightly at the start of a run.
    pub fn total_budget(&self) -> Duration {
        self.download_window + self.upload_window
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_parses_and_budgets() {
        let config = EngineConfig::default();
        assert_eq!(config.total_budget(), Duration::from_millis(18_000));
        assert_eq!(config.endpoint.host_str(), Some("speed.cloudflare.com"));
    }
}
