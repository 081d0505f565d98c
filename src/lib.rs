//! Client-side network speed measurement engine.
//!
//! Estimates round-trip latency, sustained download throughput, and a
//! simulated upload rate against a remote endpoint, publishing live metrics
//! and an append-only series of chart samples as the run progresses.
//!
//! The engine is UI-agnostic: a presentation layer calls
//! [`SpeedTest::start`] and [`SpeedTest::reset`] and polls
//! [`SpeedTest::snapshot`] for everything it renders.

pub mod config;
pub mod engine;
pub mod error;
mod phases;
pub mod state;

pub use config::EngineConfig;
pub use engine::SpeedTest;
pub use error::EngineError;
pub use state::{LiveMetrics, RunStatus, Sample, Snapshot};
