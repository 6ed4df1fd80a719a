//! Synthesis of digitised photo-sensor waveforms from photon arrival times.
//!
//! A [PulseParameterDistribution](simulation_elements::PulseParameterDistribution)
//! is built once from calibration fits. Each run then generates its
//! [TimeBase](simulation_elements::TimeBase)s, feeds every event's hits through a
//! [WaveformAccumulator](simulation_engine::WaveformAccumulator), and hands the
//! finalized events to a [RunWriter](output::RunWriter).
pub mod error;
pub mod hits;
pub mod output;
pub mod simulation;
pub mod simulation_elements;
pub mod simulation_engine;
pub mod summary;

pub use error::{ConfigError, SimulatorError, SimulatorResult};
pub use simulation::{Seeds, Simulation};
