mod accumulator;
mod engine;

pub use accumulator::{AccumulatorState, RunRecord, SampleBuffer, WaveformAccumulator};
pub use engine::{RunStatistics, run_simulation};
