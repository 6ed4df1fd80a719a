mod json;
mod tabular;

use crate::{error::SimulatorResult, simulation_engine::RunRecord};
use std::path::{Path, PathBuf};
use waveform_common::RunId;

pub use json::JsonRunWriter;
pub use tabular::TabularRunWriter;

/// Persists finalized events of one run, in the order they are written.
pub trait RunWriter {
    fn write(&mut self, record: &RunRecord<'_>) -> SimulatorResult<()>;

    /// Flushes everything written so far. Nothing may be written afterwards.
    fn finalize_run(&mut self) -> SimulatorResult<()>;
}

impl<W: RunWriter + ?Sized> RunWriter for Box<W> {
    fn write(&mut self, record: &RunRecord<'_>) -> SimulatorResult<()> {
        (**self).write(record)
    }

    fn finalize_run(&mut self) -> SimulatorResult<()> {
        (**self).finalize_run()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum, strum::Display)]
#[strum(serialize_all = "kebab-case")]
pub enum OutputFormat {
    /// Tab separated columns, one block per event and side.
    #[default]
    Tabular,
    /// One JSON object per event and line.
    Json,
}

impl OutputFormat {
    pub fn path(self, directory: &Path, run: RunId) -> PathBuf {
        let extension = match self {
            Self::Tabular => "txt",
            Self::Json => "jsonl",
        };
        directory.join(format!("run_{run}.{extension}"))
    }

    /// Creates the file of `run` in `directory`.
    pub fn create(self, directory: &Path, run: RunId) -> SimulatorResult<Box<dyn RunWriter + Send>> {
        let path = self.path(directory, run);
        let writer: Box<dyn RunWriter + Send> = match self {
            Self::Tabular => Box::new(TabularRunWriter::create(&path, run)?),
            Self::Json => Box::new(JsonRunWriter::create(&path, run)?),
        };
        Ok(writer)
    }
}
