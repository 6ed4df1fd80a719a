use super::RunWriter;
use crate::{
    error::{SimulatorError, SimulatorResult},
    simulation_elements::TimeBase,
    simulation_engine::{RunRecord, SampleBuffer},
};
use serde::Serialize;
use std::{
    fs::File,
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
};
use tracing::info;
use waveform_common::{EventId, RunId, Sample, Sides, Time};

#[derive(Serialize)]
struct SideRow<'a> {
    timestamps: Vec<&'a [Time]>,
    samples: Vec<&'a [Sample]>,
}

impl<'a> SideRow<'a> {
    fn new(time_base: &'a TimeBase, buffer: &'a SampleBuffer) -> Self {
        Self {
            timestamps: time_base.iter_channels().collect(),
            samples: buffer.iter_channels().collect(),
        }
    }
}

#[derive(Serialize)]
struct EventRow<'a> {
    run: RunId,
    event: EventId,
    #[serde(flatten)]
    sides: Sides<SideRow<'a>>,
}

/// Writes each event as one line of JSON, with per channel arrays for both sides.
pub struct JsonRunWriter<W: Write> {
    run: RunId,
    path: PathBuf,
    writer: W,
    events: usize,
}

impl JsonRunWriter<BufWriter<File>> {
    pub fn create(path: &Path, run: RunId) -> SimulatorResult<Self> {
        let file = File::create(path).map_err(|e| SimulatorError::io(path, e))?;
        info!("Writing run {run} to {}", path.display());
        Ok(Self::new(BufWriter::new(file), path, run))
    }
}

impl<W: Write> JsonRunWriter<W> {
    /// `path` names the destination of `writer` in errors.
    pub fn new(writer: W, path: impl Into<PathBuf>, run: RunId) -> Self {
        Self {
            run,
            path: path.into(),
            writer,
            events: 0,
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> RunWriter for JsonRunWriter<W> {
    fn write(&mut self, record: &RunRecord<'_>) -> SimulatorResult<()> {
        let row = EventRow {
            run: self.run,
            event: record.event,
            sides: Sides::new(
                SideRow::new(&record.time_bases.front, &record.buffers.front),
                SideRow::new(&record.time_bases.back, &record.buffers.back),
            ),
        };
        serde_json::to_writer(&mut self.writer, &row)
            .map_err(io::Error::from)
            .and_then(|_| writeln!(self.writer))
            .map_err(|e| SimulatorError::io(&self.path, e))?;
        self.events += 1;
        Ok(())
    }

    fn finalize_run(&mut self) -> SimulatorResult<()> {
        self.writer
            .flush()
            .map_err(|e| SimulatorError::io(&self.path, e))?;
        info!("Run {} closed after {} events", self.run, self.events);
        Ok(())
    }
}
