use super::RunWriter;
use crate::{
    error::{SimulatorError, SimulatorResult},
    simulation_engine::{RunRecord, SampleBuffer},
    simulation_elements::TimeBase,
};
use itertools::Itertools;
use std::{
    fs::File,
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
};
use tracing::info;
use waveform_common::{RunId, Side};

/// Writes each event as tab separated blocks, front side then back side.
///
/// ```text
/// #Run 4
/// #Event 0
/// #
/// #Front Detector
/// #sample	t0 [ns]	ch0 [V]	t1 [ns]	ch1 [V]
/// 0	0	0.0012	0	-0.0008
/// ```
pub struct TabularRunWriter<W: Write> {
    run: RunId,
    path: PathBuf,
    writer: W,
    header_written: bool,
    events: usize,
}

impl TabularRunWriter<BufWriter<File>> {
    pub fn create(path: &Path, run: RunId) -> SimulatorResult<Self> {
        let file = File::create(path).map_err(|e| SimulatorError::io(path, e))?;
        info!("Writing run {run} to {}", path.display());
        Ok(Self::new(BufWriter::new(file), path, run))
    }
}

impl<W: Write> TabularRunWriter<W> {
    /// `path` names the destination of `writer` in errors.
    pub fn new(writer: W, path: impl Into<PathBuf>, run: RunId) -> Self {
        Self {
            run,
            path: path.into(),
            writer,
            header_written: false,
            events: 0,
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write_header(&mut self) -> io::Result<()> {
        if !self.header_written {
            writeln!(self.writer, "#Run {}", self.run)?;
            self.header_written = true;
        }
        Ok(())
    }

    fn write_event(&mut self, record: &RunRecord<'_>) -> io::Result<()> {
        self.write_header()?;
        writeln!(self.writer, "#Event {}", record.event)?;
        for (side, buffer) in record.buffers.iter() {
            let title = match side {
                Side::Front => "Front",
                Side::Back => "Back",
            };
            self.write_side(title, record.time_bases.get(side), buffer)?;
        }
        Ok(())
    }

    fn write_side(
        &mut self,
        title: &str,
        time_base: &TimeBase,
        buffer: &SampleBuffer,
    ) -> io::Result<()> {
        writeln!(self.writer, "#")?;
        writeln!(self.writer, "#{title} Detector")?;
        writeln!(
            self.writer,
            "#sample\t{}",
            (0..buffer.channels())
                .map(|channel| format!("t{channel} [ns]\tch{channel} [V]"))
                .join("\t")
        )?;
        for index in 0..buffer.samples() {
            let row = (0..buffer.channels()).map(|channel| {
                let time = time_base.channel(channel).get(index).copied();
                let value = buffer.channel(channel).get(index).copied();
                format!(
                    "{}\t{}",
                    time.unwrap_or_default(),
                    value.unwrap_or_default()
                )
            });
            writeln!(self.writer, "{index}\t{}", row.format("\t"))?;
        }
        Ok(())
    }
}

impl<W: Write> RunWriter for TabularRunWriter<W> {
    fn write(&mut self, record: &RunRecord<'_>) -> SimulatorResult<()> {
        self.write_event(record)
            .map_err(|e| SimulatorError::io(&self.path, e))?;
        self.events += 1;
        Ok(())
    }

    fn finalize_run(&mut self) -> SimulatorResult<()> {
        self.write_header()
            .and_then(|_| self.writer.flush())
            .map_err(|e| SimulatorError::io(&self.path, e))?;
        info!("Run {} closed after {} events", self.run, self.events);
        Ok(())
    }
}
