use crate::{
    error::{SimulatorError, SimulatorResult},
    simulation::Simulation,
    simulation_elements::TimeBaseMode,
    simulation_engine::RunStatistics,
};
use std::{
    fmt::{self, Display, Formatter},
    fs::OpenOptions,
    io::Write,
    path::Path,
};
use tracing::info;

/// Human readable record of one run, configuration included.
pub struct RunSummary<'a> {
    pub statistics: &'a RunStatistics,
    pub simulation: &'a Simulation,
    pub hits_file: &'a Path,
}

impl Display for RunSummary<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let RunStatistics {
            run,
            seeds,
            started,
            duration,
            events,
            hits,
            dropped_hits,
        } = self.statistics;
        let detector = &self.simulation.detector;
        let daq = &self.simulation.daq;

        writeln!(f, "Run: {run}")?;
        writeln!(f, "Hits: {}", self.hits_file.display())?;
        writeln!(f, "Date: {}", started.format("%Y-%m-%d %H:%M:%S UTC"))?;
        writeln!(
            f,
            "Duration of the simulation: {:.3} s",
            duration.num_milliseconds() as f64 / 1000.0
        )?;
        writeln!(f, "Events written: {events}")?;
        writeln!(f, "Hits added: {hits}, dropped: {dropped_hits}")?;
        writeln!(
            f,
            "Seeds: parameters {}, jitter {}, noise {}",
            seeds.parameters, seeds.jitter, seeds.noise
        )?;
        writeln!(f)?;

        if let (Some(brand), Some(type_no)) = (&detector.brand, &detector.type_no) {
            writeln!(f, "SiPM: {brand} {type_no}")?;
        }
        if let Some(voltage) = detector.voltage {
            writeln!(f, "Voltage: {voltage} V")?;
        }
        if let Some(temperature) = detector.temperature {
            writeln!(f, "Temperature: {temperature} C")?;
        }
        writeln!(
            f,
            "Channels: {}, samples: {}, zero time offset: {} ns",
            self.simulation.channels, self.simulation.samples, self.simulation.zero_time_offset
        )?;
        writeln!(f, "Sampling speed: {} samples/ns", daq.sampling_speed)?;
        if let Some(template) = daq.sampling_speed_template {
            writeln!(f, "Sampling speed (template): {template} samples/ns")?;
        }
        writeln!(
            f,
            "Gain: {} dB (template {} dB, conversion factor {:.4})",
            daq.gain,
            daq.gain_template,
            daq.gain_conversion_factor()
        )?;
        if let Some(r_shaper) = daq.r_shaper_template {
            writeln!(f, "R shaper (template): {r_shaper}")?;
        }
        match daq.time_base_mode() {
            TimeBaseMode::Constant => writeln!(f, "Bin size: constant")?,
            TimeBaseMode::Jittered { sigma } => {
                writeln!(f, "Bin size: jittered, sigma {sigma} ns")?
            }
        }
        if daq.is_shaping {
            writeln!(f, "Shaping: ON, tau {} ns (not applied)", daq.tau_shaping)?;
        } else {
            writeln!(f, "Shaping: OFF")?;
        }
        writeln!(
            f,
            "Noise: sigma {} ({})",
            daq.noise_sigma, daq.noise_injection
        )?;
        let cuts = &self.simulation.calibration.charge_cuts;
        writeln!(f, "Charge cuts: [{}, {}]", cuts.min, cuts.max)?;
        writeln!(f, "{}", "-".repeat(40))
    }
}

impl RunSummary<'_> {
    /// Appends the summary to `path`, creating the file if needed.
    /// The block is written in a single call so concurrent runs do not interleave.
    pub fn append_to(&self, path: &Path) -> SimulatorResult<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| SimulatorError::io(path, e))?;
        file.write_all(self.to_string().as_bytes())
            .map_err(|e| SimulatorError::io(path, e))?;
        info!("Summary of run {} appended to {}", self.statistics.run, path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::Seeds;
    use chrono::{TimeDelta, TimeZone, Utc};

    const JSON: &str = r#"
    {
        "detector": { "brand": "Hamamatsu", "type-no": "S14160", "voltage": 42 },
        "channels": 2,
        "samples": 64,
        "zero-time-offset": 5,
        "daq": {
            "sampling-speed": 1,
            "gain": 30,
            "gain-template": 30,
            "bin-size-constant": false,
            "bin-jitter-sigma": 0.01,
            "is-shaping": true,
            "tau-shaping": 15,
            "noise-sigma": 0.1,
            "noise-injection": "finalize"
        },
        "calibration": {
            "path": { "text": "calibration.txt" },
            "charge-cuts": { "min": 1, "max": 2 },
            "binning": {
                "amplitude": { "bins": 10, "min": 0, "max": 1 },
                "tau-rise": { "bins": 10, "min": 0, "max": 1 },
                "tau-dec": { "bins": 10, "min": 0, "max": 1 }
            }
        }
    }
    "#;

    #[test]
    fn summary_echoes_configuration() {
        let simulation = Simulation::from_json(JSON).unwrap();
        let statistics = RunStatistics {
            run: 17,
            seeds: Seeds::from_master(3),
            started: Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap(),
            duration: TimeDelta::milliseconds(2500),
            events: 10,
            hits: 120,
            dropped_hits: 2,
        };
        let text = RunSummary {
            statistics: &statistics,
            simulation: &simulation,
            hits_file: Path::new("hits_17.jsonl"),
        }
        .to_string();

        assert!(text.starts_with("Run: 17\n"));
        assert!(text.contains("Date: 2024-05-01 12:30:00 UTC\n"));
        assert!(text.contains("Duration of the simulation: 2.500 s\n"));
        assert!(text.contains("Hits added: 120, dropped: 2\n"));
        assert!(text.contains("SiPM: Hamamatsu S14160\n"));
        assert!(text.contains("Voltage: 42 V\n"));
        assert!(!text.contains("Temperature"));
        assert!(text.contains("Bin size: jittered, sigma 0.01 ns\n"));
        assert!(text.contains("Shaping: ON, tau 15 ns (not applied)\n"));
        assert!(text.contains("Noise: sigma 0.1 (finalize)\n"));
    }
}
