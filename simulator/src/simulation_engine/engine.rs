use super::{RunRecord, WaveformAccumulator};
use crate::{
    error::SimulatorResult,
    hits::EventHits,
    output::RunWriter,
    simulation::{Seeds, Simulation},
    simulation_elements::{PulseParameterSampler, TimeBase},
};
use chrono::{DateTime, TimeDelta, Utc};
use rand::{SeedableRng, rngs::StdRng};
use tracing::{debug, info, instrument, warn};
use waveform_common::{RunId, Sides};

/// What happened during one run, reported once the run is finalized.
#[derive(Debug, Clone, PartialEq)]
pub struct RunStatistics {
    pub run: RunId,
    pub seeds: Seeds,
    pub started: DateTime<Utc>,
    pub duration: TimeDelta,
    pub events: usize,
    pub hits: usize,
    pub dropped_hits: usize,
}

/// Events between progress reports when the length of the hit source is unknown.
const PROGRESS_INTERVAL: usize = 1000;

/// Feeds every hit of one event through the accumulator.
///
/// Hits on channels outside the detector are logged and skipped, any other
/// failure ends the event and is returned.
fn process_event<'a, S: PulseParameterSampler>(
    accumulator: &mut WaveformAccumulator<'a, S>,
    event: &EventHits,
) -> SimulatorResult<RunRecord<'a>> {
    accumulator.begin_event(event.event)?;
    for (side, hits) in event.sides().iter() {
        for (channel, arrival_time) in hits.iter() {
            match accumulator.add_hit(side, channel, arrival_time) {
                Err(e) if e.is_recoverable() => warn!("Hit dropped: {e}"),
                result => result?,
            }
        }
    }
    accumulator.end_event()
}

/// Synthesizes the waveforms of every event of one run and writes them to `writer`.
///
/// The time bases are generated once per run from the jitter stream. Events are
/// pulled from `events` one at a time, then opened, filled with their hits and
/// finalized in input order. A hit source error ends the run without finalizing
/// `writer`; events before it have already been written.
#[instrument(skip_all, fields(run = run))]
pub fn run_simulation<S, I, W>(
    simulation: &Simulation,
    sampler: &S,
    events: I,
    writer: &mut W,
    run: RunId,
    seeds: Seeds,
) -> SimulatorResult<RunStatistics>
where
    S: PulseParameterSampler,
    I: IntoIterator<Item = SimulatorResult<EventHits>>,
    W: RunWriter + ?Sized,
{
    let started = Utc::now();
    let events = events.into_iter();
    let expected = events.size_hint().1.filter(|&total| total > 0);
    match expected {
        Some(total) => info!("Run {run} started with {total} events"),
        None => info!("Run {run} started"),
    }
    debug!(?seeds);

    let mut jitter_rng = StdRng::seed_from_u64(seeds.jitter);
    let mode = simulation.daq.time_base_mode();
    let time_bases = Sides::try_from_fn(|_| {
        TimeBase::generate(
            simulation.samples,
            simulation.channels,
            simulation.daq.sampling_speed,
            mode,
            &mut jitter_rng,
        )
    })?;

    let mut accumulator = WaveformAccumulator::new(
        sampler,
        &simulation.daq,
        &time_bases,
        simulation.zero_time_offset,
        StdRng::seed_from_u64(seeds.parameters),
        StdRng::seed_from_u64(seeds.noise),
    )?;

    let progress_step = expected.map_or(PROGRESS_INTERVAL, |total| (total / 10).max(1));
    let mut processed = 0;
    let mut hits = 0;
    let mut dropped_hits = 0;
    for event in events {
        let record = process_event(&mut accumulator, &event?)?;
        writer.write(&record)?;
        hits += record.hits;
        dropped_hits += record.dropped_hits;
        accumulator.recycle(record);

        processed += 1;
        if processed % progress_step == 0 {
            match expected {
                Some(total) => info!(
                    "Run {run}: {processed} of {total} events ({}%)",
                    100 * processed / total
                ),
                None => info!("Run {run}: {processed} events"),
            }
        }
    }
    writer.finalize_run()?;

    let duration = Utc::now() - started;
    info!(
        "Run {run} finished in {:.3} s: {processed} events, {hits} hits, {dropped_hits} dropped",
        duration.num_milliseconds() as f64 / 1000.0,
    );
    Ok(RunStatistics {
        run,
        seeds,
        started,
        duration,
        events: processed,
        hits,
        dropped_hits,
    })
}
