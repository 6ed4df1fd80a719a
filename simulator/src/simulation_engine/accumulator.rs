use crate::{
    error::{SimulatorError, SimulatorResult},
    simulation_elements::{
        DaqResponse, PulseParameterSampler, TimeBase, noise::GaussianNoise,
    },
};
use rand::rngs::StdRng;
use std::mem;
use tracing::{instrument, trace};
use waveform_common::{EventId, Sample, Side, Sides, Time};

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum AccumulatorState {
    #[strum(to_string = "idle")]
    Idle,
    #[strum(to_string = "open for an event")]
    EventOpen,
    #[strum(to_string = "finalizing an event")]
    EventFinalized,
}

/// Samples of every channel of one detector side, stored channel after channel.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SampleBuffer {
    channels: usize,
    samples: usize,
    values: Vec<Sample>,
}

impl SampleBuffer {
    pub fn new(channels: usize, samples: usize) -> Self {
        Self {
            channels,
            samples,
            values: vec![Sample::default(); channels * samples],
        }
    }

    /// Wraps `values` laid out channel after channel, `None` if the length does not fit.
    pub fn from_values(channels: usize, samples: usize, values: Vec<Sample>) -> Option<Self> {
        (values.len() == channels * samples).then_some(Self {
            channels,
            samples,
            values,
        })
    }

    /// Zeroes the buffer, reusing its allocation where possible.
    fn reset(&mut self, channels: usize, samples: usize) {
        self.channels = channels;
        self.samples = samples;
        self.values.clear();
        self.values.resize(channels * samples, Sample::default());
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn samples(&self) -> usize {
        self.samples
    }

    /// Samples of `channel`, empty if out of range.
    pub fn channel(&self, channel: usize) -> &[Sample] {
        self.values
            .get(channel * self.samples..(channel + 1) * self.samples)
            .unwrap_or_default()
    }

    fn channel_mut(&mut self, channel: usize) -> &mut [Sample] {
        self.values
            .get_mut(channel * self.samples..(channel + 1) * self.samples)
            .unwrap_or_default()
    }

    pub fn iter_channels(&self) -> impl Iterator<Item = &[Sample]> {
        self.values.chunks_exact(self.samples.max(1))
    }

    pub fn as_slice(&self) -> &[Sample] {
        &self.values
    }
}

/// A finalized event, as handed to a [RunWriter](crate::output::RunWriter).
#[derive(Debug, Clone)]
pub struct RunRecord<'a> {
    pub event: EventId,
    pub time_bases: &'a Sides<TimeBase>,
    pub buffers: Sides<SampleBuffer>,
    pub hits: usize,
    pub dropped_hits: usize,
}

/// Sums single photoelectron pulses over a noise baseline, one event at a time.
///
/// The accumulator moves `Idle -> EventOpen -> EventFinalized -> Idle`:
/// [Self::begin_event] fills both sides with pedestal noise, [Self::add_hit]
/// adds one sampled pulse to one channel, and [Self::end_event] applies the
/// digitiser response and hands the buffers over as a [RunRecord].
pub struct WaveformAccumulator<'a, S> {
    sampler: &'a S,
    daq: &'a DaqResponse,
    time_bases: &'a Sides<TimeBase>,
    zero_time_offset: Time,
    baseline_noise: GaussianNoise,
    parameter_rng: StdRng,
    noise_rng: StdRng,

    state: AccumulatorState,
    event: EventId,
    hits: usize,
    dropped_hits: usize,
    buffers: Sides<SampleBuffer>,
    spare: Option<Sides<SampleBuffer>>,
}

impl<'a, S: PulseParameterSampler> WaveformAccumulator<'a, S> {
    pub fn new(
        sampler: &'a S,
        daq: &'a DaqResponse,
        time_bases: &'a Sides<TimeBase>,
        zero_time_offset: Time,
        parameter_rng: StdRng,
        noise_rng: StdRng,
    ) -> SimulatorResult<Self> {
        Ok(Self {
            sampler,
            daq,
            time_bases,
            zero_time_offset,
            baseline_noise: daq.baseline_noise()?,
            parameter_rng,
            noise_rng,
            state: AccumulatorState::Idle,
            event: EventId::default(),
            hits: 0,
            dropped_hits: 0,
            buffers: Sides::default(),
            spare: None,
        })
    }

    pub fn state(&self) -> AccumulatorState {
        self.state
    }

    fn require(&self, state: AccumulatorState, operation: &'static str) -> SimulatorResult<()> {
        if self.state == state {
            Ok(())
        } else {
            Err(SimulatorError::InvalidState {
                operation,
                state: self.state,
            })
        }
    }

    pub fn begin_event(&mut self, event: EventId) -> SimulatorResult<()> {
        self.require(AccumulatorState::Idle, "begin an event")?;
        if let Some(spare) = self.spare.take() {
            self.buffers = spare;
        }
        for (side, buffer) in self.buffers.iter_mut() {
            let time_base = self.time_bases.get(side);
            buffer.reset(time_base.channels(), time_base.samples());
            self.baseline_noise
                .noisify(&mut buffer.values, &mut self.noise_rng);
        }
        self.event = event;
        self.hits = 0;
        self.dropped_hits = 0;
        self.state = AccumulatorState::EventOpen;
        Ok(())
    }

    /// Adds the pulse of one photoelectron arriving at `arrival_time` on `channel` of `side`.
    ///
    /// A [SimulatorError::ChannelOutOfRange] leaves the event open and the buffers untouched.
    pub fn add_hit(&mut self, side: Side, channel: i64, arrival_time: Time) -> SimulatorResult<()> {
        self.require(AccumulatorState::EventOpen, "add a hit")?;
        let time_base = self.time_bases.get(side);
        let Some(channel_index) = usize::try_from(channel)
            .ok()
            .filter(|&index| index < time_base.channels())
        else {
            self.dropped_hits += 1;
            return Err(SimulatorError::ChannelOutOfRange {
                event: self.event,
                side,
                channel,
                channels: time_base.channels(),
            });
        };

        let pulse = self.sampler.sample(&mut self.parameter_rng)?;
        let start = arrival_time + self.zero_time_offset;
        trace!(?pulse, start, "Adding pulse");
        let values = self.buffers.get_mut(side).channel_mut(channel_index);
        for (value, &time) in values.iter_mut().zip(time_base.channel(channel_index)) {
            *value += pulse.value_at(time, start);
        }
        self.hits += 1;
        Ok(())
    }

    #[instrument(skip(self), level = "debug", fields(event = self.event, hits = self.hits))]
    pub fn end_event(&mut self) -> SimulatorResult<RunRecord<'a>> {
        self.require(AccumulatorState::EventOpen, "end an event")?;
        self.state = AccumulatorState::EventFinalized;
        let finalized = self.apply_daq_response();
        self.state = AccumulatorState::Idle;
        finalized?;

        Ok(RunRecord {
            event: self.event,
            time_bases: self.time_bases,
            buffers: mem::take(&mut self.buffers),
            hits: self.hits,
            dropped_hits: self.dropped_hits,
        })
    }

    fn apply_daq_response(&mut self) -> SimulatorResult<()> {
        for (_, buffer) in self.buffers.iter_mut() {
            self.daq.finalize(&mut buffer.values, &mut self.noise_rng)?;
        }
        Ok(())
    }

    /// Returns the buffers of a written record so the next event can reuse them.
    pub fn recycle(&mut self, record: RunRecord<'a>) {
        self.spare = Some(record.buffers);
    }
}
