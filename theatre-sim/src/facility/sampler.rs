//! Flow opening and closing sample windows and recording time series.

use theatre_core::SampleWindow;
use tracing::info;

use super::ward::Ward;
use crate::deterministic::{Flow, FlowContext, FlowError, Suspend, VirtualTime, Wake};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SamplerState {
    Idle,
    WarmUp,
    Sampling { sample: usize, tick: u64 },
    Between { sample: usize },
    Finished,
}

/// Walks the sample window schedule of one run.
///
/// After the warm-up it opens a sample slot, records the time-series
/// metrics every resolution step until the window ends, closes the slot and
/// waits out the interval before the next window.
#[derive(Debug)]
pub struct SamplerFlow {
    window: SampleWindow,
    state: SamplerState,
}

impl SamplerFlow {
    pub fn new(window: SampleWindow) -> Self {
        Self {
            window,
            state: SamplerState::Idle,
        }
    }

    fn open(&mut self, ctx: &mut FlowContext<'_, Ward>, sample: usize) -> Result<Suspend, FlowError> {
        let Some(first_tick) = self.window.tick_at(sample, 0) else {
            self.state = SamplerState::Finished;
            return Ok(Suspend::Done);
        };
        ctx.world().statistics_mut().start_sample();
        info!(sample, at = %ctx.now(), "Start taking new sample");

        self.state = SamplerState::Sampling { sample, tick: 0 };
        Ok(resume_at(ctx, first_tick))
    }

    fn tick(
        &mut self,
        ctx: &mut FlowContext<'_, Ward>,
        sample: usize,
        tick: u64,
    ) -> Result<Suspend, FlowError> {
        let (pools, ward) = ctx.parts();
        ward.sample_time_series(pools)?;

        if let Some(next) = self.window.tick_at(sample, tick + 1) {
            self.state = SamplerState::Sampling {
                sample,
                tick: tick + 1,
            };
            return Ok(resume_at(ctx, next));
        }

        ctx.world().statistics_mut().end_sample();
        info!(sample, at = %ctx.now(), "Sample taken");

        if sample + 1 >= self.window.count {
            self.state = SamplerState::Finished;
            return Ok(Suspend::Done);
        }
        self.state = SamplerState::Between { sample: sample + 1 };
        Ok(self.wait_for_window(ctx, sample + 1))
    }

    /// Suspends until window `sample` opens.
    fn wait_for_window(&self, ctx: &FlowContext<'_, Ward>, sample: usize) -> Suspend {
        match self.window.bounds(sample) {
            Some((start, _)) => resume_at(ctx, start),
            None => Suspend::Done,
        }
    }
}

/// Suspends until absolute hour `at`, or yields when rounding put it behind now.
fn resume_at(ctx: &FlowContext<'_, Ward>, at: f64) -> Suspend {
    Suspend::WaitUntil(VirtualTime::from_hours(at).max(ctx.now()))
}

impl Flow<Ward> for SamplerFlow {
    fn resume(&mut self, ctx: &mut FlowContext<'_, Ward>, wake: Wake) -> Result<Suspend, FlowError> {
        match (self.state, wake) {
            (SamplerState::Idle, Wake::Start) => {
                info!(warm_up = self.window.warm_up, "Starting simulation warm-up period");
                self.state = SamplerState::WarmUp;
                Ok(self.wait_for_window(ctx, 0))
            }
            (SamplerState::WarmUp, Wake::Timer) => {
                info!(at = %ctx.now(), "Warm-up period ended, start taking samples");
                self.open(ctx, 0)
            }
            (SamplerState::Sampling { sample, tick }, Wake::Timer) => self.tick(ctx, sample, tick),
            (SamplerState::Between { sample }, Wake::Timer) => self.open(ctx, sample),
            (state, wake) => Err(FlowError::UnexpectedWake {
                flow: "sampler",
                wake: wake.as_str(),
                state: match state {
                    SamplerState::Idle => "idle",
                    SamplerState::WarmUp => "warming up",
                    SamplerState::Sampling { .. } => "sampling",
                    SamplerState::Between { .. } => "between samples",
                    SamplerState::Finished => "finished",
                },
            }),
        }
    }

    fn name(&self) -> &'static str {
        "sampler"
    }
}
