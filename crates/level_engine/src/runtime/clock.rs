use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepPlan {
    pub ticks_to_run: u32,
    pub remaining_accumulator: Duration,
    pub dropped_backlog: Duration,
}

/// Fixed-step clock: feed it frame times, run the ticks it plans.
#[derive(Debug, Clone)]
pub struct FixedStepClock {
    fixed_dt: Duration,
    max_ticks_per_frame: u32,
    max_frame_delta: Duration,
    accumulator: Duration,
}

impl FixedStepClock {
    pub fn new(fixed_dt: Duration, max_ticks_per_frame: u32, max_frame_delta: Duration) -> Self {
        Self {
            fixed_dt: non_zero(fixed_dt, Duration::from_millis(16)),
            max_ticks_per_frame: max_ticks_per_frame.max(1),
            max_frame_delta: non_zero(max_frame_delta, Duration::from_millis(250)),
            accumulator: Duration::ZERO,
        }
    }

    pub fn fixed_dt(&self) -> Duration {
        self.fixed_dt
    }

    /// Adds one frame's elapsed time and returns how many ticks to run.
    /// Backlog beyond the per-frame tick cap is dropped.
    pub fn advance(&mut self, frame_dt: Duration) -> StepPlan {
        let frame_dt = frame_dt.min(self.max_frame_delta);
        let plan = plan_sim_steps(
            self.accumulator.saturating_add(frame_dt),
            self.fixed_dt,
            self.max_ticks_per_frame,
        );
        self.accumulator = plan.remaining_accumulator;
        plan
    }
}

pub fn plan_sim_steps(
    mut accumulator: Duration,
    fixed_dt: Duration,
    max_ticks_per_frame: u32,
) -> StepPlan {
    let mut ticks_to_run = 0u32;

    while accumulator >= fixed_dt && ticks_to_run < max_ticks_per_frame {
        accumulator = accumulator.saturating_sub(fixed_dt);
        ticks_to_run = ticks_to_run.saturating_add(1);
    }

    let dropped_backlog = if accumulator >= fixed_dt {
        std::mem::take(&mut accumulator)
    } else {
        Duration::ZERO
    };

    StepPlan {
        ticks_to_run,
        remaining_accumulator: accumulator,
        dropped_backlog,
    }
}

fn non_zero(value: Duration, fallback: Duration) -> Duration {
    if value.is_zero() {
        fallback
    } else {
        value
    }
}
