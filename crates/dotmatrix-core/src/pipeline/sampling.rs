/// Decimation stride that brings `input_fps` down to roughly `output_fps`.
///
/// Ties round to even, and the stride is never below 1, so sources slower
/// than the target keep every frame.
pub fn frame_interval(input_fps: f64, output_fps: f64) -> u64 {
    let ratio = input_fps / output_fps;
    if !ratio.is_finite() {
        return 1;
    }
    (ratio.round_ties_even().max(1.0)) as u64
}

/// Fixed-stride frame selector.
#[derive(Clone, Debug)]
pub struct TemporalSampler {
    interval: u64,
    frames_seen: u64,
}

impl TemporalSampler {
    pub fn new(interval: u64) -> Self {
        Self {
            interval: interval.max(1),
            frames_seen: 0,
        }
    }

    /// Count one decoded frame and report whether it is kept.
    ///
    /// Counting starts at 1, so with a stride of 2 the 2nd, 4th, ... frames
    /// survive.
    pub fn admit(&mut self) -> bool {
        self.frames_seen += 1;
        self.frames_seen % self.interval == 0
    }

    pub fn frames_seen(&self) -> u64 {
        self.frames_seen
    }

    pub fn interval(&self) -> u64 {
        self.interval
    }
}
