//! Frame timing passed through every update

/// Per-frame timing snapshot
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FrameClock {
    /// Seconds since the previous frame
    pub delta: f32,
    /// Seconds since the clock started
    pub elapsed: f32,
    /// Number of ticks so far
    pub frame: u64,
}

impl FrameClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance by one frame
    pub fn tick(&mut self, delta: f32) {
        self.delta = delta.max(0.0);
        self.elapsed += self.delta;
        self.frame += 1;
    }
}
