use std::time::Instant;

/// Where frame timestamps come from when the caller does not supply one.
pub trait TimeSource {
    /// Rewinds the source to its initial state.
    fn reset(&mut self);
    /// Seconds elapsed for the next frame.
    fn sample(&mut self) -> f32;
}

/// Monotonic wall-clock source; seconds since construction (or the last
/// [`TimeSource::reset`]).
#[derive(Debug, Clone, Copy)]
pub struct SystemTimeSource {
    origin: Instant,
}

impl SystemTimeSource {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Default for SystemTimeSource {
    fn default() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl TimeSource for SystemTimeSource {
    fn reset(&mut self) {
        self.origin = Instant::now();
    }

    fn sample(&mut self) -> f32 {
        self.origin.elapsed().as_secs_f32()
    }
}

/// Always reports the same timestamp. Useful for stills and thumbnail
/// renders that must be reproducible.
#[derive(Debug, Clone, Copy)]
pub struct FixedTimeSource {
    time: f32,
}

impl FixedTimeSource {
    pub fn new(time: f32) -> Self {
        Self { time }
    }
}

impl TimeSource for FixedTimeSource {
    fn reset(&mut self) {}

    fn sample(&mut self) -> f32 {
        self.time
    }
}

/// Owning alias for trait-object time sources.
pub type BoxedTimeSource = Box<dyn TimeSource>;
