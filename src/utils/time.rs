#[cfg(not(target_arch = "wasm32"))]
use std::time::{Duration, Instant};

#[cfg(target_arch = "wasm32")]
use web_time::{Duration, Instant};

use crate::controller::PerformanceSample;

/// Measures frame boundaries and turns them into [`PerformanceSample`]s.
pub struct FrameTimer {
    start_time: Instant,
    frame_start: Option<Instant>,
    /// Duration of the last completed frame
    pub delta: Duration,
    /// Total elapsed time since creation
    pub elapsed: Duration,
    /// Total number of completed frames
    pub frame_count: u64,
}

impl Default for FrameTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameTimer {
    /// Creates a new timer starting from now.
    #[must_use]
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            frame_start: None,
            delta: Duration::ZERO,
            elapsed: Duration::ZERO,
            frame_count: 0,
        }
    }

    /// Marks the start of a frame.
    pub fn begin_frame(&mut self) {
        self.frame_start = Some(Instant::now());
    }

    /// Marks the end of a frame and returns its sample.
    ///
    /// Without a matching `begin_frame` the frame is measured from the end of
    /// the previous one.
    pub fn end_frame(&mut self) -> PerformanceSample {
        let now = Instant::now();
        let start = self
            .frame_start
            .take()
            .unwrap_or(self.start_time + self.elapsed);
        self.delta = now - start;
        self.elapsed = now - self.start_time;
        self.frame_count += 1;
        PerformanceSample::new(self.frame_time_ms(), self.elapsed_ms())
    }

    /// Seconds elapsed since creation, for the `time` uniform.
    #[must_use]
    pub fn seconds(&self) -> f32 {
        self.start_time.elapsed().as_secs_f32()
    }

    #[must_use]
    pub fn frame_time_ms(&self) -> f64 {
        self.delta.as_secs_f64() * 1000.0
    }

    #[must_use]
    pub fn elapsed_ms(&self) -> f64 {
        self.elapsed.as_secs_f64() * 1000.0
    }
}
