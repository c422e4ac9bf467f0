use std::time::Instant;

/// Instantaneous frame rate from the gap between consecutive iteration starts.
#[derive(Debug, Default)]
pub struct FpsCounter {
    previous: Option<Instant>,
}

impl FpsCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the start of an iteration and return the current rate.
    ///
    /// The first iteration has no predecessor and reports 0.
    pub fn tick(&mut self, now: Instant) -> f64 {
        let fps = match self.previous {
            Some(previous) => {
                let delta = now.saturating_duration_since(previous).as_secs_f64();
                if delta > 0.0 {
                    1.0 / delta
                } else {
                    0.0
                }
            }
            None => 0.0,
        };
        self.previous = Some(now);
        fps
    }
}
