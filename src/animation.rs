use web_time::Instant;

/// Rotation angle advanced by elapsed time.
#[derive(Debug, Clone)]
pub struct AnimationState {
    /// Accumulated angle in degrees. Never wrapped.
    angle: f32,
    /// Degrees per second.
    rate: f32,
    last_tick: Option<Instant>,
}

impl AnimationState {
    pub fn new(rate_degrees_per_second: f32) -> Self {
        Self {
            angle: 0.0,
            rate: rate_degrees_per_second,
            last_tick: None,
        }
    }

    pub fn angle(&self) -> f32 {
        self.angle
    }

    /// Adds `rate * delta_ms / 1000` degrees.
    pub fn advance(&mut self, delta_ms: f32) {
        self.angle += self.rate * delta_ms / 1000.0;
    }

    /// Milliseconds elapsed since the previous tick; 0 on the first one.
    pub fn tick(&mut self, now: Instant) -> f32 {
        let elapsed = self
            .last_tick
            .map_or(0.0, |last| now.saturating_duration_since(last).as_secs_f32() * 1000.0);
        self.last_tick = Some(now);
        elapsed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use web_time::Duration;

    #[test]
    fn one_second_is_ninety_degrees() {
        let mut state = AnimationState::new(90.0);
        state.advance(1000.0);
        assert_eq!(state.angle(), 90.0);
    }

    #[test]
    fn advance_is_additive() {
        let mut halves = AnimationState::new(90.0);
        halves.advance(500.0);
        halves.advance(500.0);

        let mut whole = AnimationState::new(90.0);
        whole.advance(1000.0);

        assert_eq!(halves.angle(), whole.angle());
    }

    #[test]
    fn first_tick_has_no_elapsed_time() {
        let mut state = AnimationState::new(90.0);
        let start = Instant::now();

        assert_eq!(state.tick(start), 0.0);
        let elapsed = state.tick(start + Duration::from_millis(250));
        assert!((elapsed - 250.0).abs() < 1e-3);
    }

    #[test]
    fn angle_is_not_wrapped() {
        let mut state = AnimationState::new(90.0);
        state.advance(5000.0);
        assert_eq!(state.angle(), 450.0);
    }
}
