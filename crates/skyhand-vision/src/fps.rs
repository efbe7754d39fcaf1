use std::time::Instant;

pub const DEFAULT_CALC_INTERVAL: u32 = 20;

/// Frame rate over windows of `calc_interval` frames. Between windows the
/// last computed rate is reported.
#[derive(Debug, Clone)]
pub struct FpsEstimator {
    calc_interval: u32,
    count: u32,
    window_start: Instant,
    rate: f64,
}

impl Default for FpsEstimator {
    fn default() -> Self {
        Self::new(DEFAULT_CALC_INTERVAL)
    }
}

impl FpsEstimator {
    pub fn new(calc_interval: u32) -> Self {
        Self::starting_at(calc_interval, Instant::now())
    }

    pub fn starting_at(calc_interval: u32, start: Instant) -> Self {
        Self { calc_interval: calc_interval.max(1), count: 0, window_start: start, rate: 0.0 }
    }

    pub fn update(&mut self) -> f64 {
        self.update_at(Instant::now())
    }

    pub fn update_at(&mut self, now: Instant) -> f64 {
        self.count += 1;
        if self.count >= self.calc_interval {
            let elapsed = now.saturating_duration_since(self.window_start).as_secs_f64();
            // zero-length window: keep the previous rate
            if elapsed > 0.0 {
                self.rate = self.count as f64 / elapsed;
            }
            self.count = 0;
            self.window_start = now;
        }
        self.rate
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn rate_computed_at_window_end() {
        let t0 = Instant::now();
        let mut fps = FpsEstimator::starting_at(20, t0);
        for i in 1..20 {
            assert_eq!(fps.update_at(t0 + Duration::from_millis(50 * i)), 0.0);
        }
        let r = fps.update_at(t0 + Duration::from_secs(1));
        assert!((r - 20.0).abs() < 1e-9);
    }

    #[test]
    fn rate_held_between_windows() {
        let t0 = Instant::now();
        let mut fps = FpsEstimator::starting_at(2, t0);
        fps.update_at(t0 + Duration::from_millis(100));
        let r = fps.update_at(t0 + Duration::from_millis(200));
        assert!((r - 10.0).abs() < 1e-9);
        assert_eq!(fps.update_at(t0 + Duration::from_secs(5)), r);
        assert_eq!(fps.rate(), r);
    }

    #[test]
    fn zero_length_window_keeps_previous_rate() {
        let t0 = Instant::now();
        let mut fps = FpsEstimator::starting_at(1, t0);
        let first = fps.update_at(t0 + Duration::from_millis(500));
        assert!((first - 2.0).abs() < 1e-9);
        let same = t0 + Duration::from_millis(500);
        assert_eq!(fps.update_at(same), first);
    }
}
