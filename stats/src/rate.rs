// SPDX-License-Identifier: Apache-2.0

//! Rate estimation for monotonic counters.

use tracing::error;

/// An [exponentially weighted moving average] over an irregularly sampled series.
///
/// Samples are `(time, value)` pairs with time in seconds on any monotonic axis; the
/// smoothing constant `tau` is the time over which an old sample's weight decays to `1/e`.
///
/// [exponentially weighted moving average]: https://en.wikipedia.org/wiki/Exponential_smoothing
#[derive(Debug)]
pub struct ExponentiallyWeightedMovingAverage<T = f64> {
    last: Option<(f64, T)>,
    tau: f64,
}

impl<T> ExponentiallyWeightedMovingAverage<T> {
    #[must_use]
    pub fn new(tau_seconds: f64) -> Self {
        ExponentiallyWeightedMovingAverage {
            last: None,
            tau: tau_seconds,
        }
    }

    pub fn get(&self) -> T
    where
        T: Default + Copy,
    {
        self.last.map(|(_, v)| v).unwrap_or_default()
    }

    pub fn update(&mut self, (time, data): (f64, T)) -> T
    where
        T: Copy + std::ops::Mul<f64, Output = T> + std::ops::Add<Output = T>,
    {
        let Some((last_time, last_val)) = self.last else {
            self.last = Some((time, data));
            return data;
        };
        if last_time >= time {
            error!(
                "exponentially weighted moving average given a non-advancing timestamp: invalidating average"
            );
            debug_assert!(last_time < time);
            self.last = Some((time, data));
            return data;
        }
        let time_step = time - last_time;
        let alpha = (-time_step / self.tau).exp();
        let new_data = data * (1. - alpha) + last_val * alpha;
        self.last = Some((time, new_data));
        new_data
    }
}

#[cfg(test)]
mod test {
    use crate::rate::ExponentiallyWeightedMovingAverage;

    #[test]
    fn first_sample_passes_through() {
        let mut ewma = ExponentiallyWeightedMovingAverage::new(5.0);
        assert!((ewma.update((0.0, 100.0)) - 100.0).abs() < f64::EPSILON);
        assert!((ewma.get() - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn converges_toward_constant_input() {
        let mut ewma = ExponentiallyWeightedMovingAverage::new(1.0);
        ewma.update((0.0, 0.0));
        let mut value = 0.0;
        for i in 1..=100 {
            value = ewma.update((f64::from(i), 50.0));
        }
        assert!((value - 50.0).abs() < 0.1);
    }

    #[test]
    fn short_tau_tracks_faster_than_long_tau() {
        let mut fast = ExponentiallyWeightedMovingAverage::new(0.5);
        let mut slow = ExponentiallyWeightedMovingAverage::new(10.0);
        fast.update((0.0, 0.0));
        slow.update((0.0, 0.0));
        let f = fast.update((1.0, 100.0));
        let s = slow.update((1.0, 100.0));
        assert!(f > s);
    }
}
