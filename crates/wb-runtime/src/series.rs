//! Windowed time series with linear-fit interpolation.
//!
//! The buffer holds `(timestamp, value)` points in increasing timestamp
//! order, pruned to a rolling horizon after every append. Queries fit a
//! first-degree polynomial over the window and evaluate it at the query
//! time, which both smooths sensor noise and extrapolates to "now".

use std::collections::VecDeque;

/// A time series pruned to `[t_last - window, t_last]`.
#[derive(Debug, Clone)]
pub struct WindowedSeries {
    window: f64,
    points: VecDeque<(f64, f64)>,
}

impl WindowedSeries {
    pub fn new(window: f64) -> Self {
        Self {
            window,
            points: VecDeque::new(),
        }
    }

    pub fn window(&self) -> f64 {
        self.window
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.points.iter().copied()
    }

    /// Append `(t, y)` and prune entries older than `t - window`.
    /// Timestamps are expected to be monotonic (single writer per series).
    pub fn append(&mut self, t: f64, y: f64) {
        self.points.push_back((t, y));
        while let Some(&(front, _)) = self.points.front() {
            if front < t - self.window {
                self.points.pop_front();
            } else {
                break;
            }
        }
    }

    /// Linear-fit interpolation at `now` over the points inside
    /// `[now - window, now]`. `None` when the window is empty; a single
    /// point is returned as-is.
    pub fn interp_at(&self, now: f64) -> Option<f64> {
        interp(self.points.iter().copied(), now, self.window)
    }
}

/// Interpolate at `now` over the points of `iter` falling inside
/// `[now - window, now]`.
pub fn interp(iter: impl Iterator<Item = (f64, f64)>, now: f64, window: f64) -> Option<f64> {
    let points: Vec<(f64, f64)> = iter
        .filter(|&(t, _)| t >= now - window && t <= now)
        .collect();

    match points.as_slice() {
        [] => None,
        [(_, y)] => Some(*y),
        _ => {
            let (slope, intercept) = linear_fit(&points);
            Some(slope * now + intercept)
        }
    }
}

/// Least-squares fit of a first-degree polynomial. Degenerate abscissas
/// (all timestamps equal) fall back to a flat fit through the mean.
pub fn linear_fit(points: &[(f64, f64)]) -> (f64, f64) {
    let n = points.len() as f64;
    let mean_t = points.iter().map(|&(t, _)| t).sum::<f64>() / n;
    let mean_y = points.iter().map(|&(_, y)| y).sum::<f64>() / n;

    let mut cov = 0.0;
    let mut var = 0.0;
    for &(t, y) in points {
        cov += (t - mean_t) * (y - mean_y);
        var += (t - mean_t) * (t - mean_t);
    }

    if var <= f64::EPSILON {
        return (0.0, mean_y);
    }
    let slope = cov / var;
    (slope, mean_y - slope * mean_t)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_prunes_to_window() {
        let mut series = WindowedSeries::new(10.0);
        series.append(0.0, 1.0);
        series.append(5.0, 2.0);
        series.append(12.0, 3.0);

        // (0.0, 1.0) fell out of [2.0, 12.0].
        let points: Vec<_> = series.points().collect();
        assert_eq!(points, vec![(5.0, 2.0), (12.0, 3.0)]);
    }

    #[test]
    fn longer_window_keeps_at_least_as_much() {
        let samples = [(0.0, 1.0), (3.0, 2.0), (6.0, 3.0), (9.0, 4.0)];
        let mut short = WindowedSeries::new(4.0);
        let mut long = WindowedSeries::new(8.0);
        for (t, y) in samples {
            short.append(t, y);
            long.append(t, y);
        }
        assert!(long.len() >= short.len());
    }

    #[test]
    fn interp_empty_is_none() {
        let series = WindowedSeries::new(10.0);
        assert_eq!(series.interp_at(5.0), None);
    }

    #[test]
    fn interp_single_returns_the_sample() {
        let mut series = WindowedSeries::new(10.0);
        series.append(2.0, 42.5);
        assert_eq!(series.interp_at(9.0), Some(42.5));
    }

    #[test]
    fn interp_fits_linear_trend() {
        let mut series = WindowedSeries::new(10.0);
        series.append(0.0, 20.0);
        series.append(5.0, 30.0);
        series.append(10.0, 40.0);

        let value = series.interp_at(10.0).unwrap();
        assert!((value - 40.0).abs() < 1e-9);
    }

    #[test]
    fn interp_smooths_noise_around_trend() {
        let mut series = WindowedSeries::new(10.0);
        series.append(0.0, 20.2);
        series.append(2.0, 19.8);
        series.append(4.0, 20.1);
        series.append(6.0, 19.9);

        let value = series.interp_at(6.0).unwrap();
        assert!((value - 20.0).abs() < 0.3);
    }

    #[test]
    fn interp_ignores_points_outside_window() {
        let mut series = WindowedSeries::new(100.0);
        series.append(0.0, 0.0);
        series.append(50.0, 50.0);
        series.append(100.0, 100.0);

        // Query with a 10 s effective horizon sees only the last point.
        let value = interp(series.points(), 100.0, 10.0).unwrap();
        assert_eq!(value, 100.0);
    }

    #[test]
    fn degenerate_fit_returns_mean() {
        let (slope, intercept) = linear_fit(&[(1.0, 10.0), (1.0, 20.0)]);
        assert_eq!(slope, 0.0);
        assert_eq!(intercept, 15.0);
    }
}
