//! Proportional-derivative error and PWM duty-cycle shaping for the
//! heat-plate control loop.

use crate::series::{WindowedSeries, linear_fit};

/// PD error over the windowed measurements in `[now - window, now]`.
///
/// Returns `(p, d)`. An empty window yields `(NaN, NaN)`; a single sample
/// yields `(setpoint - y, 0.0)` since no slope can be estimated. Otherwise a
/// first-degree fit gives `p = setpoint - poly(now)` and `d = -slope`.
pub fn pd_error(setpoint: f64, series: &WindowedSeries, now: f64, window: f64) -> (f64, f64) {
    let points: Vec<(f64, f64)> = series
        .points()
        .filter(|&(t, _)| t >= now - window && t <= now)
        .collect();

    match points.as_slice() {
        [] => (f64::NAN, f64::NAN),
        [(_, y)] => (setpoint - y, 0.0),
        _ => {
            let (slope, intercept) = linear_fit(&points);
            (setpoint - (slope * now + intercept), -slope)
        }
    }
}

/// Map a control signal onto a PWM duty cycle in `[0, 1]` with jump bands.
///
/// The raw cycle is `min(cs / max_cs, 1)`. Cycles below half the low
/// threshold force the relay fully off, the band up to the low threshold
/// snaps to it (relays are not worth flapping for slivers), and the mirror
/// bands near the top snap to the high threshold or fully on. NaN control
/// signals pass through so the caller can skip actuation.
pub fn duty_cycle(cs: f64, max_cs: f64, low_jump_thres: f64, high_jump_thres: f64) -> f64 {
    if cs.is_nan() {
        return f64::NAN;
    }
    let pw = (cs / max_cs).min(1.0);

    if pw < low_jump_thres / 2.0 {
        0.0
    } else if pw < low_jump_thres {
        low_jump_thres
    } else if high_jump_thres <= pw && pw < (high_jump_thres + 1.0) / 2.0 {
        high_jump_thres
    } else if pw > high_jump_thres {
        1.0
    } else {
        pw
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(samples: &[(f64, f64)]) -> WindowedSeries {
        let mut s = WindowedSeries::new(10.0);
        for &(t, y) in samples {
            s.append(t, y);
        }
        s
    }

    #[test]
    fn empty_window_is_nan() {
        let s = series(&[]);
        let (p, d) = pd_error(66.0, &s, 10.0, 10.0);
        assert!(p.is_nan());
        assert!(d.is_nan());
    }

    #[test]
    fn single_sample_has_no_derivative() {
        let s = series(&[(5.0, 60.0)]);
        let (p, d) = pd_error(66.0, &s, 10.0, 10.0);
        assert!((p - 6.0).abs() < 1e-9);
        assert_eq!(d, 0.0);
    }

    #[test]
    fn rising_temperature_gives_negative_derivative() {
        // 2 degC/s rise; projected value at now=10 is 40.
        let s = series(&[(0.0, 20.0), (5.0, 30.0), (10.0, 40.0)]);
        let (p, d) = pd_error(66.0, &s, 10.0, 10.0);
        assert!((p - 26.0).abs() < 1e-9);
        assert!((d - -2.0).abs() < 1e-9);
    }

    #[test]
    fn duty_cycle_bands() {
        // cs=0.06 -> pw=0.024, below low/2 -> 0
        assert_eq!(duty_cycle(0.06, 2.5, 0.1, 0.9), 0.0);
        // cs=0.2 -> pw=0.08, in [low/2, low) -> snaps to low
        assert_eq!(duty_cycle(0.2, 2.5, 0.1, 0.9), 0.1);
        // cs=1.25 -> pw=0.5, linear region unchanged
        assert_eq!(duty_cycle(1.25, 2.5, 0.1, 0.9), 0.5);
        // cs=2.3 -> pw=0.92, in [high, (high+1)/2) -> snaps to high
        assert!((duty_cycle(2.3, 2.5, 0.1, 0.9) - 0.9).abs() < 1e-9);
        // cs=3.0 -> pw clamps to 1.0 -> full on
        assert_eq!(duty_cycle(3.0, 2.5, 0.1, 0.9), 1.0);
    }

    #[test]
    fn duty_cycle_upper_band_boundary() {
        // pw exactly at (high+1)/2 leaves the snap band and goes full on.
        assert_eq!(duty_cycle(0.95 * 2.5, 2.5, 0.1, 0.9), 1.0);
    }

    #[test]
    fn duty_cycle_is_idempotent_under_reapplication() {
        for cs in [0.0, 0.06, 0.2, 0.9, 1.25, 2.0, 2.3, 3.0] {
            let once = duty_cycle(cs, 2.5, 0.1, 0.9);
            let twice = duty_cycle(once * 2.5, 2.5, 0.1, 0.9);
            assert!((once - twice).abs() < 1e-12, "cs={cs}: {once} vs {twice}");
        }
    }

    #[test]
    fn nan_control_signal_passes_through() {
        assert!(duty_cycle(f64::NAN, 2.5, 0.1, 0.9).is_nan());
    }
}
