//! heading.rs
//! Absolute heading control: turn in place toward a target heading.

use std::f64::consts::{PI, TAU};

use crate::control::pid::{PidConfig, PidController, Progress};
use crate::hardware::{Actuator, Imu};

/// Signed rotation from `current` to `target`, both in `[0, 2π)`.
///
/// Result lies in `(-π, π]` and always takes the shorter direction; a
/// positive value means turning toward increasing heading.
pub fn heading_error(target: f64, current: f64) -> f64 {
    let err = if target <= PI {
        if current <= target + PI {
            target - current
        } else {
            target + TAU - current
        }
    } else if current <= target - PI {
        target - TAU - current
    } else {
        target - current
    };
    // Exactly opposite headings land on -π in the split above
    if err <= -PI { err + TAU } else { err }
}

pub struct HeadingController {
    pid: PidController,
    target: f64,
    error_tolerance: f64,
    rate_tolerance: f64,
}

impl HeadingController {
    pub fn new(config: PidConfig, error_tolerance: f64, rate_tolerance: f64) -> Self {
        Self {
            pid: PidController::new(config),
            target: 0.0,
            error_tolerance,
            rate_tolerance,
        }
    }

    pub fn begin(&mut self, target: f64) {
        self.target = target;
    }

    pub fn target(&self) -> f64 {
        self.target
    }

    /// One control iteration. Applies `+v` left / `-v` right; brakes both
    /// once the loop has settled.
    pub fn poll(
        &mut self,
        imu: &mut dyn Imu,
        left: &mut dyn Actuator,
        right: &mut dyn Actuator,
        now: f64,
    ) -> Progress {
        let err = heading_error(self.target, imu.heading());
        let vdd = self.pid.update(err, now);
        left.set_voltage(vdd);
        right.set_voltage(-vdd);

        if self.pid.is_stabilized(self.error_tolerance, self.rate_tolerance) {
            left.brake();
            right.brake();
            Progress::Converged
        } else {
            Progress::InProgress
        }
    }

    pub fn reset(&mut self) {
        self.pid.reset();
    }

    pub fn pid(&self) -> &PidController {
        &self.pid
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn test_simple_errors() {
        assert_relative_eq!(heading_error(FRAC_PI_2, 0.0), FRAC_PI_2);
        assert_relative_eq!(heading_error(0.0, FRAC_PI_2), -FRAC_PI_2);
        assert_relative_eq!(heading_error(3.0 * FRAC_PI_2, FRAC_PI_2), PI);
    }

    #[test]
    fn test_wraps_through_zero() {
        // From 350 deg to 10 deg is +20 deg, not -340
        let err = heading_error(10f64.to_radians(), 350f64.to_radians());
        assert_relative_eq!(err, 20f64.to_radians(), epsilon = 1e-9);
        let err = heading_error(350f64.to_radians(), 10f64.to_radians());
        assert_relative_eq!(err, -20f64.to_radians(), epsilon = 1e-9);
    }

    #[test]
    fn test_opposite_heading_is_plus_pi() {
        assert_relative_eq!(heading_error(0.0, PI), PI);
        assert_relative_eq!(heading_error(PI, 0.0), PI);
    }

    #[test]
    fn test_error_is_shortest_rotation_over_grid() {
        let n = 72;
        for i in 0..n {
            for j in 0..n {
                let target = TAU * i as f64 / n as f64;
                let current = TAU * j as f64 / n as f64;
                let err = heading_error(target, current);
                assert!(err > -PI - 1e-12 && err <= PI + 1e-12, "{target} {current} -> {err}");
                // Rotating current by err lands on target (mod 2π)
                let landed = (current + err).rem_euclid(TAU);
                let diff = (landed - target).abs();
                assert!(diff < 1e-9 || (TAU - diff) < 1e-9);
                // No rotation shorter than |err| exists
                let alt = if err >= 0.0 { err - TAU } else { err + TAU };
                assert!(err.abs() <= alt.abs() + 1e-12);
            }
        }
    }
}
