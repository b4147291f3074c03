//! pid.rs
//! Generic PID primitive shared by every motion loop.
//!
//! - Output clamped to `[output_min, output_max]`.
//! - Rectangular integration over the elapsed time between calls. The
//!   accumulator is bounded so `ki * integral` alone stays inside the clamp.
//! - Idle reset: a call arriving more than `reset_after_s` after the previous
//!   one starts from a clean history (integral, previous error, timestamp).
//! - Convergence is observed by the caller through `is_stabilized`; the
//!   controller never declares itself done.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Gains, clamp bounds and idle-reset timeout for one controller.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PidConfig {
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
    pub output_min: f64,
    pub output_max: f64,
    /// Seconds of disuse after which history is discarded (None = never)
    #[serde(default)]
    pub reset_after_s: Option<f64>,
}

impl PidConfig {
    pub fn new(kp: f64, ki: f64, kd: f64) -> Self {
        Self {
            kp,
            ki,
            kd,
            output_min: f64::NEG_INFINITY,
            output_max: f64::INFINITY,
            reset_after_s: None,
        }
    }

    /// Symmetric output clamp `[-limit, +limit]`
    pub fn with_limit(mut self, limit: f64) -> Self {
        self.output_min = -limit;
        self.output_max = limit;
        self
    }

    pub fn with_reset_after(mut self, seconds: f64) -> Self {
        self.reset_after_s = Some(seconds);
        self
    }

    pub fn validate(&self, name: &str) -> Result<()> {
        if !(self.output_min < self.output_max) {
            return Err(Error::InvalidConfig(format!(
                "{name}: output_min {} must be below output_max {}",
                self.output_min, self.output_max
            )));
        }
        if let Some(t) = self.reset_after_s {
            if !(t > 0.0) {
                return Err(Error::InvalidConfig(format!(
                    "{name}: reset_after_s must be positive, got {t}"
                )));
            }
        }
        Ok(())
    }
}

/// Result of polling a loop that has a convergence target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    InProgress,
    Converged,
}

impl Progress {
    #[inline]
    pub fn is_converged(self) -> bool {
        self == Progress::Converged
    }
}

#[derive(Debug, Clone)]
pub struct PidController {
    config: PidConfig,
    integral: f64,
    prev_error: Option<f64>,
    last_time: Option<f64>,
    last_error: f64,
    last_rate: f64,
}

impl PidController {
    pub fn new(config: PidConfig) -> Self {
        Self {
            config,
            integral: 0.0,
            prev_error: None,
            last_time: None,
            last_error: 0.0,
            last_rate: 0.0,
        }
    }

    /// Feed one error sample taken at `now` (seconds) and return the clamped output.
    pub fn update(&mut self, error: f64, now: f64) -> f64 {
        let dt = match self.last_time {
            Some(last) => {
                let dt = now - last;
                match self.config.reset_after_s {
                    Some(limit) if dt > limit => {
                        self.reset();
                        0.0
                    }
                    _ => dt.max(0.0),
                }
            }
            None => 0.0,
        };

        if dt > 0.0 {
            self.integral += error * dt;
            // Anti-windup: the integral term alone may not exceed the clamp
            if self.config.ki != 0.0 {
                let a = self.config.output_min / self.config.ki;
                let b = self.config.output_max / self.config.ki;
                self.integral = self.integral.clamp(a.min(b), a.max(b));
            }
        }

        let rate = match self.prev_error {
            Some(prev) if dt > 0.0 => (error - prev) / dt,
            _ => 0.0,
        };

        self.prev_error = Some(error);
        self.last_time = Some(now);
        self.last_error = error;
        self.last_rate = rate;

        let output = self.config.kp * error + self.config.ki * self.integral + self.config.kd * rate;
        output.clamp(self.config.output_min, self.config.output_max)
    }

    /// True iff the latest error and its rate of change are both inside tolerance.
    /// Always false before the first `update`.
    pub fn is_stabilized(&self, error_tolerance: f64, rate_tolerance: f64) -> bool {
        self.last_time.is_some()
            && self.last_error.abs() <= error_tolerance
            && self.last_rate.abs() <= rate_tolerance
    }

    pub fn reset(&mut self) {
        self.integral = 0.0;
        self.prev_error = None;
        self.last_time = None;
        self.last_error = 0.0;
        self.last_rate = 0.0;
    }

    pub fn integral(&self) -> f64 {
        self.integral
    }

    pub fn config(&self) -> &PidConfig {
        &self.config
    }
}
