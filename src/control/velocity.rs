//! velocity.rs
//! Angular-velocity control for the differential drive.
//!
//! Holds a target yaw rate and a forward bias voltage; the correction is
//! subtracted on the left wheel and added on the right. Runs continuously
//! while driving, so it has no convergence signal.

use crate::control::pid::{PidConfig, PidController};
use crate::hardware::{Actuator, Imu};

pub struct VelocityController {
    pid: PidController,
    target_rate: f64,
    bias_voltage: f64,
}

impl VelocityController {
    pub fn new(config: PidConfig) -> Self {
        Self {
            pid: PidController::new(config),
            target_rate: 0.0,
            bias_voltage: 0.0,
        }
    }

    /// Set the targets and run one iteration.
    pub fn drive(
        &mut self,
        target_rate: f64,
        bias_voltage: f64,
        imu: &mut dyn Imu,
        left: &mut dyn Actuator,
        right: &mut dyn Actuator,
        now: f64,
    ) {
        self.target_rate = target_rate;
        self.bias_voltage = bias_voltage;
        let correction = self.pid.update(target_rate - imu.angular_rate_z(), now);
        left.set_voltage(bias_voltage - correction);
        right.set_voltage(bias_voltage + correction);
    }

    pub fn target_rate(&self) -> f64 {
        self.target_rate
    }

    pub fn bias_voltage(&self) -> f64 {
        self.bias_voltage
    }

    pub fn reset(&mut self) {
        self.pid.reset();
    }

    pub fn pid(&self) -> &PidController {
        &self.pid
    }
}
