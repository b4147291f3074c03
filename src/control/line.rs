//! line.rs
//! Lateral line-position control.
//!
//! The line offset is turned into a yaw-rate target which is handed to the
//! velocity loop together with a forward bias voltage (cruise by default,
//! overridable per call e.g. for the slow reactor approach).

use crate::control::intersection::IntersectionDetector;
use crate::control::pid::{PidConfig, PidController};
use crate::control::velocity::VelocityController;
use crate::hardware::{Actuator, Imu, LineSensor};

pub struct LineFollower {
    pid: PidController,
    cruise_voltage: f64,
    detector: IntersectionDetector,
}

impl LineFollower {
    pub fn new(config: PidConfig, cruise_voltage: f64) -> Self {
        Self {
            pid: PidController::new(config),
            cruise_voltage,
            detector: IntersectionDetector::new(),
        }
    }

    pub fn cruise_voltage(&self) -> f64 {
        self.cruise_voltage
    }

    #[allow(clippy::too_many_arguments)]
    pub fn drive(
        &mut self,
        voltage: Option<f64>,
        line: &mut dyn LineSensor,
        velocity: &mut VelocityController,
        imu: &mut dyn Imu,
        left: &mut dyn Actuator,
        right: &mut dyn Actuator,
        now: f64,
    ) {
        let rate = self.pid.update(line.line_position(), now);
        let v = voltage.unwrap_or(self.cruise_voltage);
        velocity.drive(rate, v, imu, left, right, now);
    }

    /// Rising edge of "on black" since the previous call.
    pub fn hit_intersection(&mut self, line: &mut dyn LineSensor) -> bool {
        self.detector.update(line.on_black())
    }

    pub fn reset(&mut self) {
        self.pid.reset();
    }

    pub fn pid(&self) -> &PidController {
        &self.pid
    }
}
