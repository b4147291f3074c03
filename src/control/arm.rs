//! arm.rs
//! Arm angle control from the potentiometer setpoint to a direct motor voltage.

use crate::control::pid::{PidConfig, PidController, Progress};
use crate::hardware::{Actuator, Potentiometer};

pub struct ArmController {
    pid: PidController,
    target: f64,
    error_tolerance: f64,
    rate_tolerance: f64,
}

impl ArmController {
    pub fn new(config: PidConfig, error_tolerance: f64, rate_tolerance: f64) -> Self {
        Self {
            pid: PidController::new(config),
            target: 0.0,
            error_tolerance,
            rate_tolerance,
        }
    }

    pub fn begin(&mut self, setpoint: f64) {
        self.target = setpoint;
    }

    pub fn target(&self) -> f64 {
        self.target
    }

    pub fn poll(&mut self, pot: &mut dyn Potentiometer, motor: &mut dyn Actuator, now: f64) -> Progress {
        let volts = self.pid.update(self.target - pot.read(), now);
        motor.set_voltage(volts);
        if self.pid.is_stabilized(self.error_tolerance, self.rate_tolerance) {
            motor.brake();
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
