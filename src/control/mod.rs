//! Motion control stack: four independent PID loops plus the intersection
//! detector, each invoked once per cycle by the sequencer.
//!
//! No loop shares integral or derivative state with another.

pub mod arm;
pub mod heading;
pub mod intersection;
pub mod line;
pub mod pid;
pub mod velocity;

use crate::config::RobotConfig;
use crate::hardware::Hardware;

pub use arm::ArmController;
pub use heading::{HeadingController, heading_error};
pub use intersection::IntersectionDetector;
pub use line::LineFollower;
pub use pid::{PidConfig, PidController, Progress};
pub use velocity::VelocityController;

pub struct MotionStack {
    pub heading: HeadingController,
    pub velocity: VelocityController,
    pub line: LineFollower,
    pub arm: ArmController,
}

impl MotionStack {
    pub fn new(config: &RobotConfig) -> Self {
        let (h_err, h_rate) = config.tolerances.heading;
        let (a_err, a_rate) = config.tolerances.arm;
        Self {
            heading: HeadingController::new(config.pid.heading, h_err, h_rate),
            velocity: VelocityController::new(config.pid.velocity),
            line: LineFollower::new(config.pid.line, config.drive.cruise_voltage),
            arm: ArmController::new(config.pid.arm, a_err, a_rate),
        }
    }

    pub fn begin_turn(&mut self, heading: f64) {
        self.heading.begin(heading);
    }

    pub fn poll_turn(&mut self, hw: &mut Hardware, now: f64) -> Progress {
        self.heading
            .poll(hw.imu.as_mut(), hw.left.as_mut(), hw.right.as_mut(), now)
    }

    /// Drive with a yaw-rate target and forward bias voltage.
    pub fn set_velocity(&mut self, hw: &mut Hardware, rate: f64, voltage: f64, now: f64) {
        self.velocity
            .drive(rate, voltage, hw.imu.as_mut(), hw.left.as_mut(), hw.right.as_mut(), now);
    }

    /// Line-follow at cruise voltage, or at `voltage` if given.
    pub fn follow_line(&mut self, hw: &mut Hardware, voltage: Option<f64>, now: f64) {
        self.line.drive(
            voltage,
            hw.line.as_mut(),
            &mut self.velocity,
            hw.imu.as_mut(),
            hw.left.as_mut(),
            hw.right.as_mut(),
            now,
        );
    }

    pub fn hit_intersection(&mut self, hw: &mut Hardware) -> bool {
        self.line.hit_intersection(hw.line.as_mut())
    }

    pub fn begin_arm(&mut self, setpoint: f64) {
        self.arm.begin(setpoint);
    }

    pub fn poll_arm(&mut self, hw: &mut Hardware, now: f64) -> Progress {
        self.arm.poll(hw.arm_pot.as_mut(), hw.arm.as_mut(), now)
    }

    /// Clear every loop's history (used while the field has us disabled).
    pub fn reset_all(&mut self) {
        self.heading.reset();
        self.velocity.reset();
        self.line.reset();
        self.arm.reset();
    }
}
