//! Hardware collaborators consumed by the control core.
//!
//! Only the logical contracts live here; pin mapping and driver
//! initialisation belong to whichever board crate implements them.
//! `sim` provides a kinematic implementation of every trait, `mock` a
//! scriptable one for tests.

pub mod encoder;
pub mod mock;
pub mod sim;

/// Three-state indicator output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Display {
    Red,
    Green,
    Blue,
}

/// One drive or arm motor.
pub trait Actuator: Send {
    fn enable(&mut self);
    fn disable(&mut self);
    /// Signed terminal voltage; ignored while disabled.
    fn set_voltage(&mut self, volts: f64);
    fn brake(&mut self);
    /// Cumulative shaft angle from the encoder (rad)
    fn angle(&self) -> f64;
    fn zero_angle(&mut self);
}

pub trait Imu: Send {
    /// Heading relative to the startup reference, in `[0, 2π)`
    fn heading(&mut self) -> f64;
    /// Angular rate about the vertical axis (rad/s)
    fn angular_rate_z(&mut self) -> f64;
}

pub trait LineSensor: Send {
    /// Signed lateral offset of the line under the array
    fn line_position(&mut self) -> f64;
    fn on_black(&mut self) -> bool;
}

/// Arm angle feedback (10-bit ADC counts).
pub trait Potentiometer: Send {
    fn read(&mut self) -> f64;
}

pub trait Gripper: Send {
    fn open(&mut self, now: f64);
    fn close(&mut self, now: f64);
    /// True once the grip duration has elapsed since the last open/close.
    fn ready(&self, now: f64) -> bool;
}

pub trait LimitSwitch: Send {
    fn pressed(&mut self) -> bool;
}

pub trait Indicator: Send {
    fn show(&mut self, display: Display);
}

/// Every device the robot loop drives, boxed so boards and the simulator
/// can be swapped without touching the control code.
pub struct Hardware {
    pub left: Box<dyn Actuator>,
    pub right: Box<dyn Actuator>,
    pub arm: Box<dyn Actuator>,
    pub imu: Box<dyn Imu>,
    pub line: Box<dyn LineSensor>,
    pub arm_pot: Box<dyn Potentiometer>,
    pub gripper: Box<dyn Gripper>,
    pub reactor_switch: Box<dyn LimitSwitch>,
    pub tube_switch: Box<dyn LimitSwitch>,
    pub indicator: Box<dyn Indicator>,
}

impl Hardware {
    pub fn brake_drive(&mut self) {
        self.left.brake();
        self.right.brake();
    }

    pub fn zero_drive_encoders(&mut self) {
        self.left.zero_angle();
        self.right.zero_angle();
    }

    /// Sum of both wheel angles since the last zero.
    pub fn combined_wheel_angle(&self) -> f64 {
        self.left.angle() + self.right.angle()
    }

    pub fn enable_all(&mut self) {
        self.left.enable();
        self.right.enable();
        self.arm.enable();
    }

    pub fn disable_all(&mut self) {
        self.left.disable();
        self.right.disable();
        self.arm.disable();
    }
}
