//! mock.rs
//! Scriptable hardware for tests and benches.
//!
//! Every device reads from / writes to one shared `Panel`, so a test can set
//! sensor values between cycles and inspect the last actuator commands.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::hardware::{
    Actuator, Display, Gripper, Hardware, Imu, Indicator, LimitSwitch, LineSensor, Potentiometer,
};

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MotorState {
    pub enabled: bool,
    pub volts: f64,
    pub braked: bool,
    pub angle: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GripperCommand {
    Open,
    Close,
}

#[derive(Debug, Clone, Default)]
pub struct Panel {
    pub left: MotorState,
    pub right: MotorState,
    pub arm: MotorState,
    pub heading: f64,
    pub angular_rate_z: f64,
    pub line_position: f64,
    pub on_black: bool,
    pub arm_pot: f64,
    pub reactor_pressed: bool,
    pub tube_pressed: bool,
    pub gripper_ready: bool,
    pub gripper_last: Option<GripperCommand>,
    pub display: Option<Display>,
}

#[derive(Clone, Copy)]
enum Axis {
    Left,
    Right,
    Arm,
}

#[derive(Clone, Copy)]
enum Switch {
    Reactor,
    Tube,
}

/// Handle on the shared panel; clones observe the same devices.
#[derive(Clone, Default)]
pub struct MockPanel {
    inner: Arc<Mutex<Panel>>,
}

impl MockPanel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Boxed devices wired to this panel.
    pub fn hardware(&self) -> Hardware {
        Hardware {
            left: Box::new(MockMotor { panel: self.inner.clone(), axis: Axis::Left }),
            right: Box::new(MockMotor { panel: self.inner.clone(), axis: Axis::Right }),
            arm: Box::new(MockMotor { panel: self.inner.clone(), axis: Axis::Arm }),
            imu: Box::new(MockDevice { panel: self.inner.clone() }),
            line: Box::new(MockDevice { panel: self.inner.clone() }),
            arm_pot: Box::new(MockDevice { panel: self.inner.clone() }),
            gripper: Box::new(MockDevice { panel: self.inner.clone() }),
            reactor_switch: Box::new(MockSwitch { panel: self.inner.clone(), which: Switch::Reactor }),
            tube_switch: Box::new(MockSwitch { panel: self.inner.clone(), which: Switch::Tube }),
            indicator: Box::new(MockDevice { panel: self.inner.clone() }),
        }
    }

    /// Mutate the panel in place.
    pub fn set<F: FnOnce(&mut Panel)>(&self, f: F) {
        f(&mut self.inner.lock());
    }

    pub fn snapshot(&self) -> Panel {
        self.inner.lock().clone()
    }
}

struct MockMotor {
    panel: Arc<Mutex<Panel>>,
    axis: Axis,
}

impl MockMotor {
    fn with<R>(&self, f: impl FnOnce(&mut MotorState) -> R) -> R {
        let mut panel = self.panel.lock();
        let motor = match self.axis {
            Axis::Left => &mut panel.left,
            Axis::Right => &mut panel.right,
            Axis::Arm => &mut panel.arm,
        };
        f(motor)
    }
}

impl Actuator for MockMotor {
    fn enable(&mut self) {
        self.with(|m| m.enabled = true);
    }

    fn disable(&mut self) {
        self.with(|m| {
            m.enabled = false;
            m.volts = 0.0;
        });
    }

    fn set_voltage(&mut self, volts: f64) {
        self.with(|m| {
            if m.enabled {
                m.volts = volts;
                m.braked = false;
            }
        });
    }

    fn brake(&mut self) {
        self.with(|m| {
            m.volts = 0.0;
            m.braked = true;
        });
    }

    fn angle(&self) -> f64 {
        self.with(|m| m.angle)
    }

    fn zero_angle(&mut self) {
        self.with(|m| m.angle = 0.0);
    }
}

struct MockSwitch {
    panel: Arc<Mutex<Panel>>,
    which: Switch,
}

impl LimitSwitch for MockSwitch {
    fn pressed(&mut self) -> bool {
        let panel = self.panel.lock();
        match self.which {
            Switch::Reactor => panel.reactor_pressed,
            Switch::Tube => panel.tube_pressed,
        }
    }
}

struct MockDevice {
    panel: Arc<Mutex<Panel>>,
}

impl Imu for MockDevice {
    fn heading(&mut self) -> f64 {
        self.panel.lock().heading
    }

    fn angular_rate_z(&mut self) -> f64 {
        self.panel.lock().angular_rate_z
    }
}

impl LineSensor for MockDevice {
    fn line_position(&mut self) -> f64 {
        self.panel.lock().line_position
    }

    fn on_black(&mut self) -> bool {
        self.panel.lock().on_black
    }
}

impl Potentiometer for MockDevice {
    fn read(&mut self) -> f64 {
        self.panel.lock().arm_pot
    }
}

impl Gripper for MockDevice {
    fn open(&mut self, _now: f64) {
        let mut panel = self.panel.lock();
        panel.gripper_last = Some(GripperCommand::Open);
        panel.gripper_ready = false;
    }

    fn close(&mut self, _now: f64) {
        let mut panel = self.panel.lock();
        panel.gripper_last = Some(GripperCommand::Close);
        panel.gripper_ready = false;
    }

    fn ready(&self, _now: f64) -> bool {
        self.panel.lock().gripper_ready
    }
}

impl Indicator for MockDevice {
    fn show(&mut self, display: Display) {
        self.panel.lock().display = Some(display);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_motor_ignores_voltage() {
        let panel = MockPanel::new();
        let mut hw = panel.hardware();
        hw.left.set_voltage(3.0);
        assert_eq!(panel.snapshot().left.volts, 0.0);

        hw.enable_all();
        hw.left.set_voltage(3.0);
        hw.arm.set_voltage(-2.0);
        let snap = panel.snapshot();
        assert_eq!(snap.left.volts, 3.0);
        assert_eq!(snap.arm.volts, -2.0);

        hw.disable_all();
        assert_eq!(panel.snapshot().arm.volts, 0.0);
    }

    #[test]
    fn test_combined_wheel_angle_and_zero() {
        let panel = MockPanel::new();
        let mut hw = panel.hardware();
        panel.set(|p| {
            p.left.angle = 2.0;
            p.right.angle = 3.5;
        });
        assert_eq!(hw.combined_wheel_angle(), 5.5);
        hw.zero_drive_encoders();
        assert_eq!(hw.combined_wheel_angle(), 0.0);
    }
}
