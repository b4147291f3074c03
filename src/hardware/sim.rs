//! sim.rs
//! Kinematic field simulator implementing every hardware trait.
//!
//! Differential drive on the unit intersection grid: heading 0 faces +y and
//! grows clockwise, so heading π/2 faces +x. Wheel speed is proportional to
//! voltage (no motor dynamics). The line sensor sits `sensor_lead` ahead of
//! the axle. Reactor walls stop the robot at x = 0.75 / 6.25 on the y = 0
//! row, tube mouths stop it at |y| = 0.75 and press the tube switch.
//!
//! Encoders are fed one quadrature edge at a time, exactly as the pin-change
//! interrupts would, so the wheel angle the control code reads comes out of
//! the same atomic counter the board uses.

use std::f64::consts::TAU;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::hardware::encoder::{QuadratureEncoder, QuadraturePhase};
use crate::hardware::{
    Actuator, Display, Gripper, Hardware, Imu, Indicator, LimitSwitch, LineSensor, Potentiometer,
};

// Field geometry (grid cells)
const REACTOR_WALL_MIN_X: f64 = 0.75;
const REACTOR_WALL_MAX_X: f64 = 6.25;
const TUBE_MOUTH_Y: f64 = 0.75;
const ROW_HALF_WIDTH: f64 = 0.3;
const INTERSECTION_RADIUS: f64 = 0.04;
const LINE_SENSOR_GAIN: f64 = 10.0;

#[derive(Debug, Clone)]
pub struct SimParams {
    /// Ground speed per volt (cells/s/V)
    pub speed_per_volt: f64,
    pub track_width: f64,
    pub wheel_radius: f64,
    /// Line sensor distance ahead of the axle (cells)
    pub sensor_lead: f64,
    /// Potentiometer counts per second per arm volt
    pub arm_rate_per_volt: f64,
    pub gripper_time_s: f64,
    pub counts_per_rev: f64,
}

impl Default for SimParams {
    fn default() -> Self {
        let sensor_lead = 0.15;
        Self {
            speed_per_volt: 0.1,
            track_width: 0.6,
            // inching 2.465 rad per wheel moves the axle onto the sensor's spot
            wheel_radius: sensor_lead / 2.465,
            sensor_lead,
            arm_rate_per_volt: 200.0,
            gripper_time_s: 1.0,
            counts_per_rev: crate::hardware::encoder::DEFAULT_COUNTS_PER_REV,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    pub x: f64,
    pub y: f64,
    pub heading: f64,
}

#[derive(Debug, Default)]
struct Motor {
    enabled: bool,
    volts: f64,
}

impl Motor {
    fn effective(&self) -> f64 {
        if self.enabled { self.volts } else { 0.0 }
    }
}

#[derive(Debug)]
struct Wheel {
    motor: Motor,
    encoder: Arc<QuadratureEncoder>,
    phase: QuadraturePhase,
    residual_edges: f64,
}

impl Wheel {
    fn new(counts_per_rev: f64) -> Self {
        Self {
            motor: Motor::default(),
            encoder: Arc::new(QuadratureEncoder::new(counts_per_rev)),
            phase: QuadraturePhase::default(),
            residual_edges: 0.0,
        }
    }

    /// Emit the quadrature edges for `delta` rad of shaft rotation.
    fn turn(&mut self, delta: f64, counts_per_rev: f64) {
        let edges = delta * counts_per_rev / TAU + self.residual_edges;
        let whole = edges.trunc();
        self.residual_edges = edges - whole;
        let forward = whole > 0.0;
        for _ in 0..(whole.abs() as u64) {
            self.phase.step(forward, &self.encoder);
        }
    }
}

#[derive(Debug)]
struct World {
    params: SimParams,
    pose: Pose,
    heading_rate: f64,
    left: Wheel,
    right: Wheel,
    arm: Motor,
    arm_pot: f64,
    display: Option<Display>,
    elapsed: f64,
}

impl World {
    fn sensor_point(&self) -> (f64, f64) {
        let (s, c) = self.pose.heading.sin_cos();
        (
            self.pose.x + self.params.sensor_lead * s,
            self.pose.y + self.params.sensor_lead * c,
        )
    }

    fn advance(&mut self, dt: f64) {
        let vl = self.left.motor.effective() * self.params.speed_per_volt;
        let vr = self.right.motor.effective() * self.params.speed_per_volt;
        let forward = 0.5 * (vl + vr);
        self.heading_rate = (vl - vr) / self.params.track_width;

        let p = &mut self.pose;
        p.heading = (p.heading + self.heading_rate * dt).rem_euclid(TAU);
        let (s, c) = p.heading.sin_cos();
        p.x += forward * s * dt;
        p.y += forward * c * dt;

        // Walls
        if p.y.abs() < ROW_HALF_WIDTH {
            p.x = p.x.clamp(REACTOR_WALL_MIN_X, REACTOR_WALL_MAX_X);
        }
        p.y = p.y.clamp(-TUBE_MOUTH_Y, TUBE_MOUTH_Y);

        let cpr = self.params.counts_per_rev;
        let r = self.params.wheel_radius;
        self.left.turn(vl * dt / r, cpr);
        self.right.turn(vr * dt / r, cpr);

        self.arm_pot = (self.arm_pot + self.arm.effective() * self.params.arm_rate_per_volt * dt).clamp(0.0, 1023.0);
        self.elapsed += dt;
    }

    /// Signed offset of the followed line, positive when it lies to the left.
    fn line_offset(&self) -> f64 {
        let (sx, sy) = self.sensor_point();
        let (s, c) = self.pose.heading.sin_cos();
        let offset = if s.abs() >= c.abs() {
            // Travelling along the y = 0 row
            -sy * s
        } else {
            (sx - sx.round()) * c
        };
        (offset * LINE_SENSOR_GAIN).clamp(-1.0, 1.0)
    }

    fn on_black(&self) -> bool {
        let (sx, sy) = self.sensor_point();
        let (gx, gy) = (sx.round(), sy.round());
        let on_grid = match gy as i32 {
            0 => (1.0..=6.0).contains(&gx),
            -1 | 1 => (2.0..=5.0).contains(&gx),
            _ => false,
        };
        on_grid && (sx - gx).hypot(sy - gy) <= INTERSECTION_RADIUS
    }

    fn reactor_pressed(&self) -> bool {
        let p = &self.pose;
        p.y.abs() < ROW_HALF_WIDTH && (p.x <= REACTOR_WALL_MIN_X + 1e-6 || p.x >= REACTOR_WALL_MAX_X - 1e-6)
    }

    fn tube_pressed(&self) -> bool {
        self.pose.y.abs() >= TUBE_MOUTH_Y - 1e-6
    }
}

/// Handle on the simulated field. Clones share the same world.
#[derive(Clone)]
pub struct SimWorld {
    inner: Arc<Mutex<World>>,
}

impl SimWorld {
    pub fn new(params: SimParams, start: Pose, arm_pot: f64) -> Self {
        let cpr = params.counts_per_rev;
        Self {
            inner: Arc::new(Mutex::new(World {
                params,
                pose: start,
                heading_rate: 0.0,
                left: Wheel::new(cpr),
                right: Wheel::new(cpr),
                arm: Motor::default(),
                arm_pot,
                display: None,
                elapsed: 0.0,
            })),
        }
    }

    /// Robot on intersection `(x, y)` facing +y, arm halfway.
    pub fn at_cell(params: SimParams, x: i32, y: i32) -> Self {
        Self::new(params, Pose { x: x as f64, y: y as f64, heading: 0.0 }, 400.0)
    }

    pub fn hardware(&self) -> Hardware {
        let (left_enc, right_enc, gripper_time) = {
            let w = self.inner.lock();
            (w.left.encoder.clone(), w.right.encoder.clone(), w.params.gripper_time_s)
        };
        Hardware {
            left: Box::new(SimMotor { world: self.inner.clone(), axis: Axis::Left, encoder: Some(left_enc) }),
            right: Box::new(SimMotor { world: self.inner.clone(), axis: Axis::Right, encoder: Some(right_enc) }),
            arm: Box::new(SimMotor { world: self.inner.clone(), axis: Axis::Arm, encoder: None }),
            imu: Box::new(SimSensor { world: self.inner.clone() }),
            line: Box::new(SimSensor { world: self.inner.clone() }),
            arm_pot: Box::new(SimSensor { world: self.inner.clone() }),
            gripper: Box::new(SimGripper::new(gripper_time)),
            reactor_switch: Box::new(SimSwitch { world: self.inner.clone(), which: SwitchKind::Reactor }),
            tube_switch: Box::new(SimSwitch { world: self.inner.clone(), which: SwitchKind::Tube }),
            indicator: Box::new(SimSensor { world: self.inner.clone() }),
        }
    }

    /// Integrate the world forward by `dt` seconds.
    pub fn advance(&self, dt: f64) {
        self.inner.lock().advance(dt);
    }

    pub fn pose(&self) -> Pose {
        self.inner.lock().pose
    }

    pub fn arm_pot(&self) -> f64 {
        self.inner.lock().arm_pot
    }

    pub fn display(&self) -> Option<Display> {
        self.inner.lock().display
    }

    pub fn elapsed(&self) -> f64 {
        self.inner.lock().elapsed
    }

    /// (left, right, arm) voltages actually reaching the motors.
    pub fn applied_voltages(&self) -> (f64, f64, f64) {
        let w = self.inner.lock();
        (w.left.motor.effective(), w.right.motor.effective(), w.arm.effective())
    }
}

#[derive(Clone, Copy)]
enum Axis {
    Left,
    Right,
    Arm,
}

struct SimMotor {
    world: Arc<Mutex<World>>,
    axis: Axis,
    encoder: Option<Arc<QuadratureEncoder>>,
}

impl SimMotor {
    fn with<R>(&self, f: impl FnOnce(&mut Motor) -> R) -> R {
        let mut w = self.world.lock();
        let motor = match self.axis {
            Axis::Left => &mut w.left.motor,
            Axis::Right => &mut w.right.motor,
            Axis::Arm => &mut w.arm,
        };
        f(motor)
    }
}

impl Actuator for SimMotor {
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
            }
        });
    }

    fn brake(&mut self) {
        self.with(|m| m.volts = 0.0);
    }

    // Lock-free: same path as the board's interrupt-fed counter
    fn angle(&self) -> f64 {
        self.encoder.as_ref().map_or(0.0, |e| e.angle())
    }

    fn zero_angle(&mut self) {
        if let Some(e) = &self.encoder {
            e.zero();
        }
    }
}

struct SimSensor {
    world: Arc<Mutex<World>>,
}

impl Imu for SimSensor {
    fn heading(&mut self) -> f64 {
        self.world.lock().pose.heading
    }

    // z points up: clockwise heading growth reads negative
    fn angular_rate_z(&mut self) -> f64 {
        -self.world.lock().heading_rate
    }
}

impl LineSensor for SimSensor {
    fn line_position(&mut self) -> f64 {
        self.world.lock().line_offset()
    }

    fn on_black(&mut self) -> bool {
        self.world.lock().on_black()
    }
}

impl Potentiometer for SimSensor {
    fn read(&mut self) -> f64 {
        self.world.lock().arm_pot
    }
}

impl Indicator for SimSensor {
    fn show(&mut self, display: Display) {
        self.world.lock().display = Some(display);
    }
}

#[derive(Clone, Copy)]
enum SwitchKind {
    Reactor,
    Tube,
}

struct SimSwitch {
    world: Arc<Mutex<World>>,
    which: SwitchKind,
}

impl LimitSwitch for SimSwitch {
    fn pressed(&mut self) -> bool {
        let w = self.world.lock();
        match self.which {
            SwitchKind::Reactor => w.reactor_pressed(),
            SwitchKind::Tube => w.tube_pressed(),
        }
    }
}

/// Servo gripper: a move completes a fixed time after it was commanded.
#[derive(Debug, Clone)]
pub struct SimGripper {
    duration_s: f64,
    started: Option<f64>,
    closed: bool,
}

impl SimGripper {
    pub fn new(duration_s: f64) -> Self {
        Self { duration_s, started: None, closed: false }
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl Gripper for SimGripper {
    fn open(&mut self, now: f64) {
        self.closed = false;
        self.started = Some(now);
    }

    fn close(&mut self, now: f64) {
        self.closed = true;
        self.started = Some(now);
    }

    fn ready(&self, now: f64) -> bool {
        self.started.is_none_or(|t| now - t >= self.duration_s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn test_straight_drive_counts_both_encoders() {
        let world = SimWorld::at_cell(SimParams::default(), 2, 0);
        let mut hw = world.hardware();
        hw.enable_all();
        hw.left.set_voltage(4.0);
        hw.right.set_voltage(4.0);
        for _ in 0..10 {
            world.advance(0.02);
        }
        let pose = world.pose();
        assert_relative_eq!(pose.x, 2.0, epsilon = 1e-9);
        assert_relative_eq!(pose.y, 0.08, epsilon = 1e-9);
        // 0.08 cells over the wheel radius, both wheels, within one edge each
        let expected = 2.0 * 0.08 / SimParams::default().wheel_radius;
        let edge = TAU / crate::hardware::encoder::DEFAULT_COUNTS_PER_REV;
        assert!((hw.combined_wheel_angle() - expected).abs() <= 2.0 * edge);
    }

    #[test]
    fn test_left_faster_turns_clockwise() {
        let world = SimWorld::at_cell(SimParams::default(), 2, 0);
        let mut hw = world.hardware();
        hw.enable_all();
        hw.left.set_voltage(3.0);
        hw.right.set_voltage(-3.0);
        world.advance(0.1);
        assert!(world.pose().heading > 0.0 && world.pose().heading < FRAC_PI_2);
        assert!(hw.imu.angular_rate_z() < 0.0);
    }

    #[test]
    fn test_disabled_motors_do_not_move() {
        let world = SimWorld::at_cell(SimParams::default(), 3, 0);
        let mut hw = world.hardware();
        hw.left.set_voltage(4.0);
        hw.right.set_voltage(4.0);
        world.advance(1.0);
        assert_eq!(world.pose().y, 0.0);
    }

    #[test]
    fn test_intersection_seen_under_sensor() {
        let params = SimParams::default();
        let lead = params.sensor_lead;
        let world = SimWorld::new(params, Pose { x: 3.0 - lead, y: 0.0, heading: FRAC_PI_2 }, 400.0);
        let mut hw = world.hardware();
        assert!(hw.line.on_black());
        assert_relative_eq!(hw.line.line_position(), 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_reactor_wall_stops_and_presses_switch() {
        let world = SimWorld::new(SimParams::default(), Pose { x: 1.0, y: 0.0, heading: 1.5 * std::f64::consts::PI }, 400.0);
        let mut hw = world.hardware();
        hw.enable_all();
        hw.left.set_voltage(4.0);
        hw.right.set_voltage(4.0);
        for _ in 0..100 {
            world.advance(0.02);
        }
        assert_relative_eq!(world.pose().x, REACTOR_WALL_MIN_X, epsilon = 1e-9);
        assert!(hw.reactor_switch.pressed());
        assert!(!hw.tube_switch.pressed());
    }

    #[test]
    fn test_gripper_ready_after_duration() {
        let mut g = SimGripper::new(1.0);
        assert!(g.ready(0.0));
        g.close(5.0);
        assert!(g.is_closed());
        assert!(!g.ready(5.5));
        assert!(g.ready(6.0));
    }

    #[test]
    fn test_arm_pot_follows_voltage() {
        let world = SimWorld::at_cell(SimParams::default(), 2, 0);
        let mut hw = world.hardware();
        hw.enable_all();
        hw.arm.set_voltage(1.0);
        world.advance(0.5);
        assert_relative_eq!(world.arm_pot(), 500.0, epsilon = 1e-9);
        assert_relative_eq!(hw.arm_pot.read(), 500.0, epsilon = 1e-9);
    }
}
