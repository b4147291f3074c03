//! config.rs
//! Tuning, geometry and runtime configuration.
//!
//! Defaults are the competition tuning; a JSON file may override any field.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::control::pid::PidConfig;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RobotConfig {
    pub pid: PidGains,
    pub tolerances: Tolerances,
    pub drive: DriveConfig,
    pub arm: ArmSetpoints,
    pub gripper_time_s: f64,
    pub heartbeat_period_s: f64,
    pub protocol: ProtocolConfig,
    pub runtime: RuntimeConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PidGains {
    pub heading: PidConfig,
    pub velocity: PidConfig,
    pub line: PidConfig,
    pub arm: PidConfig,
}

/// (error, rate-of-error) pairs passed to `is_stabilized`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Tolerances {
    pub heading: (f64, f64),
    pub arm: (f64, f64),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DriveConfig {
    pub cruise_voltage: f64,
    pub approach_voltage: f64,
    pub back_voltage: f64,
    /// Wheel angle (rad) that moves the axle from the line sensor onto the intersection
    pub inch_angle: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArmSetpoints {
    pub back: f64,
    pub tube: f64,
    pub prep_1: f64,
    pub prep_2: f64,
    pub pickup: f64,
    pub dropoff: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolConfig {
    pub robot_id: u8,
    pub field_id: u8,
    pub enforce_destination: bool,
    /// Clear the enable latch after this long without a valid frame (None = never)
    pub link_timeout_s: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub cycle_ms: u64,
    pub duration_s: f64,
    pub events_csv: String,
    pub start: (i32, i32),
}

impl Default for PidGains {
    fn default() -> Self {
        Self {
            heading: PidConfig::new(3.0, 1.0, 0.0).with_limit(8.0).with_reset_after(0.1),
            velocity: PidConfig::new(1.5, 30.0, 0.0).with_limit(12.0).with_reset_after(0.1),
            line: PidConfig::new(1.0, 0.0, 0.0).with_limit(1.0),
            arm: PidConfig::new(0.015, 0.011, 0.0).with_limit(12.0).with_reset_after(0.1),
        }
    }
}

impl Default for Tolerances {
    fn default() -> Self {
        Self {
            heading: (0.05, 0.01),
            arm: (5.0, 1.0),
        }
    }
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            cruise_voltage: 4.0,
            approach_voltage: 2.0,
            back_voltage: -4.0,
            inch_angle: 2.465,
        }
    }
}

impl Default for ArmSetpoints {
    fn default() -> Self {
        Self {
            back: 543.0,
            tube: 344.0,
            prep_1: 294.0,
            prep_2: 305.0,
            pickup: 69.0,
            dropoff: 110.0,
        }
    }
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            robot_id: crate::comms::frame::ROBOT_ID,
            field_id: crate::comms::frame::FIELD_ID,
            enforce_destination: false,
            link_timeout_s: None,
        }
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            cycle_ms: 20,
            duration_s: 120.0,
            events_csv: "data/logs/cycle_events.csv".to_string(),
            start: (2, 0),
        }
    }
}

impl Default for RobotConfig {
    fn default() -> Self {
        Self {
            pid: PidGains::default(),
            tolerances: Tolerances::default(),
            drive: DriveConfig::default(),
            arm: ArmSetpoints::default(),
            gripper_time_s: 1.0,
            heartbeat_period_s: 1.0,
            protocol: ProtocolConfig::default(),
            runtime: RuntimeConfig::default(),
        }
    }
}

impl RobotConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: RobotConfig = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.pid.heading.validate("pid.heading")?;
        self.pid.velocity.validate("pid.velocity")?;
        self.pid.line.validate("pid.line")?;
        self.pid.arm.validate("pid.arm")?;

        let positive = [
            ("gripper_time_s", self.gripper_time_s),
            ("heartbeat_period_s", self.heartbeat_period_s),
            ("drive.inch_angle", self.drive.inch_angle),
        ];
        for (name, value) in positive {
            if !(value > 0.0) {
                return Err(Error::InvalidConfig(format!("{name} must be positive, got {value}")));
            }
        }
        if self.runtime.cycle_ms == 0 {
            return Err(Error::InvalidConfig("runtime.cycle_ms must be non-zero".into()));
        }
        if let Some(t) = self.protocol.link_timeout_s {
            if !(t > 0.0) {
                return Err(Error::InvalidConfig(format!(
                    "protocol.link_timeout_s must be positive, got {t}"
                )));
            }
        }
        Ok(())
    }
}
