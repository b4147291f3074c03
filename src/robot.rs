//! robot.rs
//! Per-cycle orchestration of the control core.
//!
//! One cycle, run to completion:
//!   1. poll the field link (drain inbound bytes, latch state)
//!   2. apply the enable latch to the actuators (reset every loop while off)
//!   3. step the sequencer
//!   4. refresh the indicator from the radiation level
//!   5. heartbeat and radiation alert, when due
//!
//! Transport failures are logged and the cycle carries on; nothing here is
//! fatal.

use log::{info, warn};

use crate::comms::{FieldLink, HeartbeatTimer, Transport};
use crate::config::RobotConfig;
use crate::control::MotionStack;
use crate::hardware::Hardware;
use crate::sequencer::{Sequencer, State, Transition};

/// What happened during one cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CycleReport {
    pub enabled: bool,
    pub state: State,
    pub transition: Option<Transition>,
    pub heartbeat_sent: bool,
}

pub struct Robot {
    pub hw: Hardware,
    pub motion: MotionStack,
    pub link: FieldLink,
    pub sequencer: Sequencer,
    heartbeat: HeartbeatTimer,
    arm_back: f64,
    was_enabled: Option<bool>,
}

impl Robot {
    pub fn new(config: &RobotConfig, hw: Hardware, transport: Box<dyn Transport>) -> Self {
        Self {
            hw,
            motion: MotionStack::new(config),
            link: FieldLink::new(transport, &config.protocol),
            sequencer: Sequencer::new(config),
            heartbeat: HeartbeatTimer::new(config.heartbeat_period_s),
            arm_back: config.arm.back,
            was_enabled: None,
        }
    }

    /// Open the gripper, wait for it, then stow the arm until converged.
    ///
    /// Blocks until both finish. `tick` waits for the next cycle and returns
    /// the current time; with no convergence this never returns.
    pub fn setup<F: FnMut() -> f64>(&mut self, mut tick: F) {
        info!("[Robot] Setup: opening gripper");
        self.hw.enable_all();
        let mut now = tick();
        self.hw.gripper.open(now);
        while !self.hw.gripper.ready(now) {
            now = tick();
        }

        info!("[Robot] Setup: stowing arm at {}", self.arm_back);
        self.motion.begin_arm(self.arm_back);
        while !self.motion.poll_arm(&mut self.hw, now).is_converged() {
            now = tick();
        }

        self.heartbeat.start(now);
        info!("[Robot] Setup complete at {:.2}s", now);
    }

    pub fn cycle(&mut self, now: f64) -> CycleReport {
        if let Err(e) = self.link.update(now) {
            warn!("[Robot] Link read failed: {}", e);
        }

        let enabled = self.link.robot_enabled();
        self.apply_enable(enabled);

        let tubes = self.link.bitmaps();
        let transition = self.sequencer.step(&mut self.motion, &mut self.hw, &tubes, now);

        let radiation = self.sequencer.context().radiation;
        self.hw.indicator.show(radiation.display());

        let heartbeat_sent = match self.heartbeat.service(&mut self.link, radiation.alert(), now) {
            Ok(sent) => sent,
            Err(e) => {
                warn!("[Robot] Heartbeat send failed: {}", e);
                false
            }
        };

        CycleReport {
            enabled,
            state: self.sequencer.state(),
            transition,
            heartbeat_sent,
        }
    }

    fn apply_enable(&mut self, enabled: bool) {
        if self.was_enabled != Some(enabled) {
            info!("[Robot] Field {}", if enabled { "resumed movement" } else { "stopped movement" });
            self.was_enabled = Some(enabled);
        }
        if enabled {
            self.hw.enable_all();
        } else {
            self.hw.disable_all();
            self.motion.reset_all();
        }
    }
}
