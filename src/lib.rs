//! # ReactorBot control core
//!
//! Autonomous control for a grid-navigating reactor-servicing robot:
//! - `control`: PID primitive and the heading / velocity / line / arm loops
//! - `comms`: framed, checksummed serial protocol to the field controller
//! - `sequencer`: the task/state machine that drives a full reactor cycle
//! - `hardware`: collaborator traits, quadrature encoder, simulator
//! - `robot`: one control cycle tying the above together

pub mod comms;
pub mod config;
pub mod control;
pub mod error;
pub mod hardware;
pub mod robot;
pub mod sequencer;
pub mod utils;

pub use config::RobotConfig;
pub use error::{Error, Result};
pub use robot::{CycleReport, Robot};
