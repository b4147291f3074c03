//! machine.rs
//! Task/state sequencer: drives the motion stack through the
//! "drive X, drive Y, arm, gripper, back out" cycle, four tasks per reactor,
//! alternating reactors forever.
//!
//! Odometry is intersection counting only: `current` moves exclusively on a
//! detected line crossing (sign from heading) or a limit-switch contact.

use std::f64::consts::PI;

use log::info;

use crate::comms::link::TubeAvailability;
use crate::config::{ArmSetpoints, RobotConfig};
use crate::control::MotionStack;
use crate::hardware::Hardware;
use crate::sequencer::field::{
    GridPos, HEADING_DOWN, HEADING_LEFT, HEADING_RIGHT, HEADING_UP, REACTOR_A, REACTOR_B, RadiationLevel,
    Reactor, STORAGE, SUPPLY, Task,
};
use crate::sequencer::state::State;

/// Everything the sequencer knows about where it is and what it is doing.
#[derive(Debug, Clone, PartialEq)]
pub struct Context {
    pub current: GridPos,
    pub target: GridPos,
    pub target_heading: f64,
    pub arm_target: f64,
    pub task: Task,
    pub reactor: Reactor,
    pub radiation: RadiationLevel,
}

impl Context {
    pub fn at(current: GridPos) -> Self {
        Self {
            current,
            target: REACTOR_A,
            target_heading: HEADING_UP,
            arm_target: 0.0,
            task: Task::EmptyReactor,
            reactor: Reactor::A,
            radiation: RadiationLevel::None,
        }
    }

    pub fn at_reactor(&self) -> bool {
        self.current == REACTOR_A || self.current == REACTOR_B
    }
}

#[derive(Debug, Clone)]
pub struct SequencerParams {
    pub arm: ArmSetpoints,
    pub approach_voltage: f64,
    pub back_voltage: f64,
    pub inch_angle: f64,
}

impl SequencerParams {
    pub fn from_config(config: &RobotConfig) -> Self {
        Self {
            arm: config.arm.clone(),
            approach_voltage: config.drive.approach_voltage,
            back_voltage: config.drive.back_voltage,
            inch_angle: config.drive.inch_angle,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: State,
    pub to: State,
}

pub struct Sequencer {
    state: State,
    ctx: Context,
    params: SequencerParams,
}

impl Sequencer {
    pub fn new(config: &RobotConfig) -> Self {
        let (x, y) = config.runtime.start;
        Self::from_parts(SequencerParams::from_config(config), State::Begin, Context::at(GridPos::new(x, y)))
    }

    /// Resume from an explicit state and context.
    pub fn from_parts(params: SequencerParams, state: State, ctx: Context) -> Self {
        Self { state, ctx, params }
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }

    /// Run one cycle of the active state.
    pub fn step(
        &mut self,
        motion: &mut MotionStack,
        hw: &mut Hardware,
        tubes: &dyn TubeAvailability,
        now: f64,
    ) -> Option<Transition> {
        let from = self.state;
        let next = self.run_state(motion, hw, tubes, now);

        match next {
            Some(to) => {
                self.enter(to, motion);
                info!(
                    "[Sequencer] {} -> {} task={:?} reactor={:?} pos=({},{}) target=({},{})",
                    from,
                    to,
                    self.ctx.task,
                    self.ctx.reactor,
                    self.ctx.current.x,
                    self.ctx.current.y,
                    self.ctx.target.x,
                    self.ctx.target.y
                );
                Some(Transition { from, to })
            }
            None => None,
        }
    }

    /// Entry actions: hand the new state's target to its control loop.
    fn enter(&mut self, next: State, motion: &mut MotionStack) {
        match next {
            State::TurnToX | State::TurnToY => motion.begin_turn(self.ctx.target_heading),
            State::PrepDeposit1 => motion.begin_arm(self.params.arm.prep_1),
            State::PrepDeposit2 => motion.begin_arm(self.params.arm.prep_2),
            State::ArmForward => motion.begin_arm(self.ctx.arm_target),
            State::ArmReverse => motion.begin_arm(self.params.arm.back),
            _ => {}
        }
        self.state = next;
    }

    fn run_state(
        &mut self,
        motion: &mut MotionStack,
        hw: &mut Hardware,
        tubes: &dyn TubeAvailability,
        now: f64,
    ) -> Option<State> {
        let ctx = &mut self.ctx;
        match self.state {
            State::Begin => {
                ctx.reactor = Reactor::A;
                ctx.task = Task::EmptyReactor;
                ctx.radiation = RadiationLevel::None;
                ctx.target = REACTOR_A;
                Some(State::DecideX)
            }

            State::DecideX => {
                if ctx.target.x == ctx.current.x {
                    Some(State::DecideY)
                } else {
                    ctx.target_heading = if ctx.target.x > ctx.current.x {
                        HEADING_RIGHT
                    } else {
                        HEADING_LEFT
                    };
                    Some(State::TurnToX)
                }
            }

            State::TurnToX => motion
                .poll_turn(hw, now)
                .is_converged()
                .then_some(State::GotoX),

            State::GotoX => {
                motion.follow_line(hw, None, now);
                if motion.hit_intersection(hw) {
                    if hw.imu.heading() < PI {
                        ctx.current.x += 1;
                    } else {
                        ctx.current.x -= 1;
                    }
                }
                if ctx.current.x != ctx.target.x {
                    return None;
                }
                match ctx.task {
                    Task::EmptyReactor => Some(State::ApproachReactor),
                    Task::FillReactor => {
                        hw.brake_drive();
                        Some(State::PrepDeposit1)
                    }
                    Task::FillStorage | Task::GetSupply => {
                        hw.zero_drive_encoders();
                        Some(State::InchX)
                    }
                }
            }

            State::PrepDeposit1 => motion
                .poll_arm(hw, now)
                .is_converged()
                .then_some(State::PrepDeposit2),

            State::PrepDeposit2 => motion
                .poll_arm(hw, now)
                .is_converged()
                .then_some(State::ApproachReactor),

            State::ApproachReactor => {
                motion.follow_line(hw, Some(self.params.approach_voltage), now);
                hw.reactor_switch.pressed().then_some(State::DecideArm)
            }

            State::InchX => {
                let inch = self.params.inch_angle;
                inch_forward(motion, hw, inch, now).then_some(State::DecideY)
            }

            State::DecideY => {
                if ctx.target.y == ctx.current.y {
                    Some(State::DecideArm)
                } else {
                    ctx.target_heading = if ctx.target.y > ctx.current.y {
                        HEADING_UP
                    } else {
                        HEADING_DOWN
                    };
                    Some(State::TurnToY)
                }
            }

            State::TurnToY => motion
                .poll_turn(hw, now)
                .is_converged()
                .then_some(State::GotoY),

            State::GotoY => {
                motion.follow_line(hw, None, now);
                if !hw.tube_switch.pressed() {
                    return None;
                }
                match ctx.task {
                    Task::FillStorage => ctx.current.y = 1,
                    Task::GetSupply => ctx.current.y = -1,
                    Task::EmptyReactor | Task::FillReactor => {}
                }
                Some(State::DecideArm)
            }

            State::DecideArm => {
                hw.brake_drive();
                ctx.arm_target = match ctx.task {
                    Task::EmptyReactor => self.params.arm.pickup,
                    Task::FillReactor => self.params.arm.dropoff,
                    Task::FillStorage | Task::GetSupply => self.params.arm.tube,
                };
                Some(State::ArmForward)
            }

            State::ArmForward => motion
                .poll_arm(hw, now)
                .is_converged()
                .then_some(State::DecideGripper),

            State::DecideGripper => {
                match ctx.task {
                    Task::EmptyReactor | Task::GetSupply => hw.gripper.close(now),
                    Task::FillStorage | Task::FillReactor => hw.gripper.open(now),
                }
                Some(State::MoveGripper)
            }

            State::MoveGripper => {
                if !hw.gripper.ready(now) {
                    return None;
                }
                ctx.radiation = RadiationLevel::after_grip(ctx.task);
                Some(State::ArmReverse)
            }

            State::ArmReverse => motion
                .poll_arm(hw, now)
                .is_converged()
                .then_some(State::BackToLine),

            State::BackToLine => {
                motion.set_velocity(hw, 0.0, self.params.back_voltage, now);
                if !motion.hit_intersection(hw) {
                    return None;
                }
                ctx.current.y = 0;
                if ctx.at_reactor() {
                    Some(State::SetTask)
                } else {
                    hw.zero_drive_encoders();
                    Some(State::InchY)
                }
            }

            State::InchY => {
                let inch = self.params.inch_angle;
                inch_forward(motion, hw, inch, now).then_some(State::SetTask)
            }

            State::SetTask => {
                hw.brake_drive();
                let finished = ctx.task;
                ctx.task = finished.next();
                match finished {
                    Task::EmptyReactor => Some(State::PickStorage),
                    Task::FillStorage => Some(State::PickSupply),
                    Task::GetSupply => {
                        ctx.target = ctx.reactor.cell();
                        Some(State::DecideX)
                    }
                    Task::FillReactor => {
                        ctx.reactor = ctx.reactor.other();
                        ctx.target = ctx.reactor.cell();
                        Some(State::DecideX)
                    }
                }
            }

            State::PickStorage => {
                let id = ctx
                    .reactor
                    .storage_order()
                    .into_iter()
                    .find(|&id| tubes.storage_available(id))?;
                ctx.target = STORAGE[(id - 1) as usize];
                Some(State::DecideX)
            }

            State::PickSupply => {
                let id = ctx
                    .reactor
                    .supply_order()
                    .into_iter()
                    .find(|&id| tubes.supply_available(id))?;
                ctx.target = SUPPLY[(id - 1) as usize];
                Some(State::DecideX)
            }
        }
    }
}

/// Line-follow until both wheels together have turned twice the inch angle.
fn inch_forward(motion: &mut MotionStack, hw: &mut Hardware, inch_angle: f64, now: f64) -> bool {
    motion.follow_line(hw, None, now);
    hw.combined_wheel_angle() >= 2.0 * inch_angle
}
