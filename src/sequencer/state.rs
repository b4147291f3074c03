//! state.rs
//! Sequencer states. Exactly one is active; only the sequencer changes it.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum State {
    Begin,
    DecideX,
    TurnToX,
    GotoX,
    PrepDeposit1,
    PrepDeposit2,
    ApproachReactor,
    InchX,
    DecideY,
    TurnToY,
    GotoY,
    DecideArm,
    ArmForward,
    DecideGripper,
    MoveGripper,
    ArmReverse,
    BackToLine,
    InchY,
    SetTask,
    PickStorage,
    PickSupply,
}

impl State {
    pub fn name(&self) -> &'static str {
        match self {
            State::Begin => "BEGIN",
            State::DecideX => "DECIDE_X",
            State::TurnToX => "TURNTO_X",
            State::GotoX => "GOTO_X",
            State::PrepDeposit1 => "PREP_DEPOSIT_1",
            State::PrepDeposit2 => "PREP_DEPOSIT_2",
            State::ApproachReactor => "APPROACH_REACTOR",
            State::InchX => "INCH_X",
            State::DecideY => "DECIDE_Y",
            State::TurnToY => "TURNTO_Y",
            State::GotoY => "GOTO_Y",
            State::DecideArm => "DECIDE_ARM",
            State::ArmForward => "ARM_FORWARD",
            State::DecideGripper => "DECIDE_GRIPPER",
            State::MoveGripper => "MOVE_GRIPPER",
            State::ArmReverse => "ARM_REVERSE",
            State::BackToLine => "BACK_TO_LINE",
            State::InchY => "INCH_Y",
            State::SetTask => "SET_TASK",
            State::PickStorage => "PICK_STORAGE",
            State::PickSupply => "PICK_SUPPLY",
        }
    }
}

impl std::fmt::Display for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
