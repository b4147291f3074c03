//! Whole-cycle behaviour of `Robot`: enable gating, indicator, heartbeats,
//! and a run against the kinematic simulator.

use reactorbot::Robot;
use reactorbot::comms::MockTransport;
use reactorbot::comms::frame::{FIELD_ID, RAD_SPENT_ROD, TYPE_HEARTBEAT, TYPE_RADIATION, TYPE_RESUME, TYPE_STOP, TxFrame};
use reactorbot::config::RobotConfig;
use reactorbot::hardware::Display;
use reactorbot::hardware::mock::MockPanel;
use reactorbot::hardware::sim::{SimParams, SimWorld};
use reactorbot::sequencer::field::REACTOR_A;
use reactorbot::sequencer::{Context, RadiationLevel, SequencerParams, Sequencer, State, Task};

fn frame(kind: u8) -> Vec<u8> {
    TxFrame::build(kind, FIELD_ID, FIELD_ID, &[]).into_bytes()
}

#[test]
fn motors_stay_disabled_until_resume() {
    let config = RobotConfig::default();
    let panel = MockPanel::new();
    let mock = MockTransport::new();
    let mut robot = Robot::new(&config, panel.hardware(), Box::new(mock.clone()));

    let report = robot.cycle(0.0);
    assert!(!report.enabled);
    assert!(!panel.snapshot().left.enabled);
    // Sequencer keeps stepping while disabled
    assert_eq!(report.state, State::DecideX);

    mock.inject_read(&frame(TYPE_RESUME));
    let report = robot.cycle(0.02);
    assert!(report.enabled);
    let snap = panel.snapshot();
    assert!(snap.left.enabled && snap.right.enabled && snap.arm.enabled);
}

#[test]
fn stop_disables_actuators_and_clears_every_loop() {
    let config = RobotConfig::default();
    let panel = MockPanel::new();
    let mock = MockTransport::new();
    let mut robot = Robot::new(&config, panel.hardware(), Box::new(mock.clone()));
    mock.inject_read(&frame(TYPE_RESUME));

    // BEGIN, DECIDE_X, then several TURNTO_X cycles far from the target
    let mut t = 0.0;
    for _ in 0..6 {
        robot.cycle(t);
        t += 0.02;
    }
    assert_eq!(robot.sequencer.state(), State::TurnToX);
    assert!(robot.motion.heading.pid().integral() != 0.0);

    mock.inject_read(&frame(TYPE_STOP));
    let report = robot.cycle(t);
    assert!(!report.enabled);
    let snap = panel.snapshot();
    assert!(!snap.left.enabled && !snap.right.enabled && !snap.arm.enabled);
    assert_eq!(snap.left.volts, 0.0);
    assert_eq!(robot.motion.heading.pid().integral(), 0.0);
    assert_eq!(robot.motion.velocity.pid().integral(), 0.0);
    assert_eq!(robot.motion.arm.pid().integral(), 0.0);
}

#[test]
fn indicator_tracks_radiation() {
    let config = RobotConfig::default();
    let panel = MockPanel::new();
    let mut robot = Robot::new(&config, panel.hardware(), Box::new(MockTransport::new()));

    robot.cycle(0.0);
    assert_eq!(panel.snapshot().display, Some(Display::Blue));

    robot.sequencer = Sequencer::from_parts(
        SequencerParams::from_config(&config),
        State::MoveGripper,
        Context { task: Task::EmptyReactor, ..Context::at(REACTOR_A) },
    );
    panel.set(|p| p.gripper_ready = true);
    robot.cycle(0.02);
    assert_eq!(robot.sequencer.context().radiation, RadiationLevel::Low);
    assert_eq!(panel.snapshot().display, Some(Display::Green));
}

#[test]
fn heartbeat_each_period_with_spent_rod_alert() {
    let config = RobotConfig::default();
    let panel = MockPanel::new();
    let mock = MockTransport::new();
    let mut robot = Robot::new(&config, panel.hardware(), Box::new(mock.clone()));
    robot.sequencer = Sequencer::from_parts(
        SequencerParams::from_config(&config),
        State::ArmReverse,
        Context {
            task: Task::EmptyReactor,
            radiation: RadiationLevel::Low,
            ..Context::at(REACTOR_A)
        },
    );

    let mut sent = 0;
    let mut t = 0.0;
    while t < 3.5 {
        sent += robot.cycle(t).heartbeat_sent as usize;
        t += 0.02;
    }
    assert_eq!(sent, 3);

    let out = mock.written();
    // heartbeat (6 bytes) + radiation alert (7 bytes) per period
    assert_eq!(out.len(), 3 * 13);
    for chunk in out.chunks(13) {
        assert_eq!(chunk[2], TYPE_HEARTBEAT);
        assert_eq!(chunk[6 + 2], TYPE_RADIATION);
        assert_eq!(chunk[6 + 5], RAD_SPENT_ROD);
    }
}

#[test]
fn link_write_failure_does_not_stop_the_cycle() {
    let config = RobotConfig::default();
    let panel = MockPanel::new();
    let mock = MockTransport::new();
    mock.set_fail_writes(true);
    let mut robot = Robot::new(&config, panel.hardware(), Box::new(mock.clone()));

    let mut t = 0.0;
    for _ in 0..120 {
        let report = robot.cycle(t);
        assert!(!report.heartbeat_sent);
        t += 0.02;
    }
    assert_eq!(panel.snapshot().display, Some(Display::Blue));
}

#[test]
fn simulated_robot_sets_up_and_reaches_reactor_a() {
    let config = RobotConfig::default();
    let world = SimWorld::at_cell(SimParams::default(), 2, 0);
    let mock = MockTransport::new();
    let mut robot = Robot::new(&config, world.hardware(), Box::new(mock.clone()));

    let dt = 0.02;
    let mut t = 0.0;
    robot.setup(|| {
        world.advance(dt);
        t += dt;
        t
    });
    assert!(t >= config.gripper_time_s);
    assert!((world.arm_pot() - config.arm.back).abs() <= 5.0);

    mock.inject_read(&frame(TYPE_RESUME));
    let mut visited = Vec::new();
    while t < 60.0 && robot.sequencer.state() != State::DecideArm {
        world.advance(dt);
        t += dt;
        if let Some(tr) = robot.cycle(t).transition {
            visited.push(tr.to);
        }
    }

    assert_eq!(
        visited,
        vec![
            State::DecideX,
            State::TurnToX,
            State::GotoX,
            State::ApproachReactor,
            State::DecideArm
        ]
    );
    assert_eq!(robot.sequencer.context().current, REACTOR_A);
    assert!(world.pose().x < 0.76);
    assert_eq!(world.display(), Some(Display::Blue));
}
