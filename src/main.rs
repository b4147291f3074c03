//! # ReactorBot simulation runner
//!
//! Runs the control core against the kinematic field simulator, in real time.
//!
//! ## Threads
//! - **Physics:** integrates the simulated field every 1 ms and feeds the
//!   encoders their quadrature edges (the interrupt side of the counters).
//! - **Field controller:** speaks the framed protocol over a crossbeam byte
//!   pipe: resume, tube bitmaps once a second, a stop/resume pause mid-run;
//!   logs every heartbeat and radiation alert it receives.
//! - **Control:** max OS priority, optionally pinned to a core, one robot
//!   cycle per period (spin_sleep), deadline overruns counted.
//!
//! ## Usage
//! `reactorbot [config.json]` (defaults when omitted), `RUST_LOG=info` for
//! state transitions.
//!
//! ## Outputs
//! - `data/logs/cycle_events.csv` (path from `runtime.events_csv`)
//! - end-of-run summary on stdout

use std::{
    env,
    f64::consts::PI,
    process,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use log::{debug, error, info, warn};
use parking_lot::Mutex;
use spin_sleep::SpinSleeper;
use thread_priority::{ThreadBuilderExt, ThreadPriority};

use reactorbot::{
    Robot, RobotConfig,
    comms::{
        ChannelTransport, Transport, channel_pair,
        frame::{
            FIELD_ID, FrameParser, Parsed, RAD_NEW_ROD, TYPE_HEARTBEAT, TYPE_RADIATION, TYPE_RESUME,
            TYPE_STOP, TYPE_STORAGE, TYPE_SUPPLY, TxFrame,
        },
    },
    hardware::sim::{Pose, SimParams, SimWorld},
    utils::metrics::{CycleMetrics, Event, EventRecorder, SharedMetrics, calculate_stats_u64},
};

const PHYSICS_PERIOD: Duration = Duration::from_millis(1);
const FIELD_PERIOD: Duration = Duration::from_millis(10);
const BITMAP_PERIOD_S: f64 = 1.0;
/// Field pauses the robot over this window (seconds into the run)
const PAUSE_WINDOW_S: (f64, f64) = (30.0, 33.0);
const CONTROL_CORE: usize = 0;

fn main() {
    env_logger::init();
    info!("=== REACTORBOT SIMULATION START ===");

    if let Err(e) = run() {
        error!("Simulation aborted: {}", e);
        process::exit(1);
    }

    info!("=== REACTORBOT SIMULATION FINISHED ===");
}

fn run() -> reactorbot::Result<()> {
    let config = match env::args().nth(1) {
        Some(path) => {
            info!("Loading config from {}", path);
            RobotConfig::from_file(path)?
        }
        None => RobotConfig::default(),
    };

    let (sx, sy) = config.runtime.start;
    let world = SimWorld::new(
        SimParams {
            gripper_time_s: config.gripper_time_s,
            ..SimParams::default()
        },
        Pose { x: sx as f64, y: sy as f64, heading: 0.0 },
        400.0,
    );

    let running = Arc::new(AtomicBool::new(true));
    let metrics: SharedMetrics = Arc::new(Mutex::new(CycleMetrics::default()));
    let recorder = EventRecorder::new();
    let exporter = recorder.start_exporter(config.runtime.events_csv.clone());

    let (robot_end, field_end) = channel_pair();
    let epoch = Instant::now();

    let physics = spawn_physics(world.clone(), running.clone());
    let field = spawn_field_controller(field_end, running.clone(), epoch);
    let control = spawn_control(
        config.clone(),
        world.clone(),
        robot_end,
        metrics.clone(),
        recorder.clone(),
        epoch,
    )?;

    if control.join().is_err() {
        error!("Control thread panicked");
    }
    running.store(false, Ordering::Release);
    for (name, handle) in [("physics", physics), ("field", field)] {
        if handle.join().is_err() {
            error!("{} thread panicked", name);
        }
    }

    recorder.finish();
    if exporter.join().is_err() {
        error!("Event exporter panicked");
    }

    print_summary(&metrics.lock(), &world);
    Ok(())
}

fn spawn_physics(world: SimWorld, running: Arc<AtomicBool>) -> JoinHandle<()> {
    thread::spawn(move || {
        let sleeper = SpinSleeper::default();
        let mut last = Instant::now();
        while running.load(Ordering::Acquire) {
            sleeper.sleep(PHYSICS_PERIOD);
            let now = Instant::now();
            world.advance(now.duration_since(last).as_secs_f64());
            last = now;
        }
    })
}

/// Field-side end of the link: publishes state, logs what the robot reports.
fn spawn_field_controller(
    mut link: ChannelTransport,
    running: Arc<AtomicBool>,
    epoch: Instant,
) -> JoinHandle<()> {
    thread::spawn(move || {
        let send = |link: &mut ChannelTransport, kind: u8, payload: &[u8]| {
            let frame = TxFrame::build(kind, FIELD_ID, FIELD_ID, payload);
            if let Err(e) = link.write(frame.as_bytes()) {
                warn!("[Field] Send failed: {}", e);
            }
        };

        let mut parser = FrameParser::new();
        let mut buf = [0u8; 64];
        let mut last_bitmaps: Option<f64> = None;
        let mut paused = false;
        let mut heartbeats = 0u64;

        send(&mut link, TYPE_RESUME, &[]);
        info!("[Field] Robot enabled");

        while running.load(Ordering::Acquire) {
            let t = epoch.elapsed().as_secs_f64();

            if last_bitmaps.is_none_or(|last| t - last >= BITMAP_PERIOD_S) {
                // At least one free storage tube and one full supply tube
                let storage = rand::random_range(0..0x0Fu8);
                let supply = rand::random_range(1..=0x0Fu8);
                send(&mut link, TYPE_STORAGE, &[storage]);
                send(&mut link, TYPE_SUPPLY, &[supply]);
                debug!("[Field] Bitmaps storage={:#06b} supply={:#06b}", storage, supply);
                last_bitmaps = Some(t);
            }

            let in_pause = t >= PAUSE_WINDOW_S.0 && t < PAUSE_WINDOW_S.1;
            if in_pause != paused {
                paused = in_pause;
                send(&mut link, if paused { TYPE_STOP } else { TYPE_RESUME }, &[]);
                info!("[Field] Robot {} at {:.2}s", if paused { "stopped" } else { "resumed" }, t);
            }

            match link.read(&mut buf) {
                Ok(n) => {
                    for &byte in &buf[..n] {
                        match parser.push(byte) {
                            Some(Parsed::Frame(frame)) => match frame.kind {
                                TYPE_HEARTBEAT => {
                                    heartbeats += 1;
                                    debug!("[Field] Heartbeat #{} from {:#04x}", heartbeats, frame.src);
                                }
                                TYPE_RADIATION => {
                                    let level = frame.payload.first().copied().unwrap_or(0);
                                    let rod = if level == RAD_NEW_ROD { "new" } else { "spent" };
                                    info!("[Field] Radiation alert: {} rod ({:#04x})", rod, level);
                                }
                                other => debug!("[Field] Ignoring frame type {:#04x}", other),
                            },
                            Some(Parsed::Rejected(r)) => warn!("[Field] Dropped frame: {:?}", r),
                            None => {}
                        }
                    }
                }
                Err(e) => {
                    warn!("[Field] Link closed: {}", e);
                    break;
                }
            }

            thread::sleep(FIELD_PERIOD);
        }
        info!("[Field] {} heartbeats received", heartbeats);
    })
}

fn spawn_control(
    config: RobotConfig,
    world: SimWorld,
    transport: ChannelTransport,
    metrics: SharedMetrics,
    recorder: EventRecorder,
    epoch: Instant,
) -> reactorbot::Result<JoinHandle<()>> {
    let handle = thread::Builder::new()
        .name("control".to_string())
        .spawn_with_priority(ThreadPriority::Max, move |priority| {
            if let Err(e) = priority {
                warn!("[Control] Running without max priority: {:?}", e);
            }
            let core_ids = core_affinity::get_core_ids().unwrap_or_default();
            match core_ids.get(CONTROL_CORE) {
                Some(core) if core_affinity::set_for_current(*core) => {
                    info!("[Control] Pinned to core {}", CONTROL_CORE)
                }
                _ => warn!("[Control] Could not pin to core {}", CONTROL_CORE),
            }

            control_loop(config, world, transport, metrics, recorder, epoch);
        })?;
    Ok(handle)
}

fn control_loop(
    config: RobotConfig,
    world: SimWorld,
    transport: ChannelTransport,
    metrics: SharedMetrics,
    recorder: EventRecorder,
    epoch: Instant,
) {
    let period = Duration::from_millis(config.runtime.cycle_ms);
    let sleeper = SpinSleeper::default();
    let mut robot = Robot::new(&config, world.hardware(), Box::new(transport));

    robot.setup(|| {
        sleeper.sleep(period);
        epoch.elapsed().as_secs_f64()
    });

    let run_until = epoch.elapsed().as_secs_f64() + config.runtime.duration_s;
    let mut next_release = Instant::now();
    let mut seq = 0u64;

    loop {
        let release = Instant::now();
        let jitter_us = release.saturating_duration_since(next_release).as_micros() as u64;
        let now = epoch.elapsed().as_secs_f64();
        if now >= run_until {
            break;
        }

        let report = robot.cycle(now);
        let exec_us = release.elapsed().as_micros() as u64;
        seq += 1;

        if let Some(t) = report.transition {
            recorder.record(Event::Transition {
                seq,
                ts_ns: recorder.now_ns(),
                from: t.from.name(),
                to: t.to.name(),
            });
        }
        if report.heartbeat_sent {
            recorder.record(Event::Heartbeat { seq, ts_ns: recorder.now_ns() });
        }
        recorder.record(Event::Cycle {
            seq,
            ts_ns: recorder.now_ns(),
            state: report.state.name(),
            enabled: report.enabled,
            exec_us,
        });

        {
            let mut m = metrics.lock();
            m.record_cycle(exec_us, jitter_us, report.enabled);
            m.transitions += report.transition.is_some() as u64;
            m.heartbeats += report.heartbeat_sent as u64;
            if release.elapsed() > period {
                m.deadline_miss += 1;
                let overrun_us = (release.elapsed() - period).as_micros() as u64;
                recorder.record(Event::DeadlineMiss { seq, ts_ns: recorder.now_ns(), overrun_us });
            }
        }

        next_release += period;
        match next_release.checked_duration_since(Instant::now()) {
            Some(wait) => sleeper.sleep(wait),
            // Overran: restart the schedule from here
            None => next_release = Instant::now(),
        }
    }

    let ctx = robot.sequencer.context();
    info!(
        "[Control] Stopped in {} task={:?} reactor={:?} at ({},{})",
        robot.sequencer.state(),
        ctx.task,
        ctx.reactor,
        ctx.current.x,
        ctx.current.y
    );
    let stats = robot.link.stats();
    info!(
        "[Control] Link: accepted={} bad_checksum={} foreign={} skipped_bytes={} heartbeats={} alerts={}",
        stats.accepted,
        stats.bad_checksum,
        stats.foreign_source,
        stats.skipped_bytes,
        stats.heartbeats_sent,
        stats.alerts_sent
    );
}

fn print_summary(m: &CycleMetrics, world: &SimWorld) {
    let pose = world.pose();
    println!("\n=== RUN SUMMARY ===");
    println!("cycles            : {}", m.total_cycles);
    println!("disabled cycles   : {}", m.disabled_cycles);
    println!("state transitions : {}", m.transitions);
    println!("heartbeats sent   : {}", m.heartbeats);
    println!("deadline misses   : {} ({:.2}%)", m.deadline_miss, m.miss_rate());
    if let Some(s) = calculate_stats_u64(&m.exec_us) {
        println!("cycle exec (µs)   : min {:.0} / mean {:.1} / max {:.0}", s.min, s.mean, s.max);
    }
    if let Some(s) = calculate_stats_u64(&m.jitter_us) {
        println!("release jitter(µs): mean {:.1} / max {:.0}", s.mean, s.max);
    }
    println!(
        "final pose        : ({:.2}, {:.2}) heading {:.1}°",
        pose.x,
        pose.y,
        pose.heading * 180.0 / PI
    );
}
