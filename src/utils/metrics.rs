//! Cycle event recording and timing statistics for the control loop.
//!
//! Two independent paths:
//! - **EventRecorder:** lock-free queue (16K capacity) drained by a background
//!   thread into a CSV file. The control thread never blocks on it.
//! - **CycleMetrics:** shared counters and a bounded execution-time buffer,
//!   read at the end of the run for the summary.

use std::{
    collections::VecDeque,
    fs::{File, create_dir_all},
    io::BufWriter,
    path::Path,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::{Duration, Instant},
};

use crossbeam_queue::ArrayQueue;
use csv::Writer;
use log::{error, info};
use parking_lot::Mutex;
use serde::Serialize;

/// What the control thread reports, one variant per kind of occurrence.
#[derive(Debug, Clone)]
pub enum Event {
    /// One completed control cycle.
    Cycle {
        seq: u64,
        ts_ns: u64,
        state: &'static str,
        enabled: bool,
        exec_us: u64,
    },
    /// Sequencer moved between states.
    Transition {
        seq: u64,
        ts_ns: u64,
        from: &'static str,
        to: &'static str,
    },
    /// Heartbeat (and any radiation alert) written to the link.
    Heartbeat { seq: u64, ts_ns: u64 },
    /// Cycle finished after its period had already elapsed.
    DeadlineMiss { seq: u64, ts_ns: u64, overrun_us: u64 },
}

/// Flat CSV row: seq,ts_ns,event,state,detail,value
#[derive(Debug, Serialize)]
struct EventRow {
    seq: u64,
    ts_ns: u64,
    event: &'static str,
    state: &'static str,
    detail: String,
    value: u64,
}

impl Event {
    fn to_row(&self) -> EventRow {
        match self {
            Event::Cycle { seq, ts_ns, state, enabled, exec_us } => EventRow {
                seq: *seq,
                ts_ns: *ts_ns,
                event: "Cycle",
                state: *state,
                detail: if *enabled { "enabled".into() } else { "disabled".into() },
                value: *exec_us,
            },
            Event::Transition { seq, ts_ns, from, to } => EventRow {
                seq: *seq,
                ts_ns: *ts_ns,
                event: "Transition",
                state: *to,
                detail: (*from).to_string(),
                value: 0,
            },
            Event::Heartbeat { seq, ts_ns } => EventRow {
                seq: *seq,
                ts_ns: *ts_ns,
                event: "Heartbeat",
                state: "",
                detail: String::new(),
                value: 0,
            },
            Event::DeadlineMiss { seq, ts_ns, overrun_us } => EventRow {
                seq: *seq,
                ts_ns: *ts_ns,
                event: "DeadlineMiss",
                state: "",
                detail: String::new(),
                value: *overrun_us,
            },
        }
    }
}

const EVENT_QUEUE_CAPACITY: usize = 16_384;
const EXPORT_POLL_MS: u64 = 10;

/// Non-blocking event recorder with background CSV export.
///
/// `record` pushes onto the queue and returns immediately; events are dropped
/// silently when the queue is full. Timestamps come from `now_ns`
/// (nanoseconds since the recorder was created).
#[derive(Clone)]
pub struct EventRecorder {
    queue: Arc<ArrayQueue<Event>>,
    run_start: Instant,
    done: Arc<AtomicBool>,
}

impl Default for EventRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl EventRecorder {
    pub fn new() -> Self {
        Self {
            queue: Arc::new(ArrayQueue::new(EVENT_QUEUE_CAPACITY)),
            run_start: Instant::now(),
            done: Arc::new(AtomicBool::new(false)),
        }
    }

    #[inline]
    pub fn record(&self, event: Event) {
        let _ = self.queue.push(event);
    }

    #[inline]
    pub fn now_ns(&self) -> u64 {
        self.run_start.elapsed().as_nanos() as u64
    }

    /// Tell the exporter no more events will arrive; it drains and exits.
    pub fn finish(&self) {
        self.done.store(true, Ordering::Release);
    }

    /// Spawn the thread draining the queue into `output_csv`.
    pub fn start_exporter(&self, output_csv: String) -> thread::JoinHandle<()> {
        let queue = self.queue.clone();
        let done = self.done.clone();

        thread::spawn(move || {
            if let Some(dir) = Path::new(&output_csv).parent() {
                let _ = create_dir_all(dir);
            }
            let file = match File::create(&output_csv) {
                Ok(file) => file,
                Err(e) => {
                    error!("[Metrics] Failed to create event CSV {}: {}", output_csv, e);
                    return;
                }
            };
            let mut wtr = Writer::from_writer(BufWriter::new(file));

            loop {
                match queue.pop() {
                    Some(event) => {
                        if let Err(e) = wtr.serialize(event.to_row()) {
                            error!("[Metrics] CSV write failed: {}", e);
                        }
                    }
                    None => {
                        if done.load(Ordering::Acquire) && queue.is_empty() {
                            break;
                        }
                        thread::sleep(Duration::from_millis(EXPORT_POLL_MS));
                    }
                }
            }

            if let Err(e) = wtr.flush() {
                error!("[Metrics] CSV flush failed: {}", e);
            }
            info!("[Metrics] Events exported to {}", output_csv);
        })
    }
}

pub const MAX_POINTS: usize = 1_000;

/// Control-loop timing and link counters for the end-of-run summary.
#[derive(Debug, Default, Clone)]
pub struct CycleMetrics {
    /// Execution time of the last cycles (µs)
    pub exec_us: VecDeque<u64>,
    /// Lateness of the cycle start (µs)
    pub jitter_us: VecDeque<u64>,
    pub total_cycles: u64,
    pub deadline_miss: u64,
    pub transitions: u64,
    pub heartbeats: u64,
    pub disabled_cycles: u64,
}

pub type SharedMetrics = Arc<Mutex<CycleMetrics>>;

impl CycleMetrics {
    pub fn record_cycle(&mut self, exec_us: u64, jitter_us: u64, enabled: bool) {
        push_capped_u64(&mut self.exec_us, exec_us);
        push_capped_u64(&mut self.jitter_us, jitter_us);
        self.total_cycles += 1;
        if !enabled {
            self.disabled_cycles += 1;
        }
    }

    pub fn miss_rate(&self) -> f64 {
        if self.total_cycles == 0 {
            0.0
        } else {
            self.deadline_miss as f64 / self.total_cycles as f64 * 100.0
        }
    }
}

/// Appends value to the buffer, dropping the oldest once at capacity.
#[inline]
pub fn push_capped_u64(buf: &mut VecDeque<u64>, val: u64) {
    if buf.len() >= MAX_POINTS {
        buf.pop_front();
    }
    buf.push_back(val);
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub count: usize,
}

pub fn calculate_stats_u64(data: &VecDeque<u64>) -> Option<Stats> {
    if data.is_empty() {
        return None;
    }

    let count = data.len();
    let min = data.iter().map(|&x| x as f64).fold(f64::INFINITY, f64::min);
    let max = data.iter().map(|&x| x as f64).fold(f64::NEG_INFINITY, f64::max);
    let mean = data.iter().map(|&x| x as f64).sum::<f64>() / count as f64;

    Some(Stats { min, max, mean, count })
}
