//! encoder.rs
//! Quadrature encoder counter shared between pin-change interrupts and the
//! control cycle.
//!
//! The interrupt side only ever does a single `fetch_add`; the control cycle
//! only loads or stores zero. A count can therefore never be observed half
//! updated, whichever context is preempted.

use std::sync::atomic::{AtomicI32, Ordering};

pub const DEFAULT_COUNTS_PER_REV: f64 = 3200.0;

#[derive(Debug)]
pub struct QuadratureEncoder {
    count: AtomicI32,
    counts_per_rev: f64,
}

impl QuadratureEncoder {
    pub fn new(counts_per_rev: f64) -> Self {
        Self {
            count: AtomicI32::new(0),
            counts_per_rev,
        }
    }

    /// Channel A changed; `a`, `b` are the pin levels sampled in the handler.
    #[inline]
    pub fn interrupt_a(&self, a: bool, b: bool) {
        let step = if a != b { 1 } else { -1 };
        self.count.fetch_add(step, Ordering::AcqRel);
    }

    /// Channel B changed.
    #[inline]
    pub fn interrupt_b(&self, a: bool, b: bool) {
        let step = if a == b { 1 } else { -1 };
        self.count.fetch_add(step, Ordering::AcqRel);
    }

    #[inline]
    pub fn count(&self) -> i32 {
        self.count.load(Ordering::Acquire)
    }

    /// Shaft angle in radians.
    pub fn angle(&self) -> f64 {
        self.count() as f64 * std::f64::consts::TAU / self.counts_per_rev
    }

    pub fn zero(&self) {
        self.count.store(0, Ordering::Release);
    }
}

impl Default for QuadratureEncoder {
    fn default() -> Self {
        Self::new(DEFAULT_COUNTS_PER_REV)
    }
}

/// Pin levels of a quadrature signal, stepped one edge at a time.
/// Used by the simulator to play the role of the encoder hardware.
#[derive(Debug, Clone, Copy, Default)]
pub struct QuadraturePhase {
    a: bool,
    b: bool,
}

impl QuadraturePhase {
    /// Emit one edge in the given direction and fire the matching interrupt.
    pub fn step(&mut self, forward: bool, encoder: &QuadratureEncoder) {
        // Gray sequence forward: 00 -> 10 -> 11 -> 01 -> 00
        match (self.a, self.b, forward) {
            (false, false, true) | (true, true, true) => {
                self.a = !self.a;
                encoder.interrupt_a(self.a, self.b);
            }
            (true, false, true) | (false, true, true) => {
                self.b = !self.b;
                encoder.interrupt_b(self.a, self.b);
            }
            (false, false, false) | (true, true, false) => {
                self.b = !self.b;
                encoder.interrupt_b(self.a, self.b);
            }
            (true, false, false) | (false, true, false) => {
                self.a = !self.a;
                encoder.interrupt_a(self.a, self.b);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_forward_edges_count_up() {
        let enc = QuadratureEncoder::default();
        let mut phase = QuadraturePhase::default();
        for _ in 0..12 {
            phase.step(true, &enc);
        }
        assert_eq!(enc.count(), 12);
    }

    #[test]
    fn test_reverse_edges_count_down() {
        let enc = QuadratureEncoder::default();
        let mut phase = QuadraturePhase::default();
        for _ in 0..8 {
            phase.step(true, &enc);
        }
        for _ in 0..11 {
            phase.step(false, &enc);
        }
        assert_eq!(enc.count(), -3);
    }

    #[test]
    fn test_full_revolution_angle() {
        let enc = QuadratureEncoder::new(400.0);
        let mut phase = QuadraturePhase::default();
        for _ in 0..400 {
            phase.step(true, &enc);
        }
        assert!((enc.angle() - std::f64::consts::TAU).abs() < 1e-9);
        enc.zero();
        assert_eq!(enc.count(), 0);
    }

    #[test]
    fn test_concurrent_interrupts_are_not_lost() {
        let enc = Arc::new(QuadratureEncoder::default());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let enc = enc.clone();
                thread::spawn(move || {
                    let mut phase = QuadraturePhase::default();
                    for _ in 0..10_000 {
                        phase.step(true, &enc);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(enc.count(), 40_000);
    }
}
