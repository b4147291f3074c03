//! heartbeat.rs
//! Periodic liveness message to the field controller.
//!
//! Each period sends one heartbeat, followed by a radiation alert whenever
//! the robot is carrying a rod (new or spent). Nothing extra when empty.

use log::debug;

use crate::comms::link::FieldLink;
use crate::error::Result;

#[derive(Debug, Clone)]
pub struct HeartbeatTimer {
    period_s: f64,
    last: Option<f64>,
}

impl HeartbeatTimer {
    pub fn new(period_s: f64) -> Self {
        Self { period_s, last: None }
    }

    /// Restart the period at `now` (the first heartbeat goes out one period later).
    pub fn start(&mut self, now: f64) {
        self.last = Some(now);
    }

    /// True (and restarts the period) once a full period has elapsed.
    pub fn due(&mut self, now: f64) -> bool {
        match self.last {
            Some(last) if now - last < self.period_s => false,
            Some(_) => {
                self.last = Some(now);
                true
            }
            None => {
                self.last = Some(now);
                false
            }
        }
    }

    /// Send heartbeat (+ alert) if due. `alert`: Some(true) new rod,
    /// Some(false) spent rod, None nothing to report.
    pub fn service(&mut self, link: &mut FieldLink, alert: Option<bool>, now: f64) -> Result<bool> {
        if !self.due(now) {
            return Ok(false);
        }
        link.send_heartbeat()?;
        if let Some(high) = alert {
            link.send_rad_alert(high)?;
        }
        debug!("[Heartbeat] sent at {:.2}s alert={:?}", now, alert);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comms::transport::MockTransport;

    #[test]
    fn test_due_once_per_period() {
        let mut timer = HeartbeatTimer::new(1.0);
        timer.start(0.0);
        assert!(!timer.due(0.5));
        assert!(timer.due(1.0));
        assert!(!timer.due(1.5));
        assert!(timer.due(2.02));
    }

    #[test]
    fn test_unstarted_timer_starts_on_first_poll() {
        let mut timer = HeartbeatTimer::new(1.0);
        assert!(!timer.due(4.0));
        assert!(timer.due(5.0));
    }

    #[test]
    fn test_service_sends_alert_only_when_carrying() {
        let mock = MockTransport::new();
        let mut link = FieldLink::with_defaults(Box::new(mock.clone()));
        let mut timer = HeartbeatTimer::new(1.0);
        timer.start(0.0);

        assert!(timer.service(&mut link, None, 1.0).unwrap());
        assert_eq!(mock.take_written().len(), 6);

        assert!(!timer.service(&mut link, Some(true), 1.5).unwrap());
        assert!(mock.take_written().is_empty());

        assert!(timer.service(&mut link, Some(true), 2.0).unwrap());
        let out = mock.take_written();
        assert_eq!(out.len(), 13);
        assert_eq!(out[11], 0xFF);
    }
}
