//! link.rs
//! Field coordination link: latched field state fed by validated frames.
//!
//! - Drains every buffered inbound byte on `update` and never waits for a
//!   frame remainder; partial frames stay in the parser until next cycle.
//! - A frame changes state only if its checksum holds and it comes from the
//!   field controller. Destination filtering is optional (off by default).
//! - Everything else is dropped silently and only counted in `LinkStats`.

use log::{debug, warn};

use crate::comms::frame::{
    FIELD_ID, FrameParser, Message, Parsed, ROBOT_ID, Reject, heartbeat_frame, rad_alert_frame,
};
use crate::comms::transport::Transport;
use crate::config::ProtocolConfig;
use crate::error::Result;

const READ_CHUNK: usize = 64;

/// Tube occupancy as last reported by the field.
///
/// Storage bit SET = tube occupied (unavailable); supply bit SET = tube
/// full (available). The two conventions are opposite on purpose.
/// Until the field reports, every tube in both rows reads unavailable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TubeBitmaps {
    pub storage: u8,
    pub supply: u8,
}

/// Storage byte with every tube marked occupied.
pub const STORAGE_ALL_OCCUPIED: u8 = 0x0F;

impl Default for TubeBitmaps {
    fn default() -> Self {
        Self {
            storage: STORAGE_ALL_OCCUPIED,
            supply: 0x00,
        }
    }
}

pub trait TubeAvailability {
    /// Storage tube `id` (1..=4) is empty and can take a spent rod.
    fn storage_available(&self, id: u8) -> bool;
    /// Supply tube `id` (1..=4) holds a new rod.
    fn supply_available(&self, id: u8) -> bool;
}

#[inline]
fn tube_bit(id: u8) -> Option<u8> {
    match id {
        1..=4 => Some(1 << (id - 1)),
        _ => None,
    }
}

impl TubeAvailability for TubeBitmaps {
    fn storage_available(&self, id: u8) -> bool {
        tube_bit(id).is_some_and(|bit| self.storage & bit == 0)
    }

    fn supply_available(&self, id: u8) -> bool {
        tube_bit(id).is_some_and(|bit| self.supply & bit != 0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkStats {
    pub accepted: u64,
    pub bad_checksum: u64,
    pub bad_length: u64,
    pub foreign_source: u64,
    pub misdirected: u64,
    pub unknown_type: u64,
    pub skipped_bytes: u64,
    pub heartbeats_sent: u64,
    pub alerts_sent: u64,
}

pub struct FieldLink {
    transport: Box<dyn Transport>,
    parser: FrameParser,
    robot_id: u8,
    field_id: u8,
    enforce_destination: bool,
    link_timeout_s: Option<f64>,
    robot_enabled: bool,
    bitmaps: TubeBitmaps,
    last_valid: Option<f64>,
    stats: LinkStats,
}

impl FieldLink {
    pub fn new(transport: Box<dyn Transport>, config: &ProtocolConfig) -> Self {
        Self {
            transport,
            parser: FrameParser::new(),
            robot_id: config.robot_id,
            field_id: config.field_id,
            enforce_destination: config.enforce_destination,
            link_timeout_s: config.link_timeout_s,
            robot_enabled: false,
            bitmaps: TubeBitmaps::default(),
            last_valid: None,
            stats: LinkStats::default(),
        }
    }

    /// Link with the competition ids and no optional filtering.
    pub fn with_defaults(transport: Box<dyn Transport>) -> Self {
        Self::new(
            transport,
            &ProtocolConfig {
                robot_id: ROBOT_ID,
                field_id: FIELD_ID,
                enforce_destination: false,
                link_timeout_s: None,
            },
        )
    }

    /// Drain inbound bytes and apply every accepted frame. Returns the number
    /// of frames that changed (or re-latched) state.
    ///
    /// The link timeout is checked even when the read fails, so a closed
    /// transport still clears the enable latch once the timeout expires.
    pub fn update(&mut self, now: f64) -> Result<usize> {
        let drained = self.drain(now);
        self.stats.skipped_bytes = self.parser.skipped();
        self.check_timeout(now);
        drained
    }

    fn drain(&mut self, now: f64) -> Result<usize> {
        let mut accepted = 0;
        let mut buf = [0u8; READ_CHUNK];
        loop {
            let n = self.transport.read(&mut buf)?;
            if n == 0 {
                return Ok(accepted);
            }
            for &byte in &buf[..n] {
                if let Some(parsed) = self.parser.push(byte) {
                    if self.handle(parsed, now) {
                        accepted += 1;
                    }
                }
            }
        }
    }

    fn handle(&mut self, parsed: Parsed, now: f64) -> bool {
        let frame = match parsed {
            Parsed::Frame(frame) => frame,
            Parsed::Rejected(Reject::BadChecksum) => {
                self.stats.bad_checksum += 1;
                debug!("[Link] dropped frame: bad checksum");
                return false;
            }
            Parsed::Rejected(Reject::BadLength) => {
                self.stats.bad_length += 1;
                debug!("[Link] dropped frame: bad length");
                return false;
            }
        };

        if frame.src != self.field_id {
            self.stats.foreign_source += 1;
            debug!("[Link] dropped frame from {:#04x}", frame.src);
            return false;
        }
        if self.enforce_destination && frame.dst != self.robot_id {
            self.stats.misdirected += 1;
            debug!("[Link] dropped frame for {:#04x}", frame.dst);
            return false;
        }
        let Some(message) = Message::from_frame(&frame) else {
            self.stats.unknown_type += 1;
            debug!("[Link] ignored frame type {:#04x}", frame.kind);
            return false;
        };

        match message {
            Message::StorageBitmap(bits) => self.bitmaps.storage = bits,
            Message::SupplyBitmap(bits) => self.bitmaps.supply = bits,
            Message::Stop => self.robot_enabled = false,
            Message::Resume => self.robot_enabled = true,
        }
        debug!("[Link] accepted {:?}", message);
        self.stats.accepted += 1;
        self.last_valid = Some(now);
        true
    }

    fn check_timeout(&mut self, now: f64) {
        let (Some(limit), Some(last)) = (self.link_timeout_s, self.last_valid) else {
            return;
        };
        if self.robot_enabled && now - last > limit {
            warn!("[Link] no valid frame for {:.2}s, disabling", now - last);
            self.robot_enabled = false;
        }
    }

    pub fn robot_enabled(&self) -> bool {
        self.robot_enabled
    }

    pub fn bitmaps(&self) -> TubeBitmaps {
        self.bitmaps
    }

    pub fn stats(&self) -> LinkStats {
        self.stats
    }

    pub fn send_heartbeat(&mut self) -> Result<()> {
        let frame = heartbeat_frame(self.robot_id, self.field_id);
        self.transport.write(frame.as_bytes())?;
        self.transport.flush()?;
        self.stats.heartbeats_sent += 1;
        Ok(())
    }

    /// `high` = new rod, otherwise spent rod.
    pub fn send_rad_alert(&mut self, high: bool) -> Result<()> {
        let frame = rad_alert_frame(self.robot_id, self.field_id, high);
        self.transport.write(frame.as_bytes())?;
        self.transport.flush()?;
        self.stats.alerts_sent += 1;
        Ok(())
    }
}

impl TubeAvailability for FieldLink {
    fn storage_available(&self, id: u8) -> bool {
        self.bitmaps.storage_available(id)
    }

    fn supply_available(&self, id: u8) -> bool {
        self.bitmaps.supply_available(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comms::frame::{TYPE_RESUME, TYPE_STOP, TYPE_STORAGE, TYPE_SUPPLY, TxFrame};
    use crate::comms::transport::{MockTransport, Transport, channel_pair};
    use crate::error::Error;

    fn link_with_mock() -> (FieldLink, MockTransport) {
        let mock = MockTransport::new();
        (FieldLink::with_defaults(Box::new(mock.clone())), mock)
    }

    fn field_frame(kind: u8, payload: &[u8]) -> Vec<u8> {
        TxFrame::build(kind, FIELD_ID, ROBOT_ID, payload).into_bytes()
    }

    #[test]
    fn test_defaults_before_any_frame() {
        let (link, _) = link_with_mock();
        assert!(!link.robot_enabled());
        assert_eq!(link.bitmaps(), TubeBitmaps { storage: 0x0F, supply: 0x00 });
        for id in 1..=4 {
            assert!(!link.storage_available(id));
            assert!(!link.supply_available(id));
        }
    }

    #[test]
    fn test_storage_bitmap_frame() {
        let (mut link, mock) = link_with_mock();
        mock.inject_read(&[0x5F, 0x06, 0x01, 0x00, 0x00, 0x05, 0x94]);
        assert_eq!(link.update(0.0).unwrap(), 1);
        assert!(!link.storage_available(1));
        assert!(link.storage_available(2));
        assert!(!link.storage_available(3));
        assert!(link.storage_available(4));
    }

    #[test]
    fn test_bit_semantics_are_inverted_between_directions() {
        for bit in 0..4u8 {
            let maps = TubeBitmaps { storage: 1 << bit, supply: 1 << bit };
            for id in 1..=4u8 {
                let selected = id == bit + 1;
                assert_eq!(maps.storage_available(id), !selected);
                assert_eq!(maps.supply_available(id), selected);
            }
        }
    }

    #[test]
    fn test_out_of_range_ids_are_unavailable() {
        let maps = TubeBitmaps { storage: 0x00, supply: 0xFF };
        assert!(!maps.storage_available(0));
        assert!(!maps.storage_available(5));
        assert!(!maps.supply_available(0));
        assert!(!maps.supply_available(5));
    }

    #[test]
    fn test_stop_and_resume() {
        let (mut link, mock) = link_with_mock();
        mock.inject_read(&field_frame(TYPE_RESUME, &[]));
        link.update(0.0).unwrap();
        assert!(link.robot_enabled());
        mock.inject_read(&field_frame(TYPE_STOP, &[]));
        link.update(0.1).unwrap();
        assert!(!link.robot_enabled());
    }

    #[test]
    fn test_foreign_source_is_ignored() {
        let (mut link, mock) = link_with_mock();
        mock.inject_read(&TxFrame::build(TYPE_RESUME, 0x03, ROBOT_ID, &[]).into_bytes());
        assert_eq!(link.update(0.0).unwrap(), 0);
        assert!(!link.robot_enabled());
        assert_eq!(link.stats().foreign_source, 1);
    }

    #[test]
    fn test_corrupt_frame_leaves_state_unchanged() {
        let (mut link, mock) = link_with_mock();
        mock.inject_read(&field_frame(TYPE_SUPPLY, &[0x0F]));
        link.update(0.0).unwrap();
        let before = link.bitmaps();

        let mut bad = field_frame(TYPE_SUPPLY, &[0x00]);
        bad[5] = 0x01;
        mock.inject_read(&bad);
        assert_eq!(link.update(0.1).unwrap(), 0);
        assert_eq!(link.bitmaps(), before);
        assert_eq!(link.stats().bad_checksum, 1);
    }

    #[test]
    fn test_destination_not_enforced_by_default() {
        let (mut link, mock) = link_with_mock();
        mock.inject_read(&TxFrame::build(TYPE_RESUME, FIELD_ID, 0x02, &[]).into_bytes());
        link.update(0.0).unwrap();
        assert!(link.robot_enabled());
    }

    #[test]
    fn test_destination_enforced_when_configured() {
        let mock = MockTransport::new();
        let cfg = ProtocolConfig { enforce_destination: true, ..ProtocolConfig::default() };
        let mut link = FieldLink::new(Box::new(mock.clone()), &cfg);
        mock.inject_read(&TxFrame::build(TYPE_RESUME, FIELD_ID, 0x02, &[]).into_bytes());
        link.update(0.0).unwrap();
        assert!(!link.robot_enabled());
        assert_eq!(link.stats().misdirected, 1);
    }

    #[test]
    fn test_frame_split_across_updates() {
        let (mut link, mock) = link_with_mock();
        let bytes = field_frame(TYPE_STORAGE, &[0x00]);
        mock.inject_read(&bytes[..4]);
        assert_eq!(link.update(0.0).unwrap(), 0);
        assert!(!link.storage_available(1));
        mock.inject_read(&bytes[4..]);
        assert_eq!(link.update(0.02).unwrap(), 1);
        assert!(link.storage_available(1));
    }

    #[test]
    fn test_several_frames_in_one_update() {
        let (mut link, mock) = link_with_mock();
        let mut bytes = field_frame(TYPE_STORAGE, &[0x01]);
        bytes.extend(field_frame(TYPE_SUPPLY, &[0x08]));
        bytes.extend(field_frame(TYPE_RESUME, &[]));
        mock.inject_read(&bytes);
        assert_eq!(link.update(0.0).unwrap(), 3);
        assert_eq!(link.bitmaps(), TubeBitmaps { storage: 0x01, supply: 0x08 });
        assert!(link.robot_enabled());
    }

    #[test]
    fn test_no_timeout_by_default() {
        let (mut link, mock) = link_with_mock();
        mock.inject_read(&field_frame(TYPE_RESUME, &[]));
        link.update(0.0).unwrap();
        link.update(1_000.0).unwrap();
        assert!(link.robot_enabled());
    }

    #[test]
    fn test_optional_timeout_clears_enable() {
        let mock = MockTransport::new();
        let cfg = ProtocolConfig { link_timeout_s: Some(3.0), ..ProtocolConfig::default() };
        let mut link = FieldLink::new(Box::new(mock.clone()), &cfg);
        mock.inject_read(&field_frame(TYPE_RESUME, &[]));
        link.update(0.0).unwrap();
        link.update(2.9).unwrap();
        assert!(link.robot_enabled());
        link.update(3.5).unwrap();
        assert!(!link.robot_enabled());
    }

    #[test]
    fn test_timeout_fires_after_field_end_closes() {
        let (robot_end, mut field_end) = channel_pair();
        let cfg = ProtocolConfig { link_timeout_s: Some(1.0), ..ProtocolConfig::default() };
        let mut link = FieldLink::new(Box::new(robot_end), &cfg);

        field_end.write(&field_frame(TYPE_RESUME, &[])).unwrap();
        assert_eq!(link.update(0.0).unwrap(), 1);
        assert!(link.robot_enabled());

        drop(field_end);
        assert!(matches!(link.update(0.5), Err(Error::Disconnected)));
        assert!(link.robot_enabled());
        for now in [2.0, 5.0, 100.0] {
            assert!(link.update(now).is_err());
            assert!(!link.robot_enabled());
        }
    }

    #[test]
    fn test_sends_heartbeat_and_alert() {
        let (mut link, mock) = link_with_mock();
        link.send_heartbeat().unwrap();
        link.send_rad_alert(false).unwrap();
        let out = mock.take_written();
        assert_eq!(&out[..6], &[0x5F, 0x05, 0x07, 0x07, 0x00, 0x8D]);
        assert_eq!(&out[6..12], &[0x5F, 0x06, 0x03, 0x07, 0x00, 0x2C]);
        assert_eq!(link.stats().heartbeats_sent, 1);
        assert_eq!(link.stats().alerts_sent, 1);
    }
}
