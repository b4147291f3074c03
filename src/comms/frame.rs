//! frame.rs
//! Wire format of the field coordination link.
//!
//! ```text
//! [START=0x5F][LEN][TYPE][SRC][DST][payload ...][CHK]
//! ```
//!
//! - `LEN` counts every byte from itself through `CHK` (frame size = LEN + 1).
//! - `CHK = 0xFF - sum(all preceding bytes)` mod 256, start byte included,
//!   so running `0xFF - byte` over a whole valid frame ends at `0x00`.
//!
//! Inbound bytes go through `FrameParser`, an incremental state machine that
//! never waits for the rest of a frame: a partial frame simply stays buffered
//! until later bytes arrive.

pub const START_BYTE: u8 = 0x5F;

pub const TYPE_STORAGE: u8 = 0x01;
pub const TYPE_SUPPLY: u8 = 0x02;
pub const TYPE_RADIATION: u8 = 0x03;
pub const TYPE_STOP: u8 = 0x04;
pub const TYPE_RESUME: u8 = 0x05;
pub const TYPE_HEARTBEAT: u8 = 0x07;

pub const FIELD_ID: u8 = 0x00;
pub const ROBOT_ID: u8 = 0x07;

pub const RAD_NEW_ROD: u8 = 0xFF;
pub const RAD_SPENT_ROD: u8 = 0x2C;

/// LEN + TYPE + SRC + DST + CHK
pub const MIN_LEN: u8 = 5;

/// Running checksum over `bytes`, seeded at 0xFF.
#[inline]
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0xFFu8, |acc, &b| acc.wrapping_sub(b))
}

/// One decoded frame (checksum already verified).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub kind: u8,
    pub src: u8,
    pub dst: u8,
    pub payload: Vec<u8>,
}

/// Messages the field controller sends us.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Message {
    StorageBitmap(u8),
    SupplyBitmap(u8),
    Stop,
    Resume,
}

impl Message {
    /// None for unknown types or bitmap frames without a payload byte.
    pub fn from_frame(frame: &Frame) -> Option<Message> {
        match frame.kind {
            TYPE_STORAGE => frame.payload.first().map(|&b| Message::StorageBitmap(b)),
            TYPE_SUPPLY => frame.payload.first().map(|&b| Message::SupplyBitmap(b)),
            TYPE_STOP => Some(Message::Stop),
            TYPE_RESUME => Some(Message::Resume),
            _ => None,
        }
    }
}

// ============================================================================
// Outbound frames
// ============================================================================

/// Outbound frame with its checksum already appended.
#[derive(Debug, Clone)]
pub struct TxFrame {
    data: Vec<u8>,
}

impl TxFrame {
    pub fn build(kind: u8, src: u8, dst: u8, payload: &[u8]) -> Self {
        let len = MIN_LEN as usize + payload.len();
        let mut data = Vec::with_capacity(len + 1);
        data.push(START_BYTE);
        data.push(len as u8);
        data.push(kind);
        data.push(src);
        data.push(dst);
        data.extend_from_slice(payload);
        let chk = checksum(&data);
        data.push(chk);
        Self { data }
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }
}

pub fn heartbeat_frame(src: u8, dst: u8) -> TxFrame {
    TxFrame::build(TYPE_HEARTBEAT, src, dst, &[])
}

/// `high` = freshly picked new rod, otherwise a spent rod.
pub fn rad_alert_frame(src: u8, dst: u8, high: bool) -> TxFrame {
    let level = if high { RAD_NEW_ROD } else { RAD_SPENT_ROD };
    TxFrame::build(TYPE_RADIATION, src, dst, &[level])
}

// ============================================================================
// Inbound parser
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reject {
    BadChecksum,
    BadLength,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Parsed {
    Frame(Frame),
    Rejected(Reject),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParseState {
    Hunt,
    Length,
    Body { len: usize },
}

#[derive(Debug)]
pub struct FrameParser {
    state: ParseState,
    buf: Vec<u8>,
    skipped: u64,
}

impl FrameParser {
    pub fn new() -> Self {
        Self {
            state: ParseState::Hunt,
            buf: Vec::with_capacity(256),
            skipped: 0,
        }
    }

    /// Feed one byte. Returns a result only when a frame completes or is abandoned.
    pub fn push(&mut self, byte: u8) -> Option<Parsed> {
        match self.state {
            ParseState::Hunt => {
                if byte == START_BYTE {
                    self.buf.clear();
                    self.buf.push(byte);
                    self.state = ParseState::Length;
                } else {
                    self.skipped += 1;
                }
                None
            }
            ParseState::Length => {
                if byte < MIN_LEN {
                    self.state = ParseState::Hunt;
                    return Some(Parsed::Rejected(Reject::BadLength));
                }
                self.buf.push(byte);
                self.state = ParseState::Body { len: byte as usize };
                None
            }
            ParseState::Body { len } => {
                self.buf.push(byte);
                // buf holds START plus `len` bytes once complete
                if self.buf.len() < len + 1 {
                    return None;
                }
                self.state = ParseState::Hunt;
                if checksum(&self.buf) != 0x00 {
                    return Some(Parsed::Rejected(Reject::BadChecksum));
                }
                let end = self.buf.len() - 1;
                Some(Parsed::Frame(Frame {
                    kind: self.buf[2],
                    src: self.buf[3],
                    dst: self.buf[4],
                    payload: self.buf[5..end].to_vec(),
                }))
            }
        }
    }

    /// Bytes thrown away while hunting for a start byte.
    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    /// True while a frame is partially received.
    pub fn in_frame(&self) -> bool {
        self.state != ParseState::Hunt
    }
}

impl Default for FrameParser {
    fn default() -> Self {
        Self::new()
    }
}
