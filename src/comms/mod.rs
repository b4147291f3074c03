// Field coordination protocol
// Framed, checksummed byte protocol to the field controller: tube bitmaps
// and enable/disable in, heartbeats and radiation alerts out.
pub mod frame;
pub mod heartbeat;
pub mod link;
pub mod transport;

pub use heartbeat::HeartbeatTimer;
pub use link::{FieldLink, LinkStats, TubeAvailability, TubeBitmaps};
pub use transport::{ChannelTransport, MockTransport, Transport, channel_pair};
