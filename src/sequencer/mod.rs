// Task/state sequencer
// Closed state graph driving the motion stack through the reactor cycle:
// empty reactor -> fill storage -> get supply -> fill reactor, then switch
// reactors and start over.
pub mod field;
pub mod machine;
pub mod state;

pub use field::{GridPos, RadiationLevel, Reactor, Task};
pub use machine::{Context, Sequencer, SequencerParams, Transition};
pub use state::State;
