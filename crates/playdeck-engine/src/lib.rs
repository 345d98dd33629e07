// crates/playdeck-engine/src/lib.rs
//
// The channel render pipeline: layers, the transition producer, the
// triple-buffered frame processor, the channel itself, and the shipped
// consumers.

pub mod channel;
pub mod consumers;
pub mod layer;
pub mod mixer;
pub mod transition;

pub use channel::{Channel, ChannelStatus};
pub use layer::{Layer, LayerStatus, LoadOption};
pub use mixer::FrameProcessor;
pub use transition::{Direction, TransitionInfo, TransitionKind, TransitionProducer};
