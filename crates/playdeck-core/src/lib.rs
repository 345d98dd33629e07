// crates/playdeck-core/src/lib.rs
//
// Format descriptors, the frame model, and the producer/consumer traits —
// the vocabulary shared by the engine, the shipped producers, and the
// control surface. No threads live here.

pub mod audio;
pub mod color;
pub mod consumer;
pub mod error;
pub mod format;
pub mod frame;
pub mod producer;
pub mod tween;

pub use consumer::{BoxedConsumer, Consumer};
pub use error::PlayoutError;
pub use format::{FormatDesc, VideoFormat};
pub use frame::{AudioChunk, Frame, FrameFactory};
pub use producer::{empty_producer, BoxedProducer, Producer, Receive};
