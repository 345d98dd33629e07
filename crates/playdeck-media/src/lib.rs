// crates/playdeck-media/src/lib.rs
//
// The shipped producers (color, still image, decoder-driven clip), the
// codec adapter contract they are built on, and the spec registry that
// turns protocol tokens into producers.

pub mod color;
pub mod decode;
pub mod media;
pub mod registry;
pub mod still;
pub mod transform;

pub use color::ColorProducer;
pub use decode::{AudioDecoder, Demuxer, MediaInput, Packet, RawAudio, RawVideo, StreamKind, VideoDecoder};
pub use still::ImageProducer;
pub use media::{MediaConfig, MediaProducer};
pub use registry::{MediaOpener, ProducerRegistry};
