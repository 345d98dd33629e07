// crates/playdeck-engine/src/consumers/mod.rs
//
// The consumers the engine ships. Vendor surfaces (SDI SDKs, window
// systems) stay behind traits; see each module.

pub mod audio;
pub mod record;
pub mod screen;
pub mod sdi;

pub use audio::WavAudioConsumer;
pub use record::{RawFileReader, RawFileSink, RecordConsumer, RecordSink};
pub use screen::{PresentTarget, ScalePolicy, ScreenConsumer};
pub use sdi::{KeyerMode, SdiConfig, SdiConsumer, SdiPort};
