// crates/playdeck-core/src/consumer.rs
//
// The consumer capability set.
//
// Consumers sink completed composites. The channel double-buffers the
// hand-off: `prepare(next)` is called one tick before `display` of the same
// frame, so DMA or schedule-for-output work can be posted a frame ahead.
// Exactly one consumer per channel may pace the loop by blocking in
// `display` until the physical output tick.

use std::sync::Arc;

use crate::error::PlayoutError;
use crate::format::FormatDesc;
use crate::frame::Frame;

pub type BoxedConsumer = Box<dyn Consumer>;

pub trait Consumer: Send {
    /// Short diagnostic name, e.g. `sdi[1]`.
    fn name(&self) -> String;

    /// Called once before the first frame, with the channel's format.
    fn initialize(&mut self, desc: &FormatDesc) -> Result<(), PlayoutError>;

    /// Stage `frame` for output one tick from now. Must not block on the
    /// output clock; queueing DMA is fine.
    fn prepare(&mut self, frame: &Arc<Frame>) -> Result<(), PlayoutError>;

    /// Emit the frame prepared one tick earlier. The synchronizing consumer
    /// blocks here until the hardware tick, pacing the whole channel.
    fn display(&mut self, frame: &Arc<Frame>) -> Result<(), PlayoutError>;

    /// Pipeline latency in frames between `prepare` and the frame leaving
    /// the device.
    fn buffer_depth(&self) -> usize {
        3
    }

    /// True when `display` blocks until the physical output tick and this
    /// consumer may therefore serve as the channel clock.
    fn has_synchronization_clock(&self) -> bool {
        false
    }

    /// Stable ordering key; lower values get clock priority (hardware SDI
    /// before file recorder before screen preview).
    fn index(&self) -> usize;
}
