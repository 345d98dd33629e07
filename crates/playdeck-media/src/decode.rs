// crates/playdeck-media/src/decode.rs
//
// The codec adapter contract.
//
// The engine does not link a codec library; a deployment plugs its demuxer
// and decoders in behind these traits (one adapter per container tech).
// Adapters yield raw BGRA images at their native size and raw PCM at their
// native rate — transform.rs brings both to the channel format.

use anyhow::Result;

/// Which elementary stream a packet belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamKind {
    Video,
    Audio,
}

/// One compressed packet as read from the container.
#[derive(Clone, Debug)]
pub struct Packet {
    pub stream: StreamKind,
    pub data: Vec<u8>,
}

/// Raw decoded image: packed BGRA rows, top-left origin, native size.
#[derive(Clone, Debug)]
pub struct RawVideo {
    pub width: usize,
    pub height: usize,
    pub data: Vec<u8>,
}

/// Raw decoded PCM: interleaved signed 32-bit at the stream's native rate
/// and channel count.
#[derive(Clone, Debug)]
pub struct RawAudio {
    pub sample_rate: u32,
    pub channels: usize,
    pub samples: Vec<i32>,
}

pub trait Demuxer: Send {
    /// Next packet in stream order; `None` at end of stream.
    fn next_packet(&mut self) -> Result<Option<Packet>>;

    /// Rewind to the first packet (loop playback).
    fn seek_to_start(&mut self) -> Result<()>;
}

pub trait VideoDecoder: Send {
    /// Decode one packet; may yield zero or more images (codec delay).
    fn decode(&mut self, packet: &Packet) -> Result<Vec<RawVideo>>;
}

pub trait AudioDecoder: Send {
    fn decode(&mut self, packet: &Packet) -> Result<Vec<RawAudio>>;
}

/// Everything the media producer needs for one clip.
pub struct MediaInput {
    pub demuxer: Box<dyn Demuxer>,
    pub video: Box<dyn VideoDecoder>,
    pub audio: Option<Box<dyn AudioDecoder>>,
}
