// crates/playdeck-core/src/frame.rs
//
// The frame model.
//
// A Frame is one BGRA image plane plus the audio covering one tick at the
// channel cadence. Frames are immutable once a producer has emitted them and
// travel the pipeline as `Arc<Frame>`; compositing allocates a new frame.
// Audio rides as per-source chunks with a gain each — gains are applied when
// a consumer mixes, so a transition can cross-fade without rewriting PCM.

use std::sync::Arc;

use crate::error::PlayoutError;
use crate::format::FormatDesc;

// ── Audio chunk ──────────────────────────────────────────────────────────────

/// One source's interleaved signed 32-bit PCM for a single tick, with the
/// gain to apply at mix time. `samples.len()` is the cadence slot count
/// times the channel count.
#[derive(Clone, Debug)]
pub struct AudioChunk {
    pub samples: Arc<Vec<i32>>,
    pub gain: f32,
}

impl AudioChunk {
    pub fn new(samples: Vec<i32>) -> Self {
        Self { samples: Arc::new(samples), gain: 1.0 }
    }

    pub fn with_gain(samples: Arc<Vec<i32>>, gain: f32) -> Self {
        Self { samples, gain }
    }

    /// Same PCM, different gain. The sample buffer is shared, not copied.
    pub fn regained(&self, gain: f32) -> Self {
        Self { samples: Arc::clone(&self.samples), gain }
    }
}

// ── Frame ────────────────────────────────────────────────────────────────────

/// Immutable image + audio bundle.
#[derive(Debug)]
pub struct Frame {
    width: usize,
    height: usize,
    image: Vec<u8>,
    audio: Vec<AudioChunk>,
}

impl Frame {
    /// Packed BGRA8 rows, stride = width·4, top-left origin.
    pub fn image(&self) -> &[u8] {
        &self.image
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Audio chunks in compositing order (z-ascending for composites).
    pub fn audio(&self) -> &[AudioChunk] {
        &self.audio
    }

    pub fn has_audio(&self) -> bool {
        !self.audio.is_empty()
    }

    /// Total samples across chunks — diagnostic, not the mixed length.
    pub fn audio_sample_count(&self) -> usize {
        self.audio.iter().map(|c| c.samples.len()).sum()
    }
}

// ── Frame factory ────────────────────────────────────────────────────────────

/// Creates frames bound to one channel's format, so every frame in the
/// channel has identical dimensions. Cheap to clone; the cached empty frame
/// is shared.
#[derive(Clone)]
pub struct FrameFactory {
    desc: Arc<FormatDesc>,
    empty: Arc<Frame>,
}

impl FrameFactory {
    pub fn new(desc: FormatDesc) -> Self {
        let empty = Arc::new(Frame {
            width: desc.width,
            height: desc.height,
            image: vec![0u8; desc.bytes_per_frame()],
            audio: Vec::new(),
        });
        Self { desc: Arc::new(desc), empty }
    }

    pub fn format(&self) -> &FormatDesc {
        &self.desc
    }

    /// The channel's all-zero, silent sentinel frame.
    pub fn empty(&self) -> Arc<Frame> {
        Arc::clone(&self.empty)
    }

    /// True when `frame` is this channel's empty sentinel.
    pub fn is_empty_frame(&self, frame: &Arc<Frame>) -> bool {
        Arc::ptr_eq(frame, &self.empty)
    }

    /// Build a frame from an owned image plane and optional audio chunks.
    ///
    /// The image length must equal the format's bytes-per-frame; every chunk
    /// must carry `nb_samples · channels` samples for its cadence slot.
    pub fn create(
        &self,
        image: Vec<u8>,
        audio: Vec<AudioChunk>,
        nb_samples: usize,
    ) -> Result<Arc<Frame>, PlayoutError> {
        if image.len() != self.desc.bytes_per_frame() {
            return Err(PlayoutError::InvalidArgument(format!(
                "image plane is {} bytes, format {} requires {}",
                image.len(),
                self.desc.name,
                self.desc.bytes_per_frame()
            )));
        }
        let want = nb_samples * self.desc.audio_channels();
        for chunk in &audio {
            if chunk.samples.len() != want {
                return Err(PlayoutError::InvalidArgument(format!(
                    "audio chunk is {} samples, cadence slot requires {}",
                    chunk.samples.len(),
                    want
                )));
            }
        }
        Ok(Arc::new(Frame {
            width: self.desc.width,
            height: self.desc.height,
            image,
            audio,
        }))
    }

    /// Video-only frame (no audio chunks).
    pub fn create_silent(&self, image: Vec<u8>) -> Result<Arc<Frame>, PlayoutError> {
        self.create(image, Vec::new(), 0)
    }

    /// Assemble a composite from an image plane and already-collected audio
    /// chunks. Chunk lengths are not revalidated here — they were checked
    /// when the input frames were created.
    pub fn compose_with_audio(
        &self,
        image: Vec<u8>,
        audio: Vec<AudioChunk>,
    ) -> Result<Arc<Frame>, PlayoutError> {
        if image.len() != self.desc.bytes_per_frame() {
            return Err(PlayoutError::InvalidArgument(format!(
                "composite plane is {} bytes, format {} requires {}",
                image.len(),
                self.desc.name,
                self.desc.bytes_per_frame()
            )));
        }
        Ok(Arc::new(Frame {
            width: self.desc.width,
            height: self.desc.height,
            image,
            audio,
        }))
    }

    /// Assemble a composite: image plane plus the input frames' chunks
    /// concatenated in submission (z-ascending) order.
    pub fn compose(
        &self,
        image: Vec<u8>,
        inputs: &[Arc<Frame>],
    ) -> Result<Arc<Frame>, PlayoutError> {
        let audio = inputs
            .iter()
            .flat_map(|f| f.audio.iter().cloned())
            .collect();
        self.compose_with_audio(image, audio)
    }
}
