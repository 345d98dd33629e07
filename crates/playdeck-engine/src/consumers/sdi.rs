// crates/playdeck-engine/src/consumers/sdi.rs
//
// Hardware SDI output on the scheduled-playback model.
//
// The vendor SDK stays behind the `SdiPort` trait: the consumer owns a ring
// of pre-allocated frame buffers, copies each composite into the next slot,
// embeds the mixed audio, and posts the slot to the port during `prepare`.
// `display` blocks in the port's output-tick wait, which is what makes an
// SDI consumer the natural channel clock.

use std::sync::Arc;

use log::info;
use playdeck_core::audio;
use playdeck_core::consumer::Consumer;
use playdeck_core::error::PlayoutError;
use playdeck_core::format::FormatDesc;
use playdeck_core::frame::Frame;

/// Keying signal configuration for cards that output fill+key.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyerMode {
    /// Fill only.
    Disabled,
    /// The card keys internally from the fill's alpha.
    Internal,
    /// A separate key signal is scheduled alongside the fill.
    External,
}

/// The vendor-card surface the engine schedules frames into.
pub trait SdiPort: Send {
    fn model_name(&self) -> String;

    fn enable_output(&mut self, desc: &FormatDesc) -> Result<(), PlayoutError>;

    /// Queue one video frame (and optional key plane) plus its embedded
    /// audio for a future output tick. Must not block on the output clock.
    fn schedule_frame(
        &mut self,
        video: &[u8],
        key: Option<&[u8]>,
        audio: &[i32],
    ) -> Result<(), PlayoutError>;

    /// Block until the card consumes the next scheduled frame.
    fn wait_for_output_tick(&mut self) -> Result<(), PlayoutError>;
}

#[derive(Clone, Debug)]
pub struct SdiConfig {
    pub device_index: usize,
    /// Audio channels embedded on the card; the channel's two are mapped in
    /// and the rest run silent.
    pub embedded_channels: usize,
    pub keyer: KeyerMode,
    /// Scheduled ring depth, typically 3–8.
    pub buffer_depth: usize,
    /// Whether this card paces the channel.
    pub provides_clock: bool,
}

impl Default for SdiConfig {
    fn default() -> Self {
        Self {
            device_index: 1,
            embedded_channels: 2,
            keyer: KeyerMode::Disabled,
            buffer_depth: 4,
            provides_clock: true,
        }
    }
}

pub struct SdiConsumer {
    port: Box<dyn SdiPort>,
    config: SdiConfig,
    channels: usize,
    /// Pre-allocated fill ring; slots are recycled round-robin.
    ring: Vec<Vec<u8>>,
    key_ring: Vec<Vec<u8>>,
    cursor: usize,
}

impl SdiConsumer {
    pub fn new(port: Box<dyn SdiPort>, config: SdiConfig) -> SdiConsumer {
        SdiConsumer {
            port,
            config,
            channels: 2,
            ring: Vec::new(),
            key_ring: Vec::new(),
            cursor: 0,
        }
    }

    /// Expand the channel's interleaved PCM to the card's embedded channel
    /// count, zero-filling the extra channels.
    fn embed_audio(&self, frame: &Arc<Frame>) -> Vec<i32> {
        let embedded = self.config.embedded_channels.max(self.channels);
        let nb = frame
            .audio()
            .iter()
            .map(|c| c.samples.len() / self.channels)
            .max()
            .unwrap_or(0);
        let mixed = audio::mix(frame.audio(), nb, self.channels);

        let mut out = vec![0i32; nb * embedded];
        for s in 0..nb {
            for ch in 0..self.channels.min(embedded) {
                out[s * embedded + ch] = mixed[s * self.channels + ch];
            }
        }
        out
    }

    /// Grayscale key plane from the fill's alpha, BGRA-packed for the card.
    fn key_plane(image: &[u8], slot: &mut Vec<u8>) {
        slot.clear();
        for px in image.chunks_exact(4) {
            let a = px[3];
            slot.extend_from_slice(&[a, a, a, 255]);
        }
    }
}

impl Consumer for SdiConsumer {
    fn name(&self) -> String {
        format!("sdi[{}:{}]", self.config.device_index, self.port.model_name())
    }

    fn initialize(&mut self, desc: &FormatDesc) -> Result<(), PlayoutError> {
        self.channels = desc.audio_channels();
        self.port.enable_output(desc)?;
        let depth = self.config.buffer_depth.clamp(3, 8);
        self.ring = (0..depth).map(|_| vec![0u8; desc.bytes_per_frame()]).collect();
        if self.config.keyer == KeyerMode::External {
            self.key_ring = (0..depth)
                .map(|_| Vec::with_capacity(desc.bytes_per_frame()))
                .collect();
        }
        info!("{} buffer depth {depth}", self.name());
        Ok(())
    }

    fn prepare(&mut self, frame: &Arc<Frame>) -> Result<(), PlayoutError> {
        let slot = self.cursor % self.ring.len();
        self.cursor = self.cursor.wrapping_add(1);

        self.ring[slot].copy_from_slice(frame.image());
        let audio = self.embed_audio(frame);

        let key = if self.config.keyer == KeyerMode::External {
            let key_slot = &mut self.key_ring[slot];
            Self::key_plane(frame.image(), key_slot);
            Some(key_slot.as_slice())
        } else {
            None
        };

        self.port.schedule_frame(&self.ring[slot], key, &audio)
    }

    fn display(&mut self, _frame: &Arc<Frame>) -> Result<(), PlayoutError> {
        self.port.wait_for_output_tick()
    }

    fn buffer_depth(&self) -> usize {
        self.config.buffer_depth
    }

    fn has_synchronization_clock(&self) -> bool {
        self.config.provides_clock
    }

    fn index(&self) -> usize {
        100 + self.config.device_index
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use playdeck_core::format::VideoFormat;
    use playdeck_core::frame::{AudioChunk, FrameFactory};
    use std::sync::Mutex;

    #[derive(Default)]
    struct PortLog {
        scheduled: usize,
        ticks: usize,
        last_audio: Vec<i32>,
        last_key_present: bool,
        last_video_first_px: [u8; 4],
    }

    struct FakePort {
        log: Arc<Mutex<PortLog>>,
    }

    impl SdiPort for FakePort {
        fn model_name(&self) -> String {
            "fake".into()
        }
        fn enable_output(&mut self, _desc: &FormatDesc) -> Result<(), PlayoutError> {
            Ok(())
        }
        fn schedule_frame(
            &mut self,
            video: &[u8],
            key: Option<&[u8]>,
            audio: &[i32],
        ) -> Result<(), PlayoutError> {
            let mut log = self.log.lock().unwrap();
            log.scheduled += 1;
            log.last_audio = audio.to_vec();
            log.last_key_present = key.is_some();
            log.last_video_first_px.copy_from_slice(&video[..4]);
            Ok(())
        }
        fn wait_for_output_tick(&mut self) -> Result<(), PlayoutError> {
            self.log.lock().unwrap().ticks += 1;
            Ok(())
        }
    }

    fn setup(config: SdiConfig) -> (SdiConsumer, Arc<Mutex<PortLog>>, FrameFactory) {
        let log = Arc::new(Mutex::new(PortLog::default()));
        let mut consumer = SdiConsumer::new(Box::new(FakePort { log: Arc::clone(&log) }), config);
        let factory = FrameFactory::new(VideoFormat::X720p5000.descriptor());
        consumer.initialize(factory.format()).unwrap();
        (consumer, log, factory)
    }

    fn frame_with_audio(factory: &FrameFactory) -> Arc<Frame> {
        let image: Vec<u8> = [5, 6, 7, 200u8]
            .iter()
            .copied()
            .cycle()
            .take(factory.format().bytes_per_frame())
            .collect();
        let audio = vec![AudioChunk::new(vec![42; 960 * 2])];
        factory.create(image, audio, 960).unwrap()
    }

    #[test]
    fn prepare_schedules_display_waits() {
        let (mut consumer, log, factory) = setup(SdiConfig::default());
        let frame = frame_with_audio(&factory);

        consumer.prepare(&frame).unwrap();
        consumer.display(&frame).unwrap();

        let log = log.lock().unwrap();
        assert_eq!(log.scheduled, 1);
        assert_eq!(log.ticks, 1);
        assert_eq!(log.last_video_first_px, [5, 6, 7, 200]);
        assert!(!log.last_key_present);
    }

    #[test]
    fn audio_maps_into_extra_embedded_channels() {
        let config = SdiConfig { embedded_channels: 8, ..SdiConfig::default() };
        let (mut consumer, log, factory) = setup(config);
        consumer.prepare(&frame_with_audio(&factory)).unwrap();

        let log = log.lock().unwrap();
        assert_eq!(log.last_audio.len(), 960 * 8);
        // First sample frame: channels 0,1 carry PCM, 2..8 silent.
        assert_eq!(&log.last_audio[..3], &[42, 42, 0]);
    }

    #[test]
    fn external_keyer_schedules_key_plane() {
        let config = SdiConfig { keyer: KeyerMode::External, ..SdiConfig::default() };
        let (mut consumer, log, factory) = setup(config);
        consumer.prepare(&frame_with_audio(&factory)).unwrap();
        assert!(log.lock().unwrap().last_key_present);
    }

    #[test]
    fn ring_depth_is_clamped() {
        let config = SdiConfig { buffer_depth: 99, ..SdiConfig::default() };
        let (consumer, _log, _factory) = setup(config);
        assert_eq!(consumer.ring.len(), 8);
    }
}
