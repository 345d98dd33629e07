// crates/playdeck-engine/src/consumers/audio.rs
//
// Audio-only sink: mixes each composite's chunks and appends the PCM to a
// WAV file. Ignores the image entirely and never clocks the channel.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use hound::{SampleFormat, WavSpec, WavWriter};
use playdeck_core::audio;
use playdeck_core::consumer::Consumer;
use playdeck_core::error::PlayoutError;
use playdeck_core::format::FormatDesc;
use playdeck_core::frame::Frame;

pub struct WavAudioConsumer {
    path: PathBuf,
    channels: usize,
    writer: Option<WavWriter<std::io::BufWriter<std::fs::File>>>,
}

impl WavAudioConsumer {
    pub fn new(path: impl AsRef<Path>) -> WavAudioConsumer {
        WavAudioConsumer { path: path.as_ref().to_path_buf(), channels: 2, writer: None }
    }
}

impl Consumer for WavAudioConsumer {
    fn name(&self) -> String {
        format!("audio[{}]", self.path.display())
    }

    fn initialize(&mut self, desc: &FormatDesc) -> Result<(), PlayoutError> {
        self.channels = desc.audio_channels();
        let spec = WavSpec {
            channels: desc.audio_channels() as u16,
            sample_rate: desc.audio_sample_rate(),
            bits_per_sample: 32,
            sample_format: SampleFormat::Int,
        };
        let writer = WavWriter::create(&self.path, spec)
            .map_err(|e| PlayoutError::Consumer(format!("wav open: {e}")))?;
        self.writer = Some(writer);
        Ok(())
    }

    fn prepare(&mut self, _frame: &Arc<Frame>) -> Result<(), PlayoutError> {
        Ok(())
    }

    fn display(&mut self, frame: &Arc<Frame>) -> Result<(), PlayoutError> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| PlayoutError::Consumer("wav sink not initialized".into()))?;
        let nb = frame
            .audio()
            .iter()
            .map(|c| c.samples.len() / self.channels)
            .max()
            .unwrap_or(0);
        for sample in audio::mix(frame.audio(), nb, self.channels) {
            writer
                .write_sample(sample)
                .map_err(|e| PlayoutError::Consumer(format!("wav write: {e}")))?;
        }
        Ok(())
    }

    fn buffer_depth(&self) -> usize {
        1
    }

    fn index(&self) -> usize {
        400
    }
}

impl Drop for WavAudioConsumer {
    fn drop(&mut self) {
        if let Some(writer) = self.writer.take() {
            let _ = writer.finalize();
        }
    }
}
