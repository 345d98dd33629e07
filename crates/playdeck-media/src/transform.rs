// crates/playdeck-media/src/transform.rs
//
// Raw stream → channel format conversion.
//
// Video: bicubic (CatmullRom) scale to the format raster. The scaler is
// channel-order agnostic, so BGRA planes pass through it untouched.
//
// Audio: channel remap to the channel's layout (mono duplicated, extras
// dropped) and FFT-based resampling to 48 kHz. The resampler works on fixed
// input chunks; anything shorter is buffered until the next push, so output
// timing is decoupled from adapter packet sizes.

use anyhow::{Context, Result};
use image::imageops::{self, FilterType};
use image::RgbaImage;
use playdeck_core::format::FormatDesc;
use rubato::{FftFixedIn, Resampler};

use crate::decode::{RawAudio, RawVideo};

// ── Video ────────────────────────────────────────────────────────────────────

/// Scale a raw image to the format raster. Returns the plane unchanged when
/// the size already matches.
pub fn scale_to_format(raw: RawVideo, desc: &FormatDesc) -> Result<Vec<u8>> {
    if raw.data.len() != raw.width * raw.height * 4 {
        anyhow::bail!(
            "raw image is {} bytes for {}x{}",
            raw.data.len(),
            raw.width,
            raw.height
        );
    }
    if raw.width == desc.width && raw.height == desc.height {
        return Ok(raw.data);
    }
    let src = RgbaImage::from_raw(raw.width as u32, raw.height as u32, raw.data)
        .context("raw image buffer")?;
    let scaled = imageops::resize(
        &src,
        desc.width as u32,
        desc.height as u32,
        FilterType::CatmullRom,
    );
    Ok(scaled.into_raw())
}

// ── Audio ────────────────────────────────────────────────────────────────────

const RESAMPLE_CHUNK: usize = 1024;

/// Streaming converter to the channel's rate and channel count.
pub struct AudioResampler {
    out_rate: u32,
    out_channels: usize,
    in_rate: u32,
    /// Planar f32 staging for the fixed-chunk resampler.
    pending: Vec<Vec<f32>>,
    inner: Option<FftFixedIn<f32>>,
    /// Converted interleaved output, ready to drain.
    ready: Vec<i32>,
}

impl AudioResampler {
    pub fn new(desc: &FormatDesc) -> AudioResampler {
        AudioResampler {
            out_rate: desc.audio_sample_rate(),
            out_channels: desc.audio_channels(),
            in_rate: 0,
            pending: Vec::new(),
            inner: None,
            ready: Vec::new(),
        }
    }

    /// Feed one raw buffer; converted samples accumulate in `ready`.
    pub fn push(&mut self, raw: &RawAudio) -> Result<()> {
        if raw.channels == 0 || raw.samples.is_empty() {
            return Ok(());
        }

        // Same rate: only the channel remap is needed.
        if raw.sample_rate == self.out_rate {
            let frames = raw.samples.len() / raw.channels;
            for i in 0..frames {
                for ch in 0..self.out_channels {
                    let src_ch = ch.min(raw.channels - 1);
                    self.ready.push(raw.samples[i * raw.channels + src_ch]);
                }
            }
            return Ok(());
        }

        if self.inner.is_none() || self.in_rate != raw.sample_rate {
            self.inner = Some(
                FftFixedIn::<f32>::new(
                    raw.sample_rate as usize,
                    self.out_rate as usize,
                    RESAMPLE_CHUNK,
                    1,
                    self.out_channels,
                )
                .context("create resampler")?,
            );
            self.in_rate = raw.sample_rate;
            self.pending = vec![Vec::new(); self.out_channels];
        }

        // Remap to the output channel count, planar f32.
        let frames = raw.samples.len() / raw.channels;
        for i in 0..frames {
            for ch in 0..self.out_channels {
                let src_ch = ch.min(raw.channels - 1);
                let s = raw.samples[i * raw.channels + src_ch] as f32 / i32::MAX as f32;
                self.pending[ch].push(s);
            }
        }

        let inner = self.inner.as_mut().expect("resampler present");
        while self.pending[0].len() >= inner.input_frames_next() {
            let take = inner.input_frames_next();
            let chunk: Vec<Vec<f32>> = self
                .pending
                .iter_mut()
                .map(|ch| ch.drain(..take).collect())
                .collect();
            let converted = inner.process(&chunk, None).context("resample")?;
            let out_frames = converted[0].len();
            for i in 0..out_frames {
                for ch in &converted {
                    let v = (ch[i] * i32::MAX as f32)
                        .clamp(i32::MIN as f32, i32::MAX as f32);
                    self.ready.push(v as i32);
                }
            }
        }
        Ok(())
    }

    /// Number of converted interleaved values waiting.
    pub fn available(&self) -> usize {
        self.ready.len()
    }

    /// Drain up to `n` interleaved values.
    pub fn take(&mut self, n: usize) -> Vec<i32> {
        let n = n.min(self.ready.len());
        self.ready.drain(..n).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use playdeck_core::format::VideoFormat;

    fn desc() -> FormatDesc {
        VideoFormat::X720p5000.descriptor()
    }

    #[test]
    fn matching_size_passes_through() {
        let d = desc();
        let raw = RawVideo { width: 1280, height: 720, data: vec![7; 1280 * 720 * 4] };
        let out = scale_to_format(raw, &d).unwrap();
        assert!(out.iter().all(|&b| b == 7));
    }

    #[test]
    fn scaling_reaches_format_raster() {
        let d = desc();
        let raw = RawVideo { width: 64, height: 36, data: vec![100; 64 * 36 * 4] };
        let out = scale_to_format(raw, &d).unwrap();
        assert_eq!(out.len(), d.bytes_per_frame());
        // A constant plane must stay constant through the scaler.
        assert!(out.iter().all(|&b| b == 100));
    }

    #[test]
    fn bad_plane_size_is_an_error() {
        let raw = RawVideo { width: 10, height: 10, data: vec![0; 16] };
        assert!(scale_to_format(raw, &desc()).is_err());
    }

    #[test]
    fn same_rate_stereo_passes_through() {
        let mut r = AudioResampler::new(&desc());
        r.push(&RawAudio { sample_rate: 48_000, channels: 2, samples: vec![5; 96] })
            .unwrap();
        assert_eq!(r.available(), 96);
        assert_eq!(r.take(10), vec![5; 10]);
    }

    #[test]
    fn mono_duplicates_into_stereo() {
        let mut r = AudioResampler::new(&desc());
        r.push(&RawAudio { sample_rate: 48_000, channels: 1, samples: vec![1, 2, 3] })
            .unwrap();
        assert_eq!(r.take(6), vec![1, 1, 2, 2, 3, 3]);
    }

    #[test]
    fn rate_conversion_produces_proportional_output() {
        let mut r = AudioResampler::new(&desc());
        // One second of 44.1 kHz stereo silence with a DC offset.
        let samples = vec![1_000_000i32; 44_100 * 2];
        r.push(&RawAudio { sample_rate: 44_100, channels: 2, samples }).unwrap();

        // Expect close to one second of 48 kHz output (minus chunk tail).
        let frames_out = r.available() / 2;
        assert!(
            (40_000..=48_000).contains(&frames_out),
            "unexpected output frame count {frames_out}"
        );
    }
}
