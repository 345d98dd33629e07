// crates/playdeck-core/src/format.rs
//
// Display format descriptors.
//
// A channel is created for exactly one format and never changes it. The
// descriptor fixes the image geometry (BGRA8, top-left origin), the field
// mode, the exact rational tick rate, and the audio cadence — the per-tick
// sample counts that keep 48 kHz audio in phase with non-integer frame
// rates like 30000/1001.

use std::fmt;
use std::time::Duration;

use serde::Serialize;

/// Audio sample rate for every channel. Fixed across the engine.
pub const AUDIO_SAMPLE_RATE: u32 = 48_000;

/// Interleaved audio channels carried per frame. Fixed per channel.
pub const AUDIO_CHANNELS: usize = 2;

// ── Rational ─────────────────────────────────────────────────────────────────

/// Exact `num/den` ratio. Frame rates are never stored as floats — 29.97 is
/// 30000/1001, and a drift of one part in 10^5 is a dropped frame per hour.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct Rational {
    pub num: u32,
    pub den: u32,
}

impl Rational {
    pub const fn new(num: u32, den: u32) -> Self {
        Self { num, den }
    }

    /// Reduce to lowest terms.
    pub fn reduced(self) -> Self {
        let g = gcd(self.num as u64, self.den as u64) as u32;
        Self { num: self.num / g, den: self.den / g }
    }

    pub fn as_f64(self) -> f64 {
        self.num as f64 / self.den as f64
    }
}

impl fmt::Display for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.den == 1 {
            write!(f, "{}", self.num)
        } else {
            write!(f, "{}/{}", self.num, self.den)
        }
    }
}

fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a
}

// ── Field mode ───────────────────────────────────────────────────────────────

/// Scanline structure of the output signal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum FieldMode {
    Progressive,
    /// Interlaced, upper (odd) field is temporally first. HD interlaced and PAL.
    Upper,
    /// Interlaced, lower (even) field is temporally first. NTSC.
    Lower,
}

impl FieldMode {
    pub fn is_interlaced(self) -> bool {
        !matches!(self, FieldMode::Progressive)
    }
}

// ── Format table ─────────────────────────────────────────────────────────────

/// The well-known broadcast formats a channel can be created for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum VideoFormat {
    Pal,
    Ntsc,
    X576p2500,
    X720p2500,
    X720p5000,
    X720p5994,
    X720p6000,
    X1080p2397,
    X1080p2400,
    X1080p2500,
    X1080p2997,
    X1080p3000,
    X1080i5000,
    X1080i5994,
    X1080i6000,
}

impl VideoFormat {
    /// All formats, in table order.
    pub const ALL: [VideoFormat; 15] = [
        VideoFormat::Pal,
        VideoFormat::Ntsc,
        VideoFormat::X576p2500,
        VideoFormat::X720p2500,
        VideoFormat::X720p5000,
        VideoFormat::X720p5994,
        VideoFormat::X720p6000,
        VideoFormat::X1080p2397,
        VideoFormat::X1080p2400,
        VideoFormat::X1080p2500,
        VideoFormat::X1080p2997,
        VideoFormat::X1080p3000,
        VideoFormat::X1080i5000,
        VideoFormat::X1080i5994,
        VideoFormat::X1080i6000,
    ];

    /// Look up a format by its protocol name (`PAL`, `1080i5000`, ...).
    /// Case-insensitive.
    pub fn from_name(name: &str) -> Option<VideoFormat> {
        let upper = name.to_ascii_uppercase();
        VideoFormat::ALL
            .iter()
            .copied()
            .find(|f| f.descriptor().name.eq_ignore_ascii_case(&upper))
    }

    /// The immutable descriptor for this format.
    pub fn descriptor(self) -> FormatDesc {
        // (name, width, height, field mode, frame ticks per second)
        let (name, width, height, field_mode, rate) = match self {
            VideoFormat::Pal        => ("PAL",        720, 576, FieldMode::Upper, Rational::new(25, 1)),
            VideoFormat::Ntsc       => ("NTSC",       720, 486, FieldMode::Lower, Rational::new(30_000, 1001)),
            VideoFormat::X576p2500  => ("576p2500",   720, 576, FieldMode::Progressive, Rational::new(25, 1)),
            VideoFormat::X720p2500  => ("720p2500",  1280, 720, FieldMode::Progressive, Rational::new(25, 1)),
            VideoFormat::X720p5000  => ("720p5000",  1280, 720, FieldMode::Progressive, Rational::new(50, 1)),
            VideoFormat::X720p5994  => ("720p5994",  1280, 720, FieldMode::Progressive, Rational::new(60_000, 1001)),
            VideoFormat::X720p6000  => ("720p6000",  1280, 720, FieldMode::Progressive, Rational::new(60, 1)),
            VideoFormat::X1080p2397 => ("1080p2397", 1920, 1080, FieldMode::Progressive, Rational::new(24_000, 1001)),
            VideoFormat::X1080p2400 => ("1080p2400", 1920, 1080, FieldMode::Progressive, Rational::new(24, 1)),
            VideoFormat::X1080p2500 => ("1080p2500", 1920, 1080, FieldMode::Progressive, Rational::new(25, 1)),
            VideoFormat::X1080p2997 => ("1080p2997", 1920, 1080, FieldMode::Progressive, Rational::new(30_000, 1001)),
            VideoFormat::X1080p3000 => ("1080p3000", 1920, 1080, FieldMode::Progressive, Rational::new(30, 1)),
            VideoFormat::X1080i5000 => ("1080i5000", 1920, 1080, FieldMode::Upper, Rational::new(25, 1)),
            VideoFormat::X1080i5994 => ("1080i5994", 1920, 1080, FieldMode::Upper, Rational::new(30_000, 1001)),
            VideoFormat::X1080i6000 => ("1080i6000", 1920, 1080, FieldMode::Upper, Rational::new(30, 1)),
        };
        FormatDesc::new(name, width, height, field_mode, rate, self)
    }
}

// ── Format descriptor ────────────────────────────────────────────────────────

/// Immutable per-channel format description. Interlaced formats tick once
/// per *frame* (two fields); `frame_rate` is always the tick rate.
#[derive(Clone, Debug, Serialize)]
pub struct FormatDesc {
    pub format: VideoFormat,
    pub name: &'static str,
    pub width: usize,
    pub height: usize,
    pub field_mode: FieldMode,
    pub frame_rate: Rational,
    /// Per-tick audio sample counts; the cycle covers the rational period
    /// exactly, so audio never drifts against video.
    pub audio_cadence: Vec<usize>,
}

impl FormatDesc {
    fn new(
        name: &'static str,
        width: usize,
        height: usize,
        field_mode: FieldMode,
        frame_rate: Rational,
        format: VideoFormat,
    ) -> Self {
        let audio_cadence = audio_cadence(frame_rate, AUDIO_SAMPLE_RATE);
        Self { format, name, width, height, field_mode, frame_rate, audio_cadence }
    }

    /// Bytes in one BGRA8 image plane.
    pub fn bytes_per_frame(&self) -> usize {
        self.width * self.height * 4
    }

    pub fn audio_sample_rate(&self) -> u32 {
        AUDIO_SAMPLE_RATE
    }

    pub fn audio_channels(&self) -> usize {
        AUDIO_CHANNELS
    }

    /// Sample count prescribed for tick `t` (wraps mod cadence length).
    pub fn cadence_samples(&self, tick: u64) -> usize {
        self.audio_cadence[(tick % self.audio_cadence.len() as u64) as usize]
    }

    /// Nominal duration of one tick.
    pub fn frame_period(&self) -> Duration {
        Duration::from_nanos(
            1_000_000_000u64 * self.frame_rate.den as u64 / self.frame_rate.num as u64,
        )
    }
}

impl PartialEq for FormatDesc {
    fn eq(&self, other: &Self) -> bool {
        self.format == other.format
    }
}
impl Eq for FormatDesc {}

impl fmt::Display for FormatDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Compute the per-tick sample counts for `rate` ticks per second.
///
/// Samples per tick is the rational `sample_rate·den / num`; the cadence
/// assigns `round((i+1)·spt) − round(i·spt)` samples to slot `i` over a
/// cycle of the reduced denominator, so the rounding error never exceeds
/// half a sample and cancels over the cycle.
///
/// ```
/// use playdeck_core::format::{audio_cadence, Rational};
/// assert_eq!(audio_cadence(Rational::new(25, 1), 48_000), vec![1920]);
/// assert_eq!(
///     audio_cadence(Rational::new(30_000, 1001), 48_000),
///     vec![1602, 1601, 1602, 1601, 1602],
/// );
/// ```
pub fn audio_cadence(rate: Rational, sample_rate: u32) -> Vec<usize> {
    // samples-per-tick = p/q in lowest terms
    let spt = Rational::new(sample_rate * rate.den, rate.num).reduced();
    let (p, q) = (spt.num as u64, spt.den as u64);

    // round-half-up of i·p/q
    let round = |i: u64| (2 * i * p + q) / (2 * q);

    (0..q).map(|i| (round(i + 1) - round(i)) as usize).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rational_reduce_and_display() {
        assert_eq!(Rational::new(48_048_000, 30_000).reduced(), Rational::new(8008, 5));
        assert_eq!(Rational::new(25, 1).to_string(), "25");
        assert_eq!(Rational::new(30_000, 1001).to_string(), "30000/1001");
    }

    #[test]
    fn cadence_integer_rates_are_flat() {
        assert_eq!(audio_cadence(Rational::new(50, 1), 48_000), vec![960]);
        assert_eq!(audio_cadence(Rational::new(25, 1), 48_000), vec![1920]);
        assert_eq!(audio_cadence(Rational::new(30, 1), 48_000), vec![1600]);
    }

    #[test]
    fn cadence_2997_cycles_48048_over_five_ticks() {
        let c = audio_cadence(Rational::new(30_000, 1001), 48_000);
        assert_eq!(c, vec![1602, 1601, 1602, 1601, 1602]);
        // 5 ticks span 1001/30000·5 s = 8008 samples exactly.
        assert_eq!(c.iter().sum::<usize>(), 8008);
    }

    #[test]
    fn cadence_5994_sums_exactly() {
        let c = audio_cadence(Rational::new(60_000, 1001), 48_000);
        assert_eq!(c.len(), 5);
        assert_eq!(c.iter().sum::<usize>(), 4004);
        for n in &c {
            assert!(*n == 800 || *n == 801, "unexpected slot {n}");
        }
    }

    #[test]
    fn format_lookup_by_name() {
        assert_eq!(VideoFormat::from_name("PAL"), Some(VideoFormat::Pal));
        assert_eq!(VideoFormat::from_name("1080i5000"), Some(VideoFormat::X1080i5000));
        assert_eq!(VideoFormat::from_name("pal"), Some(VideoFormat::Pal));
        assert_eq!(VideoFormat::from_name("4320p"), None);
    }

    #[test]
    fn descriptor_geometry() {
        let pal = VideoFormat::Pal.descriptor();
        assert_eq!(pal.bytes_per_frame(), 720 * 576 * 4);
        assert_eq!(pal.field_mode, FieldMode::Upper);
        assert_eq!(pal.frame_period(), Duration::from_millis(40));

        let hd = VideoFormat::X1080i5994.descriptor();
        assert!(hd.field_mode.is_interlaced());
        assert_eq!(hd.cadence_samples(0), 1602);
        assert_eq!(hd.cadence_samples(1), 1601);
        assert_eq!(hd.cadence_samples(5), 1602);
    }
}
