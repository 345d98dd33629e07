// crates/playdeck-engine/src/transition/mod.rs
//
// The transition producer.
//
// Wraps a destination producer and blends it against whatever was on air
// before (the leading producer) for a fixed number of ticks, then reports
// end-of-feed so the layer falls through to the destination itself — the
// handoff is seamless because the destination has been ticking all along.
//
// Each tick is composed at two progress values,
//
//   δ1 = tween((2t−1) / 2N)      δ2 = tween(2t / 2N)
//
// so interlaced formats can carry distinct field progress: the temporally
// first field renders at δ1, the second at δ2, interleaved one scanline
// each. Progressive formats use δ2 alone, as does the audio cross-fade.
//
// One pixel-op file per kind, selected here; Cut needs no pixel work.

mod mix;
mod push;
mod slide;
mod wipe;

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use log::warn;

use playdeck_core::color;
use playdeck_core::error::PlayoutError;
use playdeck_core::format::FieldMode;
use playdeck_core::frame::{AudioChunk, Frame, FrameFactory};
use playdeck_core::producer::{empty_producer, BoxedProducer, Producer, Receive};
use playdeck_core::tween::Tween;

// ── Configuration ────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransitionKind {
    Cut,
    Mix,
    Push,
    Slide,
    Wipe,
}

impl TransitionKind {
    /// Protocol token → kind.
    pub fn from_name(name: &str) -> Option<TransitionKind> {
        match name.to_ascii_uppercase().as_str() {
            "CUT" => Some(TransitionKind::Cut),
            "MIX" => Some(TransitionKind::Mix),
            "PUSH" => Some(TransitionKind::Push),
            "SLIDE" => Some(TransitionKind::Slide),
            "WIPE" => Some(TransitionKind::Wipe),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    FromLeft,
    FromRight,
}

impl Direction {
    pub fn from_name(name: &str) -> Option<Direction> {
        match name.to_ascii_uppercase().as_str() {
            "FROMLEFT" | "LEFT" => Some(Direction::FromLeft),
            "FROMRIGHT" | "RIGHT" => Some(Direction::FromRight),
            _ => None,
        }
    }
}

/// Immutable transition parameters.
#[derive(Clone, Copy, Debug)]
pub struct TransitionInfo {
    pub kind: TransitionKind,
    /// Ticks the blend runs for. Must be > 0 for every kind except Cut.
    pub duration: u32,
    pub direction: Direction,
    pub tween: Tween,
    /// Wipe only: colored edge width in pixels.
    pub border_width: usize,
    /// Wipe only: packed `0xAARRGGBB` border color.
    pub border_color: u32,
}

impl TransitionInfo {
    pub fn new(kind: TransitionKind, duration: u32) -> Self {
        Self {
            kind,
            duration,
            direction: Direction::FromLeft,
            tween: Tween::Linear,
            border_width: 0,
            border_color: 0,
        }
    }
}

// ── Producer ─────────────────────────────────────────────────────────────────

pub struct TransitionProducer {
    info: TransitionInfo,
    tick: u32,
    source: BoxedProducer,
    dest: BoxedProducer,
    factory: FrameFactory,
}

impl TransitionProducer {
    /// Wrap `dest`. The source side stays empty until the layer installs
    /// the previously playing producer via `set_leading_producer`.
    pub fn new(
        dest: BoxedProducer,
        info: TransitionInfo,
        factory: FrameFactory,
    ) -> Result<Self, PlayoutError> {
        if info.duration == 0 && info.kind != TransitionKind::Cut {
            return Err(PlayoutError::InvalidArgument(
                "transition duration must be at least one frame".into(),
            ));
        }
        Ok(Self { info, tick: 0, source: empty_producer(), dest, factory })
    }

    fn compose(&self, source: Arc<Frame>, dest: Arc<Frame>) -> Arc<Frame> {
        let n = self.info.duration.max(1);
        let t = self.tick;
        let delta1 = self.info.tween.apply(
            (2.0 * t as f64 - 1.0).max(0.0) / (2.0 * n as f64),
        );
        let delta2 = self.info.tween.apply(2.0 * t as f64 / (2.0 * n as f64));

        let image = match self.factory.format().field_mode {
            FieldMode::Progressive => self.render_at(&source, &dest, delta2),
            mode => {
                let first = self.render_at(&source, &dest, delta1);
                let second = self.render_at(&source, &dest, delta2);
                interleave_fields(&first, &second, self.factory.format().width, mode)
            }
        };

        // Cross-fade: source fades out, dest fades in, one gain per tick.
        let mut audio: Vec<AudioChunk> = Vec::new();
        audio.extend(
            source
                .audio()
                .iter()
                .map(|c| c.regained(c.gain * (1.0 - delta2) as f32)),
        );
        audio.extend(dest.audio().iter().map(|c| c.regained(c.gain * delta2 as f32)));

        self.factory
            .compose_with_audio(image, audio)
            .unwrap_or_else(|_| self.factory.empty())
    }

    fn render_at(&self, source: &Arc<Frame>, dest: &Arc<Frame>, delta: f64) -> Vec<u8> {
        let desc = self.factory.format();
        let (w, h) = (desc.width, desc.height);
        match self.info.kind {
            // Cut is handled in receive; treat defensively as dest here.
            TransitionKind::Cut => dest.image().to_vec(),
            TransitionKind::Mix => mix::render(source.image(), dest.image(), delta),
            TransitionKind::Push => {
                push::render(source.image(), dest.image(), w, h, delta, self.info.direction)
            }
            TransitionKind::Slide => {
                slide::render(source.image(), dest.image(), w, h, delta, self.info.direction)
            }
            TransitionKind::Wipe => wipe::render(
                source.image(),
                dest.image(),
                w,
                h,
                delta,
                self.info.direction,
                self.info.border_width,
                color::to_bgra(self.info.border_color),
            ),
        }
    }
}

impl Producer for TransitionProducer {
    fn name(&self) -> String {
        format!("transition[{:?}:{}]", self.info.kind, self.info.duration)
    }

    fn receive(&mut self, nb_samples: usize) -> Result<Receive, PlayoutError> {
        if self.tick >= self.info.duration {
            return Ok(Receive::Eof);
        }

        let (source, dest) = {
            let Self { source, dest, factory, .. } = self;
            let factory: &FrameFactory = factory;
            rayon::join(
                || pull(source, nb_samples, factory),
                || pull(dest, nb_samples, factory),
            )
        };

        let frame = if self.info.kind == TransitionKind::Cut {
            // Hold the outgoing image; no interpolation, no field doubling.
            source
        } else {
            self.compose(source, dest)
        };

        self.tick += 1;
        Ok(Receive::Frame(frame))
    }

    fn take_following(&mut self) -> Option<BoxedProducer> {
        Some(std::mem::replace(&mut self.dest, empty_producer()))
    }

    fn set_leading_producer(&mut self, prev: BoxedProducer) {
        self.source = prev;
    }
}

/// Pull one frame from a transition side. End-of-feed and failures both
/// degrade to the empty frame so the blend always has two inputs; a failed
/// producer is replaced with the empty sentinel.
fn pull(producer: &mut BoxedProducer, nb_samples: usize, factory: &FrameFactory) -> Arc<Frame> {
    match catch_unwind(AssertUnwindSafe(|| producer.receive(nb_samples))) {
        Ok(Ok(Receive::Frame(frame))) => frame,
        Ok(Ok(Receive::Empty)) => factory.empty(),
        Ok(Ok(Receive::Eof)) => {
            *producer = empty_producer();
            factory.empty()
        }
        Ok(Err(err)) => {
            warn!("removed {} from transition: {err}", producer.name());
            *producer = empty_producer();
            factory.empty()
        }
        Err(_) => {
            warn!("removed {} from transition: panicked", producer.name());
            *producer = empty_producer();
            factory.empty()
        }
    }
}

/// Interleave two full frames one scanline each. The temporally first field
/// comes from `first`: the even rows for upper-field-first formats, the odd
/// rows for lower-field-first.
fn interleave_fields(first: &[u8], second: &[u8], width: usize, mode: FieldMode) -> Vec<u8> {
    debug_assert_eq!(first.len(), second.len());
    let row_bytes = width * 4;
    let mut out = vec![0u8; first.len()];
    for (y, chunk) in out.chunks_exact_mut(row_bytes).enumerate() {
        let even = y % 2 == 0;
        let take_first = match mode {
            FieldMode::Upper => even,
            FieldMode::Lower => !even,
            FieldMode::Progressive => true,
        };
        let src = if take_first { first } else { second };
        chunk.copy_from_slice(&src[y * row_bytes..y * row_bytes + row_bytes]);
    }
    out
}
