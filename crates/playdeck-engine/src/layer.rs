// crates/playdeck-engine/src/layer.rs
//
// One compositing slot in a channel.
//
// A layer holds at most two producers: the foreground (on air) and the
// background (staged by LOADBG, promoted by PLAY). Loading for preview
// renders a single frame once, audio stripped, and holds it until play.
//
// A misbehaving foreground cannot stall the channel: errors and panics in
// `receive` are caught here, logged once, and the layer drops to Empty.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use log::warn;
use playdeck_core::error::PlayoutError;
use playdeck_core::frame::{Frame, FrameFactory};
use playdeck_core::producer::{BoxedProducer, CallFuture, Receive};

/// How `load` stages the new producer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoadOption {
    /// Stage only; current playback continues.
    None,
    /// Stage and show one still preview frame (stops current playback).
    Preview,
    /// Stage and play immediately.
    AutoPlay,
}

pub struct Layer {
    foreground: Option<BoxedProducer>,
    background: Option<BoxedProducer>,
    preview_frame: Option<Arc<Frame>>,
    factory: FrameFactory,
}

/// Read-only snapshot for the INFO surface.
#[derive(Clone, Debug)]
pub struct LayerStatus {
    pub foreground: Option<String>,
    pub background: Option<String>,
    pub has_preview: bool,
    /// Ticks the on-air producer failed to deliver in time.
    pub late_frames: u64,
}

impl Layer {
    pub fn new(factory: FrameFactory) -> Self {
        Self { foreground: None, background: None, preview_frame: None, factory }
    }

    /// Stage `producer`. Strong guarantee: the preview pull happens before
    /// any state changes, so a failing producer leaves the layer intact.
    pub fn load(
        &mut self,
        mut producer: BoxedProducer,
        option: LoadOption,
    ) -> Result<(), PlayoutError> {
        match option {
            LoadOption::Preview => {
                let nb = self.factory.format().cadence_samples(0);
                let preview = match producer.receive(nb)? {
                    // Audio is stripped from the held frame.
                    Receive::Frame(frame) => Some(
                        self.factory
                            .compose_with_audio(frame.image().to_vec(), Vec::new())?,
                    ),
                    Receive::Empty | Receive::Eof => None,
                };
                self.preview_frame = preview;
                self.foreground = None;
                self.background = Some(producer);
            }
            LoadOption::AutoPlay => {
                self.background = Some(producer);
                self.play()?;
            }
            LoadOption::None => {
                self.background = Some(producer);
            }
        }
        Ok(())
    }

    /// Promote the background to foreground. The outgoing producer becomes
    /// the new one's leading producer so transitions can pull from-frames.
    pub fn play(&mut self) -> Result<(), PlayoutError> {
        let mut next = self
            .background
            .take()
            .ok_or_else(|| PlayoutError::InvalidArgument("no background clip to play".into()))?;
        if let Some(prev) = self.foreground.take() {
            next.set_leading_producer(prev);
        }
        self.foreground = Some(next);
        self.preview_frame = None;
        Ok(())
    }

    /// Take the foreground off air. The staged background survives.
    pub fn stop(&mut self) {
        self.foreground = None;
        self.preview_frame = None;
    }

    /// Drop everything.
    pub fn clear(&mut self) {
        self.foreground = None;
        self.background = None;
        self.preview_frame = None;
    }

    /// Pull this tick's frame. `None` means the layer contributes nothing
    /// (empty state, preview absent, or producer underrun).
    pub fn receive(&mut self, nb_samples: usize) -> Option<Arc<Frame>> {
        // Up to two pulls: the active producer, then once more after an
        // end-of-feed handoff to its following producer.
        for _ in 0..2 {
            let Some(fg) = self.foreground.as_mut() else {
                return self.preview_frame.clone();
            };

            match catch_unwind(AssertUnwindSafe(|| fg.receive(nb_samples))) {
                Ok(Ok(Receive::Frame(frame))) => return Some(frame),
                Ok(Ok(Receive::Empty)) => return None,
                Ok(Ok(Receive::Eof)) => {
                    let Some(mut prev) = self.foreground.take() else {
                        return None;
                    };
                    match prev.take_following() {
                        Some(mut next) => {
                            next.set_leading_producer(prev);
                            self.foreground = Some(next);
                            // Loop for the single follow-through pull.
                        }
                        None => return None,
                    }
                }
                Ok(Err(err)) => {
                    warn!("removed producer from layer: {err}");
                    self.foreground = None;
                    return None;
                }
                Err(_) => {
                    warn!("removed producer from layer: receive panicked");
                    self.foreground = None;
                    return None;
                }
            }
        }
        None
    }

    /// Route a template-host call to the producer on this layer, preferring
    /// the one on air.
    pub fn call(&mut self, params: &[String]) -> Result<CallFuture, PlayoutError> {
        if let Some(fg) = self.foreground.as_mut() {
            return fg.call(params);
        }
        if let Some(bg) = self.background.as_mut() {
            return bg.call(params);
        }
        Err(PlayoutError::InvalidArgument("no producer on layer".into()))
    }

    pub fn status(&self) -> LayerStatus {
        LayerStatus {
            foreground: self.foreground.as_ref().map(|p| p.name()),
            background: self.background.as_ref().map(|p| p.name()),
            has_preview: self.preview_frame.is_some(),
            late_frames: self.foreground.as_ref().map(|p| p.late_frames()).unwrap_or(0),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.foreground.is_none() && self.background.is_none() && self.preview_frame.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use playdeck_core::format::VideoFormat;
    use playdeck_core::frame::AudioChunk;
    use playdeck_core::producer::Producer;

    fn factory() -> FrameFactory {
        FrameFactory::new(VideoFormat::X720p5000.descriptor())
    }

    /// Constant-value producer with optional chaining and a tick budget.
    struct TestProducer {
        value: u8,
        with_audio: bool,
        remaining: Option<u32>,
        following: Option<BoxedProducer>,
        leading_installed: bool,
        factory: FrameFactory,
    }

    impl TestProducer {
        fn boxed(factory: &FrameFactory, value: u8) -> Box<TestProducer> {
            Box::new(TestProducer {
                value,
                with_audio: false,
                remaining: None,
                following: None,
                leading_installed: false,
                factory: factory.clone(),
            })
        }
    }

    impl Producer for TestProducer {
        fn name(&self) -> String {
            format!("test[{}]", self.value)
        }

        fn receive(&mut self, nb_samples: usize) -> Result<Receive, PlayoutError> {
            if let Some(rem) = &mut self.remaining {
                if *rem == 0 {
                    return Ok(Receive::Eof);
                }
                *rem -= 1;
            }
            let image = vec![self.value; self.factory.format().bytes_per_frame()];
            let audio = if self.with_audio {
                vec![AudioChunk::new(vec![
                    7;
                    nb_samples * self.factory.format().audio_channels()
                ])]
            } else {
                Vec::new()
            };
            Ok(Receive::Frame(self.factory.create(image, audio, nb_samples)?))
        }

        fn take_following(&mut self) -> Option<BoxedProducer> {
            self.following.take()
        }

        fn set_leading_producer(&mut self, _prev: BoxedProducer) {
            self.leading_installed = true;
        }
    }

    struct FailingProducer;

    impl Producer for FailingProducer {
        fn name(&self) -> String {
            "failing".into()
        }
        fn receive(&mut self, _nb: usize) -> Result<Receive, PlayoutError> {
            Err(PlayoutError::Producer("decode failed".into()))
        }
    }

    struct PanickingProducer;

    impl Producer for PanickingProducer {
        fn name(&self) -> String {
            "panicking".into()
        }
        fn receive(&mut self, _nb: usize) -> Result<Receive, PlayoutError> {
            panic!("template host crashed");
        }
    }

    #[test]
    fn empty_layer_contributes_nothing() {
        let mut layer = Layer::new(factory());
        assert!(layer.receive(960).is_none());
        assert!(layer.is_empty());
    }

    #[test]
    fn preview_holds_one_silent_frame() {
        let f = factory();
        let mut layer = Layer::new(f.clone());
        let mut producer = TestProducer::boxed(&f, 42);
        producer.with_audio = true;
        layer.load(producer, LoadOption::Preview).unwrap();

        // Held frame repeats and carries no audio even though the producer
        // emits audio.
        for _ in 0..3 {
            let frame = layer.receive(960).expect("preview frame");
            assert_eq!(frame.image()[0], 42);
            assert!(!frame.has_audio());
        }
    }

    #[test]
    fn play_promotes_background() {
        let f = factory();
        let mut layer = Layer::new(f.clone());
        layer.load(TestProducer::boxed(&f, 1), LoadOption::Preview).unwrap();
        layer.play().unwrap();
        let frame = layer.receive(960).unwrap();
        assert_eq!(frame.image()[0], 1);
    }

    #[test]
    fn play_without_background_is_an_error() {
        let mut layer = Layer::new(factory());
        assert!(layer.play().is_err());
    }

    #[test]
    fn autoplay_goes_straight_to_air() {
        let f = factory();
        let mut layer = Layer::new(f.clone());
        layer.load(TestProducer::boxed(&f, 9), LoadOption::AutoPlay).unwrap();
        assert_eq!(layer.receive(960).unwrap().image()[0], 9);
    }

    #[test]
    fn loadbg_keeps_foreground_on_air() {
        let f = factory();
        let mut layer = Layer::new(f.clone());
        layer.load(TestProducer::boxed(&f, 1), LoadOption::AutoPlay).unwrap();
        layer.load(TestProducer::boxed(&f, 2), LoadOption::None).unwrap();
        // Foreground unchanged until play.
        assert_eq!(layer.receive(960).unwrap().image()[0], 1);
        layer.play().unwrap();
        assert_eq!(layer.receive(960).unwrap().image()[0], 2);
    }

    #[test]
    fn eof_follows_through_to_next_clip() {
        let f = factory();
        let mut first = TestProducer::boxed(&f, 5);
        first.remaining = Some(2);
        first.following = Some(TestProducer::boxed(&f, 6));

        let mut layer = Layer::new(f.clone());
        layer.load(first, LoadOption::AutoPlay).unwrap();

        assert_eq!(layer.receive(960).unwrap().image()[0], 5);
        assert_eq!(layer.receive(960).unwrap().image()[0], 5);
        // Third tick: first reports Eof, the follower takes over same tick.
        assert_eq!(layer.receive(960).unwrap().image()[0], 6);
    }

    #[test]
    fn eof_without_follower_empties_the_layer() {
        let f = factory();
        let mut only = TestProducer::boxed(&f, 5);
        only.remaining = Some(1);

        let mut layer = Layer::new(f.clone());
        layer.load(only, LoadOption::AutoPlay).unwrap();

        assert!(layer.receive(960).is_some());
        assert!(layer.receive(960).is_none());
        assert!(layer.receive(960).is_none());
    }

    #[test]
    fn failing_producer_is_removed_once() {
        let f = factory();
        let mut layer = Layer::new(f.clone());
        layer.background = Some(Box::new(FailingProducer));
        layer.play().unwrap();

        assert!(layer.receive(960).is_none());
        // Layer is now empty; no producer left to fail again.
        assert!(layer.status().foreground.is_none());
        assert!(layer.receive(960).is_none());
    }

    #[test]
    fn panicking_producer_is_contained() {
        let f = factory();
        let mut layer = Layer::new(f.clone());
        layer.background = Some(Box::new(PanickingProducer));
        layer.play().unwrap();

        assert!(layer.receive(960).is_none());
        assert!(layer.status().foreground.is_none());
    }

    #[test]
    fn stop_keeps_background_clear_drops_it() {
        let f = factory();
        let mut layer = Layer::new(f.clone());
        layer.load(TestProducer::boxed(&f, 1), LoadOption::AutoPlay).unwrap();
        layer.load(TestProducer::boxed(&f, 2), LoadOption::None).unwrap();

        layer.stop();
        assert!(layer.receive(960).is_none());
        layer.play().unwrap(); // background survived the stop
        assert_eq!(layer.receive(960).unwrap().image()[0], 2);

        layer.clear();
        layer.clear(); // idempotent
        assert!(layer.is_empty());
        assert!(layer.play().is_err());
    }

    #[test]
    fn failed_preview_leaves_state_unchanged() {
        let f = factory();
        let mut layer = Layer::new(f.clone());
        layer.load(TestProducer::boxed(&f, 3), LoadOption::AutoPlay).unwrap();

        assert!(layer.load(Box::new(FailingProducer), LoadOption::Preview).is_err());
        // Original playback intact.
        assert_eq!(layer.receive(960).unwrap().image()[0], 3);
    }
}
