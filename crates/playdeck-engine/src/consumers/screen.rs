// crates/playdeck-engine/src/consumers/screen.rs
//
// On-screen preview.
//
// The window system stays behind `PresentTarget`; this consumer converts
// the BGRA composite to RGBA, scales it into the target per the configured
// policy, and presents. When the target's present blocks on the display
// refresh, the consumer may be configured as the channel clock.

use std::sync::Arc;

use image::imageops::{self, FilterType};
use image::RgbaImage;
use playdeck_core::consumer::Consumer;
use playdeck_core::error::PlayoutError;
use playdeck_core::format::FormatDesc;
use playdeck_core::frame::Frame;

/// How the channel raster maps onto the window raster.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScalePolicy {
    /// 1:1 pixels, centered; overflow is cropped, underflow letterboxed.
    None,
    /// Fit inside the window preserving aspect (letterbox).
    Uniform,
    /// Stretch to the window, ignoring aspect.
    Fill,
    /// Cover the window preserving aspect (crop).
    UniformToFill,
}

/// Placement of the scaled frame inside the window: offsets may be negative
/// when the scaled frame overflows (crop policies).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Placement {
    pub x: i64,
    pub y: i64,
    pub width: usize,
    pub height: usize,
}

/// Compute where a `src`-sized frame lands in a `dst`-sized window.
pub fn placement(
    (src_w, src_h): (usize, usize),
    (dst_w, dst_h): (usize, usize),
    policy: ScalePolicy,
) -> Placement {
    let (w, h) = match policy {
        ScalePolicy::None => (src_w, src_h),
        ScalePolicy::Fill => (dst_w, dst_h),
        ScalePolicy::Uniform | ScalePolicy::UniformToFill => {
            let sx = dst_w as f64 / src_w as f64;
            let sy = dst_h as f64 / src_h as f64;
            let s = if policy == ScalePolicy::Uniform {
                sx.min(sy)
            } else {
                sx.max(sy)
            };
            (
                (src_w as f64 * s).round().max(1.0) as usize,
                (src_h as f64 * s).round().max(1.0) as usize,
            )
        }
    };
    Placement {
        x: (dst_w as i64 - w as i64) / 2,
        y: (dst_h as i64 - h as i64) / 2,
        width: w,
        height: h,
    }
}

/// The window surface the preview draws into.
pub trait PresentTarget: Send {
    /// Current drawable size in pixels.
    fn size(&self) -> (usize, usize);

    /// Show one RGBA image filling the drawable. May block on the display
    /// refresh when this target drives the channel clock.
    fn present(&mut self, rgba: &[u8], width: usize, height: usize)
        -> Result<(), PlayoutError>;
}

pub struct ScreenConsumer {
    target: Box<dyn PresentTarget>,
    policy: ScalePolicy,
    provides_clock: bool,
    staged: Option<RgbaImage>,
}

impl ScreenConsumer {
    pub fn new(
        target: Box<dyn PresentTarget>,
        policy: ScalePolicy,
        provides_clock: bool,
    ) -> ScreenConsumer {
        ScreenConsumer { target, policy, provides_clock, staged: None }
    }

    fn compose_window(&self, frame: &Arc<Frame>) -> RgbaImage {
        let (dst_w, dst_h) = self.target.size();
        let place = placement((frame.width(), frame.height()), (dst_w, dst_h), self.policy);

        // BGRA → RGBA swizzle into an image buffer.
        let mut rgba = Vec::with_capacity(frame.image().len());
        for px in frame.image().chunks_exact(4) {
            rgba.extend_from_slice(&[px[2], px[1], px[0], px[3]]);
        }
        let src = RgbaImage::from_raw(frame.width() as u32, frame.height() as u32, rgba)
            .expect("frame plane is w*h*4");

        let scaled = if (place.width, place.height) == (frame.width(), frame.height()) {
            src
        } else {
            imageops::resize(&src, place.width as u32, place.height as u32, FilterType::Triangle)
        };

        let mut window = RgbaImage::new(dst_w as u32, dst_h as u32);
        imageops::overlay(&mut window, &scaled, place.x, place.y);
        window
    }
}

impl Consumer for ScreenConsumer {
    fn name(&self) -> String {
        "screen".into()
    }

    fn initialize(&mut self, _desc: &FormatDesc) -> Result<(), PlayoutError> {
        Ok(())
    }

    fn prepare(&mut self, frame: &Arc<Frame>) -> Result<(), PlayoutError> {
        self.staged = Some(self.compose_window(frame));
        Ok(())
    }

    fn display(&mut self, _frame: &Arc<Frame>) -> Result<(), PlayoutError> {
        // Present what was staged a tick ago; staging already rendered the
        // window image, so this is only the (possibly vsynced) flip.
        if let Some(window) = self.staged.take() {
            let (w, h) = (window.width() as usize, window.height() as usize);
            self.target.present(window.as_raw(), w, h)?;
        }
        Ok(())
    }

    fn buffer_depth(&self) -> usize {
        1
    }

    fn has_synchronization_clock(&self) -> bool {
        self.provides_clock
    }

    fn index(&self) -> usize {
        300
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use playdeck_core::format::VideoFormat;
    use playdeck_core::frame::FrameFactory;
    use std::sync::Mutex;

    #[test]
    fn uniform_letterboxes_wide_into_square() {
        let p = placement((1920, 1080), (1000, 1000), ScalePolicy::Uniform);
        assert_eq!((p.width, p.height), (1000, 563));
        assert_eq!(p.x, 0);
        assert_eq!(p.y, (1000 - 563) / 2);
    }

    #[test]
    fn uniform_to_fill_crops() {
        let p = placement((1920, 1080), (1000, 1000), ScalePolicy::UniformToFill);
        assert_eq!((p.width, p.height), (1778, 1000));
        assert!(p.x < 0, "horizontal overflow is centered");
        assert_eq!(p.y, 0);
    }

    #[test]
    fn fill_stretches() {
        let p = placement((720, 576), (200, 100), ScalePolicy::Fill);
        assert_eq!(p, Placement { x: 0, y: 0, width: 200, height: 100 });
    }

    #[test]
    fn none_is_centered_unscaled() {
        let p = placement((720, 576), (1000, 1000), ScalePolicy::None);
        assert_eq!((p.width, p.height), (720, 576));
        assert_eq!(p.x, 140);
        assert_eq!(p.y, 212);
    }

    struct CapturingTarget {
        size: (usize, usize),
        last: Arc<Mutex<Option<(Vec<u8>, usize, usize)>>>,
    }

    impl PresentTarget for CapturingTarget {
        fn size(&self) -> (usize, usize) {
            self.size
        }
        fn present(
            &mut self,
            rgba: &[u8],
            width: usize,
            height: usize,
        ) -> Result<(), PlayoutError> {
            *self.last.lock().unwrap() = Some((rgba.to_vec(), width, height));
            Ok(())
        }
    }

    #[test]
    fn presents_swizzled_window_image() {
        let last = Arc::new(Mutex::new(None));
        let target = CapturingTarget { size: (1280, 720), last: Arc::clone(&last) };
        let mut consumer = ScreenConsumer::new(Box::new(target), ScalePolicy::Fill, false);

        let factory = FrameFactory::new(VideoFormat::X720p5000.descriptor());
        consumer.initialize(factory.format()).unwrap();

        // Opaque red in BGRA.
        let image: Vec<u8> = [0, 0, 255, 255u8]
            .iter()
            .copied()
            .cycle()
            .take(factory.format().bytes_per_frame())
            .collect();
        let frame = factory.create_silent(image).unwrap();

        consumer.prepare(&frame).unwrap();
        consumer.display(&frame).unwrap();

        let captured = last.lock().unwrap().clone().expect("presented");
        assert_eq!((captured.1, captured.2), (1280, 720));
        // RGBA red after the swizzle.
        assert_eq!(&captured.0[..4], &[255, 0, 0, 255]);
    }
}
