// crates/playdeck-media/src/color.rs
//
// Color producer: a constant frame computed once from one packed color, or
// a horizontal gradient when several color stops are given. No audio.

use std::sync::Arc;

use playdeck_core::color;
use playdeck_core::error::PlayoutError;
use playdeck_core::frame::{Frame, FrameFactory};
use playdeck_core::producer::{Producer, Receive};
use playdeck_core::tween::lerp;

pub struct ColorProducer {
    label: String,
    frame: Arc<Frame>,
}

impl ColorProducer {
    /// Build from already-parsed packed values; at least one required.
    pub fn from_values(
        factory: &FrameFactory,
        values: &[u32],
        label: impl Into<String>,
    ) -> Result<ColorProducer, PlayoutError> {
        if values.is_empty() {
            return Err(PlayoutError::InvalidArgument("no color given".into()));
        }
        let image = render_gradient(factory, values);
        let frame = factory.create_silent(image)?;
        Ok(ColorProducer { label: label.into(), frame })
    }

    /// Parse one or more color specs (`#AARRGGBB`, `#RRGGBB`, names); more
    /// than one spec renders a left-to-right gradient.
    pub fn from_specs(
        factory: &FrameFactory,
        specs: &[String],
    ) -> Result<ColorProducer, PlayoutError> {
        let values = specs
            .iter()
            .map(|s| {
                color::parse(s).ok_or_else(|| {
                    PlayoutError::InvalidArgument(format!("invalid color: {s}"))
                })
            })
            .collect::<Result<Vec<u32>, _>>()?;
        Self::from_values(factory, &values, specs.join(", "))
    }
}

/// Fill the frame plane; with N stops, each column interpolates between its
/// surrounding pair.
fn render_gradient(factory: &FrameFactory, values: &[u32]) -> Vec<u8> {
    let desc = factory.format();
    let mut row = Vec::with_capacity(desc.width * 4);

    if values.len() == 1 {
        let px = color::to_bgra(values[0]);
        for _ in 0..desc.width {
            row.extend_from_slice(&px);
        }
    } else {
        let spans = (values.len() - 1) as f64;
        for x in 0..desc.width {
            // Position of this column along the stop sequence.
            let pos = if desc.width == 1 {
                0.0
            } else {
                x as f64 / (desc.width - 1) as f64 * spans
            };
            let idx = (pos.floor() as usize).min(values.len() - 2);
            let t = pos - idx as f64;
            let a = color::to_bgra(values[idx]);
            let b = color::to_bgra(values[idx + 1]);
            for c in 0..4 {
                row.push(lerp(a[c] as f64, b[c] as f64, t).round() as u8);
            }
        }
    }

    let mut image = Vec::with_capacity(desc.bytes_per_frame());
    for _ in 0..desc.height {
        image.extend_from_slice(&row);
    }
    image
}

impl Producer for ColorProducer {
    fn name(&self) -> String {
        format!("color[{}]", self.label)
    }

    fn receive(&mut self, _nb_samples: usize) -> Result<Receive, PlayoutError> {
        Ok(Receive::Frame(Arc::clone(&self.frame)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use playdeck_core::format::VideoFormat;

    fn factory() -> FrameFactory {
        FrameFactory::new(VideoFormat::Pal.descriptor())
    }

    #[test]
    fn solid_red_fills_the_plane() {
        let f = factory();
        let mut p = ColorProducer::from_specs(&f, &["#FFFF0000".to_string()]).unwrap();
        let frame = match p.receive(1920).unwrap() {
            Receive::Frame(frame) => frame,
            other => panic!("expected frame, got {other:?}"),
        };
        // BGRA: blue 0, green 0, red 255, alpha 255.
        assert_eq!(&frame.image()[..4], &[0, 0, 255, 255]);
        assert!(!frame.has_audio());
    }

    #[test]
    fn same_frame_every_tick() {
        let f = factory();
        let mut p = ColorProducer::from_specs(&f, &["WHITE".to_string()]).unwrap();
        let first = match p.receive(1920).unwrap() {
            Receive::Frame(frame) => frame,
            _ => unreachable!(),
        };
        let second = match p.receive(1920).unwrap() {
            Receive::Frame(frame) => frame,
            _ => unreachable!(),
        };
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn gradient_interpolates_between_stops() {
        let f = factory();
        let mut p = ColorProducer::from_specs(
            &f,
            &["#FF000000".to_string(), "#FFFFFFFF".to_string()],
        )
        .unwrap();
        let frame = match p.receive(1920).unwrap() {
            Receive::Frame(frame) => frame,
            _ => unreachable!(),
        };
        let w = f.format().width;
        let left = frame.image()[0];
        let mid = frame.image()[(w / 2) * 4];
        let right = frame.image()[(w - 1) * 4];
        assert_eq!(left, 0);
        assert_eq!(right, 255);
        assert!((125..=130).contains(&mid), "midpoint was {mid}");
    }

    #[test]
    fn rejects_bad_specs() {
        let f = factory();
        assert!(ColorProducer::from_specs(&f, &[]).is_err());
        assert!(ColorProducer::from_specs(&f, &["clip.mov".to_string()]).is_err());
    }
}
