// crates/playdeck-media/src/still.rs
//
// Still-image producer: decode once, bicubic-scale to the format raster,
// swizzle to BGRA, then return the same silent frame forever.

use std::path::Path;
use std::sync::Arc;

use image::imageops::FilterType;
use playdeck_core::error::PlayoutError;
use playdeck_core::frame::{Frame, FrameFactory};
use playdeck_core::producer::{Producer, Receive};

#[derive(Debug)]
pub struct ImageProducer {
    label: String,
    frame: Arc<Frame>,
}

impl ImageProducer {
    pub fn from_path(
        factory: &FrameFactory,
        path: impl AsRef<Path>,
    ) -> Result<ImageProducer, PlayoutError> {
        let path = path.as_ref();
        let decoded = image::open(path).map_err(|e| {
            PlayoutError::MediaNotFound(format!("{}: {e}", path.display()))
        })?;

        let desc = factory.format();
        let scaled = decoded
            .resize_exact(desc.width as u32, desc.height as u32, FilterType::CatmullRom)
            .into_rgba8();

        // RGBA → BGRA for the wire format. Orientation is already top-left;
        // loaders that deliver bottom-up rows must flip before this point.
        let mut plane = scaled.into_raw();
        for px in plane.chunks_exact_mut(4) {
            px.swap(0, 2);
        }

        let frame = factory.create_silent(plane)?;
        let label = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(ImageProducer { label, frame })
    }
}

impl Producer for ImageProducer {
    fn name(&self) -> String {
        format!("image[{}]", self.label)
    }

    fn receive(&mut self, _nb_samples: usize) -> Result<Receive, PlayoutError> {
        Ok(Receive::Frame(Arc::clone(&self.frame)))
    }
}
