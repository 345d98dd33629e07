// crates/playdeck-media/src/registry.rs
//
// Producer spec resolution: the tokenized media spec from a LOAD/LOADBG
// command selects a producer factory.
//
//   EMPTY          → the empty producer
//   #AARRGGBB etc. → color (several color tokens form a gradient)
//   *.png *.jpg …  → still image from the media folder
//   *.mov *.mp4 …  → clip via the registered codec adapter
//   anything else  → media-not-found (the 404 reply class)

use std::path::{Path, PathBuf};
use std::sync::Arc;

use playdeck_core::color;
use playdeck_core::error::PlayoutError;
use playdeck_core::frame::FrameFactory;
use playdeck_core::producer::{empty_producer, BoxedProducer};

use crate::color::ColorProducer;
use crate::decode::MediaInput;
use crate::media::{MediaConfig, MediaProducer};
use crate::still::ImageProducer;

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "tga"];
const MEDIA_EXTENSIONS: &[&str] = &["mov", "mp4", "avi", "mkv", "mxf", "webm"];

/// Opens a clip through whatever codec adapter the deployment registered.
pub type MediaOpener = Arc<dyn Fn(&Path) -> anyhow::Result<MediaInput> + Send + Sync>;

pub struct ProducerRegistry {
    media_dir: PathBuf,
    opener: Option<MediaOpener>,
}

impl ProducerRegistry {
    pub fn new(media_dir: impl Into<PathBuf>) -> ProducerRegistry {
        ProducerRegistry { media_dir: media_dir.into(), opener: None }
    }

    /// Register the codec adapter used for clip extensions.
    pub fn with_media_opener(mut self, opener: MediaOpener) -> ProducerRegistry {
        self.opener = Some(opener);
        self
    }

    /// Resolve a spec (first token) plus its parameter tokens into a
    /// producer bound to `factory`'s format.
    pub fn resolve(
        &self,
        factory: &FrameFactory,
        params: &[String],
    ) -> Result<BoxedProducer, PlayoutError> {
        let Some(spec) = params.first() else {
            return Err(PlayoutError::InvalidArgument("missing producer spec".into()));
        };

        if spec.eq_ignore_ascii_case("EMPTY") {
            return Ok(empty_producer());
        }

        if color::parse(spec).is_some() {
            // Leading run of color tokens forms a gradient.
            let colors: Vec<String> = params
                .iter()
                .take_while(|p| color::parse(p).is_some())
                .cloned()
                .collect();
            return Ok(Box::new(ColorProducer::from_specs(factory, &colors)?));
        }

        let extension = Path::new(spec.as_str())
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();

        if IMAGE_EXTENSIONS.contains(&extension.as_str()) {
            let path = self.resolve_path(spec);
            return Ok(Box::new(ImageProducer::from_path(factory, path)?));
        }

        if MEDIA_EXTENSIONS.contains(&extension.as_str()) {
            let opener = self.opener.as_ref().ok_or_else(|| {
                PlayoutError::MediaNotFound(format!("no codec adapter for {spec}"))
            })?;
            let path = self.resolve_path(spec);
            let input = opener(&path)
                .map_err(|e| PlayoutError::MediaNotFound(format!("{spec}: {e:#}")))?;
            let looping = params.iter().any(|p| p.eq_ignore_ascii_case("LOOP"));
            let config = MediaConfig { label: spec.clone(), looping };
            return Ok(Box::new(MediaProducer::new(factory.clone(), input, config)));
        }

        Err(PlayoutError::MediaNotFound(spec.clone()))
    }

    fn resolve_path(&self, spec: &str) -> PathBuf {
        let path = Path::new(spec);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.media_dir.join(path)
        }
    }
}
