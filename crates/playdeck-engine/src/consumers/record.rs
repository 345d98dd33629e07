// crates/playdeck-engine/src/consumers/record.rs
//
// File recorder.
//
// Container and codec choice live behind `RecordSink`; the consumer owns a
// writer thread fed through a deep bounded queue, so disk latency reaches
// the channel only when the queue is full (the recorder's documented
// backpressure) and never through the display path. A recorder is never the
// channel clock.
//
// The shipped sink writes an uncompressed stream — frame-exact and
// dependency-free, which is also what the round-trip tests decode.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam_channel::{bounded, Receiver, Sender};
use log::{error, info};
use playdeck_core::audio;
use playdeck_core::consumer::Consumer;
use playdeck_core::error::PlayoutError;
use playdeck_core::format::FormatDesc;
use playdeck_core::frame::Frame;

/// Writer queue depth — roughly one second at 50p before the channel feels
/// the disk.
const WRITE_QUEUE_CAPACITY: usize = 48;

pub trait RecordSink: Send + 'static {
    fn begin(&mut self, desc: &FormatDesc) -> io::Result<()>;
    fn write_frame(&mut self, image: &[u8], audio: &[i32]) -> io::Result<()>;
    fn finish(&mut self) -> io::Result<()>;
}

enum WriteJob {
    Frame { image: Arc<Frame>, audio: Vec<i32> },
    Stop,
}

pub struct RecordConsumer {
    name: String,
    channels: usize,
    tx: Option<Sender<WriteJob>>,
    writer: Option<JoinHandle<io::Result<()>>>,
    sink: Option<Box<dyn RecordSink>>,
}

impl RecordConsumer {
    pub fn new(name: impl Into<String>, sink: Box<dyn RecordSink>) -> RecordConsumer {
        RecordConsumer { name: name.into(), channels: 2, tx: None, writer: None, sink: Some(sink) }
    }

    /// Recorder writing the shipped raw container to `path`.
    pub fn to_file(path: impl Into<PathBuf>) -> RecordConsumer {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "record".into());
        RecordConsumer::new(name, Box::new(RawFileSink::new(path)))
    }

    fn writer_failed(&self) -> bool {
        self.writer.as_ref().is_some_and(|w| w.is_finished())
    }
}

impl Consumer for RecordConsumer {
    fn name(&self) -> String {
        format!("record[{}]", self.name)
    }

    fn initialize(&mut self, desc: &FormatDesc) -> Result<(), PlayoutError> {
        self.channels = desc.audio_channels();
        let mut sink = self.sink.take().ok_or_else(|| {
            PlayoutError::Consumer("recorder already initialized".into())
        })?;
        sink.begin(desc)
            .map_err(|e| PlayoutError::Consumer(format!("recorder open: {e}")))?;

        let (tx, rx) = bounded::<WriteJob>(WRITE_QUEUE_CAPACITY);
        let name = self.name.clone();
        let writer = std::thread::Builder::new()
            .name(format!("playdeck-record-{name}"))
            .spawn(move || write_loop(sink, rx, &name))
            .expect("spawn recorder thread");

        self.tx = Some(tx);
        self.writer = Some(writer);
        info!("{} recording started", self.name());
        Ok(())
    }

    fn prepare(&mut self, frame: &Arc<Frame>) -> Result<(), PlayoutError> {
        if self.writer_failed() {
            return Err(PlayoutError::Consumer("recorder writer stopped".into()));
        }
        let nb = frame
            .audio()
            .iter()
            .map(|c| c.samples.len() / self.channels)
            .max()
            .unwrap_or(0);
        let audio = audio::mix(frame.audio(), nb, self.channels);
        let tx = self
            .tx
            .as_ref()
            .ok_or_else(|| PlayoutError::Consumer("recorder not initialized".into()))?;
        // Blocking send: the write queue is the recorder's backpressure.
        tx.send(WriteJob::Frame { image: Arc::clone(frame), audio })
            .map_err(|_| PlayoutError::Consumer("recorder writer gone".into()))
    }

    fn display(&mut self, _frame: &Arc<Frame>) -> Result<(), PlayoutError> {
        Ok(())
    }

    fn has_synchronization_clock(&self) -> bool {
        false
    }

    fn index(&self) -> usize {
        200
    }
}

impl Drop for RecordConsumer {
    fn drop(&mut self) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(WriteJob::Stop);
        }
        if let Some(writer) = self.writer.take() {
            match writer.join() {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!("recorder {} close: {e}", self.name),
                Err(_) => error!("recorder {} writer panicked", self.name),
            }
        }
    }
}

fn write_loop(
    mut sink: Box<dyn RecordSink>,
    rx: Receiver<WriteJob>,
    name: &str,
) -> io::Result<()> {
    while let Ok(job) = rx.recv() {
        match job {
            WriteJob::Frame { image, audio } => {
                if let Err(e) = sink.write_frame(image.image(), &audio) {
                    error!("recorder {name} write failed: {e}");
                    let _ = sink.finish();
                    return Err(e);
                }
            }
            WriteJob::Stop => break,
        }
    }
    sink.finish()
}

// ── Raw container ────────────────────────────────────────────────────────────

const RAW_MAGIC: &[u8; 4] = b"PDR1";

/// Uncompressed BGRA + PCM stream:
///
/// ```text
/// "PDR1" | width u32 | height u32 | rate_num u32 | rate_den u32 | channels u32
/// per frame: image plane | sample_count u32 | samples i32…
/// ```
///
/// All integers little-endian.
pub struct RawFileSink {
    path: PathBuf,
    out: Option<BufWriter<File>>,
    bytes_per_frame: usize,
}

impl RawFileSink {
    pub fn new(path: impl Into<PathBuf>) -> RawFileSink {
        RawFileSink { path: path.into(), out: None, bytes_per_frame: 0 }
    }
}

impl RecordSink for RawFileSink {
    fn begin(&mut self, desc: &FormatDesc) -> io::Result<()> {
        let mut out = BufWriter::new(File::create(&self.path)?);
        out.write_all(RAW_MAGIC)?;
        for value in [
            desc.width as u32,
            desc.height as u32,
            desc.frame_rate.num,
            desc.frame_rate.den,
            desc.audio_channels() as u32,
        ] {
            out.write_all(&value.to_le_bytes())?;
        }
        self.bytes_per_frame = desc.bytes_per_frame();
        self.out = Some(out);
        Ok(())
    }

    fn write_frame(&mut self, image: &[u8], audio: &[i32]) -> io::Result<()> {
        let out = self.out.as_mut().expect("begin before write");
        debug_assert_eq!(image.len(), self.bytes_per_frame);
        out.write_all(image)?;
        out.write_all(&(audio.len() as u32).to_le_bytes())?;
        for sample in audio {
            out.write_all(&sample.to_le_bytes())?;
        }
        Ok(())
    }

    fn finish(&mut self) -> io::Result<()> {
        if let Some(mut out) = self.out.take() {
            out.flush()?;
        }
        Ok(())
    }
}

/// Reader for the raw container, used by tests and the offline tooling.
pub struct RawFileReader {
    input: BufReader<File>,
    pub width: usize,
    pub height: usize,
    pub channels: usize,
}

impl RawFileReader {
    pub fn open(path: impl AsRef<Path>) -> io::Result<RawFileReader> {
        let mut input = BufReader::new(File::open(path)?);
        let mut magic = [0u8; 4];
        input.read_exact(&mut magic)?;
        if &magic != RAW_MAGIC {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "not a PDR1 stream"));
        }
        let mut head = [0u32; 5];
        for value in &mut head {
            let mut buf = [0u8; 4];
            input.read_exact(&mut buf)?;
            *value = u32::from_le_bytes(buf);
        }
        Ok(RawFileReader {
            input,
            width: head[0] as usize,
            height: head[1] as usize,
            channels: head[4] as usize,
        })
    }

    /// Next frame as (image, audio), or `None` at end of stream.
    pub fn next_frame(&mut self) -> io::Result<Option<(Vec<u8>, Vec<i32>)>> {
        let mut image = vec![0u8; self.width * self.height * 4];
        match self.input.read_exact(&mut image) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e),
        }
        let mut count = [0u8; 4];
        self.input.read_exact(&mut count)?;
        let count = u32::from_le_bytes(count) as usize;
        let mut audio = Vec::with_capacity(count);
        for _ in 0..count {
            let mut buf = [0u8; 4];
            self.input.read_exact(&mut buf)?;
            audio.push(i32::from_le_bytes(buf));
        }
        Ok(Some((image, audio)))
    }
}
