// crates/playdeck-media/src/media.rs
//
// The decoder-driven clip producer.
//
// Three worker threads per clip, glued with bounded channels:
//
//   input  — reads packets from the demuxer and routes them by stream;
//            on end of stream, seeks back (loop) or winds down.
//   video  — decodes, scales to the format raster, feeds the frame queue
//            (capacity 8 — this is the producer's backpressure).
//   audio  — decodes, resamples to 48 kHz, feeds a sample FIFO.
//
// `receive` never blocks: it zips the next ready plane with the cadence
// slot's worth of samples from the FIFO, or reports an underrun and lets
// the layer show nothing for the tick. When the queues drain after the
// input winds down, the producer reports end-of-feed and hands over to the
// configured next clip, if any.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, Sender, TryRecvError};
use log::warn;
use playdeck_core::error::PlayoutError;
use playdeck_core::frame::{AudioChunk, FrameFactory};
use playdeck_core::producer::{BoxedProducer, Producer, Receive};

use crate::decode::{MediaInput, Packet, StreamKind};
use crate::transform::{scale_to_format, AudioResampler};

/// Decoded-frame queue depth.
const FRAME_QUEUE_CAPACITY: usize = 8;

/// Packet queues between the input thread and the decoders.
const PACKET_QUEUE_CAPACITY: usize = 16;

/// Audio FIFO high-water mark, in interleaved values (~1 s of 48 kHz
/// stereo). The audio thread waits when the FIFO is above it.
const AUDIO_FIFO_CAPACITY: usize = 96_000;

#[derive(Clone, Debug)]
pub struct MediaConfig {
    pub label: String,
    pub looping: bool,
}

struct AudioFifo {
    samples: Mutex<VecDeque<i32>>,
}

impl AudioFifo {
    fn push(&self, values: Vec<i32>) {
        self.samples.lock().unwrap().extend(values);
    }

    fn len(&self) -> usize {
        self.samples.lock().unwrap().len()
    }

    /// Exactly `n` values, zero-padded on underrun.
    fn pop_padded(&self, n: usize) -> Vec<i32> {
        let mut guard = self.samples.lock().unwrap();
        let take = n.min(guard.len());
        let mut out: Vec<i32> = guard.drain(..take).collect();
        out.resize(n, 0);
        out
    }
}

pub struct MediaProducer {
    config: MediaConfig,
    factory: FrameFactory,
    video_rx: Option<Receiver<Vec<u8>>>,
    audio_fifo: Arc<AudioFifo>,
    has_audio: bool,
    late: AtomicU64,
    next: Option<BoxedProducer>,
    stop: Arc<AtomicBool>,
    workers: Vec<JoinHandle<()>>,
}

impl MediaProducer {
    pub fn new(factory: FrameFactory, input: MediaInput, config: MediaConfig) -> MediaProducer {
        let MediaInput { demuxer, video, audio } = input;
        let has_audio = audio.is_some();

        let stop = Arc::new(AtomicBool::new(false));
        let fifo = Arc::new(AudioFifo { samples: Mutex::new(VecDeque::new()) });

        let (vpkt_tx, vpkt_rx) = bounded::<Packet>(PACKET_QUEUE_CAPACITY);
        let (apkt_tx, apkt_rx) = bounded::<Packet>(PACKET_QUEUE_CAPACITY);
        let (video_tx, video_rx) = bounded::<Vec<u8>>(FRAME_QUEUE_CAPACITY);

        let mut workers = Vec::new();

        workers.push(spawn_input(
            demuxer,
            config.clone(),
            vpkt_tx,
            has_audio.then_some(apkt_tx),
            Arc::clone(&stop),
        ));
        workers.push(spawn_video(
            video,
            factory.clone(),
            config.label.clone(),
            vpkt_rx,
            video_tx,
            Arc::clone(&stop),
        ));
        if let Some(decoder) = audio {
            workers.push(spawn_audio(
                decoder,
                factory.clone(),
                config.label.clone(),
                apkt_rx,
                Arc::clone(&fifo),
                Arc::clone(&stop),
            ));
        }

        MediaProducer {
            config,
            factory,
            video_rx: Some(video_rx),
            audio_fifo: fifo,
            has_audio,
            late: AtomicU64::new(0),
            next: None,
            stop,
            workers,
        }
    }

    /// Chain the clip that plays after this one ends.
    pub fn with_following(mut self, next: BoxedProducer) -> MediaProducer {
        self.next = Some(next);
        self
    }
}

impl Producer for MediaProducer {
    fn name(&self) -> String {
        format!("media[{}]", self.config.label)
    }

    fn receive(&mut self, nb_samples: usize) -> Result<Receive, PlayoutError> {
        let rx = self
            .video_rx
            .as_ref()
            .ok_or_else(|| PlayoutError::Producer("media producer stopped".into()))?;

        match rx.try_recv() {
            Ok(plane) => {
                let audio = if self.has_audio {
                    let wanted = nb_samples * self.factory.format().audio_channels();
                    vec![AudioChunk::new(self.audio_fifo.pop_padded(wanted))]
                } else {
                    Vec::new()
                };
                Ok(Receive::Frame(self.factory.create(plane, audio, nb_samples)?))
            }
            Err(TryRecvError::Empty) => {
                // Decoder underrun: stay on air with nothing this tick.
                self.late.fetch_add(1, Ordering::Relaxed);
                Ok(Receive::Empty)
            }
            Err(TryRecvError::Disconnected) => Ok(Receive::Eof),
        }
    }

    fn take_following(&mut self) -> Option<BoxedProducer> {
        self.next.take()
    }

    fn late_frames(&self) -> u64 {
        self.late.load(Ordering::Relaxed)
    }
}

impl Drop for MediaProducer {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        // Unblock the video thread's send before joining.
        self.video_rx = None;
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

// ── Worker threads ───────────────────────────────────────────────────────────

fn spawn_input(
    mut demuxer: Box<dyn crate::decode::Demuxer>,
    config: MediaConfig,
    vpkt_tx: Sender<Packet>,
    apkt_tx: Option<Sender<Packet>>,
    stop: Arc<AtomicBool>,
) -> JoinHandle<()> {
    std::thread::Builder::new()
        .name(format!("playdeck-input-{}", config.label))
        .spawn(move || {
            while !stop.load(Ordering::Relaxed) {
                match demuxer.next_packet() {
                    Ok(Some(packet)) => {
                        let delivered = match packet.stream {
                            StreamKind::Video => vpkt_tx.send(packet).is_ok(),
                            StreamKind::Audio => match &apkt_tx {
                                Some(tx) => tx.send(packet).is_ok(),
                                None => true, // no audio decoder: discard
                            },
                        };
                        if !delivered {
                            break;
                        }
                    }
                    Ok(None) => {
                        if !config.looping {
                            break;
                        }
                        if let Err(e) = demuxer.seek_to_start() {
                            warn!("media[{}] loop seek failed: {e:#}", config.label);
                            break;
                        }
                    }
                    Err(e) => {
                        warn!("media[{}] demux failed: {e:#}", config.label);
                        break;
                    }
                }
            }
        })
        .expect("spawn input thread")
}

fn spawn_video(
    mut decoder: Box<dyn crate::decode::VideoDecoder>,
    factory: FrameFactory,
    label: String,
    packets: Receiver<Packet>,
    frames: Sender<Vec<u8>>,
    stop: Arc<AtomicBool>,
) -> JoinHandle<()> {
    std::thread::Builder::new()
        .name(format!("playdeck-video-{label}"))
        .spawn(move || {
            while let Ok(packet) = packets.recv() {
                if stop.load(Ordering::Relaxed) {
                    break;
                }
                let decoded = match decoder.decode(&packet) {
                    Ok(decoded) => decoded,
                    Err(e) => {
                        warn!("media[{label}] video decode failed: {e:#}");
                        break;
                    }
                };
                for raw in decoded {
                    match scale_to_format(raw, factory.format()) {
                        Ok(plane) => {
                            if frames.send(plane).is_err() {
                                return;
                            }
                        }
                        Err(e) => {
                            warn!("media[{label}] scale failed: {e:#}");
                            return;
                        }
                    }
                }
            }
        })
        .expect("spawn video thread")
}

fn spawn_audio(
    mut decoder: Box<dyn crate::decode::AudioDecoder>,
    factory: FrameFactory,
    label: String,
    packets: Receiver<Packet>,
    fifo: Arc<AudioFifo>,
    stop: Arc<AtomicBool>,
) -> JoinHandle<()> {
    std::thread::Builder::new()
        .name(format!("playdeck-audio-{label}"))
        .spawn(move || {
            let mut resampler = AudioResampler::new(factory.format());
            while let Ok(packet) = packets.recv() {
                if stop.load(Ordering::Relaxed) {
                    break;
                }
                let decoded = match decoder.decode(&packet) {
                    Ok(decoded) => decoded,
                    Err(e) => {
                        warn!("media[{label}] audio decode failed: {e:#}");
                        break;
                    }
                };
                for raw in decoded {
                    if let Err(e) = resampler.push(&raw) {
                        warn!("media[{label}] resample failed: {e:#}");
                        return;
                    }
                }
                // FIFO high-water backpressure.
                while fifo.len() > AUDIO_FIFO_CAPACITY && !stop.load(Ordering::Relaxed) {
                    std::thread::sleep(Duration::from_millis(1));
                }
                let ready = resampler.available();
                if ready > 0 {
                    fifo.push(resampler.take(ready));
                }
            }
        })
        .expect("spawn audio thread")
}
