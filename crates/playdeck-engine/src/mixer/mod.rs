// crates/playdeck-engine/src/mixer/mod.rs
//
// The frame processor: a producer/consumer pair around a dedicated
// compositor thread.
//
// `push` enqueues one tick's layer frames (lowest z first) onto a bounded
// job queue; `pop` blocks for the next composite in submission order. The
// worker keeps two jobs in flight — while job K's planes are being uploaded
// and drawn, job K−1's target is being read back — so a completed composite
// surfaces two jobs after its submission. The output queue is pre-seeded
// with two empty frames to cover exactly that warm-up.
//
// Buffer pools (transfer buffers and render targets) are owned by the
// worker thread alone; no other thread touches device state.

pub mod device;

use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use log::{debug, warn};
use playdeck_core::frame::{AudioChunk, Frame, FrameFactory};

use device::{RenderTarget, TransferBuffer};

/// Job queue capacity. A full queue means the render thread is outrunning
/// the compositor; the oldest job is dropped upstream of the GPU.
const JOB_QUEUE_CAPACITY: usize = 5;

/// Output queue capacity; two slots are taken by warm-up frames at start.
const OUT_QUEUE_CAPACITY: usize = 3;

enum Job {
    Compose(Vec<Arc<Frame>>),
    Stop,
}

pub struct FrameProcessor {
    job_tx: Sender<Job>,
    job_rx: Receiver<Job>,
    out_rx: Receiver<Arc<Frame>>,
    worker: Option<JoinHandle<()>>,
}

impl FrameProcessor {
    pub fn new(factory: FrameFactory) -> Self {
        let (job_tx, job_rx) = bounded::<Job>(JOB_QUEUE_CAPACITY);
        let (out_tx, out_rx) = bounded::<Arc<Frame>>(OUT_QUEUE_CAPACITY);

        // Pipeline warm-up: the first two pops return before any job has
        // traversed both stages.
        let _ = out_tx.send(factory.empty());
        let _ = out_tx.send(factory.empty());

        let rx = job_rx.clone();
        let worker = std::thread::Builder::new()
            .name("playdeck-mixer".into())
            .spawn(move || Pipeline::new(factory, out_tx).run(rx))
            .expect("spawn compositor thread");

        Self { job_tx, job_rx, out_rx, worker: Some(worker) }
    }

    /// Enqueue one tick's frames in z-ascending order. Never blocks: when
    /// the compositor is behind, the oldest queued job is dropped and the
    /// overrun logged.
    pub fn push(&self, frames: Vec<Arc<Frame>>) {
        let mut job = Job::Compose(frames);
        loop {
            match self.job_tx.try_send(job) {
                Ok(()) => return,
                Err(TrySendError::Full(returned)) => {
                    job = returned;
                    match self.job_rx.try_recv() {
                        Ok(Job::Stop) => {
                            // Never drop the shutdown sentinel.
                            let _ = self.job_tx.try_send(Job::Stop);
                            return;
                        }
                        Ok(Job::Compose(_)) => {
                            debug!("frame processor overrun, dropped oldest job");
                        }
                        Err(_) => {}
                    }
                }
                Err(TrySendError::Disconnected(_)) => {
                    warn!("frame processor worker is gone, dropping job");
                    return;
                }
            }
        }
    }

    /// Dequeue the next composite in submission order. `None` only after
    /// shutdown.
    pub fn pop(&self) -> Option<Arc<Frame>> {
        self.out_rx.recv().ok()
    }
}

impl Drop for FrameProcessor {
    fn drop(&mut self) {
        // The worker may be blocked on a full output queue and the job
        // queue may be full; drain both while delivering the sentinel.
        let mut sent = false;
        if let Some(worker) = self.worker.take() {
            while !worker.is_finished() {
                if !sent {
                    sent = !matches!(
                        self.job_tx.try_send(Job::Stop),
                        Err(TrySendError::Full(_))
                    );
                }
                let _ = self.out_rx.try_recv();
                std::thread::yield_now();
            }
            let _ = worker.join();
        }
    }
}

// ── Worker state ─────────────────────────────────────────────────────────────

struct Pipeline {
    factory: FrameFactory,
    out_tx: Sender<Arc<Frame>>,

    /// Upload buffers filled for job K, in submission order.
    writing: Vec<TransferBuffer>,
    /// Audio assembled for job K (CPU-only; never traverses the device).
    writing_audio: Vec<AudioChunk>,

    /// Target holding job K−1, read back at the start of the next job.
    reading: Option<RenderTarget>,
    reading_audio: Vec<AudioChunk>,

    transfer_pool: Vec<TransferBuffer>,
    target_pool: Vec<RenderTarget>,
}

impl Pipeline {
    fn new(factory: FrameFactory, out_tx: Sender<Arc<Frame>>) -> Self {
        Self {
            factory,
            out_tx,
            writing: Vec::new(),
            writing_audio: Vec::new(),
            reading: None,
            reading_audio: Vec::new(),
            transfer_pool: Vec::new(),
            target_pool: Vec::new(),
        }
    }

    fn run(mut self, jobs: Receiver<Job>) {
        while let Ok(job) = jobs.recv() {
            match job {
                Job::Compose(frames) => {
                    if frames.is_empty() {
                        // Empty tick: emit the cached empty frame without
                        // touching device state or the in-flight pipeline.
                        if self.out_tx.send(self.factory.empty()).is_err() {
                            return;
                        }
                        continue;
                    }
                    if !self.step(frames) {
                        return;
                    }
                }
                Job::Stop => break,
            }
        }
        self.drain();
    }

    /// One pipeline job. Order matters: the readback completed in step 1 is
    /// what releases job K−1's composite.
    fn step(&mut self, frames: Vec<Arc<Frame>>) -> bool {
        // 1. Finish the previous read and emit job K−1.
        if !self.finish_read() {
            return false;
        }

        // 2. Finish the previous write: draw job K's planes in submission
        //    order onto a cleared target.
        let drawn = self.compose_writing();

        // 3. Begin the new read.
        if let Some(target) = drawn {
            self.reading = Some(target);
            self.reading_audio = std::mem::take(&mut self.writing_audio);
        }

        // 4. Begin the new write: stage the incoming planes and assemble
        //    the next composite's audio in z order.
        for frame in &frames {
            let mut buffer = self.take_transfer();
            buffer.write(frame.image());
            self.writing.push(buffer);
        }
        self.writing_audio = frames
            .iter()
            .flat_map(|f| f.audio().iter().cloned())
            .collect();

        true
    }

    fn finish_read(&mut self) -> bool {
        if let Some(target) = self.reading.take() {
            let mut image = vec![0u8; self.factory.format().bytes_per_frame()];
            target.read_into(&mut image);
            self.target_pool.push(target);

            let audio = std::mem::take(&mut self.reading_audio);
            let frame = self
                .factory
                .compose_with_audio(image, audio)
                .unwrap_or_else(|_| self.factory.empty());
            if self.out_tx.send(frame).is_err() {
                return false;
            }
        }
        true
    }

    fn compose_writing(&mut self) -> Option<RenderTarget> {
        if self.writing.is_empty() {
            return None;
        }
        let mut target = self.take_target();
        target.clear();
        for buffer in self.writing.drain(..) {
            target.draw_blended(&buffer);
            self.transfer_pool.push(buffer);
        }
        Some(target)
    }

    /// Flush both in-flight jobs on shutdown so nothing is lost.
    fn drain(&mut self) {
        if !self.finish_read() {
            return;
        }
        if let Some(target) = self.compose_writing() {
            self.reading = Some(target);
            self.reading_audio = std::mem::take(&mut self.writing_audio);
            let _ = self.finish_read();
        }
    }

    fn take_transfer(&mut self) -> TransferBuffer {
        self.transfer_pool
            .pop()
            .unwrap_or_else(|| TransferBuffer::new(self.factory.format().bytes_per_frame()))
    }

    fn take_target(&mut self) -> RenderTarget {
        let desc = self.factory.format();
        self.target_pool
            .pop()
            .unwrap_or_else(|| RenderTarget::new(desc.width, desc.height))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use playdeck_core::format::VideoFormat;

    fn factory() -> FrameFactory {
        FrameFactory::new(VideoFormat::X720p5000.descriptor())
    }

    /// Opaque solid frame: every pixel [v, v, v, 255].
    fn tagged_frame(factory: &FrameFactory, v: u8) -> Arc<Frame> {
        let px = [v, v, v, 255u8];
        let image: Vec<u8> = px
            .iter()
            .copied()
            .cycle()
            .take(factory.format().bytes_per_frame())
            .collect();
        factory.create_silent(image).unwrap()
    }

    #[test]
    fn warm_up_yields_two_empty_frames() {
        let f = factory();
        let fp = FrameProcessor::new(f.clone());
        for _ in 0..2 {
            let frame = fp.pop().unwrap();
            assert!(f.is_empty_frame(&frame));
        }
    }

    #[test]
    fn composites_surface_in_submission_order() {
        let f = factory();
        let fp = FrameProcessor::new(f.clone());

        // One pop per push, the way the render loop drives it. The first
        // two pops are warm-up; pop k then carries job k−2.
        let mut popped = Vec::new();
        for v in 1u8..=10 {
            fp.push(vec![tagged_frame(&f, v)]);
            popped.push(fp.pop().unwrap());
        }

        assert!(f.is_empty_frame(&popped[0]));
        assert!(f.is_empty_frame(&popped[1]));
        for (i, frame) in popped[2..].iter().enumerate() {
            assert_eq!(frame.image()[0], (i + 1) as u8, "job {} out of order", i + 1);
        }
    }

    #[test]
    fn empty_push_short_circuits() {
        let f = factory();
        let fp = FrameProcessor::new(f.clone());
        fp.pop().unwrap();
        fp.pop().unwrap();
        fp.push(Vec::new());
        let frame = fp.pop().unwrap();
        assert!(f.is_empty_frame(&frame));
    }

    #[test]
    fn upper_layer_draws_over_lower() {
        let f = factory();
        let fp = FrameProcessor::new(f.clone());

        fp.push(vec![tagged_frame(&f, 0xFF), tagged_frame(&f, 0x40)]);
        // Two flush jobs move the composite through both stages.
        fp.push(vec![tagged_frame(&f, 1)]);
        fp.pop().unwrap(); // warm-up
        fp.push(vec![tagged_frame(&f, 1)]);
        fp.pop().unwrap(); // warm-up

        let composite = fp.pop().unwrap();
        // The higher z layer is opaque, so it fully covers the lower one.
        assert_eq!(composite.image()[0], 0x40);
        assert_eq!(composite.image()[3], 255);
    }

    #[test]
    fn audio_concatenates_in_z_order() {
        let f = factory();
        let fp = FrameProcessor::new(f.clone());

        let nb = f.format().cadence_samples(0);
        let image = vec![0u8; f.format().bytes_per_frame()];
        let a = f
            .create(image.clone(), vec![AudioChunk::new(vec![1; nb * 2])], nb)
            .unwrap();
        let b = f
            .create(image, vec![AudioChunk::new(vec![2; nb * 2])], nb)
            .unwrap();

        fp.push(vec![a, b]);
        fp.push(vec![tagged_frame(&f, 1)]);
        fp.pop().unwrap(); // warm-up
        fp.push(vec![tagged_frame(&f, 1)]);
        fp.pop().unwrap(); // warm-up

        let composite = fp.pop().unwrap();
        assert_eq!(composite.audio().len(), 2);
        assert_eq!(composite.audio()[0].samples[0], 1);
        assert_eq!(composite.audio()[1].samples[0], 2);
    }
}
