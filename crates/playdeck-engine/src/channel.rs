// crates/playdeck-engine/src/channel.rs
//
// The render device: one output channel bound to one display format.
//
// Two cooperating threads per channel:
//
//   render   — every tick, pulls one frame from every layer in parallel,
//              submits the stack to the frame processor, pops the previous
//              composite and pushes it onto the bounded outbound queue.
//   display  — drains the outbound queue and hands each composite to every
//              consumer as a prepare(next)/display(prev) pair, one frame
//              apart, through per-consumer dispatch threads.
//
// Pacing: the highest-priority consumer reporting a synchronization clock
// blocks in `display` until the physical output tick; with no such
// consumer, the display thread sleeps on a deadline timer at the format's
// frame period. Backpressure from consumers reaches the render thread
// through the outbound queue (capacity 3) — producers upstream may drop,
// consumers downstream never see a malformed frame.
//
// Shutdown is cooperative and ordered display → compositor → render.

use std::collections::{BTreeMap, VecDeque};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use log::{error, info, warn};
use parking_lot::Mutex;
use rayon::prelude::*;

use playdeck_core::consumer::BoxedConsumer;
use playdeck_core::error::PlayoutError;
use playdeck_core::format::VideoFormat;
use playdeck_core::frame::{Frame, FrameFactory};
use playdeck_core::producer::BoxedProducer;

use crate::layer::{Layer, LayerStatus, LoadOption};
use crate::mixer::FrameProcessor;

/// Outbound composite queue depth — the backpressure point between the
/// render thread and the consumers.
const OUT_QUEUE_CAPACITY: usize = 3;

/// Consumer dispatch ack timeout, in frame periods. A vsync wait is one
/// period; a consumer silent for this long is treated as stuck and removed.
const STALL_TIMEOUT_PERIODS: u32 = 16;

struct Shared {
    factory: FrameFactory,
    layers: Mutex<BTreeMap<i32, Layer>>,
    tick: AtomicU64,
}

pub struct Channel {
    shared: Arc<Shared>,
    running: Arc<AtomicBool>,
    render: Option<JoinHandle<()>>,
    display: Option<JoinHandle<()>>,
}

/// Read-only channel snapshot for the INFO surface.
#[derive(Clone, Debug)]
pub struct ChannelStatus {
    pub format: String,
    pub tick: u64,
    pub layers: Vec<(i32, LayerStatus)>,
}

impl Channel {
    /// Create a channel and start its threads. All consumers are
    /// initialized against the format before the first frame.
    pub fn new(
        format: VideoFormat,
        mut consumers: Vec<BoxedConsumer>,
    ) -> Result<Channel, PlayoutError> {
        if consumers.is_empty() {
            return Err(PlayoutError::InvalidArgument(
                "a channel requires at least one consumer".into(),
            ));
        }

        let desc = format.descriptor();
        for consumer in &mut consumers {
            consumer.initialize(&desc)?;
        }

        let factory = FrameFactory::new(desc);
        let shared = Arc::new(Shared {
            factory: factory.clone(),
            layers: Mutex::new(BTreeMap::new()),
            tick: AtomicU64::new(0),
        });
        let running = Arc::new(AtomicBool::new(true));

        let (out_tx, out_rx) = bounded::<Arc<Frame>>(OUT_QUEUE_CAPACITY);

        let render = {
            let shared = Arc::clone(&shared);
            let running = Arc::clone(&running);
            std::thread::Builder::new()
                .name("playdeck-render".into())
                .spawn(move || render_loop(shared, running, out_tx))
                .expect("spawn render thread")
        };

        let display = {
            let factory = factory.clone();
            let running = Arc::clone(&running);
            std::thread::Builder::new()
                .name("playdeck-display".into())
                .spawn(move || display_loop(factory, running, out_rx, consumers))
                .expect("spawn display thread")
        };

        info!("initialized channel [{}]", factory.format());
        Ok(Channel { shared, running, render: Some(render), display: Some(display) })
    }

    pub fn factory(&self) -> FrameFactory {
        self.shared.factory.clone()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    // ── Layer operations ─────────────────────────────────────────────────

    /// Stage a producer on `layer_index`, creating the layer on first use.
    /// The producer was instantiated by the caller; the layer lock is held
    /// only for the swap (and the one preview pull).
    pub fn load(
        &self,
        layer_index: i32,
        producer: BoxedProducer,
        option: LoadOption,
    ) -> Result<(), PlayoutError> {
        let mut layers = self.shared.layers.lock();
        layers
            .entry(layer_index)
            .or_insert_with(|| Layer::new(self.shared.factory.clone()))
            .load(producer, option)
    }

    pub fn play(&self, layer_index: i32) -> Result<(), PlayoutError> {
        self.with_layer(layer_index, |layer| layer.play())
    }

    pub fn stop_layer(&self, layer_index: i32) -> Result<(), PlayoutError> {
        self.with_layer(layer_index, |layer| {
            layer.stop();
            Ok(())
        })
    }

    pub fn clear_layer(&self, layer_index: i32) -> Result<(), PlayoutError> {
        self.with_layer(layer_index, |layer| {
            layer.clear();
            Ok(())
        })
    }

    /// Channel-wide clear: drop every layer.
    pub fn clear_all(&self) {
        self.shared.layers.lock().clear();
    }

    /// Run `op` against a template-host producer on `layer_index`.
    pub fn call(
        &self,
        layer_index: i32,
        params: &[String],
    ) -> Result<playdeck_core::producer::CallFuture, PlayoutError> {
        let mut layers = self.shared.layers.lock();
        let layer = layers.get_mut(&layer_index).ok_or_else(|| {
            PlayoutError::InvalidArgument(format!("no layer {layer_index}"))
        })?;
        layer.call(params)
    }

    pub fn status(&self) -> ChannelStatus {
        let layers = self.shared.layers.lock();
        ChannelStatus {
            format: self.shared.factory.format().name.to_string(),
            tick: self.shared.tick.load(Ordering::Relaxed),
            layers: layers.iter().map(|(z, l)| (*z, l.status())).collect(),
        }
    }

    fn with_layer<T>(
        &self,
        layer_index: i32,
        op: impl FnOnce(&mut Layer) -> Result<T, PlayoutError>,
    ) -> Result<T, PlayoutError> {
        let mut layers = self.shared.layers.lock();
        match layers.get_mut(&layer_index) {
            Some(layer) => op(layer),
            None => Err(PlayoutError::InvalidArgument(format!(
                "no layer {layer_index}"
            ))),
        }
    }

    /// Stop the channel and join its threads: display first, then the
    /// compositor and render thread.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(display) = self.display.take() {
            let _ = display.join();
        }
        // The render thread owns the frame processor; its exit tears the
        // compositor worker down before the join returns.
        if let Some(render) = self.render.take() {
            let _ = render.join();
        }
    }
}

impl Drop for Channel {
    fn drop(&mut self) {
        self.stop();
    }
}

// ── Render thread ────────────────────────────────────────────────────────────

fn render_loop(shared: Arc<Shared>, running: Arc<AtomicBool>, out_tx: Sender<Arc<Frame>>) {
    info!("started render thread [{}]", shared.factory.format());
    let processor = FrameProcessor::new(shared.factory.clone());

    while running.load(Ordering::Relaxed) {
        let ok = catch_unwind(AssertUnwindSafe(|| {
            render_tick(&shared, &processor, &out_tx)
        }));
        match ok {
            Ok(true) => {}
            Ok(false) => break,
            Err(_) => {
                // Never kill the channel from a tick: drop all layers and
                // carry on with empty output.
                shared.layers.lock().clear();
                error!("unexpected panic in render tick, cleared layers");
            }
        }
    }
    info!("ended render thread [{}]", shared.factory.format());
}

/// One tick. Returns false when the channel should stop (outbound queue or
/// compositor gone).
fn render_tick(
    shared: &Shared,
    processor: &FrameProcessor,
    out_tx: &Sender<Arc<Frame>>,
) -> bool {
    let tick = shared.tick.load(Ordering::Relaxed);
    let nb_samples = shared.factory.format().cadence_samples(tick);

    // Parallel pull under the layer lock; result order is z-ascending
    // regardless of completion order. Layers isolate their own failures.
    let frames: Vec<Arc<Frame>> = {
        let mut layers = shared.layers.lock();
        let mut slots: Vec<&mut Layer> = layers.values_mut().collect();
        slots
            .par_iter_mut()
            .map(|layer| layer.receive(nb_samples))
            .collect::<Vec<Option<Arc<Frame>>>>()
            .into_iter()
            .flatten()
            .collect()
    };

    processor.push(frames);

    let Some(composite) = processor.pop() else {
        error!("compositor stopped unexpectedly, stopping channel");
        return false;
    };

    if out_tx.send(composite).is_err() {
        return false;
    }

    // The cadence slot advances exactly once per emitted composite.
    shared.tick.store(tick + 1, Ordering::Relaxed);
    true
}

// ── Display thread ───────────────────────────────────────────────────────────

enum ConsumerJob {
    Frame { next: Arc<Frame>, prev: Arc<Frame> },
    Stop,
}

/// A consumer plus its dispatch thread. The display loop posts one job per
/// tick and waits for the ack; the consumer's own blocking (vsync, DMA)
/// happens on the dispatch thread.
struct ConsumerSlot {
    name: String,
    index: usize,
    is_clock: bool,
    job_tx: Sender<ConsumerJob>,
    ack_rx: Receiver<Result<(), PlayoutError>>,
    worker: Option<JoinHandle<()>>,
}

impl ConsumerSlot {
    fn spawn(mut consumer: BoxedConsumer) -> ConsumerSlot {
        let name = consumer.name();
        let index = consumer.index();
        let is_clock = consumer.has_synchronization_clock();
        let (job_tx, job_rx) = bounded::<ConsumerJob>(1);
        let (ack_tx, ack_rx) = bounded::<Result<(), PlayoutError>>(1);

        let thread_name = format!("playdeck-consumer-{name}");
        let worker = std::thread::Builder::new()
            .name(thread_name)
            .spawn(move || {
                while let Ok(job) = job_rx.recv() {
                    match job {
                        ConsumerJob::Frame { next, prev } => {
                            let result = catch_unwind(AssertUnwindSafe(|| {
                                consumer.prepare(&next)?;
                                consumer.display(&prev)
                            }))
                            .unwrap_or_else(|_| {
                                Err(PlayoutError::Consumer("consumer panicked".into()))
                            });
                            if ack_tx.send(result).is_err() {
                                break;
                            }
                        }
                        ConsumerJob::Stop => break,
                    }
                }
            })
            .expect("spawn consumer thread");

        ConsumerSlot { name, index, is_clock, job_tx, ack_rx, worker: Some(worker) }
    }

    fn dispatch(&self, next: Arc<Frame>, prev: Arc<Frame>) -> bool {
        // The job slot is always empty here — the previous tick's ack was
        // collected before this dispatch — so a full queue means the worker
        // is wedged and counts as a failure.
        self.job_tx.try_send(ConsumerJob::Frame { next, prev }).is_ok()
    }

    fn wait_ack(&self, timeout: Duration) -> Result<(), PlayoutError> {
        match self.ack_rx.recv_timeout(timeout) {
            Ok(result) => result,
            Err(_) => Err(PlayoutError::Consumer(format!(
                "{} stalled for {timeout:?}",
                self.name
            ))),
        }
    }

    /// Best-effort shutdown: deliver the sentinel, give the worker one
    /// frame period, then abandon it.
    fn stop(mut self, grace: Duration) {
        let _ = self.job_tx.try_send(ConsumerJob::Stop);
        if let Some(worker) = self.worker.take() {
            let deadline = Instant::now() + grace;
            while !worker.is_finished() && Instant::now() < deadline {
                let _ = self.ack_rx.try_recv();
                std::thread::sleep(Duration::from_millis(1));
            }
            if worker.is_finished() {
                let _ = worker.join();
            } else {
                warn!("abandoning stuck consumer {}", self.name);
            }
        }
    }
}

fn display_loop(
    factory: FrameFactory,
    running: Arc<AtomicBool>,
    out_rx: Receiver<Arc<Frame>>,
    consumers: Vec<BoxedConsumer>,
) {
    let desc = factory.format().clone();
    let period = desc.frame_period();
    info!("started display thread [{desc}]");

    let mut slots: Vec<ConsumerSlot> = consumers.into_iter().map(ConsumerSlot::spawn).collect();
    slots.sort_by_key(|s| s.index);

    // Three-deep prepared window, pre-filled with empty frames so the first
    // `display` calls have something well-formed to emit.
    let mut prepared: VecDeque<Arc<Frame>> = (0..3).map(|_| factory.empty()).collect();

    let stall_timeout = period * STALL_TIMEOUT_PERIODS;
    let mut deadline = Instant::now() + period;

    while running.load(Ordering::Relaxed) {
        let frame = match out_rx.recv_timeout(period) {
            Ok(frame) => frame,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        };

        let prev = prepared.front().cloned().unwrap_or_else(|| factory.empty());

        // Post to every consumer, then collect acks — consumers run their
        // prepare/display concurrently; the clock consumer's ack paces us.
        let mut failed: Vec<usize> = Vec::new();
        for (i, slot) in slots.iter().enumerate() {
            if !slot.dispatch(Arc::clone(&frame), Arc::clone(&prev)) {
                failed.push(i);
            }
        }
        for (i, slot) in slots.iter().enumerate() {
            if failed.contains(&i) {
                continue;
            }
            if let Err(err) = slot.wait_ack(stall_timeout) {
                warn!("removed consumer {} from channel: {err}", slot.name);
                failed.push(i);
            }
        }
        failed.sort_unstable();
        failed.dedup();
        for i in failed.into_iter().rev() {
            let had_clock = slots[i].is_clock;
            slots.remove(i).stop(period);
            if had_clock {
                // Clock promotion is implicit: slots are priority-ordered
                // and the next clock-capable consumer takes over; with
                // none left the timer below paces the loop.
                if let Some(next) = slots.iter().find(|s| s.is_clock) {
                    info!("clock promoted to consumer {}", next.name);
                }
            }
        }

        if slots.is_empty() {
            error!("no consumers remain, stopping channel [{desc}]");
            running.store(false, Ordering::Relaxed);
            break;
        }

        prepared.push_back(frame);
        prepared.pop_front();

        // Internal timer: only pace when no consumer supplies the clock.
        if !slots.iter().any(|s| s.is_clock) {
            let now = Instant::now();
            if deadline > now {
                std::thread::sleep(deadline - now);
            }
            deadline += period;
        } else {
            deadline = Instant::now() + period;
        }
    }

    for slot in slots {
        slot.stop(period);
    }
    info!("ended display thread [{desc}]");
}
