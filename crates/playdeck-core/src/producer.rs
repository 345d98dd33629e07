// crates/playdeck-core/src/producer.rs
//
// The producer capability set.
//
// A producer is a pull-model frame source driven once per channel tick.
// There is no null producer anywhere in the engine: the empty producer is
// the sentinel that replaces anything removed or finished, and end-of-feed
// is an explicit return value rather than an exception or a null frame.
//
// Producers must be re-entrant on their owning channel's clock only; the
// channel guarantees at most one `receive` is in flight per producer.

use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, Sender};

use crate::error::PlayoutError;
use crate::frame::Frame;

/// Result of one `receive` tick.
#[derive(Debug)]
pub enum Receive {
    /// A renderable frame for this tick.
    Frame(Arc<Frame>),
    /// Nothing to contribute this tick (not finished — e.g. decode underrun
    /// or the empty sentinel producer).
    Empty,
    /// This producer is finished; the layer follows through to
    /// `take_following`.
    Eof,
}

pub type BoxedProducer = Box<dyn Producer>;

pub trait Producer: Send {
    /// Short diagnostic name, e.g. `color[#FFFF0000]`.
    fn name(&self) -> String;

    /// Pull one frame. `nb_samples` is the cadence slot's per-channel
    /// sample count for this tick. Must not block on I/O; a producer that
    /// cannot deliver in time returns `Receive::Empty` and records the
    /// underrun.
    fn receive(&mut self, nb_samples: usize) -> Result<Receive, PlayoutError>;

    /// The producer that plays after this one reports `Eof`. Called at most
    /// once, after `Eof`. Default: none (the layer falls back to empty).
    fn take_following(&mut self) -> Option<BoxedProducer> {
        None
    }

    /// The producer that was on air just before this one. Transitions use
    /// it to pull "from" frames. Default: dropped.
    fn set_leading_producer(&mut self, _prev: BoxedProducer) {}

    /// Template-host control channel. Default: unsupported.
    fn call(&mut self, _params: &[String]) -> Result<CallFuture, PlayoutError> {
        Err(PlayoutError::Unsupported)
    }

    /// Ticks on which this producer failed to deliver in time.
    fn late_frames(&self) -> u64 {
        0
    }
}

// ── Empty producer ───────────────────────────────────────────────────────────

/// The sentinel producer: contributes nothing, forever.
pub struct EmptyProducer;

impl Producer for EmptyProducer {
    fn name(&self) -> String {
        "empty".to_string()
    }

    fn receive(&mut self, _nb_samples: usize) -> Result<Receive, PlayoutError> {
        Ok(Receive::Empty)
    }
}

/// Boxed empty producer, the default replacement value.
pub fn empty_producer() -> BoxedProducer {
    Box::new(EmptyProducer)
}

// ── Call futures ─────────────────────────────────────────────────────────────

/// Deferred reply from a template-host `call`. The host answers from its own
/// worker thread; the protocol layer waits with a timeout.
pub struct CallFuture {
    rx: Receiver<String>,
}

impl CallFuture {
    /// A future that is already resolved.
    pub fn ready(value: impl Into<String>) -> CallFuture {
        let (tx, rx) = bounded(1);
        let _ = tx.send(value.into());
        CallFuture { rx }
    }

    /// A pending future plus the sender the host resolves it with.
    pub fn pending() -> (CallSink, CallFuture) {
        let (tx, rx) = bounded(1);
        (CallSink { tx }, CallFuture { rx })
    }

    /// Wait for the reply. A dropped sink or an elapsed timeout both report
    /// as producer failures.
    pub fn wait(&self, timeout: Duration) -> Result<String, PlayoutError> {
        self.rx
            .recv_timeout(timeout)
            .map_err(|_| PlayoutError::Producer("call did not complete".into()))
    }
}

/// Resolver half of a [`CallFuture`].
pub struct CallSink {
    tx: Sender<String>,
}

impl CallSink {
    pub fn resolve(self, value: impl Into<String>) {
        let _ = self.tx.send(value.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_producer_never_ends() {
        let mut p = EmptyProducer;
        for _ in 0..3 {
            assert!(matches!(p.receive(1920).unwrap(), Receive::Empty));
        }
        assert!(p.take_following().is_none());
    }

    #[test]
    fn default_call_is_unsupported() {
        let mut p = EmptyProducer;
        assert!(matches!(p.call(&[]), Err(PlayoutError::Unsupported)));
    }

    #[test]
    fn ready_future_resolves_immediately() {
        let fut = CallFuture::ready("OK");
        assert_eq!(fut.wait(Duration::from_millis(1)).unwrap(), "OK");
    }

    #[test]
    fn pending_future_resolves_from_sink() {
        let (sink, fut) = CallFuture::pending();
        std::thread::spawn(move || sink.resolve("DONE"));
        assert_eq!(fut.wait(Duration::from_secs(1)).unwrap(), "DONE");
    }

    #[test]
    fn dropped_sink_reports_failure() {
        let (sink, fut) = CallFuture::pending();
        drop(sink);
        assert!(fut.wait(Duration::from_millis(10)).is_err());
    }
}
