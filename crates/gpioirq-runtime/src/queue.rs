//! EdgeQueue - hand edge events from the dispatcher to another thread
//!
//! Callbacks run on the dispatcher thread. A caller that would rather
//! consume events on its own thread registers `queue.callback(line)` and
//! drains the queue at its own pace. The queue is bounded; when it is
//! full the oldest event is dropped and counted, the dispatcher never
//! blocks on a slow consumer.

use crate::registry::EdgeCallback;
use crossbeam_queue::ArrayQueue;
use gpioirq_core::LineId;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// One delivered edge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeEvent {
    pub line: LineId,
    /// Level read after the edge, 0 or 1
    pub value: u8,
    /// Queue-wide sequence number, starting at 0
    pub seq: u64,
}

pub struct EdgeQueue {
    events: ArrayQueue<EdgeEvent>,
    seq: AtomicU64,
    dropped: AtomicU64,
}

impl EdgeQueue {
    pub fn new(capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            events: ArrayQueue::new(capacity.max(1)),
            seq: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        })
    }

    /// Callback that pushes `line`'s events into this queue
    pub fn callback(self: &Arc<Self>, line: impl Into<LineId>) -> EdgeCallback {
        let line = line.into();
        let queue = Arc::clone(self);
        Arc::new(move |value| {
            queue.push(line, value);
            Ok(())
        })
    }

    /// Enqueue an event, displacing the oldest one if full
    pub fn push(&self, line: LineId, value: u8) {
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        if self.events.force_push(EdgeEvent { line, value, seq }).is_some() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn pop(&self) -> Option<EdgeEvent> {
        self.events.pop()
    }

    /// Take everything currently queued, oldest first
    pub fn drain(&self) -> Vec<EdgeEvent> {
        let mut out = Vec::with_capacity(self.events.len());
        while let Some(event) = self.events.pop() {
            out.push(event);
        }
        out
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.events.capacity()
    }

    /// Events lost to overflow
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for EdgeQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EdgeQueue")
            .field("len", &self.len())
            .field("capacity", &self.capacity())
            .field("dropped", &self.dropped())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::InterruptEngine;
    use crate::mock::{wait_until, FakeStream, ScriptedMux};
    use crate::EngineConfig;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_push_pop_order() {
        let q = EdgeQueue::new(4);
        q.push(LineId::new(1), 1);
        q.push(LineId::new(2), 0);
        assert_eq!(q.len(), 2);

        let a = q.pop().unwrap();
        assert_eq!((a.line, a.value, a.seq), (LineId::new(1), 1, 0));
        let b = q.pop().unwrap();
        assert_eq!((b.line, b.value, b.seq), (LineId::new(2), 0, 1));
        assert!(q.pop().is_none());
    }

    #[test]
    fn test_overflow_drops_oldest() {
        let q = EdgeQueue::new(2);
        for v in 0..5u8 {
            q.push(LineId::new(3), v & 1);
        }
        assert_eq!(q.dropped(), 3);
        let seqs: Vec<u64> = q.drain().iter().map(|e| e.seq).collect();
        assert_eq!(seqs, vec![3, 4]);
        assert!(q.is_empty());
    }

    #[test]
    fn test_callback_from_other_thread() {
        let q = EdgeQueue::new(64);
        let cb = q.callback(9u32);
        let producer = thread::spawn(move || {
            for i in 0..10u8 {
                cb(i % 2).unwrap();
            }
        });
        producer.join().unwrap();

        let events = q.drain();
        assert_eq!(events.len(), 10);
        assert!(events.iter().all(|e| e.line == LineId::new(9)));
        assert_eq!(events[1].value, 1);
    }

    #[test]
    fn test_engine_into_queue() {
        let mux = ScriptedMux::new();
        let engine = InterruptEngine::with_multiplexer(EngineConfig::new(), Box::new(mux.clone())).unwrap();
        let q = EdgeQueue::new(16);

        engine.register_stream(FakeStream::new(17, 100, b'1'), q.callback(17u32)).unwrap();
        engine.register_stream(FakeStream::new(22, 101, b'0'), q.callback(22u32)).unwrap();
        mux.fire(&[100, 101]);

        assert!(wait_until(Duration::from_secs(5), || q.len() == 2));
        let events = q.drain();
        assert_eq!(events[0].line, LineId::new(17));
        assert_eq!(events[0].value, 1);
        assert_eq!(events[1].line, LineId::new(22));
        assert_eq!(events[1].value, 0);
    }
}
