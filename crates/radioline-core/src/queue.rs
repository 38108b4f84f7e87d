//! Bounded FIFO task queue shared between one producer and many workers.
//!
//! Uses `Mutex + Condvar` from std — no external dependencies.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

/// Outcome of a timed dequeue.
#[derive(Debug, PartialEq, Eq)]
pub enum Recv<T> {
    /// A task was dequeued.
    Task(T),
    /// The producer closed the queue and the buffer is empty — end of stream.
    Closed,
    /// No task arrived within the timeout and the queue is still open.
    TimedOut,
}

struct QueueState<T> {
    buf: VecDeque<T>,
    closed: bool,
}

/// Fixed-capacity FIFO queue with blocking put, timed get, and a
/// condvar-based drain wait for producer backpressure.
///
/// Occupancy never exceeds the construction-time capacity. Closing the
/// queue is the explicit end-of-stream signal: once closed and drained,
/// every [`get`](TaskQueue::get) returns [`Recv::Closed`] immediately.
pub struct TaskQueue<T> {
    capacity: usize,
    state: Mutex<QueueState<T>>,
    not_empty: Condvar,
    not_full: Condvar,
}

impl<T> TaskQueue<T> {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "queue capacity must be nonzero");
        Self {
            capacity,
            state: Mutex::new(QueueState {
                buf: VecDeque::with_capacity(capacity.min(1024)),
                closed: false,
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
        }
    }

    /// Enqueue a task, blocking while the queue is at capacity. A closed
    /// queue rejects the task and hands it back, even mid-wait — a
    /// producer blocked on a full queue must not outlive its consumers.
    pub fn put(&self, task: T) -> Result<(), T> {
        let mut state = self.lock();
        while state.buf.len() >= self.capacity && !state.closed {
            state = self.not_full.wait(state).unwrap_or_else(|e| e.into_inner());
        }
        if state.closed {
            return Err(task);
        }
        state.buf.push_back(task);
        drop(state);
        self.not_empty.notify_one();
        Ok(())
    }

    /// Dequeue a task, blocking up to `timeout`.
    pub fn get(&self, timeout: Duration) -> Recv<T> {
        let deadline = Instant::now() + timeout;
        let mut state = self.lock();
        loop {
            if let Some(task) = state.buf.pop_front() {
                drop(state);
                self.not_full.notify_all();
                return Recv::Task(task);
            }
            if state.closed {
                return Recv::Closed;
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Recv::TimedOut;
            }
            let (guard, _) = self
                .not_empty
                .wait_timeout(state, remaining)
                .unwrap_or_else(|e| e.into_inner());
            state = guard;
        }
    }

    /// Approximate occupancy, for backpressure heuristics only.
    pub fn len(&self) -> usize {
        self.lock().buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Mark end of stream. Idempotent. Wakes every blocked consumer, and
    /// every blocked producer so its pending put comes back rejected.
    pub fn close(&self) {
        self.lock().closed = true;
        self.not_empty.notify_all();
        // Drain waiters and blocked producers must also observe close.
        self.not_full.notify_all();
    }

    /// Block until occupancy is at or below `threshold` (or the queue is
    /// closed). Woken on every dequeue — no polling.
    pub fn wait_drained_below(&self, threshold: usize) {
        let mut state = self.lock();
        while state.buf.len() > threshold && !state.closed {
            state = self.not_full.wait(state).unwrap_or_else(|e| e.into_inner());
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, QueueState<T>> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}
