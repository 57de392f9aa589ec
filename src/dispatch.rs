//! Deferred event processing.
//!
//! The transceiver notifier runs in a context that must not sleep, so it only
//! pushes a [`Task`] into the controller's bounded queue. The single
//! [`EventWorker`] drains the queue in arrival order from a context that may
//! sleep and take mutexes.

use alloc::sync::Arc;
use core::{
    future::Future,
    pin::Pin,
    sync::atomic::{AtomicBool, AtomicUsize, Ordering},
    task::{Context, Poll},
};

use crossbeam::queue::ArrayQueue;
use futures::task::AtomicWaker;
use otg_if::{Event, EventSink};
use spin::Mutex;

use crate::err::{OtgError, Result};

/// One event waiting for the worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Task {
    pub event: Event,
    /// Arrival order within the owning queue.
    pub seq: usize,
}

pub trait TaskHandler: Send + Sync + 'static {
    fn handle(&self, task: Task);
}

/// Interrupt-safe event queue owned by one controller.
pub struct EventQueue {
    tasks: ArrayQueue<Task>,
    waker: AtomicWaker,
    seq: AtomicUsize,
    closed: AtomicBool,
    /// An [`EventWorker`] is alive.
    claimed: AtomicBool,
    /// Held across pop and handle, so tasks finish in arrival order.
    consumer: Mutex<()>,
}

impl EventQueue {
    pub const DEFAULT_DEPTH: usize = 16;

    pub fn new(depth: usize) -> Self {
        Self {
            tasks: ArrayQueue::new(depth.max(1)),
            waker: AtomicWaker::new(),
            seq: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
            claimed: AtomicBool::new(false),
            consumer: Mutex::new(()),
        }
    }

    /// Queue `event` for the worker. Never blocks.
    pub fn push(&self, event: Event) -> Result {
        if self.is_closed() {
            warn!("otg event {event:?} after detach, dropped");
            return Err(OtgError::Detached);
        }

        let task = Task {
            event,
            seq: self.seq.fetch_add(1, Ordering::Relaxed),
        };
        if let Err(task) = self.tasks.push(task) {
            error!("otg event {:?} dropped, queue full", task.event);
            return Err(OtgError::AllocationFailure);
        }

        self.waker.wake();
        Ok(())
    }

    /// Decode a notifier code and queue it. Unknown codes mean the ID pin floats.
    pub fn push_raw(&self, code: u32) -> Result {
        match Event::try_from(code) {
            Ok(event) => self.push(event),
            Err(_) => {
                info!("ID float (event {code})");
                Ok(())
            }
        }
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Refuse further events; already queued ones still run.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.waker.wake();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Run every queued task through `handler`, returns how many ran.
    ///
    /// Waits for a task another caller is still handling.
    pub(crate) fn drain(&self, handler: &dyn TaskHandler) -> usize {
        let _consumer = self.consumer.lock();
        let mut n = 0;
        while let Some(task) = self.tasks.pop() {
            trace!("otg task #{} {:?}", task.seq, task.event);
            handler.handle(task);
            n += 1;
        }
        n
    }
}

impl EventSink for EventQueue {
    fn notify(&self, code: u32) {
        // faults are logged by push
        let _ = self.push_raw(code);
    }
}

/// The single consumer of an [`EventQueue`].
///
/// Only one exists per queue at a time; dropping it lets a new one be made.
pub struct EventWorker {
    queue: Arc<EventQueue>,
    handler: Arc<dyn TaskHandler>,
}

impl EventWorker {
    /// Fails with [`OtgError::Busy`] while another worker for `queue` is alive.
    pub fn new(queue: Arc<EventQueue>, handler: Arc<dyn TaskHandler>) -> Result<Self> {
        if queue
            .claimed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(OtgError::Busy);
        }
        Ok(Self { queue, handler })
    }

    /// Run every queued task, returns how many ran.
    pub fn process_pending(&self) -> usize {
        self.queue.drain(&*self.handler)
    }

    /// Process events as they arrive until the queue is closed and empty.
    pub fn run(&self) -> WorkerRun<'_> {
        WorkerRun { worker: self }
    }
}

/// Future returned by [`EventWorker::run`].
pub struct WorkerRun<'a> {
    worker: &'a EventWorker,
}

impl Future for WorkerRun<'_> {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let queue = &self.worker.queue;
        loop {
            self.worker.process_pending();
            if queue.is_closed() && queue.is_empty() {
                return Poll::Ready(());
            }

            queue.waker.register(cx.waker());
            if queue.is_empty() {
                return if queue.is_closed() {
                    Poll::Ready(())
                } else {
                    Poll::Pending
                };
            }
        }
    }
}

impl Drop for EventWorker {
    fn drop(&mut self) {
        self.queue.claimed.store(false, Ordering::Release);
    }
}
