//! Load state streams and cancellation handles

use gcodepreview_core::LoadState;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Notify};

#[derive(Debug, Default)]
struct HandleInner {
    cancelled: AtomicBool,
    notify: Notify,
}

/// Caller-owned cancellation handle of a load
///
/// Cancellation is cooperative: the load task stops at its next
/// suspension point and any in-flight download future is dropped.
#[derive(Debug, Clone, Default)]
pub struct LoadHandle {
    inner: Arc<HandleInner>,
}

impl LoadHandle {
    /// Create a new, not cancelled handle
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    /// Whether cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Resolve once cancellation is requested
    pub async fn cancelled(&self) {
        loop {
            let notified = self.inner.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

/// Stream of [`LoadState`]s for one load
///
/// Yields zero or more `Loading` states with non-decreasing progress and
/// then exactly one terminal state, after which it ends. Dropping the
/// stream cancels the load.
#[derive(Debug)]
pub struct LoadStream {
    receiver: mpsc::UnboundedReceiver<LoadState>,
    handle: LoadHandle,
}

impl LoadStream {
    pub(crate) fn new(receiver: mpsc::UnboundedReceiver<LoadState>, handle: LoadHandle) -> Self {
        Self { receiver, handle }
    }

    /// Next state, `None` once the load has finished
    pub async fn next(&mut self) -> Option<LoadState> {
        self.receiver.recv().await
    }

    /// Cancellation handle of this load
    pub fn handle(&self) -> &LoadHandle {
        &self.handle
    }

    /// Cancel this load
    pub fn cancel(&self) {
        self.handle.cancel();
    }

    /// Drain the stream, returning every remaining state
    pub async fn collect(mut self) -> Vec<LoadState> {
        let mut states = Vec::new();
        while let Some(state) = self.next().await {
            states.push(state);
        }
        states
    }

    /// Drain the stream, returning only the terminal state
    pub async fn finish(mut self) -> Option<LoadState> {
        let mut last = None;
        while let Some(state) = self.next().await {
            last = Some(state);
        }
        last.filter(LoadState::is_terminal)
    }

    /// Observe every state before it reaches the consumer
    ///
    /// Spawns a forwarding task on the current tokio runtime. The returned
    /// stream shares this stream's handle, and dropping it still stops the
    /// load.
    pub fn inspect<F>(mut self, mut observer: F) -> LoadStream
    where
        F: FnMut(&LoadState) + Send + 'static,
    {
        let (sender, receiver) = mpsc::unbounded_channel();
        let handle = self.handle.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    state = self.receiver.recv() => {
                        let Some(state) = state else { break };
                        observer(&state);
                        if sender.send(state).is_err() {
                            break;
                        }
                    }
                    _ = sender.closed() => break,
                }
            }
        });
        LoadStream::new(receiver, handle)
    }
}

#[derive(Debug, Default)]
struct SinkState {
    last_progress: Option<f32>,
    terminated: bool,
}

/// Sending side of a load stream
///
/// Enforces the stream contract: progress never decreases and exactly one
/// terminal state is delivered. Clones share that state so progress can be
/// reported from blocking tasks and transport callbacks.
#[derive(Debug, Clone)]
pub(crate) struct StateSink {
    sender: mpsc::UnboundedSender<LoadState>,
    state: Arc<Mutex<SinkState>>,
}

impl StateSink {
    pub(crate) fn channel() -> (Self, mpsc::UnboundedReceiver<LoadState>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let sink = Self {
            sender,
            state: Arc::new(Mutex::new(SinkState::default())),
        };
        (sink, receiver)
    }

    /// Emit `Loading(progress)` unless it would not advance the stream
    pub(crate) fn progress(&self, progress: f32) {
        if progress.is_nan() {
            return;
        }
        let progress = progress.clamp(0.0, 1.0);

        let mut state = self.state.lock();
        if state.terminated || state.last_progress.is_some_and(|last| progress <= last) {
            return;
        }
        state.last_progress = Some(progress);
        let _ = self.sender.send(LoadState::Loading(progress));
    }

    /// Emit the terminal state; later calls are ignored
    pub(crate) fn finish(&self, terminal: LoadState) {
        debug_assert!(terminal.is_terminal());
        let mut state = self.state.lock();
        if state.terminated {
            return;
        }
        state.terminated = true;
        let _ = self.sender.send(terminal);
    }

    /// Resolve once the receiving stream is dropped
    pub(crate) async fn closed(&self) {
        self.sender.closed().await
    }
}

/// Resolve once the load should stop
pub(crate) async fn stopped(handle: &LoadHandle, sink: &StateSink) {
    tokio::select! {
        _ = handle.cancelled() => {}
        _ = sink.closed() => {}
    }
}
