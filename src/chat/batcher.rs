// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Redraw batching for streamed text
//!
//! The accumulator can grow many times per millisecond; subscribers only
//! need to see the text once per redraw. [`UpdateBatcher`] keeps the latest
//! full buffer and asks a [`RedrawScheduler`] for at most one flush per
//! cycle. Because the pending value is always the whole buffer, every
//! published value is a prefix of the next one.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::task::JoinHandle;

/// Receives the full text each time the batcher publishes
pub type TextSubscriber = Arc<dyn Fn(&str) + Send + Sync>;

/// Work to run on the next redraw
pub type FrameCallback = Box<dyn FnOnce() + Send>;

/// Identifies a scheduled callback so it can be cancelled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameHandle(pub u64);

/// Source of redraw ticks
pub trait RedrawScheduler: Send + Sync {
    /// Run `callback` at the next redraw opportunity
    fn schedule(&self, callback: FrameCallback) -> FrameHandle;

    /// Drop a callback that has not run yet; unknown handles are ignored
    fn cancel(&self, handle: FrameHandle);
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[derive(Debug, Default)]
struct BatcherState {
    pending_text: String,
    /// Generation of the flush currently scheduled, if any
    scheduled: Option<u64>,
    handle: Option<FrameHandle>,
    complete: bool,
    next_generation: u64,
    publish_count: usize,
}

impl BatcherState {
    /// Publish the pending text; the subscriber runs under the state lock so
    /// publishes can never be reordered.
    fn publish(&mut self, subscriber: &TextSubscriber) {
        if self.pending_text.is_empty() {
            return;
        }
        self.publish_count += 1;
        subscriber(&self.pending_text);
    }
}

/// Coalesces text updates into one publish per redraw.
///
/// Subscribers must not call back into the batcher.
pub struct UpdateBatcher {
    state: Arc<Mutex<BatcherState>>,
    scheduler: Arc<dyn RedrawScheduler>,
    subscriber: TextSubscriber,
}

impl UpdateBatcher {
    pub fn new(scheduler: Arc<dyn RedrawScheduler>, subscriber: TextSubscriber) -> Self {
        Self {
            state: Arc::new(Mutex::new(BatcherState::default())),
            scheduler,
            subscriber,
        }
    }

    /// Record the latest full text and make sure a flush is scheduled
    pub fn update(&self, text: &str) {
        let generation = {
            let mut state = lock(&self.state);
            state.pending_text.clear();
            state.pending_text.push_str(text);

            if state.complete || state.scheduled.is_some() {
                return;
            }
            state.next_generation += 1;
            let generation = state.next_generation;
            state.scheduled = Some(generation);
            generation
        };

        let state = Arc::clone(&self.state);
        let subscriber = Arc::clone(&self.subscriber);
        let handle = self.scheduler.schedule(Box::new(move || {
            let mut state = lock(&state);
            if state.scheduled != Some(generation) {
                return;
            }
            state.scheduled = None;
            state.handle = None;
            state.publish(&subscriber);
        }));

        // An immediate scheduler has already run the flush by now.
        let mut state = lock(&self.state);
        if state.scheduled == Some(generation) {
            state.handle = Some(handle);
        }
    }

    /// Stop scheduling, drop any pending flush and publish the final text once.
    ///
    /// Calling it again has no effect.
    pub fn complete(&self) {
        let mut state = lock(&self.state);
        if state.complete {
            return;
        }
        state.complete = true;
        state.scheduled = None;
        if let Some(handle) = state.handle.take() {
            self.scheduler.cancel(handle);
        }
        state.publish(&self.subscriber);
    }

    /// Stop publishing without a final flush
    pub fn cancel(&self) {
        let mut state = lock(&self.state);
        state.complete = true;
        state.scheduled = None;
        if let Some(handle) = state.handle.take() {
            self.scheduler.cancel(handle);
        }
    }

    pub fn is_complete(&self) -> bool {
        lock(&self.state).complete
    }

    /// Number of times the subscriber has been called
    pub fn publish_count(&self) -> usize {
        lock(&self.state).publish_count
    }
}

/// Runs every callback synchronously inside `schedule`
#[derive(Debug, Default)]
pub struct ImmediateScheduler {
    next_id: AtomicU64,
}

impl ImmediateScheduler {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RedrawScheduler for ImmediateScheduler {
    fn schedule(&self, callback: FrameCallback) -> FrameHandle {
        let handle = FrameHandle(self.next_id.fetch_add(1, Ordering::Relaxed));
        callback();
        handle
    }

    fn cancel(&self, _handle: FrameHandle) {}
}

/// Queues callbacks until the host calls [`ManualScheduler::run_frame`]
#[derive(Default)]
pub struct ManualScheduler {
    next_id: AtomicU64,
    queue: Mutex<Vec<(FrameHandle, FrameCallback)>>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run every queued callback; returns how many ran
    pub fn run_frame(&self) -> usize {
        let callbacks = std::mem::take(&mut *lock(&self.queue));
        let count = callbacks.len();
        for (_, callback) in callbacks {
            callback();
        }
        count
    }

    /// Callbacks waiting for the next frame
    pub fn pending(&self) -> usize {
        lock(&self.queue).len()
    }
}

impl RedrawScheduler for ManualScheduler {
    fn schedule(&self, callback: FrameCallback) -> FrameHandle {
        let handle = FrameHandle(self.next_id.fetch_add(1, Ordering::Relaxed));
        lock(&self.queue).push((handle, callback));
        handle
    }

    fn cancel(&self, handle: FrameHandle) {
        lock(&self.queue).retain(|(queued, _)| *queued != handle);
    }
}

/// Default redraw interval (roughly 60 frames per second)
pub const DEFAULT_FRAME_INTERVAL: Duration = Duration::from_millis(16);

/// Fires callbacks after a fixed frame interval on the tokio runtime.
///
/// Outside a runtime the callback runs immediately.
pub struct IntervalScheduler {
    interval: Duration,
    next_id: AtomicU64,
    tasks: Mutex<HashMap<u64, JoinHandle<()>>>,
}

impl Default for IntervalScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_FRAME_INTERVAL)
    }
}

impl IntervalScheduler {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_id: AtomicU64::new(0),
            tasks: Mutex::new(HashMap::new()),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl RedrawScheduler for IntervalScheduler {
    fn schedule(&self, callback: FrameCallback) -> FrameHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let handle = FrameHandle(id);

        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(_) => {
                callback();
                return handle;
            }
        };

        let interval = self.interval;
        let task = runtime.spawn(async move {
            tokio::time::sleep(interval).await;
            callback();
        });

        let mut tasks = lock(&self.tasks);
        tasks.retain(|_, task| !task.is_finished());
        tasks.insert(id, task);
        handle
    }

    fn cancel(&self, handle: FrameHandle) {
        if let Some(task) = lock(&self.tasks).remove(&handle.0) {
            task.abort();
        }
    }
}

impl Drop for IntervalScheduler {
    fn drop(&mut self) {
        for (_, task) in lock(&self.tasks).drain() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recording() -> (TextSubscriber, Arc<Mutex<Vec<String>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let subscriber: TextSubscriber = Arc::new(move |text: &str| {
            sink.lock().unwrap().push(text.to_string());
        });
        (subscriber, seen)
    }

    #[test]
    fn test_single_publish_per_frame() {
        let scheduler = Arc::new(ManualScheduler::new());
        let (subscriber, seen) = recording();
        let batcher = UpdateBatcher::new(scheduler.clone(), subscriber);

        batcher.update("A");
        batcher.update("AB");
        batcher.update("ABC");
        assert_eq!(scheduler.pending(), 1);

        assert_eq!(scheduler.run_frame(), 1);
        assert_eq!(*seen.lock().unwrap(), vec!["ABC".to_string()]);
        assert_eq!(batcher.publish_count(), 1);
    }

    #[test]
    fn test_next_update_schedules_again() {
        let scheduler = Arc::new(ManualScheduler::new());
        let (subscriber, seen) = recording();
        let batcher = UpdateBatcher::new(scheduler.clone(), subscriber);

        batcher.update("A");
        scheduler.run_frame();
        batcher.update("AB");
        assert_eq!(scheduler.pending(), 1);
        scheduler.run_frame();

        assert_eq!(*seen.lock().unwrap(), vec!["A".to_string(), "AB".to_string()]);
    }

    #[test]
    fn test_complete_flushes_late_update() {
        let scheduler = Arc::new(ManualScheduler::new());
        let (subscriber, seen) = recording();
        let batcher = UpdateBatcher::new(scheduler.clone(), subscriber);

        batcher.update("A");
        scheduler.run_frame();
        batcher.update("AB");
        batcher.complete();

        assert_eq!(scheduler.pending(), 0, "pending flush is cancelled");
        assert_eq!(seen.lock().unwrap().last().map(String::as_str), Some("AB"));
        assert_eq!(batcher.publish_count(), 2);
    }

    #[test]
    fn test_complete_is_idempotent_and_stops_scheduling() {
        let scheduler = Arc::new(ManualScheduler::new());
        let (subscriber, seen) = recording();
        let batcher = UpdateBatcher::new(scheduler.clone(), subscriber);

        batcher.update("A");
        batcher.complete();
        batcher.complete();
        batcher.update("AB");

        assert!(batcher.is_complete());
        assert_eq!(scheduler.pending(), 0);
        assert_eq!(*seen.lock().unwrap(), vec!["A".to_string()]);
    }

    #[test]
    fn test_empty_text_is_not_published() {
        let scheduler = Arc::new(ManualScheduler::new());
        let (subscriber, seen) = recording();
        let batcher = UpdateBatcher::new(scheduler.clone(), subscriber);

        batcher.update("");
        scheduler.run_frame();
        batcher.complete();

        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_cancel_skips_final_flush() {
        let scheduler = Arc::new(ManualScheduler::new());
        let (subscriber, seen) = recording();
        let batcher = UpdateBatcher::new(scheduler.clone(), subscriber);

        batcher.update("partial");
        batcher.cancel();
        scheduler.run_frame();

        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_stale_callback_does_nothing() {
        let scheduler = Arc::new(ManualScheduler::new());
        let (subscriber, seen) = recording();
        let batcher = UpdateBatcher::new(scheduler.clone(), subscriber);

        batcher.update("A");
        // Steal the queued callback so cancel() cannot remove it.
        let stolen = std::mem::take(&mut *scheduler.queue.lock().unwrap());
        batcher.complete();
        for (_, callback) in stolen {
            callback();
        }

        assert_eq!(*seen.lock().unwrap(), vec!["A".to_string()]);
    }

    #[test]
    fn test_immediate_scheduler_publishes_every_update() {
        let (subscriber, seen) = recording();
        let batcher = UpdateBatcher::new(Arc::new(ImmediateScheduler::new()), subscriber);

        batcher.update("A");
        batcher.update("AB");
        batcher.complete();

        assert_eq!(
            *seen.lock().unwrap(),
            vec!["A".to_string(), "AB".to_string(), "AB".to_string()]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_interval_scheduler_fires_after_interval() {
        let scheduler = Arc::new(IntervalScheduler::new(Duration::from_millis(16)));
        let (subscriber, seen) = recording();
        let batcher = UpdateBatcher::new(scheduler.clone(), subscriber);

        batcher.update("A");
        batcher.update("AB");
        assert!(seen.lock().unwrap().is_empty());

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(*seen.lock().unwrap(), vec!["AB".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_interval_scheduler_cancel() {
        let scheduler = Arc::new(IntervalScheduler::new(Duration::from_millis(16)));
        let (subscriber, seen) = recording();
        let batcher = UpdateBatcher::new(scheduler.clone(), subscriber);

        batcher.update("A");
        batcher.cancel();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(seen.lock().unwrap().is_empty());
    }
}
