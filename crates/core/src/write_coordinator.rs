//! Debounced background persistence.
//!
//! Keeps the latest dirty snapshot in memory and writes it through a sink
//! after a debounce window, so a burst of edits costs one write. A
//! max-debounce cap bounds how long continuous editing can defer the
//! write. Dropping the coordinator flushes synchronously.

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};
use tracing::warn;

/// Timing configuration for the coordinator.
#[derive(Debug, Clone)]
pub struct WriteCoordinatorConfig {
    /// Quiet period after the last change before writing.
    pub debounce_duration: Duration,

    /// Upper bound on deferral while changes keep arriving.
    pub max_debounce_duration: Duration,

    /// When false, writes happen only on explicit flushes.
    pub enable_auto_save: bool,
}

impl Default for WriteCoordinatorConfig {
    fn default() -> Self {
        Self {
            debounce_duration: Duration::from_millis(150),
            max_debounce_duration: Duration::from_secs(1),
            enable_auto_save: true,
        }
    }
}

/// Dirty-state tracker behind the debounce decision.
///
/// Also used directly by the document session to defer document writes,
/// which must happen on the session's own thread.
#[derive(Debug)]
pub(crate) struct PendingWrite {
    first_marked_at: Instant,
    last_marked_at: Instant,
    is_dirty: bool,
}

impl PendingWrite {
    pub(crate) fn new() -> Self {
        Self { first_marked_at: Instant::now(), last_marked_at: Instant::now(), is_dirty: false }
    }

    pub(crate) fn mark_dirty(&mut self) {
        let now = Instant::now();
        if !self.is_dirty {
            self.first_marked_at = now;
        }
        self.last_marked_at = now;
        self.is_dirty = true;
    }

    pub(crate) fn clear(&mut self) {
        self.is_dirty = false;
    }

    pub(crate) fn is_dirty(&self) -> bool {
        self.is_dirty
    }

    pub(crate) fn should_write(&self, config: &WriteCoordinatorConfig) -> bool {
        if !self.is_dirty {
            return false;
        }

        self.last_marked_at.elapsed() >= config.debounce_duration
            || self.first_marked_at.elapsed() >= config.max_debounce_duration
    }
}

type Sink<T> = Box<dyn FnMut(&T) -> bool + Send>;

/// Debounced writer for snapshots of type `T`.
///
/// `mark_dirty` replaces the held snapshot; only the latest one reaches
/// the sink. The sink returns whether the write succeeded; failed writes
/// stay dirty and are retried on the next tick.
pub struct WriteCoordinator<T: Send + 'static> {
    config: WriteCoordinatorConfig,
    pending: Arc<Mutex<PendingWrite>>,
    payload: Arc<Mutex<Option<T>>>,
    sink: Arc<Mutex<Sink<T>>>,
    _thread_handle: Option<thread::JoinHandle<()>>,
    should_stop: Arc<Mutex<bool>>,
}

impl<T: Send + 'static> WriteCoordinator<T> {
    pub fn new(sink: impl FnMut(&T) -> bool + Send + 'static) -> Self {
        Self::with_config(WriteCoordinatorConfig::default(), sink)
    }

    pub fn with_config(
        config: WriteCoordinatorConfig,
        sink: impl FnMut(&T) -> bool + Send + 'static,
    ) -> Self {
        let pending = Arc::new(Mutex::new(PendingWrite::new()));
        let payload = Arc::new(Mutex::new(None));
        let sink: Arc<Mutex<Sink<T>>> = Arc::new(Mutex::new(Box::new(sink)));
        let should_stop = Arc::new(Mutex::new(false));

        let thread_handle = if config.enable_auto_save {
            Some(Self::spawn_background_thread(
                Arc::clone(&pending),
                Arc::clone(&payload),
                Arc::clone(&sink),
                Arc::clone(&should_stop),
                config.clone(),
            ))
        } else {
            None
        };

        Self { config, pending, payload, sink, _thread_handle: thread_handle, should_stop }
    }

    /// Replace the pending snapshot and restart the debounce window.
    pub fn mark_dirty(&self, snapshot: T) {
        *self.payload.lock().unwrap() = Some(snapshot);
        self.pending.lock().unwrap().mark_dirty();
    }

    pub fn is_dirty(&self) -> bool {
        self.pending.lock().unwrap().is_dirty
    }

    pub fn config(&self) -> &WriteCoordinatorConfig {
        &self.config
    }

    /// Write the pending snapshot now, on the calling thread.
    ///
    /// Returns whether a write was performed.
    pub fn flush(&self) -> bool {
        let mut pending = self.pending.lock().unwrap();
        if !pending.is_dirty {
            return false;
        }

        let payload = self.payload.lock().unwrap();
        let Some(snapshot) = payload.as_ref() else {
            pending.clear();
            return false;
        };

        let ok = (self.sink.lock().unwrap())(snapshot);
        drop(payload);
        if ok {
            pending.clear();
        } else {
            warn!("snapshot flush failed; staying dirty");
        }
        ok
    }

    fn spawn_background_thread(
        pending: Arc<Mutex<PendingWrite>>,
        payload: Arc<Mutex<Option<T>>>,
        sink: Arc<Mutex<Sink<T>>>,
        should_stop: Arc<Mutex<bool>>,
        config: WriteCoordinatorConfig,
    ) -> thread::JoinHandle<()> {
        thread::spawn(move || {
            let check_interval = Duration::from_millis(50);

            loop {
                if *should_stop.lock().unwrap() {
                    break;
                }

                let due = pending.lock().unwrap().should_write(&config);
                if due {
                    let mut pending = pending.lock().unwrap();
                    if pending.is_dirty {
                        let payload = payload.lock().unwrap();
                        let ok = match payload.as_ref() {
                            Some(snapshot) => (sink.lock().unwrap())(snapshot),
                            None => true,
                        };
                        drop(payload);
                        if ok {
                            pending.clear();
                        }
                    }
                }

                thread::sleep(check_interval);
            }
        })
    }
}

impl<T: Send + 'static> Drop for WriteCoordinator<T> {
    fn drop(&mut self) {
        *self.should_stop.lock().unwrap() = true;
        let _ = self.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_sink(counter: Arc<AtomicUsize>) -> impl FnMut(&u32) -> bool + Send {
        move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            true
        }
    }

    #[test]
    fn starts_clean() {
        let coordinator = WriteCoordinator::new(|_: &u32| true);
        assert!(!coordinator.is_dirty());
        assert!(!coordinator.flush());
    }

    #[test]
    fn flush_writes_latest_snapshot_once() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_sink = Arc::clone(&seen);
        let coordinator = WriteCoordinator::with_config(
            WriteCoordinatorConfig { enable_auto_save: false, ..Default::default() },
            move |value: &u32| {
                seen_sink.lock().unwrap().push(*value);
                true
            },
        );

        coordinator.mark_dirty(1);
        coordinator.mark_dirty(2);
        coordinator.mark_dirty(3);
        assert!(coordinator.is_dirty());

        assert!(coordinator.flush());
        assert!(!coordinator.is_dirty());
        assert_eq!(*seen.lock().unwrap(), vec![3]);
    }

    #[test]
    fn failed_write_stays_dirty() {
        let coordinator = WriteCoordinator::with_config(
            WriteCoordinatorConfig { enable_auto_save: false, ..Default::default() },
            |_: &u32| false,
        );

        coordinator.mark_dirty(7);
        assert!(!coordinator.flush());
        assert!(coordinator.is_dirty());
    }

    #[test]
    fn auto_save_fires_after_debounce() {
        let writes = Arc::new(AtomicUsize::new(0));
        let coordinator = WriteCoordinator::with_config(
            WriteCoordinatorConfig {
                debounce_duration: Duration::from_millis(100),
                max_debounce_duration: Duration::from_millis(500),
                enable_auto_save: true,
            },
            counting_sink(Arc::clone(&writes)),
        );

        coordinator.mark_dirty(1);
        thread::sleep(Duration::from_millis(300));

        assert!(!coordinator.is_dirty());
        assert_eq!(writes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn auto_save_disabled_leaves_snapshot_dirty() {
        let coordinator = WriteCoordinator::with_config(
            WriteCoordinatorConfig {
                debounce_duration: Duration::from_millis(50),
                max_debounce_duration: Duration::from_millis(100),
                enable_auto_save: false,
            },
            |_: &u32| true,
        );

        coordinator.mark_dirty(1);
        thread::sleep(Duration::from_millis(200));
        assert!(coordinator.is_dirty());
    }

    #[test]
    fn burst_of_changes_writes_once() {
        let writes = Arc::new(AtomicUsize::new(0));
        let coordinator = WriteCoordinator::with_config(
            WriteCoordinatorConfig {
                debounce_duration: Duration::from_millis(150),
                max_debounce_duration: Duration::from_secs(2),
                enable_auto_save: true,
            },
            counting_sink(Arc::clone(&writes)),
        );

        for value in 0..5 {
            coordinator.mark_dirty(value);
            thread::sleep(Duration::from_millis(20));
        }
        thread::sleep(Duration::from_millis(400));

        assert!(!coordinator.is_dirty());
        assert_eq!(writes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn max_debounce_caps_continuous_editing() {
        let writes = Arc::new(AtomicUsize::new(0));
        let coordinator = WriteCoordinator::with_config(
            WriteCoordinatorConfig {
                debounce_duration: Duration::from_secs(10),
                max_debounce_duration: Duration::from_millis(200),
                enable_auto_save: true,
            },
            counting_sink(Arc::clone(&writes)),
        );

        // Keep editing faster than the debounce window can close.
        for value in 0..10 {
            coordinator.mark_dirty(value);
            thread::sleep(Duration::from_millis(50));
        }
        thread::sleep(Duration::from_millis(200));

        assert!(writes.load(Ordering::SeqCst) >= 1);
    }

    #[test]
    fn drop_flushes_pending_snapshot() {
        let writes = Arc::new(AtomicUsize::new(0));
        {
            let coordinator = WriteCoordinator::with_config(
                WriteCoordinatorConfig { enable_auto_save: false, ..Default::default() },
                counting_sink(Arc::clone(&writes)),
            );
            coordinator.mark_dirty(1);
        }
        assert_eq!(writes.load(Ordering::SeqCst), 1);
    }
}
