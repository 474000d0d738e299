//! Background progress reporting while the backend runs.

use log::{info, warn};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// A thread that wakes up every `interval` while a solve is running.
///
/// With a timeout it logs the time remaining; without one it warns once
/// after `long_run_warning` has elapsed. It exits when [`finish`] is
/// called or the shared interrupt flag is raised.
///
/// [`finish`]: ProgressReporter::finish
pub struct ProgressReporter {
    stop: Arc<AtomicBool>,
    ticks: Arc<AtomicU64>,
    handle: Option<JoinHandle<()>>,
}

impl ProgressReporter {
    pub fn spawn(
        interval: Duration,
        timeout: Option<Duration>,
        long_run_warning: Duration,
        interrupt: Option<Arc<AtomicBool>>,
    ) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let ticks = Arc::new(AtomicU64::new(0));

        let thread_stop = Arc::clone(&stop);
        let thread_ticks = Arc::clone(&ticks);
        let spawned = thread::Builder::new()
            .name("allocation-progress".into())
            .spawn(move || {
                let should_stop = || {
                    thread_stop.load(Ordering::Acquire)
                        || interrupt.as_ref().is_some_and(|f| f.load(Ordering::Relaxed))
                };
                let start = Instant::now();
                let mut next = start + interval;
                let mut warned = false;

                loop {
                    // park_timeout may return early; sleep until the tick is due.
                    let now = Instant::now();
                    if now < next {
                        thread::park_timeout(next - now);
                    }
                    if should_stop() {
                        break;
                    }
                    if Instant::now() < next {
                        continue;
                    }
                    next += interval;
                    thread_ticks.fetch_add(1, Ordering::Relaxed);

                    let elapsed = start.elapsed();
                    match timeout {
                        Some(limit) => info!(
                            "solving: {}s remaining",
                            limit.saturating_sub(elapsed).as_secs()
                        ),
                        None if !warned && elapsed >= long_run_warning => {
                            warn!(
                                "solving has run for {}s with no timeout; consider setting one",
                                elapsed.as_secs()
                            );
                            warned = true;
                        }
                        None => {}
                    }
                }
            });

        let handle = match spawned {
            Ok(handle) => Some(handle),
            Err(e) => {
                warn!("progress reporting disabled: {e}");
                None
            }
        };

        Self {
            stop,
            ticks,
            handle,
        }
    }

    /// Stops the thread, waits for it and returns how many times it woke
    /// up to report.
    pub fn finish(mut self) -> u64 {
        self.shutdown();
        self.ticks.load(Ordering::Relaxed)
    }

    fn shutdown(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            handle.thread().unpark();
            if handle.join().is_err() {
                warn!("progress thread panicked");
            }
        }
    }
}

impl Drop for ProgressReporter {
    fn drop(&mut self) {
        self.shutdown();
    }
}
