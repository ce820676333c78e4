//! Background frame sampling.
//!
//! Spawns a thread that owns the `SensorArray`, pushes the latest frame via a
//! bounded channel, and tracks the last-ok timestamp and error count.
//!
//! Each `FrameSampler` spawns exactly one thread, shut down and joined when
//! the sampler is dropped.
use crossbeam_channel as xch;
use keycal_traits::SensorArray;
use keycal_traits::clock::Clock;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

pub struct FrameSampler<const N: usize> {
    rx: xch::Receiver<[f32; N]>,
    last_ok: Arc<AtomicU64>,
    errors: Arc<AtomicU64>,
    epoch: Instant,
    shutdown: Arc<AtomicBool>,
    join_handle: Option<std::thread::JoinHandle<()>>,
}

impl<const N: usize> FrameSampler<N> {
    /// Read a frame every `period`. Frames the consumer has not picked up are
    /// replaced, never queued.
    pub fn spawn<A, C>(mut sensors: A, period: Duration, timeout: Duration, clock: C) -> Self
    where
        A: SensorArray + Send + 'static,
        C: Clock + Send + Sync + 'static,
    {
        let (tx, rx) = xch::bounded(1);
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_clone = shutdown.clone();
        let last_ok = Arc::new(AtomicU64::new(0));
        let last_ok_clone = last_ok.clone();
        let errors = Arc::new(AtomicU64::new(0));
        let errors_clone = errors.clone();
        let epoch = clock.now();
        // The consumer's copy of the channel; used to drop a stale frame.
        let stale = rx.clone();

        let join_handle = std::thread::spawn(move || {
            let mut frame = [0.0_f32; N];
            loop {
                if shutdown_clone.load(Ordering::Relaxed) {
                    tracing::debug!("sampler thread received shutdown signal");
                    break;
                }

                match sensors.read(&mut frame, timeout) {
                    Ok(()) => {
                        let _ = stale.try_recv();
                        // Full only if the consumer raced us; its frame is as fresh.
                        let _ = tx.try_send(frame);
                        last_ok_clone.store(clock.ms_since(epoch), Ordering::Relaxed);
                    }
                    Err(e) => {
                        errors_clone.fetch_add(1, Ordering::Relaxed);
                        tracing::trace!(error = %e, "sensor read failed");
                    }
                }

                if shutdown_clone.load(Ordering::Relaxed) {
                    break;
                }
                clock.sleep(period);
            }
            tracing::trace!("sampler thread exiting cleanly");
        });

        Self {
            rx,
            last_ok,
            errors,
            epoch,
            shutdown,
            join_handle: Some(join_handle),
        }
    }

    /// Most recent frame, if one arrived since the last call.
    pub fn latest(&self) -> Option<[f32; N]> {
        self.rx.try_iter().last()
    }

    /// Block up to `timeout` for the next frame.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<[f32; N]> {
        self.rx.recv_timeout(timeout).ok()
    }

    /// Failed reads since spawn.
    pub fn errors(&self) -> u64 {
        self.errors.load(Ordering::Relaxed)
    }

    pub fn stalled_for(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.last_ok.load(Ordering::Relaxed))
    }

    /// Stall using this sampler's epoch and the real monotonic time.
    pub fn stalled_for_now(&self) -> u64 {
        let ms = Instant::now().saturating_duration_since(self.epoch).as_millis();
        self.stalled_for(u64::try_from(ms).unwrap_or(u64::MAX))
    }
}

impl<const N: usize> Drop for FrameSampler<N> {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);

        // The thread exits between reads, or after the current read returns
        // (bounded by the sensor timeout).
        if let Some(handle) = self.join_handle.take() {
            match handle.join() {
                Ok(()) => {
                    tracing::trace!("sampler thread joined successfully");
                }
                Err(e) => {
                    tracing::warn!(?e, "sampler thread panicked during shutdown");
                }
            }
        }
    }
}
