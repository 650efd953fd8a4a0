use crate::PlatformObserver;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

#[derive(Debug)]
pub struct SessionMetrics {
    poll_count: AtomicU64,
    idle_poll_count: AtomicU64,
    bytes_echoed: AtomicU64,
    sessions_completed: AtomicU64,
    start_time: Instant,
}

impl Default for SessionMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionMetrics {
    pub fn new() -> Self {
        Self {
            poll_count: AtomicU64::new(0),
            idle_poll_count: AtomicU64::new(0),
            bytes_echoed: AtomicU64::new(0),
            sessions_completed: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn reset(&self) {
        self.poll_count.store(0, Ordering::SeqCst);
        self.idle_poll_count.store(0, Ordering::SeqCst);
        self.bytes_echoed.store(0, Ordering::SeqCst);
        self.sessions_completed.store(0, Ordering::SeqCst);
    }

    pub fn get_polls(&self) -> u64 {
        self.poll_count.load(Ordering::SeqCst)
    }

    pub fn get_idle_polls(&self) -> u64 {
        self.idle_poll_count.load(Ordering::SeqCst)
    }

    pub fn get_bytes_echoed(&self) -> u64 {
        self.bytes_echoed.load(Ordering::SeqCst)
    }

    pub fn get_sessions_completed(&self) -> u64 {
        self.sessions_completed.load(Ordering::SeqCst)
    }

    pub fn get_bytes_per_sec(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.get_bytes_echoed() as f64 / elapsed
        } else {
            0.0
        }
    }
}

impl PlatformObserver for SessionMetrics {
    fn on_poll(&self, ready: bool) {
        self.poll_count.fetch_add(1, Ordering::SeqCst);
        if !ready {
            self.idle_poll_count.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn on_byte_echoed(&self, _byte: u8) {
        self.bytes_echoed.fetch_add(1, Ordering::SeqCst);
    }

    fn on_session_end(&self, _byte_count: u32) {
        self.sessions_completed.fetch_add(1, Ordering::SeqCst);
    }
}
