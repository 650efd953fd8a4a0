// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use sideband_config::BackoffConfig;
use std::time::Duration;

/// Delay applied between polls that found no data.
pub trait Backoff: std::fmt::Debug + Send {
    /// `idle_polls` counts consecutive empty polls, starting at 1.
    fn pause(&mut self, idle_polls: u64);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoBackoff;

impl Backoff for NoBackoff {
    fn pause(&mut self, _idle_polls: u64) {}
}

/// Busy-waits a fixed number of iterations, like a `while(--i);` delay loop.
#[derive(Debug, Clone, Copy)]
pub struct SpinBackoff {
    pub iterations: u32,
}

impl Backoff for SpinBackoff {
    fn pause(&mut self, _idle_polls: u64) {
        for _ in 0..self.iterations {
            std::hint::spin_loop();
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SleepBackoff {
    pub interval: Duration,
}

impl Backoff for SleepBackoff {
    fn pause(&mut self, _idle_polls: u64) {
        std::thread::sleep(self.interval);
    }
}

pub fn from_config(config: &BackoffConfig) -> Box<dyn Backoff> {
    match *config {
        BackoffConfig::None => Box::new(NoBackoff),
        BackoffConfig::Spin { iterations } => Box::new(SpinBackoff { iterations }),
        BackoffConfig::Sleep { micros } => Box::new(SleepBackoff {
            interval: Duration::from_micros(micros),
        }),
    }
}
