pub mod bus;
pub mod firmware;
pub mod format;
pub mod memory;
pub mod metrics;
pub mod peripherals;
pub mod snapshot;
pub mod transport;

use firmware::echo::{EchoFirmware, StepOutcome};
use peripherals::debug_port::MessageSink;
use sideband_config::{PlatformConfig, StopReason};
use std::any::Any;
use std::sync::Arc;
use transport::Transport;

mod tests;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SimulationError {
    #[error("Memory access violation at {0:#x}")]
    MemoryViolation(u64),
    #[error("Debug protocol sequence error: {0}")]
    ProtocolSequence(&'static str),
    #[error("Buffer overflow: {needed} bytes exceed capacity of {capacity}")]
    BufferOverflow { needed: usize, capacity: usize },
    #[error("Unterminated debug message ({len} bytes captured)")]
    UnterminatedMessage { len: usize },
    #[error("UART data register read with no received byte available")]
    ReadWithNoData,
}

pub type SimResult<T> = Result<T, SimulationError>;

/// Trait for observing the echo session in a modular way.
pub trait PlatformObserver: std::fmt::Debug + Send + Sync {
    fn on_session_start(&self) {}
    fn on_session_end(&self, _byte_count: u32) {}
    fn on_poll(&self, _ready: bool) {}
    fn on_byte_echoed(&self, _byte: u8) {}
}

/// Trait representing a memory-mapped peripheral
pub trait Peripheral: std::fmt::Debug + Send {
    /// Reads may have side effects (e.g. consuming a received byte).
    fn read(&mut self, offset: u64) -> SimResult<u8>;
    fn write(&mut self, offset: u64, value: u8) -> SimResult<()>;
    fn as_any(&self) -> Option<&dyn Any> {
        None
    }
    fn as_any_mut(&mut self) -> Option<&mut dyn Any> {
        None
    }
}

/// Notification delivered by the bus for every store into a hooked region.
pub trait WriteHook: std::fmt::Debug + Send {
    fn on_write(&mut self, addr: u64, value: u8) -> SimResult<()>;
    fn as_any(&self) -> Option<&dyn Any> {
        None
    }
    fn as_any_mut(&mut self) -> Option<&mut dyn Any> {
        None
    }
}

/// Trait representing the system bus
pub trait Bus {
    fn read_u8(&mut self, addr: u64) -> SimResult<u8>;
    fn write_u8(&mut self, addr: u64, value: u8) -> SimResult<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunReport {
    pub stop_reason: StopReason,
    pub polls: u64,
    pub byte_count: u32,
}

pub struct Platform {
    pub bus: bus::SystemBus,
    pub firmware: EchoFirmware,
    pub observers: Vec<Arc<dyn PlatformObserver>>,
}

impl Platform {
    /// Assemble the reference platform: data memory, UART and the debug
    /// region on one bus, plus the echo firmware that drives them.
    pub fn from_config(
        config: &PlatformConfig,
        transport: Box<dyn Transport>,
        sink: Box<dyn MessageSink>,
    ) -> anyhow::Result<Self> {
        config.validate()?;
        let bus = bus::SystemBus::from_config(config, transport, sink)?;
        let firmware = EchoFirmware::from_config(config);

        Ok(Self {
            bus,
            firmware,
            observers: Vec::new(),
        })
    }

    pub fn start(&mut self) -> SimResult<()> {
        self.firmware.start(&mut self.bus, &self.observers)
    }

    pub fn step(&mut self) -> SimResult<StepOutcome> {
        self.firmware.step(&mut self.bus, &self.observers)
    }

    /// Run until the firmware terminates or `max_polls` UART polls have been
    /// spent. The budget is checked between polls only.
    pub fn run(&mut self, max_polls: u64) -> SimResult<RunReport> {
        if !self.firmware.is_started() {
            self.start()?;
        }

        let mut polls = 0;
        while polls < max_polls {
            polls += 1;
            if self.step()? == StepOutcome::Terminated {
                return Ok(RunReport {
                    stop_reason: StopReason::Terminated,
                    polls,
                    byte_count: self.firmware.session().byte_count,
                });
            }
        }

        tracing::info!("Poll budget of {} exhausted before termination", max_polls);
        Ok(RunReport {
            stop_reason: StopReason::MaxPolls,
            polls,
            byte_count: self.firmware.session().byte_count,
        })
    }

    pub fn snapshot(&self) -> snapshot::PlatformSnapshot {
        snapshot::PlatformSnapshot {
            uart: self.bus.uart().map(|u| u.snapshot()),
            debug_port: self.bus.debug_port().map(|d| d.snapshot()),
            session: self.firmware.session().into(),
        }
    }
}
