// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use super::backoff::{self, Backoff};
use super::{dbg_print, RegisterMap};
use crate::format::{concat, encode_decimal};
use crate::peripherals::uart::UartFlags;
use crate::{Bus, PlatformObserver, SimResult};
use sideband_config::{FirmwareConfig, PlatformConfig};
use std::sync::Arc;

/// Size of the stack buffer the summary line is assembled in.
pub const SUMMARY_CAPACITY: usize = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Running,
    Terminated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EchoSession {
    pub byte_count: u32,
    pub state: SessionState,
}

impl Default for EchoSession {
    fn default() -> Self {
        Self {
            byte_count: 0,
            state: SessionState::Running,
        }
    }
}

impl EchoSession {
    pub fn is_terminated(&self) -> bool {
        self.state == SessionState::Terminated
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// Receive FIFO was empty.
    Idle,
    Echoed(u8),
    Terminated,
}

/// Echo line discipline: echo every received byte until the sentinel,
/// then report how many bytes were echoed over the debug sideband.
#[derive(Debug)]
pub struct EchoFirmware {
    map: RegisterMap,
    settings: FirmwareConfig,
    backoff: Box<dyn Backoff>,
    session: EchoSession,
    idle_polls: u64,
    started: bool,
}

impl EchoFirmware {
    pub fn new(map: RegisterMap, settings: FirmwareConfig, backoff: Box<dyn Backoff>) -> Self {
        Self {
            map,
            settings,
            backoff,
            session: EchoSession::default(),
            idle_polls: 0,
            started: false,
        }
    }

    pub fn from_config(config: &PlatformConfig) -> Self {
        Self::new(
            RegisterMap::from(config),
            config.firmware.clone(),
            backoff::from_config(&config.firmware.backoff),
        )
    }

    pub fn session(&self) -> &EchoSession {
        &self.session
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    /// UART init sequence followed by the start banner.
    pub fn start(
        &mut self,
        bus: &mut dyn Bus,
        observers: &[Arc<dyn PlatformObserver>],
    ) -> SimResult<()> {
        bus.write_u8(self.map.uartlcr_h(), self.settings.line_control)?;
        let cr = bus.read_u8(self.map.uartcr())?;
        bus.write_u8(self.map.uartcr(), cr | self.settings.control)?;
        self.started = true;

        for observer in observers {
            observer.on_session_start();
        }
        tracing::info!("Echo: session started");
        dbg_print(bus, &self.map, self.settings.start_banner.as_bytes())
    }

    /// One poll of the UART. Once terminated, every further step is a no-op.
    pub fn step(
        &mut self,
        bus: &mut dyn Bus,
        observers: &[Arc<dyn PlatformObserver>],
    ) -> SimResult<StepOutcome> {
        if self.session.is_terminated() {
            return Ok(StepOutcome::Terminated);
        }

        let flags = UartFlags::from_bits_truncate(bus.read_u8(self.map.uartfr())?);
        let ready = !flags.contains(UartFlags::RXFE);
        for observer in observers {
            observer.on_poll(ready);
        }
        if !ready {
            self.idle_polls += 1;
            self.backoff.pause(self.idle_polls);
            return Ok(StepOutcome::Idle);
        }
        self.idle_polls = 0;

        let byte = bus.read_u8(self.map.uartdr())?;
        if byte == self.settings.sentinel {
            // The sentinel is consumed; the session ends even if a print fails.
            self.session.state = SessionState::Terminated;
            tracing::info!(
                "Echo: sentinel received after {} bytes",
                self.session.byte_count
            );
            let banner = dbg_print(
                bus,
                &self.map,
                self.settings.terminate_banner.as_bytes(),
            );
            let summary = self.report(bus);
            for observer in observers {
                observer.on_session_end(self.session.byte_count);
            }
            banner.and(summary)?;
            return Ok(StepOutcome::Terminated);
        }

        bus.write_u8(self.map.uartdr(), byte)?;
        self.session.byte_count = self.session.byte_count.saturating_add(1);
        tracing::debug!("Echo: {:#04x} (count={})", byte, self.session.byte_count);
        for observer in observers {
            observer.on_byte_echoed(byte);
        }
        Ok(StepOutcome::Echoed(byte))
    }

    fn report(&self, bus: &mut dyn Bus) -> SimResult<()> {
        let digits = encode_decimal(self.session.byte_count);
        let mut line = [0u8; SUMMARY_CAPACITY];
        let len = concat(
            &mut line,
            self.settings.summary_prefix.as_bytes(),
            digits.as_bytes(),
        )?;
        dbg_print(bus, &self.map, &line[..len])
    }
}
