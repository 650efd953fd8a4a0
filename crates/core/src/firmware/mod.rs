// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Host-side firmware that talks to the platform only through bus accesses,
//! the same loads and stores a binary on the target would issue.

pub mod backoff;
pub mod echo;

use crate::peripherals::debug_port::{TRIGGER_BEGIN, TRIGGER_END};
use crate::peripherals::uart::{UARTCR, UARTDR, UARTFR, UARTLCR_H};
use crate::{Bus, SimResult};
use sideband_config::PlatformConfig;

/// Absolute register addresses as firmware sees them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterMap {
    pub uart_base: u64,
    pub debug_base: u64,
}

impl RegisterMap {
    pub fn uartdr(&self) -> u64 {
        self.uart_base + UARTDR
    }

    pub fn uartfr(&self) -> u64 {
        self.uart_base + UARTFR
    }

    pub fn uartlcr_h(&self) -> u64 {
        self.uart_base + UARTLCR_H
    }

    pub fn uartcr(&self) -> u64 {
        self.uart_base + UARTCR
    }

    pub fn log_buff(&self) -> u64 {
        self.debug_base
    }

    pub fn log_trig(&self) -> u64 {
        self.debug_base + 1
    }
}

impl From<&PlatformConfig> for RegisterMap {
    fn from(config: &PlatformConfig) -> Self {
        Self {
            uart_base: config.uart.base,
            debug_base: config.debug_port.base,
        }
    }
}

/// Prints `text` through the debug sideband: BEGIN, one store per byte,
/// a NUL terminator, then END.
///
/// Stores stop at the first rejected byte, but END is always written so the
/// port flushes what it captured. The first error is returned.
pub fn dbg_print(bus: &mut dyn Bus, map: &RegisterMap, text: &[u8]) -> SimResult<()> {
    bus.write_u8(map.log_trig(), TRIGGER_BEGIN)?;
    let stored = text
        .iter()
        .chain(std::iter::once(&0))
        .try_for_each(|&byte| bus.write_u8(map.log_buff(), byte));
    let flushed = bus.write_u8(map.log_trig(), TRIGGER_END);
    stored.and(flushed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::SystemBus;
    use crate::peripherals::debug_port::CollectingSink;
    use crate::transport::ScriptedTransport;
    use crate::SimulationError;

    fn setup() -> (SystemBus, RegisterMap, CollectingSink) {
        let mut config = PlatformConfig::default();
        config.debug_port.capacity = 8;
        let sink = CollectingSink::new();
        let bus = SystemBus::from_config(
            &config,
            Box::new(ScriptedTransport::new()),
            Box::new(sink.clone()),
        )
        .unwrap();
        (bus, RegisterMap::from(&config), sink)
    }

    #[test]
    fn test_dbg_print() {
        let (mut bus, map, sink) = setup();
        dbg_print(&mut bus, &map, b"ready").unwrap();
        let messages = sink.messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].text, b"ready");
        assert!(messages[0].terminated);
    }

    #[test]
    fn test_dbg_print_overflow_still_flushes() {
        let (mut bus, map, sink) = setup();
        let err = dbg_print(&mut bus, &map, b"0123456789").unwrap_err();
        assert_eq!(
            err,
            SimulationError::BufferOverflow {
                needed: 9,
                capacity: 8
            }
        );

        let messages = sink.messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].text, b"01234567");
        assert!(messages[0].overflowed);
        assert!(!messages[0].terminated);
        assert!(!bus.debug_port().unwrap().capture().is_capturing());

        // The port accepts the next print normally.
        dbg_print(&mut bus, &map, b"ok").unwrap();
        assert_eq!(sink.texts().last().unwrap(), "ok");
    }
}
