use crate::memory::LinearMemory;
use crate::peripherals::debug_port::{DebugPort, MessageSink};
use crate::peripherals::uart::Uart;
use crate::transport::Transport;
use crate::{Peripheral, SimResult, SimulationError, WriteHook};
use anyhow::Context;
use sideband_config::{parse_size, PlatformConfig};

pub struct PeripheralEntry {
    pub name: String,
    pub base: u64,
    pub size: u64,
    pub dev: Box<dyn Peripheral>,
}

/// Write-only memory whose stores are also reported to a hook.
pub struct HookEntry {
    pub name: String,
    pub memory: LinearMemory,
    pub hook: Box<dyn WriteHook>,
}

pub struct SystemBus {
    pub ram: LinearMemory,
    pub peripherals: Vec<PeripheralEntry>,
    pub hooks: Vec<HookEntry>,
}

impl SystemBus {
    pub fn new(ram: LinearMemory) -> Self {
        Self {
            ram,
            peripherals: Vec::new(),
            hooks: Vec::new(),
        }
    }

    pub fn from_config(
        config: &PlatformConfig,
        transport: Box<dyn Transport>,
        sink: Box<dyn MessageSink>,
    ) -> anyhow::Result<Self> {
        let ram_size =
            parse_size(&config.data_memory.size).context("Failed to size data memory")?;
        let uart_size = parse_size(&config.uart.size).context("Failed to size UART window")?;

        let mut bus = Self::new(LinearMemory::new(
            ram_size as usize,
            config.data_memory.base,
        ));
        bus.add_peripheral(
            "uart",
            config.uart.base,
            uart_size,
            Box::new(Uart::new(transport)),
        );
        bus.add_write_hook(
            "dbg_mem",
            config.debug_port.base,
            2,
            Box::new(DebugPort::new(
                config.debug_port.base,
                config.debug_port.capacity,
                sink,
            )),
        );

        tracing::info!(
            "Bus: '{}' with UART at {:#x}, debug port at {:#x}",
            config.name,
            config.uart.base,
            config.debug_port.base
        );
        Ok(bus)
    }

    pub fn add_peripheral(&mut self, name: &str, base: u64, size: u64, dev: Box<dyn Peripheral>) {
        self.peripherals.push(PeripheralEntry {
            name: name.to_string(),
            base,
            size,
            dev,
        });
    }

    pub fn add_write_hook(&mut self, name: &str, base: u64, size: usize, hook: Box<dyn WriteHook>) {
        self.hooks.push(HookEntry {
            name: name.to_string(),
            memory: LinearMemory::new(size, base),
            hook,
        });
    }

    pub fn uart(&self) -> Option<&Uart> {
        self.peripherals
            .iter()
            .find_map(|p| p.dev.as_any()?.downcast_ref::<Uart>())
    }

    pub fn debug_port(&self) -> Option<&DebugPort> {
        self.hooks
            .iter()
            .find_map(|h| h.hook.as_any()?.downcast_ref::<DebugPort>())
    }
}

impl crate::Bus for SystemBus {
    fn read_u8(&mut self, addr: u64) -> SimResult<u8> {
        if let Some(val) = self.ram.read_u8(addr) {
            return Ok(val);
        }

        for p in &mut self.peripherals {
            if addr >= p.base && addr < p.base + p.size {
                return p.dev.read(addr - p.base);
            }
        }

        // Hooked regions are write-only.
        Err(SimulationError::MemoryViolation(addr))
    }

    fn write_u8(&mut self, addr: u64, value: u8) -> SimResult<()> {
        if self.ram.write_u8(addr, value) {
            return Ok(());
        }

        for p in &mut self.peripherals {
            if addr >= p.base && addr < p.base + p.size {
                return p.dev.write(addr - p.base, value);
            }
        }

        for h in &mut self.hooks {
            if h.memory.write_u8(addr, value) {
                tracing::trace!("Bus: {} <- {:#04x} at {:#x}", h.name, value, addr);
                return h.hook.on_write(addr, value);
            }
        }

        Err(SimulationError::MemoryViolation(addr))
    }
}
