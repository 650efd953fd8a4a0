use crate::snapshot::UartSnapshot;
use crate::transport::Transport;
use crate::{SimResult, SimulationError};
use bitflags::bitflags;
use std::any::Any;

/// Register offsets (PL011 layout, byte accesses only).
pub const UARTDR: u64 = 0x00;
pub const UARTFR: u64 = 0x18;
pub const UARTLCR_H: u64 = 0x2C;
pub const UARTCR: u64 = 0x30;

bitflags! {
    /// UARTFR bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct UartFlags: u8 {
        const BUSY = 1 << 3;
        const RXFE = 1 << 4;
        const TXFF = 1 << 5;
        const RXFF = 1 << 6;
        const TXFE = 1 << 7;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UartRegisters {
    /// Latest byte transferred in either direction.
    pub data: u8,
    pub flags: UartFlags,
    pub line_control: u8,
    pub control: u8,
}

impl Default for UartRegisters {
    fn default() -> Self {
        Self {
            data: 0,
            // TX completes immediately, so the TX FIFO always reads empty.
            flags: UartFlags::RXFE | UartFlags::TXFE,
            line_control: 0,
            control: 0,
        }
    }
}

/// Polled UART with a single staged receive byte.
/// Data register writes go straight out on the transport.
#[derive(Debug)]
pub struct Uart {
    regs: UartRegisters,
    staged: Option<u8>,
    transport: Box<dyn Transport>,
}

impl Uart {
    pub fn new(transport: Box<dyn Transport>) -> Self {
        Self {
            regs: UartRegisters::default(),
            staged: None,
            transport,
        }
    }

    pub fn registers(&self) -> &UartRegisters {
        &self.regs
    }

    pub fn configure(&mut self, line_control: u8, control: u8) {
        self.regs.line_control = line_control;
        self.regs.control = control;
        tracing::debug!(
            "UART: LCR_H={:#04x} CR={:#04x}",
            self.regs.line_control,
            self.regs.control
        );
    }

    /// Stages the next byte from the transport if none is pending and
    /// reports whether one is ready to read.
    pub fn poll_receive_ready(&mut self) -> bool {
        if self.staged.is_none() && self.transport.has_byte() {
            self.staged = self.transport.take_byte();
            if let Some(byte) = self.staged {
                tracing::trace!("UART: RX staged {:#04x}", byte);
            }
        }
        self.sync_flags();
        !self.regs.flags.contains(UartFlags::RXFE)
    }

    /// Consumes the staged byte. Callers must see `poll_receive_ready()`
    /// return true first.
    pub fn read_data(&mut self) -> SimResult<u8> {
        let byte = self.staged.take().ok_or(SimulationError::ReadWithNoData)?;
        self.regs.data = byte;
        self.sync_flags();
        Ok(byte)
    }

    pub fn write_data(&mut self, byte: u8) {
        self.regs.data = byte;
        self.transport.emit_byte(byte);
        tracing::trace!("UART: TX {:#04x}", byte);
    }

    pub fn snapshot(&self) -> UartSnapshot {
        UartSnapshot {
            data: self.regs.data,
            flags: self.regs.flags.bits(),
            line_control: self.regs.line_control,
            control: self.regs.control,
            rx_staged: self.staged.is_some(),
        }
    }

    fn sync_flags(&mut self) {
        self.regs.flags.set(UartFlags::RXFE, self.staged.is_none());
    }
}

impl crate::Peripheral for Uart {
    fn read(&mut self, offset: u64) -> SimResult<u8> {
        match offset {
            UARTDR => self.read_data(),
            UARTFR => {
                self.poll_receive_ready();
                Ok(self.regs.flags.bits())
            }
            UARTLCR_H => Ok(self.regs.line_control),
            UARTCR => Ok(self.regs.control),
            _ => Ok(0),
        }
    }

    fn write(&mut self, offset: u64, value: u8) -> SimResult<()> {
        match offset {
            UARTDR => self.write_data(value),
            UARTLCR_H => self.configure(value, self.regs.control),
            UARTCR => self.configure(self.regs.line_control, value),
            // UARTFR is read-only
            _ => {}
        }
        Ok(())
    }

    fn as_any(&self) -> Option<&dyn Any> {
        Some(self)
    }

    fn as_any_mut(&mut self) -> Option<&mut dyn Any> {
        Some(self)
    }
}
