// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

/// Wire side of a UART: whatever terminal, socket or file feeds it.
pub trait Transport: std::fmt::Debug + Send {
    fn has_byte(&self) -> bool;
    fn take_byte(&mut self) -> Option<u8>;
    fn emit_byte(&mut self, byte: u8);
}

#[derive(Debug, Default)]
struct Wire {
    rx: VecDeque<u8>,
    tx: Vec<u8>,
}

/// In-memory transport. Clones share the same wire, so a harness can keep a
/// handle to feed input and inspect output after the UART takes ownership.
#[derive(Debug, Clone, Default)]
pub struct ScriptedTransport {
    wire: Arc<Mutex<Wire>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_input(bytes: &[u8]) -> Self {
        let transport = Self::new();
        transport.push_input(bytes);
        transport
    }

    pub fn push_input(&self, bytes: &[u8]) {
        self.wire().rx.extend(bytes.iter().copied());
    }

    pub fn pending_input(&self) -> usize {
        self.wire().rx.len()
    }

    /// Everything the UART has transmitted so far.
    pub fn output(&self) -> Vec<u8> {
        self.wire().tx.clone()
    }

    pub fn take_output(&self) -> Vec<u8> {
        std::mem::take(&mut self.wire().tx)
    }

    fn wire(&self) -> MutexGuard<'_, Wire> {
        // A panicked holder cannot leave the queues half-updated.
        self.wire.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Transport for ScriptedTransport {
    fn has_byte(&self) -> bool {
        !self.wire().rx.is_empty()
    }

    fn take_byte(&mut self) -> Option<u8> {
        self.wire().rx.pop_front()
    }

    fn emit_byte(&mut self, byte: u8) {
        self.wire().tx.push(byte);
    }
}
