// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Debug print sideband.
//!
//! Firmware without a console prints diagnostics through two write-only
//! byte registers:
//!
//! | Address    | Register | Behaviour                                        |
//! |------------|----------|--------------------------------------------------|
//! | `base + 0` | BUFFER   | Appends one byte while a capture is active       |
//! | `base + 1` | TRIGGER  | `0x00` begins a capture, `0xFF` ends and flushes |
//!
//! A message is the captured bytes up to the first `0x00`. Each completed
//! capture is handed to a [`MessageSink`] exactly once.

use crate::snapshot::DebugPortSnapshot;
use crate::{SimResult, SimulationError, WriteHook};
use std::any::Any;
use std::borrow::Cow;
use std::sync::{Arc, Mutex};

pub const TRIGGER_BEGIN: u8 = 0x00;
pub const TRIGGER_END: u8 = 0xFF;

/// A store into the debug window, decoded once from its address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteTarget {
    Buffer(u8),
    Trigger(u8),
}

impl WriteTarget {
    pub fn decode(base: u64, addr: u64, value: u8) -> Option<Self> {
        match addr.checked_sub(base)? {
            0 => Some(WriteTarget::Buffer(value)),
            1 => Some(WriteTarget::Trigger(value)),
            _ => None,
        }
    }
}

/// One flushed capture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebugMessage {
    pub text: Vec<u8>,
    /// False when END arrived before any `0x00` was captured.
    pub terminated: bool,
    /// True when appends were rejected because the buffer was full.
    pub overflowed: bool,
}

impl DebugMessage {
    pub fn text_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.text)
    }
}

/// What a single notification did to the channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebugEvent {
    Ignored,
    Began,
    /// BEGIN arrived mid-capture; the partial capture was dropped.
    Restarted { discarded: usize },
    Appended { index: usize },
    Flushed { len: usize },
}

pub trait MessageSink: std::fmt::Debug + Send {
    fn on_message(&mut self, message: &DebugMessage);
}

/// Logs each message the way the platform console prints them.
#[derive(Debug, Default)]
pub struct TracingSink;

impl MessageSink for TracingSink {
    fn on_message(&mut self, message: &DebugMessage) {
        if message.terminated {
            tracing::info!("(DBG_STR) {}", message.text_lossy());
        } else {
            tracing::warn!("(DBG_STR) {} [unterminated]", message.text_lossy());
        }
    }
}

/// Keeps every message; clones share the same list.
#[derive(Debug, Clone, Default)]
pub struct CollectingSink {
    messages: Arc<Mutex<Vec<DebugMessage>>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<DebugMessage> {
        self.messages
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn texts(&self) -> Vec<String> {
        self.messages()
            .iter()
            .map(|m| m.text_lossy().into_owned())
            .collect()
    }
}

impl MessageSink for CollectingSink {
    fn on_message(&mut self, message: &DebugMessage) {
        self.messages
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(message.clone());
    }
}

/// Fixed-capacity capture storage. The cursor never passes `capacity`.
#[derive(Debug)]
pub struct CaptureBuffer {
    data: Box<[u8]>,
    index: usize,
    capturing: bool,
    overflowed: bool,
}

impl CaptureBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            data: vec![0; capacity].into_boxed_slice(),
            index: 0,
            capturing: false,
            overflowed: false,
        }
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn is_capturing(&self) -> bool {
        self.capturing
    }

    pub fn has_overflowed(&self) -> bool {
        self.overflowed
    }

    /// Starts a new capture. Returns the length of a capture it replaced.
    fn begin(&mut self) -> Option<usize> {
        let discarded = self.capturing.then_some(self.index);
        self.index = 0;
        self.capturing = true;
        self.overflowed = false;
        discarded
    }

    fn append(&mut self, byte: u8) -> SimResult<usize> {
        if self.index >= self.data.len() {
            self.overflowed = true;
            return Err(SimulationError::BufferOverflow {
                needed: self.index + 1,
                capacity: self.data.len(),
            });
        }
        let at = self.index;
        self.data[at] = byte;
        self.index += 1;
        Ok(at)
    }

    /// Ends the capture. `None` if no capture was active.
    fn finish(&mut self) -> Option<DebugMessage> {
        if !self.capturing {
            return None;
        }
        self.capturing = false;

        // Only the bytes written during this capture are scanned.
        let live = &self.data[..self.index];
        let (text, terminated) = match live.iter().position(|&b| b == 0) {
            Some(end) => (live[..end].to_vec(), true),
            None => (live.to_vec(), false),
        };
        Some(DebugMessage {
            text,
            terminated,
            overflowed: self.overflowed,
        })
    }
}

/// Debug sideband channel, owned by the bus that routes the window to it.
#[derive(Debug)]
pub struct DebugPort {
    base: u64,
    capture: CaptureBuffer,
    sink: Box<dyn MessageSink>,
    messages_flushed: u64,
}

impl DebugPort {
    pub fn new(base: u64, capacity: usize, sink: Box<dyn MessageSink>) -> Self {
        Self {
            base,
            capture: CaptureBuffer::new(capacity),
            sink,
            messages_flushed: 0,
        }
    }

    pub fn base(&self) -> u64 {
        self.base
    }

    pub fn capture(&self) -> &CaptureBuffer {
        &self.capture
    }

    pub fn messages_flushed(&self) -> u64 {
        self.messages_flushed
    }

    pub fn notify_write(&mut self, addr: u64, value: u8) -> SimResult<DebugEvent> {
        let Some(target) = WriteTarget::decode(self.base, addr, value) else {
            return Ok(DebugEvent::Ignored);
        };

        match target {
            WriteTarget::Trigger(TRIGGER_BEGIN) => match self.capture.begin() {
                Some(discarded) => {
                    tracing::warn!(
                        "DebugPort: BEGIN during active capture, dropping {} bytes",
                        discarded
                    );
                    Ok(DebugEvent::Restarted { discarded })
                }
                None => {
                    tracing::debug!("DebugPort: capture started");
                    Ok(DebugEvent::Began)
                }
            },
            WriteTarget::Trigger(TRIGGER_END) => self.flush(),
            WriteTarget::Trigger(other) => {
                tracing::trace!("DebugPort: ignoring trigger value {:#04x}", other);
                Ok(DebugEvent::Ignored)
            }
            WriteTarget::Buffer(byte) if self.capture.is_capturing() => {
                let first_overflow = !self.capture.has_overflowed();
                match self.capture.append(byte) {
                    Ok(index) => Ok(DebugEvent::Appended { index }),
                    Err(e) => {
                        if first_overflow {
                            tracing::warn!("DebugPort: {}", e);
                        }
                        Err(e)
                    }
                }
            }
            WriteTarget::Buffer(_) => Ok(DebugEvent::Ignored),
        }
    }

    fn flush(&mut self) -> SimResult<DebugEvent> {
        let Some(message) = self.capture.finish() else {
            tracing::warn!("DebugPort: END without an active capture");
            return Err(SimulationError::ProtocolSequence(
                "END written to TRIGGER without an active capture",
            ));
        };

        self.sink.on_message(&message);
        self.messages_flushed += 1;

        let len = message.text.len();
        if message.terminated {
            Ok(DebugEvent::Flushed { len })
        } else {
            Err(SimulationError::UnterminatedMessage { len })
        }
    }

    pub fn snapshot(&self) -> DebugPortSnapshot {
        DebugPortSnapshot {
            base: self.base,
            capacity: self.capture.capacity(),
            index: self.capture.index(),
            capturing: self.capture.is_capturing(),
            overflowed: self.capture.has_overflowed(),
            messages_flushed: self.messages_flushed,
        }
    }
}

impl WriteHook for DebugPort {
    fn on_write(&mut self, addr: u64, value: u8) -> SimResult<()> {
        self.notify_write(addr, value).map(|_| ())
    }

    fn as_any(&self) -> Option<&dyn Any> {
        Some(self)
    }

    fn as_any_mut(&mut self) -> Option<&mut dyn Any> {
        Some(self)
    }
}
