// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Bounded string helpers used by firmware to build debug messages.

use crate::{SimResult, SimulationError};
use sideband_config::MAX_DECIMAL_DIGITS;

/// Base-10 digits of a `u32`, most significant first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecimalDigits {
    buf: [u8; MAX_DECIMAL_DIGITS],
    start: usize,
}

impl DecimalDigits {
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[self.start..]
    }

    pub fn len(&self) -> usize {
        MAX_DECIMAL_DIGITS - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AsRef<[u8]> for DecimalDigits {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

/// Encodes `value` in decimal. Zero encodes as a single `0`.
pub fn encode_decimal(value: u32) -> DecimalDigits {
    let mut buf = [0u8; MAX_DECIMAL_DIGITS];
    let mut start = MAX_DECIMAL_DIGITS;
    let mut rest = value;

    // Fill from the right so no reversal pass is needed.
    loop {
        start -= 1;
        buf[start] = b'0' + (rest % 10) as u8;
        rest /= 10;
        if rest == 0 {
            break;
        }
    }

    DecimalDigits { buf, start }
}

/// Writes `a` followed by `b` into `out` and returns the combined length.
///
/// Fails with `BufferOverflow` before touching `out` if the result does not fit.
pub fn concat(out: &mut [u8], a: &[u8], b: &[u8]) -> SimResult<usize> {
    let needed = a.len() + b.len();
    if needed > out.len() {
        return Err(SimulationError::BufferOverflow {
            needed,
            capacity: out.len(),
        });
    }

    out[..a.len()].copy_from_slice(a);
    out[a.len()..needed].copy_from_slice(b);
    Ok(needed)
}
