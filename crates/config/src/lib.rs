use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Widest decimal rendering of a `u32` byte counter.
pub const MAX_DECIMAL_DIGITS: usize = 10;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct MemoryRange {
    pub base: u64,
    pub size: String, // e.g. "64 KiB"
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct DebugPortConfig {
    /// BUFFER lives at `base`, TRIGGER at `base + 1`.
    pub base: u64,
    pub capacity: usize,
}

impl Default for DebugPortConfig {
    fn default() -> Self {
        Self {
            base: 0x0020_0000,
            capacity: 128,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackoffConfig {
    None,
    Spin { iterations: u32 },
    Sleep { micros: u64 },
}

impl Default for BackoffConfig {
    fn default() -> Self {
        BackoffConfig::Spin { iterations: 100 }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct FirmwareConfig {
    pub sentinel: u8,
    pub line_control: u8,
    pub control: u8,
    pub start_banner: String,
    pub terminate_banner: String,
    pub summary_prefix: String,
    pub backoff: BackoffConfig,
}

impl Default for FirmwareConfig {
    fn default() -> Self {
        Self {
            sentinel: 0x04, // Ctrl-D
            line_control: 0x10,
            control: 0x11,
            start_banner: ">>> Starting echo program...".to_string(),
            terminate_banner: ">>> Ctrl-D received, terminating program...".to_string(),
            summary_prefix: ">>> Number of characters received: ".to_string(),
            backoff: BackoffConfig::default(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Limits {
    pub max_polls: u64,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_polls: 1_000_000,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct PlatformConfig {
    pub name: String,
    pub data_memory: MemoryRange,
    pub uart: MemoryRange,
    pub debug_port: DebugPortConfig,
    pub firmware: FirmwareConfig,
    pub limits: Limits,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            name: "cortex-m3-echo".to_string(),
            data_memory: MemoryRange {
                base: 0x0004_0000,
                size: "64 KiB".to_string(),
            },
            uart: MemoryRange {
                base: 0x0010_0000,
                size: "4 KiB".to_string(),
            },
            debug_port: DebugPortConfig::default(),
            firmware: FirmwareConfig::default(),
            limits: Limits::default(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    Terminated,
    MaxPolls,
}

impl PlatformConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let f = std::fs::File::open(&path)
            .with_context(|| format!("Failed to open platform config at {:?}", path.as_ref()))?;
        let config: Self =
            serde_yaml::from_reader(f).context("Failed to parse Platform Config YAML")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let ram_size = parse_size(&self.data_memory.size).context("Invalid 'data_memory.size'")?;
        let uart_size = parse_size(&self.uart.size).context("Invalid 'uart.size'")?;
        if ram_size == 0 || uart_size == 0 {
            anyhow::bail!("Memory regions must have a non-zero size");
        }

        let debug = (self.debug_port.base, 2);
        if overlaps(debug, (self.uart.base, uart_size)) {
            anyhow::bail!(
                "Debug port window at {:#x} overlaps the UART window at {:#x}",
                self.debug_port.base,
                self.uart.base
            );
        }
        if overlaps(debug, (self.data_memory.base, ram_size)) {
            anyhow::bail!(
                "Debug port window at {:#x} overlaps data memory at {:#x}",
                self.debug_port.base,
                self.data_memory.base
            );
        }

        if self.debug_port.capacity == 0 {
            anyhow::bail!("Debug port 'capacity' must be greater than zero");
        }

        // Every printed message carries a trailing NUL inside the capture buffer.
        let capacity = self.debug_port.capacity;
        for (field, text) in [
            ("start_banner", &self.firmware.start_banner),
            ("terminate_banner", &self.firmware.terminate_banner),
        ] {
            check_message(field, text, 0, capacity)?;
        }
        check_message(
            "summary_prefix",
            &self.firmware.summary_prefix,
            MAX_DECIMAL_DIGITS,
            capacity,
        )?;

        if self.limits.max_polls == 0 {
            anyhow::bail!("Limit 'max_polls' must be greater than zero");
        }

        Ok(())
    }
}

fn check_message(field: &str, text: &str, reserved: usize, capacity: usize) -> Result<()> {
    if text.bytes().any(|b| b == 0) {
        anyhow::bail!("Firmware '{}' must not contain NUL bytes", field);
    }
    let needed = text.len() + reserved + 1;
    if needed > capacity {
        anyhow::bail!(
            "Firmware '{}' needs {} bytes but the debug capture capacity is {}",
            field,
            needed,
            capacity
        );
    }
    Ok(())
}

fn overlaps(a: (u64, u64), b: (u64, u64)) -> bool {
    a.0 < b.0.saturating_add(b.1) && b.0 < a.0.saturating_add(a.1)
}

pub fn parse_size(size_str: &str) -> Result<u64> {
    use human_size::{Byte, Size, SpecificSize};
    let s: Size = size_str
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid size format: {}", e))?;
    let bytes: SpecificSize<Byte> = s.into();
    Ok(bytes.value() as u64)
}
