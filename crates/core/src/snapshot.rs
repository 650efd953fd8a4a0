use crate::firmware::echo::EchoSession;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PlatformSnapshot {
    pub uart: Option<UartSnapshot>,
    pub debug_port: Option<DebugPortSnapshot>,
    pub session: SessionSnapshot,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct UartSnapshot {
    pub data: u8,
    pub flags: u8,
    pub line_control: u8,
    pub control: u8,
    pub rx_staged: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DebugPortSnapshot {
    pub base: u64,
    pub capacity: usize,
    pub index: usize,
    pub capturing: bool,
    pub overflowed: bool,
    pub messages_flushed: u64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub byte_count: u32,
    pub terminated: bool,
}

impl From<&EchoSession> for SessionSnapshot {
    fn from(session: &EchoSession) -> Self {
        Self {
            byte_count: session.byte_count,
            terminated: session.is_terminated(),
        }
    }
}

impl PlatformSnapshot {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
