#[cfg(test)]
mod tests {
    use crate::firmware::echo::StepOutcome;
    use crate::metrics::SessionMetrics;
    use crate::peripherals::debug_port::CollectingSink;
    use crate::peripherals::uart::UartFlags;
    use crate::transport::ScriptedTransport;
    use crate::{Bus, Platform, SimulationError};
    use sideband_config::{BackoffConfig, PlatformConfig, StopReason};
    use std::sync::Arc;

    const UART_BASE: u64 = 0x0010_0000;
    const LOG_BUFF: u64 = 0x0020_0000;
    const LOG_TRIG: u64 = 0x0020_0001;

    fn config() -> PlatformConfig {
        let mut config = PlatformConfig::default();
        config.firmware.backoff = BackoffConfig::None;
        config
    }

    fn platform(input: &[u8]) -> (Platform, ScriptedTransport, CollectingSink) {
        let wire = ScriptedTransport::with_input(input);
        let sink = CollectingSink::new();
        let platform =
            Platform::from_config(&config(), Box::new(wire.clone()), Box::new(sink.clone()))
                .unwrap();
        (platform, wire, sink)
    }

    #[test]
    fn test_echo_session() {
        let (mut platform, wire, sink) = platform(b"hello\x04");
        let report = platform.run(100).unwrap();

        assert_eq!(report.stop_reason, StopReason::Terminated);
        assert_eq!(report.byte_count, 5);
        assert_eq!(report.polls, 6);
        assert_eq!(wire.output(), b"hello");
        assert_eq!(
            sink.texts(),
            vec![
                ">>> Starting echo program...",
                ">>> Ctrl-D received, terminating program...",
                ">>> Number of characters received: 5",
            ]
        );
    }

    #[test]
    fn test_sentinel_first() {
        let (mut platform, wire, sink) = platform(b"\x04");
        let report = platform.run(10).unwrap();

        assert_eq!(report.byte_count, 0);
        assert!(wire.output().is_empty());
        assert!(sink.texts().last().unwrap().ends_with("received: 0"));
    }

    #[test]
    fn test_multi_digit_count() {
        let input: Vec<u8> = (0..1234u32)
            .map(|i| b'a' + (i % 26) as u8)
            .chain(std::iter::once(0x04))
            .collect();
        let (mut platform, wire, sink) = platform(&input);
        let report = platform.run(10_000).unwrap();

        assert_eq!(report.byte_count, 1234);
        assert_eq!(wire.output(), &input[..1234]);
        assert_eq!(
            sink.texts().last().unwrap(),
            ">>> Number of characters received: 1234"
        );
    }

    #[test]
    fn test_run_stops_at_poll_budget() {
        let (mut platform, wire, sink) = platform(b"abc");
        let report = platform.run(10).unwrap();

        assert_eq!(report.stop_reason, StopReason::MaxPolls);
        assert_eq!(report.polls, 10);
        assert_eq!(report.byte_count, 3);
        assert_eq!(wire.output(), b"abc");
        // Only the start banner so far.
        assert_eq!(sink.texts().len(), 1);

        // Late input resumes the same session.
        wire.push_input(b"d\x04");
        let report = platform.run(10).unwrap();
        assert_eq!(report.stop_reason, StopReason::Terminated);
        assert_eq!(report.byte_count, 4);
        assert_eq!(sink.texts().len(), 3);
    }

    #[test]
    fn test_step_after_termination() {
        let (mut platform, _, sink) = platform(b"\x04");
        platform.start().unwrap();
        assert_eq!(platform.step().unwrap(), StepOutcome::Terminated);
        assert_eq!(platform.step().unwrap(), StepOutcome::Terminated);
        assert_eq!(sink.texts().len(), 3);
    }

    #[test]
    fn test_bus_routes_debug_writes() {
        let (mut platform, _, sink) = platform(b"");
        let bus = &mut platform.bus;
        bus.write_u8(LOG_TRIG, 0x00).unwrap();
        bus.write_u8(LOG_BUFF, b'H').unwrap();
        bus.write_u8(LOG_BUFF, b'i').unwrap();
        bus.write_u8(LOG_BUFF, 0x00).unwrap();
        bus.write_u8(LOG_TRIG, 0xFF).unwrap();
        assert_eq!(sink.texts(), vec!["Hi"]);

        // END without BEGIN surfaces through the bus as well.
        let err = bus.write_u8(LOG_TRIG, 0xFF).unwrap_err();
        assert!(matches!(err, SimulationError::ProtocolSequence(_)));
        assert_eq!(sink.texts().len(), 1);
    }

    #[test]
    fn test_debug_region_is_write_only() {
        let (mut platform, _, _) = platform(b"");
        assert_eq!(
            platform.bus.read_u8(LOG_BUFF),
            Err(SimulationError::MemoryViolation(LOG_BUFF))
        );
        assert_eq!(
            platform.bus.read_u8(LOG_TRIG),
            Err(SimulationError::MemoryViolation(LOG_TRIG))
        );
    }

    #[test]
    fn test_bus_memory_map() {
        let (mut platform, _, _) = platform(b"z");
        let bus = &mut platform.bus;

        bus.write_u8(0x0004_0010, 0xAB).unwrap();
        assert_eq!(bus.read_u8(0x0004_0010).unwrap(), 0xAB);

        let fr = UartFlags::from_bits_truncate(bus.read_u8(UART_BASE + 0x18).unwrap());
        assert!(!fr.contains(UartFlags::RXFE));
        assert_eq!(bus.read_u8(UART_BASE).unwrap(), b'z');
        assert_eq!(
            bus.read_u8(UART_BASE),
            Err(SimulationError::ReadWithNoData)
        );

        assert_eq!(
            bus.write_u8(0x9000_0000, 1),
            Err(SimulationError::MemoryViolation(0x9000_0000))
        );
        assert_eq!(
            bus.read_u8(0x0020_0002),
            Err(SimulationError::MemoryViolation(0x0020_0002))
        );
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = config();
        config.debug_port.capacity = 0;
        let result = Platform::from_config(
            &config,
            Box::new(ScriptedTransport::new()),
            Box::new(CollectingSink::new()),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_metrics_observer() {
        let (mut platform, wire, _) = platform(b"");
        let metrics = Arc::new(SessionMetrics::new());
        platform.observers.push(metrics.clone());

        platform.start().unwrap();
        assert_eq!(platform.step().unwrap(), StepOutcome::Idle);
        assert_eq!(platform.step().unwrap(), StepOutcome::Idle);
        wire.push_input(b"xy\x04");
        platform.run(10).unwrap();

        assert_eq!(metrics.get_polls(), 5);
        assert_eq!(metrics.get_idle_polls(), 2);
        assert_eq!(metrics.get_bytes_echoed(), 2);
        assert_eq!(metrics.get_sessions_completed(), 1);
        assert!(metrics.get_bytes_per_sec() >= 0.0);

        metrics.reset();
        assert_eq!(metrics.get_polls(), 0);
    }

    #[test]
    fn test_snapshot() {
        let (mut platform, _, _) = platform(b"ok\x04");
        platform.run(10).unwrap();

        let snapshot = platform.snapshot();
        let uart = snapshot.uart.as_ref().unwrap();
        assert_eq!(uart.line_control, 0x10);
        assert_eq!(uart.control, 0x11);
        assert_eq!(uart.data, 0x04);
        assert!(!uart.rx_staged);

        let debug = snapshot.debug_port.as_ref().unwrap();
        assert_eq!(debug.capacity, 128);
        assert!(!debug.capturing);
        assert_eq!(debug.messages_flushed, 3);

        assert_eq!(snapshot.session.byte_count, 2);
        assert!(snapshot.session.terminated);

        let json = snapshot.to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["session"]["byte_count"], 2);
        assert_eq!(value["debug_port"]["base"], 0x0020_0000);
    }
}
