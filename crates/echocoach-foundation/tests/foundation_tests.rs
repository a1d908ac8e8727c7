use std::time::Duration;

use echocoach_foundation::{
    AppError, Clock, DecodeError, DeviceError, GateFlags, MonitorState, MonitorStateCell,
    RecoveryHint, TestClock,
};

#[test]
fn error_conversions_flow_into_app_error() {
    let device: AppError = DeviceError::Busy.into();
    assert!(matches!(device, AppError::Device(DeviceError::Busy)));

    let decode: AppError = DecodeError::Malformed("truncated header".into()).into();
    assert_eq!(decode.recovery_hint(), RecoveryHint::Rerecord);
    assert_eq!(decode.user_message(), "PROCESSING ERROR");
}

#[test]
fn no_error_is_fatal() {
    let errors = [
        AppError::Device(DeviceError::Disconnected),
        AppError::Network("upload timed out".into()),
        AppError::TooShort {
            got_ms: 20,
            min_ms: 100,
        },
    ];
    for err in errors {
        // Every hint is a recoverable action; there is no Fatal variant.
        assert!(matches!(
            err.recovery_hint(),
            RecoveryHint::Retry | RecoveryHint::Rerecord | RecoveryHint::Ignore
        ));
    }
}

#[test]
fn monitoring_gate_is_conjunction_of_all_flags() {
    for app_busy in [false, true] {
        for hidden in [false, true] {
            for session_active in [false, true] {
                let gates = GateFlags {
                    app_busy,
                    hidden,
                    session_active,
                };
                assert_eq!(
                    gates.permit_monitoring(),
                    !app_busy && !hidden && session_active
                );
            }
        }
    }
}

#[test]
fn monitor_state_cell_round_trip() {
    let cell = MonitorStateCell::new();
    assert_eq!(cell.get(), MonitorState::Stopped);
    cell.set(MonitorState::Running);
    assert_eq!(cell.get(), MonitorState::Running);
}

#[test]
fn test_clock_is_deterministic() {
    let clock = TestClock::new();
    let start = clock.now();
    clock.advance(Duration::from_millis(100));
    clock.advance(Duration::from_millis(100));
    assert_eq!((clock.now() - start).as_millis(), 200);
}
