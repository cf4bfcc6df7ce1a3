//! Device 端到端集成测试
//!
//! 使用 MockSerialAdapter 模拟固件输出，验证命令分发、响应解释和床状态更新的完整流程。

use cradle_driver::{
    BedState, ConnectionState, Device, DeviceConfig, PipelineConfig, SideState,
};
use cradle_serial::MockSerialAdapter;
use std::time::{Duration, Instant};

fn fast_config() -> DeviceConfig {
    DeviceConfig {
        pipeline: PipelineConfig {
            queue_wait_ms: 5,
            command_pacing_ms: 1,
            read_poll_interval_ms: 1,
            join_timeout_ms: 500,
        },
        ..DeviceConfig::default()
    }
}

fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    cond()
}

/// 固件回显：UP 命令只确认一次
#[test]
fn test_bed_up_confirmed_end_to_end() {
    let mut confirmed = false;
    let mock = MockSerialAdapter::with_responder(move |cmd| {
        if cmd == "UP" && !confirmed {
            confirmed = true;
            vec!["CONFIRMED:UP".to_string()]
        } else {
            Vec::new()
        }
    });
    let device = Device::with_adapter(mock.clone(), fast_config()).unwrap();

    assert!(device.bed_up());
    assert!(wait_until(Duration::from_secs(2), || {
        device.get_bed_status()
            == BedState {
                left: SideState::Up,
                right: SideState::Up,
            }
    }));
    assert_eq!(mock.written_count("UP"), 1);
    assert_eq!(
        device.system_status().last_bed_confirmation.as_deref(),
        Some("UP")
    );
}

/// 命令按调用顺序逐条写出，每条以换行结尾
#[test]
fn test_commands_written_in_enqueue_order() {
    let mock = MockSerialAdapter::new();
    let device = Device::with_adapter(mock.clone(), fast_config()).unwrap();

    assert!(device.left_up());
    assert!(device.right_down());
    assert!(device.bed_stop());
    assert!(device.request_bed_status());

    assert!(wait_until(Duration::from_secs(2), || mock.written().len() == 5));
    assert_eq!(
        mock.written(),
        vec!["GET_STATUS", "LEFT_UP", "RIGHT_DOWN", "STOP", "GET_STATUS"]
    );
}

/// 单侧确认只改变对应一侧，STOP 确认两侧都停止
#[test]
fn test_bed_state_follows_confirmations() {
    let mock = MockSerialAdapter::new();
    let device = Device::with_adapter(mock.clone(), fast_config()).unwrap();

    mock.push_line("CONFIRMED:RIGHT_DOWN");
    assert!(wait_until(Duration::from_secs(2), || {
        device.get_bed_status().right == SideState::Down
    }));

    mock.push_line("CONFIRMED:LEFT_UP");
    assert!(wait_until(Duration::from_secs(2), || {
        device.get_bed_status().left == SideState::Up
    }));
    assert_eq!(device.get_bed_status().right, SideState::Down);

    mock.push_line("CONFIRMED:STOP");
    assert!(wait_until(Duration::from_secs(2), || {
        device.get_bed_status() == BedState::default()
    }));
}

/// 未确认的命令不改变已知状态；状态行被保留但不改变两侧状态
#[test]
fn test_unconfirmed_command_keeps_prior_state() {
    let mock = MockSerialAdapter::with_responder(|cmd| {
        if cmd == "GET_STATUS" {
            vec!["STATUS:LEFT=STOP,RIGHT=STOP".to_string()]
        } else {
            Vec::new()
        }
    });
    let device = Device::with_adapter(mock.clone(), fast_config()).unwrap();

    assert!(device.bed_down());
    assert!(wait_until(Duration::from_secs(2), || {
        mock.written_count("DOWN") == 1
    }));
    assert!(wait_until(Duration::from_secs(2), || {
        device.system_status().last_status_line.is_some()
    }));
    assert_eq!(device.get_bed_status(), BedState::default());
}

/// 读端故障：连接转为 Down，命令被拒绝；重连后恢复且床状态保留
#[test]
fn test_read_failure_marks_down_and_reconnect_restores() {
    let mock = MockSerialAdapter::new();
    let device = Device::with_adapter(mock.clone(), fast_config()).unwrap();

    mock.push_line("CONFIRMED:LEFT_DOWN");
    assert!(wait_until(Duration::from_secs(2), || {
        device.get_bed_status().left == SideState::Down
    }));

    mock.set_read_failure(true);
    assert!(wait_until(Duration::from_secs(2), || {
        device.connection_state() == ConnectionState::Down
    }));
    assert!(!device.bed_up());

    mock.set_read_failure(false);
    device.reconnect().unwrap();
    assert!(device.is_connected());
    assert_eq!(device.get_bed_status().left, SideState::Down);
    assert!(device.bed_up());
}

/// close 之后 drop 不会重复关闭或阻塞
#[test]
fn test_close_then_drop() {
    let mock = MockSerialAdapter::new();
    let device = Device::with_adapter(mock.clone(), fast_config()).unwrap();
    let start = Instant::now();
    device.close();
    drop(device);
    assert!(start.elapsed() < Duration::from_secs(2));
}
