//! 面部追踪端到端集成测试
//!
//! 追踪器驱动真实的 Device，Device 连接 MockSerialAdapter，
//! 检查调整步骤最终以命令行的形式写到串口上。

use cradle_driver::{BedAction, Device, DeviceConfig, PipelineConfig};
use cradle_serial::MockSerialAdapter;
use cradle_tracker::{
    AdjustmentStep, AutoFaceTracker, Camera, Frame, TrackerConfig, TrackerPhase,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// 画面里是否有人脸由测试切换
struct SwitchCamera {
    face: AtomicBool,
}

impl Camera for SwitchCamera {
    fn frame(&self) -> Option<Frame> {
        let mut frame = Frame::filled(80, 60, [40, 40, 40]);
        if self.face.load(Ordering::SeqCst) {
            frame.draw_rect(20, 10, 30, 30, [0, 255, 0]);
        }
        Some(frame)
    }

    fn is_running(&self) -> bool {
        true
    }

    fn ai_detection_enabled(&self) -> bool {
        true
    }
}

fn device(mock: &MockSerialAdapter) -> Arc<Device> {
    let config = DeviceConfig {
        pipeline: PipelineConfig {
            queue_wait_ms: 5,
            command_pacing_ms: 1,
            read_poll_interval_ms: 1,
            join_timeout_ms: 500,
        },
        ..DeviceConfig::default()
    };
    Arc::new(Device::with_adapter(mock.clone(), config).unwrap())
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

/// 丢失人脸后按序列写出命令，非 STOP 步骤后补发 STOP；stop() 再强制停一次
#[test]
fn test_lost_face_drives_bed_through_sequence() {
    let mock = MockSerialAdapter::new();
    let device = device(&mock);
    let camera = Arc::new(SwitchCamera {
        face: AtomicBool::new(false),
    });
    let config = TrackerConfig {
        scan_interval: 0.01,
        movement_delay: 0.01,
        face_detection_threshold: 2,
        adjustment_sequence: vec![
            AdjustmentStep::new(BedAction::LeftUp, 0.01),
            AdjustmentStep::new(BedAction::RightDown, 0.01),
        ],
    };
    let tracker = AutoFaceTracker::new(camera.clone(), device.clone(), config).unwrap();

    assert!(tracker.start());
    assert_eq!(tracker.phase(), TrackerPhase::Scanning);
    assert!(wait_until(Duration::from_secs(3), || {
        mock.written_count("RIGHT_DOWN") >= 1 && mock.written_count("STOP") >= 2
    }));

    // 人脸回来后不再触发新的调整
    camera.face.store(true, Ordering::SeqCst);
    assert!(wait_until(Duration::from_secs(2), || {
        tracker.status().last_face_detected
    }));
    std::thread::sleep(Duration::from_millis(50));
    let moves_before = mock.written_count("LEFT_UP") + mock.written_count("RIGHT_DOWN");
    std::thread::sleep(Duration::from_millis(100));
    assert_eq!(
        mock.written_count("LEFT_UP") + mock.written_count("RIGHT_DOWN"),
        moves_before
    );
    assert_eq!(tracker.status().no_face_count, 0);

    let stops_before = mock.written_count("STOP");
    tracker.stop();
    assert_eq!(tracker.phase(), TrackerPhase::Stopped);
    assert!(wait_until(Duration::from_secs(2), || {
        mock.written_count("STOP") == stops_before + 1
    }));

    let written = mock.written();
    let first_move = written.iter().position(|c| c == "LEFT_UP").unwrap();
    assert_eq!(written[first_move + 1], "STOP");
    assert_eq!(written[first_move + 2], "RIGHT_DOWN");
    assert_eq!(written[first_move + 3], "STOP");
}

/// 设备断开时拒绝启动
#[test]
fn test_start_refused_when_device_down() {
    let mock = MockSerialAdapter::new();
    let device = device(&mock);
    let camera = Arc::new(SwitchCamera {
        face: AtomicBool::new(true),
    });
    let tracker =
        AutoFaceTracker::new(camera, device.clone(), TrackerConfig::default()).unwrap();

    device.close();
    assert!(!tracker.start());
    assert!(!tracker.status().is_running);
}
