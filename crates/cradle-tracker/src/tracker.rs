//! 自动面部追踪
//!
//! # 状态机
//!
//! ```text
//! Idle ──start()──> Scanning ──连续 N 次无脸──> Adjusting ──一步完成──> Scanning
//!                       │                           │
//!                       └────────stop()─────────────┴──> Stopped（床强制停止）
//! ```
//!
//! 扫描线程的所有等待（扫描间隔、步骤时长、稳定时间）都在停止通道上进行，
//! `stop()` 丢弃发送端后线程立即醒来。

use crate::camera::{BedControl, Camera, FaceDetector, Frame};
use crate::config::{TrackerConfig, TrackerConfigUpdate};
use crate::detector::OverlayMarkerDetector;
use crate::error::TrackerError;
use crate::sequence::{AdjustmentSequence, AdjustmentStep};
use cradle_driver::JoinTimeout;
use cradle_protocol::BedAction;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{JoinHandle, spawn};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// 停止时等待扫描线程退出的上限
pub const TRACKER_JOIN_TIMEOUT: Duration = Duration::from_secs(2);

/// 追踪器阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackerPhase {
    Idle,
    Scanning,
    Adjusting,
    Stopped,
}

/// 追踪器状态（字段与对外 API 输出一一对应）
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackerStatus {
    pub is_running: bool,
    pub scan_interval: f64,
    pub movement_delay: f64,
    pub face_detection_threshold: u32,
    pub no_face_count: u32,
    pub last_face_detected: bool,
    pub current_sequence_index: usize,
}

struct TrackerState {
    scan_interval: f64,
    movement_delay: f64,
    face_detection_threshold: u32,
    sequence: AdjustmentSequence,
    /// 每次替换序列加一，用于丢弃替换前触发的步骤的游标推进
    generation: u64,
    no_face_count: u32,
    last_face_detected: bool,
    phase: TrackerPhase,
}

impl TrackerState {
    fn status(&self, is_running: bool) -> TrackerStatus {
        TrackerStatus {
            is_running,
            scan_interval: self.scan_interval,
            movement_delay: self.movement_delay,
            face_detection_threshold: self.face_detection_threshold,
            no_face_count: self.no_face_count,
            last_face_detected: self.last_face_detected,
            current_sequence_index: self.sequence.cursor(),
        }
    }

    fn config(&self) -> TrackerConfig {
        TrackerConfig {
            scan_interval: self.scan_interval,
            movement_delay: self.movement_delay,
            face_detection_threshold: self.face_detection_threshold,
            adjustment_sequence: self.sequence.steps().to_vec(),
        }
    }
}

/// 一次触发的调整
#[derive(Debug, Clone, Copy)]
struct Trigger {
    step: AdjustmentStep,
    index: usize,
    generation: u64,
    movement_delay: Duration,
}

struct TrackerShared {
    camera: Arc<dyn Camera>,
    bed: Arc<dyn BedControl>,
    overlay: OverlayMarkerDetector,
    classifier: Mutex<Option<Arc<dyn FaceDetector>>>,
    is_running: AtomicBool,
    state: Mutex<TrackerState>,
}

struct Worker {
    /// drop 即通知扫描线程退出
    stop_tx: Sender<()>,
    handle: JoinHandle<()>,
}

/// 在停止通道上等待，返回是否收到停止信号
fn wait_or_stop(stop_rx: &Receiver<()>, duration: Duration) -> bool {
    !matches!(stop_rx.recv_timeout(duration), Err(RecvTimeoutError::Timeout))
}

impl TrackerShared {
    fn detect(&self, frame: Option<Frame>) -> bool {
        let Some(frame) = frame else {
            return false;
        };
        if self.camera.ai_detection_enabled() {
            return self.overlay.detect(&frame);
        }
        let classifier = self.classifier.lock().clone();
        classifier.is_some_and(|c| c.detect(&frame))
    }

    /// 扫描一帧，更新计数；达到阈值时返回需要执行的步骤
    fn scan_once(&self) -> Option<Trigger> {
        let present = self.detect(self.camera.frame());

        let mut state = self.state.lock();
        if present {
            state.no_face_count = 0;
            if !state.last_face_detected {
                info!("Face detected");
                state.last_face_detected = true;
            }
        } else {
            state.no_face_count = state.no_face_count.saturating_add(1);
            if state.last_face_detected {
                info!("No face detected");
                state.last_face_detected = false;
            }
        }

        if state.no_face_count < state.face_detection_threshold {
            return None;
        }
        info!(
            "No face detected for {} consecutive scans, adjusting bed position",
            state.no_face_count
        );
        state.phase = TrackerPhase::Adjusting;
        Some(Trigger {
            step: state.sequence.current(),
            index: state.sequence.cursor(),
            generation: state.generation,
            movement_delay: Duration::from_secs_f64(state.movement_delay),
        })
    }

    /// 执行一个调整步骤，返回是否在等待中收到停止信号
    fn adjust(&self, trigger: Trigger, stop_rx: &Receiver<()>) -> bool {
        let step = trigger.step;
        info!(
            "Executing adjustment step {}: {} for {:.1}s",
            trigger.index, step.action, step.duration
        );
        if !self.bed.execute(step.action) {
            warn!("Bed action {} was not sent, controller not connected", step.action);
        }

        let mut stopped = wait_or_stop(stop_rx, step.duration());
        if !stopped {
            if step.action != BedAction::Stop {
                debug!("Stopping bed movement after {}", step.action);
                self.bed.stop();
            }
            stopped = wait_or_stop(stop_rx, trigger.movement_delay);
        }

        let mut state = self.state.lock();
        if state.generation == trigger.generation {
            state.sequence.advance();
        }
        state.no_face_count = 0;
        if !stopped {
            state.phase = TrackerPhase::Scanning;
        }
        stopped
    }
}

fn scan_loop(shared: Arc<TrackerShared>, stop_rx: Receiver<()>) {
    info!("Face tracking loop started");

    while shared.is_running.load(Ordering::Acquire) {
        if let Some(trigger) = shared.scan_once()
            && shared.adjust(trigger, &stop_rx)
        {
            break;
        }

        let interval = Duration::from_secs_f64(shared.state.lock().scan_interval);
        if wait_or_stop(&stop_rx, interval) {
            break;
        }
    }

    info!("Face tracking loop exited");
}

/// 自动面部追踪器
///
/// 周期性检查相机画面中是否有人脸；连续多次没有人脸时按调整序列驱动床
/// 每次执行一步，试图让婴儿的脸重新回到画面中。
///
/// # Example
///
/// ```no_run
/// use cradle_driver::DeviceBuilder;
/// use cradle_tracker::{AutoFaceTracker, Camera, Frame, TrackerConfig};
/// use std::sync::Arc;
///
/// struct StillCamera;
///
/// impl Camera for StillCamera {
///     fn frame(&self) -> Option<Frame> {
///         Some(Frame::filled(640, 480, [0, 0, 0]))
///     }
///     fn is_running(&self) -> bool {
///         true
///     }
///     fn ai_detection_enabled(&self) -> bool {
///         true
///     }
/// }
///
/// let device = Arc::new(DeviceBuilder::new().build().unwrap());
/// let tracker =
///     AutoFaceTracker::new(Arc::new(StillCamera), device, TrackerConfig::default()).unwrap();
/// assert!(tracker.start());
/// tracker.stop();
/// ```
pub struct AutoFaceTracker {
    shared: Arc<TrackerShared>,
    worker: Mutex<Option<Worker>>,
}

impl AutoFaceTracker {
    /// 创建追踪器（不启动）
    ///
    /// # 错误
    /// 配置不合法时返回 `TrackerError`
    pub fn new(
        camera: Arc<dyn Camera>,
        bed: Arc<dyn BedControl>,
        config: TrackerConfig,
    ) -> Result<Self, TrackerError> {
        config.validate()?;
        let sequence = AdjustmentSequence::new(config.adjustment_sequence)?;
        let state = TrackerState {
            scan_interval: config.scan_interval,
            movement_delay: config.movement_delay,
            face_detection_threshold: config.face_detection_threshold,
            sequence,
            generation: 0,
            no_face_count: 0,
            last_face_detected: false,
            phase: TrackerPhase::Idle,
        };
        Ok(Self {
            shared: Arc::new(TrackerShared {
                camera,
                bed,
                overlay: OverlayMarkerDetector::default(),
                classifier: Mutex::new(None),
                is_running: AtomicBool::new(false),
                state: Mutex::new(state),
            }),
            worker: Mutex::new(None),
        })
    }

    /// 相机未启用 AI 检测时使用的人脸分类器
    pub fn set_classifier<D>(&self, detector: D)
    where
        D: FaceDetector + 'static,
    {
        *self.shared.classifier.lock() = Some(Arc::new(detector));
    }

    /// 启动追踪
    ///
    /// 已在运行、相机未运行或床控制器未连接时返回 `false`。
    pub fn start(&self) -> bool {
        let mut worker = self.worker.lock();
        if self.shared.is_running.load(Ordering::Acquire) {
            warn!("Auto face tracking is already running");
            return false;
        }
        if !self.shared.camera.is_running() {
            error!("Camera is not running, cannot start face tracking");
            return false;
        }
        if !self.shared.bed.is_connected() {
            error!("Bed controller is not connected, cannot start face tracking");
            return false;
        }
        if !self.shared.camera.ai_detection_enabled() && self.shared.classifier.lock().is_none() {
            warn!("AI detection is disabled and no classifier is set, every scan will miss");
        }

        {
            let mut state = self.shared.state.lock();
            state.no_face_count = 0;
            state.last_face_detected = false;
            state.phase = TrackerPhase::Scanning;
        }

        let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(0);
        self.shared.is_running.store(true, Ordering::Release);
        let shared = self.shared.clone();
        let handle = spawn(move || scan_loop(shared, stop_rx));
        *worker = Some(Worker { stop_tx, handle });

        info!("Auto face tracking started");
        true
    }

    /// 停止追踪并强制停止床
    ///
    /// 幂等；未运行时直接返回。
    pub fn stop(&self) {
        let worker = self.worker.lock().take();
        if !self.shared.is_running.swap(false, Ordering::AcqRel) {
            return;
        }

        if let Some(Worker { stop_tx, handle }) = worker {
            drop(stop_tx);
            if handle.join_timeout(TRACKER_JOIN_TIMEOUT).is_err() {
                error!(
                    "Face tracking thread did not stop within {:?}",
                    TRACKER_JOIN_TIMEOUT
                );
            }
        }

        if self.shared.bed.is_connected() && !self.shared.bed.stop() {
            warn!("Failed to send STOP while stopping face tracking");
        }
        self.shared.state.lock().phase = TrackerPhase::Stopped;
        info!("Auto face tracking stopped");
    }

    pub fn is_running(&self) -> bool {
        self.shared.is_running.load(Ordering::Acquire)
    }

    pub fn phase(&self) -> TrackerPhase {
        self.shared.state.lock().phase
    }

    pub fn status(&self) -> TrackerStatus {
        self.shared.state.lock().status(self.is_running())
    }

    /// 当前配置（包含调整序列）
    pub fn config(&self) -> TrackerConfig {
        self.shared.state.lock().config()
    }

    /// 运行期更新配置
    ///
    /// 只修改给出的字段；替换调整序列时游标重置为 0。
    /// 更新后的配置不合法时整体拒绝，原配置不变。
    pub fn update_config(&self, update: &TrackerConfigUpdate) -> Result<TrackerStatus, TrackerError> {
        let mut state = self.shared.state.lock();
        let next = update.apply_to(&state.config());
        next.validate()?;

        state.scan_interval = next.scan_interval;
        state.movement_delay = next.movement_delay;
        state.face_detection_threshold = next.face_detection_threshold;
        if update.adjustment_sequence.is_some() {
            state.sequence.replace(next.adjustment_sequence)?;
            state.generation += 1;
        }
        info!(
            "Face tracker configuration updated (scan {}s, delay {}s, threshold {}, {} steps)",
            state.scan_interval,
            state.movement_delay,
            state.face_detection_threshold,
            state.sequence.len()
        );
        Ok(state.status(self.is_running()))
    }
}

impl Drop for AutoFaceTracker {
    fn drop(&mut self) {
        self.stop();
    }
}
