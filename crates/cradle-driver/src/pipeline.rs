//! Pipeline IO 循环模块
//!
//! 负责后台 IO 线程：
//! - TX 线程（命令分发器）：串口的唯一写者，按入队顺序逐条发送
//! - RX 线程（响应解释器）：逐行读取、分类，并同步路由到对应的子系统状态机

use crate::DriverError;
use crate::bed::BedMachine;
use crate::command::OutboundCommand;
use crate::heart_rate::HeartRateMachine;
use crate::link::LinkState;
use cradle_protocol::action::terminate_line;
use cradle_protocol::{ClassifiedEvent, classify};
use cradle_serial::{RxAdapter, SerialError, TxAdapter};
use crossbeam_channel::{Receiver, RecvTimeoutError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, error, trace, warn};

/// Pipeline 配置
///
/// 控制 IO 线程的节奏。
///
/// # Example
///
/// ```
/// use cradle_driver::PipelineConfig;
///
/// // 使用默认配置（1s 出队等待，100ms 发送节流）
/// let config = PipelineConfig::default();
///
/// // 自定义配置
/// let config = PipelineConfig {
///     command_pacing_ms: 50,
///     ..PipelineConfig::default()
/// };
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// TX 线程出队的最长等待（毫秒），超时后重新检查运行标志
    pub queue_wait_ms: u64,
    /// 每次写入后的停顿（毫秒）
    /// 微控制器输入缓冲区很小，连续写入会丢命令
    pub command_pacing_ms: u64,
    /// RX 线程无数据时的轮询间隔（毫秒）
    pub read_poll_interval_ms: u64,
    /// 关闭时等待 IO 线程退出的上限（毫秒）
    pub join_timeout_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            queue_wait_ms: 1000,
            command_pacing_ms: 100,
            read_poll_interval_ms: 10,
            join_timeout_ms: 2000,
        }
    }
}

impl PipelineConfig {
    pub fn queue_wait(&self) -> Duration {
        Duration::from_millis(self.queue_wait_ms)
    }

    pub fn command_pacing(&self) -> Duration {
        Duration::from_millis(self.command_pacing_ms)
    }

    pub fn read_poll_interval(&self) -> Duration {
        Duration::from_millis(self.read_poll_interval_ms)
    }

    pub fn join_timeout(&self) -> Duration {
        Duration::from_millis(self.join_timeout_ms)
    }

    pub fn validate(&self) -> Result<(), DriverError> {
        if self.queue_wait_ms == 0 || self.read_poll_interval_ms == 0 {
            return Err(DriverError::InvalidConfig(
                "pipeline wait intervals must be positive".to_string(),
            ));
        }
        if self.join_timeout_ms == 0 {
            return Err(DriverError::InvalidConfig(
                "pipeline.join_timeout_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// 事件路由
///
/// 确认与状态行交给床状态机，其余交给心率状态机（见
/// [`ClassifiedEvent::is_heart_rate_domain`]）。每个事件只投递一次。
#[derive(Clone)]
pub struct EventRouter {
    bed: BedMachine,
    heart_rate: HeartRateMachine,
}

impl EventRouter {
    pub fn new(bed: BedMachine, heart_rate: HeartRateMachine) -> Self {
        Self { bed, heart_rate }
    }

    pub fn dispatch(&self, event: ClassifiedEvent) {
        if event.is_heart_rate_domain() {
            self.heart_rate.handle_event(event);
        } else {
            self.bed.handle_event(event);
        }
    }
}

/// RX 线程主循环（响应解释器）
///
/// # 参数
/// - `rx`: RX 适配器（只读）
/// - `router`: 事件路由
/// - `config`: Pipeline 配置
/// - `is_running`: 运行标志（用于生命周期联动）
/// - `link`: 连接健康状态
pub fn rx_loop(
    mut rx: impl RxAdapter,
    router: EventRouter,
    config: PipelineConfig,
    is_running: Arc<AtomicBool>,
    link: Arc<LinkState>,
) {
    let poll_interval = config.read_poll_interval();

    loop {
        // Acquire: If we see false, we must see all cleanup writes from other threads
        if !is_running.load(Ordering::Acquire) {
            trace!("RX thread: is_running flag is false, exiting");
            break;
        }

        let result = match rx.bytes_available() {
            Ok(0) => {
                std::thread::sleep(poll_interval);
                continue;
            },
            Ok(_) => rx.read_line(),
            Err(e) => Err(e),
        };

        let line = match result {
            Ok(line) => line,
            // 半行：已读部分保留在适配器中，下一轮继续
            Err(SerialError::Timeout) => continue,
            Err(e) => {
                error!("RX thread: serial read error: {}", e);
                if e.is_fatal() {
                    error!("RX thread: Fatal error detected, setting is_running = false");
                    link.mark_down(&format!("read failed: {e}"));
                    // Release: All writes before this are visible to threads that see the false value
                    is_running.store(false, Ordering::Release);
                    break;
                }
                std::thread::sleep(poll_interval);
                continue;
            },
        };

        if line.trim().is_empty() {
            trace!("RX thread: skipping blank line");
            continue;
        }

        debug!("RX: {}", line);
        let event = classify(&line);
        if let ClassifiedEvent::Unrecognized { raw } = &event {
            debug!("Unparseable response: {:?}", raw);
        }
        router.dispatch(event);
    }

    trace!("RX thread: loop exited");
}

/// TX 线程主循环（命令分发器）
///
/// 出队使用有界等待；每次写入后按 `command_pacing` 节流。
/// 写失败时标记连接断开并退出，不自动重试（重连由设备门面显式发起）。
///
/// # 参数
/// - `tx`: TX 适配器（只写）
/// - `cmd_rx`: 命令队列接收端
/// - `shutdown_rx`: 关闭信号（发送端被 drop 即表示关闭）
/// - `config`: Pipeline 配置
/// - `is_running`: 运行标志（用于生命周期联动）
/// - `link`: 连接健康状态
pub fn tx_loop(
    mut tx: impl TxAdapter,
    cmd_rx: Receiver<OutboundCommand>,
    shutdown_rx: Receiver<()>,
    config: PipelineConfig,
    is_running: Arc<AtomicBool>,
    link: Arc<LinkState>,
) {
    let queue_wait = config.queue_wait();
    let pacing = config.command_pacing();

    loop {
        // Acquire: If we see false, we must see all cleanup writes from other threads
        if !is_running.load(Ordering::Acquire) {
            trace!("TX thread: is_running flag is false, exiting");
            break;
        }

        let command = match crossbeam_channel::select! {
            recv(cmd_rx) -> msg => msg.map_err(|_| "command channel disconnected"),
            recv(shutdown_rx) -> _ => Err("shutdown signalled"),
            default(queue_wait) => {
                // 超时，继续循环检查 is_running
                continue;
            },
        } {
            Ok(command) => command,
            Err(reason) => {
                trace!("TX thread: {}", reason);
                break;
            },
        };

        let text = command.text();
        match tx.write_all(terminate_line(text).as_bytes()) {
            Ok(()) => {
                debug!(
                    "TX: {} (queued for {:?})",
                    text,
                    command.enqueued_at.elapsed()
                );
            },
            Err(e) => {
                error!("TX thread: Failed to write {}: {}", text, e);
                link.mark_down(&format!("write failed: {e}"));
                error!("TX thread: transmit failure, setting is_running = false");
                // Release: All writes before this are visible to threads that see the false value
                is_running.store(false, Ordering::Release);
                break;
            },
        }

        if !pacing.is_zero() {
            match shutdown_rx.recv_timeout(pacing) {
                Err(RecvTimeoutError::Timeout) => {},
                _ => {
                    trace!("TX thread: shutdown signalled during pacing");
                    break;
                },
            }
        }
    }

    if !cmd_rx.is_empty() {
        warn!("TX thread: exiting with {} unsent commands", cmd_rx.len());
    }
    trace!("TX thread: loop exited");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::CommandQueue;
    use crate::config::HeartRateConfig;
    use crate::link::ConnectionState;
    use cradle_protocol::{BedAction, DeviceRequest};
    use cradle_serial::{SerialDeviceError, SerialDeviceErrorKind};
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::thread::spawn;
    use std::time::Instant;

    /// 记录写入内容的 TX 适配器
    struct RecordingTx {
        written: Arc<Mutex<Vec<String>>>,
        fail_after: Option<usize>,
    }

    impl TxAdapter for RecordingTx {
        fn write_all(&mut self, bytes: &[u8]) -> Result<(), SerialError> {
            let mut written = self.written.lock().unwrap();
            if self.fail_after == Some(written.len()) {
                return Err(SerialError::Device(SerialDeviceError::new(
                    SerialDeviceErrorKind::NoDevice,
                    "unplugged",
                )));
            }
            written.push(String::from_utf8(bytes.to_vec()).unwrap());
            Ok(())
        }
    }

    /// 按预设行返回数据的 RX 适配器，数据耗尽后可选择报告致命错误
    struct ScriptedRx {
        lines: VecDeque<String>,
        fail_when_empty: bool,
    }

    impl RxAdapter for ScriptedRx {
        fn bytes_available(&mut self) -> Result<usize, SerialError> {
            if self.lines.is_empty() && self.fail_when_empty {
                return Err(SerialError::Closed);
            }
            Ok(self.lines.len())
        }

        fn read_line(&mut self) -> Result<String, SerialError> {
            self.lines.pop_front().ok_or(SerialError::Timeout)
        }
    }

    fn fast_config() -> PipelineConfig {
        PipelineConfig {
            queue_wait_ms: 5,
            command_pacing_ms: 1,
            read_poll_interval_ms: 1,
            join_timeout_ms: 500,
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

    #[test]
    fn test_pipeline_config_default() {
        let config = PipelineConfig::default();
        assert_eq!(config.queue_wait(), Duration::from_secs(1));
        assert_eq!(config.command_pacing(), Duration::from_millis(100));
        assert_eq!(config.read_poll_interval(), Duration::from_millis(10));
        assert_eq!(config.join_timeout(), Duration::from_secs(2));
        assert!(config.validate().is_ok());
    }

    /// 测试 TX 线程按入队顺序写出并追加行结束符
    #[test]
    fn test_tx_loop_preserves_order() {
        let link = Arc::new(LinkState::new(ConnectionState::Connected));
        let (queue, cmd_rx) = CommandQueue::unbounded(link.clone());
        let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded::<()>(0);
        let written = Arc::new(Mutex::new(Vec::new()));
        let is_running = Arc::new(AtomicBool::new(true));

        let tx = RecordingTx {
            written: written.clone(),
            fail_after: None,
        };
        let running = is_running.clone();
        let handle = spawn(move || tx_loop(tx, cmd_rx, shutdown_rx, fast_config(), running, link));

        queue.enqueue(BedAction::Up);
        queue.enqueue(DeviceRequest::GetHeartRate);
        queue.enqueue(BedAction::RightStop);

        assert!(wait_until(Duration::from_secs(2), || written.lock().unwrap().len() == 3));
        drop(shutdown_tx);
        handle.join().unwrap();

        assert_eq!(
            *written.lock().unwrap(),
            vec!["UP\n", "GET_HEART_RATE\n", "RIGHT_STOP\n"]
        );
        assert!(is_running.load(Ordering::Acquire));
    }

    /// 测试写失败时标记连接断开并停止
    #[test]
    fn test_tx_loop_halts_on_write_failure() {
        let link = Arc::new(LinkState::new(ConnectionState::Connected));
        let (queue, cmd_rx) = CommandQueue::unbounded(link.clone());
        let (_shutdown_tx, shutdown_rx) = crossbeam_channel::bounded::<()>(0);
        let written = Arc::new(Mutex::new(Vec::new()));
        let is_running = Arc::new(AtomicBool::new(true));

        let tx = RecordingTx {
            written: written.clone(),
            fail_after: Some(1),
        };
        let running = is_running.clone();
        let link_tx = link.clone();
        let handle =
            spawn(move || tx_loop(tx, cmd_rx, shutdown_rx, fast_config(), running, link_tx));

        queue.enqueue(BedAction::Up);
        queue.enqueue(BedAction::Down);
        handle.join().unwrap();

        assert_eq!(written.lock().unwrap().len(), 1);
        assert_eq!(link.state(), ConnectionState::Down);
        assert!(!is_running.load(Ordering::Acquire));
        // 断开后不再接受新命令
        assert!(!queue.enqueue(BedAction::Stop));
    }

    /// 测试 RX 线程分类并路由，读失败时退出
    #[test]
    fn test_rx_loop_routes_and_exits_on_fatal_error() {
        let link = Arc::new(LinkState::new(ConnectionState::Connected));
        let (queue, _cmd_rx) = CommandQueue::unbounded(link.clone());
        let bed = BedMachine::new(queue.clone());
        let heart_rate = HeartRateMachine::new(queue, HeartRateConfig::default());
        let router = EventRouter::new(bed.clone(), heart_rate.clone());

        let rx = ScriptedRx {
            lines: ["", "CONFIRMED:LEFT_UP", "HEART_RATE_DATA:75", "garbage"]
                .into_iter()
                .map(String::from)
                .collect(),
            fail_when_empty: true,
        };
        let is_running = Arc::new(AtomicBool::new(true));
        rx_loop(rx, router, fast_config(), is_running.clone(), link.clone());

        assert_eq!(bed.status().left, crate::bed::SideState::Up);
        let snapshot = heart_rate.snapshot();
        assert_eq!(snapshot.last_sample, Some(75));
        assert_eq!(snapshot.consecutive_failures, 1);
        assert_eq!(link.state(), ConnectionState::Down);
        assert!(!is_running.load(Ordering::Acquire));
    }
}
