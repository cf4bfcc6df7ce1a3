//! 设备门面
//!
//! 把床状态机和心率状态机聚合在一组与上层 API 词汇一致的方法之后，
//! 并管理 IO 会话（RX / TX 线程）的生命周期。

use crate::bed::{BedMachine, BedState};
use crate::command::{CommandQueue, OutboundCommand};
use crate::config::DeviceConfig;
use crate::connector::{AdapterConnector, Connector};
use crate::heart_rate::{HeartRateCallback, HeartRateMachine, HeartRateSnapshot, SubscriptionId};
use crate::link::{ConnectionState, LinkState};
use crate::pipeline::{EventRouter, rx_loop, tx_loop};
use crate::thread::JoinTimeout;
use crate::DriverError;
use cradle_protocol::{BedAction, DeviceRequest};
use cradle_serial::SplittableAdapter;
use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{JoinHandle, spawn};
use tracing::{error, info, warn};

/// 一次 IO 会话（一对 RX / TX 线程）
struct IoSession {
    is_running: Arc<AtomicBool>,
    /// drop 即通知 TX 线程退出
    shutdown_tx: Sender<()>,
    rx_thread: Option<JoinHandle<()>>,
    tx_thread: Option<JoinHandle<()>>,
}

/// 带重试的心率读数
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HeartRateReading {
    pub heart_rate: Option<u32>,
    pub retry_count: u32,
}

/// 系统状态快照（不访问设备）
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SystemStatus {
    pub connection: ConnectionState,
    pub port: Option<String>,
    pub bed: BedState,
    pub last_bed_confirmation: Option<String>,
    pub last_status_line: Option<String>,
    pub heart_rate: HeartRateSnapshot,
    pub pending_commands: usize,
}

/// 设备门面（对外 API）
///
/// 所有方法都只需要 `&self`，可以放进 `Arc` 在多个线程间共享。
/// 设备不可用时，命令方法返回 `false`、读数方法返回 `None`，不会 panic 或返回错误。
pub struct Device {
    config: DeviceConfig,
    link: Arc<LinkState>,
    queue: CommandQueue,
    /// 会话之间复用同一个队列
    cmd_rx: Receiver<OutboundCommand>,
    bed: BedMachine,
    heart_rate: HeartRateMachine,
    connector: Mutex<Box<dyn Connector>>,
    session: Mutex<Option<IoSession>>,
}

impl Device {
    /// 创建离线设备（不打开连接）
    pub(crate) fn offline(connector: Box<dyn Connector>, config: DeviceConfig) -> Self {
        let link = Arc::new(LinkState::new(ConnectionState::Offline));
        let (queue, cmd_rx) = CommandQueue::unbounded(link.clone());
        let bed = BedMachine::new(queue.clone());
        let heart_rate = HeartRateMachine::new(queue.clone(), config.heart_rate.clone());
        Self {
            config,
            link,
            queue,
            cmd_rx,
            bed,
            heart_rate,
            connector: Mutex::new(connector),
            session: Mutex::new(None),
        }
    }

    /// 使用任意可拆分适配器创建设备并立即建立 IO 会话
    ///
    /// 适配器需要可克隆，以便 [`reconnect`](Self::reconnect) 时拆分新的副本。
    ///
    /// # Example
    ///
    /// ```
    /// use cradle_driver::{Device, DeviceConfig};
    /// use cradle_serial::MockSerialAdapter;
    ///
    /// let mock = MockSerialAdapter::new();
    /// let device = Device::with_adapter(mock.clone(), DeviceConfig::default()).unwrap();
    /// assert!(device.is_connected());
    /// device.close();
    /// ```
    pub fn with_adapter<A>(adapter: A, config: DeviceConfig) -> Result<Self, DriverError>
    where
        A: SplittableAdapter + Clone + Send + 'static,
        A::RxAdapter: Send + 'static,
        A::TxAdapter: Send + 'static,
    {
        Self::with_connector(Box::new(AdapterConnector::new(adapter, "adapter")), config)
    }

    /// 使用连接器创建设备并立即建立 IO 会话
    pub fn with_connector(
        connector: Box<dyn Connector>,
        config: DeviceConfig,
    ) -> Result<Self, DriverError> {
        config.validate()?;
        let device = Self::offline(connector, config);
        device.open_session()?;
        Ok(device)
    }

    /// 打开新的 IO 会话（先拆除旧会话）
    fn open_session(&self) -> Result<(), DriverError> {
        let mut session = self.session.lock();
        if let Some(old) = session.take() {
            self.teardown(old);
        }

        let (rx, tx) = match self.connector.lock().connect() {
            Ok(pair) => pair,
            Err(e) => {
                self.link.mark_offline();
                return Err(e);
            },
        };

        // 上一个会话中未写出的命令不再发送
        let stale = self.cmd_rx.try_iter().count();
        if stale > 0 {
            warn!("Discarding {} unsent commands from previous session", stale);
        }

        let is_running = Arc::new(AtomicBool::new(true));
        let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded::<()>(0);
        self.link.mark_connected();

        let router = EventRouter::new(self.bed.clone(), self.heart_rate.clone());
        let pipeline = self.config.pipeline.clone();
        let is_running_rx = is_running.clone();
        let link_rx = self.link.clone();
        let rx_thread = spawn(move || {
            rx_loop(rx, router, pipeline, is_running_rx, link_rx);
        });

        let cmd_rx = self.cmd_rx.clone();
        let pipeline = self.config.pipeline.clone();
        let is_running_tx = is_running.clone();
        let link_tx = self.link.clone();
        let tx_thread = spawn(move || {
            tx_loop(tx, cmd_rx, shutdown_rx, pipeline, is_running_tx, link_tx);
        });

        *session = Some(IoSession {
            is_running,
            shutdown_tx,
            rx_thread: Some(rx_thread),
            tx_thread: Some(tx_thread),
        });
        drop(session);

        info!(
            "Device connected on {}",
            self.port().unwrap_or_else(|| "unknown port".to_string())
        );
        self.queue.enqueue(DeviceRequest::GetStatus);
        Ok(())
    }

    /// 停止 IO 线程（有界 join，超时只记录日志）
    fn teardown(&self, mut session: IoSession) {
        // Release: 所有之前的写入对看到 false 的线程可见
        session.is_running.store(false, Ordering::Release);
        drop(session.shutdown_tx);

        let join_timeout = self.config.pipeline.join_timeout();
        if let Some(handle) = session.rx_thread.take()
            && let Err(_e) = handle.join_timeout(join_timeout)
        {
            error!(
                "RX thread panicked or failed to shut down within {:?}",
                join_timeout
            );
        }
        if let Some(handle) = session.tx_thread.take()
            && let Err(_e) = handle.join_timeout(join_timeout)
        {
            error!(
                "TX thread panicked or failed to shut down within {:?}",
                join_timeout
            );
        }
    }

    /// 显式重连
    ///
    /// 拆除当前会话、丢弃未发送的命令、重新打开端口并重启 IO 线程。
    /// 子系统状态（床两侧状态、最近心率、订阅者）保留。
    pub fn reconnect(&self) -> Result<(), DriverError> {
        info!("Reconnecting to controller");
        self.open_session()
    }

    /// 关闭设备：停止心率轮询和 IO 线程
    ///
    /// 幂等，可重复调用。
    pub fn close(&self) {
        let session = self.session.lock().take();
        let was_closed = self.link.state() == ConnectionState::Closed;
        self.link.mark_closed();
        self.heart_rate.shutdown();
        if let Some(session) = session {
            self.teardown(session);
        }
        if !was_closed {
            info!("Device closed");
        }
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.link.state()
    }

    pub fn is_connected(&self) -> bool {
        self.link.is_connected()
    }

    pub fn port(&self) -> Option<String> {
        self.connector.lock().port()
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    pub fn bed(&self) -> &BedMachine {
        &self.bed
    }

    pub fn heart_rate(&self) -> &HeartRateMachine {
        &self.heart_rate
    }

    // === 床控制 ===

    pub fn bed_up(&self) -> bool {
        self.bed.up()
    }

    pub fn bed_down(&self) -> bool {
        self.bed.down()
    }

    pub fn bed_stop(&self) -> bool {
        self.bed.stop()
    }

    pub fn left_up(&self) -> bool {
        self.bed.left_up()
    }

    pub fn left_down(&self) -> bool {
        self.bed.left_down()
    }

    pub fn left_stop(&self) -> bool {
        self.bed.left_stop()
    }

    pub fn right_up(&self) -> bool {
        self.bed.right_up()
    }

    pub fn right_down(&self) -> bool {
        self.bed.right_down()
    }

    pub fn right_stop(&self) -> bool {
        self.bed.right_stop()
    }

    /// 按动作执行（供面部追踪等按枚举驱动的调用方使用）
    pub fn execute(&self, action: BedAction) -> bool {
        self.bed.issue(action)
    }

    pub fn get_bed_status(&self) -> BedState {
        self.bed.status()
    }

    /// 请求固件重发 STATUS 行
    pub fn request_bed_status(&self) -> bool {
        self.bed.request_status()
    }

    // === 心率 ===

    pub fn get_heart_rate(&self) -> Option<u32> {
        self.heart_rate.sample()
    }

    /// 读取心率，值未知时立即重试，最多 `max_retries` 次
    pub fn get_heart_rate_with_retry(&self, max_retries: u32) -> HeartRateReading {
        let mut heart_rate = self.heart_rate.sample();
        let mut retry_count = 0;
        while heart_rate.is_none() && retry_count < max_retries {
            retry_count += 1;
            warn!(
                "Heart rate is empty, retrying (attempt {}/{})",
                retry_count, max_retries
            );
            heart_rate = self.heart_rate.sample();
        }
        HeartRateReading {
            heart_rate,
            retry_count,
        }
    }

    pub fn subscribe_heart_rate<C>(&self, callback: C) -> SubscriptionId
    where
        C: HeartRateCallback + 'static,
    {
        self.heart_rate.subscribe(callback)
    }

    pub fn unsubscribe_heart_rate(&self, id: SubscriptionId) -> bool {
        self.heart_rate.unsubscribe(id)
    }

    /// 两个子系统的状态快照
    pub fn system_status(&self) -> SystemStatus {
        SystemStatus {
            connection: self.connection_state(),
            port: self.port(),
            bed: self.bed.status(),
            last_bed_confirmation: self.bed.last_confirmation(),
            last_status_line: self.bed.last_status_line(),
            heart_rate: self.heart_rate.snapshot(),
            pending_commands: self.queue.pending(),
        }
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        self.close();
    }
}
