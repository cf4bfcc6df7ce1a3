//! 心率状态机
//!
//! - `sample()`：发出一次 `GET_HEART_RATE`，在宽限期内等待回复，返回最近已知值
//! - `subscribe()` / `unsubscribe()`：推送订阅。第一个订阅者启动后台轮询，
//!   最后一个订阅者退订时停止轮询（引用计数式激活）
//! - 连续失败达到上限后轮询自行暂停，只有新的 `subscribe()` 会恢复并清零计数
//!
//! 失败的来源：发送失败、设备未连接、未知命令回复、无法识别的行，
//! 以及请求在宽限期内没有等到任何心率样本（每个请求最多计一次）。

use crate::command::CommandQueue;
use crate::config::HeartRateConfig;
use crate::thread::JoinTimeout;
use cradle_protocol::{ClassifiedEvent, DeviceRequest};
use crossbeam_channel::{RecvTimeoutError, Sender};
use parking_lot::{Condvar, Mutex};
use serde::Serialize;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{JoinHandle, spawn};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

const POLLER_JOIN_TIMEOUT: Duration = Duration::from_secs(2);

/// 心率订阅回调
///
/// 回调在轮询线程或 RX 线程上同步执行，应尽快返回。
/// 回调 panic 会被捕获并记录，不影响其他订阅者和轮询本身。
pub trait HeartRateCallback: Send + Sync {
    fn on_heart_rate(&self, bpm: u32);
}

impl<F> HeartRateCallback for F
where
    F: Fn(u32) + Send + Sync,
{
    fn on_heart_rate(&self, bpm: u32) {
        self(bpm)
    }
}

/// 订阅句柄，用于退订
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct SubscriptionId(u64);

/// 心率状态快照
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HeartRateSnapshot {
    pub last_sample: Option<u32>,
    pub consecutive_failures: u32,
    pub subscribers: usize,
    pub polling: bool,
}

#[derive(Default)]
struct Readings {
    last_sample: Option<u32>,
    consecutive_failures: u32,
    /// 尚未得到回复的请求
    pending_request: Option<u64>,
    next_request: u64,
}

struct Poller {
    stop_tx: Sender<()>,
    handle: JoinHandle<()>,
}

type Subscribers = Vec<(SubscriptionId, Arc<dyn HeartRateCallback>)>;

struct HeartRateShared {
    queue: CommandQueue,
    config: HeartRateConfig,
    readings: Mutex<Readings>,
    /// 待处理请求被回复（或判定失败）时通知
    response: Condvar,
    subscribers: Mutex<Subscribers>,
    next_subscription: AtomicU64,
    poller: Mutex<Option<Poller>>,
}

impl HeartRateShared {
    fn begin_request(&self) -> u64 {
        let mut readings = self.readings.lock();
        readings.next_request += 1;
        let id = readings.next_request;
        readings.pending_request = Some(id);
        id
    }

    /// 宽限期结束：请求仍未得到回复则计一次失败
    fn expire_request(&self, id: u64) {
        let expired = {
            let mut readings = self.readings.lock();
            if readings.pending_request == Some(id) {
                readings.pending_request = None;
                true
            } else {
                false
            }
        };
        if expired {
            self.record_failure("no response within grace window");
        }
    }

    fn record_failure(&self, reason: &str) {
        let count = {
            let mut readings = self.readings.lock();
            readings.pending_request = None;
            readings.consecutive_failures = readings.consecutive_failures.saturating_add(1);
            readings.consecutive_failures
        };
        self.response.notify_all();
        debug!(
            "Heart rate failure {}/{}: {}",
            count, self.config.failure_ceiling, reason
        );

        if count >= self.config.failure_ceiling {
            self.suspend_polling();
        }
    }

    fn on_sample(&self, bpm: u32) {
        {
            let mut readings = self.readings.lock();
            readings.last_sample = Some(bpm);
            readings.consecutive_failures = 0;
            readings.pending_request = None;
        }
        self.response.notify_all();
        info!("Heart rate updated: {} BPM", bpm);
        self.notify_subscribers(bpm);
    }

    fn notify_subscribers(&self, bpm: u32) {
        // 快照后再调用，回调中可以安全地订阅/退订
        let callbacks: Vec<Arc<dyn HeartRateCallback>> = self
            .subscribers
            .lock()
            .iter()
            .map(|(_, callback)| callback.clone())
            .collect();

        for callback in callbacks {
            if catch_unwind(AssertUnwindSafe(|| callback.on_heart_rate(bpm))).is_err() {
                error!("Heart rate subscriber panicked, continuing with remaining subscribers");
            }
        }
    }

    /// 达到失败上限：暂停轮询
    ///
    /// 可能在轮询线程自身中调用，因此只断开停止通道让线程自行退出，不 join。
    /// 持有 poller 锁重新读取计数：并发的 `subscribe()` 可能已清零并启动了新的轮询
    fn suspend_polling(&self) {
        let mut poller = self.poller.lock();
        let count = self.readings.lock().consecutive_failures;
        if count < self.config.failure_ceiling {
            return;
        }
        if let Some(poller) = poller.take() {
            warn!(
                "Heart rate polling suspended after {} consecutive failures",
                count
            );
            drop(poller.stop_tx);
        }
    }
}

/// 轮询线程主循环
fn poll_loop(shared: Arc<HeartRateShared>, stop_rx: crossbeam_channel::Receiver<()>) {
    let interval = shared.config.poll_interval();
    let grace = shared.config.response_grace();
    info!("Heart rate polling started (interval {:?})", interval);

    loop {
        let started = Instant::now();

        if !shared.queue.link().is_connected() {
            shared.record_failure("device not connected");
        } else {
            let id = shared.begin_request();
            if shared.queue.enqueue(DeviceRequest::GetHeartRate) {
                match stop_rx.recv_timeout(grace) {
                    Err(RecvTimeoutError::Timeout) => shared.expire_request(id),
                    _ => break,
                }
            } else {
                shared.record_failure("failed to send GET_HEART_RATE");
            }
        }

        let rest = interval.saturating_sub(started.elapsed());
        match stop_rx.recv_timeout(rest) {
            Err(RecvTimeoutError::Timeout) => continue,
            // 停止信号或发送端被丢弃（暂停）
            _ => break,
        }
    }

    info!("Heart rate polling stopped");
}

/// 心率状态机
///
/// 可克隆：所有副本共享同一份状态。
#[derive(Clone)]
pub struct HeartRateMachine {
    shared: Arc<HeartRateShared>,
}

impl HeartRateMachine {
    pub fn new(queue: CommandQueue, config: HeartRateConfig) -> Self {
        Self {
            shared: Arc::new(HeartRateShared {
                queue,
                config,
                readings: Mutex::new(Readings::default()),
                response: Condvar::new(),
                subscribers: Mutex::new(Vec::new()),
                next_subscription: AtomicU64::new(1),
                poller: Mutex::new(None),
            }),
        }
    }

    /// 请求一次采样
    ///
    /// 发出 `GET_HEART_RATE` 后最多等待一个宽限期，然后返回最近已知值
    /// （可能是旧值，也可能为 `None`）。不会返回错误。
    pub fn sample(&self) -> Option<u32> {
        let shared = &self.shared;
        let id = shared.begin_request();
        if !shared.queue.enqueue(DeviceRequest::GetHeartRate) {
            shared.record_failure("failed to send GET_HEART_RATE");
            return self.last_sample();
        }
        debug!("GET_HEART_RATE sent, waiting for response");

        let deadline = Instant::now() + shared.config.response_grace();
        {
            let mut readings = shared.readings.lock();
            while readings.pending_request == Some(id) {
                if shared
                    .response
                    .wait_until(&mut readings, deadline)
                    .timed_out()
                {
                    break;
                }
            }
        }
        shared.expire_request(id);
        self.last_sample()
    }

    pub fn last_sample(&self) -> Option<u32> {
        self.shared.readings.lock().last_sample
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.shared.readings.lock().consecutive_failures
    }

    /// 后台轮询是否在运行
    pub fn is_polling(&self) -> bool {
        self.shared.poller.lock().is_some()
    }

    pub fn subscriber_count(&self) -> usize {
        self.shared.subscribers.lock().len()
    }

    pub fn snapshot(&self) -> HeartRateSnapshot {
        let (last_sample, consecutive_failures) = {
            let readings = self.shared.readings.lock();
            (readings.last_sample, readings.consecutive_failures)
        };
        HeartRateSnapshot {
            last_sample,
            consecutive_failures,
            subscribers: self.subscriber_count(),
            polling: self.is_polling(),
        }
    }

    /// 订阅心率推送
    ///
    /// 轮询未运行时（第一个订阅者，或因失败暂停后）启动轮询并清零失败计数。
    pub fn subscribe<C>(&self, callback: C) -> SubscriptionId
    where
        C: HeartRateCallback + 'static,
    {
        let id = SubscriptionId(self.shared.next_subscription.fetch_add(1, Ordering::Relaxed));
        let mut subscribers = self.shared.subscribers.lock();
        subscribers.push((id, Arc::new(callback)));

        let mut poller = self.shared.poller.lock();
        if poller.is_none() {
            self.shared.readings.lock().consecutive_failures = 0;
            *poller = Some(self.spawn_poller());
        }
        debug!("Heart rate subscriber {:?} added ({} total)", id, subscribers.len());
        id
    }

    /// 退订，返回是否确实移除了订阅
    ///
    /// 最后一个订阅者退订时停止轮询。
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let (removed, poller) = {
            let mut subscribers = self.shared.subscribers.lock();
            let before = subscribers.len();
            subscribers.retain(|(sid, _)| *sid != id);
            let removed = subscribers.len() != before;
            let poller = if removed && subscribers.is_empty() {
                self.shared.poller.lock().take()
            } else {
                None
            };
            (removed, poller)
        };

        if let Some(poller) = poller {
            Self::stop_poller(poller);
        }
        removed
    }

    /// 停止轮询（保留订阅者），用于设备关闭
    pub fn shutdown(&self) {
        let poller = self.shared.poller.lock().take();
        if let Some(poller) = poller {
            Self::stop_poller(poller);
        }
    }

    /// 处理路由过来的事件（由 RX 线程调用）
    pub fn handle_event(&self, event: ClassifiedEvent) {
        match event {
            ClassifiedEvent::HeartRateSample { bpm } => self.shared.on_sample(bpm),
            ClassifiedEvent::UnknownCommand { original } => {
                warn!("Controller did not recognise command {:?}", original);
                self.shared.record_failure("unknown command reply");
            },
            ClassifiedEvent::Unrecognized { .. } => {
                self.shared.record_failure("unparseable response");
            },
            other => debug!("Heart rate machine ignoring {:?}", other),
        }
    }

    fn spawn_poller(&self) -> Poller {
        let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(0);
        let shared = self.shared.clone();
        let handle = spawn(move || poll_loop(shared, stop_rx));
        Poller { stop_tx, handle }
    }

    fn stop_poller(poller: Poller) {
        drop(poller.stop_tx);
        // 回调中退订时处于轮询线程自身，不能 join 自己
        if poller.handle.thread().id() == std::thread::current().id() {
            return;
        }
        if let Err(_e) = poller.handle.join_timeout(POLLER_JOIN_TIMEOUT) {
            error!(
                "Heart rate poller panicked or failed to shut down within {:?}",
                POLLER_JOIN_TIMEOUT
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::OutboundCommand;
    use crate::link::{ConnectionState, LinkState};
    use crossbeam_channel::Receiver;
    use std::sync::atomic::AtomicU32;

    fn machine(
        state: ConnectionState,
        config: HeartRateConfig,
    ) -> (HeartRateMachine, Receiver<OutboundCommand>) {
        let link = Arc::new(LinkState::new(state));
        let (queue, rx) = CommandQueue::unbounded(link);
        (HeartRateMachine::new(queue, config), rx)
    }

    fn quick_config() -> HeartRateConfig {
        HeartRateConfig {
            poll_interval_ms: 60_000,
            failure_ceiling: 5,
            response_grace_ms: 20,
        }
    }

    fn unrecognized() -> ClassifiedEvent {
        ClassifiedEvent::Unrecognized {
            raw: "???".to_string(),
        }
    }

    /// 测试无回复时每次 sample 恰好计一次失败
    #[test]
    fn test_sample_without_reply_counts_failures() {
        let (hr, rx) = machine(ConnectionState::Connected, quick_config());
        for _ in 0..3 {
            assert_eq!(hr.sample(), None);
        }
        assert_eq!(hr.consecutive_failures(), 3);
        assert_eq!(rx.try_iter().count(), 3);
    }

    #[test]
    fn test_sample_when_offline_counts_failure() {
        let (hr, rx) = machine(ConnectionState::Offline, quick_config());
        assert_eq!(hr.sample(), None);
        assert_eq!(hr.consecutive_failures(), 1);
        assert!(rx.is_empty());
    }

    /// 测试成功样本清零失败计数并推送给订阅者
    #[test]
    fn test_sample_event_resets_failures_and_notifies() {
        let (hr, _rx) = machine(ConnectionState::Connected, quick_config());
        hr.handle_event(unrecognized());
        hr.handle_event(ClassifiedEvent::UnknownCommand {
            original: "FOO".to_string(),
        });
        assert_eq!(hr.consecutive_failures(), 2);

        let seen = Arc::new(AtomicU32::new(0));
        let seen_cb = seen.clone();
        let id = hr.subscribe(move |bpm: u32| seen_cb.store(bpm, Ordering::SeqCst));
        hr.handle_event(ClassifiedEvent::HeartRateSample { bpm: 88 });

        assert_eq!(hr.last_sample(), Some(88));
        assert_eq!(hr.consecutive_failures(), 0);
        assert_eq!(seen.load(Ordering::SeqCst), 88);
        assert!(hr.unsubscribe(id));
    }

    /// 测试回调 panic 不影响其他订阅者
    #[test]
    fn test_panicking_subscriber_is_isolated() {
        let (hr, _rx) = machine(ConnectionState::Connected, quick_config());
        let calls = Arc::new(AtomicU32::new(0));
        let calls_cb = calls.clone();
        let a = hr.subscribe(|bpm: u32| {
            if bpm > 0 {
                panic!("subscriber bug");
            }
        });
        let b = hr.subscribe(move |_bpm: u32| {
            calls_cb.fetch_add(1, Ordering::SeqCst);
        });

        hr.handle_event(ClassifiedEvent::HeartRateSample { bpm: 70 });
        hr.handle_event(ClassifiedEvent::HeartRateSample { bpm: 71 });
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(hr.last_sample(), Some(71));

        hr.unsubscribe(a);
        hr.unsubscribe(b);
    }

    /// 测试订阅引用计数：第一个订阅启动轮询，最后一个退订停止轮询
    #[test]
    fn test_polling_follows_subscriber_count() {
        let (hr, _rx) = machine(ConnectionState::Connected, quick_config());
        assert!(!hr.is_polling());

        let a = hr.subscribe(|_bpm: u32| {});
        assert!(hr.is_polling());
        let b = hr.subscribe(|_bpm: u32| {});
        assert!(hr.is_polling());

        assert!(hr.unsubscribe(a));
        assert!(hr.is_polling());
        assert!(!hr.unsubscribe(a));

        assert!(hr.unsubscribe(b));
        assert!(!hr.is_polling());
        assert_eq!(hr.subscriber_count(), 0);
    }

    /// 测试失败上限暂停轮询，重新订阅后恢复并清零
    #[test]
    fn test_failure_ceiling_suspends_until_subscribe() {
        let (hr, _rx) = machine(ConnectionState::Connected, quick_config());
        let a = hr.subscribe(|_bpm: u32| {});
        // 等轮询线程的首个请求过了宽限期，避免与下面的计数交错
        std::thread::sleep(Duration::from_millis(60));
        hr.handle_event(ClassifiedEvent::HeartRateSample { bpm: 60 });

        for _ in 0..5 {
            hr.handle_event(unrecognized());
        }
        assert_eq!(hr.consecutive_failures(), 5);
        assert!(!hr.is_polling());
        assert_eq!(hr.subscriber_count(), 1);

        let b = hr.subscribe(|_bpm: u32| {});
        assert!(hr.is_polling());
        assert!(hr.consecutive_failures() <= 1);

        hr.unsubscribe(a);
        hr.unsubscribe(b);
        assert!(!hr.is_polling());
    }

    /// 测试过期的上限判断不会暂停订阅后新启动的轮询
    #[test]
    fn test_stale_ceiling_check_keeps_new_poller() {
        let (hr, _rx) = machine(ConnectionState::Connected, quick_config());
        for _ in 0..5 {
            hr.handle_event(unrecognized());
        }
        assert_eq!(hr.consecutive_failures(), 5);

        let id = hr.subscribe(|_bpm: u32| {});
        assert!(hr.is_polling());

        // 模拟在清零之前就判定达到上限的另一条路径
        hr.shared.suspend_polling();
        assert!(hr.is_polling());

        assert!(hr.unsubscribe(id));
        assert!(!hr.is_polling());
    }

    #[test]
    fn test_snapshot() {
        let (hr, _rx) = machine(ConnectionState::Connected, quick_config());
        hr.handle_event(ClassifiedEvent::HeartRateSample { bpm: 64 });
        assert_eq!(
            hr.snapshot(),
            HeartRateSnapshot {
                last_sample: Some(64),
                consecutive_failures: 0,
                subscribers: 0,
                polling: false,
            }
        );
    }
}
