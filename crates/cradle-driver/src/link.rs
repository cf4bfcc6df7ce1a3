//! 连接健康状态
//!
//! 串口的"是否可用"是唯一被多个线程同时修改的状态：
//! TX 线程写失败、RX 线程读失败、上层显式关闭都会改变它。
//! 这里用一个原子量表示，所有线程无锁读取。

use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU8, AtomicU32, Ordering};
use tracing::{error, info};

/// 连接状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum ConnectionState {
    /// IO 线程正常运行
    Connected = 0,
    /// 运行中发生 IO 故障，等待显式重连
    Down = 1,
    /// 从未成功打开
    Offline = 2,
    /// 已显式关闭
    Closed = 3,
}

impl ConnectionState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => ConnectionState::Connected,
            1 => ConnectionState::Down,
            2 => ConnectionState::Offline,
            _ => ConnectionState::Closed,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Connected => "connected",
            ConnectionState::Down => "down",
            ConnectionState::Offline => "offline",
            ConnectionState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// 连接健康状态（线程间共享）
#[derive(Debug)]
pub struct LinkState {
    state: AtomicU8,
    /// 本次会话中发生的 IO 错误次数
    io_errors: AtomicU32,
}

impl LinkState {
    pub fn new(initial: ConnectionState) -> Self {
        Self {
            state: AtomicU8::new(initial as u8),
            io_errors: AtomicU32::new(0),
        }
    }

    pub fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    pub fn io_errors(&self) -> u32 {
        self.io_errors.load(Ordering::Relaxed)
    }

    /// 新会话建立
    pub fn mark_connected(&self) {
        self.io_errors.store(0, Ordering::Relaxed);
        self.state
            .store(ConnectionState::Connected as u8, Ordering::Release);
        info!("Link is up");
    }

    /// IO 故障：只有处于 Connected 时才会转为 Down，
    /// 不会覆盖 Closed / Offline
    pub fn mark_down(&self, reason: &str) {
        self.io_errors.fetch_add(1, Ordering::Relaxed);
        if self
            .state
            .compare_exchange(
                ConnectionState::Connected as u8,
                ConnectionState::Down as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
        {
            error!("Link marked down: {}", reason);
        }
    }

    pub fn mark_offline(&self) {
        self.state
            .store(ConnectionState::Offline as u8, Ordering::Release);
    }

    pub fn mark_closed(&self) {
        self.state
            .store(ConnectionState::Closed as u8, Ordering::Release);
    }
}
