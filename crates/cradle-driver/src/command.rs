//! 出站命令队列
//!
//! 所有子系统共享同一个 FIFO 队列（微控制器只有一个输入流），
//! 由 TX 线程作为唯一写者按入队顺序逐条发送。

use crate::link::LinkState;
use cradle_protocol::DeviceRequest;
use crossbeam_channel::{Receiver, Sender};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, trace};

/// 出站命令
#[derive(Debug, Clone)]
pub struct OutboundCommand {
    pub request: DeviceRequest,
    /// 入队时间，用于记录排队延迟
    pub enqueued_at: Instant,
}

impl OutboundCommand {
    pub fn new(request: DeviceRequest) -> Self {
        Self {
            request,
            enqueued_at: Instant::now(),
        }
    }

    /// 命令文本（不含行结束符）
    pub fn text(&self) -> &'static str {
        self.request.as_str()
    }
}

/// 命令队列的发送端（可克隆，供各子系统共享）
#[derive(Debug, Clone)]
pub struct CommandQueue {
    tx: Sender<OutboundCommand>,
    link: Arc<LinkState>,
}

impl CommandQueue {
    /// 创建无界队列，返回发送端和接收端
    pub fn unbounded(link: Arc<LinkState>) -> (Self, Receiver<OutboundCommand>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        (Self { tx, link }, rx)
    }

    /// 入队一条命令
    ///
    /// 连接不可用时立即返回 `false`（不阻塞），否则追加到队尾并返回 `true`。
    /// 返回值只表示"已入队"，不表示微控制器已执行。
    pub fn enqueue(&self, request: impl Into<DeviceRequest>) -> bool {
        let request = request.into();
        if !self.link.is_connected() {
            debug!(
                "Dropping {} command: link is {}",
                request,
                self.link.state()
            );
            return false;
        }
        match self.tx.send(OutboundCommand::new(request)) {
            Ok(()) => {
                trace!("Enqueued {} ({} pending)", request, self.tx.len());
                true
            },
            Err(_) => {
                debug!("Dropping {} command: queue disconnected", request);
                false
            },
        }
    }

    pub fn link(&self) -> &Arc<LinkState> {
        &self.link
    }

    /// 队列中尚未发送的命令数
    pub fn pending(&self) -> usize {
        self.tx.len()
    }
}
