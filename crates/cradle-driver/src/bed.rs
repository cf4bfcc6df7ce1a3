//! 床状态机
//!
//! 床的两侧状态只由固件的确认行（`CONFIRMED:<action>`）驱动：
//! 发出命令只代表"已入队"，确认到达前保留之前的已知状态，且没有超时回滚。

use crate::command::CommandQueue;
use arc_swap::ArcSwap;
use cradle_protocol::{BedAction, ClassifiedEvent, DeviceRequest};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// 单侧状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SideState {
    Up,
    Down,
    #[default]
    Stopped,
}

/// 床状态（左右两侧）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BedState {
    pub left: SideState,
    pub right: SideState,
}

impl BedState {
    /// 应用一条已确认的动作
    ///
    /// 整床动作同时更新两侧，单侧动作只更新对应一侧。
    pub fn apply(self, action: BedAction) -> Self {
        use BedAction::*;
        match action {
            Up => Self::both(SideState::Up),
            Down => Self::both(SideState::Down),
            Stop => Self::both(SideState::Stopped),
            LeftUp => Self {
                left: SideState::Up,
                ..self
            },
            LeftDown => Self {
                left: SideState::Down,
                ..self
            },
            LeftStop => Self {
                left: SideState::Stopped,
                ..self
            },
            RightUp => Self {
                right: SideState::Up,
                ..self
            },
            RightDown => Self {
                right: SideState::Down,
                ..self
            },
            RightStop => Self {
                right: SideState::Stopped,
                ..self
            },
        }
    }

    fn both(side: SideState) -> Self {
        Self {
            left: side,
            right: side,
        }
    }
}

struct BedShared {
    queue: CommandQueue,
    state: ArcSwap<BedState>,
    last_confirmation: ArcSwap<Option<String>>,
    last_status_line: ArcSwap<Option<String>>,
}

/// 床状态机
///
/// 可克隆：所有副本共享同一份状态（RX 线程写，API 线程无锁读）。
#[derive(Clone)]
pub struct BedMachine {
    shared: Arc<BedShared>,
}

impl BedMachine {
    pub fn new(queue: CommandQueue) -> Self {
        Self {
            shared: Arc::new(BedShared {
                queue,
                state: ArcSwap::from_pointee(BedState::default()),
                last_confirmation: ArcSwap::from_pointee(None),
                last_status_line: ArcSwap::from_pointee(None),
            }),
        }
    }

    /// 发出一个床动作，返回是否已入队
    pub fn issue(&self, action: BedAction) -> bool {
        let accepted = self.shared.queue.enqueue(action);
        if accepted {
            debug!("Bed command {} enqueued", action);
        }
        accepted
    }

    pub fn up(&self) -> bool {
        self.issue(BedAction::Up)
    }

    pub fn down(&self) -> bool {
        self.issue(BedAction::Down)
    }

    pub fn stop(&self) -> bool {
        self.issue(BedAction::Stop)
    }

    pub fn left_up(&self) -> bool {
        self.issue(BedAction::LeftUp)
    }

    pub fn left_down(&self) -> bool {
        self.issue(BedAction::LeftDown)
    }

    pub fn left_stop(&self) -> bool {
        self.issue(BedAction::LeftStop)
    }

    pub fn right_up(&self) -> bool {
        self.issue(BedAction::RightUp)
    }

    pub fn right_down(&self) -> bool {
        self.issue(BedAction::RightDown)
    }

    pub fn right_stop(&self) -> bool {
        self.issue(BedAction::RightStop)
    }

    /// 请求固件重发一行 STATUS
    pub fn request_status(&self) -> bool {
        self.shared.queue.enqueue(DeviceRequest::GetStatus)
    }

    /// 最近已知状态（不访问设备）
    pub fn status(&self) -> BedState {
        **self.shared.state.load()
    }

    /// 最近一次确认行中的动作名
    pub fn last_confirmation(&self) -> Option<String> {
        (**self.shared.last_confirmation.load()).clone()
    }

    /// 最近一行 STATUS
    pub fn last_status_line(&self) -> Option<String> {
        (**self.shared.last_status_line.load()).clone()
    }

    /// 处理路由过来的事件（由 RX 线程调用）
    pub fn handle_event(&self, event: ClassifiedEvent) {
        match event {
            ClassifiedEvent::Confirmation { action } => self.on_confirmation(action),
            ClassifiedEvent::StatusLine { raw } => {
                info!("Controller status: {}", raw);
                self.shared.last_status_line.store(Arc::new(Some(raw)));
            },
            other => debug!("Bed machine ignoring {:?}", other),
        }
    }

    fn on_confirmation(&self, name: String) {
        let action = BedAction::from_wire(&name);
        self.shared.last_confirmation.store(Arc::new(Some(name.clone())));

        let Some(action) = action else {
            warn!("Ignoring confirmation for unknown action {:?}", name);
            return;
        };

        let previous = self.status();
        let current = previous.apply(action);
        self.shared.state.store(Arc::new(current));
        if previous != current {
            info!(
                "Bed state: left={:?} right={:?} (confirmed {})",
                current.left, current.right, action
            );
        }
    }
}
