//! 出站命令词汇
//!
//! 床动作使用封闭枚举表示，动作到命令文本的映射由 `match` 穷尽检查，
//! 不存在运行期的"未知动作"分支。

use crate::ProtocolError;
use crate::constants::{CMD_GET_HEART_RATE, CMD_GET_STATUS, LINE_TERMINATOR};
use std::fmt;
use std::str::FromStr;

/// 床动作
///
/// 整床动作（`Up`/`Down`/`Stop`）同时作用于左右两侧，
/// `Left*`/`Right*` 只作用于对应一侧。
///
/// 序列化为 snake_case（`"left_up"`），与面部追踪调整序列的配置格式一致；
/// 线上文本为大写下划线形式（`"LEFT_UP"`）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum BedAction {
    Up,
    Down,
    Stop,
    LeftUp,
    LeftDown,
    LeftStop,
    RightUp,
    RightDown,
    RightStop,
}

impl BedAction {
    /// 全部动作（固定顺序）
    pub const ALL: [BedAction; 9] = [
        BedAction::Up,
        BedAction::Down,
        BedAction::Stop,
        BedAction::LeftUp,
        BedAction::LeftDown,
        BedAction::LeftStop,
        BedAction::RightUp,
        BedAction::RightDown,
        BedAction::RightStop,
    ];

    /// 线上命令文本（不含行结束符）
    pub const fn wire_name(self) -> &'static str {
        match self {
            BedAction::Up => "UP",
            BedAction::Down => "DOWN",
            BedAction::Stop => "STOP",
            BedAction::LeftUp => "LEFT_UP",
            BedAction::LeftDown => "LEFT_DOWN",
            BedAction::LeftStop => "LEFT_STOP",
            BedAction::RightUp => "RIGHT_UP",
            BedAction::RightDown => "RIGHT_DOWN",
            BedAction::RightStop => "RIGHT_STOP",
        }
    }

    /// 从确认行中的动作名解析（精确匹配线上文本）
    ///
    /// 固件回显的动作名可能带空白，调用方应先 `trim()`。
    pub fn from_wire(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|action| action.wire_name() == name)
    }

    /// 是否为停止类动作
    pub const fn is_stop(self) -> bool {
        matches!(
            self,
            BedAction::Stop | BedAction::LeftStop | BedAction::RightStop
        )
    }
}

impl fmt::Display for BedAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

impl FromStr for BedAction {
    type Err = ProtocolError;

    /// 宽松解析：接受 `left_up`、`LEFT_UP`、`left-up` 等写法
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase().replace('-', "_");
        Self::from_wire(&normalized).ok_or_else(|| ProtocolError::UnknownAction(s.to_string()))
    }
}

/// 发往微控制器的请求
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceRequest {
    /// 床动作
    Bed(BedAction),
    /// 心率采样请求
    GetHeartRate,
    /// 状态行请求
    GetStatus,
}

impl DeviceRequest {
    /// 命令文本（不含行结束符）
    pub const fn as_str(&self) -> &'static str {
        match self {
            DeviceRequest::Bed(action) => action.wire_name(),
            DeviceRequest::GetHeartRate => CMD_GET_HEART_RATE,
            DeviceRequest::GetStatus => CMD_GET_STATUS,
        }
    }
}

impl From<BedAction> for DeviceRequest {
    fn from(action: BedAction) -> Self {
        DeviceRequest::Bed(action)
    }
}

impl fmt::Display for DeviceRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 确保命令以行结束符结尾
pub fn terminate_line(text: &str) -> String {
    let mut line = String::with_capacity(text.len() + 1);
    line.push_str(text);
    if !line.ends_with(LINE_TERMINATOR) {
        line.push(LINE_TERMINATOR);
    }
    line
}
