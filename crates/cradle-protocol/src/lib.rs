//! # Cradle Protocol
//!
//! 床控制器（Arduino）串口文本协议定义（无硬件依赖）
//!
//! ## 模块
//!
//! - `constants`: 协议常量（命令文本、响应前缀、心率标记）
//! - `action`: 出站命令词汇（`BedAction` / `DeviceRequest`）
//! - `classify`: 入站文本行分类（`ClassifiedEvent`）
//!
//! ## 协议特点
//!
//! 微控制器只输出松散结构的文本行，固件版本之间格式并不统一。
//! 本 crate 不追求字节级协议，而是对已知的几种响应形态做宽容解析：
//!
//! ```text
//! 出站:  "UP\n"  "LEFT_DOWN\n"  "GET_HEART_RATE\n"  "GET_STATUS\n"
//! 入站:  "CONFIRMED:UP"  "UNKNOWN_CMD:FOO"  "HEART_RATE_DATA:72"  "STATUS: HEART=72"
//! ```

pub mod action;
pub mod classify;
pub mod constants;

pub use action::{BedAction, DeviceRequest};
pub use classify::{ClassifiedEvent, HEART_RATE_MATCHERS, HeartRateMatcher, classify};
pub use constants::*;

use thiserror::Error;

/// 协议层错误类型
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// 未知的床动作名称
    #[error("Unknown bed action: {0}")]
    UnknownAction(String),
}
