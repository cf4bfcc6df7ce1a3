//! 面部追踪错误类型

use thiserror::Error;

/// 面部追踪错误
///
/// 只有配置形状错误会以 `Err` 返回；相机或设备不可用属于预期运行状况，
/// 由 `start()` 返回 `false` 表示。
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TrackerError {
    #[error("Invalid tracker configuration: {0}")]
    InvalidConfig(String),

    #[error("Adjustment sequence must contain at least one step")]
    EmptySequence,

    /// 帧数据长度与宽高不匹配
    #[error("Frame buffer holds {actual} bytes, expected {expected} for {width}x{height} BGR")]
    InvalidFrame {
        width: usize,
        height: usize,
        expected: usize,
        actual: usize,
    },

    #[error("Frame dimensions {width}x{height} overflow the buffer size")]
    FrameTooLarge { width: usize, height: usize },
}
