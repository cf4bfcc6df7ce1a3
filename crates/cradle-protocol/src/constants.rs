//! 协议常量定义
//!
//! 命令文本与响应前缀均来自床控制器固件的约定。

/// 命令行结束符（固件按行读取命令）
pub const LINE_TERMINATOR: char = '\n';

/// 请求一次心率采样
pub const CMD_GET_HEART_RATE: &str = "GET_HEART_RATE";

/// 请求固件重发一行 STATUS
pub const CMD_GET_STATUS: &str = "GET_STATUS";

/// 命令确认前缀，例如 `CONFIRMED:LEFT_UP`
pub const CONFIRMED_PREFIX: &str = "CONFIRMED:";

/// 未知命令回复前缀，例如 `UNKNOWN_CMD:FOO`
pub const UNKNOWN_CMD_PREFIX: &str = "UNKNOWN_CMD:";

/// 状态行标记（子串匹配）
pub const STATUS_MARKER: &str = "STATUS";

// === 心率标记（按优先级排列） ===

/// `HEART_RATE_DATA:72`
pub const HEART_RATE_DATA_MARKER: &str = "HEART_RATE_DATA:";

/// `[BPM] 72`
pub const BPM_TAG_MARKER: &str = "[BPM]";

/// `[HEART] 72`
pub const HEART_TAG_MARKER: &str = "[HEART]";

/// 嵌入在状态行中的 `HEART_RATE=72`
pub const HEART_RATE_ASSIGN_MARKER: &str = "HEART_RATE=";

/// 嵌入在状态行中的 `HEART=72`
pub const HEART_ASSIGN_MARKER: &str = "HEART=";
