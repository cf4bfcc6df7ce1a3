//! 驱动层错误类型定义

use cradle_serial::SerialError;
use thiserror::Error;

/// 驱动层错误类型
///
/// 只在构造和显式重连时出现。运行期的预期故障（设备掉线、乱码）
/// 通过返回值（`false` / `None`）和内部计数器体现，不会以错误形式抛出。
#[derive(Error, Debug)]
pub enum DriverError {
    /// 串口无法打开
    #[error("Failed to open serial port {port}: {source}")]
    Connection {
        port: String,
        #[source]
        source: SerialError,
    },

    /// 串口层错误（拆分适配器等）
    #[error("Serial error: {0}")]
    Serial(#[from] SerialError),

    /// 未配置端口，且自动发现没有找到候选设备
    #[error("No Arduino serial port found")]
    NoPortFound,

    /// 设备未连接
    #[error("Device not connected")]
    NotConnected,

    /// 配置不合法
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// IO 线程错误
    #[error("IO thread error: {0}")]
    IoThread(String),
}
