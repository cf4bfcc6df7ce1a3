//! # Cradle Serial Transport Layer
//!
//! 串口传输抽象层：以"行"为单位的读写接口。
//!
//! - [`RxAdapter`] / [`TxAdapter`]: 读写分离后的两端，分别由 RX / TX 线程独占
//! - [`SplittableAdapter`]: 可拆分为读写两端的适配器
//! - [`SerialPortAdapter`]: 基于 `serialport` 的真实串口实现
//! - `mock` feature: [`MockSerialAdapter`]，用于无硬件测试

use thiserror::Error;

pub mod discovery;
pub mod port;

#[cfg(feature = "mock")]
pub mod mock;

pub use discovery::{ARDUINO_PORT_PATTERNS, discover_ports, is_arduino_port};
pub use port::{SerialPortAdapter, SerialPortRxAdapter, SerialPortTxAdapter};

#[cfg(feature = "mock")]
pub use mock::{MockRxAdapter, MockSerialAdapter, MockTxAdapter};

/// 串口层统一错误类型
#[derive(Error, Debug)]
pub enum SerialError {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Device Error: {0}")]
    Device(#[from] SerialDeviceError),
    /// 读超时（没有完整的一行可读），属于正常情况
    #[error("Read timeout")]
    Timeout,
    #[error("Port closed")]
    Closed,
}

impl SerialError {
    /// 是否为致命错误（设备断开、权限错误等），IO 线程遇到后应退出
    pub fn is_fatal(&self) -> bool {
        match self {
            SerialError::Timeout => false,
            SerialError::Device(e) => e.is_fatal(),
            SerialError::Io(e) => !matches!(
                e.kind(),
                std::io::ErrorKind::Interrupted | std::io::ErrorKind::WouldBlock
            ),
            SerialError::Closed => true,
        }
    }
}

/// 设备/后端错误的结构化分类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SerialDeviceErrorKind {
    Unknown,
    NotFound,
    NoDevice,
    AccessDenied,
    Busy,
    InvalidConfig,
    Backend,
}

/// 结构化设备错误
#[derive(Error, Debug, Clone)]
#[error("{kind:?}: {message}")]
pub struct SerialDeviceError {
    pub kind: SerialDeviceErrorKind,
    pub message: String,
}

impl SerialDeviceError {
    pub fn new(kind: SerialDeviceErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(
            self.kind,
            SerialDeviceErrorKind::NoDevice
                | SerialDeviceErrorKind::AccessDenied
                | SerialDeviceErrorKind::NotFound
        )
    }
}

impl From<String> for SerialDeviceError {
    fn from(message: String) -> Self {
        Self::new(SerialDeviceErrorKind::Unknown, message)
    }
}

impl From<&str> for SerialDeviceError {
    fn from(message: &str) -> Self {
        Self::new(SerialDeviceErrorKind::Unknown, message)
    }
}

impl From<serialport::Error> for SerialError {
    fn from(e: serialport::Error) -> Self {
        let kind = match e.kind() {
            serialport::ErrorKind::NoDevice => SerialDeviceErrorKind::NoDevice,
            serialport::ErrorKind::InvalidInput => SerialDeviceErrorKind::InvalidConfig,
            serialport::ErrorKind::Io(io_kind) => match io_kind {
                std::io::ErrorKind::NotFound => SerialDeviceErrorKind::NotFound,
                std::io::ErrorKind::PermissionDenied => SerialDeviceErrorKind::AccessDenied,
                std::io::ErrorKind::ResourceBusy => SerialDeviceErrorKind::Busy,
                std::io::ErrorKind::TimedOut => return SerialError::Timeout,
                _ => SerialDeviceErrorKind::Backend,
            },
            _ => SerialDeviceErrorKind::Unknown,
        };
        SerialError::Device(SerialDeviceError::new(kind, e.description))
    }
}

/// 接收端：按行读取
pub trait RxAdapter {
    /// 输入缓冲区中待读字节数（包括已缓存但尚未成行的部分）
    fn bytes_available(&mut self) -> Result<usize, SerialError>;

    /// 读取一行（不含行结束符）
    ///
    /// 在读超时内没有凑齐完整一行时返回 [`SerialError::Timeout`]，
    /// 已读到的部分会保留到下一次调用。
    fn read_line(&mut self) -> Result<String, SerialError>;
}

/// 发送端：写入原始字节
pub trait TxAdapter {
    fn write_all(&mut self, bytes: &[u8]) -> Result<(), SerialError>;
}

/// 可拆分为读写两端的适配器
pub trait SplittableAdapter {
    type RxAdapter: RxAdapter;
    type TxAdapter: TxAdapter;
    fn split(self) -> Result<(Self::RxAdapter, Self::TxAdapter), SerialError>;
}

impl<T: RxAdapter + ?Sized> RxAdapter for Box<T> {
    fn bytes_available(&mut self) -> Result<usize, SerialError> {
        (**self).bytes_available()
    }

    fn read_line(&mut self) -> Result<String, SerialError> {
        (**self).read_line()
    }
}

impl<T: TxAdapter + ?Sized> TxAdapter for Box<T> {
    fn write_all(&mut self, bytes: &[u8]) -> Result<(), SerialError> {
        (**self).write_all(bytes)
    }
}
