//! 基于 `serialport` 的真实串口适配器

use crate::{RxAdapter, SerialError, SplittableAdapter, TxAdapter};
use serialport::{ClearBuffer, SerialPort};
use std::io::{ErrorKind, Read, Write};
use std::time::Duration;
use tracing::{debug, info, trace};

/// 单行最大长度
///
/// 固件异常时可能持续输出不带换行的垃圾数据，超过此长度即强制成行，
/// 避免缓存无限增长。
const MAX_LINE_LEN: usize = 1024;

/// 串口适配器（未拆分）
pub struct SerialPortAdapter {
    port: Box<dyn SerialPort>,
    path: String,
}

impl SerialPortAdapter {
    /// 打开串口（8N1，无流控）
    ///
    /// `read_timeout` 是单次读取的阻塞上限，RX 线程依赖它定期检查运行标志。
    pub fn open(path: &str, baud_rate: u32, read_timeout: Duration) -> Result<Self, SerialError> {
        let port = serialport::new(path, baud_rate).timeout(read_timeout).open()?;
        info!("Opened serial port {} at {} baud", path, baud_rate);
        Ok(Self {
            port,
            path: path.to_string(),
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// 开机握手
    ///
    /// 打开串口会复位 Arduino，固件重新启动需要一段时间。
    /// 等待 `settle_delay` 后清空输入缓冲区，再读取一行可选的开机横幅
    /// （只记录日志，不解析）。
    pub fn settle(&mut self, settle_delay: Duration) -> Result<Option<String>, SerialError> {
        if !settle_delay.is_zero() {
            debug!("Waiting {:?} for the controller to boot", settle_delay);
            std::thread::sleep(settle_delay);
        }
        self.port.clear(ClearBuffer::Input)?;

        let mut pending = Vec::new();
        match read_line_from(self.port.as_mut(), &mut pending) {
            Ok(banner) => {
                info!("Controller banner: {}", banner);
                Ok(Some(banner))
            },
            Err(SerialError::Timeout) => {
                debug!("No boot banner received");
                Ok(None)
            },
            Err(e) => Err(e),
        }
    }
}

impl SplittableAdapter for SerialPortAdapter {
    type RxAdapter = SerialPortRxAdapter;
    type TxAdapter = SerialPortTxAdapter;

    /// 拆分为读写两端（底层句柄通过 `try_clone` 复制）
    fn split(self) -> Result<(Self::RxAdapter, Self::TxAdapter), SerialError> {
        let tx_port = self.port.try_clone()?;
        Ok((
            SerialPortRxAdapter {
                port: self.port,
                pending: Vec::new(),
            },
            SerialPortTxAdapter { port: tx_port },
        ))
    }
}

/// 串口接收端
pub struct SerialPortRxAdapter {
    port: Box<dyn SerialPort>,
    /// 已读取但尚未成行的字节
    pending: Vec<u8>,
}

impl RxAdapter for SerialPortRxAdapter {
    fn bytes_available(&mut self) -> Result<usize, SerialError> {
        let queued = self.port.bytes_to_read()? as usize;
        Ok(queued + self.pending.len())
    }

    fn read_line(&mut self) -> Result<String, SerialError> {
        read_line_from(self.port.as_mut(), &mut self.pending)
    }
}

/// 串口发送端
pub struct SerialPortTxAdapter {
    port: Box<dyn SerialPort>,
}

impl TxAdapter for SerialPortTxAdapter {
    fn write_all(&mut self, bytes: &[u8]) -> Result<(), SerialError> {
        self.port.write_all(bytes)?;
        self.port.flush()?;
        Ok(())
    }
}

/// 从 `pending` 中取出一行（不含 `\n`，并去掉行尾 `\r`）
fn take_line(pending: &mut Vec<u8>) -> Option<String> {
    let end = match pending.iter().position(|&b| b == b'\n') {
        Some(pos) => pos,
        None if pending.len() >= MAX_LINE_LEN => MAX_LINE_LEN,
        None => return None,
    };
    let mut line: Vec<u8> = pending.drain(..end).collect();
    if pending.first() == Some(&b'\n') {
        pending.remove(0);
    }
    if line.last() == Some(&b'\r') {
        line.pop();
    }
    // 固件偶尔输出非 UTF-8 字节，按有损方式解码
    Some(String::from_utf8_lossy(&line).into_owned())
}

/// 读取直到凑齐一行或读超时
fn read_line_from<R: Read + ?Sized>(
    reader: &mut R,
    pending: &mut Vec<u8>,
) -> Result<String, SerialError> {
    let mut buf = [0u8; 256];
    loop {
        if let Some(line) = take_line(pending) {
            trace!("Read line ({} bytes buffered)", pending.len());
            return Ok(line);
        }

        match reader.read(&mut buf) {
            Ok(0) => return Err(SerialError::Timeout),
            Ok(n) => pending.extend_from_slice(&buf[..n]),
            Err(e) if e.kind() == ErrorKind::TimedOut || e.kind() == ErrorKind::WouldBlock => {
                return Err(SerialError::Timeout);
            },
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(SerialError::Io(e)),
        }
    }
}
