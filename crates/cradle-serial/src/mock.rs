//! Mock 串口适配器
//!
//! 不依赖硬件，用于驱动层和上层的测试：
//!
//! - 入站：测试代码用 [`MockSerialAdapter::push_line`] 注入行，或注册应答器
//!   在收到某条命令后自动回复
//! - 出站：所有写入按行记录，可用 [`MockSerialAdapter::written`] 检查
//! - 故障注入：读/写失败开关
//!
//! `MockSerialAdapter` 可以 `clone`，所有副本共享同一份内部状态，
//! 因此测试代码在设备接管适配器之后仍能观察和控制它。

use crate::{RxAdapter, SerialDeviceError, SerialDeviceErrorKind, SerialError, SplittableAdapter, TxAdapter};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// 应答器：输入一条已写出的命令（不含 `\n`），返回需要回送的行
pub type Responder = Box<dyn FnMut(&str) -> Vec<String> + Send>;

#[derive(Default)]
struct MockShared {
    inbound: VecDeque<String>,
    written: Vec<String>,
    partial_write: Vec<u8>,
    responder: Option<Responder>,
    fail_reads: bool,
    fail_writes: bool,
    splits: usize,
}

/// Mock 串口适配器
#[derive(Clone, Default)]
pub struct MockSerialAdapter {
    shared: Arc<Mutex<MockShared>>,
}

impl MockSerialAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// 使用应答器创建
    ///
    /// # Example
    ///
    /// ```
    /// use cradle_serial::MockSerialAdapter;
    ///
    /// let mock = MockSerialAdapter::with_responder(|cmd| {
    ///     if cmd == "UP" { vec!["CONFIRMED:UP".to_string()] } else { vec![] }
    /// });
    /// ```
    pub fn with_responder<F>(responder: F) -> Self
    where
        F: FnMut(&str) -> Vec<String> + Send + 'static,
    {
        let mock = Self::new();
        mock.set_responder(responder);
        mock
    }

    pub fn set_responder<F>(&self, responder: F)
    where
        F: FnMut(&str) -> Vec<String> + Send + 'static,
    {
        self.lock().responder = Some(Box::new(responder));
    }

    /// 注入一行入站数据
    pub fn push_line(&self, line: impl Into<String>) {
        self.lock().inbound.push_back(line.into());
    }

    /// 已写出的全部命令（按顺序，不含 `\n`）
    pub fn written(&self) -> Vec<String> {
        self.lock().written.clone()
    }

    /// 某条命令被写出的次数
    pub fn written_count(&self, command: &str) -> usize {
        self.lock().written.iter().filter(|c| *c == command).count()
    }

    pub fn clear_written(&self) {
        self.lock().written.clear();
    }

    /// 读端返回设备断开错误
    pub fn set_read_failure(&self, fail: bool) {
        self.lock().fail_reads = fail;
    }

    /// 写端返回设备断开错误
    pub fn set_write_failure(&self, fail: bool) {
        self.lock().fail_writes = fail;
    }

    /// `split()` 被调用的次数（即建立过几次 IO 会话）
    pub fn split_count(&self) -> usize {
        self.lock().splits
    }

    fn lock(&self) -> MutexGuard<'_, MockShared> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SplittableAdapter for MockSerialAdapter {
    type RxAdapter = MockRxAdapter;
    type TxAdapter = MockTxAdapter;

    fn split(self) -> Result<(Self::RxAdapter, Self::TxAdapter), SerialError> {
        self.lock().splits += 1;
        Ok((
            MockRxAdapter {
                mock: self.clone(),
            },
            MockTxAdapter { mock: self },
        ))
    }
}

fn unplugged() -> SerialError {
    SerialError::Device(SerialDeviceError::new(
        SerialDeviceErrorKind::NoDevice,
        "mock device unplugged",
    ))
}

/// Mock 接收端
pub struct MockRxAdapter {
    mock: MockSerialAdapter,
}

impl RxAdapter for MockRxAdapter {
    fn bytes_available(&mut self) -> Result<usize, SerialError> {
        let shared = self.mock.lock();
        if shared.fail_reads {
            return Err(unplugged());
        }
        Ok(shared.inbound.iter().map(|line| line.len() + 1).sum())
    }

    fn read_line(&mut self) -> Result<String, SerialError> {
        let mut shared = self.mock.lock();
        if shared.fail_reads {
            return Err(unplugged());
        }
        shared.inbound.pop_front().ok_or(SerialError::Timeout)
    }
}

/// Mock 发送端
pub struct MockTxAdapter {
    mock: MockSerialAdapter,
}

impl TxAdapter for MockTxAdapter {
    fn write_all(&mut self, bytes: &[u8]) -> Result<(), SerialError> {
        let mut guard = self.mock.lock();
        let shared = &mut *guard;
        if shared.fail_writes {
            return Err(unplugged());
        }

        shared.partial_write.extend_from_slice(bytes);
        while let Some(pos) = shared.partial_write.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = shared.partial_write.drain(..=pos).collect();
            let command = String::from_utf8_lossy(&line[..pos]).into_owned();
            if let Some(responder) = shared.responder.as_mut() {
                shared.inbound.extend(responder(&command));
            }
            shared.written.push(command);
        }
        Ok(())
    }
}
