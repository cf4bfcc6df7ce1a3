//! 连接器：每次建立 IO 会话时提供一对新的读写端
//!
//! 设备门面持有连接器而不是适配器本身，这样显式重连时可以重新打开串口。

use crate::DriverError;
use cradle_serial::{RxAdapter, SerialPortAdapter, SplittableAdapter, TxAdapter, discover_ports};
use std::time::Duration;
use tracing::info;

pub type BoxedRx = Box<dyn RxAdapter + Send>;
pub type BoxedTx = Box<dyn TxAdapter + Send>;

pub trait Connector: Send {
    /// 打开连接并返回读写两端
    fn connect(&mut self) -> Result<(BoxedRx, BoxedTx), DriverError>;

    /// 当前（或最近一次）使用的端口标识
    fn port(&self) -> Option<String>;
}

/// 真实串口连接器
///
/// 未指定路径时，每次连接前都会重新执行自动发现。
#[derive(Debug, Clone)]
pub struct SerialConnector {
    configured_port: Option<String>,
    resolved_port: Option<String>,
    baud_rate: u32,
    read_timeout: Duration,
    settle_delay: Duration,
}

impl SerialConnector {
    pub fn new(
        port: Option<String>,
        baud_rate: u32,
        read_timeout: Duration,
        settle_delay: Duration,
    ) -> Self {
        Self {
            resolved_port: port.clone(),
            configured_port: port,
            baud_rate,
            read_timeout,
            settle_delay,
        }
    }

    fn resolve_port(&mut self) -> Result<String, DriverError> {
        if let Some(port) = &self.configured_port {
            return Ok(port.clone());
        }
        let port = discover_ports()?
            .into_iter()
            .next()
            .ok_or(DriverError::NoPortFound)?;
        info!("Auto-detected controller port {}", port);
        self.resolved_port = Some(port.clone());
        Ok(port)
    }
}

impl Connector for SerialConnector {
    fn connect(&mut self) -> Result<(BoxedRx, BoxedTx), DriverError> {
        let port = self.resolve_port()?;
        let connection_error = |source| DriverError::Connection {
            port: port.clone(),
            source,
        };

        let mut adapter = SerialPortAdapter::open(&port, self.baud_rate, self.read_timeout)
            .map_err(connection_error)?;
        adapter.settle(self.settle_delay).map_err(connection_error)?;
        let (rx, tx) = adapter.split().map_err(connection_error)?;
        Ok((Box::new(rx), Box::new(tx)))
    }

    fn port(&self) -> Option<String> {
        self.resolved_port.clone()
    }
}

/// 基于可克隆适配器的连接器（每次连接拆分一个新副本）
///
/// 主要用于 `MockSerialAdapter`。
pub struct AdapterConnector<A> {
    adapter: A,
    label: String,
}

impl<A> AdapterConnector<A> {
    pub fn new(adapter: A, label: impl Into<String>) -> Self {
        Self {
            adapter,
            label: label.into(),
        }
    }
}

impl<A> Connector for AdapterConnector<A>
where
    A: SplittableAdapter + Clone + Send,
    A::RxAdapter: Send + 'static,
    A::TxAdapter: Send + 'static,
{
    fn connect(&mut self) -> Result<(BoxedRx, BoxedTx), DriverError> {
        let (rx, tx) = self.adapter.clone().split()?;
        Ok((Box::new(rx), Box::new(tx)))
    }

    fn port(&self) -> Option<String> {
        Some(self.label.clone())
    }
}
