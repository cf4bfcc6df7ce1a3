//! Builder 模式实现
//!
//! 提供链式构造 `Device` 实例的便捷方式。

use crate::config::{DeviceConfig, HeartRateConfig};
use crate::connector::SerialConnector;
use crate::device::Device;
use crate::error::DriverError;
use crate::pipeline::PipelineConfig;
use tracing::warn;

/// Device Builder（链式构造）
///
/// # Example
///
/// ```no_run
/// use cradle_driver::DeviceBuilder;
///
/// // 自动发现端口，默认 9600 波特率
/// let device = DeviceBuilder::new().build().unwrap();
///
/// // 指定端口；打不开时以离线模式返回
/// let device = DeviceBuilder::new()
///     .port("/dev/ttyUSB0")
///     .build_or_offline()
///     .unwrap();
/// if !device.is_connected() {
///     eprintln!("controller offline");
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct DeviceBuilder {
    config: DeviceConfig,
}

impl DeviceBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// 使用完整配置（后续链式调用会覆盖其中的字段）
    pub fn config(mut self, config: DeviceConfig) -> Self {
        self.config = config;
        self
    }

    /// 设置串口路径（可选，默认自动发现）
    pub fn port(mut self, port: impl Into<String>) -> Self {
        self.config.port = Some(port.into());
        self
    }

    /// 设置波特率（可选，默认 9600）
    pub fn baud_rate(mut self, baud_rate: u32) -> Self {
        self.config.baud_rate = baud_rate;
        self
    }

    /// 设置开机等待时间（毫秒）
    pub fn settle_delay_ms(mut self, settle_delay_ms: u64) -> Self {
        self.config.settle_delay_ms = settle_delay_ms;
        self
    }

    pub fn pipeline_config(mut self, pipeline: PipelineConfig) -> Self {
        self.config.pipeline = pipeline;
        self
    }

    pub fn heart_rate_config(mut self, heart_rate: HeartRateConfig) -> Self {
        self.config.heart_rate = heart_rate;
        self
    }

    fn connector(&self) -> SerialConnector {
        SerialConnector::new(
            self.config.port.clone(),
            self.config.baud_rate,
            self.config.read_timeout(),
            self.config.settle_delay(),
        )
    }

    /// 构建设备并打开连接
    ///
    /// # 错误
    /// - `DriverError::InvalidConfig`: 配置不合法
    /// - `DriverError::NoPortFound`: 未指定端口且没有发现候选设备
    /// - `DriverError::Connection`: 端口无法打开
    pub fn build(self) -> Result<Device, DriverError> {
        let connector = Box::new(self.connector());
        Device::with_connector(connector, self.config)
    }

    /// 构建设备；端口无法打开时返回离线设备而不是错误
    ///
    /// 离线设备的命令方法全部返回 `false`，之后可以调用
    /// [`Device::reconnect`] 重试。配置不合法仍然返回错误。
    pub fn build_or_offline(self) -> Result<Device, DriverError> {
        self.config.validate()?;
        let connector = Box::new(self.connector());
        let device = Device::offline(connector, self.config);
        if let Err(e) = device.reconnect() {
            warn!("Controller unavailable, continuing offline: {}", e);
        }
        Ok(device)
    }
}
