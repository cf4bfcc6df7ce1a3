//! 设备配置
//!
//! 所有可调参数都是带 `Default` 的普通结构体，可以由上层从 TOML 反序列化。
//! 驱动层自身从不读取配置文件。

use crate::DriverError;
use crate::pipeline::PipelineConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 默认波特率（固件固定为 9600）
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// 设备配置
///
/// # Example
///
/// ```
/// use cradle_driver::DeviceConfig;
///
/// let config: DeviceConfig = toml::from_str(r#"
///     port = "/dev/ttyUSB0"
///     [heart_rate]
///     poll_interval_ms = 5000
/// "#).unwrap();
/// assert_eq!(config.baud_rate, 9600);
/// assert_eq!(config.heart_rate.poll_interval_ms, 5000);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// 串口路径，`None` 时自动发现
    pub port: Option<String>,
    pub baud_rate: u32,
    /// 串口单次读取超时（毫秒）
    pub read_timeout_ms: u64,
    /// 打开串口后等待固件启动的时间（毫秒）
    pub settle_delay_ms: u64,
    pub pipeline: PipelineConfig,
    pub heart_rate: HeartRateConfig,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            port: None,
            baud_rate: DEFAULT_BAUD_RATE,
            read_timeout_ms: 1000,
            settle_delay_ms: 2000,
            pipeline: PipelineConfig::default(),
            heart_rate: HeartRateConfig::default(),
        }
    }
}

impl DeviceConfig {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    /// 检查配置形状
    pub fn validate(&self) -> Result<(), DriverError> {
        if self.baud_rate == 0 {
            return Err(DriverError::InvalidConfig(
                "baud_rate must be positive".to_string(),
            ));
        }
        if self.read_timeout_ms == 0 {
            return Err(DriverError::InvalidConfig(
                "read_timeout_ms must be positive".to_string(),
            ));
        }
        if matches!(&self.port, Some(port) if port.trim().is_empty()) {
            return Err(DriverError::InvalidConfig("port must not be empty".to_string()));
        }
        self.pipeline.validate()?;
        self.heart_rate.validate()
    }
}

/// 心率监测配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeartRateConfig {
    /// 轮询间隔（毫秒）
    pub poll_interval_ms: u64,
    /// 连续失败上限，达到后暂停轮询
    pub failure_ceiling: u32,
    /// 请求发出后等待回复的宽限期（毫秒），超过即计为一次失败
    pub response_grace_ms: u64,
}

impl Default for HeartRateConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 10_000,
            failure_ceiling: 5,
            response_grace_ms: 500,
        }
    }
}

impl HeartRateConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn response_grace(&self) -> Duration {
        Duration::from_millis(self.response_grace_ms)
    }

    pub fn validate(&self) -> Result<(), DriverError> {
        if self.failure_ceiling == 0 {
            return Err(DriverError::InvalidConfig(
                "heart_rate.failure_ceiling must be at least 1".to_string(),
            ));
        }
        if self.poll_interval_ms == 0 {
            return Err(DriverError::InvalidConfig(
                "heart_rate.poll_interval_ms must be positive".to_string(),
            ));
        }
        if self.response_grace_ms > self.poll_interval_ms {
            return Err(DriverError::InvalidConfig(
                "heart_rate.response_grace_ms must not exceed poll_interval_ms".to_string(),
            ));
        }
        Ok(())
    }
}
