//! 命令定义和实现
//!
//! 每个命令独立执行：读取配置 -> 连接控制器 -> 执行操作 -> 输出 JSON -> 断开连接

pub mod bed;
pub mod config;
pub mod heart_rate;
pub mod monitor;
pub mod ports;
pub mod status;

pub use bed::BedCommand;
pub use heart_rate::HeartRateCommand;
pub use monitor::MonitorCommand;
pub use status::StatusCommand;

use crate::config::CliConfig;
use anyhow::{Context, Result};
use clap::Args;
use cradle_driver::{Device, DeviceBuilder};
use serde::Serialize;
use std::time::{Duration, Instant};

/// 连接参数（覆盖配置文件）
#[derive(Args, Debug, Clone, Default)]
pub struct ConnectionArgs {
    /// 串口路径（如 /dev/ttyACM0），缺省时自动发现
    #[arg(short, long, global = true)]
    pub port: Option<String>,

    /// 波特率
    #[arg(short, long, global = true)]
    pub baud: Option<u32>,
}

impl ConnectionArgs {
    /// 把命令行参数合并到配置上
    pub fn apply(&self, config: &mut CliConfig) {
        if let Some(port) = &self.port {
            config.device.port = Some(port.clone());
        }
        if let Some(baud) = self.baud {
            config.device.baud_rate = baud;
        }
    }
}

/// 打开设备
pub fn open_device(config: &CliConfig) -> Result<Device> {
    DeviceBuilder::new()
        .config(config.device.clone())
        .build()
        .context("Failed to connect to the bed controller")
}

/// 以缩进 JSON 输出到 stdout
pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// 轮询等待条件成立，超时返回 `false`
pub fn wait_for(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if cond() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        std::thread::sleep(Duration::from_millis(20));
    }
}
