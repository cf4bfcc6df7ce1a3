//! 系统状态查询

use super::{open_device, print_json, wait_for};
use crate::config::CliConfig;
use anyhow::Result;
use clap::Args;
use std::time::Duration;

/// 状态查询参数
#[derive(Args, Debug)]
pub struct StatusCommand {
    /// 等待固件 STATUS 行的时间（毫秒）
    #[arg(long, default_value_t = 1000)]
    pub wait_ms: u64,
}

impl StatusCommand {
    pub fn execute(&self, config: &CliConfig) -> Result<()> {
        let device = open_device(config)?;
        if !wait_for(Duration::from_millis(self.wait_ms), || {
            device.system_status().last_status_line.is_some()
        }) {
            tracing::warn!("Controller did not report STATUS within {} ms", self.wait_ms);
        }
        let status = device.system_status();
        device.close();
        print_json(&status)
    }
}
