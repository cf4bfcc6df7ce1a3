//! 心率读取

use super::{open_device, print_json};
use crate::config::CliConfig;
use anyhow::Result;
use clap::Args;

/// 心率读取参数
#[derive(Args, Debug)]
pub struct HeartRateCommand {
    /// 值未知时的最大重试次数
    #[arg(short, long, default_value_t = 3)]
    pub retries: u32,
}

impl HeartRateCommand {
    pub fn execute(&self, config: &CliConfig) -> Result<()> {
        let device = open_device(config)?;
        let reading = device.get_heart_rate_with_retry(self.retries);
        device.close();
        print_json(&reading)
    }
}
