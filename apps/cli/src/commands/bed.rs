//! 床控制命令

use super::{open_device, print_json, wait_for};
use crate::config::CliConfig;
use anyhow::{Result, bail};
use clap::Args;
use cradle_driver::{BedAction, BedState};
use serde::Serialize;
use std::time::Duration;

/// 床控制参数
#[derive(Args, Debug)]
pub struct BedCommand {
    /// 动作：up, down, stop, left_up, left_down, left_stop, right_up, right_down, right_stop
    pub action: BedAction,

    /// 等待固件确认的时间（毫秒）
    #[arg(long, default_value_t = 1000)]
    pub wait_ms: u64,
}

#[derive(Debug, Serialize)]
struct BedOutcome {
    action: BedAction,
    confirmed: bool,
    bed: BedState,
}

impl BedCommand {
    pub fn execute(&self, config: &CliConfig) -> Result<()> {
        let device = open_device(config)?;
        if !device.execute(self.action) {
            device.close();
            bail!("Controller not connected, {} was not sent", self.action);
        }

        let expected = self.action.wire_name();
        let confirmed = wait_for(Duration::from_millis(self.wait_ms), || {
            device.system_status().last_bed_confirmation.as_deref() == Some(expected)
        });
        if !confirmed {
            tracing::warn!("No confirmation for {} within {} ms", self.action, self.wait_ms);
        }

        let outcome = BedOutcome {
            action: self.action,
            confirmed,
            bed: device.get_bed_status(),
        };
        device.close();
        print_json(&outcome)
    }
}
