//! 心率监控
//!
//! 订阅心率推送，每收到一个读数输出一行 JSON，直到 Ctrl+C 或到达时长。

use super::{open_device, print_json};
use crate::config::CliConfig;
use anyhow::{Context, Result};
use clap::Args;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// 监控参数
#[derive(Args, Debug)]
pub struct MonitorCommand {
    /// 监控时长（秒），缺省时一直运行到 Ctrl+C
    #[arg(short, long)]
    pub seconds: Option<u64>,
}

impl MonitorCommand {
    pub fn execute(&self, config: &CliConfig) -> Result<()> {
        let running = Arc::new(AtomicBool::new(true));
        let running_clone = running.clone();
        ctrlc::set_handler(move || {
            running_clone.store(false, Ordering::SeqCst);
        })
        .context("Failed to set Ctrl+C handler")?;

        let device = open_device(config)?;
        let id = device.subscribe_heart_rate(|bpm: u32| {
            println!("{}", serde_json::json!({ "heart_rate": bpm }));
        });
        tracing::info!("Monitoring heart rate, press Ctrl+C to stop");

        let deadline = self.seconds.map(|s| Instant::now() + Duration::from_secs(s));
        while running.load(Ordering::SeqCst) {
            if deadline.is_some_and(|d| Instant::now() >= d) {
                break;
            }
            std::thread::sleep(Duration::from_millis(100));
        }

        device.unsubscribe_heart_rate(id);
        let status = device.system_status();
        device.close();
        print_json(&status.heart_rate)
    }
}
