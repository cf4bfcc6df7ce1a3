//! 列出候选串口

use super::print_json;
use anyhow::{Context, Result};
use serde::Serialize;

#[derive(Debug, Serialize)]
struct PortList {
    ports: Vec<String>,
}

pub fn execute() -> Result<()> {
    let ports = cradle_serial::discover_ports().context("Failed to enumerate serial ports")?;
    if ports.is_empty() {
        tracing::warn!("No Arduino-like serial ports found");
    }
    print_json(&PortList { ports })
}
