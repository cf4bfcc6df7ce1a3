//! 串口自动发现

use crate::SerialError;
use tracing::debug;

/// Arduino 常见的串口设备名片段（Linux / macOS）
pub const ARDUINO_PORT_PATTERNS: [&str; 4] = ["ttyUSB", "ttyACM", "cu.usbmodem", "cu.usbserial"];

/// 设备名是否像 Arduino 串口
pub fn is_arduino_port(name: &str) -> bool {
    ARDUINO_PORT_PATTERNS
        .iter()
        .any(|pattern| name.contains(pattern))
}

/// 列出看起来像 Arduino 的串口（按名称排序）
pub fn discover_ports() -> Result<Vec<String>, SerialError> {
    let mut ports: Vec<String> = serialport::available_ports()?
        .into_iter()
        .map(|info| info.port_name)
        .filter(|name| is_arduino_port(name))
        .collect();
    ports.sort();
    debug!("Discovered candidate ports: {:?}", ports);
    Ok(ports)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_arduino_port() {
        assert!(is_arduino_port("/dev/ttyUSB0"));
        assert!(is_arduino_port("/dev/ttyACM1"));
        assert!(is_arduino_port("/dev/cu.usbmodem14101"));
        assert!(is_arduino_port("/dev/cu.usbserial-A50285BI"));
        assert!(!is_arduino_port("/dev/ttyS0"));
        assert!(!is_arduino_port("/dev/cu.Bluetooth-Incoming-Port"));
    }
}
