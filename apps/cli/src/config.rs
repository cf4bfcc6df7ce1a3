//! 配置文件加载
//!
//! 配置文件为 TOML，包含 `[device]` 和 `[tracker]` 两段，缺省字段取默认值。
//! 查找顺序：`--config <path>`，否则 `<config_dir>/cradle/config.toml`（不存在时使用默认配置）。

use anyhow::{Context, Result};
use cradle_driver::DeviceConfig;
use cradle_tracker::TrackerConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// 默认配置文件路径
pub fn default_config_file() -> Option<PathBuf> {
    let mut path = dirs::config_dir()?;
    path.push("cradle");
    path.push("config.toml");
    Some(path)
}

/// CLI 配置
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    pub device: DeviceConfig,
    pub tracker: TrackerConfig,
}

impl CliConfig {
    /// 加载配置
    ///
    /// 显式给出的路径必须存在；默认路径不存在时返回默认配置。
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let config = match explicit {
            Some(path) => Self::from_file(path)?,
            None => match default_config_file() {
                Some(path) if path.exists() => Self::from_file(&path)?,
                _ => Self::default(),
            },
        };
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    pub fn validate(&self) -> Result<()> {
        self.device.validate().context("Invalid [device] section")?;
        self.tracker.validate().context("Invalid [tracker] section")?;
        Ok(())
    }
}
