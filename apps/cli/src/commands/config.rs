//! 输出生效配置（配置文件 + 命令行覆盖）

use super::print_json;
use crate::config::{CliConfig, default_config_file};
use anyhow::Result;
use serde::Serialize;

#[derive(Debug, Serialize)]
struct EffectiveConfig<'a> {
    default_path: Option<String>,
    #[serde(flatten)]
    config: &'a CliConfig,
}

pub fn execute(config: &CliConfig) -> Result<()> {
    print_json(&EffectiveConfig {
        default_path: default_config_file().map(|p| p.display().to_string()),
        config,
    })
}
