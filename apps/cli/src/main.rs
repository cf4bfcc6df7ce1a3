//! # Cradle CLI
//!
//! Command-line interface for the cradle bed controller.
//!
//! 每个命令独立执行（连接 -> 操作 -> 输出 JSON -> 断开）：
//!
//! ```bash
//! # 列出候选串口
//! cradle-cli ports
//!
//! # 查询状态（床两侧、最近心率、连接状态）
//! cradle-cli --port /dev/ttyACM0 status
//!
//! # 床控制
//! cradle-cli bed left_up
//! cradle-cli bed stop
//!
//! # 读取一次心率 / 持续监控 60 秒
//! cradle-cli heart-rate
//! cradle-cli monitor --seconds 60
//! ```
//!
//! 日志级别由 `RUST_LOG` 控制，默认 `cradle=info`。

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod config;

use commands::{BedCommand, ConnectionArgs, HeartRateCommand, MonitorCommand, StatusCommand};
use config::CliConfig;

/// Cradle CLI - 床控制器命令行工具
#[derive(Parser, Debug)]
#[command(name = "cradle-cli")]
#[command(about = "Command-line interface for the cradle bed controller", long_about = None)]
#[command(version)]
struct Cli {
    /// 配置文件路径（缺省为 <config_dir>/cradle/config.toml）
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(flatten)]
    connection: ConnectionArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 列出看起来像 Arduino 的串口
    Ports,

    /// 查询系统状态
    Status {
        #[command(flatten)]
        args: StatusCommand,
    },

    /// 床控制
    Bed {
        #[command(flatten)]
        args: BedCommand,
    },

    /// 读取一次心率
    HeartRate {
        #[command(flatten)]
        args: HeartRateCommand,
    },

    /// 持续监控心率
    Monitor {
        #[command(flatten)]
        args: MonitorCommand,
    },

    /// 输出生效配置
    Config,
}

fn main() -> Result<()> {
    // 初始化日志
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive("cradle=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    let mut config = CliConfig::load(cli.config.as_deref())?;
    cli.connection.apply(&mut config);

    match cli.command {
        Commands::Ports => commands::ports::execute(),
        Commands::Status { args } => args.execute(&config),
        Commands::Bed { args } => args.execute(&config),
        Commands::HeartRate { args } => args.execute(&config),
        Commands::Monitor { args } => args.execute(&config),
        Commands::Config => commands::config::execute(&config),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use cradle_driver::BedAction;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_bed_action() {
        let cli = Cli::try_parse_from(["cradle-cli", "bed", "left-up", "--port", "/dev/ttyACM0"])
            .unwrap();
        assert_eq!(cli.connection.port.as_deref(), Some("/dev/ttyACM0"));
        match cli.command {
            Commands::Bed { args } => {
                assert_eq!(args.action, BedAction::LeftUp);
                assert_eq!(args.wait_ms, 1000);
            },
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_unknown_bed_action_rejected() {
        assert!(Cli::try_parse_from(["cradle-cli", "bed", "sideways"]).is_err());
    }

    #[test]
    fn test_parse_monitor_and_heart_rate() {
        let cli = Cli::try_parse_from(["cradle-cli", "monitor", "--seconds", "30"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Monitor { args } if args.seconds == Some(30)
        ));

        let cli = Cli::try_parse_from(["cradle-cli", "-b", "115200", "heart-rate"]).unwrap();
        assert_eq!(cli.connection.baud, Some(115_200));
        assert!(matches!(
            cli.command,
            Commands::HeartRate { args } if args.retries == 3
        ));
    }
}
