//! 驱动层模块
//!
//! 本模块提供床控制器（Arduino）的设备驱动功能，包括：
//! - IO 线程管理（RX 线程解释响应，TX 线程按序分发命令）
//! - 连接健康状态（原子量，无锁读取）
//! - 床状态机（ArcSwap 无锁读取）
//! - 心率状态机（按需采样、引用计数式后台轮询、失败上限自我保护）
//! - 设备门面与 Builder
//!
//! # 线程模型
//!
//! ```text
//!  API 线程 ──enqueue──> [FIFO] ──> TX 线程 ──write──> 串口
//!                                                       │
//!  BedMachine <──┬── EventRouter <── classify <── RX 线程 <┘
//!  HeartRate  <──┘
//!  HeartRate 轮询线程 ──enqueue GET_HEART_RATE──> [FIFO]
//! ```

mod builder;
pub mod bed;
pub mod command;
mod config;
pub mod connector;
mod device;
mod error;
pub mod heart_rate;
pub mod link;
pub mod pipeline;
pub mod thread;

pub use bed::{BedMachine, BedState, SideState};
pub use builder::DeviceBuilder;
pub use command::{CommandQueue, OutboundCommand};
pub use config::{DEFAULT_BAUD_RATE, DeviceConfig, HeartRateConfig};
pub use connector::{AdapterConnector, Connector, SerialConnector};
pub use device::{Device, HeartRateReading, SystemStatus};
pub use error::DriverError;
pub use heart_rate::{HeartRateCallback, HeartRateMachine, HeartRateSnapshot, SubscriptionId};
pub use link::{ConnectionState, LinkState};
pub use pipeline::{EventRouter, PipelineConfig, rx_loop, tx_loop};
pub use thread::JoinTimeout;

pub use cradle_protocol::BedAction;
