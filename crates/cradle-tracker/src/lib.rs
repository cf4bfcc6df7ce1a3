//! 自动面部追踪
//!
//! 消费相机输出，在连续多次扫描都看不到人脸时，按可配置的调整序列驱动床
//! 每次执行一步，直到人脸重新出现。
//!
//! - [`Camera`] / [`FaceDetector`] / [`BedControl`]：外部协作者接口
//! - [`OverlayMarkerDetector`]：从相机叠加的人脸框推断人脸存在
//! - [`AdjustmentSequence`]：循环调整脚本
//! - [`AutoFaceTracker`]：扫描线程与状态机

mod camera;
mod config;
pub mod detector;
mod error;
pub mod sequence;
mod tracker;

pub use camera::{BedControl, Camera, FaceDetector, Frame};
pub use config::{TrackerConfig, TrackerConfigUpdate};
pub use detector::OverlayMarkerDetector;
pub use error::TrackerError;
pub use sequence::{AdjustmentSequence, AdjustmentStep};
pub use tracker::{AutoFaceTracker, TRACKER_JOIN_TIMEOUT, TrackerPhase, TrackerStatus};
