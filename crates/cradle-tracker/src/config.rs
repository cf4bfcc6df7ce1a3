//! 面部追踪配置

use crate::error::TrackerError;
use crate::sequence::{AdjustmentStep, default_steps, validate_steps};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 面部追踪配置
///
/// 时间字段以秒为单位的浮点数表示，与状态输出中的字段一致。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// 两次扫描之间的间隔（秒）
    pub scan_interval: f64,
    /// 每个调整步骤之后等待床稳定的时间（秒）
    pub movement_delay: f64,
    /// 连续多少次扫描未检测到人脸后触发调整
    pub face_detection_threshold: u32,
    pub adjustment_sequence: Vec<AdjustmentStep>,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            scan_interval: 3.0,
            movement_delay: 2.0,
            face_detection_threshold: 3,
            adjustment_sequence: default_steps(),
        }
    }
}

impl TrackerConfig {
    pub fn scan_interval(&self) -> Duration {
        Duration::from_secs_f64(self.scan_interval)
    }

    pub fn movement_delay(&self) -> Duration {
        Duration::from_secs_f64(self.movement_delay)
    }

    pub fn validate(&self) -> Result<(), TrackerError> {
        validate_seconds("scan_interval", self.scan_interval)?;
        if self.scan_interval == 0.0 {
            return Err(TrackerError::InvalidConfig(
                "scan_interval must be > 0".to_string(),
            ));
        }
        validate_seconds("movement_delay", self.movement_delay)?;
        if self.face_detection_threshold == 0 {
            return Err(TrackerError::InvalidConfig(
                "face_detection_threshold must be > 0".to_string(),
            ));
        }
        validate_steps(&self.adjustment_sequence)
    }
}

/// 必须能无损转换为 `Duration`（非负、有限且不溢出）
fn validate_seconds(name: &str, value: f64) -> Result<(), TrackerError> {
    Duration::try_from_secs_f64(value).map(|_| ()).map_err(|_| {
        TrackerError::InvalidConfig(format!(
            "{} must be a non-negative number of seconds, got {}",
            name, value
        ))
    })
}

/// 运行期配置更新（只修改给出的字段）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfigUpdate {
    pub scan_interval: Option<f64>,
    pub movement_delay: Option<f64>,
    pub face_detection_threshold: Option<u32>,
    /// 给出时替换序列并把游标重置为 0
    pub adjustment_sequence: Option<Vec<AdjustmentStep>>,
}

impl TrackerConfigUpdate {
    pub fn is_empty(&self) -> bool {
        self.scan_interval.is_none()
            && self.movement_delay.is_none()
            && self.face_detection_threshold.is_none()
            && self.adjustment_sequence.is_none()
    }

    /// 应用到一份配置副本上
    pub fn apply_to(&self, config: &TrackerConfig) -> TrackerConfig {
        let mut next = config.clone();
        if let Some(v) = self.scan_interval {
            next.scan_interval = v;
        }
        if let Some(v) = self.movement_delay {
            next.movement_delay = v;
        }
        if let Some(v) = self.face_detection_threshold {
            next.face_detection_threshold = v;
        }
        if let Some(steps) = &self.adjustment_sequence {
            next.adjustment_sequence = steps.clone();
        }
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cradle_protocol::BedAction;

    #[test]
    fn test_defaults() {
        let config = TrackerConfig::default();
        assert_eq!(config.scan_interval(), Duration::from_secs(3));
        assert_eq!(config.movement_delay(), Duration::from_secs(2));
        assert_eq!(config.face_detection_threshold, 3);
        assert_eq!(config.adjustment_sequence.len(), 12);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_shapes() {
        let bad = [
            TrackerConfig {
                scan_interval: 0.0,
                ..Default::default()
            },
            TrackerConfig {
                scan_interval: f64::INFINITY,
                ..Default::default()
            },
            TrackerConfig {
                movement_delay: -1.0,
                ..Default::default()
            },
            TrackerConfig {
                face_detection_threshold: 0,
                ..Default::default()
            },
            TrackerConfig {
                scan_interval: 1e20,
                ..Default::default()
            },
            TrackerConfig {
                movement_delay: f64::MAX,
                ..Default::default()
            },
        ];
        for config in bad {
            assert!(matches!(config.validate(), Err(TrackerError::InvalidConfig(_))));
        }

        let empty = TrackerConfig {
            adjustment_sequence: Vec::new(),
            ..Default::default()
        };
        assert_eq!(empty.validate(), Err(TrackerError::EmptySequence));
    }

    /// 测试从 TOML 段落解析，缺省字段取默认值
    #[test]
    fn test_toml_section() {
        let config: TrackerConfig = toml::from_str(
            r#"
            scan_interval = 1.5
            face_detection_threshold = 5

            [[adjustment_sequence]]
            action = "up"
            duration = 0.8

            [[adjustment_sequence]]
            action = "stop"
            duration = 0.2
            "#,
        )
        .unwrap();
        assert_eq!(config.scan_interval, 1.5);
        assert_eq!(config.movement_delay, 2.0);
        assert_eq!(config.face_detection_threshold, 5);
        assert_eq!(
            config.adjustment_sequence,
            vec![
                AdjustmentStep::new(BedAction::Up, 0.8),
                AdjustmentStep::new(BedAction::Stop, 0.2),
            ]
        );
    }

    #[test]
    fn test_update_applies_only_given_fields() {
        let update = TrackerConfigUpdate {
            movement_delay: Some(0.5),
            ..Default::default()
        };
        assert!(!update.is_empty());
        let next = update.apply_to(&TrackerConfig::default());
        assert_eq!(next.movement_delay, 0.5);
        assert_eq!(next.scan_interval, 3.0);
        assert!(TrackerConfigUpdate::default().is_empty());
    }
}
