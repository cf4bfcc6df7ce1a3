//! 调整序列
//!
//! 丢失人脸时按顺序执行的床动作脚本，循环使用，游标对长度取模。

use crate::error::TrackerError;
use cradle_protocol::BedAction;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 调整步骤
///
/// 序列化格式：`{ "action": "left_up", "duration": 1.0 }`，`duration` 单位为秒。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AdjustmentStep {
    pub action: BedAction,
    pub duration: f64,
}

impl AdjustmentStep {
    pub const fn new(action: BedAction, duration: f64) -> Self {
        Self { action, duration }
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.duration)
    }

    fn validate(&self) -> Result<(), TrackerError> {
        Duration::try_from_secs_f64(self.duration)
            .map(|_| ())
            .map_err(|_| {
                TrackerError::InvalidConfig(format!(
                    "step {} has invalid duration {}",
                    self.action, self.duration
                ))
            })
    }
}

/// 默认 12 步脚本：每个动作 1 秒，之间停 0.5 秒
pub fn default_steps() -> Vec<AdjustmentStep> {
    let moves = [
        BedAction::LeftUp,
        BedAction::RightUp,
        BedAction::LeftDown,
        BedAction::RightDown,
        BedAction::Up,
        BedAction::Down,
    ];
    moves
        .into_iter()
        .flat_map(|action| {
            [
                AdjustmentStep::new(action, 1.0),
                AdjustmentStep::new(BedAction::Stop, 0.5),
            ]
        })
        .collect()
}

/// 检查一组步骤能否组成序列
pub fn validate_steps(steps: &[AdjustmentStep]) -> Result<(), TrackerError> {
    if steps.is_empty() {
        return Err(TrackerError::EmptySequence);
    }
    steps.iter().try_for_each(AdjustmentStep::validate)
}

/// 可重启的循环序列
///
/// 不变量：`steps` 非空且 `cursor < steps.len()`。
#[derive(Debug, Clone, PartialEq)]
pub struct AdjustmentSequence {
    steps: Vec<AdjustmentStep>,
    cursor: usize,
}

impl Default for AdjustmentSequence {
    fn default() -> Self {
        Self {
            steps: default_steps(),
            cursor: 0,
        }
    }
}

impl AdjustmentSequence {
    pub fn new(steps: Vec<AdjustmentStep>) -> Result<Self, TrackerError> {
        validate_steps(&steps)?;
        Ok(Self { steps, cursor: 0 })
    }

    /// 游标处的步骤
    pub fn current(&self) -> AdjustmentStep {
        self.steps[self.cursor]
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// 游标前进一步（回绕），返回新的游标
    pub fn advance(&mut self) -> usize {
        self.cursor = (self.cursor + 1) % self.steps.len();
        self.cursor
    }

    /// 替换步骤并把游标重置为 0
    pub fn replace(&mut self, steps: Vec<AdjustmentStep>) -> Result<(), TrackerError> {
        validate_steps(&steps)?;
        self.steps = steps;
        self.cursor = 0;
        Ok(())
    }

    /// 游标回到起点
    pub fn restart(&mut self) {
        self.cursor = 0;
    }

    pub fn steps(&self) -> &[AdjustmentStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// 恒为 `false`（序列不允许为空）
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}
