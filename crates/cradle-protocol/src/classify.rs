//! 入站文本行分类
//!
//! 把微控制器输出的一行文本归类为 [`ClassifiedEvent`]。规则按优先级依次尝试：
//!
//! 1. `CONFIRMED:<action>` → [`ClassifiedEvent::Confirmation`]
//! 2. `UNKNOWN_CMD:<original>` → [`ClassifiedEvent::UnknownCommand`]
//! 3. 任意心率标记（见 [`HEART_RATE_MATCHERS`]）→ [`ClassifiedEvent::HeartRateSample`]
//! 4. 包含 `STATUS` 子串 → [`ClassifiedEvent::StatusLine`]
//! 5. 其他 → [`ClassifiedEvent::Unrecognized`]
//!
//! 分类永不失败：任何输入都会得到一个事件。

use crate::constants::*;

/// 分类后的入站事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassifiedEvent {
    /// 命令确认（动作名原样保留，由床状态机决定是否认识）
    Confirmation { action: String },
    /// 固件不认识的命令
    UnknownCommand { original: String },
    /// 心率采样
    HeartRateSample { bpm: u32 },
    /// 不含心率的状态行
    StatusLine { raw: String },
    /// 无法识别的行
    Unrecognized { raw: String },
}

impl ClassifiedEvent {
    /// 是否属于心率状态机负责的事件
    ///
    /// 确认与状态行归床状态机，其余（采样、未知命令、无法识别）归心率状态机，
    /// 后两者在心率侧计为一次失败。
    pub fn is_heart_rate_domain(&self) -> bool {
        matches!(
            self,
            ClassifiedEvent::HeartRateSample { .. }
                | ClassifiedEvent::UnknownCommand { .. }
                | ClassifiedEvent::Unrecognized { .. }
        )
    }
}

/// 心率匹配器：从一行文本中提取心率值
pub type HeartRateMatcher = fn(&str) -> Option<u32>;

/// 心率匹配器表（按优先级排列）
///
/// 每个匹配器独立工作，解析失败返回 `None`，交给下一个匹配器继续尝试。
pub const HEART_RATE_MATCHERS: [(&str, HeartRateMatcher); 5] = [
    (HEART_RATE_DATA_MARKER, match_heart_rate_data),
    (BPM_TAG_MARKER, match_bpm_tag),
    (HEART_TAG_MARKER, match_heart_tag),
    (HEART_RATE_ASSIGN_MARKER, match_heart_rate_assign),
    (HEART_ASSIGN_MARKER, match_heart_assign),
];

/// `HEART_RATE_DATA:72`
pub fn match_heart_rate_data(line: &str) -> Option<u32> {
    value_after(line, HEART_RATE_DATA_MARKER)
}

/// `[BPM] 72`
pub fn match_bpm_tag(line: &str) -> Option<u32> {
    value_after(line, BPM_TAG_MARKER)
}

/// `[HEART] 72`
pub fn match_heart_tag(line: &str) -> Option<u32> {
    value_after(line, HEART_TAG_MARKER)
}

/// `STATUS:LEFT=UP,HEART_RATE=72,...`
pub fn match_heart_rate_assign(line: &str) -> Option<u32> {
    value_after(line, HEART_RATE_ASSIGN_MARKER)
}

/// `STATUS: HEART=72`
pub fn match_heart_assign(line: &str) -> Option<u32> {
    value_after(line, HEART_ASSIGN_MARKER)
}

/// 取标记之后、第一个 `,` 之前的字段，去掉空白后解析前导数字
fn value_after(line: &str, marker: &str) -> Option<u32> {
    let (_, rest) = line.split_once(marker)?;
    let field = rest.split(',').next().unwrap_or_default().trim();
    let digits_end = field
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(field.len());
    field[..digits_end].parse().ok()
}

/// 分类一行入站文本
///
/// 行尾的 `\r` / `\n` 以及首尾空白会先被去掉。
///
/// # Example
///
/// ```
/// use cradle_protocol::{classify, ClassifiedEvent};
///
/// assert_eq!(
///     classify("STATUS: HEART=72"),
///     ClassifiedEvent::HeartRateSample { bpm: 72 }
/// );
/// ```
pub fn classify(line: &str) -> ClassifiedEvent {
    let line = line.trim();

    if let Some(action) = line.strip_prefix(CONFIRMED_PREFIX) {
        return ClassifiedEvent::Confirmation {
            action: action.trim().to_string(),
        };
    }

    if let Some(original) = line.strip_prefix(UNKNOWN_CMD_PREFIX) {
        return ClassifiedEvent::UnknownCommand {
            original: original.trim().to_string(),
        };
    }

    if let Some(bpm) = HEART_RATE_MATCHERS.iter().find_map(|(_, matcher)| matcher(line)) {
        return ClassifiedEvent::HeartRateSample { bpm };
    }

    if line.contains(STATUS_MARKER) {
        return ClassifiedEvent::StatusLine {
            raw: line.to_string(),
        };
    }

    ClassifiedEvent::Unrecognized {
        raw: line.to_string(),
    }
}
