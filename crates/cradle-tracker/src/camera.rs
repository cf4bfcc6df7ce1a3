//! 相机与设备协作者接口
//!
//! 面部追踪只依赖这里的 trait，采集管线、AI 分类器和床控制器都由外部提供。

use crate::error::TrackerError;
use cradle_driver::{BedAction, Device};

/// 一帧 BGR 图像（行优先，每像素 3 字节）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    width: usize,
    height: usize,
    data: Vec<u8>,
}

impl Frame {
    /// 从 BGR 字节创建帧
    ///
    /// # 错误
    /// - 宽高乘积溢出时返回 `TrackerError::FrameTooLarge`
    /// - `data.len() != width * height * 3` 时返回 `TrackerError::InvalidFrame`
    pub fn new(width: usize, height: usize, data: Vec<u8>) -> Result<Self, TrackerError> {
        let expected = width
            .checked_mul(height)
            .and_then(|pixels| pixels.checked_mul(3))
            .ok_or(TrackerError::FrameTooLarge { width, height })?;
        if data.len() != expected {
            return Err(TrackerError::InvalidFrame {
                width,
                height,
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// 纯色帧
    pub fn filled(width: usize, height: usize, bgr: [u8; 3]) -> Self {
        let data = bgr.repeat(width * height);
        Self {
            width,
            height,
            data,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// 读取像素 `(x, y)` 的 BGR 值
    pub fn pixel(&self, x: usize, y: usize) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y * self.width + x) * 3;
        Some([self.data[i], self.data[i + 1], self.data[i + 2]])
    }

    /// 设置像素（越界时忽略）
    pub fn set_pixel(&mut self, x: usize, y: usize, bgr: [u8; 3]) {
        if x < self.width && y < self.height {
            let i = (y * self.width + x) * 3;
            self.data[i..i + 3].copy_from_slice(&bgr);
        }
    }

    /// 画矩形边框（与相机叠加的人脸框同样的形式）
    pub fn draw_rect(&mut self, x: usize, y: usize, w: usize, h: usize, bgr: [u8; 3]) {
        if w == 0 || h == 0 {
            return;
        }
        for dx in 0..w {
            self.set_pixel(x + dx, y, bgr);
            self.set_pixel(x + dx, y + h - 1, bgr);
        }
        for dy in 0..h {
            self.set_pixel(x, y + dy, bgr);
            self.set_pixel(x + w - 1, y + dy, bgr);
        }
    }
}

/// 相机协作者
pub trait Camera: Send + Sync {
    /// 最新一帧；采集未就绪时返回 `None`
    fn frame(&self) -> Option<Frame>;

    fn is_running(&self) -> bool;

    /// 相机是否启用了 AI 人脸检测（启用时检测框会叠加在帧上）
    fn ai_detection_enabled(&self) -> bool;
}

/// 人脸检测器
pub trait FaceDetector: Send + Sync {
    fn detect(&self, frame: &Frame) -> bool;
}

impl<F> FaceDetector for F
where
    F: Fn(&Frame) -> bool + Send + Sync,
{
    fn detect(&self, frame: &Frame) -> bool {
        self(frame)
    }
}

/// 床控制协作者
///
/// 追踪器只需要按动作驱动床和检查连接，[`Device`] 直接实现了该接口。
pub trait BedControl: Send + Sync {
    fn is_connected(&self) -> bool;

    /// 执行一个床动作，命令未能入队时返回 `false`
    fn execute(&self, action: BedAction) -> bool;

    fn stop(&self) -> bool {
        self.execute(BedAction::Stop)
    }
}

impl BedControl for Device {
    fn is_connected(&self) -> bool {
        Device::is_connected(self)
    }

    fn execute(&self, action: BedAction) -> bool {
        Device::execute(self, action)
    }

    fn stop(&self) -> bool {
        self.bed_stop()
    }
}
