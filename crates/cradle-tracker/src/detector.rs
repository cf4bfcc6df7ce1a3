//! 叠加标记检测
//!
//! 相机启用 AI 人脸检测时，会在帧上画出亮绿色的人脸框。这里不重新做人脸检测，
//! 只在绿色通道上寻找足够大的亮区：
//!
//! 1. 绿色通道严格大于阈值的像素构成掩码
//! 2. 8 邻域连通域标记
//! 3. 连通域外轮廓所围面积超过下限即判定有人脸
//!
//! 外轮廓经过边界像素的中心，所以 `w x h` 像素的矩形框面积为 `(w-1)*(h-1)`，
//! 单个像素面积为 0。空心的矩形框同样适用。

use crate::camera::{FaceDetector, Frame};
use std::collections::VecDeque;

/// 默认绿色阈值
pub const DEFAULT_GREEN_THRESHOLD: u8 = 200;

/// 默认最小面积（像素）
pub const DEFAULT_MIN_AREA: usize = 100;

/// 叠加标记检测器
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverlayMarkerDetector {
    pub green_threshold: u8,
    pub min_area: usize,
}

impl Default for OverlayMarkerDetector {
    fn default() -> Self {
        Self {
            green_threshold: DEFAULT_GREEN_THRESHOLD,
            min_area: DEFAULT_MIN_AREA,
        }
    }
}

impl OverlayMarkerDetector {
    pub fn new(green_threshold: u8, min_area: usize) -> Self {
        Self {
            green_threshold,
            min_area,
        }
    }

    /// 各连通域外轮廓（按像素中心）所围矩形的面积
    pub fn marker_areas(&self, frame: &Frame) -> Vec<usize> {
        let (width, height) = (frame.width(), frame.height());
        let data = frame.data();
        let mask: Vec<bool> = data
            .chunks_exact(3)
            .map(|bgr| bgr[1] > self.green_threshold)
            .collect();

        let mut visited = vec![false; mask.len()];
        let mut queue = VecDeque::new();
        let mut areas = Vec::new();

        for start in 0..mask.len() {
            if !mask[start] || visited[start] {
                continue;
            }
            visited[start] = true;
            queue.push_back(start);

            let (mut min_x, mut min_y) = (start % width, start / width);
            let (mut max_x, mut max_y) = (min_x, min_y);

            while let Some(idx) = queue.pop_front() {
                let (x, y) = (idx % width, idx / width);
                min_x = min_x.min(x);
                max_x = max_x.max(x);
                min_y = min_y.min(y);
                max_y = max_y.max(y);

                for ny in y.saturating_sub(1)..=(y + 1).min(height - 1) {
                    for nx in x.saturating_sub(1)..=(x + 1).min(width - 1) {
                        let n = ny * width + nx;
                        if mask[n] && !visited[n] {
                            visited[n] = true;
                            queue.push_back(n);
                        }
                    }
                }
            }

            areas.push((max_x - min_x) * (max_y - min_y));
        }

        areas
    }
}

impl FaceDetector for OverlayMarkerDetector {
    fn detect(&self, frame: &Frame) -> bool {
        self.marker_areas(frame)
            .into_iter()
            .any(|area| area > self.min_area)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GREEN: [u8; 3] = [0, 255, 0];

    #[test]
    fn test_blank_frame_has_no_marker() {
        let frame = Frame::filled(64, 48, [30, 30, 30]);
        assert!(!OverlayMarkerDetector::default().detect(&frame));
    }

    /// 测试空心人脸框被识别
    #[test]
    fn test_face_box_outline_detected() {
        let mut frame = Frame::filled(64, 48, [30, 30, 30]);
        frame.draw_rect(10, 10, 20, 20, GREEN);
        let detector = OverlayMarkerDetector::default();
        assert_eq!(detector.marker_areas(&frame), vec![361]);
        assert!(detector.detect(&frame));
    }

    /// 测试小噪点不触发：11x11 的框面积正好 100，不大于下限
    #[test]
    fn test_small_marker_ignored() {
        let mut frame = Frame::filled(64, 48, [30, 30, 30]);
        frame.draw_rect(0, 0, 11, 11, GREEN);
        frame.set_pixel(40, 40, GREEN);
        let detector = OverlayMarkerDetector::default();
        assert_eq!(detector.marker_areas(&frame), vec![100, 0]);
        assert!(!detector.detect(&frame));
    }

    #[test]
    fn test_twelve_pixel_box_detected() {
        let mut frame = Frame::filled(64, 48, [30, 30, 30]);
        frame.draw_rect(5, 5, 12, 12, GREEN);
        let detector = OverlayMarkerDetector::default();
        assert_eq!(detector.marker_areas(&frame), vec![121]);
        assert!(detector.detect(&frame));
    }

    /// 测试阈值是严格大于
    #[test]
    fn test_threshold_is_strict() {
        let mut frame = Frame::filled(32, 32, [0, 0, 0]);
        frame.draw_rect(0, 0, 20, 20, [0, 200, 0]);
        assert!(!OverlayMarkerDetector::default().detect(&frame));
        assert!(OverlayMarkerDetector::new(199, 100).detect(&frame));
    }

    #[test]
    fn test_diagonal_pixels_are_connected() {
        let mut frame = Frame::filled(4, 4, [0, 0, 0]);
        for i in 0..4 {
            frame.set_pixel(i, i, GREEN);
        }
        assert_eq!(OverlayMarkerDetector::default().marker_areas(&frame), vec![9]);
    }

    #[test]
    fn test_empty_frame() {
        let frame = Frame::filled(0, 0, [0, 0, 0]);
        assert!(OverlayMarkerDetector::default().marker_areas(&frame).is_empty());
    }
}
