//! 文字检测模块
//!
//! 使用 DBNet (Differentiable Binarization) 模型检测文字区域

use image::{GrayImage, Luma};
use imageproc::region_labelling::{connected_components, Connectivity};
use ndarray::{Array4, ArrayViewD};
use ort::session::Session;
use ort::value::Tensor;
use std::path::Path;

use crate::error::OcrError;
use crate::threading::apply_session_threads;

/// 检测阈值
const THRESH: f32 = 0.3;
const BOX_THRESH: f32 = 0.5;
const MIN_SIZE: u32 = 5;
const UNCLIP_RATIO: f32 = 1.6;

/// 文字检测器
pub(crate) struct TextDetector {
    session: Session,
}

/// 检测到的文字框（原图坐标，顺时针四点）
#[derive(Debug, Clone)]
pub(crate) struct TextBox {
    pub points: [[f32; 2]; 4],
    pub score: f32,
}

impl TextDetector {
    /// 从 ONNX 模型文件创建检测器
    pub fn new(model_path: &Path) -> Result<Self, OcrError> {
        let builder = Session::builder()
            .map_err(|e: ort::Error| OcrError::ModelLoad(e.to_string()))?;
        let builder = apply_session_threads(builder)
            .map_err(|e| OcrError::ModelLoad(e.to_string()))?;
        let session = builder
            .commit_from_file(model_path)
            .map_err(|e| OcrError::ModelLoad(format!("加载检测模型失败: {}", e)))?;

        Ok(Self { session })
    }

    /// 检测图像中的文字区域，结果按从上到下排列
    pub fn detect(&mut self, input: Array4<f32>, orig_w: u32, orig_h: u32) -> Result<Vec<TextBox>, OcrError> {
        let input_tensor = Tensor::from_array(input)
            .map_err(|e| OcrError::Inference(e.to_string()))?;

        let outputs = self
            .session
            .run(ort::inputs![input_tensor])
            .map_err(|e| OcrError::Inference(format!("检测推理失败: {}", e)))?;

        let prob_map = outputs[0]
            .try_extract_array::<f32>()
            .map_err(|e| OcrError::Inference(e.to_string()))?
            .to_owned();
        drop(outputs);

        boxes_from_prob_map(&prob_map.view(), orig_w, orig_h)
    }
}

/// DBNet 概率图后处理：二值化、连通域、扩张并映射回原图
fn boxes_from_prob_map(prob: &ArrayViewD<f32>, orig_w: u32, orig_h: u32) -> Result<Vec<TextBox>, OcrError> {
    let shape = prob.shape().to_vec();
    let (map_h, map_w) = match shape.len() {
        4 => (shape[2], shape[3]),
        3 => (shape[1], shape[2]),
        _ => return Err(OcrError::Inference(format!("意外的输出形状: {:?}", shape))),
    };
    let at = |y: usize, x: usize| -> f32 {
        if shape.len() == 4 {
            prob[[0, 0, y, x]]
        } else {
            prob[[0, y, x]]
        }
    };

    let mask = GrayImage::from_fn(map_w as u32, map_h as u32, |x, y| {
        Luma([if at(y as usize, x as usize) > THRESH { 255 } else { 0 }])
    });
    let labels = connected_components(&mask, Connectivity::Four, Luma([0u8]));

    // label -> (min_x, min_y, max_x, max_y, score_sum, count)
    let mut regions: Vec<(u32, u32, u32, u32, f32, u32)> = Vec::new();
    for (x, y, label) in labels.enumerate_pixels() {
        let label = label[0] as usize;
        if label == 0 {
            continue;
        }
        if regions.len() < label {
            regions.resize(label, (u32::MAX, u32::MAX, 0, 0, 0.0, 0));
        }
        let r = &mut regions[label - 1];
        r.0 = r.0.min(x);
        r.1 = r.1.min(y);
        r.2 = r.2.max(x);
        r.3 = r.3.max(y);
        r.4 += at(y as usize, x as usize);
        r.5 += 1;
    }

    let scale_x = orig_w as f32 / map_w as f32;
    let scale_y = orig_h as f32 / map_h as f32;

    let mut boxes: Vec<TextBox> = regions
        .into_iter()
        .filter(|r| r.5 > 0 && r.2 - r.0 >= MIN_SIZE && r.3 - r.1 >= MIN_SIZE)
        .filter_map(|(x0, y0, x1, y1, sum, count)| {
            let score = sum / count as f32;
            if score < BOX_THRESH {
                return None;
            }
            let grow_w = (x1 - x0) as f32 * (UNCLIP_RATIO - 1.0) / 2.0;
            let grow_h = (y1 - y0) as f32 * (UNCLIP_RATIO - 1.0) / 2.0;
            let left = (x0 as f32 - grow_w).max(0.0) * scale_x;
            let top = (y0 as f32 - grow_h).max(0.0) * scale_y;
            let right = (x1 as f32 + grow_w).min(map_w as f32 - 1.0) * scale_x;
            let bottom = (y1 as f32 + grow_h).min(map_h as f32 - 1.0) * scale_y;
            Some(TextBox {
                points: [[left, top], [right, top], [right, bottom], [left, bottom]],
                score,
            })
        })
        .collect();

    boxes.sort_by(|a, b| a.points[0][1].total_cmp(&b.points[0][1]));
    Ok(boxes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array4;

    #[test]
    fn test_boxes_from_prob_map_sorted_top_down() {
        let mut prob = Array4::<f32>::zeros((1, 1, 64, 64));
        for y in 40..50 {
            for x in 5..40 {
                prob[[0, 0, y, x]] = 0.9;
            }
        }
        for y in 10..20 {
            for x in 5..30 {
                prob[[0, 0, y, x]] = 0.8;
            }
        }
        let boxes = boxes_from_prob_map(&prob.into_dyn().view(), 128, 128).unwrap();
        assert_eq!(boxes.len(), 2);
        assert!(boxes[0].points[0][1] < boxes[1].points[0][1]);
        assert!((boxes[0].score - 0.8).abs() < 1e-4);
    }

    #[test]
    fn test_small_and_weak_regions_dropped() {
        let mut prob = Array4::<f32>::zeros((1, 1, 32, 32));
        // 面积过小
        prob[[0, 0, 3, 3]] = 0.9;
        // 平均分低于 BOX_THRESH
        for y in 10..20 {
            for x in 10..20 {
                prob[[0, 0, y, x]] = 0.35;
            }
        }
        let boxes = boxes_from_prob_map(&prob.into_dyn().view(), 32, 32).unwrap();
        assert!(boxes.is_empty());
    }

    #[test]
    fn test_unexpected_shape_is_error() {
        let prob = ndarray::Array2::<f32>::zeros((4, 4)).into_dyn();
        assert!(boxes_from_prob_map(&prob.view(), 4, 4).is_err());
    }
}
