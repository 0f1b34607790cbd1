//! Paddle OCR 引擎 (PP-OCRv5 ONNX)
//!
//! 检测 + 识别两阶段，全字符集，速度较慢但对噪声更宽容，作为兜底引擎使用。

use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Instant;

use crate::det::TextDetector;
use crate::engine::OcrEngine;
use crate::error::OcrError;
use crate::rec::{RecognitionResult, TextRecognizer};
use crate::tensor;
use crate::threading::env_parse;
use crate::types::{BBox, OcrAuditInfo, OcrEngineType, OcrTextResult};

const DEFAULT_MAX_BATCH_SIZE: usize = 16;
const DEFAULT_MIN_CONFIDENCE: f32 = 0.0;

/// Paddle 模型文件配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaddleConfig {
    /// 检测模型路径
    pub det_model_path: String,
    /// 识别模型路径
    pub rec_model_path: String,
    /// 字典文件路径
    pub dict_path: String,
}

/// 检查 Paddle 模型文件是否齐全
pub fn is_models_installed(config: &PaddleConfig) -> bool {
    [&config.det_model_path, &config.rec_model_path, &config.dict_path]
        .iter()
        .all(|p| Path::new(p.as_str()).exists())
}

/// Paddle OCR 引擎
pub struct PaddleOcrEngine {
    detector: TextDetector,
    recognizer: TextRecognizer,
    min_confidence: f32,
}

impl PaddleOcrEngine {
    pub fn new(config: &PaddleConfig) -> Result<Self, OcrError> {
        log::info!("[Paddle] 加载检测模型: {}", config.det_model_path);
        let detector = TextDetector::new(Path::new(&config.det_model_path))?;

        log::info!("[Paddle] 加载识别模型: {}", config.rec_model_path);
        let recognizer = TextRecognizer::new(
            Path::new(&config.rec_model_path),
            Path::new(&config.dict_path),
        )?;

        let min_confidence = env_parse::<f32>("IDCHECK_OCR_MIN_CONF").unwrap_or(DEFAULT_MIN_CONFIDENCE);

        log::info!("[Paddle] 引擎初始化完成");
        Ok(Self {
            detector,
            recognizer,
            min_confidence,
        })
    }

    fn recognize_lines(&mut self, lines: &[DynamicImage]) -> Vec<RecognitionResult> {
        let mut results = Vec::with_capacity(lines.len());
        for batch in tensor::prepare_rec_batches(lines, DEFAULT_MAX_BATCH_SIZE) {
            let batch_len = batch.shape()[0];
            match self.recognizer.recognize_batch(batch) {
                Ok(batch_results) => results.extend(batch_results),
                Err(e) => {
                    // 单批失败不影响其余行
                    log::warn!("[Paddle] 批量识别失败: {}", e);
                    results.extend(std::iter::repeat_with(RecognitionResult::default).take(batch_len));
                }
            }
        }
        results
    }
}

impl OcrEngine for PaddleOcrEngine {
    fn engine_type(&self) -> OcrEngineType {
        OcrEngineType::Paddle
    }

    fn recognize_image(&mut self, img: &DynamicImage) -> Result<Vec<OcrTextResult>, OcrError> {
        let (orig_w, orig_h) = (img.width(), img.height());

        let det_start = Instant::now();
        let boxes = self
            .detector
            .detect(tensor::prepare_det_input(img), orig_w, orig_h)?;
        log::info!(
            "[Paddle] 检测到 {} 个文字区域，耗时: {} ms",
            boxes.len(),
            det_start.elapsed().as_millis()
        );
        if boxes.is_empty() {
            return Ok(Vec::new());
        }

        let rec_start = Instant::now();
        let lines: Vec<DynamicImage> = boxes
            .iter()
            .map(|b| tensor::crop_text_region(img, &b.points))
            .collect();
        let recognized = self.recognize_lines(&lines);

        let results: Vec<OcrTextResult> = boxes
            .iter()
            .zip(recognized)
            .filter(|(_, r)| !r.text.trim().is_empty() && r.confidence >= self.min_confidence)
            .map(|(b, r)| {
                log::debug!("[Paddle] \"{}\" (置信度: {:.2})", r.text, r.confidence);
                OcrTextResult {
                    text: r.text,
                    confidence: r.confidence,
                    bbox: points_to_bbox(&b.points, orig_w, orig_h),
                }
            })
            .collect();

        log::info!(
            "[Paddle] 识别完成，共 {} 行，耗时: {} ms",
            results.len(),
            rec_start.elapsed().as_millis()
        );
        Ok(results)
    }

    fn audit_info(&self) -> OcrAuditInfo {
        OcrAuditInfo {
            engine_type: OcrEngineType::Paddle,
            engine_version: Some("PP-OCRv5".to_string()),
            engine_params: Some(serde_json::json!({ "minConfidence": self.min_confidence }).to_string()),
        }
    }
}

/// 将四个角点转换为相对坐标边界框
fn points_to_bbox(points: &[[f32; 2]; 4], img_w: u32, img_h: u32) -> BBox {
    let min_x = points.iter().map(|p| p[0]).fold(f32::INFINITY, f32::min);
    let max_x = points.iter().map(|p| p[0]).fold(f32::NEG_INFINITY, f32::max);
    let min_y = points.iter().map(|p| p[1]).fold(f32::INFINITY, f32::min);
    let max_y = points.iter().map(|p| p[1]).fold(f32::NEG_INFINITY, f32::max);

    BBox {
        x: min_x / img_w as f32,
        y: min_y / img_h as f32,
        w: (max_x - min_x) / img_w as f32,
        h: (max_y - min_y) / img_h as f32,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_points_to_bbox() {
        let points = [[10.0, 20.0], [100.0, 20.0], [100.0, 50.0], [10.0, 50.0]];
        let bbox = points_to_bbox(&points, 200, 100);
        assert!((bbox.x - 0.05).abs() < 0.001);
        assert!((bbox.y - 0.2).abs() < 0.001);
        assert!((bbox.w - 0.45).abs() < 0.001);
        assert!((bbox.h - 0.3).abs() < 0.001);
    }

    #[test]
    fn test_models_missing() {
        let config = PaddleConfig {
            det_model_path: "/nonexistent/det.onnx".into(),
            rec_model_path: "/nonexistent/rec.onnx".into(),
            dict_path: "/nonexistent/dict.txt".into(),
        };
        assert!(!is_models_installed(&config));
    }
}
