//! 测试用的固定输出引擎

use idcheck_ocr::{BBox, OcrAuditInfo, OcrEngine, OcrEngineType, OcrError, OcrTextResult, TextExtractor};
use image::DynamicImage;

struct FixedEngine(String);

impl OcrEngine for FixedEngine {
    fn engine_type(&self) -> OcrEngineType {
        OcrEngineType::Tesseract
    }

    fn recognize_image(&mut self, _img: &DynamicImage) -> Result<Vec<OcrTextResult>, OcrError> {
        Ok(vec![OcrTextResult {
            text: self.0.clone(),
            confidence: 1.0,
            bbox: BBox::default(),
        }])
    }

    fn audit_info(&self) -> OcrAuditInfo {
        OcrAuditInfo {
            engine_type: OcrEngineType::Tesseract,
            engine_version: None,
            engine_params: None,
        }
    }
}

/// 只有一个首选引擎、总是返回 `text` 的提取器
pub(crate) fn fixed_extractor(text: &str) -> TextExtractor {
    TextExtractor::new(Some(Box::new(FixedEngine(text.to_string()))), None)
}
