//! 识别流水线：预处理 → 文本提取 → 号码定位 → 校验
//!
//! 每次调用处理一张图像，任何阶段无结果即提前返回，失败以数据形式记录在结果中。

use image::DynamicImage;
use serde::Serialize;
use std::time::Instant;

use idcheck_ocr::{preprocess_card, OcrEngineType, TextExtractor};

use crate::error::FailureKind;
use crate::locator;
use crate::validator::{IdValidator, ValidationResult};

/// 一次流水线调用的结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineResult {
    extracted_id: Option<String>,
    validation: Option<ValidationResult>,
    ocr_engine_used: Option<OcrEngineType>,
    failure: Option<FailureKind>,
}

impl PipelineResult {
    fn stage_failed(kind: FailureKind, engine: Option<OcrEngineType>) -> Self {
        Self {
            extracted_id: None,
            validation: None,
            ocr_engine_used: engine,
            failure: Some(kind),
        }
    }

    fn validated(validation: ValidationResult, engine: OcrEngineType) -> Self {
        Self {
            extracted_id: Some(validation.candidate().to_string()),
            failure: validation.failure(),
            validation: Some(validation),
            ocr_engine_used: Some(engine),
        }
    }

    pub fn extracted_id(&self) -> Option<&str> {
        self.extracted_id.as_deref()
    }

    pub fn validation(&self) -> Option<&ValidationResult> {
        self.validation.as_ref()
    }

    pub fn ocr_engine_used(&self) -> Option<OcrEngineType> {
        self.ocr_engine_used
    }

    /// 最具体的失败原因
    pub fn failure(&self) -> Option<FailureKind> {
        self.failure
    }

    pub fn is_valid(&self) -> bool {
        self.validation.as_ref().is_some_and(ValidationResult::is_valid)
    }

    pub fn status_message(&self) -> String {
        if self.is_valid() {
            "验证通过".to_string()
        } else {
            self.failure
                .map(|kind| kind.to_string())
                .unwrap_or_else(|| "格式无效".to_string())
        }
    }
}

/// 流水线，持有注入的文本提取器
pub struct Pipeline {
    extractor: TextExtractor,
    validator: IdValidator,
}

impl Pipeline {
    pub fn new(extractor: TextExtractor) -> Self {
        Self::with_validator(extractor, IdValidator::default())
    }

    pub fn with_validator(extractor: TextExtractor, validator: IdValidator) -> Self {
        Self { extractor, validator }
    }

    /// 流水线使用的校验器，调用方可用它分解已通过校验的号码
    pub fn validator(&self) -> &IdValidator {
        &self.validator
    }

    pub fn run(&mut self, image: &DynamicImage) -> PipelineResult {
        let start = Instant::now();
        let result = self.run_stages(image);
        log::info!(
            "[Pipeline] 完成: {}，耗时: {} ms",
            result.status_message(),
            start.elapsed().as_millis()
        );
        result
    }

    fn run_stages(&mut self, image: &DynamicImage) -> PipelineResult {
        let preprocessed = match preprocess_card(image) {
            Ok(p) => p,
            Err(e) => {
                log::warn!("[Pipeline] 预处理失败: {}", e);
                return PipelineResult::stage_failed(FailureKind::InvalidImage, None);
            }
        };

        let extraction = match self.extractor.extract(&preprocessed) {
            Ok(extraction) => extraction,
            Err(e) => return PipelineResult::stage_failed(e.into(), None),
        };
        log::debug!("[Pipeline] OCR 文本: {:?}", extraction.text.joined());

        let Some(candidate) = locator::locate(&extraction.text) else {
            log::info!("[Pipeline] {} 引擎的输出中未找到号码", extraction.engine);
            return PipelineResult::stage_failed(FailureKind::NoIdPatternFound, Some(extraction.engine));
        };

        let validation = self.validator.validate(candidate.as_str());
        PipelineResult::validated(validation, extraction.engine)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use idcheck_ocr::{BBox, OcrAuditInfo, OcrEngine, OcrError, OcrTextResult};
    use image::{Rgb, RgbImage};
    use imageproc::drawing::draw_filled_rect_mut;
    use imageproc::rect::Rect;

    /// 固定返回若干行文本的引擎
    struct FixedEngine {
        kind: OcrEngineType,
        lines: Vec<String>,
    }

    impl FixedEngine {
        fn boxed(kind: OcrEngineType, lines: &[&str]) -> Option<Box<dyn OcrEngine>> {
            Some(Box::new(FixedEngine {
                kind,
                lines: lines.iter().map(|s| s.to_string()).collect(),
            }))
        }
    }

    impl OcrEngine for FixedEngine {
        fn engine_type(&self) -> OcrEngineType {
            self.kind
        }

        fn recognize_image(&mut self, _img: &DynamicImage) -> Result<Vec<OcrTextResult>, OcrError> {
            Ok(self
                .lines
                .iter()
                .map(|text| OcrTextResult {
                    text: text.clone(),
                    confidence: 0.95,
                    bbox: BBox::default(),
                })
                .collect())
        }

        fn audit_info(&self) -> OcrAuditInfo {
            OcrAuditInfo {
                engine_type: self.kind,
                engine_version: None,
                engine_params: None,
            }
        }
    }

    /// 白底卡片，中间一条深色“号码行”
    fn card() -> DynamicImage {
        let mut img = RgbImage::from_pixel(48, 32, Rgb([235, 235, 230]));
        draw_filled_rect_mut(&mut img, Rect::at(6, 18).of_size(36, 6), Rgb([20, 20, 20]));
        DynamicImage::ImageRgb8(img)
    }

    fn pipeline(primary: Option<Box<dyn OcrEngine>>, fallback: Option<Box<dyn OcrEngine>>) -> Pipeline {
        Pipeline::with_validator(TextExtractor::new(primary, fallback), IdValidator::with_max_year(2025))
    }

    #[test]
    fn test_valid_card() {
        let mut p = pipeline(
            FixedEngine::boxed(OcrEngineType::Tesseract, &["11010519491231002X"]),
            None,
        );
        let result = p.run(&card());
        assert!(result.is_valid());
        assert_eq!(result.extracted_id(), Some("11010519491231002X"));
        assert_eq!(result.ocr_engine_used(), Some(OcrEngineType::Tesseract));
        assert_eq!(result.failure(), None);
        assert_eq!(result.status_message(), "验证通过");
    }

    #[test]
    fn test_fallback_text_with_labels() {
        let mut p = pipeline(
            FixedEngine::boxed(OcrEngineType::Tesseract, &[" "]),
            FixedEngine::boxed(OcrEngineType::Paddle, &["姓名 张三", "公民身份号码440524198001010013"]),
        );
        let result = p.run(&card());
        assert!(result.is_valid());
        assert_eq!(result.extracted_id(), Some("440524198001010013"));
        assert_eq!(result.ocr_engine_used(), Some(OcrEngineType::Paddle));
    }

    #[test]
    fn test_invalid_checksum_is_reported() {
        let mut p = pipeline(
            FixedEngine::boxed(OcrEngineType::Tesseract, &["110105194912310021"]),
            None,
        );
        let result = p.run(&card());
        assert!(!result.is_valid());
        assert_eq!(result.extracted_id(), Some("110105194912310021"));
        assert_eq!(result.failure(), Some(FailureKind::InvalidChecksum));
        assert_eq!(
            result.validation().and_then(ValidationResult::failure),
            Some(FailureKind::InvalidChecksum)
        );
        assert_eq!(result.status_message(), "校验码无效");
    }

    #[test]
    fn test_non_digit_check_char_is_not_a_candidate() {
        let mut p = pipeline(
            FixedEngine::boxed(OcrEngineType::Tesseract, &["11010519491231002Y"]),
            None,
        );
        let result = p.run(&card());
        assert_eq!(result.failure(), Some(FailureKind::NoIdPatternFound));
        assert_eq!(result.extracted_id(), None);
    }

    #[test]
    fn test_no_id_pattern() {
        let mut p = pipeline(FixedEngine::boxed(OcrEngineType::Tesseract, &["1101051949"]), None);
        let result = p.run(&card());
        assert_eq!(result.failure(), Some(FailureKind::NoIdPatternFound));
        assert_eq!(result.extracted_id(), None);
        assert_eq!(result.validation(), None);
        assert_eq!(result.ocr_engine_used(), Some(OcrEngineType::Tesseract));
        assert_eq!(result.status_message(), "未找到身份证号码");
    }

    #[test]
    fn test_no_text() {
        let mut p = pipeline(
            FixedEngine::boxed(OcrEngineType::Tesseract, &[]),
            FixedEngine::boxed(OcrEngineType::Paddle, &[""]),
        );
        let result = p.run(&card());
        assert_eq!(result.failure(), Some(FailureKind::NoTextFound));
        assert_eq!(result.ocr_engine_used(), None);
    }

    #[test]
    fn test_no_engine() {
        let mut p = pipeline(None, None);
        assert_eq!(p.run(&card()).failure(), Some(FailureKind::NoOcrEngineAvailable));
    }

    #[test]
    fn test_empty_image() {
        let mut p = pipeline(FixedEngine::boxed(OcrEngineType::Tesseract, &["11010519491231002X"]), None);
        let result = p.run(&DynamicImage::new_rgb8(0, 0));
        assert_eq!(result.failure(), Some(FailureKind::InvalidImage));
        assert_eq!(result.ocr_engine_used(), None);
    }

    #[test]
    fn test_result_serializes_camel_case() {
        let mut p = pipeline(FixedEngine::boxed(OcrEngineType::Paddle, &["11010519491231002X"]), None);
        let json = serde_json::to_value(p.run(&card())).unwrap();
        assert_eq!(json["extractedId"], "11010519491231002X");
        assert_eq!(json["ocrEngineUsed"], "paddle");
        assert_eq!(json["validation"]["isValid"], true);
        assert!(json["failure"].is_null());
    }
}
