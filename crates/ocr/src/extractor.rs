//! 双引擎文本提取
//!
//! 首选引擎输出为空（或失败、未安装）时，兜底引擎被调用且只调用一次。

use std::time::Instant;

use crate::engine::OcrEngine;
use crate::error::ExtractError;
use crate::preprocess::PreprocessedImage;
use crate::types::{OcrAuditInfo, OcrEngineType, RawOcrText};

/// 一次提取的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    pub text: RawOcrText,
    /// 实际产出文本的引擎
    pub engine: OcrEngineType,
}

/// 文本提取器
///
/// 引擎由调用方在启动时构造并注入；加载失败的引擎传 `None`。
pub struct TextExtractor {
    primary: Option<Box<dyn OcrEngine>>,
    fallback: Option<Box<dyn OcrEngine>>,
}

impl TextExtractor {
    pub fn new(primary: Option<Box<dyn OcrEngine>>, fallback: Option<Box<dyn OcrEngine>>) -> Self {
        Self { primary, fallback }
    }

    /// 至少有一个引擎可用
    pub fn has_engine(&self) -> bool {
        self.primary.is_some() || self.fallback.is_some()
    }

    /// 已注入的引擎类型（首选在前）
    pub fn engine_types(&self) -> Vec<OcrEngineType> {
        [&self.primary, &self.fallback]
            .into_iter()
            .flatten()
            .map(|engine| engine.engine_type())
            .collect()
    }

    /// 各引擎的审计信息（首选在前）
    pub fn audit_infos(&self) -> Vec<OcrAuditInfo> {
        [&self.primary, &self.fallback]
            .into_iter()
            .flatten()
            .map(|engine| engine.audit_info())
            .collect()
    }

    pub fn extract(&mut self, image: &PreprocessedImage) -> Result<Extraction, ExtractError> {
        if !self.has_engine() {
            log::warn!("[OCR] 没有可用的 OCR 引擎");
            return Err(ExtractError::NoOcrEngineAvailable);
        }

        let input = image.to_dynamic();
        for (tier, slot) in [("首选", &mut self.primary), ("兜底", &mut self.fallback)] {
            let Some(engine) = slot.as_mut() else {
                log::info!("[OCR] {}引擎不可用，跳过", tier);
                continue;
            };

            let engine_type = engine.engine_type();
            let start = Instant::now();
            match engine.recognize_image(&input) {
                Ok(results) => {
                    let text = RawOcrText::from(results);
                    log::info!(
                        "[OCR] {}引擎 {} 返回 {} 个片段，耗时: {} ms",
                        tier,
                        engine_type,
                        text.fragments().len(),
                        start.elapsed().as_millis()
                    );
                    if !text.is_blank() {
                        return Ok(Extraction {
                            text,
                            engine: engine_type,
                        });
                    }
                }
                Err(e) => log::warn!("[OCR] {}引擎 {} 识别失败: {}", tier, engine_type, e),
            }
        }

        Err(ExtractError::NoTextFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OcrError;
    use crate::preprocess::preprocess_card;
    use crate::types::{BBox, OcrTextResult};
    use image::DynamicImage;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// 返回固定文本并记录调用次数的引擎
    struct ScriptedEngine {
        kind: OcrEngineType,
        reply: Result<Vec<String>, String>,
        calls: Arc<AtomicUsize>,
    }

    impl ScriptedEngine {
        fn boxed(
            kind: OcrEngineType,
            reply: Result<Vec<&str>, &str>,
        ) -> (Box<dyn OcrEngine>, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            let engine = ScriptedEngine {
                kind,
                reply: reply
                    .map(|lines| lines.into_iter().map(str::to_string).collect())
                    .map_err(str::to_string),
                calls: calls.clone(),
            };
            (Box::new(engine), calls)
        }
    }

    impl OcrEngine for ScriptedEngine {
        fn engine_type(&self) -> OcrEngineType {
            self.kind
        }

        fn recognize_image(&mut self, _img: &DynamicImage) -> Result<Vec<OcrTextResult>, OcrError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.reply {
                Ok(lines) => Ok(lines
                    .iter()
                    .map(|text| OcrTextResult {
                        text: text.clone(),
                        confidence: 0.9,
                        bbox: BBox::default(),
                    })
                    .collect()),
                Err(msg) => Err(OcrError::Engine(msg.clone())),
            }
        }

        fn audit_info(&self) -> OcrAuditInfo {
            OcrAuditInfo {
                engine_type: self.kind,
                engine_version: None,
                engine_params: None,
            }
        }
    }

    fn sample() -> PreprocessedImage {
        preprocess_card(&DynamicImage::new_rgb8(8, 8)).unwrap()
    }

    #[test]
    fn test_primary_text_skips_fallback() {
        let (primary, primary_calls) = ScriptedEngine::boxed(OcrEngineType::Tesseract, Ok(vec!["11010519491231002X"]));
        let (fallback, fallback_calls) = ScriptedEngine::boxed(OcrEngineType::Paddle, Ok(vec!["other"]));
        let mut extractor = TextExtractor::new(Some(primary), Some(fallback));

        let extraction = extractor.extract(&sample()).unwrap();
        assert_eq!(extraction.engine, OcrEngineType::Tesseract);
        assert_eq!(extraction.text.joined(), "11010519491231002X");
        assert_eq!(primary_calls.load(Ordering::SeqCst), 1);
        assert_eq!(fallback_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_blank_primary_falls_back_once() {
        let (primary, primary_calls) = ScriptedEngine::boxed(OcrEngineType::Tesseract, Ok(vec!["  ", ""]));
        let (fallback, fallback_calls) = ScriptedEngine::boxed(OcrEngineType::Paddle, Ok(vec!["公民身份号码"]));
        let mut extractor = TextExtractor::new(Some(primary), Some(fallback));

        let extraction = extractor.extract(&sample()).unwrap();
        assert_eq!(extraction.engine, OcrEngineType::Paddle);
        assert_eq!(primary_calls.load(Ordering::SeqCst), 1);
        assert_eq!(fallback_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_both_blank_is_no_text_found() {
        let (primary, primary_calls) = ScriptedEngine::boxed(OcrEngineType::Tesseract, Ok(vec![]));
        let (fallback, fallback_calls) = ScriptedEngine::boxed(OcrEngineType::Paddle, Ok(vec![" "]));
        let mut extractor = TextExtractor::new(Some(primary), Some(fallback));

        assert_eq!(extractor.extract(&sample()), Err(ExtractError::NoTextFound));
        assert_eq!(primary_calls.load(Ordering::SeqCst), 1);
        assert_eq!(fallback_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_primary_error_falls_back() {
        let (primary, _) = ScriptedEngine::boxed(OcrEngineType::Tesseract, Err("crashed"));
        let (fallback, _) = ScriptedEngine::boxed(OcrEngineType::Paddle, Ok(vec!["text"]));
        let mut extractor = TextExtractor::new(Some(primary), Some(fallback));
        assert_eq!(extractor.extract(&sample()).unwrap().engine, OcrEngineType::Paddle);
    }

    #[test]
    fn test_missing_primary_uses_fallback() {
        let (fallback, calls) = ScriptedEngine::boxed(OcrEngineType::Paddle, Ok(vec!["text"]));
        let mut extractor = TextExtractor::new(None, Some(fallback));
        assert_eq!(extractor.engine_types(), vec![OcrEngineType::Paddle]);
        assert_eq!(extractor.audit_infos()[0].engine_type, OcrEngineType::Paddle);
        assert_eq!(extractor.extract(&sample()).unwrap().engine, OcrEngineType::Paddle);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_blank_primary_without_fallback() {
        let (primary, _) = ScriptedEngine::boxed(OcrEngineType::Tesseract, Ok(vec![""]));
        let mut extractor = TextExtractor::new(Some(primary), None);
        assert_eq!(extractor.extract(&sample()), Err(ExtractError::NoTextFound));
    }

    #[test]
    fn test_no_engines() {
        let mut extractor = TextExtractor::new(None, None);
        assert!(!extractor.has_engine());
        assert_eq!(extractor.extract(&sample()), Err(ExtractError::NoOcrEngineAvailable));
    }
}
