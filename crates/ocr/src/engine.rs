//! OCR 引擎 trait 定义

use image::DynamicImage;

use crate::error::OcrError;
use crate::types::{OcrAuditInfo, OcrEngineType, OcrTextResult};

/// OCR 引擎统一 trait
///
/// 引擎在进程启动时构造一次，之后由 [`crate::TextExtractor`] 持有并复用。
pub trait OcrEngine: Send {
    /// 引擎类型
    fn engine_type(&self) -> OcrEngineType;

    /// 识别图片中的文字，结果按阅读顺序排列
    fn recognize_image(&mut self, img: &DynamicImage) -> Result<Vec<OcrTextResult>, OcrError>;

    /// 获取审计信息
    fn audit_info(&self) -> OcrAuditInfo;
}
