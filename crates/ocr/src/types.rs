//! OCR 共享类型定义

use serde::{Deserialize, Serialize};

/// OCR 引擎类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OcrEngineType {
    /// Tesseract OCR (CLI)，仅识别数字与 X
    Tesseract,
    /// Paddle OCR (PP-OCRv5 ONNX)
    Paddle,
}

impl std::fmt::Display for OcrEngineType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OcrEngineType::Tesseract => write!(f, "tesseract"),
            OcrEngineType::Paddle => write!(f, "paddle"),
        }
    }
}

/// OCR 识别结果（统一格式）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrTextResult {
    pub text: String,
    pub confidence: f32,
    pub bbox: BBox,
}

/// 边界框（相对坐标 0-1）
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct BBox {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

/// 原始 OCR 文本
///
/// 按引擎输出顺序（通常自上而下）排列的文本片段，不保证任何结构。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawOcrText {
    fragments: Vec<String>,
}

impl RawOcrText {
    pub fn new(fragments: Vec<String>) -> Self {
        Self { fragments }
    }

    pub fn fragments(&self) -> &[String] {
        &self.fragments
    }

    /// 所有片段去除空白后均为空
    pub fn is_blank(&self) -> bool {
        self.fragments.iter().all(|f| f.trim().is_empty())
    }

    /// 以换行拼接全部片段
    pub fn joined(&self) -> String {
        self.fragments.join("\n")
    }
}

impl From<Vec<OcrTextResult>> for RawOcrText {
    fn from(results: Vec<OcrTextResult>) -> Self {
        Self::new(results.into_iter().map(|r| r.text).collect())
    }
}

impl From<&str> for RawOcrText {
    fn from(text: &str) -> Self {
        Self::new(text.lines().map(str::to_string).collect())
    }
}

/// Tesseract 配置
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct TesseractConfig {
    /// Tesseract 可执行文件路径
    pub binary_path: Option<String>,
    /// tessdata 目录路径
    pub tessdata_path: Option<String>,
    /// 语言（如 "eng"）
    pub lang: Option<String>,
    /// 页面分割模式 (0-13)
    pub psm: Option<u8>,
    /// OCR 引擎模式 (0-3)
    pub oem: Option<u8>,
    /// 字符白名单，空字符串表示不限制
    pub char_whitelist: Option<String>,
}

impl TesseractConfig {
    pub fn binary_or_default(&self) -> &str {
        self.binary_path.as_deref().unwrap_or("tesseract")
    }

    pub fn lang_or_default(&self) -> &str {
        self.lang.as_deref().unwrap_or("eng")
    }

    pub fn psm_or_default(&self) -> u8 {
        self.psm.unwrap_or(6)
    }

    pub fn oem_or_default(&self) -> u8 {
        self.oem.unwrap_or(1)
    }

    pub fn whitelist_or_default(&self) -> &str {
        self.char_whitelist.as_deref().unwrap_or("0123456789X")
    }
}

/// Tesseract 安装状态
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TesseractStatus {
    pub installed: bool,
    pub version: Option<String>,
    pub binary_path: Option<String>,
    pub tessdata_path: Option<String>,
    pub available_langs: Vec<String>,
    pub error: Option<String>,
}

/// OCR 审计信息
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OcrAuditInfo {
    pub engine_type: OcrEngineType,
    pub engine_version: Option<String>,
    /// 引擎参数（JSON）
    pub engine_params: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_text_blank() {
        assert!(RawOcrText::default().is_blank());
        assert!(RawOcrText::new(vec!["  ".into(), "\n".into()]).is_blank());
        assert!(!RawOcrText::new(vec!["".into(), "12".into()]).is_blank());
    }

    #[test]
    fn test_raw_text_joined_keeps_order() {
        let text = RawOcrText::new(vec!["姓名 张三".into(), "11010519491231002X".into()]);
        assert_eq!(text.joined(), "姓名 张三\n11010519491231002X");
    }

    #[test]
    fn test_tesseract_defaults() {
        let config = TesseractConfig::default();
        assert_eq!(config.binary_or_default(), "tesseract");
        assert_eq!(config.lang_or_default(), "eng");
        assert_eq!(config.psm_or_default(), 6);
        assert_eq!(config.whitelist_or_default(), "0123456789X");
    }

    #[test]
    fn test_engine_type_serde() {
        let json = serde_json::to_string(&OcrEngineType::Paddle).unwrap();
        assert_eq!(json, "\"paddle\"");
        assert_eq!(OcrEngineType::Tesseract.to_string(), "tesseract");
    }
}
