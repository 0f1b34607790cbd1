use idcheck_ocr::ExtractError;
use serde::{Deserialize, Serialize};

/// 流水线各阶段的失败类型
///
/// 前四项属于流程阶段（图像、引擎、文字、号码定位），其余五项与校验顺序一一对应。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, thiserror::Error)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    #[error("图像无效")]
    InvalidImage,
    #[error("没有可用的 OCR 引擎")]
    NoOcrEngineAvailable,
    #[error("未识别到文字")]
    NoTextFound,
    #[error("未找到身份证号码")]
    NoIdPatternFound,
    #[error("长度无效")]
    InvalidLength,
    #[error("地址码无效（前6位）")]
    InvalidAddressCode,
    #[error("出生日期无效")]
    InvalidBirthDate,
    #[error("顺序码无效")]
    InvalidSequenceCode,
    #[error("校验码无效")]
    InvalidChecksum,
}

impl FailureKind {
    /// 是否为号码本身的格式问题（而非识别流程问题）
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            FailureKind::InvalidLength
                | FailureKind::InvalidAddressCode
                | FailureKind::InvalidBirthDate
                | FailureKind::InvalidSequenceCode
                | FailureKind::InvalidChecksum
        )
    }
}

impl From<ExtractError> for FailureKind {
    fn from(err: ExtractError) -> Self {
        match err {
            ExtractError::NoOcrEngineAvailable => FailureKind::NoOcrEngineAvailable,
            ExtractError::NoTextFound => FailureKind::NoTextFound,
        }
    }
}
