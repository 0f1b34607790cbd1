//! OCR 错误类型

use thiserror::Error;

/// 单个引擎或预处理阶段的错误
#[derive(Error, Debug)]
pub enum OcrError {
    #[error("模型加载失败: {0}")]
    ModelLoad(String),

    #[error("图像无效: {0}")]
    InvalidImage(String),

    #[error("图像处理失败: {0}")]
    ImageProcess(String),

    #[error("推理失败: {0}")]
    Inference(String),

    #[error("引擎执行失败: {0}")]
    Engine(String),

    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),
}

/// 文本提取失败原因
///
/// 与 [`OcrError`] 不同，这里只描述提取器最终的结论，具体引擎错误已记录在日志里。
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractError {
    #[error("没有可用的 OCR 引擎")]
    NoOcrEngineAvailable,

    #[error("未识别到任何文本")]
    NoTextFound,
}
