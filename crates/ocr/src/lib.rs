//! 身份证图像 OCR
//!
//! - 固定流程的证件图像预处理（灰度、去噪、自适应二值化）
//! - Tesseract (CLI) 首选引擎，限定数字与 X
//! - PP-OCRv5 (ONNX Runtime) 兜底引擎
//! - 带单次兜底的文本提取器

mod det;
mod engine;
mod error;
mod extractor;
mod paddle;
mod preprocess;
mod rec;
mod tensor;
mod tesseract;
mod threading;
mod types;

pub use engine::OcrEngine;
pub use error::{ExtractError, OcrError};
pub use extractor::{Extraction, TextExtractor};
pub use paddle::{is_models_installed, PaddleConfig, PaddleOcrEngine};
pub use preprocess::{adaptive_threshold_gaussian, nl_means_denoise, preprocess_card, PreprocessedImage};
pub use tesseract::{detect_tesseract_status, get_tesseract_langs, get_tesseract_version, TesseractEngine};
pub use types::*;
