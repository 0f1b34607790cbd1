//! 文字识别模块
//!
//! 使用 CRNN 模型识别检测到的文字区域，CTC 贪心解码

use ndarray::{Array4, ArrayView2};
use ort::session::Session;
use ort::value::Tensor;
use std::path::Path;

use crate::error::OcrError;
use crate::threading::apply_session_threads;

/// 文字识别器
pub(crate) struct TextRecognizer {
    session: Session,
    charset: Vec<String>,
}

/// 单行识别结果
#[derive(Debug, Clone, Default)]
pub(crate) struct RecognitionResult {
    pub text: String,
    pub confidence: f32,
}

impl TextRecognizer {
    /// 从 ONNX 模型文件和字典文件创建识别器
    pub fn new(model_path: &Path, dict_path: &Path) -> Result<Self, OcrError> {
        let builder = Session::builder()
            .map_err(|e: ort::Error| OcrError::ModelLoad(e.to_string()))?;
        let builder = apply_session_threads(builder)
            .map_err(|e| OcrError::ModelLoad(e.to_string()))?;
        let session = builder
            .commit_from_file(model_path)
            .map_err(|e| OcrError::ModelLoad(format!("加载识别模型失败: {}", e)))?;

        let charset = load_charset(dict_path)?;
        log::info!("[OCR] 加载字符集: {} 个字符", charset.len());

        Ok(Self { session, charset })
    }

    /// 批量识别，输入形状 (N, 3, 48, W)
    pub fn recognize_batch(&mut self, input: Array4<f32>) -> Result<Vec<RecognitionResult>, OcrError> {
        let input_tensor = Tensor::from_array(input)
            .map_err(|e| OcrError::Inference(e.to_string()))?;

        let outputs = self
            .session
            .run(ort::inputs![input_tensor])
            .map_err(|e| OcrError::Inference(format!("识别推理失败: {}", e)))?;

        let logits = outputs[0]
            .try_extract_array::<f32>()
            .map_err(|e| OcrError::Inference(e.to_string()))?
            .to_owned();
        drop(outputs);

        let logits = logits
            .into_dimensionality::<ndarray::Ix3>()
            .map_err(|e| OcrError::Inference(format!("意外的输出形状: {}", e)))?;

        Ok(logits
            .outer_iter()
            .map(|steps| ctc_greedy_decode(steps, &self.charset))
            .collect())
    }
}

/// CTC 贪心解码
///
/// 下标 0 为 blank，其余下标减 1 后对应字典字符；相邻重复只保留一次。
fn ctc_greedy_decode(steps: ArrayView2<f32>, charset: &[String]) -> RecognitionResult {
    let mut text = String::new();
    let mut prob_sum = 0.0f32;
    let mut kept = 0u32;
    let mut previous: Option<usize> = None;

    for row in steps.outer_iter() {
        let (best, prob) = row
            .iter()
            .copied()
            .enumerate()
            .fold((0usize, f32::NEG_INFINITY), |acc, (idx, p)| if p > acc.1 { (idx, p) } else { acc });

        if best != 0 && previous != Some(best) {
            if let Some(ch) = charset.get(best - 1) {
                text.push_str(ch);
                prob_sum += prob;
                kept += 1;
            }
        }
        previous = Some(best);
    }

    let confidence = if kept > 0 { prob_sum / kept as f32 } else { 0.0 };
    RecognitionResult { text, confidence }
}

/// 读取 PP-OCR 字典，末尾追加空格字符（use_space_char）
fn load_charset(path: &Path) -> Result<Vec<String>, OcrError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| OcrError::ModelLoad(format!("加载字符集失败: {}", e)))?;
    let mut charset: Vec<String> = content
        .lines()
        .map(|line| line.trim_end_matches('\r').to_string())
        .collect();
    if charset.is_empty() {
        return Err(OcrError::ModelLoad("字符集为空".to_string()));
    }
    charset.push(" ".to_string());
    Ok(charset)
}
