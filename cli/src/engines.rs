//! 启动时构造 OCR 引擎
//!
//! 引擎加载失败只记录警告，对应位置以“不可用”注入提取器。

use serde::Serialize;

use idcheck_ocr::{
    detect_tesseract_status, is_models_installed, OcrEngine, PaddleConfig, PaddleOcrEngine,
    TesseractEngine, TesseractStatus, TextExtractor,
};

use crate::config::AppConfig;

pub fn build_extractor(config: &AppConfig) -> TextExtractor {
    let primary = init_tesseract(config);
    let fallback = init_paddle(&config.paddle_config());
    let extractor = TextExtractor::new(primary, fallback);
    log::info!("[Startup] 可用 OCR 引擎: {:?}", extractor.engine_types());
    for info in extractor.audit_infos() {
        log::debug!(
            "[Startup] {} 版本: {}, 参数: {}",
            info.engine_type,
            info.engine_version.as_deref().unwrap_or("unknown"),
            info.engine_params.as_deref().unwrap_or("{}")
        );
    }
    extractor
}

fn init_tesseract(config: &AppConfig) -> Option<Box<dyn OcrEngine>> {
    match TesseractEngine::new(config.tesseract_config()) {
        Ok(engine) => Some(Box::new(engine)),
        Err(e) => {
            log::warn!("[Startup] Tesseract OCR 初始化跳过: {}", e);
            None
        }
    }
}

fn init_paddle(config: &PaddleConfig) -> Option<Box<dyn OcrEngine>> {
    if !is_models_installed(config) {
        log::warn!("[Startup] Paddle OCR 模型未安装，跳过: {}", config.det_model_path);
        return None;
    }
    match PaddleOcrEngine::new(config) {
        Ok(engine) => Some(Box::new(engine)),
        Err(e) => {
            log::warn!("[Startup] Paddle OCR 初始化跳过: {}", e);
            None
        }
    }
}

/// 引擎安装状态
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineStatus {
    pub tesseract: TesseractStatus,
    pub paddle_installed: bool,
    pub paddle: PaddleConfig,
}

pub fn engine_status(config: &AppConfig) -> EngineStatus {
    let paddle = config.paddle_config();
    EngineStatus {
        tesseract: detect_tesseract_status(&config.tesseract_config()),
        paddle_installed: is_models_installed(&paddle),
        paddle,
    }
}

impl EngineStatus {
    pub fn render(&self) -> String {
        let mut out = String::new();
        let t = &self.tesseract;
        if t.installed {
            out.push_str(&format!(
                "Tesseract: 已安装 (版本 {})\n",
                t.version.as_deref().unwrap_or("unknown")
            ));
            out.push_str(&format!("  路径: {}\n", t.binary_path.as_deref().unwrap_or("-")));
            out.push_str(&format!("  tessdata: {}\n", t.tessdata_path.as_deref().unwrap_or("-")));
            out.push_str(&format!("  语言: {}\n", t.available_langs.join(", ")));
        } else {
            out.push_str(&format!(
                "Tesseract: 未安装 ({})\n",
                t.error.as_deref().unwrap_or("未知原因")
            ));
        }

        out.push_str(&format!(
            "Paddle OCR: {}\n",
            if self.paddle_installed { "模型已安装" } else { "模型未安装" }
        ));
        out.push_str(&format!("  检测模型: {}\n", self.paddle.det_model_path));
        out.push_str(&format!("  识别模型: {}\n", self.paddle.rec_model_path));
        out.push_str(&format!("  字典: {}\n", self.paddle.dict_path));
        out
    }
}
