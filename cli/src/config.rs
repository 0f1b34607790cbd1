use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use idcheck_ocr::{PaddleConfig, TesseractConfig};

const APP_DIR: &str = "idcheck";
const DEFAULT_RESULTS_CSV: &str = "results.csv";

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct AppConfig {
    // ============ Paddle OCR 配置（兜底引擎） ============
    /// 检测模型路径
    pub det_model_path: Option<String>,
    /// 识别模型路径
    pub rec_model_path: Option<String>,
    /// 字典文件路径
    pub dict_path: Option<String>,

    // ============ Tesseract 配置（首选引擎） ============
    pub tesseract: Option<TesseractConfig>,

    // ============ 结果记录 ============
    /// CSV 结果文件路径
    pub results_csv: Option<String>,
}

impl AppConfig {
    pub fn tesseract_config(&self) -> TesseractConfig {
        self.tesseract.clone().unwrap_or_default()
    }

    /// 模型路径，未配置的项使用数据目录下的默认文件
    pub fn paddle_config(&self) -> PaddleConfig {
        let models = models_dir().ok();
        let resolve = |explicit: &Option<String>, file: &str| {
            explicit.clone().unwrap_or_else(|| match &models {
                Some(dir) => dir.join(file).to_string_lossy().to_string(),
                None => file.to_string(),
            })
        };
        PaddleConfig {
            det_model_path: resolve(&self.det_model_path, "det.onnx"),
            rec_model_path: resolve(&self.rec_model_path, "rec.onnx"),
            dict_path: resolve(&self.dict_path, "dict.txt"),
        }
    }

    pub fn results_csv(&self) -> PathBuf {
        PathBuf::from(self.results_csv.as_deref().unwrap_or(DEFAULT_RESULTS_CSV))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config dir unavailable")]
    NoConfigDir,
    #[error("data dir unavailable")]
    NoDataDir,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    let base = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
    Ok(base.join(APP_DIR).join("config.json"))
}

pub fn models_dir() -> Result<PathBuf, ConfigError> {
    let base = dirs::data_dir().ok_or(ConfigError::NoDataDir)?;
    Ok(base.join(APP_DIR).join("ocr").join("models"))
}

/// 读取配置，文件不存在时返回默认值
pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    if !path.exists() {
        log::debug!("[Config] {} 不存在，使用默认配置", path.display());
        return Ok(AppConfig::default());
    }
    let raw = fs::read_to_string(path)?;
    let config = serde_json::from_str(&raw)?;
    log::debug!("[Config] 已加载 {}", path.display());
    Ok(config)
}

pub fn save_config(path: &Path, config: &AppConfig) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    let raw = serde_json::to_string_pretty(config)?;
    fs::write(path, raw)?;
    log::info!("[Config] 已保存到 {}", path.display());
    Ok(())
}
