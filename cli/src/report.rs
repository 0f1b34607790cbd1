//! CSV 结果记录

use chrono::{DateTime, Local};
use serde::Serialize;
use std::fs::OpenOptions;
use std::path::Path;

use idcheck_core::PipelineResult;

const NOT_FOUND: &str = "未找到";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// 单行记录，字段名即表头
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResultRecord {
    pub filename: String,
    pub extracted_id: String,
    pub verification_status: String,
    pub timestamp: String,
}

impl ResultRecord {
    pub fn new(filename: &str, result: &PipelineResult, at: DateTime<Local>) -> Self {
        Self {
            filename: filename.to_string(),
            extracted_id: result.extracted_id().unwrap_or(NOT_FOUND).to_string(),
            verification_status: if result.is_valid() { "有效" } else { "无效" }.to_string(),
            timestamp: at.format(TIMESTAMP_FORMAT).to_string(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
}

pub struct ResultLog;

impl ResultLog {
    /// 追加一行，仅在文件新建（或为空）时写表头
    pub fn append(path: &Path, record: &ResultRecord) -> Result<(), ReportError> {
        let is_new = std::fs::metadata(path).map(|m| m.len() == 0).unwrap_or(true);
        let file = OpenOptions::new().create(true).append(true).open(path)?;

        let mut writer = csv::WriterBuilder::new().has_headers(is_new).from_writer(file);
        writer.serialize(record)?;
        writer.flush()?;
        log::info!("[Report] 结果已保存到 {}", path.display());
        Ok(())
    }
}
