//! Tesseract OCR 引擎实现（CLI 包装）
//!
//! 默认只识别 `0123456789X`，作为低延迟的首选引擎。

use image::DynamicImage;
use std::collections::BTreeMap;
use std::path::Path;
use std::process::Command;
use std::time::Instant;

use crate::engine::OcrEngine;
use crate::error::OcrError;
use crate::types::{BBox, OcrAuditInfo, OcrEngineType, OcrTextResult, TesseractConfig, TesseractStatus};

/// Tesseract OCR 引擎
pub struct TesseractEngine {
    config: TesseractConfig,
    version: String,
}

impl TesseractEngine {
    /// 创建 Tesseract 引擎，可执行文件不可用时返回错误
    pub fn new(config: TesseractConfig) -> Result<Self, OcrError> {
        let version = get_tesseract_version(config.binary_or_default())?;
        log::info!("[Tesseract] 初始化成功，版本: {}", version);
        Ok(Self { config, version })
    }

    fn build_command(&self, image_path: &Path) -> Command {
        let mut cmd = Command::new(self.config.binary_or_default());
        cmd.arg(image_path)
            .arg("stdout")
            .arg("-l")
            .arg(self.config.lang_or_default())
            .arg("--psm")
            .arg(self.config.psm_or_default().to_string())
            .arg("--oem")
            .arg(self.config.oem_or_default().to_string());

        let whitelist = self.config.whitelist_or_default();
        if !whitelist.is_empty() {
            cmd.arg("-c").arg(format!("tessedit_char_whitelist={}", whitelist));
        }
        cmd.arg("tsv");

        if let Some(tessdata_path) = &self.config.tessdata_path {
            cmd.env("TESSDATA_PREFIX", tessdata_path);
        }
        cmd
    }

    /// 识别磁盘上的图片文件
    pub fn recognize_path(&self, image_path: &Path, img_w: u32, img_h: u32) -> Result<Vec<OcrTextResult>, OcrError> {
        let mut cmd = self.build_command(image_path);
        log::info!("[Tesseract] 执行: {:?}", cmd);

        let output = cmd
            .output()
            .map_err(|e| OcrError::Engine(format!("执行 tesseract 失败: {}", e)))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(OcrError::Engine(format!("Tesseract 执行失败: {}", stderr.trim())));
        }

        let tsv = String::from_utf8_lossy(&output.stdout);
        Ok(group_lines(parse_tesseract_tsv(&tsv, img_w as f32, img_h as f32)))
    }
}

impl OcrEngine for TesseractEngine {
    fn engine_type(&self) -> OcrEngineType {
        OcrEngineType::Tesseract
    }

    fn recognize_image(&mut self, img: &DynamicImage) -> Result<Vec<OcrTextResult>, OcrError> {
        let start = Instant::now();

        // 临时文件在离开作用域时删除
        let temp_input = tempfile::Builder::new()
            .prefix("idcheck-tesseract-")
            .suffix(".png")
            .tempfile()?;
        img.save_with_format(temp_input.path(), image::ImageFormat::Png)
            .map_err(|e| OcrError::ImageProcess(format!("保存临时图片失败: {}", e)))?;

        let results = self.recognize_path(temp_input.path(), img.width(), img.height())?;

        log::info!(
            "[Tesseract] 识别完成，耗时: {} ms，行数: {}",
            start.elapsed().as_millis(),
            results.len()
        );
        Ok(results)
    }

    fn audit_info(&self) -> OcrAuditInfo {
        let params = serde_json::json!({
            "lang": self.config.lang_or_default(),
            "psm": self.config.psm_or_default(),
            "oem": self.config.oem_or_default(),
            "whitelist": self.config.whitelist_or_default(),
        });

        OcrAuditInfo {
            engine_type: OcrEngineType::Tesseract,
            engine_version: Some(self.version.clone()),
            engine_params: Some(params.to_string()),
        }
    }
}

/// TSV 中的单词及其所在行
#[derive(Debug, Clone)]
struct TsvWord {
    line_key: (u32, u32, u32, u32),
    result: OcrTextResult,
}

/// 解析 Tesseract TSV 输出
///
/// TSV 格式：
/// level\tpage_num\tblock_num\tpar_num\tline_num\tword_num\tleft\ttop\twidth\theight\tconf\ttext
fn parse_tesseract_tsv(tsv: &str, img_width: f32, img_height: f32) -> Vec<TsvWord> {
    tsv.lines()
        .skip(1)
        .filter_map(|line| {
            let cols: Vec<&str> = line.split('\t').collect();
            if cols.len() < 12 {
                return None;
            }
            let num = |i: usize| cols[i].trim().parse::<f32>().unwrap_or(-1.0);
            let text = cols[11].trim();

            // 只处理 word 级别 (level=5)
            if num(0) as i32 != 5 || text.is_empty() || num(10) < 0.0 {
                return None;
            }

            Some(TsvWord {
                line_key: (num(1) as u32, num(2) as u32, num(3) as u32, num(4) as u32),
                result: OcrTextResult {
                    text: text.to_string(),
                    confidence: num(10) / 100.0,
                    bbox: BBox {
                        x: num(6) / img_width,
                        y: num(7) / img_height,
                        w: num(8) / img_width,
                        h: num(9) / img_height,
                    },
                },
            })
        })
        .collect()
}

/// 将单词合并为文本行，行内以空格连接，按 (页, 块, 段, 行) 排序
fn group_lines(words: Vec<TsvWord>) -> Vec<OcrTextResult> {
    let mut lines: BTreeMap<(u32, u32, u32, u32), Vec<OcrTextResult>> = BTreeMap::new();
    for word in words {
        lines.entry(word.line_key).or_default().push(word.result);
    }

    lines
        .into_values()
        .map(|words| {
            let text = words.iter().map(|w| w.text.as_str()).collect::<Vec<_>>().join(" ");
            let confidence = words.iter().map(|w| w.confidence).sum::<f32>() / words.len() as f32;
            let left = words.iter().map(|w| w.bbox.x).fold(f32::INFINITY, f32::min);
            let top = words.iter().map(|w| w.bbox.y).fold(f32::INFINITY, f32::min);
            let right = words.iter().map(|w| w.bbox.x + w.bbox.w).fold(f32::NEG_INFINITY, f32::max);
            let bottom = words.iter().map(|w| w.bbox.y + w.bbox.h).fold(f32::NEG_INFINITY, f32::max);
            OcrTextResult {
                text,
                confidence,
                bbox: BBox {
                    x: left,
                    y: top,
                    w: right - left,
                    h: bottom - top,
                },
            }
        })
        .collect()
}

/// 获取 Tesseract 版本
pub fn get_tesseract_version(binary_path: &str) -> Result<String, OcrError> {
    let output = Command::new(binary_path)
        .arg("--version")
        .output()
        .map_err(|e| OcrError::Engine(format!("无法执行 tesseract: {}", e)))?;

    if !output.status.success() {
        return Err(OcrError::Engine("tesseract --version 执行失败".to_string()));
    }

    // 部分版本把版本信息打印到 stderr
    let combined = format!(
        "{}{}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
    Ok(parse_version(&combined).unwrap_or_else(|| "unknown".to_string()))
}

fn parse_version(output: &str) -> Option<String> {
    output
        .lines()
        .find(|line| line.trim_start().starts_with("tesseract"))
        .and_then(|line| line.split_whitespace().nth(1))
        .map(|v| v.trim_start_matches('v').to_string())
}

/// 获取 Tesseract 可用语言列表
pub fn get_tesseract_langs(binary_path: &str, tessdata_path: Option<&str>) -> Result<Vec<String>, OcrError> {
    let mut cmd = Command::new(binary_path);
    cmd.arg("--list-langs");
    if let Some(path) = tessdata_path {
        cmd.env("TESSDATA_PREFIX", path);
    }

    let output = cmd
        .output()
        .map_err(|e| OcrError::Engine(format!("执行失败: {}", e)))?;
    let combined = format!(
        "{}{}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
    Ok(parse_lang_list(&combined))
}

fn parse_lang_list(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .skip_while(|line| !line.contains("List of available languages"))
        .skip(1)
        .filter(|line| !line.is_empty() && !line.contains(':'))
        .map(str::to_string)
        .collect()
}

/// 检测 Tesseract 安装状态
///
/// 依次尝试配置的路径、PATH 中的 tesseract、常见安装位置。
pub fn detect_tesseract_status(config: &TesseractConfig) -> TesseractStatus {
    let mut candidates = vec![config.binary_or_default().to_string()];
    candidates.extend(which_tesseract("tesseract"));
    candidates.extend(common_install_paths().into_iter().filter(|p| Path::new(p).exists()));

    for binary in candidates {
        if let Ok(version) = get_tesseract_version(&binary) {
            let langs = get_tesseract_langs(&binary, config.tessdata_path.as_deref()).unwrap_or_default();
            let tessdata = config
                .tessdata_path
                .clone()
                .or_else(find_tessdata_path);

            return TesseractStatus {
                installed: true,
                version: Some(version),
                binary_path: which_tesseract(&binary).or(Some(binary)),
                tessdata_path: tessdata,
                available_langs: langs,
                error: None,
            };
        }
    }

    TesseractStatus {
        installed: false,
        version: None,
        binary_path: None,
        tessdata_path: None,
        available_langs: Vec::new(),
        error: Some("无法检测到 Tesseract，请确认已安装并正确配置".to_string()),
    }
}

/// 查找 tesseract 可执行文件的完整路径
fn which_tesseract(binary: &str) -> Option<String> {
    let finder = if cfg!(target_os = "windows") { "where" } else { "which" };
    Command::new(finder)
        .arg(binary)
        .output()
        .ok()
        .filter(|o| o.status.success())
        .and_then(|o| {
            String::from_utf8_lossy(&o.stdout)
                .lines()
                .next()
                .map(|s| s.trim().to_string())
        })
        .filter(|s| !s.is_empty())
}

fn common_install_paths() -> Vec<String> {
    if !cfg!(target_os = "windows") {
        return Vec::new();
    }

    let mut paths = vec![
        "C:\\Program Files\\Tesseract-OCR\\tesseract.exe".to_string(),
        "C:\\Program Files (x86)\\Tesseract-OCR\\tesseract.exe".to_string(),
    ];
    if let Ok(user) = std::env::var("USERNAME") {
        paths.push(format!(
            "C:\\Users\\{}\\AppData\\Local\\Programs\\Tesseract-OCR\\tesseract.exe",
            user
        ));
    }
    paths
}

/// 查找 tessdata 路径
fn find_tessdata_path() -> Option<String> {
    if let Ok(path) = std::env::var("TESSDATA_PREFIX") {
        if Path::new(&path).exists() {
            return Some(path);
        }
    }

    [
        "/usr/share/tesseract-ocr/5/tessdata",
        "/usr/share/tesseract-ocr/4.00/tessdata",
        "/usr/share/tessdata",
        "/usr/local/share/tessdata",
        "/opt/homebrew/share/tessdata",
        "C:\\Program Files\\Tesseract-OCR\\tessdata",
    ]
    .into_iter()
    .find(|p| Path::new(p).exists())
    .map(str::to_string)
}
