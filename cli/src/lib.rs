//! idcheck 命令行入口

mod config;
mod engines;
mod report;
#[cfg(test)]
mod test_support;

pub use config::{default_config_path, load_config, save_config, AppConfig, ConfigError};
pub use engines::{build_extractor, engine_status, EngineStatus};
pub use report::{ResultLog, ResultRecord};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use idcheck_core::{FailureKind, IdNumberParts, IdValidator, Pipeline, PipelineResult};

#[derive(Parser)]
#[command(
    name = "idcheck",
    version,
    about = "从身份证照片中识别并校验 18 位公民身份号码",
    after_help = "示例:\n  \
                  idcheck scan card.jpg\n  \
                  idcheck scan --save *.jpg\n  \
                  idcheck check 11010519491231002X\n  \
                  idcheck engines"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// 配置文件路径（默认位于用户配置目录）
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// 输出调试日志
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// 识别图片中的身份证号码并校验
    Scan {
        #[arg(required = true)]
        images: Vec<PathBuf>,
        /// 将结果追加到 CSV 文件
        #[arg(long)]
        save: bool,
        /// CSV 文件路径（覆盖配置中的 resultsCsv）
        #[arg(long)]
        csv: Option<PathBuf>,
        /// 以 JSON 输出
        #[arg(long)]
        json: bool,
    },
    /// 只校验输入的号码
    Check {
        #[arg(required = true)]
        ids: Vec<String>,
        /// 以 JSON 输出
        #[arg(long)]
        json: bool,
    },
    /// 查看 OCR 引擎安装状态
    Engines {
        #[arg(long)]
        json: bool,
    },
    /// 查看或初始化配置
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// 打印当前配置
    Show,
    /// 写入默认配置（已存在时需 --force）
    Init {
        #[arg(long)]
        force: bool,
    },
}

/// 单项处理结论，退出码取所有项中最严重者
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Outcome {
    Valid = 0,
    Invalid = 1,
    Error = 2,
}

impl From<Outcome> for ExitCode {
    fn from(outcome: Outcome) -> Self {
        ExitCode::from(outcome as u8)
    }
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match execute(cli) {
        Ok(outcome) => outcome.into(),
        Err(e) => {
            log::error!("{:#}", e);
            eprintln!("错误: {:#}", e);
            Outcome::Error.into()
        }
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .target(env_logger::Target::Stderr)
        .init();
}

fn execute(cli: Cli) -> anyhow::Result<Outcome> {
    let config_path = match cli.config {
        Some(path) => path,
        None => default_config_path()?,
    };

    match cli.command {
        Commands::Scan { images, save, csv, json } => {
            let config = load_config(&config_path)
                .with_context(|| format!("读取配置失败: {}", config_path.display()))?;
            let csv_path = csv.unwrap_or_else(|| config.results_csv());
            let mut pipeline = Pipeline::new(build_extractor(&config));
            scan(&mut pipeline, &images, save.then_some(csv_path.as_path()), json)
        }
        Commands::Check { ids, json } => check(&IdValidator::default(), &ids, json),
        Commands::Engines { json } => {
            let config = load_config(&config_path)
                .with_context(|| format!("读取配置失败: {}", config_path.display()))?;
            let status = engine_status(&config);
            if json {
                println!("{}", serde_json::to_string_pretty(&status)?);
            } else {
                print!("{}", status.render());
            }
            Ok(if status.tesseract.installed || status.paddle_installed {
                Outcome::Valid
            } else {
                Outcome::Invalid
            })
        }
        Commands::Config { action } => {
            match action {
                ConfigAction::Show => {
                    let config = load_config(&config_path)
                        .with_context(|| format!("读取配置失败: {}", config_path.display()))?;
                    println!("# {}", config_path.display());
                    println!("{}", serde_json::to_string_pretty(&config)?);
                }
                ConfigAction::Init { force } => {
                    if config_path.exists() && !force {
                        anyhow::bail!("配置文件已存在: {}（使用 --force 覆盖）", config_path.display());
                    }
                    save_config(&config_path, &AppConfig::default())
                        .with_context(|| format!("写入配置失败: {}", config_path.display()))?;
                    println!("已写入 {}", config_path.display());
                }
            }
            Ok(Outcome::Valid)
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ScanOutput<'a> {
    file: String,
    #[serde(flatten)]
    result: &'a PipelineResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    parts: Option<IdNumberParts>,
}

fn scan(pipeline: &mut Pipeline, images: &[PathBuf], csv_path: Option<&Path>, json: bool) -> anyhow::Result<Outcome> {
    let mut worst = Outcome::Valid;

    for path in images {
        let filename = path
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string();

        let image = match image::open(path) {
            Ok(img) => img,
            Err(e) => {
                log::error!("[Scan] 图片加载失败 {}: {}", path.display(), e);
                eprintln!("{}: 图片加载失败: {}", path.display(), e);
                worst = worst.max(Outcome::Error);
                continue;
            }
        };

        let result = pipeline.run(&image);
        let parts = scan_parts(pipeline.validator(), &result);
        if json {
            let output = ScanOutput {
                file: path.display().to_string(),
                result: &result,
                parts,
            };
            println!("{}", serde_json::to_string(&output)?);
        } else {
            println!("{}", render_scan(&path.display().to_string(), &result, parts.as_ref()));
        }

        if let Some(csv_path) = csv_path {
            let record = ResultRecord::new(&filename, &result, chrono::Local::now());
            ResultLog::append(csv_path, &record)
                .with_context(|| format!("保存结果失败: {}", csv_path.display()))?;
        }

        worst = worst.max(if result.is_valid() { Outcome::Valid } else { Outcome::Invalid });
    }

    Ok(worst)
}

/// 通过校验的号码才有分解结果
fn scan_parts(validator: &IdValidator, result: &PipelineResult) -> Option<IdNumberParts> {
    if !result.is_valid() {
        return None;
    }
    result.extracted_id().and_then(|id| validator.parse(id).ok())
}

fn render_scan(file: &str, result: &PipelineResult, parts: Option<&IdNumberParts>) -> String {
    let engine = result
        .ocr_engine_used()
        .map(|e| e.to_string())
        .unwrap_or_else(|| "-".to_string());
    let mut text = format!(
        "{}\t{}\t{}\t[{}]",
        file,
        result.extracted_id().unwrap_or("未找到"),
        result.status_message(),
        engine
    );
    if let Some(parts) = parts {
        text.push_str(&render_parts(parts));
    }
    text
}

fn render_parts(parts: &IdNumberParts) -> String {
    format!(
        "\n  地址码: {}\n  出生日期: {}\n  顺序码: {}\n  性别: {}\n  校验码: {}",
        parts.address_code,
        parts.birth_date.format("%Y-%m-%d"),
        parts.sequence_code,
        parts.sex,
        parts.checksum
    )
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CheckOutput {
    id: String,
    is_valid: bool,
    failure: Option<FailureKind>,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    parts: Option<IdNumberParts>,
}

fn check(validator: &IdValidator, ids: &[String], json: bool) -> anyhow::Result<Outcome> {
    let mut worst = Outcome::Valid;

    for raw in ids {
        let id = raw.trim();
        let validation = validator.validate(id);
        let output = CheckOutput {
            id: id.to_string(),
            is_valid: validation.is_valid(),
            failure: validation.failure(),
            message: validation.message(),
            parts: validator.parse(id).ok(),
        };

        if json {
            println!("{}", serde_json::to_string(&output)?);
        } else {
            println!("{}", render_check(&output));
        }
        worst = worst.max(if output.is_valid { Outcome::Valid } else { Outcome::Invalid });
    }

    Ok(worst)
}

fn render_check(output: &CheckOutput) -> String {
    let mut text = format!("{}\t{}", output.id, output.message);
    if let Some(parts) = &output.parts {
        text.push_str(&render_parts(parts));
    }
    text
}
