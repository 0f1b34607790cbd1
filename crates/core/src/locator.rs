//! 身份证号码定位
//!
//! 在 OCR 文本中查找由 ASCII 字母数字组成的最大连续片段，只有恰好为
//! 17 位数字加 1 位数字或 X 的片段才算候选。中文、标点、空白均视为分隔符。

use idcheck_ocr::RawOcrText;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::fmt;

static ALNUM_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"[0-9A-Za-z]+").unwrap());

pub const ID_LENGTH: usize = 18;

/// 候选号码，恒为 18 个字符
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct IdCandidate(String);

impl IdCandidate {
    fn from_run(run: &str) -> Option<Self> {
        if run.len() != ID_LENGTH {
            return None;
        }
        let (body, last) = run.split_at(ID_LENGTH - 1);
        let body_ok = body.bytes().all(|b| b.is_ascii_digit());
        let last_ok = matches!(last, "X" | "x") || last.bytes().all(|b| b.is_ascii_digit());
        if body_ok && last_ok {
            Some(Self(run.to_ascii_uppercase()))
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IdCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 按文本顺序返回所有候选
pub fn locate_all(text: &RawOcrText) -> Vec<IdCandidate> {
    let joined = text.joined();
    ALNUM_RUN
        .find_iter(&joined)
        .filter_map(|m| IdCandidate::from_run(m.as_str()))
        .collect()
}

/// 返回第一个候选
pub fn locate(text: &RawOcrText) -> Option<IdCandidate> {
    let candidates = locate_all(text);
    if candidates.len() > 1 {
        log::debug!("[Locator] 找到 {} 个候选，取第一个", candidates.len());
    }
    candidates.into_iter().next()
}
