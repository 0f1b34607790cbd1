//! 身份证号码校验
//!
//! 依次检查长度、地址码、出生日期、顺序码和校验码，遇到第一项失败即停止。

use chrono::{Datelike, Local, NaiveDate};
use serde::Serialize;
use std::fmt;

use crate::error::FailureKind;
use crate::locator::ID_LENGTH;

/// 前 17 位的加权因子
const WEIGHTS: [u32; 17] = [7, 9, 10, 5, 8, 4, 2, 1, 6, 3, 7, 9, 10, 5, 8, 4, 2];
/// 加权和模 11 对应的校验码
const CHECK_CODES: [char; 11] = ['1', '0', 'X', '9', '8', '7', '6', '5', '4', '3', '2'];

const MIN_BIRTH_YEAR: i32 = 1900;

/// 计算 17 位数字前缀对应的校验码，输入不是 17 位 ASCII 数字时返回 `None`
pub fn checksum_char(prefix: &str) -> Option<char> {
    if prefix.len() != ID_LENGTH - 1 || !prefix.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let sum: u32 = prefix
        .bytes()
        .zip(WEIGHTS)
        .map(|(b, w)| u32::from(b - b'0') * w)
        .sum();
    Some(CHECK_CODES[(sum % 11) as usize])
}

/// 使用默认校验器校验
pub fn validate_id(id: &str) -> ValidationResult {
    IdValidator::default().validate(id)
}

/// 单个号码的校验结果，创建后不可修改
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    candidate: String,
    is_valid: bool,
    failure: Option<FailureKind>,
}

impl ValidationResult {
    fn passed(candidate: &str) -> Self {
        Self {
            candidate: candidate.to_string(),
            is_valid: true,
            failure: None,
        }
    }

    fn failed(candidate: &str, kind: FailureKind) -> Self {
        Self {
            candidate: candidate.to_string(),
            is_valid: false,
            failure: Some(kind),
        }
    }

    pub fn candidate(&self) -> &str {
        &self.candidate
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid
    }

    pub fn failure(&self) -> Option<FailureKind> {
        self.failure
    }

    pub fn message(&self) -> String {
        match self.failure {
            None => "身份证号码格式有效".to_string(),
            Some(kind) => kind.to_string(),
        }
    }
}

/// 性别，由顺序码奇偶决定
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Sex {
    Male,
    Female,
}

impl fmt::Display for Sex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sex::Male => write!(f, "男"),
            Sex::Female => write!(f, "女"),
        }
    }
}

/// 已通过校验的号码分解
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IdNumberParts {
    pub address_code: String,
    pub birth_date: NaiveDate,
    pub sequence_code: String,
    pub checksum: char,
    pub sex: Sex,
}

/// 号码校验器
///
/// 出生年份上限在构造时确定，之后 `validate` 对相同输入总是返回相同结果。
#[derive(Debug, Clone, Copy)]
pub struct IdValidator {
    max_year: i32,
}

impl Default for IdValidator {
    fn default() -> Self {
        Self {
            max_year: Local::now().year(),
        }
    }
}

impl IdValidator {
    /// 固定出生年份上限
    pub fn with_max_year(max_year: i32) -> Self {
        Self { max_year }
    }

    pub fn max_year(&self) -> i32 {
        self.max_year
    }

    pub fn validate(&self, id: &str) -> ValidationResult {
        match self.check(id) {
            Ok(_) => ValidationResult::passed(id),
            Err(kind) => {
                log::debug!("[Validator] {} 校验失败: {}", id, kind);
                ValidationResult::failed(id, kind)
            }
        }
    }

    /// 校验并分解号码
    pub fn parse(&self, id: &str) -> Result<IdNumberParts, FailureKind> {
        let birth_date = self.check(id)?;
        // check 通过后 id 为 18 位 ASCII
        let sequence_code = &id[14..17];
        let sex = if (sequence_code.as_bytes()[2] - b'0') % 2 == 1 {
            Sex::Male
        } else {
            Sex::Female
        };
        Ok(IdNumberParts {
            address_code: id[..6].to_string(),
            birth_date,
            sequence_code: sequence_code.to_string(),
            checksum: id.as_bytes()[17].to_ascii_uppercase() as char,
            sex,
        })
    }

    /// 五项检查，成功时返回出生日期
    fn check(&self, id: &str) -> Result<NaiveDate, FailureKind> {
        let chars: Vec<char> = id.chars().collect();
        if chars.len() != ID_LENGTH {
            return Err(FailureKind::InvalidLength);
        }

        if !all_digits(&chars[..6]) {
            return Err(FailureKind::InvalidAddressCode);
        }

        let birth_date = self
            .birth_date(&chars[6..14])
            .ok_or(FailureKind::InvalidBirthDate)?;

        if !all_digits(&chars[14..17]) {
            return Err(FailureKind::InvalidSequenceCode);
        }

        // 前 17 位此时均为 ASCII 数字
        let prefix: String = chars[..17].iter().collect();
        let expected = checksum_char(&prefix).ok_or(FailureKind::InvalidChecksum)?;
        if !chars[17].eq_ignore_ascii_case(&expected) {
            return Err(FailureKind::InvalidChecksum);
        }

        Ok(birth_date)
    }

    fn birth_date(&self, chars: &[char]) -> Option<NaiveDate> {
        if !all_digits(chars) {
            return None;
        }
        let year = to_number(&chars[..4]) as i32;
        let month = to_number(&chars[4..6]);
        let day = to_number(&chars[6..8]);
        if !(MIN_BIRTH_YEAR..=self.max_year).contains(&year) {
            return None;
        }
        NaiveDate::from_ymd_opt(year, month, day)
    }
}

fn all_digits(chars: &[char]) -> bool {
    chars.iter().all(char::is_ascii_digit)
}

fn to_number(chars: &[char]) -> u32 {
    chars
        .iter()
        .filter_map(|c| c.to_digit(10))
        .fold(0, |acc, d| acc * 10 + d)
}
