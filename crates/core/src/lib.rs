//! 身份证号码识别与校验核心

pub mod error;
pub mod locator;
pub mod pipeline;
pub mod validator;

pub use error::FailureKind;
pub use locator::{locate, locate_all, IdCandidate};
pub use pipeline::{Pipeline, PipelineResult};
pub use validator::{checksum_char, validate_id, IdNumberParts, IdValidator, Sex, ValidationResult};
