//! # 错误分类器
//!
//! 将原始失败映射为封闭的错误类型集合，并给出是否可重试的判定。
//!
//! ## 重试规则
//! - `PermissionDenied`、`InvalidFormat`: 不可重试
//! - 其余（包括 `Unknown`）: 可重试
//!
//! ## 依赖关系
//! - 被 `batch/discovery.rs`, `batch/output_paths.rs`, `batch/scheduler.rs` 使用
//! - 识别 `error.rs` 的 `MdBatchError` 与 `std::io::Error`
//! - 使用 `regex` 做消息兜底匹配

use crate::error::MdBatchError;

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::io;
use std::sync::OnceLock;

/// 错误类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    FileNotFound,
    PermissionDenied,
    InvalidFormat,
    SystemError,
    ParseError,
    ConversionError,
    Unknown,
}

impl ErrorKind {
    /// 是否可重试
    pub fn can_retry(self) -> bool {
        !matches!(self, ErrorKind::PermissionDenied | ErrorKind::InvalidFormat)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::FileNotFound => "file_not_found",
            ErrorKind::PermissionDenied => "permission_denied",
            ErrorKind::InvalidFormat => "invalid_format",
            ErrorKind::SystemError => "system_error",
            ErrorKind::ParseError => "parse_error",
            ErrorKind::ConversionError => "conversion_error",
            ErrorKind::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 已分类的错误
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifiedError {
    pub kind: ErrorKind,
    pub message: String,
}

impl ClassifiedError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        ClassifiedError {
            kind,
            message: message.into(),
        }
    }

    pub fn can_retry(&self) -> bool {
        self.kind.can_retry()
    }
}

impl std::fmt::Display for ClassifiedError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)
    }
}

impl From<&MdBatchError> for ClassifiedError {
    fn from(err: &MdBatchError) -> Self {
        ClassifiedError::new(classify_batch_error(err), err.to_string())
    }
}

impl From<MdBatchError> for ClassifiedError {
    fn from(err: MdBatchError) -> Self {
        ClassifiedError::from(&err)
    }
}

/// 分类转换器返回的错误
///
/// 按错误链顺序查找第一个可识别的错误，找不到时退回消息匹配。
pub fn classify(err: &anyhow::Error) -> ClassifiedError {
    let message = format!("{:#}", err);

    for cause in err.chain() {
        if let Some(e) = cause.downcast_ref::<MdBatchError>() {
            let kind = classify_batch_error(e);
            if kind != ErrorKind::Unknown {
                return ClassifiedError::new(kind, message);
            }
        } else if let Some(e) = cause.downcast_ref::<io::Error>() {
            return ClassifiedError::new(classify_io(e), message);
        }
    }

    ClassifiedError::new(classify_message(&message), message)
}

/// 分类 crate 内部错误
pub fn classify_batch_error(err: &MdBatchError) -> ErrorKind {
    match err {
        MdBatchError::FileReadError { source, .. }
        | MdBatchError::FileWriteError { source, .. }
        | MdBatchError::DirectoryCreateError { source, .. } => classify_io(source),
        MdBatchError::FileNotFound { .. } | MdBatchError::NoFilesFound { .. } => {
            ErrorKind::FileNotFound
        }
        MdBatchError::PermissionDenied { .. } => ErrorKind::PermissionDenied,
        MdBatchError::InvalidPattern { .. }
        | MdBatchError::InvalidFormat { .. }
        | MdBatchError::InvalidConfig(_)
        | MdBatchError::InvalidArgument(_) => ErrorKind::InvalidFormat,
        MdBatchError::ParseError { .. } => ErrorKind::ParseError,
        MdBatchError::ConversionError { .. } | MdBatchError::CommandFailed { .. } => {
            ErrorKind::ConversionError
        }
        MdBatchError::CommandNotFound { .. }
        | MdBatchError::Cancelled { .. }
        | MdBatchError::WorkerPool(_)
        | MdBatchError::CsvError(_)
        | MdBatchError::JsonError(_) => ErrorKind::SystemError,
        MdBatchError::Other(msg) => classify_message(msg),
    }
}

/// 分类 I/O 错误
pub fn classify_io(err: &io::Error) -> ErrorKind {
    match err.kind() {
        io::ErrorKind::NotFound => ErrorKind::FileNotFound,
        io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied,
        io::ErrorKind::InvalidData | io::ErrorKind::InvalidInput => ErrorKind::InvalidFormat,
        _ => ErrorKind::SystemError,
    }
}

/// 按错误消息兜底分类
pub fn classify_message(message: &str) -> ErrorKind {
    static RULES: OnceLock<Vec<(Regex, ErrorKind)>> = OnceLock::new();

    let rules = RULES.get_or_init(|| {
        [
            (r"(?i)\bENOENT\b|no such file|not found", ErrorKind::FileNotFound),
            (r"(?i)\bE(ACCES|PERM)\b|permission denied|access is denied", ErrorKind::PermissionDenied),
            (r"(?i)invalid (file )?format|unsupported (file )?(type|format)", ErrorKind::InvalidFormat),
            (r"(?i)\bparse\b|parsing|syntax error", ErrorKind::ParseError),
            (r"(?i)\bE(NOSPC|MFILE|NFILE|BUSY|AGAIN)\b|timed? ?out|out of memory", ErrorKind::SystemError),
            (r"(?i)conver(t|sion)|render(ing)?|\bpdf\b", ErrorKind::ConversionError),
        ]
        .into_iter()
        .filter_map(|(pattern, kind)| Regex::new(pattern).ok().map(|re| (re, kind)))
        .collect()
    });

    rules
        .iter()
        .find(|(re, _)| re.is_match(message))
        .map(|(_, kind)| *kind)
        .unwrap_or(ErrorKind::Unknown)
}

/// 将转换器 panic 的载荷转为错误
pub fn classify_panic(payload: &(dyn Any + Send)) -> ClassifiedError {
    let detail = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic payload".to_string());

    ClassifiedError::new(
        ErrorKind::ConversionError,
        format!("converter panicked: {}", detail),
    )
}
