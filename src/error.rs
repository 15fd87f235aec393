//! # 统一错误处理模块
//!
//! 定义 mdbatch 的所有错误类型，使用 `thiserror` 派生。
//!
//! ## 依赖关系
//! - 被所有其他模块使用
//! - 由 `batch/classify.rs` 映射为 `ErrorKind`

use thiserror::Error;

/// mdbatch 统一错误类型
#[derive(Error, Debug)]
pub enum MdBatchError {
    // ─────────────────────────────────────────────────────────────
    // I/O 错误
    // ─────────────────────────────────────────────────────────────
    #[error("Failed to read file: {path}")]
    FileReadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file: {path}")]
    FileWriteError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to create directory: {path}")]
    DirectoryCreateError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("File not found: {path}")]
    FileNotFound { path: String },

    #[error("Permission denied: {path}")]
    PermissionDenied { path: String },

    // ─────────────────────────────────────────────────────────────
    // 发现阶段错误
    // ─────────────────────────────────────────────────────────────
    #[error("No markdown files found matching: {pattern}")]
    NoFilesFound { pattern: String },

    #[error("Invalid pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("Not a markdown file: {path}")]
    InvalidFormat { path: String },

    // ─────────────────────────────────────────────────────────────
    // 转换错误
    // ─────────────────────────────────────────────────────────────
    #[error("Failed to parse {path}\nReason: {reason}")]
    ParseError { path: String, reason: String },

    #[error("Conversion failed: {path}\nReason: {reason}")]
    ConversionError { path: String, reason: String },

    #[error("External command '{command}' not found in PATH")]
    CommandNotFound { command: String },

    #[error("External command failed: {command}\n{stderr}")]
    CommandFailed { command: String, stderr: String },

    // ─────────────────────────────────────────────────────────────
    // 调度错误
    // ─────────────────────────────────────────────────────────────
    #[error("Batch cancelled after {completed} of {total} file(s)")]
    Cancelled { completed: usize, total: usize },

    #[error("Failed to build worker pool: {0}")]
    WorkerPool(String),

    // ─────────────────────────────────────────────────────────────
    // 参数错误
    // ─────────────────────────────────────────────────────────────
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    // ─────────────────────────────────────────────────────────────
    // 报告导出错误
    // ─────────────────────────────────────────────────────────────
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

/// Result 类型别名
pub type Result<T> = std::result::Result<T, MdBatchError>;
