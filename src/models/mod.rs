//! # 数据模型模块
//!
//! 定义批量转换的任务、配置与结果数据模型。
//!
//! ## 依赖关系
//! - 被 `batch/` 和 `commands/` 使用
//! - 子模块: task, config, report

pub mod config;
pub mod report;
pub mod task;

pub use config::{BatchConfig, FilenameFormat, InputSpec};
pub use report::{BatchConversionResult, BatchError};
pub use task::{ConversionStats, ConversionTask, TaskResult};
