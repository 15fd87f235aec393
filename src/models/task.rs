//! # 转换任务数据模型
//!
//! 单个输入文件到输出文件的转换单元，以及其执行结果。
//!
//! ## 依赖关系
//! - 被 `batch/discovery.rs` 创建
//! - 被 `batch/output_paths.rs` 改写输出路径
//! - 被 `batch/scheduler.rs` 消费

use crate::batch::classify::ClassifiedError;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// 转换任务
///
/// `output_path` 只在冲突消解阶段被改写一次，进入调度后不再变化。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionTask {
    /// 输入文件绝对路径
    pub input_path: PathBuf,
    /// 输出文件绝对路径
    pub output_path: PathBuf,
    /// 相对于模式根目录的输入路径
    pub relative_input_path: PathBuf,
    /// 输入文件大小（字节）
    pub size: u64,
    /// 输入文件最后修改时间
    pub last_modified: Option<DateTime<Utc>>,
}

impl ConversionTask {
    pub fn new(input_path: impl Into<PathBuf>, output_path: impl Into<PathBuf>) -> Self {
        let input_path = input_path.into();
        let relative_input_path = input_path
            .file_name()
            .map(PathBuf::from)
            .unwrap_or_default();
        ConversionTask {
            input_path,
            output_path: output_path.into(),
            relative_input_path,
            size: 0,
            last_modified: None,
        }
    }
}

/// 转换统计信息（由转换器回调提供）
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionStats {
    pub input_size: u64,
    pub output_size: Option<u64>,
    pub page_count: Option<u32>,
}

/// 单个任务的执行结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub success: bool,
    pub error: Option<ClassifiedError>,
    pub processing_time: Duration,
    pub stats: Option<ConversionStats>,
}

impl TaskResult {
    /// 成功结果
    pub fn succeeded(task: &ConversionTask, processing_time: Duration, stats: ConversionStats) -> Self {
        TaskResult {
            input_path: task.input_path.clone(),
            output_path: task.output_path.clone(),
            success: true,
            error: None,
            processing_time,
            stats: Some(stats),
        }
    }

    /// 失败结果
    pub fn failed(task: &ConversionTask, processing_time: Duration, error: ClassifiedError) -> Self {
        TaskResult {
            input_path: task.input_path.clone(),
            output_path: task.output_path.clone(),
            success: false,
            error: Some(error),
            processing_time,
            stats: None,
        }
    }
}
