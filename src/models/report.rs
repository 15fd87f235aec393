//! # 批量转换结果
//!
//! 批量转换的唯一返回契约：汇总计数、有序的任务结果与错误列表。
//!
//! ## 依赖关系
//! - 被 `batch/mod.rs` 汇总生成
//! - 被 `commands/convert.rs` 与 `utils/report.rs` 读取

use crate::batch::classify::{ClassifiedError, ErrorKind};
use crate::models::task::{ConversionTask, TaskResult};

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

/// 批量错误条目
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchError {
    /// 输入路径（批次级错误为空路径）
    pub input_path: PathBuf,
    /// 计划的输出路径，用于定向重试
    pub output_path: Option<PathBuf>,
    pub error: ClassifiedError,
    pub can_retry: bool,
}

impl BatchError {
    pub fn new(input_path: impl Into<PathBuf>, error: ClassifiedError) -> Self {
        let can_retry = error.can_retry();
        BatchError {
            input_path: input_path.into(),
            output_path: None,
            error,
            can_retry,
        }
    }

    /// 针对某个任务的错误
    pub fn for_task(task: &ConversionTask, error: ClassifiedError) -> Self {
        let mut entry = Self::new(task.input_path.clone(), error);
        entry.output_path = Some(task.output_path.clone());
        entry
    }

    /// 从失败的任务结果生成
    pub fn from_result(result: &TaskResult) -> Option<Self> {
        let error = result.error.clone()?;
        let mut entry = Self::new(result.input_path.clone(), error);
        entry.output_path = Some(result.output_path.clone());
        Some(entry)
    }

    /// 批次级错误（如取消）
    pub fn batch_level(error: ClassifiedError) -> Self {
        Self::new(PathBuf::new(), error)
    }

    pub fn is_batch_level(&self) -> bool {
        self.input_path.as_os_str().is_empty()
    }

    pub fn kind(&self) -> ErrorKind {
        self.error.kind
    }
}

/// 批量转换汇总结果
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchConversionResult {
    pub success: bool,
    /// 验证前发现的文件总数
    pub total_files: usize,
    pub successful_files: usize,
    pub failed_files: usize,
    /// 当前没有任何路径产生跳过
    pub skipped_files: usize,
    pub processing_time: Duration,
    pub results: Vec<TaskResult>,
    pub errors: Vec<BatchError>,
    /// 批次是否因取消而中止
    #[serde(default)]
    pub cancelled: bool,
}

impl BatchConversionResult {
    /// 预调度阶段的意外失败，包装为单个错误
    pub fn aborted(total_files: usize, error: ClassifiedError, processing_time: Duration) -> Self {
        BatchConversionResult {
            success: false,
            total_files,
            processing_time,
            errors: vec![BatchError::batch_level(error)],
            ..Default::default()
        }
    }

    /// 已处理（成功 + 失败 + 跳过）
    pub fn processed_files(&self) -> usize {
        self.successful_files + self.failed_files + self.skipped_files
    }

    /// 可重试的失败输入，按错误出现顺序去重
    pub fn retryable_inputs(&self) -> Vec<PathBuf> {
        let mut seen = HashSet::new();
        self.errors
            .iter()
            .filter(|e| e.can_retry && !e.is_batch_level())
            .filter(|e| seen.insert(e.input_path.clone()))
            .map(|e| e.input_path.clone())
            .collect()
    }

    /// 可重试的失败条目（含计划输出路径）
    pub fn retryable_errors(&self) -> Vec<&BatchError> {
        let mut seen = HashSet::new();
        self.errors
            .iter()
            .filter(|e| e.can_retry && !e.is_batch_level() && e.output_path.is_some())
            .filter(|e| seen.insert(e.input_path.clone()))
            .collect()
    }

    /// 合并一轮定向重试的结果
    ///
    /// 被重试输入的旧错误与旧失败结果由重试结果取代；`total_files` 保持不变。
    pub fn merge_retry(&mut self, retry: BatchConversionResult) {
        let retried: HashSet<PathBuf> = retry
            .results
            .iter()
            .map(|r| r.input_path.clone())
            .chain(
                retry
                    .errors
                    .iter()
                    .filter(|e| !e.is_batch_level())
                    .map(|e| e.input_path.clone()),
            )
            .collect();

        let removed_errors = self
            .errors
            .iter()
            .filter(|e| retried.contains(&e.input_path))
            .count();
        self.errors.retain(|e| !retried.contains(&e.input_path));
        self.results
            .retain(|r| r.success || !retried.contains(&r.input_path));

        self.failed_files = self.failed_files.saturating_sub(removed_errors) + retry.failed_files;
        self.successful_files += retry.successful_files;
        self.skipped_files += retry.skipped_files;
        self.processing_time += retry.processing_time;
        self.cancelled |= retry.cancelled;
        self.results.extend(retry.results);
        self.errors.extend(retry.errors);
        self.success = !self.results.is_empty() && !self.cancelled;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failed(input: &str, kind: ErrorKind) -> TaskResult {
        let task = ConversionTask::new(format!("/in/{}", input), format!("/out/{}.pdf", input));
        TaskResult::failed(&task, Duration::from_millis(5), ClassifiedError::new(kind, "boom"))
    }

    fn succeeded(input: &str) -> TaskResult {
        let task = ConversionTask::new(format!("/in/{}", input), format!("/out/{}.pdf", input));
        TaskResult::succeeded(&task, Duration::from_millis(5), Default::default())
    }

    #[test]
    fn test_retryable_inputs_skip_non_retryable_and_batch_level() {
        let results = vec![
            succeeded("a.md"),
            failed("b.md", ErrorKind::ConversionError),
            failed("c.md", ErrorKind::PermissionDenied),
        ];
        let mut errors: Vec<BatchError> = results.iter().filter_map(BatchError::from_result).collect();
        errors.push(BatchError::batch_level(ClassifiedError::new(
            ErrorKind::SystemError,
            "cancelled",
        )));

        let result = BatchConversionResult {
            success: true,
            total_files: 3,
            successful_files: 1,
            failed_files: 2,
            results,
            errors,
            ..Default::default()
        };

        assert_eq!(result.retryable_inputs(), vec![PathBuf::from("/in/b.md")]);
        assert_eq!(result.retryable_errors().len(), 1);
    }

    #[test]
    fn test_merge_retry_replaces_failure() {
        let first_results = vec![succeeded("a.md"), failed("b.md", ErrorKind::SystemError)];
        let first_errors: Vec<BatchError> =
            first_results.iter().filter_map(BatchError::from_result).collect();
        let mut result = BatchConversionResult {
            success: true,
            total_files: 2,
            successful_files: 1,
            failed_files: 1,
            results: first_results,
            errors: first_errors,
            ..Default::default()
        };

        let retry = BatchConversionResult {
            success: true,
            total_files: 1,
            successful_files: 1,
            results: vec![succeeded("b.md")],
            ..Default::default()
        };
        result.merge_retry(retry);

        assert_eq!(result.total_files, 2);
        assert_eq!(result.successful_files, 2);
        assert_eq!(result.failed_files, 0);
        assert!(result.errors.is_empty());
        assert_eq!(result.results.len(), 2);
        assert!(result.results.iter().all(|r| r.success));
        assert_eq!(result.processed_files(), 2);
    }

    #[test]
    fn test_aborted_has_single_error() {
        let result = BatchConversionResult::aborted(
            4,
            ClassifiedError::new(ErrorKind::SystemError, "pool"),
            Duration::ZERO,
        );
        assert!(!result.success);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].is_batch_level());
        assert!(result.results.is_empty());
    }
}
