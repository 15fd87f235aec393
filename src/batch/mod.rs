//! # 批量转换引擎
//!
//! 编排一次完整的批量转换：发现 → 输出路径解析 → 并发调度 → 汇总。
//!
//! ## 功能
//! - 按模式、文件列表或目录发现 markdown 文件
//! - 消解输出路径冲突并预先创建输出目录
//! - 分块并发执行调用方提供的单文件转换
//! - 进度事件、错误分类与可重试判定
//! - 针对可重试失败的定向重试
//!
//! ## 控制流
//! ```text
//! BatchConfig
//!   └─ discovery ──▶ output_paths ──▶ scheduler ──▶ BatchConversionResult
//!                                       ├─ progress
//!                                       └─ classify
//! ```
//!
//! ## 依赖关系
//! - 被 `commands/` 调用
//! - 子模块: discovery, output_paths, scheduler, progress, classify, cancel, converter

pub mod cancel;
pub mod classify;
pub mod converter;
pub mod discovery;
pub mod output_paths;
pub mod progress;
pub mod scheduler;

pub use cancel::CancellationToken;
pub use classify::{ClassifiedError, ErrorKind};
pub use converter::{CommandConverter, Converter};
pub use discovery::FileDiscoverer;
pub use progress::{ProgressEvent, ProgressEventType, ProgressListener, ProgressState, ProgressTracker};
pub use scheduler::{ConcurrencyScheduler, FileCompleteHook, FileErrorHook, ScheduleOutcome};

use crate::error::{MdBatchError, Result};
use crate::models::{BatchConfig, BatchConversionResult, BatchError, ConversionTask, TaskResult};

use chrono::{DateTime, Local, Utc};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// 有效/无效任务划分
#[derive(Debug, Default)]
pub struct ValidationOutcome {
    pub valid: Vec<ConversionTask>,
    pub invalid: Vec<BatchError>,
}

/// 调度前的执行计划
#[derive(Debug, Default)]
pub struct BatchPlan {
    /// 验证前发现的文件数
    pub total_files: usize,
    /// 已验证、已消解冲突的任务
    pub tasks: Vec<ConversionTask>,
    /// 发现阶段与输出校验阶段的无效条目，按阶段顺序排列
    pub invalid: Vec<BatchError>,
}

/// 批量转换处理器
pub struct BatchProcessor {
    config: BatchConfig,
    cwd: Option<PathBuf>,
    clock: Option<DateTime<Local>>,
    cancel: Option<CancellationToken>,
    listeners: Vec<ProgressListener>,
    on_file_complete: Option<FileCompleteHook>,
    on_file_error: Option<FileErrorHook>,
}

impl BatchProcessor {
    pub fn new(config: BatchConfig) -> Self {
        BatchProcessor {
            config,
            cwd: None,
            clock: None,
            cancel: None,
            listeners: Vec::new(),
            on_file_complete: None,
            on_file_error: None,
        }
    }

    /// 解析相对路径时使用的工作目录（默认为进程工作目录）
    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    /// 固定命名用的时间
    pub fn with_clock(mut self, now: DateTime<Local>) -> Self {
        self.clock = Some(now);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// 订阅进度事件
    pub fn on_progress<F>(mut self, listener: F) -> Self
    where
        F: Fn(&ProgressEvent) + Send + Sync + 'static,
    {
        self.listeners.push(Arc::new(listener));
        self
    }

    pub fn on_file_complete<F>(mut self, hook: F) -> Self
    where
        F: Fn(&TaskResult) + Send + Sync + 'static,
    {
        self.on_file_complete = Some(Arc::new(hook));
        self
    }

    pub fn on_file_error<F>(mut self, hook: F) -> Self
    where
        F: Fn(&BatchError) + Send + Sync + 'static,
    {
        self.on_file_error = Some(Arc::new(hook));
        self
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// 仅执行文件发现
    pub fn discover(&self) -> Result<Vec<ConversionTask>> {
        self.config.validate()?;
        self.discoverer()?.discover()
    }

    /// 发现、验证并消解冲突，不执行转换
    pub fn plan(&self) -> Result<BatchPlan> {
        self.config.validate()?;
        let discoverer = self.discoverer()?;
        let tasks = discoverer.discover()?;
        info!(discovered = tasks.len(), input = %self.config.input, "discovery finished");
        Ok(self.plan_tasks(&discoverer, tasks))
    }

    /// 执行完整的批量转换
    ///
    /// 只有零匹配、配置无效与输出目录创建失败会返回 `Err`；
    /// 其余调度前的意外错误包装为结果中的单个错误。
    pub fn convert_batch<C>(&self, converter: &C) -> Result<BatchConversionResult>
    where
        C: Converter + ?Sized,
    {
        let started = Instant::now();

        let plan = match self.plan() {
            Ok(plan) => plan,
            Err(e @ (MdBatchError::NoFilesFound { .. } | MdBatchError::InvalidConfig(_))) => {
                return Err(e)
            }
            Err(e) => {
                warn!(error = %e, "batch aborted before scheduling");
                return Ok(BatchConversionResult::aborted(
                    0,
                    ClassifiedError::from(&e),
                    started.elapsed(),
                ));
            }
        };

        self.execute(plan, converter, started)
    }

    /// 对上一次结果中的可重试失败进行定向重试
    ///
    /// 沿用上一次计划的输出路径，不重新发现文件。没有可重试条目时返回 `None`。
    pub fn retry_failed<C>(
        &self,
        previous: &BatchConversionResult,
        converter: &C,
    ) -> Result<Option<BatchConversionResult>>
    where
        C: Converter + ?Sized,
    {
        self.config.validate()?;
        let started = Instant::now();

        let tasks: Vec<ConversionTask> = previous
            .retryable_errors()
            .into_iter()
            .filter_map(|e| e.output_path.as_ref().map(|out| retry_task(&e.input_path, out)))
            .collect();

        if tasks.is_empty() {
            return Ok(None);
        }

        info!(retrying = tasks.len(), "retrying failed files");
        let discoverer = self.discoverer()?;
        let plan = self.plan_tasks(&discoverer, tasks);
        self.execute(plan, converter, started).map(Some)
    }

    fn discoverer(&self) -> Result<FileDiscoverer<'_>> {
        let mut discoverer = FileDiscoverer::new(&self.config)?;
        if let Some(cwd) = &self.cwd {
            discoverer = discoverer.with_cwd(cwd.clone());
        }
        if let Some(now) = self.clock {
            discoverer = discoverer.with_clock(now);
        }
        Ok(discoverer)
    }

    fn plan_tasks(&self, discoverer: &FileDiscoverer<'_>, tasks: Vec<ConversionTask>) -> BatchPlan {
        let total_files = tasks.len();

        let discovered = discoverer.validate_files(tasks);
        let resolved = output_paths::resolve_file_name_conflicts(discovered.valid);
        let checked = output_paths::validate_output_paths(resolved);

        let mut invalid = discovered.invalid;
        invalid.extend(checked.invalid);

        if !invalid.is_empty() {
            warn!(invalid = invalid.len(), "some files failed validation");
        }

        BatchPlan {
            total_files,
            tasks: checked.valid,
            invalid,
        }
    }

    fn execute<C>(&self, plan: BatchPlan, converter: &C, started: Instant) -> Result<BatchConversionResult>
    where
        C: Converter + ?Sized,
    {
        output_paths::prepare_output_directories(&plan.tasks)?;

        let tracker = ProgressTracker::new(plan.tasks.len());
        for listener in &self.listeners {
            tracker.subscribe(Arc::clone(listener));
        }
        tracker.start();

        let scheduler = ConcurrencyScheduler::new(
            self.config.max_concurrent_processes,
            self.config.continue_on_error,
            &tracker,
        )
        .with_cancellation(self.cancel.clone())
        .with_hooks(self.on_file_complete.clone(), self.on_file_error.clone());

        let outcome = match scheduler.run(&plan.tasks, converter) {
            Ok(outcome) => outcome,
            Err(e) => {
                tracker.complete();
                warn!(error = %e, "scheduler could not start");
                return Ok(BatchConversionResult::aborted(
                    plan.total_files,
                    ClassifiedError::from(&e),
                    started.elapsed(),
                ));
            }
        };
        tracker.complete();

        Ok(aggregate(plan, outcome, started))
    }
}

/// 汇总调度结果
fn aggregate(plan: BatchPlan, outcome: ScheduleOutcome, started: Instant) -> BatchConversionResult {
    let successful_files = outcome.results.iter().filter(|r| r.success).count();
    let failed_conversions = outcome.results.len() - successful_files;
    let cancelled = outcome.cancellation.is_some();

    let mut errors = plan.invalid;
    let invalid_count = errors.len();
    errors.extend(outcome.errors);
    errors.extend(outcome.cancellation);

    let result = BatchConversionResult {
        success: !outcome.results.is_empty() && !cancelled,
        total_files: plan.total_files,
        successful_files,
        failed_files: failed_conversions + invalid_count,
        skipped_files: 0,
        processing_time: started.elapsed(),
        results: outcome.results,
        errors,
        cancelled,
    };

    info!(
        total = result.total_files,
        succeeded = result.successful_files,
        failed = result.failed_files,
        cancelled,
        ms = result.processing_time.as_millis() as u64,
        "batch finished"
    );

    result
}

/// 根据上一次的输入/输出路径重建任务
fn retry_task(input: &std::path::Path, output: &std::path::Path) -> ConversionTask {
    let mut task = ConversionTask::new(input, output);
    if let Ok(meta) = fs::metadata(input) {
        task.size = meta.len();
        task.last_modified = meta.modified().ok().map(DateTime::<Utc>::from);
    }
    task
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ConversionStats, FilenameFormat};
    use parking_lot::Mutex;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    fn touch(dir: &Path, rel: &str) -> PathBuf {
        let path = dir.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "# doc\n").unwrap();
        path
    }

    /// 写出一个空 PDF 占位文件
    fn write_pdf(task: &ConversionTask) -> anyhow::Result<ConversionStats> {
        fs::write(&task.output_path, b"%PDF-1.4\n")?;
        Ok(ConversionStats {
            input_size: task.size,
            output_size: Some(9),
            page_count: Some(1),
        })
    }

    #[test]
    fn test_end_to_end_success() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "docs/a.md");
        touch(tmp.path(), "docs/guide/b.md");

        let config = BatchConfig::with_pattern("docs", "out")
            .preserve_structure(true)
            .concurrency(2);
        let result = BatchProcessor::new(config)
            .with_cwd(tmp.path())
            .convert_batch(&write_pdf)
            .unwrap();

        assert!(result.success);
        assert_eq!(result.total_files, 2);
        assert_eq!(result.successful_files, 2);
        assert_eq!(result.failed_files, 0);
        assert_eq!(result.skipped_files, 0);
        assert!(tmp.path().join("out/a.pdf").is_file());
        assert!(tmp.path().join("out/guide/b.pdf").is_file());
    }

    #[test]
    fn test_conflicting_names_are_not_overwritten() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "src/one/x.md");
        touch(tmp.path(), "src/two/x.md");

        let config = BatchConfig::with_pattern("src/**/*.md", "out").preserve_structure(false);
        let result = BatchProcessor::new(config)
            .with_cwd(tmp.path())
            .convert_batch(&write_pdf)
            .unwrap();

        let mut outputs: Vec<PathBuf> = result.results.iter().map(|r| r.output_path.clone()).collect();
        outputs.sort();
        assert_eq!(
            outputs,
            vec![tmp.path().join("out/x-1.pdf"), tmp.path().join("out/x.pdf")]
        );
        assert!(tmp.path().join("out/x.pdf").is_file());
        assert!(tmp.path().join("out/x-1.pdf").is_file());
    }

    #[test]
    fn test_fail_fast_leaves_remaining_chunks_unstarted() {
        let tmp = TempDir::new().unwrap();
        for name in ["1.md", "2.md", "3.md", "4.md", "5.md"] {
            touch(tmp.path(), name);
        }

        let converter = |task: &ConversionTask| -> anyhow::Result<ConversionStats> {
            if task.input_path.ends_with("1.md") {
                anyhow::bail!("conversion failed for 1.md");
            }
            write_pdf(task)
        };

        let config = BatchConfig::with_pattern("*.md", "out")
            .concurrency(2)
            .continue_on_error(false);
        let result = BatchProcessor::new(config)
            .with_cwd(tmp.path())
            .convert_batch(&converter)
            .unwrap();

        assert_eq!(result.results.len(), 2);
        assert_eq!(result.total_files, 5);
        assert!(result.failed_files >= 1);
        assert!(!tmp.path().join("out/3.pdf").exists());
        assert!(result.success);
    }

    #[test]
    fn test_cancelled_before_first_chunk() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "a.md");
        touch(tmp.path(), "b.md");

        let token = CancellationToken::new();
        token.cancel();

        let config = BatchConfig::with_pattern("*.md", "out");
        let result = BatchProcessor::new(config)
            .with_cwd(tmp.path())
            .with_cancellation(token)
            .convert_batch(&write_pdf)
            .unwrap();

        assert!(!result.success);
        assert!(result.cancelled);
        assert_eq!(result.errors.len(), 1);
        assert!(result.results.is_empty());
    }

    #[test]
    fn test_zero_files_is_fatal() {
        let tmp = TempDir::new().unwrap();
        let config = BatchConfig::with_pattern("*.md", "out");
        let err = BatchProcessor::new(config)
            .with_cwd(tmp.path())
            .convert_batch(&write_pdf)
            .unwrap_err();
        assert!(matches!(err, MdBatchError::NoFilesFound { .. }));
    }

    #[test]
    fn test_malformed_pattern_aborts_with_single_error() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "a.md");

        let config = BatchConfig::with_pattern("[.md", "out");
        let result = BatchProcessor::new(config)
            .with_cwd(tmp.path())
            .convert_batch(&write_pdf)
            .unwrap();

        assert!(!result.success);
        assert!(result.results.is_empty());
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].is_batch_level());
        assert_eq!(result.errors[0].kind(), ErrorKind::InvalidFormat);
        assert!(!result.errors[0].can_retry);
    }

    #[test]
    fn test_output_directory_failure_is_fatal() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "a.md");
        let plan = BatchPlan {
            total_files: 1,
            tasks: vec![ConversionTask::new(
                tmp.path().join("a.md"),
                tmp.path().join("a.md/nested/a.pdf"),
            )],
            invalid: vec![],
        };

        let config = BatchConfig::with_pattern("*.md", "out");
        let processor = BatchProcessor::new(config).with_cwd(tmp.path());
        let err = processor.execute(plan, &write_pdf, Instant::now()).unwrap_err();
        assert!(matches!(err, MdBatchError::DirectoryCreateError { .. }));
    }

    #[test]
    fn test_progress_events_and_invariants() {
        let tmp = TempDir::new().unwrap();
        for name in ["a.md", "b.md", "c.md"] {
            touch(tmp.path(), name);
        }

        let events: Arc<Mutex<Vec<ProgressEvent>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let converter = |task: &ConversionTask| -> anyhow::Result<ConversionStats> {
            if task.input_path.ends_with("b.md") {
                anyhow::bail!("render error");
            }
            write_pdf(task)
        };

        let config = BatchConfig::with_pattern("*.md", "out").concurrency(2);
        let result = BatchProcessor::new(config)
            .with_cwd(tmp.path())
            .on_progress(move |e| sink.lock().push(e.clone()))
            .convert_batch(&converter)
            .unwrap();

        let events = events.lock();
        assert_eq!(events.first().unwrap().event_type, ProgressEventType::Start);
        let last = events.last().unwrap();
        assert_eq!(last.event_type, ProgressEventType::Complete);
        assert_eq!(
            last.data.processed_files,
            last.data.successful_files + last.data.failed_files + last.data.skipped_files
        );
        assert_eq!(last.data.processed_files, 3);

        // 每个文件的 progress 事件先于其结束事件
        for path in ["a.md", "b.md", "c.md"] {
            let start = events
                .iter()
                .position(|e| {
                    e.event_type == ProgressEventType::Progress
                        && e.current_file.as_ref().map(|p| p.ends_with(path)).unwrap_or(false)
                })
                .unwrap();
            let end = events
                .iter()
                .position(|e| {
                    matches!(
                        e.event_type,
                        ProgressEventType::FileComplete | ProgressEventType::FileError
                    ) && e.current_file.as_ref().map(|p| p.ends_with(path)).unwrap_or(false)
                })
                .unwrap();
            assert!(start < end);
        }

        let processed: Vec<usize> = events.iter().map(|e| e.data.processed_files).collect();
        assert!(processed.windows(2).all(|w| w[0] <= w[1]));

        assert_eq!(result.failed_files, 1);
        assert_eq!(result.errors[0].kind(), ErrorKind::ConversionError);
        assert!(result.errors[0].can_retry);
    }

    #[test]
    fn test_retry_failed_reuses_output_paths() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "one/x.md");
        touch(tmp.path(), "two/x.md");

        let attempts = AtomicUsize::new(0);
        let flaky = |task: &ConversionTask| -> anyhow::Result<ConversionStats> {
            if task.input_path.starts_with(tmp.path().join("two"))
                && attempts.fetch_add(1, Ordering::SeqCst) == 0
            {
                anyhow::bail!("operation timed out");
            }
            write_pdf(task)
        };

        let config = BatchConfig::with_pattern("**/*.md", "out").concurrency(1);
        let processor = BatchProcessor::new(config).with_cwd(tmp.path());
        let mut result = processor.convert_batch(&flaky).unwrap();
        assert_eq!(result.failed_files, 1);
        assert_eq!(result.errors[0].kind(), ErrorKind::SystemError);

        let failed_output = result.errors[0].output_path.clone().unwrap();
        let retry = processor.retry_failed(&result, &flaky).unwrap().unwrap();
        assert_eq!(retry.results.len(), 1);
        assert_eq!(retry.results[0].output_path, failed_output);

        result.merge_retry(retry);
        assert_eq!(result.successful_files, 2);
        assert_eq!(result.failed_files, 0);
        assert!(processor.retry_failed(&result, &flaky).unwrap().is_none());
    }

    #[test]
    fn test_plan_does_not_convert() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "report.md");
        let now = chrono::TimeZone::with_ymd_and_hms(&Local, 2024, 5, 1, 9, 0, 0).unwrap();

        let config = BatchConfig::with_pattern("report.md", "out").filename_format(FilenameFormat::WithDate);
        let plan = BatchProcessor::new(config)
            .with_cwd(tmp.path())
            .with_clock(now)
            .plan()
            .unwrap();

        assert_eq!(plan.total_files, 1);
        assert_eq!(
            plan.tasks[0].output_path,
            tmp.path().join("out/report_2024-05-01.pdf")
        );
        assert!(!tmp.path().join("out").exists());
    }
}
