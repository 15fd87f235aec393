//! # 并发调度器
//!
//! 以分块屏障的方式并行执行转换任务。
//!
//! ## 功能
//! - 任务按并发上限 N 切分为顺序执行的分块
//! - 每个分块内并行执行，全部结束后才决定是否启动下一块
//! - 出错即停（`continue_on_error == false`）与取消处理
//! - 每个任务恰好产生一个 `TaskResult`（成功、失败或 panic）
//!
//! ## 依赖关系
//! - 被 `batch/mod.rs` 调用
//! - 驱动 `batch/progress.rs` 与 `batch/classify.rs`
//! - 使用 `rayon` 线程池执行分块

use crate::batch::cancel::CancellationToken;
use crate::batch::classify::{self, ClassifiedError, ErrorKind};
use crate::batch::converter::Converter;
use crate::batch::progress::ProgressTracker;
use crate::error::{MdBatchError, Result};
use crate::models::{BatchError, ConversionTask, TaskResult};

use rayon::prelude::*;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// 单文件完成回调
pub type FileCompleteHook = Arc<dyn Fn(&TaskResult) + Send + Sync>;
/// 单文件失败回调
pub type FileErrorHook = Arc<dyn Fn(&BatchError) + Send + Sync>;

/// 调度结果
#[derive(Debug, Default)]
pub struct ScheduleOutcome {
    /// 已结束任务的结果，按分块及块内顺序排列
    pub results: Vec<TaskResult>,
    /// 失败任务的错误，与 `results` 中的失败一一对应
    pub errors: Vec<BatchError>,
    /// 取消时的聚合错误
    pub cancellation: Option<BatchError>,
    /// 已执行的分块数
    pub chunks_run: usize,
    /// 因出错即停而未启动的任务数
    pub not_started: usize,
}

/// 并发调度器
pub struct ConcurrencyScheduler<'a> {
    max_concurrent: usize,
    continue_on_error: bool,
    cancel: Option<CancellationToken>,
    tracker: &'a ProgressTracker,
    on_file_complete: Option<FileCompleteHook>,
    on_file_error: Option<FileErrorHook>,
}

impl<'a> ConcurrencyScheduler<'a> {
    pub fn new(max_concurrent: usize, continue_on_error: bool, tracker: &'a ProgressTracker) -> Self {
        ConcurrencyScheduler {
            max_concurrent: max_concurrent.max(1),
            continue_on_error,
            cancel: None,
            tracker,
            on_file_complete: None,
            on_file_error: None,
        }
    }

    pub fn with_cancellation(mut self, token: Option<CancellationToken>) -> Self {
        self.cancel = token;
        self
    }

    pub fn with_hooks(
        mut self,
        on_file_complete: Option<FileCompleteHook>,
        on_file_error: Option<FileErrorHook>,
    ) -> Self {
        self.on_file_complete = on_file_complete;
        self.on_file_error = on_file_error;
        self
    }

    /// 执行所有任务
    ///
    /// 只有线程池构建失败会返回 `Err`；转换失败和取消都体现在结果里。
    pub fn run<C>(&self, tasks: &[ConversionTask], converter: &C) -> Result<ScheduleOutcome>
    where
        C: Converter + ?Sized,
    {
        let mut outcome = ScheduleOutcome::default();
        if tasks.is_empty() {
            return Ok(outcome);
        }

        let width = self.max_concurrent.min(tasks.len());
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(width)
            .thread_name(|i| format!("mdbatch-worker-{}", i))
            .build()
            .map_err(|e| MdBatchError::WorkerPool(e.to_string()))?;

        let total_chunks = tasks.len().div_ceil(width);
        info!(tasks = tasks.len(), width, chunks = total_chunks, "scheduling batch");

        for (index, chunk) in tasks.chunks(width).enumerate() {
            if self.is_cancelled() {
                outcome.cancellation = Some(self.cancellation_error(outcome.results.len(), tasks.len()));
                break;
            }

            debug!(chunk = index, size = chunk.len(), "launching chunk");
            let settled: Vec<Option<TaskResult>> = pool.install(|| {
                chunk
                    .par_iter()
                    .map(|task| self.run_task(task, converter))
                    .collect()
            });
            outcome.chunks_run += 1;

            let mut chunk_failed = false;
            let mut chunk_interrupted = false;
            for result in settled {
                match result {
                    Some(result) => {
                        if let Some(error) = BatchError::from_result(&result) {
                            chunk_failed = true;
                            outcome.errors.push(error);
                        }
                        outcome.results.push(result);
                    }
                    None => chunk_interrupted = true,
                }
            }

            if chunk_interrupted {
                outcome.cancellation = Some(self.cancellation_error(outcome.results.len(), tasks.len()));
                break;
            }

            if chunk_failed && !self.continue_on_error {
                outcome.not_started = tasks.len().saturating_sub(outcome.results.len());
                warn!(
                    chunk = index,
                    not_started = outcome.not_started,
                    "stopping after failed chunk"
                );
                break;
            }
        }

        if let Some(cancel) = &outcome.cancellation {
            warn!(error = %cancel.error, "batch cancelled");
        }

        Ok(outcome)
    }

    /// 执行单个任务；取消时不启动，返回 `None`
    fn run_task<C>(&self, task: &ConversionTask, converter: &C) -> Option<TaskResult>
    where
        C: Converter + ?Sized,
    {
        if self.is_cancelled() {
            debug!(input = %task.input_path.display(), "not started, batch cancelled");
            return None;
        }

        self.tracker.start_file(&task.input_path);
        let started = Instant::now();

        let converted = panic::catch_unwind(AssertUnwindSafe(|| converter.convert(task)));
        let elapsed = started.elapsed();

        let result = match converted {
            Ok(Ok(stats)) => TaskResult::succeeded(task, elapsed, stats),
            Ok(Err(e)) => TaskResult::failed(task, elapsed, classify::classify(&e)),
            Err(payload) => TaskResult::failed(task, elapsed, classify::classify_panic(payload.as_ref())),
        };

        match BatchError::from_result(&result) {
            None => {
                debug!(input = %task.input_path.display(), ms = elapsed.as_millis() as u64, "converted");
                self.tracker.complete_file(&result);
                if let Some(hook) = &self.on_file_complete {
                    hook(&result);
                }
            }
            Some(error) => {
                debug!(input = %task.input_path.display(), kind = %error.error.kind, "conversion failed");
                self.tracker.fail_file(&error);
                if let Some(hook) = &self.on_file_error {
                    hook(&error);
                }
            }
        }

        Some(result)
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().map(|c| c.is_cancelled()).unwrap_or(false)
    }

    fn cancellation_error(&self, completed: usize, total: usize) -> BatchError {
        let err = MdBatchError::Cancelled { completed, total };
        BatchError::batch_level(ClassifiedError::new(ErrorKind::SystemError, err.to_string()))
    }
}
