//! # 进度追踪器
//!
//! 单一写者的进度状态机，根据调度器回调发布进度事件。
//!
//! ## 事件顺序
//! ```text
//! start → (progress → file_complete | file_error)* → complete
//! ```
//! 状态变更、快照与事件派发在同一把锁内完成，并发完成的任务按锁顺序串行化。
//! 订阅者回调运行在锁内，不能回调追踪器本身。
//!
//! ## 依赖关系
//! - 被 `batch/scheduler.rs` 驱动
//! - 被 `batch/mod.rs` 创建与订阅
//! - 使用 `parking_lot` 互斥锁

use crate::batch::classify::ClassifiedError;
use crate::models::{BatchError, TaskResult};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::warn;

/// 进度状态
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgressState {
    pub total_files: usize,
    pub processed_files: usize,
    pub successful_files: usize,
    pub failed_files: usize,
    pub skipped_files: usize,
    pub current_file: Option<PathBuf>,
    pub start_time: Option<DateTime<Utc>>,
    pub average_processing_time: Duration,
    pub estimated_time_remaining: Option<Duration>,
}

/// 进度事件类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressEventType {
    Start,
    Progress,
    FileComplete,
    FileError,
    Complete,
}

/// 进度事件，`data` 为事件发出时的状态快照
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub event_type: ProgressEventType,
    pub data: ProgressState,
    pub current_file: Option<PathBuf>,
    pub error: Option<ClassifiedError>,
}

/// 进度订阅者
pub type ProgressListener = Arc<dyn Fn(&ProgressEvent) + Send + Sync>;

struct TrackerInner {
    state: ProgressState,
    started_at: Option<Instant>,
    file_starts: HashMap<PathBuf, Instant>,
    durations: Vec<Duration>,
    listeners: Vec<ProgressListener>,
}

/// 进度追踪器
pub struct ProgressTracker {
    inner: Mutex<TrackerInner>,
}

impl ProgressTracker {
    pub fn new(total_files: usize) -> Self {
        ProgressTracker {
            inner: Mutex::new(TrackerInner {
                state: ProgressState {
                    total_files,
                    ..Default::default()
                },
                started_at: None,
                file_starts: HashMap::new(),
                durations: Vec::new(),
                listeners: Vec::new(),
            }),
        }
    }

    /// 注册订阅者
    pub fn subscribe(&self, listener: ProgressListener) {
        self.inner.lock().listeners.push(listener);
    }

    pub fn start(&self) {
        let mut inner = self.inner.lock();
        inner.started_at = Some(Instant::now());
        inner.state.start_time = Some(Utc::now());
        inner.emit(ProgressEventType::Start, None, None);
    }

    pub fn start_file(&self, path: &Path) {
        let mut inner = self.inner.lock();
        inner.file_starts.insert(path.to_path_buf(), Instant::now());
        inner.state.current_file = Some(path.to_path_buf());
        inner.emit(ProgressEventType::Progress, Some(path.to_path_buf()), None);
    }

    pub fn complete_file(&self, result: &TaskResult) {
        let mut inner = self.inner.lock();
        if !inner.record(&result.input_path, true) {
            return;
        }
        inner.emit(
            ProgressEventType::FileComplete,
            Some(result.input_path.clone()),
            None,
        );
    }

    pub fn fail_file(&self, error: &BatchError) {
        let mut inner = self.inner.lock();
        if !inner.record(&error.input_path, false) {
            return;
        }
        inner.emit(
            ProgressEventType::FileError,
            Some(error.input_path.clone()),
            Some(error.error.clone()),
        );
    }

    pub fn complete(&self) {
        let mut inner = self.inner.lock();
        inner.state.current_file = None;
        inner.emit(ProgressEventType::Complete, None, None);
    }

    /// 当前状态快照
    pub fn snapshot(&self) -> ProgressState {
        self.inner.lock().state.clone()
    }

    // ─────────────────────────────────────────────────────────────
    // 派生查询
    // ─────────────────────────────────────────────────────────────

    /// 完成百分比 (0-100)
    pub fn percentage(&self) -> f64 {
        let inner = self.inner.lock();
        let state = &inner.state;
        if state.total_files == 0 {
            return 100.0;
        }
        state.processed_files as f64 * 100.0 / state.total_files as f64
    }

    pub fn remaining(&self) -> usize {
        let inner = self.inner.lock();
        inner
            .state
            .total_files
            .saturating_sub(inner.state.processed_files)
    }

    pub fn elapsed(&self) -> Duration {
        self.inner
            .lock()
            .started_at
            .map(|t| t.elapsed())
            .unwrap_or_default()
    }

    /// 成功率 (0-100)，尚无已处理文件时为 0
    pub fn success_rate(&self) -> f64 {
        let inner = self.inner.lock();
        let state = &inner.state;
        if state.processed_files == 0 {
            return 0.0;
        }
        state.successful_files as f64 * 100.0 / state.processed_files as f64
    }

    /// 吞吐量（文件/分钟）
    pub fn throughput(&self) -> f64 {
        let inner = self.inner.lock();
        let minutes = inner
            .started_at
            .map(|t| t.elapsed().as_secs_f64() / 60.0)
            .unwrap_or(0.0);
        if minutes <= 0.0 {
            return 0.0;
        }
        inner.state.processed_files as f64 / minutes
    }

    pub fn is_complete(&self) -> bool {
        let inner = self.inner.lock();
        inner.state.processed_files >= inner.state.total_files
    }
}

impl TrackerInner {
    /// 记录一个文件的结束；超出总数时拒绝
    fn record(&mut self, path: &Path, success: bool) -> bool {
        if self.state.processed_files >= self.state.total_files {
            warn!(
                input = %path.display(),
                total = self.state.total_files,
                "progress update beyond total ignored"
            );
            return false;
        }

        self.state.processed_files += 1;
        if success {
            self.state.successful_files += 1;
        } else {
            self.state.failed_files += 1;
        }

        if let Some(started) = self.file_starts.remove(path) {
            self.durations.push(started.elapsed());
        }

        if !self.durations.is_empty() {
            let sum: Duration = self.durations.iter().sum();
            let average = sum / self.durations.len() as u32;
            let remaining = self.state.total_files - self.state.processed_files;
            self.state.average_processing_time = average;
            self.state.estimated_time_remaining = Some(average * remaining as u32);
        }

        self.state.current_file = None;
        true
    }

    fn emit(
        &self,
        event_type: ProgressEventType,
        current_file: Option<PathBuf>,
        error: Option<ClassifiedError>,
    ) {
        if self.listeners.is_empty() {
            return;
        }
        let event = ProgressEvent {
            event_type,
            data: self.state.clone(),
            current_file,
            error,
        };
        for listener in &self.listeners {
            listener(&event);
        }
    }
}
