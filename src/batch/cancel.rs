//! # 取消信号
//!
//! 共享的原子标志，在分块边界和每个任务开始时轮询；不会强行中断进行中的任务。
//!
//! ## 依赖关系
//! - 被 `batch/scheduler.rs` 轮询
//! - 由调用方持有并触发

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// 取消句柄，克隆后共享同一标志
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// 发出取消信号
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}
