//! # 进度条工具
//!
//! 封装 `indicatif` 提供统一的进度条样式，并将进度事件渲染到进度条上。
//!
//! ## 依赖关系
//! - 被 `commands/convert.rs` 使用
//! - 订阅 `batch/progress.rs` 的进度事件
//! - 使用 `indicatif` crate

use crate::batch::{ProgressEvent, ProgressEventType};

use indicatif::{ProgressBar, ProgressStyle};

/// 创建标准进度条
pub fn create_progress_bar(len: u64, message: &str) -> ProgressBar {
    let pb = ProgressBar::new(len);
    let style = ProgressStyle::with_template(
        "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}",
    )
    .map(|s| s.progress_chars("#>-"))
    .unwrap_or_else(|_| ProgressStyle::default_bar());
    pb.set_style(style);
    pb.set_message(message.to_string());
    pb
}

/// 将进度事件同步到进度条
pub fn render_event(pb: &ProgressBar, event: &ProgressEvent) {
    let state = &event.data;
    match event.event_type {
        ProgressEventType::Start => {
            pb.reset();
            pb.set_length(state.total_files as u64);
            pb.set_position(0);
        }
        ProgressEventType::Progress => {
            if let Some(name) = event
                .current_file
                .as_ref()
                .and_then(|p| p.file_name())
                .and_then(|n| n.to_str())
            {
                pb.set_message(name.to_string());
            }
        }
        ProgressEventType::FileComplete | ProgressEventType::FileError => {
            pb.set_position(state.processed_files as u64);
        }
        ProgressEventType::Complete => {
            pb.set_position(state.processed_files as u64);
            pb.finish_and_clear();
        }
    }
}
