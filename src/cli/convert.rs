//! # convert 子命令 CLI 定义
//!
//! 批量转换 markdown 文件为 PDF，单文件转换由外部命令完成
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 参数传递给 `commands/convert.rs`

use super::batch::BatchArgs;
use clap::Args;
use std::path::PathBuf;

/// convert 子命令参数
#[derive(Args, Debug)]
pub struct ConvertArgs {
    #[command(flatten)]
    pub batch: BatchArgs,

    /// Converter command run per file; {input}, {output} and {name} are substituted
    #[arg(short = 'x', long, env = "MDBATCH_COMMAND")]
    pub command: String,

    /// Write a per-file report (.csv, or .json by extension)
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Targeted retry passes over retryable failures
    #[arg(long, env = "MDBATCH_RETRIES", default_value_t = 0)]
    pub retries: u32,
}
