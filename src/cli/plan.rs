//! # plan 子命令 CLI 定义
//!
//! 只执行发现与输出路径解析，打印计划的转换映射
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 参数传递给 `commands/plan.rs`

use super::batch::BatchArgs;
use clap::Args;

/// plan 子命令参数
#[derive(Args, Debug)]
pub struct PlanArgs {
    #[command(flatten)]
    pub batch: BatchArgs,
}
