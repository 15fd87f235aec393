//! # CLI 模块
//!
//! 使用 `clap` 定义命令行参数和子命令。
//!
//! ## 命令结构
//! - `convert`: 批量转换 markdown 为 PDF
//! - `plan`: 仅列出计划的输入/输出，不执行转换
//!
//! ## 依赖关系
//! - 被 `main.rs` 使用
//! - 子模块: batch, convert, plan

pub mod batch;
pub mod convert;
pub mod plan;

use clap::{Parser, Subcommand};

/// mdbatch - 批量 markdown 转 PDF 编排工具
#[derive(Parser)]
#[command(name = "mdbatch")]
#[command(author = "Changjiang Wu")]
#[command(version)]
#[command(about = "Batch markdown-to-PDF conversion with bounded concurrency", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable debug logging (overridden by MDBATCH_LOG)
    #[arg(short, long, global = true, default_value_t = false)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// 可用的子命令
#[derive(Subcommand)]
pub enum Commands {
    /// Convert markdown files to PDF using an external converter command
    Convert(convert::ConvertArgs),

    /// Show the planned input -> output mapping without converting
    Plan(plan::PlanArgs),
}
