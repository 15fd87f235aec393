//! # mdbatch - 批量 markdown 转 PDF 编排引擎
//!
//! 给定一组输入文档（模式、文件列表或目录），为每个文档分配无冲突的输出路径，
//! 在并发上限内执行调用方提供的单文件转换，追踪进度、分类失败并生成汇总报告。
//!
//! ## 依赖关系
//! ```text
//! lib.rs
//!   ├── batch/      (发现、输出路径、调度、进度、错误分类)
//!   ├── models/     (任务、配置、结果数据模型)
//!   ├── cli/        (命令行参数定义)
//!   ├── commands/   (命令执行逻辑)
//!   ├── utils/      (输出、进度条、日志、报告)
//!   └── error.rs    (错误处理)
//! ```

pub mod batch;
pub mod cli;
pub mod commands;
pub mod error;
pub mod models;
pub mod utils;

pub use batch::{BatchProcessor, CancellationToken, Converter, ErrorKind};
pub use error::{MdBatchError, Result};
pub use models::{BatchConfig, BatchConversionResult, ConversionTask, FilenameFormat, InputSpec};
