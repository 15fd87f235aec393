//! # mdbatch - 批量 markdown 转 PDF 工具
//!
//! ## 子命令
//! - `convert` - 批量转换（外部命令完成单文件渲染）
//! - `plan`    - 预览输入/输出映射
//!
//! ## 依赖关系
//! ```text
//! main.rs
//!   ├── cli/        (命令行参数定义)
//!   ├── commands/   (命令执行逻辑)
//!   │     └── batch/  (批量转换引擎)
//!   └── utils/      (输出与日志)
//! ```

use clap::Parser;
use mdbatch::cli::Cli;
use mdbatch::{commands, utils};

fn main() {
    // Initialize colored output for Windows compatibility
    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    let cli = Cli::parse();
    utils::logging::init_logging(cli.verbose);

    if let Err(e) = commands::run(cli.command) {
        utils::output::print_error(&format!("{}", e));
        std::process::exit(1);
    }
}
