//! # plan 命令实现
//!
//! 列出将要执行的转换映射，不创建任何文件。
//!
//! ## 依赖关系
//! - 使用 `cli/plan.rs` 定义的参数
//! - 使用 `batch::BatchProcessor::plan`
//! - 使用 `utils/output.rs`

use crate::batch::BatchProcessor;
use crate::cli::plan::PlanArgs;
use crate::error::Result;
use crate::utils::output;

use tabled::{Table, Tabled};

#[derive(Tabled)]
struct PlanRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Input")]
    input: String,
    #[tabled(rename = "Output")]
    output: String,
    #[tabled(rename = "Size (B)")]
    size: u64,
}

/// 执行 plan 命令
pub fn execute(args: PlanArgs) -> Result<()> {
    output::print_header("Conversion Plan");

    let config = args.batch.to_config()?;
    let processor = BatchProcessor::new(config);
    let plan = processor.plan()?;

    output::print_info(&format!(
        "Discovered {} file(s), {} ready, {} invalid",
        plan.total_files,
        plan.tasks.len(),
        plan.invalid.len()
    ));

    let rows: Vec<PlanRow> = plan
        .tasks
        .iter()
        .enumerate()
        .map(|(i, t)| PlanRow {
            index: i + 1,
            input: t.relative_input_path.display().to_string(),
            output: t.output_path.display().to_string(),
            size: t.size,
        })
        .collect();

    if !rows.is_empty() {
        println!("{}", Table::new(&rows));
    }

    for invalid in &plan.invalid {
        output::print_failure(
            &invalid.input_path.display().to_string(),
            invalid.error.kind.as_str(),
            invalid.can_retry,
        );
    }

    Ok(())
}
